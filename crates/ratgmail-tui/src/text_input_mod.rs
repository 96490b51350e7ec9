use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use ratatui::layout::Rect;

/// Single-line editor state for the search and attachment-path prompts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct TextInput {
    pub(crate) text: String,
    pub(crate) cursor: usize,
}

impl TextInput {
    pub(crate) fn clear(&mut self) {
        self.text.clear();
        self.cursor = 0;
    }

    pub(crate) fn value(&self) -> &str {
        &self.text
    }

    pub(crate) fn handle_key(&mut self, key: KeyEvent) {
        edit_text(&mut self.text, &mut self.cursor, key, false);
    }
}

/// Applies one key to `text`, with `cursor` counted in chars. Control chords
/// never type. Enter inserts a newline only when `multiline` is set.
pub(crate) fn edit_text(text: &mut String, cursor: &mut usize, key: KeyEvent, multiline: bool) {
    let len = text.chars().count();
    *cursor = (*cursor).min(len);
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return;
    }
    match key.code {
        KeyCode::Left => *cursor = cursor.saturating_sub(1),
        KeyCode::Right => *cursor = (*cursor + 1).min(len),
        KeyCode::Home => *cursor = 0,
        KeyCode::End => *cursor = len,
        KeyCode::Backspace if *cursor > 0 => {
            *cursor -= 1;
            text.remove(byte_offset(text, *cursor));
        }
        KeyCode::Delete if *cursor < len => {
            text.remove(byte_offset(text, *cursor));
        }
        KeyCode::Enter if multiline => {
            text.insert(byte_offset(text, *cursor), '\n');
            *cursor += 1;
        }
        KeyCode::Char(c) => {
            text.insert(byte_offset(text, *cursor), c);
            *cursor += 1;
        }
        _ => {}
    }
}

fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices().nth(chars).map_or(text.len(), |(idx, _)| idx)
}

/// Steps a list selection by one, wrapping at both ends.
pub(crate) fn wrap_step(current: usize, len: usize, forward: bool) -> usize {
    match (len, forward) {
        (0, _) => 0,
        (_, true) => (current + 1) % len,
        (_, false) => (current + len - 1) % len,
    }
}

fn cursor_line_col(text: &str, cursor: usize) -> (u16, u16) {
    let before: String = text.chars().take(cursor).collect();
    let line = before.matches('\n').count();
    let col = before.rsplit('\n').next().map_or(0, |tail| tail.chars().count());
    (line as u16, col as u16)
}

/// Places the terminal cursor inside `area`, clamped to its last cell.
pub(crate) fn set_cursor_at(frame: &mut ratatui::Frame, area: Rect, text: &str, cursor: usize) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    let (line, col) = cursor_line_col(text, cursor);
    frame.set_cursor_position((
        area.x + col.min(area.width - 1),
        area.y + line.min(area.height - 1),
    ));
}
