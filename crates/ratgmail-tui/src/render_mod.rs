use std::path::PathBuf;

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Row, Table, TableState, Wrap},
};

use super::{App, AttachmentEntry, ComposeField, Mode};
use crate::input_compose_mod::compose_field;
use crate::text_input_mod::set_cursor_at;
use crate::util_mod::{centered_rect, format_size, truncate_label};

const UNREAD_MARKER: &str = "● ";

fn label_style() -> Style {
    Style::default().fg(Color::Cyan)
}

fn selected_style() -> Style {
    Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD)
}

pub(crate) fn ui(frame: &mut ratatui::Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(2)])
        .split(frame.area());

    match app.mode {
        Mode::Inbox => render_message_list(frame, chunks[0], app),
        Mode::Searching => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(1)])
                .split(chunks[0]);
            render_search_line(frame, parts[0], app);
            render_message_list(frame, parts[1], app);
        }
        Mode::Viewing => render_message_view(frame, chunks[0], app),
        Mode::Loading => render_loading(frame, chunks[0], app),
        Mode::Composing => render_compose(frame, chunks[0], app),
        Mode::Replying => render_reply(frame, chunks[0], app),
        Mode::ManagingLabels => render_labels(frame, chunks[0], app),
    }
    render_help_bar(frame, chunks[1], app);
    if app.show_help {
        render_help_overlay(frame, frame.area());
    }
}

fn render_message_list(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let total = app.messages.len();
    let rows_visible = area.height.saturating_sub(2).max(1) as usize;
    let mut start = app
        .message_index
        .saturating_sub(rows_visible.saturating_sub(1));
    if start + rows_visible > total {
        start = total.saturating_sub(rows_visible);
    }
    let end = (start + rows_visible).min(total);
    let from_width = 24usize;

    let rows: Vec<Row> = app.messages[start..end]
        .iter()
        .enumerate()
        .map(|(idx, message)| {
            let marker = if message.unread { UNREAD_MARKER } else { "  " };
            let mut style = if start + idx == app.message_index {
                selected_style()
            } else {
                Style::default()
            };
            if message.unread {
                style = style.add_modifier(Modifier::BOLD);
            }
            Row::new(vec![
                marker.to_string(),
                message.date.clone(),
                truncate_label(&message.subject, 60),
                format!(
                    "{} - {}",
                    truncate_label(&message.from, from_width),
                    message.snippet
                ),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Length(2),
            Constraint::Length(18),
            Constraint::Percentage(40),
            Constraint::Min(10),
        ],
    )
    .header(Row::new(vec!["", "Date", "Subject", "From"]).style(label_style()))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .title(format!(" {} ({}) ", app.list_title, total)),
    )
    .column_spacing(1);
    frame.render_stateful_widget(table, area, &mut TableState::default());

    if total == 0 {
        let inner = Rect {
            x: area.x + 2,
            y: area.y + 2,
            width: area.width.saturating_sub(4),
            height: 1,
        };
        frame.render_widget(Paragraph::new("No messages"), inner);
    }
}

fn render_search_line(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title(" Search ");
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let prompt = "Search: ";
    let line = Line::from(vec![
        Span::styled(prompt, label_style()),
        Span::raw(app.search.value()),
    ]);
    frame.render_widget(Paragraph::new(line), inner);
    let cursor_area = Rect {
        x: inner.x.saturating_add(prompt.len() as u16),
        width: inner.width.saturating_sub(prompt.len() as u16),
        ..inner
    };
    set_cursor_at(frame, cursor_area, app.search.value(), app.search.cursor);
}

fn header_line<'a>(name: &'a str, value: &'a str) -> Line<'a> {
    Line::from(vec![
        Span::styled(format!("{}: ", name), label_style()),
        Span::raw(value),
    ])
}

fn render_message_view(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let Some(message) = app.current.as_ref() else {
        frame.render_widget(Paragraph::new("No message selected"), area);
        return;
    };
    let mut lines = vec![header_line("From", &message.summary.from), header_line("To", &message.to)];
    if !message.cc.is_empty() {
        lines.push(header_line("CC", &message.cc));
    }
    if !message.bcc.is_empty() {
        lines.push(header_line("BCC", &message.bcc));
    }
    lines.push(header_line("Subject", &message.summary.subject));
    lines.push(header_line("Date", &message.summary.date));
    lines.push(Line::raw(""));

    let body_style = if message.body.is_fallback() {
        Style::default().add_modifier(Modifier::ITALIC)
    } else {
        Style::default()
    };
    for line in message.body_text().lines() {
        lines.push(Line::styled(line, body_style));
    }

    if !message.attachments.is_empty() {
        lines.push(Line::raw(""));
        lines.push(Line::styled("Attachments:", label_style()));
        for (idx, attachment) in message.attachments.iter().enumerate() {
            lines.push(Line::raw(format!(
                "  [{}] {} ({})",
                idx + 1,
                attachment.filename,
                format_size(attachment.size)
            )));
        }
    }

    let (body_area, prompt_area) = if app.picker_armed {
        let parts = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(1), Constraint::Length(1)])
            .split(area);
        (parts[0], Some(parts[1]))
    } else {
        (area, None)
    };

    let title = if message.summary.unread {
        format!(" {}{} ", UNREAD_MARKER, message.summary.subject)
    } else {
        format!(" {} ", message.summary.subject)
    };
    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().borders(Borders::ALL).title(title))
        .wrap(Wrap { trim: false })
        .scroll((app.view_scroll, 0));
    frame.render_widget(paragraph, body_area);

    if let Some(prompt_area) = prompt_area {
        let prompt = format!(
            "Download which attachment? (1-{}) [esc] cancel",
            message.attachments.len().min(9)
        );
        frame.render_widget(
            Paragraph::new(prompt).style(Style::default().fg(Color::Yellow)),
            prompt_area,
        );
    }
}

fn render_loading(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let popup = centered_rect(30, 20, area);
    let text = format!("{} Loading...", app.loading_spinner());
    frame.render_widget(
        Paragraph::new(text).block(Block::default().borders(Borders::ALL)),
        popup,
    );
}

fn render_attachment_lines(
    frame: &mut ratatui::Frame,
    area: Rect,
    attachments: &[PathBuf],
    entry: Option<&AttachmentEntry>,
) {
    let mut lines = Vec::new();
    if attachments.is_empty() {
        lines.push(Line::styled("Attachments: none (Ctrl+A to add)", label_style()));
    } else {
        lines.push(Line::styled("Attachments:", label_style()));
        for path in attachments {
            lines.push(Line::raw(format!("  - {}", path.display())));
        }
    }
    let entry_row = lines.len() as u16;
    if let Some(entry) = entry {
        lines.push(Line::from(vec![
            Span::styled("Attachment Path: ", label_style()),
            Span::raw(entry.input.value()),
        ]));
    }
    frame.render_widget(Paragraph::new(lines), area);

    if let Some(entry) = entry {
        let prompt = "Attachment Path: ".len() as u16;
        let cursor_area = Rect {
            x: area.x.saturating_add(prompt),
            y: area.y.saturating_add(entry_row),
            width: area.width.saturating_sub(prompt),
            height: 1,
        };
        if cursor_area.y < area.y + area.height {
            set_cursor_at(frame, cursor_area, entry.input.value(), entry.input.cursor);
        }
    }
}

fn attachment_panel_height(count: usize, entry_open: bool) -> u16 {
    (1 + count + usize::from(entry_open)).min(8) as u16
}

fn render_compose(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(" Compose New Email ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let entry_open = app.attachment_entry.is_some();
    let mut constraints = vec![Constraint::Length(1); 5];
    constraints.push(Constraint::Min(3));
    constraints.push(Constraint::Length(attachment_panel_height(
        app.compose.attachments.len(),
        entry_open,
    )));
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(inner);

    let label_width = 6u16;
    for (row, field) in ComposeField::ALL.iter().take(5).enumerate() {
        let focused = *field == app.compose_focus && !entry_open;
        let style = if focused {
            label_style().add_modifier(Modifier::BOLD)
        } else {
            label_style()
        };
        let line = Line::from(vec![
            Span::styled(format!("{:<5} ", field.label()), style),
            Span::raw(compose_field(&app.compose, *field)),
        ]);
        frame.render_widget(Paragraph::new(line), rows[row]);
        if focused {
            let cursor_area = Rect {
                x: rows[row].x.saturating_add(label_width),
                width: rows[row].width.saturating_sub(label_width),
                ..rows[row]
            };
            set_cursor_at(
                frame,
                cursor_area,
                compose_field(&app.compose, *field),
                app.compose_cursors[field.index()],
            );
        }
    }

    let body_focused = app.compose_focus == ComposeField::Body && !entry_open;
    let body_block = Block::default()
        .borders(Borders::TOP)
        .title(ComposeField::Body.label())
        .border_style(if body_focused {
            label_style().add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        });
    let body_inner = body_block.inner(rows[5]);
    frame.render_widget(Paragraph::new(app.compose.body.as_str()).block(body_block), rows[5]);
    if body_focused {
        set_cursor_at(
            frame,
            body_inner,
            &app.compose.body,
            app.compose_cursors[ComposeField::Body.index()],
        );
    }

    render_attachment_lines(
        frame,
        rows[6],
        &app.compose.attachments,
        app.attachment_entry.as_ref(),
    );
}

fn render_reply(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let block = Block::default().borders(Borders::ALL).title(" Reply ");
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let entry_open = app.attachment_entry.is_some();
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(3),
            Constraint::Length(attachment_panel_height(
                app.reply.attachments.len(),
                entry_open,
            )),
        ])
        .split(inner);

    frame.render_widget(Paragraph::new(header_line("Reply to", &app.reply.to)), rows[0]);
    frame.render_widget(Paragraph::new(header_line("Subject", &app.reply.subject)), rows[1]);

    let body_block = Block::default().borders(Borders::TOP).title("Your reply");
    let body_inner = body_block.inner(rows[2]);
    frame.render_widget(Paragraph::new(app.reply.body.as_str()).block(body_block), rows[2]);
    if !entry_open {
        set_cursor_at(frame, body_inner, &app.reply.body, app.reply_cursor);
    }

    render_attachment_lines(
        frame,
        rows[3],
        &app.reply.attachments,
        app.attachment_entry.as_ref(),
    );
}

fn render_labels(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let rows: Vec<Row> = app
        .labels
        .iter()
        .enumerate()
        .map(|(idx, label)| {
            let style = if idx == app.label_index {
                selected_style()
            } else {
                Style::default()
            };
            Row::new(vec![label.name.clone()]).style(style)
        })
        .collect();
    let title = match &app.label_target {
        Some(_) => " Labels ([enter] open • [a] apply to message) ",
        None => " Labels ([enter] open) ",
    };
    let table = Table::new(rows, [Constraint::Min(10)])
        .block(Block::default().borders(Borders::ALL).title(title));
    let mut state = TableState::default().with_selected(Some(app.label_index));
    frame.render_stateful_widget(table, area, &mut state);
}

fn mode_help(app: &App) -> &'static str {
    if app.picker_armed {
        return "[1-9] download • [esc] cancel";
    }
    if app.attachment_entry.is_some() {
        return "[enter] add file • [esc] cancel • [ctrl+s] send";
    }
    match app.mode {
        Mode::Inbox => {
            "[c] compose • [r] reply • [d] delete • [m] mark read/unread • [l] labels • [/] search • [?] help • [q] quit"
        }
        Mode::Viewing => {
            "[r] reply • [d] delete • [m] read/unread • [l] labels • [ctrl+d] download • [b] back • [q] quit"
        }
        Mode::Loading => "Loading... [?] help",
        Mode::Composing => {
            "[tab] next field • [ctrl+s] send • [ctrl+a] attach • [ctrl+x] remove attachment • [esc] cancel"
        }
        Mode::Replying => {
            "[ctrl+s] send • [ctrl+a] attach • [ctrl+x] remove attachment • [esc] cancel"
        }
        Mode::Searching => "[enter] search • [esc] cancel",
        Mode::ManagingLabels => "[enter] open • [a] apply • [b] back",
    }
}

fn render_help_bar(frame: &mut ratatui::Frame, area: Rect, app: &App) {
    let mut spans = vec![Span::raw(mode_help(app))];
    if let Some(msg) = &app.notification {
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(msg.as_str(), Style::default().fg(Color::Yellow)));
    }
    let block = Block::default().borders(Borders::TOP);
    frame.render_widget(Paragraph::new(Line::from(spans)).block(block), area);
}

fn render_help_overlay(frame: &mut ratatui::Frame, area: Rect) {
    let popup = centered_rect(70, 70, area);
    frame.render_widget(Clear, popup);
    let text = "\
Inbox
  enter open • c compose • / search • l labels • d delete • m read/unread • q quit

Message
  r reply • ctrl+d download attachment • l labels • d delete • m read/unread • b back

Compose / reply
  tab / shift+tab move between fields • ctrl+s send
  ctrl+a add attachment • ctrl+x remove last attachment • esc cancel

Labels
  enter show messages • a apply to message • b back

? or esc closes this help";
    frame.render_widget(
        Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(" Help "))
            .wrap(Wrap { trim: false }),
        popup,
    );
}

#[cfg(test)]
mod tests {
    use ratatui::{Terminal, backend::TestBackend};
    use ratgmail_core::DraftKind;

    use super::*;
    use crate::app_lifecycle_mod::test_support::*;
    use crate::text_input_mod::TextInput;

    fn draw(app: &mut App) -> String {
        let backend = TestBackend::new(120, 30);
        let mut terminal = Terminal::new(backend).unwrap();
        terminal.draw(|frame| ui(frame, app)).unwrap();
        let buffer = terminal.backend().buffer().clone();
        buffer
            .content()
            .chunks(buffer.area.width as usize)
            .map(|row| row.iter().map(|cell| cell.symbol()).collect::<String>())
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn inbox_marks_unread_rows() {
        let mut h = inbox_with(&["m1"]);
        let screen = draw(&mut h.app);
        assert!(screen.contains("● "));
        assert!(screen.contains("Subject m1"));
        assert!(screen.contains("Inbox (1)"));
    }

    #[test]
    fn message_view_lists_attachments_with_sizes() {
        let mut h = inbox_with(&["m1"]);
        h.app.mode = Mode::Viewing;
        h.app.current = Some(detail("m1", &["agenda.txt"]));
        h.app.picker_armed = true;

        let screen = draw(&mut h.app);
        assert!(screen.contains("[1] agenda.txt (1.0 KB)"));
        assert!(screen.contains("Download which attachment? (1-1) [esc] cancel"));
        assert!(screen.contains("Original line one"));
    }

    #[test]
    fn loading_and_help_render() {
        let mut h = test_app();
        h.app.show_help = true;
        let screen = draw(&mut h.app);
        assert!(screen.contains("Loading..."));
        assert!(screen.contains("esc closes this help"));
    }

    #[test]
    fn compose_form_shows_fields_and_path_entry() {
        let mut h = inbox_with(&[]);
        h.app.start_compose();
        h.app.compose.to = "bob@example.com".into();
        h.app.attachment_entry = Some(AttachmentEntry {
            kind: DraftKind::Compose,
            input: TextInput {
                text: "~/report.pdf".into(),
                cursor: 12,
            },
        });

        let screen = draw(&mut h.app);
        assert!(screen.contains("Compose New Email"));
        assert!(screen.contains("To    bob@example.com"));
        assert!(screen.contains("Attachment Path: ~/report.pdf"));
    }
}
