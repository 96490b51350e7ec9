use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use log::trace;
use ratgmail_core::DraftKind;
use ratgmail_mail::{ListSource, MailCommand};

use super::{App, Mode};
use crate::keymap_mod::{Action, KeyContext, lookup};
use crate::message_parse_mod::seed_reply_draft;
use crate::text_input_mod::wrap_step;

const PAGE_SCROLL: u16 = 10;

impl App {
    /// Returns true when the session should exit.
    pub(crate) fn on_key(&mut self, key: KeyEvent) -> bool {
        let from = self.mode;
        let quit = self.dispatch_key(key);
        self.log_transition(from);
        trace!("session after key {:?}: {:?}", key.code, self.snapshot());
        quit
    }

    fn dispatch_key(&mut self, key: KeyEvent) -> bool {
        if self.show_help {
            if matches!(key.code, KeyCode::Char('?') | KeyCode::Esc) {
                self.show_help = false;
            }
            return false;
        }
        let ctx = self.key_context();
        let action = lookup(ctx, key);
        match action {
            Some(Action::ToggleHelp) => {
                self.show_help = true;
                return false;
            }
            Some(Action::Quit) => return true,
            _ => {}
        }
        match ctx {
            KeyContext::Inbox => self.on_key_inbox(action, key),
            KeyContext::Viewing => self.on_key_viewing(action, key),
            KeyContext::Picker => self.on_key_picker(action, key),
            KeyContext::Loading => {}
            KeyContext::Searching => self.on_key_search(action, key),
            KeyContext::ManagingLabels => self.on_key_labels(action, key),
            KeyContext::Composing => self.on_key_compose(action, key),
            KeyContext::Replying => self.on_key_reply(action, key),
            KeyContext::AttachmentEntry => self.on_key_attachment_entry(action, key),
        }
        false
    }

    pub(crate) fn key_context(&self) -> KeyContext {
        match self.mode {
            Mode::Inbox => KeyContext::Inbox,
            Mode::Viewing if self.picker_armed => KeyContext::Picker,
            Mode::Viewing => KeyContext::Viewing,
            Mode::Loading => KeyContext::Loading,
            Mode::Composing | Mode::Replying if self.attachment_entry.is_some() => {
                KeyContext::AttachmentEntry
            }
            Mode::Composing => KeyContext::Composing,
            Mode::Replying => KeyContext::Replying,
            Mode::Searching => KeyContext::Searching,
            Mode::ManagingLabels => KeyContext::ManagingLabels,
        }
    }

    fn on_key_inbox(&mut self, action: Option<Action>, key: KeyEvent) {
        match action {
            Some(Action::Select) => {
                if let Some(id) = self.selected_id() {
                    self.begin_loading(MailCommand::LoadMessage { id });
                }
            }
            Some(Action::Compose) => self.start_compose(),
            Some(Action::Search) => {
                self.search.clear();
                self.mode = Mode::Searching;
            }
            Some(Action::Labels) => self.open_labels(self.selected_id()),
            Some(Action::Trash) => self.trash(self.selected_id()),
            Some(Action::ToggleRead) => {
                let target = self
                    .messages
                    .get(self.message_index)
                    .map(|m| (m.id.clone(), m.unread));
                self.toggle_read(target);
            }
            _ => self.move_in_list(key),
        }
    }

    fn move_in_list(&mut self, key: KeyEvent) {
        let count = self.messages.len();
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                if self.message_index + 1 < count {
                    self.message_index += 1;
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.message_index = self.message_index.saturating_sub(1);
            }
            KeyCode::Home | KeyCode::Char('g') => self.message_index = 0,
            KeyCode::End | KeyCode::Char('G') => self.message_index = count.saturating_sub(1),
            _ => {}
        }
    }

    fn on_key_viewing(&mut self, action: Option<Action>, key: KeyEvent) {
        let open_id = self.current.as_ref().map(|m| m.id().to_string());
        match action {
            Some(Action::Reply) => {
                if let Some(original) = self.current.clone() {
                    if self.sending == Some(DraftKind::Reply) {
                        self.notify("Still sending the previous message");
                        return;
                    }
                    self.reply = seed_reply_draft(&original);
                    self.reply_to = Some(original);
                    self.reply_cursor = 0;
                    self.attachment_entry = None;
                    self.mode = Mode::Replying;
                }
            }
            Some(Action::Download) => {
                let count = self.current.as_ref().map_or(0, |m| m.attachments.len());
                if count == 0 {
                    self.notify("No attachments available");
                } else {
                    self.picker_armed = true;
                    self.notify(format!(
                        "Select attachment to download (1-{}) [esc] cancel",
                        count.min(9)
                    ));
                }
            }
            Some(Action::Labels) => self.open_labels(open_id),
            Some(Action::Trash) => self.trash(open_id),
            Some(Action::ToggleRead) => {
                let target = self
                    .current
                    .as_ref()
                    .map(|m| (m.id().to_string(), m.summary.unread));
                self.toggle_read(target);
            }
            Some(Action::Back) => self.enter_inbox(),
            _ => self.scroll_view(key),
        }
    }

    fn scroll_view(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                self.view_scroll = self.view_scroll.saturating_add(1)
            }
            KeyCode::Char('k') | KeyCode::Up => {
                self.view_scroll = self.view_scroll.saturating_sub(1)
            }
            KeyCode::PageDown | KeyCode::Char(' ') => {
                self.view_scroll = self.view_scroll.saturating_add(PAGE_SCROLL)
            }
            KeyCode::PageUp => self.view_scroll = self.view_scroll.saturating_sub(PAGE_SCROLL),
            KeyCode::Home | KeyCode::Char('g') => self.view_scroll = 0,
            _ => {}
        }
    }

    /// Digits outside 1..=N and any other unbound key leave the picker armed.
    fn on_key_picker(&mut self, action: Option<Action>, key: KeyEvent) {
        if action == Some(Action::Back) {
            self.picker_armed = false;
            self.notification = None;
            return;
        }
        if key.modifiers.intersects(KeyModifiers::CONTROL | KeyModifiers::ALT) {
            return;
        }
        let KeyCode::Char(c) = key.code else {
            return;
        };
        let Some(number) = c.to_digit(10).map(|d| d as usize) else {
            return;
        };
        let Some(attachment) = self
            .current
            .as_ref()
            .and_then(|m| m.attachment(number))
            .cloned()
        else {
            return;
        };
        self.picker_armed = false;
        let filename = attachment.filename.clone();
        if self.issue(MailCommand::DownloadAttachment(attachment)) {
            self.notify(format!("Downloading {}...", filename));
        }
    }

    fn on_key_search(&mut self, action: Option<Action>, key: KeyEvent) {
        match action {
            Some(Action::Select) => {
                let query = self.search.value().trim().to_string();
                if query.is_empty() {
                    self.notify("Type a search query first");
                    return;
                }
                self.begin_loading(MailCommand::LoadList(ListSource::Search(query)));
            }
            Some(Action::Back) => self.enter_inbox(),
            _ => {
                self.search.handle_key(key);
            }
        }
    }

    fn on_key_labels(&mut self, action: Option<Action>, key: KeyEvent) {
        match action {
            Some(Action::Select) => {
                if let Some(label) = self.labels.get(self.label_index).cloned() {
                    self.begin_loading(MailCommand::LoadList(ListSource::Label {
                        id: label.id,
                        name: label.name,
                    }));
                }
            }
            Some(Action::ApplyLabel) => {
                let Some(label) = self.labels.get(self.label_index).cloned() else {
                    return;
                };
                match self.label_target.clone() {
                    Some(id) => {
                        self.issue(MailCommand::ApplyLabel { id, label });
                    }
                    None => self.notify("No message selected"),
                }
            }
            Some(Action::Back) => self.enter_inbox(),
            _ => match key.code {
                KeyCode::Char('j') | KeyCode::Down => {
                    self.label_index = wrap_step(self.label_index, self.labels.len(), true)
                }
                KeyCode::Char('k') | KeyCode::Up => {
                    self.label_index = wrap_step(self.label_index, self.labels.len(), false)
                }
                _ => {}
            },
        }
    }

    fn selected_id(&self) -> Option<String> {
        self.messages.get(self.message_index).map(|m| m.id.clone())
    }

    /// The label manager applies to the message that was selected or open
    /// when it was opened.
    fn open_labels(&mut self, target: Option<String>) {
        if self.begin_loading(MailCommand::LoadLabels) {
            self.label_target = target;
            self.label_index = 0;
        }
    }

    fn trash(&mut self, target: Option<String>) {
        match target {
            Some(id) => {
                self.issue(MailCommand::Trash { id });
            }
            None => self.notify("No message selected"),
        }
    }

    fn toggle_read(&mut self, target: Option<(String, bool)>) {
        match target {
            Some((id, unread)) => {
                self.issue(MailCommand::SetUnread {
                    id,
                    unread: !unread,
                });
            }
            None => self.notify("No message selected"),
        }
    }
}
