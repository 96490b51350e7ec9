use std::path::PathBuf;

use crossterm::event::KeyEvent;
use ratgmail_core::{Draft, DraftKind};
use ratgmail_mail::MailCommand;

use super::{App, AttachmentEntry, ComposeField, Mode};
use crate::keymap_mod::Action;
use crate::message_parse_mod::build_reply_draft;
use crate::text_input_mod::{TextInput, edit_text};

impl App {
    pub(crate) fn on_key_compose(&mut self, action: Option<Action>, key: KeyEvent) {
        match action {
            Some(Action::Send) => self.send_draft(DraftKind::Compose),
            Some(Action::NextField) => self.compose_focus = self.compose_focus.next(),
            Some(Action::PrevField) => self.compose_focus = self.compose_focus.prev(),
            Some(Action::StartAttachment) => self.start_attachment_entry(DraftKind::Compose),
            Some(Action::RemoveAttachment) => self.remove_last_attachment(DraftKind::Compose),
            Some(Action::Back) => self.enter_inbox(),
            _ => {
                let field = self.compose_focus;
                let cursor = &mut self.compose_cursors[field.index()];
                let target = compose_field_mut(&mut self.compose, field);
                edit_text(target, cursor, key, field == ComposeField::Body);
            }
        }
    }

    pub(crate) fn on_key_reply(&mut self, action: Option<Action>, key: KeyEvent) {
        match action {
            Some(Action::Send) => self.send_draft(DraftKind::Reply),
            Some(Action::StartAttachment) => self.start_attachment_entry(DraftKind::Reply),
            Some(Action::RemoveAttachment) => self.remove_last_attachment(DraftKind::Reply),
            Some(Action::Back) => {
                self.mode = if self.current.is_some() {
                    Mode::Viewing
                } else {
                    Mode::Inbox
                };
            }
            _ => edit_text(&mut self.reply.body, &mut self.reply_cursor, key, true),
        }
    }

    /// Enter hands the path to a background check; the entry stays open
    /// until the check succeeds.
    pub(crate) fn on_key_attachment_entry(&mut self, action: Option<Action>, key: KeyEvent) {
        let Some(entry) = self.attachment_entry.as_mut() else {
            return;
        };
        match action {
            Some(Action::Select) => {
                let kind = entry.kind;
                let raw = entry.input.value().trim().to_string();
                if raw.is_empty() {
                    self.attachment_entry = None;
                    return;
                }
                self.issue(MailCommand::CheckAttachment {
                    path: expand_home(&raw),
                    kind,
                });
            }
            Some(Action::Back) => self.attachment_entry = None,
            Some(Action::Send) => {
                let kind = entry.kind;
                self.send_draft(kind);
            }
            _ => entry.input.handle_key(key),
        }
    }

    fn start_attachment_entry(&mut self, kind: DraftKind) {
        self.attachment_entry = Some(AttachmentEntry {
            kind,
            input: TextInput::default(),
        });
    }

    fn remove_last_attachment(&mut self, kind: DraftKind) {
        match self.draft_mut(kind).pop_attachment() {
            Some(_) => self.notify("Removed last attachment"),
            None => self.notify("No attachments to remove"),
        }
    }

    fn draft_mut(&mut self, kind: DraftKind) -> &mut Draft {
        match kind {
            DraftKind::Compose => &mut self.compose,
            DraftKind::Reply => &mut self.reply,
        }
    }

    /// The draft itself is left untouched until the send is confirmed.
    pub(crate) fn send_draft(&mut self, kind: DraftKind) {
        if self.sending.is_some() {
            self.notify("A message is already being sent");
            return;
        }
        let draft = match kind {
            DraftKind::Compose => self.compose.clone(),
            DraftKind::Reply => {
                let Some(original) = self.reply_to.as_ref() else {
                    self.notify("No message selected");
                    return;
                };
                build_reply_draft(&self.reply.body, original, self.reply.attachments.clone())
            }
        };
        if self.issue(MailCommand::Send { draft, kind }) {
            self.sending = Some(kind);
            self.notify("Sending...");
        }
    }
}

fn compose_field_mut(draft: &mut Draft, field: ComposeField) -> &mut String {
    match field {
        ComposeField::From => &mut draft.from,
        ComposeField::To => &mut draft.to,
        ComposeField::Cc => &mut draft.cc,
        ComposeField::Bcc => &mut draft.bcc,
        ComposeField::Subject => &mut draft.subject,
        ComposeField::Body => &mut draft.body,
    }
}

pub(crate) fn compose_field(draft: &Draft, field: ComposeField) -> &str {
    match field {
        ComposeField::From => &draft.from,
        ComposeField::To => &draft.to,
        ComposeField::Cc => &draft.cc,
        ComposeField::Bcc => &draft.bcc,
        ComposeField::Subject => &draft.subject,
        ComposeField::Body => &draft.body,
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(raw)
}

#[cfg(test)]
mod tests {
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
    use ratgmail_mail::{FailureContext, MailEvent};

    use super::*;
    use crate::app_lifecycle_mod::test_support::*;

    fn press(app: &mut App, code: KeyCode) {
        app.on_key(KeyEvent::new(code, KeyModifiers::NONE));
    }

    fn ctrl(app: &mut App, c: char) {
        app.on_key(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    fn composing() -> crate::app_lifecycle_mod::test_support::Harness {
        let mut h = inbox_with(&["m1"]);
        press(&mut h.app, KeyCode::Char('c'));
        h
    }

    #[test]
    fn focus_cycles_over_six_fields_both_ways() {
        let mut h = composing();
        for _ in 0..6 {
            press(&mut h.app, KeyCode::Tab);
        }
        assert_eq!(h.app.compose_focus, ComposeField::From);

        h.app.on_key(KeyEvent::new(KeyCode::BackTab, KeyModifiers::SHIFT));
        assert_eq!(h.app.compose_focus, ComposeField::Body);
    }

    #[test]
    fn typing_goes_to_the_focused_field() {
        let mut h = composing();
        press(&mut h.app, KeyCode::Tab);
        type_text(&mut h.app, "bob@example.com");
        for _ in 0..4 {
            press(&mut h.app, KeyCode::Tab);
        }
        type_text(&mut h.app, "hi");
        press(&mut h.app, KeyCode::Enter);
        type_text(&mut h.app, "there");

        let snap = h.app.snapshot();
        assert_eq!(snap.compose.from, "me");
        assert_eq!(snap.compose.to, "bob@example.com");
        assert_eq!(snap.compose.body, "hi\nthere");
    }

    #[test]
    fn send_keeps_draft_until_confirmed_and_refuses_double_send() {
        let mut h = composing();
        press(&mut h.app, KeyCode::Tab);
        type_text(&mut h.app, "bob@example.com");

        ctrl(&mut h.app, 's');
        ctrl(&mut h.app, 's');

        let issued = h.issued();
        assert_eq!(issued.len(), 1);
        assert!(matches!(
            &issued[0],
            MailCommand::Send { draft, kind: DraftKind::Compose } if draft.to == "bob@example.com"
        ));
        let snap = h.app.snapshot();
        assert_eq!(snap.mode, Mode::Composing);
        assert_eq!(snap.sending, Some(DraftKind::Compose));
        assert_eq!(snap.compose.to, "bob@example.com");
        assert_eq!(
            snap.notification.as_deref(),
            Some("A message is already being sent")
        );

        h.app.on_event(MailEvent::Sent {
            kind: DraftKind::Compose,
        });
        let snap = h.app.snapshot();
        assert_eq!(snap.mode, Mode::Inbox);
        assert_eq!(snap.compose, Draft::default());
    }

    #[test]
    fn attachment_entry_checks_path_and_stays_open_on_failure() {
        let mut h = composing();
        ctrl(&mut h.app, 'a');
        assert_eq!(h.app.snapshot().attachment_entry, Some(DraftKind::Compose));

        // Tab is swallowed by the entry instead of cycling fields
        press(&mut h.app, KeyCode::Tab);
        assert_eq!(h.app.compose_focus, ComposeField::From);

        type_text(&mut h.app, "/tmp/missing.pdf");
        press(&mut h.app, KeyCode::Enter);
        let issued = h.issued();
        assert!(matches!(
            issued.as_slice(),
            [MailCommand::CheckAttachment { path, kind: DraftKind::Compose }]
                if path == &PathBuf::from("/tmp/missing.pdf")
        ));

        h.app.on_event(MailEvent::Failed {
            context: FailureContext::CheckAttachment {
                kind: DraftKind::Compose,
                path: PathBuf::from("/tmp/missing.pdf"),
            },
            reason: "File not found: /tmp/missing.pdf".into(),
        });
        let snap = h.app.snapshot();
        assert_eq!(snap.attachment_entry, Some(DraftKind::Compose));
        assert_eq!(
            snap.notification.as_deref(),
            Some("File not found: /tmp/missing.pdf")
        );
        assert!(snap.compose.attachments.is_empty());

        h.app.on_event(MailEvent::AttachmentChecked {
            kind: DraftKind::Compose,
            path: PathBuf::from("/tmp/missing.pdf"),
        });
        assert!(h.app.snapshot().attachment_entry.is_none());
    }

    #[test]
    fn escape_leaves_entry_before_leaving_compose() {
        let mut h = composing();
        ctrl(&mut h.app, 'a');
        press(&mut h.app, KeyCode::Esc);
        assert_eq!(h.app.mode, Mode::Composing);
        assert!(h.app.attachment_entry.is_none());

        press(&mut h.app, KeyCode::Esc);
        assert_eq!(h.app.mode, Mode::Inbox);
    }

    #[test]
    fn remove_pops_most_recent_attachment() {
        let mut h = composing();
        h.app.compose.push_attachment(PathBuf::from("a.txt"));
        h.app.compose.push_attachment(PathBuf::from("b.txt"));

        ctrl(&mut h.app, 'x');
        assert_eq!(h.app.compose.attachments, vec![PathBuf::from("a.txt")]);
        assert_eq!(h.app.notification.as_deref(), Some("Removed last attachment"));

        ctrl(&mut h.app, 'x');
        ctrl(&mut h.app, 'x');
        assert_eq!(h.app.notification.as_deref(), Some("No attachments to remove"));
    }

    #[test]
    fn reply_back_returns_to_open_message() {
        let mut h = inbox_with(&["m1"]);
        h.app.mode = Mode::Viewing;
        h.app.current = Some(detail("m1", &[]));
        press(&mut h.app, KeyCode::Char('r'));
        h.app.reply.push_attachment(PathBuf::from("notes.txt"));

        press(&mut h.app, KeyCode::Esc);
        assert_eq!(h.app.mode, Mode::Viewing);
        assert_eq!(h.app.snapshot().open_message.as_deref(), Some("m1"));
    }

    #[test]
    fn reply_send_carries_reply_attachments() {
        let mut h = inbox_with(&["m1"]);
        h.app.mode = Mode::Viewing;
        h.app.current = Some(detail("m1", &[]));
        press(&mut h.app, KeyCode::Char('r'));
        h.app.reply.push_attachment(PathBuf::from("notes.txt"));
        h.app.compose.push_attachment(PathBuf::from("other.txt"));

        ctrl(&mut h.app, 's');
        let issued = h.issued();
        assert!(matches!(
            issued.as_slice(),
            [MailCommand::Send { draft, kind: DraftKind::Reply }]
                if draft.attachments == vec![PathBuf::from("notes.txt")]
        ));
    }
}
