use std::path::Path;

use log::{debug, warn};
use ratgmail_core::{Draft, DraftKind};
use ratgmail_mail::{FailureContext, ListSource, MailEvent};

use super::{App, Mode};

impl App {
    pub(crate) fn on_event(&mut self, event: MailEvent) {
        let from = self.mode;
        match event {
            MailEvent::ListLoaded { source, messages } => {
                debug!("list loaded: {:?} ({} messages)", source, messages.len());
                self.startup_pending = false;
                self.list_title = list_title(&source);
                self.messages = messages;
                self.message_index = 0;
                if self.mode == Mode::Loading {
                    self.enter_inbox();
                }
            }
            MailEvent::MessageLoaded(detail) => {
                if self.mode == Mode::Loading {
                    self.current = Some(*detail);
                    self.view_scroll = 0;
                    self.picker_armed = false;
                    self.mode = Mode::Viewing;
                }
            }
            MailEvent::LabelsLoaded(labels) => {
                self.labels = labels;
                self.label_index = 0;
                if self.mode == Mode::Loading {
                    self.mode = Mode::ManagingLabels;
                }
            }
            MailEvent::Sent { kind } => {
                self.sending = None;
                self.notify("Email sent successfully!");
                let editing = matches!(
                    (kind, self.mode),
                    (DraftKind::Compose, Mode::Composing) | (DraftKind::Reply, Mode::Replying)
                );
                if editing {
                    match kind {
                        DraftKind::Compose => self.compose = Draft::default(),
                        DraftKind::Reply => {
                            self.reply = Draft::default();
                            self.reply_to = None;
                            self.reply_cursor = 0;
                        }
                    }
                    self.enter_inbox();
                }
            }
            MailEvent::Trashed { id } => {
                self.messages.retain(|m| m.id != id);
                self.message_index = self
                    .message_index
                    .min(self.messages.len().saturating_sub(1));
                self.notify("Email moved to trash");
            }
            MailEvent::ReadStateChanged { id, unread } => {
                if let Some(row) = self.messages.iter_mut().find(|m| m.id == id) {
                    row.unread = unread;
                }
                if let Some(open) = self.current.as_mut().filter(|m| m.id() == id) {
                    open.summary.unread = unread;
                }
                self.notify(if unread {
                    "Email marked as unread"
                } else {
                    "Email marked as read"
                });
            }
            MailEvent::LabelApplied { id, label } => {
                if let Some(row) = self.messages.iter_mut().find(|m| m.id == id)
                    && !row.label_ids.contains(&label.id)
                {
                    row.label_ids.push(label.id.clone());
                }
                self.notify(format!("Label applied: {}", label.name));
            }
            MailEvent::AttachmentSaved { path } => {
                self.notify(format!("Downloaded: {}", display_name(&path)));
            }
            MailEvent::AttachmentChecked { kind, path } => {
                // the entry closed (or its draft was reset) while the check ran
                if !self.attachment_entry.as_ref().is_some_and(|e| e.kind == kind) {
                    debug!("dropping checked attachment {}: entry closed", path.display());
                    return;
                }
                self.attachment_entry = None;
                let name = display_name(&path);
                match kind {
                    DraftKind::Compose => self.compose.push_attachment(path),
                    DraftKind::Reply => self.reply.push_attachment(path),
                }
                self.notify(format!("Added: {}", name));
            }
            MailEvent::Failed { context, reason } => self.on_failure(context, reason),
        }
        self.log_transition(from);
    }

    fn on_failure(&mut self, context: FailureContext, reason: String) {
        warn!("{:?} failed: {}", context, reason);
        let message = failure_notification(&context, &reason);
        if context.is_loading() {
            if self.startup_pending && matches!(context, FailureContext::LoadList(ListSource::Inbox)) {
                self.fatal = Some(message);
                return;
            }
            if self.mode == Mode::Loading {
                self.mode = self.loading_return;
            }
        }
        if matches!(context, FailureContext::Send { .. }) {
            self.sending = None;
        }
        self.notify(message);
    }
}

fn list_title(source: &ListSource) -> String {
    match source {
        ListSource::Inbox => "Inbox".to_string(),
        ListSource::Search(query) => format!("Search: {}", query),
        ListSource::Label { name, .. } => format!("Label: {}", name),
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

pub(crate) fn failure_notification(context: &FailureContext, reason: &str) -> String {
    match context {
        FailureContext::LoadList(ListSource::Inbox) => format!("Couldn't load inbox: {}", reason),
        FailureContext::LoadList(ListSource::Search(_)) => format!("Search failed: {}", reason),
        FailureContext::LoadList(ListSource::Label { name, .. }) => {
            format!("Couldn't load label {}: {}", name, reason)
        }
        FailureContext::LoadMessage { .. } => format!("Couldn't load message: {}", reason),
        FailureContext::LoadLabels => format!("Couldn't load labels: {}", reason),
        FailureContext::Send { .. } => format!("Send failed: {}", reason),
        FailureContext::Trash { .. } => format!("Trash failed: {}", reason),
        FailureContext::SetUnread { .. } => format!("Couldn't update read state: {}", reason),
        FailureContext::ApplyLabel { label } => {
            format!("Couldn't apply label {}: {}", label, reason)
        }
        FailureContext::Download { .. } | FailureContext::CheckAttachment { .. } => {
            reason.to_string()
        }
    }
}
