use std::time::Instant;

use log::{debug, trace};
use ratgmail_core::{DEFAULT_FROM, Draft, DraftKind, Label};
use ratgmail_mail::{ListSource, MailCommand, MailEngine, MailEvent};

use super::{App, ComposeField, LOADING_SPINNER_FRAMES, Mode};
use crate::text_input_mod::TextInput;

/// Observable session state, compared by tests after each input or event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SessionSnapshot {
    pub(crate) mode: Mode,
    pub(crate) list_title: String,
    pub(crate) message_ids: Vec<String>,
    pub(crate) selected: usize,
    pub(crate) open_message: Option<String>,
    pub(crate) notification: Option<String>,
    pub(crate) show_help: bool,
    pub(crate) picker_armed: bool,
    pub(crate) attachment_entry: Option<DraftKind>,
    pub(crate) sending: Option<DraftKind>,
    pub(crate) compose: Draft,
    pub(crate) reply: Draft,
    pub(crate) labels: Vec<String>,
}

impl App {
    /// Starts in `Loading` with the inbox fetch already issued.
    pub(crate) fn new(
        engine: MailEngine,
        events: tokio::sync::mpsc::Receiver<MailEvent>,
        labels: Vec<Label>,
    ) -> Self {
        let mut app = Self {
            mode: Mode::Inbox,
            engine,
            events,
            last_tick: Instant::now(),
            spinner: 0,
            messages: Vec::new(),
            list_title: "Inbox".to_string(),
            message_index: 0,
            current: None,
            view_scroll: 0,
            labels,
            label_index: 0,
            label_target: None,
            compose: Draft::default(),
            compose_focus: ComposeField::From,
            compose_cursors: [0; 6],
            reply: Draft::default(),
            reply_to: None,
            reply_cursor: 0,
            attachment_entry: None,
            search: TextInput::default(),
            notification: None,
            show_help: false,
            picker_armed: false,
            loading_return: Mode::Inbox,
            sending: None,
            startup_pending: true,
            fatal: None,
        };
        if !app.begin_loading(MailCommand::LoadList(ListSource::Inbox)) {
            app.fatal = app.notification.take();
        }
        app
    }

    /// Issues a fetch and enters `Loading`. Refused while another fetch is
    /// outstanding; a queue error leaves the state untouched.
    pub(crate) fn begin_loading(&mut self, cmd: MailCommand) -> bool {
        debug_assert!(cmd.is_loading());
        if self.mode == Mode::Loading {
            self.notify("Still loading, please wait");
            return false;
        }
        match self.engine.send(cmd) {
            Ok(()) => {
                self.loading_return = self.mode;
                self.mode = Mode::Loading;
                self.picker_armed = false;
                self.spinner = 0;
                true
            }
            Err(err) => {
                self.notify(format!("{:#}", err));
                false
            }
        }
    }

    /// Issues a background operation that reports through the notification line.
    pub(crate) fn issue(&mut self, cmd: MailCommand) -> bool {
        debug_assert!(!cmd.is_loading());
        match self.engine.send(cmd) {
            Ok(()) => true,
            Err(err) => {
                self.notify(format!("{:#}", err));
                false
            }
        }
    }

    pub(crate) fn notify(&mut self, message: impl Into<String>) {
        self.notification = Some(message.into());
    }

    pub(crate) fn enter_inbox(&mut self) {
        self.mode = Mode::Inbox;
        self.current = None;
        self.view_scroll = 0;
        self.picker_armed = false;
        self.attachment_entry = None;
        self.label_target = None;
    }

    pub(crate) fn start_compose(&mut self) {
        if self.sending == Some(DraftKind::Compose) {
            self.notify("Still sending the previous message");
            return;
        }
        self.compose = Draft {
            from: DEFAULT_FROM.to_string(),
            ..Draft::default()
        };
        self.compose_focus = ComposeField::From;
        self.compose_cursors = [0; 6];
        self.compose_cursors[ComposeField::From.index()] = DEFAULT_FROM.chars().count();
        self.attachment_entry = None;
        self.mode = Mode::Composing;
    }

    pub(crate) fn drain_events(&mut self) {
        while let Ok(event) = self.events.try_recv() {
            self.on_event(event);
            trace!("session after event: {:?}", self.snapshot());
        }
    }

    pub(crate) fn on_tick(&mut self) {
        if self.mode == Mode::Loading {
            self.spinner = (self.spinner + 1) % LOADING_SPINNER_FRAMES.len();
        }
    }

    pub(crate) fn loading_spinner(&self) -> &'static str {
        LOADING_SPINNER_FRAMES[self.spinner % LOADING_SPINNER_FRAMES.len()]
    }

    pub(crate) fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            list_title: self.list_title.clone(),
            message_ids: self.messages.iter().map(|m| m.id.clone()).collect(),
            selected: self.message_index,
            open_message: self.current.as_ref().map(|m| m.id().to_string()),
            notification: self.notification.clone(),
            show_help: self.show_help,
            picker_armed: self.picker_armed,
            attachment_entry: self.attachment_entry.as_ref().map(|e| e.kind),
            sending: self.sending,
            compose: self.compose.clone(),
            reply: self.reply.clone(),
            labels: self.labels.iter().map(|l| l.name.clone()).collect(),
        }
    }

    pub(crate) fn log_transition(&self, from: Mode) {
        if from != self.mode {
            debug!("session {:?} -> {:?}", from, self.mode);
        }
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;

    #[test]
    fn starts_loading_with_inbox_fetch() {
        let mut h = test_app();
        let snap = h.app.snapshot();
        assert_eq!(snap.mode, Mode::Loading);
        assert_eq!(snap.labels, vec!["INBOX", "Work"]);

        let issued = h.issued();
        assert_eq!(issued.len(), 1);
        assert!(matches!(issued[0], MailCommand::LoadList(ListSource::Inbox)));
    }

    #[test]
    fn second_fetch_is_refused_while_loading() {
        let mut h = test_app();
        h.issued();

        assert!(!h.app.begin_loading(MailCommand::LoadLabels));
        assert!(h.issued().is_empty());
        assert_eq!(h.app.mode, Mode::Loading);
        assert!(h.app.notification.is_some());
    }

    #[test]
    fn full_queue_is_reported_without_state_change() {
        let mut h = inbox_with(&["m1"]);
        // capacity 16; fill it up behind the app's back
        for _ in 0..16 {
            h.app.engine.send(MailCommand::LoadLabels).unwrap();
        }

        assert!(!h.app.begin_loading(MailCommand::LoadLabels));
        assert_eq!(h.app.mode, Mode::Inbox);
        assert_eq!(
            h.app.notification.as_deref(),
            Some("mail command queue full")
        );
    }

    #[test]
    fn closed_queue_at_startup_is_fatal() {
        let (engine, commands) = MailEngine::detached(1);
        drop(commands);
        let (_tx, rx) = tokio::sync::mpsc::channel(1);

        let app = App::new(engine, rx, Vec::new());
        assert_eq!(app.fatal.as_deref(), Some("mail command queue closed"));
    }

    #[test]
    fn spinner_only_advances_while_loading() {
        let mut h = test_app();
        h.app.on_tick();
        assert_eq!(h.app.loading_spinner(), "/");

        let mut h = inbox_with(&[]);
        h.app.on_tick();
        assert_eq!(h.app.loading_spinner(), "|");
    }

    #[test]
    fn compose_starts_fresh_with_default_sender() {
        let mut h = inbox_with(&[]);
        h.app.compose.subject = "leftover".into();

        h.app.start_compose();
        assert_eq!(h.app.mode, Mode::Composing);
        assert_eq!(h.app.compose.from, "me");
        assert!(h.app.compose.subject.is_empty());
        assert_eq!(h.app.compose_focus, ComposeField::From);
    }
}
