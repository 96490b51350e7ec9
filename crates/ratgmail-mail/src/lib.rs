//! Mail command scheduling and service backends (Gmail REST, in-memory demo).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Result, anyhow};
use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use ratgmail_content::{check_attachment, decode_detail, encode_draft, summarize, to_transport};
use ratgmail_core::{
    AttachmentRef, DEFAULT_DOWNLOADS_DIR, DEFAULT_INBOX_MAX_RESULTS, DEFAULT_INBOX_QUERY,
    DEFAULT_LABEL_MAX_RESULTS, DEFAULT_SEARCH_MAX_RESULTS, Draft, DraftKind, Label, MailService,
    MessageDetail, MessageFormat, MessageSummary, UNREAD_LABEL,
};

mod demo;
#[cfg(test)]
mod fake;
mod gmail;
mod transfer;

pub use demo::DemoMailService;
pub use gmail::{GmailAuth, GmailClient, GmailCredentials};
pub use transfer::{TransferError, download_attachment};

const MAIL_CMD_QUEUE_CAPACITY: usize = 256;
const MAIL_EVENT_QUEUE_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MailSettings {
    pub inbox_query: String,
    pub inbox_max_results: usize,
    pub search_max_results: usize,
    pub label_max_results: usize,
    pub downloads_dir: PathBuf,
}

impl Default for MailSettings {
    fn default() -> Self {
        Self {
            inbox_query: DEFAULT_INBOX_QUERY.to_string(),
            inbox_max_results: DEFAULT_INBOX_MAX_RESULTS,
            search_max_results: DEFAULT_SEARCH_MAX_RESULTS,
            label_max_results: DEFAULT_LABEL_MAX_RESULTS,
            downloads_dir: PathBuf::from(DEFAULT_DOWNLOADS_DIR),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListSource {
    Inbox,
    Search(String),
    Label { id: String, name: String },
}

#[derive(Debug, Clone)]
pub enum MailCommand {
    LoadList(ListSource),
    LoadMessage {
        id: String,
    },
    LoadLabels,
    Send {
        draft: Draft,
        kind: DraftKind,
    },
    Trash {
        id: String,
    },
    SetUnread {
        id: String,
        unread: bool,
    },
    ApplyLabel {
        id: String,
        label: Label,
    },
    DownloadAttachment(AttachmentRef),
    CheckAttachment {
        path: PathBuf,
        kind: DraftKind,
    },
}

impl MailCommand {
    /// List and message fetches hold the session in its loading state.
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            MailCommand::LoadList(_) | MailCommand::LoadMessage { .. } | MailCommand::LoadLabels
        )
    }

    fn name(&self) -> &'static str {
        match self {
            MailCommand::LoadList(_) => "load-list",
            MailCommand::LoadMessage { .. } => "load-message",
            MailCommand::LoadLabels => "load-labels",
            MailCommand::Send { .. } => "send",
            MailCommand::Trash { .. } => "trash",
            MailCommand::SetUnread { .. } => "set-unread",
            MailCommand::ApplyLabel { .. } => "apply-label",
            MailCommand::DownloadAttachment(_) => "download-attachment",
            MailCommand::CheckAttachment { .. } => "check-attachment",
        }
    }
}

#[derive(Debug, Clone)]
pub enum MailEvent {
    ListLoaded {
        source: ListSource,
        messages: Vec<MessageSummary>,
    },
    MessageLoaded(Box<MessageDetail>),
    LabelsLoaded(Vec<Label>),
    Sent {
        kind: DraftKind,
    },
    Trashed {
        id: String,
    },
    ReadStateChanged {
        id: String,
        unread: bool,
    },
    LabelApplied {
        id: String,
        label: Label,
    },
    AttachmentSaved {
        path: PathBuf,
    },
    AttachmentChecked {
        kind: DraftKind,
        path: PathBuf,
    },
    Failed {
        context: FailureContext,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureContext {
    LoadList(ListSource),
    LoadMessage { id: String },
    LoadLabels,
    Send { kind: DraftKind },
    Trash { id: String },
    SetUnread { id: String, unread: bool },
    ApplyLabel { label: String },
    Download { filename: String },
    CheckAttachment { kind: DraftKind, path: PathBuf },
}

impl FailureContext {
    pub fn is_loading(&self) -> bool {
        matches!(
            self,
            FailureContext::LoadList(_)
                | FailureContext::LoadMessage { .. }
                | FailureContext::LoadLabels
        )
    }
}

#[derive(Clone)]
pub struct MailEngine {
    tx: mpsc::Sender<MailCommand>,
}

impl MailEngine {
    /// Spawns the dispatcher on the current tokio runtime. Every command runs
    /// on its own task and produces exactly one event.
    pub fn start(
        service: Arc<dyn MailService>,
        settings: MailSettings,
    ) -> (Self, mpsc::Receiver<MailEvent>) {
        let (cmd_tx, mut cmd_rx) = mpsc::channel::<MailCommand>(MAIL_CMD_QUEUE_CAPACITY);
        let (evt_tx, evt_rx) = mpsc::channel::<MailEvent>(MAIL_EVENT_QUEUE_CAPACITY);
        let settings = Arc::new(settings);

        tokio::spawn(async move {
            while let Some(cmd) = cmd_rx.recv().await {
                debug!("mail cmd dispatch: {}", cmd.name());
                let service = service.clone();
                let settings = settings.clone();
                let tx = evt_tx.clone();
                tokio::spawn(async move {
                    let event = run_command(service.as_ref(), &settings, cmd).await;
                    if tx.send(event).await.is_err() {
                        debug!("mail event dropped, receiver closed");
                    }
                });
            }
        });

        (Self { tx: cmd_tx }, evt_rx)
    }

    /// An engine that executes nothing; issued commands land in the returned
    /// receiver.
    pub fn detached(capacity: usize) -> (Self, mpsc::Receiver<MailCommand>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn send(&self, cmd: MailCommand) -> Result<()> {
        match self.tx.try_send(cmd) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(cmd)) => {
                warn!("mail cmd queue full, dropping: {}", cmd.name());
                Err(anyhow!("mail command queue full"))
            }
            Err(TrySendError::Closed(_)) => Err(anyhow!("mail command queue closed")),
        }
    }
}

pub async fn run_command(
    service: &dyn MailService,
    settings: &MailSettings,
    cmd: MailCommand,
) -> MailEvent {
    match cmd {
        MailCommand::LoadList(source) => match load_list(service, settings, &source).await {
            Ok(messages) => MailEvent::ListLoaded { source, messages },
            Err(err) => failed(FailureContext::LoadList(source), err),
        },
        MailCommand::LoadMessage { id } => {
            match service.get_message(&id, MessageFormat::Full).await {
                Ok(message) => MailEvent::MessageLoaded(Box::new(decode_detail(&message))),
                Err(err) => failed(FailureContext::LoadMessage { id }, err),
            }
        }
        MailCommand::LoadLabels => match service.list_labels().await {
            Ok(labels) => MailEvent::LabelsLoaded(labels),
            Err(err) => failed(FailureContext::LoadLabels, err),
        },
        MailCommand::Send { draft, kind } => match send_draft(service, draft).await {
            Ok(()) => MailEvent::Sent { kind },
            Err(err) => failed(FailureContext::Send { kind }, err),
        },
        MailCommand::Trash { id } => match service.trash(&id).await {
            Ok(()) => MailEvent::Trashed { id },
            Err(err) => failed(FailureContext::Trash { id }, err),
        },
        MailCommand::SetUnread { id, unread } => {
            let labels = vec![UNREAD_LABEL.to_string()];
            let (add, remove) = if unread {
                (labels, Vec::new())
            } else {
                (Vec::new(), labels)
            };
            match service.modify_labels(&id, &add, &remove).await {
                Ok(()) => MailEvent::ReadStateChanged { id, unread },
                Err(err) => failed(FailureContext::SetUnread { id, unread }, err),
            }
        }
        MailCommand::ApplyLabel { id, label } => {
            match service
                .modify_labels(&id, std::slice::from_ref(&label.id), &[])
                .await
            {
                Ok(()) => MailEvent::LabelApplied { id, label },
                Err(err) => failed(FailureContext::ApplyLabel { label: label.name }, err),
            }
        }
        MailCommand::DownloadAttachment(attachment) => {
            match download_attachment(service, &attachment, &settings.downloads_dir).await {
                Ok(path) => MailEvent::AttachmentSaved { path },
                Err(err) => {
                    warn!("attachment {} failed: {}", attachment.filename, err);
                    MailEvent::Failed {
                        context: FailureContext::Download {
                            filename: attachment.filename,
                        },
                        reason: err.to_string(),
                    }
                }
            }
        }
        MailCommand::CheckAttachment { path, kind } => {
            let probe = path.clone();
            let checked = tokio::task::spawn_blocking(move || check_attachment(&probe)).await;
            match checked {
                Ok(Ok(_)) => MailEvent::AttachmentChecked { kind, path },
                Ok(Err(err)) => MailEvent::Failed {
                    context: FailureContext::CheckAttachment { kind, path },
                    reason: err.to_string(),
                },
                Err(err) => failed(
                    FailureContext::CheckAttachment { kind, path },
                    anyhow!("attachment check task failed: {err}"),
                ),
            }
        }
    }
}

/// Ids first, then one metadata fetch per id. A message that fails to fetch
/// is skipped rather than failing the whole list.
async fn load_list(
    service: &dyn MailService,
    settings: &MailSettings,
    source: &ListSource,
) -> Result<Vec<MessageSummary>> {
    let refs = match source {
        ListSource::Inbox => {
            service
                .list_messages(&settings.inbox_query, settings.inbox_max_results)
                .await?
        }
        ListSource::Search(query) => {
            service
                .list_messages(query, settings.search_max_results)
                .await?
        }
        ListSource::Label { id, .. } => {
            service
                .list_messages_by_label(id, settings.label_max_results)
                .await?
        }
    };

    let mut messages = Vec::with_capacity(refs.len());
    for message_ref in refs {
        match service
            .get_message(&message_ref.id, MessageFormat::Minimal)
            .await
        {
            Ok(message) => messages.push(summarize(&message)),
            Err(err) => warn!("skipping message {}: {:#}", message_ref.id, err),
        }
    }
    Ok(messages)
}

async fn send_draft(service: &dyn MailService, draft: Draft) -> Result<()> {
    let raw = tokio::task::spawn_blocking(move || encode_draft(&draft))
        .await
        .map_err(|err| anyhow!("encode task failed: {err}"))??;
    service.send_raw(&to_transport(&raw)).await
}

fn failed(context: FailureContext, err: anyhow::Error) -> MailEvent {
    warn!("mail cmd failed ({:?}): {:#}", context, err);
    MailEvent::Failed {
        context,
        reason: format!("{err:#}"),
    }
}

#[cfg(test)]
mod tests {
    use std::fs::File;
    use std::sync::Arc;

    use base64::Engine;
    use base64::engine::general_purpose::URL_SAFE;
    use ratgmail_core::{BodyText, MAX_ATTACHMENT_BYTES};

    use super::*;
    use crate::fake::{FakeService, wire_message};

    fn settings(dir: &std::path::Path) -> MailSettings {
        MailSettings {
            downloads_dir: dir.join("downloads"),
            ..MailSettings::default()
        }
    }

    #[test]
    fn send_returns_error_when_queue_is_full() {
        let (engine, _rx) = MailEngine::detached(1);
        engine.send(MailCommand::LoadLabels).unwrap();

        let err = engine.send(MailCommand::LoadLabels).unwrap_err();
        assert!(err.to_string().contains("queue full"));
    }

    #[test]
    fn send_returns_error_when_queue_is_closed() {
        let (engine, rx) = MailEngine::detached(1);
        drop(rx);

        let err = engine.send(MailCommand::LoadLabels).unwrap_err();
        assert!(err.to_string().contains("queue closed"));
    }

    #[test]
    fn only_fetches_are_loading_class() {
        assert!(MailCommand::LoadLabels.is_loading());
        assert!(MailCommand::LoadList(ListSource::Inbox).is_loading());
        assert!(!MailCommand::Trash { id: "x".into() }.is_loading());
        assert!(
            !MailCommand::Send {
                draft: Draft::default(),
                kind: DraftKind::Compose
            }
            .is_loading()
        );
    }

    #[tokio::test]
    async fn inbox_list_uses_configured_query_and_skips_broken_messages() {
        let service = FakeService::new()
            .with_message(wire_message("m1", "First", &["INBOX", "UNREAD"]))
            .with_message(wire_message("m3", "Third", &["INBOX"]))
            .with_listing(&["m1", "m2", "m3"]);
        let dir = tempfile::tempdir().unwrap();

        let event = run_command(
            &service,
            &settings(dir.path()),
            MailCommand::LoadList(ListSource::Inbox),
        )
        .await;

        let MailEvent::ListLoaded { source, messages } = event else {
            panic!("unexpected event {event:?}");
        };
        assert_eq!(source, ListSource::Inbox);
        let ids: Vec<_> = messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["m1", "m3"]);
        assert!(messages[0].unread);
        assert!(
            service
                .calls()
                .contains(&"list:in:inbox category:primary:10".to_string())
        );
        assert!(service.calls().contains(&"get:m1:minimal".to_string()));
    }

    #[tokio::test]
    async fn search_and_label_lists_use_their_limits() {
        let service = FakeService::new().with_listing(&[]);
        let dir = tempfile::tempdir().unwrap();
        let settings = settings(dir.path());

        run_command(
            &service,
            &settings,
            MailCommand::LoadList(ListSource::Search("from:bob".into())),
        )
        .await;
        run_command(
            &service,
            &settings,
            MailCommand::LoadList(ListSource::Label {
                id: "Label_7".into(),
                name: "Work".into(),
            }),
        )
        .await;

        let calls = service.calls();
        assert!(calls.contains(&"list:from:bob:30".to_string()));
        assert!(calls.contains(&"list-label:Label_7:10".to_string()));
    }

    #[tokio::test]
    async fn list_failure_reports_its_source() {
        let service = FakeService::new().failing("list");
        let dir = tempfile::tempdir().unwrap();

        let event = run_command(
            &service,
            &settings(dir.path()),
            MailCommand::LoadList(ListSource::Search("budget".into())),
        )
        .await;

        match event {
            MailEvent::Failed { context, reason } => {
                assert_eq!(
                    context,
                    FailureContext::LoadList(ListSource::Search("budget".into()))
                );
                assert!(reason.contains("list unavailable"));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn full_message_is_decoded() {
        let service = FakeService::new().with_message(wire_message("m1", "Hello", &["INBOX"]));
        let dir = tempfile::tempdir().unwrap();

        let event = run_command(
            &service,
            &settings(dir.path()),
            MailCommand::LoadMessage { id: "m1".into() },
        )
        .await;

        let MailEvent::MessageLoaded(detail) = event else {
            panic!("unexpected event {event:?}");
        };
        assert_eq!(detail.summary.subject, "Hello");
        assert_eq!(detail.body, BodyText::Plain("body of m1".into()));
        assert!(service.calls().contains(&"get:m1:full".to_string()));
    }

    #[tokio::test]
    async fn oversized_attachment_never_reaches_the_service() {
        let service = FakeService::new();
        let dir = tempfile::tempdir().unwrap();
        let big = dir.path().join("backup.tar");
        File::create(&big)
            .unwrap()
            .set_len(MAX_ATTACHMENT_BYTES + 1)
            .unwrap();
        let draft = Draft {
            to: "bob@example.com".into(),
            subject: "Backup".into(),
            attachments: vec![big],
            ..Draft::default()
        };

        let event = run_command(
            &service,
            &settings(dir.path()),
            MailCommand::Send {
                draft,
                kind: DraftKind::Compose,
            },
        )
        .await;

        match event {
            MailEvent::Failed { context, reason } => {
                assert_eq!(
                    context,
                    FailureContext::Send {
                        kind: DraftKind::Compose
                    }
                );
                assert!(reason.contains("backup.tar"));
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(service.sent().is_empty());
    }

    #[tokio::test]
    async fn send_transmits_url_safe_message() {
        let service = FakeService::new();
        let dir = tempfile::tempdir().unwrap();
        let draft = Draft {
            from: "me".into(),
            to: "bob@example.com".into(),
            subject: "Hi".into(),
            body: "Hello Bob".into(),
            ..Draft::default()
        };

        let event = run_command(
            &service,
            &settings(dir.path()),
            MailCommand::Send {
                draft,
                kind: DraftKind::Reply,
            },
        )
        .await;

        assert!(matches!(
            event,
            MailEvent::Sent {
                kind: DraftKind::Reply
            }
        ));
        let sent = service.sent();
        assert_eq!(sent.len(), 1);
        let raw = String::from_utf8(URL_SAFE.decode(&sent[0]).unwrap()).unwrap();
        assert!(raw.starts_with("To: bob@example.com\r\nSubject: Hi\r\n"));
        assert!(raw.contains("\r\n\r\nHello Bob\r\n"));
    }

    #[tokio::test]
    async fn marking_read_removes_unread_label() {
        let service = FakeService::new();
        let dir = tempfile::tempdir().unwrap();

        let event = run_command(
            &service,
            &settings(dir.path()),
            MailCommand::SetUnread {
                id: "m1".into(),
                unread: false,
            },
        )
        .await;

        assert!(matches!(event, MailEvent::ReadStateChanged { unread: false, .. }));
        assert_eq!(service.calls(), vec!["modify:m1:+[]:-[UNREAD]".to_string()]);
    }

    #[tokio::test]
    async fn missing_attachment_path_fails_check() {
        let service = FakeService::new();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.pdf");

        let event = run_command(
            &service,
            &settings(dir.path()),
            MailCommand::CheckAttachment {
                path: path.clone(),
                kind: DraftKind::Compose,
            },
        )
        .await;

        match event {
            MailEvent::Failed { reason, .. } => {
                assert_eq!(reason, format!("File not found: {}", path.display()));
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn engine_delivers_one_event_per_command() {
        let service = Arc::new(FakeService::new());
        let dir = tempfile::tempdir().unwrap();
        let (engine, mut events) = MailEngine::start(service, settings(dir.path()));

        engine.send(MailCommand::LoadLabels).unwrap();
        engine.send(MailCommand::Trash { id: "m9".into() }).unwrap();

        let mut seen = Vec::new();
        for _ in 0..2 {
            match events.recv().await {
                Some(MailEvent::LabelsLoaded(labels)) => seen.push(format!("labels:{}", labels.len())),
                Some(MailEvent::Trashed { id }) => seen.push(format!("trashed:{id}")),
                other => panic!("unexpected event {other:?}"),
            }
        }
        seen.sort();
        assert_eq!(seen, vec!["labels:2".to_string(), "trashed:m9".to_string()]);
    }
}
