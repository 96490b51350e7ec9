use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

mod wire;

pub use wire::{Header, MessageRef, WireBody, WireMessage, WirePart};

pub const UNREAD_LABEL: &str = "UNREAD";
pub const MAX_ATTACHMENT_BYTES: u64 = 25 * 1024 * 1024;
pub const SNIPPET_MAX_CHARS: usize = 80;
pub const DEFAULT_FROM: &str = "me";
pub const DEFAULT_INBOX_QUERY: &str = "in:inbox category:primary";
pub const DEFAULT_INBOX_MAX_RESULTS: usize = 10;
pub const DEFAULT_SEARCH_MAX_RESULTS: usize = 30;
pub const DEFAULT_LABEL_MAX_RESULTS: usize = 10;
pub const DEFAULT_DOWNLOADS_DIR: &str = "downloads";

pub const NO_TEXT_CONTENT: &str = "(no text content found)";
pub const DECODE_FAILED_TEXT: &str = "Failed to decode body.";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSummary {
    pub id: String,
    pub thread_id: String,
    pub subject: String,
    pub from: String,
    pub snippet: String,
    pub date: String,
    pub unread: bool,
    pub label_ids: Vec<String>,
}

/// Outcome of body extraction. Fallbacks are distinct variants so callers
/// and tests can tell a degraded body from a decoded one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BodyText {
    Plain(String),
    /// Text recovered from an HTML part (tags stripped, entities decoded).
    Html(String),
    DecodeFailed,
    #[default]
    Missing,
}

impl BodyText {
    pub fn display(&self) -> &str {
        match self {
            BodyText::Plain(text) | BodyText::Html(text) => text,
            BodyText::DecodeFailed => DECODE_FAILED_TEXT,
            BodyText::Missing => NO_TEXT_CONTENT,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, BodyText::DecodeFailed | BodyText::Missing)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentRef {
    pub filename: String,
    pub mime: String,
    pub size: u64,
    pub attachment_id: String,
    pub message_id: String,
    /// Small parts sometimes arrive inline instead of behind an attachment id.
    pub inline_data: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageDetail {
    pub summary: MessageSummary,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub body: BodyText,
    pub attachments: Vec<AttachmentRef>,
}

impl MessageDetail {
    pub fn id(&self) -> &str {
        &self.summary.id
    }

    pub fn body_text(&self) -> &str {
        self.body.display()
    }

    /// 1-based lookup, the key used by the attachment picker.
    pub fn attachment(&self, number: usize) -> Option<&AttachmentRef> {
        number
            .checked_sub(1)
            .and_then(|idx| self.attachments.get(idx))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DraftKind {
    Compose,
    Reply,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Draft {
    pub from: String,
    pub to: String,
    pub cc: String,
    pub bcc: String,
    pub subject: String,
    pub body: String,
    pub attachments: Vec<PathBuf>,
}

impl Draft {
    pub fn push_attachment(&mut self, path: PathBuf) {
        self.attachments.push(path);
    }

    pub fn pop_attachment(&mut self) -> Option<PathBuf> {
        self.attachments.pop()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageFormat {
    /// Headers and labels only, enough for a list row.
    Minimal,
    Full,
}

#[async_trait]
pub trait MailService: Send + Sync {
    async fn list_messages(&self, query: &str, max_results: usize) -> Result<Vec<MessageRef>>;
    async fn list_messages_by_label(
        &self,
        label_id: &str,
        max_results: usize,
    ) -> Result<Vec<MessageRef>>;
    async fn get_message(&self, id: &str, format: MessageFormat) -> Result<WireMessage>;
    async fn list_labels(&self) -> Result<Vec<Label>>;
    /// `raw` is the whole RFC 822 message, URL-safe base64 encoded.
    async fn send_raw(&self, raw: &str) -> Result<()>;
    async fn trash(&self, id: &str) -> Result<()>;
    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()>;
    /// Returns the attachment payload as the service encodes it (URL-safe base64).
    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String>;
}

pub trait Authenticator {
    fn authorize(&self) -> Result<Arc<dyn MailService>>;
}
