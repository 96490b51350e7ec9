use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use ratgmail_core::{
    Header, Label, MailService, MessageFormat, MessageRef, WireBody, WireMessage, WirePart,
};

/// Recording service for engine and transfer tests.
#[derive(Default)]
pub struct FakeService {
    messages: HashMap<String, WireMessage>,
    listing: Vec<String>,
    attachments: HashMap<String, String>,
    failing: Vec<&'static str>,
    calls: Mutex<Vec<String>>,
    sent: Mutex<Vec<String>>,
}

impl FakeService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_message(mut self, message: WireMessage) -> Self {
        self.messages.insert(message.id.clone(), message);
        self
    }

    pub fn with_listing(mut self, ids: &[&str]) -> Self {
        self.listing = ids.iter().map(|id| id.to_string()).collect();
        self
    }

    pub fn with_attachment(mut self, attachment_id: &str, data: &[u8]) -> Self {
        self.attachments
            .insert(attachment_id.to_string(), URL_SAFE_NO_PAD.encode(data));
        self
    }

    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.push(op);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    fn record(&self, op: &'static str, call: String) -> Result<()> {
        self.calls.lock().unwrap().push(call);
        if self.failing.contains(&op) {
            return Err(anyhow!("{op} unavailable"));
        }
        Ok(())
    }

    fn refs(&self, max_results: usize) -> Vec<MessageRef> {
        self.listing
            .iter()
            .take(max_results)
            .map(|id| MessageRef {
                id: id.clone(),
                thread_id: id.clone(),
            })
            .collect()
    }
}

#[async_trait]
impl MailService for FakeService {
    async fn list_messages(&self, query: &str, max_results: usize) -> Result<Vec<MessageRef>> {
        self.record("list", format!("list:{query}:{max_results}"))?;
        Ok(self.refs(max_results))
    }

    async fn list_messages_by_label(
        &self,
        label_id: &str,
        max_results: usize,
    ) -> Result<Vec<MessageRef>> {
        self.record("list", format!("list-label:{label_id}:{max_results}"))?;
        Ok(self.refs(max_results))
    }

    async fn get_message(&self, id: &str, format: MessageFormat) -> Result<WireMessage> {
        let format_name = match format {
            MessageFormat::Minimal => "minimal",
            MessageFormat::Full => "full",
        };
        self.record("get", format!("get:{id}:{format_name}"))?;
        self.messages
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("no such message: {id}"))
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        self.record("labels", "labels".to_string())?;
        Ok(vec![
            Label {
                id: "INBOX".into(),
                name: "INBOX".into(),
            },
            Label {
                id: "Label_1".into(),
                name: "Work".into(),
            },
        ])
    }

    async fn send_raw(&self, raw: &str) -> Result<()> {
        self.record("send", "send".to_string())?;
        self.sent.lock().unwrap().push(raw.to_string());
        Ok(())
    }

    async fn trash(&self, id: &str) -> Result<()> {
        self.record("trash", format!("trash:{id}"))
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        self.record(
            "modify",
            format!("modify:{id}:+[{}]:-[{}]", add.join(","), remove.join(",")),
        )
    }

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String> {
        self.record("attachment", format!("attachment:{message_id}:{attachment_id}"))?;
        self.attachments
            .get(attachment_id)
            .cloned()
            .ok_or_else(|| anyhow!("no such attachment: {attachment_id}"))
    }
}

/// Single-part plain message whose body reads `body of <id>`.
pub fn wire_message(id: &str, subject: &str, labels: &[&str]) -> WireMessage {
    WireMessage {
        id: id.to_string(),
        thread_id: id.to_string(),
        label_ids: labels.iter().map(|l| l.to_string()).collect(),
        snippet: format!("snippet of {id}"),
        payload: Some(WirePart {
            mime_type: "text/plain".into(),
            headers: vec![
                Header::new("From", "Alice <alice@example.com>"),
                Header::new("Subject", subject),
                Header::new("Date", "Tue, 14 Mar 2023 09:05:00 +0000"),
            ],
            body: Some(WireBody {
                size: 0,
                data: Some(URL_SAFE_NO_PAD.encode(format!("body of {id}"))),
                attachment_id: None,
            }),
            ..Default::default()
        }),
    }
}
