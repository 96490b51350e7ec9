//! Gmail API HTTP client. Requests are blocking (ureq) and run on tokio's
//! blocking pool when called through `MailService`.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use log::debug;
use serde::Serialize;
use serde::de::DeserializeOwned;
use ureq::Agent;

use ratgmail_core::{Label, MailService, MessageFormat, MessageRef, WireMessage};

use super::GmailAuth;
use super::api::{
    AttachmentResponse, ListLabelsResponse, ListMessagesResponse, ModifyRequest, SendRequest,
};

const HTTP_TIMEOUT: Duration = Duration::from_secs(60);

/// Headers requested for list rows.
const SUMMARY_HEADERS: [&str; 3] = ["Subject", "From", "Date"];

#[derive(Clone)]
pub struct GmailClient {
    auth: GmailAuth,
    agent: Agent,
}

impl GmailClient {
    const BASE_URL: &'static str = "https://gmail.googleapis.com/gmail/v1/users/me";

    pub fn new(auth: GmailAuth) -> Self {
        let agent: Agent = Agent::config_builder()
            .timeout_global(Some(HTTP_TIMEOUT))
            .build()
            .into();
        Self { auth, agent }
    }

    pub fn list_refs(&self, url: &str) -> Result<Vec<MessageRef>> {
        let list: ListMessagesResponse = self.get_json(url, "list messages")?;
        debug!(
            "gmail list: {} refs (estimate {:?})",
            list.messages.as_ref().map_or(0, Vec::len),
            list.result_size_estimate
        );
        Ok(list.messages.unwrap_or_default())
    }

    pub fn fetch_message(&self, id: &str, format: MessageFormat) -> Result<WireMessage> {
        self.get_json(&message_url(id, format), "get message")
    }

    pub fn fetch_labels(&self) -> Result<Vec<Label>> {
        let url = format!("{}/labels", Self::BASE_URL);
        let labels: ListLabelsResponse = self.get_json(&url, "list labels")?;
        Ok(labels.labels.unwrap_or_default())
    }

    pub fn fetch_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String> {
        let url = format!(
            "{}/messages/{}/attachments/{}",
            Self::BASE_URL,
            urlencoding::encode(message_id),
            urlencoding::encode(attachment_id)
        );
        let attachment: AttachmentResponse = self.get_json(&url, "get attachment")?;
        Ok(attachment.data)
    }

    pub fn post_send(&self, raw: String) -> Result<()> {
        let url = format!("{}/messages/send", Self::BASE_URL);
        self.post_json(&url, &SendRequest { raw }, "send message")
    }

    pub fn post_trash(&self, id: &str) -> Result<()> {
        let url = format!(
            "{}/messages/{}/trash",
            Self::BASE_URL,
            urlencoding::encode(id)
        );
        let token = self.auth.access_token()?;
        self.agent
            .post(&url)
            .header("Authorization", &format!("Bearer {}", token))
            .send_empty()
            .context("Failed to trash message")?;
        Ok(())
    }

    pub fn post_modify(&self, id: &str, add: Vec<String>, remove: Vec<String>) -> Result<()> {
        let url = format!(
            "{}/messages/{}/modify",
            Self::BASE_URL,
            urlencoding::encode(id)
        );
        let body = ModifyRequest {
            add_label_ids: add,
            remove_label_ids: remove,
        };
        self.post_json(&url, &body, "modify labels")
    }

    fn get_json<T: DeserializeOwned>(&self, url: &str, what: &str) -> Result<T> {
        let token = self.auth.access_token()?;
        let mut response = self
            .agent
            .get(url)
            .header("Authorization", &format!("Bearer {}", token))
            .call()
            .with_context(|| format!("Failed to {what}"))?;
        response
            .body_mut()
            .read_json()
            .with_context(|| format!("Failed to parse {what} response"))
    }

    fn post_json<B: Serialize>(&self, url: &str, body: &B, what: &str) -> Result<()> {
        let token = self.auth.access_token()?;
        self.agent
            .post(url)
            .header("Authorization", &format!("Bearer {}", token))
            .send_json(body)
            .with_context(|| format!("Failed to {what}"))?;
        Ok(())
    }
}

fn list_url(query: &str, max_results: usize) -> String {
    format!(
        "{}/messages?q={}&maxResults={}",
        GmailClient::BASE_URL,
        urlencoding::encode(query),
        max_results
    )
}

fn label_list_url(label_id: &str, max_results: usize) -> String {
    format!(
        "{}/messages?labelIds={}&maxResults={}",
        GmailClient::BASE_URL,
        urlencoding::encode(label_id),
        max_results
    )
}

fn message_url(id: &str, format: MessageFormat) -> String {
    let mut url = format!("{}/messages/{}", GmailClient::BASE_URL, urlencoding::encode(id));
    match format {
        MessageFormat::Full => url.push_str("?format=full"),
        MessageFormat::Minimal => {
            url.push_str("?format=metadata");
            for header in SUMMARY_HEADERS {
                url.push_str("&metadataHeaders=");
                url.push_str(header);
            }
        }
    }
    url
}

async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|err| anyhow!("gmail request task failed: {err}"))?
}

#[async_trait]
impl MailService for GmailClient {
    async fn list_messages(&self, query: &str, max_results: usize) -> Result<Vec<MessageRef>> {
        let client = self.clone();
        let url = list_url(query, max_results);
        blocking(move || client.list_refs(&url)).await
    }

    async fn list_messages_by_label(
        &self,
        label_id: &str,
        max_results: usize,
    ) -> Result<Vec<MessageRef>> {
        let client = self.clone();
        let url = label_list_url(label_id, max_results);
        blocking(move || client.list_refs(&url)).await
    }

    async fn get_message(&self, id: &str, format: MessageFormat) -> Result<WireMessage> {
        let client = self.clone();
        let id = id.to_string();
        blocking(move || client.fetch_message(&id, format)).await
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        let client = self.clone();
        blocking(move || client.fetch_labels()).await
    }

    async fn send_raw(&self, raw: &str) -> Result<()> {
        let client = self.clone();
        let raw = raw.to_string();
        blocking(move || client.post_send(raw)).await
    }

    async fn trash(&self, id: &str) -> Result<()> {
        let client = self.clone();
        let id = id.to_string();
        blocking(move || client.post_trash(&id)).await
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        let client = self.clone();
        let id = id.to_string();
        let (add, remove) = (add.to_vec(), remove.to_vec());
        blocking(move || client.post_modify(&id, add, remove)).await
    }

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String> {
        let client = self.clone();
        let (message_id, attachment_id) = (message_id.to_string(), attachment_id.to_string());
        blocking(move || client.fetch_attachment(&message_id, &attachment_id)).await
    }
}
