//! In-memory mailbox behind `--demo`. Messages are stored
//! as RFC 822 text run through the same wire conversion a real fetch would
//! produce, so every decode path is exercised without a network.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use log::debug;

use ratgmail_content::{decode_attachment_data, wire_from_raw};
use ratgmail_core::{
    Header, Label, MailService, MessageFormat, MessageRef, UNREAD_LABEL, WireMessage, WirePart,
};

const DEMO_ADDRESS: &str = "me@demo.local";
const SUMMARY_HEADERS: [&str; 3] = ["Subject", "From", "Date"];

const SEED_LABELS: [(&str, &str); 7] = [
    ("INBOX", "INBOX"),
    ("SENT", "SENT"),
    ("TRASH", "TRASH"),
    ("UNREAD", "UNREAD"),
    ("Label_1", "Work"),
    ("Label_2", "Newsletters"),
    ("Label_3", "Travel"),
];

const SEED_MESSAGES: [(&str, &[&str]); 5] = [
    (
        "From: Travel Desk <trips@example.com>\n\
         To: me@demo.local\n\
         Subject: Your itinerary for Lisbon\n\
         Date: Mon, 13 Mar 2023 07:30:00 +0000\n\
         Content-Type: text/plain; charset=utf-8\n\
         \n\
         Flight TP1351 departs 09:40 from Terminal 1.\n\
         Hotel check-in opens at 15:00.\n",
        &["Label_3"],
    ),
    (
        "From: Sam Rivera <sam@example.com>\n\
         To: me@demo.local\n\
         Subject: Lunch on Friday?\n\
         Date: Tue, 14 Mar 2023 09:05:00 +0000\n\
         Content-Type: text/plain; charset=utf-8\n\
         \n\
         Hey,\n\
         \n\
         Are you free for lunch on Friday? The new ramen place opened.\n\
         \n\
         Sam\n",
        &["INBOX"],
    ),
    (
        "From: The Weekly Byte <news@example.org>\n\
         To: me@demo.local\n\
         Subject: This week in terminals\n\
         Date: Wed, 15 Mar 2023 18:00:00 +0000\n\
         Content-Type: text/html; charset=utf-8\n\
         \n\
         <html><body><h1>This week</h1><p>Terminal UIs are back &amp; better than ever.</p>\
         <p>Read more&hellip;</p></body></html>\n",
        &["INBOX", "UNREAD", "Label_2"],
    ),
    (
        "From: Alice Chen <alice@example.com>\n\
         To: me@demo.local\n\
         Cc: finance@example.com\n\
         Subject: Q3 budget review\n\
         Date: Thu, 16 Mar 2023 10:15:00 +0100\n\
         MIME-Version: 1.0\n\
         Content-Type: multipart/mixed; boundary=\"seed-boundary\"\n\
         \n\
         --seed-boundary\n\
         Content-Type: text/plain; charset=utf-8\n\
         \n\
         Hi,\n\
         \n\
         Agenda and the regional totals are attached. Let me know before Friday.\n\
         \n\
         Alice\n\
         --seed-boundary\n\
         Content-Type: text/plain; name=\"agenda.txt\"\n\
         Content-Disposition: attachment; filename=\"agenda.txt\"\n\
         Content-Transfer-Encoding: base64\n\
         \n\
         QWdlbmRhCi0gYnVkZ2V0IHJldmlldwotIGhpcmluZyBwbGFuCg==\n\
         --seed-boundary\n\
         Content-Type: text/csv; name=\"totals.csv\"\n\
         Content-Disposition: attachment; filename=\"totals.csv\"\n\
         Content-Transfer-Encoding: base64\n\
         \n\
         cmVnaW9uLHRvdGFsCm5vcnRoLDEyCnNvdXRoLDkK\n\
         --seed-boundary--\n",
        &["INBOX", "UNREAD", "Label_1"],
    ),
    (
        "From: Ops Bot <ops@example.com>\n\
         To: me@demo.local\n\
         Subject: Deploy finished\n\
         Date: Fri, 17 Mar 2023 16:45:00 -0500\n\
         MIME-Version: 1.0\n\
         Content-Type: multipart/alternative; boundary=\"alt\"\n\
         \n\
         --alt\n\
         Content-Type: text/plain; charset=utf-8\n\
         \n\
         Release 2.4.1 is live on all regions.\n\
         --alt\n\
         Content-Type: text/html; charset=utf-8\n\
         \n\
         <p>Release <b>2.4.1</b> is live on all regions.</p>\n\
         --alt--\n",
        &["INBOX", "Label_1"],
    ),
];

#[derive(Default)]
struct Mailbox {
    /// Oldest first.
    messages: Vec<WireMessage>,
    attachments: HashMap<String, Vec<u8>>,
    labels: Vec<Label>,
    next_id: u64,
}

impl Mailbox {
    fn insert_raw(&mut self, raw: &[u8], label_ids: &[&str]) -> Result<String> {
        self.next_id += 1;
        let id = format!("demo-{:04}", self.next_id);
        let parsed = wire_from_raw(&id, raw)?;
        let mut message = parsed.message;
        message.label_ids = label_ids.iter().map(|label| label.to_string()).collect();
        self.attachments.extend(parsed.attachments);
        self.messages.push(message);
        Ok(id)
    }

    fn find_mut(&mut self, id: &str) -> Result<&mut WireMessage> {
        self.messages
            .iter_mut()
            .find(|m| m.id == id)
            .with_context(|| format!("no such message: {id}"))
    }

    fn newest_matching(
        &self,
        max_results: usize,
        keep: impl Fn(&WireMessage) -> bool,
    ) -> Vec<MessageRef> {
        self.messages
            .iter()
            .rev()
            .filter(|m| keep(m))
            .take(max_results)
            .map(|m| MessageRef {
                id: m.id.clone(),
                thread_id: m.thread_id.clone(),
            })
            .collect()
    }
}

pub struct DemoMailService {
    mailbox: Mutex<Mailbox>,
}

impl DemoMailService {
    pub fn seeded() -> Result<Self> {
        let mut mailbox = Mailbox {
            labels: SEED_LABELS
                .iter()
                .map(|(id, name)| Label {
                    id: id.to_string(),
                    name: name.to_string(),
                })
                .collect(),
            ..Mailbox::default()
        };
        for (raw, labels) in SEED_MESSAGES {
            mailbox.insert_raw(raw.as_bytes(), labels)?;
        }
        Ok(Self {
            mailbox: Mutex::new(mailbox),
        })
    }

    fn with_mailbox<T>(&self, f: impl FnOnce(&mut Mailbox) -> Result<T>) -> Result<T> {
        let mut mailbox = self
            .mailbox
            .lock()
            .map_err(|_| anyhow!("demo mailbox lock poisoned"))?;
        f(&mut mailbox)
    }
}

fn has_label(message: &WireMessage, label: &str) -> bool {
    message.label_ids.iter().any(|l| l.eq_ignore_ascii_case(label))
}

fn header_contains(message: &WireMessage, name: &str, needle: &str) -> bool {
    message
        .payload
        .as_ref()
        .and_then(|p| p.header(name))
        .is_some_and(|value| value.to_lowercase().contains(needle))
}

/// A small subset of Gmail search: `in:`, `is:read`, `is:unread`, `from:`,
/// `subject:` and bare words. Other operators match everything.
fn matches_query(message: &WireMessage, query: &str) -> bool {
    let query = query.to_lowercase();
    if !query.contains("in:trash") && has_label(message, "TRASH") {
        return false;
    }
    query.split_whitespace().all(|term| match term.split_once(':') {
        Some(("in", mailbox)) => has_label(message, mailbox),
        Some(("is", "unread")) => has_label(message, UNREAD_LABEL),
        Some(("is", "read")) => !has_label(message, UNREAD_LABEL),
        Some(("from", who)) => header_contains(message, "From", who),
        Some(("subject", words)) => header_contains(message, "Subject", words),
        Some(_) => true,
        None => {
            header_contains(message, "Subject", term)
                || header_contains(message, "From", term)
                || message.snippet.to_lowercase().contains(term)
        }
    })
}

fn metadata_only(message: &WireMessage) -> WireMessage {
    let headers = message
        .payload
        .as_ref()
        .map(|p| {
            p.headers
                .iter()
                .filter(|h| SUMMARY_HEADERS.contains(&h.name.as_str()))
                .cloned()
                .collect()
        })
        .unwrap_or_default();
    WireMessage {
        payload: Some(WirePart {
            headers,
            ..WirePart::default()
        }),
        ..message.clone()
    }
}

#[async_trait]
impl MailService for DemoMailService {
    async fn list_messages(&self, query: &str, max_results: usize) -> Result<Vec<MessageRef>> {
        self.with_mailbox(|mailbox| {
            Ok(mailbox.newest_matching(max_results, |m| matches_query(m, query)))
        })
    }

    async fn list_messages_by_label(
        &self,
        label_id: &str,
        max_results: usize,
    ) -> Result<Vec<MessageRef>> {
        self.with_mailbox(|mailbox| {
            Ok(mailbox.newest_matching(max_results, |m| m.label_ids.iter().any(|l| l == label_id)))
        })
    }

    async fn get_message(&self, id: &str, format: MessageFormat) -> Result<WireMessage> {
        self.with_mailbox(|mailbox| {
            let message = mailbox.find_mut(id)?;
            Ok(match format {
                MessageFormat::Full => message.clone(),
                MessageFormat::Minimal => metadata_only(message),
            })
        })
    }

    async fn list_labels(&self) -> Result<Vec<Label>> {
        self.with_mailbox(|mailbox| Ok(mailbox.labels.clone()))
    }

    async fn send_raw(&self, raw: &str) -> Result<()> {
        let bytes = decode_attachment_data(raw).context("Failed to decode outgoing message")?;
        self.with_mailbox(|mailbox| {
            let id = mailbox.insert_raw(&bytes, &["SENT", "INBOX", UNREAD_LABEL])?;
            let message = mailbox.find_mut(&id)?;
            if let Some(payload) = message.payload.as_mut() {
                if payload.header("From").is_none() {
                    payload.headers.insert(0, Header::new("From", DEMO_ADDRESS));
                }
                if payload.header("Date").is_none() {
                    payload
                        .headers
                        .push(Header::new("Date", chrono::Local::now().to_rfc2822()));
                }
            }
            debug!("demo mailbox stored sent message {id}");
            Ok(())
        })
    }

    async fn trash(&self, id: &str) -> Result<()> {
        self.with_mailbox(|mailbox| {
            let message = mailbox.find_mut(id)?;
            message.label_ids.retain(|l| l != "INBOX");
            message.label_ids.push("TRASH".to_string());
            Ok(())
        })
    }

    async fn modify_labels(&self, id: &str, add: &[String], remove: &[String]) -> Result<()> {
        self.with_mailbox(|mailbox| {
            let message = mailbox.find_mut(id)?;
            message.label_ids.retain(|l| !remove.contains(l));
            for label in add {
                if !message.label_ids.contains(label) {
                    message.label_ids.push(label.clone());
                }
            }
            Ok(())
        })
    }

    async fn get_attachment(&self, message_id: &str, attachment_id: &str) -> Result<String> {
        self.with_mailbox(|mailbox| {
            let data = mailbox
                .attachments
                .get(attachment_id)
                .filter(|_| attachment_id.starts_with(&format!("{message_id}.")))
                .with_context(|| format!("no attachment {attachment_id} on {message_id}"))?;
            Ok(URL_SAFE_NO_PAD.encode(data))
        })
    }
}

#[cfg(test)]
mod tests {
    use ratgmail_content::{decode_detail, encode_draft, summarize, to_transport};
    use ratgmail_core::{DEFAULT_INBOX_QUERY, Draft};

    use super::*;

    async fn subjects(service: &DemoMailService, refs: Vec<MessageRef>) -> Vec<String> {
        let mut out = Vec::new();
        for r in refs {
            let message = service
                .get_message(&r.id, MessageFormat::Minimal)
                .await
                .unwrap();
            out.push(summarize(&message).subject);
        }
        out
    }

    #[tokio::test]
    async fn inbox_lists_newest_first_without_archived() {
        let service = DemoMailService::seeded().unwrap();
        let refs = service.list_messages(DEFAULT_INBOX_QUERY, 10).await.unwrap();

        assert_eq!(
            subjects(&service, refs).await,
            vec![
                "Deploy finished",
                "Q3 budget review",
                "This week in terminals",
                "Lunch on Friday?"
            ]
        );
    }

    #[tokio::test]
    async fn search_matches_words_and_operators() {
        let service = DemoMailService::seeded().unwrap();

        let refs = service.list_messages("budget", 30).await.unwrap();
        assert_eq!(subjects(&service, refs).await, vec!["Q3 budget review"]);

        let refs = service.list_messages("from:sam is:read", 30).await.unwrap();
        assert_eq!(subjects(&service, refs).await, vec!["Lunch on Friday?"]);

        let refs = service.list_messages("lisbon", 30).await.unwrap();
        assert_eq!(subjects(&service, refs).await, vec!["Your itinerary for Lisbon"]);
    }

    #[tokio::test]
    async fn label_listing_honours_limit() {
        let service = DemoMailService::seeded().unwrap();
        let refs = service.list_messages_by_label("Label_1", 1).await.unwrap();
        assert_eq!(subjects(&service, refs).await, vec!["Deploy finished"]);
    }

    #[tokio::test]
    async fn metadata_format_carries_no_body() {
        let service = DemoMailService::seeded().unwrap();
        let refs = service.list_messages("budget", 1).await.unwrap();
        let minimal = service
            .get_message(&refs[0].id, MessageFormat::Minimal)
            .await
            .unwrap();
        let payload = minimal.payload.unwrap();
        assert!(payload.parts.is_empty());
        assert_eq!(payload.header("Subject"), Some("Q3 budget review"));
        assert_eq!(payload.header("Cc"), None);
    }

    #[tokio::test]
    async fn seeded_attachments_download_as_original_bytes() {
        let service = DemoMailService::seeded().unwrap();
        let refs = service.list_messages("budget", 1).await.unwrap();
        let full = service
            .get_message(&refs[0].id, MessageFormat::Full)
            .await
            .unwrap();
        let detail = decode_detail(&full);
        assert_eq!(detail.cc, "finance@example.com");
        assert_eq!(detail.attachments.len(), 2);

        let totals = detail.attachment(2).unwrap();
        assert_eq!(totals.filename, "totals.csv");
        let data = service
            .get_attachment(&totals.message_id, &totals.attachment_id)
            .await
            .unwrap();
        assert_eq!(
            decode_attachment_data(&data).unwrap(),
            b"region,total\nnorth,12\nsouth,9\n"
        );
    }

    #[tokio::test]
    async fn sent_message_lands_in_sent_with_date() {
        let service = DemoMailService::seeded().unwrap();
        let draft = Draft {
            from: "me".into(),
            to: "sam@example.com".into(),
            subject: "Re: Lunch on Friday?".into(),
            body: "Sounds good!".into(),
            ..Draft::default()
        };
        let raw = encode_draft(&draft).unwrap();

        service.send_raw(&to_transport(&raw)).await.unwrap();

        let refs = service.list_messages("in:sent", 10).await.unwrap();
        assert_eq!(refs.len(), 1);
        let full = service
            .get_message(&refs[0].id, MessageFormat::Full)
            .await
            .unwrap();
        let detail = decode_detail(&full);
        assert_eq!(detail.summary.subject, "Re: Lunch on Friday?");
        assert_eq!(detail.summary.from, "me@demo.local");
        assert_eq!(detail.body_text().trim_end(), "Sounds good!");
        assert!(full.payload.unwrap().header("Date").is_some());
    }

    #[tokio::test]
    async fn trashed_message_leaves_the_inbox() {
        let service = DemoMailService::seeded().unwrap();
        let before = service.list_messages(DEFAULT_INBOX_QUERY, 10).await.unwrap();

        service.trash(&before[0].id).await.unwrap();

        let after = service.list_messages(DEFAULT_INBOX_QUERY, 10).await.unwrap();
        assert_eq!(after.len(), before.len() - 1);
        assert!(after.iter().all(|r| r.id != before[0].id));
        let trash = service.list_messages("in:trash", 10).await.unwrap();
        assert_eq!(trash[0].id, before[0].id);
    }

    #[tokio::test]
    async fn modify_labels_toggles_unread() {
        let service = DemoMailService::seeded().unwrap();
        let refs = service.list_messages("is:unread", 10).await.unwrap();
        let id = refs[0].id.clone();

        service
            .modify_labels(&id, &[], &[UNREAD_LABEL.to_string()])
            .await
            .unwrap();

        let message = service.get_message(&id, MessageFormat::Minimal).await.unwrap();
        assert!(!has_label(&message, UNREAD_LABEL));
        assert!(service.modify_labels("nope", &[], &[]).await.is_err());
    }
}
