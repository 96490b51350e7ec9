use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64_STD, URL_SAFE as BASE64_URL};
use chrono::{DateTime, NaiveDateTime};
use log::debug;

use ratgmail_core::{
    AttachmentRef, BodyText, MessageDetail, MessageSummary, SNIPPET_MAX_CHARS, UNREAD_LABEL,
    WireMessage, WirePart,
};

const DISPLAY_DATE_FORMAT: &str = "%b %d, %Y %H:%M";

enum DateLayout {
    /// Numeric offset, parsed as an aware timestamp.
    Zoned(&'static str),
    /// Trailing zone abbreviation (GMT, PST, ...). The abbreviation is dropped
    /// and the wall-clock time kept as written.
    Named(&'static str),
}

const DATE_LAYOUTS: [DateLayout; 6] = [
    DateLayout::Zoned("%a, %d %b %Y %H:%M:%S %z"),
    DateLayout::Named("%a, %d %b %Y %H:%M:%S"),
    DateLayout::Zoned("%a, %e %b %Y %H:%M:%S %z"),
    DateLayout::Zoned("%d %b %Y %H:%M:%S %z"),
    DateLayout::Zoned("%d %b %y %H:%M %z"),
    DateLayout::Named("%d %b %y %H:%M"),
];

impl DateLayout {
    fn reformat(&self, input: &str) -> Option<String> {
        match self {
            DateLayout::Zoned(fmt) => DateTime::parse_from_str(input, fmt)
                .ok()
                .map(|dt| dt.format(DISPLAY_DATE_FORMAT).to_string()),
            DateLayout::Named(fmt) => {
                let (head, zone) = input.rsplit_once(' ')?;
                if zone.is_empty() || !zone.chars().all(|c| c.is_ascii_alphabetic()) {
                    return None;
                }
                NaiveDateTime::parse_from_str(head, fmt)
                    .ok()
                    .map(|dt| dt.format(DISPLAY_DATE_FORMAT).to_string())
            }
        }
    }
}

const HTML_ENTITIES: [(&str, &str); 9] = [
    ("&nbsp;", " "),
    ("&lt;", "<"),
    ("&gt;", ">"),
    ("&quot;", "\""),
    ("&apos;", "'"),
    ("&#39;", "'"),
    ("&ndash;", "-"),
    ("&mdash;", "\u{2014}"),
    // last, so "&amp;lt;" stays "&lt;"
    ("&amp;", "&"),
];

pub fn summarize(message: &WireMessage) -> MessageSummary {
    MessageSummary {
        id: message.id.clone(),
        thread_id: message.thread_id.clone(),
        subject: header_value(message, "Subject"),
        from: header_value(message, "From"),
        snippet: truncate_snippet(&message.snippet),
        date: format_date(&header_value(message, "Date")),
        unread: is_unread(&message.label_ids),
        label_ids: message.label_ids.clone(),
    }
}

pub fn decode_detail(message: &WireMessage) -> MessageDetail {
    let (body, attachments) = match &message.payload {
        Some(payload) => (
            extract_body(payload),
            find_attachments(&message.id, payload),
        ),
        None => (BodyText::Missing, Vec::new()),
    };
    MessageDetail {
        summary: summarize(message),
        to: header_value(message, "To"),
        cc: header_value(message, "Cc"),
        bcc: header_value(message, "Bcc"),
        body,
        attachments,
    }
}

fn header_value(message: &WireMessage, name: &str) -> String {
    message
        .payload
        .as_ref()
        .and_then(|p| p.header(name))
        .unwrap_or_default()
        .to_string()
}

pub fn is_unread(label_ids: &[String]) -> bool {
    label_ids.iter().any(|id| id == UNREAD_LABEL)
}

pub fn truncate_snippet(snippet: &str) -> String {
    if snippet.chars().count() <= SNIPPET_MAX_CHARS {
        return snippet.to_string();
    }
    let mut out: String = snippet.chars().take(SNIPPET_MAX_CHARS - 3).collect();
    out.push_str("...");
    out
}

pub fn format_date(raw: &str) -> String {
    let candidate = strip_zone_comment(raw.trim());
    DATE_LAYOUTS
        .iter()
        .find_map(|layout| layout.reformat(candidate))
        .unwrap_or_else(|| raw.to_string())
}

// "Tue, 1 Jul 2003 10:52:37 +0200 (CEST)" -> drop the parenthesized comment.
fn strip_zone_comment(input: &str) -> &str {
    if input.ends_with(')')
        && let Some(idx) = input.rfind(" (")
    {
        return input[..idx].trim_end();
    }
    input
}

/// Decodes a Gmail body payload. Missing padding is restored, then the
/// URL-safe alphabet is tried before the standard one.
pub fn decode_body_data(data: &str) -> Option<String> {
    let mut padded = data.to_string();
    while padded.len() % 4 != 0 {
        padded.push('=');
    }
    let bytes = BASE64_URL
        .decode(&padded)
        .or_else(|_| BASE64_STD.decode(&padded))
        .ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}

enum Found {
    Text(String),
    Undecodable,
}

/// First non-empty `text/plain` anywhere in the tree wins; only then is the
/// first non-empty `text/html` considered.
pub fn extract_body(payload: &WirePart) -> BodyText {
    match find_text(payload, "text/plain", &|text| text) {
        Some(Found::Text(text)) => return BodyText::Plain(text),
        Some(Found::Undecodable) => return BodyText::DecodeFailed,
        None => {}
    }
    match find_text(payload, "text/html", &|html| strip_html(&html)) {
        Some(Found::Text(text)) => BodyText::Html(text),
        Some(Found::Undecodable) => BodyText::DecodeFailed,
        None => BodyText::Missing,
    }
}

fn find_text(part: &WirePart, mime: &str, transform: &dyn Fn(String) -> String) -> Option<Found> {
    if part.filename.is_empty()
        && part.mime_type.eq_ignore_ascii_case(mime)
        && let Some(data) = part.data()
    {
        match decode_body_data(data) {
            Some(text) => {
                let text = transform(text);
                if !text.is_empty() {
                    return Some(Found::Text(text));
                }
            }
            None => {
                debug!("undecodable {} body in part {:?}", mime, part.part_id);
                return Some(Found::Undecodable);
            }
        }
    }
    part.parts
        .iter()
        .find_map(|child| find_text(child, mime, transform))
}

pub fn strip_html(input: &str) -> String {
    let mut text = String::with_capacity(input.len());
    let mut rest = input;
    while let Some(start) = rest.find('<') {
        text.push_str(&rest[..start]);
        match rest[start..].find('>') {
            Some(end) => rest = &rest[start + end + 1..],
            None => {
                // unterminated "<" is literal text
                text.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    text.push_str(rest);

    for (entity, replacement) in HTML_ENTITIES {
        if text.contains(entity) {
            text = text.replace(entity, replacement);
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Every part carrying a filename, depth-first and left to right. The
/// position in the returned list is the attachment's stable index.
pub fn find_attachments(message_id: &str, part: &WirePart) -> Vec<AttachmentRef> {
    let mut out = Vec::new();
    collect_attachments(message_id, part, &mut out);
    out
}

fn collect_attachments(message_id: &str, part: &WirePart, out: &mut Vec<AttachmentRef>) {
    if !part.filename.is_empty() {
        let body = part.body.clone().unwrap_or_default();
        if body.attachment_id.is_none() && body.data.as_deref().is_none_or(str::is_empty) {
            debug!("attachment {} in {} has no id or inline data", part.filename, message_id);
        }
        out.push(AttachmentRef {
            filename: part.filename.clone(),
            mime: part.mime_type.clone(),
            size: body.size,
            attachment_id: body.attachment_id.unwrap_or_default(),
            message_id: message_id.to_string(),
            inline_data: body.data.filter(|d| !d.is_empty()),
        });
        return;
    }
    for child in &part.parts {
        collect_attachments(message_id, child, out);
    }
}
