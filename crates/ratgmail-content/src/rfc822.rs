//! RFC 822 bytes to the Gmail wire tree, the way the Gmail API would present
//! a stored message.

use anyhow::Result;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use mailparse::ParsedMail;

use ratgmail_core::{Header, WireBody, WireMessage, WirePart};

use crate::decode::extract_body;

const SNIPPET_SOURCE_CHARS: usize = 120;

#[derive(Debug, Clone)]
pub struct ParsedWire {
    pub message: WireMessage,
    /// Attachment payloads keyed by the attachment ids assigned in `message`.
    pub attachments: Vec<(String, Vec<u8>)>,
}

pub fn wire_from_raw(id: &str, raw: &[u8]) -> Result<ParsedWire> {
    let parsed = mailparse::parse_mail(raw)?;
    let mut attachments = Vec::new();
    let payload = convert_part(id, &parsed, String::new(), &mut attachments)?;

    let body = extract_body(&payload);
    let snippet = if body.is_fallback() {
        String::new()
    } else {
        body.display()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .chars()
            .take(SNIPPET_SOURCE_CHARS)
            .collect()
    };

    Ok(ParsedWire {
        message: WireMessage {
            id: id.to_string(),
            thread_id: id.to_string(),
            label_ids: Vec::new(),
            snippet,
            payload: Some(payload),
        },
        attachments,
    })
}

fn convert_part(
    message_id: &str,
    part: &ParsedMail,
    part_id: String,
    attachments: &mut Vec<(String, Vec<u8>)>,
) -> Result<WirePart> {
    let disposition = part.get_content_disposition();
    let filename = disposition
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .cloned()
        .unwrap_or_default();
    let headers = part
        .headers
        .iter()
        .map(|h| Header::new(h.get_key(), h.get_value()))
        .collect();

    let mut wire = WirePart {
        part_id: part_id.clone(),
        mime_type: part.ctype.mimetype.to_lowercase(),
        filename,
        headers,
        body: None,
        parts: Vec::new(),
    };

    if part.subparts.is_empty() {
        let mut data = part.get_body_raw()?;
        if !part_id.is_empty() && !is_base64(part) {
            strip_delimiter_newline(&mut data);
        }
        let size = data.len() as u64;
        if wire.filename.is_empty() {
            wire.body = Some(WireBody {
                size,
                data: Some(URL_SAFE_NO_PAD.encode(&data)),
                attachment_id: None,
            });
        } else {
            let attachment_id = format!("{message_id}.{}", attachments.len() + 1);
            wire.body = Some(WireBody {
                size,
                data: None,
                attachment_id: Some(attachment_id.clone()),
            });
            attachments.push((attachment_id, data));
        }
        return Ok(wire);
    }

    wire.body = Some(WireBody::default());
    for (idx, sub) in part.subparts.iter().enumerate() {
        let child_id = if part_id.is_empty() {
            idx.to_string()
        } else {
            format!("{part_id}.{idx}")
        };
        wire.parts
            .push(convert_part(message_id, sub, child_id, attachments)?);
    }
    Ok(wire)
}

fn is_base64(part: &ParsedMail) -> bool {
    part.headers
        .iter()
        .find(|h| h.get_key().eq_ignore_ascii_case("Content-Transfer-Encoding"))
        .is_some_and(|h| h.get_value().trim().eq_ignore_ascii_case("base64"))
}

/// Part framing is CRLF: the break before a delimiter, plus the one written
/// after a lone text part. Body text itself only carries LF, so trailing
/// CRLFs are framing; a bare LF is dropped only from LF-framed input.
fn strip_delimiter_newline(data: &mut Vec<u8>) {
    let mut stripped = false;
    while data.ends_with(b"\r\n") {
        data.truncate(data.len() - 2);
        stripped = true;
    }
    if !stripped && data.ends_with(b"\n") {
        data.truncate(data.len() - 1);
    }
}
