use std::fs;
use std::path::{Path, PathBuf};

use base64::Engine;
use base64::engine::general_purpose::{STANDARD as BASE64_STD, URL_SAFE as BASE64_URL};
use rand::RngCore;

use ratgmail_core::{Draft, MAX_ATTACHMENT_BYTES};

const BOUNDARY_LEN: usize = 60;

#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("File not found: {0}")]
    Missing(String),
    #[error("attachment too large: {0} (max 25MB)")]
    TooLarge(String),
    #[error("attachments too large: {total} bytes in total (max 25MB)")]
    TotalTooLarge { total: u64 },
    #[error("failed to read attachment {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingAttachment {
    pub filename: String,
    pub mime: String,
    pub data: Vec<u8>,
}

/// Existence and size check for one local file. Returns its size.
pub fn check_attachment(path: &Path) -> Result<u64, EncodeError> {
    let meta = fs::metadata(path).map_err(|_| EncodeError::Missing(path.display().to_string()))?;
    if !meta.is_file() {
        return Err(EncodeError::Missing(path.display().to_string()));
    }
    if meta.len() > MAX_ATTACHMENT_BYTES {
        return Err(EncodeError::TooLarge(base_name(path)));
    }
    Ok(meta.len())
}

/// Validates every path before reading any of them.
pub fn load_attachments(paths: &[PathBuf]) -> Result<Vec<OutgoingAttachment>, EncodeError> {
    let mut total = 0u64;
    for path in paths {
        total += check_attachment(path)?;
    }
    if total > MAX_ATTACHMENT_BYTES {
        return Err(EncodeError::TotalTooLarge { total });
    }

    paths
        .iter()
        .map(|path| {
            let filename = base_name(path);
            let data = fs::read(path).map_err(|source| EncodeError::Read {
                name: filename.clone(),
                source,
            })?;
            let mime = mime_guess::from_path(path)
                .first_or_octet_stream()
                .to_string();
            Ok(OutgoingAttachment {
                filename,
                mime,
                data,
            })
        })
        .collect()
}

pub fn encode_draft(draft: &Draft) -> Result<Vec<u8>, EncodeError> {
    encode_draft_with_boundary(draft, &new_boundary())
}

pub fn encode_draft_with_boundary(draft: &Draft, boundary: &str) -> Result<Vec<u8>, EncodeError> {
    let attachments = load_attachments(&draft.attachments)?;
    Ok(build_message(draft, &attachments, boundary))
}

/// Assembles the multipart/mixed message. Lines end in CRLF; attachment
/// payloads are standard base64 without line wrapping.
pub fn build_message(draft: &Draft, attachments: &[OutgoingAttachment], boundary: &str) -> Vec<u8> {
    let mut out = String::new();
    if draft.from.contains('@') {
        push_header(&mut out, "From", &draft.from);
    }
    push_header(&mut out, "To", &draft.to);
    if !draft.cc.trim().is_empty() {
        push_header(&mut out, "Cc", &draft.cc);
    }
    if !draft.bcc.trim().is_empty() {
        push_header(&mut out, "Bcc", &draft.bcc);
    }
    push_header(&mut out, "Subject", &draft.subject);
    out.push_str(&format!(
        "MIME-Version: 1.0\r\nContent-Type: multipart/mixed; boundary={boundary}\r\n\r\n"
    ));

    out.push_str(&format!(
        "--{boundary}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
        draft.body
    ));

    for (idx, attachment) in attachments.iter().enumerate() {
        if idx > 0 {
            out.push_str("\r\n");
        }
        out.push_str(&format!(
            "--{boundary}\r\n\
             Content-Disposition: attachment; filename=\"{}\"\r\n\
             Content-Transfer-Encoding: base64\r\n\
             Content-Type: {}\r\n\r\n",
            attachment.filename, attachment.mime
        ));
        BASE64_STD.encode_string(&attachment.data, &mut out);
    }

    out.push_str(&format!("\r\n--{boundary}--\r\n"));
    out.into_bytes()
}

fn push_header(out: &mut String, name: &str, value: &str) {
    let value: String = value
        .chars()
        .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
        .collect();
    out.push_str(&format!("{name}: {value}\r\n"));
}

/// Payload for `send_raw`: URL-safe, padded base64 of the whole message.
pub fn to_transport(raw: &[u8]) -> String {
    BASE64_URL.encode(raw)
}

pub fn new_boundary() -> String {
    let mut bytes = [0u8; BOUNDARY_LEN / 2];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
