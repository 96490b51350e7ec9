//! MIME content codec: Gmail wire trees to display models and drafts back to
//! multipart wire bytes.

mod attachment;
mod decode;
mod encode;
mod rfc822;

pub use attachment::{decode_attachment_data, sanitize_filename};
pub use decode::{
    decode_body_data, decode_detail, extract_body, find_attachments, format_date, is_unread,
    strip_html, summarize, truncate_snippet,
};
pub use encode::{
    EncodeError, OutgoingAttachment, build_message, check_attachment, encode_draft,
    encode_draft_with_boundary, load_attachments, new_boundary, to_transport,
};
pub use rfc822::{ParsedWire, wire_from_raw};
