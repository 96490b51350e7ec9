use std::path::{Path, PathBuf};

use log::debug;

use ratgmail_content::{decode_attachment_data, sanitize_filename};
use ratgmail_core::{AttachmentRef, MailService};

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("Download failed: {0}")]
    Fetch(String),
    #[error("Failed to decode: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("Couldn't create downloads directory: {0}")]
    CreateDir(#[source] std::io::Error),
    #[error("Save failed: {0}")]
    Save(#[source] std::io::Error),
}

/// Fetches, decodes and writes one attachment into `downloads_dir`, which is
/// created if missing. An existing file of the same name is overwritten.
pub async fn download_attachment(
    service: &dyn MailService,
    attachment: &AttachmentRef,
    downloads_dir: &Path,
) -> Result<PathBuf, TransferError> {
    let payload = match &attachment.inline_data {
        Some(data) if attachment.attachment_id.is_empty() => data.clone(),
        _ => service
            .get_attachment(&attachment.message_id, &attachment.attachment_id)
            .await
            .map_err(|err| TransferError::Fetch(format!("{err:#}")))?,
    };
    let data = decode_attachment_data(&payload)?;

    tokio::fs::create_dir_all(downloads_dir)
        .await
        .map_err(TransferError::CreateDir)?;
    let path = downloads_dir.join(sanitize_filename(&attachment.filename));
    tokio::fs::write(&path, &data)
        .await
        .map_err(TransferError::Save)?;
    debug!(
        "attachment saved: {} ({} bytes)",
        path.display(),
        data.len()
    );
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeService;

    fn attachment(filename: &str, attachment_id: &str) -> AttachmentRef {
        AttachmentRef {
            filename: filename.into(),
            mime: "application/pdf".into(),
            size: 4,
            attachment_id: attachment_id.into(),
            message_id: "m1".into(),
            inline_data: None,
        }
    }

    #[tokio::test]
    async fn download_creates_directory_and_writes_bytes() {
        let service = FakeService::new().with_attachment("att-1", b"%PDF");
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("nested").join("downloads");

        let path = download_attachment(&service, &attachment("report.pdf", "att-1"), &downloads)
            .await
            .unwrap();

        assert_eq!(path, downloads.join("report.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"%PDF");
        assert_eq!(service.calls(), vec!["attachment:m1:att-1".to_string()]);
    }

    #[tokio::test]
    async fn hostile_filename_stays_in_downloads() {
        let service = FakeService::new().with_attachment("att-1", b"x");
        let dir = tempfile::tempdir().unwrap();

        let path = download_attachment(&service, &attachment("../../evil.sh", "att-1"), dir.path())
            .await
            .unwrap();

        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.file_name().unwrap(), ".._.._evil.sh");
    }

    #[tokio::test]
    async fn same_name_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), b"old contents").unwrap();
        let service = FakeService::new().with_attachment("att-1", b"new");

        download_attachment(&service, &attachment("a.txt", "att-1"), dir.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("a.txt")).unwrap(), b"new");
    }

    #[tokio::test]
    async fn inline_payload_skips_the_fetch() {
        let service = FakeService::new();
        let dir = tempfile::tempdir().unwrap();
        let mut inline = attachment("note.txt", "");
        inline.inline_data = Some("aGk".into());

        let path = download_attachment(&service, &inline, dir.path())
            .await
            .unwrap();

        assert_eq!(std::fs::read(path).unwrap(), b"hi");
        assert!(service.calls().is_empty());
    }

    #[tokio::test]
    async fn fetch_failure_is_reported() {
        let service = FakeService::new();
        let dir = tempfile::tempdir().unwrap();

        let err = download_attachment(&service, &attachment("a.pdf", "missing"), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Fetch(_)));
        assert!(err.to_string().starts_with("Download failed: "));
        assert!(!dir.path().join("a.pdf").exists());
    }

    #[tokio::test]
    async fn undecodable_payload_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = dir.path().join("downloads");
        let mut broken = attachment("a.bin", "");
        broken.inline_data = Some("***".into());

        let err = download_attachment(&FakeService::new(), &broken, &downloads)
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("Failed to decode: "));
        assert!(!downloads.exists());
    }
}
