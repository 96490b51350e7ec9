use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// OAuth client identity for the installed-app flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GmailCredentials {
    pub client_id: String,
    pub client_secret: String,
}

/// Google Cloud Console download format.
#[derive(Deserialize)]
struct GoogleCredentialFile {
    installed: Option<ClientSection>,
    web: Option<ClientSection>,
}

#[derive(Deserialize)]
struct ClientSection {
    client_id: String,
    client_secret: String,
}

impl GmailCredentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file {}", path.display()))?;
        Self::from_json(&text)
            .with_context(|| format!("Invalid credentials file {}", path.display()))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: GoogleCredentialFile =
            serde_json::from_str(json).context("Failed to parse credentials JSON")?;
        let section = file
            .installed
            .or(file.web)
            .context("Credentials file missing 'installed' or 'web' section")?;
        Ok(Self {
            client_id: section.client_id,
            client_secret: section.client_secret,
        })
    }
}
