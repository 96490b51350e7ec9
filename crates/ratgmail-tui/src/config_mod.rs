use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use ratgmail_core::{
    DEFAULT_DOWNLOADS_DIR, DEFAULT_INBOX_MAX_RESULTS, DEFAULT_INBOX_QUERY,
    DEFAULT_LABEL_MAX_RESULTS, DEFAULT_SEARCH_MAX_RESULTS,
};
use ratgmail_mail::MailSettings;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GmailConfig {
    pub(crate) credentials_file: PathBuf,
    pub(crate) token_file: Option<PathBuf>,
    pub(crate) client_id: String,
    pub(crate) client_secret: String,
}

impl Default for GmailConfig {
    fn default() -> Self {
        Self {
            credentials_file: PathBuf::from("credentials.json"),
            token_file: None,
            client_id: String::new(),
            client_secret: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct AppConfig {
    pub(crate) gmail: GmailConfig,
    pub(crate) mail: MailSettings,
}

pub(crate) fn xdg_config_dir() -> PathBuf {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config")))
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

pub(crate) fn xdg_state_dir() -> PathBuf {
    std::env::var_os("XDG_STATE_HOME")
        .map(PathBuf::from)
        .or_else(|| {
            std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".local").join("state"))
        })
        .unwrap_or_else(|| PathBuf::from("/tmp"))
}

fn config_path_candidates() -> Vec<PathBuf> {
    vec![
        PathBuf::from("ratgmail.toml"),
        xdg_config_dir().join("ratgmail").join("ratgmail.toml"),
    ]
}

fn load_config_text() -> Option<String> {
    for path in config_path_candidates() {
        if let Ok(content) = std::fs::read_to_string(&path) {
            return Some(content);
        }
    }
    None
}

fn default_config_template() -> &'static str {
    r#"# Auto-generated by ratgmail on first run.

[gmail]
# OAuth client downloaded from the Google Cloud console (installed app).
credentials_file = "credentials.json"
# token_file = "~/.gmail-tui-token.json"
# client_id and client_secret override credentials_file when set.
# client_id = ""
# client_secret = ""

[mail]
inbox_query = "in:inbox category:primary"
inbox_max_results = 10
search_max_results = 30
label_max_results = 10
downloads_dir = "downloads"
"#
}

pub(crate) fn ensure_default_config_exists() -> Result<()> {
    if load_config_text().is_some() {
        return Ok(());
    }
    let path = xdg_config_dir().join("ratgmail").join("ratgmail.toml");
    write_text_atomic(&path, default_config_template())
}

fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(parent)?;
    if path.exists() {
        let mut file = std::fs::OpenOptions::new()
            .write(true)
            .truncate(true)
            .open(path)?;
        file.write_all(content.as_bytes())?;
        return Ok(());
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content.as_bytes())?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

/// An explicit path must exist; otherwise the first candidate found wins and
/// a missing file means defaults.
pub(crate) fn load_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let text = match explicit {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
        ),
        None => load_config_text(),
    };
    match text {
        Some(text) => parse_config(&text),
        None => Ok(AppConfig::default()),
    }
}

pub(crate) fn parse_config(text: &str) -> Result<AppConfig> {
    let value: toml::Value = toml::from_str(text).context("Invalid ratgmail.toml")?;
    let mut config = AppConfig::default();

    if let Some(gmail) = value.get("gmail") {
        if let Some(path) = gmail.get("credentials_file").and_then(|v| v.as_str()) {
            config.gmail.credentials_file = expand_home(path);
        }
        config.gmail.token_file = gmail
            .get("token_file")
            .and_then(|v| v.as_str())
            .filter(|s| !s.trim().is_empty())
            .map(expand_home);
        config.gmail.client_id = gmail
            .get("client_id")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
        config.gmail.client_secret = gmail
            .get("client_secret")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .trim()
            .to_string();
    }

    if let Some(mail) = value.get("mail") {
        config.mail.inbox_query = mail
            .get("inbox_query")
            .and_then(|v| v.as_str())
            .unwrap_or(DEFAULT_INBOX_QUERY)
            .to_string();
        config.mail.inbox_max_results =
            read_limit(mail, "inbox_max_results", DEFAULT_INBOX_MAX_RESULTS);
        config.mail.search_max_results =
            read_limit(mail, "search_max_results", DEFAULT_SEARCH_MAX_RESULTS);
        config.mail.label_max_results =
            read_limit(mail, "label_max_results", DEFAULT_LABEL_MAX_RESULTS);
        config.mail.downloads_dir = expand_home(
            mail.get("downloads_dir")
                .and_then(|v| v.as_str())
                .unwrap_or(DEFAULT_DOWNLOADS_DIR),
        );
    }

    Ok(config)
}

/// Non-positive limits fall back to the default.
fn read_limit(table: &toml::Value, key: &str, default: usize) -> usize {
    table
        .get(key)
        .and_then(|v| v.as_integer())
        .filter(|n| *n > 0)
        .map_or(default, |n| n as usize)
}

fn expand_home(raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("~/")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    PathBuf::from(trimmed)
}
