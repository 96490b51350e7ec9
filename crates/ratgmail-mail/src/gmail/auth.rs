//! OAuth2 authorization code flow against Google, with the callback received
//! on a loopback listener. Tokens persist as JSON between runs.

use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, anyhow, bail};
use log::{info, warn};
use serde::{Deserialize, Serialize};

use ratgmail_core::{Authenticator, MailService};

use super::{GmailClient, GmailCredentials};

const TOKEN_FILE_NAME: &str = ".gmail-tui-token.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct StoredToken {
    access_token: String,
    refresh_token: Option<String>,
    expires_at: Option<i64>,
}

impl StoredToken {
    /// Tokens without a recorded expiry are treated as valid.
    fn is_fresh(&self, now: i64) -> bool {
        match self.expires_at {
            Some(expires_at) => expires_at > now + GmailAuth::EXPIRY_BUFFER_SECS,
            None => !self.access_token.is_empty(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
}

#[derive(Clone)]
pub struct GmailAuth {
    credentials: GmailCredentials,
    token_path: PathBuf,
    cached: Arc<Mutex<Option<StoredToken>>>,
}

impl GmailAuth {
    const AUTH_URL: &'static str = "https://accounts.google.com/o/oauth2/v2/auth";
    const TOKEN_URL: &'static str = "https://oauth2.googleapis.com/token";
    const GMAIL_SCOPE: &'static str = "https://mail.google.com/";

    const PORT_RANGE_START: u16 = 8080;
    const PORT_RANGE_END: u16 = 8090;

    const EXPIRY_BUFFER_SECS: i64 = 300;

    pub fn new(credentials: GmailCredentials, token_path: PathBuf) -> Self {
        Self {
            credentials,
            token_path,
            cached: Arc::new(Mutex::new(None)),
        }
    }

    /// `~/.gmail-tui-token.json`
    pub fn default_token_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(TOKEN_FILE_NAME))
    }

    pub fn token_path(&self) -> &Path {
        &self.token_path
    }

    /// Makes sure a usable token exists: the stored one, a refreshed one, or
    /// a new one from the interactive browser flow.
    pub fn ensure_authorized(&self) -> Result<()> {
        if let Ok(token) = self.load_token() {
            if token.is_fresh(now()) {
                self.remember(token)?;
                return Ok(());
            }
            if let Some(refresh_token) = token.refresh_token.as_deref() {
                match self.refresh_access_token(refresh_token) {
                    Ok(response) => {
                        let stored = self.save_token_response(&response)?;
                        self.remember(stored)?;
                        return Ok(());
                    }
                    Err(err) => warn!("token refresh failed, re-authorizing: {err:#}"),
                }
            }
        }

        let response = self.authorization_code_auth()?;
        let stored = self.save_token_response(&response)?;
        self.remember(stored)
    }

    /// Bearer token for one API call. Refreshes near expiry but never starts
    /// the browser flow.
    pub fn access_token(&self) -> Result<String> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| anyhow!("token cache lock poisoned"))?;
        if cached.is_none() {
            *cached = self.load_token().ok();
        }
        let token = cached
            .as_ref()
            .context("Not authorized; restart to sign in again")?;
        if token.is_fresh(now()) {
            return Ok(token.access_token.clone());
        }

        let refresh_token = token
            .refresh_token
            .clone()
            .context("Access token expired and no refresh token is stored")?;
        let response = self.refresh_access_token(&refresh_token)?;
        let stored = self.save_token_response(&response)?;
        let access_token = stored.access_token.clone();
        *cached = Some(stored);
        Ok(access_token)
    }

    fn remember(&self, token: StoredToken) -> Result<()> {
        let mut cached = self
            .cached
            .lock()
            .map_err(|_| anyhow!("token cache lock poisoned"))?;
        *cached = Some(token);
        Ok(())
    }

    fn authorization_code_auth(&self) -> Result<TokenResponse> {
        let (listener, port) = self.start_local_server()?;
        let redirect_uri = format!("http://localhost:{}", port);

        let auth_url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent",
            Self::AUTH_URL,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(Self::GMAIL_SCOPE),
        );

        println!("\n=== Gmail authorization required ===");
        println!("Opening browser for sign-in...");
        println!("If the browser doesn't open, visit: {}", auth_url);
        if let Err(e) = open::that(&auth_url) {
            eprintln!("Failed to open browser: {}. Please open the URL manually.", e);
        }

        println!("Waiting for authorization...");
        let code = self.wait_for_callback(listener)?;

        let mut response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("code", code.as_str()),
                ("grant_type", "authorization_code"),
                ("redirect_uri", redirect_uri.as_str()),
            ])
            .context("Failed to exchange authorization code")?;

        let token: TokenResponse = response
            .body_mut()
            .read_json()
            .context("Failed to parse token response")?;

        println!("Authorization complete.\n");
        info!("gmail authorization complete");
        Ok(token)
    }

    fn start_local_server(&self) -> Result<(TcpListener, u16)> {
        for port in Self::PORT_RANGE_START..=Self::PORT_RANGE_END {
            if let Ok(listener) = TcpListener::bind(format!("127.0.0.1:{}", port)) {
                return Ok((listener, port));
            }
        }
        bail!(
            "Could not bind to any port in range {}-{}",
            Self::PORT_RANGE_START,
            Self::PORT_RANGE_END
        )
    }

    fn wait_for_callback(&self, listener: TcpListener) -> Result<String> {
        let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

        let mut reader = BufReader::new(&stream);
        let mut request_line = String::new();
        reader
            .read_line(&mut request_line)
            .context("Failed to read request")?;

        let code = callback_param(&request_line, "code");
        let error = callback_param(&request_line, "error");

        let (status, body) = if code.is_some() {
            ("200 OK", "Authorization complete. You can close this window.")
        } else {
            ("400 Bad Request", "Authorization failed. Please try again.")
        };
        let response = format!(
            "HTTP/1.1 {}\r\nContent-Type: text/html\r\nConnection: close\r\n\r\n<html><body><h1>{}</h1></body></html>",
            status, body
        );
        stream.write_all(response.as_bytes()).ok();

        if let Some(err) = error {
            bail!("OAuth error: {}", err);
        }
        code.context("No authorization code received")
    }

    fn refresh_access_token(&self, refresh_token: &str) -> Result<TokenResponse> {
        let response = ureq::post(Self::TOKEN_URL)
            .send_form([
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .context("Failed to refresh access token")?;

        let mut token: TokenResponse = response
            .into_body()
            .read_json()
            .context("Failed to parse refresh token response")?;
        if token.refresh_token.is_none() {
            token.refresh_token = Some(refresh_token.to_string());
        }
        Ok(token)
    }

    fn load_token(&self) -> Result<StoredToken> {
        let content = fs::read_to_string(&self.token_path)?;
        Ok(serde_json::from_str(&content)?)
    }

    fn save_token_response(&self, token: &TokenResponse) -> Result<StoredToken> {
        if let Some(parent) = self.token_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredToken {
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_at: token.expires_in.map(|secs| now() + secs as i64),
        };
        let content = serde_json::to_string_pretty(&stored)?;
        fs::write(&self.token_path, content)
            .with_context(|| format!("Failed to save token to {}", self.token_path.display()))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&self.token_path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(stored)
    }
}

impl Authenticator for GmailAuth {
    fn authorize(&self) -> Result<Arc<dyn MailService>> {
        self.ensure_authorized()?;
        Ok(Arc::new(GmailClient::new(self.clone())))
    }
}

fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Value of `key` in the query string of an HTTP request line
/// (`GET /?code=...&scope=... HTTP/1.1`), percent-decoded.
fn callback_param(request_line: &str, key: &str) -> Option<String> {
    let query = request_line.split_whitespace().nth(1)?.split_once('?')?.1;
    query.split('&').find_map(|pair| {
        let (name, value) = pair.split_once('=')?;
        (name == key).then(|| {
            urlencoding::decode(value)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| value.to_string())
        })
    })
}
