//! OAuth2 authorization for the Google Calendar API.
//!
//! Creates a valid session (access token) for the calendar service.
//! A saved session is reused across runs and refreshed lazily when it
//! expires; the first run walks the user through the interactive
//! consent flow with a local loopback redirect.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;

use crate::config::{self, Credentials};

const REDIRECT_PORT: u16 = 8085;
const CONSENT_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const SCOPE: &str = "https://www.googleapis.com/auth/calendar";

fn redirect_uri() -> String {
    format!("http://localhost:{}/callback", REDIRECT_PORT)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

/// An authorized Google Calendar session: client credentials plus the
/// tokens obtained for them.
#[derive(Debug, Clone)]
pub struct Session {
    creds: Credentials,
    data: SessionData,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

impl Session {
    pub fn new(creds: Credentials, data: SessionData) -> Self {
        Session { creds, data }
    }

    pub fn access_token(&self) -> &str {
        &self.data.access_token
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.data.expires_at
    }

    /// Exchange the refresh token for a new access token and persist
    /// the updated session.
    pub async fn refresh(&mut self, http: &reqwest::Client) -> Result<()> {
        let response = http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.creds.client_id.as_str()),
                ("client_secret", self.creds.client_secret.as_str()),
                ("refresh_token", self.data.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .context("Failed to send token refresh request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Failed to refresh token ({}): {}", status, error_text);
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .context("Failed to parse token refresh response")?;

        self.data.access_token = tokens.access_token;
        // Google typically doesn't return a new refresh_token on refresh
        if let Some(refresh_token) = tokens.refresh_token {
            self.data.refresh_token = refresh_token;
        }
        self.data.expires_at = Utc::now() + Duration::seconds(tokens.expires_in);
        self.save()?;

        Ok(())
    }

    pub fn save(&self) -> Result<()> {
        let contents = toml::to_string_pretty(&self.data).context("Failed to serialize session")?;

        let path = config::session_path()?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        std::fs::write(&path, contents)
            .with_context(|| format!("Failed to write session to {}", path.display()))?;

        // Set to owner-only (0600) since the file contains OAuth tokens:
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o600))
                .with_context(|| format!("Failed to set permissions on {}", path.display()))?;
        }

        Ok(())
    }

    fn load(creds: Credentials) -> Result<Option<Self>> {
        let path = config::session_path()?;

        if !path.exists() {
            return Ok(None);
        }

        let contents = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read session from {}", path.display()))?;

        let data: SessionData = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse session from {}", path.display()))?;

        Ok(Some(Session { creds, data }))
    }
}

/// Start a local HTTP server to receive the OAuth callback
fn wait_for_callback() -> Result<String> {
    let listener = TcpListener::bind(format!("127.0.0.1:{}", REDIRECT_PORT))
        .with_context(|| format!("Failed to bind to port {}", REDIRECT_PORT))?;

    eprintln!("Waiting for OAuth callback on port {}...", REDIRECT_PORT);

    let (mut stream, _) = listener.accept().context("Failed to accept connection")?;

    let mut reader = BufReader::new(&stream);
    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;

    // Parse the request to get the code
    // Request line looks like: GET /callback?code=xxx HTTP/1.1
    let url_part = request_line
        .split_whitespace()
        .nth(1)
        .context("Invalid request")?;

    let url = url::Url::parse(&format!("http://localhost{}", url_part))?;

    let code = url
        .query_pairs()
        .find(|(k, _)| k == "code")
        .map(|(_, v)| v.to_string())
        .context("No code in callback")?;

    // Send a response to the browser
    let response = "HTTP/1.1 200 OK\r\n\
        Content-Type: text/html\r\n\
        Connection: close\r\n\
        \r\n\
        <html><body>\
        <h1>Authentication successful!</h1>\
        <p>You can close this window and return to the terminal.</p>\
        </body></html>";

    stream.write_all(response.as_bytes())?;
    stream.flush()?;

    Ok(code)
}

/// Run the interactive OAuth consent flow and return a fresh session.
async fn authenticate(creds: Credentials) -> Result<Session> {
    let auth_url = url::Url::parse_with_params(
        CONSENT_URL,
        &[
            ("client_id", creds.client_id.as_str()),
            ("redirect_uri", redirect_uri().as_str()),
            ("response_type", "code"),
            ("scope", SCOPE),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .context("Failed to build consent URL")?;

    eprintln!("\nOpen this URL in your browser to authenticate:\n");
    eprintln!("{}\n", auth_url);

    // Try to open the browser automatically
    if open::that(auth_url.as_str()).is_err() {
        eprintln!("(Could not open browser automatically, please copy the URL above)");
    }

    let code = wait_for_callback()?;

    eprintln!("\nReceived authorization code, exchanging for tokens...");

    let http = reqwest::Client::new();
    let response = http
        .post(TOKEN_URL)
        .form(&[
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", redirect_uri().as_str()),
            ("grant_type", "authorization_code"),
        ])
        .send()
        .await
        .context("Failed to exchange code for tokens")?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        anyhow::bail!("Token exchange failed ({}): {}", status, error_text);
    }

    let tokens: TokenResponse = response
        .json()
        .await
        .context("Failed to parse token response")?;

    let refresh_token = tokens
        .refresh_token
        .context("No refresh token in response")?;

    let session = Session::new(
        creds,
        SessionData {
            access_token: tokens.access_token,
            refresh_token,
            expires_at: Utc::now() + Duration::seconds(tokens.expires_in),
        },
    );
    session.save()?;

    eprintln!("Authentication successful!");

    Ok(session)
}

/// Load the saved session, or run the interactive consent flow if none
/// exists. Expired saved sessions are still returned; they are
/// refreshed lazily on first use.
pub async fn authorize() -> Result<Session> {
    let creds = config::load_credentials()?;

    match Session::load(creds.clone())? {
        Some(session) => Ok(session),
        None => authenticate(creds).await,
    }
}
