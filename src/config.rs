//! Configuration and session storage.
//!
//! Credentials and the OAuth session are stored in:
//!   ~/.config/gcal-mcp/credentials.json
//!   ~/.config/gcal-mcp/session.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// OAuth client credentials for Google Calendar
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

pub fn base_dir() -> Result<PathBuf> {
    Ok(dirs::config_dir()
        .context("Could not determine config directory")?
        .join("gcal-mcp"))
}

pub fn session_path() -> Result<PathBuf> {
    Ok(base_dir()?.join("session.toml"))
}

pub fn load_credentials() -> Result<Credentials> {
    let path = base_dir()?.join("credentials.json");

    if !path.exists() {
        anyhow::bail!(
            "Google credentials not found.\n\n\
            Create {} with:\n\n\
            {{\n  \
              \"client_id\": \"your-client-id.apps.googleusercontent.com\",\n  \
              \"client_secret\": \"your-client-secret\"\n\
            }}\n\n\
            See https://console.cloud.google.com/apis/credentials for setup.",
            path.display()
        );
    }

    let contents = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read credentials from {}", path.display()))?;

    let creds: Credentials = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse credentials from {}", path.display()))?;

    Ok(creds)
}
