//! Federation-specific error types.

use thiserror::Error;

/// Errors that can occur talking to remote ActivityPub servers.
#[derive(Debug, Error)]
pub enum FederationError {
    // ── Key management ──────────────────────────────────────────────────────

    #[error("Failed to load signing key: {0}")]
    KeyLoad(String),

    // ── Discovery ───────────────────────────────────────────────────────────

    #[error("Invalid account handle '{0}'")]
    InvalidHandle(String),

    #[error("WebFinger for '{0}' has no ActivityPub link")]
    NoActivityPubLink(String),

    // ── Remote communication ─────────────────────────────────────────────────

    #[error("HTTP error communicating with remote server '{0}': {1}")]
    RemoteHttp(String, String),

    #[error("Remote server '{0}' returned an unexpected response: {1}")]
    RemoteProtocol(String, String),

    // ── General ─────────────────────────────────────────────────────────────

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<reqwest::Error> for FederationError {
    fn from(e: reqwest::Error) -> Self {
        let server = e.url().map(|u| u.host_str().unwrap_or("?").to_owned()).unwrap_or_default();
        FederationError::RemoteHttp(server, e.to_string())
    }
}
