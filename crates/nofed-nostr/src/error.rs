//! Nostr client error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum NostrError {
    // ── Keys and signatures ─────────────────────────────────────────────────

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Event id does not match its contents")]
    IdMismatch,

    #[error("Signature verification failed: {0}")]
    InvalidSignature(String),

    #[error("Hex decoding failed: {0}")]
    Hex(#[from] hex::FromHexError),

    // ── Relay communication ─────────────────────────────────────────────────

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Timed out {0}")]
    Timeout(String),

    #[error("Relay '{0}' closed the subscription: {1}")]
    Closed(String, String),

    // ── General ─────────────────────────────────────────────────────────────

    #[error("Serialisation error: {0}")]
    Serialisation(#[from] serde_json::Error),
}

impl From<secp256k1::Error> for NostrError {
    fn from(e: secp256k1::Error) -> Self {
        NostrError::InvalidSignature(e.to_string())
    }
}
