//! Bridge error type.

use nofed_common::NofedError;
use nofed_db::StoreError;
use nofed_federation::FederationError;
use nofed_nostr::NostrError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Malformed activity: {0}")]
    Malformed(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Federation(#[from] FederationError),

    #[error(transparent)]
    Nostr(#[from] NostrError),
}

impl From<serde_json::Error> for BridgeError {
    fn from(e: serde_json::Error) -> Self {
        BridgeError::Malformed(e.to_string())
    }
}

impl From<BridgeError> for NofedError {
    fn from(e: BridgeError) -> Self {
        match e {
            BridgeError::NotFound(what) => NofedError::not_found(what),
            BridgeError::Malformed(msg) => NofedError::validation(msg),
            BridgeError::Store(e) => NofedError::Storage(e.to_string()),
            BridgeError::Federation(e) => NofedError::Upstream(e.to_string()),
            BridgeError::Nostr(e) => NofedError::Internal(anyhow::Error::new(e)),
        }
    }
}
