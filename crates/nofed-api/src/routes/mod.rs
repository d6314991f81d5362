//! Route modules, one per resource.

pub mod health;
pub mod icon;
pub mod inbox;
pub mod notes;
pub mod query;
pub mod users;
pub mod well_known;

use axum::{
    http::header,
    response::{IntoResponse, Response},
};
use nofed_common::NofedError;
use nofed_federation::types::ACTIVITY_JSON;
use serde::Serialize;

/// Serialize `body` as `application/activity+json`.
pub(crate) fn activity_json<T: Serialize>(body: &T) -> Result<Response, NofedError> {
    let bytes = serde_json::to_vec(body).map_err(|e| NofedError::Internal(e.into()))?;
    Ok(([(header::CONTENT_TYPE, ACTIVITY_JSON)], bytes).into_response())
}

/// Accept only 64-character hex keys and ids, lowercased.
pub(crate) fn hex64(value: &str, what: &str) -> Result<String, NofedError> {
    if value.len() == 64 && value.bytes().all(|b| b.is_ascii_hexdigit()) {
        Ok(value.to_ascii_lowercase())
    } else {
        Err(NofedError::validation(format!("{what} must be 64 hex characters")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex64_accepts_only_full_length_hex() {
        let key = "AB".repeat(32);
        assert_eq!(hex64(&key, "pubkey").unwrap(), "ab".repeat(32));
        assert!(hex64("abc", "pubkey").is_err());
        assert!(hex64(&"zz".repeat(32), "pubkey").is_err());
    }
}
