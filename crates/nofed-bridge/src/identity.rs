//! Deterministic Nostr identities for federation actors.
//!
//! `secret key = HMAC-SHA256(key = server key material, msg = actor URL)`
//!
//! The mapping is a pure function of the actor URL and the server secret, so
//! it never needs to be looked up before use. It is still persisted so that
//! the reverse direction (pubkey → actor URL) can be answered.

use std::sync::Arc;

use hmac::{Hmac, Mac};
use nofed_db::Store;
use nofed_nostr::Keys;
use sha2::Sha256;
use tracing::debug;

use crate::error::BridgeError;

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct IdentityBridge {
    store: Arc<dyn Store>,
    key_material: Arc<[u8; 32]>,
}

impl IdentityBridge {
    pub fn new(store: Arc<dyn Store>, key_material: [u8; 32]) -> Self {
        Self { store, key_material: Arc::new(key_material) }
    }

    /// Derive the keypair for `actor_url` without touching storage.
    pub fn derive_keys(&self, actor_url: &str) -> Result<Keys, BridgeError> {
        let mut mac = HmacSha256::new_from_slice(self.key_material.as_slice())
            .map_err(|e| BridgeError::Malformed(format!("HMAC key: {e}")))?;
        mac.update(actor_url.as_bytes());
        let secret = mac.finalize().into_bytes();
        Ok(Keys::from_secret_bytes(&secret)?)
    }

    /// Derive the keypair for `actor_url` and record the mapping.
    ///
    /// Recording is insert-or-ignore, so calling this for a known actor is
    /// cheap and safe.
    pub async fn keys_for_actor(&self, actor_url: &str) -> Result<Keys, BridgeError> {
        let keys = self.derive_keys(actor_url)?;
        let pubkey = keys.public_key_hex();
        self.store
            .save_nostr_keypair(&pubkey, &keys.secret_key_hex(), actor_url)
            .await?;
        debug!("Bridged identity {} -> {}", actor_url, pubkey);
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nofed_db::MemoryStore;

    const ALICE: &str = "https://fed.example/users/alice";

    #[test]
    fn derivation_is_deterministic_per_secret_and_actor() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let bridge = IdentityBridge::new(store.clone(), [1u8; 32]);

        let a = bridge.derive_keys(ALICE).unwrap();
        let b = bridge.derive_keys(ALICE).unwrap();
        assert_eq!(a.public_key_hex(), b.public_key_hex());
        assert_eq!(a.public_key_hex().len(), 64);

        let other_actor = bridge.derive_keys("https://fed.example/users/bob").unwrap();
        assert_ne!(a.public_key_hex(), other_actor.public_key_hex());

        let other_secret = IdentityBridge::new(store, [2u8; 32]).derive_keys(ALICE).unwrap();
        assert_ne!(a.public_key_hex(), other_secret.public_key_hex());
    }

    #[tokio::test]
    async fn keys_for_actor_records_both_directions() {
        let store = Arc::new(MemoryStore::new());
        let bridge = IdentityBridge::new(store.clone(), [1u8; 32]);

        let keys = bridge.keys_for_actor(ALICE).await.unwrap();
        bridge.keys_for_actor(ALICE).await.unwrap();

        let pubkey = keys.public_key_hex();
        assert_eq!(store.get_actor_url_by_pubkey(&pubkey).await.unwrap().as_deref(), Some(ALICE));
        assert_eq!(store.get_pubkey_by_actor_url(ALICE).await.unwrap(), Some(pubkey));
    }
}
