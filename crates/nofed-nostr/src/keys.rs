//! secp256k1 key pairs for signing bridged events.

use std::fmt;

use secp256k1::{Keypair, Message, Secp256k1, XOnlyPublicKey};

use crate::error::NostrError;

/// A Nostr identity: a secp256k1 secret key and its x-only public key.
#[derive(Clone)]
pub struct Keys {
    keypair: Keypair,
    public: XOnlyPublicKey,
}

impl Keys {
    /// Build a key pair from 32 raw secret key bytes.
    ///
    /// Fails when the bytes are zero or not below the curve order.
    pub fn from_secret_bytes(secret: &[u8]) -> Result<Self, NostrError> {
        let secp = Secp256k1::signing_only();
        let keypair = Keypair::from_seckey_slice(&secp, secret)
            .map_err(|e| NostrError::InvalidKey(e.to_string()))?;
        let (public, _parity) = keypair.x_only_public_key();
        Ok(Self { keypair, public })
    }

    /// Build a key pair from a hex-encoded secret key.
    pub fn from_secret_hex(secret: &str) -> Result<Self, NostrError> {
        Self::from_secret_bytes(&hex::decode(secret)?)
    }

    /// The x-only public key, hex encoded (the event `pubkey` field).
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.serialize())
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.keypair.secret_bytes())
    }

    /// Schnorr-sign a 32-byte digest, returning the hex signature.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<String, NostrError> {
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest_slice(digest)?;
        let sig = secp.sign_schnorr_no_aux_rand(&msg, &self.keypair);
        Ok(sig.to_string())
    }
}

impl fmt::Debug for Keys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keys")
            .field("public", &self.public_key_hex())
            .finish_non_exhaustive()
    }
}
