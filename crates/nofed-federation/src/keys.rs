//! Ed25519 server signing key.
//!
//! The bridge owns exactly one key pair, derived from the configured secret so
//! that restarts (and every replica) present the same identity. It is used for
//! two things:
//!
//! - signing outbound ActivityPub deliveries (`signatures.rs`);
//! - keying the HMAC that derives every bridged Nostr identity. The seed bytes
//!   are that key material, so rotating the secret re-keys all bridged actors.
//!
//! # Key IDs
//! Every bridged actor publishes this key as `<actor id>#main-key`, PEM-encoded
//! SubjectPublicKeyInfo, and deliveries on its behalf reference that id.

use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey, VerifyingKey};
use sha2::{Digest, Sha256};

use crate::error::FederationError;

// DER prefix of an Ed25519 SubjectPublicKeyInfo (RFC 8410); the 32 key bytes follow.
const ED25519_SPKI_PREFIX: [u8; 12] = [0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00];

// ─── Key pair ────────────────────────────────────────────────────────────────

/// The bridge's Ed25519 signing key pair.
pub struct ServerKeyPair {
    signing_key: SigningKey,
}

impl ServerKeyPair {
    /// Derive the key pair from the configured secret. The seed is
    /// `SHA-256(secret)`.
    pub fn from_secret(secret: &str) -> Result<Self, FederationError> {
        if secret.is_empty() {
            return Err(FederationError::KeyLoad("bridge secret must not be empty".into()));
        }
        let seed: [u8; 32] = Sha256::digest(secret.as_bytes()).into();
        Ok(Self { signing_key: SigningKey::from_bytes(&seed) })
    }

    /// Reconstruct a key pair from raw 32-byte seed bytes.
    pub fn from_seed(seed: &[u8]) -> Result<Self, FederationError> {
        let bytes: [u8; 32] = seed
            .try_into()
            .map_err(|_| FederationError::KeyLoad("seed must be exactly 32 bytes".into()))?;
        Ok(Self { signing_key: SigningKey::from_bytes(&bytes) })
    }

    /// The 32-byte seed. Also the HMAC key for identity derivation.
    pub fn seed_bytes(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    pub fn verifying_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Sign arbitrary bytes and return the standard base64 signature.
    pub fn sign_bytes(&self, bytes: &[u8]) -> String {
        let sig = self.signing_key.sign(bytes);
        base64::engine::general_purpose::STANDARD.encode(sig.to_bytes())
    }

    /// The public key as a PEM `PUBLIC KEY` block, as ActivityPub actors
    /// publish it under `publicKey.publicKeyPem`.
    pub fn public_key_pem(&self) -> String {
        let mut der = ED25519_SPKI_PREFIX.to_vec();
        der.extend_from_slice(self.verifying_key().as_bytes());
        let b64 = base64::engine::general_purpose::STANDARD.encode(der);
        format!("-----BEGIN PUBLIC KEY-----\n{b64}\n-----END PUBLIC KEY-----\n")
    }
}

impl std::fmt::Debug for ServerKeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerKeyPair")
            .field("public", &hex_prefix(self.verifying_key().as_bytes()))
            .finish_non_exhaustive()
    }
}

fn hex_prefix(bytes: &[u8]) -> String {
    bytes.iter().take(6).map(|b| format!("{b:02x}")).collect()
}

/// Verify a base64 Ed25519 signature produced by [`ServerKeyPair::sign_bytes`].
pub fn verify_signature(key: &VerifyingKey, sig_base64: &str, message: &[u8]) -> Result<(), FederationError> {
    use ed25519_dalek::Verifier;

    let invalid = || FederationError::KeyLoad("invalid signature encoding".into());
    let sig_bytes = base64::engine::general_purpose::STANDARD
        .decode(sig_base64)
        .map_err(|_| invalid())?;
    let signature = ed25519_dalek::Signature::from_bytes(sig_bytes.as_slice().try_into().map_err(|_| invalid())?);

    key.verify(message, &signature)
        .map_err(|e| FederationError::KeyLoad(format!("signature does not verify: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_secret_same_key() {
        let a = ServerKeyPair::from_secret("hunter2").unwrap();
        let b = ServerKeyPair::from_secret("hunter2").unwrap();
        let c = ServerKeyPair::from_secret("hunter3").unwrap();
        assert_eq!(a.seed_bytes(), b.seed_bytes());
        assert_ne!(a.seed_bytes(), c.seed_bytes());
    }

    #[test]
    fn empty_secret_is_rejected() {
        assert!(matches!(ServerKeyPair::from_secret(""), Err(FederationError::KeyLoad(_))));
    }

    #[test]
    fn round_trip_sign_verify() {
        let kp = ServerKeyPair::from_secret("hunter2").unwrap();
        let sig = kp.sign_bytes(b"hello fediverse");
        verify_signature(&kp.verifying_key(), &sig, b"hello fediverse").unwrap();
        assert!(verify_signature(&kp.verifying_key(), &sig, b"tampered").is_err());
    }

    #[test]
    fn pem_wraps_spki_der() {
        let kp = ServerKeyPair::from_seed(&[7u8; 32]).unwrap();
        let pem = kp.public_key_pem();
        assert!(pem.starts_with("-----BEGIN PUBLIC KEY-----\nMCowBQYDK2VwAyEA"));
        assert!(pem.ends_with("-----END PUBLIC KEY-----\n"));

        let body = pem.lines().nth(1).unwrap();
        let der = base64::engine::general_purpose::STANDARD.decode(body).unwrap();
        assert_eq!(der.len(), 44);
        assert_eq!(&der[12..], kp.verifying_key().as_bytes());
    }
}
