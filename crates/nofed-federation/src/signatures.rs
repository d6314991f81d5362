//! HTTP Signatures for outbound deliveries.
//!
//! Remote servers authenticate inbox POSTs with draft-cavage HTTP Signatures.
//! Deliveries carry:
//!
//! ```text
//! Date:      Tue, 07 Jun 2024 20:51:35 GMT
//! Digest:    SHA-256=<base64 body digest>
//! Signature: keyId="https://bridge.example/pub#main-key",
//!            algorithm="hs2019",
//!            headers="(request-target) host date digest",
//!            signature="<base64 Ed25519 signature>"
//! ```
//!
//! The signed content is the newline-joined list of `name: value` lines for
//! each header named in `headers`, in that order.

use base64::Engine as _;
use chrono::Utc;
use sha2::{Digest, Sha256};
use url::Url;

use crate::{error::FederationError, keys::ServerKeyPair};

const SIGNED_HEADERS: &str = "(request-target) host date digest";

// ─── Signing ─────────────────────────────────────────────────────────────────

/// Headers to attach to a signed request.
#[derive(Debug, Clone)]
pub struct SignedHeaders {
    pub host: String,
    pub date: String,
    pub digest: String,
    pub signature: String,
}

/// Sign a request to `url` with `body`.
///
/// * `method`: HTTP method, any case (lowercased in the signing string)
/// * `key_id`: URL of the public key, as published on the signing actor
pub fn sign_request(
    kp: &ServerKeyPair,
    key_id: &str,
    method: &str,
    url: &str,
    body: &[u8],
) -> Result<SignedHeaders, FederationError> {
    let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
    sign_request_at(kp, key_id, method, url, body, date)
}

fn sign_request_at(
    kp: &ServerKeyPair,
    key_id: &str,
    method: &str,
    url: &str,
    body: &[u8],
    date: String,
) -> Result<SignedHeaders, FederationError> {
    let parsed = Url::parse(url)?;
    let host = host_header(&parsed)?;
    let digest = body_digest(body);

    let signing_string = signing_string(method, &request_target(&parsed), &host, &date, &digest);
    let sig = kp.sign_bytes(signing_string.as_bytes());
    let signature = format!(r#"keyId="{key_id}",algorithm="hs2019",headers="{SIGNED_HEADERS}",signature="{sig}""#);

    Ok(SignedHeaders { host, date, digest, signature })
}

/// `SHA-256=<base64>` of the request body.
pub fn body_digest(body: &[u8]) -> String {
    format!("SHA-256={}", base64::engine::general_purpose::STANDARD.encode(Sha256::digest(body)))
}

// ─── Internals ───────────────────────────────────────────────────────────────

fn signing_string(method: &str, target: &str, host: &str, date: &str, digest: &str) -> String {
    format!(
        "(request-target): {} {}\nhost: {}\ndate: {}\ndigest: {}",
        method.to_lowercase(),
        target,
        host,
        date,
        digest
    )
}

fn request_target(url: &Url) -> String {
    match url.query() {
        Some(q) => format!("{}?{}", url.path(), q),
        None => url.path().to_owned(),
    }
}

fn host_header(url: &Url) -> Result<String, FederationError> {
    let host = url
        .host_str()
        .ok_or_else(|| FederationError::RemoteProtocol(url.to_string(), "URL has no host".into()))?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::verify_signature;

    const DATE: &str = "Tue, 07 Jun 2024 20:51:35 GMT";

    fn extract(header: &str, field: &str) -> String {
        let start = header.find(&format!("{field}=\"")).unwrap() + field.len() + 2;
        let rest = &header[start..];
        rest[..rest.find('"').unwrap()].to_owned()
    }

    #[test]
    fn signature_covers_target_host_date_and_digest() {
        let kp = ServerKeyPair::from_secret("hunter2").unwrap();
        let body = br#"{"type":"Accept"}"#;
        let signed = sign_request_at(
            &kp,
            "https://bridge.example/pub#main-key",
            "POST",
            "https://fed.example:8443/users/alice/inbox?x=1",
            body,
            DATE.into(),
        )
        .unwrap();

        assert_eq!(signed.host, "fed.example:8443");
        assert_eq!(signed.digest, body_digest(body));
        assert_eq!(extract(&signed.signature, "keyId"), "https://bridge.example/pub#main-key");
        assert_eq!(extract(&signed.signature, "headers"), SIGNED_HEADERS);

        let expected = format!(
            "(request-target): post /users/alice/inbox?x=1\nhost: fed.example:8443\ndate: {DATE}\ndigest: {}",
            signed.digest
        );
        verify_signature(&kp.verifying_key(), &extract(&signed.signature, "signature"), expected.as_bytes())
            .unwrap();
    }

    #[test]
    fn digest_is_base64_sha256() {
        assert_eq!(body_digest(b""), "SHA-256=47DEQpj8HBSa+/TImW+5JCeuQeRkm5NMpJWZG3hSuFU=");
    }

    #[test]
    fn relative_urls_are_rejected() {
        let kp = ServerKeyPair::from_secret("hunter2").unwrap();
        assert!(sign_request(&kp, "k", "POST", "/inbox", b"").is_err());
    }
}
