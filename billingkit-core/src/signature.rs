//! Signature checking for authoritative purchase-state pushes.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signature, Verifier, VerifyingKey, PUBLIC_KEY_LENGTH};
use thiserror::Error;
use tracing::warn;

/// Error building a verifier from configuration.
#[derive(Debug, Error)]
pub enum SignatureError {
    /// The configured public key is not a valid base64-encoded Ed25519 key.
    #[error("invalid public key: {0}")]
    InvalidKey(String),
}

/// Checks that a signed payload matches its detached signature.
///
/// Implemented by [`Ed25519Verifier`] by default; deployments using a
/// different scheme inject their own implementation through
/// [`BillingConfig`](crate::BillingConfig).
pub trait SignatureVerifier: Send + Sync {
    /// Returns true when `signature` is a valid signature over the raw
    /// `signed_data` string.
    fn verify(&self, signed_data: &str, signature: &str) -> bool;
}

/// Default verifier: Ed25519 over the raw signed-data bytes, with both the
/// public key and the signature transported as base64 strings.
pub struct Ed25519Verifier {
    key: VerifyingKey,
}

impl Ed25519Verifier {
    /// Builds a verifier from a base64-encoded 32-byte Ed25519 public key.
    ///
    /// # Errors
    ///
    /// Returns [`SignatureError::InvalidKey`] when the key does not decode to
    /// a valid Ed25519 point.
    pub fn new(public_key: &str) -> Result<Self, SignatureError> {
        let raw = BASE64
            .decode(public_key)
            .map_err(|err| SignatureError::InvalidKey(err.to_string()))?;
        let raw: [u8; PUBLIC_KEY_LENGTH] = raw
            .try_into()
            .map_err(|_| SignatureError::InvalidKey("key must be 32 bytes".to_owned()))?;
        let key = VerifyingKey::from_bytes(&raw)
            .map_err(|err| SignatureError::InvalidKey(err.to_string()))?;
        Ok(Self { key })
    }
}

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, signed_data: &str, signature: &str) -> bool {
        let Ok(raw) = BASE64.decode(signature) else {
            warn!("signature is not valid base64");
            return false;
        };
        let Ok(signature) = Signature::from_slice(&raw) else {
            warn!("signature has the wrong length");
            return false;
        };
        self.key.verify(signed_data.as_bytes(), &signature).is_ok()
    }
}

#[cfg(test)]
mod tests {
    use base64::engine::general_purpose::STANDARD as BASE64;
    use base64::Engine as _;
    use ed25519_dalek::{Signer, SigningKey};

    use super::{Ed25519Verifier, SignatureVerifier};

    fn test_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    fn verifier_for(signing_key: &SigningKey) -> Ed25519Verifier {
        let public_key = BASE64.encode(signing_key.verifying_key().as_bytes());
        Ed25519Verifier::new(&public_key).unwrap()
    }

    #[test]
    fn accepts_valid_signatures() {
        let signing_key = test_key();
        let verifier = verifier_for(&signing_key);
        let signed_data = r#"{"nonce": 1, "orders": []}"#;
        let signature = BASE64.encode(signing_key.sign(signed_data.as_bytes()).to_bytes());
        assert!(verifier.verify(signed_data, &signature));
    }

    #[test]
    fn rejects_tampered_data() {
        let signing_key = test_key();
        let verifier = verifier_for(&signing_key);
        let signature = BASE64.encode(signing_key.sign(b"original").to_bytes());
        assert!(!verifier.verify("tampered", &signature));
    }

    #[test]
    fn rejects_garbage_signatures() {
        let verifier = verifier_for(&test_key());
        assert!(!verifier.verify("data", "not base64!"));
        assert!(!verifier.verify("data", &BASE64.encode(b"short")));
    }

    #[test]
    fn rejects_foreign_keys() {
        let verifier = verifier_for(&test_key());
        let other = SigningKey::from_bytes(&[9u8; 32]);
        let signature = BASE64.encode(other.sign(b"data").to_bytes());
        assert!(!verifier.verify("data", &signature));
    }

    #[test]
    fn rejects_malformed_public_keys() {
        assert!(Ed25519Verifier::new("not base64!").is_err());
        assert!(Ed25519Verifier::new(&BASE64.encode(b"too short")).is_err());
    }
}
