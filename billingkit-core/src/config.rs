//! Controller configuration.

use std::sync::Arc;

use crate::signature::SignatureVerifier;

/// Configuration for a [`BillingController`](crate::BillingController).
pub struct BillingConfig {
    /// Caller package identifier, included in every request payload.
    pub package_name: String,
    /// Base64-encoded public key the default verifier checks pushes against.
    pub public_key: String,
    /// Salt keying the at-rest obfuscation of transaction fields. Without a
    /// salt the ledger stores plaintext and warns on every access.
    pub obfuscation_salt: Option<Vec<u8>>,
    /// Explicit trust bypass for local testing: pushes without a signature
    /// are accepted. Never enabled implicitly.
    pub debug: bool,
    /// Replaces the default Ed25519 verifier with a custom scheme.
    pub signature_verifier: Option<Arc<dyn SignatureVerifier>>,
}

impl std::fmt::Debug for BillingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BillingConfig")
            .field("package_name", &self.package_name)
            .field("salted", &self.obfuscation_salt.is_some())
            .field("debug", &self.debug)
            .field("custom_verifier", &self.signature_verifier.is_some())
            .finish()
    }
}

impl BillingConfig {
    /// Creates a configuration with obfuscation disabled, debug off, and the
    /// default signature verifier.
    #[must_use]
    pub fn new(package_name: impl Into<String>, public_key: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            public_key: public_key.into(),
            obfuscation_salt: None,
            debug: false,
            signature_verifier: None,
        }
    }
}
