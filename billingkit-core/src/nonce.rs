//! Single-use anti-replay nonces.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use rand::rngs::OsRng;
use rand::RngCore;

/// Registry of issued, not-yet-consumed nonces.
///
/// A nonce is valid at most once: [`NonceRegistry::release`] removes it, so a
/// signed payload replaying an already-consumed nonce fails its
/// [`NonceRegistry::is_known`] check.
#[derive(Debug, Default)]
pub struct NonceRegistry {
    nonces: Mutex<HashSet<u64>>,
}

impl NonceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Draws a fresh nonce from the OS RNG and registers it.
    pub fn issue(&self) -> u64 {
        let mut nonces = self.lock();
        loop {
            let nonce = OsRng.next_u64();
            if nonces.insert(nonce) {
                return nonce;
            }
        }
    }

    /// Returns true when `nonce` was issued here and not yet consumed.
    pub fn is_known(&self, nonce: u64) -> bool {
        self.lock().contains(&nonce)
    }

    /// Removes `nonce` from the registry, returning whether it was known.
    ///
    /// Called both when a verified payload consumes its nonce and when a
    /// request that carried one failed before completion.
    pub fn release(&self, nonce: u64) -> bool {
        self.lock().remove(&nonce)
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<u64>> {
        self.nonces.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::NonceRegistry;

    #[test]
    fn issued_nonces_are_known_until_released() {
        let registry = NonceRegistry::new();
        let nonce = registry.issue();
        assert!(registry.is_known(nonce));
        assert!(registry.release(nonce));
        assert!(!registry.is_known(nonce));
    }

    #[test]
    fn release_consumes_exactly_once() {
        let registry = NonceRegistry::new();
        let nonce = registry.issue();
        assert!(registry.release(nonce));
        assert!(!registry.release(nonce));
    }

    #[test]
    fn foreign_nonces_are_unknown() {
        let registry = NonceRegistry::new();
        registry.issue();
        assert!(!registry.is_known(0));
        assert!(!registry.release(0));
    }

    #[test]
    fn issues_distinct_nonces() {
        let registry = NonceRegistry::new();
        let a = registry.issue();
        let b = registry.issue();
        assert_ne!(a, b);
        assert!(registry.is_known(a));
        assert!(registry.is_known(b));
    }
}
