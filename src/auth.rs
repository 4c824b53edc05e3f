//! API key verification.
//!
//! [`KeyStore`] is built once at startup from the configured key set and is
//! the only authentication state in the process. Keys are stored as SHA-256
//! digests and membership is tested with constant-time equality; the scan
//! visits every stored digest regardless of earlier matches, so response
//! timing reveals neither key content nor which key matched.

use crate::config::ServiceConfig;
use crate::error::AuthError;
use sha2::{Digest, Sha256};
use subtle::{Choice, ConstantTimeEq};

/// Header carrying the API key on conversion requests.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Whether the store enforces key checks or admits every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Presented keys are checked against the configured set.
    Enforced,
    /// Empty key set with the explicit open-mode flag: all requests pass.
    Open,
}

/// Process-wide, read-only set of accepted API key digests.
#[derive(Debug, Clone)]
pub struct KeyStore {
    digests: Vec<[u8; 32]>,
    mode: AuthMode,
}

impl KeyStore {
    /// Build the store from a validated [`ServiceConfig`].
    ///
    /// The config builder has already enforced the startup policy, so an
    /// empty key set here implies the operator chose open mode. A non-empty
    /// key set always enforces, even when open mode was also requested.
    pub fn from_config(config: &ServiceConfig) -> Self {
        let digests: Vec<[u8; 32]> = config.api_keys.iter().map(|k| digest(k)).collect();
        let mode = if digests.is_empty() {
            AuthMode::Open
        } else {
            AuthMode::Enforced
        };
        Self { digests, mode }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    /// Check a presented header value against the stored set.
    ///
    /// Constant-time over the whole set: every digest is compared and the
    /// outcomes are OR-ed without short-circuiting.
    pub fn verify(&self, presented: Option<&str>) -> Result<(), AuthError> {
        if self.mode == AuthMode::Open {
            return Ok(());
        }

        let presented = presented.ok_or(AuthError::Missing)?;
        let candidate = digest(presented);

        let mut matched = Choice::from(0u8);
        for stored in &self.digests {
            matched |= stored.as_slice().ct_eq(candidate.as_slice());
        }

        if bool::from(matched) {
            Ok(())
        } else {
            Err(AuthError::Invalid)
        }
    }

    /// Non-secret identifier for audit logs: the first 8 hex characters of
    /// the presented key's SHA-256. Never log the key itself.
    pub fn fingerprint(presented: &str) -> String {
        digest(presented)[..4]
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }
}

fn digest(key: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServiceConfig;

    fn store(keys: &[&str]) -> KeyStore {
        let config = ServiceConfig::builder()
            .api_keys(keys.iter().copied())
            .open_mode(keys.is_empty())
            .build()
            .unwrap();
        KeyStore::from_config(&config)
    }

    #[test]
    fn valid_key_is_accepted() {
        let store = store(&["first-key-0123456789", "second-key-0123456789"]);
        assert!(store.verify(Some("second-key-0123456789")).is_ok());
    }

    #[test]
    fn wrong_key_is_rejected() {
        let store = store(&["first-key-0123456789"]);
        assert_eq!(
            store.verify(Some("not-the-key")).unwrap_err(),
            AuthError::Invalid
        );
    }

    #[test]
    fn missing_header_is_rejected() {
        let store = store(&["first-key-0123456789"]);
        assert_eq!(store.verify(None).unwrap_err(), AuthError::Missing);
    }

    #[test]
    fn open_mode_admits_everything() {
        let store = store(&[]);
        assert_eq!(store.mode(), AuthMode::Open);
        assert!(store.verify(None).is_ok());
        assert!(store.verify(Some("anything")).is_ok());
    }

    #[test]
    fn fingerprint_is_stable_and_short() {
        let a = KeyStore::fingerprint("some-key");
        let b = KeyStore::fingerprint("some-key");
        assert_eq!(a, b);
        assert_eq!(a.len(), 8);
        assert_ne!(a, KeyStore::fingerprint("other-key"));
    }

    #[test]
    fn fingerprint_does_not_leak_key() {
        let fp = KeyStore::fingerprint("super-secret-key-material");
        assert!(!fp.contains("secret"));
    }
}
