//! Token authentication.
//!
//! Callers pass a bearer token as one of the call's string arguments. The
//! validator compares its SHA-256 digest against configured hex hashes, so
//! plaintext tokens never appear in configuration.

use crate::config::AuthConfig;
use sha2::{Digest, Sha256};
use std::collections::HashSet;

/// Validates call tokens against pre-configured hashes.
#[derive(Debug, Clone, Default)]
pub struct TokenValidator {
    /// Lowercase SHA-256 hex digests.
    hashes: HashSet<String>,
}

impl TokenValidator {
    pub fn new(hashes: impl IntoIterator<Item = String>) -> Self {
        Self {
            hashes: hashes
                .into_iter()
                .map(|h| h.trim().to_ascii_lowercase())
                .filter(|h| !h.is_empty())
                .collect(),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(config.token_hashes.iter().cloned())
    }

    pub fn has_tokens(&self) -> bool {
        !self.hashes.is_empty()
    }

    pub fn token_count(&self) -> usize {
        self.hashes.len()
    }

    /// Returns whether `token` hashes to one of the configured digests.
    /// Always false when no digests are configured.
    pub fn validate(&self, token: &str) -> bool {
        !self.hashes.is_empty() && self.hashes.contains(&Self::hash_token(token))
    }

    /// SHA-256 of `token` as lowercase hex.
    pub fn hash_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }
}
