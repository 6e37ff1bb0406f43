//! One-way hashing of passwords and security answers.

use std::fmt::Display;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A hex-encoded SHA-256 digest of a credential.
///
/// The digest is deterministic, so equality of two hashes implies equality
/// of their inputs for the purposes of credential matching. Rows store the
/// digest, never the plaintext.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialHash(String);

impl CredentialHash {
    /// Hash a credential string.
    pub fn digest(input: &str) -> Self {
        let hash = Sha256::digest(input.as_bytes());

        Self(hex::encode(hash))
    }

    /// Wrap an already-hashed value read back from storage.
    ///
    /// The caller should ensure that `raw_digest` is a hex SHA-256 digest.
    pub fn new_unchecked(raw_digest: &str) -> Self {
        Self(raw_digest.to_string())
    }

    /// Check whether `input` hashes to this digest.
    pub fn matches(&self, input: &str) -> bool {
        Self::digest(input) == *self
    }
}

impl AsRef<str> for CredentialHash {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl Display for CredentialHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
