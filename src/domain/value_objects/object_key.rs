use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::value_objects::HashAlgorithm;

/// Content-addressed object key: lowercase hex digest of the object bytes.
///
/// Only lengths produced by a supported [`HashAlgorithm`] are accepted, which
/// also guarantees a key can never contain path separators.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ObjectKey(String);

impl ObjectKey {
    /// Create from validated hex string
    pub fn from_hex(hex: impl Into<String>) -> Result<Self, DomainError> {
        let hex = hex.into();

        if !HashAlgorithm::KEY_ALGORITHMS.iter().any(|a| a.hex_len() == hex.len()) {
            return Err(DomainError::InvalidObjectKey(format!(
                "unexpected length {}",
                hex.len()
            )));
        }

        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(DomainError::InvalidObjectKey(hex));
        }

        Ok(Self(hex.to_ascii_lowercase()))
    }

    /// Build from raw digest bytes
    pub fn from_digest(digest: &[u8]) -> Result<Self, DomainError> {
        Self::from_hex(hex::encode(digest))
    }

    pub fn as_hex(&self) -> &str {
        &self.0
    }

    /// First 2 characters, used as the shard directory
    pub fn prefix(&self) -> &str {
        &self.0[0..2]
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ObjectKey {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for ObjectKey {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(value)
    }
}

impl From<ObjectKey> for String {
    fn from(key: ObjectKey) -> Self {
        key.0
    }
}
