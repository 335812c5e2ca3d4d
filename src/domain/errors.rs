use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid object key: {0}")]
    InvalidObjectKey(String),

    #[error("Unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),

    #[error("Invalid metadata field {field}: {reason}")]
    InvalidMetadataField { field: String, reason: String },
}
