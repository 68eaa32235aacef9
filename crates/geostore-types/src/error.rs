use thiserror::Error;

/// Errors produced by type operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("malformed item id {id:?}: {reason}")]
    MalformedItemId { id: String, reason: String },

    #[error("invalid item key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    #[error("invalid hex string: {0}")]
    InvalidHex(String),

    #[error("item encode error: {0}")]
    Encode(String),

    #[error("item decode error: {0}")]
    Decode(String),
}
