use geostore_cell::CellError;
use geostore_geo::GeoError;
use geostore_kv::KvError;
use geostore_types::{CellId, TypeError};
use thiserror::Error;

/// Errors surfaced by [`Store`](crate::Store) operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The store has not been opened, or has been closed.
    #[error("store is not open")]
    NotOpen,

    /// `open` was called on a store that is already open.
    #[error("store is already open")]
    AlreadyOpen,

    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// An update would move an item into a different set of cells.
    #[error("update of item {key:?} changes its covering cells")]
    CoveringChanged { key: String },

    #[error("invalid item key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    /// An item with the same key already lives in a covering cell.
    #[error("item {key:?} already exists in cell {cell}")]
    DuplicateKey { cell: CellId, key: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed item id {id:?}: {reason}")]
    MalformedItemId { id: String, reason: String },

    /// A stored record or item failed to decode.
    #[error("decode error: {0}")]
    Decode(String),

    /// An item or cell failed to encode.
    #[error("encode error: {0}")]
    Encode(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    #[error("kv error: {0}")]
    Kv(#[from] KvError),
}

impl From<TypeError> for StoreError {
    fn from(e: TypeError) -> Self {
        match e {
            TypeError::MalformedItemId { id, reason } => Self::MalformedItemId { id, reason },
            TypeError::InvalidKey { key, reason } => Self::InvalidKey { key, reason },
            TypeError::InvalidGeometry(reason) => Self::InvalidGeometry(reason),
            TypeError::InvalidHex(reason) | TypeError::Decode(reason) => Self::Decode(reason),
            TypeError::Encode(reason) => Self::Encode(reason),
        }
    }
}

impl From<GeoError> for StoreError {
    fn from(e: GeoError) -> Self {
        match e {
            GeoError::InvalidGeometry(reason) => Self::InvalidGeometry(reason),
            level @ GeoError::InvalidLevel { .. } => Self::Config(level.to_string()),
        }
    }
}

impl From<CellError> for StoreError {
    fn from(e: CellError) -> Self {
        match e {
            CellError::DuplicateKey { cell, key } => Self::DuplicateKey { cell, key },
            CellError::KeyNotFound { cell, key } => {
                Self::NotFound(format!("item {key:?} in cell {cell}"))
            }
            CellError::ItemEncode { .. } | CellError::Serialization(_) => {
                Self::Encode(e.to_string())
            }
            CellError::ItemDecode { .. } | CellError::CorruptRecord(_) => {
                Self::Decode(e.to_string())
            }
        }
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
