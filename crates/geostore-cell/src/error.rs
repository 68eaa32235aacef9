use geostore_types::CellId;

/// Errors from cell mutation and codec operations.
#[derive(Debug, thiserror::Error)]
pub enum CellError {
    /// An item with the same key already lives in the cell.
    #[error("item {key:?} already exists in cell {cell}")]
    DuplicateKey { cell: CellId, key: String },

    /// No item with the key lives in the cell.
    #[error("item {key:?} not found in cell {cell}")]
    KeyNotFound { cell: CellId, key: String },

    /// An item refused to encode itself.
    #[error("failed to encode item {key:?}: {reason}")]
    ItemEncode { key: String, reason: String },

    /// An item blob failed to decode under [`DecodePolicy::Reject`](crate::DecodePolicy::Reject).
    #[error("failed to decode item #{index} of cell {cell}: {reason}")]
    ItemDecode {
        cell: CellId,
        index: usize,
        reason: String,
    },

    /// The cell record itself is unreadable.
    #[error("corrupt cell record: {0}")]
    CorruptRecord(String),

    /// Serialization of the cell record failed.
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Result alias for cell operations.
pub type CellResult<T> = Result<T, CellError>;
