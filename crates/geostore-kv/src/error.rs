use std::io;

/// Errors from key-value engine operations.
#[derive(Debug, thiserror::Error)]
pub enum KvError {
    /// I/O error from the underlying storage file.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Serialization or deserialization failure of a batch frame.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An internal lock was poisoned by a panicking writer.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),

    /// A log frame failed validation somewhere other than the tail.
    #[error("corrupt log frame at offset {offset}: {reason}")]
    CorruptFrame { offset: u64, reason: String },
}

/// Result alias for key-value operations.
pub type KvResult<T> = Result<T, KvError>;
