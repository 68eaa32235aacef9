//! Ordered key-value collaborator for geostore.
//!
//! Geostore persists every cell as one record in an ordered key-value engine
//! and relies on the engine for a single guarantee: a [`WriteBatch`] commits
//! atomically, so every staged key lands or none does.
//!
//! # Engines
//!
//! All engines implement the [`KvStore`] trait:
//!
//! - [`InMemoryKv`] -- `BTreeMap`-based engine for tests and embedding
//! - [`LogKv`] -- append-only, CRC-framed batch log replayed on open
//!
//! # Design Rules
//!
//! 1. Keys are ordered bytewise; prefix scans return ascending keys.
//! 2. A batch is applied under a single lock acquisition (in memory) or a
//!    single frame (on disk). A torn frame is discarded on recovery.
//! 3. The engine never interprets values.
//! 4. All I/O errors are propagated, never silently ignored.

pub mod batch;
pub mod error;
pub mod log;
pub mod memory;
pub mod traits;

pub use batch::{BatchOp, WriteBatch};
pub use error::{KvError, KvResult};
pub use log::{LogKv, LogKvConfig, SyncMode};
pub use memory::InMemoryKv;
pub use traits::KvStore;
