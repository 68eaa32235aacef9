//! Embedded geospatial indexed store.
//!
//! Items (points, polylines, polygons) are bucketed into the tessellation
//! cells that cover them at a fixed level. Each cell is one record in an
//! ordered key-value engine, and every insert, update or delete touching
//! several cells commits as one atomic batch.
//!
//! ```no_run
//! use std::sync::Arc;
//! use geostore::{Store, StoreConfig};
//! use geostore_kv::InMemoryKv;
//! use geostore_types::Feature;
//!
//! let mut store = Store::new(Arc::new(InMemoryKv::new()), StoreConfig::default())?;
//! store.open(Arc::new(Feature::decode))?;
//! let id = store.insert(Arc::new(Feature::point("a", 40.0, -73.0)))?;
//! assert_eq!(store.get(&id)?.key(), "a");
//! # Ok::<(), geostore::StoreError>(())
//! ```
//!
//! # Key space
//!
//! - `cell:<hex cell id>` -- cell records (see [`geostore_cell::CellRecord`])
//! - `item:<hex cell id>:<item key>` -- raw item encodings, one per covering
//!   cell, maintained in the same batch as the cell records and scanned by
//!   [`Store::get_by_prefix`]
//!
//! # Concurrency
//!
//! Mutations lock every cell they touch (see [`CellLocks`]) from the first
//! read until the batch is committed, so concurrent writers on overlapping
//! cells serialize instead of overwriting each other.

pub mod config;
pub mod error;
pub mod keys;
pub mod locks;
pub mod store;

pub use config::{RadiusMode, StoreConfig};
pub use error::{StoreError, StoreResult};
pub use locks::{CellLockGuard, CellLocks};
pub use store::Store;

pub use geostore_cell::{Cell, DecodePolicy, ItemDecoder, SharedDecoder};
pub use geostore_geo::{GeoKind, GeoMatch, PolylineStrategy};
pub use geostore_types::{CellId, Feature, Item, ItemId, ItemRef};
