//! Spatial buckets for geostore.
//!
//! A [`Cell`] is the unit of storage: the ordered, key-unique list of items
//! that fall into one tessellation cell, plus a content hash over their keys.
//! [`codec`] turns a cell into the opaque record persisted in the key-value
//! engine and back.
//!
//! # Invariants
//!
//! 1. Item keys are unique within a cell; appending a duplicate is rejected
//!    without touching the cell.
//! 2. The hash is the digest of the item keys in list order and is recomputed
//!    by every mutation path before the cell can be encoded.
//! 3. The hash binds membership and order only. Two cells with the same keys
//!    in the same order hash identically whatever their payloads are.
//! 4. How undecodable items are handled on reconstruction is an explicit
//!    [`DecodePolicy`], never an implicit side effect.

pub mod cell;
pub mod codec;
pub mod decoder;
pub mod error;

pub use cell::Cell;
pub use codec::{decode_cell, encode_cell, CellRecord};
pub use decoder::{DecodeFailure, DecodePolicy, ItemDecoder, SharedDecoder};
pub use error::{CellError, CellResult};
