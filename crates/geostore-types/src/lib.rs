//! Foundation types for geostore.
//!
//! This crate provides the identity and contract types shared by every other
//! geostore crate.
//!
//! # Key Types
//!
//! - [`CellId`] -- Opaque tessellation cell handle with its canonical storage key
//! - [`ItemId`] -- External `<cellId>:<itemKey>` reference to an item in a cell
//! - [`Item`] -- Capability set (position, key, encoding) implemented by stored items
//! - [`Feature`] -- JSON-encoded reference item used by the CLI and tests

pub mod cell_id;
pub mod error;
pub mod feature;
pub mod item;
pub mod item_id;

pub use cell_id::{CellId, CELL_KEY_PREFIX};
pub use error::TypeError;
pub use feature::Feature;
pub use item::{validate_key, validate_position, Item, ItemRef, KEY_SEPARATOR};
pub use item_id::ItemId;
