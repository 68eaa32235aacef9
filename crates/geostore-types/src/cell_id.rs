use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Prefix of every cell record key in the key-value collaborator.
pub const CELL_KEY_PREFIX: &str = "cell:";

/// Opaque handle of a tessellation cell at a fixed resolution level.
///
/// The wrapped integer is whatever the tessellation produced; geostore never
/// interprets its bits. `Display` renders the decimal form used inside
/// [`ItemId`](crate::ItemId) strings, while [`storage_key`](Self::storage_key)
/// renders the hexadecimal form used for persisted cell records.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CellId(u64);

impl CellId {
    /// Wrap a raw tessellation handle.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw tessellation handle.
    pub const fn raw(&self) -> u64 {
        self.0
    }

    /// Lowercase hexadecimal form without leading zeros.
    pub fn to_hex(&self) -> String {
        format!("{:x}", self.0)
    }

    /// Parse the hexadecimal form produced by [`to_hex`](Self::to_hex).
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|e| TypeError::InvalidHex(format!("{s:?}: {e}")))
    }

    /// Canonical key of this cell's record: `cell:<hex>`.
    pub fn storage_key(&self) -> Vec<u8> {
        format!("{CELL_KEY_PREFIX}{}", self.to_hex()).into_bytes()
    }

    /// Recover a cell id from a key produced by [`storage_key`](Self::storage_key).
    pub fn from_storage_key(key: &[u8]) -> Option<Self> {
        let key = std::str::from_utf8(key).ok()?;
        let hex = key.strip_prefix(CELL_KEY_PREFIX)?;
        Self::from_hex(hex).ok()
    }
}

impl fmt::Debug for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CellId({:#x})", self.0)
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for CellId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

impl From<CellId> for u64 {
    fn from(id: CellId) -> Self {
        id.0
    }
}
