use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::cell_id::CellId;
use crate::error::TypeError;
use crate::item::KEY_SEPARATOR;

/// External reference to an item stored in a specific cell.
///
/// Textual form is `<cellId-decimal>:<itemKey>`. An id produced by an insert
/// names the item's home cell, which is the first cell of its covering; the
/// full covering is recomputed from the stored geometry when needed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ItemId {
    cell: CellId,
    key: String,
}

impl ItemId {
    /// Build an id from its parts. The key is not validated here.
    pub fn new(cell: CellId, key: impl Into<String>) -> Self {
        Self {
            cell,
            key: key.into(),
        }
    }

    /// The cell the id points into.
    pub fn cell(&self) -> CellId {
        self.cell
    }

    /// The item key within that cell.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Parse `<cellId-decimal>:<itemKey>`.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        let malformed = |reason: &str| TypeError::MalformedItemId {
            id: s.to_string(),
            reason: reason.to_string(),
        };

        let (cell, key) = s
            .split_once(KEY_SEPARATOR)
            .ok_or_else(|| malformed("missing ':' separator"))?;
        let raw = cell
            .parse::<u64>()
            .map_err(|_| malformed("cell component is not a decimal integer"))?;
        if key.is_empty() {
            return Err(malformed("empty item key"));
        }
        if key.contains(KEY_SEPARATOR) {
            return Err(malformed("item key contains ':'"));
        }
        Ok(Self::new(CellId::new(raw), key))
    }
}

impl fmt::Debug for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ItemId({self})")
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{KEY_SEPARATOR}{}", self.cell, self.key)
    }
}

impl FromStr for ItemId {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ItemId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ItemId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
