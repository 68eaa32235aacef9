//! Layout of the item namespace.
//!
//! Cell records live under `cell:<hex>` (see
//! [`CellId::storage_key`](geostore_types::CellId::storage_key)). Alongside
//! them, every covering cell of an item gets an entry
//! `item:<hex cell id>:<item key>` holding the item's raw encoding. Prefix
//! queries scan this namespace only.

use geostore_types::CellId;

/// Prefix of every item entry.
pub const ITEM_KEY_PREFIX: &str = "item:";

/// Key of the item entry for `key` in `cell`.
pub fn item_record_key(cell: CellId, key: &str) -> Vec<u8> {
    format!("{ITEM_KEY_PREFIX}{}:{key}", cell.to_hex()).into_bytes()
}

/// Scan prefix for item entries whose `<hex cell id>:<item key>` suffix
/// starts with `prefix`.
pub fn item_scan_prefix(prefix: &str) -> Vec<u8> {
    format!("{ITEM_KEY_PREFIX}{prefix}").into_bytes()
}

/// Split an item entry key back into its cell and item key.
pub fn parse_item_record_key(raw: &[u8]) -> Option<(CellId, &str)> {
    let rest = std::str::from_utf8(raw).ok()?.strip_prefix(ITEM_KEY_PREFIX)?;
    let (hex, key) = rest.split_once(':')?;
    let cell = CellId::from_hex(hex).ok()?;
    Some((cell, key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn item_key_layout() {
        let cell = CellId::new(0x89c2_5000_0000_0000);
        assert_eq!(item_record_key(cell, "road-7"), b"item:89c2500000000000:road-7".to_vec());
    }

    #[test]
    fn parse_inverts_layout() {
        let cell = CellId::new(0xabc);
        let raw = item_record_key(cell, "k");
        assert_eq!(parse_item_record_key(&raw), Some((cell, "k")));
        assert_eq!(parse_item_record_key(b"cell:abc"), None);
        assert_eq!(parse_item_record_key(b"item:nothex:k"), None);
    }

    #[test]
    fn scan_prefix_stays_in_item_namespace() {
        assert_eq!(item_scan_prefix(""), b"item:".to_vec());
        assert_eq!(item_scan_prefix("89c"), b"item:89c".to_vec());
    }
}
