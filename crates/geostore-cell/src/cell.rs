use std::fmt;

use geostore_crypto::{Digest, KeyDigest};
use geostore_types::{CellId, ItemRef};

use crate::codec::encode_cell;
use crate::decoder::DecodeFailure;
use crate::error::{CellError, CellResult};

/// The persisted spatial bucket.
///
/// Items are kept in insertion order and are unique by key. `hash` is the
/// [`KeyDigest::CELL`] digest of the concatenated keys and is refreshed by
/// every mutation method.
#[derive(Clone)]
pub struct Cell {
    id: CellId,
    items: Vec<ItemRef>,
    hash: Digest,
    decode_failures: Vec<DecodeFailure>,
}

impl Cell {
    /// An empty cell.
    pub fn new(id: CellId) -> Self {
        let mut cell = Self {
            id,
            items: Vec::new(),
            hash: [0; 32],
            decode_failures: Vec::new(),
        };
        cell.gen_hash();
        cell
    }

    /// Rebuild a cell from decoded parts, keeping the stored hash as-is.
    pub(crate) fn from_parts(
        id: CellId,
        items: Vec<ItemRef>,
        hash: Digest,
        decode_failures: Vec<DecodeFailure>,
    ) -> Self {
        Self {
            id,
            items,
            hash,
            decode_failures,
        }
    }

    pub fn id(&self) -> CellId {
        self.id
    }

    /// Items in list order.
    pub fn items(&self) -> &[ItemRef] {
        &self.items
    }

    pub fn hash(&self) -> &Digest {
        &self.hash
    }

    /// Items dropped while this cell was decoded under
    /// [`DecodePolicy::Collect`](crate::DecodePolicy::Collect).
    pub fn decode_failures(&self) -> &[DecodeFailure] {
        &self.decode_failures
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Item keys in list order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|item| item.key())
    }

    /// Look up an item by key.
    pub fn get(&self, key: &str) -> Option<&ItemRef> {
        self.items.iter().find(|item| item.key() == key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Append `item` unless its key is already present.
    ///
    /// On `DuplicateKey` the cell is left untouched.
    pub fn add_item(&mut self, item: ItemRef) -> CellResult<()> {
        if self.contains_key(item.key()) {
            return Err(CellError::DuplicateKey {
                cell: self.id,
                key: item.key().to_string(),
            });
        }
        self.items.push(item);
        self.gen_hash();
        Ok(())
    }

    /// Recompute the content hash from the current item list.
    pub fn gen_hash(&mut self) {
        self.hash = KeyDigest::CELL.digest(self.items.iter().map(|item| item.key()));
    }

    /// `true` if the stored hash matches the current item list.
    ///
    /// A cell that lost items during lossy decoding fails this check until
    /// it is mutated and rehashed.
    pub fn verify_hash(&self) -> bool {
        KeyDigest::CELL.verify(self.items.iter().map(|item| item.key()), &self.hash)
    }

    /// Apply `mutator` to the item list, rehash, and encode the result.
    ///
    /// This is the single path used by update and delete. If the mutator
    /// fails, its error is returned and the hash is left stale; callers
    /// discard the cell in that case.
    pub fn process<F>(&mut self, mutator: F) -> CellResult<Vec<u8>>
    where
        F: FnOnce(&mut Vec<ItemRef>) -> CellResult<()>,
    {
        mutator(&mut self.items)?;
        self.gen_hash();
        encode_cell(self)
    }

    /// Remove the item with `key`, rehashing on success.
    pub fn remove(&mut self, key: &str) -> CellResult<ItemRef> {
        let index = self
            .items
            .iter()
            .position(|item| item.key() == key)
            .ok_or_else(|| CellError::KeyNotFound {
                cell: self.id,
                key: key.to_string(),
            })?;
        let removed = self.items.remove(index);
        self.gen_hash();
        Ok(removed)
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cell")
            .field("id", &self.id)
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("hash", &KeyDigest::short_hex(&self.hash))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geostore_types::Feature;
    use proptest::prelude::*;
    use std::sync::Arc;

    fn item(key: &str) -> ItemRef {
        Arc::new(Feature::point(key, 1.0, 2.0))
    }

    fn digest(keys: &[&str]) -> Digest {
        KeyDigest::CELL.digest(keys.iter().copied())
    }

    // -----------------------------------------------------------------------
    // Membership
    // -----------------------------------------------------------------------

    #[test]
    fn new_cell_hashes_empty_key_list() {
        let cell = Cell::new(CellId::new(1));
        assert!(cell.is_empty());
        assert_eq!(cell.hash(), &digest(&[]));
        assert!(cell.verify_hash());
    }

    #[test]
    fn add_item_appends_and_rehashes() {
        let mut cell = Cell::new(CellId::new(1));
        cell.add_item(item("a")).unwrap();
        cell.add_item(item("b")).unwrap();
        assert_eq!(cell.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(cell.hash(), &digest(&["a", "b"]));
    }

    #[test]
    fn duplicate_key_leaves_cell_untouched() {
        let mut cell = Cell::new(CellId::new(9));
        cell.add_item(item("a")).unwrap();
        let before_hash = *cell.hash();
        let before_bytes = encode_cell(&cell).unwrap();

        let err = cell
            .add_item(Arc::new(Feature::point("a", 50.0, 50.0)))
            .unwrap_err();
        assert!(matches!(err, CellError::DuplicateKey { ref key, .. } if key == "a"));
        assert_eq!(cell.len(), 1);
        assert_eq!(cell.hash(), &before_hash);
        assert_eq!(encode_cell(&cell).unwrap(), before_bytes);
    }

    #[test]
    fn hash_ignores_payloads() {
        let mut a = Cell::new(CellId::new(1));
        let mut b = Cell::new(CellId::new(1));
        a.add_item(Arc::new(Feature::point("k", 1.0, 1.0))).unwrap();
        b.add_item(Arc::new(Feature::point("k", 9.0, 9.0).with_property("x", 1)))
            .unwrap();
        assert_eq!(a.hash(), b.hash());
    }

    // -----------------------------------------------------------------------
    // Mutation paths
    // -----------------------------------------------------------------------

    #[test]
    fn process_rehashes_and_encodes() {
        let mut cell = Cell::new(CellId::new(3));
        cell.add_item(item("a")).unwrap();
        cell.add_item(item("b")).unwrap();

        let bytes = cell
            .process(|items| {
                items.reverse();
                Ok(())
            })
            .unwrap();
        assert_eq!(cell.hash(), &digest(&["b", "a"]));
        assert_eq!(bytes, encode_cell(&cell).unwrap());
    }

    #[test]
    fn process_propagates_mutator_error() {
        let mut cell = Cell::new(CellId::new(3));
        let id = cell.id();
        let err = cell
            .process(|_| {
                Err(CellError::KeyNotFound {
                    cell: id,
                    key: "missing".into(),
                })
            })
            .unwrap_err();
        assert!(matches!(err, CellError::KeyNotFound { .. }));
    }

    #[test]
    fn remove_rehashes() {
        let mut cell = Cell::new(CellId::new(1));
        cell.add_item(item("a")).unwrap();
        cell.add_item(item("b")).unwrap();
        let removed = cell.remove("a").unwrap();
        assert_eq!(removed.key(), "a");
        assert_eq!(cell.hash(), &digest(&["b"]));
        assert!(matches!(
            cell.remove("a"),
            Err(CellError::KeyNotFound { .. })
        ));
    }

    #[test]
    fn debug_lists_keys() {
        let mut cell = Cell::new(CellId::new(1));
        cell.add_item(item("a")).unwrap();
        let debug = format!("{cell:?}");
        assert!(debug.contains("\"a\""));
        assert!(debug.contains("CellId"));
    }

    proptest! {
        #[test]
        fn hash_tracks_key_list(keys in proptest::collection::vec("[a-z]{1,6}", 0..12)) {
            let mut cell = Cell::new(CellId::new(5));
            let mut accepted: Vec<String> = Vec::new();
            for k in &keys {
                if cell.add_item(item(k)).is_ok() {
                    accepted.push(k.clone());
                }
            }
            let concat: Vec<u8> = accepted.iter().flat_map(|k| k.bytes()).collect();
            prop_assert_eq!(*cell.hash(), KeyDigest::CELL.digest_bytes(&concat));
            prop_assert!(cell.verify_hash());
        }
    }
}
