use std::collections::BTreeMap;
use std::sync::RwLock;

use crate::batch::{BatchOp, WriteBatch};
use crate::error::{KvError, KvResult};
use crate::traits::KvStore;

/// In-memory, `BTreeMap`-based key-value engine.
///
/// Intended for tests and embedding. Entries are held behind a `RwLock`;
/// a batch is applied under one write-lock acquisition, which makes it
/// atomic with respect to every reader.
pub struct InMemoryKv {
    entries: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKv {
    /// Create a new empty engine.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of keys currently stored.
    pub fn len(&self) -> usize {
        self.entries.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the engine holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sorted list of every key.
    pub fn keys(&self) -> KvResult<Vec<Vec<u8>>> {
        let map = self.read_map()?;
        Ok(map.keys().cloned().collect())
    }

    /// Copy of the whole key space, for before/after comparisons.
    pub fn snapshot(&self) -> KvResult<BTreeMap<Vec<u8>, Vec<u8>>> {
        Ok(self.read_map()?.clone())
    }

    fn read_map(
        &self,
    ) -> KvResult<std::sync::RwLockReadGuard<'_, BTreeMap<Vec<u8>, Vec<u8>>>> {
        self.entries
            .read()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))
    }
}

impl Default for InMemoryKv {
    fn default() -> Self {
        Self::new()
    }
}

/// Apply batch operations to an ordered map, in staging order.
pub(crate) fn apply_ops(map: &mut BTreeMap<Vec<u8>, Vec<u8>>, ops: Vec<BatchOp>) {
    for op in ops {
        match op {
            BatchOp::Set { key, value } => {
                map.insert(key, value);
            }
            BatchOp::Delete { key } => {
                map.remove(&key);
            }
        }
    }
}

/// Entries of `map` whose key starts with `prefix`, ascending.
pub(crate) fn scan(
    map: &BTreeMap<Vec<u8>, Vec<u8>>,
    prefix: &[u8],
) -> Vec<(Vec<u8>, Vec<u8>)> {
    map.range(prefix.to_vec()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl KvStore for InMemoryKv {
    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>> {
        Ok(self.read_map()?.get(key).cloned())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>> {
        let map = self.read_map()?;
        Ok(scan(&map, prefix))
    }

    fn write_batch(&self, batch: WriteBatch) -> KvResult<()> {
        let mut map = self
            .entries
            .write()
            .map_err(|e| KvError::LockPoisoned(e.to_string()))?;
        apply_ops(&mut map, batch.into_ops());
        Ok(())
    }
}

impl std::fmt::Debug for InMemoryKv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryKv")
            .field("key_count", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // -----------------------------------------------------------------------
    // Core get / set / delete
    // -----------------------------------------------------------------------

    #[test]
    fn set_and_get() {
        let kv = InMemoryKv::new();
        kv.set(b"cell:1", b"payload").unwrap();
        assert_eq!(kv.get(b"cell:1").unwrap(), Some(b"payload".to_vec()));
    }

    #[test]
    fn get_missing_returns_none() {
        let kv = InMemoryKv::new();
        assert!(kv.get(b"nothing").unwrap().is_none());
    }

    #[test]
    fn delete_removes_key() {
        let kv = InMemoryKv::new();
        kv.set(b"k", b"v").unwrap();
        kv.delete(b"k").unwrap();
        assert!(kv.get(b"k").unwrap().is_none());
        // Deleting again is fine.
        kv.delete(b"k").unwrap();
    }

    // -----------------------------------------------------------------------
    // Batches
    // -----------------------------------------------------------------------

    #[test]
    fn batch_applies_in_order() {
        let kv = InMemoryKv::new();
        let mut batch = WriteBatch::new();
        batch.set("a", "1");
        batch.set("b", "2");
        batch.set("a", "3");
        batch.delete("b");
        kv.write_batch(batch).unwrap();

        assert_eq!(kv.get(b"a").unwrap(), Some(b"3".to_vec()));
        assert!(kv.get(b"b").unwrap().is_none());
        assert_eq!(kv.len(), 1);
    }

    #[test]
    fn empty_batch_is_noop() {
        let kv = InMemoryKv::new();
        kv.write_batch(WriteBatch::new()).unwrap();
        assert!(kv.is_empty());
    }

    #[test]
    fn concurrent_batches_are_atomic_to_readers() {
        use std::sync::Arc;
        use std::thread;

        let kv = Arc::new(InMemoryKv::new());
        let writer = {
            let kv = Arc::clone(&kv);
            thread::spawn(move || {
                for i in 0..200u32 {
                    let v = i.to_le_bytes().to_vec();
                    let mut batch = WriteBatch::new();
                    batch.set("x", v.clone());
                    batch.set("y", v);
                    kv.write_batch(batch).unwrap();
                }
            })
        };

        for _ in 0..200 {
            let snap = kv.snapshot().unwrap();
            assert_eq!(snap.get(&b"x".to_vec()), snap.get(&b"y".to_vec()));
        }
        writer.join().expect("writer should not panic");
    }

    // -----------------------------------------------------------------------
    // Prefix scans
    // -----------------------------------------------------------------------

    #[test]
    fn scan_prefix_is_sorted_and_bounded() {
        let kv = InMemoryKv::new();
        kv.set(b"cell:b", b"2").unwrap();
        kv.set(b"cell:a", b"1").unwrap();
        kv.set(b"celm", b"x").unwrap();
        kv.set(b"item:a", b"i").unwrap();

        let hits = kv.scan_prefix(b"cell:").unwrap();
        let keys: Vec<_> = hits.iter().map(|(k, _)| k.as_slice()).collect();
        assert_eq!(keys, vec![&b"cell:a"[..], &b"cell:b"[..]]);
    }

    #[test]
    fn empty_prefix_scans_everything() {
        let kv = InMemoryKv::new();
        kv.set(b"a", b"1").unwrap();
        kv.set(b"b", b"2").unwrap();
        assert_eq!(kv.scan_prefix(b"").unwrap().len(), 2);
    }

    #[test]
    fn debug_format() {
        let kv = InMemoryKv::new();
        let debug = format!("{kv:?}");
        assert!(debug.contains("key_count"));
    }
}
