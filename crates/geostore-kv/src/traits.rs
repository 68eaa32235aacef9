use crate::batch::WriteBatch;
use crate::error::KvResult;

/// Ordered key-value engine consumed by the geostore.
///
/// All implementations must satisfy these invariants:
/// - `write_batch` is atomic: after it returns `Ok`, every staged operation
///   is visible; after it returns `Err`, none is.
/// - Independent reads and writes are safe from multiple threads.
/// - `scan_prefix` returns entries in ascending key order.
/// - The engine never interprets values.
pub trait KvStore: Send + Sync {
    /// Read the value at `key`.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    fn get(&self, key: &[u8]) -> KvResult<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, in ascending key order.
    fn scan_prefix(&self, prefix: &[u8]) -> KvResult<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Commit every staged operation as a single atomic unit.
    fn write_batch(&self, batch: WriteBatch) -> KvResult<()>;

    /// Write a single key. Default implementation commits a batch of one.
    fn set(&self, key: &[u8], value: &[u8]) -> KvResult<()> {
        let mut batch = WriteBatch::new();
        batch.set(key, value);
        self.write_batch(batch)
    }

    /// Remove a single key. Default implementation commits a batch of one.
    fn delete(&self, key: &[u8]) -> KvResult<()> {
        let mut batch = WriteBatch::new();
        batch.delete(key);
        self.write_batch(batch)
    }

    /// Push buffered writes to durable storage. No-op for volatile engines.
    fn flush(&self) -> KvResult<()> {
        Ok(())
    }
}
