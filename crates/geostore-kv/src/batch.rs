use serde::{Deserialize, Serialize};

/// A single staged write.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    Set { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOp {
    /// The key this operation touches.
    pub fn key(&self) -> &[u8] {
        match self {
            Self::Set { key, .. } | Self::Delete { key } => key,
        }
    }
}

/// Ordered set of writes committed as one atomic unit.
///
/// Operations apply in staging order, so a later write to the same key wins.
/// Nothing touches the engine until the batch is handed to
/// [`KvStore::write_batch`](crate::KvStore::write_batch).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage `key = value`.
    pub fn set(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Set {
            key: key.into(),
            value: value.into(),
        });
    }

    /// Stage the removal of `key`. Removing an absent key is not an error.
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) {
        self.ops.push(BatchOp::Delete { key: key.into() });
    }

    /// Number of staged operations.
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// Returns `true` if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Staged operations in order.
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

impl From<Vec<BatchOp>> for WriteBatch {
    fn from(ops: Vec<BatchOp>) -> Self {
        Self { ops }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ops_keep_staging_order() {
        let mut batch = WriteBatch::new();
        batch.set("a", "1");
        batch.delete("b");
        batch.set("a", "2");

        assert_eq!(batch.len(), 3);
        let keys: Vec<&[u8]> = batch.ops().iter().map(BatchOp::key).collect();
        assert_eq!(keys, vec![&b"a"[..], &b"b"[..], &b"a"[..]]);
    }

    #[test]
    fn new_batch_is_empty() {
        assert!(WriteBatch::new().is_empty());
    }
}
