use std::collections::{BTreeSet, HashSet};
use std::sync::{Condvar, Mutex};

use geostore_types::CellId;
use tracing::trace;

use crate::error::{StoreError, StoreResult};

/// Per-cell exclusion for read-modify-write cycles.
///
/// A writer claims every cell it will touch in one step, blocking until
/// none of them is held by another writer. Claiming the whole set at once
/// means two writers with overlapping cell sets can never each hold half
/// of the other's cells.
#[derive(Debug, Default)]
pub struct CellLocks {
    held: Mutex<HashSet<CellId>>,
    released: Condvar,
}

impl CellLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until every cell in `cells` is free, then claim them all.
    pub fn lock(&self, cells: impl IntoIterator<Item = CellId>) -> StoreResult<CellLockGuard<'_>> {
        let cells: BTreeSet<CellId> = cells.into_iter().collect();
        let mut held = self
            .held
            .lock()
            .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        while cells.iter().any(|cell| held.contains(cell)) {
            held = self
                .released
                .wait(held)
                .map_err(|e| StoreError::LockPoisoned(e.to_string()))?;
        }
        held.extend(cells.iter().copied());
        trace!(cells = cells.len(), "cell locks acquired");
        Ok(CellLockGuard { locks: self, cells })
    }

    /// Number of cells currently claimed.
    pub fn held_count(&self) -> usize {
        self.held.lock().map(|held| held.len()).unwrap_or(0)
    }
}

/// Releases its cells when dropped.
#[derive(Debug)]
pub struct CellLockGuard<'a> {
    locks: &'a CellLocks,
    cells: BTreeSet<CellId>,
}

impl Drop for CellLockGuard<'_> {
    fn drop(&mut self) {
        let mut held = match self.locks.held.lock() {
            Ok(held) => held,
            Err(poisoned) => poisoned.into_inner(),
        };
        for cell in &self.cells {
            held.remove(cell);
        }
        drop(held);
        self.locks.released.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;

    fn ids(raw: &[u64]) -> Vec<CellId> {
        raw.iter().copied().map(CellId::new).collect()
    }

    #[test]
    fn guard_releases_on_drop() {
        let locks = CellLocks::new();
        {
            let _guard = locks.lock(ids(&[3, 1, 2, 1])).unwrap();
            assert_eq!(locks.held_count(), 3);
        }
        assert_eq!(locks.held_count(), 0);
    }

    #[test]
    fn disjoint_sets_do_not_block() {
        let locks = CellLocks::new();
        let _a = locks.lock(ids(&[1, 2])).unwrap();
        let _b = locks.lock(ids(&[3, 4])).unwrap();
        assert_eq!(locks.held_count(), 4);
    }

    #[test]
    fn overlapping_sets_are_exclusive() {
        let locks = Arc::new(CellLocks::new());
        let inside = Arc::new(AtomicUsize::new(0));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let locks = Arc::clone(&locks);
                let inside = Arc::clone(&inside);
                thread::spawn(move || {
                    for _ in 0..50 {
                        // Every set shares cell 0 with every other.
                        let _guard = locks.lock(ids(&[0, i + 1])).unwrap();
                        assert_eq!(inside.fetch_add(1, Ordering::SeqCst), 0);
                        inside.fetch_sub(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(locks.held_count(), 0);
    }
}
