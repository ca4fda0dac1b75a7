/// Snapshot-before-write / compare-and-restore over a `QueryCache` entry.
///
/// `begin` captures the current entry, `write` stores the optimistic value and
/// remembers the version it produced, `rollback` puts the snapshot back only
/// while the entry is still at that version. A newer writer always wins over
/// a rollback.
use super::{CachedBoard, QueryCache, QueryKey};
use crate::types::Board;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollbackOutcome {
    /// The snapshot is back in the cache.
    Restored,
    /// There was no snapshot, or nothing was written, so nothing to undo.
    NothingToRestore,
    /// Someone wrote the entry after us; their value was left in place.
    Superseded,
}

pub struct CacheTransaction<'a> {
    cache: &'a dyn QueryCache,
    key: QueryKey,
    snapshot: Option<CachedBoard>,
    written_version: Option<u64>,
}

impl<'a> CacheTransaction<'a> {
    pub fn begin(cache: &'a dyn QueryCache, key: &QueryKey) -> Self {
        let snapshot = cache.read(key);
        Self {
            cache,
            key: key.clone(),
            snapshot,
            written_version: None,
        }
    }

    pub fn snapshot(&self) -> Option<&Board> {
        self.snapshot.as_ref().map(|s| &s.board)
    }

    pub fn write(&mut self, board: Board) -> u64 {
        let version = self.cache.write(&self.key, board);
        self.written_version = Some(version);
        version
    }

    pub fn commit(self) {}

    pub fn rollback(self) -> RollbackOutcome {
        let (snapshot, written) = match (self.snapshot, self.written_version) {
            (Some(snapshot), Some(written)) => (snapshot, written),
            _ => return RollbackOutcome::NothingToRestore,
        };
        match self.cache.compare_and_write(&self.key, written, snapshot.board) {
            Some(_) => RollbackOutcome::Restored,
            None => RollbackOutcome::Superseded,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::InMemoryQueryCache;

    fn setup() -> (InMemoryQueryCache, QueryKey, Board) {
        let cache = InMemoryQueryCache::new();
        let key = QueryKey::board("b1");
        let board = Board::new("b1", "Original");
        cache.register(&key);
        cache.write(&key, board.clone());
        (cache, key, board)
    }

    #[test]
    fn test_rollback_restores_snapshot() {
        let (cache, key, board) = setup();

        let mut tx = CacheTransaction::begin(&cache, &key);
        tx.write(Board::new("b1", "Optimistic"));
        assert_eq!(cache.read(&key).unwrap().board.name, "Optimistic");

        assert_eq!(tx.rollback(), RollbackOutcome::Restored);
        assert_eq!(cache.read(&key).unwrap().board, board);
    }

    #[test]
    fn test_commit_keeps_written_value() {
        let (cache, key, _) = setup();

        let mut tx = CacheTransaction::begin(&cache, &key);
        tx.write(Board::new("b1", "Optimistic"));
        tx.commit();
        assert_eq!(cache.read(&key).unwrap().board.name, "Optimistic");
    }

    #[test]
    fn test_rollback_without_snapshot_is_noop() {
        let cache = InMemoryQueryCache::new();
        let key = QueryKey::board("b1");
        cache.register(&key);

        let mut tx = CacheTransaction::begin(&cache, &key);
        assert!(tx.snapshot().is_none());
        tx.write(Board::new("b1", "Optimistic"));

        assert_eq!(tx.rollback(), RollbackOutcome::NothingToRestore);
        assert_eq!(cache.read(&key).unwrap().board.name, "Optimistic");
    }

    #[test]
    fn test_rollback_does_not_clobber_newer_write() {
        let (cache, key, _) = setup();

        let mut tx = CacheTransaction::begin(&cache, &key);
        tx.write(Board::new("b1", "Optimistic"));
        cache.write(&key, Board::new("b1", "Newer"));

        assert_eq!(tx.rollback(), RollbackOutcome::Superseded);
        assert_eq!(cache.read(&key).unwrap().board.name, "Newer");
    }
}
