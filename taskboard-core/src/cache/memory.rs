/// In-memory query cache.
///
/// Entries carry a monotonic version and a fetch generation. Cancelling
/// pending fetches bumps the generation, so a response for a fetch begun
/// before the cancel is discarded instead of applied. Every call is appended
/// to an event log so callers can assert on ordering.
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;

use super::{BoardFetcher, CacheError, CachedBoard, QueryCache, QueryKey};
use crate::types::Board;

#[derive(Debug, Clone, PartialEq)]
pub enum CacheEvent {
    Cancel(QueryKey),
    Read(QueryKey),
    Write { key: QueryKey, version: u64 },
    CompareAndWrite { key: QueryKey, applied: bool },
    Invalidate(QueryKey),
    FetchApplied { key: QueryKey, version: u64 },
    FetchDiscarded(QueryKey),
}

/// Handle for a fetch that was started but has not delivered its response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingFetch {
    key: QueryKey,
    generation: u64,
}

#[derive(Debug, Default)]
struct Entry {
    board: Option<Board>,
    version: u64,
    fetch_generation: u64,
    registered: bool,
    stale: bool,
}

pub struct InMemoryQueryCache {
    entries: Mutex<HashMap<QueryKey, Entry>>,
    events: Mutex<Vec<CacheEvent>>,
    fetcher: Option<Arc<dyn BoardFetcher>>,
    next_version: AtomicU64,
}

impl InMemoryQueryCache {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            events: Mutex::new(Vec::new()),
            fetcher: None,
            next_version: AtomicU64::new(1),
        }
    }

    /// Cache whose `invalidate` refetches through `fetcher`.
    pub fn with_fetcher(fetcher: Arc<dyn BoardFetcher>) -> Self {
        Self {
            fetcher: Some(fetcher),
            ..Self::new()
        }
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<QueryKey, Entry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, event: CacheEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }

    fn next_version(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::Relaxed)
    }

    /// Mount a query under `key`.
    pub fn register(&self, key: &QueryKey) {
        self.entries().entry(key.clone()).or_default().registered = true;
    }

    /// Unmount the query; cached data is kept but the key no longer resolves.
    pub fn unregister(&self, key: &QueryKey) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.registered = false;
        }
    }

    pub fn is_stale(&self, key: &QueryKey) -> bool {
        self.entries().get(key).map_or(false, |e| e.stale)
    }

    pub fn events(&self) -> Vec<CacheEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Start a fetch for `key`. The response is handed to `complete_fetch`.
    pub fn begin_fetch(&self, key: &QueryKey) -> PendingFetch {
        let mut entries = self.entries();
        let entry = entries.entry(key.clone()).or_default();
        PendingFetch {
            key: key.clone(),
            generation: entry.fetch_generation,
        }
    }

    /// Deliver a fetch response. Returns false when the fetch was cancelled
    /// in the meantime and the response was discarded.
    pub fn complete_fetch(&self, pending: PendingFetch, board: Board) -> bool {
        let version = self.next_version();
        let applied = {
            let mut entries = self.entries();
            let entry = entries.entry(pending.key.clone()).or_default();
            if entry.fetch_generation == pending.generation {
                entry.board = Some(board);
                entry.version = version;
                entry.stale = false;
                true
            } else {
                false
            }
        };

        if applied {
            self.record(CacheEvent::FetchApplied {
                key: pending.key,
                version,
            });
        } else {
            log::debug!(
                "[taskboard.cache] Discarded response of cancelled fetch for {}",
                pending.key
            );
            self.record(CacheEvent::FetchDiscarded(pending.key));
        }
        applied
    }
}

impl Default for InMemoryQueryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryCache for InMemoryQueryCache {
    fn is_registered(&self, key: &QueryKey) -> bool {
        self.entries().get(key).map_or(false, |e| e.registered)
    }

    async fn cancel_pending(&self, key: &QueryKey) {
        if let Some(entry) = self.entries().get_mut(key) {
            entry.fetch_generation += 1;
        }
        self.record(CacheEvent::Cancel(key.clone()));
    }

    fn read(&self, key: &QueryKey) -> Option<CachedBoard> {
        let value = self.entries().get(key).and_then(|e| {
            e.board.as_ref().map(|board| CachedBoard {
                board: board.clone(),
                version: e.version,
            })
        });
        self.record(CacheEvent::Read(key.clone()));
        value
    }

    fn write(&self, key: &QueryKey, board: Board) -> u64 {
        let version = self.next_version();
        {
            let mut entries = self.entries();
            let entry = entries.entry(key.clone()).or_default();
            entry.board = Some(board);
            entry.version = version;
        }
        self.record(CacheEvent::Write {
            key: key.clone(),
            version,
        });
        version
    }

    fn compare_and_write(&self, key: &QueryKey, expected_version: u64, board: Board) -> Option<u64> {
        let result = {
            let mut entries = self.entries();
            match entries.get_mut(key) {
                Some(entry) if entry.version == expected_version && entry.board.is_some() => {
                    let version = self.next_version();
                    entry.board = Some(board);
                    entry.version = version;
                    Some(version)
                }
                _ => None,
            }
        };
        self.record(CacheEvent::CompareAndWrite {
            key: key.clone(),
            applied: result.is_some(),
        });
        result
    }

    async fn invalidate(&self, key: &QueryKey) -> Result<(), CacheError> {
        {
            let mut entries = self.entries();
            match entries.get_mut(key) {
                Some(entry) if entry.registered => entry.stale = true,
                _ => return Err(CacheError::NotRegistered(key.clone())),
            }
        }
        self.record(CacheEvent::Invalidate(key.clone()));

        let fetcher = match &self.fetcher {
            Some(fetcher) => fetcher.clone(),
            None => return Ok(()),
        };

        let pending = self.begin_fetch(key);
        let board = fetcher
            .fetch_board(&key.board_id)
            .await
            .map_err(|source| CacheError::Fetch {
                key: key.clone(),
                source,
            })?;
        self.complete_fetch(pending, board);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_and_read_versions_increase() {
        let cache = InMemoryQueryCache::new();
        let key = QueryKey::board("b1");

        let v1 = cache.write(&key, Board::new("b1", "One"));
        let v2 = cache.write(&key, Board::new("b1", "Two"));
        assert!(v2 > v1);

        let cached = cache.read(&key).unwrap();
        assert_eq!(cached.version, v2);
        assert_eq!(cached.board.name, "Two");
    }

    #[test]
    fn test_registration() {
        let cache = InMemoryQueryCache::new();
        let key = QueryKey::board("b1");
        assert!(!cache.is_registered(&key));

        cache.register(&key);
        assert!(cache.is_registered(&key));

        cache.unregister(&key);
        assert!(!cache.is_registered(&key));
    }

    #[tokio::test]
    async fn test_cancelled_fetch_is_discarded() {
        let cache = InMemoryQueryCache::new();
        let key = QueryKey::board("b1");
        cache.register(&key);
        cache.write(&key, Board::new("b1", "Current"));

        let pending = cache.begin_fetch(&key);
        cache.cancel_pending(&key).await;

        assert!(!cache.complete_fetch(pending, Board::new("b1", "Stale")));
        assert_eq!(cache.read(&key).unwrap().board.name, "Current");
        assert!(cache
            .events()
            .contains(&CacheEvent::FetchDiscarded(key.clone())));
    }

    #[tokio::test]
    async fn test_fetch_started_after_cancel_applies() {
        let cache = InMemoryQueryCache::new();
        let key = QueryKey::board("b1");
        cache.register(&key);

        cache.cancel_pending(&key).await;
        let pending = cache.begin_fetch(&key);
        assert!(cache.complete_fetch(pending, Board::new("b1", "Fresh")));
        assert_eq!(cache.read(&key).unwrap().board.name, "Fresh");
    }

    #[test]
    fn test_compare_and_write_checks_version() {
        let cache = InMemoryQueryCache::new();
        let key = QueryKey::board("b1");
        let v1 = cache.write(&key, Board::new("b1", "One"));
        let v2 = cache.write(&key, Board::new("b1", "Two"));

        assert!(cache
            .compare_and_write(&key, v1, Board::new("b1", "Late"))
            .is_none());
        assert!(cache
            .compare_and_write(&key, v2, Board::new("b1", "Restored"))
            .is_some());
        assert_eq!(cache.read(&key).unwrap().board.name, "Restored");
    }

    #[tokio::test]
    async fn test_invalidate_unregistered_key_fails() {
        let cache = InMemoryQueryCache::new();
        let key = QueryKey::board("b1");
        let err = cache.invalidate(&key).await.unwrap_err();
        assert!(matches!(err, CacheError::NotRegistered(_)));
    }

    #[tokio::test]
    async fn test_invalidate_without_fetcher_marks_stale() {
        let cache = InMemoryQueryCache::new();
        let key = QueryKey::board("b1");
        cache.register(&key);
        cache.write(&key, Board::new("b1", "One"));

        cache.invalidate(&key).await.unwrap();
        assert!(cache.is_stale(&key));
    }
}
