pub mod memory;
pub mod transaction;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::mutation::MutationError;
use crate::types::Board;

/// Identifies one cached board query.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryKey {
    pub board_id: String,
}

impl QueryKey {
    pub fn board(board_id: &str) -> Self {
        Self {
            board_id: board_id.to_string(),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "board:{}", self.board_id)
    }
}

/// A cached board together with the entry version that produced it.
/// Versions are monotonic across the whole cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedBoard {
    pub board: Board,
    pub version: u64,
}

/// Keyed store of fetched board data with optimistic-update support.
///
/// `read`, `write` and `compare_and_write` never suspend, so a caller can
/// cancel pending fetches and write its optimistic value without another
/// response slipping in between.
#[async_trait]
pub trait QueryCache: Send + Sync {
    /// Whether a query is currently registered (mounted) under `key`.
    fn is_registered(&self, key: &QueryKey) -> bool;

    /// Cancel in-flight fetches for `key`. A cancelled fetch that completes
    /// later must not write to the cache.
    async fn cancel_pending(&self, key: &QueryKey);

    fn read(&self, key: &QueryKey) -> Option<CachedBoard>;

    /// Replace the value under `key`, returning the new entry version.
    fn write(&self, key: &QueryKey, board: Board) -> u64;

    /// Replace the value only if the entry is still at `expected_version`.
    /// Returns the new version, or `None` when the entry moved on.
    fn compare_and_write(&self, key: &QueryKey, expected_version: u64, board: Board) -> Option<u64>;

    /// Mark `key` stale and refetch it.
    async fn invalidate(&self, key: &QueryKey) -> Result<(), CacheError>;
}

/// Source of authoritative board data used when the cache refetches.
#[async_trait]
pub trait BoardFetcher: Send + Sync {
    async fn fetch_board(&self, board_id: &str) -> Result<Board, MutationError>;
}

#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("Query {0} is not registered")]
    NotRegistered(QueryKey),

    #[error("Refetch of {key} failed: {source}")]
    Fetch {
        key: QueryKey,
        #[source]
        source: MutationError,
    },
}
