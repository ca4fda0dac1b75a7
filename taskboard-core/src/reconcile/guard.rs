/// Per-board in-flight guard: at most one reconcile holds a board at a time.
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::config::InFlightPolicy;

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

fn lock_map(locks: &Mutex<LockMap>) -> MutexGuard<'_, LockMap> {
    locks.lock().unwrap_or_else(|e| e.into_inner())
}

/// Held for the whole reconcile; dropping it lets the next one in.
pub struct BoardPermit {
    board_id: String,
    locks: Arc<Mutex<LockMap>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for BoardPermit {
    fn drop(&mut self) {
        drop(self.guard.take());
        // Only the map still points at the lock: nobody holds or waits on it.
        let mut locks = lock_map(&self.locks);
        if locks
            .get(&self.board_id)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            locks.remove(&self.board_id);
        }
    }
}

#[derive(Default)]
pub struct BoardGuard {
    locks: Arc<Mutex<LockMap>>,
}

impl BoardGuard {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, board_id: &str) -> Arc<AsyncMutex<()>> {
        lock_map(&self.locks)
            .entry(board_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    fn permit(&self, board_id: &str, guard: OwnedMutexGuard<()>) -> BoardPermit {
        BoardPermit {
            board_id: board_id.to_string(),
            locks: self.locks.clone(),
            guard: Some(guard),
        }
    }

    /// `None` only under `InFlightPolicy::Reject` while the board is held.
    pub async fn acquire(&self, board_id: &str, policy: InFlightPolicy) -> Option<BoardPermit> {
        let lock = self.lock_for(board_id);
        match policy {
            InFlightPolicy::Wait => Some(self.permit(board_id, lock.lock_owned().await)),
            InFlightPolicy::Reject => lock
                .try_lock_owned()
                .ok()
                .map(|guard| self.permit(board_id, guard)),
        }
    }

    pub fn is_busy(&self, board_id: &str) -> bool {
        lock_map(&self.locks)
            .get(board_id)
            .is_some_and(|lock| lock.try_lock().is_err())
    }
}
