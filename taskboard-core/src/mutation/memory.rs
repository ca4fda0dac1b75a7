/// In-memory board backend for development and testing.
///
/// Persists column and task positions the way the record layer does: each
/// update touches one record and stamps its `updated_at`. Reads return boards
/// ordered by `order`, like the board query.
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;

use super::{ColumnPatch, MutationContext, MutationError, MutationService, TaskPatch};
use crate::cache::BoardFetcher;
use crate::types::{Board, Column, Task};

#[derive(Debug, Clone, PartialEq)]
pub enum MutationCall {
    UpdateColumn {
        ctx: MutationContext,
        column_id: String,
        patch: ColumnPatch,
    },
    UpdateTask {
        ctx: MutationContext,
        task_id: String,
        patch: TaskPatch,
    },
}

pub struct InMemoryBoardServer {
    boards: RwLock<HashMap<String, Board>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<MutationCall>>,
    latency: Option<Duration>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl InMemoryBoardServer {
    pub fn new() -> Self {
        Self {
            boards: RwLock::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            calls: Mutex::new(Vec::new()),
            latency: None,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Delay every mutation by `latency` before it touches any record.
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::new()
        }
    }

    pub fn insert_board(&self, board: Board) {
        self.boards
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(board.id.clone(), board);
    }

    pub fn board(&self, board_id: &str) -> Option<Board> {
        self.boards
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(board_id)
            .map(|b| {
                let mut board = b.clone();
                board.sort_by_order();
                board
            })
    }

    /// Make every mutation targeting `record_id` fail.
    pub fn fail_on(&self, record_id: &str) {
        self.failing().insert(record_id.to_string());
    }

    pub fn clear_failures(&self) {
        self.failing().clear();
    }

    pub fn calls(&self) -> Vec<MutationCall> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Highest number of mutations observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn failing(&self) -> MutexGuard<'_, HashSet<String>> {
        self.failing.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record(&self, call: MutationCall) {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);
    }

    async fn enter(&self, record_id: &str) -> Result<(), MutationError> {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        if self.failing().contains(record_id) {
            return Err(MutationError::Rejected(format!(
                "injected failure for {}",
                record_id
            )));
        }
        Ok(())
    }

    fn apply_column_patch(&self, column_id: &str, patch: &ColumnPatch) -> Result<Column, MutationError> {
        let mut boards = self.boards.write().unwrap_or_else(|e| e.into_inner());
        let column = boards
            .values_mut()
            .find_map(|b| b.column_mut(column_id))
            .ok_or_else(|| MutationError::NotFound(column_id.to_string()))?;
        column.order = patch.order;
        column.updated_at = Utc::now();
        Ok(column.clone())
    }

    fn apply_task_patch(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, MutationError> {
        let mut boards = self.boards.write().unwrap_or_else(|e| e.into_inner());
        let board = boards
            .values_mut()
            .find(|b| b.columns.iter().any(|c| c.tasks.iter().any(|t| t.id == task_id)))
            .ok_or_else(|| MutationError::NotFound(task_id.to_string()))?;

        if board.column(&patch.column_id).is_none() {
            return Err(MutationError::NotFound(patch.column_id.clone()));
        }

        let mut task = None;
        for column in &mut board.columns {
            if let Some(pos) = column.tasks.iter().position(|t| t.id == task_id) {
                task = Some(column.tasks.remove(pos));
                break;
            }
        }
        let mut task = task.ok_or_else(|| MutationError::NotFound(task_id.to_string()))?;
        task.column_id = patch.column_id.clone();
        task.order = patch.order;
        task.updated_at = Utc::now();

        let target = board
            .column_mut(&patch.column_id)
            .ok_or_else(|| MutationError::NotFound(patch.column_id.clone()))?;
        target.tasks.push(task.clone());
        Ok(task)
    }
}

impl Default for InMemoryBoardServer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MutationService for InMemoryBoardServer {
    async fn update_column(
        &self,
        ctx: &MutationContext,
        column_id: &str,
        patch: ColumnPatch,
    ) -> Result<Column, MutationError> {
        self.record(MutationCall::UpdateColumn {
            ctx: ctx.clone(),
            column_id: column_id.to_string(),
            patch: patch.clone(),
        });
        self.enter(column_id).await?;
        self.apply_column_patch(column_id, &patch)
    }

    async fn update_task(
        &self,
        ctx: &MutationContext,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<Task, MutationError> {
        self.record(MutationCall::UpdateTask {
            ctx: ctx.clone(),
            task_id: task_id.to_string(),
            patch: patch.clone(),
        });
        self.enter(task_id).await?;
        self.apply_task_patch(task_id, &patch)
    }
}

#[async_trait]
impl BoardFetcher for InMemoryBoardServer {
    async fn fetch_board(&self, board_id: &str) -> Result<Board, MutationError> {
        self.board(board_id)
            .ok_or_else(|| MutationError::NotFound(board_id.to_string()))
    }
}
