/// Optimistic drag-and-drop reconciliation.
///
/// One call runs, in order: resolve the query key, take the per-board guard,
/// cancel pending fetches, snapshot the cache, write the optimistic board,
/// issue every position mutation concurrently, then commit or roll back the
/// cache and force a refetch. A drag either fully lands or fully reverts in
/// the cache; mutation failures are absorbed into the rollback and never
/// returned as errors.
pub mod guard;
pub mod optimistic;
pub mod plan;

use std::sync::Arc;

use futures_util::future::{join_all, BoxFuture, FutureExt};
use serde::Serialize;
use tokio::sync::broadcast;

use crate::arrangement::{ArrangementError, BoardArrangement};
use crate::cache::transaction::{CacheTransaction, RollbackOutcome};
use crate::cache::{QueryCache, QueryKey};
use crate::config::{OmittedColumns, ReconcileConfig};
use crate::mutation::{ColumnPatch, MutationContext, MutationError, MutationService, TaskPatch};
use crate::types::Board;
use guard::BoardGuard;
use optimistic::build_optimistic_board;
use plan::{plan_mutations, MutationPlan};

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Query key {key} cannot be resolved for board {board_id}")]
    StaleQueryKey { key: QueryKey, board_id: String },

    #[error("Invalid arrangement: {0}")]
    InvalidArrangement(#[from] ArrangementError),

    #[error("Another reconcile is in flight for board {0}")]
    InFlight(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum MutationTarget {
    Column(String),
    Task(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MutationFailure {
    pub target: MutationTarget,
    pub error: MutationError,
}

/// One or more mutations of a batch failed; the batch counts as failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{} of {total} mutations failed on board {board_id}", .failures.len())]
pub struct PersistenceBatchError {
    pub board_id: String,
    pub total: usize,
    pub failures: Vec<MutationFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    Committed,
    RolledBack {
        error: PersistenceBatchError,
        rollback: RollbackOutcome,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub board_id: String,
    pub plan: MutationPlan,
    pub settlement: Settlement,
    /// Whether the forced refetch after settlement succeeded.
    pub invalidated: bool,
}

impl ReconcileOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self.settlement, Settlement::Committed)
    }
}

/// Notifications for the board UI.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReconcileEvent {
    #[serde(rename_all = "camelCase")]
    Committed { board_id: String, mutations: usize },
    #[serde(rename_all = "camelCase")]
    RolledBack {
        board_id: String,
        failed: usize,
        total: usize,
        restored: bool,
    },
    #[serde(rename_all = "camelCase")]
    InvalidationFailed { board_id: String, message: String },
}

pub struct Reconciler {
    cache: Arc<dyn QueryCache>,
    mutations: Arc<dyn MutationService>,
    context: MutationContext,
    config: ReconcileConfig,
    guard: BoardGuard,
    events: broadcast::Sender<ReconcileEvent>,
}

impl Reconciler {
    pub fn new(
        cache: Arc<dyn QueryCache>,
        mutations: Arc<dyn MutationService>,
        config: ReconcileConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            cache,
            mutations,
            context: MutationContext::default(),
            config,
            guard: BoardGuard::new(),
            events,
        }
    }

    /// Session/tenant context passed to every mutation.
    pub fn with_context(mut self, context: MutationContext) -> Self {
        self.context = context;
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ReconcileEvent> {
        self.events.subscribe()
    }

    pub async fn reconcile(
        &self,
        arrangement: &BoardArrangement,
        previous: &Board,
        key: &QueryKey,
    ) -> Result<ReconcileOutcome, ReconcileError> {
        if key.board_id != previous.id || !self.cache.is_registered(key) {
            log::error!(
                "[taskboard.reconcile] Could not resolve query key {} for board {}",
                key,
                previous.id
            );
            return Err(ReconcileError::StaleQueryKey {
                key: key.clone(),
                board_id: previous.id.clone(),
            });
        }
        arrangement.validate_against(previous)?;

        let _permit = self
            .guard
            .acquire(&previous.id, self.config.in_flight)
            .await
            .ok_or_else(|| ReconcileError::InFlight(previous.id.clone()))?;

        let effective = match self.config.omitted_columns {
            OmittedColumns::Keep => arrangement.complete_with(previous),
            OmittedColumns::Drop => arrangement.clone(),
        };

        // No await between the cancel and the optimistic write: a fetch
        // response must not land in between.
        self.cache.cancel_pending(key).await;
        let mut tx = CacheTransaction::begin(self.cache.as_ref(), key);
        tx.write(build_optimistic_board(previous, &effective));

        let plan = plan_mutations(previous, &effective);
        log::debug!(
            "[taskboard.reconcile] Board {}: {} column and {} task updates scheduled",
            previous.id,
            plan.column_updates.len(),
            plan.task_updates.len()
        );
        let failures = self.execute(&plan).await;

        let settlement = if failures.is_empty() {
            tx.commit();
            log::info!(
                "[taskboard.reconcile] Board {} settled, {} mutations persisted",
                previous.id,
                plan.len()
            );
            self.emit(ReconcileEvent::Committed {
                board_id: previous.id.clone(),
                mutations: plan.len(),
            });
            Settlement::Committed
        } else {
            let error = PersistenceBatchError {
                board_id: previous.id.clone(),
                total: plan.len(),
                failures,
            };
            let rollback = tx.rollback();
            log::warn!(
                "[taskboard.reconcile] {}; cache rollback: {:?}",
                error,
                rollback
            );
            self.emit(ReconcileEvent::RolledBack {
                board_id: previous.id.clone(),
                failed: error.failures.len(),
                total: error.total,
                restored: rollback == RollbackOutcome::Restored,
            });
            Settlement::RolledBack { error, rollback }
        };

        let invalidated = match self.cache.invalidate(key).await {
            Ok(()) => true,
            Err(e) => {
                log::warn!("[taskboard.reconcile] Refetch after settlement failed: {}", e);
                self.emit(ReconcileEvent::InvalidationFailed {
                    board_id: previous.id.clone(),
                    message: e.to_string(),
                });
                false
            }
        };

        Ok(ReconcileOutcome {
            board_id: previous.id.clone(),
            plan,
            settlement,
            invalidated,
        })
    }

    /// Issue every planned mutation at once and wait for all of them.
    async fn execute(&self, plan: &MutationPlan) -> Vec<MutationFailure> {
        let service = self.mutations.as_ref();
        let ctx = &self.context;
        let mut calls: Vec<BoxFuture<'_, Result<(), MutationFailure>>> =
            Vec::with_capacity(plan.len());

        for update in &plan.column_updates {
            calls.push(
                async move {
                    service
                        .update_column(ctx, &update.column_id, ColumnPatch { order: update.order })
                        .await
                        .map(|_| ())
                        .map_err(|error| MutationFailure {
                            target: MutationTarget::Column(update.column_id.clone()),
                            error,
                        })
                }
                .boxed(),
            );
        }

        for update in &plan.task_updates {
            calls.push(
                async move {
                    let patch = TaskPatch {
                        column_id: update.column_id.clone(),
                        order: update.order,
                    };
                    service
                        .update_task(ctx, &update.task_id, patch)
                        .await
                        .map(|_| ())
                        .map_err(|error| MutationFailure {
                            target: MutationTarget::Task(update.task_id.clone()),
                            error,
                        })
                }
                .boxed(),
            );
        }

        let failures: Vec<MutationFailure> = join_all(calls)
            .await
            .into_iter()
            .filter_map(Result::err)
            .collect();
        for failure in &failures {
            log::debug!(
                "[taskboard.reconcile] Mutation on {:?} failed: {}",
                failure.target,
                failure.error
            );
        }
        failures
    }

    fn emit(&self, event: ReconcileEvent) {
        if self.events.send(event).is_err() {
            log::debug!("[taskboard.reconcile] No event subscribers");
        }
    }
}
