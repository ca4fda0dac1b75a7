//! Board layer of the taskboard: data model, drag-and-drop arrangements and
//! the optimistic reconciler that persists them.

pub mod arrangement;
pub mod cache;
pub mod config;
pub mod mutation;
pub mod reconcile;
pub mod types;

pub use arrangement::{ArrangedColumn, BoardArrangement};
pub use cache::{QueryCache, QueryKey};
pub use mutation::{MutationContext, MutationService};
pub use reconcile::{ReconcileError, ReconcileOutcome, Reconciler};
pub use types::{Board, Column, Task, User};
