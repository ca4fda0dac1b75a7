pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::types::{Column, Task};

/// Session and tenant the mutations are issued on behalf of.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationContext {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnPatch {
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskPatch {
    pub column_id: String,
    pub order: usize,
}

/// Record-level persistence. Each call is atomic and independent of every
/// other call.
#[async_trait]
pub trait MutationService: Send + Sync {
    async fn update_column(
        &self,
        ctx: &MutationContext,
        column_id: &str,
        patch: ColumnPatch,
    ) -> Result<Column, MutationError>;

    async fn update_task(
        &self,
        ctx: &MutationContext,
        task_id: &str,
        patch: TaskPatch,
    ) -> Result<Task, MutationError>;
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MutationError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Mutation rejected: {0}")]
    Rejected(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}
