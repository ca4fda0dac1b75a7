/// Position-level diff between the last known server board and a new
/// arrangement.
///
/// Only records whose persisted position actually changes get an update:
/// a column whose order differs from its new index, a task whose column or
/// order differs from where it now sits. Records the server has never seen
/// are skipped and take no position; creating them is not a reorder.
use std::collections::HashMap;

use serde::Serialize;

use crate::arrangement::BoardArrangement;
use crate::types::Board;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnUpdate {
    pub column_id: String,
    pub order: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    pub task_id: String,
    pub column_id: String,
    pub order: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationPlan {
    pub column_updates: Vec<ColumnUpdate>,
    pub task_updates: Vec<TaskUpdate>,
}

impl MutationPlan {
    pub fn len(&self) -> usize {
        self.column_updates.len() + self.task_updates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Where a task was last persisted.
#[derive(Debug, Clone, Copy)]
struct TaskPosition<'a> {
    column_id: &'a str,
    order: usize,
}

pub fn plan_mutations(previous: &Board, arrangement: &BoardArrangement) -> MutationPlan {
    let column_orders: HashMap<&str, usize> = previous
        .columns
        .iter()
        .map(|c| (c.id.as_str(), c.order))
        .collect();
    let task_positions: HashMap<&str, TaskPosition<'_>> = previous
        .columns
        .iter()
        .flat_map(|c| {
            c.tasks.iter().map(|t| {
                (
                    t.id.as_str(),
                    TaskPosition {
                        column_id: t.column_id.as_str(),
                        order: t.order,
                    },
                )
            })
        })
        .collect();

    let mut plan = MutationPlan::default();

    let known_columns = arrangement.columns().iter().filter_map(|column| {
        column_orders
            .get(column.column_id.as_str())
            .map(|&order| (column, order))
    });
    for (index, (column, order)) in known_columns.enumerate() {
        if order != index {
            plan.column_updates.push(ColumnUpdate {
                column_id: column.column_id.clone(),
                order: index,
            });
        }
    }

    for column in arrangement.columns() {
        if !column_orders.contains_key(column.column_id.as_str()) {
            continue;
        }
        for (index, task) in column.tasks.iter().enumerate() {
            let Some(before) = task_positions.get(task.id.as_str()) else {
                continue;
            };
            if before.column_id != column.column_id || before.order != index {
                plan.task_updates.push(TaskUpdate {
                    task_id: task.id.clone(),
                    column_id: column.column_id.clone(),
                    order: index,
                });
            }
        }
    }

    plan
}
