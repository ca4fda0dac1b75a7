use std::collections::HashMap;

use crate::arrangement::BoardArrangement;
use crate::types::{Board, Column, Task};

/// Board value to show before the backend confirms anything.
///
/// Columns come from `previous` in arrangement order, renumbered by position,
/// each carrying the arranged tasks renumbered by position and pointed at the
/// column. Arranged ids `previous` does not know are skipped without taking a
/// position; `Reconciler::reconcile` rejects such arrangements up front.
/// Columns the arrangement does not list are not part of the result.
pub fn build_optimistic_board(previous: &Board, arrangement: &BoardArrangement) -> Board {
    let by_id: HashMap<&str, &Column> = previous
        .columns
        .iter()
        .map(|c| (c.id.as_str(), c))
        .collect();

    let mut columns: Vec<Column> = arrangement
        .columns()
        .iter()
        .filter_map(|arranged| {
            let Some(column) = by_id.get(arranged.column_id.as_str()) else {
                log::debug!(
                    "[taskboard.reconcile.optimistic] Column {} unknown to board {}, skipped",
                    arranged.column_id,
                    previous.id
                );
                return None;
            };
            Some((arranged, *column))
        })
        .enumerate()
        .map(|(index, (arranged, column))| {
            let tasks = arranged
                .tasks
                .iter()
                .enumerate()
                .map(|(order, task)| Task {
                    order,
                    column_id: arranged.column_id.clone(),
                    ..task.clone()
                })
                .collect();
            Column {
                order: index,
                tasks,
                ..column.clone()
            }
        })
        .collect();
    columns.sort_by_key(|c| c.order);

    Board {
        columns,
        ..previous.clone()
    }
}
