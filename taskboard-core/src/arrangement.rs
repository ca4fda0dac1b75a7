/// Board view-state: the ordered column id -> ordered task list mapping that
/// drives the drag-and-drop UI.
///
/// Column order in the arrangement is the presentation order. Task objects
/// keep whatever `column_id`/`order` they were loaded with; the reconciler
/// derives the new values from their position.
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{Board, Column, Task};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrangedColumn {
    pub column_id: String,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl ArrangedColumn {
    pub fn new(column_id: &str, tasks: Vec<Task>) -> Self {
        Self {
            column_id: column_id.to_string(),
            tasks,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BoardArrangement {
    columns: Vec<ArrangedColumn>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArrangementError {
    #[error("Column {0} appears more than once in the arrangement")]
    DuplicateColumn(String),

    #[error("Task {task_id} is listed in both {first_column} and {second_column}")]
    DuplicateTask {
        task_id: String,
        first_column: String,
        second_column: String,
    },

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Unknown task: {0}")]
    UnknownTask(String),

    #[error("Column {column_id} is not on board {board_id}")]
    ColumnNotOnBoard { column_id: String, board_id: String },
}

impl BoardArrangement {
    pub fn new(columns: Vec<ArrangedColumn>) -> Self {
        Self { columns }
    }

    /// Derive the arrangement from server data, columns and tasks ascending
    /// by `order`.
    pub fn from_board(board: &Board) -> Self {
        let mut sorted = board.clone();
        sorted.sort_by_order();
        Self {
            columns: sorted
                .columns
                .into_iter()
                .map(|c| ArrangedColumn {
                    column_id: c.id,
                    tasks: c.tasks,
                })
                .collect(),
        }
    }

    pub fn columns(&self) -> &[ArrangedColumn] {
        &self.columns
    }

    pub fn column_ids(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.column_id.as_str()).collect()
    }

    pub fn tasks(&self, column_id: &str) -> Option<&[Task]> {
        self.columns
            .iter()
            .find(|c| c.column_id == column_id)
            .map(|c| c.tasks.as_slice())
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Apply a task drag: remove the task from wherever it is and insert it
    /// into `to_column` at `to_index` (clamped to the list length).
    pub fn move_task(
        &mut self,
        task_id: &str,
        to_column: &str,
        to_index: usize,
    ) -> Result<(), ArrangementError> {
        if !self.columns.iter().any(|c| c.column_id == to_column) {
            return Err(ArrangementError::UnknownColumn(to_column.to_string()));
        }

        let (col_idx, pos) = self
            .columns
            .iter()
            .enumerate()
            .find_map(|(ci, c)| {
                c.tasks
                    .iter()
                    .position(|t| t.id == task_id)
                    .map(|pos| (ci, pos))
            })
            .ok_or_else(|| ArrangementError::UnknownTask(task_id.to_string()))?;

        let task = self.columns[col_idx].tasks.remove(pos);
        if let Some(target) = self.columns.iter_mut().find(|c| c.column_id == to_column) {
            let index = to_index.min(target.tasks.len());
            target.tasks.insert(index, task);
        }
        Ok(())
    }

    /// Apply a column drag: move `column_id` to `to_index` (clamped).
    pub fn move_column(&mut self, column_id: &str, to_index: usize) -> Result<(), ArrangementError> {
        let pos = self
            .columns
            .iter()
            .position(|c| c.column_id == column_id)
            .ok_or_else(|| ArrangementError::UnknownColumn(column_id.to_string()))?;
        let column = self.columns.remove(pos);
        let index = to_index.min(self.columns.len());
        self.columns.insert(index, column);
        Ok(())
    }

    /// A column move keeps the number of columns but changes their sequence.
    /// Column moves are persisted as soon as they happen; task drags only on
    /// drag end.
    pub fn is_column_move(previous: &BoardArrangement, next: &BoardArrangement) -> bool {
        previous.len() == next.len() && previous.column_ids() != next.column_ids()
    }

    /// Columns to render: every arranged column the board knows, in
    /// arrangement order, carrying the arranged task list.
    pub fn project_columns(&self, board: &Board) -> Vec<Column> {
        let by_id: HashMap<&str, &Column> =
            board.columns.iter().map(|c| (c.id.as_str(), c)).collect();
        self.columns
            .iter()
            .filter_map(|arranged| {
                by_id.get(arranged.column_id.as_str()).map(|column| Column {
                    tasks: arranged.tasks.clone(),
                    ..(*column).clone()
                })
            })
            .collect()
    }

    /// Reject arrangements where a column id repeats or a task sits in two
    /// places at once.
    pub fn validate(&self) -> Result<(), ArrangementError> {
        let mut seen_columns = HashSet::new();
        let mut seen_tasks: HashMap<&str, &str> = HashMap::new();
        for column in &self.columns {
            if !seen_columns.insert(column.column_id.as_str()) {
                return Err(ArrangementError::DuplicateColumn(column.column_id.clone()));
            }
            for task in &column.tasks {
                if let Some(first) = seen_tasks.insert(task.id.as_str(), column.column_id.as_str()) {
                    return Err(ArrangementError::DuplicateTask {
                        task_id: task.id.clone(),
                        first_column: first.to_string(),
                        second_column: column.column_id.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// `validate`, and every arranged column must exist on `board`.
    pub fn validate_against(&self, board: &Board) -> Result<(), ArrangementError> {
        self.validate()?;
        match self.columns.iter().find(|c| board.column(&c.column_id).is_none()) {
            Some(unknown) => Err(ArrangementError::ColumnNotOnBoard {
                column_id: unknown.column_id.clone(),
                board_id: board.id.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Re-insert the columns of `previous` this arrangement does not list at
    /// their previous `order` slot (clamped), with their previous tasks, so an
    /// untouched column keeps its persisted position. Tasks that the
    /// arrangement already places elsewhere are not duplicated.
    pub fn complete_with(&self, previous: &Board) -> BoardArrangement {
        let listed: HashSet<&str> = self.columns.iter().map(|c| c.column_id.as_str()).collect();
        let placed: HashSet<&str> = self
            .columns
            .iter()
            .flat_map(|c| c.tasks.iter().map(|t| t.id.as_str()))
            .collect();

        let mut omitted: Vec<&Column> = previous
            .columns
            .iter()
            .filter(|c| !listed.contains(c.id.as_str()))
            .collect();
        omitted.sort_by_key(|c| c.order);

        let mut columns = self.columns.clone();
        for column in omitted {
            let mut tasks: Vec<Task> = column
                .tasks
                .iter()
                .filter(|t| !placed.contains(t.id.as_str()))
                .cloned()
                .collect();
            tasks.sort_by_key(|t| t.order);
            let slot = column.order.min(columns.len());
            columns.insert(
                slot,
                ArrangedColumn {
                    column_id: column.id.clone(),
                    tasks,
                },
            );
        }
        BoardArrangement { columns }
    }
}
