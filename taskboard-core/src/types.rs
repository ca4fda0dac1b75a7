use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub column_id: String,
    /// Zero-based position inside the owning column.
    pub order: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignee: Option<User>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(id: &str, title: &str, column_id: &str, order: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            title: title.to_string(),
            description: None,
            column_id: column_id.to_string(),
            order,
            assignee: None,
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub id: String,
    pub name: String,
    pub board_id: String,
    /// Zero-based position inside the owning board.
    pub order: usize,
    #[serde(default)]
    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Column {
    pub fn new(id: &str, name: &str, board_id: &str, order: usize) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            board_id: board_id.to_string(),
            order,
            tasks: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Order value for a task appended to this column.
    pub fn next_task_order(&self) -> usize {
        self.tasks
            .iter()
            .map(|t| t.order)
            .max()
            .map_or(0, |max| max + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Board {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(default)]
    pub columns: Vec<Column>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Board {
    pub fn new(id: &str, name: &str) -> Self {
        let now = Utc::now();
        Self {
            id: id.to_string(),
            name: name.to_string(),
            organization_id: None,
            columns: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn column(&self, column_id: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.id == column_id)
    }

    pub fn column_mut(&mut self, column_id: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| c.id == column_id)
    }

    pub fn task(&self, task_id: &str) -> Option<&Task> {
        self.columns
            .iter()
            .flat_map(|c| c.tasks.iter())
            .find(|t| t.id == task_id)
    }

    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    /// Order value for a column appended to this board.
    pub fn next_column_order(&self) -> usize {
        self.columns
            .iter()
            .map(|c| c.order)
            .max()
            .map_or(0, |max| max + 1)
    }

    /// Sort columns and the tasks inside each column ascending by `order`,
    /// the shape the query layer returns boards in.
    pub fn sort_by_order(&mut self) {
        self.columns.sort_by_key(|c| c.order);
        for column in &mut self.columns {
            column.tasks.sort_by_key(|t| t.order);
        }
    }

    /// Whether column orders are exactly `0..N-1` in list order and every
    /// column's task orders are exactly `0..M-1` in list order, with each
    /// task pointing back at its column.
    pub fn has_dense_order(&self) -> bool {
        self.columns.iter().enumerate().all(|(i, column)| {
            column.order == i
                && column
                    .tasks
                    .iter()
                    .enumerate()
                    .all(|(j, task)| task.order == j && task.column_id == column.id)
        })
    }
}
