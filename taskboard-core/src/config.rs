/// Reconciler configuration, read from a camelCase JSON file.
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// What happens to columns the arrangement does not list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OmittedColumns {
    /// Leave them on the board after the listed columns, tasks untouched.
    #[default]
    Keep,
    /// Remove them from the optimistic board value.
    Drop,
}

/// What a reconcile does when another one is running for the same board.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InFlightPolicy {
    /// Queue behind the running reconcile.
    #[default]
    Wait,
    /// Fail immediately with `ReconcileError::InFlight`.
    Reject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileConfig {
    #[serde(default)]
    pub omitted_columns: OmittedColumns,
    #[serde(default)]
    pub in_flight: InFlightPolicy,
    /// Capacity of the reconcile event broadcast channel.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

fn default_event_capacity() -> usize {
    64
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            omitted_columns: OmittedColumns::default(),
            in_flight: InFlightPolicy::default(),
            event_capacity: default_event_capacity(),
        }
    }
}

/// Load config from path. Returns defaults if the file is missing or invalid.
pub fn load_config(path: &Path) -> ReconcileConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!(
                "[taskboard.config] Failed to parse config {}: {}",
                path.display(),
                e
            );
            ReconcileConfig::default()
        }),
        Err(_) => {
            log::info!(
                "[taskboard.config] No config at {}, using defaults",
                path.display()
            );
            ReconcileConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = load_config(Path::new("/nonexistent/taskboard/reconcile.json"));
        assert_eq!(config, ReconcileConfig::default());
        assert_eq!(config.omitted_columns, OmittedColumns::Keep);
        assert_eq!(config.in_flight, InFlightPolicy::Wait);
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, r#"{{"omittedColumns": "drop"}}"#).unwrap();

        let config = load_config(tmp.path());
        assert_eq!(config.omitted_columns, OmittedColumns::Drop);
        assert_eq!(config.in_flight, InFlightPolicy::Wait);
        assert_eq!(config.event_capacity, 64);
    }

    #[test]
    fn test_invalid_file_gives_defaults() {
        let mut tmp = NamedTempFile::new().unwrap();
        write!(tmp, r#"{{"inFlight": "sometimes"}}"#).unwrap();

        assert_eq!(load_config(tmp.path()), ReconcileConfig::default());
    }
}
