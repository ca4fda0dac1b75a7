/// Configuration for the replay tool.
/// Reads replay.json from ~/.config/taskboard/replay.json (or platform equivalent).
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use taskboard_core::config::ReconcileConfig;
use taskboard_core::MutationContext;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayConfig {
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    /// Session/tenant the replayed mutations run as.
    #[serde(default)]
    pub context: MutationContext,
}

/// Default config path: ~/.config/taskboard/replay.json
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskboard")
        .join("replay.json")
}

/// Load config from path. Returns default if file doesn't exist.
pub fn load_config(path: &Path) -> ReplayConfig {
    match fs::read_to_string(path) {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Failed to parse config {}: {}", path.display(), e);
            ReplayConfig::default()
        }),
        Err(_) => {
            log::info!("No config at {}, using defaults", path.display());
            ReplayConfig::default()
        }
    }
}
