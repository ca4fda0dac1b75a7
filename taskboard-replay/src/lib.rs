/// Taskboard replay: run one drag arrangement through the reconciler against
/// an in-memory backend seeded from a board snapshot, then print what the
/// cache settled on.
pub mod config;
pub mod logging;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use taskboard_core::cache::memory::InMemoryQueryCache;
use taskboard_core::mutation::memory::InMemoryBoardServer;
use taskboard_core::reconcile::plan::MutationPlan;
use taskboard_core::reconcile::Settlement;
use taskboard_core::{Board, BoardArrangement, QueryCache, QueryKey, ReconcileError, Reconciler};

use crate::config::ReplayConfig;

pub const USAGE: &str =
    "usage: taskboard-replay <board.json> <arrangement.json> [--fail <record-id>]... [--config <path>]";

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("{0}\n{usage}", usage = USAGE)]
    Usage(String),

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Reconcile(#[from] ReconcileError),

    #[error("Cannot encode report: {0}")]
    Encode(#[source] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayArgs {
    pub board: PathBuf,
    pub arrangement: PathBuf,
    /// Record ids whose mutations the in-memory backend rejects.
    pub fail: Vec<String>,
    pub config: Option<PathBuf>,
}

pub fn parse_args(args: impl IntoIterator<Item = String>) -> Result<ReplayArgs, ReplayError> {
    let mut positional = Vec::new();
    let mut fail = Vec::new();
    let mut config = None;

    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fail" => {
                let id = args
                    .next()
                    .ok_or_else(|| ReplayError::Usage("--fail needs a record id".to_string()))?;
                fail.push(id);
            }
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| ReplayError::Usage("--config needs a path".to_string()))?;
                config = Some(PathBuf::from(path));
            }
            "-h" | "--help" => return Err(ReplayError::Usage("help requested".to_string())),
            other if other.starts_with("--") => {
                return Err(ReplayError::Usage(format!("unknown option {}", other)));
            }
            _ => positional.push(PathBuf::from(arg)),
        }
    }

    match <[PathBuf; 2]>::try_from(positional) {
        Ok([board, arrangement]) => Ok(ReplayArgs {
            board,
            arrangement,
            fail,
            config,
        }),
        Err(_) => Err(ReplayError::Usage(
            "expected a board file and an arrangement file".to_string(),
        )),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayReport {
    pub committed: bool,
    pub invalidated: bool,
    pub plan: MutationPlan,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<String>,
    /// Cache value once the reconcile settled and refetched.
    pub board: Board,
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ReplayError> {
    let content = fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&content).map_err(|source| ReplayError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub async fn replay(args: &ReplayArgs, config: &ReplayConfig) -> Result<ReplayReport, ReplayError> {
    let board: Board = read_json(&args.board)?;
    let arrangement: BoardArrangement = read_json(&args.arrangement)?;

    let server = Arc::new(InMemoryBoardServer::new());
    server.insert_board(board.clone());
    for id in &args.fail {
        server.fail_on(id);
    }

    let cache = Arc::new(InMemoryQueryCache::with_fetcher(server.clone()));
    let key = QueryKey::board(&board.id);
    cache.register(&key);
    cache.write(&key, board.clone());

    let reconciler = Reconciler::new(cache.clone(), server.clone(), config.reconcile.clone())
        .with_context(config.context.clone());
    let outcome = reconciler.reconcile(&arrangement, &board, &key).await?;

    let failures = match &outcome.settlement {
        Settlement::Committed => Vec::new(),
        Settlement::RolledBack { error, .. } => error
            .failures
            .iter()
            .map(|f| format!("{:?}: {}", f.target, f.error))
            .collect(),
    };
    let settled = cache.read(&key).map_or(board, |cached| cached.board);

    Ok(ReplayReport {
        committed: outcome.is_committed(),
        invalidated: outcome.invalidated,
        plan: outcome.plan,
        failures,
        board: settled,
    })
}

pub async fn run(args: impl IntoIterator<Item = String>) -> Result<(), ReplayError> {
    let args = parse_args(args)?;
    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let config = config::load_config(&config_path);

    let report = replay(&args, &config).await?;
    if !report.committed {
        log::warn!(
            "Drag reverted, {} mutation(s) failed",
            report.failures.len()
        );
    }
    let json = serde_json::to_string_pretty(&report).map_err(ReplayError::Encode)?;
    println!("{}", json);
    Ok(())
}
