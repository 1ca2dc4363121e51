//! Process logging and per-run naming.
//!
//! Two destinations: an audit file that receives everything at `DEBUG`
//! (including every external command and its output), and the console on
//! stderr at `INFO` unless `RUST_LOG` says otherwise.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing_subscriber::filter::{EnvFilter, LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};
use uuid::Uuid;

use crate::error::Result;

/// Short random id used to keep artifacts of concurrent runs apart.
pub fn run_hash() -> String {
    let mut hash = Uuid::new_v4().simple().to_string();
    hash.truncate(16);
    hash
}

/// `<work_dir>/cephgraph_<hash>`
pub fn run_dir(work_dir: &Path, hash: &str) -> PathBuf {
    work_dir.join(format!("cephgraph_{}", hash))
}

/// `<work_dir>/cephgraph_<tool>_<hash>.log`
pub fn log_path(work_dir: &Path, tool: &str, hash: &str) -> PathBuf {
    work_dir.join(format!("cephgraph_{}_{}.log", tool, hash))
}

/// Install the global subscriber. Can be called once per process.
pub fn init(log_file: &Path) -> Result<()> {
    if let Some(parent) = log_file.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(log_file)?;

    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .with_target(false)
        .with_filter(LevelFilter::DEBUG);

    let console_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(console_filter);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .map_err(std::io::Error::other)?;

    tracing::debug!("logging to {}", log_file.display());
    Ok(())
}
