//! Error types for ingestion and reconciliation

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CephGraphError>;

/// Coarse failure class, used to decide what a run can still do after an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Missing tool or pod; raised before anything is mutated.
    Environment,
    /// External listing/query command failed.
    Fetch,
    /// Payload could not be parsed at all.
    Parse,
    /// Graph store write, transaction or snapshot failed.
    Store,
    Config,
    Io,
}

#[derive(Error, Debug)]
pub enum CephGraphError {
    #[error("{0} is required but not installed")]
    MissingCommand(String),

    #[error("OSD pod {pod} not found in namespace {namespace}")]
    PodNotFound { pod: String, namespace: String },

    #[error("cannot extract OSD ID from pod name: {0}")]
    InvalidPodName(String),

    #[error("command `{command}` failed with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },

    #[error("inventory is not parseable: {0}")]
    UnparseableInventory(String),

    #[error("graph store error: {0}")]
    Graph(#[from] neo4rs::Error),

    #[error("graph store error: {0}")]
    Store(String),

    #[error("failed to create OSD node {node_id}: {source}")]
    NodeUpsert {
        node_id: i64,
        #[source]
        source: Box<CephGraphError>,
    },

    #[error("failed to create PG node {group}: {source}")]
    GroupUpsert {
        group: String,
        #[source]
        source: Box<CephGraphError>,
    },

    #[error("failed to process batch {start}-{end} for PG {group}: {source}")]
    Batch {
        group: String,
        start: usize,
        end: usize,
        #[source]
        source: Box<CephGraphError>,
    },

    #[error("snapshot failed: {0}")]
    Snapshot(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl CephGraphError {
    pub fn category(&self) -> ErrorCategory {
        match self {
            CephGraphError::MissingCommand(_)
            | CephGraphError::PodNotFound { .. }
            | CephGraphError::InvalidPodName(_) => ErrorCategory::Environment,
            CephGraphError::CommandFailed { .. } => ErrorCategory::Fetch,
            CephGraphError::UnparseableInventory(_) | CephGraphError::Json(_) => {
                ErrorCategory::Parse
            }
            CephGraphError::Graph(_)
            | CephGraphError::Store(_)
            | CephGraphError::NodeUpsert { .. }
            | CephGraphError::GroupUpsert { .. }
            | CephGraphError::Batch { .. }
            | CephGraphError::Snapshot(_) => ErrorCategory::Store,
            CephGraphError::Config(_)
            | CephGraphError::ConfigRead { .. }
            | CephGraphError::Yaml(_) => ErrorCategory::Config,
            CephGraphError::Io(_) => ErrorCategory::Io,
        }
    }

    /// Stable error code for log lines and scripting
    pub fn code(&self) -> &'static str {
        match self {
            CephGraphError::MissingCommand(_) => "MISSING_COMMAND",
            CephGraphError::PodNotFound { .. } => "POD_NOT_FOUND",
            CephGraphError::InvalidPodName(_) => "INVALID_POD_NAME",
            CephGraphError::CommandFailed { .. } => "COMMAND_FAILED",
            CephGraphError::UnparseableInventory(_) => "UNPARSEABLE_INVENTORY",
            CephGraphError::Batch { .. } => "BATCH_FAILED",
            CephGraphError::Snapshot(_) => "SNAPSHOT_FAILED",
            _ => match self.category() {
                ErrorCategory::Store => "STORE_ERROR",
                ErrorCategory::Config => "CONFIG_ERROR",
                ErrorCategory::Parse => "PARSE_ERROR",
                _ => "INTERNAL_ERROR",
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_error_carries_group_context() {
        let err = CephGraphError::Batch {
            group: "1.2a".to_string(),
            start: 200,
            end: 400,
            source: Box::new(CephGraphError::Store("connection reset".to_string())),
        };

        assert_eq!(
            err.to_string(),
            "failed to process batch 200-400 for PG 1.2a: graph store error: connection reset"
        );
        assert_eq!(err.category(), ErrorCategory::Store);
        assert_eq!(err.code(), "BATCH_FAILED");
    }

    #[test]
    fn test_environment_errors() {
        let err = CephGraphError::PodNotFound {
            pod: "rook-ceph-osd-3-abc".to_string(),
            namespace: "rook-ceph".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Environment);
        assert_eq!(err.code(), "POD_NOT_FOUND");
        assert_eq!(
            CephGraphError::MissingCommand("kubectl".into()).category(),
            ErrorCategory::Environment
        );
    }

    #[test]
    fn test_fallback_codes() {
        assert_eq!(CephGraphError::Store("x".into()).code(), "STORE_ERROR");
        assert_eq!(CephGraphError::Config("x".into()).code(), "CONFIG_ERROR");
        assert_eq!(
            CephGraphError::Io(std::io::Error::other("disk")).code(),
            "INTERNAL_ERROR"
        );
    }
}
