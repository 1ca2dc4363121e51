//! YAML configuration shared by both binaries.
//!
//! Every field has a default, so an empty file (or no file at all) is a
//! valid configuration. Command-line flags are applied on top by the
//! binaries.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{CephGraphError, Result};
use crate::inventory::InventoryFormat;

/// Default number of objects written per graph transaction.
pub const DEFAULT_BATCH_SIZE: usize = 200;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub graph: GraphConfig,
    pub ingest: IngestConfig,
    pub cluster: ClusterConfig,
}

/// Bolt connection settings for the graph store
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// `host:port`, optionally prefixed with `bolt://`
    pub uri: String,
    pub user: String,
    pub password: String,
    /// Database name; Memgraph ignores it, Neo4j defaults to `neo4j`
    pub database: Option<String>,
    pub max_connections: usize,
    pub fetch_size: usize,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            uri: "localhost:7687".to_string(),
            user: String::new(),
            password: String::new(),
            database: None,
            max_connections: 50,
            fetch_size: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub format: InventoryFormat,
    /// Parent directory of run artifacts and log files
    pub work_dir: PathBuf,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            format: InventoryFormat::Auto,
            work_dir: std::env::temp_dir(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    pub namespace: String,
    /// OSD data path is `<prefix><osd id>`
    pub data_path_prefix: String,
    pub kubectl: String,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            namespace: "rook-ceph".to_string(),
            data_path_prefix: "/var/lib/ceph/osd/ceph-".to_string(),
            kubectl: "kubectl".to_string(),
        }
    }
}

impl ClusterConfig {
    pub fn data_path(&self, osd_id: u32) -> String {
        format!("{}{}", self.data_path_prefix, osd_id)
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CephGraphError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` when given, defaults otherwise.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.ingest.batch_size == 0 {
            return Err(CephGraphError::Config("ingest.batch_size must be at least 1".into()));
        }
        if self.graph.max_connections == 0 {
            return Err(CephGraphError::Config("graph.max_connections must be at least 1".into()));
        }
        if self.graph.uri.trim().is_empty() {
            return Err(CephGraphError::Config("graph.uri must not be empty".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.graph.uri, "localhost:7687");
        assert_eq!(config.graph.max_connections, 50);
        assert_eq!(config.ingest.batch_size, DEFAULT_BATCH_SIZE);
        assert_eq!(config.ingest.format, InventoryFormat::Auto);
        assert_eq!(config.cluster.namespace, "rook-ceph");
        assert_eq!(config.cluster.data_path(4), "/var/lib/ceph/osd/ceph-4");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let yaml = r#"
graph:
  uri: memgraph.internal:7687
  user: admin
ingest:
  batch_size: 100
  format: array
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.graph.uri, "memgraph.internal:7687");
        assert_eq!(config.graph.user, "admin");
        assert_eq!(config.graph.fetch_size, 500);
        assert_eq!(config.ingest.batch_size, 100);
        assert_eq!(config.ingest.format, InventoryFormat::Array);
        assert_eq!(config.cluster.kubectl, "kubectl");
    }

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("  \n").unwrap();
        assert_eq!(config.ingest.batch_size, DEFAULT_BATCH_SIZE);
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let err = Config::from_yaml("ingest:\n  batch_size: 0\n").unwrap_err();
        assert!(matches!(err, CephGraphError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cephgraph.yaml");
        std::fs::write(&path, "cluster:\n  namespace: ceph-dr\n").unwrap();

        let config = Config::load_or_default(Some(&path)).unwrap();
        assert_eq!(config.cluster.namespace, "ceph-dr");

        let missing = Config::load(dir.path().join("missing.yaml")).unwrap_err();
        assert!(matches!(missing, CephGraphError::ConfigRead { .. }));
    }
}
