//! cephgraph: Ceph disaster-recovery tooling.
//!
//! Two pipelines share this library:
//! - ingest: list the objects of a stopped OSD, group them by placement
//!   group and merge the OSD → PG → object topology into a graph store;
//! - reconcile: compare one PG's metadata across the cluster and each
//!   OSD's local copy and name the most up-to-date source.

pub mod command;
pub mod config;
pub mod error;
pub mod graph;
pub mod inventory;
pub mod loader;
pub mod logging;
pub mod reconcile;

pub use command::{CommandOutput, CommandRunner, SystemRunner};
pub use config::Config;
pub use error::{CephGraphError, ErrorCategory, Result};
pub use graph::{BoltStore, GraphStats, MemoryStore, TopologyStore, WriteSummary};
pub use inventory::{parse_inventory, GroupObjectSet, InventoryFormat, InventorySource};
pub use loader::{GraphLoader, LoadReport};
pub use reconcile::{DivergenceRecord, DivergenceReport, SourceLabel};
