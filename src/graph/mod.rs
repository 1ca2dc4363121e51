//! Graph store API for the placement topology.
//!
//! The topology is four labels connected by two relationship types:
//!
//! ```text
//! (OSD)-[:CONTAINS]->(PG)
//! (PG)-[:CONTAINS]->(Object)
//! (Object)-[:IS]->(UniqueObject)
//! (OSD)-[:CONTAINS]->(UniqueObject)
//! (PG)-[:CONTAINS]->(UniqueObject)
//! ```
//!
//! `Object` is keyed by the object id cluster-wide; `UniqueObject` is the
//! per-OSD copy, keyed by `<osd>-<oid>`. Every write is a merge on key:
//! `created_at` and `name` are set only when the key is first created.

pub mod bolt;
pub mod memory;

pub use bolt::BoltStore;
pub use memory::MemoryStore;

use std::fmt;

use crate::error::Result;

pub const OSD_LABEL: &str = "OSD";
pub const PG_LABEL: &str = "PG";
pub const OBJECT_LABEL: &str = "Object";
pub const UNIQUE_OBJECT_LABEL: &str = "UniqueObject";

pub const CONTAINS: &str = "CONTAINS";
pub const IS: &str = "IS";

pub fn osd_name(node_id: i64) -> String {
    format!("osd-{}", node_id)
}

pub fn pg_name(group_id: &str) -> String {
    format!("PG {}", group_id)
}

pub fn object_name(object_id: &str) -> String {
    format!("Obj {}", object_id)
}

/// Key of the per-OSD wrapper around an object.
pub fn unique_object_id(node_id: i64, object_id: &str) -> String {
    format!("{}-{}", node_id, object_id)
}

pub fn unique_object_name(node_id: i64, object_id: &str) -> String {
    format!("[{}] Obj {}", node_id, object_id)
}

/// Counters reported by a write, when the store can provide them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteSummary {
    pub nodes_created: usize,
    pub relationships_created: usize,
}

impl std::ops::AddAssign for WriteSummary {
    fn add_assign(&mut self, other: Self) {
        self.nodes_created += other.nodes_created;
        self.relationships_created += other.relationships_created;
    }
}

/// Entity counts across the whole store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub osds: u64,
    pub pgs: u64,
    pub objects: u64,
    pub unique_objects: u64,
    pub relationships: u64,
}

impl fmt::Display for GraphStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Database Statistics ===")?;
        writeln!(f, "OSD Count: {}", self.osds)?;
        writeln!(f, "PG Count: {}", self.pgs)?;
        writeln!(f, "Object Count: {}", self.objects)?;
        writeln!(f, "UniqueObject Count: {}", self.unique_objects)?;
        writeln!(f, "Relationship Count: {}", self.relationships)?;
        write!(f, "===========================")
    }
}

/// Idempotent topology writes.
///
/// Implementations must make every method a merge on key so that
/// re-running an ingestion over the same inventory changes nothing.
#[allow(async_fn_in_trait)]
pub trait TopologyStore {
    /// Round-trip a trivial statement to prove the store is reachable.
    async fn ping(&mut self) -> Result<()>;

    /// Merge the `OSD` node.
    async fn upsert_node(&mut self, node_id: i64) -> Result<WriteSummary>;

    /// Merge the `PG` node and its `CONTAINS` edge from the OSD.
    ///
    /// The OSD must already exist.
    async fn upsert_group(&mut self, node_id: i64, group_id: &str) -> Result<WriteSummary>;

    /// Merge a batch of objects in a single transaction.
    ///
    /// Either every `Object`, `UniqueObject` and relationship for the
    /// batch is written, or none is.
    async fn upsert_objects(
        &mut self,
        node_id: i64,
        group_id: &str,
        object_ids: &[String],
    ) -> Result<WriteSummary>;

    async fn stats(&mut self) -> Result<GraphStats>;

    /// Ask the store for a durable checkpoint.
    async fn create_snapshot(&mut self) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_names() {
        assert_eq!(osd_name(3), "osd-3");
        assert_eq!(pg_name("1.2a"), "PG 1.2a");
        assert_eq!(object_name("rbd_data.1"), "Obj rbd_data.1");
        assert_eq!(unique_object_id(3, "rbd_data.1"), "3-rbd_data.1");
        assert_eq!(unique_object_name(3, "rbd_data.1"), "[3] Obj rbd_data.1");
    }

    #[test]
    fn test_summary_accumulates() {
        let mut total = WriteSummary::default();
        total += WriteSummary { nodes_created: 2, relationships_created: 4 };
        total += WriteSummary { nodes_created: 1, relationships_created: 0 };
        assert_eq!(total, WriteSummary { nodes_created: 3, relationships_created: 4 });
    }

    #[test]
    fn test_stats_display() {
        let stats = GraphStats { osds: 1, pgs: 2, objects: 3, unique_objects: 3, relationships: 11 };
        let rendered = stats.to_string();
        assert!(rendered.contains("PG Count: 2"));
        assert!(rendered.contains("Relationship Count: 11"));
    }
}
