//! In-process topology store.
//!
//! Same merge-on-key semantics as the Bolt store: nodes are keyed by a
//! deterministic id derived from `(label, key)`, edges are deduped on
//! `(src, dst, type)`. Object batches are staged and applied only if the
//! whole batch succeeds. Used for `--dry-run` and in tests.

use std::collections::{HashMap, HashSet};

use super::{
    object_name, osd_name, pg_name, unique_object_id, unique_object_name, GraphStats,
    TopologyStore, WriteSummary, CONTAINS, IS, OBJECT_LABEL, OSD_LABEL, PG_LABEL,
    UNIQUE_OBJECT_LABEL,
};
use crate::error::{CephGraphError, Result};

/// Deterministic node id: first 16 bytes of BLAKE3 over `label:key`.
pub fn entity_id(label: &str, key: &str) -> u128 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(label.as_bytes());
    hasher.update(b":");
    hasher.update(key.as_bytes());
    let hash = hasher.finalize();
    let mut bytes = [0u8; 16];
    bytes.copy_from_slice(&hash.as_bytes()[0..16]);
    u128::from_le_bytes(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredNode {
    pub label: &'static str,
    pub key: String,
    pub name: String,
    /// Set once, on creation
    pub created_at: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredEdge {
    pub src: u128,
    pub dst: u128,
    pub edge_type: &'static str,
}

#[derive(Debug, Clone, Copy)]
enum Clock {
    Wall,
    Manual(i64),
}

/// Writes accumulated for one operation before they are applied.
#[derive(Default)]
struct Staged {
    nodes: HashMap<u128, StoredNode>,
    edges: Vec<StoredEdge>,
    edge_keys: HashSet<(u128, u128, &'static str)>,
}

impl Staged {
    fn merge_node(&mut self, store: &MemoryStore, label: &'static str, key: String, name: String, now: i64) -> u128 {
        let id = entity_id(label, &key);
        if !store.nodes.contains_key(&id) && !self.nodes.contains_key(&id) {
            self.nodes.insert(id, StoredNode { label, key, name, created_at: now });
        }
        id
    }

    fn merge_edge(&mut self, store: &MemoryStore, src: u128, dst: u128, edge_type: &'static str) {
        let key = (src, dst, edge_type);
        if store.edge_keys.contains(&key) {
            return;
        }
        if self.edge_keys.insert(key) {
            self.edges.push(StoredEdge { src, dst, edge_type });
        }
    }
}

pub struct MemoryStore {
    nodes: HashMap<u128, StoredNode>,
    edges: Vec<StoredEdge>,
    edge_keys: HashSet<(u128, u128, &'static str)>,
    clock: Clock,
    /// Fail the n-th object batch (0-based, counted across the store's life)
    fail_batch: Option<usize>,
    batches_seen: usize,
    snapshots: usize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: Vec::new(),
            edge_keys: HashSet::new(),
            clock: Clock::Wall,
            fail_batch: None,
            batches_seen: 0,
            snapshots: 0,
        }
    }

    /// Pin `created_at` to `now` for subsequent creations.
    pub fn set_time(&mut self, now: i64) {
        self.clock = Clock::Manual(now);
    }

    /// Make the `index`-th object batch fail before anything is applied.
    pub fn fail_batch(&mut self, index: usize) {
        self.fail_batch = Some(index);
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn snapshot_count(&self) -> usize {
        self.snapshots
    }

    pub fn count_label(&self, label: &str) -> usize {
        self.nodes.values().filter(|n| n.label == label).count()
    }

    pub fn get_node(&self, label: &str, key: &str) -> Option<&StoredNode> {
        self.nodes.get(&entity_id(label, key))
    }

    pub fn has_edge(&self, src: (&str, &str), edge_type: &str, dst: (&str, &str)) -> bool {
        let src = entity_id(src.0, src.1);
        let dst = entity_id(dst.0, dst.1);
        self.edges
            .iter()
            .any(|e| e.src == src && e.dst == dst && e.edge_type == edge_type)
    }

    fn now(&self) -> i64 {
        match self.clock {
            Clock::Wall => chrono::Utc::now().timestamp_micros(),
            Clock::Manual(now) => now,
        }
    }

    fn require(&self, label: &str, key: &str) -> Result<u128> {
        let id = entity_id(label, key);
        if self.nodes.contains_key(&id) {
            Ok(id)
        } else {
            Err(CephGraphError::Store(format!("{} {} not found", label, key)))
        }
    }

    fn apply(&mut self, staged: Staged) -> WriteSummary {
        let summary = WriteSummary {
            nodes_created: staged.nodes.len(),
            relationships_created: staged.edges.len(),
        };
        self.nodes.extend(staged.nodes);
        self.edge_keys.extend(staged.edge_keys);
        self.edges.extend(staged.edges);
        summary
    }
}

impl TopologyStore for MemoryStore {
    async fn ping(&mut self) -> Result<()> {
        Ok(())
    }

    async fn upsert_node(&mut self, node_id: i64) -> Result<WriteSummary> {
        let now = self.now();
        let mut staged = Staged::default();
        staged.merge_node(self, OSD_LABEL, node_id.to_string(), osd_name(node_id), now);
        Ok(self.apply(staged))
    }

    async fn upsert_group(&mut self, node_id: i64, group_id: &str) -> Result<WriteSummary> {
        let osd = self.require(OSD_LABEL, &node_id.to_string())?;
        let now = self.now();
        let mut staged = Staged::default();
        let pg = staged.merge_node(self, PG_LABEL, group_id.to_string(), pg_name(group_id), now);
        staged.merge_edge(self, osd, pg, CONTAINS);
        Ok(self.apply(staged))
    }

    async fn upsert_objects(
        &mut self,
        node_id: i64,
        group_id: &str,
        object_ids: &[String],
    ) -> Result<WriteSummary> {
        let batch = self.batches_seen;
        self.batches_seen += 1;

        let osd = self.require(OSD_LABEL, &node_id.to_string())?;
        let pg = self.require(PG_LABEL, group_id)?;
        let now = self.now();

        let mut staged = Staged::default();
        for oid in object_ids {
            let object = staged.merge_node(self, OBJECT_LABEL, oid.clone(), object_name(oid), now);
            let unique = staged.merge_node(
                self,
                UNIQUE_OBJECT_LABEL,
                unique_object_id(node_id, oid),
                unique_object_name(node_id, oid),
                now,
            );
            staged.merge_edge(self, object, unique, IS);
            staged.merge_edge(self, osd, unique, CONTAINS);
            staged.merge_edge(self, pg, unique, CONTAINS);
            staged.merge_edge(self, pg, object, CONTAINS);
        }

        if self.fail_batch == Some(batch) {
            return Err(CephGraphError::Store(format!("injected failure on batch {}", batch)));
        }
        Ok(self.apply(staged))
    }

    async fn stats(&mut self) -> Result<GraphStats> {
        Ok(GraphStats {
            osds: self.count_label(OSD_LABEL) as u64,
            pgs: self.count_label(PG_LABEL) as u64,
            objects: self.count_label(OBJECT_LABEL) as u64,
            unique_objects: self.count_label(UNIQUE_OBJECT_LABEL) as u64,
            relationships: self.edges.len() as u64,
        })
    }

    async fn create_snapshot(&mut self) -> Result<()> {
        self.snapshots += 1;
        Ok(())
    }
}
