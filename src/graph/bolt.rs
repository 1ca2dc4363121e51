//! Bolt-protocol store (Memgraph, Neo4j) backed by `neo4rs`.
//!
//! Every statement binds its identifiers as parameters; group and object
//! ids never become part of the statement text. Object batches run in an
//! explicit transaction per batch that is rolled back if any statement
//! fails.

use neo4rs::{query, ConfigBuilder, Graph, Query, Txn};

use super::{osd_name, pg_name, GraphStats, TopologyStore, WriteSummary};
use crate::config::GraphConfig;
use crate::error::{CephGraphError, Result};

const PING: &str = "RETURN 'Connection successful' AS message";

const UPSERT_OSD: &str = "
    MERGE (o:OSD {id: $osd_id})
    ON CREATE SET
        o.created_at = timestamp(),
        o.name = $osd_name
    RETURN o.id AS id, o.name AS name";

const UPSERT_PG: &str = "
    MATCH (o:OSD {id: $osd_id})
    MERGE (p:PG {id: $pg_id})
    ON CREATE SET
        p.created_at = timestamp(),
        p.name = $pg_name
    MERGE (o)-[:CONTAINS]->(p)
    RETURN p.id AS pg_id, p.name AS pg_name";

// Object and UniqueObject are merged separately: merging the IS path as a
// whole would create a second Object node whenever the object already
// exists under another OSD.
const UPSERT_OBJECTS: &str = "
    MATCH (o:OSD {id: $osd_id})
    MATCH (p:PG {id: $pg_id})
    UNWIND $objects AS oid
    MERGE (b:Object {id: oid})
    ON CREATE SET
        b.created_at = timestamp(),
        b.name = 'Obj ' + oid
    MERGE (ub:UniqueObject {id: $unique_prefix + oid})
    ON CREATE SET
        ub.created_at = timestamp(),
        ub.name = $unique_name_prefix + oid
    MERGE (b)-[:IS]->(ub)
    MERGE (o)-[:CONTAINS]->(ub)
    MERGE (p)-[:CONTAINS]->(ub)
    MERGE (p)-[:CONTAINS]->(b)";

const SNAPSHOT: &str = "CALL mg.create_snapshot()";

const STATS: [(&str, &str); 5] = [
    ("OSD Count", "MATCH (o:OSD) RETURN count(o) AS count"),
    ("PG Count", "MATCH (p:PG) RETURN count(p) AS count"),
    ("Object Count", "MATCH (obj:Object) RETURN count(obj) AS count"),
    ("UniqueObject Count", "MATCH (uo:UniqueObject) RETURN count(uo) AS count"),
    ("Relationship Count", "MATCH ()-[r]->() RETURN count(r) AS count"),
];

/// Normalize `host:port` to a `bolt://` URI.
pub fn bolt_uri(target: &str) -> String {
    if target.contains("://") {
        target.to_string()
    } else {
        format!("bolt://{}", target)
    }
}

/// Assemble counts read in `STATS` order. A negative count means the
/// column did not hold what the statement promised.
fn graph_stats(counts: [i64; 5]) -> Result<GraphStats> {
    let mut checked = [0u64; 5];
    for (slot, ((name, _), count)) in checked.iter_mut().zip(STATS.iter().zip(counts)) {
        *slot = u64::try_from(count)
            .map_err(|_| CephGraphError::Store(format!("{} returned {}", name, count)))?;
    }
    Ok(GraphStats {
        osds: checked[0],
        pgs: checked[1],
        objects: checked[2],
        unique_objects: checked[3],
        relationships: checked[4],
    })
}

/// The three steps of a batch transaction.
#[allow(async_fn_in_trait)]
pub trait BatchTransaction: Sized {
    async fn run(&mut self, q: Query) -> Result<()>;
    async fn commit(self) -> Result<()>;
    async fn rollback(self) -> Result<()>;
}

impl BatchTransaction for Txn {
    async fn run(&mut self, q: Query) -> Result<()> {
        Ok(Txn::run(self, q).await?)
    }

    async fn commit(self) -> Result<()> {
        Ok(Txn::commit(self).await?)
    }

    async fn rollback(self) -> Result<()> {
        Ok(Txn::rollback(self).await?)
    }
}

/// Run `q` and commit, or roll back and return the statement's error.
pub async fn run_in_transaction<T: BatchTransaction>(mut txn: T, q: Query) -> Result<()> {
    if let Err(e) = txn.run(q).await {
        if let Err(rollback) = txn.rollback().await {
            tracing::warn!("rollback failed: {}", rollback);
        }
        return Err(e);
    }
    txn.commit().await
}

/// Connection pool handle.
///
/// The pool is owned here and closed when the store is dropped;
/// transactions borrow a connection only for the duration of one batch.
pub struct BoltStore {
    graph: Graph,
}

impl BoltStore {
    pub async fn connect(config: &GraphConfig) -> Result<Self> {
        let uri = bolt_uri(&config.uri);
        tracing::info!("Connecting to Memgraph at {}", uri);

        let mut builder = ConfigBuilder::default()
            .uri(uri.as_str())
            .user(config.user.as_str())
            .password(config.password.as_str())
            .max_connections(config.max_connections)
            .fetch_size(config.fetch_size);
        if let Some(db) = config.database.as_deref() {
            builder = builder.db(db);
        }

        let graph = Graph::connect(builder.build()?).await?;
        Ok(Self { graph })
    }

    /// Run `q` and return the first row's `column` as an integer.
    async fn scalar(&self, q: Query, column: &str) -> Result<i64> {
        let mut stream = self.graph.execute(q).await?;
        let row = stream
            .next()
            .await?
            .ok_or_else(|| CephGraphError::Store(format!("no row returned for {}", column)))?;
        row.get::<i64>(column)
            .map_err(|e| CephGraphError::Store(format!("reading column {}: {}", column, e)))
    }
}

impl TopologyStore for BoltStore {
    async fn ping(&mut self) -> Result<()> {
        tracing::info!("Testing Memgraph connection...");
        let mut stream = self.graph.execute(query(PING)).await?;
        if let Some(row) = stream.next().await? {
            let message: String = row.get("message").unwrap_or_default();
            tracing::debug!("connection test result: {}", message);
        }
        tracing::info!("Memgraph connection OK");
        Ok(())
    }

    async fn upsert_node(&mut self, node_id: i64) -> Result<WriteSummary> {
        let q = query(UPSERT_OSD)
            .param("osd_id", node_id)
            .param("osd_name", osd_name(node_id));

        let mut stream = self.graph.execute(q).await?;
        if let Some(row) = stream.next().await? {
            let name: String = row.get("name").unwrap_or_default();
            tracing::debug!("merged OSD node: id={}, name={}", node_id, name);
        }
        // Bolt reports no write counters on this path.
        Ok(WriteSummary::default())
    }

    async fn upsert_group(&mut self, node_id: i64, group_id: &str) -> Result<WriteSummary> {
        let q = query(UPSERT_PG)
            .param("osd_id", node_id)
            .param("pg_id", group_id)
            .param("pg_name", pg_name(group_id));

        let mut stream = self.graph.execute(q).await?;
        if stream.next().await?.is_none() {
            return Err(CephGraphError::Store(format!("OSD {} not found", node_id)));
        }
        while stream.next().await?.is_some() {}
        Ok(WriteSummary::default())
    }

    async fn upsert_objects(
        &mut self,
        node_id: i64,
        group_id: &str,
        object_ids: &[String],
    ) -> Result<WriteSummary> {
        let q = query(UPSERT_OBJECTS)
            .param("osd_id", node_id)
            .param("pg_id", group_id)
            .param("objects", object_ids.to_vec())
            .param("unique_prefix", format!("{}-", node_id))
            .param("unique_name_prefix", format!("[{}] Obj ", node_id));

        let txn = self.graph.start_txn().await?;
        run_in_transaction(txn, q).await?;
        Ok(WriteSummary::default())
    }

    async fn stats(&mut self) -> Result<GraphStats> {
        let mut counts = [0i64; 5];
        for (slot, (name, statement)) in counts.iter_mut().zip(STATS) {
            *slot = self.scalar(query(statement), "count").await?;
            tracing::debug!("{}: {}", name, slot);
        }
        graph_stats(counts)
    }

    async fn create_snapshot(&mut self) -> Result<()> {
        tracing::info!("Creating snapshot...");
        let mut stream = self
            .graph
            .execute(query(SNAPSHOT))
            .await
            .map_err(|e| CephGraphError::Snapshot(e.to_string()))?;
        while stream
            .next()
            .await
            .map_err(|e| CephGraphError::Snapshot(e.to_string()))?
            .is_some()
        {}
        tracing::info!("Snapshot created successfully");
        Ok(())
    }
}
