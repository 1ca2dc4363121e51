//! Graph loader: writes one OSD's inventory into a [`TopologyStore`].
//!
//! Order of writes: the OSD node, then per placement group the PG node
//! and its edge, then the PG's objects in bounded batches. Each batch is
//! its own transaction; the first failure aborts the run with the group
//! and batch range attached. Re-running is safe because every write is a
//! merge on key.

use std::io::Write;

use crate::config::DEFAULT_BATCH_SIZE;
use crate::error::{CephGraphError, Result};
use crate::graph::{GraphStats, TopologyStore, WriteSummary};
use crate::inventory::GroupObjectSet;

/// One transaction's worth of objects; `start..end` indexes the
/// filtered object list of its group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectBatch<'a> {
    pub start: usize,
    pub end: usize,
    pub object_ids: Vec<&'a str>,
}

/// Drop empty ids, then split into chunks of at most `size`.
pub fn batches(object_ids: &[String], size: usize) -> Vec<ObjectBatch<'_>> {
    let size = size.max(1);
    let valid: Vec<&str> = object_ids
        .iter()
        .map(String::as_str)
        .filter(|oid| !oid.is_empty())
        .collect();

    valid
        .chunks(size)
        .enumerate()
        .map(|(i, chunk)| ObjectBatch {
            start: i * size,
            end: i * size + chunk.len(),
            object_ids: chunk.to_vec(),
        })
        .collect()
}

/// What a load wrote
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub groups: usize,
    pub objects: usize,
    pub batches: usize,
    pub written: WriteSummary,
}

pub struct GraphLoader<'s, S: TopologyStore> {
    store: &'s mut S,
    batch_size: usize,
}

impl<'s, S: TopologyStore> GraphLoader<'s, S> {
    pub fn new(store: &'s mut S) -> Self {
        Self {
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub async fn load(&mut self, node_id: i64, groups: &[GroupObjectSet]) -> Result<LoadReport> {
        let mut report = LoadReport::default();

        tracing::info!("Creating OSD node for ID {}", node_id);
        report.written += self
            .store
            .upsert_node(node_id)
            .await
            .map_err(|e| CephGraphError::NodeUpsert {
                node_id,
                source: Box::new(e),
            })?;

        for (i, group) in groups.iter().enumerate() {
            tracing::info!(
                "Processing PG {}/{}: {} with {} objects",
                i + 1,
                groups.len(),
                group.group_id,
                group.object_ids.len()
            );
            self.load_group(node_id, group, &mut report).await?;
            report.groups += 1;
        }

        tracing::info!(
            groups = report.groups,
            objects = report.objects,
            batches = report.batches,
            nodes_created = report.written.nodes_created,
            relationships_created = report.written.relationships_created,
            "load complete"
        );
        Ok(report)
    }

    async fn load_group(&mut self, node_id: i64, group: &GroupObjectSet, report: &mut LoadReport) -> Result<()> {
        report.written += self
            .store
            .upsert_group(node_id, &group.group_id)
            .await
            .map_err(|e| CephGraphError::GroupUpsert {
                group: group.group_id.clone(),
                source: Box::new(e),
            })?;

        for batch in batches(&group.object_ids, self.batch_size) {
            let object_ids: Vec<String> = batch.object_ids.iter().map(|oid| oid.to_string()).collect();
            let written = self
                .store
                .upsert_objects(node_id, &group.group_id, &object_ids)
                .await
                .map_err(|e| CephGraphError::Batch {
                    group: group.group_id.clone(),
                    start: batch.start,
                    end: batch.end,
                    source: Box::new(e),
                })?;

            tracing::debug!(
                "Batch processed: {} objects, nodes created: {}, relationships created: {}",
                object_ids.len(),
                written.nodes_created,
                written.relationships_created
            );
            tracing::info!(
                "Processed batch {}-{} ({} objects) for PG {}",
                batch.start,
                batch.end,
                object_ids.len(),
                group.group_id
            );

            report.written += written;
            report.objects += object_ids.len();
            report.batches += 1;
        }

        Ok(())
    }
}

/// Full store-side run: check the connection, load, print the store's
/// statistics to `out`, then snapshot.
pub async fn ingest<S: TopologyStore, W: Write>(
    store: &mut S,
    node_id: i64,
    groups: &[GroupObjectSet],
    batch_size: usize,
    out: &mut W,
) -> Result<(LoadReport, GraphStats)> {
    store.ping().await?;

    let report = GraphLoader::new(&mut *store)
        .with_batch_size(batch_size)
        .load(node_id, groups)
        .await?;

    let stats = store.stats().await?;
    writeln!(out, "{}", stats)?;

    store.create_snapshot().await?;
    Ok((report, stats))
}
