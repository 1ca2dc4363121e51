//! Per-PG metadata collection from the cluster and from stopped OSDs.
//!
//! OSDs are reached through their maintenance pods. A query that fails
//! yields `{}` rather than an error, so one unreachable source never stops
//! the others from being compared.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::{recency, report::DivergenceReport, DivergenceRecord, SourceLabel};
use crate::command::CommandRunner;
use crate::config::ClusterConfig;
use crate::error::Result;

const EMPTY_PAYLOAD: &str = "{}";

/// Group ids become part of artifact file names, so no path separators.
fn is_valid_group_id(id: &str) -> bool {
    !id.contains('/') && !id.contains('\\')
}

/// Split a comma-separated group id list, dropping blank entries and ids
/// that contain a path separator.
pub fn parse_group_ids(list: &str) -> Vec<String> {
    let mut ids = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        if is_valid_group_id(entry) {
            ids.push(entry.to_string());
        } else {
            tracing::warn!("ignoring PG id {:?}: contains a path separator", entry);
        }
    }
    ids
}

/// Split a comma-separated OSD id list, keeping the first occurrence of
/// each id. Non-numeric entries are logged and dropped.
pub fn parse_osd_ids(list: &str) -> Vec<u32> {
    let mut ids = Vec::new();
    for entry in list.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        match entry.parse::<u32>() {
            Ok(id) if ids.contains(&id) => tracing::debug!("ignoring repeated OSD id {}", id),
            Ok(id) => ids.push(id),
            Err(e) => tracing::warn!("ignoring OSD id {:?}: {}", entry, e),
        }
    }
    ids
}

/// Find the maintenance pod of each OSD, keeping the caller's order.
///
/// Lists pods once. OSDs without a `rook-ceph-osd-<id>-maintenance-*`
/// pod are logged and left out; if the listing itself fails every OSD is
/// missing.
pub fn locate_maintenance_pods(
    runner: &dyn CommandRunner,
    kubectl: &str,
    namespace: &str,
    osd_ids: &[u32],
) -> Result<Vec<(u32, String)>> {
    let output = runner.run(
        kubectl,
        &[
            "get",
            "pods",
            "-n",
            namespace,
            "--no-headers",
            "-o",
            "custom-columns=NAME:.metadata.name",
        ],
    )?;
    if !output.is_success() {
        tracing::warn!("listing pods in {} failed: {}", namespace, output.stderr.trim());
    }
    let pods: Vec<&str> = if output.is_success() {
        output.stdout.lines().map(str::trim).filter(|l| !l.is_empty()).collect()
    } else {
        Vec::new()
    };

    let mut located: Vec<(u32, String)> = Vec::with_capacity(osd_ids.len());
    for &id in osd_ids {
        if located.iter().any(|(seen, _)| *seen == id) {
            continue;
        }
        let marker = format!("rook-ceph-osd-{}-maintenance-", id);
        match pods.iter().find(|pod| pod.contains(&marker)) {
            Some(pod) => {
                tracing::debug!(osd = id, pod = %pod, "found maintenance pod");
                located.push((id, pod.to_string()));
            }
            None => tracing::warn!("Failed to find maintenance pod for OSD {}", id),
        }
    }
    Ok(located)
}

/// Everything collected for one placement group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupSources {
    pub group_id: String,
    pub cluster: DivergenceRecord,
    pub osds: HashMap<u32, DivergenceRecord>,
}

impl GroupSources {
    /// OSD records in `osd_order`, skipping OSDs that produced none.
    pub fn ordered_osds(&self, osd_order: &[u32]) -> Vec<DivergenceRecord> {
        osd_order.iter().filter_map(|id| self.osds.get(id).cloned()).collect()
    }

    pub fn report(&self, osd_order: &[u32]) -> DivergenceReport {
        DivergenceReport::build(&self.cluster, &self.osds, osd_order)
    }

    pub fn most_recent(&self, osd_order: &[u32]) -> SourceLabel {
        recency::most_recent(&self.cluster, &self.ordered_osds(osd_order))
    }
}

pub struct MetadataCollector<'r> {
    runner: &'r dyn CommandRunner,
    kubectl: String,
    namespace: String,
    data_path_prefix: String,
    output_dir: PathBuf,
}

impl<'r> MetadataCollector<'r> {
    pub fn new(runner: &'r dyn CommandRunner, cluster: &ClusterConfig, namespace: &str, output_dir: &Path) -> Self {
        Self {
            runner,
            kubectl: cluster.kubectl.clone(),
            namespace: namespace.to_string(),
            data_path_prefix: cluster.data_path_prefix.clone(),
            output_dir: output_dir.to_path_buf(),
        }
    }

    pub fn cluster_artifact(&self, group_id: &str) -> PathBuf {
        self.output_dir.join(format!("pg_{}_cluster.json", group_id))
    }

    pub fn osd_artifact(&self, group_id: &str, osd_id: u32) -> PathBuf {
        self.output_dir.join(format!("pg_{}_osd_{}.json", group_id, osd_id))
    }

    /// `kubectl rook-ceph ceph pg <pg> query`, `{}` on failure.
    pub fn query_cluster(&self, group_id: &str) -> Result<String> {
        let output = self.runner.run(&self.kubectl, &["rook-ceph", "ceph", "pg", group_id, "query"])?;
        if !output.is_success() {
            tracing::warn!("cluster query for PG {} failed: {}", group_id, output.stderr.trim());
            return Ok(EMPTY_PAYLOAD.to_string());
        }
        Ok(output.stdout)
    }

    /// `ceph-objectstore-tool --op info` inside the maintenance pod, `{}` on failure.
    pub fn query_osd(&self, pod: &str, osd_id: u32, group_id: &str) -> Result<String> {
        let data_path = format!("{}{}", self.data_path_prefix, osd_id);
        let args = [
            "-n",
            self.namespace.as_str(),
            "exec",
            pod,
            "--",
            "ceph-objectstore-tool",
            "--data-path",
            data_path.as_str(),
            "--pgid",
            group_id,
            "--op",
            "info",
        ];
        let output = self.runner.run(&self.kubectl, &args)?;
        if !output.is_success() {
            tracing::warn!("OSD {} info for PG {} failed: {}", osd_id, group_id, output.stderr.trim());
            return Ok(EMPTY_PAYLOAD.to_string());
        }
        Ok(output.stdout)
    }

    /// Query every source for `group_id` and save each raw payload.
    ///
    /// Returns `None` when the group id is not usable as a file name or
    /// the cluster payload is not JSON. An OSD whose payload is not JSON is
    /// logged and left out of `osds`.
    pub fn collect(&self, group_id: &str, pods: &[(u32, String)]) -> Result<Option<GroupSources>> {
        tracing::info!("Processing PG {}", group_id);
        if !is_valid_group_id(group_id) {
            tracing::error!("refusing PG id {:?}: contains a path separator", group_id);
            return Ok(None);
        }

        let payload = self.query_cluster(group_id)?;
        save_payload(&self.cluster_artifact(group_id), &payload);
        let mut cluster = match DivergenceRecord::from_json(SourceLabel::Cluster, &payload) {
            Ok(record) => record,
            Err(e) => {
                tracing::error!("Error unmarshaling cluster JSON for PG {}: {}", group_id, e);
                return Ok(None);
            }
        };
        if cluster.pgid.is_empty() {
            cluster.pgid = group_id.to_string();
        }

        let mut osds = HashMap::with_capacity(pods.len());
        for (osd_id, pod) in pods {
            let payload = self.query_osd(pod, *osd_id, group_id)?;
            save_payload(&self.osd_artifact(group_id, *osd_id), &payload);
            match DivergenceRecord::from_json(SourceLabel::Osd(*osd_id), &payload) {
                Ok(record) => {
                    osds.insert(*osd_id, record);
                }
                Err(e) => tracing::warn!("Error unmarshaling OSD {} JSON for PG {}: {}", osd_id, group_id, e),
            }
        }

        Ok(Some(GroupSources {
            group_id: group_id.to_string(),
            cluster,
            osds,
        }))
    }
}

fn save_payload(path: &Path, payload: &str) {
    match std::fs::write(path, payload) {
        Ok(()) => tracing::debug!("saved {}", path.display()),
        Err(e) => tracing::warn!("Failed to save {}: {}", path.display(), e),
    }
}
