//! Inventory fetcher: runs the object listing inside an OSD pod.

use std::path::Path;
use std::sync::LazyLock;

use regex_lite::Regex;

use crate::command::CommandRunner;
use crate::config::ClusterConfig;
use crate::error::{CephGraphError, Result};

/// Where to list objects from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InventorySource {
    pub namespace: String,
    pub pod: String,
    pub osd_id: u32,
    pub data_path: String,
}

impl InventorySource {
    /// Derive the OSD id and data path from the pod name.
    pub fn for_pod(pod: &str, namespace: &str, cluster: &ClusterConfig) -> Result<Self> {
        let osd_id = extract_osd_id(pod)?;
        Ok(Self {
            namespace: namespace.to_string(),
            pod: pod.to_string(),
            osd_id,
            data_path: cluster.data_path(osd_id),
        })
    }
}

static OSD_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"osd-([0-9]+)").unwrap());

/// `rook-ceph-osd-12-7d9f...` → `12`
pub fn extract_osd_id(pod: &str) -> Result<u32> {
    OSD_ID_RE
        .captures(pod)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
        .ok_or_else(|| CephGraphError::InvalidPodName(pod.to_string()))
}

/// Confirm the pod exists before anything is written anywhere.
pub fn validate_osd_pod(runner: &dyn CommandRunner, kubectl: &str, source: &InventorySource) -> Result<()> {
    let output = runner.run(kubectl, &["-n", &source.namespace, "get", "pod", &source.pod])?;
    if !output.is_success() {
        return Err(CephGraphError::PodNotFound {
            pod: source.pod.clone(),
            namespace: source.namespace.clone(),
        });
    }
    Ok(())
}

/// List the OSD's objects and save the raw output to `artifact`.
///
/// A non-zero exit is a hard failure: without an inventory there is
/// nothing to load.
pub fn fetch_inventory(
    runner: &dyn CommandRunner,
    kubectl: &str,
    source: &InventorySource,
    artifact: &Path,
) -> Result<String> {
    let args = [
        "-n",
        source.namespace.as_str(),
        "exec",
        source.pod.as_str(),
        "--",
        "ceph-objectstore-tool",
        "--data-path",
        source.data_path.as_str(),
        "--op",
        "list",
    ];
    let raw = runner.run_checked(kubectl, &args).map_err(|e| {
        tracing::error!("error listing objects: {}", e);
        e
    })?;

    std::fs::write(artifact, &raw)?;
    tracing::info!(
        osd = source.osd_id,
        bytes = raw.len(),
        artifact = %artifact.display(),
        "fetched object inventory"
    );
    tracing::debug!("objects in OSD: {}", raw);
    Ok(raw)
}
