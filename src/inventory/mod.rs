//! OSD object inventory: fetching `ceph-objectstore-tool --op list`
//! output and grouping it into placement groups.
//!
//! The listing tool prints one JSON array per object:
//!
//! ```text
//! ["1.2",{"oid":"rbd_data.1f2a","key":"","snapid":-2,"hash":1234,"max":0,"pool":1,"namespace":""}]
//! ```
//!
//! Older tooling wrapped all records in a single JSON array. Both shapes
//! are accepted by [`parse_inventory`].

pub mod fetch;

use std::collections::HashMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{CephGraphError, Result};

pub use fetch::{extract_osd_id, fetch_inventory, validate_osd_pod, InventorySource};

/// One placement group's objects as reported by a single OSD.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupObjectSet {
    pub group_id: String,
    /// First-seen order, duplicates preserved
    pub object_ids: Vec<String>,
}

/// Top-level layout of the listing output
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum InventoryFormat {
    /// Detect from the payload
    #[default]
    Auto,
    /// One JSON array per line
    Lines,
    /// Legacy single JSON array of records
    Array,
}

/// Parse raw listing output into per-group object lists.
///
/// Malformed records are skipped. Groups are returned in the order their
/// id was first seen.
pub fn parse_inventory(raw: &str, format: InventoryFormat) -> Result<Vec<GroupObjectSet>> {
    let records = match format {
        InventoryFormat::Lines => parse_lines(raw)?,
        InventoryFormat::Array => parse_array(raw)?,
        InventoryFormat::Auto => match detect_array(raw) {
            Some(records) => records,
            None => parse_lines(raw)?,
        },
    };

    let groups = group_records(&records);
    tracing::info!(groups = groups.len(), records = records.len(), "parsed inventory");
    Ok(groups)
}

/// Returns the records when `raw` is a whole-array legacy payload.
///
/// A top-level array is a single record only if its first element is the
/// group id string; anything else is a list of records, malformed ones
/// included.
fn detect_array(raw: &str) -> Option<Vec<Value>> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('[') {
        return None;
    }
    match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(items)) if !items.first().is_some_and(Value::is_string) => Some(items),
        _ => None,
    }
}

fn parse_array(raw: &str) -> Result<Vec<Value>> {
    match serde_json::from_str::<Value>(raw.trim()) {
        Ok(Value::Array(items)) => Ok(items),
        Ok(_) => Err(CephGraphError::UnparseableInventory(
            "expected a JSON array of records".to_string(),
        )),
        Err(e) => Err(CephGraphError::UnparseableInventory(format!(
            "failed to parse object list JSON: {}",
            e
        ))),
    }
}

fn parse_lines(raw: &str) -> Result<Vec<Value>> {
    let mut records = Vec::new();
    let mut non_blank = 0usize;

    for line in raw.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        non_blank += 1;
        match serde_json::from_str::<Value>(line) {
            Ok(value) if value.is_array() => records.push(value),
            Ok(_) => tracing::warn!("skipping line that is not a record: {}", line),
            Err(e) => tracing::warn!("failed to parse line: {}, error: {}", line, e),
        }
    }

    if non_blank > 0 && records.is_empty() {
        return Err(CephGraphError::UnparseableInventory(format!(
            "none of {} lines is a JSON record",
            non_blank
        )));
    }
    Ok(records)
}

/// Extract `(group id, oid)` from a single record, `None` if malformed.
fn record_entry(record: &Value) -> Option<(&str, &str)> {
    let fields = record.as_array()?;
    if fields.len() < 2 {
        return None;
    }
    let group_id = fields[0].as_str()?;
    let oid = fields[1].as_object()?.get("oid")?.as_str()?;
    if oid.is_empty() {
        return None;
    }
    Some((group_id, oid))
}

fn group_records(records: &[Value]) -> Vec<GroupObjectSet> {
    let mut groups: Vec<GroupObjectSet> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for record in records {
        let Some((group_id, oid)) = record_entry(record) else {
            tracing::debug!(record = %record, "skipping malformed inventory record");
            continue;
        };

        let slot = *index.entry(group_id).or_insert_with(|| {
            groups.push(GroupObjectSet {
                group_id: group_id.to_string(),
                object_ids: Vec::new(),
            });
            groups.len() - 1
        });
        groups[slot].object_ids.push(oid.to_string());
        tracing::debug!("found object: {} in PG: {}", oid, group_id);
    }

    groups
}
