//! Recency ranking of replica sources.

use super::{DivergenceRecord, SourceLabel};

/// `(epoch, version)` parsed from a `last_update` marker such as `"1234'5678"`.
///
/// Ordered lexicographically, so a higher epoch always wins and the version
/// only breaks ties within an epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct RecencyKey {
    pub epoch: i64,
    pub version: i64,
}

impl RecencyKey {
    /// Anything other than exactly two `'`-separated parts is `(0, 0)`, the
    /// lowest possible recency. A part that is not an integer counts as 0.
    pub fn parse(marker: &str) -> Self {
        let parts: Vec<&str> = marker.split('\'').collect();
        if parts.len() != 2 {
            return Self::default();
        }
        Self {
            epoch: parts[0].trim().parse().unwrap_or(0),
            version: parts[1].trim().parse().unwrap_or(0),
        }
    }
}

/// Order sources from most to least recent.
///
/// Candidates are the cluster record followed by OSD records in the order
/// given; the sort is stable, so exact ties keep that order.
pub fn rank(cluster: &DivergenceRecord, osds: &[DivergenceRecord]) -> Vec<(SourceLabel, RecencyKey)> {
    let mut entries: Vec<(SourceLabel, RecencyKey)> = std::iter::once(cluster)
        .chain(osds.iter())
        .map(|record| (record.source, record.recency()))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1));
    entries
}

/// Label of the source judged most up to date.
pub fn most_recent(cluster: &DivergenceRecord, osds: &[DivergenceRecord]) -> SourceLabel {
    rank(cluster, osds)
        .first()
        .map(|(label, _)| *label)
        .unwrap_or(cluster.source)
}
