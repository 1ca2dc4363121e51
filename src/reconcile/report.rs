//! Field-by-field comparison of one PG across sources.
//!
//! Columns are `cluster` followed by every OSD that produced a record, in
//! the order the caller asked for them. A cell is flagged when it differs
//! from the cell immediately to its left, so a value that changes once and
//! changes back is flagged twice.

use std::collections::HashMap;
use std::fmt;
use std::io::{self, Write};

use super::{DivergenceRecord, SourceLabel};

type FieldGetter = fn(&DivergenceRecord) -> String;

/// Compared fields, in row order
pub const FIELDS: [(&str, FieldGetter); 5] = [
    ("last_update", |r: &DivergenceRecord| r.last_update.clone()),
    ("last_complete", |r: &DivergenceRecord| r.last_complete.clone()),
    ("last_user_version", |r: &DivergenceRecord| r.last_user_version.to_string()),
    ("num_objects", |r: &DivergenceRecord| r.num_objects.to_string()),
    ("stats.version", |r: &DivergenceRecord| r.stats_version.clone()),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    pub value: String,
    pub diverges: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    pub field: &'static str,
    pub cells: Vec<Cell>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DivergenceReport {
    pub columns: Vec<SourceLabel>,
    pub rows: Vec<ReportRow>,
}

/// `true` for every value that differs from its left neighbour.
pub fn flag_divergence<T: PartialEq>(values: &[T]) -> Vec<bool> {
    let mut flags = Vec::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
        flags.push(i > 0 && *value != values[i - 1]);
    }
    flags
}

impl DivergenceReport {
    /// Tabulate `cluster` and the records of `osd_order` that exist in `osds`.
    pub fn build(cluster: &DivergenceRecord, osds: &HashMap<u32, DivergenceRecord>, osd_order: &[u32]) -> Self {
        let mut sources: Vec<&DivergenceRecord> = vec![cluster];
        let mut seen: Vec<u32> = Vec::with_capacity(osd_order.len());
        for id in osd_order {
            if seen.contains(id) {
                continue;
            }
            seen.push(*id);
            if let Some(record) = osds.get(id) {
                sources.push(record);
            }
        }

        let columns = sources.iter().map(|r| r.source).collect();
        let rows = FIELDS
            .iter()
            .map(|&(field, get)| {
                let values: Vec<String> = sources.iter().map(|&r| get(r)).collect();
                let flags = flag_divergence(&values);
                ReportRow {
                    field,
                    cells: values
                        .into_iter()
                        .zip(flags)
                        .map(|(value, diverges)| Cell { value, diverges })
                        .collect(),
                }
            })
            .collect();

        Self { columns, rows }
    }

    pub fn has_divergence(&self) -> bool {
        self.rows.iter().any(|row| row.cells.iter().any(|c| c.diverges))
    }

    /// Fields with at least one flagged cell
    pub fn divergent_fields(&self) -> Vec<&'static str> {
        self.rows
            .iter()
            .filter(|row| row.cells.iter().any(|c| c.diverges))
            .map(|row| row.field)
            .collect()
    }

    /// Write the table, flagged cells prefixed with `*`.
    pub fn render<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let mut grid: Vec<Vec<String>> = Vec::with_capacity(self.rows.len() + 1);
        let mut header = vec!["Field".to_string()];
        header.extend(self.columns.iter().map(|c| c.to_string()));
        grid.push(header);
        for row in &self.rows {
            let mut line = vec![row.field.to_string()];
            line.extend(row.cells.iter().map(|cell| {
                if cell.diverges {
                    format!("*{}", cell.value)
                } else {
                    cell.value.clone()
                }
            }));
            grid.push(line);
        }

        let width = grid.iter().map(Vec::len).max().unwrap_or(0);
        let widths: Vec<usize> = (0..width)
            .map(|col| {
                grid.iter()
                    .filter_map(|line| line.get(col))
                    .map(|text| text.chars().count())
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        for line in &grid {
            let mut rendered = String::new();
            for (col, text) in line.iter().enumerate() {
                if col > 0 {
                    rendered.push(' ');
                }
                rendered.push_str(&format!("{:<w$}", text, w = widths[col]));
            }
            writeln!(out, "{}", rendered.trim_end())?;
        }
        Ok(())
    }
}

impl fmt::Display for DivergenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Vec::new();
        self.render(&mut buf).map_err(|_| fmt::Error)?;
        f.write_str(&String::from_utf8_lossy(&buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(source: SourceLabel, last_update: &str, num_objects: i64) -> DivergenceRecord {
        DivergenceRecord {
            source,
            pgid: "1.1a".to_string(),
            last_update: last_update.to_string(),
            last_complete: last_update.to_string(),
            last_user_version: 10,
            num_objects,
            stats_version: last_update.to_string(),
        }
    }

    #[test]
    fn test_flag_against_left_neighbour() {
        assert_eq!(flag_divergence(&["A", "A", "B"]), vec![false, false, true]);
        assert_eq!(flag_divergence(&["A", "B", "A"]), vec![false, true, true]);
        assert_eq!(flag_divergence::<&str>(&[]), Vec::<bool>::new());
        assert_eq!(flag_divergence(&["A"]), vec![false]);
    }

    #[test]
    fn test_columns_follow_caller_order_and_skip_missing() {
        let cluster = record(SourceLabel::Cluster, "5'10", 3);
        let mut osds = HashMap::new();
        osds.insert(4, record(SourceLabel::Osd(4), "5'10", 3));
        osds.insert(2, record(SourceLabel::Osd(2), "5'9", 3));

        let report = DivergenceReport::build(&cluster, &osds, &[4, 9, 2]);

        assert_eq!(report.columns, vec![SourceLabel::Cluster, SourceLabel::Osd(4), SourceLabel::Osd(2)]);
        assert_eq!(report.rows.len(), FIELDS.len());
        let last_update = &report.rows[0];
        assert_eq!(last_update.field, "last_update");
        assert_eq!(
            last_update.cells.iter().map(|c| c.diverges).collect::<Vec<_>>(),
            vec![false, false, true]
        );
        assert_eq!(report.divergent_fields(), vec!["last_update", "last_complete", "stats.version"]);
    }

    #[test]
    fn test_identical_sources_have_no_divergence() {
        let cluster = record(SourceLabel::Cluster, "5'10", 3);
        let osds = HashMap::from([(1, record(SourceLabel::Osd(1), "5'10", 3))]);
        let report = DivergenceReport::build(&cluster, &osds, &[1]);
        assert!(!report.has_divergence());
    }

    #[test]
    fn test_render_marks_flagged_cells() {
        let cluster = record(SourceLabel::Cluster, "5'10", 3);
        let osds = HashMap::from([
            (1, record(SourceLabel::Osd(1), "5'10", 2)),
            (2, record(SourceLabel::Osd(2), "5'10", 3)),
        ]);
        let report = DivergenceReport::build(&cluster, &osds, &[1, 2]);
        let rendered = report.to_string();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "Field             cluster osd1 osd2");
        assert_eq!(lines[1], "last_update       5'10    5'10 5'10");
        assert_eq!(lines[4], "num_objects       3       *2   *3");
        assert_eq!(lines.len(), 6);
    }

    #[test]
    fn test_repeated_osd_gets_one_column() {
        let cluster = record(SourceLabel::Cluster, "5'10", 3);
        let osds = HashMap::from([(2, record(SourceLabel::Osd(2), "5'10", 3))]);
        let report = DivergenceReport::build(&cluster, &osds, &[2, 2]);
        assert_eq!(report.columns, vec![SourceLabel::Cluster, SourceLabel::Osd(2)]);
    }

    #[test]
    fn test_render_aligns_non_ascii_values() {
        let mut cluster = record(SourceLabel::Cluster, "5'10", 3);
        cluster.stats_version = "é'ü".to_string();
        let osds = HashMap::from([(1, record(SourceLabel::Osd(1), "5'10", 3))]);
        let rendered = DivergenceReport::build(&cluster, &osds, &[1]).to_string();
        let lines: Vec<&str> = rendered.lines().collect();

        assert_eq!(lines[0], "Field             cluster osd1");
        assert_eq!(lines[5], "stats.version     é'ü     *5'10");
    }
}
