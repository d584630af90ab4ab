//! Area → cluster reference table.
//!
//! The table is built from the first sheet of an uploaded spreadsheet (or a
//! delimited file) with `FINAL AREA` and `AREA CLUSTER` columns and an
//! optional `AREA CAPTAIN`. Keys are trimmed and uppercased; a miss always
//! answers [`UNKNOWN`].

use crate::error::{ReportError, Result};
use crate::loader;
use crate::types::{Row, Scalar, UNKNOWN};
use crate::util::{normalize_key, parse_scalar};
use calamine::{open_workbook_auto, Data, Reader};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info};

pub const AREA_COLUMN: &str = "FINAL AREA";
pub const CLUSTER_COLUMN: &str = "AREA CLUSTER";
pub const CAPTAIN_COLUMN: &str = "AREA CAPTAIN";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterInfo {
    pub cluster: String,
    pub captain: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterLookup {
    entries: HashMap<String, ClusterInfo>,
}

impl ClusterLookup {
    /// Register every row with both an area and a cluster; skip the rest.
    pub fn build(rows: &[Row]) -> Self {
        let mut entries = HashMap::new();
        for row in rows {
            let area = row.get(AREA_COLUMN).filter(|v| !v.is_blank());
            let cluster = row.get(CLUSTER_COLUMN).filter(|v| !v.is_blank());
            let (Some(area), Some(cluster)) = (area, cluster) else {
                continue;
            };
            let captain = row
                .get(CAPTAIN_COLUMN)
                .filter(|v| !v.is_blank())
                .map(Scalar::to_string)
                .unwrap_or_else(|| UNKNOWN.to_string());
            entries.insert(
                normalize_key(&area.to_string()),
                ClusterInfo { cluster: cluster.to_string(), captain },
            );
        }
        ClusterLookup { entries }
    }

    pub fn query(&self, area: &str) -> &str {
        self.info(area).map(|i| i.cluster.as_str()).unwrap_or(UNKNOWN)
    }

    pub fn info(&self, area: &str) -> Option<&ClusterInfo> {
        if self.entries.is_empty() {
            return None;
        }
        self.entries.get(&normalize_key(area))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Distinct cluster names held by the table.
    pub fn clusters(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.values().map(|i| i.cluster.as_str()).collect();
        names.sort_unstable();
        names.dedup();
        names
    }
}

fn cell_to_scalar(cell: &Data) -> Scalar {
    match cell {
        Data::Empty | Data::Error(_) => Scalar::Null,
        Data::Int(i) => Scalar::Number(*i as f64),
        Data::Float(f) => Scalar::Number(*f),
        Data::String(s) => parse_scalar(s),
        other => Scalar::Text(other.to_string()),
    }
}

/// Read the first sheet of a workbook as its header names and header-keyed rows.
fn read_workbook_rows(path: &Path) -> Result<(Vec<String>, Vec<Row>)> {
    let mut workbook = open_workbook_auto(path)?;
    let Some(sheet) = workbook.sheet_names().first().cloned() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let range = workbook.worksheet_range(&sheet)?;
    let mut iter = range.rows();
    let Some(header_cells) = iter.next() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let headers: Vec<String> = header_cells
        .iter()
        .map(|c| c.to_string().trim().to_string())
        .collect();
    debug!(sheet = %sheet, ?headers, "reading cluster sheet");
    let rows = iter
        .map(|cells| {
            headers
                .iter()
                .zip(cells.iter())
                .map(|(h, c)| (h.clone(), cell_to_scalar(c)))
                .collect::<Row>()
        })
        .collect();
    Ok((headers, rows))
}

fn has_required_columns(headers: &[String]) -> bool {
    headers.iter().any(|h| h == AREA_COLUMN) && headers.iter().any(|h| h == CLUSTER_COLUMN)
}

/// Build a fresh table from a reference file. The caller swaps it in only on success.
pub fn load_cluster_file(path: &Path) -> Result<ClusterLookup> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();

    let (headers, rows) = match extension.as_str() {
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => read_workbook_rows(path)?,
        "csv" | "txt" | "tsv" => {
            let parsed = loader::load_file(path)?;
            (parsed.file.headers, parsed.file.rows)
        }
        _ => return Err(ReportError::UnsupportedFileType(path.to_path_buf())),
    };

    if !rows.is_empty() && !has_required_columns(&headers) {
        return Err(ReportError::MissingClusterColumns(path.to_path_buf()));
    }
    let lookup = ClusterLookup::build(&rows);
    info!(
        file = %path.display(),
        entries = lookup.len(),
        "loaded area-cluster mappings"
    );
    Ok(lookup)
}
