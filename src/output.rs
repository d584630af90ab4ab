//! CSV/JSON exporters and console previews.
//!
//! Every file is serialized in memory first, then written to a sibling
//! `.tmp` path and renamed into place, so a failed export leaves nothing
//! behind under the target name.

use crate::error::{ReportError, Result};
use crate::reports::{self, ReportSet};
use crate::types::{Counts, Dimension, SummaryStats};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use tabled::{settings::Style, Table, Tabled};
use tracing::{debug, info, warn};

pub const COMPLETE_EXPORT: &str = "Complete_Data_Export.csv";
pub const COMPLETE_EXPORT_LESS_CANCEL: &str = "Complete_Data_Export_Less_Cancel.csv";
pub const WORKLIST_EXPORT: &str = "Worklist_Summary.csv";
pub const RESULT_EXPORT: &str = "Result_Summary.csv";
pub const FIELD_RIDER_EXPORT: &str = "Field_Rider_Summary.csv";
pub const SUMMARY_JSON: &str = "summary.json";

pub fn complete_export_name(exclude_cancel: bool) -> &'static str {
    if exclude_cancel {
        COMPLETE_EXPORT_LESS_CANCEL
    } else {
        COMPLETE_EXPORT
    }
}

/// `By_Bank_Type_Summary.csv` and friends.
pub fn dimension_export_name(dimension: Dimension) -> String {
    format!("By_{}_Summary.csv", dimension.label().replace(' ', "_"))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    let tmp = temp_path(path);
    let written = File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp);
        return Err(e.into());
    }
    debug!(path = %path.display(), bytes = bytes.len(), "wrote file");
    Ok(())
}

fn finish_csv(wtr: csv::Writer<Vec<u8>>) -> Result<Vec<u8>> {
    wtr.into_inner()
        .map_err(|e| ReportError::Io(e.into_error()))
}

pub fn csv_bytes<T: Serialize>(rows: &[T]) -> Result<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    for r in rows {
        wtr.serialize(r)?;
    }
    finish_csv(wtr)
}

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    write_atomic(path, &csv_bytes(rows)?)
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    write_atomic(path, s.as_bytes())
}

/// One dimension's counts with the dimension label as the key column header.
pub fn write_dimension_csv(path: &Path, dimension: Dimension, counts: &Counts) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record([dimension.label(), "Count", "Percentage"])?;
    for row in reports::count_rows(counts) {
        wtr.write_record([row.key, row.count.to_string(), row.percentage])?;
    }
    write_atomic(path, &finish_csv(wtr)?)
}

#[derive(Debug, Serialize)]
pub struct SummaryDocument<'a> {
    pub generated_at: DateTime<Local>,
    pub exclude_cancel: bool,
    #[serde(flatten)]
    pub stats: &'a SummaryStats,
}

pub fn write_summary_json(path: &Path, stats: &SummaryStats, exclude_cancel: bool) -> Result<()> {
    let doc = SummaryDocument {
        generated_at: Local::now(),
        exclude_cancel,
        stats,
    };
    write_json(path, &doc)
}

/// Outcome of [`export_all`]. A failed file does not stop the others.
#[derive(Debug, Default)]
pub struct ExportReport {
    pub written: Vec<PathBuf>,
    pub failures: Vec<(PathBuf, ReportError)>,
}

impl ExportReport {
    fn record(&mut self, path: PathBuf, result: Result<()>) {
        match result {
            Ok(()) => self.written.push(path),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "export failed");
                self.failures.push((path, e));
            }
        }
    }

    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Write every CSV report plus `summary.json` into `dir`.
pub fn export_all(dir: &Path, reports: &ReportSet<'_>) -> ExportReport {
    let mut out = ExportReport::default();

    let path = dir.join(complete_export_name(reports.exclude_cancel));
    out.record(path.clone(), write_csv(&path, &reports::record_rows(&reports.records)));

    let path = dir.join(WORKLIST_EXPORT);
    out.record(path.clone(), write_csv(&path, &reports::worklist_rows(&reports.worklist)));

    let path = dir.join(RESULT_EXPORT);
    out.record(path.clone(), write_csv(&path, &reports::result_rows(&reports.result)));

    let path = dir.join(FIELD_RIDER_EXPORT);
    let riders = reports.field_riders.visible(None);
    out.record(path.clone(), write_csv(&path, &reports::field_rider_rows(&riders.rows)));

    for dimension in Dimension::ALL {
        let path = dir.join(dimension_export_name(dimension));
        let result = write_dimension_csv(&path, dimension, reports.stats.counts(dimension));
        out.record(path, result);
    }

    let path = dir.join(SUMMARY_JSON);
    out.record(
        path.clone(),
        write_summary_json(&path, reports.stats, reports.exclude_cancel),
    );

    info!(
        written = out.written.len(),
        failed = out.failures.len(),
        dir = %dir.display(),
        "exported reports"
    );
    out
}

pub fn preview_table<T>(title: &str, note: Option<&str>, rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    println!("\n{}", title);
    if let Some(n) = note {
        println!("({})", n);
    }
    println!();
    preview_table_rows(rows, max_rows);
}

pub fn preview_table_rows<T>(rows: &[T], max_rows: usize)
where
    T: Tabled + Clone,
{
    let slice: Vec<T> = rows.iter().take(max_rows).cloned().collect();
    if slice.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(slice).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}
