use crate::error::Result;
use crate::types::{RawFile, Row};
use crate::util::{is_blank_row, parse_scalar};
use csv::ReaderBuilder;
use std::path::Path;
use tracing::{debug, info, warn};

/// Candidate separators, in preference order.
pub const DELIMITERS: [u8; 4] = [b',', b'\t', b'|', b';'];

/// Records inspected when guessing the separator.
const SNIFF_RECORDS: usize = 10;

/// A parsed file together with the non-fatal problems found while parsing it.
#[derive(Debug, Clone)]
pub struct ParsedFile {
    pub file: RawFile,
    pub delimiter: u8,
    pub warnings: Vec<String>,
    pub blank_rows: usize,
}

#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    /// Files that produced at least one row, in input order.
    pub files: Vec<RawFile>,
    /// Files that could not be read or parsed, with the reason.
    pub failures: Vec<(String, String)>,
    /// Files that parsed but had no usable rows.
    pub empty_files: Vec<String>,
    pub warnings: usize,
    pub blank_rows: usize,
}

impl LoadReport {
    pub fn total_rows(&self) -> usize {
        self.files.iter().map(|f| f.rows.len()).sum()
    }
}

fn clean_header(raw: &str) -> String {
    raw.trim_start_matches('\u{feff}').trim().to_string()
}

/// Guess the separator from the first few records.
///
/// The winner has the most consistent field count across records and more
/// than one field on average; ties go to the candidate yielding more fields.
pub fn detect_delimiter(text: &str) -> u8 {
    let mut best: Option<(u8, usize, f64)> = None;
    for &delimiter in &DELIMITERS {
        let mut rdr = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .delimiter(delimiter)
            .from_reader(text.as_bytes());
        let counts: Vec<usize> = rdr
            .records()
            .take(SNIFF_RECORDS)
            .filter_map(|r| r.ok())
            .map(|r| r.len())
            .collect();
        if counts.is_empty() {
            continue;
        }
        let avg = counts.iter().sum::<usize>() as f64 / counts.len() as f64;
        let delta: usize = counts.windows(2).map(|w| w[0].abs_diff(w[1])).sum();
        if avg <= 1.99 {
            continue;
        }
        let better = match best {
            None => true,
            Some((_, best_delta, best_avg)) => {
                delta < best_delta || (delta == best_delta && avg > best_avg)
            }
        };
        if better {
            best = Some((delimiter, delta, avg));
        }
    }
    best.map(|(d, _, _)| d).unwrap_or(b',')
}

/// Parse delimited text into a [`RawFile`].
///
/// Header names are trimmed; when trimming makes two headers collide, the
/// later column wins in every row. Rows whose values are all blank are dropped.
pub fn parse_text(name: &str, text: &str) -> Result<ParsedFile> {
    let delimiter = detect_delimiter(text);
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .delimiter(delimiter)
        .from_reader(text.as_bytes());

    let mut records = rdr.records();
    let header_record = match records.next() {
        Some(r) => r?,
        None => {
            return Ok(ParsedFile {
                file: RawFile { name: name.to_string(), headers: Vec::new(), rows: Vec::new() },
                delimiter,
                warnings: Vec::new(),
                blank_rows: 0,
            })
        }
    };

    let columns: Vec<String> = header_record.iter().map(clean_header).collect();
    let mut headers: Vec<String> = Vec::with_capacity(columns.len());
    for col in &columns {
        if !headers.contains(col) {
            headers.push(col.clone());
        }
    }

    let mut rows: Vec<Row> = Vec::new();
    let mut warnings: Vec<String> = Vec::new();
    let mut blank_rows = 0usize;
    for (idx, result) in records.enumerate() {
        // +2: one for the header, one for 1-based line numbers.
        let line = idx + 2;
        let record = match result {
            Ok(r) => r,
            Err(e) => {
                warnings.push(format!("record {}: {}", line, e));
                continue;
            }
        };
        if record.len() < columns.len() {
            warnings.push(format!(
                "record {}: too few fields (expected {}, found {})",
                line,
                columns.len(),
                record.len()
            ));
        } else if record.len() > columns.len() {
            warnings.push(format!(
                "record {}: too many fields (expected {}, found {})",
                line,
                columns.len(),
                record.len()
            ));
        }

        let mut row = Row::with_capacity(headers.len());
        for (col, value) in columns.iter().zip(record.iter()) {
            row.insert(col.clone(), parse_scalar(value));
        }
        if is_blank_row(&row) {
            blank_rows += 1;
            continue;
        }
        rows.push(row);
    }

    let separator = (delimiter as char).escape_default().to_string();
    debug!(
        file = name,
        delimiter = %separator,
        rows = rows.len(),
        blank_rows,
        "parsed file"
    );
    Ok(ParsedFile {
        file: RawFile { name: name.to_string(), headers, rows },
        delimiter,
        warnings,
        blank_rows,
    })
}

pub fn load_file(path: &Path) -> Result<ParsedFile> {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let text = std::fs::read_to_string(path)?;
    parse_text(&name, &text)
}

/// Load every path in order. Failures and empty files are recorded, not returned.
pub fn load_batch<P: AsRef<Path>>(paths: &[P]) -> LoadReport {
    let mut report = LoadReport::default();
    for path in paths {
        let path = path.as_ref();
        match load_file(path) {
            Ok(parsed) => {
                if !parsed.warnings.is_empty() {
                    warn!(
                        file = %parsed.file.name,
                        count = parsed.warnings.len(),
                        "parsing warnings: {:?}",
                        parsed.warnings
                    );
                }
                report.warnings += parsed.warnings.len();
                report.blank_rows += parsed.blank_rows;
                if parsed.file.rows.is_empty() {
                    info!(file = %parsed.file.name, "no usable rows, file excluded");
                    report.empty_files.push(parsed.file.name);
                } else {
                    report.files.push(parsed.file);
                }
            }
            Err(e) => {
                warn!(file = %path.display(), error = %e, "error processing file");
                report.failures.push((path.display().to_string(), e.to_string()));
            }
        }
    }
    report
}
