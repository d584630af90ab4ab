//! Error types for loading, consolidation and export.
//!
//! Nothing here is fatal to the process: callers turn each error into a
//! user-visible notice and keep (or reset) session state as documented on
//! [`crate::session::Session`].

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("spreadsheet error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("config error: {0}")]
    Config(#[from] toml::de::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("svg error: {0}")]
    Svg(#[from] resvg::usvg::Error),

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("render error: {0}")]
    Render(String),

    #[error("no valid data found in the uploaded files")]
    EmptyBatch,

    #[error("no data loaded")]
    NoData,

    #[error("no column mappings set; map at least one column before consolidating")]
    NoMappings,

    #[error("file index {index} out of range ({count} files loaded)")]
    FileIndexOutOfRange { index: usize, count: usize },

    #[error("column '{column}' not found in file '{file}'")]
    ColumnNotFound { file: String, column: String },

    #[error("cluster file {} must have FINAL AREA and AREA CLUSTER columns", .0.display())]
    MissingClusterColumns(PathBuf),

    #[error("unsupported file type: {}", .0.display())]
    UnsupportedFileType(PathBuf),

    #[error("invalid setting: {0}")]
    InvalidSetting(String),

    #[error("logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, ReportError>;
