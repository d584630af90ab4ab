//! Run configuration, read from an optional TOML file.
//!
//! ```toml
//! daily_rate = 1000
//! top_n = 3
//! include_sub_status = true
//!
//! [synonyms]
//! fieldRider = ["ASSIGNED FS", "FIELDMAN", "AGENT"]
//! ```

use crate::error::{ReportError, Result};
use crate::mapping::SynonymTable;
use crate::types::CanonicalField;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

pub const DEFAULT_DAILY_RATE: u64 = 1000;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Daily salary per unique field agent.
    pub daily_rate: u64,
    /// Items per dimension drawn in the summary image.
    pub top_n: usize,
    /// Rows shown in console previews.
    pub preview_rows: usize,
    pub output_dir: PathBuf,
    pub include_sub_status: bool,
    /// Per-field synonym replacements, keyed by canonical field name.
    pub synonyms: BTreeMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daily_rate: DEFAULT_DAILY_RATE,
            top_n: 3,
            preview_rows: 10,
            output_dir: PathBuf::from("."),
            include_sub_status: false,
            synonyms: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.synonym_table()?;
        Ok(config)
    }

    pub fn synonym_table(&self) -> Result<SynonymTable> {
        let mut table = SynonymTable::standard();
        if self.include_sub_status {
            table = table.with_sub_status();
        }
        for (name, synonyms) in &self.synonyms {
            let field: CanonicalField = name.parse().map_err(ReportError::InvalidSetting)?;
            table.set_synonyms(field, synonyms.iter().cloned());
        }
        Ok(table)
    }
}
