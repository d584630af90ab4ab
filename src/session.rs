//! The session owns every input of a run and the state derived from them.
//!
//! Inputs (files, mappings, classifications, cluster table, cancel flag) are
//! changed through the mutators below. Derived state (records and stats) is
//! only replaced by [`Session::recompute`], which callers invoke after each
//! mutation. A failed recompute clears the derived state.

use crate::classify;
use crate::config::Config;
use crate::consolidate;
use crate::error::{ReportError, Result};
use crate::loader::{self, LoadReport};
use crate::lookup::{self, ClusterLookup};
use crate::mapping::{self, SynonymTable};
use crate::reports::{self, ReportSet};
use crate::types::{
    BankType, CanonicalField, ColumnMapping, ConsolidatedRecord, Counts, Dimension,
    FileClassification, RawFile, SummaryStats, VisitType,
};
use std::path::Path;
use tracing::{debug, info, warn};

/// What changed since the last recompute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeTrigger {
    Files,
    Mapping,
    Classification,
    Clusters,
    /// Only the cancel filter changed; existing records are re-summarized.
    CancelFilter,
}

#[derive(Debug, Clone)]
pub struct Session {
    config: Config,
    synonyms: SynonymTable,
    files: Vec<RawFile>,
    mappings: Vec<ColumnMapping>,
    classifications: Vec<FileClassification>,
    lookup: ClusterLookup,
    exclude_cancel: bool,
    records: Vec<ConsolidatedRecord>,
    stats: Option<SummaryStats>,
}

impl Session {
    pub fn new(config: Config) -> Result<Self> {
        let synonyms = config.synonym_table()?;
        Ok(Session {
            config,
            synonyms,
            files: Vec::new(),
            mappings: Vec::new(),
            classifications: Vec::new(),
            lookup: ClusterLookup::default(),
            exclude_cancel: false,
            records: Vec::new(),
            stats: None,
        })
    }

    /// Parse and commit a new batch.
    ///
    /// Unreadable and empty files are reported but do not stop the batch. If no
    /// file has usable rows the previous batch stays in place.
    pub fn load_files<P: AsRef<Path>>(&mut self, paths: &[P]) -> Result<LoadReport> {
        let report = loader::load_batch(paths);
        self.commit_files(report.files.clone())?;
        Ok(report)
    }

    /// Replace the batch with already parsed files.
    pub fn commit_files(&mut self, files: Vec<RawFile>) -> Result<()> {
        let files: Vec<RawFile> = files.into_iter().filter(|f| !f.rows.is_empty()).collect();
        if files.is_empty() {
            warn!("no valid data found in the uploaded files");
            return Err(ReportError::EmptyBatch);
        }
        self.mappings = files
            .iter()
            .map(|f| mapping::auto_map(&f.headers, &self.synonyms))
            .collect();
        self.classifications = vec![FileClassification::default(); files.len()];
        info!(
            files = files.len(),
            rows = files.iter().map(|f| f.rows.len()).sum::<usize>(),
            "committed batch"
        );
        self.files = files;
        self.reset_derived();
        Ok(())
    }

    /// Load a reference file and swap it in. On error the current table is kept.
    pub fn load_cluster_file(&mut self, path: &Path) -> Result<usize> {
        let table = lookup::load_cluster_file(path)?;
        let entries = table.len();
        self.lookup = table;
        Ok(entries)
    }

    /// Fresh auto mapping and filename classification for every file.
    pub fn use_auto_mapping(&mut self) {
        for (idx, file) in self.files.iter().enumerate() {
            self.mappings[idx] = mapping::auto_map(&file.headers, &self.synonyms);
        }
        self.auto_detect_classifications();
    }

    pub fn auto_detect_classifications(&mut self) {
        self.classifications = self
            .files
            .iter()
            .map(|f| classify::auto_detect(&f.name))
            .collect();
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.files.len() {
            return Err(ReportError::FileIndexOutOfRange {
                index,
                count: self.files.len(),
            });
        }
        Ok(())
    }

    pub fn set_mapping(
        &mut self,
        index: usize,
        field: CanonicalField,
        header: Option<&str>,
    ) -> Result<()> {
        self.check_index(index)?;
        mapping::apply_manual(&mut self.mappings[index], &self.files[index], field, header)?;
        debug!(file = %self.files[index].name, %field, ?header, "mapping updated");
        Ok(())
    }

    pub fn set_bank_type(&mut self, index: usize, bank_type: BankType) -> Result<()> {
        self.check_index(index)?;
        self.classifications[index].bank_type = bank_type;
        Ok(())
    }

    pub fn set_visit_type(&mut self, index: usize, visit_type: VisitType) -> Result<()> {
        self.check_index(index)?;
        self.classifications[index].visit_type = visit_type;
        Ok(())
    }

    pub fn set_exclude_cancel(&mut self, exclude: bool) {
        self.exclude_cancel = exclude;
    }

    fn reset_derived(&mut self) {
        self.records.clear();
        self.stats = None;
    }

    /// Rebuild derived state from the current inputs.
    ///
    /// A cancel-filter change re-summarizes the existing records; every other
    /// trigger rebuilds the records first.
    pub fn recompute(&mut self, trigger: RecomputeTrigger) -> Result<()> {
        debug!(?trigger, "recompute");
        if self.files.is_empty() {
            self.reset_derived();
            return Err(ReportError::NoData);
        }
        let summarize_only = trigger == RecomputeTrigger::CancelFilter && self.stats.is_some();
        if !summarize_only {
            if !mapping::has_any_mapping(&self.mappings) {
                self.reset_derived();
                return Err(ReportError::NoMappings);
            }
            self.records = consolidate::consolidate_with(
                &self.files,
                &self.mappings,
                &self.classifications,
                &self.lookup,
                self.config.include_sub_status,
            );
        }
        let stats = reports::summarize(&self.records, self.exclude_cancel);
        info!(
            total = stats.total,
            total_all = stats.total_all,
            exclude_cancel = self.exclude_cancel,
            "summary updated"
        );
        self.stats = Some(stats);
        Ok(())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn files(&self) -> &[RawFile] {
        &self.files
    }

    pub fn mappings(&self) -> &[ColumnMapping] {
        &self.mappings
    }

    pub fn classifications(&self) -> &[FileClassification] {
        &self.classifications
    }

    pub fn cluster_lookup(&self) -> &ClusterLookup {
        &self.lookup
    }

    pub fn exclude_cancel(&self) -> bool {
        self.exclude_cancel
    }

    pub fn records(&self) -> &[ConsolidatedRecord] {
        &self.records
    }

    pub fn stats(&self) -> Option<&SummaryStats> {
        self.stats.as_ref()
    }

    /// All report views over the filtered records, once stats exist.
    pub fn reports(&self) -> Option<ReportSet<'_>> {
        let stats = self.stats.as_ref()?;
        Some(ReportSet::build(
            &self.records,
            stats,
            self.exclude_cancel,
            self.config.daily_rate,
        ))
    }

    pub fn status_breakdown(&self, dimension: Dimension) -> Vec<(String, Counts)> {
        let filtered = reports::filter_records(&self.records, self.exclude_cancel);
        reports::status_breakdown(&filtered, dimension)
    }
}
