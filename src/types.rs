use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use tabled::Tabled;

/// Literal used for every canonical value that has no usable source data.
pub const UNKNOWN: &str = "Unknown";

/// A single parsed cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Null,
}

impl Scalar {
    /// True for null and for text that is empty after trimming.
    pub fn is_blank(&self) -> bool {
        match self {
            Scalar::Null => true,
            Scalar::Text(s) => s.trim().is_empty(),
            Scalar::Number(_) => false,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Text(s) => f.write_str(s),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Null => Ok(()),
        }
    }
}

pub type Row = HashMap<String, Scalar>;

/// One parsed input file. Headers keep first-seen order and are unique.
#[derive(Debug, Clone)]
pub struct RawFile {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<Row>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CanonicalField {
    Bank,
    Area,
    Cluster,
    Status,
    FieldRider,
    ChCode,
    Date,
    SubStatus,
}

impl CanonicalField {
    pub const CORE: [CanonicalField; 7] = [
        CanonicalField::Bank,
        CanonicalField::Area,
        CanonicalField::Cluster,
        CanonicalField::Status,
        CanonicalField::FieldRider,
        CanonicalField::ChCode,
        CanonicalField::Date,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::Bank => "bank",
            CanonicalField::Area => "area",
            CanonicalField::Cluster => "cluster",
            CanonicalField::Status => "status",
            CanonicalField::FieldRider => "fieldRider",
            CanonicalField::ChCode => "chCode",
            CanonicalField::Date => "date",
            CanonicalField::SubStatus => "subStatus",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CanonicalField::Bank => "Bank",
            CanonicalField::Area => "Area",
            CanonicalField::Cluster => "Cluster",
            CanonicalField::Status => "Status",
            CanonicalField::FieldRider => "Field Rider",
            CanonicalField::ChCode => "CH Code",
            CanonicalField::Date => "Date",
            CanonicalField::SubStatus => "Sub Status",
        }
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CanonicalField {
    type Err = String;

    /// Accepts `fieldRider`, `field_rider`, `field-rider` or `FIELD RIDER`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let squashed: String = s
            .chars()
            .filter(|c| !matches!(c, '_' | '-' | ' '))
            .collect::<String>()
            .to_lowercase();
        match squashed.as_str() {
            "bank" => Ok(CanonicalField::Bank),
            "area" => Ok(CanonicalField::Area),
            "cluster" => Ok(CanonicalField::Cluster),
            "status" => Ok(CanonicalField::Status),
            "fieldrider" => Ok(CanonicalField::FieldRider),
            "chcode" => Ok(CanonicalField::ChCode),
            "date" => Ok(CanonicalField::Date),
            "substatus" => Ok(CanonicalField::SubStatus),
            _ => Err(format!("unknown canonical field: {}", s)),
        }
    }
}

/// Canonical field to source header, one per file. Absent means unmapped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ColumnMapping {
    entries: BTreeMap<CanonicalField, String>,
}

impl ColumnMapping {
    pub fn get(&self, field: CanonicalField) -> Option<&str> {
        self.entries.get(&field).map(String::as_str)
    }

    pub fn set(&mut self, field: CanonicalField, header: impl Into<String>) {
        self.entries.insert(field, header.into());
    }

    pub fn clear(&mut self, field: CanonicalField) {
        self.entries.remove(&field);
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BankType {
    #[serde(rename = "BPI")]
    Bpi,
    #[serde(rename = "BDO")]
    Bdo,
    #[default]
    #[serde(rename = "SHARED")]
    Shared,
}

impl BankType {
    pub fn as_str(&self) -> &'static str {
        match self {
            BankType::Bpi => "BPI",
            BankType::Bdo => "BDO",
            BankType::Shared => "SHARED",
        }
    }
}

impl FromStr for BankType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BPI" => Ok(BankType::Bpi),
            "BDO" => Ok(BankType::Bdo),
            "SHARED" => Ok(BankType::Shared),
            other => Err(format!("unknown bank type: {} (expected BPI, BDO or SHARED)", other)),
        }
    }
}

impl fmt::Display for BankType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VisitType {
    #[serde(rename = "CI")]
    Ci,
    #[default]
    #[serde(rename = "SHARED")]
    Shared,
}

impl VisitType {
    pub fn as_str(&self) -> &'static str {
        match self {
            VisitType::Ci => "CI",
            VisitType::Shared => "SHARED",
        }
    }
}

impl FromStr for VisitType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "CI" => Ok(VisitType::Ci),
            "SHARED" => Ok(VisitType::Shared),
            other => Err(format!("unknown visit type: {} (expected CI or SHARED)", other)),
        }
    }
}

impl fmt::Display for VisitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct FileClassification {
    pub bank_type: BankType,
    pub visit_type: VisitType,
}

/// The unit of analysis: one non-blank source row in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsolidatedRecord {
    pub file_name: String,
    pub bank: String,
    pub area: String,
    pub cluster: String,
    pub status: String,
    pub field_rider: String,
    pub ch_code: String,
    pub date: String,
    /// Only populated when the sub-status extension field is enabled.
    pub sub_status: Option<String>,
    pub bank_type: BankType,
    pub visit_type: VisitType,
    pub original_row: Row,
}

/// Grouping dimensions of the summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Dimension {
    Bank,
    Area,
    Status,
    FieldRider,
    Cluster,
    BankType,
    VisitType,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Bank,
        Dimension::Area,
        Dimension::Status,
        Dimension::FieldRider,
        Dimension::Cluster,
        Dimension::BankType,
        Dimension::VisitType,
    ];

    pub fn key<'a>(&self, record: &'a ConsolidatedRecord) -> &'a str {
        match self {
            Dimension::Bank => &record.bank,
            Dimension::Area => &record.area,
            Dimension::Status => &record.status,
            Dimension::FieldRider => &record.field_rider,
            Dimension::Cluster => &record.cluster,
            Dimension::BankType => record.bank_type.as_str(),
            Dimension::VisitType => record.visit_type.as_str(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Bank => "Bank",
            Dimension::Area => "Area",
            Dimension::Status => "Status",
            Dimension::FieldRider => "Field Rider",
            Dimension::Cluster => "Cluster",
            Dimension::BankType => "Bank Type",
            Dimension::VisitType => "Visit Type",
        }
    }
}

pub type Counts = Vec<(String, usize)>;

/// Grouped counts over the (optionally cancel-filtered) record set.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SummaryStats {
    pub total: usize,
    pub total_all: usize,
    pub by_bank: Counts,
    pub by_area: Counts,
    pub by_status: Counts,
    pub by_field_rider: Counts,
    pub by_cluster: Counts,
    pub by_bank_type: Counts,
    pub by_visit_type: Counts,
}

impl SummaryStats {
    pub fn counts(&self, dimension: Dimension) -> &Counts {
        match dimension {
            Dimension::Bank => &self.by_bank,
            Dimension::Area => &self.by_area,
            Dimension::Status => &self.by_status,
            Dimension::FieldRider => &self.by_field_rider,
            Dimension::Cluster => &self.by_cluster,
            Dimension::BankType => &self.by_bank_type,
            Dimension::VisitType => &self.by_visit_type,
        }
    }

    pub fn counts_mut(&mut self, dimension: Dimension) -> &mut Counts {
        match dimension {
            Dimension::Bank => &mut self.by_bank,
            Dimension::Area => &mut self.by_area,
            Dimension::Status => &mut self.by_status,
            Dimension::FieldRider => &mut self.by_field_rider,
            Dimension::Cluster => &mut self.by_cluster,
            Dimension::BankType => &mut self.by_bank_type,
            Dimension::VisitType => &mut self.by_visit_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorklistEntry {
    pub cluster: String,
    pub bpi_skip: usize,
    pub bdo_skip: usize,
    pub shared: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorklistView {
    pub rows: Vec<WorklistEntry>,
    pub total: WorklistEntry,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultEntry {
    pub cluster: String,
    pub ci_visits: usize,
    pub shared_visits: usize,
    pub total_visits: usize,
    pub unique_skiptracers: usize,
    pub daily_salary_cost: u64,
    pub cost_per_visit: f64,
    pub avg_visits_per_agent: f64,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultView {
    pub rows: Vec<ResultEntry>,
    pub total: ResultEntry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRiderEntry {
    pub field_rider: String,
    pub cluster: String,
    pub area: String,
    pub shared: usize,
    pub ci: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldRiderView {
    pub rows: Vec<FieldRiderEntry>,
}

/// Rows of a [`FieldRiderView`] left visible by a cluster filter, with their totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldRiderSelection<'a> {
    pub rows: Vec<&'a FieldRiderEntry>,
    pub shared: usize,
    pub ci: usize,
    pub total: usize,
}

// Export rows. Numbers are pre-formatted so the CSV and console previews agree.

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct RecordExportRow {
    #[serde(rename = "File Name")]
    #[tabled(rename = "File Name")]
    pub file_name: String,
    #[serde(rename = "Bank")]
    #[tabled(rename = "Bank")]
    pub bank: String,
    #[serde(rename = "Area")]
    #[tabled(rename = "Area")]
    pub area: String,
    #[serde(rename = "Cluster")]
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[serde(rename = "Status")]
    #[tabled(rename = "Status")]
    pub status: String,
    #[serde(rename = "Field Rider")]
    #[tabled(rename = "Field Rider")]
    pub field_rider: String,
    #[serde(rename = "CH Code")]
    #[tabled(rename = "CH Code")]
    pub ch_code: String,
    #[serde(rename = "Date")]
    #[tabled(rename = "Date")]
    pub date: String,
    #[serde(rename = "Bank Type")]
    #[tabled(rename = "Bank Type")]
    pub bank_type: String,
    #[serde(rename = "Visit Type")]
    #[tabled(rename = "Visit Type")]
    pub visit_type: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct WorklistRow {
    #[serde(rename = "Area Cluster")]
    #[tabled(rename = "Area Cluster")]
    pub cluster: String,
    #[serde(rename = "BPI Skip")]
    #[tabled(rename = "BPI Skip")]
    pub bpi_skip: usize,
    #[serde(rename = "BDO Skip")]
    #[tabled(rename = "BDO Skip")]
    pub bdo_skip: usize,
    #[serde(rename = "Shared")]
    #[tabled(rename = "Shared")]
    pub shared: usize,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ResultRow {
    #[serde(rename = "Area Cluster")]
    #[tabled(rename = "Area Cluster")]
    pub cluster: String,
    #[serde(rename = "CI Visits")]
    #[tabled(rename = "CI Visits")]
    pub ci_visits: usize,
    #[serde(rename = "Shared Visits")]
    #[tabled(rename = "Shared Visits")]
    pub shared_visits: usize,
    #[serde(rename = "Total Visits")]
    #[tabled(rename = "Total Visits")]
    pub total_visits: usize,
    #[serde(rename = "Unique Skiptracers")]
    #[tabled(rename = "Unique Skiptracers")]
    pub unique_skiptracers: usize,
    #[serde(rename = "Daily Salary Cost (1K/FS)")]
    #[tabled(rename = "Daily Salary Cost (1K/FS)")]
    pub daily_salary_cost: u64,
    #[serde(rename = "Cost Per Visit")]
    #[tabled(rename = "Cost Per Visit")]
    pub cost_per_visit: String,
    #[serde(rename = "Average Visit per Skiptracer")]
    #[tabled(rename = "Average Visit per Skiptracer")]
    pub avg_visits_per_agent: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct FieldRiderRow {
    #[serde(rename = "Field Rider")]
    #[tabled(rename = "Field Rider")]
    pub field_rider: String,
    #[serde(rename = "Cluster")]
    #[tabled(rename = "Cluster")]
    pub cluster: String,
    #[serde(rename = "Area")]
    #[tabled(rename = "Area")]
    pub area: String,
    #[serde(rename = "Shared")]
    #[tabled(rename = "Shared")]
    pub shared: usize,
    #[serde(rename = "CI")]
    #[tabled(rename = "CI")]
    pub ci: usize,
    #[serde(rename = "Total")]
    #[tabled(rename = "Total")]
    pub total: usize,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct CountRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Count")]
    pub count: usize,
    #[tabled(rename = "Percentage")]
    pub percentage: String,
}
