//! Heuristic mapping of source headers onto canonical fields.
//!
//! Each canonical field owns an ordered list of synonyms. A header claims a
//! field when its uppercased text contains any uppercased synonym; per field
//! the first such header in file order wins. Claims are not exclusive, so one
//! header may serve several fields (`CH CODE` is both `cluster` and `chCode`).

use crate::error::{ReportError, Result};
use crate::types::{CanonicalField, ColumnMapping, RawFile};
use once_cell::sync::Lazy;

const DEFAULT_RULES: [(CanonicalField, &[&str]); 7] = [
    (
        CanonicalField::Bank,
        &["BANK NAME", "BANK", "bank_txt", "BANK NAME REAL"],
    ),
    (
        CanonicalField::Area,
        &["AREA", "FINAL AREA", "final_area_txt", "AREA CLUSTER"],
    ),
    (CanonicalField::Cluster, &["CLUSTER", "CH CODE", "CH NAME"]),
    (
        CanonicalField::Status,
        &[
            "account_status",
            "STATUS",
            "reported_status",
            "OPEN CI STATUS",
            "RESULT",
            "VISIT STATUS",
        ],
    ),
    (
        CanonicalField::FieldRider,
        &["ASSIGNED FS", "FIELDMAN", "Creator", "FIELD RIDER", "FS NAME"],
    ),
    (CanonicalField::ChCode, &["CH CODE", "REF CODE", "REFERENCE"]),
    (
        CanonicalField::Date,
        &[
            "Creation Date",
            "Result_Date",
            "result_date",
            "VISITED DATE",
            "Modified Date",
            "DATE",
        ],
    ),
];

pub const SUB_STATUS_SYNONYMS: [&str; 3] = ["sub_status", "SUBSTATUS", "PROGRESS"];

static STANDARD_TABLE: Lazy<SynonymTable> = Lazy::new(|| SynonymTable {
    rules: DEFAULT_RULES
        .iter()
        .map(|(field, synonyms)| SynonymRule::new(*field, synonyms.iter().copied()))
        .collect(),
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymRule {
    pub field: CanonicalField,
    pub synonyms: Vec<String>,
    upper: Vec<String>,
}

impl SynonymRule {
    pub fn new<I, S>(field: CanonicalField, synonyms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let synonyms: Vec<String> = synonyms.into_iter().map(Into::into).collect();
        let upper = synonyms.iter().map(|s| s.to_uppercase()).collect();
        SynonymRule { field, synonyms, upper }
    }

    pub fn matches(&self, header: &str) -> bool {
        let header = header.to_uppercase();
        self.upper.iter().any(|s| header.contains(s.as_str()))
    }
}

/// Ordered rule table, evaluated per field independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynonymTable {
    rules: Vec<SynonymRule>,
}

impl Default for SynonymTable {
    fn default() -> Self {
        Self::standard()
    }
}

impl SynonymTable {
    pub fn standard() -> Self {
        STANDARD_TABLE.clone()
    }

    /// Adds the optional `subStatus` field.
    pub fn with_sub_status(mut self) -> Self {
        self.set_synonyms(CanonicalField::SubStatus, SUB_STATUS_SYNONYMS);
        self
    }

    /// Replace the synonyms of `field`, appending the field if it is new.
    pub fn set_synonyms<I, S>(&mut self, field: CanonicalField, synonyms: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let rule = SynonymRule::new(field, synonyms);
        match self.rules.iter_mut().find(|r| r.field == field) {
            Some(existing) => *existing = rule,
            None => self.rules.push(rule),
        }
    }

    pub fn rules(&self) -> &[SynonymRule] {
        &self.rules
    }

    pub fn contains(&self, field: CanonicalField) -> bool {
        self.rules.iter().any(|r| r.field == field)
    }
}

pub fn auto_map(headers: &[String], table: &SynonymTable) -> ColumnMapping {
    let mut mapping = ColumnMapping::default();
    for rule in table.rules() {
        if let Some(header) = headers.iter().find(|h| rule.matches(h)) {
            mapping.set(rule.field, header.clone());
        }
    }
    mapping
}

/// Overwrite one entry of `mapping`. `None` or an empty header clears it.
pub fn apply_manual(
    mapping: &mut ColumnMapping,
    file: &RawFile,
    field: CanonicalField,
    header: Option<&str>,
) -> Result<()> {
    match header.filter(|h| !h.is_empty()) {
        None => mapping.clear(field),
        Some(h) => {
            if !file.headers.iter().any(|existing| existing == h) {
                return Err(ReportError::ColumnNotFound {
                    file: file.name.clone(),
                    column: h.to_string(),
                });
            }
            mapping.set(field, h);
        }
    }
    Ok(())
}

pub fn has_any_mapping(mappings: &[ColumnMapping]) -> bool {
    mappings.iter().any(|m| !m.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn file(list: &[&str]) -> RawFile {
        RawFile { name: "f.csv".into(), headers: headers(list), rows: Vec::new() }
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let mapping = auto_map(&headers(&["REPORTED_STATUS_CODE"]), &SynonymTable::standard());
        assert_eq!(mapping.get(CanonicalField::Status), Some("REPORTED_STATUS_CODE"));

        let mapping = auto_map(&headers(&["Status"]), &SynonymTable::standard());
        assert_eq!(mapping.get(CanonicalField::Status), Some("Status"));
    }

    #[test]
    fn first_header_in_file_order_wins() {
        let mapping = auto_map(
            &headers(&["VISIT STATUS", "account_status"]),
            &SynonymTable::standard(),
        );
        assert_eq!(mapping.get(CanonicalField::Status), Some("VISIT STATUS"));
    }

    #[test]
    fn claims_are_not_exclusive() {
        let mapping = auto_map(&headers(&["CH CODE", "AREA CLUSTER"]), &SynonymTable::standard());
        assert_eq!(mapping.get(CanonicalField::Cluster), Some("CH CODE"));
        assert_eq!(mapping.get(CanonicalField::ChCode), Some("CH CODE"));
        assert_eq!(mapping.get(CanonicalField::Area), Some("AREA CLUSTER"));
    }

    #[test]
    fn unmatched_fields_are_absent() {
        let mapping = auto_map(&headers(&["AREA"]), &SynonymTable::standard());
        assert_eq!(mapping.get(CanonicalField::FieldRider), None);
        assert_eq!(mapping.get(CanonicalField::SubStatus), None);
    }

    #[test]
    fn sub_status_only_with_extension() {
        let hs = headers(&["PROGRESS"]);
        assert_eq!(auto_map(&hs, &SynonymTable::standard()).get(CanonicalField::SubStatus), None);
        let table = SynonymTable::standard().with_sub_status();
        assert_eq!(auto_map(&hs, &table).get(CanonicalField::SubStatus), Some("PROGRESS"));
    }

    #[test]
    fn replaced_synonyms_take_effect() {
        let mut table = SynonymTable::standard();
        table.set_synonyms(CanonicalField::FieldRider, ["AGENT"]);
        let mapping = auto_map(&headers(&["FIELDMAN", "AGENT ID"]), &table);
        assert_eq!(mapping.get(CanonicalField::FieldRider), Some("AGENT ID"));
    }

    #[test]
    fn manual_override_sets_and_clears() {
        let f = file(&["AREA", "Zone"]);
        let mut mapping = auto_map(&f.headers, &SynonymTable::standard());
        apply_manual(&mut mapping, &f, CanonicalField::Area, Some("Zone")).unwrap();
        assert_eq!(mapping.get(CanonicalField::Area), Some("Zone"));
        apply_manual(&mut mapping, &f, CanonicalField::Area, Some("")).unwrap();
        assert_eq!(mapping.get(CanonicalField::Area), None);
        assert!(!has_any_mapping(&[mapping]));
    }

    #[test]
    fn manual_override_rejects_unknown_header() {
        let f = file(&["AREA"]);
        let mut mapping = ColumnMapping::default();
        let err = apply_manual(&mut mapping, &f, CanonicalField::Status, Some("STATUS")).unwrap_err();
        assert!(matches!(err, ReportError::ColumnNotFound { .. }));
        assert!(mapping.is_empty());
    }
}
