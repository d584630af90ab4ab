//! Join of parsed files, mappings, classifications and the cluster table
//! into one normalized record stream.

use crate::lookup::ClusterLookup;
use crate::types::{
    CanonicalField, ColumnMapping, ConsolidatedRecord, FileClassification, RawFile, Row, UNKNOWN,
};
use crate::util::is_blank_row;
use tracing::{debug, info, trace, warn};

/// Value of `field` in `row`, or `Unknown` when unmapped, missing or blank.
pub fn extract(row: &Row, mapping: &ColumnMapping, field: CanonicalField) -> String {
    mapping
        .get(field)
        .and_then(|header| row.get(header))
        .filter(|value| !value.is_blank())
        .map(|value| value.to_string())
        .unwrap_or_else(|| UNKNOWN.to_string())
}

fn build_record(
    file: &RawFile,
    row: &Row,
    mapping: &ColumnMapping,
    classification: FileClassification,
    lookup: &ClusterLookup,
    include_sub_status: bool,
) -> ConsolidatedRecord {
    let area = extract(row, mapping, CanonicalField::Area);
    // Cluster always comes from the reference table, never from a source column.
    let cluster = lookup.query(&area).to_string();
    ConsolidatedRecord {
        file_name: file.name.clone(),
        bank: extract(row, mapping, CanonicalField::Bank),
        area,
        cluster,
        status: extract(row, mapping, CanonicalField::Status),
        field_rider: extract(row, mapping, CanonicalField::FieldRider),
        ch_code: extract(row, mapping, CanonicalField::ChCode),
        date: extract(row, mapping, CanonicalField::Date),
        sub_status: include_sub_status.then(|| extract(row, mapping, CanonicalField::SubStatus)),
        bank_type: classification.bank_type,
        visit_type: classification.visit_type,
        original_row: row.clone(),
    }
}

pub fn consolidate(
    files: &[RawFile],
    mappings: &[ColumnMapping],
    classifications: &[FileClassification],
    lookup: &ClusterLookup,
) -> Vec<ConsolidatedRecord> {
    consolidate_with(files, mappings, classifications, lookup, false)
}

/// Full rebuild: file order, then row order within each file.
pub fn consolidate_with(
    files: &[RawFile],
    mappings: &[ColumnMapping],
    classifications: &[FileClassification],
    lookup: &ClusterLookup,
    include_sub_status: bool,
) -> Vec<ConsolidatedRecord> {
    let empty = ColumnMapping::default();
    let mut records = Vec::with_capacity(files.iter().map(|f| f.rows.len()).sum());
    for (idx, file) in files.iter().enumerate() {
        let mapping = mappings.get(idx).unwrap_or_else(|| {
            warn!(file = %file.name, "no column mapping for file, all fields Unknown");
            &empty
        });
        let classification = classifications.get(idx).copied().unwrap_or_default();
        debug!(file = %file.name, rows = file.rows.len(), "consolidating file");

        for (row_idx, row) in file.rows.iter().enumerate() {
            if is_blank_row(row) {
                trace!(file = %file.name, row = row_idx, "skipping blank row");
                continue;
            }
            records.push(build_record(
                file,
                row,
                mapping,
                classification,
                lookup,
                include_sub_status,
            ));
        }
    }
    info!(
        records = records.len(),
        files = files.len(),
        "consolidated records"
    );
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BankType, Scalar, VisitType};

    fn raw(name: &str, rows: &[&[(&str, Scalar)]]) -> RawFile {
        let mut headers: Vec<String> = Vec::new();
        let rows = rows
            .iter()
            .map(|cells| {
                cells
                    .iter()
                    .map(|(h, v)| {
                        if !headers.iter().any(|x| x == h) {
                            headers.push(h.to_string());
                        }
                        (h.to_string(), v.clone())
                    })
                    .collect::<Row>()
            })
            .collect();
        RawFile { name: name.into(), headers, rows }
    }

    fn text(s: &str) -> Scalar {
        Scalar::Text(s.into())
    }

    fn area_status_mapping() -> ColumnMapping {
        let mut m = ColumnMapping::default();
        m.set(CanonicalField::Area, "AREA");
        m.set(CanonicalField::Status, "STATUS");
        m
    }

    fn lookup() -> ClusterLookup {
        let mut row = Row::new();
        row.insert("FINAL AREA".into(), text("North"));
        row.insert("AREA CLUSTER".into(), text("C1"));
        ClusterLookup::build(&[row])
    }

    #[test]
    fn missing_and_blank_values_default_to_unknown() {
        let row: Row = [
            ("AREA".to_string(), text("  ")),
            ("STATUS".to_string(), Scalar::Null),
        ]
        .into_iter()
        .collect();
        let m = area_status_mapping();
        assert_eq!(extract(&row, &m, CanonicalField::Area), UNKNOWN);
        assert_eq!(extract(&row, &m, CanonicalField::Status), UNKNOWN);
        assert_eq!(extract(&row, &m, CanonicalField::Bank), UNKNOWN);
    }

    #[test]
    fn zero_is_a_value() {
        let row: Row = [("AREA".to_string(), Scalar::Number(0.0))].into_iter().collect();
        assert_eq!(extract(&row, &area_status_mapping(), CanonicalField::Area), "0");
    }

    #[test]
    fn cluster_comes_from_lookup_not_source() {
        let file = raw(
            "a.csv",
            &[&[("AREA", text("north")), ("CLUSTER", text("FromSource"))]],
        );
        let mut m = area_status_mapping();
        m.set(CanonicalField::Cluster, "CLUSTER");
        let records = consolidate(&[file], &[m], &[FileClassification::default()], &lookup());
        assert_eq!(records[0].cluster, "C1");
        assert_eq!(records[0].area, "north");
    }

    #[test]
    fn blank_rows_are_skipped_and_order_is_stable() {
        let a = raw(
            "a.csv",
            &[
                &[("AREA", text("North"))],
                &[("AREA", text(""))],
                &[("AREA", text("South"))],
            ],
        );
        let b = raw("b.csv", &[&[("AREA", text("East"))]]);
        let m = area_status_mapping();
        let records = consolidate(
            &[a, b],
            &[m.clone(), m],
            &[FileClassification::default(); 2],
            &ClusterLookup::default(),
        );
        let areas: Vec<&str> = records.iter().map(|r| r.area.as_str()).collect();
        assert_eq!(areas, vec!["North", "South", "East"]);
        assert!(records.iter().all(|r| r.cluster == UNKNOWN));
    }

    #[test]
    fn classification_is_copied_per_file() {
        let a = raw("a.csv", &[&[("AREA", text("North"))]]);
        let class = FileClassification { bank_type: BankType::Bpi, visit_type: VisitType::Ci };
        let records = consolidate(&[a], &[area_status_mapping()], &[class], &lookup());
        assert_eq!(records[0].bank_type, BankType::Bpi);
        assert_eq!(records[0].visit_type, VisitType::Ci);
        assert_eq!(records[0].sub_status, None);
    }

    #[test]
    fn missing_mapping_and_classification_use_defaults() {
        let a = raw("a.csv", &[&[("AREA", text("North"))]]);
        let records = consolidate(&[a], &[], &[], &lookup());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].area, UNKNOWN);
        assert_eq!(records[0].bank_type, BankType::Shared);
    }

    #[test]
    fn sub_status_extension() {
        let a = raw("a.csv", &[&[("PROGRESS", text("Promise to pay"))]]);
        let mut m = ColumnMapping::default();
        m.set(CanonicalField::SubStatus, "PROGRESS");
        let records = consolidate_with(&[a], &[m], &[FileClassification::default()], &lookup(), true);
        assert_eq!(records[0].sub_status.as_deref(), Some("Promise to pay"));
    }
}
