use crate::types::{
    BankType, ConsolidatedRecord, CountRow, Counts, Dimension, FieldRiderEntry, FieldRiderRow,
    FieldRiderSelection, FieldRiderView, RecordExportRow, ResultEntry, ResultRow, ResultView,
    SummaryStats, VisitType, WorklistEntry, WorklistRow, WorklistView,
};
use crate::util::percentage;
use std::collections::{BTreeMap, HashMap, HashSet};

pub const TOTAL_LABEL: &str = "TOTAL";

pub fn is_cancelled(record: &ConsolidatedRecord) -> bool {
    record.status.to_lowercase().contains("cancel")
}

/// Records that survive the cancel filter, in their original order.
pub fn filter_records(records: &[ConsolidatedRecord], exclude_cancel: bool) -> Vec<&ConsolidatedRecord> {
    records
        .iter()
        .filter(|r| !(exclude_cancel && is_cancelled(r)))
        .collect()
}

/// Count by key, then sort by count descending. The sort is stable, so ties
/// keep first-seen order.
fn count_by<'a, F>(records: &[&'a ConsolidatedRecord], key: F) -> Counts
where
    F: Fn(&'a ConsolidatedRecord) -> &'a str,
{
    let mut index: HashMap<&'a str, usize> = HashMap::new();
    let mut counts: Counts = Vec::new();
    for &record in records {
        let k = key(record);
        match index.get(k) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(k, counts.len());
                counts.push((k.to_string(), 1));
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

pub fn summarize(records: &[ConsolidatedRecord], exclude_cancel: bool) -> SummaryStats {
    let filtered = filter_records(records, exclude_cancel);
    let mut stats = SummaryStats {
        total: filtered.len(),
        total_all: records.len(),
        ..SummaryStats::default()
    };
    for dimension in Dimension::ALL {
        *stats.counts_mut(dimension) = count_by(&filtered, |r| dimension.key(r));
    }
    stats
}

/// Per key of `dimension`, the status counts of the records under that key.
///
/// Keys follow the dimension's own count-descending order.
pub fn status_breakdown(records: &[&ConsolidatedRecord], dimension: Dimension) -> Vec<(String, Counts)> {
    let mut groups: HashMap<&str, Vec<&ConsolidatedRecord>> = HashMap::new();
    for &record in records {
        groups.entry(dimension.key(record)).or_default().push(record);
    }
    count_by(records, |r| dimension.key(r))
        .into_iter()
        .map(|(key, _)| {
            let members = groups.get(key.as_str()).map(Vec::as_slice).unwrap_or(&[]);
            let statuses = count_by(members, |r| r.status.as_str());
            (key, statuses)
        })
        .collect()
}

pub fn worklist_view(records: &[&ConsolidatedRecord]) -> WorklistView {
    let mut map: BTreeMap<&str, WorklistEntry> = BTreeMap::new();
    for r in records {
        let e = map.entry(r.cluster.as_str()).or_insert_with(|| WorklistEntry {
            cluster: r.cluster.clone(),
            ..WorklistEntry::default()
        });
        match r.bank_type {
            BankType::Bpi => e.bpi_skip += 1,
            BankType::Bdo => e.bdo_skip += 1,
            BankType::Shared => e.shared += 1,
        }
        e.total += 1;
    }
    let rows: Vec<WorklistEntry> = map.into_values().collect();
    let mut total = WorklistEntry {
        cluster: TOTAL_LABEL.to_string(),
        ..WorklistEntry::default()
    };
    for row in &rows {
        total.bpi_skip += row.bpi_skip;
        total.bdo_skip += row.bdo_skip;
        total.shared += row.shared;
        total.total += row.total;
    }
    WorklistView { rows, total }
}

fn result_entry(
    cluster: String,
    ci_visits: usize,
    shared_visits: usize,
    unique_skiptracers: usize,
    daily_rate: u64,
) -> ResultEntry {
    let total_visits = ci_visits + shared_visits;
    let daily_salary_cost = (unique_skiptracers as u64).saturating_mul(daily_rate);
    let cost_per_visit = if total_visits > 0 {
        daily_salary_cost as f64 / total_visits as f64
    } else {
        0.0
    };
    let avg_visits_per_agent = if unique_skiptracers > 0 {
        total_visits as f64 / unique_skiptracers as f64
    } else {
        0.0
    };
    ResultEntry {
        cluster,
        ci_visits,
        shared_visits,
        total_visits,
        unique_skiptracers,
        daily_salary_cost,
        cost_per_visit,
        avg_visits_per_agent,
    }
}

pub fn result_view(records: &[&ConsolidatedRecord], daily_rate: u64) -> ResultView {
    #[derive(Default)]
    struct Acc<'a> {
        ci: usize,
        shared: usize,
        riders: HashSet<&'a str>,
    }
    let mut map: BTreeMap<&str, Acc> = BTreeMap::new();
    let mut all_riders: HashSet<&str> = HashSet::new();
    let (mut ci_total, mut shared_total) = (0usize, 0usize);
    for r in records {
        let e = map.entry(r.cluster.as_str()).or_default();
        if r.visit_type == VisitType::Ci {
            e.ci += 1;
            ci_total += 1;
        } else {
            e.shared += 1;
            shared_total += 1;
        }
        e.riders.insert(r.field_rider.as_str());
        all_riders.insert(r.field_rider.as_str());
    }
    let rows = map
        .into_iter()
        .map(|(cluster, acc)| {
            result_entry(cluster.to_string(), acc.ci, acc.shared, acc.riders.len(), daily_rate)
        })
        .collect();
    // Distinct agents across all clusters, not a sum of per-cluster counts.
    let total = result_entry(
        TOTAL_LABEL.to_string(),
        ci_total,
        shared_total,
        all_riders.len(),
        daily_rate,
    );
    ResultView { rows, total }
}

pub fn field_rider_view(records: &[&ConsolidatedRecord]) -> FieldRiderView {
    let mut map: BTreeMap<(&str, &str, &str), (usize, usize)> = BTreeMap::new();
    for r in records {
        let e = map
            .entry((r.field_rider.as_str(), r.cluster.as_str(), r.area.as_str()))
            .or_default();
        if r.visit_type == VisitType::Ci {
            e.1 += 1;
        } else {
            e.0 += 1;
        }
    }
    let rows = map
        .into_iter()
        .map(|((field_rider, cluster, area), (shared, ci))| FieldRiderEntry {
            field_rider: field_rider.to_string(),
            cluster: cluster.to_string(),
            area: area.to_string(),
            shared,
            ci,
            total: shared + ci,
        })
        .collect();
    FieldRiderView { rows }
}

impl FieldRiderView {
    /// Distinct clusters, sorted, for a filter picker.
    pub fn clusters(&self) -> Vec<&str> {
        let mut clusters: Vec<&str> = self.rows.iter().map(|r| r.cluster.as_str()).collect();
        clusters.sort_unstable();
        clusters.dedup();
        clusters
    }

    /// Rows matching `cluster` (all rows for `None`) and their totals.
    pub fn visible(&self, cluster: Option<&str>) -> FieldRiderSelection<'_> {
        let rows: Vec<&FieldRiderEntry> = self
            .rows
            .iter()
            .filter(|r| cluster.map_or(true, |c| r.cluster == c))
            .collect();
        FieldRiderSelection {
            shared: rows.iter().map(|r| r.shared).sum(),
            ci: rows.iter().map(|r| r.ci).sum(),
            total: rows.iter().map(|r| r.total).sum(),
            rows,
        }
    }
}

/// Every view derived from one filtered record set.
#[derive(Debug, Clone)]
pub struct ReportSet<'a> {
    pub records: Vec<&'a ConsolidatedRecord>,
    pub stats: &'a SummaryStats,
    pub worklist: WorklistView,
    pub result: ResultView,
    pub field_riders: FieldRiderView,
    pub exclude_cancel: bool,
}

impl<'a> ReportSet<'a> {
    pub fn build(
        records: &'a [ConsolidatedRecord],
        stats: &'a SummaryStats,
        exclude_cancel: bool,
        daily_rate: u64,
    ) -> Self {
        let records = filter_records(records, exclude_cancel);
        ReportSet {
            worklist: worklist_view(&records),
            result: result_view(&records, daily_rate),
            field_riders: field_rider_view(&records),
            records,
            stats,
            exclude_cancel,
        }
    }
}

// Export/preview rows.

pub fn record_rows(records: &[&ConsolidatedRecord]) -> Vec<RecordExportRow> {
    records
        .iter()
        .map(|r| RecordExportRow {
            file_name: r.file_name.clone(),
            bank: r.bank.clone(),
            area: r.area.clone(),
            cluster: r.cluster.clone(),
            status: r.status.clone(),
            field_rider: r.field_rider.clone(),
            ch_code: r.ch_code.clone(),
            date: r.date.clone(),
            bank_type: r.bank_type.to_string(),
            visit_type: r.visit_type.to_string(),
        })
        .collect()
}

pub fn count_rows(counts: &Counts) -> Vec<CountRow> {
    let total: usize = counts.iter().map(|(_, c)| *c).sum();
    counts
        .iter()
        .map(|(key, count)| CountRow {
            key: key.clone(),
            count: *count,
            percentage: format!("{:.2}%", percentage(*count, total)),
        })
        .collect()
}

fn worklist_row(e: &WorklistEntry) -> WorklistRow {
    WorklistRow {
        cluster: e.cluster.clone(),
        bpi_skip: e.bpi_skip,
        bdo_skip: e.bdo_skip,
        shared: e.shared,
        total: e.total,
    }
}

/// Display rows followed by the total row.
pub fn worklist_rows(view: &WorklistView) -> Vec<WorklistRow> {
    view.rows
        .iter()
        .chain(std::iter::once(&view.total))
        .map(worklist_row)
        .collect()
}

fn result_row(e: &ResultEntry) -> ResultRow {
    ResultRow {
        cluster: e.cluster.clone(),
        ci_visits: e.ci_visits,
        shared_visits: e.shared_visits,
        total_visits: e.total_visits,
        unique_skiptracers: e.unique_skiptracers,
        daily_salary_cost: e.daily_salary_cost,
        cost_per_visit: format!("{:.2}", e.cost_per_visit),
        avg_visits_per_agent: format!("{:.2}", e.avg_visits_per_agent),
    }
}

pub fn result_rows(view: &ResultView) -> Vec<ResultRow> {
    view.rows
        .iter()
        .chain(std::iter::once(&view.total))
        .map(result_row)
        .collect()
}

pub fn field_rider_rows(rows: &[&FieldRiderEntry]) -> Vec<FieldRiderRow> {
    rows.iter()
        .map(|r| FieldRiderRow {
            field_rider: r.field_rider.clone(),
            cluster: r.cluster.clone(),
            area: r.area.clone(),
            shared: r.shared,
            ci: r.ci,
            total: r.total,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Row, UNKNOWN};
    use proptest::prelude::*;

    fn rec(
        status: &str,
        cluster: &str,
        rider: &str,
        area: &str,
        bank_type: BankType,
        visit_type: VisitType,
    ) -> ConsolidatedRecord {
        ConsolidatedRecord {
            file_name: "f.csv".into(),
            bank: UNKNOWN.into(),
            area: area.into(),
            cluster: cluster.into(),
            status: status.into(),
            field_rider: rider.into(),
            ch_code: UNKNOWN.into(),
            date: UNKNOWN.into(),
            sub_status: None,
            bank_type,
            visit_type,
            original_row: Row::new(),
        }
    }

    fn simple(status: &str, cluster: &str) -> ConsolidatedRecord {
        rec(status, cluster, "Ana", "North", BankType::Shared, VisitType::Shared)
    }

    #[test]
    fn huge_daily_rate_saturates_instead_of_overflowing() {
        let records = vec![
            rec("Visited", "C1", "Ana", "North", BankType::Shared, VisitType::Shared),
            rec("Visited", "C1", "Ben", "North", BankType::Shared, VisitType::Ci),
        ];
        let refs: Vec<&ConsolidatedRecord> = records.iter().collect();
        let view = result_view(&refs, u64::MAX);
        assert_eq!(view.rows[0].daily_salary_cost, u64::MAX);
        assert_eq!(view.total.daily_salary_cost, u64::MAX);
    }

    #[test]
    fn cancel_filter_is_case_insensitive_substring() {
        let records = vec![
            simple("Visited", "C1"),
            simple("Cancelled - Duplicate", "C1"),
            simple("CANCEL", "C2"),
            simple("Unknown", "C2"),
        ];
        let stats = summarize(&records, true);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.total_all, 4);
        assert_eq!(summarize(&records, false).total, 4);
    }

    #[test]
    fn ties_keep_first_seen_order() {
        let records = vec![
            simple("B", "C1"),
            simple("A", "C1"),
            simple("A", "C1"),
            simple("C", "C1"),
            simple("B", "C1"),
        ];
        let stats = summarize(&records, false);
        assert_eq!(
            stats.by_status,
            vec![("B".to_string(), 2), ("A".to_string(), 2), ("C".to_string(), 1)]
        );
    }

    #[test]
    fn counts_are_case_sensitive() {
        let records = vec![simple("visited", "C1"), simple("Visited", "C1")];
        assert_eq!(summarize(&records, false).by_status.len(), 2);
    }

    #[test]
    fn bank_and_visit_type_dimensions() {
        let records = vec![
            rec("V", "C1", "Ana", "N", BankType::Bpi, VisitType::Ci),
            rec("V", "C1", "Ana", "N", BankType::Bpi, VisitType::Shared),
            rec("V", "C1", "Ana", "N", BankType::Bdo, VisitType::Shared),
        ];
        let stats = summarize(&records, false);
        assert_eq!(stats.by_bank_type, vec![("BPI".to_string(), 2), ("BDO".to_string(), 1)]);
        assert_eq!(stats.by_visit_type, vec![("SHARED".to_string(), 2), ("CI".to_string(), 1)]);
    }

    #[test]
    fn worklist_is_alphabetical_with_totals() {
        let records = vec![
            rec("V", "Zeta", "Ana", "N", BankType::Bpi, VisitType::Shared),
            rec("V", "Alpha", "Ana", "N", BankType::Bdo, VisitType::Shared),
            rec("V", "Alpha", "Ana", "N", BankType::Shared, VisitType::Shared),
            rec("V", "Zeta", "Ana", "N", BankType::Bpi, VisitType::Shared),
        ];
        let filtered = filter_records(&records, false);
        let view = worklist_view(&filtered);
        let clusters: Vec<&str> = view.rows.iter().map(|r| r.cluster.as_str()).collect();
        assert_eq!(clusters, vec!["Alpha", "Zeta"]);
        assert_eq!(view.rows[0], WorklistEntry { cluster: "Alpha".into(), bpi_skip: 0, bdo_skip: 1, shared: 1, total: 2 });
        assert_eq!(view.total, WorklistEntry { cluster: TOTAL_LABEL.into(), bpi_skip: 2, bdo_skip: 1, shared: 1, total: 4 });

        let rows = worklist_rows(&view);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[2].cluster, TOTAL_LABEL);
    }

    #[test]
    fn result_view_metrics() {
        let records = vec![
            rec("V", "C1", "Ana", "N", BankType::Shared, VisitType::Ci),
            rec("V", "C1", "Ana", "N", BankType::Shared, VisitType::Shared),
            rec("V", "C1", "Ben", "N", BankType::Shared, VisitType::Shared),
            rec("V", "C1", "Ben", "N", BankType::Shared, VisitType::Shared),
        ];
        let filtered = filter_records(&records, false);
        let view = result_view(&filtered, 1000);
        let c1 = &view.rows[0];
        assert_eq!(c1.ci_visits, 1);
        assert_eq!(c1.shared_visits, 3);
        assert_eq!(c1.total_visits, 4);
        assert_eq!(c1.unique_skiptracers, 2);
        assert_eq!(c1.daily_salary_cost, 2000);
        assert_eq!(c1.cost_per_visit, 500.0);
        assert_eq!(c1.avg_visits_per_agent, 2.0);

        let rows = result_rows(&view);
        assert_eq!(rows[0].cost_per_visit, "500.00");
        assert_eq!(rows[1].cluster, TOTAL_LABEL);
    }

    #[test]
    fn result_total_counts_distinct_agents_across_clusters() {
        // Ana works both clusters: per-cluster uniques sum to 3, globally there are 2.
        let records = vec![
            rec("V", "C1", "Ana", "N", BankType::Shared, VisitType::Shared),
            rec("V", "C2", "Ana", "S", BankType::Shared, VisitType::Shared),
            rec("V", "C2", "Ben", "S", BankType::Shared, VisitType::Ci),
        ];
        let filtered = filter_records(&records, false);
        let view = result_view(&filtered, 1000);
        let per_cluster: usize = view.rows.iter().map(|r| r.unique_skiptracers).sum();
        assert_eq!(per_cluster, 3);
        assert_eq!(view.total.unique_skiptracers, 2);
        assert_ne!(view.total.unique_skiptracers, per_cluster);
        assert_eq!(view.total.daily_salary_cost, 2000);
        assert_eq!(view.total.total_visits, 3);
    }

    #[test]
    fn empty_result_view_has_zero_ratios() {
        let view = result_view(&[], 1000);
        assert!(view.rows.is_empty());
        assert_eq!(view.total.cost_per_visit, 0.0);
        assert_eq!(view.total.avg_visits_per_agent, 0.0);
    }

    #[test]
    fn field_rider_view_sorts_and_filters() {
        let records = vec![
            rec("V", "C2", "Ben", "South", BankType::Shared, VisitType::Shared),
            rec("V", "C1", "Ana", "North", BankType::Shared, VisitType::Ci),
            rec("V", "C1", "Ana", "North", BankType::Shared, VisitType::Shared),
            rec("V", "C2", "Ana", "South", BankType::Shared, VisitType::Shared),
        ];
        let filtered = filter_records(&records, false);
        let view = field_rider_view(&filtered);
        let keys: Vec<(&str, &str, &str)> = view
            .rows
            .iter()
            .map(|r| (r.field_rider.as_str(), r.cluster.as_str(), r.area.as_str()))
            .collect();
        assert_eq!(
            keys,
            vec![("Ana", "C1", "North"), ("Ana", "C2", "South"), ("Ben", "C2", "South")]
        );
        assert_eq!((view.rows[0].shared, view.rows[0].ci, view.rows[0].total), (1, 1, 2));
        assert_eq!(view.clusters(), vec!["C1", "C2"]);

        let all = view.visible(None);
        assert_eq!((all.shared, all.ci, all.total), (3, 1, 4));
        let c2 = view.visible(Some("C2"));
        assert_eq!(c2.rows.len(), 2);
        assert_eq!((c2.shared, c2.ci, c2.total), (2, 0, 2));
        // Filtering is display-only.
        assert_eq!(view.rows.len(), 3);
    }

    #[test]
    fn status_breakdown_per_cluster() {
        let records = vec![
            simple("Visited", "C1"),
            simple("Visited", "C2"),
            simple("Visited", "C2"),
            simple("PTP", "C2"),
        ];
        let filtered = filter_records(&records, false);
        let breakdown = status_breakdown(&filtered, Dimension::Cluster);
        assert_eq!(breakdown[0].0, "C2");
        assert_eq!(breakdown[0].1, vec![("Visited".to_string(), 2), ("PTP".to_string(), 1)]);
        assert_eq!(breakdown[1], ("C1".to_string(), vec![("Visited".to_string(), 1)]));
    }

    #[test]
    fn count_rows_have_percentages() {
        let counts = vec![("A".to_string(), 3), ("B".to_string(), 1)];
        let rows = count_rows(&counts);
        assert_eq!(rows[0].percentage, "75.00%");
        assert_eq!(rows[1].percentage, "25.00%");
    }

    const STATUSES: [&str; 4] = ["Visited", "Cancelled", "PTP", "cancel - dup"];
    const CLUSTERS: [&str; 3] = ["C1", "C2", "Unknown"];
    const RIDERS: [&str; 3] = ["Ana", "Ben", "Cy"];

    fn arb_records() -> impl Strategy<Value = Vec<ConsolidatedRecord>> {
        prop::collection::vec((0..4usize, 0..3usize, 0..3usize, 0..3usize, any::<bool>()), 0..60)
            .prop_map(|specs| {
                specs
                    .into_iter()
                    .map(|(s, c, r, b, ci)| {
                        let bank_type = [BankType::Bpi, BankType::Bdo, BankType::Shared][b];
                        let visit_type = if ci { VisitType::Ci } else { VisitType::Shared };
                        rec(STATUSES[s], CLUSTERS[c], RIDERS[r], "North", bank_type, visit_type)
                    })
                    .collect()
            })
    }

    proptest! {
        #[test]
        fn grouping_counts_sum_to_total(records in arb_records(), exclude in any::<bool>()) {
            let stats = summarize(&records, exclude);
            for dimension in Dimension::ALL {
                let sum: usize = stats.counts(dimension).iter().map(|(_, c)| *c).sum();
                prop_assert_eq!(sum, stats.total);
            }
            prop_assert_eq!(stats.total_all, records.len());
            if !exclude {
                prop_assert_eq!(stats.total, stats.total_all);
            }
        }

        #[test]
        fn cancel_exclusion_only_drops_cancelled(records in arb_records()) {
            let with = summarize(&records, false);
            let without = summarize(&records, true);
            prop_assert!(without.total <= with.total);
            let cancelled = records.iter().filter(|r| is_cancelled(r)).count();
            prop_assert_eq!(with.total - without.total, cancelled);
        }

        #[test]
        fn worklist_totals_add_up(records in arb_records(), exclude in any::<bool>()) {
            let filtered = filter_records(&records, exclude);
            let view = worklist_view(&filtered);
            for row in &view.rows {
                prop_assert_eq!(row.total, row.bpi_skip + row.bdo_skip + row.shared);
            }
            let sum: usize = view.rows.iter().map(|r| r.total).sum();
            prop_assert_eq!(view.total.total, sum);
            prop_assert_eq!(view.total.total, filtered.len());
        }

        #[test]
        fn summarize_is_idempotent(records in arb_records(), exclude in any::<bool>()) {
            prop_assert_eq!(summarize(&records, exclude), summarize(&records, exclude));
        }

        #[test]
        fn global_unique_agents_never_exceed_cluster_sum(records in arb_records()) {
            let filtered = filter_records(&records, false);
            let view = result_view(&filtered, 1000);
            let per_cluster: usize = view.rows.iter().map(|r| r.unique_skiptracers).sum();
            prop_assert!(view.total.unique_skiptracers <= per_cluster);
        }
    }
}
