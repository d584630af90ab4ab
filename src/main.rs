// Entry point and high-level CLI flow.
//
// Non-interactive runs load the batch, apply command-line overrides and
// write every report. With `-i` the batch is loaded once and a numbered menu
// lets the user adjust mappings, classifications and filters before
// generating reports, as many times as needed in one run.

use anyhow::{bail, Context};
use clap::{ArgAction, Parser};
use std::io::{self, IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tabled::Tabled;
use visit_report::image::{export_summary_image, IMAGE_EXPORT};
use visit_report::logging::{init_logging, LogConfig};
use visit_report::output::{self, preview_table, preview_table_rows};
use visit_report::reports::{self, ReportSet};
use visit_report::types::{BankType, CanonicalField, Dimension, VisitType};
use visit_report::util::{format_int, format_number};
use visit_report::{Config, RecomputeTrigger, ReportError, Session};

#[derive(Parser, Debug)]
#[command(name = "visit_report", version)]
#[command(about = "Consolidate field-visit exports into cluster worklist and result reports")]
struct Cli {
    /// Visit files (comma, tab, pipe or semicolon delimited)
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Cluster reference file with FINAL AREA and AREA CLUSTER columns
    #[arg(short = 'c', long = "clusters")]
    clusters: Option<PathBuf>,

    /// TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory for exported reports
    #[arg(long = "output-dir")]
    output_dir: Option<PathBuf>,

    /// Daily salary per unique field agent
    #[arg(long = "daily-rate")]
    daily_rate: Option<u64>,

    /// Drop records whose status contains "cancel"
    #[arg(long = "exclude-cancel")]
    exclude_cancel: bool,

    /// Classify files from their names (bpi/bdo, ci/collection)
    #[arg(long = "auto-detect")]
    auto_detect: bool,

    /// Override a mapping; an empty HEADER clears it
    #[arg(long = "map", value_name = "FILE_NO:FIELD=HEADER", value_parser = parse_map_override)]
    map: Vec<MapOverride>,

    /// Set a file's bank type
    #[arg(long = "bank-type", value_name = "FILE_NO=BPI|BDO|SHARED", value_parser = parse_indexed::<BankType>)]
    bank_type: Vec<(usize, BankType)>,

    /// Set a file's visit type
    #[arg(long = "visit-type", value_name = "FILE_NO=CI|SHARED", value_parser = parse_indexed::<VisitType>)]
    visit_type: Vec<(usize, VisitType)>,

    /// Only show this cluster in the field-rider preview
    #[arg(long = "cluster-filter")]
    cluster_filter: Option<String>,

    /// Skip the summary image
    #[arg(long = "no-image")]
    no_image: bool,

    /// Adjust the batch from a menu before generating reports
    #[arg(short, long)]
    interactive: bool,

    /// More log output (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Debug, Clone, PartialEq)]
struct MapOverride {
    index: usize,
    field: CanonicalField,
    header: Option<String>,
}

fn parse_map_override(s: &str) -> Result<MapOverride, String> {
    let (index, rest) = s
        .split_once(':')
        .ok_or_else(|| format!("expected FILE_NO:FIELD=HEADER, got '{}'", s))?;
    let (field, header) = rest
        .split_once('=')
        .ok_or_else(|| format!("expected FILE_NO:FIELD=HEADER, got '{}'", s))?;
    let index = parse_file_number(index)?;
    let field = field.trim().parse()?;
    let header = Some(header.to_string()).filter(|h| !h.is_empty());
    Ok(MapOverride { index, field, header })
}

fn parse_indexed<T>(s: &str) -> Result<(usize, T), String>
where
    T: FromStr<Err = String>,
{
    let (index, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected FILE_NO=VALUE, got '{}'", s))?;
    Ok((parse_file_number(index)?, value.parse()?))
}

/// A 1-based file number as shown in the "Uploaded Files" table, returned as
/// a 0-based index.
fn parse_file_number(s: &str) -> Result<usize, String> {
    match s.trim().parse::<usize>() {
        Ok(n) if n >= 1 => Ok(n - 1),
        _ => Err(format!("invalid file number '{}' (files are numbered from 1)", s)),
    }
}

/// Display options shared by both modes.
struct RunOptions {
    output_dir: PathBuf,
    cluster_filter: Option<String>,
    no_image: bool,
}

#[derive(Tabled, Clone)]
struct FileRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "File")]
    name: String,
    #[tabled(rename = "Rows")]
    rows: String,
    #[tabled(rename = "Columns")]
    columns: usize,
    #[tabled(rename = "Bank Type")]
    bank_type: String,
    #[tabled(rename = "Visit Type")]
    visit_type: String,
}

#[derive(Tabled, Clone)]
struct MappingRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Source Header")]
    header: String,
}

/// Read a single line of input. `None` on end of input.
fn read_line() -> Option<String> {
    let _ = io::stdout().flush();
    let mut buf = String::new();
    match io::stdin().read_line(&mut buf) {
        Ok(0) | Err(_) => None,
        Ok(_) => Some(buf.trim().to_string()),
    }
}

fn read_choice() -> Option<String> {
    print!("Enter choice: ");
    read_line()
}

fn prompt(label: &str) -> Option<String> {
    print!("{}: ", label);
    read_line()
}

/// Ask the user whether to go back to the menu after generating reports.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Menu (Y/N): ");
        let Some(resp) = read_line() else {
            return false;
        };
        match resp.to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// A 1-based position typed by the user, converted to an index below `len`.
fn pick_index(label: &str, len: usize) -> Option<usize> {
    let input = prompt(label)?;
    match input.parse::<usize>() {
        Ok(n) if (1..=len).contains(&n) => Some(n - 1),
        _ => {
            println!("Invalid choice. Please enter a number from 1 to {}.\n", len);
            None
        }
    }
}

fn file_rows(session: &Session) -> Vec<FileRow> {
    session
        .files()
        .iter()
        .zip(session.classifications())
        .enumerate()
        .map(|(idx, (file, class))| FileRow {
            index: idx + 1,
            name: file.name.clone(),
            rows: format_int(file.rows.len() as u64),
            columns: file.headers.len(),
            bank_type: class.bank_type.to_string(),
            visit_type: class.visit_type.to_string(),
        })
        .collect()
}

fn editable_fields(session: &Session) -> Vec<CanonicalField> {
    let mut fields = CanonicalField::CORE.to_vec();
    if session.config().include_sub_status {
        fields.push(CanonicalField::SubStatus);
    }
    fields
}

fn show_mappings(session: &Session) {
    for (idx, file) in session.files().iter().enumerate() {
        let mapping = &session.mappings()[idx];
        let rows: Vec<MappingRow> = editable_fields(session)
            .into_iter()
            .map(|field| MappingRow {
                field: field.label().to_string(),
                header: mapping.get(field).unwrap_or("(unmapped)").to_string(),
            })
            .collect();
        preview_table(&format!("[{}] {}", idx + 1, file.name), None, &rows, rows.len());
    }
}

/// Keep derived state in step with an edit once reports have been generated.
fn refresh(session: &mut Session, trigger: RecomputeTrigger) {
    if session.stats().is_some() {
        if let Err(e) = session.recompute(trigger) {
            println!("Error: {}\n", e);
        }
    }
}

fn handle_edit_mapping(session: &mut Session) {
    preview_table_rows(&file_rows(session), usize::MAX);
    let Some(file_idx) = pick_index("File number", session.files().len()) else {
        return;
    };
    let fields = editable_fields(session);
    for (n, field) in fields.iter().enumerate() {
        println!("[{}] {}", n + 1, field.label());
    }
    let Some(field_idx) = pick_index("Field number", fields.len()) else {
        return;
    };
    let headers = session.files()[file_idx].headers.clone();
    println!("[0] (clear mapping)");
    for (n, header) in headers.iter().enumerate() {
        println!("[{}] {}", n + 1, header);
    }
    let Some(input) = prompt("Header number") else {
        return;
    };
    let header = match input.parse::<usize>() {
        Ok(0) => None,
        Ok(n) if n <= headers.len() => Some(headers[n - 1].as_str()),
        _ => {
            println!("Invalid choice.\n");
            return;
        }
    };
    match session.set_mapping(file_idx, fields[field_idx], header) {
        Ok(()) => {
            println!("Mapping updated.\n");
            refresh(session, RecomputeTrigger::Mapping);
        }
        Err(e) => println!("Error: {}\n", e),
    }
}

fn handle_set_classification(session: &mut Session) {
    preview_table_rows(&file_rows(session), usize::MAX);
    let Some(file_idx) = pick_index("File number", session.files().len()) else {
        return;
    };
    if let Some(input) = prompt("Bank type (BPI/BDO/SHARED, blank to keep)") {
        if !input.is_empty() {
            match input.parse::<BankType>() {
                Ok(t) => {
                    if let Err(e) = session.set_bank_type(file_idx, t) {
                        println!("Error: {}", e);
                    }
                }
                Err(e) => println!("{}", e),
            }
        }
    }
    if let Some(input) = prompt("Visit type (CI/SHARED, blank to keep)") {
        if !input.is_empty() {
            match input.parse::<VisitType>() {
                Ok(t) => {
                    if let Err(e) = session.set_visit_type(file_idx, t) {
                        println!("Error: {}", e);
                    }
                }
                Err(e) => println!("{}", e),
            }
        }
    }
    println!();
    refresh(session, RecomputeTrigger::Classification);
}

fn handle_load_clusters(session: &mut Session) {
    let Some(input) = prompt("Cluster file path") else {
        return;
    };
    load_clusters(session, Path::new(&input));
    refresh(session, RecomputeTrigger::Clusters);
}

fn load_clusters(session: &mut Session, path: &Path) {
    match session.load_cluster_file(path) {
        Ok(n) => {
            println!("Loaded {} area-cluster mappings.", format_int(n as u64));
            println!("Clusters: {}\n", session.cluster_lookup().clusters().join(", "));
        }
        Err(e) => eprintln!("Failed to load cluster file: {}\n", e),
    }
}

fn print_counts(reports: &ReportSet<'_>, max_rows: usize) {
    for dimension in Dimension::ALL {
        let rows = reports::count_rows(reports.stats.counts(dimension));
        preview_table(&format!("By {}", dimension.label()), None, &rows, max_rows);
    }
}

fn print_status_breakdowns(session: &Session, max_rows: usize) {
    for dimension in [
        Dimension::Bank,
        Dimension::Area,
        Dimension::FieldRider,
        Dimension::Cluster,
    ] {
        println!("Status by {}", dimension.label());
        for (key, statuses) in session.status_breakdown(dimension).into_iter().take(max_rows) {
            let parts: Vec<String> = statuses
                .iter()
                .map(|(status, count)| format!("{} {}", status, format_int(*count as u64)))
                .collect();
            println!("  {}: {}", key, parts.join(", "));
        }
        println!();
    }
}

/// Recompute, preview every report on stdout and write the exports.
fn handle_generate_reports(session: &mut Session, opts: &RunOptions) -> Result<(), ReportError> {
    session.recompute(RecomputeTrigger::Files)?;
    let Some(reports) = session.reports() else {
        return Err(ReportError::NoData);
    };
    let max_rows = session.config().preview_rows;

    println!(
        "Total Records: {} ({} before cancel filter)\n",
        format_int(reports.stats.total as u64),
        format_int(reports.stats.total_all as u64)
    );

    print_counts(&reports, max_rows);

    let note = reports.exclude_cancel.then_some("Cancelled visits excluded");
    preview_table("Worklist", note, &reports::worklist_rows(&reports.worklist), usize::MAX);
    preview_table("Result", note, &reports::result_rows(&reports.result), usize::MAX);
    println!(
        "Daily salary cost: {} for {} unique skiptracers ({} per visit)\n",
        format_number(reports.result.total.daily_salary_cost as f64, 2),
        format_int(reports.result.total.unique_skiptracers as u64),
        format_number(reports.result.total.cost_per_visit, 2)
    );

    if let Some(cluster) = &opts.cluster_filter {
        let available = reports.field_riders.clusters();
        if !available.contains(&cluster.as_str()) {
            println!(
                "No field riders in cluster '{}'. Available clusters: {}\n",
                cluster,
                available.join(", ")
            );
        }
    }
    let selection = reports.field_riders.visible(opts.cluster_filter.as_deref());
    let filter_note = opts.cluster_filter.as_ref().map(|c| format!("Cluster: {}", c));
    preview_table(
        "Field Riders",
        filter_note.as_deref(),
        &reports::field_rider_rows(&selection.rows),
        max_rows,
    );
    println!(
        "Field rider totals: Shared {}, CI {}, Total {}\n",
        format_int(selection.shared as u64),
        format_int(selection.ci as u64),
        format_int(selection.total as u64)
    );

    print_status_breakdowns(session, max_rows);

    let export = output::export_all(&opts.output_dir, &reports);
    for path in &export.written {
        println!("Exported {}", path.display());
    }
    for (path, e) in &export.failures {
        eprintln!("Write error ({}): {}", path.display(), e);
    }

    if !opts.no_image {
        let path = opts.output_dir.join(IMAGE_EXPORT);
        match export_summary_image(&path, reports.stats, session.config().top_n) {
            Ok(()) => println!("Exported {}", path.display()),
            Err(e) => eprintln!("Write error ({}): {}", path.display(), e),
        }
    }
    println!();
    Ok(())
}

fn run_menu(session: &mut Session, opts: &RunOptions) {
    loop {
        let cancel = if session.exclude_cancel() { "ON" } else { "OFF" };
        println!("Select an action:");
        println!("[1] Show column mappings");
        println!("[2] Edit a column mapping");
        println!("[3] Set file classification");
        println!("[4] Use auto mapping");
        println!("[5] Toggle cancel exclusion (currently {})", cancel);
        println!("[6] Load cluster file");
        println!("[7] Generate reports");
        println!("[8] Exit\n");
        let Some(choice) = read_choice() else {
            println!("Exiting the program.");
            return;
        };
        match choice.as_str() {
            "1" => show_mappings(session),
            "2" => handle_edit_mapping(session),
            "3" => handle_set_classification(session),
            "4" => {
                session.use_auto_mapping();
                println!("Auto mapping and file classification applied.\n");
                refresh(session, RecomputeTrigger::Mapping);
            }
            "5" => {
                let exclude = !session.exclude_cancel();
                session.set_exclude_cancel(exclude);
                refresh(session, RecomputeTrigger::CancelFilter);
            }
            "6" => handle_load_clusters(session),
            "7" => {
                println!();
                if let Err(e) = handle_generate_reports(session, opts) {
                    println!("Error: {}\n", e);
                }
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    return;
                }
            }
            "8" => {
                println!("Exiting the program.");
                return;
            }
            _ => println!("Invalid choice. Please enter a number from 1 to 8.\n"),
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::default(),
    };
    if let Some(dir) = &cli.output_dir {
        config.output_dir = dir.clone();
    }
    if let Some(rate) = cli.daily_rate {
        config.daily_rate = rate;
    }
    Ok(config)
}

fn apply_overrides(session: &mut Session, cli: &Cli) -> anyhow::Result<()> {
    if cli.auto_detect {
        session.auto_detect_classifications();
    }
    for m in &cli.map {
        session
            .set_mapping(m.index, m.field, m.header.as_deref())
            .with_context(|| format!("invalid --map for file {}", m.index + 1))?;
    }
    for (index, bank_type) in &cli.bank_type {
        session
            .set_bank_type(*index, *bank_type)
            .with_context(|| format!("invalid --bank-type for file {}", index + 1))?;
    }
    for (index, visit_type) in &cli.visit_type {
        session
            .set_visit_type(*index, *visit_type)
            .with_context(|| format!("invalid --visit-type for file {}", index + 1))?;
    }
    session.set_exclude_cancel(cli.exclude_cancel);
    Ok(())
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let log_config = LogConfig::from_verbosity(cli.verbose)
        .with_ansi(io::stderr().is_terminal())
        .with_target(cli.verbose >= 2);
    init_logging(&log_config)?;
    let config = load_config(&cli)?;
    let opts = RunOptions {
        output_dir: config.output_dir.clone(),
        cluster_filter: cli.cluster_filter.clone(),
        no_image: cli.no_image,
    };
    let mut session = Session::new(config)?;

    println!("Processing {} file(s)...", cli.files.len());
    let report = session.load_files(&cli.files)?;
    preview_table("Uploaded Files", None, &file_rows(&session), usize::MAX);
    println!(
        "{} rows loaded, {} blank rows dropped, {} parse warnings.",
        format_int(report.total_rows() as u64),
        format_int(report.blank_rows as u64),
        format_int(report.warnings as u64)
    );
    for (name, reason) in &report.failures {
        eprintln!("Failed to load {}: {}", name, reason);
    }
    println!();

    if let Some(path) = &cli.clusters {
        load_clusters(&mut session, path);
    }
    apply_overrides(&mut session, &cli)?;

    if cli.interactive {
        run_menu(&mut session, &opts);
        return Ok(());
    }
    if let Err(e) = handle_generate_reports(&mut session, &opts) {
        bail!("report generation failed: {}", e);
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    run(Cli::parse())
}
