use log::{debug, info, warn};

use section_engine::builder::Builder;
use section_engine::*;
use snafu::{prelude::*, Snafu};

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::elsec::config_reader::*;

pub mod config_reader;
mod io_common;
mod io_csv;
mod io_excel;
mod io_geojson;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ElsecError {
    #[snafu(display("Error opening file {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("No worksheet found in {path}"))]
    EmptyExcel { path: String },
    #[snafu(display("Unsupported cell content at row {lineno}: {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Expected a non-negative integer, got {value}"))]
    ParsingJsonNumber { value: String },
    #[snafu(display("Error reading the GeoJSON file {path}"))]
    ParsingGeoJson {
        source: geojson::Error,
        path: String,
    },
    #[snafu(display("{path} is not a GeoJSON feature collection"))]
    NotAFeatureCollection { path: String },
    #[snafu(display("Feature {index} of {path}: missing or invalid property {property}"))]
    MissingProperty {
        path: String,
        index: usize,
        property: String,
    },
    #[snafu(display("Error opening file {path}"))]
    CsvOpen { source: csv::Error, path: String },
    #[snafu(display("Error parsing line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display("Column {column} not found in {path}"))]
    MissingColumn { path: String, column: String },
    #[snafu(display("Line {lineno}: {value:?} in column {column} is not a vote count"))]
    BadCount {
        lineno: usize,
        column: String,
        value: String,
    },
    #[snafu(display("Line {lineno}: {value:?} in column {column} is not a number"))]
    BadNumber {
        lineno: usize,
        column: String,
        value: String,
    },
    #[snafu(display("Line {lineno}: no section"))]
    MissingSection { lineno: usize },
    #[snafu(display("The tallies refer to section {section_id}, which is not in the sections"))]
    UnknownSection { section_id: SectionId },
    #[snafu(display("Error writing {path}"))]
    Writing {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing {path}"))]
    WritingCsv { source: csv::Error, path: String },
    #[snafu(display("Missing parent directory"))]
    MissingParentDir {},
    #[snafu(display("Invalid dataset: {source}"))]
    Reconcile { source: ReconcileErrors },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type ElsecResult<T> = Result<T, ElsecError>;

/// A row of vote tallies, as read from a file.
///
/// The district is optional in the files: it is filled in from the sections.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ParsedRow {
    pub section_id: SectionId,
    pub district_id: Option<DistrictId>,
    pub votes: VoteColumns,
    pub total_votes: u64,
}

// All the input data, once read and checked.
struct Snapshot {
    sections: Vec<Section>,
    records: Vec<SpatialRecord>,
    rows: Option<Vec<ElectoralRow>>,
}

fn resolve_path(root: &Path, file_path: &str) -> String {
    root.join(file_path).to_string_lossy().to_string()
}

fn validate_rows(parsed: Vec<ParsedRow>, sections: &[Section]) -> ElsecResult<Vec<ElectoralRow>> {
    let districts: HashMap<SectionId, DistrictId> =
        sections.iter().map(|s| (s.id, s.district_id)).collect();
    let mut res: Vec<ElectoralRow> = Vec::new();
    for pr in parsed {
        let district_id = match pr.district_id {
            Some(d) => d,
            None => *districts.get(&pr.section_id).context(UnknownSectionSnafu {
                section_id: pr.section_id,
            })?,
        };
        res.push(ElectoralRow {
            section_id: pr.section_id,
            district_id,
            votes: pr.votes,
            total_votes: pr.total_votes,
        });
    }
    Ok(res)
}

fn read_electoral_rows(
    root: &Path,
    source: &ElectoralSource,
    sections: &[Section],
) -> ElsecResult<Vec<ElectoralRow>> {
    let path = resolve_path(root, &source.file_path);
    info!("read_electoral_rows: {:?} from {}", source.provider, path);
    let parsed = match source.provider.as_str() {
        "csv" => io_csv::read_csv_rows(&path, source)?,
        "xlsx" => io_excel::read_excel_rows(&path, source)?,
        x => whatever!("Provider not implemented for tallies: {:?}", x),
    };
    validate_rows(parsed, sections)
}

fn read_snapshot(config: &ElsecConfig, root: &Path) -> ElsecResult<Snapshot> {
    if config.section_sources.is_empty() {
        whatever!("No section source in the configuration");
    }

    let mut sections: Vec<Section> = Vec::new();
    for source in config.section_sources.iter() {
        let path = resolve_path(root, &source.file_path);
        let mut file_sections = match source.provider.as_str() {
            "geojson" => io_geojson::read_sections(&path, source)?,
            x => whatever!("Provider not implemented for sections: {:?}", x),
        };
        sections.append(&mut file_sections);
    }

    let mut records: Vec<SpatialRecord> = Vec::new();
    for source in config.record_sources.iter() {
        let path = resolve_path(root, &source.file_path);
        let mut file_records = match source.provider.as_str() {
            "csv" => io_csv::read_csv_records(&path, source)?,
            x => whatever!("Provider not implemented for records: {:?}", x),
        };
        records.append(&mut file_records);
    }

    let rows = if config.electoral_sources.is_empty() {
        None
    } else {
        let mut rows: Vec<ElectoralRow> = Vec::new();
        for source in config.electoral_sources.iter() {
            let mut file_rows = read_electoral_rows(root, source, &sections)?;
            rows.append(&mut file_rows);
        }
        Some(rows)
    };

    info!(
        "read_snapshot: {} sections, {} records, {} rows",
        sections.len(),
        records.len(),
        rows.as_ref().map(|r| r.len()).unwrap_or(0)
    );
    Ok(Snapshot {
        sections,
        records,
        rows,
    })
}

fn section_updates_to_json(sections: &[SectionAnalysis]) -> Vec<JSValue> {
    sections
        .iter()
        .map(|sa| {
            let c = &sa.competitiveness;
            json!({
                "alliances": sa.alliance_totals,
                "districtId": sa.district_id,
                "margin": c.margin,
                "marginPercent": c.margin_percent,
                "runnerUp": c.runner_up,
                "runnerUpVotes": c.runner_up_votes,
                "sectionId": sa.section_id,
                "swing": c.is_swing,
                "totalVotes": sa.total_votes,
                "winner": c.winner,
                "winnerVotes": c.winner_votes,
            })
        })
        .collect()
}

fn districts_to_json(districts: &[DistrictSummary]) -> Vec<JSValue> {
    districts
        .iter()
        .map(|d| {
            json!({
                "alliances": d.alliance_totals,
                "districtId": d.district_id,
                "sections": d.sections,
                "swingSections": d.swing_sections,
                "totalVotes": d.total_votes,
            })
        })
        .collect()
}

fn build_summary_js(
    config: &ElsecConfig,
    rules: &ReconcileRules,
    rs: &ReconciliationSummary,
) -> JSValue {
    let alliances: Vec<JSValue> = rules
        .alliances
        .iter()
        .map(|a| json!({"columns": a.columns, "name": a.name}))
        .collect();
    let record_updates: Vec<JSValue> = rs
        .assignments
        .iter()
        .map(|a| json!({"recordId": a.record_id, "sectionId": a.section_id}))
        .collect();
    let t = &rs.tally;
    json!({
        "config": {
            "alliances": alliances,
            "dataset": config.output_settings.dataset_name,
            "swingThreshold": rules.swing_threshold_percent,
            "trackedParties": rules.tracked_parties,
        },
        "districts": districts_to_json(&rs.districts),
        "failedRecords": rs.failed_records,
        "invalidSections": rs.invalid_sections,
        "recordUpdates": record_updates,
        "sectionUpdates": section_updates_to_json(&rs.section_analyses),
        "tally": {
            "alreadyAssigned": t.already_assigned,
            "failed": t.failed,
            "resolved": t.resolved,
            "rowsAnalyzed": t.rows_analyzed,
            "swingSections": t.swing_sections,
            "unresolved": t.unresolved,
            "withoutPoint": t.without_point,
        },
        "unresolvedRecords": rs.unresolved_records,
    })
}

// The files handed over to the caller, which applies the updates.
fn write_updates(
    config: &ElsecConfig,
    root: &Path,
    rs: &ReconciliationSummary,
) -> ElsecResult<()> {
    let out_dir = match &config.output_settings.output_directory {
        Some(d) => root.join(d),
        None => return Ok(()),
    };
    let dir_s = out_dir.to_string_lossy().to_string();
    fs::create_dir_all(&out_dir).context(WritingSnafu { path: dir_s })?;
    let dataset = &config.output_settings.dataset_name;

    let records_p = resolve_path(&out_dir, &format!("{}_record_updates.csv", dataset));
    let mut wtr = csv::Writer::from_path(&records_p).context(WritingCsvSnafu {
        path: records_p.clone(),
    })?;
    wtr.write_record(&["record_id", "section_id"])
        .context(WritingCsvSnafu {
            path: records_p.clone(),
        })?;
    for a in rs.assignments.iter() {
        wtr.write_record(&[a.record_id.clone(), a.section_id.to_string()])
            .context(WritingCsvSnafu {
                path: records_p.clone(),
            })?;
    }
    wtr.flush().context(WritingSnafu {
        path: records_p.clone(),
    })?;
    info!("write_updates: {} record updates in {}", rs.assignments.len(), records_p);

    let sections_p = resolve_path(&out_dir, &format!("{}_section_updates.json", dataset));
    let js = JSValue::Array(section_updates_to_json(&rs.section_analyses));
    let pretty = serde_json::to_string_pretty(&js).context(ParsingJsonSnafu {})?;
    fs::write(&sections_p, pretty).context(WritingSnafu {
        path: sections_p.clone(),
    })?;
    info!("write_updates: section updates in {}", sections_p);
    Ok(())
}

/// Runs the reconciliation described by a configuration and returns the summary.
///
/// root: the directory against which the paths of the configuration are resolved.
pub fn run_dataset(config: &ElsecConfig, root: &Path) -> ElsecResult<JSValue> {
    let rules = validate_rules(&config.rules)?;
    let snapshot = read_snapshot(config, root)?;

    let mut builder = Builder::new(&rules)
        .context(ReconcileSnafu {})?
        .sections(&snapshot.sections)
        .context(ReconcileSnafu {})?;
    for r in snapshot.records.iter() {
        builder.add_record(r).context(ReconcileSnafu {})?;
    }
    match &snapshot.rows {
        Some(rows) => {
            for r in rows.iter() {
                builder.add_row(r).context(ReconcileSnafu {})?;
            }
        }
        None => {
            debug!("run_dataset: reading the tallies from the section properties");
            builder
                .sections_electoral_rows(config.rules.total_votes_property())
                .context(ReconcileSnafu {})?;
        }
    }
    let summary = builder.run().context(ReconcileSnafu {})?;
    debug!("run_dataset: summary {:?}", summary);

    write_updates(config, root, &summary)?;
    Ok(build_summary_js(config, &rules, &summary))
}

fn check_reference(result_js: &JSValue, reference_path: &str) -> ElsecResult<()> {
    let pretty_js_stats = serde_json::to_string_pretty(result_js).context(ParsingJsonSnafu {})?;
    let summary_ref = read_summary(reference_path)?;
    let pretty_js_summary_ref =
        serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
    if pretty_js_summary_ref != pretty_js_stats {
        warn!("Found differences with the reference summary");
        print_diff(
            pretty_js_summary_ref.as_str(),
            pretty_js_stats.as_str(),
            "\n",
        );
        whatever!("Difference detected between calculated summary and reference summary")
    }
    Ok(())
}

// The paths given on the command line are relative to the working directory.
fn absolute_path(p: &str) -> ElsecResult<String> {
    let cwd = std::env::current_dir().whatever_context("Cannot read the working directory")?;
    Ok(resolve_path(&cwd, p))
}

fn config_from_args(args: &Args) -> ElsecResult<(ElsecConfig, PathBuf)> {
    let (mut config, root) = match (&args.config, &args.sections) {
        (Some(config_path), _) => {
            let config = read_config(config_path)?;
            let root = Path::new(config_path)
                .parent()
                .context(MissingParentDirSnafu {})?
                .to_path_buf();
            (config, root)
        }
        (None, Some(sections_path)) => {
            let config = ElsecConfig {
                output_settings: OutputSettings {
                    dataset_name: io_common::simplify_file_name(sections_path),
                    output_directory: None,
                },
                section_sources: Vec::new(),
                electoral_sources: Vec::new(),
                record_sources: Vec::new(),
                rules: ElsecRules::default(),
            };
            (config, PathBuf::new())
        }
        (None, None) => whatever!("Either --config or --sections must be provided"),
    };

    if let Some(p) = &args.sections {
        config.section_sources = vec![SectionSource::new(&absolute_path(p)?)];
    }
    if let Some(p) = &args.records {
        config.record_sources = vec![RecordSource::new("leader", &absolute_path(p)?)];
    }
    if let Some(p) = &args.rows {
        let provider = if p.ends_with(".xlsx") { "xlsx" } else { "csv" };
        config.electoral_sources = vec![ElectoralSource::new(provider, &absolute_path(p)?)];
    }
    if let Some(tps) = &args.tracked_parties {
        config.rules.tracked_parties = tps.clone();
    }
    if let Some(t) = args.swing_threshold {
        config.rules.swing_threshold = Some(t);
    }
    info!("config: {:?}", config);
    Ok((config, root))
}

/// The entry point of the command line.
pub fn run_cli(args: &Args) -> ElsecResult<()> {
    let (config, root) = config_from_args(args)?;
    let result_js = run_dataset(&config, &root)?;

    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some("") => {}
        Some(out_path) => {
            fs::write(out_path, &pretty_js_stats).context(WritingSnafu { path: out_path })?;
            info!("run_cli: summary written to {}", out_path);
        }
    }

    if let Some(reference_path) = &args.reference {
        check_reference(&result_js, reference_path)?;
    }
    Ok(())
}

#[cfg(test)]
fn test_data_dir() -> String {
    option_env!("ELSEC_TEST_DIR")
        .unwrap_or(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data"))
        .to_string()
}

// Runs a configuration file the way the command line does, without printing the summary.
#[cfg(test)]
fn run_config_file(config_path: String, reference: Option<String>) -> ElsecResult<()> {
    let args = Args {
        config: Some(config_path),
        reference,
        out: Some(String::new()),
        sections: None,
        records: None,
        rows: None,
        tracked_parties: None,
        swing_threshold: None,
        verbose: false,
    };
    run_cli(&args)
}

#[cfg(test)]
fn run_dataset_test(test_name: &str, config_lpath: &str, summary_lpath: &str) {
    let test_dir = test_data_dir();
    info!("Running test {}", test_name);
    let res = run_config_file(
        format!("{}/{}/{}", test_dir, test_name, config_lpath),
        Some(format!("{}/{}/{}", test_dir, test_name, summary_lpath)),
    );
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        panic!("test {} failed: {}", test_name, e);
    }
}

#[cfg(test)]
pub fn test_wrapper(test_name: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    run_dataset_test(
        test_name,
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected_summary.json", test_name).as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grid_example() {
        test_wrapper("grid_example");
    }

    #[test]
    fn metadata_example() {
        test_wrapper("metadata_example");
    }

    #[test]
    fn reference_mismatch_is_an_error() {
        let dir = test_data_dir();
        let res = run_config_file(
            format!("{}/grid_example/grid_example_config.json", dir),
            Some(format!(
                "{}/metadata_example/metadata_example_expected_summary.json",
                dir
            )),
        );
        assert!(res.is_err());
    }

    fn section(id: SectionId, district_id: DistrictId) -> Section {
        Section {
            id,
            district_id,
            municipality: String::new(),
            geometry: None,
            metadata: VoteColumns::new(),
        }
    }

    #[test]
    fn rows_take_the_district_of_their_section() {
        let sections = vec![section(1, 10), section(2, 20)];
        let parsed = vec![
            ParsedRow {
                section_id: 2,
                district_id: None,
                votes: VoteColumns::new(),
                total_votes: 5,
            },
            ParsedRow {
                section_id: 1,
                district_id: Some(11),
                votes: VoteColumns::new(),
                total_votes: 3,
            },
        ];
        let rows = validate_rows(parsed, &sections).unwrap();
        assert_eq!(rows[0].district_id, 20);
        assert_eq!(rows[1].district_id, 11);
    }

    #[test]
    fn updates_are_written_to_the_output_directory() {
        let root = std::env::temp_dir().join("elsec_write_updates");
        let config = ElsecConfig {
            output_settings: OutputSettings {
                dataset_name: "demo".to_string(),
                output_directory: Some("out".to_string()),
            },
            section_sources: Vec::new(),
            electoral_sources: Vec::new(),
            record_sources: Vec::new(),
            rules: ElsecRules::default(),
        };
        let mut builder = Builder::new(&ReconcileRules::DEFAULT_RULES).unwrap();
        builder
            .add_section(Section {
                geometry: Some(Geometry::Polygon(vec![vec![
                    Point::new(0.0, 0.0),
                    Point::new(0.0, 1.0),
                    Point::new(1.0, 1.0),
                    Point::new(1.0, 0.0),
                ]])),
                ..section(7, 1)
            })
            .unwrap();
        builder.add_record_simple("L-1", 0.5, 0.5).unwrap();
        let summary = builder.run().unwrap();
        write_updates(&config, &root, &summary).unwrap();

        let csv_s = fs::read_to_string(root.join("out").join("demo_record_updates.csv")).unwrap();
        assert_eq!(csv_s, "record_id,section_id\nL-1,7\n");
        let js_s = fs::read_to_string(root.join("out").join("demo_section_updates.json")).unwrap();
        let js: JSValue = serde_json::from_str(&js_s).unwrap();
        assert_eq!(js, json!([]));
    }

    #[test]
    fn rows_of_unknown_sections_are_rejected() {
        let parsed = vec![ParsedRow {
            section_id: 9,
            district_id: None,
            votes: VoteColumns::new(),
            total_votes: 0,
        }];
        let res = validate_rows(parsed, &[section(1, 10)]);
        assert!(matches!(res, Err(ElsecError::UnknownSection { section_id: 9 })));
    }
}
