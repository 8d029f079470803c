mod config;
use log::{debug, info, warn};
use rayon::prelude::*;

use std::collections::{BTreeMap, HashSet};

pub mod builder;
pub mod coalition;
pub mod competitiveness;
pub mod geometry;
pub mod manual;
pub mod resolver;

pub use crate::config::*;

// **** Private structures ****

// What happened to a single record.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
enum RecordOutcome {
    AlreadyAssigned,
    WithoutPoint,
    InvalidPoint,
    Resolved(SectionId),
    Unresolved,
}

/// The section updates produced for a batch of records.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct RecordResolution {
    pub assignments: Vec<SectionAssignment>,
    pub unresolved: Vec<String>,
    pub failed: Vec<String>,
    pub already_assigned: u64,
    pub without_point: u64,
}

/// The computed metadata produced for a batch of electoral rows.
#[derive(PartialEq, Debug, Clone, Default)]
pub struct RowAnalysis {
    pub sections: Vec<SectionAnalysis>,
    pub districts: Vec<DistrictSummary>,
}

/// Runs the resolution and the electoral analysis over a snapshot.
///
/// The reconciler holds the configuration and the sections, which are shared by all
/// the batches. It never writes anything: the caller receives the updates and decides
/// how to persist them.
pub struct Reconciler {
    rules: ReconcileRules,
    sections: Vec<Section>,
}

impl Reconciler {
    pub fn new(
        rules: &ReconcileRules,
        sections: Vec<Section>,
    ) -> Result<Reconciler, ReconcileErrors> {
        check_rules(rules)?;
        let mut seen: HashSet<SectionId> = HashSet::new();
        for s in sections.iter() {
            if !seen.insert(s.id) {
                return Err(ReconcileErrors::DuplicateSection(s.id));
            }
        }
        info!(
            "Reconciler: {} sections, {} alliances, {} tracked parties, swing threshold {}%",
            sections.len(),
            rules.alliances.len(),
            rules.tracked_parties.len(),
            rules.swing_threshold_percent
        );
        Ok(Reconciler {
            rules: rules.clone(),
            sections,
        })
    }

    pub fn rules(&self) -> &ReconcileRules {
        &self.rules
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// The sections whose geometry cannot be used for resolution.
    pub fn invalid_sections(&self) -> Vec<SectionId> {
        self.sections
            .iter()
            .filter_map(|s| match &s.geometry {
                Some(g) if geometry::validate(g).is_err() => Some(s.id),
                _ => None,
            })
            .collect()
    }

    /// Finds a section for every record that has a coordinate but no section.
    ///
    /// The output lists are in the same order as the input records.
    pub fn resolve_records(&self, records: &[SpatialRecord]) -> RecordResolution {
        info!("resolve_records: processing {} records", records.len());
        let outcomes = self.in_batches(records, |r| self.resolve_record(r));

        let mut res = RecordResolution::default();
        for (record, outcome) in records.iter().zip(outcomes) {
            match outcome {
                RecordOutcome::AlreadyAssigned => res.already_assigned += 1,
                RecordOutcome::WithoutPoint => res.without_point += 1,
                RecordOutcome::InvalidPoint => res.failed.push(record.id.clone()),
                RecordOutcome::Resolved(section_id) => res.assignments.push(SectionAssignment {
                    record_id: record.id.clone(),
                    section_id,
                }),
                RecordOutcome::Unresolved => res.unresolved.push(record.id.clone()),
            }
        }
        info!(
            "resolve_records: {} resolved, {} unresolved, {} failed",
            res.assignments.len(),
            res.unresolved.len(),
            res.failed.len()
        );
        res
    }

    fn resolve_record(&self, record: &SpatialRecord) -> RecordOutcome {
        if record.section_id.is_some() {
            return RecordOutcome::AlreadyAssigned;
        }
        match record.point {
            None => RecordOutcome::WithoutPoint,
            Some(p) if !p.is_finite() => {
                warn!("resolve_record: record {}: invalid point {:?}", record.id, p);
                RecordOutcome::InvalidPoint
            }
            Some(p) => match resolver::resolve(&p, &self.sections) {
                Resolution::Section(section_id) => RecordOutcome::Resolved(section_id),
                Resolution::Unresolved => RecordOutcome::Unresolved,
            },
        }
    }

    /// Computes the alliance totals and the competitiveness of every row, and the
    /// summary of every district.
    pub fn analyze_rows(&self, rows: &[ElectoralRow]) -> RowAnalysis {
        info!("analyze_rows: processing {} rows", rows.len());
        let sections = self.in_batches(rows, |row| self.analyze_row(row));

        // Integer sums: the grouping order does not change the totals.
        let mut districts: BTreeMap<DistrictId, DistrictSummary> = BTreeMap::new();
        for sa in sections.iter() {
            let d = districts
                .entry(sa.district_id)
                .or_insert_with(|| DistrictSummary {
                    district_id: sa.district_id,
                    sections: 0,
                    total_votes: 0,
                    alliance_totals: AllianceTotals::new(),
                    swing_sections: Vec::new(),
                });
            d.sections += 1;
            d.total_votes += sa.total_votes;
            coalition::add_totals(&mut d.alliance_totals, &sa.alliance_totals);
            if sa.competitiveness.is_swing {
                d.swing_sections.push(sa.section_id);
            }
        }
        for d in districts.values() {
            debug!(
                "analyze_rows: district {}: {} sections, {} swing",
                d.district_id,
                d.sections,
                d.swing_sections.len()
            );
        }
        RowAnalysis {
            sections,
            districts: districts.into_values().collect(),
        }
    }

    fn analyze_row(&self, row: &ElectoralRow) -> SectionAnalysis {
        SectionAnalysis {
            section_id: row.section_id,
            district_id: row.district_id,
            total_votes: row.total_votes,
            alliance_totals: coalition::aggregate(row, &self.rules.alliances),
            competitiveness: competitiveness::analyze(
                row,
                &self.rules.tracked_parties,
                self.rules.swing_threshold_percent,
            ),
        }
    }

    /// Resolves the records and analyzes the rows.
    pub fn run(&self, records: &[SpatialRecord], rows: &[ElectoralRow]) -> ReconciliationSummary {
        let invalid_sections = self.invalid_sections();
        for sid in invalid_sections.iter() {
            warn!("run: section {} has an invalid geometry", sid);
        }
        let rr = self.resolve_records(records);
        let ra = self.analyze_rows(rows);

        let tally = ReconciliationTally {
            resolved: rr.assignments.len() as u64,
            unresolved: rr.unresolved.len() as u64,
            failed: rr.failed.len() as u64,
            already_assigned: rr.already_assigned,
            without_point: rr.without_point,
            rows_analyzed: ra.sections.len() as u64,
            swing_sections: ra
                .sections
                .iter()
                .filter(|sa| sa.competitiveness.is_swing)
                .count() as u64,
        };
        info!("run: tally {:?}", tally);
        ReconciliationSummary {
            assignments: rr.assignments,
            unresolved_records: rr.unresolved,
            failed_records: rr.failed,
            invalid_sections,
            section_analyses: ra.sections,
            districts: ra.districts,
            tally,
        }
    }

    // Applies f to every item, batch by batch. The results are in input order.
    fn in_batches<T, R, F>(&self, items: &[T], f: F) -> Vec<R>
    where
        T: Sync,
        R: Send,
        F: Fn(&T) -> R + Sync + Send,
    {
        let batch_size = self.rules.batch_size;
        let work = || -> Vec<R> {
            let batches: Vec<Vec<R>> = items
                .par_chunks(batch_size)
                .map(|chunk| chunk.iter().map(&f).collect())
                .collect();
            batches.into_iter().flatten().collect()
        };
        if self.rules.parallelism == 0 {
            return work();
        }
        match rayon::ThreadPoolBuilder::new()
            .num_threads(self.rules.parallelism)
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(e) => {
                warn!("in_batches: cannot start {} workers: {}", self.rules.parallelism, e);
                items.iter().map(&f).collect()
            }
        }
    }
}

fn check_rules(rules: &ReconcileRules) -> Result<(), ReconcileErrors> {
    if !rules.swing_threshold_percent.is_finite() || rules.swing_threshold_percent < 0.0 {
        return Err(ReconcileErrors::InvalidThreshold(
            rules.swing_threshold_percent,
        ));
    }
    if rules.batch_size == 0 {
        return Err(ReconcileErrors::InvalidBatchSize);
    }
    let mut names: HashSet<&str> = HashSet::new();
    for a in rules.alliances.iter() {
        if !names.insert(a.name.as_str()) {
            return Err(ReconcileErrors::DuplicateAlliance(a.name.clone()));
        }
    }
    Ok(())
}

/// Runs a full reconciliation with the given rules.
///
/// Arguments:
/// * `sections` the sections, in resolution order
/// * `records` the leaders and log entries to locate
/// * `rows` the vote tallies to analyze
/// * `rules` the alliances, the tracked parties and the batching options
pub fn run_reconciliation(
    sections: Vec<Section>,
    records: &[SpatialRecord],
    rows: &[ElectoralRow],
    rules: &ReconcileRules,
) -> Result<ReconciliationSummary, ReconcileErrors> {
    let reconciler = Reconciler::new(rules, sections)?;
    Ok(reconciler.run(records, rows))
}
