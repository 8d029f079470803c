// ********* Input data structures ***********

use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::Display;

pub type SectionId = u32;
pub type DistrictId = u32;

/// A geographic coordinate in degrees (WGS84 assumed).
///
/// The containment engine reads `lon` as the x axis and `lat` as the y axis.
#[derive(PartialEq, Debug, Clone, Copy)]
pub struct Point {
    pub lon: f64,
    pub lat: f64,
}

impl Point {
    pub fn new(lon: f64, lat: f64) -> Point {
        Point { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

/// A closed sequence of points: the first point is repeated at the end.
pub type Ring = Vec<Point>;

/// The boundary of a section.
///
/// Only the first ring of every polygon is used as its boundary. Holes (rings after
/// the first one) are kept in the structure but never subtracted from the area.
#[derive(PartialEq, Debug, Clone)]
pub enum Geometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

/// Vote counts indexed by column name (a party or a party combination).
///
/// Absent columns read as zero.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct VoteColumns(BTreeMap<String, u64>);

impl VoteColumns {
    pub fn new() -> VoteColumns {
        VoteColumns(BTreeMap::new())
    }

    pub fn get(&self, column: &str) -> u64 {
        self.0.get(column).cloned().unwrap_or(0)
    }

    pub fn contains(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn insert(&mut self, column: &str, count: u64) {
        self.0.insert(column.to_string(), count);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &u64)> {
        self.0.iter()
    }
}

impl FromIterator<(String, u64)> for VoteColumns {
    fn from_iter<I: IntoIterator<Item = (String, u64)>>(iter: I) -> Self {
        VoteColumns(iter.into_iter().collect())
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Section {
    pub id: SectionId,
    pub district_id: DistrictId,
    pub municipality: String,
    pub geometry: Option<Geometry>,
    /// Raw per-party vote counts attached to the section.
    pub metadata: VoteColumns,
}

impl Section {
    /// The electoral row carried by the metadata of this section.
    ///
    /// `total_column` names the column holding the number of votes cast.
    pub fn electoral_row(&self, total_column: &str) -> ElectoralRow {
        let votes: VoteColumns = self
            .metadata
            .iter()
            .filter(|(name, _)| name.as_str() != total_column)
            .map(|(name, count)| (name.clone(), *count))
            .collect();
        ElectoralRow {
            section_id: self.id,
            district_id: self.district_id,
            votes,
            total_votes: self.metadata.get(total_column),
        }
    }
}

/// A named coalition: the joint-ticket columns summed into one total.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AllianceDefinition {
    pub name: String,
    pub columns: Vec<String>,
}

impl AllianceDefinition {
    pub fn new(name: &str, columns: &[&str]) -> AllianceDefinition {
        AllianceDefinition {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// The vote tallies of one section.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectoralRow {
    pub section_id: SectionId,
    pub district_id: DistrictId,
    pub votes: VoteColumns,
    pub total_votes: u64,
}

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum RecordKind {
    Leader,
    LogEntry,
}

/// A person or an event located on the map.
///
/// Records are created upstream with a coordinate and possibly no section. The
/// reconciliation fills in the missing section.
#[derive(PartialEq, Debug, Clone)]
pub struct SpatialRecord {
    pub id: String,
    pub kind: RecordKind,
    pub point: Option<Point>,
    pub section_id: Option<SectionId>,
}

// ******** Output data structures *********

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum Resolution {
    Section(SectionId),
    /// No section contains the point.
    Unresolved,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SectionAssignment {
    pub record_id: String,
    pub section_id: SectionId,
}

pub type AllianceTotals = BTreeMap<String, u64>;

#[derive(PartialEq, Debug, Clone)]
pub struct Competitiveness {
    pub winner: Option<String>,
    pub winner_votes: u64,
    pub runner_up: Option<String>,
    pub runner_up_votes: u64,
    pub margin: u64,
    /// Rounded half-up to one decimal.
    pub margin_percent: f64,
    pub is_swing: bool,
}

/// The computed metadata of one section.
#[derive(PartialEq, Debug, Clone)]
pub struct SectionAnalysis {
    pub section_id: SectionId,
    pub district_id: DistrictId,
    pub total_votes: u64,
    pub alliance_totals: AllianceTotals,
    pub competitiveness: Competitiveness,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct DistrictSummary {
    pub district_id: DistrictId,
    pub sections: u32,
    pub total_votes: u64,
    pub alliance_totals: AllianceTotals,
    pub swing_sections: Vec<SectionId>,
}

#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct ReconciliationTally {
    pub resolved: u64,
    pub unresolved: u64,
    /// Records with a coordinate that cannot be used (not a finite number).
    pub failed: u64,
    pub already_assigned: u64,
    pub without_point: u64,
    pub rows_analyzed: u64,
    pub swing_sections: u64,
}

#[derive(PartialEq, Debug, Clone)]
pub struct ReconciliationSummary {
    pub assignments: Vec<SectionAssignment>,
    pub unresolved_records: Vec<String>,
    pub failed_records: Vec<String>,
    pub invalid_sections: Vec<SectionId>,
    pub section_analyses: Vec<SectionAnalysis>,
    pub districts: Vec<DistrictSummary>,
    pub tally: ReconciliationTally,
}

/// Errors that prevent a reconciliation from starting.
///
/// Once started, a reconciliation always completes.
#[derive(PartialEq, Debug, Clone)]
pub enum ReconcileErrors {
    DuplicateSection(SectionId),
    DuplicateAlliance(String),
    InvalidThreshold(f64),
    InvalidBatchSize,
}

impl Error for ReconcileErrors {}

impl Display for ReconcileErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileErrors::DuplicateSection(id) => {
                write!(f, "section {} appears more than once", id)
            }
            ReconcileErrors::DuplicateAlliance(name) => {
                write!(f, "alliance {:?} is defined more than once", name)
            }
            ReconcileErrors::InvalidThreshold(t) => {
                write!(f, "swing threshold must be a non-negative number, got {}", t)
            }
            ReconcileErrors::InvalidBatchSize => write!(f, "batch size must be at least 1"),
        }
    }
}

// ********* Configuration **********

#[derive(PartialEq, Debug, Clone)]
pub struct ReconcileRules {
    pub alliances: Vec<AllianceDefinition>,
    /// Solo party columns compared by the competitiveness analysis, in tiebreak order.
    pub tracked_parties: Vec<String>,
    pub swing_threshold_percent: f64,
    pub batch_size: usize,
    /// Number of worker threads. 0 lets rayon decide.
    pub parallelism: usize,
}

impl ReconcileRules {
    pub const DEFAULT_SWING_THRESHOLD: f64 = 15.0;

    pub const DEFAULT_RULES: ReconcileRules = ReconcileRules {
        alliances: Vec::new(),
        tracked_parties: Vec::new(),
        swing_threshold_percent: ReconcileRules::DEFAULT_SWING_THRESHOLD,
        batch_size: 500,
        parallelism: 0,
    };
}

impl Default for ReconcileRules {
    fn default() -> Self {
        ReconcileRules::DEFAULT_RULES
    }
}
