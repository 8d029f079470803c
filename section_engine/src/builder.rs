use std::collections::HashSet;

use crate::Reconciler;
pub use crate::config::*;

/// A builder for assembling a snapshot of sections, records and rows.
///
/// ```
/// pub use section_engine::builder::Builder;
/// pub use section_engine::{Geometry, Point, ReconcileRules, Section, VoteColumns};
/// # use section_engine::ReconcileErrors;
///
/// let square = vec![
///     Point::new(0.0, 0.0),
///     Point::new(0.0, 1.0),
///     Point::new(1.0, 1.0),
///     Point::new(1.0, 0.0),
///     Point::new(0.0, 0.0),
/// ];
/// let mut builder = Builder::new(&ReconcileRules::DEFAULT_RULES)?;
/// builder.add_section(Section {
///     id: 1,
///     district_id: 1,
///     municipality: "Centro".to_string(),
///     geometry: Some(Geometry::Polygon(vec![square])),
///     metadata: VoteColumns::new(),
/// })?;
/// builder.add_record_simple("leader-1", 0.5, 0.5)?;
///
/// let summary = builder.run()?;
/// assert_eq!(summary.assignments[0].section_id, 1);
///
/// # Ok::<(), ReconcileErrors>(())
/// ```
pub struct Builder {
    pub(crate) _rules: ReconcileRules,
    pub(crate) _sections: Vec<Section>,
    pub(crate) _section_ids: HashSet<SectionId>,
    pub(crate) _records: Vec<SpatialRecord>,
    pub(crate) _rows: Vec<ElectoralRow>,
}

impl Builder {
    pub fn new(rules: &ReconcileRules) -> Result<Builder, ReconcileErrors> {
        Ok(Builder {
            _rules: rules.clone(),
            _sections: Vec::new(),
            _section_ids: HashSet::new(),
            _records: Vec::new(),
            _rows: Vec::new(),
        })
    }

    /// Replaces the sections of the builder.
    pub fn sections(self, sections: &[Section]) -> Result<Builder, ReconcileErrors> {
        let mut b = Builder {
            _rules: self._rules,
            _sections: Vec::new(),
            _section_ids: HashSet::new(),
            _records: self._records,
            _rows: self._rows,
        };
        for s in sections {
            b.add_section(s.clone())?;
        }
        Ok(b)
    }

    /// Adds a section. The order of insertion is the order of resolution.
    pub fn add_section(&mut self, section: Section) -> Result<(), ReconcileErrors> {
        if !self._section_ids.insert(section.id) {
            return Err(ReconcileErrors::DuplicateSection(section.id));
        }
        self._sections.push(section);
        Ok(())
    }

    /// Adds a leader located at the given coordinate, without a section.
    ///
    /// It is the simplest use case for most cases.
    pub fn add_record_simple(
        &mut self,
        id: &str,
        lon: f64,
        lat: f64,
    ) -> Result<(), ReconcileErrors> {
        self.add_record(&SpatialRecord {
            id: id.to_string(),
            kind: RecordKind::Leader,
            point: Some(Point::new(lon, lat)),
            section_id: None,
        })
    }

    pub fn add_record(&mut self, record: &SpatialRecord) -> Result<(), ReconcileErrors> {
        self._records.push(record.clone());
        Ok(())
    }

    pub fn add_row(&mut self, row: &ElectoralRow) -> Result<(), ReconcileErrors> {
        self._rows.push(row.clone());
        Ok(())
    }

    /// Adds the rows carried by the metadata of the sections already added.
    ///
    /// total_column: the metadata column holding the number of votes cast.
    pub fn sections_electoral_rows(&mut self, total_column: &str) -> Result<(), ReconcileErrors> {
        let rows: Vec<ElectoralRow> = self
            ._sections
            .iter()
            .filter(|s| !s.metadata.is_empty())
            .map(|s| s.electoral_row(total_column))
            .collect();
        self._rows.extend(rows);
        Ok(())
    }

    pub fn build(
        self,
    ) -> Result<(Reconciler, Vec<SpatialRecord>, Vec<ElectoralRow>), ReconcileErrors> {
        let reconciler = Reconciler::new(&self._rules, self._sections)?;
        Ok((reconciler, self._records, self._rows))
    }

    pub fn run(self) -> Result<ReconciliationSummary, ReconcileErrors> {
        let (reconciler, records, rows) = self.build()?;
        Ok(reconciler.run(&records, &rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn section(id: u32, metadata: &[(&str, u64)]) -> Section {
        Section {
            id,
            district_id: 4,
            municipality: "Centro".to_string(),
            geometry: None,
            metadata: metadata.iter().map(|(c, n)| (c.to_string(), *n)).collect(),
        }
    }

    #[test]
    fn duplicate_sections_are_rejected() {
        let mut b = Builder::new(&ReconcileRules::DEFAULT_RULES).unwrap();
        b.add_section(section(1, &[])).unwrap();
        assert_eq!(
            b.add_section(section(1, &[])),
            Err(ReconcileErrors::DuplicateSection(1))
        );
        let b2 = Builder::new(&ReconcileRules::DEFAULT_RULES).unwrap();
        assert_eq!(
            b2.sections(&[section(2, &[]), section(2, &[])]).err(),
            Some(ReconcileErrors::DuplicateSection(2))
        );
    }

    #[test]
    fn rows_from_section_metadata() {
        let rules = ReconcileRules {
            tracked_parties: vec!["PAN".to_string(), "MORENA".to_string()],
            ..ReconcileRules::DEFAULT_RULES
        };
        let mut b = Builder::new(&rules)
            .unwrap()
            .sections(&[
                section(1, &[("PAN", 100), ("MORENA", 85), ("TOTAL_VOTES", 200)]),
                section(2, &[]),
            ])
            .unwrap();
        b.sections_electoral_rows("TOTAL_VOTES").unwrap();
        let summary = b.run().unwrap();
        assert_eq!(summary.section_analyses.len(), 1);
        let sa = &summary.section_analyses[0];
        assert_eq!(sa.total_votes, 200);
        assert_eq!(sa.competitiveness.margin_percent, 7.5);
        assert!(sa.competitiveness.is_swing);
        assert_eq!(summary.districts[0].district_id, 4);
    }

    #[test]
    fn records_without_sections_are_unresolved() {
        let mut b = Builder::new(&ReconcileRules::DEFAULT_RULES).unwrap();
        b.add_record_simple("log-1", 1.0, 1.0).unwrap();
        let summary = b.run().unwrap();
        assert_eq!(summary.unresolved_records, vec!["log-1".to_string()]);
        assert_eq!(summary.tally.unresolved, 1);
    }
}
