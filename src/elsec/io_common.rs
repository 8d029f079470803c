// Helpers shared by the readers of tabular files (CSV and Excel).

use std::path::Path;

use crate::elsec::config_reader::ElectoralSource;
use crate::elsec::*;

pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Makes up an identifier for records that do not have one.
pub fn make_default_id(path: &str) -> impl Fn(usize) -> String {
    let simplified_name = simplify_file_name(path);
    move |lineno| format!("{}-{:08}", simplified_name, lineno)
}

/// Reads a vote count. A blank cell counts as zero.
pub fn parse_count(cell: &str) -> Option<u64> {
    let s = cell.trim();
    if s.is_empty() {
        return Some(0);
    }
    if let Ok(n) = s.parse::<u64>() {
        return Some(n);
    }
    // Spreadsheets export integers as "12.0".
    match s.parse::<f64>() {
        Ok(x) if x >= 0.0 && x.fract() == 0.0 && x <= u64::MAX as f64 => Some(x as u64),
        _ => None,
    }
}

pub fn parse_section_id(cell: &str) -> Option<SectionId> {
    match parse_count(cell) {
        Some(n) if !cell.trim().is_empty() => SectionId::try_from(n).ok(),
        _ => None,
    }
}

/// The positions of the significant columns of a tally file.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RowLayout {
    section_idx: usize,
    district_idx: Option<usize>,
    total_idx: usize,
    vote_columns: Vec<(usize, String)>,
}

fn find_column(header: &[String], path: &str, column: &str) -> ElsecResult<usize> {
    header
        .iter()
        .position(|h| h.trim() == column)
        .context(MissingColumnSnafu { path, column })
}

impl RowLayout {
    /// Every column that is not the section, the district or the total is a vote column.
    pub fn from_header(
        header: &[String],
        source: &ElectoralSource,
        path: &str,
    ) -> ElsecResult<RowLayout> {
        let section_idx = find_column(header, path, source.section_column())?;
        let district_idx = match &source.district_column {
            Some(c) => Some(find_column(header, path, c)?),
            None => None,
        };
        let total_idx = find_column(header, path, source.total_votes_column())?;
        let vote_columns: Vec<(usize, String)> = header
            .iter()
            .enumerate()
            .filter(|(idx, h)| {
                *idx != section_idx
                    && Some(*idx) != district_idx
                    && *idx != total_idx
                    && !h.trim().is_empty()
            })
            .map(|(idx, h)| (idx, h.trim().to_string()))
            .collect();
        debug!("RowLayout::from_header: vote columns {:?}", vote_columns);
        Ok(RowLayout {
            section_idx,
            district_idx,
            total_idx,
            vote_columns,
        })
    }

    /// Reads one line. Missing cells at the end of a line are blank.
    pub fn parse(&self, cells: &[String], lineno: usize) -> ElsecResult<ParsedRow> {
        let cell = |idx: usize| cells.get(idx).map(|s| s.as_str()).unwrap_or("");
        let count = |idx: usize, column: &str| -> ElsecResult<u64> {
            parse_count(cell(idx)).context(BadCountSnafu {
                lineno,
                column,
                value: cell(idx),
            })
        };

        let section_s = cell(self.section_idx);
        if section_s.trim().is_empty() {
            return MissingSectionSnafu { lineno }.fail();
        }
        let section_id = parse_section_id(section_s).context(BadNumberSnafu {
            lineno,
            column: "section",
            value: section_s,
        })?;

        let district_id = match self.district_idx {
            Some(idx) if !cell(idx).trim().is_empty() => {
                Some(parse_section_id(cell(idx)).context(BadNumberSnafu {
                    lineno,
                    column: "district",
                    value: cell(idx),
                })?)
            }
            _ => None,
        };

        let mut votes = VoteColumns::new();
        for (idx, column) in self.vote_columns.iter() {
            votes.insert(column, count(*idx, column)?);
        }
        Ok(ParsedRow {
            section_id,
            district_id,
            votes,
            total_votes: count(self.total_idx, "total")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(l: &[&str]) -> Vec<String> {
        l.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn counts() {
        assert_eq!(parse_count(""), Some(0));
        assert_eq!(parse_count(" 12 "), Some(12));
        assert_eq!(parse_count("12.0"), Some(12));
        assert_eq!(parse_count("12.5"), None);
        assert_eq!(parse_count("-3"), None);
        assert_eq!(parse_count("many"), None);
        assert_eq!(parse_section_id(""), None);
        assert_eq!(parse_section_id("1204"), Some(1204));
    }

    #[test]
    fn default_ids() {
        let f = make_default_id("/data/leaders.csv");
        assert_eq!(f(3), "leaders-00000003");
    }

    #[test]
    fn layout_and_rows() {
        let mut source = ElectoralSource::new("csv", "r.csv");
        source.district_column = Some("district".to_string());
        let header = strings(&["section", "district", "PAN", "MORENA", "total"]);
        let layout = RowLayout::from_header(&header, &source, "r.csv").unwrap();

        let row = layout
            .parse(&strings(&["1204", "", "120", "", "301"]), 2)
            .unwrap();
        assert_eq!(row.section_id, 1204);
        assert_eq!(row.district_id, None);
        assert_eq!(row.votes.get("PAN"), 120);
        assert!(row.votes.contains("MORENA"));
        assert_eq!(row.votes.get("MORENA"), 0);
        assert_eq!(row.total_votes, 301);

        // Short line.
        let row = layout.parse(&strings(&["1205", "7", "88"]), 3).unwrap();
        assert_eq!(row.district_id, Some(7));
        assert_eq!(row.total_votes, 0);
    }

    #[test]
    fn bad_rows() {
        let source = ElectoralSource::new("csv", "r.csv");
        let header = strings(&["section", "PAN", "total"]);
        let layout = RowLayout::from_header(&header, &source, "r.csv").unwrap();
        assert!(matches!(
            layout.parse(&strings(&["", "1", "1"]), 4),
            Err(ElsecError::MissingSection { lineno: 4 })
        ));
        assert!(matches!(
            layout.parse(&strings(&["3", "x", "1"]), 5),
            Err(ElsecError::BadCount { lineno: 5, .. })
        ));

        let header = strings(&["seccion", "PAN", "total"]);
        assert!(RowLayout::from_header(&header, &source, "r.csv").is_err());
    }
}
