// Primitives for reading CSV files.

use std::fs::File;

use csv::{ReaderBuilder, StringRecord, StringRecordsIntoIter};
use snafu::prelude::*;

use crate::elsec::config_reader::{ElectoralSource, RecordSource};
use crate::elsec::io_common::{make_default_id, parse_section_id, RowLayout};
use crate::elsec::*;

fn get_records(path: &str) -> ElsecResult<(Vec<String>, StringRecordsIntoIter<File>)> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .context(CsvOpenSnafu { path })?;
    let header: Vec<String> = rdr
        .headers()
        .context(CsvOpenSnafu { path })?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    debug!("get_records: {}: header {:?}", path, header);
    Ok((header, rdr.into_records()))
}

// The header is on the first line.
fn line_number(line: &StringRecord, idx: usize) -> usize {
    line.position()
        .map(|p| p.line() as usize)
        .unwrap_or(idx + 2)
}

pub fn read_csv_rows(path: &str, source: &ElectoralSource) -> ElsecResult<Vec<ParsedRow>> {
    let (header, records) = get_records(path)?;
    let layout = RowLayout::from_header(&header, source, path)?;

    let mut res: Vec<ParsedRow> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        let line = line_r.context(CsvLineParseSnafu { lineno: idx + 2 })?;
        let lineno = line_number(&line, idx);
        let cells: Vec<String> = line.iter().map(|s| s.to_string()).collect();
        let row = layout.parse(&cells, lineno)?;
        debug!("read_csv_rows: lineno: {:?} row: {:?}", lineno, row);
        res.push(row);
    }
    info!("read_csv_rows: {} rows from {}", res.len(), path);
    Ok(res)
}

fn column_index(header: &[String], path: &str, column: &str) -> ElsecResult<usize> {
    header
        .iter()
        .position(|h| h == column)
        .context(MissingColumnSnafu { path, column })
}

fn parse_coordinate(cell: &str, lineno: usize, column: &str) -> ElsecResult<Option<f64>> {
    let s = cell.trim();
    if s.is_empty() {
        return Ok(None);
    }
    let x = s
        .parse::<f64>()
        .ok()
        .context(BadNumberSnafu {
            lineno,
            column,
            value: s,
        })?;
    Ok(Some(x))
}

/// Reads located records. The id and the section columns are optional.
///
/// A record with a blank section has no section yet. A record with a blank coordinate
/// has no point.
pub fn read_csv_records(path: &str, source: &RecordSource) -> ElsecResult<Vec<SpatialRecord>> {
    let kind = source.record_kind()?;
    let default_id = make_default_id(path);
    let (header, records) = get_records(path)?;

    let id_idx_o = header.iter().position(|h| h == source.id_column());
    let section_idx_o = header.iter().position(|h| h == source.section_column());
    let lon_idx = column_index(&header, path, source.longitude_column())?;
    let lat_idx = column_index(&header, path, source.latitude_column())?;

    let mut res: Vec<SpatialRecord> = Vec::new();
    for (idx, line_r) in records.enumerate() {
        let line = line_r.context(CsvLineParseSnafu { lineno: idx + 2 })?;
        let lineno = line_number(&line, idx);
        let cell = |i: usize| line.get(i).unwrap_or("");

        let id = match id_idx_o.map(cell) {
            Some(s) if !s.trim().is_empty() => s.trim().to_string(),
            _ => default_id(lineno),
        };

        let section_id = match section_idx_o.map(cell) {
            Some(s) if !s.trim().is_empty() => {
                Some(parse_section_id(s).context(BadNumberSnafu {
                    lineno,
                    column: source.section_column(),
                    value: s,
                })?)
            }
            _ => None,
        };

        let lon = parse_coordinate(cell(lon_idx), lineno, source.longitude_column())?;
        let lat = parse_coordinate(cell(lat_idx), lineno, source.latitude_column())?;
        let point = match (lon, lat) {
            (Some(lon), Some(lat)) => Some(Point::new(lon, lat)),
            (None, None) => None,
            _ => {
                warn!(
                    "read_csv_records: {}: line {}: only one coordinate, the record has no point",
                    path, lineno
                );
                None
            }
        };

        let record = SpatialRecord {
            id,
            kind,
            point,
            section_id,
        };
        debug!("read_csv_records: lineno: {:?} record: {:?}", lineno, record);
        res.push(record);
    }
    info!("read_csv_records: {} records from {}", res.len(), path);
    Ok(res)
}
