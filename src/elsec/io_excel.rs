// Reading the vote tallies from an Excel workbook.

use calamine::{open_workbook, DataType, Reader, Xlsx};
use snafu::prelude::*;

use crate::elsec::config_reader::ElectoralSource;
use crate::elsec::io_common::RowLayout;
use crate::elsec::*;

fn get_range(path: &str, source: &ElectoralSource) -> ElsecResult<calamine::Range<DataType>> {
    let worksheet_name_o = source.excel_worksheet_name.clone();
    debug!(
        "get_range: path: {:?} worksheet: {:?}",
        path, &worksheet_name_o
    );
    let mut workbook: Xlsx<_> = open_workbook(path).context(OpeningExcelSnafu { path })?;

    if let Some(worksheet_name) = worksheet_name_o {
        let wrange = workbook
            .worksheet_range(&worksheet_name)
            .context(EmptyExcelSnafu { path })?
            .context(OpeningExcelSnafu { path })?;
        Ok(wrange)
    } else {
        let mut all_worksheets = workbook.worksheets();
        match all_worksheets.len() {
            0 => EmptyExcelSnafu { path }.fail(),
            1 => {
                let (worksheet_name, wrange) = all_worksheets.remove(0);
                debug!("get_range: using worksheet {:?}", worksheet_name);
                Ok(wrange)
            }
            _ => {
                let names: Vec<String> = all_worksheets.into_iter().map(|(n, _)| n).collect();
                whatever!(
                    "{} has several worksheets ({:?}), set excelWorksheetName to pick one",
                    path,
                    names
                )
            }
        }
    }
}

fn read_cell(cell: &DataType, lineno: usize) -> ElsecResult<String> {
    match cell {
        DataType::String(s) => Ok(s.clone()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Float(f) if f.fract() == 0.0 => Ok(format!("{}", *f as i64)),
        DataType::Float(f) => Ok(f.to_string()),
        DataType::Empty => Ok(String::new()),
        x => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", x),
        }
        .fail(),
    }
}

/// Reads a worksheet laid out like the CSV tally files: one header row, then one row per section.
pub fn read_excel_rows(path: &str, source: &ElectoralSource) -> ElsecResult<Vec<ParsedRow>> {
    let wrange = get_range(path, source)?;
    let mut rows = wrange.rows();

    let header_cells = rows.next().context(EmptyExcelSnafu { path })?;
    let header: Vec<String> = header_cells
        .iter()
        .map(|c| read_cell(c, 1))
        .collect::<ElsecResult<Vec<String>>>()?;
    debug!("read_excel_rows: header: {:?}", header);
    let layout = RowLayout::from_header(&header, source, path)?;

    let mut res: Vec<ParsedRow> = Vec::new();
    for (idx, row) in rows.enumerate() {
        // The header is on the first line.
        let lineno = idx + 2;
        let cells: Vec<String> = row
            .iter()
            .map(|c| read_cell(c, lineno))
            .collect::<ElsecResult<Vec<String>>>()?;
        if cells.iter().all(|c| c.trim().is_empty()) {
            debug!("read_excel_rows: skipping empty line {}", lineno);
            continue;
        }
        res.push(layout.parse(&cells, lineno)?);
    }
    info!("read_excel_rows: {} rows from {}", res.len(), path);
    Ok(res)
}
