//! Excel workbook tabular source (xlsx, xlsm, xls, ods)

use std::path::Path;

use calamine::{open_workbook_auto, Data, DataType, Reader};

use crate::domain::result::{Error, Result};
use crate::domain::SourceFormat;
use crate::ports::{RawTable, TabularSource};

/// Reads the first worksheet of a workbook; its first row is the header
#[derive(Debug, Default, Clone, Copy)]
pub struct ExcelSource;

impl TabularSource for ExcelSource {
    fn format(&self) -> SourceFormat {
        SourceFormat::Excel
    }

    fn read_table(&self, path: &Path) -> Result<RawTable> {
        if !path.exists() {
            return Err(Error::load(path, "file not found"));
        }

        let mut workbook = open_workbook_auto(path)
            .map_err(|e| Error::load(path, format!("failed to open workbook: {}", e)))?;

        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| Error::load(path, "workbook has no worksheets"))?
            .map_err(|e| Error::load(path, format!("failed to read worksheet: {}", e)))?;

        let mut rows = range.rows();
        let headers: Vec<String> = rows
            .next()
            .ok_or_else(|| Error::load(path, "missing header row"))?
            .iter()
            .map(|cell| cell_to_string(cell).unwrap_or_default().trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(Error::load(path, "missing header row"));
        }

        let rows = rows
            .map(|row| row.iter().map(cell_to_string).collect::<Vec<_>>())
            // calamine pads the used range; fully blank rows are not data
            .filter(|row| row.iter().any(Option::is_some))
            .collect();

        Ok(RawTable { headers, rows })
    }
}

/// Convert a cell into the raw string the cleaner coerces later
fn cell_to_string(cell: &Data) -> Option<String> {
    match cell {
        Data::Empty | Data::Error(_) => None,
        Data::String(s) if s.is_empty() => None,
        Data::String(s) => Some(s.clone()),
        Data::Int(i) => Some(i.to_string()),
        Data::Float(f) => Some(format_float(*f)),
        Data::Bool(b) => Some(b.to_string()),
        Data::DateTime(_) | Data::DateTimeIso(_) => Some(
            cell.as_date()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| cell.to_string()),
        ),
        Data::DurationIso(s) => Some(s.clone()),
    }
}

/// Whole floats (how spreadsheets store integers) lose their fraction
fn format_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}
