//! CSV tabular source and cleaned-data writer

use std::path::Path;

use crate::domain::result::{Error, Result};
use crate::domain::{CleanedRecordSet, SourceFormat};
use crate::ports::{RawTable, TabularSource};

/// Header written to the cleaned CSV file
pub const CLEAN_CSV_HEADER: [&str; 5] = ["date", "product", "quantity", "unit_price", "total"];

/// Reads comma-separated files with a header row
#[derive(Debug, Default, Clone, Copy)]
pub struct CsvSource;

impl TabularSource for CsvSource {
    fn format(&self) -> SourceFormat {
        SourceFormat::Csv
    }

    fn read_table(&self, path: &Path) -> Result<RawTable> {
        if !path.exists() {
            return Err(Error::load(path, "file not found"));
        }

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .from_path(path)
            .map_err(|e| Error::load(path, format!("failed to open CSV: {}", e)))?;

        let headers: Vec<String> = reader
            .headers()
            .map_err(|e| Error::load(path, format!("failed to read CSV header: {}", e)))?
            .iter()
            .map(|h| h.trim_start_matches('\u{feff}').trim().to_string())
            .collect();

        if headers.iter().all(|h| h.is_empty()) {
            return Err(Error::load(path, "missing header row"));
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| Error::load(path, format!("malformed CSV: {}", e)))?;
            rows.push(
                record
                    .iter()
                    .map(|cell| if cell.is_empty() { None } else { Some(cell.to_string()) })
                    .collect(),
            );
        }

        Ok(RawTable { headers, rows })
    }
}

/// Write cleaned records with their computed total
pub fn write_cleaned_csv(cleaned: &CleanedRecordSet, path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| Error::export(format!("failed to create {}: {}", path.display(), e)))?;

    writer
        .write_record(CLEAN_CSV_HEADER)
        .map_err(|e| Error::export(e.to_string()))?;

    for record in cleaned.records() {
        writer
            .write_record([
                record.date().format("%Y-%m-%d").to_string(),
                record.product().to_string(),
                record.quantity().to_string(),
                record.unit_price().to_string(),
                record.total().to_string(),
            ])
            .map_err(|e| Error::export(e.to_string()))?;
    }

    writer.flush()?;
    Ok(())
}
