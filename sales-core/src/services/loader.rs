//! Record loader - reads a tabular source into raw records
//!
//! The file extension picks the reader. Columns are located by header name,
//! either from explicit mappings or detected from common English and
//! Spanish names. Nothing is validated here; that is the cleaner's job.

use std::path::Path;

use serde::Serialize;

use crate::adapters::csv::CsvSource;
use crate::adapters::excel::ExcelSource;
use crate::config::ColumnMappings;
use crate::domain::result::{Error, Result};
use crate::domain::{RawRecord, RawRecordSet, SourceFormat};
use crate::ports::{RawTable, TabularSource};

const DATE_PATTERNS: &[&str] = &["date", "fecha", "day", "dia"];
const PRODUCT_PATTERNS: &[&str] = &["product", "producto", "item", "articulo", "sku"];
const QUANTITY_PATTERNS: &[&str] = &["quantity", "cantidad", "qty", "units", "unidades"];
const PRICE_PATTERNS: &[&str] = &[
    "unit_price",
    "precio_unitario",
    "unit price",
    "precio unitario",
    "price",
    "precio",
];

/// Pick the reader for a path from its extension
pub fn source_for(path: &Path) -> Result<Box<dyn TabularSource>> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| Error::load(path, "file has no extension"))?;

    match SourceFormat::from_extension(ext) {
        Some(SourceFormat::Csv) => Ok(Box::new(CsvSource)),
        Some(SourceFormat::Excel) => Ok(Box::new(ExcelSource)),
        None => Err(Error::load(
            path,
            format!("unsupported file type '.{}' (expected csv, xlsx, xlsm, xls or ods)", ext),
        )),
    }
}

/// Guess column mappings from header names
///
/// Exact (case-insensitive) matches win over substring matches, and a header
/// is never used for two fields.
pub fn detect_columns(headers: &[String]) -> Option<ColumnMappings> {
    let mut taken: Vec<usize> = Vec::new();

    // Price first: "precio_unitario" must not be claimed by a looser pattern
    let unit_price = find_header(headers, PRICE_PATTERNS, &mut taken)?;
    let date = find_header(headers, DATE_PATTERNS, &mut taken)?;
    let product = find_header(headers, PRODUCT_PATTERNS, &mut taken)?;
    let quantity = find_header(headers, QUANTITY_PATTERNS, &mut taken)?;

    Some(ColumnMappings {
        date,
        product,
        quantity,
        unit_price,
    })
}

fn find_header(headers: &[String], patterns: &[&str], taken: &mut Vec<usize>) -> Option<String> {
    let normalized: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();

    let exact = patterns.iter().find_map(|p| {
        normalized
            .iter()
            .enumerate()
            .find(|(i, h)| !taken.contains(i) && h.as_str() == *p)
            .map(|(i, _)| i)
    });
    let index = exact.or_else(|| {
        patterns.iter().find_map(|p| {
            normalized
                .iter()
                .enumerate()
                .find(|(i, h)| !taken.contains(i) && h.contains(p))
                .map(|(i, _)| i)
        })
    })?;

    taken.push(index);
    Some(headers[index].trim().to_string())
}

/// Load raw records using explicit column mappings
pub fn load_records(path: &Path, mappings: &ColumnMappings) -> Result<RawRecordSet> {
    let source = source_for(path)?;
    let table = source.read_table(path)?;
    records_from_table(path, source.format(), &table, mappings)
}

/// Load raw records, detecting columns when no mappings are given
pub fn load_records_with(path: &Path, mappings: Option<&ColumnMappings>) -> Result<RawRecordSet> {
    let source = source_for(path)?;
    let table = source.read_table(path)?;

    let detected;
    let mappings = match mappings {
        Some(m) => m,
        None => {
            detected = detect_columns(&table.headers).ok_or_else(|| {
                Error::load(
                    path,
                    format!(
                        "could not detect date, product, quantity and unit price columns in header [{}]",
                        table.headers.join(", ")
                    ),
                )
            })?;
            &detected
        }
    };

    records_from_table(path, source.format(), &table, mappings)
}

fn records_from_table(
    path: &Path,
    format: SourceFormat,
    table: &RawTable,
    mappings: &ColumnMappings,
) -> Result<RawRecordSet> {
    let column = |name: &str| {
        table
            .column_index(name)
            .ok_or_else(|| Error::load(path, format!("missing column '{}'", name)))
    };
    let date = column(&mappings.date)?;
    let product = column(&mappings.product)?;
    let quantity = column(&mappings.quantity)?;
    let unit_price = column(&mappings.unit_price)?;

    let cell = |row: &[Option<String>], i: usize| row.get(i).cloned().flatten();

    let records = table
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| RawRecord {
            row: i + 1,
            date: cell(row, date),
            product: cell(row, product),
            quantity: cell(row, quantity),
            unit_price: cell(row, unit_price),
        })
        .collect::<Vec<_>>();

    tracing::debug!(path = %path.display(), rows = records.len(), "loaded raw records");

    Ok(RawRecordSet {
        source: path.to_path_buf(),
        format,
        records,
    })
}

/// First rows of a source, as read
#[derive(Debug, Clone, Serialize)]
pub struct Preview {
    pub format: SourceFormat,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Option<String>>>,
    pub total_rows: usize,
    /// Mappings detected from the header, if any
    pub detected_columns: Option<ColumnMappings>,
}

/// Header and first `limit` rows, without mapping or validation
pub fn preview(path: &Path, limit: usize) -> Result<Preview> {
    let source = source_for(path)?;
    let table = source.read_table(path)?;
    let total_rows = table.rows.len();
    let detected_columns = detect_columns(&table.headers);

    Ok(Preview {
        format: source.format(),
        headers: table.headers,
        rows: table.rows.into_iter().take(limit).collect(),
        total_rows,
        detected_columns,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_detect_spanish_columns() {
        let mappings =
            detect_columns(&headers(&["fecha", "producto", "cantidad", "precio_unitario"])).unwrap();
        assert_eq!(mappings.date, "fecha");
        assert_eq!(mappings.product, "producto");
        assert_eq!(mappings.quantity, "cantidad");
        assert_eq!(mappings.unit_price, "precio_unitario");
    }

    #[test]
    fn test_detect_english_columns_any_case() {
        let mappings =
            detect_columns(&headers(&["Order Date", "Product Name", "Qty", "Unit Price", "Total"]))
                .unwrap();
        assert_eq!(mappings.date, "Order Date");
        assert_eq!(mappings.product, "Product Name");
        assert_eq!(mappings.quantity, "Qty");
        assert_eq!(mappings.unit_price, "Unit Price");
    }

    #[test]
    fn test_detect_fails_without_price() {
        assert!(detect_columns(&headers(&["date", "product", "quantity"])).is_none());
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.txt");
        std::fs::write(&path, "date,product\n").unwrap();
        assert!(matches!(source_for(&path), Err(Error::Load { .. })));
    }

    #[test]
    fn test_load_records_with_detection() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ventas.csv");
        std::fs::write(
            &path,
            "fecha,producto,cantidad,precio_unitario,notas\n\
             2024-01-01,ProductoA,10,100.0,x\n\
             2024-01-02,,5,200.0,\n",
        )
        .unwrap();

        let set = load_records_with(&path, None).unwrap();
        assert_eq!(set.format, SourceFormat::Csv);
        assert_eq!(set.len(), 2);
        assert_eq!(set.records[0].product.as_deref(), Some("ProductoA"));
        assert_eq!(set.records[1].row, 2);
        assert_eq!(set.records[1].product, None);
    }

    #[test]
    fn test_missing_mapped_column_is_load_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(&path, "date,product,quantity\n2024-01-01,A,1\n").unwrap();

        let err = load_records(&path, &ColumnMappings::default()).unwrap_err();
        assert!(matches!(err, Error::Load { .. }));
        assert!(err.to_string().contains("unit_price"));
    }

    #[test]
    fn test_preview_limits_rows() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("sales.csv");
        std::fs::write(
            &path,
            "date,product,quantity,unit_price\n2024-01-01,A,1,1\n2024-01-02,B,2,2\n2024-01-03,C,3,3\n",
        )
        .unwrap();

        let preview = preview(&path, 2).unwrap();
        assert_eq!(preview.rows.len(), 2);
        assert_eq!(preview.total_rows, 3);
        assert!(preview.detected_columns.is_some());
    }
}
