//! Sales record domain model

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tabular format a record set was read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Excel,
}

impl SourceFormat {
    /// Pick the format from a file extension (case-insensitive)
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "csv" => Some(SourceFormat::Csv),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(SourceFormat::Excel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SourceFormat::Csv => "csv",
            SourceFormat::Excel => "excel",
        }
    }
}

/// One source row before validation. Empty cells are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RawRecord {
    /// 1-based data row number in the source (header excluded)
    pub row: usize,
    pub date: Option<String>,
    pub product: Option<String>,
    pub quantity: Option<String>,
    pub unit_price: Option<String>,
}

impl RawRecord {
    /// True when any of the four fields is missing
    pub fn has_missing_field(&self) -> bool {
        self.date.is_none()
            || self.product.is_none()
            || self.quantity.is_none()
            || self.unit_price.is_none()
    }
}

/// Structurally parsed source file
#[derive(Debug, Clone, Serialize)]
pub struct RawRecordSet {
    pub source: PathBuf,
    pub format: SourceFormat,
    pub records: Vec<RawRecord>,
}

impl RawRecordSet {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A validated sale. Construct with [`SalesRecord::new`], which enforces
/// positive quantity and price and a non-empty product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SalesRecord {
    date: NaiveDate,
    product: String,
    quantity: i64,
    unit_price: Decimal,
    total: Decimal,
}

impl SalesRecord {
    /// Build a record, computing `total`. Returns `None` if any rule fails.
    pub fn new(date: NaiveDate, product: &str, quantity: i64, unit_price: Decimal) -> Option<Self> {
        let product = product.trim();
        if product.is_empty() || quantity <= 0 || unit_price <= Decimal::ZERO {
            return None;
        }
        let total = Decimal::from(quantity).checked_mul(unit_price)?;
        Some(Self {
            date,
            product: product.to_string(),
            quantity,
            unit_price,
            total,
        })
    }

    /// Skips validation so store tests can push rows the schema rejects
    #[cfg(test)]
    pub(crate) fn new_unchecked(
        date: NaiveDate,
        product: &str,
        quantity: i64,
        unit_price: Decimal,
    ) -> Self {
        Self {
            date,
            product: product.to_string(),
            quantity,
            unit_price,
            total: Decimal::from(quantity) * unit_price,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn product(&self) -> &str {
        &self.product
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn year_month(&self) -> YearMonth {
        YearMonth::from_date(self.date)
    }

    /// Render back into raw form (used to re-clean or re-export)
    pub fn to_raw(&self, row: usize) -> RawRecord {
        RawRecord {
            row,
            date: Some(self.date.format("%Y-%m-%d").to_string()),
            product: Some(self.product.clone()),
            quantity: Some(self.quantity.to_string()),
            unit_price: Some(self.unit_price.to_string()),
        }
    }
}

/// Output of the cleaner
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanedRecordSet {
    records: Vec<SalesRecord>,
    /// Rows in the input set
    pub input_rows: usize,
    /// Rows dropped by validation
    pub removed: usize,
}

impl CleanedRecordSet {
    pub fn new(records: Vec<SalesRecord>, input_rows: usize) -> Self {
        let removed = input_rows.saturating_sub(records.len());
        Self {
            records,
            input_rows,
            removed,
        }
    }

    pub fn records(&self) -> &[SalesRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Convert back into a raw set so it can be cleaned again
    pub fn to_raw(&self, source: PathBuf, format: SourceFormat) -> RawRecordSet {
        RawRecordSet {
            source,
            format,
            records: self
                .records
                .iter()
                .enumerate()
                .map(|(i, r)| r.to_raw(i + 1))
                .collect(),
        }
    }
}

/// Calendar year and month, the grouping key for monthly revenue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn from_date(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for YearMonth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| format!("invalid year-month: {}", s))?;
        let year: i32 = year.parse().map_err(|_| format!("invalid year: {}", s))?;
        let month: u32 = month.parse().map_err(|_| format!("invalid month: {}", s))?;
        YearMonth::new(year, month).ok_or_else(|| format!("month out of range: {}", s))
    }
}

impl Serialize for YearMonth {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_total_is_quantity_times_price() {
        let r = SalesRecord::new(date(2024, 1, 1), "ProductoA", 10, Decimal::new(1000, 1)).unwrap();
        assert_eq!(r.total(), Decimal::from(1000));
        assert_eq!(r.year_month().to_string(), "2024-01");
    }

    #[test]
    fn test_invalid_records_rejected() {
        let d = date(2024, 1, 1);
        assert!(SalesRecord::new(d, "A", 0, Decimal::ONE).is_none());
        assert!(SalesRecord::new(d, "A", -5, Decimal::ONE).is_none());
        assert!(SalesRecord::new(d, "A", 1, Decimal::ZERO).is_none());
        assert!(SalesRecord::new(d, "   ", 1, Decimal::ONE).is_none());
    }

    #[test]
    fn test_product_is_trimmed() {
        let r = SalesRecord::new(date(2024, 1, 1), "  Widget ", 1, Decimal::ONE).unwrap();
        assert_eq!(r.product(), "Widget");
    }

    #[test]
    fn test_year_month_parse_and_order() {
        let jan: YearMonth = "2024-01".parse().unwrap();
        let dec: YearMonth = "2023-12".parse().unwrap();
        assert!(dec < jan);
        assert!("2024-13".parse::<YearMonth>().is_err());
        assert!("202401".parse::<YearMonth>().is_err());
    }

    #[test]
    fn test_source_format_from_extension() {
        assert_eq!(SourceFormat::from_extension("CSV"), Some(SourceFormat::Csv));
        assert_eq!(SourceFormat::from_extension("xlsx"), Some(SourceFormat::Excel));
        assert_eq!(SourceFormat::from_extension("txt"), None);
    }
}
