//! Cleaner - turns raw rows into validated sales records
//!
//! Rows are checked in a fixed order: missing fields, date, quantity,
//! unit price, product. The first failing rule drops the row. Dropped rows
//! are counted, never reported as errors.

use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::{CleanedRecordSet, RawRecord, RawRecordSet, SalesRecord};

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d/%m/%Y",
    "%m-%d-%Y",
    "%d-%m-%Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Why a row was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Rejection {
    MissingField,
    InvalidDate,
    InvalidQuantity,
    InvalidPrice,
    EmptyProduct,
}

#[derive(Debug, Default)]
struct RejectionCounts {
    missing_field: usize,
    invalid_date: usize,
    invalid_quantity: usize,
    invalid_price: usize,
    empty_product: usize,
}

impl RejectionCounts {
    fn add(&mut self, rejection: Rejection) {
        match rejection {
            Rejection::MissingField => self.missing_field += 1,
            Rejection::InvalidDate => self.invalid_date += 1,
            Rejection::InvalidQuantity => self.invalid_quantity += 1,
            Rejection::InvalidPrice => self.invalid_price += 1,
            Rejection::EmptyProduct => self.empty_product += 1,
        }
    }
}

/// Clean a raw record set into a new cleaned set. The input is not changed.
pub fn clean(raw: &RawRecordSet) -> CleanedRecordSet {
    let mut counts = RejectionCounts::default();
    let mut records = Vec::with_capacity(raw.len());

    for row in &raw.records {
        match clean_row(row) {
            Ok(record) => records.push(record),
            Err(rejection) => counts.add(rejection),
        }
    }

    let cleaned = CleanedRecordSet::new(records, raw.len());

    tracing::info!(
        input_rows = cleaned.input_rows,
        kept = cleaned.len(),
        removed = cleaned.removed,
        "rows removed during cleaning: {}",
        cleaned.removed
    );
    tracing::debug!(
        missing_field = counts.missing_field,
        invalid_date = counts.invalid_date,
        invalid_quantity = counts.invalid_quantity,
        invalid_price = counts.invalid_price,
        empty_product = counts.empty_product,
        "rejections by rule"
    );

    cleaned
}

fn clean_row(row: &RawRecord) -> Result<SalesRecord, Rejection> {
    let (Some(date), Some(product), Some(quantity), Some(unit_price)) = (
        row.date.as_deref(),
        row.product.as_deref(),
        row.quantity.as_deref(),
        row.unit_price.as_deref(),
    ) else {
        return Err(Rejection::MissingField);
    };

    let date = parse_date(date).ok_or(Rejection::InvalidDate)?;

    let quantity = parse_quantity(quantity)
        .filter(|q| *q > 0)
        .ok_or(Rejection::InvalidQuantity)?;

    let unit_price = parse_decimal(unit_price)
        .filter(|p| *p > Decimal::ZERO)
        .ok_or(Rejection::InvalidPrice)?;

    if product.trim().is_empty() {
        return Err(Rejection::EmptyProduct);
    }

    // Every rule above holds, so only an overflowing total can fail here
    SalesRecord::new(date, product, quantity, unit_price).ok_or(Rejection::InvalidPrice)
}

/// Parse a calendar date; datetimes keep only their date part
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .or_else(|| {
            chrono::DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

/// Whole numbers only; "10.0" is accepted as 10, "10.5" is not
fn parse_quantity(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(q) = s.parse::<i64>() {
        return Some(q);
    }
    let d = parse_decimal(s)?;
    if d.fract().is_zero() {
        d.to_i64()
    } else {
        None
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    Decimal::from_str(s)
        .or_else(|_| Decimal::from_scientific(s))
        .ok()
}
