//! Spreadsheet report writer
//!
//! Three sheets: `Data` (cleaned rows), `Summary` (overall figures) and
//! `Top Products` (products ranked by revenue).

use std::path::Path;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use umya_spreadsheet::{Spreadsheet, Worksheet};

use crate::adapters::csv::CLEAN_CSV_HEADER;
use crate::domain::result::{Error, Result};
use crate::domain::{AggregateResult, CleanedRecordSet};

pub const DATA_SHEET: &str = "Data";
pub const SUMMARY_SHEET: &str = "Summary";
pub const TOP_PRODUCTS_SHEET: &str = "Top Products";

/// Write the report workbook to `path`, replacing any existing file
pub fn write_report(
    path: &Path,
    cleaned: &CleanedRecordSet,
    aggregate: &AggregateResult,
) -> Result<()> {
    let mut book = umya_spreadsheet::new_file_empty_worksheet();

    write_data_sheet(new_sheet(&mut book, DATA_SHEET)?, cleaned);
    write_summary_sheet(new_sheet(&mut book, SUMMARY_SHEET)?, aggregate);
    write_top_products_sheet(new_sheet(&mut book, TOP_PRODUCTS_SHEET)?, aggregate);

    umya_spreadsheet::writer::xlsx::write(&book, path)
        .map_err(|e| Error::export(format!("failed to write {}: {}", path.display(), e)))?;

    tracing::debug!(path = %path.display(), rows = cleaned.len(), "wrote report workbook");
    Ok(())
}

fn new_sheet<'a>(book: &'a mut Spreadsheet, name: &str) -> Result<&'a mut Worksheet> {
    book.new_sheet(name)
        .map_err(|e| Error::export(format!("failed to create sheet {}: {}", name, e)))
}

fn number(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn write_data_sheet(ws: &mut Worksheet, cleaned: &CleanedRecordSet) {
    for (col, header) in CLEAN_CSV_HEADER.iter().enumerate() {
        ws.get_cell_mut((col as u32 + 1, 1)).set_value(*header);
    }

    for (i, record) in cleaned.records().iter().enumerate() {
        let row = i as u32 + 2;
        ws.get_cell_mut((1, row))
            .set_value(record.date().format("%Y-%m-%d").to_string());
        ws.get_cell_mut((2, row)).set_value(record.product());
        ws.get_cell_mut((3, row)).set_value_number(record.quantity() as f64);
        ws.get_cell_mut((4, row)).set_value_number(number(record.unit_price()));
        ws.get_cell_mut((5, row)).set_value_number(number(record.total()));
    }
}

fn write_summary_sheet(ws: &mut Worksheet, aggregate: &AggregateResult) {
    ws.get_cell_mut((1, 1)).set_value("metric");
    ws.get_cell_mut((2, 1)).set_value("value");
    ws.get_cell_mut((3, 1)).set_value("detail");

    let stats = &aggregate.stats;
    let rows: [(&str, f64, String); 5] = [
        ("total_revenue", number(stats.total_revenue), String::new()),
        ("transaction_count", stats.transaction_count as f64, String::new()),
        ("average_ticket", number(stats.average_ticket.round_dp(2)), String::new()),
        (
            "most_sold_product",
            aggregate.most_sold_product.quantity as f64,
            aggregate.most_sold_product.product.clone(),
        ),
        (
            "top_revenue_product",
            number(aggregate.top_revenue_product.revenue),
            aggregate.top_revenue_product.product.clone(),
        ),
    ];

    for (i, (metric, value, detail)) in rows.iter().enumerate() {
        let row = i as u32 + 2;
        ws.get_cell_mut((1, row)).set_value(*metric);
        ws.get_cell_mut((2, row)).set_value_number(*value);
        if !detail.is_empty() {
            ws.get_cell_mut((3, row)).set_value(detail.as_str());
        }
    }
}

fn write_top_products_sheet(ws: &mut Worksheet, aggregate: &AggregateResult) {
    ws.get_cell_mut((1, 1)).set_value("product");
    ws.get_cell_mut((2, 1)).set_value("revenue");

    for (i, product) in aggregate.top_by_revenue.iter().enumerate() {
        let row = i as u32 + 2;
        ws.get_cell_mut((1, row)).set_value(product.product.as_str());
        ws.get_cell_mut((2, row)).set_value_number(number(product.revenue));
    }
}
