//! Adapter implementations
//!
//! Adapters implement the port traits with concrete technologies:
//! - CSV files and Excel workbooks for the TabularSource port
//! - JSON files for the ChartRenderer port
//! - DuckDB for the sales store
//! - umya-spreadsheet for the report workbook
//! - fs2 advisory file locks for the store run lock

pub mod chart;
pub mod csv;
pub mod duckdb;
pub mod excel;
pub mod lock;
pub mod xlsx;
