//! Chart renderer port
//!
//! The pipeline hands chart data to a renderer and only guarantees the
//! shape and ordering of that data: monthly revenue ascending by month,
//! top products descending by quantity with ties broken by name.

use std::path::PathBuf;

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::result::Result;

/// One labelled value in a chart series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: Decimal,
}

/// A single-series chart
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub points: Vec<ChartPoint>,
}

/// Consumer of chart data (image writer, JSON writer, ...)
pub trait ChartRenderer: Send + Sync {
    /// Render the monthly revenue chart, returning the written file
    fn render_monthly_revenue(&self, series: &ChartSeries) -> Result<PathBuf>;

    /// Render the top products chart, returning the written file
    fn render_top_products(&self, series: &ChartSeries) -> Result<PathBuf>;
}
