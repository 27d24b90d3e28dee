//! Status service - summary of what the store holds

use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;

use crate::adapters::duckdb::DuckDbRepository;
use crate::domain::result::Result;
use crate::domain::StoredMetric;

/// Status service for store summaries
pub struct StatusService {
    repository: Arc<DuckDbRepository>,
}

impl StatusService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Get overall status summary
    pub fn get_status(&self) -> Result<StatusSummary> {
        Ok(StatusSummary {
            total_sales: self.repository.get_sales_count()?,
            total_products: self.repository.get_product_count()?,
            date_range: self.repository.get_sales_date_range()?,
            last_analysis_at: self.repository.get_last_analysis_at()?,
            metrics: self.repository.get_analysis_results()?,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct StatusSummary {
    pub total_sales: i64,
    pub total_products: i64,
    pub date_range: DateRange,
    pub last_analysis_at: Option<NaiveDateTime>,
    pub metrics: Vec<StoredMetric>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub earliest: Option<NaiveDate>,
    pub latest: Option<NaiveDate>,
}
