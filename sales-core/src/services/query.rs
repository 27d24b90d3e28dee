//! Query service - read-only SQL and the stored aggregate queries

use std::collections::BTreeMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use crate::adapters::duckdb::{DuckDbRepository, QueryResult};
use crate::domain::result::Result;
use crate::domain::{ProductQuantity, YearMonth};

/// Query service for SQL execution
pub struct QueryService {
    repository: Arc<DuckDbRepository>,
}

impl QueryService {
    pub fn new(repository: Arc<DuckDbRepository>) -> Self {
        Self { repository }
    }

    /// Execute a read-only SQL query
    pub fn execute(&self, sql: &str) -> Result<QueryResult> {
        self.repository.execute_query(sql)
    }

    pub fn top_products(&self, limit: i64) -> Result<Vec<ProductQuantity>> {
        self.repository.query_top_products(limit)
    }

    pub fn monthly_revenue(&self) -> Result<BTreeMap<YearMonth, Decimal>> {
        self.repository.query_monthly_revenue()
    }
}
