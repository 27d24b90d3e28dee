//! DuckDB repository implementation

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use duckdb::{params, Connection};
use rust_decimal::Decimal;
use sqlparser::ast::Statement;
use sqlparser::dialect::DuckDbDialect;
use sqlparser::parser::Parser;

use crate::domain::result::{Error, Result};
use crate::domain::{AggregateResult, ProductQuantity, SalesRecord, StoredMetric, YearMonth};
use crate::services::{DateRange, MigrationResult, MigrationService};

/// Parse user SQL and accept a single read-only statement.
fn validate_read_only(sql: &str) -> Result<()> {
    let dialect = DuckDbDialect {};
    let statements = Parser::parse_sql(&dialect, sql).map_err(|e| {
        let msg = e.to_string();
        Error::invalid_argument(msg.trim_start_matches("sql parser error: ").to_string())
    })?;

    match statements.as_slice() {
        [Statement::Query(_)] => Ok(()),
        [] => Err(Error::invalid_argument("Empty query")),
        [_] => Err(Error::invalid_argument("Only SELECT queries are allowed")),
        _ => Err(Error::invalid_argument("Only a single statement is allowed")),
    }
}

// Money columns are exact decimal text; SQL arithmetic on them would round
const INSERT_SALE: &str = "INSERT INTO sales (date, product, quantity, unit_price, total)
     VALUES (CAST(? AS DATE), ?, ?, ?, ?)";

const INSERT_METRIC: &str = "INSERT INTO analysis_results (metric_kind, label, value, computed_at)
     VALUES (?, ?, ?, CAST(? AS TIMESTAMP))";

const MEMORY_PATH: &str = ":memory:";

/// DuckDB repository for cleaned sales and analysis results
pub struct DuckDbRepository {
    conn: Mutex<Connection>,
    db_path: PathBuf,
}

impl DuckDbRepository {
    /// Open (or create) the store file
    ///
    /// A locked or unreadable file is reported as a persistence error right
    /// away; callers decide whether to try again.
    pub fn new(db_path: &Path) -> Result<Self> {
        // Extension autoloading stays off; nothing here needs extensions
        let config = duckdb::Config::default().enable_autoload_extension(false)?;
        let conn = Connection::open_with_flags(db_path, config).map_err(|e| {
            Error::persistence_with(format!("failed to open {}", db_path.display()), e)
        })?;

        Ok(Self {
            conn: Mutex::new(conn),
            db_path: db_path.to_path_buf(),
        })
    }

    /// In-memory store, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            db_path: PathBuf::from(MEMORY_PATH),
        })
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    pub fn is_in_memory(&self) -> bool {
        self.db_path.as_os_str() == MEMORY_PATH
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::persistence("store connection lock poisoned"))
    }

    /// Run database migrations using the MigrationService
    pub fn run_migrations(&self) -> Result<MigrationResult> {
        let conn = self.lock()?;
        MigrationService::new(&conn).run_pending()
    }

    /// Ensure database schema exists (runs pending migrations)
    pub fn ensure_schema(&self) -> Result<()> {
        let result = self.run_migrations()?;
        if !result.applied.is_empty() {
            tracing::debug!(applied = ?result.applied, "applied store migrations");
        }
        Ok(())
    }

    // === Replace operations ===

    /// Replace the whole `sales` table in one transaction
    pub fn replace_sales(&self, records: &[SalesRecord]) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_sales(&tx, records)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace the whole `analysis_results` table in one transaction
    pub fn replace_analysis_results(&self, aggregate: &AggregateResult) -> Result<()> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        write_analysis_results(&tx, aggregate)?;
        tx.commit()?;
        Ok(())
    }

    /// Replace both tables in a single transaction
    ///
    /// On any failure neither table changes: the transaction is rolled back.
    pub fn replace_run(&self, records: &[SalesRecord], aggregate: &AggregateResult) -> Result<()> {
        self.begin_run(records, aggregate)?.commit()
    }

    /// Write both tables inside an open transaction and hand it back
    ///
    /// The returned run holds the store connection until it is committed or
    /// dropped. Dropping it without `commit` rolls every write back, so the
    /// caller can check and export the written data before deciding.
    pub fn begin_run(
        &self,
        records: &[SalesRecord],
        aggregate: &AggregateResult,
    ) -> Result<PendingRun<'_>> {
        let conn = self.lock()?;
        conn.execute_batch("BEGIN TRANSACTION")?;
        let pending = PendingRun {
            conn,
            finished: false,
        };
        write_sales(&pending.conn, records)?;
        write_analysis_results(&pending.conn, aggregate)?;
        tracing::debug!(rows = records.len(), "wrote sales and analysis results");
        Ok(pending)
    }

    // === Aggregate queries ===

    /// Products ranked by summed quantity, ties broken by product name
    pub fn query_top_products(&self, limit: i64) -> Result<Vec<ProductQuantity>> {
        let conn = self.lock()?;
        top_products(&conn, limit)
    }

    /// Summed revenue per calendar month, ascending
    pub fn query_monthly_revenue(&self) -> Result<BTreeMap<YearMonth, Decimal>> {
        let conn = self.lock()?;
        monthly_revenue(&conn)
    }

    // === Reads ===

    /// All stored sales in insertion order
    pub fn get_sales(&self) -> Result<Vec<SalesRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT date::VARCHAR, product, quantity, unit_price
             FROM sales
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (date, product, quantity, unit_price) = row?;
            let unit_price = parse_decimal(&unit_price)?;
            let record = SalesRecord::new(parse_date(&date)?, &product, quantity, unit_price)
                .ok_or_else(|| {
                    Error::persistence(format!("stored sale for {} is invalid", product))
                })?;
            result.push(record);
        }
        Ok(result)
    }

    pub fn get_sales_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM sales", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_product_count(&self) -> Result<i64> {
        let conn = self.lock()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(DISTINCT product) FROM sales", [], |row| row.get(0))?;
        Ok(count)
    }

    pub fn get_sales_date_range(&self) -> Result<DateRange> {
        let conn = self.lock()?;
        let (earliest, latest): (Option<String>, Option<String>) = conn.query_row(
            "SELECT MIN(date)::VARCHAR, MAX(date)::VARCHAR FROM sales",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(DateRange {
            earliest: earliest.as_deref().map(parse_date).transpose()?,
            latest: latest.as_deref().map(parse_date).transpose()?,
        })
    }

    /// Stored metrics in the order they were written
    pub fn get_analysis_results(&self) -> Result<Vec<StoredMetric>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, metric_kind, label, value, computed_at::VARCHAR
             FROM analysis_results
             ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;

        let mut result = Vec::new();
        for row in rows {
            let (id, metric_kind, label, value, computed_at) = row?;
            result.push(StoredMetric {
                id,
                metric_kind,
                label,
                value: parse_decimal(&value)?,
                computed_at: parse_naive_datetime(&computed_at)?,
            });
        }
        Ok(result)
    }

    /// Timestamp of the last stored analysis, if any
    pub fn get_last_analysis_at(&self) -> Result<Option<NaiveDateTime>> {
        let conn = self.lock()?;
        let latest: Option<String> = conn.query_row(
            "SELECT MAX(computed_at)::VARCHAR FROM analysis_results",
            [],
            |row| row.get(0),
        )?;
        latest.as_deref().map(parse_naive_datetime).transpose()
    }

    // === Query operations ===

    /// Run a read-only SQL statement and return rows as JSON values
    pub fn execute_query(&self, sql: &str) -> Result<QueryResult> {
        validate_read_only(sql)?;

        let conn = self.lock()?;
        let mut stmt = conn.prepare(sql)?;
        let mut result_rows = stmt.query([])?;

        let mut rows: Vec<Vec<serde_json::Value>> = Vec::new();
        let mut column_count = 0;

        while let Some(row) = result_rows.next()? {
            if rows.is_empty() {
                column_count = row.as_ref().column_count();
            }
            rows.push((0..column_count).map(|i| get_column_value(row, i)).collect());
        }

        // Release the borrow on stmt before reading column names
        drop(result_rows);

        let count = if column_count > 0 {
            column_count
        } else {
            stmt.column_count()
        };
        let columns: Vec<String> = (0..count)
            .map(|i| {
                stmt.column_name(i)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| format!("col{}", i))
            })
            .collect();

        let row_count = rows.len();
        Ok(QueryResult {
            columns,
            rows,
            row_count,
        })
    }

    /// Whether a table exists in the main schema
    pub fn table_exists(&self, table_name: &str) -> Result<bool> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_name = ?",
            [table_name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }
}

/// A run written to the store but not yet committed
///
/// Reads through it see the new rows. Dropping it rolls the run back.
pub struct PendingRun<'a> {
    conn: MutexGuard<'a, Connection>,
    finished: bool,
}

impl PendingRun<'_> {
    pub fn query_top_products(&self, limit: i64) -> Result<Vec<ProductQuantity>> {
        top_products(&self.conn, limit)
    }

    pub fn query_monthly_revenue(&self) -> Result<BTreeMap<YearMonth, Decimal>> {
        monthly_revenue(&self.conn)
    }

    /// Make the run visible
    pub fn commit(mut self) -> Result<()> {
        self.finished = true;
        if let Err(e) = self.conn.execute_batch("COMMIT") {
            // A failed commit may leave the transaction open
            let _ = self.conn.execute_batch("ROLLBACK");
            return Err(Error::persistence_with("failed to commit the run", e));
        }
        Ok(())
    }
}

impl Drop for PendingRun<'_> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => tracing::debug!("rolled back uncommitted run"),
            Err(e) => tracing::warn!(error = %e, "failed to roll back uncommitted run"),
        }
    }
}

fn top_products(conn: &Connection, limit: i64) -> Result<Vec<ProductQuantity>> {
    if limit <= 0 {
        return Err(Error::invalid_argument(format!(
            "limit must be positive, got {}",
            limit
        )));
    }

    let mut stmt = conn.prepare(
        "SELECT product, SUM(quantity)::BIGINT AS total_quantity
         FROM sales
         GROUP BY product
         ORDER BY total_quantity DESC, product ASC
         LIMIT ?",
    )?;
    let rows = stmt.query_map(params![limit], |row| {
        Ok(ProductQuantity {
            product: row.get(0)?,
            quantity: row.get(1)?,
        })
    })?;

    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

/// Rows are grouped by month in SQL; the exact totals are summed here
fn monthly_revenue(conn: &Connection) -> Result<BTreeMap<YearMonth, Decimal>> {
    let mut stmt = conn.prepare(
        "SELECT strftime(date, '%Y-%m') AS month, string_agg(total, ',')
         FROM sales
         GROUP BY month
         ORDER BY month",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
    })?;

    let mut result = BTreeMap::new();
    for row in rows {
        let (month, totals) = row?;
        let month = YearMonth::from_str(&month).map_err(Error::persistence)?;
        let mut revenue = Decimal::ZERO;
        for total in totals.split(',') {
            revenue = revenue.checked_add(parse_decimal(total)?).ok_or_else(|| {
                Error::overflow(format!("stored revenue for {} overflows", month))
            })?;
        }
        result.insert(month, revenue);
    }
    Ok(result)
}

fn write_sales(conn: &Connection, records: &[SalesRecord]) -> Result<()> {
    conn.execute("DELETE FROM sales", [])?;

    let mut stmt = conn.prepare(INSERT_SALE)?;
    for record in records {
        stmt.execute(params![
            record.date().format("%Y-%m-%d").to_string(),
            record.product(),
            record.quantity(),
            record.unit_price().normalize().to_string(),
            record.total().normalize().to_string(),
        ])
        .map_err(|e| {
            Error::persistence_with(format!("failed to insert sale for {}", record.product()), e)
        })?;
    }
    Ok(())
}

fn write_analysis_results(conn: &Connection, aggregate: &AggregateResult) -> Result<()> {
    conn.execute("DELETE FROM analysis_results", [])?;

    let computed_at = format_timestamp(aggregate.computed_at);
    let mut stmt = conn.prepare(INSERT_METRIC)?;
    for metric in aggregate.metric_rows() {
        stmt.execute(params![
            metric.metric_kind,
            metric.label,
            metric.value.normalize().to_string(),
            computed_at,
        ])?;
    }
    Ok(())
}

fn get_column_value(row: &duckdb::Row, idx: usize) -> serde_json::Value {
    use duckdb::types::ValueRef;

    match row.get_ref(idx) {
        Ok(ValueRef::Null) => serde_json::Value::Null,
        Ok(ValueRef::Boolean(b)) => serde_json::Value::Bool(b),
        Ok(ValueRef::TinyInt(i)) => serde_json::json!(i),
        Ok(ValueRef::SmallInt(i)) => serde_json::json!(i),
        Ok(ValueRef::Int(i)) => serde_json::json!(i),
        Ok(ValueRef::BigInt(i)) => serde_json::json!(i),
        Ok(ValueRef::HugeInt(i)) => serde_json::json!(i.to_string()),
        Ok(ValueRef::UTinyInt(i)) => serde_json::json!(i),
        Ok(ValueRef::USmallInt(i)) => serde_json::json!(i),
        Ok(ValueRef::UInt(i)) => serde_json::json!(i),
        Ok(ValueRef::UBigInt(i)) => serde_json::json!(i),
        Ok(ValueRef::Float(f)) => serde_json::json!(f),
        Ok(ValueRef::Double(f)) => serde_json::json!(f),
        Ok(ValueRef::Decimal(d)) => {
            // Keep the exact digits when the value does not fit an f64
            let s = d.normalize().to_string();
            match f64::from_str(&s) {
                Ok(f) if f.is_finite() => serde_json::json!(f),
                _ => serde_json::Value::String(s),
            }
        }
        Ok(ValueRef::Text(bytes)) => {
            serde_json::Value::String(String::from_utf8_lossy(bytes).to_string())
        }
        Ok(ValueRef::Blob(bytes)) => {
            serde_json::Value::String(format!("<blob {} bytes>", bytes.len()))
        }
        Ok(ValueRef::Date32(days)) => DateTime::from_timestamp(i64::from(days) * 86_400, 0)
            .map(|dt| serde_json::Value::String(dt.date_naive().to_string()))
            .unwrap_or(serde_json::Value::Null),
        Ok(ValueRef::Timestamp(_, ts)) => {
            let dt = DateTime::from_timestamp_micros(ts)
                .map(|dt| dt.naive_utc().to_string())
                .unwrap_or_else(|| ts.to_string());
            serde_json::Value::String(dt)
        }
        _ => serde_json::Value::Null,
    }
}

/// Query result structure
#[derive(Debug, Clone, serde::Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
    pub row_count: usize,
}

// Helper functions

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.naive_utc().format("%Y-%m-%d %H:%M:%S%.6f").to_string()
}

fn parse_decimal(s: &str) -> Result<Decimal> {
    Decimal::from_str(s.trim())
        .map(|d| d.normalize())
        .map_err(|e| Error::persistence(format!("invalid decimal '{}': {}", s, e)))
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::persistence(format!("invalid date '{}': {}", s, e)))
}

fn parse_naive_datetime(s: &str) -> Result<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|e| Error::persistence(format!("invalid timestamp '{}': {}", s, e)))
}
