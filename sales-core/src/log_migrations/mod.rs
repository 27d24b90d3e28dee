//! Event log migrations - embedded SQL files for logs.duckdb
//!
//! Kept separate from the store migrations so the event log can be
//! exported or truncated without touching sales data.

/// All log migrations, embedded at compile time, applied in order.
/// Format: (filename, sql_content)
pub const LOG_MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
];
