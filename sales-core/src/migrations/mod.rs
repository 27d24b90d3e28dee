//! Store migrations - embedded SQL files
//!
//! Compiled into the binary with include_str! and applied in name order by
//! the MigrationService. Each applied name is recorded in sys_migrations.

/// All store migrations, embedded at compile time.
/// Format: (filename, sql_content)
///
/// New migrations get the next NNN_ prefix and are appended here.
pub const MIGRATIONS: &[(&str, &str)] = &[
    ("000_migrations.sql", include_str!("000_migrations.sql")),
    ("001_initial_schema.sql", include_str!("001_initial_schema.sql")),
    ("002_exact_decimals.sql", include_str!("002_exact_decimals.sql")),
];
