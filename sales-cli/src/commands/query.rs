//! Query command - read-only SQL against the sales store

use std::io::{self, Read};
use std::path::Path;

use anyhow::{Context, Result};
use sales_core::services::LogEvent;
use serde_json::Value;

use super::{get_context, get_logger, log_event};
use crate::output;

pub fn run(sql: Option<&str>, file: Option<&Path>, format: &str) -> Result<()> {
    // SQL comes from the argument, a file, or piped stdin
    let sql_content = if let Some(sql) = sql {
        sql.to_string()
    } else if let Some(file_path) = file {
        std::fs::read_to_string(file_path)
            .with_context(|| format!("Failed to read SQL file: {:?}", file_path))?
    } else if atty::isnt(atty::Stream::Stdin) {
        let mut buffer = String::new();
        io::stdin()
            .read_to_string(&mut buffer)
            .context("Failed to read SQL from stdin")?;
        buffer
    } else {
        anyhow::bail!("No SQL query provided. Use positional argument, --file, or pipe from stdin.");
    };

    let logger = get_logger();
    let ctx = get_context()?;
    let result = match ctx.query_service.execute(&sql_content) {
        Ok(result) => result,
        Err(e) => {
            log_event(
                &logger,
                LogEvent::new("query_failed")
                    .with_command("query")
                    .with_error(e.kind()),
            );
            return Err(e.into());
        }
    };
    log_event(&logger, LogEvent::new("query_executed").with_command("query"));

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&result)?),
        "csv" => {
            println!("{}", result.columns.join(","));
            for row in &result.rows {
                let values: Vec<String> = row.iter().map(csv_field).collect();
                println!("{}", values.join(","));
            }
        }
        _ => {
            let mut table = output::create_table();
            table.set_header(&result.columns);
            for row in &result.rows {
                table.add_row(row.iter().map(display_value).collect::<Vec<_>>());
            }
            println!("{}", table);
            println!();
            println!("{} row(s) returned", result.row_count);
        }
    }

    Ok(())
}

fn display_value(v: &Value) -> String {
    match v {
        Value::Null => "NULL".to_string(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// RFC 4180 quoting for fields with separators, quotes or newlines
fn csv_field(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::String(s) if s.contains([',', '"', '\n']) => {
            format!("\"{}\"", s.replace('"', "\"\""))
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
