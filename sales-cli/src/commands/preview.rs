//! Preview command - first rows of a sales file, before any cleaning

use std::path::Path;

use anyhow::Result;
use colored::Colorize;
use sales_core::services::loader;

use crate::output;

pub fn run(file: &Path, limit: usize, json: bool) -> Result<()> {
    let preview = loader::preview(file, limit)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    println!(
        "{} ({}, {} rows)",
        file.display().to_string().bold(),
        preview.format.as_str(),
        preview.total_rows
    );
    println!();

    let mut table = output::create_table();
    table.set_header(&preview.headers);
    for row in &preview.rows {
        table.add_row(
            row.iter()
                .map(|cell| cell.clone().unwrap_or_default())
                .collect::<Vec<_>>(),
        );
    }
    println!("{}", table);
    println!();

    match &preview.detected_columns {
        Some(columns) => {
            output::info("Detected columns:");
            println!("  date:       {}", columns.date);
            println!("  product:    {}", columns.product);
            println!("  quantity:   {}", columns.quantity);
            println!("  unit price: {}", columns.unit_price);
        }
        None => output::warning(
            "Could not detect all four columns; set \"columns\" in settings.json",
        ),
    }

    Ok(())
}
