//! Monthly command - revenue per month, straight from the store

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let monthly = ctx.query_service.monthly_revenue()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&monthly)?);
        return Ok(());
    }

    if monthly.is_empty() {
        output::warning("No sales stored yet.");
        return Ok(());
    }

    let mut table = output::create_table();
    table.set_header(vec!["Month", "Revenue"]);
    for (month, revenue) in &monthly {
        table.add_row(vec![month.to_string(), output::format_money(*revenue)]);
    }
    println!("{}", table);

    let total: rust_decimal::Decimal = monthly.values().sum();
    println!("{} {}", "Total:".bold(), output::format_money(total));

    Ok(())
}
