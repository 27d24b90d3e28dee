//! Status command - show what the store currently holds

use anyhow::Result;
use colored::Colorize;
use comfy_table::{ContentArrangement, Table};

use super::get_context;
use crate::output;

pub fn run(json: bool) -> Result<()> {
    let ctx = get_context()?;
    let status = ctx.status_service.get_status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("{}", "Sales Data Status".bold());
    println!();

    let mut table = Table::new();
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.add_row(vec!["Sales", &status.total_sales.to_string()]);
    table.add_row(vec!["Products", &status.total_products.to_string()]);
    table.add_row(vec!["Database", &ctx.repository.db_path().display().to_string()]);

    println!("{}", table);
    println!();

    let range = &status.date_range;
    if let (Some(earliest), Some(latest)) = (&range.earliest, &range.latest) {
        println!("Date range: {} to {}", earliest, latest);
        println!();
    }

    match status.last_analysis_at {
        Some(at) => {
            println!("{} {}", "Last analysis:".bold(), at.format("%Y-%m-%d %H:%M:%S"));
            for metric in &status.metrics {
                match metric.metric_kind.as_str() {
                    "most_sold_product" => println!(
                        "  • Most sold product: {} ({} units)",
                        metric.label,
                        metric.value.normalize()
                    ),
                    "top_revenue_product" => println!(
                        "  • Top revenue product: {} ({})",
                        metric.label,
                        output::format_money(metric.value)
                    ),
                    _ => {}
                }
            }
        }
        None => output::warning("No analysis stored yet. Run `sales run <file>` first."),
    }

    Ok(())
}
