//! Run command - load, clean, analyze, persist and export one file

use std::path::Path;
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sales_core::services::{LogEvent, PipelineReport, PipelineService};
use sales_core::{OperationResult, ProgressEvent};

use super::{get_context, get_logger, log_event};
use crate::output;

/// Command-line overrides of the configured pipeline settings
pub struct RunOptions {
    pub top_n: Option<usize>,
    pub charts: bool,
    pub report: bool,
}

pub fn run(file: &Path, options: RunOptions, json: bool) -> Result<()> {
    let logger = get_logger();
    log_event(&logger, LogEvent::new("command_started").with_command("run"));

    let ctx = get_context()?;
    let mut config = ctx.config.clone();
    if let Some(top_n) = options.top_n {
        if top_n == 0 {
            anyhow::bail!("--top-n must be greater than zero");
        }
        config.top_n = top_n;
    }
    config.generate_charts &= options.charts;
    config.export_report &= options.report;

    let mut pipeline = PipelineService::new(Arc::clone(&ctx.repository), config);
    if let Some(logger) = logger {
        pipeline = pipeline.with_logger(Arc::new(logger));
    }

    let result = run_on_worker(pipeline, file, json);

    if json {
        let op: OperationResult<&PipelineReport> = match &result {
            Ok(report) => OperationResult::ok(report),
            Err(e) => OperationResult::fail(format!("{:#}", e)),
        };
        println!("{}", serde_json::to_string_pretty(&op)?);
        return result.map(|_| ());
    }

    let report = result?;
    print_report(&report);
    Ok(())
}

/// Run the pipeline on a worker thread, showing its progress on a spinner
fn run_on_worker(pipeline: PipelineService, file: &Path, quiet: bool) -> Result<PipelineReport> {
    let spinner = if quiet {
        ProgressBar::hidden()
    } else {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::with_template("{spinner:.cyan} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(100));
        pb.set_message(format!("Processing {}", file.display()));
        pb
    };

    let (tx, rx) = mpsc::channel::<ProgressEvent>();
    let source = file.to_path_buf();
    let worker = thread::spawn(move || pipeline.run(&source, &tx));

    // The channel closes when the worker drops its sender
    for event in rx {
        if event.success {
            spinner.println(format!("{} {}", "✓".green(), event.message));
        } else {
            spinner.println(format!("{} {}", "✗".red(), event.message));
        }
        spinner.set_message(event.message);
    }
    spinner.finish_and_clear();

    let result = worker
        .join()
        .map_err(|_| anyhow!("pipeline worker panicked"))?;
    result.with_context(|| format!("Failed to process {}", file.display()))
}

fn print_report(report: &PipelineReport) {
    let aggregate = &report.aggregate;
    println!();
    println!("{}", "Analysis Results".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Rows read".to_string(), report.rows_in.to_string()]);
    table.add_row(vec!["Rows kept".to_string(), report.rows_out.to_string()]);
    table.add_row(vec!["Rows removed".to_string(), report.removed.to_string()]);
    table.add_row(vec![
        "Total revenue".to_string(),
        output::format_money(aggregate.stats.total_revenue),
    ]);
    table.add_row(vec![
        "Average ticket".to_string(),
        output::format_money(aggregate.stats.average_ticket),
    ]);
    table.add_row(vec![
        "Most sold product".to_string(),
        format!(
            "{} ({} units)",
            aggregate.most_sold_product.product, aggregate.most_sold_product.quantity
        ),
    ]);
    table.add_row(vec![
        "Top revenue product".to_string(),
        format!(
            "{} ({})",
            aggregate.top_revenue_product.product,
            output::format_money(aggregate.top_revenue_product.revenue)
        ),
    ]);
    println!("{}", table);

    println!();
    println!("{}", "Revenue by month".bold());
    let mut monthly = output::create_table();
    monthly.set_header(vec!["Month", "Revenue"]);
    for (month, revenue) in &aggregate.monthly_revenue {
        monthly.add_row(vec![month.to_string(), output::format_money(*revenue)]);
    }
    println!("{}", monthly);

    println!();
    if let Some(path) = &report.files.cleaned_csv {
        output::info(&format!("Cleaned data: {}", path.display()));
    }
    if let Some(path) = &report.files.report {
        output::info(&format!("Report: {}", path.display()));
    }
    for path in &report.files.charts {
        output::info(&format!("Chart data: {}", path.display()));
    }
    output::success(&format!("Done in {} ms", report.duration_ms));
}
