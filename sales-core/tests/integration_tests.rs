//! Integration tests for sales-core pipeline runs
//!
//! Every test works on real files in a temp directory and a real DuckDB
//! store; nothing is mocked.
//!
//! Run with: cargo test --test integration_tests -- --nocapture

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{mpsc, Arc};

use rust_decimal::Decimal;
use tempfile::TempDir;

use sales_core::adapters::chart::{MONTHLY_REVENUE_FILE, TOP_PRODUCTS_FILE};
use sales_core::adapters::lock::RunLock;
use sales_core::config::Config;
use sales_core::domain::result::Result as CoreResult;
use sales_core::ports::{ChartRenderer, ChartSeries, NoProgress};
use sales_core::services::export::{CHARTS_DIR, REPORT_FILE};
use sales_core::services::PipelineService;
use sales_core::{Error, PipelineStep, SalesContext, YearMonth};

// ============================================================================
// Test Helpers
// ============================================================================

const SCENARIO_A: &str = "\
fecha,producto,cantidad,precio_unitario
2024-01-01,ProductoA,10,100.0
2024-01-02,ProductoB,5,200.0
2024-01-03,ProductoA,15,100.0
2024-02-01,ProductoC,8,150.0
2024-02-02,ProductoB,12,200.0
";

const SCENARIO_B: &str = "\
fecha,producto,cantidad,precio_unitario
2024-01-01,ProductoA,10,100.0
2024-01-02,ProductoB,-5,200.0
invalid-date,ProductoC,8,150.0
2024-02-01,,12,200.0
2024-02-02,ProductoD,15,0
2024-02-03,ProductoA,3,100.0
";

fn write_source(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).unwrap();
    path
}

fn month(s: &str) -> YearMonth {
    YearMonth::from_str(s).unwrap()
}

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

/// Write an xlsx source with the given header and rows (all cells as text
/// except numeric columns, which are written as numbers)
fn write_xlsx_source(path: &Path, header: &[&str], rows: &[(&str, &str, f64, f64)]) {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book.get_sheet_mut(&0).unwrap();
    for (col, name) in header.iter().enumerate() {
        sheet.get_cell_mut((col as u32 + 1, 1)).set_value(*name);
    }
    for (i, (date, product, quantity, price)) in rows.iter().enumerate() {
        let row = i as u32 + 2;
        sheet.get_cell_mut((1, row)).set_value(*date);
        sheet.get_cell_mut((2, row)).set_value(*product);
        sheet.get_cell_mut((3, row)).set_value_number(*quantity);
        sheet.get_cell_mut((4, row)).set_value_number(*price);
    }
    umya_spreadsheet::writer::xlsx::write(&book, path).unwrap();
}

// ============================================================================
// Full Run Tests
// ============================================================================

#[test]
fn test_scenario_a_full_run() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_A);
    let ctx = SalesContext::new(temp_dir.path()).unwrap();

    let report = ctx.pipeline().run(&source, &NoProgress).unwrap();

    assert_eq!(report.rows_in, 5);
    assert_eq!(report.rows_out, 5);
    assert_eq!(report.removed, 0);
    assert_eq!(report.aggregate.most_sold_product.product, "ProductoA");
    assert_eq!(report.aggregate.most_sold_product.quantity, 25);
    assert_eq!(report.aggregate.top_revenue_product.product, "ProductoB");
    assert_eq!(report.aggregate.top_revenue_product.revenue, dec("3400"));
    assert_eq!(report.aggregate.monthly_revenue[&month("2024-01")], dec("3500"));
    assert_eq!(report.aggregate.monthly_revenue[&month("2024-02")], dec("3600"));

    // The store answers the same questions the same way
    let status = ctx.status_service.get_status().unwrap();
    assert_eq!(status.total_sales, 5);
    assert_eq!(status.total_products, 3);
    assert!(status.last_analysis_at.is_some());
    assert!(!status.metrics.is_empty());

    assert_eq!(
        ctx.query_service.top_products(3).unwrap(),
        report.aggregate.top_by_quantity
    );
    assert_eq!(
        ctx.query_service.monthly_revenue().unwrap(),
        report.aggregate.monthly_revenue
    );
}

#[test]
fn test_scenario_b_drops_invalid_rows() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_B);
    let ctx = SalesContext::new(temp_dir.path()).unwrap();

    let report = ctx.pipeline().run(&source, &NoProgress).unwrap();

    assert_eq!(report.rows_in, 6);
    assert_eq!(report.rows_out, 2);
    assert_eq!(report.removed, 4);
    assert_eq!(ctx.repository.get_sales_count().unwrap(), 2);

    for record in ctx.repository.get_sales().unwrap() {
        assert!(record.quantity() > 0);
        assert!(record.unit_price() > Decimal::ZERO);
        assert!(!record.product().is_empty());
        assert_eq!(record.total(), Decimal::from(record.quantity()) * record.unit_price());
    }
}

#[test]
fn test_scenario_c_tie_break_is_stable_across_runs() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(
        &temp_dir,
        "ventas.csv",
        "fecha,producto,cantidad,precio_unitario\n\
         2024-03-01,Zeta,10,1\n\
         2024-03-02,Alfa,10,1\n\
         2024-03-03,Media,4,1\n",
    );
    let ctx = SalesContext::new(temp_dir.path()).unwrap();
    let pipeline = ctx.pipeline();

    let first = pipeline.run(&source, &NoProgress).unwrap();
    for _ in 0..3 {
        let again = pipeline.run(&source, &NoProgress).unwrap();
        assert_eq!(again.aggregate.top_by_quantity, first.aggregate.top_by_quantity);
        assert_eq!(
            ctx.query_service.top_products(2).unwrap(),
            first.aggregate.top_by_quantity[..2]
        );
    }

    let names: Vec<&str> = first
        .aggregate
        .top_by_quantity
        .iter()
        .map(|p| p.product.as_str())
        .collect();
    assert_eq!(names, vec!["Alfa", "Zeta", "Media"]);
}

#[test]
fn test_excel_source_runs_like_csv() {
    let temp_dir = TempDir::new().unwrap();
    let source = temp_dir.path().join("ventas.xlsx");
    write_xlsx_source(
        &source,
        &["fecha", "producto", "cantidad", "precio_unitario"],
        &[
            ("2024-01-01", "ProductoA", 10.0, 100.0),
            ("2024-01-02", "ProductoB", 5.0, 200.0),
            ("2024-01-03", "ProductoA", 15.0, 100.0),
            ("2024-02-01", "ProductoC", 8.0, 150.0),
            ("2024-02-02", "ProductoB", 12.0, 200.0),
        ],
    );
    let ctx = SalesContext::new(temp_dir.path()).unwrap();

    let report = ctx.pipeline().run(&source, &NoProgress).unwrap();

    assert_eq!(report.format.as_str(), "excel");
    assert_eq!(report.rows_out, 5);
    assert_eq!(report.aggregate.most_sold_product.quantity, 25);
    assert_eq!(report.aggregate.monthly_revenue[&month("2024-02")], dec("3600"));
}

#[test]
fn test_rerun_replaces_instead_of_appending() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_A);
    let ctx = SalesContext::new(temp_dir.path()).unwrap();
    let pipeline = ctx.pipeline();

    pipeline.run(&source, &NoProgress).unwrap();
    let metrics = ctx.repository.get_analysis_results().unwrap().len();

    pipeline.run(&source, &NoProgress).unwrap();
    assert_eq!(ctx.repository.get_sales_count().unwrap(), 5);
    assert_eq!(ctx.repository.get_analysis_results().unwrap().len(), metrics);

    // A smaller source replaces the whole table
    let smaller = write_source(&temp_dir, "b.csv", SCENARIO_B);
    pipeline.run(&smaller, &NoProgress).unwrap();
    assert_eq!(ctx.repository.get_sales_count().unwrap(), 2);
}

#[test]
fn test_failed_run_keeps_previous_store() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_A);
    let ctx = SalesContext::new(temp_dir.path()).unwrap();
    let pipeline = ctx.pipeline();
    pipeline.run(&source, &NoProgress).unwrap();
    let before = ctx.repository.get_sales().unwrap();

    // Every row invalid: cleaning leaves nothing to analyze
    let bad = write_source(
        &temp_dir,
        "bad.csv",
        "fecha,producto,cantidad,precio_unitario\n2024-01-01,X,-1,10\n",
    );
    let err = pipeline.run(&bad, &NoProgress).unwrap_err();
    assert!(matches!(err, Error::State(_)));
    assert_eq!(ctx.repository.get_sales().unwrap(), before);
}

#[test]
fn test_high_precision_prices_survive_the_store() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = SalesContext::new(temp_dir.path()).unwrap();
    let pipeline = ctx.pipeline();
    let first = write_source(
        &temp_dir,
        "first.csv",
        "fecha,producto,cantidad,precio_unitario\n2024-01-01,A,1,10\n",
    );
    pipeline.run(&first, &NoProgress).unwrap();

    // 100/3 as an Excel float renders with 15 decimals
    let precise = write_source(
        &temp_dir,
        "precise.csv",
        "fecha,producto,cantidad,precio_unitario\n\
         2024-01-01,A,3,33.333333333333336\n\
         2024-01-05,B,2,0.125\n",
    );
    let report = pipeline.run(&precise, &NoProgress).unwrap();

    assert_eq!(
        report.aggregate.monthly_revenue[&month("2024-01")],
        dec("100.250000000000008")
    );
    assert_eq!(
        ctx.query_service.monthly_revenue().unwrap(),
        report.aggregate.monthly_revenue
    );
    let stored = ctx.repository.get_sales().unwrap();
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].unit_price(), dec("33.333333333333336"));
    assert_eq!(stored[0].total(), dec("100.000000000000008"));
}

/// Renderer that always fails, standing in for a broken chart backend
struct FailingRenderer;

impl ChartRenderer for FailingRenderer {
    fn render_monthly_revenue(&self, _series: &ChartSeries) -> CoreResult<PathBuf> {
        Err(Error::export("chart backend unavailable"))
    }

    fn render_top_products(&self, _series: &ChartSeries) -> CoreResult<PathBuf> {
        Err(Error::export("chart backend unavailable"))
    }
}

#[test]
fn test_failure_after_persist_rolls_back_the_store() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_A);
    let ctx = SalesContext::new(temp_dir.path()).unwrap();
    ctx.pipeline().run(&source, &NoProgress).unwrap();
    let sales_before = ctx.repository.get_sales().unwrap();
    let metrics_before = ctx.repository.get_analysis_results().unwrap();

    let next = write_source(&temp_dir, "next.csv", SCENARIO_B);
    let failing = ctx.pipeline().with_chart_renderer(Box::new(FailingRenderer));
    let (tx, rx) = mpsc::channel();
    let err = failing.run(&next, &tx).unwrap_err();
    drop(tx);

    assert!(matches!(err, Error::Export(_)));
    let events: Vec<_> = rx.iter().collect();
    assert!(events
        .iter()
        .any(|e| e.step == PipelineStep::Persist && e.success));
    assert!(events
        .iter()
        .any(|e| e.step == PipelineStep::Charts && !e.success));

    assert_eq!(ctx.repository.get_sales().unwrap(), sales_before);
    let metrics_after = ctx.repository.get_analysis_results().unwrap();
    assert_eq!(metrics_after.len(), metrics_before.len());
    assert_eq!(metrics_after[0].label, metrics_before[0].label);

    // The store is usable again once the failed run is gone
    ctx.pipeline().run(&next, &NoProgress).unwrap();
    assert_eq!(ctx.repository.get_sales_count().unwrap(), 2);
}

#[test]
fn test_failed_report_removes_the_run_outputs() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = SalesContext::new(temp_dir.path()).unwrap();
    let output = temp_dir.path().join("output");

    let mut config = ctx.config.clone();
    config.export_report = false;
    let first = write_source(&temp_dir, "ventas.csv", SCENARIO_A);
    PipelineService::new(Arc::clone(&ctx.repository), config)
        .run(&first, &NoProgress)
        .unwrap();
    assert!(output.join("ventas_clean.csv").exists());

    // A directory where the workbook should go makes the report stage fail
    std::fs::create_dir_all(output.join(REPORT_FILE)).unwrap();
    let next = write_source(&temp_dir, "next.csv", SCENARIO_B);
    let err = ctx.pipeline().run(&next, &NoProgress).unwrap_err();

    assert!(matches!(err, Error::Export(_)));
    assert_eq!(ctx.repository.get_sales_count().unwrap(), 5);
    assert!(!output.join("next_clean.csv").exists());
    assert!(!output.join(CHARTS_DIR).join(MONTHLY_REVENUE_FILE).exists());
    assert!(output.join("ventas_clean.csv").exists());
}

#[test]
fn test_overflowing_sums_fail_without_touching_the_store() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_A);
    let ctx = SalesContext::new(temp_dir.path()).unwrap();
    ctx.pipeline().run(&source, &NoProgress).unwrap();

    let huge = write_source(
        &temp_dir,
        "huge.csv",
        "fecha,producto,cantidad,precio_unitario\n\
         2024-01-01,A,5000000000000000000,1\n\
         2024-01-02,A,5000000000000000000,1\n",
    );
    let err = ctx.pipeline().run(&huge, &NoProgress).unwrap_err();

    assert!(matches!(err, Error::Overflow(_)));
    assert_eq!(ctx.repository.get_sales_count().unwrap(), 5);
    assert!(!temp_dir.path().join("output").join("huge_clean.csv").exists());
}

#[test]
fn test_missing_source_is_load_error() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = SalesContext::new(temp_dir.path()).unwrap();

    let err = ctx
        .pipeline()
        .run(&temp_dir.path().join("missing.csv"), &NoProgress)
        .unwrap_err();
    assert!(matches!(err, Error::Load { .. }));

    let unsupported = write_source(&temp_dir, "ventas.txt", SCENARIO_A);
    let err = ctx.pipeline().run(&unsupported, &NoProgress).unwrap_err();
    assert!(matches!(err, Error::Load { .. }));
}

// ============================================================================
// Output Tests
// ============================================================================

#[test]
fn test_outputs_are_written() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_B);
    let ctx = SalesContext::new(temp_dir.path()).unwrap();

    let report = ctx.pipeline().run(&source, &NoProgress).unwrap();
    let output = temp_dir.path().join("output");

    let cleaned_csv = report.files.cleaned_csv.unwrap();
    assert_eq!(cleaned_csv, output.join("ventas_clean.csv"));
    let content = std::fs::read_to_string(&cleaned_csv).unwrap();
    let mut lines = content.lines();
    assert_eq!(lines.next(), Some("date,product,quantity,unit_price,total"));
    assert_eq!(lines.count(), 2);

    assert_eq!(report.files.report, Some(output.join(REPORT_FILE)));
    assert!(output.join(REPORT_FILE).exists());

    let charts = output.join(CHARTS_DIR);
    assert_eq!(
        report.files.charts,
        vec![charts.join(MONTHLY_REVENUE_FILE), charts.join(TOP_PRODUCTS_FILE)]
    );
    let monthly: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(charts.join(MONTHLY_REVENUE_FILE)).unwrap())
            .unwrap();
    assert_eq!(monthly["points"][0]["label"], "2024-01");
    assert_eq!(monthly["points"][1]["label"], "2024-02");
}

#[test]
fn test_optional_outputs_can_be_disabled() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_A);
    let mut config = Config::default();
    config.generate_charts = false;
    config.export_report = false;
    config.output_dir = temp_dir.path().join("out");
    let ctx = SalesContext::with_config(temp_dir.path(), config).unwrap();

    let report = ctx.pipeline().run(&source, &NoProgress).unwrap();

    assert!(report.files.cleaned_csv.is_some());
    assert!(report.files.report.is_none());
    assert!(report.files.charts.is_empty());
    assert!(!temp_dir.path().join("out").join(CHARTS_DIR).exists());
}

// ============================================================================
// Progress and Locking Tests
// ============================================================================

#[test]
fn test_progress_events_follow_stage_order() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_A);
    let ctx = SalesContext::new(temp_dir.path()).unwrap();
    let pipeline = ctx.pipeline();

    let (tx, rx) = mpsc::channel();
    let handle = std::thread::spawn(move || pipeline.run(&source, &tx).map(|r| r.rows_out));
    let rows = handle.join().unwrap().unwrap();
    assert_eq!(rows, 5);

    let events: Vec<_> = rx.iter().collect();
    assert!(events.iter().all(|e| e.success));
    let steps: Vec<PipelineStep> = events.iter().map(|e| e.step).collect();
    assert_eq!(
        steps,
        vec![
            PipelineStep::Load,
            PipelineStep::Clean,
            PipelineStep::Analyze,
            PipelineStep::Persist,
            PipelineStep::Verify,
            PipelineStep::Charts,
            PipelineStep::Report,
            PipelineStep::Done,
        ]
    );
}

#[test]
fn test_run_fails_while_store_is_locked() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_A);
    let ctx = SalesContext::new(temp_dir.path()).unwrap();

    let held = RunLock::acquire(ctx.repository.db_path()).unwrap();
    let (tx, rx) = mpsc::channel();
    let err = ctx.pipeline().run(&source, &tx).unwrap_err();
    assert!(matches!(err, Error::State(_)));
    assert_eq!(ctx.repository.get_sales_count().unwrap(), 0);

    let event = rx.try_recv().unwrap();
    assert_eq!(event.step, PipelineStep::Load);
    assert!(!event.success);

    drop(held);
    assert!(ctx.pipeline().run(&source, &NoProgress).is_ok());
}

#[test]
fn test_context_reopen_keeps_data() {
    let temp_dir = TempDir::new().unwrap();
    let source = write_source(&temp_dir, "ventas.csv", SCENARIO_A);

    {
        let ctx = SalesContext::new(temp_dir.path()).unwrap();
        ctx.pipeline().run(&source, &NoProgress).unwrap();
    }

    // Reopening applies no migrations and keeps every row
    let ctx = SalesContext::new(temp_dir.path()).unwrap();
    assert!(ctx.repository.run_migrations().unwrap().applied.is_empty());
    assert_eq!(ctx.repository.get_sales_count().unwrap(), 5);
}
