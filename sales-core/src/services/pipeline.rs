//! Pipeline service - load, clean, analyze, persist, verify, export
//!
//! `PipelineSession` holds the stage outputs of one run and refuses to run a
//! stage before the one it depends on. `PipelineService::run` drives a
//! session end to end under the store run lock and reports progress through
//! a `ProgressSink`.
//!
//! A run is committed to the store last. Verification and every export read
//! the written but uncommitted run, so any failure rolls the store back.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;

use crate::adapters::chart::JsonChartRenderer;
use crate::adapters::duckdb::{DuckDbRepository, PendingRun};
use crate::adapters::lock::RunLock;
use crate::config::{ColumnMappings, Config};
use crate::domain::result::{Error, Result};
use crate::domain::{AggregateResult, CleanedRecordSet, RawRecordSet, SourceFormat};
use crate::ports::{ChartRenderer, PipelineStep, ProgressEvent, ProgressSink};
use crate::services::export::{ExportService, ExportedFiles};
use crate::services::logging::{LogEvent, LoggingService};
use crate::services::{cleaner, loader, SalesAnalyzer};

/// Stage outputs of a single run, filled in order
#[derive(Debug, Default)]
pub struct PipelineSession {
    raw: Option<RawRecordSet>,
    cleaned: Option<CleanedRecordSet>,
}

impl PipelineSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a source file. Any previous stage output is discarded.
    pub fn load(
        &mut self,
        path: &Path,
        mappings: Option<&ColumnMappings>,
    ) -> Result<&RawRecordSet> {
        self.cleaned = None;
        let raw = loader::load_records_with(path, mappings)?;
        Ok(self.raw.insert(raw))
    }

    pub fn clean(&mut self) -> Result<&CleanedRecordSet> {
        let raw = self
            .raw
            .as_ref()
            .ok_or_else(|| Error::state("no data loaded; load a file before cleaning"))?;
        let cleaned = cleaner::clean(raw);
        Ok(self.cleaned.insert(cleaned))
    }

    pub fn raw(&self) -> Option<&RawRecordSet> {
        self.raw.as_ref()
    }

    pub fn cleaned(&self) -> Option<&CleanedRecordSet> {
        self.cleaned.as_ref()
    }

    fn require_cleaned(&self, action: &str) -> Result<&CleanedRecordSet> {
        self.cleaned
            .as_ref()
            .ok_or_else(|| Error::state(format!("data not cleaned; clean before {}", action)))
    }

    /// Analyzer over the cleaned records
    pub fn analyze(&self) -> Result<SalesAnalyzer<'_>> {
        SalesAnalyzer::new(self.require_cleaned("analyzing")?)
    }

    /// Write the cleaned records as CSV
    pub fn save_cleaned(&self, export: &ExportService) -> Result<PathBuf> {
        let cleaned = self.require_cleaned("saving cleaned data")?;
        let source = self
            .raw
            .as_ref()
            .map(|r| r.source.clone())
            .unwrap_or_default();
        export.write_cleaned_csv(&source, cleaned)
    }

    /// Write the cleaned records and their aggregate over the stored run
    ///
    /// Nothing is kept unless the returned run is committed.
    pub fn persist<'r>(
        &self,
        repository: &'r DuckDbRepository,
        aggregate: &AggregateResult,
    ) -> Result<PendingRun<'r>> {
        let cleaned = self.require_cleaned("saving to the store")?;
        repository.begin_run(cleaned.records(), aggregate)
    }
}

/// Outcome of a completed run
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    pub source: PathBuf,
    pub format: SourceFormat,
    pub rows_in: usize,
    pub rows_out: usize,
    pub removed: usize,
    pub aggregate: AggregateResult,
    pub files: ExportedFiles,
    pub duration_ms: u128,
}

/// Runs the whole pipeline against one store
pub struct PipelineService {
    repository: Arc<DuckDbRepository>,
    config: Config,
    logger: Option<Arc<LoggingService>>,
    chart_renderer: Option<Box<dyn ChartRenderer>>,
}

impl PipelineService {
    pub fn new(repository: Arc<DuckDbRepository>, config: Config) -> Self {
        Self {
            repository,
            config,
            logger: None,
            chart_renderer: None,
        }
    }

    /// Record pipeline events in the event log
    pub fn with_logger(mut self, logger: Arc<LoggingService>) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Replace the default JSON chart writer
    pub fn with_chart_renderer(mut self, renderer: Box<dyn ChartRenderer>) -> Self {
        self.chart_renderer = Some(renderer);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run every stage for `source`
    ///
    /// Fails with a state error if another run holds the store. On any
    /// failure the store keeps its previous contents and the output files
    /// this run wrote are removed.
    pub fn run(&self, source: &Path, progress: &dyn ProgressSink) -> Result<PipelineReport> {
        let started = Instant::now();
        self.log(LogEvent::new("pipeline_started").with_command("run"));
        tracing::info!(source = %source.display(), "pipeline started");

        let result = self.run_stages(source, progress, started);
        let elapsed = started.elapsed().as_millis();

        match &result {
            Ok(report) => {
                self.log(
                    LogEvent::new("pipeline_completed")
                        .with_command("run")
                        .with_source_format(report.format.as_str())
                        .with_rows(report.rows_in, report.rows_out)
                        .with_duration_ms(elapsed),
                );
                tracing::info!(duration_ms = elapsed as u64, "pipeline completed");
            }
            Err(e) => {
                self.log(
                    LogEvent::new("pipeline_failed")
                        .with_command("run")
                        .with_duration_ms(elapsed)
                        .with_error(e.to_string())
                        .with_error_details(e.kind()),
                );
                tracing::error!(error = %e, "pipeline failed");
            }
        }

        result
    }

    fn run_stages(
        &self,
        source: &Path,
        progress: &dyn ProgressSink,
        started: Instant,
    ) -> Result<PipelineReport> {
        let _lock = if self.repository.is_in_memory() {
            None
        } else {
            Some(stage(progress, PipelineStep::Load, || {
                RunLock::acquire(self.repository.db_path())
            })?)
        };

        let top_n = i64::try_from(self.config.top_n)
            .map_err(|_| Error::invalid_argument("topN is too large"))?;
        let export = ExportService::new(&self.config.output_dir);
        let mut session = PipelineSession::new();

        let (rows_loaded, format) = stage(progress, PipelineStep::Load, || {
            session
                .load(source, self.config.columns.as_ref())
                .map(|raw| (raw.len(), raw.format))
        })?;
        progress.report(ProgressEvent::ok(
            PipelineStep::Load,
            format!("Loaded {} rows from {}", rows_loaded, source.display()),
        ));

        stage(progress, PipelineStep::Clean, || session.clean().map(|_| ()))?;
        let cleaned = session.require_cleaned("reporting")?;
        progress.report(ProgressEvent::ok(
            PipelineStep::Clean,
            format!("Kept {} rows, removed {}", cleaned.len(), cleaned.removed),
        ));

        let aggregate = stage(progress, PipelineStep::Analyze, || {
            session.analyze()?.full_summary_with(top_n)
        })?;
        progress.report(ProgressEvent::ok(
            PipelineStep::Analyze,
            format!(
                "Most sold: {} ({} units)",
                aggregate.most_sold_product.product, aggregate.most_sold_product.quantity
            ),
        ));

        let pending = stage(progress, PipelineStep::Persist, || {
            session.persist(&self.repository, &aggregate)
        })?;
        progress.report(ProgressEvent::ok(
            PipelineStep::Persist,
            format!("Wrote {} sales", cleaned.len()),
        ));

        stage(progress, PipelineStep::Verify, || {
            verify(&pending, &aggregate, top_n)
        })?;
        progress.report(ProgressEvent::ok(
            PipelineStep::Verify,
            "Stored aggregates match the computed ones",
        ));

        let mut files = ExportedFiles::default();
        let committed = self
            .export(&session, &pending, &aggregate, &export, &mut files, progress)
            .and_then(|()| stage(progress, PipelineStep::Persist, || pending.commit()));
        if let Err(e) = committed {
            files.remove_all();
            return Err(e);
        }

        progress.report(ProgressEvent::ok(PipelineStep::Done, "Analysis complete"));

        Ok(PipelineReport {
            source: source.to_path_buf(),
            format,
            rows_in: cleaned.input_rows,
            rows_out: cleaned.len(),
            removed: cleaned.removed,
            aggregate,
            files,
            duration_ms: started.elapsed().as_millis(),
        })
    }

    /// Write charts, cleaned data and the report from the uncommitted run
    ///
    /// Each path goes into `files` as soon as it is written.
    fn export(
        &self,
        session: &PipelineSession,
        pending: &PendingRun<'_>,
        aggregate: &AggregateResult,
        export: &ExportService,
        files: &mut ExportedFiles,
        progress: &dyn ProgressSink,
    ) -> Result<()> {
        let chart_top_n = i64::try_from(self.config.chart_top_n)
            .map_err(|_| Error::invalid_argument("chartTopN is too large"))?;

        if self.config.generate_charts {
            files.charts = stage(progress, PipelineStep::Charts, || {
                let monthly = pending.query_monthly_revenue()?;
                let top = pending.query_top_products(chart_top_n)?;
                match &self.chart_renderer {
                    Some(renderer) => export.render_charts(renderer.as_ref(), &monthly, &top),
                    None => {
                        let renderer = JsonChartRenderer::new(export.charts_dir());
                        export.render_charts(&renderer, &monthly, &top)
                    }
                }
            })?;
            progress.report(ProgressEvent::ok(
                PipelineStep::Charts,
                format!("Wrote {} charts", files.charts.len()),
            ));
        }

        let cleaned_csv = stage(progress, PipelineStep::Report, || {
            session.save_cleaned(export)
        })?;
        files.cleaned_csv = Some(cleaned_csv.clone());

        if self.config.export_report {
            let cleaned = session.require_cleaned("reporting")?;
            let report = stage(progress, PipelineStep::Report, || {
                export.write_report(cleaned, aggregate)
            })?;
            files.report = Some(report.clone());
            progress.report(ProgressEvent::ok(
                PipelineStep::Report,
                format!("Report saved to {}", report.display()),
            ));
        } else {
            progress.report(ProgressEvent::ok(
                PipelineStep::Report,
                format!("Cleaned data saved to {}", cleaned_csv.display()),
            ));
        }
        Ok(())
    }

    fn log(&self, event: LogEvent) {
        if let Some(logger) = &self.logger {
            if let Err(e) = logger.log(event) {
                tracing::warn!(error = %e, "failed to write event log");
            }
        }
    }
}

/// Re-derive rankings and monthly revenue in SQL from the written run and compare
fn verify(pending: &PendingRun<'_>, aggregate: &AggregateResult, top_n: i64) -> Result<()> {
    let stored_top = pending.query_top_products(top_n)?;
    if stored_top != aggregate.top_by_quantity {
        return Err(Error::persistence(
            "stored top products do not match the computed ranking",
        ));
    }

    let stored_monthly = pending.query_monthly_revenue()?;
    if stored_monthly != aggregate.monthly_revenue {
        return Err(Error::persistence(
            "stored monthly revenue does not match the computed totals",
        ));
    }
    Ok(())
}

/// Run one stage, reporting a failed progress event if it errors
fn stage<T>(
    progress: &dyn ProgressSink,
    step: PipelineStep,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    f().map_err(|e| {
        progress.report(ProgressEvent::failed(step, e.to_string()));
        e
    })
}
