//! Sales Core - Load, clean, aggregate and persist sales data
//!
//! This crate implements the pipeline following hexagonal architecture:
//!
//! - **domain**: Core entities (SalesRecord, AggregateResult, etc.)
//! - **ports**: Trait definitions for external dependencies (TabularSource, ChartRenderer)
//! - **services**: Business logic orchestration (cleaning, analysis, pipeline runs)
//! - **adapters**: Concrete implementations (CSV, Excel, DuckDB, report workbook)

pub mod adapters;
pub mod config;
pub mod domain;
pub mod log_migrations;
pub mod migrations;
pub mod ports;
pub mod services;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use adapters::duckdb::DuckDbRepository;
use config::Config;
use domain::result::Result;
use services::*;

// Re-export commonly used types at crate root
pub use adapters::duckdb::QueryResult;
pub use config::ColumnMappings;
pub use domain::result::{Error, OperationResult};
pub use domain::{AggregateResult, CleanedRecordSet, RawRecordSet, SalesRecord, YearMonth};
pub use ports::{PipelineStep, ProgressEvent, ProgressSink};

/// Main context for sales operations
///
/// Holds the configuration, the store connection and the read-side
/// services. Pipeline runs are built on demand with [`SalesContext::pipeline`].
pub struct SalesContext {
    pub config: Config,
    pub data_dir: PathBuf,
    pub repository: Arc<DuckDbRepository>,
    pub status_service: StatusService,
    pub query_service: QueryService,
}

impl SalesContext {
    /// Open the store in `data_dir`, creating its schema if needed
    pub fn new(data_dir: &Path) -> Result<Self> {
        let config = Config::load(data_dir)?;
        Self::with_config(data_dir, config)
    }

    /// Like [`SalesContext::new`] with an already resolved configuration
    pub fn with_config(data_dir: &Path, config: Config) -> Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let db_path = config.db_path(data_dir);
        let repository = Arc::new(DuckDbRepository::new(&db_path)?);

        repository.ensure_schema()?;

        let status_service = StatusService::new(Arc::clone(&repository));
        let query_service = QueryService::new(Arc::clone(&repository));

        Ok(Self {
            config,
            data_dir: data_dir.to_path_buf(),
            repository,
            status_service,
            query_service,
        })
    }

    /// A pipeline bound to this context's store and configuration
    pub fn pipeline(&self) -> PipelineService {
        PipelineService::new(Arc::clone(&self.repository), self.config.clone())
    }
}
