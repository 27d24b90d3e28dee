//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on one stage of the pipeline or one read-side feature.

mod analyzer;
pub mod cleaner;
pub mod export;
pub mod loader;
pub mod logging;
pub mod migration;
pub mod pipeline;
mod query;
mod status;

pub use analyzer::SalesAnalyzer;
pub use export::{ExportService, ExportedFiles};
pub use loader::Preview;
pub use logging::{EntryPoint, LogEntry, LogEvent, LoggingService};
pub use migration::{MigrationResult, MigrationService};
pub use pipeline::{PipelineReport, PipelineService, PipelineSession};
pub use query::QueryService;
pub use status::{DateRange, StatusService, StatusSummary};
