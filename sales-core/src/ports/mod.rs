//! Port definitions (hexagonal architecture)
//!
//! Ports define the interfaces for external dependencies. The core pipeline
//! depends only on these traits, not on concrete implementations.

pub mod chart;
pub mod progress;
pub mod tabular_source;

pub use chart::{ChartPoint, ChartRenderer, ChartSeries};
pub use progress::{NoProgress, PipelineStep, ProgressEvent, ProgressSink};
pub use tabular_source::{RawTable, TabularSource};
