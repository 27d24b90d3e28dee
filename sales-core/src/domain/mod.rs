//! Core domain entities
//!
//! Pure data structures with their validation rules - no I/O.

pub mod aggregate;
mod record;
pub mod result;

pub use aggregate::{
    AggregateResult, MetricKind, MetricRow, ProductQuantity, ProductRevenue, SalesStats,
    StoredMetric,
};
pub use record::{CleanedRecordSet, RawRecord, RawRecordSet, SalesRecord, SourceFormat, YearMonth};
