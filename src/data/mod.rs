//! Data module - source ingestion and normalization

pub mod calendar;
pub mod fields;
pub mod join;
mod loader;
mod processor;
pub mod schema;

pub use join::{JoinMismatchWarning, JoinSide};
pub use loader::{default_paths, load_all, load_source, IngestionError, RawTable, SourceId, SourceSpec};
pub use processor::{
    read_dates, read_ints, AgeDistribution, DataProcessor, NormalizationError, NormalizeOptions,
    NormalizedTables,
};
