//! Stats module - Aggregations and statistical computations

pub mod analysis;
mod calculator;
pub mod matrix;

pub use analysis::{AnalysisError, AnalysisOptions, ReportAnalysis};
pub use calculator::{DescriptiveStats, Histogram, StatsCalculator};
pub use matrix::LabeledMatrix;
