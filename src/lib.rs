//! RKI Report - COVID-19 surveillance CSV normalization, analysis & charts
//!
//! Reads the Robert Koch Institute CSV exports, normalizes them into typed
//! tables with a fixed column vocabulary, aggregates them and renders the
//! report charts.

pub mod charts;
pub mod config;
pub mod data;
pub mod logging;
pub mod pipeline;
pub mod stats;

pub use config::{Config, ConfigError};
pub use pipeline::{run, PipelineError, RunOptions, Summary};
