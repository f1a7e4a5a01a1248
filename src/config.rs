//! Run Configuration
//! `rki-report.toml`: every field optional, defaults reproduce the
//! published 2020 report.

use crate::charts::{PlotConfig, MAX_FIGURE_SIDE, MIN_FIGURE_SIDE};
use crate::data::{default_paths, NormalizeOptions, SourceId};
use crate::stats::analysis::{AnalysisOptions, DEFAULT_POPULATION};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = "rki-report.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Unknown source '{0}' in [sources]")]
    UnknownSource(String),
    #[error("Invalid config value: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    /// Report year of the weekly case aggregations.
    pub report_year: i64,
    /// Year of the first row of the test tables.
    pub first_test_year: i32,
    pub nowcasting_max_rows: Option<usize>,
    pub delay_window: i64,
    pub top_settings: usize,
    /// Population per state, in thousands.
    pub population: BTreeMap<String, f64>,
    /// Per-source file overrides, keyed like `case_overview`. Relative
    /// paths resolve against `data_dir`.
    pub sources: BTreeMap<String, PathBuf>,
    pub plot: PlotConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/RKI"),
            results_dir: PathBuf::from("results"),
            report_year: 2020,
            first_test_year: 2020,
            nowcasting_max_rows: None,
            delay_window: 30,
            top_settings: 10,
            population: DEFAULT_POPULATION
                .iter()
                .map(|(state, n)| (state.to_string(), *n))
                .collect(),
            sources: BTreeMap::new(),
            plot: PlotConfig::default(),
        }
    }
}

impl Config {
    /// Read and validate a TOML config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Config = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// `path` if given, else `rki-report.toml` when present, else defaults.
    pub fn resolve(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => {
                Self::load(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for key in self.sources.keys() {
            if !SourceId::ALL.iter().any(|id| id.key() == key) {
                return Err(ConfigError::UnknownSource(key.clone()));
            }
        }
        if self.delay_window < 0 {
            return Err(ConfigError::Invalid(format!(
                "delay_window must not be negative, got {}",
                self.delay_window
            )));
        }
        if let Some((state, n)) = self.population.iter().find(|(_, n)| **n <= 0.0) {
            return Err(ConfigError::Invalid(format!(
                "population of {state} must be positive, got {n}"
            )));
        }
        let invalid = self.plot.invalid_colors();
        if !invalid.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "unknown colors: {}",
                invalid.join(", ")
            )));
        }
        let sizes = self.plot.invalid_sizes();
        if !sizes.is_empty() {
            return Err(ConfigError::Invalid(format!(
                "figure sizes must be {MIN_FIGURE_SIDE}..={MAX_FIGURE_SIDE} pixels per side: {}",
                sizes.join(", ")
            )));
        }
        Ok(())
    }

    /// Location of every source, overrides applied.
    pub fn source_paths(&self) -> Vec<(SourceId, PathBuf)> {
        default_paths(&self.data_dir)
            .into_iter()
            .map(|(id, default)| match self.sources.get(id.key()) {
                Some(path) => (id, self.data_dir.join(path)),
                None => (id, default),
            })
            .collect()
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions {
            nowcasting_max_rows: self.nowcasting_max_rows,
            first_test_year: self.first_test_year,
        }
    }

    pub fn analysis_options(&self) -> AnalysisOptions {
        AnalysisOptions {
            report_year: self.report_year,
            population: self.population.clone(),
            delay_window: self.delay_window,
            top_settings: self.top_settings,
        }
    }
}
