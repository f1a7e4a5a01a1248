//! Report Pipeline
//! ingest -> normalize -> export tables -> analyse -> charts -> summary.

use crate::charts::{ChartRenderer, ChartSpec, RenderError, ValueFormat};
use crate::config::Config;
use crate::data::schema::{self, age, clinical, deaths, nowcast, testing};
use crate::data::{
    load_all, read_dates, read_ints, DataProcessor, IngestionError, NormalizationError,
    NormalizedTables,
};
use crate::stats::analysis::derived;
use crate::stats::matrix::f64_values;
use crate::stats::{AnalysisError, DescriptiveStats, LabeledMatrix, ReportAnalysis};
use polars::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;
use thiserror::Error;
use tracing::{info, warn};

pub const SUMMARY_FILE: &str = "summary.json";
pub const TABLES_DIR: &str = "tables";

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Ingestion(#[from] IngestionError),
    #[error(transparent)]
    Normalization(#[from] NormalizationError),
    #[error(transparent)]
    Analysis(#[from] AnalysisError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("Failed to write {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to export {}: {source}", .path.display())]
    Export { path: PathBuf, source: PolarsError },
    #[error("Polars error: {0}")]
    Polars(#[from] PolarsError),
    #[error("Failed to encode summary: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RunOptions {
    pub skip_charts: bool,
    pub export_tables: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TableShape {
    pub rows: usize,
    pub columns: usize,
}

/// Written to `summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct Summary {
    pub schema_version: u32,
    pub report_year: i64,
    pub total_cases: i64,
    pub report_weeks: usize,
    pub delay_window: i64,
    pub delay_stats: DescriptiveStats,
    pub hospitalized_cum: f64,
    pub deaths_cum: f64,
    pub clinical_correlations: LabeledMatrix,
    pub top_settings: Vec<String>,
    pub join_warnings: Vec<String>,
    pub tables: BTreeMap<String, TableShape>,
    pub exported: Vec<PathBuf>,
    pub charts: Vec<PathBuf>,
}

fn create_dir(path: &Path) -> Result<(), PipelineError> {
    fs::create_dir_all(path).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Run every step for `config`.
pub fn run(config: &Config, options: &RunOptions) -> Result<Summary, PipelineError> {
    let started = Instant::now();
    create_dir(&config.results_dir)?;

    let raw = load_all(&config.source_paths())?;
    let tables = DataProcessor::normalize_all(&raw, &config.normalize_options())?;

    let exported = if options.export_tables {
        export_tables(&tables, &config.results_dir.join(TABLES_DIR))?
    } else {
        Vec::new()
    };

    let analysis = ReportAnalysis::compute(&tables, &config.analysis_options())?;

    let charts = if options.skip_charts {
        Vec::new()
    } else {
        let renderer = ChartRenderer::new(config.plot.clone(), &config.results_dir);
        render_charts(&renderer, &tables, &analysis)?
    };

    let summary = Summary {
        schema_version: schema::SCHEMA_VERSION,
        report_year: config.report_year,
        total_cases: analysis.total_cases,
        report_weeks: analysis.weekly_cases.nrows(),
        delay_window: config.delay_window,
        delay_stats: analysis.delay_stats.clone(),
        hospitalized_cum: analysis.hospitalized_cum,
        deaths_cum: analysis.deaths_cum,
        clinical_correlations: analysis.clinical_correlations.clone(),
        top_settings: analysis.top_settings.clone(),
        join_warnings: tables.warnings.iter().map(|w| w.to_string()).collect(),
        tables: tables
            .named()
            .into_iter()
            .map(|(name, df)| {
                let shape = TableShape {
                    rows: df.height(),
                    columns: df.width(),
                };
                (name.to_string(), shape)
            })
            .collect(),
        exported,
        charts,
    };
    write_summary(&summary, &config.results_dir.join(SUMMARY_FILE))?;

    info!(
        total_cases = summary.total_cases,
        charts = summary.charts.len(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "report complete"
    );
    Ok(summary)
}

/// Every normalized table as `<dir>/<name>.csv`.
pub fn export_tables(tables: &NormalizedTables, dir: &Path) -> Result<Vec<PathBuf>, PipelineError> {
    create_dir(dir)?;
    let mut written = Vec::new();
    for (name, df) in tables.named() {
        let path = dir.join(format!("{name}.csv"));
        let mut file = File::create(&path).map_err(|source| PipelineError::Io {
            path: path.clone(),
            source,
        })?;
        let mut df = df.clone();
        CsvWriter::new(&mut file)
            .include_header(true)
            .finish(&mut df)
            .map_err(|source| PipelineError::Export {
                path: path.clone(),
                source,
            })?;
        written.push(path);
    }
    info!(tables = written.len(), dir = %dir.display(), "exported normalized tables");
    Ok(written)
}

pub fn write_summary(summary: &Summary, path: &Path) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(summary)?;
    fs::write(path, json).map_err(|source| PipelineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// First column of `series` in `labels` order, NaN where a label has no row.
fn aligned(series: &LabeledMatrix, labels: &[String]) -> Vec<f64> {
    labels
        .iter()
        .map(|label| {
            series
                .row_index(label)
                .map_or(f64::NAN, |i| series.values[i][0])
        })
        .collect()
}

fn week_labels(df: &DataFrame, week: &str) -> PolarsResult<Vec<String>> {
    Ok(read_ints(df, week)?
        .into_iter()
        .map(|w| w.map(|w| w.to_string()).unwrap_or_default())
        .collect())
}

fn clinical_labels(df: &DataFrame) -> PolarsResult<Vec<String>> {
    let years = read_ints(df, clinical::YEAR)?;
    let weeks = read_ints(df, clinical::WEEK)?;
    Ok(years
        .into_iter()
        .zip(weeks)
        .map(|(y, w)| match (y, w) {
            (Some(y), Some(w)) => format!("{y}-W{w:02}"),
            _ => String::new(),
        })
        .collect())
}

/// Prediction interval, smoothed when the export carries it. All NaN
/// (no band) when neither bound pair is present.
fn nowcast_band(df: &DataFrame) -> PolarsResult<(Vec<f64>, Vec<f64>)> {
    for (lower, upper) in [
        (nowcast::PRED_LOWER_SMOOTH, nowcast::PRED_UPPER_SMOOTH),
        (nowcast::PRED_LOWER, nowcast::PRED_UPPER),
    ] {
        if df.column(lower).is_ok() && df.column(upper).is_ok() {
            return Ok((f64_values(df, lower)?, f64_values(df, upper)?));
        }
    }
    let missing = vec![f64::NAN; df.height()];
    Ok((missing.clone(), missing))
}

/// Both panels when both have columns, otherwise the one that does.
fn line_or_pair(
    renderer: &ChartRenderer,
    left: &LabeledMatrix,
    right: &LabeledMatrix,
    spec: &ChartSpec,
) -> Result<PathBuf, RenderError> {
    match (left.is_empty(), right.is_empty()) {
        (false, false) => renderer.line_pair(left, right, spec),
        (true, false) => {
            let mut single = spec.clone();
            if let Some(subtitle) = &spec.subtitle {
                single.title = subtitle.clone();
            }
            renderer.line(right, &single)
        }
        _ => renderer.line(left, spec),
    }
}

/// Collects written charts; an empty input only skips its chart.
struct ChartLog(Vec<PathBuf>);

impl ChartLog {
    fn record(&mut self, result: Result<PathBuf, RenderError>) -> Result<(), RenderError> {
        match result {
            Ok(path) => {
                self.0.push(path);
                Ok(())
            }
            Err(RenderError::Empty { chart }) => {
                warn!(chart = %chart, "no data, chart skipped");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Draw every report chart.
pub fn render_charts(
    renderer: &ChartRenderer,
    tables: &NormalizedTables,
    analysis: &ReportAnalysis,
) -> Result<Vec<PathBuf>, PipelineError> {
    let mut log = ChartLog(Vec::new());

    // Age distribution
    log.record(renderer.heatmap(
        &analysis.age_incidence,
        &ChartSpec::new(
            "case incidence (cases/100.000 people) per age group over time",
            "age_incidence",
        )
        .labels("week", "age group"),
    ))?;
    let total_row = analysis
        .age_incidence
        .row_index(age::TOTAL_ROW)
        .map(|i| analysis.age_incidence.values[i].clone())
        .unwrap_or_default();
    log.record(renderer.heatmap_and_line(
        &analysis.age_incidence_relative,
        &total_row,
        &ChartSpec::new(
            "case incidence per age group over time relative to total case incidence",
            "age_incidence_relative",
        )
        .subtitle("total case incidence over time")
        .center(1.0),
    ))?;
    log.record(renderer.heatmap(
        &analysis.age_totals,
        &ChartSpec::new("total cases per age group over time", "age_totals")
            .format(ValueFormat::Integer)
            .labels("week", "age group"),
    ))?;

    // Outbreaks
    let top = &analysis.top_settings;
    log.record(renderer.line(
        &analysis.outbreaks_per_setting.select_columns(top),
        &ChartSpec::new("total outbreaks per setting over time", "outbreaks_per_setting")
            .labels("week", "outbreaks"),
    ))?;
    log.record(renderer.bar(
        &analysis.outbreak_shares.select_columns(top),
        &ChartSpec::new("shares of outbreaks per setting over time", "outbreak_shares")
            .labels("week", "share [%]")
            .stacked()
            .percentage(),
    ))?;

    // Federal states
    log.record(renderer.heatmap(
        &analysis.weekly_cases_per_state,
        &ChartSpec::new("total cases per federal state over time", "cases_per_state")
            .format(ValueFormat::Fixed(0)),
    ))?;
    log.record(renderer.heatmap(
        &analysis.incidence_per_state,
        &ChartSpec::new("case incidence per federal state over time", "incidence_per_state"),
    ))?;
    let incidence_line = aligned(
        &analysis.weekly_incidence,
        &analysis.incidence_per_state.col_labels,
    );
    log.record(renderer.heatmap_and_line(
        &analysis.incidence_per_state,
        &incidence_line,
        &ChartSpec::new(
            "case incidence (cases/100.000 people) per federal state over time",
            "incidence_per_state_total",
        )
        .subtitle("total case incidence over time")
        .format(ValueFormat::Fixed(0)),
    ))?;

    // Report delay
    log.record(renderer.histogram(
        &analysis.delay_histogram,
        &ChartSpec::new("delay between reference and report date", "report_delay")
            .labels("days", "cases"),
    ))?;
    log.record(renderer.histogram(
        &analysis.report_dayofweek,
        &ChartSpec::new("report day of week", "report_dayofweek").labels("day (0 = Monday)", "cases"),
    ))?;

    // Clinical aspects
    let labels = clinical_labels(&analysis.clinical)?;
    let rates = LabeledMatrix::from_present_columns(
        &analysis.clinical,
        labels.clone(),
        &[
            clinical::MEAN_AGE,
            clinical::NO_SYMPTOMS_PERC,
            clinical::HOSPITAL_PERC,
            clinical::DEATHS_PERC,
        ],
    )?;
    log.record(renderer.line(
        &rates,
        &ChartSpec::new(
            "asymptomatic cases vs. hospitalisation and death rates",
            "clinical_rates",
        )
        .labels("week", "%"),
    ))?;
    let reporting = LabeledMatrix::from_columns(
        &analysis.clinical,
        labels,
        &[derived::SYMPTOM_STATUS_KNOWN, derived::HOSPITAL_STATUS_KNOWN],
    )?;
    log.record(renderer.line(
        &reporting,
        &ChartSpec::new(
            "reporting rates of symptoms and hospitalisation status",
            "clinical_reporting",
        )
        .labels("week", "share of cases"),
    ))?;
    log.record(renderer.heatmap(
        &analysis.clinical_correlations,
        &ChartSpec::new("correlation of cases, hospitalisations and deaths", "clinical_correlations")
            .format(ValueFormat::Fixed(2))
            .center(0.0),
    ))?;

    // Nowcast
    let nowcasting = &tables.nowcasting;
    let dates: Vec<String> = read_dates(nowcasting, schema::NOWCASTING.name, nowcast::DATE)?
        .iter()
        .map(|d| d.to_string())
        .collect();
    let estimate = LabeledMatrix::from_present_columns(
        nowcasting,
        dates.clone(),
        &[nowcast::EST_NEW_CASES, nowcast::EST_NEW_CASES_SMOOTH],
    )?;
    let (lower, upper) = nowcast_band(nowcasting)?;
    log.record(renderer.line_band(
        &estimate,
        &lower,
        &upper,
        &ChartSpec::new("nowcast of new cases with prediction interval", "nowcast_cases")
            .labels("date", "cases"),
    ))?;
    let r = LabeledMatrix::from_present_columns(
        nowcasting,
        dates.clone(),
        &[nowcast::EST_R, nowcast::R_LOWER, nowcast::R_UPPER],
    )?;
    let r7 = LabeledMatrix::from_present_columns(
        nowcasting,
        dates,
        &[nowcast::EST_R7, nowcast::R7_LOWER, nowcast::R7_UPPER],
    )?;
    log.record(line_or_pair(
        renderer,
        &r,
        &r7,
        &ChartSpec::new("reproduction number R", "nowcast_r")
            .subtitle("7-day reproduction number R")
            .labels("date", "R"),
    ))?;

    // Deaths and tests
    let death_weeks = week_labels(&tables.deaths, deaths::WEEK)?;
    let by_age =
        LabeledMatrix::from_present_columns(&tables.deaths, death_weeks.clone(), &deaths::BY_AGE)?;
    let by_sex =
        LabeledMatrix::from_present_columns(&tables.deaths, death_weeks, &deaths::BY_SEX_AGE)?;
    log.record(line_or_pair(
        renderer,
        &by_age,
        &by_sex,
        &ChartSpec::new("deaths per week by age", "deaths")
            .subtitle("deaths per week by sex and age")
            .labels("week", "deaths")
            .cycle(1),
    ))?;

    let test_weeks = week_labels(&tables.tests, testing::WEEK)?;
    let capacity = LabeledMatrix::from_present_columns(
        &tables.tests,
        test_weeks.clone(),
        &[testing::DAILY_CAP, testing::WEEKLY_CAP_EST, testing::WEEKLY_CAP_REAL],
    )?;
    let backlog =
        LabeledMatrix::from_present_columns(&tables.tests, test_weeks, &[testing::TESTS_TAILBACK])?;
    log.record(line_or_pair(
        renderer,
        &capacity,
        &backlog,
        &ChartSpec::new("test capacity per week", "tests")
            .subtitle("test backlog per week")
            .labels("week", "tests")
            .cycle(3),
    ))?;

    info!(charts = log.0.len(), dir = %renderer.out_dir().display(), "charts written");
    Ok(log.0)
}
