//! Report Analysis
//! Read-only aggregations over the normalized tables: weekly case counts,
//! incidences, age distribution, report delays, outbreak settings and
//! clinical rates.

use crate::data::schema::{age, cases, clinical, outbreaks};
use crate::data::{read_ints, AgeDistribution, DataProcessor, NormalizedTables};
use crate::stats::calculator::{DescriptiveStats, Histogram, StatsCalculator};
use crate::stats::matrix::{f64_values, string_values, LabeledMatrix};
use polars::prelude::*;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{debug, warn};

/// State population in thousands.
pub const DEFAULT_POPULATION: [(&str, f64); 16] = [
    ("Baden-Württemberg", 11100.0),
    ("Bayern", 13125.0),
    ("Berlin", 3669.0),
    ("Brandenburg", 2522.0),
    ("Bremen", 681.0),
    ("Hamburg", 1847.0),
    ("Hessen", 6288.0),
    ("Mecklenburg-Vorpommern", 1608.0),
    ("Niedersachsen", 7994.0),
    ("Nordrhein-Westfalen", 17947.0),
    ("Rheinland-Pfalz", 4094.0),
    ("Saarland", 987.0),
    ("Sachsen", 4072.0),
    ("Sachsen-Anhalt", 2195.0),
    ("Schleswig-Holstein", 2904.0),
    ("Thüringen", 2133.0),
];

/// Derived clinical columns.
pub mod derived {
    pub const SYMPTOM_STATUS_KNOWN: &str = "symptom_status_known";
    pub const HOSPITAL_STATUS_KNOWN: &str = "hospital_status_known";
    pub const NO_SYMPTOMS_NUM: &str = "no_symptoms_num";
    pub const DEATH_VS_TOT: &str = "death_vs_tot";
    pub const HOSPITAL_VS_TOT: &str = "hospital_vs_tot";
    pub const ASYMPTOMATIC_VS_TOT: &str = "asymptomatic_vs_tot";
}

/// Columns of the clinical correlation matrix.
pub const CORRELATED: [&str; 3] = [clinical::CASES_TOT, clinical::HOSPITAL_NUM, clinical::DEATHS_NUM];

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("{table}: row '{label}' is missing")]
    MissingRow { table: &'static str, label: String },
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub report_year: i64,
    /// State name to population in thousands.
    pub population: BTreeMap<String, f64>,
    /// Report delays kept in `-delay_window..=delay_window`.
    pub delay_window: i64,
    pub top_settings: usize,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            report_year: 2020,
            population: DEFAULT_POPULATION
                .iter()
                .map(|(state, n)| (state.to_string(), *n))
                .collect(),
            delay_window: 30,
            top_settings: 10,
        }
    }
}

impl AnalysisOptions {
    pub fn total_population(&self) -> f64 {
        self.population.values().sum()
    }
}

/// Everything the charts and the summary read.
#[derive(Debug, Clone)]
pub struct ReportAnalysis {
    pub total_cases: i64,
    /// Weeks x `cases`.
    pub weekly_cases: LabeledMatrix,
    /// States x weeks.
    pub weekly_cases_per_state: LabeledMatrix,
    pub incidence_per_state: LabeledMatrix,
    /// Weeks x `incidence`.
    pub weekly_incidence: LabeledMatrix,
    /// Age groups x periods, `Gesamt` row included.
    pub age_incidence: LabeledMatrix,
    pub age_incidence_relative: LabeledMatrix,
    pub age_totals: LabeledMatrix,
    pub report_delays: Vec<i64>,
    pub delay_stats: DescriptiveStats,
    pub delay_histogram: Histogram,
    pub report_dayofweek: Histogram,
    /// Weeks x `num_outbreaks`.
    pub outbreaks_per_week: LabeledMatrix,
    /// Weeks x settings.
    pub outbreaks_per_setting: LabeledMatrix,
    pub top_settings: Vec<String>,
    pub outbreak_shares: LabeledMatrix,
    /// Clinical table with percent scaling and derived rates.
    pub clinical: DataFrame,
    pub hospitalized_cum: f64,
    pub deaths_cum: f64,
    pub clinical_correlations: LabeledMatrix,
}

impl ReportAnalysis {
    pub fn compute(
        tables: &NormalizedTables,
        options: &AnalysisOptions,
    ) -> Result<Self, AnalysisError> {
        let weekly = weekly_cases(&tables.cases, options.report_year)?;
        let per_state = weekly_cases_per_state(&tables.cases, options.report_year)?;
        let incidence_per_state = incidence_per_state(&per_state, &options.population);
        let weekly_incidence = weekly_incidence(&weekly, options.total_population());

        let age_incidence = age_incidence(&tables.age)?;
        let age_incidence_relative = age_incidence_relative(&age_incidence)?;
        let age_totals = age_totals(&tables.age)?;

        let report_delays = report_delays(&tables.cases, options.delay_window)?;
        let delay_values: Vec<f64> = report_delays.iter().map(|d| *d as f64).collect();
        let delay_stats = StatsCalculator::compute_descriptive_stats(&delay_values);
        let delay_histogram = StatsCalculator::integer_histogram(
            &report_delays,
            -options.delay_window,
            options.delay_window,
        );
        let dayofweek: Vec<i64> = read_ints(&tables.cases, cases::REPORT_DATE_DAYOFWEEK)?
            .into_iter()
            .flatten()
            .collect();
        let report_dayofweek = StatsCalculator::integer_histogram(&dayofweek, 0, 6);

        let outbreaks_per_week = outbreaks_per_week(&tables.outbreaks)?;
        let outbreaks_per_setting = outbreaks_per_setting(&tables.outbreaks)?;
        let top_settings = top_settings(&outbreaks_per_setting, options.top_settings);
        let outbreak_shares = outbreak_shares(&outbreaks_per_setting);

        let clinical = clinical_rates(&tables.clinical)?;
        let (hospitalized_cum, deaths_cum) = cumulative_rates(&clinical)?;
        let clinical_correlations = StatsCalculator::correlation_matrix(&clinical, &CORRELATED)?;

        debug!(
            weeks = weekly.nrows(),
            delays = report_delays.len(),
            settings = outbreaks_per_setting.ncols(),
            "analysis complete"
        );

        Ok(Self {
            total_cases: total_cases(&tables.cases)?,
            weekly_cases: weekly,
            weekly_cases_per_state: per_state,
            incidence_per_state,
            weekly_incidence,
            age_incidence,
            age_incidence_relative,
            age_totals,
            report_delays,
            delay_stats,
            delay_histogram,
            report_dayofweek,
            outbreaks_per_week,
            outbreaks_per_setting,
            top_settings,
            outbreak_shares,
            clinical,
            hospitalized_cum,
            deaths_cum,
            clinical_correlations,
        })
    }
}

/// Integer column with nulls counted as 0.
fn counts(df: &DataFrame, name: &str) -> PolarsResult<Vec<i64>> {
    Ok(read_ints(df, name)?
        .into_iter()
        .map(|v| v.unwrap_or(0))
        .collect())
}

/// All newly reported cases.
pub fn total_cases(cases_df: &DataFrame) -> PolarsResult<i64> {
    Ok(counts(cases_df, cases::CASES)?.iter().sum())
}

fn cases_in_year(cases_df: &DataFrame, year: i64) -> PolarsResult<DataFrame> {
    cases_df
        .clone()
        .lazy()
        .filter(col(cases::REPORT_DATE_YEAR).eq(lit(year)))
        .collect()
}

/// Cases per report week of `year`.
pub fn weekly_cases(cases_df: &DataFrame, year: i64) -> PolarsResult<LabeledMatrix> {
    let df = cases_in_year(cases_df, year)?;
    let weeks = counts(&df, cases::REPORT_DATE_WEEK)?;
    let n = counts(&df, cases::CASES)?;
    Ok(LabeledMatrix::pivot_sum(
        weeks
            .into_iter()
            .zip(n)
            .map(|(week, n)| (week, cases::CASES, n as f64)),
    ))
}

/// Cases per state and report week of `year`; absent combinations are 0.
pub fn weekly_cases_per_state(cases_df: &DataFrame, year: i64) -> PolarsResult<LabeledMatrix> {
    let grouped = cases_in_year(cases_df, year)?
        .lazy()
        .group_by([col(cases::STATE), col(cases::REPORT_DATE_WEEK)])
        .agg([col(cases::CASES).sum()])
        .collect()?;

    let states = string_values(&grouped, cases::STATE)?;
    let weeks = counts(&grouped, cases::REPORT_DATE_WEEK)?;
    let n = counts(&grouped, cases::CASES)?;
    Ok(LabeledMatrix::pivot_sum(
        states
            .into_iter()
            .zip(weeks)
            .zip(n)
            .map(|((state, week), n)| (state, week, n as f64)),
    ))
}

/// Cases per 100,000 inhabitants. Rows without a population are NaN.
pub fn incidence_per_state(
    per_state: &LabeledMatrix,
    population: &BTreeMap<String, f64>,
) -> LabeledMatrix {
    let divisors: Vec<f64> = per_state
        .row_labels
        .iter()
        .map(|state| match population.get(state) {
            Some(thousands) => thousands / 100.0,
            None => {
                warn!(state = %state, "no population figure, incidence left empty");
                f64::NAN
            }
        })
        .collect();
    per_state.div_rows(&divisors)
}

pub fn weekly_incidence(weekly: &LabeledMatrix, total_population: f64) -> LabeledMatrix {
    let mut m = weekly.map(|v| v / total_population * 100.0);
    m.col_labels = vec!["incidence".to_string()];
    m
}

fn age_matrix(df: &DataFrame) -> PolarsResult<LabeledMatrix> {
    let stripped = DataProcessor::strip_column_prefix(df, age::PERIOD_PREFIX)?;
    LabeledMatrix::from_frame(&stripped, age::AGE_GROUP)
}

/// Incidence per age group and period.
pub fn age_incidence(age_tables: &AgeDistribution) -> PolarsResult<LabeledMatrix> {
    age_matrix(&age_tables.incidence)
}

/// Each age group divided by the all-ages row, which is then removed.
pub fn age_incidence_relative(incidence: &LabeledMatrix) -> Result<LabeledMatrix, AnalysisError> {
    let total = incidence
        .row_index(age::TOTAL_ROW)
        .ok_or_else(|| AnalysisError::MissingRow {
            table: "age_incidence",
            label: age::TOTAL_ROW.to_string(),
        })?;
    let reference = incidence.values[total].clone();
    Ok(incidence.div_by_row(&reference).without_row(age::TOTAL_ROW))
}

/// Case totals per age group, without the all-ages row.
pub fn age_totals(age_tables: &AgeDistribution) -> PolarsResult<LabeledMatrix> {
    Ok(age_matrix(&age_tables.totals)?.without_row(age::TOTAL_ROW))
}

/// Report delays inside `-window..=window`.
pub fn report_delays(cases_df: &DataFrame, window: i64) -> PolarsResult<Vec<i64>> {
    let kept = cases_df
        .clone()
        .lazy()
        .filter(
            col(cases::REPORT_DELAY)
                .gt_eq(lit(-window))
                .and(col(cases::REPORT_DELAY).lt_eq(lit(window))),
        )
        .select([col(cases::REPORT_DELAY)])
        .collect()?;
    Ok(read_ints(&kept, cases::REPORT_DELAY)?
        .into_iter()
        .flatten()
        .collect())
}

fn outbreak_cells(df: &DataFrame) -> PolarsResult<(Vec<i64>, Vec<String>, Vec<i64>)> {
    Ok((
        counts(df, outbreaks::WEEK)?,
        string_values(df, outbreaks::SETTING)?,
        counts(df, outbreaks::NUM_OUTBREAKS)?,
    ))
}

pub fn outbreaks_per_week(df: &DataFrame) -> PolarsResult<LabeledMatrix> {
    let (weeks, _, n) = outbreak_cells(df)?;
    Ok(LabeledMatrix::pivot_sum(
        weeks
            .into_iter()
            .zip(n)
            .map(|(week, n)| (week, outbreaks::NUM_OUTBREAKS, n as f64)),
    ))
}

/// Weeks x settings.
pub fn outbreaks_per_setting(df: &DataFrame) -> PolarsResult<LabeledMatrix> {
    let (weeks, settings, n) = outbreak_cells(df)?;
    Ok(LabeledMatrix::pivot_sum(
        weeks
            .into_iter()
            .zip(settings)
            .zip(n)
            .map(|((week, setting), n)| (week, setting, n as f64)),
    ))
}

/// The `n` settings with the most outbreaks overall. Ties keep name order.
pub fn top_settings(per_setting: &LabeledMatrix, n: usize) -> Vec<String> {
    let totals = per_setting.col_sums();
    let mut ranked: Vec<(usize, f64)> = totals.into_iter().enumerate().collect();
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked
        .into_iter()
        .take(n)
        .map(|(j, _)| per_setting.col_labels[j].clone())
        .collect()
}

/// Each setting's share of its week's outbreaks.
pub fn outbreak_shares(per_setting: &LabeledMatrix) -> LabeledMatrix {
    per_setting.div_rows(&per_setting.row_sums())
}

fn ratio(num: &str, den: &str) -> Expr {
    col(num).cast(DataType::Float64) / col(den).cast(DataType::Float64)
}

/// Percent columns scaled to 0..100 and per-case reporting rates added.
pub fn clinical_rates(df: &DataFrame) -> PolarsResult<DataFrame> {
    let percent = [clinical::NO_SYMPTOMS_PERC, clinical::HOSPITAL_PERC, clinical::DEATHS_PERC];
    df.clone()
        .lazy()
        .with_columns(
            percent
                .iter()
                .map(|name| (col(*name) * lit(100.0)).alias(*name))
                .collect::<Vec<_>>(),
        )
        .with_columns([
            ratio(clinical::SYMPTOMS_REPORTED, clinical::CASES_TOT)
                .alias(derived::SYMPTOM_STATUS_KNOWN),
            ratio(clinical::HOSPITAL_REPORTED, clinical::CASES_TOT)
                .alias(derived::HOSPITAL_STATUS_KNOWN),
            (col(clinical::SYMPTOMS_REPORTED).cast(DataType::Float64)
                * col(clinical::NO_SYMPTOMS_PERC)
                / lit(100.0))
            .alias(derived::NO_SYMPTOMS_NUM),
            ratio(clinical::DEATHS_NUM, clinical::CASES_TOT).alias(derived::DEATH_VS_TOT),
            ratio(clinical::HOSPITAL_NUM, clinical::CASES_TOT).alias(derived::HOSPITAL_VS_TOT),
        ])
        .with_columns([
            ratio(derived::NO_SYMPTOMS_NUM, clinical::CASES_TOT)
                .alias(derived::ASYMPTOMATIC_VS_TOT),
        ])
        .collect()
}

/// Hospitalized and deceased shares of all reported cases.
pub fn cumulative_rates(df: &DataFrame) -> PolarsResult<(f64, f64)> {
    let sum = |name: &str| -> PolarsResult<f64> {
        Ok(f64_values(df, name)?.into_iter().filter(|v| !v.is_nan()).sum())
    };
    let total = sum(clinical::CASES_TOT)?;
    Ok((
        sum(clinical::HOSPITAL_NUM)? / total,
        sum(clinical::DEATHS_NUM)? / total,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn case_frame() -> DataFrame {
        DataFrame::new(vec![
            Column::new(cases::STATE.into(), vec!["Berlin", "Bayern", "Berlin", "Berlin"]),
            Column::new(cases::CASES.into(), vec![2_i64, 5, 3, 7]),
            Column::new(cases::REPORT_DELAY.into(), vec![0_i64, -3, 45, 12]),
            Column::new(cases::REPORT_DATE_DAYOFWEEK.into(), vec![0_i64, 1, 1, 6]),
            Column::new(cases::REPORT_DATE_YEAR.into(), vec![2020_i64, 2020, 2020, 2021]),
            Column::new(cases::REPORT_DATE_WEEK.into(), vec![10_i64, 10, 11, 1]),
        ])
        .unwrap()
    }

    #[test]
    fn weekly_cases_filter_the_report_year() {
        let df = case_frame();
        assert_eq!(total_cases(&df).unwrap(), 17);

        let weekly = weekly_cases(&df, 2020).unwrap();
        assert_eq!(weekly.row_labels, vec!["10", "11"]);
        assert_eq!(weekly.column(0), vec![7.0, 3.0]);

        let per_state = weekly_cases_per_state(&df, 2020).unwrap();
        assert_eq!(per_state.row_labels, vec!["Bayern", "Berlin"]);
        assert_eq!(per_state.col_labels, vec!["10", "11"]);
        assert_eq!(per_state.values, vec![vec![5.0, 0.0], vec![2.0, 3.0]]);
    }

    #[test]
    fn incidence_is_per_hundred_thousand() {
        let per_state = LabeledMatrix::new(
            vec!["Berlin".into(), "Atlantis".into()],
            vec!["10".into()],
            vec![vec![3669.0], vec![1.0]],
        );
        let population = AnalysisOptions::default().population;
        let incidence = incidence_per_state(&per_state, &population);
        assert!(approx(incidence.values[0][0], 100.0));
        assert!(incidence.values[1][0].is_nan());

        let weekly = LabeledMatrix::from_series(vec!["10".into()], "cases", vec![831.0]);
        let total = AnalysisOptions::default().total_population();
        assert!(approx(total, 83166.0));
        assert!(approx(weekly_incidence(&weekly, total).values[0][0], 831.0 / 831.66));
    }

    #[test]
    fn relative_age_incidence_divides_by_total_row() {
        let incidence = LabeledMatrix::new(
            vec!["Gesamt".into(), "0 - 4".into(), "80 +".into()],
            vec!["10".into(), "11".into()],
            vec![vec![10.0, 20.0], vec![5.0, 10.0], vec![30.0, 20.0]],
        );
        let relative = age_incidence_relative(&incidence).unwrap();
        assert_eq!(relative.row_labels, vec!["0 - 4", "80 +"]);
        assert_eq!(relative.values, vec![vec![0.5, 0.5], vec![3.0, 1.0]]);

        let missing = incidence.without_row("Gesamt");
        assert!(matches!(
            age_incidence_relative(&missing),
            Err(AnalysisError::MissingRow { .. })
        ));
    }

    #[test]
    fn age_matrices_strip_period_prefix() {
        let frame = DataFrame::new(vec![
            Column::new(age::AGE_GROUP.into(), vec!["Gesamt", "0 - 4"]),
            Column::new("2020_10".into(), vec![100_i64, 4]),
        ])
        .unwrap();
        let tables = AgeDistribution {
            totals: frame.clone(),
            incidence: frame.clone(),
            merged: frame,
        };
        let totals = age_totals(&tables).unwrap();
        assert_eq!(totals.row_labels, vec!["0 - 4"]);
        assert_eq!(totals.col_labels, vec!["10"]);
        assert_eq!(age_incidence(&tables).unwrap().nrows(), 2);
    }

    #[test]
    fn report_delays_keep_the_window() {
        let delays = report_delays(&case_frame(), 30).unwrap();
        assert_eq!(delays, vec![0, -3, 12]);
    }

    #[test]
    fn outbreak_shares_sum_to_one_per_week() {
        let df = DataFrame::new(vec![
            Column::new(outbreaks::WEEK.into(), vec![10_i64, 10, 10, 11, 11]),
            Column::new(
                outbreaks::SETTING.into(),
                vec!["Hospital", "Household", "Work place", "Household", "Hospital"],
            ),
            Column::new(outbreaks::NUM_OUTBREAKS.into(), vec![1_i64, 6, 3, 4, 4]),
        ])
        .unwrap();

        let per_week = outbreaks_per_week(&df).unwrap();
        assert_eq!(per_week.column(0), vec![10.0, 8.0]);

        let per_setting = outbreaks_per_setting(&df).unwrap();
        assert_eq!(per_setting.col_labels, vec!["Hospital", "Household", "Work place"]);
        assert_eq!(top_settings(&per_setting, 2), vec!["Household", "Hospital"]);

        for total in outbreak_shares(&per_setting).row_sums() {
            assert!(approx(total, 1.0));
        }
    }

    #[test]
    fn clinical_rates_scale_percentages() {
        let df = DataFrame::new(vec![
            Column::new(clinical::CASES_TOT.into(), vec![100_i64, 300]),
            Column::new(clinical::SYMPTOMS_REPORTED.into(), vec![80_i64, 150]),
            Column::new(clinical::NO_SYMPTOMS_PERC.into(), vec![0.25, 0.1]),
            Column::new(clinical::HOSPITAL_REPORTED.into(), vec![50_i64, 100]),
            Column::new(clinical::HOSPITAL_NUM.into(), vec![10_i64, 30]),
            Column::new(clinical::HOSPITAL_PERC.into(), vec![0.2, 0.3]),
            Column::new(clinical::DEATHS_NUM.into(), vec![2_i64, 6]),
            Column::new(clinical::DEATHS_PERC.into(), vec![0.02, 0.02]),
        ])
        .unwrap();

        let rates = clinical_rates(&df).unwrap();
        let no_symptoms = f64_values(&rates, clinical::NO_SYMPTOMS_PERC).unwrap();
        assert!(approx(no_symptoms[0], 25.0));
        let num = f64_values(&rates, derived::NO_SYMPTOMS_NUM).unwrap();
        assert!(approx(num[0], 20.0));
        let asym = f64_values(&rates, derived::ASYMPTOMATIC_VS_TOT).unwrap();
        assert!(approx(asym[0], 0.2));
        let known = f64_values(&rates, derived::HOSPITAL_STATUS_KNOWN).unwrap();
        assert!(approx(known[1], 1.0 / 3.0));

        let (hospitalized, deaths) = cumulative_rates(&rates).unwrap();
        assert!(approx(hospitalized, 0.1));
        assert!(approx(deaths, 0.02));
    }
}
