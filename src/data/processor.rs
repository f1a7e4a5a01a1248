//! Data Processor Module
//! Normalizes raw source tables: rename, parse, derive calendar fields,
//! join related tables and correct known anomalies.

use crate::data::calendar::{self, CalendarFields};
use crate::data::fields::{self, FieldError};
use crate::data::join::{join_on, JoinMismatchWarning, JoinSpec};
use crate::data::loader::{RawTable, SourceId};
use crate::data::schema::{
    self, age, cases, deaths, nowcast, testing, FieldRule, TableSchema, UNNAMED_PREFIX,
};
use chrono::NaiveDate;
use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum NormalizationError {
    #[error("{table}: required column '{column}' is missing")]
    MissingColumn { table: &'static str, column: String },
    #[error("{table}: field '{field}' row {row}: cannot parse {value:?} ({reason})")]
    Parse {
        table: &'static str,
        field: String,
        row: usize,
        value: String,
        reason: FieldError,
    },
    #[error("source {0:?} was not ingested")]
    MissingSource(SourceId),
    #[error("Polars error: {0}")]
    PolarsError(#[from] PolarsError),
}

/// Run-level knobs of the normalization rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeOptions {
    /// Keep at most this many nowcast rows (the export appends rows that
    /// are not comparable with the rest).
    pub nowcasting_max_rows: Option<usize>,
    /// Year of the first row of the week-keyed test tables.
    pub first_test_year: i32,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            nowcasting_max_rows: None,
            first_test_year: 2020,
        }
    }
}

/// Both age tables and their join on `age_group`.
#[derive(Debug, Clone)]
pub struct AgeDistribution {
    pub totals: DataFrame,
    pub incidence: DataFrame,
    /// Period columns carry `_total` / `_incidence` suffixes.
    pub merged: DataFrame,
}

/// Every normalized table of one run. Immutable once built.
#[derive(Debug, Clone)]
pub struct NormalizedTables {
    pub cases: DataFrame,
    pub nowcasting: DataFrame,
    pub outbreaks: DataFrame,
    pub age: AgeDistribution,
    pub deaths: DataFrame,
    pub tests: DataFrame,
    pub clinical: DataFrame,
    pub warnings: Vec<JoinMismatchWarning>,
}

impl NormalizedTables {
    /// Named tables in a fixed order, for export.
    pub fn named(&self) -> Vec<(&'static str, &DataFrame)> {
        vec![
            ("cases", &self.cases),
            ("nowcasting", &self.nowcasting),
            ("outbreaks", &self.outbreaks),
            ("age_totals", &self.age.totals),
            ("age_incidence", &self.age.incidence),
            ("age", &self.age.merged),
            ("deaths", &self.deaths),
            ("tests", &self.tests),
            ("clinical", &self.clinical),
        ]
    }
}

fn has_column(df: &DataFrame, name: &str) -> bool {
    df.column(name).is_ok()
}

fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// Parse every cell of `name` (viewed as text) with `parse`.
fn map_cells<T>(
    df: &DataFrame,
    table: &'static str,
    name: &str,
    mut parse: impl FnMut(Option<&str>) -> Result<T, FieldError>,
) -> Result<Vec<T>, NormalizationError> {
    let text = df.column(name)?.cast(&DataType::String)?;
    let cells = text.str()?;
    cells
        .into_iter()
        .enumerate()
        .map(|(idx, cell)| {
            parse(cell).map_err(|reason| NormalizationError::Parse {
                table,
                field: name.to_string(),
                row: idx + 1,
                value: cell.unwrap_or("").to_string(),
                reason,
            })
        })
        .collect()
}

fn date_column(name: &str, dates: &[NaiveDate]) -> PolarsResult<Column> {
    let days: Vec<i32> = dates.iter().map(|d| calendar::to_epoch_days(*d)).collect();
    Column::new(name.into(), days).cast(&DataType::Date)
}

/// Read a parsed date column back into calendar dates.
pub fn read_dates(
    df: &DataFrame,
    table: &'static str,
    name: &str,
) -> Result<Vec<NaiveDate>, NormalizationError> {
    let days = df.column(name)?.cast(&DataType::Int32)?;
    days.i32()?
        .into_iter()
        .enumerate()
        .map(|(idx, d)| {
            d.and_then(calendar::from_epoch_days)
                .ok_or_else(|| NormalizationError::Parse {
                    table,
                    field: name.to_string(),
                    row: idx + 1,
                    value: String::new(),
                    reason: FieldError::Empty,
                })
        })
        .collect()
}

/// Integer view of a column, nulls kept.
pub fn read_ints(df: &DataFrame, name: &str) -> PolarsResult<Vec<Option<i64>>> {
    let ints = df.column(name)?.cast(&DataType::Int64)?;
    Ok(ints.i64()?.into_iter().collect())
}

/// Turns raw source tables into typed tables with the target column names.
pub struct DataProcessor;

impl DataProcessor {
    /// Parse one column with its field rule into a typed column.
    pub fn parse_column(
        df: &DataFrame,
        table: &'static str,
        name: &str,
        rule: FieldRule,
    ) -> Result<Column, NormalizationError> {
        let column = match rule {
            FieldRule::Text => {
                let values = map_cells(df, table, name, |c| Ok(c.map(str::to_string)))?;
                Column::new(name.into(), values)
            }
            FieldRule::Integer => {
                Column::new(name.into(), map_cells(df, table, name, fields::parse_integer)?)
            }
            FieldRule::Censored { below, stand_in } => Column::new(
                name.into(),
                map_cells(df, table, name, |c| fields::parse_censored(c, below, stand_in))?,
            ),
            FieldRule::PlaceholderZero { placeholder } => Column::new(
                name.into(),
                map_cells(df, table, name, |c| {
                    fields::parse_placeholder_zero(c, placeholder)
                })?,
            ),
            FieldRule::PrefixedWeek { prefix } => Column::new(
                name.into(),
                map_cells(df, table, name, |c| fields::parse_prefixed_week(c, prefix))?,
            ),
            FieldRule::DecimalComma { sentinels } => Column::new(
                name.into(),
                map_cells(df, table, name, |c| {
                    fields::parse_decimal_comma(c, sentinels)
                })?,
            ),
            FieldRule::Date { formats } => {
                let dates = map_cells(df, table, name, |c| fields::parse_date(c, formats))?;
                date_column(name, &dates)?
            }
        };
        Ok(column)
    }

    /// Drop, rename and parse according to `schema`.
    ///
    /// Renames only fire when a source alias is present and the target is
    /// not, so a normalized table passes through unchanged.
    pub fn apply_schema(
        df: &DataFrame,
        schema: &TableSchema,
    ) -> Result<DataFrame, NormalizationError> {
        let mut df = df.clone();

        for name in column_names(&df) {
            if name.starts_with(UNNAMED_PREFIX) || schema.drops.contains(&name.as_str()) {
                df = df.drop(&name)?;
            }
        }

        for (target, aliases) in schema.renames {
            if has_column(&df, target) {
                continue;
            }
            if let Some(alias) = aliases.iter().find(|a| has_column(&df, a)) {
                df.rename(alias, (*target).into())?;
            }
        }

        for spec in schema.fields {
            if has_column(&df, spec.name) {
                let parsed = Self::parse_column(&df, schema.name, spec.name, spec.rule)?;
                df.with_column(parsed)?;
            } else if spec.required {
                return Err(NormalizationError::MissingColumn {
                    table: schema.name,
                    column: spec.name.to_string(),
                });
            }
        }

        if let Some(rule) = schema.remaining {
            for name in column_names(&df) {
                if schema.fields.iter().any(|f| f.name == name) {
                    continue;
                }
                let parsed = Self::parse_column(&df, schema.name, &name, rule)?;
                df.with_column(parsed)?;
            }
        }

        debug!(
            table = schema.name,
            rows = df.height(),
            columns = df.width(),
            "applied schema"
        );
        Ok(df)
    }

    /// Append calendar fields derived from `dates` as `<prefix>dayofweek`,
    /// `<prefix>year` and `<prefix>week`.
    fn with_calendar(
        df: &mut DataFrame,
        dates: &[NaiveDate],
        names: [&str; 3],
    ) -> PolarsResult<()> {
        let derived: Vec<CalendarFields> =
            dates.iter().map(|d| CalendarFields::from_date(*d)).collect();
        let [dayofweek, year, week] = names;
        df.with_column(Column::new(
            dayofweek.into(),
            derived.iter().map(|c| c.dayofweek).collect::<Vec<_>>(),
        ))?;
        df.with_column(Column::new(
            year.into(),
            derived.iter().map(|c| c.year).collect::<Vec<_>>(),
        ))?;
        df.with_column(Column::new(
            week.into(),
            derived.iter().map(|c| c.week).collect::<Vec<_>>(),
        ))?;
        Ok(())
    }

    /// Case records: report/reference dates, delay and calendar fields.
    pub fn normalize_cases(raw: &DataFrame) -> Result<DataFrame, NormalizationError> {
        let mut df = Self::apply_schema(raw, &schema::CASES)?;

        let report = read_dates(&df, schema::CASES.name, cases::REPORT_DATE)?;
        let reference = read_dates(&df, schema::CASES.name, cases::REF_DATE)?;
        let delays: Vec<i64> = report
            .iter()
            .zip(&reference)
            .map(|(rep, refd)| calendar::days_between(*rep, *refd))
            .collect();

        df.with_column(Column::new(cases::REPORT_DELAY.into(), delays))?;
        Self::with_calendar(
            &mut df,
            &reference,
            [
                cases::REF_DATE_DAYOFWEEK,
                cases::REF_DATE_YEAR,
                cases::REF_DATE_WEEK,
            ],
        )?;
        Self::with_calendar(
            &mut df,
            &report,
            [
                cases::REPORT_DATE_DAYOFWEEK,
                cases::REPORT_DATE_YEAR,
                cases::REPORT_DATE_WEEK,
            ],
        )?;
        Ok(df)
    }

    /// Nowcast estimates: trailing note rows removed, decimal commas parsed,
    /// week and year derived from the date.
    pub fn normalize_nowcasting(
        raw: &DataFrame,
        options: &NormalizeOptions,
    ) -> Result<DataFrame, NormalizationError> {
        let mut df = raw.clone();
        if let Some(max_rows) = options.nowcasting_max_rows {
            df = df.slice(0, max_rows.min(df.height()));
        }

        let date_source = [nowcast::DATE, "Datum"]
            .into_iter()
            .find(|name| has_column(&df, name));
        if let Some(date_source) = date_source {
            let cells = map_cells(&df, schema::NOWCASTING.name, date_source, |c| {
                Ok(c.map(str::trim).is_some_and(|c| !c.is_empty()))
            })?;
            let keep = cells.iter().rposition(|filled| *filled).map_or(0, |i| i + 1);
            if keep < df.height() {
                debug!(dropped = df.height() - keep, "dropping trailing nowcast rows");
                df = df.slice(0, keep);
            }
        }

        let mut df = Self::apply_schema(&df, &schema::NOWCASTING)?;
        let dates = read_dates(&df, schema::NOWCASTING.name, nowcast::DATE)?;
        let derived: Vec<CalendarFields> =
            dates.iter().map(|d| CalendarFields::from_date(*d)).collect();
        df.with_column(Column::new(
            nowcast::WEEK.into(),
            derived.iter().map(|c| c.week).collect::<Vec<_>>(),
        ))?;
        df.with_column(Column::new(
            nowcast::YEAR.into(),
            derived.iter().map(|c| c.year).collect::<Vec<_>>(),
        ))?;
        Ok(df)
    }

    /// Outbreak counts per reporting week and setting.
    pub fn normalize_outbreaks(raw: &DataFrame) -> Result<DataFrame, NormalizationError> {
        Self::apply_schema(raw, &schema::OUTBREAKS)
    }

    /// Case totals and incidence per age group, plus their join.
    pub fn normalize_age_distribution(
        totals: &DataFrame,
        incidence: &DataFrame,
    ) -> Result<AgeDistribution, NormalizationError> {
        let totals = Self::apply_schema(totals, &schema::AGE_TOTALS)?;
        let incidence = Self::apply_schema(incidence, &schema::AGE_INCIDENCE)?;
        let merged = join_on(
            &totals,
            &incidence,
            JoinSpec::inner("age", age::AGE_GROUP)
                .with_suffixes(age::TOTAL_SUFFIX, age::INCIDENCE_SUFFIX),
        )?;
        Ok(AgeDistribution {
            totals,
            incidence,
            merged: merged.frame,
        })
    }

    /// Weekly deaths: total, by age and by sex and age, outer-joined on week.
    pub fn normalize_deaths(
        weekly: &DataFrame,
        by_age: &DataFrame,
        by_sex_age: &DataFrame,
    ) -> Result<(DataFrame, Vec<JoinMismatchWarning>), NormalizationError> {
        let weekly = Self::apply_schema(weekly, &schema::DEATHS_WEEKLY)?;
        let by_age = Self::apply_schema(by_age, &schema::DEATHS_BY_AGE)?;
        let by_sex_age = Self::apply_schema(by_sex_age, &schema::DEATHS_BY_SEX_AGE)?;

        let first = join_on(&weekly, &by_age, JoinSpec::outer("deaths", deaths::WEEK))?;
        let second = join_on(&first.frame, &by_sex_age, JoinSpec::outer("deaths", deaths::WEEK))?;

        let mut warnings = first.warnings;
        warnings.extend(second.warnings);
        Ok((second.frame, warnings))
    }

    /// Test capacity and backlog, weeks continued past the year boundary,
    /// outer-joined on week with gaps filled by zero.
    pub fn normalize_tests(
        capacity: &DataFrame,
        backlog: &DataFrame,
        options: &NormalizeOptions,
    ) -> Result<(DataFrame, Vec<JoinMismatchWarning>), NormalizationError> {
        let mut capacity = Self::apply_schema(capacity, &schema::TEST_CAPACITY)?;
        let mut backlog = Self::apply_schema(backlog, &schema::TEST_BACKLOG)?;
        for df in [&mut capacity, &mut backlog] {
            let weeks = read_ints(df, testing::WEEK)?;
            let rolled = calendar::roll_over_weeks(&weeks, options.first_test_year);
            df.with_column(Column::new(testing::WEEK.into(), rolled))?;
        }

        let outcome = join_on(&capacity, &backlog, JoinSpec::outer("tests", testing::WEEK))?;
        let filled = outcome
            .frame
            .get_columns()
            .iter()
            .map(|c| {
                c.as_materialized_series()
                    .fill_null(FillNullStrategy::Zero)
                    .map(Column::from)
            })
            .collect::<PolarsResult<Vec<_>>>()?;
        Ok((DataFrame::new(filled)?, outcome.warnings))
    }

    /// Weekly clinical aspects.
    pub fn normalize_clinical(raw: &DataFrame) -> Result<DataFrame, NormalizationError> {
        Self::apply_schema(raw, &schema::CLINICAL)
    }

    /// Normalize every ingested source.
    pub fn normalize_all(
        raw: &[(SourceId, RawTable)],
        options: &NormalizeOptions,
    ) -> Result<NormalizedTables, NormalizationError> {
        let frame = |id: SourceId| -> Result<DataFrame, NormalizationError> {
            let table = raw
                .iter()
                .find(|(source, _)| *source == id)
                .map(|(_, table)| table)
                .ok_or(NormalizationError::MissingSource(id))?;
            Ok(table.to_dataframe()?)
        };

        let cases = Self::normalize_cases(&frame(SourceId::CaseOverview)?)?;
        let nowcasting = Self::normalize_nowcasting(&frame(SourceId::Nowcasting)?, options)?;
        let outbreaks = Self::normalize_outbreaks(&frame(SourceId::Outbreaks)?)?;
        let age = Self::normalize_age_distribution(
            &frame(SourceId::AgeTotals)?,
            &frame(SourceId::AgeIncidence)?,
        )?;
        let (deaths, mut warnings) = Self::normalize_deaths(
            &frame(SourceId::DeathsWeekly)?,
            &frame(SourceId::DeathsByAge)?,
            &frame(SourceId::DeathsBySexAge)?,
        )?;
        let (tests, test_warnings) = Self::normalize_tests(
            &frame(SourceId::TestCapacity)?,
            &frame(SourceId::TestBacklog)?,
            options,
        )?;
        warnings.extend(test_warnings);
        let clinical = Self::normalize_clinical(&frame(SourceId::Clinical)?)?;

        for warning in &warnings {
            warn!(%warning, "join mismatch");
        }
        info!(
            cases = cases.height(),
            nowcasting = nowcasting.height(),
            deaths = deaths.height(),
            tests = tests.height(),
            warnings = warnings.len(),
            "normalized all tables"
        );

        Ok(NormalizedTables {
            cases,
            nowcasting,
            outbreaks,
            age,
            deaths,
            tests,
            clinical,
            warnings,
        })
    }

    /// Remove `prefix` from every column name that starts with it.
    pub fn strip_column_prefix(df: &DataFrame, prefix: &str) -> PolarsResult<DataFrame> {
        let mut out = df.clone();
        for name in column_names(df) {
            if let Some(stripped) = name.strip_prefix(prefix) {
                out.rename(&name, stripped.into())?;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(headers: &[&str], rows: &[&[&str]]) -> DataFrame {
        RawTable {
            headers: headers.iter().map(|s| s.to_string()).collect(),
            rows: rows
                .iter()
                .map(|r| r.iter().map(|s| s.to_string()).collect())
                .collect(),
        }
        .to_dataframe()
        .unwrap()
    }

    fn floats(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap_or(f64::NAN))
            .collect()
    }

    #[test]
    fn nowcast_parses_decimal_commas_and_drops_footer() {
        let df = raw(
            &[
                "Datum",
                "Schätzer_Reproduktionszahl_R",
                "UG_PI_7_Tage_R_Wert",
                "OG_PI_7_Tage_R_Wert",
            ],
            &[
                &["01.03.2020", "1,25", "0,9", "1,1"],
                &["02.03.2020", ".", ".", "."],
                &["", "", "", ""],
            ],
        );
        let out = DataProcessor::normalize_nowcasting(&df, &NormalizeOptions::default()).unwrap();
        assert_eq!(out.height(), 2);
        let est_r = floats(&out, nowcast::EST_R);
        assert_eq!(est_r[0], 1.25);
        assert!(est_r[1].is_nan());
        assert_eq!(floats(&out, nowcast::R7_LOWER)[0], 0.9);
        assert_eq!(floats(&out, nowcast::R7_UPPER)[0], 1.1);
        assert_eq!(read_ints(&out, nowcast::WEEK).unwrap(), vec![Some(9), Some(10)]);
    }

    #[test]
    fn nowcast_row_limit() {
        let df = raw(
            &["Datum", "Schätzer_Reproduktionszahl_R"],
            &[&["01.03.2020", "1,0"], &["02.03.2020", "1,1"], &["03.03.2020", "1,2"]],
        );
        let options = NormalizeOptions {
            nowcasting_max_rows: Some(2),
            ..NormalizeOptions::default()
        };
        let out = DataProcessor::normalize_nowcasting(&df, &options).unwrap();
        assert_eq!(out.height(), 2);
    }

    #[test]
    fn bad_date_names_field_and_row() {
        let df = raw(
            &["Meldedatum", "Refdatum"],
            &[
                &["2020/03/02 00:00:00", "2020/03/01 00:00:00"],
                &["2020/13/45 00:00:00", "2020/03/01 00:00:00"],
            ],
        );
        let err = DataProcessor::normalize_cases(&df).unwrap_err();
        match err {
            NormalizationError::Parse { field, row, value, .. } => {
                assert_eq!(field, cases::REPORT_DATE);
                assert_eq!(row, 2);
                assert_eq!(value, "2020/13/45 00:00:00");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn missing_required_column() {
        let df = raw(&["Meldedatum", "Landkreis"], &[&["2020/03/02 00:00:00", "x"]]);
        let err = DataProcessor::normalize_cases(&df).unwrap_err();
        assert!(matches!(
            err,
            NormalizationError::MissingColumn { column, .. } if column == cases::REF_DATE
        ));
    }

    #[test]
    fn deaths_are_outer_joined_and_uncensored() {
        let weekly = raw(
            &["Sterbejahr", "Sterbewoche", "Anzahl verstorbene COVID-19 Fälle"],
            &[&["2020", "39", "<4"], &["2020", "40", "12"]],
        );
        let by_age = raw(
            &["Sterbjahr", "Sterbewoche", "AG 80-89 Jahre"],
            &[&["2020", "39", "2"]],
        );
        let by_sex = raw(
            &["Sterbjahr", "Sterbewoche", "Frauen, AG 80+ Jahre"],
            &[&["2020", "39", "<4"], &["2020", "40", "5"]],
        );
        let (df, warnings) = DataProcessor::normalize_deaths(&weekly, &by_age, &by_sex).unwrap();

        assert_eq!(read_ints(&df, deaths::WEEK).unwrap(), vec![Some(39), Some(40)]);
        assert_eq!(
            read_ints(&df, deaths::DEATHS_TOTAL).unwrap(),
            vec![Some(3), Some(12)]
        );
        assert_eq!(read_ints(&df, "age_80").unwrap(), vec![Some(2), None]);
        assert_eq!(read_ints(&df, "F80").unwrap(), vec![Some(3), Some(5)]);
        assert!(!has_column(&df, "Sterbejahr"));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].key, "40");
    }

    #[test]
    fn tests_tables_roll_weeks_and_fill_zero() {
        let capacity = raw(
            &[
                "KW, für die die Angabe prognostisch erfolgt ist:",
                "Anzahl übermittelnde Labore",
                "Reale Testkapazität zum Zeitpunkt der Abfrage",
            ],
            &[&["KW52", "150", "-"], &["KW53", "160", "1200000"], &["KW1", "155", "1100000"]],
        );
        let backlog = raw(
            &["KW", "Labore mit Rückstau", "Probenrückstau", ""],
            &[&["53", "40", "9000", ""], &["1", "35", "8000", ""]],
        );
        let (df, warnings) =
            DataProcessor::normalize_tests(&capacity, &backlog, &NormalizeOptions::default())
                .unwrap();

        assert_eq!(
            read_ints(&df, testing::WEEK).unwrap(),
            vec![Some(52), Some(53), Some(54)]
        );
        assert_eq!(
            read_ints(&df, testing::WEEKLY_CAP_REAL).unwrap(),
            vec![Some(0), Some(1_200_000), Some(1_100_000)]
        );
        assert_eq!(
            read_ints(&df, testing::TESTS_TAILBACK).unwrap(),
            vec![Some(0), Some(9000), Some(8000)]
        );
        assert!(!has_column(&df, "unnamed_3"));
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn age_tables_merge_with_suffixes() {
        let totals = raw(
            &["Altersgruppe", "2020_10", "2020_11"],
            &[&["Gesamt", "100", "200"], &["0 - 4", "3", "5"]],
        );
        let incidence = raw(
            &["Altersgruppe", "2020_10", "2020_11"],
            &[&["Gesamt", "1,2", "2,4"], &["0 - 4", "0,1", "."]],
        );
        let age = DataProcessor::normalize_age_distribution(&totals, &incidence).unwrap();
        assert_eq!(floats(&age.incidence, "2020_10"), vec![1.2, 0.1]);
        assert_eq!(
            read_ints(&age.merged, "2020_11_total").unwrap(),
            vec![Some(200), Some(5)]
        );
        assert!(floats(&age.merged, "2020_11_incidence")[1].is_nan());

        let stripped = DataProcessor::strip_column_prefix(&age.totals, age::PERIOD_PREFIX).unwrap();
        assert!(has_column(&stripped, "10"));
        assert!(has_column(&stripped, age::AGE_GROUP));
    }

    #[test]
    fn clinical_drops_index_column() {
        let df = raw(
            &["", "Meldejahr", "MW", "Fälle gesamt", "Männer", "Anteil Verstorben"],
            &[&["0", "2020", "10", "1000", "0,52", "0,01"]],
        );
        let out = DataProcessor::normalize_clinical(&df).unwrap();
        assert!(!has_column(&out, "unnamed_0"));
        assert_eq!(floats(&out, schema::clinical::MALE_PERC), vec![0.52]);
        assert_eq!(read_ints(&out, schema::clinical::CASES_TOT).unwrap(), vec![Some(1000)]);
    }
}
