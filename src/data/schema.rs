//! Table Schema
//! Target column vocabulary and the per-source rename, parse and drop rules.
//!
//! Every column a downstream consumer reads is named by a constant in this
//! module. Source spellings appear only in the rename tables below; a target
//! may list several source aliases because the publisher's headers drift
//! between export revisions.

use crate::data::fields::Missing;

/// Bumped whenever a target name or a field rule changes.
pub const SCHEMA_VERSION: u32 = 1;

/// Columns whose source header was blank get this prefix plus their index.
pub const UNNAMED_PREFIX: &str = "unnamed_";

/// Source date formats, tried in order. ISO comes last so that already
/// normalized output parses again.
pub const CASE_DATE_FORMATS: &[&str] = &["%Y/%m/%d %H:%M:%S", "%Y/%m/%d", "%Y-%m-%d"];
pub const NOWCAST_DATE_FORMATS: &[&str] = &["%d.%m.%Y", "%Y-%m-%d"];

/// `.` marks a value the nowcast could not estimate yet.
pub const DOT_IS_NAN: &[(&str, Missing)] = &[(".", Missing::Nan)];

/// Parse rule for one column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldRule {
    Text,
    Integer,
    /// `"<below>"` is replaced by `stand_in`.
    Censored { below: &'static str, stand_in: i64 },
    DecimalComma { sentinels: &'static [(&'static str, Missing)] },
    PlaceholderZero { placeholder: &'static str },
    PrefixedWeek { prefix: &'static str },
    Date { formats: &'static [&'static str] },
}

/// Death counts below four are published as `"<4"`.
pub const CENSORED_BELOW_4: FieldRule = FieldRule::Censored {
    below: "4",
    stand_in: 3,
};

pub const DECIMAL_DOT_NAN: FieldRule = FieldRule::DecimalComma {
    sentinels: DOT_IS_NAN,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub rule: FieldRule,
    pub required: bool,
}

impl FieldSpec {
    pub const fn required(name: &'static str, rule: FieldRule) -> Self {
        Self {
            name,
            rule,
            required: true,
        }
    }

    pub const fn optional(name: &'static str, rule: FieldRule) -> Self {
        Self {
            name,
            rule,
            required: false,
        }
    }
}

/// Declarative description of one normalized table.
#[derive(Debug, Clone, Copy)]
pub struct TableSchema {
    pub name: &'static str,
    /// `(target, source aliases)`.
    pub renames: &'static [(&'static str, &'static [&'static str])],
    pub fields: &'static [FieldSpec],
    /// Rule for every column not listed in `fields` (wide period tables).
    pub remaining: Option<FieldRule>,
    /// Source columns removed before renaming.
    pub drops: &'static [&'static str],
}

pub mod cases {
    pub const STATE_ID: &str = "state_id";
    pub const STATE: &str = "state";
    pub const DISTRICT: &str = "district";
    pub const DISTRICT_ID: &str = "district_id";
    pub const AGE_GROUP: &str = "age_group";
    pub const SEX: &str = "sex";
    pub const CASES: &str = "cases";
    pub const DEATHS: &str = "deaths";
    pub const RECOVERED: &str = "recovered";
    pub const NEW_CASE: &str = "new_case";
    pub const NEW_DEATH: &str = "new_death";
    pub const NEW_RECOVERED: &str = "new_recovered";
    pub const REF_IS_ONSET: &str = "ref_is_onset";
    pub const REPORT_DATE: &str = "report_date";
    pub const REF_DATE: &str = "ref_date";
    pub const REPORT_DELAY: &str = "report_delay";
    pub const REF_DATE_DAYOFWEEK: &str = "ref_date_dayofweek";
    pub const REF_DATE_YEAR: &str = "ref_date_year";
    pub const REF_DATE_WEEK: &str = "ref_date_week";
    pub const REPORT_DATE_DAYOFWEEK: &str = "report_date_dayofweek";
    pub const REPORT_DATE_YEAR: &str = "report_date_year";
    pub const REPORT_DATE_WEEK: &str = "report_date_week";
}

pub mod nowcast {
    pub const DATE: &str = "date";
    pub const WEEK: &str = "week";
    pub const YEAR: &str = "year";
    pub const EST_NEW_CASES: &str = "est_new_cases";
    pub const PRED_LOWER: &str = "pred_lower";
    pub const PRED_UPPER: &str = "pred_upper";
    pub const EST_NEW_CASES_SMOOTH: &str = "est_new_cases_smooth";
    pub const PRED_LOWER_SMOOTH: &str = "pred_lower_smooth";
    pub const PRED_UPPER_SMOOTH: &str = "pred_upper_smooth";
    pub const EST_R: &str = "est_r";
    pub const R_LOWER: &str = "r_lower";
    pub const R_UPPER: &str = "r_upper";
    pub const EST_R7: &str = "est_r7";
    pub const R7_LOWER: &str = "r7_lower";
    pub const R7_UPPER: &str = "r7_upper";
}

pub mod outbreaks {
    pub const WEEK: &str = "week";
    pub const SETTING: &str = "setting";
    pub const NUM_OUTBREAKS: &str = "num_outbreaks";
}

pub mod age {
    pub const AGE_GROUP: &str = "age_group";
    /// Row holding the all-ages figure.
    pub const TOTAL_ROW: &str = "Gesamt";
    pub const TOTAL_SUFFIX: &str = "_total";
    pub const INCIDENCE_SUFFIX: &str = "_incidence";
    /// Year prefix on period columns (`2020_12`).
    pub const PERIOD_PREFIX: &str = "2020_";
}

pub mod deaths {
    pub const WEEK: &str = "week";
    pub const DEATHS_TOTAL: &str = "deaths_total";
    pub const BY_AGE: [&str; 10] = [
        "age_0", "age_10", "age_20", "age_30", "age_40", "age_50", "age_60", "age_70", "age_80",
        "age_90",
    ];
    pub const BY_SEX_AGE: [&str; 10] = [
        "M0_19", "M20_39", "M40_59", "M60_79", "M80", "F0_19", "F20_39", "F40_59", "F60_79",
        "F80",
    ];
}

pub mod testing {
    pub const WEEK: &str = "week";
    pub const LABORATORIES: &str = "laboratories";
    pub const DAILY_CAP: &str = "daily_cap";
    pub const WEEKLY_CAP_EST: &str = "weekly_cap_est";
    pub const WEEKLY_CAP_REAL: &str = "weekly_cap_real";
    pub const LABORATORIES_TAILBACK: &str = "laboratories_tailback";
    pub const TESTS_TAILBACK: &str = "tests_tailback";
}

pub mod clinical {
    pub const YEAR: &str = "year";
    pub const WEEK: &str = "week";
    pub const CASES_TOT: &str = "cases_tot";
    pub const MEAN_AGE: &str = "mean_age";
    pub const MALE_PERC: &str = "male_perc";
    pub const FEMALE_PERC: &str = "female_perc";
    pub const SYMPTOMS_REPORTED: &str = "symptoms_reported";
    pub const NO_SYMPTOMS_PERC: &str = "no_symptoms_perc";
    pub const HOSPITAL_REPORTED: &str = "hospital_reported";
    pub const HOSPITAL_NUM: &str = "hospital_num";
    pub const HOSPITAL_PERC: &str = "hospital_perc";
    pub const DEATHS_NUM: &str = "deaths_num";
    pub const DEATHS_PERC: &str = "deaths_perc";
}

pub const CASES: TableSchema = TableSchema {
    name: "cases",
    renames: &[
        (cases::STATE_ID, &["IdBundesland"]),
        (cases::STATE, &["Bundesland"]),
        (cases::DISTRICT, &["Landkreis"]),
        (cases::DISTRICT_ID, &["IdLandkreis"]),
        (cases::AGE_GROUP, &["Altersgruppe"]),
        (cases::SEX, &["Geschlecht"]),
        (cases::CASES, &["AnzahlFall"]),
        (cases::DEATHS, &["AnzahlTodesfall"]),
        (cases::RECOVERED, &["AnzahlGenesen"]),
        (cases::NEW_CASE, &["NeuerFall"]),
        (cases::NEW_DEATH, &["NeuerTodesfall"]),
        (cases::NEW_RECOVERED, &["NeuGenesen"]),
        (cases::REF_IS_ONSET, &["IstErkrankungsbeginn"]),
        (cases::REPORT_DATE, &["Meldedatum"]),
        (cases::REF_DATE, &["Refdatum"]),
    ],
    fields: &[
        FieldSpec::required(cases::REPORT_DATE, FieldRule::Date { formats: CASE_DATE_FORMATS }),
        FieldSpec::required(cases::REF_DATE, FieldRule::Date { formats: CASE_DATE_FORMATS }),
        FieldSpec::optional(cases::STATE_ID, FieldRule::Integer),
        FieldSpec::optional(cases::STATE, FieldRule::Text),
        FieldSpec::optional(cases::DISTRICT, FieldRule::Text),
        FieldSpec::optional(cases::DISTRICT_ID, FieldRule::Text),
        FieldSpec::optional(cases::AGE_GROUP, FieldRule::Text),
        FieldSpec::optional(cases::SEX, FieldRule::Text),
        FieldSpec::optional(cases::CASES, FieldRule::Integer),
        FieldSpec::optional(cases::DEATHS, FieldRule::Integer),
        FieldSpec::optional(cases::RECOVERED, FieldRule::Integer),
        FieldSpec::optional(cases::NEW_CASE, FieldRule::Integer),
        FieldSpec::optional(cases::NEW_DEATH, FieldRule::Integer),
        FieldSpec::optional(cases::NEW_RECOVERED, FieldRule::Integer),
        FieldSpec::optional(cases::REF_IS_ONSET, FieldRule::Integer),
    ],
    remaining: None,
    drops: &["Altersgruppe2", "Datenstand", "ObjectId"],
};

pub const NOWCASTING: TableSchema = TableSchema {
    name: "nowcasting",
    renames: &[
        (nowcast::DATE, &["Datum"]),
        (nowcast::EST_NEW_CASES, &["Schätzer_Neuerkrankungen"]),
        (nowcast::PRED_LOWER, &["UG_PI_Neuerkrankungen"]),
        (nowcast::PRED_UPPER, &["OG_PI_Neuerkrankungen"]),
        (nowcast::EST_NEW_CASES_SMOOTH, &["Schätzer_Neuerkrankungen_ma4"]),
        (nowcast::PRED_LOWER_SMOOTH, &["UG_PI_Neuerkrankungen_ma4"]),
        (nowcast::PRED_UPPER_SMOOTH, &["OG_PI_Neuerkrankungen_ma4"]),
        (nowcast::EST_R, &["Schätzer_Reproduktionszahl_R"]),
        (nowcast::R_LOWER, &["UG_PI_Reproduktionszahl_R"]),
        (nowcast::R_UPPER, &["OG_PI_Reproduktionszahl_R"]),
        (nowcast::EST_R7, &["Schätzer_7_Tage_R_Wert"]),
        (nowcast::R7_LOWER, &["UG_PI_7_Tage_R_Wert"]),
        (nowcast::R7_UPPER, &["OG_PI_7_Tage_R_Wert"]),
    ],
    fields: &[
        FieldSpec::required(nowcast::DATE, FieldRule::Date { formats: NOWCAST_DATE_FORMATS }),
        FieldSpec::optional(nowcast::EST_NEW_CASES, DECIMAL_DOT_NAN),
        FieldSpec::optional(nowcast::PRED_LOWER, DECIMAL_DOT_NAN),
        FieldSpec::optional(nowcast::PRED_UPPER, DECIMAL_DOT_NAN),
        FieldSpec::optional(nowcast::EST_NEW_CASES_SMOOTH, DECIMAL_DOT_NAN),
        FieldSpec::optional(nowcast::PRED_LOWER_SMOOTH, DECIMAL_DOT_NAN),
        FieldSpec::optional(nowcast::PRED_UPPER_SMOOTH, DECIMAL_DOT_NAN),
        FieldSpec::required(nowcast::EST_R, DECIMAL_DOT_NAN),
        FieldSpec::optional(nowcast::R_LOWER, DECIMAL_DOT_NAN),
        FieldSpec::optional(nowcast::R_UPPER, DECIMAL_DOT_NAN),
        FieldSpec::optional(nowcast::EST_R7, DECIMAL_DOT_NAN),
        FieldSpec::optional(nowcast::R7_LOWER, DECIMAL_DOT_NAN),
        FieldSpec::optional(nowcast::R7_UPPER, DECIMAL_DOT_NAN),
    ],
    remaining: None,
    drops: &[],
};

pub const OUTBREAKS: TableSchema = TableSchema {
    name: "outbreaks",
    renames: &[
        (outbreaks::WEEK, &["Meldewoche"]),
        (outbreaks::NUM_OUTBREAKS, &["n"]),
        (outbreaks::SETTING, &["sett_engl"]),
    ],
    fields: &[
        FieldSpec::required(outbreaks::WEEK, FieldRule::Integer),
        FieldSpec::required(outbreaks::SETTING, FieldRule::Text),
        FieldSpec::required(outbreaks::NUM_OUTBREAKS, FieldRule::Integer),
    ],
    remaining: None,
    drops: &["sett_f"],
};

pub const AGE_TOTALS: TableSchema = TableSchema {
    name: "age_totals",
    renames: &[(age::AGE_GROUP, &["Altersgruppe"])],
    fields: &[FieldSpec::required(age::AGE_GROUP, FieldRule::Text)],
    remaining: Some(FieldRule::Integer),
    drops: &[],
};

pub const AGE_INCIDENCE: TableSchema = TableSchema {
    name: "age_incidence",
    renames: &[(age::AGE_GROUP, &["Altersgruppe"])],
    fields: &[FieldSpec::required(age::AGE_GROUP, FieldRule::Text)],
    remaining: Some(DECIMAL_DOT_NAN),
    drops: &[],
};

/// The death exports spell their year column two ways.
const DEATH_YEAR_ALIASES: &[&str] = &["Sterbejahr", "Sterbjahr"];

pub const DEATHS_WEEKLY: TableSchema = TableSchema {
    name: "deaths_weekly",
    renames: &[
        (deaths::WEEK, &["Sterbewoche"]),
        (deaths::DEATHS_TOTAL, &["Anzahl verstorbene COVID-19 Fälle"]),
    ],
    fields: &[
        FieldSpec::required(deaths::WEEK, FieldRule::Integer),
        FieldSpec::required(deaths::DEATHS_TOTAL, CENSORED_BELOW_4),
    ],
    remaining: None,
    drops: DEATH_YEAR_ALIASES,
};

pub const DEATHS_BY_AGE: TableSchema = TableSchema {
    name: "deaths_by_age",
    renames: &[
        (deaths::WEEK, &["Sterbewoche"]),
        ("age_0", &["AG 0-9 Jahre"]),
        ("age_10", &["AG 10-19 Jahre"]),
        ("age_20", &["AG 20-29 Jahre"]),
        ("age_30", &["AG 30-39 Jahre"]),
        ("age_40", &["AG 40-49 Jahre"]),
        ("age_50", &["AG 50-59 Jahre"]),
        ("age_60", &["AG 60-69 Jahre"]),
        ("age_70", &["AG 70-79 Jahre"]),
        ("age_80", &["AG 80-89 Jahre"]),
        ("age_90", &["AG 90+ Jahre"]),
    ],
    fields: &[FieldSpec::required(deaths::WEEK, FieldRule::Integer)],
    remaining: Some(CENSORED_BELOW_4),
    drops: DEATH_YEAR_ALIASES,
};

pub const DEATHS_BY_SEX_AGE: TableSchema = TableSchema {
    name: "deaths_by_sex_age",
    renames: &[
        (deaths::WEEK, &["Sterbewoche"]),
        ("M0_19", &["Männer, AG 0-19 Jahre"]),
        ("M20_39", &["Männer, AG 20-39 Jahre"]),
        ("M40_59", &["Männer, AG 40-59 Jahre"]),
        ("M60_79", &["Männer, AG 60-79 Jahre"]),
        ("M80", &["Männer, AG 80+ Jahre"]),
        ("F0_19", &["Frauen, AG 0-19 Jahre"]),
        ("F20_39", &["Frauen, AG 20-39 Jahre"]),
        ("F40_59", &["Frauen, AG 40-59 Jahre"]),
        ("F60_79", &["Frauen, AG 60-79 Jahre"]),
        ("F80", &["Frauen, AG 80+ Jahre"]),
    ],
    fields: &[FieldSpec::required(deaths::WEEK, FieldRule::Integer)],
    remaining: Some(CENSORED_BELOW_4),
    drops: DEATH_YEAR_ALIASES,
};

const DASH_IS_ZERO: FieldRule = FieldRule::PlaceholderZero { placeholder: "-" };
const KW_WEEK: FieldRule = FieldRule::PrefixedWeek { prefix: "KW" };

pub const TEST_CAPACITY: TableSchema = TableSchema {
    name: "test_capacity",
    renames: &[
        (testing::WEEK, &["KW, für die die Angabe prognostisch erfolgt ist:"]),
        (testing::LABORATORIES, &["Anzahl übermittelnde Labore"]),
        (testing::DAILY_CAP, &["Testkapazität pro Tag"]),
        (
            testing::WEEKLY_CAP_EST,
            &["Theoretische wöchentliche Kapazität anhand von Wochenarbeitstagen"],
        ),
        (
            testing::WEEKLY_CAP_REAL,
            &["Reale Testkapazität zum Zeitpunkt der Abfrage"],
        ),
    ],
    fields: &[
        FieldSpec::required(testing::WEEK, KW_WEEK),
        FieldSpec::optional(testing::LABORATORIES, FieldRule::Integer),
        FieldSpec::optional(testing::DAILY_CAP, DASH_IS_ZERO),
        FieldSpec::optional(testing::WEEKLY_CAP_EST, DASH_IS_ZERO),
        FieldSpec::optional(testing::WEEKLY_CAP_REAL, DASH_IS_ZERO),
    ],
    remaining: None,
    drops: &[],
};

pub const TEST_BACKLOG: TableSchema = TableSchema {
    name: "test_backlog",
    renames: &[
        (testing::WEEK, &["KW"]),
        (testing::LABORATORIES_TAILBACK, &["Labore mit Rückstau"]),
        (testing::TESTS_TAILBACK, &["Probenrückstau"]),
    ],
    fields: &[
        FieldSpec::required(testing::WEEK, KW_WEEK),
        FieldSpec::optional(testing::LABORATORIES_TAILBACK, FieldRule::Integer),
        FieldSpec::optional(testing::TESTS_TAILBACK, FieldRule::Integer),
    ],
    remaining: None,
    drops: &[],
};

pub const CLINICAL: TableSchema = TableSchema {
    name: "clinical",
    renames: &[
        (clinical::YEAR, &["Meldejahr"]),
        (clinical::WEEK, &["MW"]),
        (clinical::CASES_TOT, &["Fälle gesamt"]),
        (clinical::MEAN_AGE, &["Mittelwert Alter (Jahre)"]),
        (clinical::MALE_PERC, &["Männer"]),
        (clinical::FEMALE_PERC, &["Frauen"]),
        (clinical::SYMPTOMS_REPORTED, &["Anzahl mit Angaben zu Symptomen"]),
        (
            clinical::NO_SYMPTOMS_PERC,
            &["Anteil keine, bzw. keine für COVID-19 bedeutsamen Symptome"],
        ),
        (clinical::HOSPITAL_REPORTED, &["Anzahl mit Angaben zur Hospitalisierung"]),
        (clinical::HOSPITAL_NUM, &["Anzahl hospitalisiert"]),
        (clinical::HOSPITAL_PERC, &["Anteil hospitalisiert"]),
        (clinical::DEATHS_NUM, &["Anzahl Verstorben"]),
        (clinical::DEATHS_PERC, &["Anteil Verstorben"]),
    ],
    fields: &[
        FieldSpec::required(clinical::YEAR, FieldRule::Integer),
        FieldSpec::required(clinical::WEEK, FieldRule::Integer),
        FieldSpec::required(clinical::CASES_TOT, FieldRule::Integer),
        FieldSpec::optional(clinical::MEAN_AGE, DECIMAL_DOT_NAN),
        FieldSpec::optional(clinical::MALE_PERC, DECIMAL_DOT_NAN),
        FieldSpec::optional(clinical::FEMALE_PERC, DECIMAL_DOT_NAN),
        FieldSpec::optional(clinical::SYMPTOMS_REPORTED, FieldRule::Integer),
        FieldSpec::optional(clinical::NO_SYMPTOMS_PERC, DECIMAL_DOT_NAN),
        FieldSpec::optional(clinical::HOSPITAL_REPORTED, FieldRule::Integer),
        FieldSpec::optional(clinical::HOSPITAL_NUM, FieldRule::Integer),
        FieldSpec::optional(clinical::HOSPITAL_PERC, DECIMAL_DOT_NAN),
        FieldSpec::optional(clinical::DEATHS_NUM, FieldRule::Integer),
        FieldSpec::optional(clinical::DEATHS_PERC, DECIMAL_DOT_NAN),
    ],
    remaining: None,
    drops: &[],
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    const ALL: [TableSchema; 11] = [
        CASES,
        NOWCASTING,
        OUTBREAKS,
        AGE_TOTALS,
        AGE_INCIDENCE,
        DEATHS_WEEKLY,
        DEATHS_BY_AGE,
        DEATHS_BY_SEX_AGE,
        TEST_CAPACITY,
        TEST_BACKLOG,
        CLINICAL,
    ];

    #[test]
    fn rename_targets_are_unique_per_table() {
        for schema in ALL {
            let mut seen = HashSet::new();
            for (target, aliases) in schema.renames {
                assert!(seen.insert(*target), "{}: duplicate {}", schema.name, target);
                assert!(!aliases.is_empty());
            }
        }
    }

    #[test]
    fn declared_fields_are_renamed_or_already_target() {
        for schema in ALL {
            for field in schema.fields {
                assert!(
                    !schema.renames.iter().any(|(_, a)| a.contains(&field.name)),
                    "{}: {} is both a source alias and a target",
                    schema.name,
                    field.name
                );
            }
        }
    }

    #[test]
    fn death_columns_match_renames() {
        let by_age: Vec<&str> = DEATHS_BY_AGE.renames[1..].iter().map(|(t, _)| *t).collect();
        assert_eq!(by_age, deaths::BY_AGE.to_vec());
        let by_sex: Vec<&str> = DEATHS_BY_SEX_AGE.renames[1..]
            .iter()
            .map(|(t, _)| *t)
            .collect();
        assert_eq!(by_sex, deaths::BY_SEX_AGE.to_vec());
    }
}
