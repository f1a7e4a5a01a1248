//! Key Joins
//! Deterministic inner/outer joins of normalized tables on one key column.
//!
//! Output rows follow the left table's order; for outer joins, right-only
//! keys follow in the right table's order. Unmatched sides are null.

use polars::prelude::*;
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Outer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

/// A key present on one side of an outer join only. Advisory: the row is
/// kept with nulls for the side that lacks it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinMismatchWarning {
    pub table: &'static str,
    pub key_column: String,
    pub key: String,
    pub missing_side: JoinSide,
}

impl fmt::Display for JoinMismatchWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let side = match self.missing_side {
            JoinSide::Left => "left",
            JoinSide::Right => "right",
        };
        write!(
            f,
            "{}: {} = {} has no {} counterpart",
            self.table, self.key_column, self.key, side
        )
    }
}

#[derive(Debug, Clone, Copy)]
pub struct JoinSpec<'a> {
    pub table: &'static str,
    pub key: &'a str,
    pub kind: JoinKind,
    /// Appended to non-key columns present on both sides.
    pub suffixes: (&'a str, &'a str),
}

impl<'a> JoinSpec<'a> {
    pub fn outer(table: &'static str, key: &'a str) -> Self {
        Self {
            table,
            key,
            kind: JoinKind::Outer,
            suffixes: ("_x", "_y"),
        }
    }

    pub fn inner(table: &'static str, key: &'a str) -> Self {
        Self {
            kind: JoinKind::Inner,
            ..Self::outer(table, key)
        }
    }

    pub fn with_suffixes(mut self, left: &'a str, right: &'a str) -> Self {
        self.suffixes = (left, right);
        self
    }
}

#[derive(Debug, Clone)]
pub struct JoinOutcome {
    pub frame: DataFrame,
    pub warnings: Vec<JoinMismatchWarning>,
}

fn key_strings(df: &DataFrame, key: &str) -> PolarsResult<Vec<Option<String>>> {
    let text = df.column(key)?.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| v.map(str::to_string))
        .collect())
}

fn gather(df: &DataFrame, indices: &[Option<usize>]) -> PolarsResult<DataFrame> {
    let idx = IdxCa::from_iter_options(
        "idx".into(),
        indices.iter().map(|i| i.map(|i| i as IdxSize)),
    );
    df.take(&idx)
}

/// Join `left` and `right` on `spec.key`.
pub fn join_on(left: &DataFrame, right: &DataFrame, spec: JoinSpec<'_>) -> PolarsResult<JoinOutcome> {
    let left_keys = key_strings(left, spec.key)?;
    let right_keys = key_strings(right, spec.key)?;

    let mut right_index: HashMap<&str, Vec<usize>> = HashMap::new();
    for (j, key) in right_keys.iter().enumerate() {
        if let Some(key) = key {
            right_index.entry(key.as_str()).or_default().push(j);
        }
    }

    let mut left_rows: Vec<Option<usize>> = Vec::new();
    let mut right_rows: Vec<Option<usize>> = Vec::new();
    let mut right_matched = vec![false; right.height()];
    let mut warnings = Vec::new();

    for (i, key) in left_keys.iter().enumerate() {
        let matches = key.as_deref().and_then(|k| right_index.get(k));
        match matches {
            Some(js) => {
                for &j in js {
                    right_matched[j] = true;
                    left_rows.push(Some(i));
                    right_rows.push(Some(j));
                }
            }
            None if spec.kind == JoinKind::Outer => {
                warnings.push(JoinMismatchWarning {
                    table: spec.table,
                    key_column: spec.key.to_string(),
                    key: key.clone().unwrap_or_default(),
                    missing_side: JoinSide::Right,
                });
                left_rows.push(Some(i));
                right_rows.push(None);
            }
            None => {}
        }
    }

    if spec.kind == JoinKind::Outer {
        for (j, matched) in right_matched.iter().enumerate() {
            if !matched {
                warnings.push(JoinMismatchWarning {
                    table: spec.table,
                    key_column: spec.key.to_string(),
                    key: right_keys[j].clone().unwrap_or_default(),
                    missing_side: JoinSide::Left,
                });
                left_rows.push(None);
                right_rows.push(Some(j));
            }
        }
    }

    let left_taken = gather(left, &left_rows)?;
    let right_taken = gather(right, &right_rows)?;

    // Coalesce the key: left value where present, else right.
    let left_key = left_taken.column(spec.key)?.as_materialized_series().clone();
    let right_key = right_taken
        .column(spec.key)?
        .as_materialized_series()
        .cast(left_key.dtype())?;
    let key = left_key.zip_with(&left_key.is_not_null(), &right_key)?;

    let right_names: Vec<String> = right
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();
    let left_names: Vec<String> = left
        .get_column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    let mut columns: Vec<Column> = Vec::with_capacity(left.width() + right.width());
    for column in left_taken.get_columns() {
        let name = column.name().to_string();
        if name == spec.key {
            columns.push(key.clone().into());
        } else if right_names.contains(&name) {
            let mut renamed = column.clone();
            renamed.rename(format!("{}{}", name, spec.suffixes.0).into());
            columns.push(renamed);
        } else {
            columns.push(column.clone());
        }
    }
    for column in right_taken.get_columns() {
        let name = column.name().to_string();
        if name == spec.key {
            continue;
        }
        if left_names.contains(&name) {
            let mut renamed = column.clone();
            renamed.rename(format!("{}{}", name, spec.suffixes.1).into());
            columns.push(renamed);
        } else {
            columns.push(column.clone());
        }
    }

    Ok(JoinOutcome {
        frame: DataFrame::new(columns)?,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn weekly(name: &str, weeks: &[i64], values: &[i64]) -> DataFrame {
        DataFrame::new(vec![
            Column::new("week".into(), weeks.to_vec()),
            Column::new(name.into(), values.to_vec()),
        ])
        .unwrap()
    }

    fn ints(df: &DataFrame, name: &str) -> Vec<Option<i64>> {
        df.column(name).unwrap().i64().unwrap().into_iter().collect()
    }

    #[test]
    fn outer_join_keeps_unmatched_rows() {
        let all = weekly("deaths_total", &[39, 40, 41], &[10, 12, 14]);
        let by_age = weekly("age_80", &[39, 41], &[5, 7]);

        let outcome = join_on(&all, &by_age, JoinSpec::outer("deaths", "week")).unwrap();
        assert_eq!(ints(&outcome.frame, "week"), vec![Some(39), Some(40), Some(41)]);
        assert_eq!(ints(&outcome.frame, "age_80"), vec![Some(5), None, Some(7)]);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].key, "40");
        assert_eq!(outcome.warnings[0].missing_side, JoinSide::Right);
    }

    #[test]
    fn right_only_keys_follow_in_right_order() {
        let left = weekly("a", &[1, 2], &[1, 2]);
        let right = weekly("b", &[4, 2, 3], &[40, 20, 30]);

        let outcome = join_on(&left, &right, JoinSpec::outer("t", "week")).unwrap();
        assert_eq!(
            ints(&outcome.frame, "week"),
            vec![Some(1), Some(2), Some(4), Some(3)]
        );
        assert_eq!(ints(&outcome.frame, "a"), vec![Some(1), Some(2), None, None]);
        assert_eq!(outcome.warnings.len(), 3);
    }

    #[test]
    fn inner_join_drops_unmatched_and_suffixes_clashes() {
        let left = weekly("v", &[1, 2, 3], &[1, 2, 3]);
        let right = weekly("v", &[3, 1], &[30, 10]);

        let outcome = join_on(
            &left,
            &right,
            JoinSpec::inner("t", "week").with_suffixes("_total", "_incidence"),
        )
        .unwrap();
        assert!(outcome.warnings.is_empty());
        assert_eq!(ints(&outcome.frame, "week"), vec![Some(1), Some(3)]);
        assert_eq!(ints(&outcome.frame, "v_total"), vec![Some(1), Some(3)]);
        assert_eq!(ints(&outcome.frame, "v_incidence"), vec![Some(10), Some(30)]);
    }
}
