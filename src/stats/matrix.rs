//! Labeled Matrix
//! Row/column labeled numeric grid, the shape every chart consumes.

use polars::prelude::*;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Dense `rows x cols` grid of `f64` with labels on both axes.
/// Missing cells are NaN.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledMatrix {
    pub row_labels: Vec<String>,
    pub col_labels: Vec<String>,
    pub values: Vec<Vec<f64>>,
}

impl LabeledMatrix {
    pub fn new(row_labels: Vec<String>, col_labels: Vec<String>, values: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(row_labels.len(), values.len());
        debug_assert!(values.iter().all(|r| r.len() == col_labels.len()));
        Self {
            row_labels,
            col_labels,
            values,
        }
    }

    /// One labeled column.
    pub fn from_series(row_labels: Vec<String>, name: &str, values: Vec<f64>) -> Self {
        let values = values.into_iter().map(|v| vec![v]).collect();
        Self::new(row_labels, vec![name.to_string()], values)
    }

    /// Sum `(row, col, value)` triples into a grid. Rows and columns are
    /// ordered by key; absent combinations are 0.
    pub fn pivot_sum<R, C>(cells: impl IntoIterator<Item = (R, C, f64)>) -> Self
    where
        R: Ord + ToString,
        C: Ord + Clone + ToString,
    {
        let mut grid: BTreeMap<R, BTreeMap<C, f64>> = BTreeMap::new();
        let mut cols: BTreeSet<C> = BTreeSet::new();
        for (row, col, value) in cells {
            cols.insert(col.clone());
            *grid.entry(row).or_default().entry(col).or_insert(0.0) += value;
        }

        let values = grid
            .values()
            .map(|row| {
                cols.iter()
                    .map(|c| row.get(c).copied().unwrap_or(0.0))
                    .collect()
            })
            .collect();
        Self::new(
            grid.keys().map(ToString::to_string).collect(),
            cols.iter().map(ToString::to_string).collect(),
            values,
        )
    }

    /// Rows from the values of `label_col`, one matrix column per other
    /// frame column (cast to `f64`).
    pub fn from_frame(df: &DataFrame, label_col: &str) -> PolarsResult<Self> {
        let labels = string_values(df, label_col)?;
        let mut col_labels = Vec::new();
        let mut columns = Vec::new();
        for column in df.get_columns() {
            if column.name().as_str() == label_col {
                continue;
            }
            col_labels.push(column.name().to_string());
            columns.push(f64_values(df, column.name().as_str())?);
        }
        let values = (0..df.height())
            .map(|i| columns.iter().map(|c| c[i]).collect())
            .collect();
        Ok(Self::new(labels, col_labels, values))
    }

    /// Select frame columns as matrix columns, rows labeled by `row_labels`.
    pub fn from_columns(
        df: &DataFrame,
        row_labels: Vec<String>,
        names: &[&str],
    ) -> PolarsResult<Self> {
        let columns = names
            .iter()
            .map(|name| f64_values(df, name))
            .collect::<PolarsResult<Vec<_>>>()?;
        let values = (0..df.height())
            .map(|i| columns.iter().map(|c| c[i]).collect())
            .collect();
        Ok(Self::new(
            row_labels,
            names.iter().map(|s| s.to_string()).collect(),
            values,
        ))
    }

    /// Like [`Self::from_columns`], skipping names the frame lacks. With none
    /// present the matrix has no columns.
    pub fn from_present_columns(
        df: &DataFrame,
        row_labels: Vec<String>,
        names: &[&str],
    ) -> PolarsResult<Self> {
        let present: Vec<&str> = names
            .iter()
            .copied()
            .filter(|name| df.column(name).is_ok())
            .collect();
        Self::from_columns(df, row_labels, &present)
    }

    pub fn nrows(&self) -> usize {
        self.row_labels.len()
    }

    pub fn ncols(&self) -> usize {
        self.col_labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nrows() == 0 || self.ncols() == 0
    }

    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.values.iter().map(|row| row[idx]).collect()
    }

    pub fn row_index(&self, label: &str) -> Option<usize> {
        self.row_labels.iter().position(|l| l == label)
    }

    pub fn without_row(&self, label: &str) -> Self {
        let keep: Vec<usize> = (0..self.nrows())
            .filter(|&i| self.row_labels[i] != label)
            .collect();
        Self::new(
            keep.iter().map(|&i| self.row_labels[i].clone()).collect(),
            self.col_labels.clone(),
            keep.iter().map(|&i| self.values[i].clone()).collect(),
        )
    }

    /// Keep the named columns, in the given order. Unknown names are skipped.
    pub fn select_columns(&self, labels: &[String]) -> Self {
        let idx: Vec<usize> = labels
            .iter()
            .filter_map(|l| self.col_labels.iter().position(|c| c == l))
            .collect();
        Self::new(
            self.row_labels.clone(),
            idx.iter().map(|&j| self.col_labels[j].clone()).collect(),
            self.values
                .iter()
                .map(|row| idx.iter().map(|&j| row[j]).collect())
                .collect(),
        )
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self::new(
            self.row_labels.clone(),
            self.col_labels.clone(),
            self.values
                .iter()
                .map(|row| row.iter().map(|v| f(*v)).collect())
                .collect(),
        )
    }

    /// Divide each row by its own divisor.
    pub fn div_rows(&self, divisors: &[f64]) -> Self {
        Self::new(
            self.row_labels.clone(),
            self.col_labels.clone(),
            self.values
                .iter()
                .zip(divisors)
                .map(|(row, d)| row.iter().map(|v| v / d).collect())
                .collect(),
        )
    }

    /// Divide every row element-wise by `divisor` (one value per column).
    pub fn div_by_row(&self, divisor: &[f64]) -> Self {
        Self::new(
            self.row_labels.clone(),
            self.col_labels.clone(),
            self.values
                .iter()
                .map(|row| row.iter().zip(divisor).map(|(v, d)| v / d).collect())
                .collect(),
        )
    }

    /// NaN-skipping row sums.
    pub fn row_sums(&self) -> Vec<f64> {
        self.values
            .iter()
            .map(|row| row.iter().filter(|v| !v.is_nan()).sum())
            .collect()
    }

    /// NaN-skipping column sums.
    pub fn col_sums(&self) -> Vec<f64> {
        (0..self.ncols())
            .map(|j| self.values.iter().map(|r| r[j]).filter(|v| !v.is_nan()).sum())
            .collect()
    }

    /// Smallest and largest finite value.
    pub fn finite_range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .flatten()
            .filter(|v| v.is_finite())
            .fold(None, |acc, &v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// `f64` view of a frame column; nulls become NaN.
pub fn f64_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<f64>> {
    let floats = df.column(name)?.cast(&DataType::Float64)?;
    Ok(floats
        .f64()?
        .into_iter()
        .map(|v| v.unwrap_or(f64::NAN))
        .collect())
}

/// Text view of a frame column; nulls become empty strings.
pub fn string_values(df: &DataFrame, name: &str) -> PolarsResult<Vec<String>> {
    let text = df.column(name)?.cast(&DataType::String)?;
    Ok(text
        .str()?
        .into_iter()
        .map(|v| v.unwrap_or("").to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pivot_orders_keys_and_fills_zero() {
        let m = LabeledMatrix::pivot_sum(vec![
            ("Bayern", 11_i64, 5.0),
            ("Berlin", 10, 2.0),
            ("Bayern", 10, 1.0),
            ("Bayern", 10, 3.0),
        ]);
        assert_eq!(m.row_labels, vec!["Bayern", "Berlin"]);
        assert_eq!(m.col_labels, vec!["10", "11"]);
        assert_eq!(m.values, vec![vec![4.0, 5.0], vec![2.0, 0.0]]);
    }

    #[test]
    fn numeric_columns_sort_numerically() {
        let m = LabeledMatrix::pivot_sum(vec![("a", 9_i64, 1.0), ("a", 10, 1.0)]);
        assert_eq!(m.col_labels, vec!["9", "10"]);
    }

    #[test]
    fn from_frame_uses_label_column() {
        let df = DataFrame::new(vec![
            Column::new("age_group".into(), vec!["Gesamt", "0 - 4"]),
            Column::new("10".into(), vec![10.0, 2.0]),
            Column::new("11".into(), vec![Some(20_i64), None]),
        ])
        .unwrap();
        let m = LabeledMatrix::from_frame(&df, "age_group").unwrap();
        assert_eq!(m.row_labels, vec!["Gesamt", "0 - 4"]);
        assert_eq!(m.col_labels, vec!["10", "11"]);
        assert_eq!(m.values[0], vec![10.0, 20.0]);
        assert!(m.values[1][1].is_nan());
    }

    #[test]
    fn present_columns_skip_missing_names() {
        let df = DataFrame::new(vec![
            Column::new("est_r".into(), vec![1.5, 1.25]),
            Column::new("r_lower".into(), vec![1.0, 1.0]),
        ])
        .unwrap();
        let rows = vec!["2020-03-01".to_string(), "2020-03-02".to_string()];

        let m = LabeledMatrix::from_present_columns(&df, rows.clone(), &["est_r", "est_r7", "r_lower"])
            .unwrap();
        assert_eq!(m.col_labels, vec!["est_r", "r_lower"]);
        assert_eq!(m.values[1], vec![1.25, 1.0]);

        let none = LabeledMatrix::from_present_columns(&df, rows.clone(), &["est_r7"]).unwrap();
        assert_eq!(none.nrows(), 2);
        assert!(none.is_empty());

        assert!(LabeledMatrix::from_columns(&df, rows, &["est_r7"]).is_err());
    }

    #[test]
    fn row_and_column_arithmetic() {
        let m = LabeledMatrix::new(
            vec!["a".into(), "b".into()],
            vec!["x".into(), "y".into()],
            vec![vec![2.0, 4.0], vec![6.0, f64::NAN]],
        );
        assert_eq!(m.div_rows(&[2.0, 3.0]).values[0], vec![1.0, 2.0]);
        assert_eq!(m.div_by_row(&[2.0, 4.0]).values[0], vec![1.0, 1.0]);
        assert_eq!(m.row_sums(), vec![6.0, 6.0]);
        assert_eq!(m.col_sums(), vec![8.0, 4.0]);
        assert_eq!(m.finite_range(), Some((2.0, 6.0)));
        assert_eq!(m.without_row("a").row_labels, vec!["b"]);
        assert_eq!(m.select_columns(&["y".into()]).values[0], vec![4.0]);
    }
}
