//! Statistics Calculator Module
//! Descriptive statistics, Pearson correlation and integer histograms.

use crate::stats::matrix::{f64_values, LabeledMatrix};
use polars::prelude::*;
use rayon::prelude::*;
use serde::Serialize;
use statrs::statistics::Statistics;

/// Summary of one sample. Non-finite inputs are ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptiveStats {
    pub count: usize,
    pub mean: f64,
    pub median: f64,
    pub std: f64,
    pub variance: f64,
    pub p95: f64,
    pub p05: f64,
}

impl Default for DescriptiveStats {
    fn default() -> Self {
        Self {
            count: 0,
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            variance: f64::NAN,
            p95: f64::NAN,
            p05: f64::NAN,
        }
    }
}

/// Counts per integer value over an inclusive range.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub bins: Vec<i64>,
    pub counts: Vec<u64>,
    /// Values outside the range.
    pub outside: u64,
}

impl Histogram {
    pub fn total(&self) -> u64 {
        self.counts.iter().sum()
    }

    pub fn to_matrix(&self, name: &str) -> LabeledMatrix {
        LabeledMatrix::from_series(
            self.bins.iter().map(|b| b.to_string()).collect(),
            name,
            self.counts.iter().map(|c| *c as f64).collect(),
        )
    }
}

pub struct StatsCalculator;

impl StatsCalculator {
    /// Compute descriptive statistics for an array of values.
    pub fn compute_descriptive_stats(values: &[f64]) -> DescriptiveStats {
        let finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
        let n = finite.len();
        if n == 0 {
            return DescriptiveStats::default();
        }

        let mut sorted = finite.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let median = if n % 2 == 0 {
            (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
        } else {
            sorted[n / 2]
        };

        // statrs returns NaN for the sample variance of a single value
        let variance = if n > 1 { finite.as_slice().variance() } else { 0.0 };

        DescriptiveStats {
            count: n,
            mean: finite.as_slice().mean(),
            median,
            std: variance.sqrt(),
            variance,
            p95: Self::percentile(&sorted, 95.0),
            p05: Self::percentile(&sorted, 5.0),
        }
    }

    /// Calculate percentile using linear interpolation (NumPy compatible).
    fn percentile(sorted_values: &[f64], p: f64) -> f64 {
        let n = sorted_values.len();
        if n == 0 {
            return f64::NAN;
        }
        if n == 1 {
            return sorted_values[0];
        }

        let rank = (p / 100.0) * (n - 1) as f64;
        let lower = rank.floor() as usize;
        let upper = (rank.ceil() as usize).min(n - 1);
        let frac = rank - lower as f64;

        if lower == upper {
            sorted_values[lower]
        } else {
            sorted_values[lower] * (1.0 - frac) + sorted_values[upper] * frac
        }
    }

    /// Pearson correlation over the pairs where both values are finite.
    /// NaN when fewer than two pairs remain or either side is constant.
    pub fn pearson(x: &[f64], y: &[f64]) -> f64 {
        let (xs, ys): (Vec<f64>, Vec<f64>) = x
            .iter()
            .zip(y)
            .filter(|(a, b)| a.is_finite() && b.is_finite())
            .map(|(a, b)| (*a, *b))
            .unzip();
        if xs.len() < 2 {
            return f64::NAN;
        }

        let sx = xs.as_slice().std_dev();
        let sy = ys.as_slice().std_dev();
        if sx == 0.0 || sy == 0.0 {
            return f64::NAN;
        }
        xs.as_slice().covariance(ys.as_slice()) / (sx * sy)
    }

    /// Pairwise Pearson correlation of the named columns.
    pub fn correlation_matrix(df: &DataFrame, names: &[&str]) -> PolarsResult<LabeledMatrix> {
        let columns = names
            .iter()
            .map(|name| f64_values(df, name))
            .collect::<PolarsResult<Vec<_>>>()?;

        let values: Vec<Vec<f64>> = (0..columns.len())
            .into_par_iter()
            .map(|i| {
                (0..columns.len())
                    .map(|j| Self::pearson(&columns[i], &columns[j]))
                    .collect()
            })
            .collect();

        let labels: Vec<String> = names.iter().map(|s| s.to_string()).collect();
        Ok(LabeledMatrix::new(labels.clone(), labels, values))
    }

    /// One bin per integer in `lo..=hi`.
    pub fn integer_histogram(values: &[i64], lo: i64, hi: i64) -> Histogram {
        let bins: Vec<i64> = (lo..=hi).collect();
        let mut counts = vec![0u64; bins.len()];
        let mut outside = 0;
        for v in values {
            if (lo..=hi).contains(v) {
                counts[(v - lo) as usize] += 1;
            } else {
                outside += 1;
            }
        }
        Histogram {
            bins,
            counts,
            outside,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn descriptive_stats_match_numpy() {
        let stats = StatsCalculator::compute_descriptive_stats(&[1.0, 2.0, 3.0, 4.0, f64::NAN]);
        assert_eq!(stats.count, 4);
        assert!(approx(stats.mean, 2.5));
        assert!(approx(stats.median, 2.5));
        assert!(approx(stats.variance, 5.0 / 3.0));
        assert!(approx(stats.p05, 1.15));
        assert!(approx(stats.p95, 3.85));
    }

    #[test]
    fn single_value_has_zero_spread() {
        let stats = StatsCalculator::compute_descriptive_stats(&[7.0]);
        assert_eq!(stats.count, 1);
        assert_eq!(stats.std, 0.0);
        assert_eq!(stats.p95, 7.0);
    }

    #[test]
    fn empty_input_is_nan() {
        let stats = StatsCalculator::compute_descriptive_stats(&[]);
        assert_eq!(stats.count, 0);
        assert!(stats.mean.is_nan());
    }

    #[test]
    fn pearson_skips_missing_pairs() {
        let x = [1.0, 2.0, 3.0, f64::NAN, 5.0];
        let y = [2.0, 4.0, 6.0, 100.0, 10.0];
        assert!(approx(StatsCalculator::pearson(&x, &y), 1.0));
        let neg = [5.0, 4.0, 3.0, 2.0, 1.0];
        assert!(approx(StatsCalculator::pearson(&neg, &[1.0, 2.0, 3.0, 4.0, 5.0]), -1.0));
        assert!(StatsCalculator::pearson(&[1.0, 1.0], &[1.0, 2.0]).is_nan());
    }

    #[test]
    fn correlation_matrix_has_unit_diagonal() {
        let df = DataFrame::new(vec![
            Column::new("cases_tot".into(), vec![10_i64, 20, 35, 50]),
            Column::new("hospital_num".into(), vec![1_i64, 3, 2, 6]),
            Column::new("deaths_num".into(), vec![0_i64, 1, 1, 2]),
        ])
        .unwrap();
        let m = StatsCalculator::correlation_matrix(&df, &["cases_tot", "hospital_num", "deaths_num"])
            .unwrap();
        for i in 0..3 {
            assert!(approx(m.values[i][i], 1.0));
            for j in 0..3 {
                assert!(approx(m.values[i][j], m.values[j][i]));
            }
        }
    }

    #[test]
    fn histogram_counts_per_value() {
        let h = StatsCalculator::integer_histogram(&[-1, 0, 0, 3, 9], -1, 3);
        assert_eq!(h.bins, vec![-1, 0, 1, 2, 3]);
        assert_eq!(h.counts, vec![1, 2, 0, 0, 1]);
        assert_eq!(h.outside, 1);
        assert_eq!(h.total(), 4);
    }
}
