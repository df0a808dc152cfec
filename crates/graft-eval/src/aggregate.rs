//! Batch fitness aggregation
//!
//! Instance fitness vectors are first combined within each bin, then the
//! bin results are combined across bins. Both steps work objective by
//! objective and round the result to the decimal precision of their
//! inputs (one extra digit for averages and averaged order statistics),
//! so `0.1 + 0.2` aggregates to `0.3`.

use graft_core::ScenarioError;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// How instances of one bin are combined
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinStrategy {
    /// Keep every instance as a bin of its own
    Aggregate,
    Sum,
    Average,
    Median,
    /// `q10`, `q25`, `q75` or `q90`
    Quantile(u8),
}

/// Percentages accepted by [`BinStrategy::Quantile`]
pub const QUANTILES: [u8; 4] = [10, 25, 75, 90];

/// How bins are combined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStrategy {
    Sum,
    Average,
    Median,
}

impl FromStr for BinStrategy {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || {
            ScenarioError::invalid(
                "software",
                "batch_bin_fitness_strategy",
                format!("must be aggregate, sum, average, median, q10, q25, q75 or q90, not \"{s}\""),
            )
        };
        match s {
            "aggregate" => Ok(Self::Aggregate),
            "sum" => Ok(Self::Sum),
            "average" => Ok(Self::Average),
            "median" => Ok(Self::Median),
            _ => {
                let q: u8 = s.strip_prefix('q').and_then(|n| n.parse().ok()).ok_or_else(bad)?;
                if !QUANTILES.contains(&q) {
                    return Err(bad());
                }
                Ok(Self::Quantile(q))
            }
        }
    }
}

impl FromStr for BatchStrategy {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Self::Sum),
            "average" => Ok(Self::Average),
            "median" => Ok(Self::Median),
            _ => Err(ScenarioError::invalid(
                "software",
                "batch_fitness_strategy",
                format!("must be sum, average or median, not \"{s}\""),
            )),
        }
    }
}

impl Display for BinStrategy {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Aggregate => f.write_str("aggregate"),
            Self::Sum => f.write_str("sum"),
            Self::Average => f.write_str("average"),
            Self::Median => f.write_str("median"),
            Self::Quantile(q) => write!(f, "q{q}"),
        }
    }
}

/// Combine per-bin, per-instance fitness vectors into one vector
///
/// Every vector must have the same length. Empty input yields an empty
/// vector.
#[must_use]
pub fn aggregate(bins: &[Vec<Vec<f64>>], bin: BinStrategy, batch: BatchStrategy) -> Vec<f64> {
    let per_bin: Vec<Vec<f64>> = match bin {
        BinStrategy::Aggregate => bins.iter().flatten().cloned().collect(),
        _ => bins
            .iter()
            .filter(|b| !b.is_empty())
            .map(|instances| combine_columns(instances, |col| reduce_bin(col, bin)))
            .collect(),
    };
    combine_columns(&per_bin, |col| reduce_batch(col, batch))
}

fn combine_columns(rows: &[Vec<f64>], reduce: impl Fn(&[f64]) -> f64) -> Vec<f64> {
    let width = rows.first().map_or(0, Vec::len);
    (0..width)
        .map(|k| {
            let column: Vec<f64> = rows.iter().filter_map(|r| r.get(k).copied()).collect();
            reduce(&column)
        })
        .collect()
}

fn reduce_bin(column: &[f64], strategy: BinStrategy) -> f64 {
    match strategy {
        BinStrategy::Aggregate | BinStrategy::Sum => reduce_batch(column, BatchStrategy::Sum),
        BinStrategy::Average => reduce_batch(column, BatchStrategy::Average),
        BinStrategy::Median => reduce_batch(column, BatchStrategy::Median),
        BinStrategy::Quantile(q) => {
            if column.len() == 1 {
                return column[0];
            }
            let (value, averaged) = bin_quantile(column, q);
            round_to(value, precision(column) + usize::from(averaged))
        }
    }
}

fn reduce_batch(column: &[f64], strategy: BatchStrategy) -> f64 {
    if column.len() == 1 {
        return column[0];
    }
    let digits = precision(column);
    match strategy {
        BatchStrategy::Sum => round_to(column.iter().sum(), digits),
        BatchStrategy::Average => {
            #[allow(clippy::cast_precision_loss)]
            let mean = column.iter().sum::<f64>() / column.len() as f64;
            round_to(mean, digits + 1)
        }
        BatchStrategy::Median => {
            let (value, averaged) = median(column);
            round_to(value, digits + usize::from(averaged))
        }
    }
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Mean of the window of (at most) two sorted values starting at `start`
fn window(sorted: &[f64], start: usize) -> f64 {
    let Some(last) = sorted.len().checked_sub(1) else {
        return f64::NAN;
    };
    let lo = start.min(last);
    let hi = (start + 1).min(last);
    (sorted[lo] + sorted[hi]) / 2.0
}

/// Middle value, or the mean of the two middle values; the flag tells
/// whether two values were averaged
#[must_use]
pub fn median(values: &[f64]) -> (f64, bool) {
    let sorted = sorted(values);
    let n = sorted.len();
    if n == 0 {
        return (f64::NAN, false);
    }
    if n % 2 == 1 {
        (sorted[n / 2], false)
    } else {
        (window(&sorted, n / 2 - 1), true)
    }
}

/// Bin quantile by fixed index windows
///
/// When the bin splits evenly (`n % 10` for q10/q90, `n % 4` for
/// q25/q75) a single order statistic is taken: index `n/10` for q10 and
/// q90, `n/4` for q25, `3n/4` for q75. Otherwise two neighbours are
/// averaged starting at `n/10` for q10 and q25, `3n/4` for q75 and
/// `9n/10` for q90. A window running past the end uses the last value.
/// The flag tells whether two values were averaged.
#[must_use]
pub fn bin_quantile(values: &[f64], q: u8) -> (f64, bool) {
    let sorted = sorted(values);
    let n = sorted.len();
    if n == 0 {
        return (f64::NAN, false);
    }
    let (divisor, single, start) = match q {
        10 => (10, n / 10, n / 10),
        25 => (4, n / 4, n / 10),
        75 => (4, 3 * n / 4, 3 * n / 4),
        _ => (10, n / 10, 9 * n / 10),
    };
    if n % divisor == 0 {
        (sorted[single.min(n - 1)], false)
    } else {
        (window(&sorted, start), true)
    }
}

/// Largest number of decimal digits among the inputs' shortest forms
#[must_use]
pub fn precision(values: &[f64]) -> usize {
    values.iter().map(|x| decimals(*x)).max().unwrap_or(0)
}

fn decimals(x: f64) -> usize {
    let text = format!("{x:?}");
    let (mantissa, exponent) = match text.split_once('e') {
        Some((m, e)) => (m, e.parse::<i64>().unwrap_or(0)),
        None => (text.as_str(), 0),
    };
    let frac = mantissa.split_once('.').map_or(0, |(_, f)| f.trim_end_matches('0').len());
    let digits = i64::try_from(frac).unwrap_or(0) - exponent;
    usize::try_from(digits.max(0)).unwrap_or(0)
}

fn round_to(x: f64, digits: usize) -> f64 {
    if digits > 15 || !x.is_finite() {
        return x;
    }
    let scale = 10f64.powi(i32::try_from(digits).unwrap_or(15));
    (x * scale).round() / scale
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn single_bin(values: &[f64]) -> Vec<Vec<Vec<f64>>> {
        vec![values.iter().map(|v| vec![*v]).collect()]
    }

    #[test]
    fn sum_average_median_of_one_bin() {
        let bins = single_bin(&[1.0, 2.0, 3.0]);
        assert_eq!(aggregate(&bins, BinStrategy::Aggregate, BatchStrategy::Sum), vec![6.0]);
        assert_eq!(aggregate(&bins, BinStrategy::Aggregate, BatchStrategy::Average), vec![2.0]);
        assert_eq!(aggregate(&bins, BinStrategy::Aggregate, BatchStrategy::Median), vec![2.0]);
        assert_eq!(aggregate(&bins, BinStrategy::Sum, BatchStrategy::Sum), vec![6.0]);
        assert_eq!(aggregate(&bins, BinStrategy::Average, BatchStrategy::Sum), vec![2.0]);
        assert_eq!(aggregate(&bins, BinStrategy::Median, BatchStrategy::Sum), vec![2.0]);
    }

    #[test]
    fn precision_is_inferred() {
        let bins = single_bin(&[0.1, 0.2]);
        assert_eq!(aggregate(&bins, BinStrategy::Aggregate, BatchStrategy::Sum), vec![0.3]);
        let bins = single_bin(&[1.0, 2.0]);
        assert_eq!(aggregate(&bins, BinStrategy::Aggregate, BatchStrategy::Average), vec![1.5]);
        assert_eq!(precision(&[1.25, 3.0, 1e-3]), 3);
    }

    #[test]
    fn bins_then_batch() {
        let bins = vec![
            vec![vec![1.0, 10.0], vec![3.0, 30.0]],
            vec![vec![5.0, 50.0]],
        ];
        assert_eq!(
            aggregate(&bins, BinStrategy::Average, BatchStrategy::Sum),
            vec![7.0, 70.0]
        );
        assert_eq!(
            aggregate(&bins, BinStrategy::Sum, BatchStrategy::Median),
            vec![4.5, 45.0]
        );
    }

    #[test]
    fn median_picks_or_averages_the_middle() {
        assert_eq!(median(&[3.0, 1.0, 2.0]), (2.0, false));
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), (2.5, true));
    }

    #[test]
    fn bin_quantiles_use_fixed_windows() {
        // a rank-interpolated quantile of 1..=5 gives 2 and 4
        let five = [5.0, 1.0, 4.0, 2.0, 3.0];
        assert_eq!(bin_quantile(&five, 25), (1.5, true));
        assert_eq!(bin_quantile(&five, 75), (4.5, true));
        assert_eq!(bin_quantile(&five, 10), (1.5, true));
        assert_eq!(bin_quantile(&five, 90), (5.0, true));

        // even split: one order statistic, where interpolation gives 2.75 and 6.25
        let eight: Vec<f64> = (1..=8).map(f64::from).collect();
        assert_eq!(bin_quantile(&eight, 25), (3.0, false));
        assert_eq!(bin_quantile(&eight, 75), (7.0, false));

        // q90 on an even split shares the q10 index
        let ten: Vec<f64> = (1..=10).map(f64::from).collect();
        assert_eq!(bin_quantile(&ten, 10), (2.0, false));
        assert_eq!(bin_quantile(&ten, 90), (2.0, false));

        // window past the end falls back to the last value
        assert_eq!(bin_quantile(&[1.0, 2.0], 90), (2.0, true));
    }

    #[test]
    fn quantile_bins_round_one_digit_finer() {
        let bins = single_bin(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(aggregate(&bins, BinStrategy::Quantile(25), BatchStrategy::Sum), vec![1.5]);
        let bins = single_bin(&[0.25, 0.5, 0.75, 1.0, 1.25]);
        assert_eq!(aggregate(&bins, BinStrategy::Quantile(75), BatchStrategy::Sum), vec![1.125]);
    }

    #[test]
    fn strategy_names() {
        assert_eq!("q25".parse::<BinStrategy>().unwrap(), BinStrategy::Quantile(25));
        assert!("q0".parse::<BinStrategy>().is_err());
        assert!("q50".parse::<BinStrategy>().is_err());
        assert!("mode".parse::<BinStrategy>().is_err());
        assert!("aggregate".parse::<BatchStrategy>().is_err());
        assert_eq!(BinStrategy::Quantile(10).to_string(), "q10");
    }

    proptest! {
        #[test]
        fn median_is_between_extremes(values in prop::collection::vec(-1000i32..1000, 1..20)) {
            let values: Vec<f64> = values.into_iter().map(f64::from).collect();
            let bins = single_bin(&values);
            let m = aggregate(&bins, BinStrategy::Aggregate, BatchStrategy::Median)[0];
            let lo = values.iter().copied().fold(f64::INFINITY, f64::min);
            let hi = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            prop_assert!(lo <= m && m <= hi);
        }
    }
}
