//! Typed `[search]` configuration

use graft_core::scenario::SearchSection;
use graft_core::{EditKind, Scenario, ScenarioError};
use graft_eval::batch;
use std::str::FromStr;
use std::time::Duration;

/// How repeated warmup measurements become the initial fitness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmupStrategy {
    Last,
    Min,
    Max,
    Mean,
    Median,
}

impl FromStr for WarmupStrategy {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "last" => Ok(Self::Last),
            "min" => Ok(Self::Min),
            "max" => Ok(Self::Max),
            "mean" => Ok(Self::Mean),
            "median" => Ok(Self::Median),
            _ => Err(ScenarioError::invalid(
                "search",
                "warmup_strategy",
                format!("must be last, min, max, mean or median, not \"{s}\""),
            )),
        }
    }
}

impl WarmupStrategy {
    /// Combine warmup fitness vectors; `None` on empty input
    #[must_use]
    pub fn combine(self, values: &[Vec<f64>]) -> Option<Vec<f64>> {
        let lexical = |a: &&Vec<f64>, b: &&Vec<f64>| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal);
        match self {
            Self::Last => values.last().cloned(),
            Self::Min => values.iter().min_by(lexical).cloned(),
            Self::Max => values.iter().max_by(lexical).cloned(),
            Self::Mean => {
                let first = values.first()?;
                #[allow(clippy::cast_precision_loss)]
                let n = values.len() as f64;
                Some(
                    (0..first.len())
                        .map(|k| values.iter().filter_map(|v| v.get(k)).sum::<f64>() / n)
                        .collect(),
                )
            }
            Self::Median => {
                let mut sorted: Vec<&Vec<f64>> = values.iter().collect();
                sorted.sort_by(lexical);
                sorted.get(sorted.len() / 2).map(|v| (*v).clone())
            }
        }
    }
}

/// What local search does once `max_neighbours` moves failed in a row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhenTrapped {
    Continue,
    Stop,
}

/// Stopping criteria; the first one met ends the run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopCriteria {
    pub wall: Option<Duration>,
    pub steps: Option<u64>,
    pub budget: Option<u64>,
    pub fitness: Option<Vec<f64>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LocalSearchConfig {
    pub delete_prob: f64,
    /// Mutations applied per move, at least one
    pub horizon: usize,
    /// `None` leaves the strategy default
    pub max_neighbours: Option<usize>,
    pub when_trapped: WhenTrapped,
    pub accept_fail: bool,
    pub tabu_length: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GeneticConfig {
    pub pop_size: usize,
    pub delete_prob: f64,
    pub offspring_elitism: f64,
    pub offspring_crossover: f64,
    pub offspring_mutation: f64,
    pub uniform_rate: f64,
    pub batch_reset: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MinifyConfig {
    pub do_cleanup: bool,
    pub do_rebuild: bool,
    pub do_simplify: bool,
    /// Negative is unlimited
    pub round_robin_limit: i64,
}

/// Validated `[search]` table
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Algorithm name; empty leaves the choice to the caller
    pub algorithm: String,
    pub possible_edits: Vec<EditKind>,
    pub warmup: usize,
    pub warmup_strategy: WarmupStrategy,
    pub stop: StopCriteria,
    pub cache_maxsize: usize,
    pub cache_keep: f64,
    /// Every configured instance, by bin
    pub batch_bins: Vec<Vec<String>>,
    pub batch_shuffle: bool,
    pub batch_bin_shuffle: bool,
    pub batch_sample_size: usize,
    pub ls: LocalSearchConfig,
    pub gp: GeneticConfig,
    pub minify: MinifyConfig,
}

fn probability(key: &str, value: f64) -> Result<f64, ScenarioError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ScenarioError::invalid("search", key, format!("must lie in [0, 1], not {value}")))
    }
}

impl SearchConfig {
    /// Validate the `[search]` tables
    ///
    /// # Errors
    /// Returns [`ScenarioError`] on unknown edits, unknown strategies or
    /// out-of-range values.
    pub fn from_scenario(scenario: &Scenario) -> Result<Self, ScenarioError> {
        let sec: &SearchSection = &scenario.search;
        let possible_edits = sec
            .possible_edits
            .iter()
            .map(|name| {
                name.parse::<EditKind>()
                    .map_err(|e| ScenarioError::invalid("search", "possible_edits", e.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let when_trapped = match sec.ls.when_trapped.as_str() {
            "continue" => WhenTrapped::Continue,
            "stop" => WhenTrapped::Stop,
            other => {
                return Err(ScenarioError::invalid(
                    "search.ls",
                    "when_trapped",
                    format!("must be continue or stop, not \"{other}\""),
                ))
            }
        };
        if sec.ls.horizon == 0 {
            return Err(ScenarioError::invalid("search.ls", "horizon", "must be positive"));
        }
        if sec.gp.pop_size == 0 {
            return Err(ScenarioError::invalid("search.gp", "pop_size", "must be positive"));
        }
        let max_time = match sec.max_time {
            Some(t) if t.is_finite() && t >= 0.0 => Some(Duration::from_secs_f64(t)),
            Some(t) => return Err(ScenarioError::invalid("search", "max_time", format!("invalid duration {t}"))),
            None => None,
        };

        Ok(Self {
            algorithm: sec.algorithm.trim().to_string(),
            possible_edits,
            warmup: sec.warmup,
            warmup_strategy: sec.warmup_strategy.parse()?,
            stop: StopCriteria {
                wall: max_time,
                steps: sec.max_steps,
                budget: sec.max_budget,
                fitness: sec.target_fitness.as_ref().map(graft_core::scenario::TargetFitness::to_vec),
            },
            cache_maxsize: sec.cache_maxsize,
            cache_keep: probability("cache_keep", sec.cache_keep)?,
            batch_bins: batch::parse_bins(&sec.batch_instances, &scenario.software.path)?,
            batch_shuffle: sec.batch_shuffle,
            batch_bin_shuffle: sec.batch_bin_shuffle,
            batch_sample_size: sec.batch_sample_size,
            ls: LocalSearchConfig {
                delete_prob: probability("ls.delete_prob", sec.ls.delete_prob)?,
                horizon: sec.ls.horizon,
                max_neighbours: sec.ls.max_neighbours,
                when_trapped,
                accept_fail: sec.ls.accept_fail,
                tabu_length: sec.ls.tabu_length,
            },
            gp: GeneticConfig {
                pop_size: sec.gp.pop_size,
                delete_prob: probability("gp.delete_prob", sec.gp.delete_prob)?,
                offspring_elitism: probability("gp.offspring_elitism", sec.gp.offspring_elitism)?,
                offspring_crossover: probability("gp.offspring_crossover", sec.gp.offspring_crossover)?,
                offspring_mutation: probability("gp.offspring_mutation", sec.gp.offspring_mutation)?,
                uniform_rate: probability("gp.uniform_rate", sec.gp.uniform_rate)?,
                batch_reset: sec.gp.batch_reset,
            },
            minify: MinifyConfig {
                do_cleanup: sec.minify.do_cleanup,
                do_rebuild: sec.minify.do_rebuild,
                do_simplify: sec.minify.do_simplify,
                round_robin_limit: sec.minify.round_robin_limit,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults() {
        let config = SearchConfig::from_scenario(&Scenario::default()).unwrap();
        assert_eq!(config.warmup, 3);
        assert_eq!(config.warmup_strategy, WarmupStrategy::Last);
        assert_eq!(config.cache_maxsize, 100);
        assert_eq!(config.ls.when_trapped, WhenTrapped::Continue);
        assert_eq!(config.ls.horizon, 1);
        assert_eq!(config.gp.pop_size, 10);
        assert_eq!(config.minify.round_robin_limit, 3);
        assert_eq!(config.batch_bins, vec![Vec::<String>::new()]);
        assert_eq!(config.stop, StopCriteria::default());
    }

    #[test]
    fn rejects_bad_values() {
        for toml in [
            "[search]\npossible_edits = [\"LineTeleport\"]\n",
            "[search]\nwarmup_strategy = \"mode\"\n",
            "[search]\ncache_keep = 1.5\n",
            "[search.ls]\nwhen_trapped = \"restart\"\n",
            "[search.gp]\npop_size = 0\n",
            "[search.ls]\nhorizon = 0\n",
        ] {
            let scenario = Scenario::from_toml_str(toml).unwrap();
            assert!(SearchConfig::from_scenario(&scenario).is_err(), "{toml}");
        }
    }

    #[test]
    fn warmup_combination() {
        let values = vec![vec![3.0], vec![1.0], vec![2.0], vec![6.0]];
        assert_eq!(WarmupStrategy::Last.combine(&values), Some(vec![6.0]));
        assert_eq!(WarmupStrategy::Min.combine(&values), Some(vec![1.0]));
        assert_eq!(WarmupStrategy::Max.combine(&values), Some(vec![6.0]));
        assert_eq!(WarmupStrategy::Mean.combine(&values), Some(vec![3.0]));
        // upper median on even counts
        assert_eq!(WarmupStrategy::Median.combine(&values), Some(vec![3.0]));
        assert_eq!(WarmupStrategy::Mean.combine(&[]), None);
    }
}
