//! Run statistics, final report and stop reasons

use graft_core::Patch;
use std::fmt::{self, Display, Formatter};
use std::time::{Duration, Instant};

/// Why a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Budget,
    TimeBudget,
    StepBudget,
    TargetFitness,
    Trapped,
    Interrupted,
    /// The unmodified program failed at the named step
    WarmupFailed(String),
    DummyEnd,
    DebugEnd,
    ValidationEnd,
    ValidationEndEmpty,
    ValidationEndAllBad,
    AblationEnd,
    AblationEndEmpty,
}

impl Display for StopReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Budget => f.write_str("budget"),
            Self::TimeBudget => f.write_str("time budget"),
            Self::StepBudget => f.write_str("step budget"),
            Self::TargetFitness => f.write_str("target fitness reached"),
            Self::Trapped => f.write_str("trapped"),
            Self::Interrupted => f.write_str("interrupted"),
            Self::WarmupFailed(step) => write!(f, "failed to {step} target software"),
            Self::DummyEnd => f.write_str("dummy end"),
            Self::DebugEnd => f.write_str("debug end"),
            Self::ValidationEnd => f.write_str("validation end"),
            Self::ValidationEndEmpty => f.write_str("validation end (empty patch)"),
            Self::ValidationEndAllBad => f.write_str("validation end (all bad)"),
            Self::AblationEnd => f.write_str("ablation end"),
            Self::AblationEndEmpty => f.write_str("ablation end (empty patch)"),
        }
    }
}

/// Counters updated while searching
#[derive(Debug, Clone)]
pub struct Stats {
    pub steps: u64,
    /// Evaluations that actually ran commands
    pub budget: u64,
    /// Consecutive unaccepted moves
    pub neighbours: u64,
    /// Current generation, for population-based strategies
    pub generation: Option<u64>,
    pub wallclock_start: Instant,
    pub wallclock_total: Duration,
}

impl Default for Stats {
    fn default() -> Self {
        Self {
            steps: 0,
            budget: 0,
            neighbours: 0,
            generation: None,
            wallclock_start: Instant::now(),
            wallclock_total: Duration::ZERO,
        }
    }
}

/// Outcome of a run
#[derive(Debug, Clone, Default)]
pub struct Report {
    pub initial_patch: Option<Patch>,
    pub initial_fitness: Option<Vec<f64>>,
    pub best_patch: Option<Patch>,
    pub best_fitness: Option<Vec<f64>>,
    /// Patch analysed by validation passes
    pub debug_patch: Option<Patch>,
    pub stop: Option<StopReason>,
    /// Diff of the best patch, computed at the end
    pub diff: Option<String>,
}

impl Report {
    /// Whether the best patch modifies anything
    #[must_use]
    pub fn has_best_edits(&self) -> bool {
        self.best_patch.as_ref().is_some_and(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stable_reason_strings() {
        assert_eq!(StopReason::TargetFitness.to_string(), "target fitness reached");
        assert_eq!(
            StopReason::WarmupFailed("compile".into()).to_string(),
            "failed to compile target software"
        );
        assert_eq!(StopReason::AblationEndEmpty.to_string(), "ablation end (empty patch)");
    }
}
