//! Evaluation results

use crate::exec::ExecResult;
use crate::status::RunStatus;
use indexmap::IndexMap;
use std::fmt::Write as _;

/// Outcome of one batch instance
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceOutcome {
    pub status: RunStatus,
    /// One value per objective; `None` unless the instance succeeded
    pub fitness: Option<Vec<f64>>,
}

/// Result of evaluating one variant
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub status: RunStatus,
    /// One value per objective; `None` on failure
    pub fitness: Option<Vec<f64>>,
    /// Per-instance outcomes, in execution order
    pub cache: IndexMap<String, InstanceOutcome>,
    /// Free-form annotation appended to evaluation log lines
    pub log: String,
    /// Last executed command, kept for diagnostics
    pub last_exec: Option<ExecResult>,
    /// Served from the evaluation cache
    pub cached: bool,
    /// At least one command ran for this result
    pub updated: bool,
}

impl Default for RunResult {
    fn default() -> Self {
        Self::new(RunStatus::UNKNOWN)
    }
}

impl RunResult {
    #[must_use]
    pub fn new(status: RunStatus) -> Self {
        Self {
            status,
            fitness: None,
            cache: IndexMap::new(),
            log: String::new(),
            last_exec: None,
            cached: false,
            updated: false,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Fitness rendered as in logs: a bare number for a single objective
    #[must_use]
    pub fn fitness_text(&self) -> String {
        render_fitness(self.fitness.as_deref())
    }
}

/// Render a fitness as a scalar or a bracketed list
#[must_use]
pub fn render_fitness(fitness: Option<&[f64]>) -> String {
    match fitness {
        None => "None".to_string(),
        Some([single]) => render_float(*single),
        Some(values) => {
            let mut out = String::from("[");
            for (i, v) in values.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{}", render_float(*v));
            }
            out.push(']');
            out
        }
    }
}

/// Shortest round-tripping form, integers without a trailing `.0`
#[must_use]
pub fn render_float(x: f64) -> String {
    if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e15 {
        format!("{x:.0}")
    } else {
        format!("{x}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fitness_rendering() {
        let mut run = RunResult::new(RunStatus::SUCCESS);
        assert_eq!(run.fitness_text(), "None");
        run.fitness = Some(vec![12.0]);
        assert_eq!(run.fitness_text(), "12");
        run.fitness = Some(vec![0.25, 3.0]);
        assert_eq!(run.fitness_text(), "[0.25, 3]");
    }
}
