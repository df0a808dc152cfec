//! `perf<event>`: any counter of a `perf stat` report

use super::{check_return_code, FitnessExtractor, Measure, StageRun};
use regex::Regex;

/// Counter named by the template argument, matched case and space insensitively
#[derive(Debug, Clone)]
pub struct PerfEventFitness {
    event: String,
    decimal: Regex,
    percent: Regex,
    integer: Regex,
}

impl PerfEventFitness {
    /// `None` when the event name is empty
    #[must_use]
    pub fn new(event: &str) -> Option<Self> {
        let key: String = event.to_lowercase().chars().filter(|c| *c != ' ').collect();
        if key.is_empty() {
            return None;
        }
        let key = regex::escape(&key);
        Some(Self {
            event: event.trim().to_string(),
            decimal: Regex::new(&format!(r"(\d+\.\d+).*{key}")).ok()?,
            percent: Regex::new(&format!(r"(\d+\.\d+)%?.*{key}")).ok()?,
            integer: Regex::new(&format!(r"(\d+(?:,\d\d\d)*).*{key}")).ok()?,
        })
    }

    fn extract(&self, stderr: &str) -> Option<f64> {
        for line in stderr.lines() {
            let squashed: String = line.to_lowercase().chars().filter(|c| *c != ' ').collect();
            for re in [&self.decimal, &self.percent] {
                if let Some(c) = re.captures(&squashed) {
                    return c.get(1)?.as_str().parse().ok();
                }
            }
            if let Some(c) = self.integer.captures(&squashed) {
                return c.get(1)?.as_str().replace(',', "").parse().ok();
            }
        }
        None
    }
}

impl FitnessExtractor for PerfEventFitness {
    fn name(&self) -> String {
        format!("perf<{}>", self.event)
    }

    fn process_run_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
        measure.set_or_parse_error(self.extract(&stage_run.exec.stderr_text()));
    }
}
