//! Runtime, output and test-suite extractors

use super::{check_return_code, FitnessExtractor, Measure, StageRun};
use once_cell::sync::Lazy;
use regex::Regex;

macro_rules! regex {
    ($re:expr) => {
        Lazy::new(|| Regex::new($re).expect("static regex"))
    };
}

static POSIX_REAL: Lazy<Regex> = regex!(r"real (.*)");
static PERF_ELAPSED: Lazy<Regex> = regex!(r"(.*) seconds time elapsed");
static PERF_INSTRUCTIONS: Lazy<Regex> = regex!(r"(.*) instructions");
static OUTPUT_MARKER: Lazy<Regex> = regex!(r"GRAFT_FITNESS: (.*)");

/// Test-suite summaries understood by [`RepairFitness`]: failures, then totals
static TEST_SUMMARIES: Lazy<Vec<(Regex, Regex)>> = Lazy::new(|| {
    [
        // junit
        (r"Failures: (\d+)\b", r"(?m)^(?:Tests run: |OK \()(\d+)\b"),
        // pytest
        (r"\b(\d+) (?:failed|error)", r"(?m)^collected (\d+) items"),
        // minitest
        (r" (\d+) (?:failures|errors)", r"(?m)^(\d+) runs,"),
    ]
    .iter()
    .map(|(fail, total)| (Regex::new(fail).expect("static regex"), Regex::new(total).expect("static regex")))
    .collect()
});

fn round(x: f64, digits: i32) -> f64 {
    let scale = 10f64.powi(digits);
    (x * scale).round() / scale
}

fn capture_f64(re: &Regex, text: &str) -> Option<f64> {
    re.captures(text)?.get(1)?.as_str().trim().parse().ok()
}

/// Percentage of failed tests reported by the test command
///
/// A failing test suite is the expected input, so the exit code is not
/// checked.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairFitness;

impl FitnessExtractor for RepairFitness {
    fn name(&self) -> String {
        "repair".to_string()
    }

    fn process_test_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        let stdout = stage_run.exec.stdout_text();
        for (fail, total) in TEST_SUMMARIES.iter() {
            let sum = |re: &Regex| -> f64 {
                re.captures_iter(&stdout)
                    .filter_map(|c| c.get(1)?.as_str().parse::<f64>().ok())
                    .sum()
            };
            let n_total = sum(total);
            if n_total > 0.0 {
                measure.fitness = Some(round(100.0 * sum(fail) / n_total, 2));
                return;
            }
        }
        measure.status = crate::status::StatusKind::ParseError;
    }
}

/// Wall-clock runtime of the run command, in seconds
#[derive(Debug, Clone, Copy, Default)]
pub struct TimeFitness;

impl FitnessExtractor for TimeFitness {
    fn name(&self) -> String {
        "time".to_string()
    }

    fn process_run_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
        measure.fitness = Some(round(stage_run.exec.runtime.as_secs_f64(), 4));
    }
}

/// `real` line of a POSIX `time -p` report on stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct PosixTimeFitness;

impl FitnessExtractor for PosixTimeFitness {
    fn name(&self) -> String {
        "posix_time".to_string()
    }

    fn process_run_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
        measure.set_or_parse_error(capture_f64(&POSIX_REAL, &stage_run.exec.stderr_text()));
    }
}

/// Elapsed seconds of a `perf stat` report on stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfTimeFitness;

impl FitnessExtractor for PerfTimeFitness {
    fn name(&self) -> String {
        "perf_time".to_string()
    }

    fn process_run_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
        let value = capture_f64(&PERF_ELAPSED, &stage_run.exec.stderr_text()).map(|x| round(x, 4));
        measure.set_or_parse_error(value);
    }
}

/// Instruction count of a `perf stat` report on stderr
#[derive(Debug, Clone, Copy, Default)]
pub struct PerfInstructionsFitness;

impl FitnessExtractor for PerfInstructionsFitness {
    fn name(&self) -> String {
        "perf_instructions".to_string()
    }

    fn process_run_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
        let stderr = stage_run.exec.stderr_text();
        let value = PERF_INSTRUCTIONS
            .captures(&stderr)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().trim().replace(',', "").parse::<u64>().ok());
        #[allow(clippy::cast_precision_loss)]
        measure.set_or_parse_error(value.map(|n| n as f64));
    }
}

/// Value printed by the program itself after `GRAFT_FITNESS: `
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputFitness;

impl FitnessExtractor for OutputFitness {
    fn name(&self) -> String {
        "output".to_string()
    }

    fn process_run_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
        measure.set_or_parse_error(capture_f64(&OUTPUT_MARKER, &stage_run.exec.stdout_text()));
    }
}
