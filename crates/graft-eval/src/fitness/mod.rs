//! Fitness extractor plugins
//!
//! An extractor sees the outcome of every stage command and may set the
//! stage status or a fitness value. The default behaviour of every stage
//! is to fail on a non-zero exit code; extractors override only the
//! stages they read.
//!
//! Extractors are looked up by name from the scenario's `fitness` list.
//! A leading `-` turns the objective into one to maximize; several names
//! make a vector fitness compared in list order.

mod basic;
mod bloat;
mod gnu;
mod perf;

pub use basic::{OutputFitness, PerfInstructionsFitness, PerfTimeFitness, PosixTimeFitness, RepairFitness, TimeFitness};
pub use bloat::{BloatFitness, BloatUnit};
pub use gnu::{GnuMetric, GnuTimeFitness};
pub use perf::PerfEventFitness;

use crate::exec::ExecResult;
use crate::status::{Stage, StatusKind};
use graft_core::ScenarioError;
use std::fmt::Debug;
use std::path::Path;

/// Status and fitness produced by one stage
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measure {
    pub status: StatusKind,
    pub fitness: Option<f64>,
}

impl Measure {
    /// Fresh measure for a command that ran to completion
    #[must_use]
    pub fn success() -> Self {
        Self {
            status: StatusKind::Success,
            fitness: None,
        }
    }

    /// Record `value`, or a parse error when it is absent
    pub fn set_or_parse_error(&mut self, value: Option<f64>) {
        match value {
            Some(v) => self.fitness = Some(v),
            None => self.status = StatusKind::ParseError,
        }
    }
}

/// What an extractor may look at
#[derive(Debug, Clone, Copy)]
pub struct StageRun<'a> {
    pub exec: &'a ExecResult,
    /// Directory the command ran in
    pub work_path: &'a Path,
    /// Target files as written in the work directory
    pub target_files: &'a [String],
}

/// Fail on non-zero exit code
pub fn check_return_code(measure: &mut Measure, stage_run: &StageRun<'_>) {
    if stage_run.exec.return_code != Some(0) {
        measure.status = StatusKind::CodeError;
    }
}

/// Five-stage extraction contract
pub trait FitnessExtractor: Send + Sync + Debug {
    /// Canonical name, as written in the scenario
    fn name(&self) -> String;

    fn process_init_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
    }

    fn process_setup_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
    }

    fn process_compile_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
    }

    fn process_test_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
    }

    fn process_run_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
    }
}

/// Dispatch to the hook of `stage`
pub fn process_stage(extractor: &dyn FitnessExtractor, stage: Stage, measure: &mut Measure, stage_run: &StageRun<'_>) {
    match stage {
        Stage::Init => extractor.process_init_exec(measure, stage_run),
        Stage::Setup => extractor.process_setup_exec(measure, stage_run),
        Stage::Compile => extractor.process_compile_exec(measure, stage_run),
        Stage::Test => extractor.process_test_exec(measure, stage_run),
        Stage::Run | Stage::Batch => extractor.process_run_exec(measure, stage_run),
    }
}

/// One component of the fitness vector
#[derive(Debug)]
pub struct Objective {
    pub extractor: Box<dyn FitnessExtractor>,
    pub maximize: bool,
}

impl Objective {
    /// Parse `name`, `-name` or `perf<event>`
    ///
    /// # Errors
    /// Returns [`ScenarioError::Invalid`] for unknown names.
    pub fn parse(text: &str) -> Result<Self, ScenarioError> {
        let text = text.trim();
        let (maximize, name) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        let extractor = extractor_from_name(name).ok_or_else(|| {
            ScenarioError::invalid("software", "fitness", format!("unknown fitness \"{name}\""))
        })?;
        Ok(Self { extractor, maximize })
    }

    /// Name with its direction marker
    #[must_use]
    pub fn label(&self) -> String {
        if self.maximize {
            format!("-{}", self.extractor.name())
        } else {
            self.extractor.name()
        }
    }
}

/// Names accepted by [`extractor_from_name`], templates excluded
pub const KNOWN: &[&str] = &[
    "repair",
    "time",
    "posix_time",
    "perf_time",
    "perf_instructions",
    "output",
    "bloat_lines",
    "bloat_words",
    "bloat_chars",
    "gnu_time",
    "gnu_user_time",
    "gnu_system_time",
    "gnu_memory",
    "gnu_major_pagefaults",
    "gnu_minor_pagefaults",
    "gnu_pagefaults",
    "gnu_swaps",
];

/// Registry lookup
#[must_use]
pub fn extractor_from_name(name: &str) -> Option<Box<dyn FitnessExtractor>> {
    if let Some(event) = name.strip_prefix("perf<").and_then(|r| r.strip_suffix('>')) {
        return PerfEventFitness::new(event).map(|f| Box::new(f) as Box<dyn FitnessExtractor>);
    }
    let extractor: Box<dyn FitnessExtractor> = match name {
        "repair" => Box::new(RepairFitness),
        "time" => Box::new(TimeFitness),
        "posix_time" => Box::new(PosixTimeFitness),
        "perf_time" => Box::new(PerfTimeFitness),
        "perf_instructions" => Box::new(PerfInstructionsFitness),
        "output" => Box::new(OutputFitness),
        "bloat_lines" => Box::new(BloatFitness(BloatUnit::Lines)),
        "bloat_words" => Box::new(BloatFitness(BloatUnit::Words)),
        "bloat_chars" => Box::new(BloatFitness(BloatUnit::Chars)),
        _ => Box::new(GnuTimeFitness(GnuMetric::from_name(name)?)),
    };
    Some(extractor)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;

    pub(crate) fn exec(code: i32, stdout: &str, stderr: &str) -> ExecResult {
        ExecResult {
            cmd: vec!["true".to_string()],
            status: StatusKind::Success,
            return_code: Some(code),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
            runtime: Duration::from_millis(1234),
            output_length: (stdout.len() + stderr.len()) as u64,
            pid: Some(1),
        }
    }

    pub(crate) fn run(extractor: &dyn FitnessExtractor, stage: Stage, exec: &ExecResult) -> Measure {
        let mut measure = Measure::success();
        let stage_run = StageRun {
            exec,
            work_path: Path::new("."),
            target_files: &[],
        };
        process_stage(extractor, stage, &mut measure, &stage_run);
        measure
    }

    #[test]
    fn every_known_name_resolves() {
        for name in KNOWN {
            let extractor = extractor_from_name(name).unwrap();
            assert_eq!(extractor.name(), *name);
        }
        assert!(extractor_from_name("nope").is_none());
    }

    #[test]
    fn objective_direction() {
        let o = Objective::parse("-time").unwrap();
        assert!(o.maximize);
        assert_eq!(o.label(), "-time");
        let o = Objective::parse("perf<task clock>").unwrap();
        assert!(!o.maximize);
        assert_eq!(o.label(), "perf<task clock>");
        assert!(Objective::parse("speed").is_err());
    }

    #[test]
    fn default_hooks_check_exit_code() {
        let time = TimeFitness;
        assert_eq!(run(&time, Stage::Compile, &exec(1, "", "")).status, StatusKind::CodeError);
        assert_eq!(run(&time, Stage::Compile, &exec(0, "", "")), Measure::success());
    }
}
