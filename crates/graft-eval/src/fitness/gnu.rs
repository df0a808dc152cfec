//! GNU `/usr/bin/time` report extractors

use super::{check_return_code, FitnessExtractor, Measure, StageRun};
use once_cell::sync::Lazy;
use regex::Regex;

static USER: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.\d\d)user").expect("static regex"));
static SYSTEM: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+\.\d\d)system").expect("static regex"));
static ELAPSED: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d*?):?(\d+):(\d\d\.\d\d)elapsed").expect("static regex"));
static MAXRESIDENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)maxresident").expect("static regex"));
static PAGEFAULTS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\((\d+)major\+(\d+)minor\)pagefaults").expect("static regex"));
static SWAPS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)swaps").expect("static regex"));

/// Quantity read from the default GNU time format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GnuMetric {
    Elapsed,
    User,
    System,
    Memory,
    MajorPagefaults,
    MinorPagefaults,
    Pagefaults,
    Swaps,
}

impl GnuMetric {
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "gnu_time" => Self::Elapsed,
            "gnu_user_time" => Self::User,
            "gnu_system_time" => Self::System,
            "gnu_memory" => Self::Memory,
            "gnu_major_pagefaults" => Self::MajorPagefaults,
            "gnu_minor_pagefaults" => Self::MinorPagefaults,
            "gnu_pagefaults" => Self::Pagefaults,
            "gnu_swaps" => Self::Swaps,
            _ => return None,
        })
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Elapsed => "gnu_time",
            Self::User => "gnu_user_time",
            Self::System => "gnu_system_time",
            Self::Memory => "gnu_memory",
            Self::MajorPagefaults => "gnu_major_pagefaults",
            Self::MinorPagefaults => "gnu_minor_pagefaults",
            Self::Pagefaults => "gnu_pagefaults",
            Self::Swaps => "gnu_swaps",
        }
    }

    fn extract(self, stderr: &str) -> Option<f64> {
        let group = |re: &Regex, i: usize| -> Option<f64> { re.captures(stderr)?.get(i)?.as_str().parse().ok() };
        match self {
            Self::Elapsed => {
                let caps = ELAPSED.captures(stderr)?;
                let minutes: f64 = caps.get(2)?.as_str().parse().ok()?;
                let seconds: f64 = caps.get(3)?.as_str().parse().ok()?;
                let hours: f64 = match caps.get(1).map(|m| m.as_str()) {
                    Some(h) if !h.is_empty() => h.parse().ok()?,
                    _ => 0.0,
                };
                Some(3600.0 * hours + 60.0 * minutes + seconds)
            }
            Self::User => group(&USER, 1),
            Self::System => group(&SYSTEM, 1),
            Self::Memory => group(&MAXRESIDENT, 1),
            Self::MajorPagefaults => group(&PAGEFAULTS, 1),
            Self::MinorPagefaults => group(&PAGEFAULTS, 2),
            Self::Pagefaults => Some(group(&PAGEFAULTS, 1)? + group(&PAGEFAULTS, 2)?),
            Self::Swaps => group(&SWAPS, 1),
        }
    }
}

/// One metric of a GNU time report on stderr
#[derive(Debug, Clone, Copy)]
pub struct GnuTimeFitness(pub GnuMetric);

impl FitnessExtractor for GnuTimeFitness {
    fn name(&self) -> String {
        self.0.name().to_string()
    }

    fn process_run_exec(&self, measure: &mut Measure, stage_run: &StageRun<'_>) {
        check_return_code(measure, stage_run);
        measure.set_or_parse_error(self.0.extract(&stage_run.exec.stderr_text()));
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{exec, run};
    use super::*;
    use crate::status::{Stage, StatusKind};

    const REPORT: &str = "0.40user 0.02system 1:02.50elapsed 98%CPU (0avgtext+0avgdata 5120maxresident)k\n\
                          0inputs+8outputs (3major+250minor)pagefaults 0swaps\n";

    fn metric(name: &str) -> Option<f64> {
        run(&GnuTimeFitness(GnuMetric::from_name(name).unwrap()), Stage::Run, &exec(0, "", REPORT)).fitness
    }

    #[test]
    fn default_format() {
        assert_eq!(metric("gnu_user_time"), Some(0.40));
        assert_eq!(metric("gnu_system_time"), Some(0.02));
        assert_eq!(metric("gnu_time"), Some(62.5));
        assert_eq!(metric("gnu_memory"), Some(5120.0));
        assert_eq!(metric("gnu_major_pagefaults"), Some(3.0));
        assert_eq!(metric("gnu_minor_pagefaults"), Some(250.0));
        assert_eq!(metric("gnu_pagefaults"), Some(253.0));
        assert_eq!(metric("gnu_swaps"), Some(0.0));
    }

    #[test]
    fn hours_are_counted() {
        let m = run(&GnuTimeFitness(GnuMetric::Elapsed), Stage::Run, &exec(0, "", "1:00:01.00elapsed"));
        assert_eq!(m.fitness, Some(3601.0));
    }

    #[test]
    fn missing_report_is_parse_error() {
        let m = run(&GnuTimeFitness(GnuMetric::Swaps), Stage::Run, &exec(0, "", "nothing"));
        assert_eq!(m.status, StatusKind::ParseError);
    }
}
