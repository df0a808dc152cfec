//! Run protocol: set up the software, run one algorithm, report
//!
//! The best patch and its diff are saved next to the log file as
//! `<run_label>.patch` and `<run_label>.diff` when they modify anything.
//! The run's work directory is removed at the end, whatever the outcome.

use crate::logging::LogFile;
use anyhow::{Context, Result};
use graft_core::{Patch, Scenario, Settings};
use graft_eval::render_fitness;
use graft_eval::{Software, SoftwareConfig};
use graft_search::{Engine, Report, SearchConfig, StrategyRegistry, DEFAULT_ALGORITHM};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::{debug, info};

/// One protocol invocation
#[derive(Debug)]
pub(crate) struct Protocol {
    pub(crate) scenario: Scenario,
    pub(crate) settings: Settings,
    /// Overrides `[search] algorithm`
    pub(crate) algorithm: Option<String>,
    /// Patch handed to validation strategies
    pub(crate) debug_patch: Option<Patch>,
    pub(crate) interrupt: Arc<AtomicBool>,
}

/// Files written at the end of a run
#[derive(Debug, Default, PartialEq, Eq)]
pub(crate) struct Artifacts {
    pub(crate) patch: Option<PathBuf>,
    pub(crate) diff: Option<PathBuf>,
}

impl Protocol {
    fn algorithm(&self) -> &str {
        self.algorithm
            .as_deref()
            .filter(|a| !a.is_empty())
            .or(Some(self.scenario.search.algorithm.as_str()).filter(|a| !a.is_empty()))
            .unwrap_or(DEFAULT_ALGORITHM)
    }

    /// Run the configured algorithm once
    ///
    /// # Errors
    /// Fails on invalid scenarios, a failing init command, unusable work
    /// or log directories and errors raised by the algorithm.
    pub(crate) fn run(self, log_file: &LogFile) -> Result<(Report, Artifacts)> {
        let registry = StrategyRegistry::with_defaults();
        let mut strategy = registry.create(self.algorithm())?;
        let search = SearchConfig::from_scenario(&self.scenario)?;
        let config = SoftwareConfig::from_scenario(&self.scenario, &self.settings)?;
        let software = Software::new(config, &self.settings)?;

        let label = software.run_label();
        log_file.attach(&self.settings.log_dir.join(format!("{label}.log")))?;
        debug!("==== CONFIG ====\n{}", self.scenario.to_toml_string());

        let mut engine = Engine::new(software, search).with_interrupt(self.interrupt);
        engine.report.debug_patch = self.debug_patch;
        let outcome = engine.run(strategy.as_mut());

        let artifacts = if outcome.is_ok() {
            report(&engine.report, &self.settings.log_dir, &label, log_file)?
        } else {
            Artifacts::default()
        };
        engine
            .software()
            .clean_work_dir()
            .context("cleaning the work directory")?;
        outcome?;
        Ok((engine.report, artifacts))
    }
}

/// Log the final report and save the best patch
fn report(report: &Report, log_dir: &Path, label: &str, log_file: &LogFile) -> Result<Artifacts> {
    info!("");
    info!("==== REPORT ====");
    info!(
        "Termination: {}",
        report.stop.as_ref().map_or_else(|| "none".to_string(), ToString::to_string)
    );
    if let Some(path) = log_file.path() {
        info!("Log file: {}", path.display());
    }
    let Some(best) = report.best_patch.as_ref().filter(|p| !p.is_empty()) else {
        return Ok(Artifacts::default());
    };

    let patch_file = log_dir.join(format!("{label}.patch"));
    let diff_file = log_dir.join(format!("{label}.diff"));
    let diff = report.diff.as_deref().unwrap_or_default();
    info!("Patch file: {}", patch_file.display());
    info!("Diff file: {}", diff_file.display());
    info!("Best fitness: {}", render_fitness(report.best_fitness.as_deref()));
    info!("Best patch: {best}");
    info!("Diff:\n{diff}");

    fs::create_dir_all(log_dir).with_context(|| format!("creating {}", log_dir.display()))?;
    fs::write(&patch_file, format!("{best}\n")).with_context(|| format!("writing {}", patch_file.display()))?;
    fs::write(&diff_file, diff).with_context(|| format!("writing {}", diff_file.display()))?;
    Ok(Artifacts {
        patch: Some(patch_file),
        diff: Some(diff_file),
    })
}

/// Patch given on the command line: a `.patch` file or the patch itself
///
/// # Errors
/// Fails when the file is unreadable or the text is not a patch.
pub(crate) fn read_patch(arg: &str) -> Result<Patch> {
    let path = Path::new(arg);
    if path.is_file() {
        return Patch::load(path).with_context(|| format!("reading patch file {arg}"));
    }
    arg.trim().parse().with_context(|| format!("parsing patch \"{arg}\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use graft_test_utils::TargetFixture;
    use pretty_assertions::assert_eq;

    fn protocol(fixture: &TargetFixture, search: &str, algorithm: Option<&str>) -> Protocol {
        let scenario = fixture.counting_scenario(search);
        Protocol {
            settings: scenario.settings().unwrap(),
            scenario,
            algorithm: algorithm.map(str::to_string),
            debug_patch: None,
            interrupt: Arc::new(AtomicBool::new(false)),
        }
    }

    #[test]
    fn algorithm_precedence() {
        let fixture = TargetFixture::counting();
        assert_eq!(protocol(&fixture, "", None).algorithm(), DEFAULT_ALGORITHM);
        let named = protocol(&fixture, "algorithm = \"RandomSearch\"\n", None);
        assert_eq!(named.algorithm(), "RandomSearch");
        let overridden = protocol(&fixture, "algorithm = \"RandomSearch\"\n", Some("TabuSearch"));
        assert_eq!(overridden.algorithm(), "TabuSearch");
    }

    #[test]
    fn improving_run_saves_patch_and_diff() {
        let fixture = TargetFixture::counting();
        let p = protocol(&fixture, "max_steps = 10\n\n[search.ls]\ndelete_prob = 0.0\n", None);
        let (report, artifacts) = p.run(&LogFile::default()).unwrap();

        assert!(report.has_best_edits());
        let patch = fs::read_to_string(artifacts.patch.unwrap()).unwrap();
        assert!(patch.ends_with('\n'));
        assert_eq!(read_patch(&patch).unwrap(), report.best_patch.clone().unwrap());
        let diff = fs::read_to_string(artifacts.diff.unwrap()).unwrap();
        assert!(diff.contains("-x=$((x+1))") || diff.contains("-x=0"));
        assert!(graft_test_utils::run_dirs(&fixture.work_dir()).is_empty());
    }

    #[test]
    fn dummy_run_saves_nothing() {
        let fixture = TargetFixture::counting();
        let p = protocol(&fixture, "", Some("DummySearch"));
        let (report, artifacts) = p.run(&LogFile::default()).unwrap();
        assert_eq!(report.stop.map(|s| s.to_string()).as_deref(), Some("dummy end"));
        assert_eq!(artifacts, Artifacts::default());
    }

    #[test]
    fn unknown_algorithm_is_an_error() {
        let fixture = TargetFixture::counting();
        let p = protocol(&fixture, "", Some("Annealing"));
        let err = p.run(&LogFile::default()).unwrap_err();
        assert!(err.to_string().contains("Annealing"));
    }
}
