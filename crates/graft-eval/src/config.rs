//! Typed `[software]` configuration
//!
//! Validated once from the raw scenario table; every invalid value is a
//! [`ScenarioError`] raised before anything runs.

use crate::aggregate::{BatchStrategy, BinStrategy};
use crate::exec::split_command;
use crate::fitness::Objective;
use crate::status::Stage;
use graft_core::scenario::SoftwareSection;
use graft_core::settings::{parse_lengthout, parse_timeout};
use graft_core::{ModelOptions, ModelRule, Scenario, ScenarioError, Settings};
use std::path::PathBuf;
use std::time::Duration;

/// One configured stage command
#[derive(Debug, Clone, PartialEq)]
pub struct StageCommand {
    pub stage: Stage,
    /// Command template, before `{PARAMS}` / `{INST}` substitution
    pub line: String,
    pub timeout: Duration,
    /// `None` is unlimited
    pub lengthout: Option<u64>,
}

impl StageCommand {
    /// Substitute `{PARAMS}` (or append) and split into arguments
    ///
    /// Returns `None` on unbalanced quotes.
    #[must_use]
    pub fn render(&self, cli: &str, instance: Option<&str>) -> Option<Vec<String>> {
        let template = self.line.trim();
        let mut line = template.to_string();
        if let Some(inst) = instance {
            line = substitute(&line, "{INST}", inst);
        }
        line = substitute(&line, "{PARAMS}", cli);
        split_command(&line)
    }
}

fn substitute(line: &str, placeholder: &str, value: &str) -> String {
    if line.contains(placeholder) {
        line.replace(placeholder, value)
    } else if value.is_empty() {
        line.to_string()
    } else {
        format!("{line} {value}")
    }
}

/// Validated `[software]` table
#[derive(Debug)]
pub struct SoftwareConfig {
    pub path: PathBuf,
    /// Target file names, possibly with wildcards
    pub target_files: Vec<String>,
    pub model_rules: Vec<ModelRule>,
    pub model_options: ModelOptions,
    pub objectives: Vec<Objective>,
    pub init: Option<StageCommand>,
    pub setup: Option<StageCommand>,
    pub compile: Option<StageCommand>,
    pub test: Option<StageCommand>,
    pub run: Option<StageCommand>,
    pub batch_timeout: Option<Duration>,
    pub batch_lengthout: Option<u64>,
    pub bin_strategy: BinStrategy,
    pub batch_strategy: BatchStrategy,
}

impl SoftwareConfig {
    /// Validate the `[software]`, `[params]` and `[srcml]` tables
    ///
    /// # Errors
    /// Returns [`ScenarioError`] on missing or malformed keys.
    pub fn from_scenario(scenario: &Scenario, settings: &Settings) -> Result<Self, ScenarioError> {
        let sec = &scenario.software;
        if sec.path.as_os_str().is_empty() {
            return Err(ScenarioError::missing("software", "path"));
        }
        if sec.target_files.is_empty() {
            return Err(ScenarioError::missing("software", "target_files"));
        }
        if sec.model_rules.is_empty() {
            return Err(ScenarioError::missing("software", "model_rules"));
        }
        if sec.fitness.is_empty() {
            return Err(ScenarioError::missing("software", "fitness"));
        }
        let objectives = sec
            .fitness
            .iter()
            .map(|s| Objective::parse(s))
            .collect::<Result<Vec<_>, _>>()?;

        let stage = |stage: Stage| stage_command(sec, stage, settings);
        Ok(Self {
            path: sec.path.clone(),
            target_files: sec.target_files.clone(),
            model_rules: ModelRule::parse_all(&sec.model_rules)?,
            model_options: ModelOptions {
                params: scenario.params.clone(),
                srcml: scenario.srcml.clone(),
            },
            objectives,
            init: stage(Stage::Init)?,
            setup: stage(Stage::Setup)?,
            compile: stage(Stage::Compile)?,
            test: stage(Stage::Test)?,
            run: stage(Stage::Run)?,
            batch_timeout: sec.batch_timeout.and_then(parse_timeout),
            batch_lengthout: sec.batch_lengthout.and_then(parse_lengthout),
            bin_strategy: sec.batch_bin_fitness_strategy.parse()?,
            batch_strategy: sec.batch_fitness_strategy.parse()?,
        })
    }

    /// Command of a stage, if configured
    #[must_use]
    pub fn command(&self, stage: Stage) -> Option<&StageCommand> {
        match stage {
            Stage::Init => self.init.as_ref(),
            Stage::Setup => self.setup.as_ref(),
            Stage::Compile => self.compile.as_ref(),
            Stage::Test => self.test.as_ref(),
            Stage::Run => self.run.as_ref(),
            Stage::Batch => None,
        }
    }

    /// Per-objective maximize flags, in fitness order
    #[must_use]
    pub fn maximize(&self) -> Vec<bool> {
        self.objectives.iter().map(|o| o.maximize).collect()
    }
}

fn stage_command(sec: &SoftwareSection, stage: Stage, settings: &Settings) -> Result<Option<StageCommand>, ScenarioError> {
    let (cmd, timeout, lengthout) = match stage {
        Stage::Init => (&sec.init_cmd, sec.init_timeout, sec.init_lengthout),
        Stage::Setup => (&sec.setup_cmd, sec.setup_timeout, sec.setup_lengthout),
        Stage::Compile => (&sec.compile_cmd, sec.compile_timeout, sec.compile_lengthout),
        Stage::Test => (&sec.test_cmd, sec.test_timeout, sec.test_lengthout),
        Stage::Run => (&sec.run_cmd, sec.run_timeout, sec.run_lengthout),
        Stage::Batch => return Ok(None),
    };
    let Some(line) = cmd.as_deref().map(str::trim).filter(|l| !l.is_empty() && !l.eq_ignore_ascii_case("none")) else {
        return Ok(None);
    };
    let key = format!("{}_cmd", stage.key());
    if split_command(line).is_none() {
        return Err(ScenarioError::invalid("software", key, "has unbalanced quotes"));
    }
    let lengthout = match lengthout {
        // zero or unset falls back to the default; negative is unlimited
        None | Some(0) => settings.default_lengthout,
        Some(n) => parse_lengthout(n),
    };
    Ok(Some(StageCommand {
        stage,
        line: line.to_string(),
        timeout: timeout.and_then(parse_timeout).unwrap_or(settings.default_timeout),
        lengthout,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(extra: &str) -> Scenario {
        Scenario::from_toml_str(&format!(
            "[software]\npath = \"prog\"\ntarget_files = [\"a.c\"]\nfitness = [\"time\"]\n{extra}"
        ))
        .unwrap()
    }

    #[test]
    fn stage_defaults() {
        let config = SoftwareConfig::from_scenario(
            &scenario("run_cmd = \"./run.sh\"\ninit_cmd = \"make init\"\n"),
            &Settings::default(),
        )
        .unwrap();
        let run = config.run.as_ref().unwrap();
        assert_eq!(run.timeout, Duration::from_secs(30));
        assert_eq!(run.lengthout, Some(10_000));
        let init = config.init.as_ref().unwrap();
        assert_eq!(init.timeout, Duration::from_secs(60));
        assert_eq!(init.lengthout, None);
        assert!(config.compile.is_none());
        assert_eq!(config.maximize(), vec![false]);
    }

    #[test]
    fn missing_keys() {
        let err = SoftwareConfig::from_scenario(&Scenario::default(), &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("path"));
        let s = Scenario::from_toml_str("[software]\npath = \"prog\"\ntarget_files = [\"a.c\"]\n").unwrap();
        let err = SoftwareConfig::from_scenario(&s, &Settings::default()).unwrap_err();
        assert!(err.to_string().contains("fitness"));
        let mut s = scenario("");
        s.software.fitness = vec!["speed".to_string()];
        assert!(SoftwareConfig::from_scenario(&s, &Settings::default()).is_err());
    }

    #[test]
    fn bad_values() {
        assert!(SoftwareConfig::from_scenario(&scenario("run_cmd = \"echo 'x\"\n"), &Settings::default()).is_err());
        let s = scenario("batch_fitness_strategy = \"mode\"\n");
        assert!(SoftwareConfig::from_scenario(&s, &Settings::default()).is_err());
    }

    #[test]
    fn substitution() {
        let cmd = StageCommand {
            stage: Stage::Run,
            line: "./run.sh {INST} --fast".to_string(),
            timeout: Duration::from_secs(1),
            lengthout: None,
        };
        assert_eq!(
            cmd.render("--n=2", Some("in 1")).unwrap(),
            vec!["./run.sh", "in", "1", "--fast", "--n=2"]
        );
        let cmd = StageCommand {
            line: "./run.sh {PARAMS}".to_string(),
            ..cmd
        };
        assert_eq!(cmd.render("", Some("")).unwrap(), vec!["./run.sh"]);
    }
}
