//! Run status taxonomy
//!
//! A status is an outcome kind optionally tagged with the stage that
//! produced it. The rendered tag (`SETUP_TIMEOUT`, `RUN_CODE_ERROR`,
//! `BATCH_LENGTHOUT`, ...) is the machine-readable signal surfaced to
//! algorithms and logs; stage failures are values, never errors.

use serde::Serialize;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Stage {
    Init,
    Setup,
    Compile,
    Test,
    Run,
    /// Cumulative batch budgets, not a command of its own
    Batch,
}

impl Stage {
    /// Every stage that runs a command, in pipeline order
    pub const COMMANDS: [Self; 5] = [Self::Init, Self::Setup, Self::Compile, Self::Test, Self::Run];

    /// Upper-case tag used as status prefix
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Init => "INIT",
            Self::Setup => "SETUP",
            Self::Compile => "COMPILE",
            Self::Test => "TEST",
            Self::Run => "RUN",
            Self::Batch => "BATCH",
        }
    }

    /// Lower-case name used in scenario keys (`run_timeout`) and `TIMING`
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            Self::Init => "init",
            Self::Setup => "setup",
            Self::Compile => "compile",
            Self::Test => "test",
            Self::Run => "run",
            Self::Batch => "batch",
        }
    }
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Outcome kind, shared by process execution and fitness extraction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusKind {
    Success,
    /// Executable missing or not runnable
    CliError,
    /// Non-zero exit code
    CodeError,
    /// Output not understood by a fitness extractor
    ParseError,
    Timeout,
    Lengthout,
    /// Nothing has run yet
    UnknownError,
}

impl StatusKind {
    /// Tag without stage prefix
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::CliError => "CLI_ERROR",
            Self::CodeError => "CODE_ERROR",
            Self::ParseError => "PARSE_ERROR",
            Self::Timeout => "TIMEOUT",
            Self::Lengthout => "LENGTHOUT",
            Self::UnknownError => "UNKNOWN_ERROR",
        }
    }

    const ALL: [Self; 7] = [
        Self::Success,
        Self::CliError,
        Self::CodeError,
        Self::ParseError,
        Self::Timeout,
        Self::Lengthout,
        Self::UnknownError,
    ];
}

impl Display for StatusKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Stage-tagged status of one evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RunStatus {
    pub stage: Option<Stage>,
    pub kind: StatusKind,
}

impl RunStatus {
    pub const SUCCESS: Self = Self {
        stage: None,
        kind: StatusKind::Success,
    };

    pub const UNKNOWN: Self = Self {
        stage: None,
        kind: StatusKind::UnknownError,
    };

    /// Status for `kind` observed during `stage`; success carries no stage
    #[must_use]
    pub fn at(stage: Stage, kind: StatusKind) -> Self {
        if kind == StatusKind::Success {
            return Self::SUCCESS;
        }
        Self {
            stage: Some(stage),
            kind,
        }
    }

    #[must_use]
    pub fn is_success(self) -> bool {
        self.kind == StatusKind::Success
    }

    /// Lower-case stage name, for "failed to <step> target software"
    #[must_use]
    pub fn step(self) -> &'static str {
        self.stage.map_or("evaluate", Stage::key)
    }

    /// Human-readable likely cause and remedy
    #[must_use]
    pub fn diagnostic(self) -> Vec<String> {
        let step = self.stage.map(Stage::key);
        let mut lines = Vec::new();
        match (self.stage, self.kind) {
            (_, StatusKind::Success) => lines.push("No error detected.".to_string()),
            (Some(Stage::Batch), StatusKind::Timeout) => {
                lines.push("The cumulative runtime of the batch exceeded its budget.".to_string());
                lines.push("Consider increasing \"[software] batch_timeout\".".to_string());
            }
            (Some(Stage::Batch), StatusKind::Lengthout) => {
                lines.push("The cumulative output of the batch exceeded its budget.".to_string());
                lines.push("Consider increasing \"[software] batch_lengthout\".".to_string());
            }
            (_, StatusKind::CliError) => {
                let key = step.unwrap_or("run");
                lines.push(format!("Command in \"[software] {key}_cmd\" could not be executed."));
                lines.push("Check for typos in the command name.".to_string());
                lines.push("Check that the executable is found in PATH.".to_string());
                lines.push("Check that the command is relative to the target directory.".to_string());
            }
            (_, StatusKind::CodeError) => {
                let key = step.unwrap_or("run");
                lines.push(format!("Command in \"[software] {key}_cmd\" exited with a non-zero return code."));
                lines.push("Try running the command manually in the work directory.".to_string());
            }
            (_, StatusKind::ParseError) => {
                lines.push("The fitness could not be extracted from the command output.".to_string());
                lines.push("Check that STDOUT and STDERR match the configured \"[software] fitness\".".to_string());
            }
            (_, StatusKind::Timeout) => {
                let key = step.unwrap_or("default");
                lines.push("The command exceeded its time limit.".to_string());
                lines.push(format!("Consider increasing \"[software] {key}_timeout\"."));
            }
            (_, StatusKind::Lengthout) => {
                let key = step.unwrap_or("default");
                lines.push("The command exceeded its output limit.".to_string());
                lines.push(format!("Consider increasing \"[software] {key}_lengthout\"."));
            }
            (_, StatusKind::UnknownError) => {
                lines.push("The evaluation did not reach any stage.".to_string());
                lines.push("Check that at least one \"[software] *_cmd\" is set.".to_string());
            }
        }
        lines
    }
}

impl Display for RunStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.stage {
            Some(stage) => write!(f, "{}_{}", stage.tag(), self.kind.tag()),
            None => f.write_str(self.kind.tag()),
        }
    }
}

impl FromStr for RunStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let stages = Stage::COMMANDS.iter().chain(std::iter::once(&Stage::Batch));
        let (stage, rest) = stages
            .filter_map(|st| s.strip_prefix(st.tag()).and_then(|r| r.strip_prefix('_')).map(|r| (Some(*st), r)))
            .next()
            .unwrap_or((None, s));
        StatusKind::ALL
            .iter()
            .find(|k| k.tag() == rest)
            .map(|kind| Self { stage, kind: *kind })
            .ok_or_else(|| format!("unknown status \"{s}\""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_carry_stage_prefix() {
        assert_eq!(RunStatus::at(Stage::Setup, StatusKind::Timeout).to_string(), "SETUP_TIMEOUT");
        assert_eq!(RunStatus::at(Stage::Run, StatusKind::CodeError).to_string(), "RUN_CODE_ERROR");
        assert_eq!(RunStatus::at(Stage::Batch, StatusKind::Lengthout).to_string(), "BATCH_LENGTHOUT");
        assert_eq!(RunStatus::at(Stage::Test, StatusKind::Success).to_string(), "SUCCESS");
    }

    #[test]
    fn parse_tag() {
        let status: RunStatus = "COMPILE_CLI_ERROR".parse().unwrap();
        assert_eq!(status, RunStatus::at(Stage::Compile, StatusKind::CliError));
        assert_eq!("SUCCESS".parse::<RunStatus>().unwrap(), RunStatus::SUCCESS);
        assert!("RUN_EXPLODED".parse::<RunStatus>().is_err());
    }

    #[test]
    fn diagnostic_names_the_key() {
        let lines = RunStatus::at(Stage::Compile, StatusKind::Timeout).diagnostic();
        assert!(lines.iter().any(|l| l.contains("compile_timeout")));
        let lines = RunStatus::at(Stage::Batch, StatusKind::Timeout).diagnostic();
        assert!(lines.iter().any(|l| l.contains("batch_timeout")));
        assert_eq!(RunStatus::at(Stage::Run, StatusKind::CliError).step(), "run");
    }
}
