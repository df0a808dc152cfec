//! Error types for the evaluation pipeline
//!
//! Stage failures (timeouts, non-zero exits...) are reported through
//! [`RunStatus`](crate::status::RunStatus) and never appear here. These
//! errors cover the failures that make evaluation impossible: staging the
//! work directory, reserving a run label, and a broken `init` stage.

use graft_core::{ModelError, ParseError, ScenarioError};
use std::path::PathBuf;

/// Filesystem failures while staging work directories
#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    /// IO error on a staged path
    #[error("io error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// No free run label could be reserved
    #[error("unable to reserve a run label in {0}")]
    NoRunLabel(PathBuf),
}

impl ExecError {
    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Combined evaluation error
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error("staging error: {0}")]
    Exec(#[from] ExecError),

    /// `init_cmd` failed; nothing can be evaluated
    #[error("failed to init target software ({status})")]
    Init { status: String },

    /// The first setup must see the unmodified program
    #[error("setup requested on a modified variant")]
    SetupOnModified,
}

/// Result type alias for evaluation operations
pub type EvalResult<T> = Result<T, EvalError>;
