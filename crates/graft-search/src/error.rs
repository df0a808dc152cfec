//! Error types for search algorithms
//!
//! Failed evaluations are ordinary [`RunResult`](graft_eval::RunResult)
//! values; these errors abort a run.

use graft_core::{EditCreationError, ModelError, ParseError, ScenarioError};
use graft_eval::EvalError;

/// Search error
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    EditCreation(#[from] EditCreationError),

    #[error("evaluation error: {0}")]
    Eval(#[from] EvalError),

    /// `possible_edits` is empty
    #[error("possible_edits list is empty")]
    NoPossibleEdits,

    /// A validation pass was started without a patch to validate
    #[error("{0} requires a patch to analyse")]
    MissingDebugPatch(&'static str),

    /// The unmodified program failed after a batch change
    #[error("initial solution has failed ({0})")]
    InitialFailed(String),

    #[error("unknown algorithm \"{0}\"")]
    UnknownAlgorithm(String),
}

/// Result type alias for search operations
pub type SearchResult<T> = Result<T, SearchError>;
