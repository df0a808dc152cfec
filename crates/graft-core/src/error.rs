//! Error types for the mutation core
//!
//! Provides error handling for:
//! - Scenario loading and validation
//! - Parsing (target files, patch strings, literal payloads)
//! - Applying edits to mutation models
//! - Creating random edits

use crate::location::Location;
use std::path::PathBuf;

/// Errors in the scenario / configuration surface
///
/// Always fatal, raised before any evaluation begins.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// Required key is absent or empty
    #[error("invalid scenario: empty \"[{section}] {key}\"")]
    Missing { section: String, key: String },

    /// Key present but its value is malformed
    #[error("invalid scenario: \"[{section}] {key}\" {message}")]
    Invalid {
        section: String,
        key: String,
        message: String,
    },

    /// Scenario file could not be read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Scenario file is not valid TOML or has unknown keys
    #[error("malformed scenario: {0}")]
    Toml(#[from] toml::de::Error),

    /// Anything else detected while validating the scenario
    #[error("invalid scenario: {0}")]
    Other(String),
}

impl ScenarioError {
    /// Create a missing-key error
    pub fn missing(section: impl Into<String>, key: impl Into<String>) -> Self {
        Self::Missing {
            section: section.into(),
            key: key.into(),
        }
    }

    /// Create an invalid-value error
    pub fn invalid(
        section: impl Into<String>,
        key: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Invalid {
            section: section.into(),
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors while parsing target files, patches or literals
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Syntax error in a target file
    #[error("syntax error in {path}: {message}")]
    Syntax { path: PathBuf, message: String },

    /// IO error during file read
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed literal (location tuple, string, number...)
    #[error("bad literal at offset {offset} in \"{input}\": {message}")]
    Literal {
        input: String,
        offset: usize,
        message: String,
    },

    /// Malformed edit or patch text
    #[error("bad edit \"{0}\"")]
    BadEdit(String),

    /// Edit class name not present in the registry
    #[error("unknown edit type \"{0}\"")]
    UnknownEdit(String),

    /// Model class name not present in the registry
    #[error("unknown model \"{0}\"")]
    UnknownModel(String),
}

impl ParseError {
    /// Create syntax error for path
    pub fn syntax_error(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Syntax {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create IO error for path
    pub fn io_error(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors while applying an edit to a model
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Location does not belong to this model's file
    #[error("location {location} does not target file {file}")]
    WrongFile { location: Location, file: String },

    /// Location kind is not accepted by this operation
    #[error("location {location} has kind unsupported by {operation}")]
    WrongKind {
        location: Location,
        operation: &'static str,
    },

    /// Location index is out of the catalog bounds
    #[error("unknown location {0}")]
    UnknownLocation(Location),

    /// Edit targets a model of another family
    #[error("edit {edit} cannot be applied to a {model}")]
    Incompatible { edit: String, model: &'static str },

    /// No model loaded for the file
    #[error("no model for target file {0}")]
    NoModel(String),

    /// Failed to write a dumped model back to disk
    #[error("io error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Retry budget exhausted while creating a random edit
#[derive(Debug, thiserror::Error)]
#[error("unable to create an edit of class {edit} after {retries} attempt(s)")]
pub struct EditCreationError {
    /// Canonical class name of the edit
    pub edit: String,
    /// Number of attempts made
    pub retries: usize,
}

/// Combined core error
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("model error: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    EditCreation(#[from] EditCreationError),
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_error_display() {
        let err = ScenarioError::missing("software", "target_files");
        assert_eq!(
            err.to_string(),
            "invalid scenario: empty \"[software] target_files\""
        );
    }

    #[test]
    fn edit_creation_error_display() {
        let err = EditCreationError {
            edit: "LineDeletion".to_string(),
            retries: 10,
        };
        assert!(err.to_string().contains("LineDeletion"));
    }

    #[test]
    fn error_conversions() {
        let err: CoreError = ParseError::UnknownEdit("Nope".to_string()).into();
        assert!(matches!(err, CoreError::Parse(_)));
    }
}
