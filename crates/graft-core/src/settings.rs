//! Immutable process-wide settings
//!
//! Built once from the `[graft]` scenario table and passed by reference to
//! every component that needs a tunable.

use crate::diff::DiffMethod;
use crate::error::ScenarioError;
use crate::scenario::GraftSection;
use std::path::PathBuf;
use std::time::Duration;

/// Ambient tunables
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Seed for the run's random generator
    pub seed: u64,
    /// Directory for `.log`, `.patch` and `.diff` artifacts
    pub log_dir: PathBuf,
    /// Directory holding per-run work copies
    pub work_dir: PathBuf,
    /// Keep an untouched copy of the target next to the work copy
    pub local_original_copy: bool,
    /// Directory name of that copy
    pub local_original_name: String,
    /// Attempts made by `create_edit` before giving up
    pub edit_retries: usize,
    /// Stage timeout when the stage sets none
    pub default_timeout: Duration,
    /// Stage output cap when the stage sets none (`None` = unlimited)
    pub default_lengthout: Option<u64>,
    /// Diff flavour for variant fingerprints and `.diff` files
    pub diff_method: DiffMethod,
    /// Skip re-reading files whose content was written by us
    pub trust_local_filesystem: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            seed: 0,
            log_dir: PathBuf::from("_graft_logs"),
            work_dir: PathBuf::from("_graft_work"),
            local_original_copy: false,
            local_original_name: "__original__".to_string(),
            edit_retries: 10,
            default_timeout: Duration::from_secs(30),
            default_lengthout: Some(10_000),
            diff_method: DiffMethod::Unified,
            trust_local_filesystem: true,
        }
    }
}

impl Settings {
    /// Validate the raw `[graft]` table
    ///
    /// An empty seed is replaced by a freshly drawn one.
    ///
    /// # Errors
    /// Returns [`ScenarioError::Invalid`] on out-of-range values.
    pub fn from_section(section: &GraftSection) -> Result<Self, ScenarioError> {
        let diff_method = section
            .diff_method
            .parse()
            .map_err(|e: String| ScenarioError::invalid("graft", "diff_method", e))?;
        if section.edit_retries == 0 {
            return Err(ScenarioError::invalid(
                "graft",
                "edit_retries",
                "should be positive",
            ));
        }
        Ok(Self {
            seed: section.seed.unwrap_or_else(rand::random),
            log_dir: section.log_dir.clone(),
            work_dir: section.work_dir.clone(),
            local_original_copy: section.local_original_copy,
            local_original_name: section.local_original_name.clone(),
            edit_retries: section.edit_retries,
            default_timeout: parse_timeout(section.default_timeout)
                .ok_or_else(|| ScenarioError::invalid("graft", "default_timeout", "should be positive"))?,
            default_lengthout: parse_lengthout(section.default_lengthout),
            diff_method,
            trust_local_filesystem: section.trust_local_filesystem,
        })
    }
}

/// Seconds to a duration; `None` for non-positive or non-finite input
#[must_use]
pub fn parse_timeout(seconds: f64) -> Option<Duration> {
    (seconds.is_finite() && seconds > 0.0).then(|| Duration::from_secs_f64(seconds))
}

/// Output cap in bytes; non-positive means unlimited
#[must_use]
pub fn parse_lengthout(bytes: i64) -> Option<u64> {
    u64::try_from(bytes).ok().filter(|b| *b > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        let settings = Settings::from_section(&GraftSection {
            seed: Some(5),
            ..GraftSection::default()
        })
        .unwrap();
        assert_eq!(settings.seed, 5);
        assert_eq!(settings.default_timeout, Duration::from_secs(30));
        assert_eq!(settings.default_lengthout, Some(10_000));
        assert_eq!(settings.diff_method, DiffMethod::Unified);
    }

    #[test]
    fn bad_diff_method_rejected() {
        let err = Settings::from_section(&GraftSection {
            diff_method: "patience".to_string(),
            ..GraftSection::default()
        })
        .unwrap_err();
        assert!(err.to_string().contains("diff_method"));
    }

    #[test]
    fn lengthout_zero_is_unlimited() {
        assert_eq!(parse_lengthout(0), None);
        assert_eq!(parse_lengthout(-1), None);
        assert_eq!(parse_lengthout(12), Some(12));
        assert!(parse_timeout(0.0).is_none());
    }
}
