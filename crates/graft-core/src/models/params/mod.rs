//! Parameter-file model
//!
//! Tunes the command-line parameters of the target instead of its source.
//! Points are keyed by parameter name under the single kind `param`; the
//! current assignment is rendered both as a `key := value` dump (for
//! diffs) and as a command-line fragment substituted for `{PARAMS}`.

pub mod configfile;
pub mod realm;

pub use configfile::{Conditional, ParamSpace};
pub use realm::Realm;

use super::MutationModel;
use crate::error::{ModelError, ParseError};
use crate::literal::Value;
use crate::location::{Catalog, Location};
use crate::scenario::ParamsSection;
use indexmap::IndexMap;
use rand::Rng;
use std::path::Path;

const PARAM: &str = "param";

/// Parameter model of one parameter-space file
#[derive(Debug, Clone, PartialEq)]
pub struct ParamsModel {
    filename: String,
    config: ParamsSection,
    current: IndexMap<String, Value>,
    space: ParamSpace,
    catalog: Catalog<String>,
}

impl ParamsModel {
    /// Parse a parameter-space file
    ///
    /// # Errors
    /// Returns [`ParseError::Syntax`] on malformed declarations.
    pub fn parse(filename: &str, text: &str, defaults: &ParamsSection) -> Result<Self, ParseError> {
        let mut config = defaults.clone();
        configfile::check_timing(&config.timing).map_err(|e| ParseError::syntax_error(filename, e))?;
        let space = configfile::parse(filename, text, &mut config)?;
        let mut catalog = Catalog::new();
        catalog.set_kind(PARAM, space.defaults.keys().cloned().collect());
        Ok(Self {
            filename: filename.to_string(),
            config,
            current: space.defaults.clone(),
            space,
            catalog,
        })
    }

    /// Read and parse `root/filename`
    ///
    /// # Errors
    /// Returns [`ParseError`] if the file is unreadable or malformed.
    pub fn load(root: &Path, filename: &str, defaults: &ParamsSection) -> Result<Self, ParseError> {
        let path = root.join(filename);
        let text = std::fs::read_to_string(&path).map_err(|e| ParseError::io_error(&path, e))?;
        Self::parse(filename, &text, defaults)
    }

    /// Stages that receive the rendered parameters
    #[must_use]
    pub fn timing(&self) -> &[String] {
        &self.config.timing
    }

    /// Current value of a parameter
    #[must_use]
    pub fn value(&self, key: &str) -> Option<&Value> {
        self.current.get(key)
    }

    /// Random value from a parameter's realm
    pub fn random_value<R: Rng + ?Sized>(&self, key: &str, rng: &mut R) -> Option<Value> {
        self.space.realms.get(key).map(|realm| realm.random_value(rng))
    }

    /// True when a conditional currently deactivates `key`
    #[must_use]
    pub fn would_be_ignored(&self, key: &str) -> bool {
        self.space.conditionals.iter().any(|c| {
            c.param == key
                && self
                    .current
                    .get(&c.parent)
                    .is_some_and(|v| !c.values.contains(&v.plain()))
        })
    }

    /// False when setting `key` to `value` completes a forbidden combination
    #[must_use]
    pub fn would_be_valid(&self, key: &str, value: &Value) -> bool {
        !self.space.forbidden.iter().any(|combination| {
            combination.iter().all(|(k, v)| {
                let actual = if k == key {
                    Some(value.plain())
                } else {
                    self.current.get(k).map(Value::plain)
                };
                actual.as_deref() == Some(v.as_str())
            })
        })
    }

    /// Set a parameter, honouring forbidden combinations and conditionals
    ///
    /// # Errors
    /// Returns [`ModelError`] on foreign or unknown locations.
    pub fn do_set(&mut self, target: &Location, value: &Value) -> Result<bool, ModelError> {
        if target.file != self.filename {
            return Err(ModelError::WrongFile {
                location: target.clone(),
                file: self.filename.clone(),
            });
        }
        if target.kind != PARAM {
            return Err(ModelError::WrongKind {
                location: target.clone(),
                operation: "do_set",
            });
        }
        let Some(key) = target.index.key() else {
            return Err(ModelError::UnknownLocation(target.clone()));
        };
        if !self.current.contains_key(key) {
            return Err(ModelError::UnknownLocation(target.clone()));
        }
        if !self.would_be_valid(key, value) || self.would_be_ignored(key) {
            return Ok(false);
        }
        match self.current.get_mut(key) {
            Some(current) if current != value => {
                *current = value.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    /// Render active parameters as a command-line fragment
    #[must_use]
    pub fn resolve_cli(&self) -> String {
        self.current
            .iter()
            .filter(|(k, _)| !self.would_be_ignored(k))
            .filter_map(|(k, v)| self.resolve_cli_param(k, v))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn resolve_cli_param(&self, param: &str, value: &Value) -> Option<String> {
        let config = &self.config;
        if !config.silent_prefix.is_empty() && param.starts_with(&config.silent_prefix) {
            return None;
        }
        let name = if config.silent_suffix.is_empty() {
            param
        } else {
            param.split(config.silent_suffix.as_str()).next().unwrap_or(param)
        };
        let prefix = &config.cli_prefix;
        let plain = value.plain();
        match (plain.as_str(), config.cli_boolean.as_str()) {
            ("True", "hide") => return Some(format!("{prefix}{name}")),
            ("True", "prefix") => {
                return Some(format!("{prefix}{}{name}", config.cli_boolean_prefix_true));
            }
            ("False", "hide") => return None,
            ("False", "prefix") => {
                return Some(format!("{prefix}{}{name}", config.cli_boolean_prefix_false));
            }
            _ => {}
        }
        if matches!(value, Value::None) && config.cli_none == "hide" {
            return None;
        }
        Some(format!("{prefix}{name}{}{plain}", config.cli_glue))
    }
}

impl MutationModel for ParamsModel {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn dump(&self) -> String {
        self.current
            .iter()
            .filter(|(k, _)| !self.would_be_ignored(k))
            .map(|(k, v)| format!("{k} := {v}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn kinds(&self) -> Vec<String> {
        vec![PARAM.to_string()]
    }

    fn locations(&self, kind: &str) -> Vec<Location> {
        self.catalog
            .points(kind)
            .unwrap_or_default()
            .iter()
            .map(|key| Location::keyed(&self.filename, kind, key))
            .collect()
    }

    fn random_target<R: Rng + ?Sized>(&self, kind: Option<&str>, rng: &mut R) -> Option<Location> {
        let (kind, index) = self.catalog.random_index(kind, rng)?;
        let key = self.catalog.get(&kind, index)?;
        Some(Location::keyed(&self.filename, kind, key))
    }

    fn show_location(&self, location: &Location) -> String {
        let Some(key) = location.index.key() else {
            return "(unsupported location)".to_string();
        };
        match (self.space.realms.get(key), self.current.get(key)) {
            (Some(realm), Some(value)) => format!("{key}: {realm} current={value}"),
            _ => "(unknown location)".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const SPACE: &str = "\
mode {fast,safe}[safe]
verbose {True,False}[False]
ratio (0.0,1.0)[0.5]
depth [1,10][3]
@seed [0,100][7]
{mode==fast,depth==10}
ratio | mode in {safe}
";

    fn model() -> ParamsModel {
        ParamsModel::parse("p.params", SPACE, &ParamsSection::default()).unwrap()
    }

    fn at(key: &str) -> Location {
        Location::keyed("p.params", PARAM, key)
    }

    #[test]
    fn dump_lists_active_params() {
        let m = model();
        assert_eq!(
            m.dump(),
            "mode := 'safe'\nverbose := 'False'\nratio := 0.5\ndepth := 3\n@seed := 7"
        );
    }

    #[test]
    fn set_respects_conditionals() {
        let mut m = model();
        assert!(m.do_set(&at("mode"), &Value::from("fast")).unwrap());
        // ratio inactive while mode is fast
        assert!(!m.do_set(&at("ratio"), &Value::Float(0.25)).unwrap());
        assert!(!m.dump().contains("ratio"));
        assert!(!m.resolve_cli().contains("ratio"));
    }

    #[test]
    fn set_respects_forbidden() {
        let mut m = model();
        m.do_set(&at("mode"), &Value::from("fast")).unwrap();
        assert!(!m.do_set(&at("depth"), &Value::Int(10)).unwrap());
        assert!(m.do_set(&at("depth"), &Value::Int(9)).unwrap());
        assert!(!m.do_set(&at("depth"), &Value::Int(9)).unwrap());
    }

    #[test]
    fn cli_rendering() {
        let m = model();
        assert_eq!(m.resolve_cli(), "--mode=safe --verbose=False --ratio=0.5 --depth=3");
        let prefix = ParamsSection {
            cli_boolean: "prefix".to_string(),
            ..ParamsSection::default()
        };
        let m = ParamsModel::parse("p.params", SPACE, &prefix).unwrap();
        assert!(m.resolve_cli().contains("--no-verbose"));
        let hide = ParamsSection {
            cli_boolean: "hide".to_string(),
            ..ParamsSection::default()
        };
        let m = ParamsModel::parse("p.params", SPACE, &hide).unwrap();
        assert!(!m.resolve_cli().contains("verbose"));
    }

    #[test]
    fn random_targets_are_keyed() {
        let m = model();
        let mut rng = StdRng::seed_from_u64(4);
        let loc = m.random_target(Some(PARAM), &mut rng).unwrap();
        let key = loc.index.key().unwrap();
        let value = m.random_value(key, &mut rng).unwrap();
        assert!(m.space.realms[key].contains(&value));
    }

    #[test]
    fn wrong_location_is_error() {
        let mut m = model();
        assert!(m.do_set(&Location::keyed("p.params", PARAM, "nope"), &Value::Int(1)).is_err());
        assert!(m.do_set(&Location::new("p.params", PARAM, 0), &Value::Int(1)).is_err());
    }
}
