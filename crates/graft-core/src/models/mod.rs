//! Mutation models
//!
//! A model owns the parsed representation of one target file plus the
//! catalog of locations edits can address. Three families share the
//! [`MutationModel`] contract:
//!
//! | family  | kinds                         | index     |
//! |---------|-------------------------------|-----------|
//! | line    | `line`, `_inter_line`         | position  |
//! | xml     | one per tag, `_inter_<tag>`   | position  |
//! | params  | `param`                       | key       |
//!
//! [`Model`] closes the set into one enum; [`ModelKind`] is its
//! name-keyed registry entry, selected per file by [`ModelRule`]s.

pub mod line;
pub mod params;
pub mod xml;

pub use line::LineModel;
pub use params::ParamsModel;
pub use xml::{XmlFlavour, XmlModel};

use crate::error::{ModelError, ParseError, ScenarioError};
use crate::location::Location;
use crate::scenario::{ParamsSection, SrcmlSection};
use rand::Rng;
use std::fmt::{self, Display, Formatter};
use std::path::Path;
use std::str::FromStr;

/// Contract shared by every model family
pub trait MutationModel {
    /// Target file name, relative to the software root
    fn filename(&self) -> &str;

    /// Name used in diffs and when writing the dump back
    fn renamed_filename(&self) -> &str {
        self.filename()
    }

    /// Serialize the current representation
    fn dump(&self) -> String;

    /// Location kinds in catalog order
    fn kinds(&self) -> Vec<String>;

    /// Every location of one kind
    fn locations(&self, kind: &str) -> Vec<Location>;

    /// Random location of `kind` (or of a uniformly chosen kind)
    fn random_target<R: Rng + ?Sized>(&self, kind: Option<&str>, rng: &mut R) -> Option<Location>;

    /// Human-readable rendering of one location
    fn show_location(&self, location: &Location) -> String;
}

/// Registered model classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    Line,
    Xml,
    Srcml,
    ConfigFileParams,
}

impl ModelKind {
    /// All registered kinds
    pub const ALL: [Self; 4] = [Self::Line, Self::Xml, Self::Srcml, Self::ConfigFileParams];

    /// Canonical class name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Line => "LineModel",
            Self::Xml => "XmlModel",
            Self::Srcml => "SrcmlModel",
            Self::ConfigFileParams => "ConfigFileParamsModel",
        }
    }
}

impl Display for ModelKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ModelKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| ParseError::UnknownModel(s.to_string()))
    }
}

/// `pattern : ModelName` rule choosing the model of a target file
///
/// Patterns are an exact file name, `*`, or `*suffix`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRule {
    pub pattern: String,
    pub kind: ModelKind,
}

impl ModelRule {
    /// Whether the rule applies to `filename`
    #[must_use]
    pub fn matches(&self, filename: &str) -> bool {
        self.pattern == "*"
            || self.pattern == filename
            || self
                .pattern
                .strip_prefix('*')
                .is_some_and(|suffix| filename.ends_with(suffix))
    }

    /// Parse every rule of `[software] model_rules`
    ///
    /// # Errors
    /// Returns [`ScenarioError::Invalid`] on a malformed rule or unknown model.
    pub fn parse_all(rules: &[String]) -> Result<Vec<Self>, ScenarioError> {
        rules.iter().map(|r| r.parse()).collect()
    }
}

impl FromStr for ModelRule {
    type Err = ScenarioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (pattern, name) = s
            .rsplit_once(':')
            .ok_or_else(|| ScenarioError::invalid("software", "model_rules", format!("badly formatted rule \"{s}\"")))?;
        let kind = name
            .trim()
            .parse()
            .map_err(|e: ParseError| ScenarioError::invalid("software", "model_rules", e.to_string()))?;
        Ok(Self {
            pattern: pattern.trim().to_string(),
            kind,
        })
    }
}

/// Per-family configuration taken from the scenario
#[derive(Debug, Clone, Default)]
pub struct ModelOptions {
    pub params: ParamsSection,
    pub srcml: SrcmlSection,
}

/// A loaded model of any family
#[derive(Debug, Clone, PartialEq)]
pub enum Model {
    Line(LineModel),
    Xml(XmlModel),
    Params(ParamsModel),
}

macro_rules! dispatch {
    ($self:expr, $m:ident => $body:expr) => {
        match $self {
            Model::Line($m) => $body,
            Model::Xml($m) => $body,
            Model::Params($m) => $body,
        }
    };
}

impl Model {
    /// Parse `root/filename` with the model of the first matching rule
    ///
    /// # Errors
    /// Returns [`ParseError`] if no rule matches or the file is malformed.
    pub fn load(root: &Path, filename: &str, rules: &[ModelRule], options: &ModelOptions) -> Result<Self, ParseError> {
        let rule = rules
            .iter()
            .find(|r| r.matches(filename))
            .ok_or_else(|| ParseError::UnknownModel(format!("no model rule matches {filename}")))?;
        Self::load_as(rule.kind, root, filename, options)
    }

    /// Parse `root/filename` as a given model kind
    ///
    /// # Errors
    /// Returns [`ParseError`] if the file is unreadable or malformed.
    pub fn load_as(kind: ModelKind, root: &Path, filename: &str, options: &ModelOptions) -> Result<Self, ParseError> {
        Ok(match kind {
            ModelKind::Line => Self::Line(LineModel::load(root, filename)?),
            ModelKind::Xml => Self::Xml(XmlModel::load(root, filename, None)?),
            ModelKind::Srcml => Self::Xml(XmlModel::load(root, filename, Some(&options.srcml))?),
            ModelKind::ConfigFileParams => Self::Params(ParamsModel::load(root, filename, &options.params)?),
        })
    }

    /// Registry entry of this model
    #[must_use]
    pub fn kind(&self) -> ModelKind {
        match self {
            Self::Line(_) => ModelKind::Line,
            Self::Xml(m) if m.flavour() == XmlFlavour::Srcml => ModelKind::Srcml,
            Self::Xml(_) => ModelKind::Xml,
            Self::Params(_) => ModelKind::ConfigFileParams,
        }
    }

    /// Family name for error messages
    #[must_use]
    pub fn family(&self) -> &'static str {
        match self {
            Self::Line(_) => "line model",
            Self::Xml(_) => "xml model",
            Self::Params(_) => "params model",
        }
    }

    /// Borrow as a line model
    #[must_use]
    pub fn as_line(&self) -> Option<&LineModel> {
        match self {
            Self::Line(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as a line model, mutably
    pub fn as_line_mut(&mut self) -> Option<&mut LineModel> {
        match self {
            Self::Line(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as an xml model
    #[must_use]
    pub fn as_xml(&self) -> Option<&XmlModel> {
        match self {
            Self::Xml(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as an xml model, mutably
    pub fn as_xml_mut(&mut self) -> Option<&mut XmlModel> {
        match self {
            Self::Xml(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as a params model
    #[must_use]
    pub fn as_params(&self) -> Option<&ParamsModel> {
        match self {
            Self::Params(m) => Some(m),
            _ => None,
        }
    }

    /// Borrow as a params model, mutably
    pub fn as_params_mut(&mut self) -> Option<&mut ParamsModel> {
        match self {
            Self::Params(m) => Some(m),
            _ => None,
        }
    }

    /// Error for an edit that does not fit this model
    #[must_use]
    pub fn incompatible(&self, edit: &str) -> ModelError {
        ModelError::Incompatible {
            edit: edit.to_string(),
            model: self.family(),
        }
    }
}

impl MutationModel for Model {
    fn filename(&self) -> &str {
        dispatch!(self, m => m.filename())
    }

    fn renamed_filename(&self) -> &str {
        dispatch!(self, m => m.renamed_filename())
    }

    fn dump(&self) -> String {
        dispatch!(self, m => m.dump())
    }

    fn kinds(&self) -> Vec<String> {
        dispatch!(self, m => m.kinds())
    }

    fn locations(&self, kind: &str) -> Vec<Location> {
        dispatch!(self, m => m.locations(kind))
    }

    fn random_target<R: Rng + ?Sized>(&self, kind: Option<&str>, rng: &mut R) -> Option<Location> {
        dispatch!(self, m => m.random_target(kind, rng))
    }

    fn show_location(&self, location: &Location) -> String {
        dispatch!(self, m => m.show_location(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_matching() {
        let rules = ModelRule::parse_all(&[
            "*.params : ConfigFileParamsModel".to_string(),
            "*.xml : SrcmlModel".to_string(),
            "main.c : LineModel".to_string(),
            "* : XmlModel".to_string(),
        ])
        .unwrap();
        let pick = |f: &str| rules.iter().find(|r| r.matches(f)).map(|r| r.kind);
        assert_eq!(pick("a.params"), Some(ModelKind::ConfigFileParams));
        assert_eq!(pick("src/a.c.xml"), Some(ModelKind::Srcml));
        assert_eq!(pick("main.c"), Some(ModelKind::Line));
        assert_eq!(pick("other"), Some(ModelKind::Xml));
    }

    #[test]
    fn bad_rules_rejected() {
        assert!("*.c LineModel".parse::<ModelRule>().is_err());
        assert!("*.c : TreeModel".parse::<ModelRule>().is_err());
    }

    #[test]
    fn load_picks_model_by_rule() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "x\ny\n").unwrap();
        std::fs::write(dir.path().join("b.params"), "n [1,3][2]\n").unwrap();
        let rules = ModelRule::parse_all(&[
            "*.params : ConfigFileParamsModel".to_string(),
            "* : LineModel".to_string(),
        ])
        .unwrap();
        let options = ModelOptions::default();
        let a = Model::load(dir.path(), "a.txt", &rules, &options).unwrap();
        let b = Model::load(dir.path(), "b.params", &rules, &options).unwrap();
        assert_eq!(a.kind(), ModelKind::Line);
        assert_eq!(b.kind(), ModelKind::ConfigFileParams);
        assert_eq!(b.dump(), "n := 2");
        assert!(Model::load(dir.path(), "missing.txt", &rules, &options).is_err());
    }
}
