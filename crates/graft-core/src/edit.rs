//! Edits: single self-contained program modifications
//!
//! An [`Edit`] is a target [`Location`] plus a [`Payload`], tagged with an
//! [`EditKind`]. Kinds are a closed set of [`Operation`]s, each reachable
//! through a canonical name: plain names (`LineDeletion`,
//! `SrcmlStmtInsertion`, `ParamSetting`) come from a static registry,
//! templated names (`XmlNodeInsertion<stmt,block>`) are parsed from their
//! template arguments.
//!
//! The canonical string form is `Name(target, payload...)` and
//! round-trips through [`Edit::from_str`].

use crate::error::{EditCreationError, ModelError, ParseError};
use crate::literal::{self, Value};
use crate::location::{Location, INTER_PREFIX};
use crate::models::{LineModel, Model, MutationModel, XmlModel};
use crate::variant::{Models, Variant};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use tracing::trace;

const LINE: &str = "line";
const INTER_LINE: &str = "_inter_line";
const PARAM: &str = "param";

static TEMPLATE_ARG: Lazy<Regex> = Lazy::new(|| Regex::new(r#""[^"]*"|[^,]+"#).expect("static regex"));

/// What an edit does, with its template arguments
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operation {
    LineReplacement,
    LineInsertion,
    LineDeletion,
    /// Insert the ingredient line at the target gap, then delete the original
    LineMoving,
    NodeReplacement { tag: String },
    NodeInsertion { tag: String, parent: String },
    NodeDeletion { tag: String },
    NodeMoving { tag: String, parent: String },
    TextSetting { tag: String, choices: Vec<String> },
    TextWrapping { tag: String, choices: Vec<(String, String)> },
    ParamSetting,
}

impl Operation {
    fn text_setting(tag: &str, choices: &[&str]) -> Self {
        Self::TextSetting {
            tag: tag.to_string(),
            choices: choices.iter().map(ToString::to_string).collect(),
        }
    }

    /// Templated canonical name, for operations that have one
    fn templated_name(&self) -> Option<String> {
        let quoted = |s: &str| format!("\"{s}\"");
        Some(match self {
            Self::NodeReplacement { tag } => format!("XmlNodeReplacement<{tag}>"),
            Self::NodeInsertion { tag, parent } => format!("XmlNodeInsertion<{tag},{parent}>"),
            Self::NodeDeletion { tag } => format!("XmlNodeDeletion<{tag}>"),
            Self::NodeMoving { tag, parent } => format!("XmlNodeMoving<{tag},{parent}>"),
            Self::TextSetting { tag, choices } => {
                let choices: Vec<String> = choices.iter().map(|c| quoted(c)).collect();
                format!("XmlTextSetting<{tag},{}>", choices.join(","))
            }
            Self::TextWrapping { tag, choices } => {
                let choices: Vec<String> = choices
                    .iter()
                    .map(|(pre, post)| format!("{},{}", quoted(pre), quoted(post)))
                    .collect();
                format!("XmlTextWrapping<{tag},{}>", choices.join(","))
            }
            _ => return None,
        })
    }
}

static REGISTRY: Lazy<IndexMap<&'static str, Operation>> = Lazy::new(|| {
    let node = |tag: &str| tag.to_string();
    IndexMap::from([
        ("LineReplacement", Operation::LineReplacement),
        ("LineInsertion", Operation::LineInsertion),
        ("LineDeletion", Operation::LineDeletion),
        ("LineMoving", Operation::LineMoving),
        ("SrcmlStmtReplacement", Operation::NodeReplacement { tag: node("stmt") }),
        (
            "SrcmlStmtInsertion",
            Operation::NodeInsertion {
                tag: node("stmt"),
                parent: node("block"),
            },
        ),
        ("SrcmlStmtDeletion", Operation::NodeDeletion { tag: node("stmt") }),
        ("SrcmlExprReplacement", Operation::NodeReplacement { tag: node("expr") }),
        ("SrcmlConditionReplacement", Operation::NodeReplacement { tag: node("condition") }),
        (
            "SrcmlComparisonOperatorSetting",
            Operation::text_setting("operator_comp", &["==", "!=", "<", "<=", ">", ">="]),
        ),
        (
            "SrcmlArithmeticOperatorSetting",
            Operation::text_setting("operator_arith", &["+", "-", "*", "/", "%"]),
        ),
        ("SrcmlNumericSetting", Operation::text_setting("number", &["-1", "0", "1"])),
        (
            "SrcmlRelativeNumericSetting",
            Operation::TextWrapping {
                tag: node("number"),
                choices: ["+1)", "-1)", "/2)", "*2)", "*3/2)", "*2/3)"]
                    .iter()
                    .map(|post| ("(".to_string(), (*post).to_string()))
                    .collect(),
            },
        ),
        ("ParamSetting", Operation::ParamSetting),
    ])
});

/// Canonical names of every non-templated edit kind
pub fn registered_names() -> impl Iterator<Item = &'static str> {
    REGISTRY.keys().copied()
}

/// Named edit class
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EditKind {
    name: String,
    op: Operation,
}

impl EditKind {
    /// Build a kind from an operation, naming it by template
    ///
    /// Operations matching a registry entry keep that entry's name.
    #[must_use]
    pub fn from_operation(op: Operation) -> Self {
        let name = REGISTRY
            .iter()
            .find(|(_, registered)| **registered == op)
            .map(|(name, _)| (*name).to_string())
            .or_else(|| op.templated_name())
            .unwrap_or_default();
        Self { name, op }
    }

    /// Canonical class name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Underlying operation
    #[must_use]
    pub fn operation(&self) -> &Operation {
        &self.op
    }

    /// Draw a random edit of this kind against the reference variant
    ///
    /// Returns `None` when no model offers a suitable location.
    pub fn auto_create<R: Rng + ?Sized>(&self, reference: &Variant, rng: &mut R) -> Option<Edit> {
        let payload;
        let target = match &self.op {
            Operation::LineDeletion => {
                payload = Payload::None;
                reference.random_model(|m| m.as_line().is_some(), rng)?.random_target(Some(LINE), rng)?
            }
            Operation::LineReplacement | Operation::LineInsertion | Operation::LineMoving => {
                let kind = if self.op == Operation::LineReplacement { LINE } else { INTER_LINE };
                let target = reference
                    .random_model(|m| m.as_line().is_some(), rng)?
                    .random_target(Some(kind), rng)?;
                let ingredient = reference
                    .random_model(|m| m.as_line().is_some(), rng)?
                    .random_target(Some(LINE), rng)?;
                payload = Payload::Ingredient(ingredient);
                target
            }
            Operation::NodeDeletion { tag } => {
                payload = Payload::None;
                reference.random_model(|m| m.as_xml().is_some(), rng)?.random_target(Some(tag.as_str()), rng)?
            }
            Operation::NodeReplacement { tag } => {
                let model = reference.random_model(|m| m.as_xml().is_some(), rng)?;
                let target = model.random_target(Some(tag.as_str()), rng)?;
                let ingredient = reference
                    .random_model(|m| m.kind() == model.kind(), rng)?
                    .random_target(Some(tag.as_str()), rng)?;
                payload = Payload::Ingredient(ingredient);
                target
            }
            Operation::NodeInsertion { tag, parent } | Operation::NodeMoving { tag, parent } => {
                let model = reference.random_model(|m| m.as_xml().is_some(), rng)?;
                let target = model.random_target(Some(format!("{INTER_PREFIX}{parent}").as_str()), rng)?;
                let ingredient = reference
                    .random_model(|m| m.kind() == model.kind(), rng)?
                    .random_target(Some(tag.as_str()), rng)?;
                payload = Payload::Ingredient(ingredient);
                target
            }
            Operation::TextSetting { tag, choices } => {
                let target = reference
                    .random_model(|m| m.as_xml().is_some(), rng)?
                    .random_target(Some(tag.as_str()), rng)?;
                payload = Payload::Text(choices.choose(rng)?.clone());
                target
            }
            Operation::TextWrapping { tag, choices } => {
                let target = reference
                    .random_model(|m| m.as_xml().is_some(), rng)?
                    .random_target(Some(tag.as_str()), rng)?;
                let (prefix, suffix) = choices.choose(rng)?.clone();
                payload = Payload::Wrap { prefix, suffix };
                target
            }
            Operation::ParamSetting => {
                let model = reference.random_model(|m| m.as_params().is_some(), rng)?;
                let params = model.as_params()?;
                let target = params.random_target(Some(PARAM), rng)?;
                payload = Payload::Value(params.random_value(target.index.key()?, rng)?);
                target
            }
        };
        Some(Edit {
            kind: self.clone(),
            target,
            payload,
        })
    }

    /// [`Self::auto_create`] with a bounded number of attempts
    ///
    /// # Errors
    /// Returns [`EditCreationError`] once `retries` attempts produced nothing.
    pub fn create<R: Rng + ?Sized>(
        &self,
        reference: &Variant,
        retries: usize,
        rng: &mut R,
    ) -> Result<Edit, EditCreationError> {
        for attempt in 0..retries {
            if let Some(edit) = self.auto_create(reference, rng) {
                return Ok(edit);
            }
            trace!(edit = %self, attempt, "no valid location, retrying");
        }
        Err(EditCreationError {
            edit: self.name.clone(),
            retries,
        })
    }

    fn payload_from_args(&self, args: &[Value]) -> Result<Payload, ParseError> {
        let bad = || ParseError::BadEdit(format!("unexpected arguments for {}", self.name));
        match (&self.op, args) {
            (Operation::LineDeletion | Operation::NodeDeletion { .. }, []) => Ok(Payload::None),
            (
                Operation::LineReplacement
                | Operation::LineInsertion
                | Operation::LineMoving
                | Operation::NodeReplacement { .. }
                | Operation::NodeInsertion { .. }
                | Operation::NodeMoving { .. },
                [ingredient],
            ) => Ok(Payload::Ingredient(Location::from_value(ingredient)?)),
            (Operation::TextSetting { .. }, [Value::Str(text)]) => Ok(Payload::Text(text.clone())),
            (Operation::TextWrapping { .. }, [wrap]) => match wrap.as_tuple() {
                Some([Value::Str(prefix), Value::Str(suffix)]) => Ok(Payload::Wrap {
                    prefix: prefix.clone(),
                    suffix: suffix.clone(),
                }),
                _ => Err(bad()),
            },
            (Operation::ParamSetting, [value]) => Ok(Payload::Value(value.clone())),
            _ => Err(bad()),
        }
    }
}

impl Display for EditKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl FromStr for EditKind {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(op) = REGISTRY.get(s) {
            return Ok(Self {
                name: s.to_string(),
                op: op.clone(),
            });
        }
        let unknown = || ParseError::UnknownEdit(s.to_string());
        let (base, template) = s
            .strip_suffix('>')
            .and_then(|rest| rest.split_once('<'))
            .ok_or_else(unknown)?;
        let args = template_args(template);
        let bad = |message: &str| ParseError::BadEdit(format!("{s}: {message}"));
        let op = match (base, args.as_slice()) {
            ("XmlNodeReplacement", [tag]) => Operation::NodeReplacement { tag: tag.clone() },
            ("XmlNodeDeletion", [tag]) => Operation::NodeDeletion { tag: tag.clone() },
            ("XmlNodeInsertion", [tag, parent]) => Operation::NodeInsertion {
                tag: tag.clone(),
                parent: parent.clone(),
            },
            ("XmlNodeMoving", [tag, parent]) => Operation::NodeMoving {
                tag: tag.clone(),
                parent: parent.clone(),
            },
            ("XmlTextSetting", [tag, choices @ ..]) if !choices.is_empty() => Operation::TextSetting {
                tag: tag.clone(),
                choices: choices.to_vec(),
            },
            ("XmlTextWrapping", [tag, choices @ ..]) if !choices.is_empty() => {
                if choices.len() % 2 != 0 {
                    return Err(bad("wrapping choices come in prefix/suffix pairs"));
                }
                Operation::TextWrapping {
                    tag: tag.clone(),
                    choices: choices
                        .chunks(2)
                        .map(|pair| (pair[0].clone(), pair[1].clone()))
                        .collect(),
                }
            }
            (
                "XmlNodeReplacement" | "XmlNodeDeletion" | "XmlNodeInsertion" | "XmlNodeMoving" | "XmlTextSetting"
                | "XmlTextWrapping",
                _,
            ) => return Err(bad("wrong number of template arguments")),
            _ => return Err(unknown()),
        };
        let name = op.templated_name().ok_or_else(unknown)?;
        Ok(Self { name, op })
    }
}

fn template_args(template: &str) -> Vec<String> {
    TEMPLATE_ARG
        .find_iter(template)
        .map(|m| {
            let arg = m.as_str().trim();
            arg.strip_prefix('"')
                .and_then(|a| a.strip_suffix('"'))
                .unwrap_or(arg)
                .to_string()
        })
        .collect()
}

/// Auxiliary data of an edit
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Payload {
    None,
    /// Location read from the reference variant
    Ingredient(Location),
    Text(String),
    Wrap { prefix: String, suffix: String },
    Value(Value),
}

impl Payload {
    fn to_value(&self) -> Option<Value> {
        match self {
            Self::None => None,
            Self::Ingredient(location) => Some(location.to_value()),
            Self::Text(text) => Some(Value::Str(text.clone())),
            Self::Wrap { prefix, suffix } => Some(Value::Tuple(vec![
                Value::Str(prefix.clone()),
                Value::Str(suffix.clone()),
            ])),
            Self::Value(value) => Some(value.clone()),
        }
    }
}

/// One modification: kind, target and payload
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Edit {
    pub kind: EditKind,
    pub target: Location,
    pub payload: Payload,
}

impl Edit {
    /// Edit with a validated payload
    ///
    /// # Errors
    /// Returns [`ParseError::BadEdit`] if the payload does not fit the kind.
    pub fn new(kind: EditKind, target: Location, payload: Payload) -> Result<Self, ParseError> {
        let args: Vec<Value> = payload.to_value().into_iter().collect();
        kind.payload_from_args(&args)?;
        Ok(Self { kind, target, payload })
    }

    /// Ingredient location, for edits that copy from the reference
    #[must_use]
    pub fn ingredient(&self) -> Option<&Location> {
        match &self.payload {
            Payload::Ingredient(location) => Some(location),
            _ => None,
        }
    }

    /// Apply to `working`, reading ingredients from `reference`
    ///
    /// Returns whether the working models changed.
    ///
    /// # Errors
    /// Returns [`ModelError`] when a location names an unknown file or a
    /// model of the wrong family.
    pub fn apply(&self, reference: &Models, working: &mut Models) -> Result<bool, ModelError> {
        let name = self.kind.name();
        let target = &self.target;
        match (&self.kind.op, &self.payload) {
            (Operation::LineDeletion, _) => line_mut(working, target, name)?.do_delete(target),
            (Operation::LineReplacement, Payload::Ingredient(ingredient)) => {
                let source = line_ref(reference, ingredient, name)?;
                line_mut(working, target, name)?.do_replace(source, target, ingredient)
            }
            (Operation::LineInsertion, Payload::Ingredient(ingredient)) => {
                let source = line_ref(reference, ingredient, name)?;
                line_mut(working, target, name)?.do_insert(source, target, ingredient)
            }
            (Operation::LineMoving, Payload::Ingredient(ingredient)) => {
                let source = line_ref(reference, ingredient, name)?;
                Ok(line_mut(working, target, name)?.do_insert(source, target, ingredient)?
                    && line_mut(working, ingredient, name)?.do_delete(ingredient)?)
            }
            (Operation::NodeDeletion { .. }, _) => xml_mut(working, target, name)?.do_delete(target),
            (Operation::NodeReplacement { .. }, Payload::Ingredient(ingredient)) => {
                let source = xml_ref(reference, ingredient, name)?;
                xml_mut(working, target, name)?.do_replace(source, target, ingredient)
            }
            (Operation::NodeInsertion { .. }, Payload::Ingredient(ingredient)) => {
                let source = xml_ref(reference, ingredient, name)?;
                xml_mut(working, target, name)?.do_insert(source, target, ingredient)
            }
            (Operation::NodeMoving { .. }, Payload::Ingredient(ingredient)) => {
                let source = xml_ref(reference, ingredient, name)?;
                Ok(xml_mut(working, target, name)?.do_insert(source, target, ingredient)?
                    && xml_mut(working, ingredient, name)?.do_delete(ingredient)?)
            }
            (Operation::TextSetting { .. }, Payload::Text(text)) => {
                xml_mut(working, target, name)?.do_set_text(target, text)
            }
            (Operation::TextWrapping { .. }, Payload::Wrap { prefix, suffix }) => {
                xml_mut(working, target, name)?.do_wrap_text(target, prefix, suffix)
            }
            (Operation::ParamSetting, Payload::Value(value)) => {
                let model = model_mut(working, target)?;
                let incompatible = model.incompatible(name);
                model.as_params_mut().ok_or(incompatible)?.do_set(target, value)
            }
            _ => Err(ModelError::Incompatible {
                edit: self.to_string(),
                model: "payload",
            }),
        }
    }
}

fn model_mut<'a>(models: &'a mut Models, location: &Location) -> Result<&'a mut Model, ModelError> {
    models
        .get_mut(&location.file)
        .ok_or_else(|| ModelError::NoModel(location.file.clone()))
}

fn model_ref<'a>(models: &'a Models, location: &Location) -> Result<&'a Model, ModelError> {
    models
        .get(&location.file)
        .ok_or_else(|| ModelError::NoModel(location.file.clone()))
}

fn line_mut<'a>(
    models: &'a mut Models,
    location: &Location,
    edit: &str,
) -> Result<&'a mut LineModel, ModelError> {
    let model = model_mut(models, location)?;
    let incompatible = model.incompatible(edit);
    model.as_line_mut().ok_or(incompatible)
}

fn line_ref<'a>(models: &'a Models, location: &Location, edit: &str) -> Result<&'a LineModel, ModelError> {
    let model = model_ref(models, location)?;
    model.as_line().ok_or_else(|| model.incompatible(edit))
}

fn xml_mut<'a>(
    models: &'a mut Models,
    location: &Location,
    edit: &str,
) -> Result<&'a mut XmlModel, ModelError> {
    let model = model_mut(models, location)?;
    let incompatible = model.incompatible(edit);
    model.as_xml_mut().ok_or(incompatible)
}

fn xml_ref<'a>(models: &'a Models, location: &Location, edit: &str) -> Result<&'a XmlModel, ModelError> {
    let model = model_ref(models, location)?;
    model.as_xml().ok_or_else(|| model.incompatible(edit))
}

impl Display for Edit {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}({}", self.kind, self.target)?;
        if let Some(value) = self.payload.to_value() {
            write!(f, ", {value}")?;
        }
        f.write_str(")")
    }
}

impl FromStr for Edit {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let bad = || ParseError::BadEdit(s.to_string());
        let open = name_end(s).ok_or_else(bad)?;
        let kind: EditKind = s[..open].parse()?;
        let inner = s[open..]
            .strip_prefix('(')
            .and_then(|rest| rest.strip_suffix(')'))
            .ok_or_else(bad)?;
        let args = literal::parse_args(inner)?;
        let (target, rest) = args.split_first().ok_or_else(bad)?;
        let target = Location::from_value(target)?;
        let payload = kind.payload_from_args(rest)?;
        Ok(Self { kind, target, payload })
    }
}

/// Byte offset of the `(` opening the argument list
///
/// Skips the class name and a `<...>` template whose quoted arguments may
/// themselves contain brackets.
fn name_end(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut quoted = false;
    for (i, c) in s.char_indices() {
        match c {
            '"' if depth > 0 => quoted = !quoted,
            _ if quoted => {}
            '<' => depth += 1,
            '>' => depth = depth.checked_sub(1)?,
            '(' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn line_models() -> Models {
        let mut models = Models::new();
        models.insert(
            "f.txt".to_string(),
            Model::Line(LineModel::parse("f.txt", "a\nb\nc\n")),
        );
        models
    }

    #[test]
    fn registry_names_parse() {
        for name in registered_names() {
            let kind: EditKind = name.parse().unwrap();
            assert_eq!(kind.name(), name);
        }
        assert!("LineSwap".parse::<EditKind>().is_err());
    }

    #[test]
    fn templated_names_are_canonical() {
        let kind: EditKind = "XmlNodeInsertion< stmt , block >".parse().unwrap();
        assert_eq!(kind.name(), "XmlNodeInsertion<stmt,block>");
        let kind: EditKind = r#"XmlTextSetting<operator_comp,"<",">=">"#.parse().unwrap();
        assert_eq!(
            kind.operation(),
            &Operation::TextSetting {
                tag: "operator_comp".into(),
                choices: vec!["<".into(), ">=".into()],
            }
        );
        assert!("XmlTextWrapping<number,\"(\">".parse::<EditKind>().is_err());
        assert!("XmlNodeInsertion<stmt>".parse::<EditKind>().is_err());
    }

    #[test]
    fn preset_operation_keeps_preset_name() {
        let kind = EditKind::from_operation(Operation::NodeReplacement { tag: "stmt".into() });
        assert_eq!(kind.name(), "SrcmlStmtReplacement");
        let kind = EditKind::from_operation(Operation::NodeReplacement { tag: "call".into() });
        assert_eq!(kind.name(), "XmlNodeReplacement<call>");
    }

    #[test]
    fn display_and_parse() {
        let edit = Edit::new(
            "LineReplacement".parse().unwrap(),
            Location::new("f.txt", "line", 0),
            Payload::Ingredient(Location::new("f.txt", "line", 2)),
        )
        .unwrap();
        let text = edit.to_string();
        assert_eq!(text, "LineReplacement(('f.txt', 'line', 0), ('f.txt', 'line', 2))");
        assert_eq!(text.parse::<Edit>().unwrap(), edit);

        let wrap: Edit = r#"XmlTextWrapping<number,"(","+1)">(('a.xml', 'number', 1), ('(', '+1)'))"#
            .parse()
            .unwrap();
        assert_eq!(
            wrap.payload,
            Payload::Wrap {
                prefix: "(".into(),
                suffix: "+1)".into()
            }
        );
        assert_eq!(wrap.to_string().parse::<Edit>().unwrap(), wrap);
    }

    #[test]
    fn rejects_mismatched_payload() {
        assert!("LineDeletion(('f', 'line', 0), 3)".parse::<Edit>().is_err());
        assert!("LineReplacement(('f', 'line', 0))".parse::<Edit>().is_err());
        assert!("ParamSetting(('p', 'param', 'x'))".parse::<Edit>().is_err());
        assert!("LineDeletion('f', 'line', 0)".parse::<Edit>().is_err());
    }

    #[test]
    fn line_edits_apply() {
        let reference = line_models();
        let mut working = reference.clone();
        let edit: Edit = "LineMoving(('f.txt', '_inter_line', 0), ('f.txt', 'line', 2))"
            .parse()
            .unwrap();
        assert!(edit.apply(&reference, &mut working).unwrap());
        assert_eq!(working["f.txt"].dump(), "c\na\nb\n");

        let delete: Edit = "LineDeletion(('f.txt', 'line', 0))".parse().unwrap();
        assert!(delete.apply(&reference, &mut working).unwrap());
        assert!(!delete.apply(&reference, &mut working).unwrap());
    }

    #[test]
    fn wrong_family_is_error() {
        let reference = line_models();
        let mut working = reference.clone();
        let edit: Edit = "XmlNodeDeletion<stmt>(('f.txt', 'stmt', 0))".parse().unwrap();
        assert!(matches!(
            edit.apply(&reference, &mut working),
            Err(ModelError::Incompatible { .. })
        ));
        let edit: Edit = "LineDeletion(('g.txt', 'line', 0))".parse().unwrap();
        assert!(matches!(edit.apply(&reference, &mut working), Err(ModelError::NoModel(_))));
    }

    #[test]
    fn text_edits_apply() {
        let xml = XmlModel::parse("a.xml", "<unit><number>1</number> + <number>2</number></unit>").unwrap();
        let mut reference = Models::new();
        reference.insert("a.xml".to_string(), Model::Xml(xml));
        let mut working = reference.clone();
        let set: Edit = "SrcmlNumericSetting(('a.xml', 'number', 0), '0')".parse().unwrap();
        assert!(set.apply(&reference, &mut working).unwrap());
        let wrap: Edit = "SrcmlRelativeNumericSetting(('a.xml', 'number', 1), ('(', '*2)'))"
            .parse()
            .unwrap();
        assert!(wrap.apply(&reference, &mut working).unwrap());
        assert_eq!(working["a.xml"].dump(), "0 + (2*2)");
    }
}
