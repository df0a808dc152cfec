//! Parameter-space file grammar
//!
//! One declaration per line, `#` starts a comment:
//!
//! ```text
//! TIMING = "setup run"          # stages receiving {PARAMS}
//! CLI_PREFIX = "--"
//! mode {fast,safe}[safe]        # categorical
//! ratio (0.0,1.0)[0.5]          # uniform float
//! decay e(0.001,1.0)[0.1]       # exponential, optional third lambda
//! depth [1,10][3]               # uniform integer
//! restarts g[1,1000][10]        # geometric, optional third lambda
//! {mode==fast,depth==10}        # forbidden combination
//! ratio | mode in {safe}        # ratio only active when mode is safe
//! depth | mode == fast
//! ```

use super::realm::Realm;
use crate::error::ParseError;
use crate::literal::Value;
use crate::scenario::ParamsSection;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

const STAGES: [&str; 4] = ["setup", "compile", "test", "run"];

macro_rules! pattern {
    ($name:ident, $re:literal) => {
        static $name: Lazy<Regex> = Lazy::new(|| Regex::new($re).expect("static regex"));
    };
}

pattern!(BLANK, r"^\s*(#.*)?$");
pattern!(SETTING, r#"^([A-Z_]+)\s*=\s*"([^"]*)"(?:\s*#.*)?$"#);
pattern!(CATEGORICAL, r"^\s*(\S+)\s*\{([^}]+)\}\s*\[([^\]]+)\](?:\s*#.*)?$");
pattern!(UNIFORM, r"^\s*(\S+)\s*\(([^,]+),([^,]+)\)\s*\[([^\]]+)\](?:\s*#.*)?$");
pattern!(EXPONENTIAL, r"^\s*(\S+)\s*e\(([^,]+),([^,)]+)(?:,([^,)]+))?\)\s*\[([^\]]+)\](?:\s*#.*)?$");
pattern!(INTEGER, r"^\s*(\S+)\s*\[([^,]+),([^,]+)\]\s*\[([^\]]+)\](?:\s*#.*)?$");
pattern!(GEOMETRIC, r"^\s*(\S+)\s*g\[([^,]+),([^,\]]+)(?:,([^,\]]+))?\]\s*\[([^\]]+)\](?:\s*#.*)?$");
pattern!(FORBIDDEN, r"^\{([^=}]+==[^=}]+(?:,[^=}]+==[^=}]+)*)\}(?:\s*#.*)?$");
pattern!(CONDITIONAL_IN, r"^\s*([^|]+?)\s*\|\s*([^{]+?)\s+in\s+\{([^}]*)\}(?:\s*#.*)?$");
pattern!(CONDITIONAL_EQ, r"^\s*([^|]+?)\s*\|\s*([^{]+?)\s*==\s*(\S*)(?:\s*#.*)?$");

/// `param` is only active while `parent` takes one of `values`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conditional {
    pub param: String,
    pub parent: String,
    pub values: Vec<String>,
}

/// Everything declared by one parameter-space file
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParamSpace {
    pub defaults: IndexMap<String, Value>,
    pub realms: IndexMap<String, Realm>,
    pub conditionals: Vec<Conditional>,
    pub forbidden: Vec<Vec<(String, String)>>,
}

/// Parse a parameter-space file
///
/// `config` starts as the `[params]` defaults and is updated by the
/// file's own setting lines.
///
/// # Errors
/// Returns [`ParseError::Syntax`] naming the offending line.
pub fn parse(origin: &str, text: &str, config: &mut ParamsSection) -> Result<ParamSpace, ParseError> {
    let mut space = ParamSpace::default();
    for line in text.lines() {
        read_line(origin, line, &mut space, config)?;
    }
    Ok(space)
}

/// Check that every `TIMING` entry names a pipeline stage
///
/// # Errors
/// Returns the first illegal entry.
pub fn check_timing(timing: &[String]) -> Result<(), String> {
    match timing.iter().find(|s| !STAGES.contains(&s.as_str())) {
        Some(step) => Err(format!("illegal timing value \"{step}\"")),
        None => Ok(()),
    }
}

fn read_line(
    origin: &str,
    line: &str,
    space: &mut ParamSpace,
    config: &mut ParamsSection,
) -> Result<(), ParseError> {
    let fail = |message: String| ParseError::syntax_error(origin, message);
    if BLANK.is_match(line) {
        return Ok(());
    }

    if let Some(m) = SETTING.captures(line) {
        let value = m[2].to_string();
        match &m[1] {
            "TIMING" => {
                let timing: Vec<String> = value.split_whitespace().map(ToString::to_string).collect();
                check_timing(&timing).map_err(fail)?;
                config.timing = timing;
            }
            "CLI_PREFIX" => config.cli_prefix = value,
            "CLI_GLUE" => config.cli_glue = value,
            "CLI_BOOLEAN" => config.cli_boolean = value,
            "CLI_BOOLEAN_PREFIX_TRUE" => config.cli_boolean_prefix_true = value,
            "CLI_BOOLEAN_PREFIX_FALSE" => config.cli_boolean_prefix_false = value,
            "CLI_NONE" => config.cli_none = value,
            "SILENT_PREFIX" => config.silent_prefix = value,
            "SILENT_SUFFIX" => config.silent_suffix = value,
            other => return Err(fail(format!("unknown setting \"{other}\""))),
        }
        return Ok(());
    }

    if let Some(m) = CATEGORICAL.captures(line) {
        let values: Vec<String> = m[2].split(',').map(|s| s.trim().to_string()).collect();
        let default = m[3].trim().to_string();
        if !values.contains(&default) {
            return Err(fail(format!("illegal default value for {}: \"{default}\"", &m[1])));
        }
        return declare(space, &m[1], Value::Str(default), Realm::Categorical(values)).map_err(fail);
    }

    if let Some(m) = EXPONENTIAL.captures(line) {
        let start = float(&m[2]).map_err(&fail)?;
        let stop = float(&m[3]).map_err(&fail)?;
        let lambda = m.get(4).map(|l| float(l.as_str())).transpose().map_err(&fail)?;
        let default = float(&m[5]).map_err(&fail)?;
        let realm = Realm::Exponential { start, stop, lambda };
        return declare(space, &m[1], Value::Float(default), realm).map_err(fail);
    }

    if let Some(m) = UNIFORM.captures(line) {
        let start = float(&m[2]).map_err(&fail)?;
        let stop = float(&m[3]).map_err(&fail)?;
        let default = float(&m[4]).map_err(&fail)?;
        return declare(space, &m[1], Value::Float(default), Realm::Uniform { start, stop }).map_err(fail);
    }

    if let Some(m) = GEOMETRIC.captures(line) {
        let start = int(&m[2]).map_err(&fail)?;
        let stop = int(&m[3]).map_err(&fail)?;
        let lambda = m.get(4).map(|l| float(l.as_str())).transpose().map_err(&fail)?;
        if lambda == Some(0.0) {
            return Err(fail(format!("illegal lambda for {}", &m[1])));
        }
        let default = int(&m[5]).map_err(&fail)?;
        let realm = Realm::Geometric { start, stop, lambda };
        return declare(space, &m[1], Value::Int(default), realm).map_err(fail);
    }

    if let Some(m) = INTEGER.captures(line) {
        let start = int(&m[2]).map_err(&fail)?;
        let stop = int(&m[3]).map_err(&fail)?;
        let default = int(&m[4]).map_err(&fail)?;
        return declare(space, &m[1], Value::Int(default), Realm::UniformInt { start, stop }).map_err(fail);
    }

    if let Some(m) = FORBIDDEN.captures(line) {
        let mut combination = Vec::new();
        for clause in m[1].split(',') {
            let Some((key, value)) = clause.split_once("==") else {
                return Err(fail(format!("bad forbidden clause \"{clause}\"")));
            };
            let key = key.trim();
            if !space.defaults.contains_key(key) {
                return Err(fail(format!("illegal forbidden parameter \"{key}\"")));
            }
            combination.push((key.to_string(), value.trim().to_string()));
        }
        space.forbidden.push(combination);
        return Ok(());
    }

    let conditional = CONDITIONAL_IN
        .captures(line)
        .map(|m| (m[1].to_string(), m[2].to_string(), m[3].split(',').map(|s| s.trim().to_string()).collect()))
        .or_else(|| {
            CONDITIONAL_EQ
                .captures(line)
                .map(|m| (m[1].to_string(), m[2].to_string(), vec![m[3].to_string()]))
        });
    if let Some((param, parent, values)) = conditional {
        for key in [&param, &parent] {
            if !space.defaults.contains_key(key.as_str()) {
                return Err(fail(format!("illegal conditional parameter \"{key}\"")));
            }
        }
        space.conditionals.push(Conditional { param, parent, values });
        return Ok(());
    }

    Err(fail(format!("unable to parse line \"{}\"", line.trim())))
}

fn declare(space: &mut ParamSpace, name: &str, default: Value, realm: Realm) -> Result<(), String> {
    if !realm.contains(&default) {
        return Err(format!("illegal default value for {name}: \"{default}\""));
    }
    space.defaults.insert(name.to_string(), default);
    space.realms.insert(name.to_string(), realm);
    Ok(())
}

fn float(s: &str) -> Result<f64, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("not a number: \"{}\"", s.trim()))
}

fn int(s: &str) -> Result<i64, String> {
    s.trim()
        .parse()
        .map_err(|_| format!("not an integer: \"{}\"", s.trim()))
}
