//! Scenario files
//!
//! A scenario is a TOML document with one table per concern:
//!
//! ```toml
//! [graft]
//! seed = 42
//!
//! [software]
//! path = "examples/triangle"
//! target_files = ["triangle.c"]
//! run_cmd = "./run.sh"
//! fitness = ["time"]
//!
//! [search]
//! algorithm = "FirstImprovement"
//! possible_edits = ["LineReplacement", "LineInsertion", "LineDeletion"]
//! max_steps = 100
//!
//! [search.ls]
//! delete_prob = 0.5
//! ```
//!
//! Every key has a default. Lists may also be written as a single
//! whitespace-separated string, the historic format.

use crate::error::ScenarioError;
use crate::settings::Settings;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};

/// Whole scenario
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Scenario {
    pub graft: GraftSection,
    pub software: SoftwareSection,
    pub params: ParamsSection,
    pub srcml: SrcmlSection,
    pub search: SearchSection,
}

impl Scenario {
    /// Load from a TOML file
    ///
    /// # Errors
    /// Returns [`ScenarioError`] if the file is unreadable or malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ScenarioError> {
        let path = path.as_ref();
        let text =
            std::fs::read_to_string(path).map_err(|e| ScenarioError::io_error(path, e))?;
        Self::from_toml_str(&text)
    }

    /// Parse from TOML text
    ///
    /// # Errors
    /// Returns [`ScenarioError::Toml`] if the text is malformed.
    pub fn from_toml_str(text: &str) -> Result<Self, ScenarioError> {
        Ok(toml::from_str(text)?)
    }

    /// Render back to TOML, for logging the effective configuration
    #[must_use]
    pub fn to_toml_string(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }

    /// Validate the `[graft]` table into immutable settings
    ///
    /// # Errors
    /// Returns [`ScenarioError`] on invalid values.
    pub fn settings(&self) -> Result<Settings, ScenarioError> {
        Settings::from_section(&self.graft)
    }
}

/// `[graft]` table: process-wide tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GraftSection {
    pub seed: Option<u64>,
    pub log_dir: PathBuf,
    pub work_dir: PathBuf,
    pub local_original_copy: bool,
    pub local_original_name: String,
    pub edit_retries: usize,
    pub default_timeout: f64,
    pub default_lengthout: i64,
    pub diff_method: String,
    pub trust_local_filesystem: bool,
}

impl Default for GraftSection {
    fn default() -> Self {
        Self {
            seed: None,
            log_dir: PathBuf::from("_graft_logs"),
            work_dir: PathBuf::from("_graft_work"),
            local_original_copy: false,
            local_original_name: "__original__".to_string(),
            edit_retries: 10,
            default_timeout: 30.0,
            default_lengthout: 10_000,
            diff_method: "unified".to_string(),
            trust_local_filesystem: true,
        }
    }
}

/// `[software]` table: target program and evaluation pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SoftwareSection {
    pub path: PathBuf,
    #[serde(deserialize_with = "string_or_list")]
    pub target_files: Vec<String>,
    #[serde(deserialize_with = "lines_or_list")]
    pub model_rules: Vec<String>,
    #[serde(deserialize_with = "fitness_list")]
    pub fitness: Vec<String>,

    pub init_cmd: Option<String>,
    pub init_timeout: Option<f64>,
    pub init_lengthout: Option<i64>,
    pub setup_cmd: Option<String>,
    pub setup_timeout: Option<f64>,
    pub setup_lengthout: Option<i64>,
    pub compile_cmd: Option<String>,
    pub compile_timeout: Option<f64>,
    pub compile_lengthout: Option<i64>,
    pub test_cmd: Option<String>,
    pub test_timeout: Option<f64>,
    pub test_lengthout: Option<i64>,
    pub run_cmd: Option<String>,
    pub run_timeout: Option<f64>,
    pub run_lengthout: Option<i64>,

    pub batch_timeout: Option<f64>,
    pub batch_lengthout: Option<i64>,
    pub batch_bin_fitness_strategy: String,
    pub batch_fitness_strategy: String,
}

impl Default for SoftwareSection {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            target_files: Vec::new(),
            model_rules: vec![
                "*.params : ConfigFileParamsModel".to_string(),
                "*.xml : SrcmlModel".to_string(),
                "* : LineModel".to_string(),
            ],
            fitness: Vec::new(),
            init_cmd: None,
            init_timeout: Some(60.0),
            init_lengthout: Some(-1),
            setup_cmd: None,
            setup_timeout: None,
            setup_lengthout: None,
            compile_cmd: None,
            compile_timeout: None,
            compile_lengthout: None,
            test_cmd: None,
            test_timeout: None,
            test_lengthout: None,
            run_cmd: None,
            run_timeout: None,
            run_lengthout: None,
            batch_timeout: None,
            batch_lengthout: None,
            batch_bin_fitness_strategy: "aggregate".to_string(),
            batch_fitness_strategy: "sum".to_string(),
        }
    }
}

/// `[params]` table: defaults for parameter-file models
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParamsSection {
    #[serde(deserialize_with = "string_or_list")]
    pub timing: Vec<String>,
    pub cli_prefix: String,
    pub cli_glue: String,
    pub cli_boolean: String,
    pub cli_boolean_prefix_true: String,
    pub cli_boolean_prefix_false: String,
    pub cli_none: String,
    pub silent_prefix: String,
    pub silent_suffix: String,
}

impl Default for ParamsSection {
    fn default() -> Self {
        Self {
            timing: vec!["test".to_string(), "run".to_string()],
            cli_prefix: "--".to_string(),
            cli_glue: "=".to_string(),
            cli_boolean: "show".to_string(),
            cli_boolean_prefix_true: String::new(),
            cli_boolean_prefix_false: "no-".to_string(),
            cli_none: "hide".to_string(),
            silent_prefix: "@".to_string(),
            silent_suffix: "$".to_string(),
        }
    }
}

/// `[srcml]` table: preprocessing of srcML documents
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SrcmlSection {
    #[serde(deserialize_with = "lines_or_list")]
    pub rename: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub focus: Vec<String>,
    #[serde(deserialize_with = "string_or_list")]
    pub internodes: Vec<String>,
    pub process_pseudo_blocks: bool,
    pub process_literals: bool,
    pub process_operators: bool,
}

impl Default for SrcmlSection {
    fn default() -> Self {
        Self {
            rename: vec![
                "stmt: break continue decl_stmt do expr_stmt for goto if return switch while"
                    .to_string(),
                "number: literal_number".to_string(),
            ],
            focus: ["block", "stmt", "operator_comp", "operator_arith", "number"]
                .iter()
                .map(ToString::to_string)
                .collect(),
            internodes: vec!["block".to_string()],
            process_pseudo_blocks: true,
            process_literals: true,
            process_operators: true,
        }
    }
}

/// `[search]` table plus its per-family subtables
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SearchSection {
    pub algorithm: String,
    #[serde(deserialize_with = "string_or_list")]
    pub possible_edits: Vec<String>,
    pub warmup: usize,
    pub warmup_strategy: String,
    pub max_steps: Option<u64>,
    pub max_time: Option<f64>,
    pub max_budget: Option<u64>,
    pub target_fitness: Option<TargetFitness>,
    pub cache_maxsize: usize,
    pub cache_keep: f64,
    #[serde(deserialize_with = "lines_or_list")]
    pub batch_instances: Vec<String>,
    pub batch_shuffle: bool,
    pub batch_bin_shuffle: bool,
    pub batch_sample_size: usize,
    pub ls: LocalSearchSection,
    pub gp: GeneticSection,
    pub minify: MinifySection,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            algorithm: String::new(),
            possible_edits: Vec::new(),
            warmup: 3,
            warmup_strategy: "last".to_string(),
            max_steps: None,
            max_time: None,
            max_budget: None,
            target_fitness: None,
            cache_maxsize: 100,
            cache_keep: 0.2,
            batch_instances: Vec::new(),
            batch_shuffle: true,
            batch_bin_shuffle: false,
            batch_sample_size: 1,
            ls: LocalSearchSection::default(),
            gp: GeneticSection::default(),
            minify: MinifySection::default(),
        }
    }
}

/// Target fitness: a scalar or one value per objective
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TargetFitness {
    Scalar(f64),
    Vector(Vec<f64>),
}

impl TargetFitness {
    /// Values as a vector
    #[must_use]
    pub fn to_vec(&self) -> Vec<f64> {
        match self {
            Self::Scalar(x) => vec![*x],
            Self::Vector(v) => v.clone(),
        }
    }
}

/// `[search.ls]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LocalSearchSection {
    pub delete_prob: f64,
    /// Independent mutations per move
    pub horizon: usize,
    pub max_neighbours: Option<usize>,
    pub when_trapped: String,
    pub accept_fail: bool,
    pub tabu_length: usize,
}

impl Default for LocalSearchSection {
    fn default() -> Self {
        Self {
            delete_prob: 0.5,
            horizon: 1,
            max_neighbours: None,
            when_trapped: "continue".to_string(),
            accept_fail: false,
            tabu_length: 10,
        }
    }
}

/// `[search.gp]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneticSection {
    pub pop_size: usize,
    pub delete_prob: f64,
    pub offspring_elitism: f64,
    pub offspring_crossover: f64,
    pub offspring_mutation: f64,
    pub uniform_rate: f64,
    pub batch_reset: bool,
}

impl Default for GeneticSection {
    fn default() -> Self {
        Self {
            pop_size: 10,
            delete_prob: 0.5,
            offspring_elitism: 0.1,
            offspring_crossover: 0.5,
            offspring_mutation: 0.4,
            uniform_rate: 0.5,
            batch_reset: true,
        }
    }
}

/// `[search.minify]` table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MinifySection {
    pub do_cleanup: bool,
    pub do_rebuild: bool,
    pub do_simplify: bool,
    pub round_robin_limit: i64,
}

impl Default for MinifySection {
    fn default() -> Self {
        Self {
            do_cleanup: true,
            do_rebuild: true,
            do_simplify: true,
            round_robin_limit: 3,
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StringOrList {
    Str(String),
    List(Vec<String>),
}

fn string_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match StringOrList::deserialize(d)? {
        StringOrList::Str(s) => s.split_whitespace().map(ToString::to_string).collect(),
        StringOrList::List(v) => v,
    })
}

fn lines_or_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    Ok(match StringOrList::deserialize(d)? {
        StringOrList::Str(s) => s
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect(),
        StringOrList::List(v) => v,
    })
}

fn fitness_list<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<String>, D::Error> {
    match StringOrList::deserialize(d)? {
        StringOrList::Str(s) => split_templated(&s).map_err(serde::de::Error::custom),
        StringOrList::List(v) => Ok(v),
    }
}

/// Split a whitespace-separated list while keeping `name<a b>` templates whole
///
/// # Errors
/// Returns a message on unbalanced `<`/`>`.
pub fn split_templated(s: &str) -> Result<Vec<String>, String> {
    let mut out = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    for c in s.chars() {
        match c {
            '<' => {
                if current.is_empty() && out.is_empty() {
                    return Err("missing name before \"<\"".to_string());
                }
                if current.is_empty() {
                    // "name <args>" written with a space
                    current = out.pop().unwrap_or_default();
                }
                depth += 1;
                current.push(c);
            }
            '>' => {
                if depth == 0 {
                    return Err("unpaired \">\"".to_string());
                }
                depth -= 1;
                current.push(c);
            }
            c if c.is_whitespace() && depth == 0 => {
                if !current.is_empty() {
                    out.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if depth > 0 {
        return Err(format!("missing \">\" for \"{current}\""));
    }
    if !current.is_empty() {
        out.push(current);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_scenario_uses_defaults() {
        let scenario = Scenario::from_toml_str("").unwrap();
        assert_eq!(scenario.graft.edit_retries, 10);
        assert_eq!(scenario.search.cache_maxsize, 100);
        assert!((scenario.search.cache_keep - 0.2).abs() < f64::EPSILON);
        assert_eq!(scenario.search.gp.pop_size, 10);
        assert_eq!(scenario.search.minify.round_robin_limit, 3);
        assert_eq!(scenario.software.model_rules.len(), 3);
    }

    #[test]
    fn lists_accept_strings() {
        let scenario = Scenario::from_toml_str(
            r#"
            [software]
            target_files = "a.c b.c"
            fitness = "repair -time"

            [search]
            possible_edits = ["LineDeletion"]
            batch_instances = """
            one
            two
            ___
            three
            """
            "#,
        )
        .unwrap();
        assert_eq!(scenario.software.target_files, vec!["a.c", "b.c"]);
        assert_eq!(scenario.software.fitness, vec!["repair", "-time"]);
        assert_eq!(scenario.search.possible_edits, vec!["LineDeletion"]);
        assert_eq!(
            scenario.search.batch_instances,
            vec!["one", "two", "___", "three"]
        );
    }

    #[test]
    fn nested_search_tables() {
        let scenario = Scenario::from_toml_str(
            r#"
            [search.ls]
            delete_prob = 0.0
            max_neighbours = 5

            [search.gp]
            pop_size = 4
            "#,
        )
        .unwrap();
        assert!(scenario.search.ls.delete_prob.abs() < f64::EPSILON);
        assert_eq!(scenario.search.ls.max_neighbours, Some(5));
        assert_eq!(scenario.search.gp.pop_size, 4);
    }

    #[test]
    fn unknown_keys_rejected() {
        assert!(Scenario::from_toml_str("[graft]\nbogus = 1\n").is_err());
    }

    #[test]
    fn templated_fitness_split() {
        assert_eq!(
            split_templated("perf<task clock> -time").unwrap(),
            vec!["perf<task clock>", "-time"]
        );
        assert!(split_templated("<x>").is_err());
        assert!(split_templated("perf<x").is_err());
        assert!(split_templated("a>").is_err());
    }

    #[test]
    fn target_fitness_forms() {
        let s = Scenario::from_toml_str("[search]\ntarget_fitness = 0.0\n").unwrap();
        assert_eq!(s.search.target_fitness.unwrap().to_vec(), vec![0.0]);
        let s = Scenario::from_toml_str("[search]\ntarget_fitness = [1.0, 2.5]\n").unwrap();
        assert_eq!(s.search.target_fitness.unwrap().to_vec(), vec![1.0, 2.5]);
    }
}
