//! Variants: models after applying a patch
//!
//! A [`Variant`] owns its models outright. The reference variant is parsed
//! once from the target files; every other variant starts from a clone of
//! the reference models and applies its patch edit by edit, each edit
//! seeing the effects of the previous ones while ingredients are always
//! read from the untouched reference.

use crate::diff::{self, DiffMethod};
use crate::error::{ModelError, ParseError};
use crate::hash::DiffFingerprint;
use crate::models::{Model, ModelOptions, ModelRule, MutationModel};
use crate::patch::Patch;
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;
use tracing::{debug, trace};

/// Models keyed by target file name, in target order
pub type Models = IndexMap<String, Model>;

/// Materialized program state
#[derive(Debug, Clone)]
pub struct Variant {
    patch: Patch,
    models: Models,
    dumps: IndexMap<String, String>,
    diff: String,
    fingerprint: DiffFingerprint,
}

impl Variant {
    /// Unmodified variant over freshly parsed models
    #[must_use]
    pub fn reference(models: Models) -> Self {
        let dumps = dump_all(&models);
        Self {
            patch: Patch::new(),
            models,
            dumps,
            diff: String::new(),
            fingerprint: DiffFingerprint::EMPTY,
        }
    }

    /// Parse every target file under `root` into a reference variant
    ///
    /// # Errors
    /// Returns [`ParseError`] if a file matches no rule or fails to parse.
    pub fn load_reference(
        root: &Path,
        target_files: &[String],
        rules: &[ModelRule],
        options: &ModelOptions,
    ) -> Result<Self, ParseError> {
        let mut models = Models::new();
        for filename in target_files {
            let model = Model::load(root, filename, rules, options)?;
            debug!(file = %filename, model = %model.kind(), "parsed target file");
            models.insert(filename.clone(), model);
        }
        Ok(Self::reference(models))
    }

    /// Apply `patch` on top of the reference models
    ///
    /// Edits that change nothing are legal and simply ignored.
    ///
    /// # Errors
    /// Returns [`ModelError`] if an edit names an unknown file, a model of
    /// the wrong family, or a location outside the catalog.
    pub fn new(reference: &Self, patch: Patch, method: DiffMethod) -> Result<Self, ModelError> {
        let mut models = reference.models.clone();
        for edit in &patch.edits {
            let changed = edit.apply(&reference.models, &mut models)?;
            trace!(%edit, changed, "applied edit");
        }
        let dumps = dump_all(&models);
        let diff = diff_dumps(reference, &dumps, method);
        let fingerprint = DiffFingerprint::of(&diff);
        Ok(Self {
            patch,
            models,
            dumps,
            diff,
            fingerprint,
        })
    }

    /// Patch that produced this variant
    #[must_use]
    pub fn patch(&self) -> &Patch {
        &self.patch
    }

    /// All models, in target order
    #[must_use]
    pub fn models(&self) -> &Models {
        &self.models
    }

    /// Model of one target file
    #[must_use]
    pub fn model(&self, filename: &str) -> Option<&Model> {
        self.models.get(filename)
    }

    /// Serialized models, keyed by target file name
    #[must_use]
    pub fn dumps(&self) -> &IndexMap<String, String> {
        &self.dumps
    }

    /// Concatenated per-file diff against the reference
    #[must_use]
    pub fn diff(&self) -> &str {
        &self.diff
    }

    /// Cache key of this variant
    #[must_use]
    pub fn fingerprint(&self) -> DiffFingerprint {
        self.fingerprint
    }

    /// Uniformly chosen model satisfying `filter`
    pub fn random_model<R, F>(&self, filter: F, rng: &mut R) -> Option<&Model>
    where
        R: Rng + ?Sized,
        F: Fn(&Model) -> bool,
    {
        let candidates: Vec<&Model> = self.models.values().filter(|m| filter(m)).collect();
        candidates.choose(rng).copied()
    }
}

fn dump_all(models: &Models) -> IndexMap<String, String> {
    models
        .iter()
        .map(|(filename, model)| (filename.clone(), model.dump()))
        .collect()
}

fn diff_dumps(reference: &Variant, dumps: &IndexMap<String, String>, method: DiffMethod) -> String {
    let mut out = String::new();
    for (filename, after) in dumps {
        let (Some(model), Some(before)) = (reference.models.get(filename), reference.dumps.get(filename)) else {
            continue;
        };
        out.push_str(&diff::file_diff(method, model.renamed_filename(), before, after));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edit::Edit;
    use crate::models::LineModel;
    use pretty_assertions::assert_eq;

    fn reference() -> Variant {
        let mut models = Models::new();
        models.insert("a.txt".into(), Model::Line(LineModel::parse("a.txt", "one\ntwo\nthree\n")));
        models.insert("b.txt".into(), Model::Line(LineModel::parse("b.txt", "x\ny\n")));
        Variant::reference(models)
    }

    fn patch(text: &str) -> Patch {
        text.parse().unwrap()
    }

    #[test]
    fn empty_patch_has_empty_diff() {
        let reference = reference();
        let variant = Variant::new(&reference, Patch::new(), DiffMethod::Unified).unwrap();
        assert_eq!(variant.diff(), "");
        assert!(variant.fingerprint().is_empty_diff());
    }

    #[test]
    fn edits_apply_in_order_with_reference_ingredients() {
        let reference = reference();
        // second replacement reads line 0 of the reference, not the already replaced one
        let p = patch(
            "LineReplacement(('a.txt', 'line', 0), ('a.txt', 'line', 2)) | \
             LineReplacement(('a.txt', 'line', 1), ('a.txt', 'line', 0))",
        );
        let variant = Variant::new(&reference, p, DiffMethod::Unified).unwrap();
        assert_eq!(variant.dumps()["a.txt"], "three\none\nthree\n");
        assert_eq!(variant.dumps()["b.txt"], "x\ny\n");
        assert!(variant.diff().starts_with("--- before: a.txt\n+++ after: a.txt\n"));
    }

    #[test]
    fn different_patches_same_diff_same_key() {
        let reference = reference();
        let a = Variant::new(
            &reference,
            patch("LineDeletion(('a.txt', 'line', 1))"),
            DiffMethod::Unified,
        )
        .unwrap();
        let b = Variant::new(
            &reference,
            patch("LineDeletion(('a.txt', 'line', 1)) | LineDeletion(('a.txt', 'line', 1))"),
            DiffMethod::Unified,
        )
        .unwrap();
        assert_ne!(a.patch(), b.patch());
        assert_eq!(a.fingerprint(), b.fingerprint());
    }

    #[test]
    fn diff_follows_target_order() {
        let reference = reference();
        let p = patch("LineDeletion(('b.txt', 'line', 0)) | LineDeletion(('a.txt', 'line', 0))");
        let variant = Variant::new(&reference, p, DiffMethod::Context).unwrap();
        let a = variant.diff().find("a.txt").unwrap();
        let b = variant.diff().find("b.txt").unwrap();
        assert!(a < b);
        assert!(variant.diff().starts_with("*** before: a.txt"));
    }

    #[test]
    fn unknown_file_is_error() {
        let reference = reference();
        let edit: Edit = "LineDeletion(('c.txt', 'line', 0))".parse().unwrap();
        assert!(Variant::new(&reference, Patch::from(vec![edit]), DiffMethod::Unified).is_err());
    }
}
