//! Flat line model
//!
//! Every source line is a `line` point and every gap between lines
//! (including before the first and after the last) an `_inter_line`
//! point. Deleted lines keep their slot as `None` so that positions
//! of later lines never move on deletion. Trailing whitespace of each
//! line is dropped on parse.

use super::MutationModel;
use crate::error::{ModelError, ParseError};
use crate::location::{Catalog, LocIndex, Location};
use rand::Rng;
use std::path::Path;

const LINE: &str = "line";
const INTER_LINE: &str = "_inter_line";

/// Line-granularity model of one target file
#[derive(Debug, Clone, PartialEq)]
pub struct LineModel {
    filename: String,
    contents: Vec<Option<String>>,
    catalog: Catalog<usize>,
}

impl LineModel {
    /// Build from file contents
    #[must_use]
    pub fn parse(filename: impl Into<String>, text: &str) -> Self {
        let contents: Vec<Option<String>> = text.lines().map(|l| Some(l.trim_end().to_string())).collect();
        let n = contents.len();
        let mut catalog = Catalog::new();
        catalog.set_kind(LINE, (0..n).collect());
        catalog.set_kind(INTER_LINE, (0..=n).collect());
        Self {
            filename: filename.into(),
            contents,
            catalog,
        }
    }

    /// Read `root/filename`
    ///
    /// # Errors
    /// Returns [`ParseError::Io`] if the file cannot be read.
    pub fn load(root: &Path, filename: &str) -> Result<Self, ParseError> {
        let path = root.join(filename);
        let text = std::fs::read_to_string(&path).map_err(|e| ParseError::io_error(&path, e))?;
        Ok(Self::parse(filename, &text))
    }

    /// Current content of a `line` point (`None` once deleted)
    #[must_use]
    pub fn line(&self, index: usize) -> Option<&str> {
        let slot = *self.catalog.get(LINE, index)?;
        self.contents.get(slot)?.as_deref()
    }

    fn slot(&self, location: &Location, kind: &'static str, operation: &'static str) -> Result<usize, ModelError> {
        if location.file != self.filename {
            return Err(ModelError::WrongFile {
                location: location.clone(),
                file: self.filename.clone(),
            });
        }
        if location.kind != kind {
            return Err(ModelError::WrongKind {
                location: location.clone(),
                operation,
            });
        }
        location
            .index
            .pos()
            .and_then(|i| self.catalog.get(kind, i).copied())
            .ok_or_else(|| ModelError::UnknownLocation(location.clone()))
    }

    /// Replace the target line with the ingredient line read from `reference`
    ///
    /// # Errors
    /// Returns [`ModelError`] on foreign or malformed locations.
    pub fn do_replace(
        &mut self,
        reference: &Self,
        target: &Location,
        ingredient: &Location,
    ) -> Result<bool, ModelError> {
        let slot = self.slot(target, LINE, "do_replace")?;
        let source = reference.slot(ingredient, LINE, "do_replace")?;
        let Some(new_line) = reference.contents.get(source).cloned().flatten() else {
            return Ok(false);
        };
        let current = &mut self.contents[slot];
        if current.as_deref() == Some(new_line.as_str()) {
            return Ok(false);
        }
        *current = Some(new_line);
        Ok(true)
    }

    /// Insert the ingredient line at an `_inter_line` point
    ///
    /// # Errors
    /// Returns [`ModelError`] on foreign or malformed locations.
    pub fn do_insert(
        &mut self,
        reference: &Self,
        target: &Location,
        ingredient: &Location,
    ) -> Result<bool, ModelError> {
        let at = self.slot(target, INTER_LINE, "do_insert")?;
        let source = reference.slot(ingredient, LINE, "do_insert")?;
        let Some(d_i) = target.index.pos() else {
            return Err(ModelError::UnknownLocation(target.clone()));
        };
        let new_line = reference.contents.get(source).cloned().flatten();
        self.contents.insert(at, new_line);
        for kind in [LINE, INTER_LINE] {
            if let Some(points) = self.catalog.kind_mut(kind) {
                for slot in points.iter_mut().skip(d_i) {
                    *slot += 1;
                }
            }
        }
        Ok(true)
    }

    /// Delete the target line
    ///
    /// # Errors
    /// Returns [`ModelError`] on foreign or malformed locations.
    pub fn do_delete(&mut self, target: &Location) -> Result<bool, ModelError> {
        let slot = self.slot(target, LINE, "do_delete")?;
        Ok(self.contents[slot].take().is_some())
    }
}

impl MutationModel for LineModel {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn dump(&self) -> String {
        let mut out = String::new();
        for line in self.contents.iter().flatten() {
            out.push_str(line);
            out.push('\n');
        }
        out
    }

    fn kinds(&self) -> Vec<String> {
        self.catalog.kinds().map(ToString::to_string).collect()
    }

    fn locations(&self, kind: &str) -> Vec<Location> {
        (0..self.catalog.len(kind))
            .map(|i| Location::new(&self.filename, kind, i))
            .collect()
    }

    fn random_target<R: Rng + ?Sized>(&self, kind: Option<&str>, rng: &mut R) -> Option<Location> {
        let (kind, index) = self.catalog.random_index(kind, rng)?;
        Some(Location::new(&self.filename, kind, index))
    }

    fn show_location(&self, location: &Location) -> String {
        let Some(i) = location.index.pos() else {
            return "(unsupported location)".to_string();
        };
        let show = |slot: Option<&usize>| match slot.and_then(|s| self.contents.get(*s)) {
            Some(Some(line)) => line.clone(),
            _ => "<deleted>".to_string(),
        };
        match location.kind.as_str() {
            LINE => format!("{i}:{}", show(self.catalog.get(LINE, i))),
            INTER_LINE if i == 0 => "0=before initial line".to_string(),
            INTER_LINE => format!("{i}=after:{}", show(self.catalog.get(LINE, i - 1))),
            _ => "(unsupported location)".to_string(),
        }
    }
}

impl LineModel {
    /// Whether a location belongs to this model's catalog
    #[must_use]
    pub fn contains(&self, location: &Location) -> bool {
        location.file == self.filename
            && matches!(&location.index, LocIndex::Pos(i) if *i < self.catalog.len(&location.kind))
    }
}
