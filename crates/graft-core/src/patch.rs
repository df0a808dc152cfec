//! Patches: ordered edit sequences
//!
//! Equality and hashing follow the edit list, so two patches holding the
//! same edits in a different order are different patches even when they
//! produce the same variant.

use crate::edit::Edit;
use crate::error::ParseError;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Separator between edits in the canonical string form
pub const SEPARATOR: &str = " | ";

/// Ordered list of edits
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Patch {
    pub edits: Vec<Edit>,
}

impl Patch {
    /// Empty patch
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of edits
    #[must_use]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    /// True for the empty patch
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }

    /// Copy of this patch with one more edit at the end
    #[must_use]
    pub fn with(&self, edit: Edit) -> Self {
        let mut edits = self.edits.clone();
        edits.push(edit);
        Self { edits }
    }

    /// Copy of this patch without the edit at `index`
    #[must_use]
    pub fn without(&self, index: usize) -> Self {
        let mut edits = self.edits.clone();
        if index < edits.len() {
            edits.remove(index);
        }
        Self { edits }
    }

    /// Read a patch file
    ///
    /// # Errors
    /// Returns [`ParseError`] if the file is unreadable or malformed.
    pub fn load(path: &std::path::Path) -> Result<Self, ParseError> {
        let text = std::fs::read_to_string(path).map_err(|e| ParseError::io_error(path, e))?;
        text.parse()
    }
}

impl From<Vec<Edit>> for Patch {
    fn from(edits: Vec<Edit>) -> Self {
        Self { edits }
    }
}

impl Display for Patch {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        for (i, edit) in self.edits.iter().enumerate() {
            if i > 0 {
                f.write_str(SEPARATOR)?;
            }
            write!(f, "{edit}")?;
        }
        Ok(())
    }
}

impl FromStr for Patch {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Self::new());
        }
        split_edits(s)
            .into_iter()
            .map(str::parse)
            .collect::<Result<Vec<Edit>, _>>()
            .map(Self::from)
    }
}

/// Split on `|` outside quoted literals and brackets
fn split_edits(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;
    for (i, c) in s.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '\'' | '"' => quote = Some(c),
            '(' | '<' => depth += 1,
            ')' | '>' => depth -= 1,
            '|' if depth <= 0 => {
                parts.push(s[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(s[start..].trim());
    parts
}
