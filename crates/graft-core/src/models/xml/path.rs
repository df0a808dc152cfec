//! Node paths for addressing within XML trees
//!
//! Provides [`NodePath`], an xpath-like address made of `(tag, nth)` steps
//! relative to the document root.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// One step: the `nth` (1-based) child carrying `tag`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Step {
    pub tag: String,
    pub nth: usize,
}

impl Step {
    /// Create a step
    #[inline]
    #[must_use]
    pub fn new(tag: impl Into<String>, nth: usize) -> Self {
        Self {
            tag: tag.into(),
            nth,
        }
    }
}

/// Path within an XML tree
///
/// # Examples
/// - `[]` → `.` (document root)
/// - `[block[1], stmt[2]]` → `./block[1]/stmt[2]`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct NodePath(Vec<Step>);

impl NodePath {
    /// Create path from steps
    #[inline]
    #[must_use]
    pub fn new(steps: Vec<Step>) -> Self {
        Self(steps)
    }

    /// Empty path (document root)
    #[inline]
    #[must_use]
    pub fn root() -> Self {
        Self(Vec::new())
    }

    /// Get path steps
    #[inline]
    #[must_use]
    pub fn steps(&self) -> &[Step] {
        &self.0
    }

    /// Get number of steps
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if path is the root
    #[inline]
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Get parent path (if not root)
    #[inline]
    #[must_use]
    pub fn parent(&self) -> Option<Self> {
        self.0.split_last().map(|(_, rest)| Self(rest.to_vec()))
    }

    /// Get last step (if not root)
    #[inline]
    #[must_use]
    pub fn last(&self) -> Option<&Step> {
        self.0.last()
    }

    /// Append a step, returning new path
    #[inline]
    #[must_use]
    pub fn child(&self, tag: impl Into<String>, nth: usize) -> Self {
        let mut new = self.clone();
        new.0.push(Step::new(tag, nth));
        new
    }

    /// Check if this path is a prefix of another
    #[inline]
    #[must_use]
    pub fn is_prefix_of(&self, other: &Self) -> bool {
        self.0.len() <= other.0.len() && self.0 == other.0[..self.0.len()]
    }

    /// Check if this path is an ancestor of another (strict prefix)
    #[inline]
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        self.0.len() < other.0.len() && self.is_prefix_of(other)
    }

    /// Step directly below `parent`, if this path goes through it
    #[must_use]
    pub fn step_below(&self, parent: &Self) -> Option<&Step> {
        if parent.is_ancestor_of(self) {
            self.0.get(parent.len())
        } else {
            None
        }
    }

    /// Mutable step directly below `parent`, if this path goes through it
    pub fn step_below_mut(&mut self, parent: &Self) -> Option<&mut Step> {
        if parent.is_ancestor_of(self) {
            self.0.get_mut(parent.len())
        } else {
            None
        }
    }
}

impl Display for NodePath {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(".")?;
        for step in &self.0 {
            write!(f, "/{}[{}]", step.tag, step.nth)?;
        }
        Ok(())
    }
}

impl FromStr for NodePath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s
            .strip_prefix('.')
            .ok_or_else(|| PathError::Malformed(s.to_string()))?;
        if rest.is_empty() {
            return Ok(Self::root());
        }
        let rest = rest
            .strip_prefix('/')
            .ok_or_else(|| PathError::Malformed(s.to_string()))?;
        let steps = rest
            .split('/')
            .map(|seg| {
                let (tag, nth) = seg
                    .strip_suffix(']')
                    .and_then(|seg| seg.split_once('['))
                    .ok_or_else(|| PathError::InvalidStep(seg.to_string()))?;
                if tag.is_empty() {
                    return Err(PathError::InvalidStep(seg.to_string()));
                }
                let nth = nth
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| PathError::InvalidStep(seg.to_string()))?;
                Ok(Step::new(tag, nth))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self(steps))
    }
}

/// Path parsing errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum PathError {
    #[error("malformed node path: {0}")]
    Malformed(String),

    #[error("invalid path step: {0}")]
    InvalidStep(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse() {
        let path = NodePath::root().child("block", 1).child("stmt", 2);
        assert_eq!(path.to_string(), "./block[1]/stmt[2]");
        assert_eq!(path.to_string().parse::<NodePath>().unwrap(), path);
        assert_eq!(".".parse::<NodePath>().unwrap(), NodePath::root());
    }

    #[test]
    fn rejects_bad_steps() {
        assert!("block[1]".parse::<NodePath>().is_err());
        assert!("./block".parse::<NodePath>().is_err());
        assert!("./block[0]".parse::<NodePath>().is_err());
    }

    #[test]
    fn ancestry() {
        let a = NodePath::root().child("block", 1);
        let b = a.child("stmt", 3);
        assert!(a.is_ancestor_of(&b));
        assert!(!b.is_ancestor_of(&a));
        assert!(a.is_prefix_of(&a));
        assert!(!a.is_ancestor_of(&a));
        assert_eq!(b.step_below(&a), Some(&Step::new("stmt", 3)));
        assert_eq!(b.step_below(&NodePath::root()), Some(&Step::new("block", 1)));
        assert_eq!(b.parent(), Some(a));
    }
}
