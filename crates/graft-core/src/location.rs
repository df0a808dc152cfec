//! Location descriptors and per-model location catalogs
//!
//! A [`Location`] is the `(file, kind, index)` triple an edit targets.
//! A [`Catalog`] maps every location kind of one parsed file to the
//! ordered list of addressable points for that kind.

use crate::error::ParseError;
use crate::literal::{self, Value};
use indexmap::IndexMap;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Prefix for insertion-point kinds (`_inter_line`, `_inter_block`, ...)
pub const INTER_PREFIX: &str = "_inter_";

/// Index part of a location
///
/// Most models address points by position; parameter models address
/// them by parameter name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LocIndex {
    Pos(usize),
    Key(String),
}

impl LocIndex {
    /// Position, if positional
    #[inline]
    #[must_use]
    pub fn pos(&self) -> Option<usize> {
        match self {
            Self::Pos(i) => Some(*i),
            Self::Key(_) => None,
        }
    }

    /// Key, if keyed
    #[inline]
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match self {
            Self::Pos(_) => None,
            Self::Key(k) => Some(k),
        }
    }
}

impl Display for LocIndex {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pos(i) => write!(f, "{i}"),
            Self::Key(k) => f.write_str(&literal::quote(k)),
        }
    }
}

/// Address of one modification point
///
/// Not stable across mutation: models repair catalog entries in place
/// so that the same `(kind, index)` keeps naming the same logical point.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Location {
    pub file: String,
    pub kind: String,
    pub index: LocIndex,
}

impl Location {
    /// Positional location
    #[inline]
    #[must_use]
    pub fn new(file: impl Into<String>, kind: impl Into<String>, index: usize) -> Self {
        Self {
            file: file.into(),
            kind: kind.into(),
            index: LocIndex::Pos(index),
        }
    }

    /// Keyed location
    #[inline]
    #[must_use]
    pub fn keyed(file: impl Into<String>, kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            kind: kind.into(),
            index: LocIndex::Key(key.into()),
        }
    }

    /// True for insertion-point kinds
    #[inline]
    #[must_use]
    pub fn is_insertion_point(&self) -> bool {
        self.kind.starts_with(INTER_PREFIX)
    }

    /// Literal form used inside canonical edit strings
    #[must_use]
    pub fn to_value(&self) -> Value {
        let index = match &self.index {
            LocIndex::Pos(i) => Value::Int(i64::try_from(*i).unwrap_or(i64::MAX)),
            LocIndex::Key(k) => Value::Str(k.clone()),
        };
        Value::Tuple(vec![
            Value::Str(self.file.clone()),
            Value::Str(self.kind.clone()),
            index,
        ])
    }

    /// Rebuild from a literal `('file', 'kind', index)` tuple
    ///
    /// # Errors
    /// Returns error if the value is not a 3-tuple of the right shape.
    pub fn from_value(value: &Value) -> Result<Self, ParseError> {
        let bad = || ParseError::BadEdit(format!("not a location: {value}"));
        let items = value.as_tuple().ok_or_else(bad)?;
        let [file, kind, index] = items else {
            return Err(bad());
        };
        let file = file.as_str().ok_or_else(bad)?;
        let kind = kind.as_str().ok_or_else(bad)?;
        let index = match index {
            Value::Int(i) => LocIndex::Pos(usize::try_from(*i).map_err(|_| bad())?),
            Value::Str(k) => LocIndex::Key(k.clone()),
            _ => return Err(bad()),
        };
        Ok(Self {
            file: file.to_string(),
            kind: kind.to_string(),
            index,
        })
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {}, {})",
            literal::quote(&self.file),
            literal::quote(&self.kind),
            self.index
        )
    }
}

impl FromStr for Location {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_value(&literal::parse_value(s)?)
    }
}

/// Ordered lists of addressable points, keyed by location kind
///
/// `T` is whatever the model needs to resolve a point: a content slot for
/// the line model, a node path for tree models, a key for parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog<T> {
    kinds: IndexMap<String, Vec<T>>,
    weights: HashMap<String, Vec<f64>>,
}

impl<T> Default for Catalog<T> {
    fn default() -> Self {
        Self {
            kinds: IndexMap::new(),
            weights: HashMap::new(),
        }
    }
}

impl<T> Catalog<T> {
    /// Empty catalog
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a point to a kind, creating the kind if needed
    pub fn push(&mut self, kind: &str, point: T) {
        if let Some(points) = self.kinds.get_mut(kind) {
            points.push(point);
        } else {
            self.kinds.insert(kind.to_string(), vec![point]);
        }
    }

    /// Replace the whole point list of a kind
    pub fn set_kind(&mut self, kind: impl Into<String>, points: Vec<T>) {
        self.kinds.insert(kind.into(), points);
    }

    /// Attach selection weights to a kind (one weight per point)
    pub fn set_weights(&mut self, kind: impl Into<String>, weights: Vec<f64>) {
        self.weights.insert(kind.into(), weights);
    }

    /// Kinds in catalog order
    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.kinds.keys().map(String::as_str)
    }

    /// Points of one kind
    #[must_use]
    pub fn points(&self, kind: &str) -> Option<&[T]> {
        self.kinds.get(kind).map(Vec::as_slice)
    }

    /// Point at `(kind, index)`
    #[must_use]
    pub fn get(&self, kind: &str, index: usize) -> Option<&T> {
        self.kinds.get(kind).and_then(|points| points.get(index))
    }

    /// Mutable point at `(kind, index)`
    pub fn get_mut(&mut self, kind: &str, index: usize) -> Option<&mut T> {
        self.kinds.get_mut(kind).and_then(|points| points.get_mut(index))
    }

    /// Number of points of one kind
    #[must_use]
    pub fn len(&self, kind: &str) -> usize {
        self.kinds.get(kind).map_or(0, Vec::len)
    }

    /// True when no kind holds any point
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.kinds.values().all(Vec::is_empty)
    }

    /// Iterate mutably over every point of every kind
    pub fn points_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.kinds.values_mut().flatten()
    }

    /// Iterate mutably over the points of one kind
    pub fn kind_mut(&mut self, kind: &str) -> Option<&mut Vec<T>> {
        self.kinds.get_mut(kind)
    }

    /// Pick a kind (uniformly if `kind` is `None`) and an index within it
    ///
    /// Uses cumulative-weight selection when the kind carries weights,
    /// otherwise a uniform draw. Returns `None` when nothing is addressable.
    pub fn random_index<R: Rng + ?Sized>(
        &self,
        kind: Option<&str>,
        rng: &mut R,
    ) -> Option<(String, usize)> {
        let kind = match kind {
            Some(k) => k.to_string(),
            None => {
                let kinds: Vec<&String> = self.kinds.keys().collect();
                (*kinds.choose(rng)?).clone()
            }
        };
        let n = self.len(&kind);
        if n == 0 {
            return None;
        }
        if let Some(weights) = self.weights.get(&kind) {
            let total: f64 = weights.iter().sum();
            if total <= 0.0 {
                return None;
            }
            let mut r = rng.gen_range(0.0..total);
            for (i, w) in weights.iter().enumerate() {
                if r < *w {
                    return Some((kind, i));
                }
                r -= w;
            }
            return Some((kind, weights.len() - 1));
        }
        Some((kind, rng.gen_range(0..n)))
    }
}
