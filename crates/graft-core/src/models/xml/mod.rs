//! XML tree model
//!
//! A target file holding an XML document (typically srcML output) is
//! parsed into an [`Element`] tree. Each tag becomes a location kind
//! whose points are [`NodePath`]s in document order, and each parent of
//! an internode tag contributes `_inter_<tag>` insertion points, one per
//! gap between its children.
//!
//! Mutations repair catalog paths in place:
//! - an insertion shifts later same-tag siblings and later gaps of the parent
//! - a replacement renumbers siblings when the tag changes
//! - points strictly inside a replaced or deleted subtree become
//!   [`XmlPoint::Deleted`]

pub mod path;
pub mod srcml;
pub mod tree;

pub use path::{NodePath, PathError, Step};
pub use tree::{parse_document, Element};

use super::MutationModel;
use crate::error::{ModelError, ParseError};
use crate::location::{Catalog, Location, INTER_PREFIX};
use crate::scenario::SrcmlSection;
use rand::Rng;
use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::path::Path;

const INSERTION_MARK: &str = "(INSERTION POINT)";

/// Addressable point of an XML catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum XmlPoint {
    /// An element
    Node(NodePath),
    /// The gap before child `index` of `parent`
    Gap { parent: NodePath, index: usize },
    /// Anchor removed by an earlier mutation; never resolves again
    Deleted,
}

impl XmlPoint {
    fn path_mut(&mut self) -> Option<&mut NodePath> {
        match self {
            Self::Node(path) | Self::Gap { parent: path, .. } => Some(path),
            Self::Deleted => None,
        }
    }
}

impl Display for XmlPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node(path) => write!(f, "{path}"),
            Self::Gap { parent, index } => write!(f, "{parent}><{index}"),
            Self::Deleted => f.write_str("deleted"),
        }
    }
}

/// Which preprocessing produced the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XmlFlavour {
    Plain,
    Srcml,
}

/// XML model of one target file
#[derive(Debug, Clone, PartialEq)]
pub struct XmlModel {
    filename: String,
    renamed_filename: String,
    flavour: XmlFlavour,
    root: Element,
    catalog: Catalog<XmlPoint>,
}

impl XmlModel {
    /// Build from an already preprocessed tree
    ///
    /// `internodes` restricts which tags get insertion points; empty means
    /// every tag with children.
    #[must_use]
    pub fn from_tree(
        filename: impl Into<String>,
        renamed_filename: impl Into<String>,
        flavour: XmlFlavour,
        root: Element,
        internodes: &[String],
    ) -> Self {
        let mut catalog = Catalog::new();
        build_catalog(&mut catalog, &NodePath::root(), &root, internodes);
        Self {
            filename: filename.into(),
            renamed_filename: renamed_filename.into(),
            flavour,
            root,
            catalog,
        }
    }

    /// Parse a plain XML document
    ///
    /// # Errors
    /// Returns [`ParseError::Syntax`] on malformed XML.
    pub fn parse(filename: &str, text: &str) -> Result<Self, ParseError> {
        let root = parse_document(text, filename)?;
        Ok(Self::from_tree(filename, filename, XmlFlavour::Plain, root, &[]))
    }

    /// Parse a srcML document and apply the `[srcml]` preprocessing
    ///
    /// # Errors
    /// Returns [`ParseError`] on malformed XML or rename rules.
    pub fn parse_srcml(filename: &str, text: &str, options: &SrcmlSection) -> Result<Self, ParseError> {
        let mut root = parse_document(text, filename)?;
        srcml::preprocess(&mut root, options)?;
        let renamed = filename.split(".xml").next().unwrap_or(filename);
        Ok(Self::from_tree(
            filename,
            renamed,
            XmlFlavour::Srcml,
            root,
            &options.internodes,
        ))
    }

    /// Read and parse `root/filename`
    ///
    /// # Errors
    /// Returns [`ParseError`] if the file is unreadable or malformed.
    pub fn load(root: &Path, filename: &str, srcml: Option<&SrcmlSection>) -> Result<Self, ParseError> {
        let path = root.join(filename);
        let text = std::fs::read_to_string(&path).map_err(|e| ParseError::io_error(&path, e))?;
        match srcml {
            Some(options) => Self::parse_srcml(filename, &text, options),
            None => Self::parse(filename, &text),
        }
    }

    /// Preprocessing flavour
    #[must_use]
    pub fn flavour(&self) -> XmlFlavour {
        self.flavour
    }

    /// Document root
    #[must_use]
    pub fn root(&self) -> &Element {
        &self.root
    }

    /// Catalog point at `(kind, index)`
    #[must_use]
    pub fn point(&self, kind: &str, index: usize) -> Option<&XmlPoint> {
        self.catalog.get(kind, index)
    }

    fn lookup(&self, location: &Location) -> Result<&XmlPoint, ModelError> {
        if location.file != self.filename {
            return Err(ModelError::WrongFile {
                location: location.clone(),
                file: self.filename.clone(),
            });
        }
        location
            .index
            .pos()
            .and_then(|i| self.catalog.get(&location.kind, i))
            .ok_or_else(|| ModelError::UnknownLocation(location.clone()))
    }

    /// Node path at a location; `None` if the point was deleted
    fn node_at(&self, location: &Location, operation: &'static str) -> Result<Option<NodePath>, ModelError> {
        match self.lookup(location)? {
            XmlPoint::Node(path) => Ok(Some(path.clone())),
            XmlPoint::Deleted => Ok(None),
            XmlPoint::Gap { .. } => Err(ModelError::WrongKind {
                location: location.clone(),
                operation,
            }),
        }
    }

    fn gap_at(&self, location: &Location) -> Result<Option<(NodePath, usize)>, ModelError> {
        match self.lookup(location)? {
            XmlPoint::Gap { parent, index } => Ok(Some((parent.clone(), *index))),
            XmlPoint::Deleted => Ok(None),
            XmlPoint::Node(_) => Err(ModelError::WrongKind {
                location: location.clone(),
                operation: "do_insert",
            }),
        }
    }

    /// Replace the target node with a copy of the ingredient node from `reference`
    ///
    /// The target keeps its tail; the copy is re-indented to the target's
    /// indentation.
    ///
    /// # Errors
    /// Returns [`ModelError`] on foreign or malformed locations.
    pub fn do_replace(
        &mut self,
        reference: &Self,
        target: &Location,
        ingredient: &Location,
    ) -> Result<bool, ModelError> {
        let Some(target_path) = self.node_at(target, "do_replace")? else {
            return Ok(false);
        };
        let Some(ingredient_path) = reference.node_at(ingredient, "do_replace")? else {
            return Ok(false);
        };
        let Some(source) = reference.root.find(&ingredient_path) else {
            return Ok(false);
        };
        let (Some(parent_path), Some(old_step)) = (target_path.parent(), target_path.last().cloned()) else {
            return Ok(false);
        };
        let Some(parent) = self.root.find(&parent_path) else {
            return Ok(false);
        };
        let Some(position) = parent.child_position(&old_step.tag, old_step.nth) else {
            return Ok(false);
        };
        if parent.children[position].to_xml(false) == source.to_xml(false) {
            return Ok(false);
        }
        let new_nth = 1 + parent.children[..position]
            .iter()
            .filter(|c| c.tag == source.tag)
            .count();
        let indent_target = self.root.find_indent(&target_path).unwrap_or_default();
        let indent_source = reference.root.find_indent(&ingredient_path).unwrap_or_default();

        let Some(node) = self.root.find_mut(&target_path) else {
            return Ok(false);
        };
        let tail = node.tail.take();
        *node = source.clone();
        node.tail = tail;
        node.replace_indent(&indent_target, &indent_source);

        let new_step = Step::new(source.tag.clone(), new_nth);
        let renamed = parent_path.child(new_step.tag.clone(), new_step.nth);
        for point in self.catalog.points_mut() {
            if inside(point, &target_path) {
                *point = XmlPoint::Deleted;
                continue;
            }
            if matches!(point, XmlPoint::Node(p) if *p == target_path) {
                *point = XmlPoint::Node(renamed.clone());
                continue;
            }
            if new_step.tag == old_step.tag {
                continue;
            }
            if let Some(step) = point.path_mut().and_then(|p| p.step_below_mut(&parent_path)) {
                if step.tag == old_step.tag && step.nth > old_step.nth {
                    step.nth -= 1;
                } else if step.tag == new_step.tag && step.nth >= new_step.nth {
                    step.nth += 1;
                }
            }
        }
        Ok(true)
    }

    /// Insert a copy of the ingredient node from `reference` at a gap
    ///
    /// # Errors
    /// Returns [`ModelError`] on foreign or malformed locations.
    pub fn do_insert(
        &mut self,
        reference: &Self,
        target: &Location,
        ingredient: &Location,
    ) -> Result<bool, ModelError> {
        let Some((parent_path, index)) = self.gap_at(target)? else {
            return Ok(false);
        };
        let Some(ingredient_path) = reference.node_at(ingredient, "do_insert")? else {
            return Ok(false);
        };
        let Some(source) = reference.root.find(&ingredient_path) else {
            return Ok(false);
        };
        let Some(parent) = self.root.find(&parent_path) else {
            return Ok(false);
        };
        let indent_target = match parent.children.first() {
            Some(first) => self
                .root
                .find_indent(&parent_path.child(first.tag.clone(), 1))
                .unwrap_or_default(),
            None => "  ".to_string(),
        };
        let indent_source = reference.root.find_indent(&ingredient_path).unwrap_or_default();
        let at = index.min(parent.children.len());
        let nth = 1 + parent.children[..at]
            .iter()
            .filter(|c| c.tag == source.tag)
            .count();

        let mut node = source.clone();
        let Some(parent) = self.root.find_mut(&parent_path) else {
            return Ok(false);
        };
        if at == 0 {
            node.tail = Some(format!("\n{indent_target}"));
        } else {
            let previous = &mut parent.children[at - 1];
            node.tail = previous.tail.take();
            previous.tail = Some(format!("\n{indent_target}"));
        }
        node.replace_indent(&indent_target, &indent_source);
        parent.children.insert(at, node);

        for point in self.catalog.points_mut() {
            if let XmlPoint::Gap { parent, index } = point {
                if *parent == parent_path && *index >= at {
                    *index += 1;
                    continue;
                }
            }
            if let Some(step) = point.path_mut().and_then(|p| p.step_below_mut(&parent_path)) {
                if step.tag == source.tag && step.nth >= nth {
                    step.nth += 1;
                }
            }
        }
        Ok(true)
    }

    /// Empty the target node, keeping its tag and tail
    ///
    /// # Errors
    /// Returns [`ModelError`] on foreign or malformed locations.
    pub fn do_delete(&mut self, target: &Location) -> Result<bool, ModelError> {
        let Some(target_path) = self.node_at(target, "do_delete")? else {
            return Ok(false);
        };
        let Some(node) = self.root.find_mut(&target_path) else {
            return Ok(false);
        };
        if node.children.is_empty() && node.text.is_none() {
            return Ok(false);
        }
        node.children.clear();
        node.attrs.clear();
        node.text = None;
        for point in self.catalog.points_mut() {
            if inside(point, &target_path) {
                *point = XmlPoint::Deleted;
            }
        }
        Ok(true)
    }

    /// Set the text of the target node
    ///
    /// # Errors
    /// Returns [`ModelError`] on foreign or malformed locations.
    pub fn do_set_text(&mut self, target: &Location, value: &str) -> Result<bool, ModelError> {
        let Some(target_path) = self.node_at(target, "do_set_text")? else {
            return Ok(false);
        };
        let Some(node) = self.root.find_mut(&target_path) else {
            return Ok(false);
        };
        if node.text.as_deref() == Some(value) {
            return Ok(false);
        }
        node.text = Some(value.to_string());
        Ok(true)
    }

    /// Surround the text of the target node with `prefix` and `suffix`
    ///
    /// # Errors
    /// Returns [`ModelError`] on foreign or malformed locations.
    pub fn do_wrap_text(&mut self, target: &Location, prefix: &str, suffix: &str) -> Result<bool, ModelError> {
        let Some(target_path) = self.node_at(target, "do_wrap_text")? else {
            return Ok(false);
        };
        let Some(node) = self.root.find_mut(&target_path) else {
            return Ok(false);
        };
        let text = node.text.take().unwrap_or_default();
        node.text = Some(format!("{prefix}{text}{suffix}"));
        Ok(true)
    }

    fn show_gap(&self, parent_path: &NodePath, index: usize) -> Option<String> {
        let mut parent = self.root.find(parent_path)?.clone();
        let indent = self.root.find_indent(parent_path).unwrap_or_default();
        if index == 0 {
            let text = parent.text.take().unwrap_or_default();
            parent.text = Some(format!("{text}\n{INSERTION_MARK}\n{indent}"));
        } else {
            let child = parent.children.get(index - 1)?;
            let nth = parent.children[..index]
                .iter()
                .filter(|c| c.tag == child.tag)
                .count();
            let child_indent = self
                .root
                .find_indent(&parent_path.child(child.tag.clone(), nth))
                .unwrap_or_default();
            let child = &mut parent.children[index - 1];
            let tail = child.tail.take().unwrap_or_default();
            child.tail = Some(format!("\n{child_indent}{INSERTION_MARK}{tail}"));
        }
        Some(format!("{indent}{}", parent.to_xml(true)))
    }
}

/// True if the point's anchor lies strictly inside the subtree at `path`
fn inside(point: &XmlPoint, path: &NodePath) -> bool {
    match point {
        XmlPoint::Node(p) => path.is_ancestor_of(p),
        XmlPoint::Gap { parent, .. } => path.is_prefix_of(parent),
        XmlPoint::Deleted => false,
    }
}

fn build_catalog(catalog: &mut Catalog<XmlPoint>, prefix: &NodePath, element: &Element, internodes: &[String]) {
    let is_internode = internodes.is_empty() || internodes.iter().any(|t| *t == element.tag);
    if is_internode && !element.children.is_empty() {
        let kind = format!("{INTER_PREFIX}{}", element.tag);
        for index in 0..=element.children.len() {
            catalog.push(
                &kind,
                XmlPoint::Gap {
                    parent: prefix.clone(),
                    index,
                },
            );
        }
    }
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for child in &element.children {
        let nth = counts.entry(child.tag.as_str()).or_insert(0);
        *nth += 1;
        let path = prefix.child(child.tag.clone(), *nth);
        catalog.push(&child.tag, XmlPoint::Node(path.clone()));
        build_catalog(catalog, &path, child, internodes);
    }
}

impl MutationModel for XmlModel {
    fn filename(&self) -> &str {
        &self.filename
    }

    fn renamed_filename(&self) -> &str {
        &self.renamed_filename
    }

    fn dump(&self) -> String {
        self.root.itertext()
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
        let Some(point) = self.catalog.get(&location.kind, i) else {
            return "(unknown location)".to_string();
        };
        let body = match point {
            XmlPoint::Node(path) => self.root.find(path).map(|node| {
                let indent = self.root.find_indent(path).unwrap_or_default();
                format!("{indent}{}", node.to_xml(false))
            }),
            XmlPoint::Gap { parent, index } => self.show_gap(parent, *index),
            XmlPoint::Deleted => None,
        };
        format!("# {i}: {point}\n{}", body.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const DOC: &str = "<unit><block>{\n  <stmt>a;</stmt>\n  <stmt>b;</stmt>\n  <expr>c</expr>\n}</block></unit>";

    fn model() -> XmlModel {
        XmlModel::parse("t.xml", DOC).unwrap()
    }

    fn loc(kind: &str, i: usize) -> Location {
        Location::new("t.xml", kind, i)
    }

    #[test]
    fn catalog_layout() {
        let m = model();
        assert_eq!(m.kinds(), vec!["_inter_unit", "block", "_inter_block", "stmt", "expr"]);
        assert_eq!(
            m.point("stmt", 1),
            Some(&XmlPoint::Node("./block[1]/stmt[2]".parse().unwrap()))
        );
        assert_eq!(m.point("_inter_block", 3).unwrap().to_string(), "./block[1]><3");
        assert_eq!(m.dump(), "{\n  a;\n  b;\n  c\n}");
    }

    #[test]
    fn delete_twice() {
        let mut m = model();
        assert!(m.do_delete(&loc("stmt", 0)).unwrap());
        assert!(!m.do_delete(&loc("stmt", 0)).unwrap());
        assert_eq!(m.dump(), "{\n  \n  b;\n  c\n}");
    }

    #[test]
    fn replace_same_node_is_noop() {
        let reference = model();
        let mut m = model();
        assert!(!m.do_replace(&reference, &loc("stmt", 0), &loc("stmt", 0)).unwrap());
        assert!(m.do_replace(&reference, &loc("stmt", 0), &loc("stmt", 1)).unwrap());
        assert_eq!(m.dump(), "{\n  b;\n  b;\n  c\n}");
    }

    #[test]
    fn insert_shifts_siblings_and_gaps() {
        let reference = model();
        let mut m = model();
        assert!(m.do_insert(&reference, &loc("_inter_block", 1), &loc("stmt", 1)).unwrap());
        assert_eq!(m.dump(), "{\n  a;\n  b;\n  b;\n  c\n}");
        assert_eq!(
            m.point("stmt", 1),
            Some(&XmlPoint::Node("./block[1]/stmt[3]".parse().unwrap()))
        );
        assert_eq!(m.point("_inter_block", 1).unwrap().to_string(), "./block[1]><2");
        assert_eq!(m.point("_inter_block", 0).unwrap().to_string(), "./block[1]><0");
        // stmt[2] now names the inserted node; the catalog still names "b;" at index 1
        let path = match m.point("stmt", 1).unwrap() {
            XmlPoint::Node(p) => p.clone(),
            other => panic!("unexpected {other}"),
        };
        assert_eq!(m.root().find(&path).unwrap().itertext(), "b;");
    }

    #[test]
    fn replace_with_other_tag_renumbers() {
        let reference = model();
        let mut m = model();
        // turn the first stmt into an expr
        assert!(m.do_replace(&reference, &loc("stmt", 0), &loc("expr", 0)).unwrap());
        assert_eq!(m.dump(), "{\n  c\n  b;\n  c\n}");
        assert_eq!(m.point("stmt", 0).unwrap().to_string(), "./block[1]/expr[1]");
        assert_eq!(m.point("stmt", 1).unwrap().to_string(), "./block[1]/stmt[1]");
        assert_eq!(m.point("expr", 0).unwrap().to_string(), "./block[1]/expr[2]");
        assert_eq!(m.root().find(&"./block[1]/expr[2]".parse().unwrap()).unwrap().itertext(), "c");
    }

    #[test]
    fn replace_marks_inner_points_deleted() {
        let reference = model();
        let mut m = model();
        assert!(m.do_replace(&reference, &loc("block", 0), &loc("stmt", 0)).unwrap());
        assert_eq!(m.point("stmt", 0), Some(&XmlPoint::Deleted));
        assert_eq!(m.point("_inter_block", 0), Some(&XmlPoint::Deleted));
        assert_eq!(m.point("block", 0).unwrap().to_string(), "./stmt[1]");
        assert!(!m.do_delete(&loc("stmt", 1)).unwrap());
        assert_eq!(m.dump(), "a;");
    }

    #[test]
    fn text_edits() {
        let mut m = model();
        assert!(m.do_set_text(&loc("expr", 0), "d").unwrap());
        assert!(!m.do_set_text(&loc("expr", 0), "d").unwrap());
        assert!(m.do_wrap_text(&loc("expr", 0), "(", "+1)").unwrap());
        assert_eq!(m.dump(), "{\n  a;\n  b;\n  (d+1)\n}");
    }

    #[test]
    fn gap_used_as_node_is_error() {
        let mut m = model();
        assert!(m.do_delete(&loc("_inter_block", 0)).is_err());
        assert!(m.do_delete(&Location::new("other.xml", "stmt", 0)).is_err());
    }

    #[test]
    fn show_location_marks_gap() {
        let m = model();
        let shown = m.show_location(&loc("_inter_block", 1));
        assert!(shown.starts_with("# 1: ./block[1]><1\n"));
        assert!(shown.contains(INSERTION_MARK));
        assert_eq!(m.show_location(&loc("stmt", 0)), "# 0: ./block[1]/stmt[1]\n  <stmt>a;</stmt>");
    }
}
