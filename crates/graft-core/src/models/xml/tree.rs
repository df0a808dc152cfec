//! Format-preserving element tree
//!
//! Every element keeps the character data right after its start tag
//! (`text`) and right after its end tag (`tail`), so concatenating all
//! text in document order reproduces the source with markup stripped.

use super::path::NodePath;
use crate::error::ParseError;
use quick_xml::escape::escape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fmt::Write as _;

/// One XML element
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Element {
    pub tag: String,
    pub attrs: Vec<(String, String)>,
    pub text: Option<String>,
    pub tail: Option<String>,
    pub children: Vec<Element>,
}

impl Element {
    /// Element with a tag and nothing else
    #[must_use]
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    /// Attribute value by name
    #[must_use]
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Remove an attribute, returning its value
    pub fn remove_attr(&mut self, name: &str) -> Option<String> {
        let i = self.attrs.iter().position(|(k, _)| k == name)?;
        Some(self.attrs.remove(i).1)
    }

    /// Index among `children` of the `nth` (1-based) child tagged `tag`
    #[must_use]
    pub fn child_position(&self, tag: &str, nth: usize) -> Option<usize> {
        self.children
            .iter()
            .enumerate()
            .filter(|(_, c)| c.tag == tag)
            .nth(nth.checked_sub(1)?)
            .map(|(i, _)| i)
    }

    /// Resolve a path relative to this element
    #[must_use]
    pub fn find(&self, path: &NodePath) -> Option<&Self> {
        let mut node = self;
        for step in path.steps() {
            node = &node.children[node.child_position(&step.tag, step.nth)?];
        }
        Some(node)
    }

    /// Resolve a path relative to this element, mutably
    pub fn find_mut(&mut self, path: &NodePath) -> Option<&mut Self> {
        let mut node = self;
        for step in path.steps() {
            let i = node.child_position(&step.tag, step.nth)?;
            node = &mut node.children[i];
        }
        Some(node)
    }

    /// All text below this element in document order (own tail excluded)
    #[must_use]
    pub fn itertext(&self) -> String {
        let mut out = String::new();
        self.collect_text(&mut out);
        out
    }

    fn collect_text(&self, out: &mut String) {
        if let Some(text) = &self.text {
            out.push_str(text);
        }
        for child in &self.children {
            child.collect_text(out);
            if let Some(tail) = &child.tail {
                out.push_str(tail);
            }
        }
    }

    /// Serialize back to XML markup
    #[must_use]
    pub fn to_xml(&self, keep_tail: bool) -> String {
        let mut out = String::new();
        self.write_xml(&mut out, keep_tail);
        out
    }

    fn write_xml(&self, out: &mut String, keep_tail: bool) {
        out.push('<');
        out.push_str(&self.tag);
        for (k, v) in &self.attrs {
            let _ = write!(out, " {k}=\"{}\"", escape(v.as_str()));
        }
        if self.text.is_none() && self.children.is_empty() {
            out.push_str(" />");
        } else {
            out.push('>');
            if let Some(text) = &self.text {
                out.push_str(&escape(text.as_str()));
            }
            for child in &self.children {
                child.write_xml(out, true);
            }
            let _ = write!(out, "</{}>", self.tag);
        }
        if keep_tail {
            if let Some(tail) = &self.tail {
                out.push_str(&escape(tail.as_str()));
            }
        }
    }

    /// Rewrite `\n<from>` into `\n<to>` in this subtree (own tail excluded)
    pub fn replace_indent(&mut self, to: &str, from: &str) {
        if to == from {
            return;
        }
        let (from, to) = (format!("\n{from}"), format!("\n{to}"));
        self.replace_indent_inner(&to, &from, true);
    }

    fn replace_indent_inner(&mut self, to: &str, from: &str, first: bool) {
        if let Some(text) = &mut self.text {
            *text = text.replace(from, to);
        }
        if !first {
            if let Some(tail) = &mut self.tail {
                *tail = tail.replace(from, to);
            }
        }
        for child in &mut self.children {
            child.replace_indent_inner(to, from, false);
        }
    }

    /// Leading whitespace of the line on which the node at `path` starts
    ///
    /// Returns `None` if the path does not resolve.
    #[must_use]
    pub fn find_indent(&self, path: &NodePath) -> Option<String> {
        let Some(parent_path) = path.parent() else {
            return Some(String::new());
        };
        if parent_path.is_root() {
            return Some(String::new());
        }
        let step = path.last()?;
        let parent = self.find(&parent_path)?;
        let position = parent.child_position(&step.tag, step.nth)?;
        let lead = if position == 0 {
            parent.text.as_deref()
        } else {
            parent.children[position - 1].tail.as_deref()
        }
        .unwrap_or("");
        if let Some((_, last_line)) = lead.rsplit_once('\n') {
            return Some(leading_whitespace(last_line).to_string());
        }
        let combined = self.find_indent(&parent_path)? + lead;
        Some(leading_whitespace(&combined).to_string())
    }
}

fn leading_whitespace(s: &str) -> &str {
    let end = s
        .char_indices()
        .find(|(_, c)| !c.is_whitespace())
        .map_or(s.len(), |(i, _)| i);
    &s[..end]
}

/// Parse a document into its root element
///
/// Namespace declarations are dropped and prefixed tags `a:b` become `a_b`.
/// Comments, processing instructions and anything outside the root
/// element are discarded.
///
/// # Errors
/// Returns [`ParseError::Syntax`] on malformed XML.
pub fn parse_document(source: &str, origin: &str) -> Result<Element, ParseError> {
    let mut reader = Reader::from_str(source);
    reader.trim_text(false);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let syntax = |reader: &Reader<&[u8]>, message: String| {
        ParseError::syntax_error(origin, format!("{message} at byte {}", reader.buffer_position()))
    };

    loop {
        let event = reader
            .read_event()
            .map_err(|e| syntax(&reader, e.to_string()))?;
        match event {
            Event::Start(start) => {
                let element = open_element(&start).map_err(|e| syntax(&reader, e))?;
                stack.push(element);
            }
            Event::Empty(start) => {
                let element = open_element(&start).map_err(|e| syntax(&reader, e))?;
                close_element(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| syntax(&reader, "unbalanced end tag".to_string()))?;
                close_element(&mut stack, &mut root, element);
            }
            Event::Text(text) => {
                let text = text.unescape().map_err(|e| syntax(&reader, e.to_string()))?;
                push_text(&mut stack, &text);
            }
            Event::CData(data) => {
                let bytes = data.into_inner();
                let text = std::str::from_utf8(&bytes)
                    .map_err(|e| syntax(&reader, e.to_string()))?
                    .to_string();
                push_text(&mut stack, &text);
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(ParseError::syntax_error(origin, "unclosed element"));
    }
    root.ok_or_else(|| ParseError::syntax_error(origin, "no root element"))
}

fn open_element(start: &BytesStart<'_>) -> Result<Element, String> {
    let tag = std::str::from_utf8(start.name().as_ref())
        .map_err(|e| e.to_string())?
        .replace(':', "_");
    let mut element = Element::new(tag);
    for attr in start.attributes() {
        let attr = attr.map_err(|e| e.to_string())?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|e| e.to_string())?
            .to_string();
        if key == "xmlns" || key.starts_with("xmlns:") {
            continue;
        }
        let value = attr.unescape_value().map_err(|e| e.to_string())?;
        element.attrs.push((key, value.into_owned()));
    }
    Ok(element)
}

fn close_element(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None => {
            if root.is_none() {
                *root = Some(element);
            }
        }
    }
}

fn push_text(stack: &mut [Element], text: &str) {
    let Some(current) = stack.last_mut() else {
        return;
    };
    let slot = match current.children.last_mut() {
        Some(last) => &mut last.tail,
        None => &mut current.text,
    };
    slot.get_or_insert_with(String::new).push_str(text);
}
