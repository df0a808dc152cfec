//! srcML preprocessing
//!
//! Applied once after parsing, in this order: explicit braces for pseudo
//! blocks, typed literals, operator classes, tag renaming groups and
//! finally tag focusing.

use super::tree::Element;
use crate::error::ParseError;
use crate::scenario::SrcmlSection;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

static SPACING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n(\s*)").expect("static regex"));

const COMPARISON: [&str; 6] = ["==", "!=", "<", "<=", ">", ">="];
const ARITHMETIC: [&str; 4] = ["+", "-", "*", "/"];

/// Apply the configured preprocessing to a freshly parsed srcML tree
///
/// # Errors
/// Returns [`ParseError::Syntax`] on a malformed `rename` rule.
pub fn preprocess(root: &mut Element, options: &SrcmlSection) -> Result<(), ParseError> {
    if options.process_pseudo_blocks {
        pseudo_blocks(root, "", 0);
    }
    if options.process_literals {
        literals(root);
    }
    if options.process_operators {
        operators(root);
    }
    for (new_tag, old_tags) in rename_rules(&options.rename)? {
        rename(root, &old_tags, &new_tag);
    }
    if !options.focus.is_empty() {
        let focus: HashSet<&str> = options.focus.iter().map(String::as_str).collect();
        focus_tags(root, &focus);
    }
    Ok(())
}

/// Parse `new: old1 old2 ...` rules
///
/// # Errors
/// Returns [`ParseError::Syntax`] on a rule without exactly one `:`.
pub fn rename_rules(rules: &[String]) -> Result<Vec<(String, HashSet<String>)>, ParseError> {
    rules
        .iter()
        .filter(|rule| !rule.trim().is_empty())
        .map(|rule| {
            let mut parts = rule.split(':');
            match (parts.next(), parts.next(), parts.next()) {
                (Some(new_tag), Some(old_tags), None) => Ok((
                    new_tag.trim().to_string(),
                    old_tags.split_whitespace().map(ToString::to_string).collect(),
                )),
                _ => Err(ParseError::syntax_error(
                    "[srcml] rename",
                    format!("badly formatted rule \"{rule}\""),
                )),
            }
        })
        .collect()
}

fn guess_spacing(text: Option<&str>) -> String {
    text.and_then(|t| SPACING.captures_iter(t).last())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_default()
}

fn pseudo_blocks(element: &mut Element, parent_spacing: &str, parent_step: usize) {
    let mut spacing = parent_spacing
        .to_string()
        .max(guess_spacing(element.text.as_deref()));
    let mut step = parent_step;
    for child in &mut element.children {
        step = spacing.len().saturating_sub(parent_spacing.len());
        if step == 0 {
            step = parent_step;
        }
        pseudo_blocks(child, &spacing, step);
        spacing = spacing.max(guess_spacing(child.tail.as_deref()));
    }
    if element.tag == "block" && element.attr("type") == Some("pseudo") {
        element.remove_attr("type");
        let text = element.text.take().unwrap_or_default();
        if let Some(last) = element.children.last_mut() {
            element.text = Some(format!("/*auto*/{{\n{parent_spacing}{text}{}", " ".repeat(step)));
            let tail = last.tail.take().unwrap_or_default();
            last.tail = Some(format!("{tail}\n{parent_spacing}}}/*auto*/"));
        } else {
            element.text = Some(format!(
                "/*auto*/{{\n{parent_spacing}{text}\n{parent_spacing}}}/*auto*/"
            ));
        }
    }
}

fn literals(element: &mut Element) {
    for child in &mut element.children {
        literals(child);
    }
    if element.tag == "literal" {
        if let Some(kind) = element.remove_attr("type") {
            element.tag = format!("literal_{kind}");
        }
    }
}

fn operators(element: &mut Element) {
    for child in &mut element.children {
        operators(child);
    }
    if element.tag == "operator" {
        let text = element.text.as_deref().unwrap_or("");
        element.tag = if COMPARISON.contains(&text) {
            "operator_comp"
        } else if ARITHMETIC.contains(&text) {
            "operator_arith"
        } else {
            "operator_misc"
        }
        .to_string();
    }
}

fn rename(element: &mut Element, old_tags: &HashSet<String>, new_tag: &str) {
    if old_tags.contains(&element.tag) {
        element.tag = new_tag.to_string();
    }
    for child in &mut element.children {
        rename(child, old_tags, new_tag);
    }
}

/// Flatten every element whose tag is not focused into its parent
///
/// Text order is preserved: an unwrapped element's text joins the
/// preceding sibling's tail (or the parent's text), its children take
/// its place and its tail follows them.
fn focus_tags(element: &mut Element, focus: &HashSet<&str>) {
    let children = std::mem::take(&mut element.children);
    let mut kept: Vec<Element> = Vec::with_capacity(children.len());
    for mut child in children {
        focus_tags(&mut child, focus);
        if focus.contains(child.tag.as_str()) {
            kept.push(child);
            continue;
        }
        append_text(&mut element.text, &mut kept, child.text.take());
        let tail = child.tail.take();
        kept.append(&mut child.children);
        append_text(&mut element.text, &mut kept, tail);
    }
    element.children = kept;
}

fn append_text(parent_text: &mut Option<String>, siblings: &mut [Element], text: Option<String>) {
    let Some(text) = text else {
        return;
    };
    let slot = match siblings.last_mut() {
        Some(last) => &mut last.tail,
        None => parent_text,
    };
    slot.get_or_insert_with(String::new).push_str(&text);
}

#[cfg(test)]
mod tests {
    use super::super::tree::parse_document;
    use super::*;
    use pretty_assertions::assert_eq;

    fn options() -> SrcmlSection {
        SrcmlSection::default()
    }

    #[test]
    fn focus_preserves_text() {
        let src = "<unit><function><name>f</name>() <block>{\n  <expr_stmt><expr>x = 1</expr>;</expr_stmt>\n}</block></function></unit>";
        let mut root = parse_document(src, "f.c.xml").unwrap();
        let before = root.itertext();
        preprocess(&mut root, &options()).unwrap();
        assert_eq!(root.itertext(), before);
        assert_eq!(root.children.len(), 1);
        assert_eq!(root.children[0].tag, "block");
        assert_eq!(root.children[0].children[0].tag, "stmt");
    }

    #[test]
    fn literals_and_operators_classified() {
        let src = "<unit><expr><name>i</name> <operator>&lt;</operator> <literal type=\"number\">10</literal> <operator>+</operator> <operator>&amp;&amp;</operator></expr></unit>";
        let mut root = parse_document(src, "f.c.xml").unwrap();
        let opts = SrcmlSection {
            focus: Vec::new(),
            ..options()
        };
        preprocess(&mut root, &opts).unwrap();
        let tags: Vec<&str> = root.children[0].children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["name", "operator_comp", "number", "operator_arith", "operator_misc"]);
    }

    #[test]
    fn pseudo_block_gets_braces() {
        let src = "<unit><if>if (x)\n    <block type=\"pseudo\"><expr_stmt>y();</expr_stmt></block></if></unit>";
        let mut root = parse_document(src, "f.c.xml").unwrap();
        pseudo_blocks(&mut root, "", 0);
        let text = root.itertext();
        assert!(text.contains("/*auto*/{"));
        assert!(text.contains("}/*auto*/"));
        assert!(root.children[0].children[0].attr("type").is_none());
    }

    #[test]
    fn bad_rename_rule() {
        assert!(rename_rules(&["stmt if while".to_string()]).is_err());
        let rules = rename_rules(&["stmt: if while".to_string(), String::new()]).unwrap();
        assert_eq!(rules.len(), 1);
        assert!(rules[0].1.contains("while"));
    }
}
