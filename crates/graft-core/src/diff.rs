//! Line diffs between reference and mutated dumps
//!
//! Unified output comes straight from `similar`; context output is
//! rendered from the same grouped operations in the classic
//! `***`/`---` layout.

use similar::{DiffOp, DiffTag, TextDiff};
use std::fmt::Write as _;
use std::str::FromStr;

/// Lines of context around each hunk
const CONTEXT_RADIUS: usize = 3;

/// Diff flavour
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiffMethod {
    #[default]
    Unified,
    Context,
}

impl FromStr for DiffMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unified" => Ok(Self::Unified),
            "context" => Ok(Self::Context),
            other => Err(format!("unknown diff method \"{other}\"")),
        }
    }
}

/// Diff of one file, empty when both sides are equal
#[must_use]
pub fn file_diff(method: DiffMethod, name: &str, before: &str, after: &str) -> String {
    if before == after {
        return String::new();
    }
    let from = format!("before: {name}");
    let to = format!("after: {name}");
    let diff = TextDiff::from_lines(before, after);
    let text = match method {
        DiffMethod::Unified => diff
            .unified_diff()
            .context_radius(CONTEXT_RADIUS)
            .header(&from, &to)
            .to_string(),
        DiffMethod::Context => context_diff(&diff, &from, &to),
    };
    text
}

fn context_diff(diff: &TextDiff<'_, '_, '_, str>, from: &str, to: &str) -> String {
    let old = diff.old_slices();
    let new = diff.new_slices();
    let mut out = String::new();
    for (i, group) in diff.grouped_ops(CONTEXT_RADIUS).iter().enumerate() {
        let (Some(first), Some(last)) = (group.first(), group.last()) else {
            continue;
        };
        if i == 0 {
            let _ = writeln!(out, "*** {from}");
            let _ = writeln!(out, "--- {to}");
        }
        out.push_str("***************\n");

        let old_range = first.old_range().start..last.old_range().end;
        let _ = writeln!(out, "*** {} ****", context_range(old_range.start, old_range.end));
        if group
            .iter()
            .any(|op| matches!(op.tag(), DiffTag::Replace | DiffTag::Delete))
        {
            for op in group {
                let prefix = match op.tag() {
                    DiffTag::Insert => continue,
                    DiffTag::Equal => "  ",
                    DiffTag::Replace => "! ",
                    DiffTag::Delete => "- ",
                };
                push_lines(&mut out, prefix, &old[op.old_range()]);
            }
        }

        let new_range = first.new_range().start..last.new_range().end;
        let _ = writeln!(out, "--- {} ----", context_range(new_range.start, new_range.end));
        if group
            .iter()
            .any(|op| matches!(op.tag(), DiffTag::Replace | DiffTag::Insert))
        {
            for op in group {
                let prefix = match op {
                    DiffOp::Delete { .. } => continue,
                    DiffOp::Equal { .. } => "  ",
                    DiffOp::Replace { .. } => "! ",
                    DiffOp::Insert { .. } => "+ ",
                };
                push_lines(&mut out, prefix, &new[op.new_range()]);
            }
        }
    }
    out
}

fn push_lines(out: &mut String, prefix: &str, lines: &[&str]) {
    for line in lines {
        out.push_str(prefix);
        out.push_str(line);
        if !line.ends_with('\n') {
            out.push('\n');
        }
    }
}

fn context_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    let beginning = if length == 0 { start } else { start + 1 };
    if length <= 1 {
        format!("{beginning}")
    } else {
        format!("{beginning},{}", beginning + length - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn equal_contents_give_empty_diff() {
        assert_eq!(file_diff(DiffMethod::Unified, "a", "x\n", "x\n"), "");
        assert_eq!(file_diff(DiffMethod::Context, "a", "x\n", "x\n"), "");
    }

    #[test]
    fn unified_has_headers() {
        let d = file_diff(DiffMethod::Unified, "f.c", "a\nb\nc\n", "a\nB\nc\n");
        assert!(d.starts_with("--- before: f.c\n+++ after: f.c\n"));
        assert!(d.contains("-b\n"));
        assert!(d.contains("+B\n"));
    }

    #[test]
    fn context_layout() {
        let d = file_diff(DiffMethod::Context, "f.c", "a\nb\nc\n", "a\nB\nc\n");
        let expected = "\
*** before: f.c
--- after: f.c
***************
*** 1,3 ****
  a
! b
  c
--- 1,3 ----
  a
! B
  c
";
        assert_eq!(d, expected);
    }

    #[test]
    fn context_pure_insert_omits_old_lines() {
        let d = file_diff(DiffMethod::Context, "f", "a\n", "a\nb\n");
        assert!(d.contains("*** 1 ****\n--- 1,2 ----\n  a\n+ b\n"));
    }

    #[test]
    fn method_parsing() {
        assert_eq!("context".parse::<DiffMethod>().unwrap(), DiffMethod::Context);
        assert!("side".parse::<DiffMethod>().is_err());
    }
}
