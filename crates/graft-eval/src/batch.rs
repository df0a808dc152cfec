//! Batch instances and bins
//!
//! `batch_instances` lists one instance per line. A line `___` closes the
//! current bin, and `file:<path>` includes every line of a file (looked up
//! under the software path first). A run evaluates a sample of the bins,
//! drawn round-robin so every bin contributes.

use graft_core::ScenarioError;
use rand::seq::SliceRandom;
use rand::Rng;
use std::path::Path;

/// Bin separator line
pub const BIN_SEPARATOR: &str = "___";

/// Instance list used when no instance is configured: one empty argument
#[must_use]
pub fn empty_batch() -> Vec<Vec<String>> {
    vec![vec![String::new()]]
}

/// Parse instance lines into bins
///
/// # Errors
/// Returns [`ScenarioError`] on an empty bin or an unreadable `file:`.
pub fn parse_bins(lines: &[String], software_path: &Path) -> Result<Vec<Vec<String>>, ScenarioError> {
    let mut bins: Vec<Vec<String>> = vec![Vec::new()];
    for line in lines {
        if line == BIN_SEPARATOR {
            if bins.last().is_some_and(Vec::is_empty) {
                return Err(ScenarioError::invalid("search", "batch_instances", "contains an empty bin"));
            }
            bins.push(Vec::new());
        } else if let Some(file) = line.strip_prefix("file:") {
            let text = std::fs::read_to_string(software_path.join(file))
                .or_else(|_| std::fs::read_to_string(file))
                .map_err(|e| ScenarioError::io_error(file, e))?;
            if let Some(bin) = bins.last_mut() {
                bin.extend(text.lines().map(|l| l.trim_end().to_string()));
            }
        } else if let Some(bin) = bins.last_mut() {
            bin.push(line.clone());
        }
    }
    if bins.len() > 1 && bins.last().is_some_and(Vec::is_empty) {
        bins.pop();
    }
    Ok(bins)
}

/// Shuffle instances within bins and, optionally, the bins themselves
pub fn shuffle_bins<R: Rng + ?Sized>(bins: &mut [Vec<String>], instances: bool, order: bool, rng: &mut R) {
    if instances {
        for bin in bins.iter_mut() {
            bin.shuffle(rng);
        }
    }
    if order {
        bins.shuffle(rng);
    }
}

/// Take `size` instances round-robin across bins, dropping empty bins
///
/// Everything is kept when `size` covers all instances. The result is
/// never empty: without instances a single empty instance is used.
#[must_use]
pub fn sample(bins: &[Vec<String>], size: usize) -> Vec<Vec<String>> {
    let total: usize = bins.iter().map(Vec::len).sum();
    let batch: Vec<Vec<String>> = if total <= size {
        bins.to_vec()
    } else {
        let mut batch: Vec<Vec<String>> = vec![Vec::new(); bins.len()];
        let mut left = size;
        'fill: while left > 0 {
            for (taken, bin) in batch.iter_mut().zip(bins) {
                if taken.len() < bin.len() {
                    taken.push(bin[taken.len()].clone());
                    left -= 1;
                }
                if left == 0 {
                    break 'fill;
                }
            }
        }
        batch
    };
    let batch: Vec<Vec<String>> = batch.into_iter().filter(|b| !b.is_empty()).collect();
    if batch.is_empty() {
        empty_batch()
    } else {
        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lines(text: &str) -> Vec<String> {
        text.lines().map(ToString::to_string).collect()
    }

    #[test]
    fn separators_make_bins() {
        let bins = parse_bins(&lines("a\nb\n___\nc\n___"), Path::new(".")).unwrap();
        assert_eq!(bins, vec![vec!["a", "b"], vec!["c"]]);
        assert!(parse_bins(&lines("___\na"), Path::new(".")).is_err());
    }

    #[test]
    fn file_lines_are_included() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("inst.txt"), "x\ny  \n").unwrap();
        let bins = parse_bins(&lines("a\nfile:inst.txt"), dir.path()).unwrap();
        assert_eq!(bins, vec![vec!["a", "x", "y"]]);
        assert!(parse_bins(&lines("file:missing.txt"), dir.path()).is_err());
    }

    #[test]
    fn round_robin_sampling() {
        let bins = vec![
            vec!["a1".to_string(), "a2".to_string(), "a3".to_string()],
            vec!["b1".to_string()],
            vec!["c1".to_string(), "c2".to_string()],
        ];
        assert_eq!(sample(&bins, 4), vec![vec!["a1", "a2"], vec!["b1"], vec!["c1"]]);
        assert_eq!(sample(&bins, 2), vec![vec!["a1"], vec!["b1"]]);
        assert_eq!(sample(&bins, 10), bins);
    }

    #[test]
    fn no_instances_means_one_empty_instance() {
        assert_eq!(sample(&[Vec::new()], 1), empty_batch());
        assert_eq!(sample(&[], 3), empty_batch());
    }
}
