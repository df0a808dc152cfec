//! Work-directory staging
//!
//! Every run owns `<work_dir>/<basename>_<timestamp>/`, reserved through a
//! sibling `.lock` file created exclusively. Variants are written into a
//! copy of the target directory that is kept in sync with the original:
//! stray entries are removed and files modified by a previous variant are
//! restored before the next one is written.

use crate::error::ExecError;
use regex::Regex;
use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Attempts made before giving up on reserving a label
const MAX_LABEL_ATTEMPTS: i64 = 10_000;

/// Reserved run label
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLabel {
    pub basename: String,
    pub timestamp: i64,
}

impl RunLabel {
    /// `<basename>_<timestamp>`
    #[must_use]
    pub fn label(&self) -> String {
        format!("{}_{}", self.basename, self.timestamp)
    }

    /// Reserve the first free label at or after `timestamp`
    ///
    /// The label is free when its lock file can be created exclusively and
    /// no directory of that name exists. The lock file is left in place
    /// until [`release`](Self::release).
    ///
    /// # Errors
    /// Returns [`ExecError`] if `work_dir` cannot be created or no label is
    /// free.
    pub fn reserve(work_dir: &Path, basename: &str, timestamp: i64) -> Result<Self, ExecError> {
        fs::create_dir_all(work_dir).map_err(|e| ExecError::io_error(work_dir, e))?;
        for offset in 0..MAX_LABEL_ATTEMPTS {
            let candidate = Self {
                basename: basename.to_string(),
                timestamp: timestamp + offset,
            };
            let lock = candidate.lock_file(work_dir);
            match OpenOptions::new().write(true).create_new(true).open(&lock) {
                Ok(_) => {
                    if work_dir.join(candidate.label()).exists() {
                        let _ = fs::remove_file(&lock);
                        continue;
                    }
                    debug!(label = %candidate.label(), "reserved run label");
                    return Ok(candidate);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
                Err(e) => return Err(ExecError::io_error(lock, e)),
            }
        }
        Err(ExecError::NoRunLabel(work_dir.to_path_buf()))
    }

    #[must_use]
    pub fn lock_file(&self, work_dir: &Path) -> PathBuf {
        work_dir.join(format!("{}.lock", self.label()))
    }

    /// Remove the lock file once the run directory exists
    ///
    /// # Errors
    /// Returns [`ExecError::Io`] if the lock cannot be removed.
    pub fn release(&self, work_dir: &Path) -> Result<(), ExecError> {
        let lock = self.lock_file(work_dir);
        match fs::remove_file(&lock) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(ExecError::io_error(lock, e)),
        }
    }
}

/// Copy a directory tree, preserving modification times
///
/// # Errors
/// Returns [`ExecError::Io`] on any filesystem failure.
pub fn copy_tree(from: &Path, to: &Path) -> Result<(), ExecError> {
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e.path().map_or_else(|| from.to_path_buf(), Path::to_path_buf);
            ExecError::io_error(path, e.into())
        })?;
        let relative = entry.path().strip_prefix(from).unwrap_or(entry.path());
        let dest = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest).map_err(|e| ExecError::io_error(&dest, e))?;
        } else {
            copy_file(entry.path(), &dest)?;
        }
    }
    Ok(())
}

fn copy_file(from: &Path, to: &Path) -> Result<(), ExecError> {
    fs::copy(from, to).map_err(|e| ExecError::io_error(to, e))?;
    let modified = fs::metadata(from)
        .and_then(|m| m.modified())
        .map_err(|e| ExecError::io_error(from, e))?;
    let file = OpenOptions::new()
        .write(true)
        .open(to)
        .map_err(|e| ExecError::io_error(to, e))?;
    file.set_modified(modified).map_err(|e| ExecError::io_error(to, e))
}

fn modified(path: &Path) -> Option<std::time::SystemTime> {
    fs::metadata(path).and_then(|m| m.modified()).ok()
}

/// Bring `target` back to the state of `original`
///
/// Entries absent from `original` are removed, files newer than their
/// original are restored, and missing entries are copied back. Files with
/// an unchanged timestamp are left untouched.
///
/// # Errors
/// Returns [`ExecError::Io`] on any filesystem failure.
pub fn sync_folder(target: &Path, original: &Path) -> Result<(), ExecError> {
    if !target.exists() {
        trace!(target = %target.display(), "fresh copy");
        return copy_tree(original, target);
    }
    let read = |dir: &Path| -> Result<Vec<String>, ExecError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(dir).map_err(|e| ExecError::io_error(dir, e))? {
            let entry = entry.map_err(|e| ExecError::io_error(dir, e))?;
            names.push(entry.file_name().to_string_lossy().into_owned());
        }
        Ok(names)
    };
    let in_target = read(target)?;
    let in_original = read(original)?;

    for name in &in_target {
        let t = target.join(name);
        let o = original.join(name);
        let known = in_original.contains(name);
        if t.is_dir() {
            if !known {
                fs::remove_dir_all(&t).map_err(|e| ExecError::io_error(&t, e))?;
            }
        } else if !known {
            fs::remove_file(&t).map_err(|e| ExecError::io_error(&t, e))?;
        } else if modified(&o) < modified(&t) {
            trace!(file = %t.display(), "restoring modified file");
            copy_file(&o, &t)?;
        }
    }
    for name in &in_original {
        let t = target.join(name);
        let o = original.join(name);
        if o.is_dir() {
            if in_target.contains(name) {
                sync_folder(&t, &o)?;
            } else {
                copy_tree(&o, &t)?;
            }
        } else if !in_target.contains(name) {
            copy_file(&o, &t)?;
        }
    }
    Ok(())
}

/// Remove a run directory, and its parent if that leaves it empty
///
/// # Errors
/// Returns [`ExecError::Io`] unless the failure is a missing or non-empty
/// directory.
pub fn clean(run_dir: &Path, work_dir: &Path) -> Result<(), ExecError> {
    match fs::remove_dir_all(run_dir) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ExecError::io_error(run_dir, e)),
    }
    // fails harmlessly while other runs share the work directory
    let _ = fs::remove_dir(work_dir);
    Ok(())
}

/// Expand `*`, `**` and `?` in target file names against `root`
///
/// Names without wildcards are kept as written. Matches are sorted.
///
/// # Errors
/// Returns [`ExecError::Io`] if `root` cannot be walked.
pub fn expand_targets(root: &Path, patterns: &[String]) -> Result<Vec<String>, ExecError> {
    let mut out = Vec::new();
    for pattern in patterns {
        if !pattern.contains(['*', '?']) {
            out.push(pattern.clone());
            continue;
        }
        let re = glob_regex(pattern);
        let mut found = Vec::new();
        for entry in WalkDir::new(root).follow_links(true) {
            let entry = entry.map_err(|e| ExecError::io_error(root, e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let relative = relative.to_string_lossy().replace('\\', "/");
            if re.is_match(&relative) {
                found.push(relative);
            }
        }
        found.sort();
        out.extend(found);
    }
    Ok(out)
}

fn glob_regex(pattern: &str) -> Regex {
    let mut re = String::from("^");
    let mut chars = pattern.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                if chars.peek() == Some(&'/') {
                    chars.next();
                    re.push_str("(?:.*/)?");
                } else {
                    re.push_str(".*");
                }
            }
            '*' => re.push_str("[^/]*"),
            '?' => re.push_str("[^/]"),
            c => re.push_str(&regex::escape(&c.to_string())),
        }
    }
    re.push('$');
    Regex::new(&re).unwrap_or_else(|_| Regex::new("$^").expect("static regex"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::{Duration, SystemTime};

    fn touch_future(path: &Path) {
        let file = OpenOptions::new().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60)).unwrap();
    }

    #[test]
    fn labels_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let a = RunLabel::reserve(dir.path(), "prog", 100).unwrap();
        let b = RunLabel::reserve(dir.path(), "prog", 100).unwrap();
        assert_eq!(a.label(), "prog_100");
        assert_eq!(b.label(), "prog_101");
        assert!(a.lock_file(dir.path()).exists());
        a.release(dir.path()).unwrap();
        assert!(!a.lock_file(dir.path()).exists());
    }

    #[test]
    fn existing_directory_skips_label() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("prog_7")).unwrap();
        let label = RunLabel::reserve(dir.path(), "prog", 7).unwrap();
        assert_eq!(label.timestamp, 8);
    }

    #[test]
    fn sync_restores_original() {
        let dir = tempfile::tempdir().unwrap();
        let original = dir.path().join("orig");
        let target = dir.path().join("work");
        fs::create_dir_all(original.join("sub")).unwrap();
        fs::write(original.join("a.c"), "original").unwrap();
        fs::write(original.join("sub/b.c"), "nested").unwrap();

        sync_folder(&target, &original).unwrap();
        assert_eq!(fs::read_to_string(target.join("sub/b.c")).unwrap(), "nested");

        fs::write(target.join("a.c"), "mutated").unwrap();
        touch_future(&target.join("a.c"));
        fs::write(target.join("stray.o"), "junk").unwrap();
        fs::create_dir(target.join("build")).unwrap();
        fs::remove_file(target.join("sub/b.c")).unwrap();

        sync_folder(&target, &original).unwrap();
        assert_eq!(fs::read_to_string(target.join("a.c")).unwrap(), "original");
        assert_eq!(fs::read_to_string(target.join("sub/b.c")).unwrap(), "nested");
        assert!(!target.join("stray.o").exists());
        assert!(!target.join("build").exists());
    }

    #[test]
    fn glob_expansion() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("src/util")).unwrap();
        for f in ["src/b.c", "src/a.c", "src/a.h", "src/util/x.c", "main.c"] {
            fs::write(dir.path().join(f), "").unwrap();
        }
        let files = expand_targets(dir.path(), &["src/*.c".to_string(), "main.c".to_string()]).unwrap();
        assert_eq!(files, vec!["src/a.c", "src/b.c", "main.c"]);
        let files = expand_targets(dir.path(), &["**/*.c".to_string()]).unwrap();
        assert_eq!(files, vec!["main.c", "src/a.c", "src/b.c", "src/util/x.c"]);
    }

    #[test]
    fn clean_removes_run_dir_and_empty_parent() {
        let dir = tempfile::tempdir().unwrap();
        let work = dir.path().join("work");
        let run = work.join("prog_1");
        fs::create_dir_all(run.join("prog")).unwrap();
        clean(&run, &work).unwrap();
        assert!(!work.exists());
        clean(&run, &work).unwrap();
    }
}
