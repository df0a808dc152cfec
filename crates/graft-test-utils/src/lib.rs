//! Testing utilities for the graft workspace
//!
//! Shared fixtures: throwaway target programs with their own work and log
//! directories, and scenario builders pointing at them.

#![allow(missing_docs)]

use graft_core::{Scenario, Settings};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Shell program whose fitness is the number of increments it performs
///
/// Deleting an increment line improves (lowers) the fitness; deleting the
/// final `echo` makes the fitness unparsable.
pub const COUNTING_SCRIPT: &str = "x=0
x=$((x+1))
x=$((x+1))
x=$((x+1))
x=$((x+1))
echo \"GRAFT_FITNESS: $x\"
";

/// Temporary directory holding a target program plus work and log dirs
#[derive(Debug)]
pub struct TargetFixture {
    dir: TempDir,
}

impl TargetFixture {
    /// Create `prog/` populated with `files`
    pub fn new(files: &[(&str, &str)]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let fixture = Self { dir };
        fs::create_dir_all(fixture.program_dir()).unwrap();
        for (name, content) in files {
            fixture.write(name, content);
        }
        fixture
    }

    /// Program made of [`COUNTING_SCRIPT`] as `count.sh`
    pub fn counting() -> Self {
        Self::new(&[("count.sh", COUNTING_SCRIPT)])
    }

    /// Write a file inside the program directory
    pub fn write(&self, name: &str, content: &str) {
        let path = self.program_dir().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn program_dir(&self) -> PathBuf {
        self.dir.path().join("prog")
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.dir.path().join("logs")
    }

    /// Default settings redirected into the fixture
    pub fn settings(&self) -> Settings {
        Settings {
            work_dir: self.work_dir(),
            log_dir: self.log_dir(),
            ..Settings::default()
        }
    }

    /// Parse `toml` and point its paths at the fixture
    pub fn scenario(&self, toml: &str) -> Scenario {
        let mut scenario = Scenario::from_toml_str(toml).unwrap();
        scenario.software.path = self.program_dir();
        scenario.graft.work_dir = self.work_dir();
        scenario.graft.log_dir = self.log_dir();
        scenario
    }

    /// Scenario evaluating [`COUNTING_SCRIPT`] with line edits
    pub fn counting_scenario(&self, search: &str) -> Scenario {
        self.scenario(&format!(
            "[graft]\nseed = 1\n\n[software]\ntarget_files = [\"count.sh\"]\nfitness = [\"output\"]\nrun_cmd = \"sh count.sh\"\nrun_timeout = 5.0\n\n[search]\npossible_edits = [\"LineDeletion\"]\nwarmup = 1\n{search}"
        ))
    }
}

/// Run directories currently present under `work_dir`
pub fn run_dirs(work_dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(work_dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
