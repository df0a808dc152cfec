//! The `graft` binary driven end to end

use graft_test_utils::{TargetFixture, COUNTING_SCRIPT};
use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};

fn scenario_file(fixture: &TargetFixture, search: &str) -> PathBuf {
    let path = fixture.root().join("scenario.toml");
    let text = format!(
        "[graft]\nseed = 1\nwork_dir = {:?}\nlog_dir = {:?}\n\n\
         [software]\npath = {:?}\ntarget_files = [\"count.sh\"]\nfitness = [\"output\"]\n\
         run_cmd = \"sh count.sh\"\nrun_timeout = 5.0\n\n\
         [search]\npossible_edits = [\"LineDeletion\"]\nwarmup = 1\n{search}",
        fixture.work_dir(),
        fixture.log_dir(),
        fixture.program_dir(),
    );
    fs::write(&path, text).unwrap();
    path
}

fn graft(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_graft"))
        .args(args)
        .env("RUST_LOG", "info")
        .output()
        .unwrap()
}

#[test]
fn show_locations_lists_every_line() {
    let fixture = TargetFixture::counting();
    let scenario = scenario_file(&fixture, "");
    let out = graft(&["show-locations", "--scenario", scenario.to_str().unwrap()]);

    assert!(out.status.success());
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("==== count.sh ===="));
    assert!(stdout.contains("---- line ----"));
    assert!(stdout.contains("echo"));
}

#[test]
fn show_patch_prints_the_diff() {
    let fixture = TargetFixture::counting();
    let scenario = scenario_file(&fixture, "");
    let out = graft(&[
        "show-patch",
        "--scenario",
        scenario.to_str().unwrap(),
        "--patch",
        "LineDeletion(('count.sh', 'line', 1))",
    ]);

    assert!(out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("==== REPORT ===="));
    assert!(stderr.contains("-x=0"));
    assert!(graft_test_utils::run_dirs(&fixture.work_dir()).is_empty());
}

#[test]
fn run_writes_a_log_file() {
    let fixture = TargetFixture::counting();
    let scenario = scenario_file(&fixture, "max_steps = 10\n\n[search.ls]\ndelete_prob = 0.0\n");
    let out = graft(&["run", "--scenario", scenario.to_str().unwrap(), "--seed", "5"]);

    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    let logs: Vec<PathBuf> = fs::read_dir(fixture.log_dir())
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    assert!(logs.iter().any(|p| p.extension().is_some_and(|e| e == "log")));
    assert_eq!(fs::read_to_string(fixture.program_dir().join("count.sh")).unwrap(), COUNTING_SCRIPT);
}

#[test]
fn unknown_algorithm_fails() {
    let fixture = TargetFixture::counting();
    let scenario = scenario_file(&fixture, "");
    let out = graft(&["run", "--scenario", scenario.to_str().unwrap(), "--algo", "Annealing"]);
    assert!(!out.status.success());
}
