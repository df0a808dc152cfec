//! graft command line
//!
//! Subcommands:
//! - `run`: search for an improving patch
//! - `minify`: shrink a patch while keeping its fitness
//! - `show-patch`: print the diff a patch produces
//! - `show-locations`: list every modification point of the target files

#![allow(missing_docs)]

mod logging;
mod protocol;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use graft_core::{MutationModel, Scenario, Settings, Variant};
use graft_eval::{Software, SoftwareConfig};
use protocol::{read_patch, Protocol};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Parser)]
#[command(name = "graft")]
#[command(about = "Search-based improvement of programs through patches", long_about = None)]
#[command(version)]
struct Cli {
    /// Log debug events to stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search algorithm on the scenario's target
    Run {
        /// Scenario file
        #[arg(long, value_name = "FILE")]
        scenario: PathBuf,

        /// Algorithm name, overriding `[search] algorithm`
        #[arg(long = "algo", value_name = "NAME")]
        algorithm: Option<String>,

        /// Random seed, overriding `[graft] seed`
        #[arg(long)]
        seed: Option<u64>,

        /// Patch for validation algorithms: a `.patch` file or the patch text
        #[arg(long, value_name = "PATCH")]
        patch: Option<String>,

        /// Edit kind to use instead of `[search] possible_edits` (repeatable)
        #[arg(long = "edit", value_name = "EDIT")]
        edits: Vec<String>,
    },

    /// Shrink a patch while keeping its fitness
    Minify {
        #[arg(long, value_name = "FILE")]
        scenario: PathBuf,

        #[arg(long, value_name = "PATCH")]
        patch: String,

        #[arg(long)]
        seed: Option<u64>,
    },

    /// Print the diff a patch produces
    ShowPatch {
        #[arg(long, value_name = "FILE")]
        scenario: PathBuf,

        #[arg(long, value_name = "PATCH")]
        patch: String,

        /// Leave the patched work copy in place and print its path
        #[arg(long)]
        keep: bool,
    },

    /// List the modification points of every target file
    ShowLocations {
        #[arg(long, value_name = "FILE")]
        scenario: PathBuf,

        /// Only this target file
        #[arg(long)]
        filename: Option<String>,

        /// Only this location kind
        #[arg(long)]
        tag: Option<String>,
    },
}

/// Command line values taking precedence over the scenario file
#[derive(Debug, Default)]
struct Overrides {
    seed: Option<u64>,
    edits: Vec<String>,
}

fn load(path: &Path, overrides: Overrides) -> Result<(Scenario, Settings)> {
    let mut scenario = Scenario::load(path).with_context(|| format!("loading scenario {}", path.display()))?;
    if overrides.seed.is_some() {
        scenario.graft.seed = overrides.seed;
    }
    if !overrides.edits.is_empty() {
        scenario.search.possible_edits = overrides.edits;
    }
    let settings = scenario.settings()?;
    Ok((scenario, settings))
}

/// Flag raised by Ctrl-C; the search stops at its next step
fn interrupt_flag() -> Arc<AtomicBool> {
    let flag = Arc::new(AtomicBool::new(false));
    let handler_flag = Arc::clone(&flag);
    if let Err(e) = ctrlc::set_handler(move || {
        handler_flag.store(true, Ordering::SeqCst);
    }) {
        warn!("Ctrl-C handler not installed: {e}");
    }
    flag
}

fn run_search(
    scenario: &Path,
    algorithm: Option<String>,
    overrides: Overrides,
    patch: Option<&str>,
    log_file: &logging::LogFile,
) -> Result<()> {
    let (scenario, settings) = load(scenario, overrides)?;
    let debug_patch = patch.map(read_patch).transpose()?;
    let protocol = Protocol {
        scenario,
        settings,
        algorithm,
        debug_patch,
        interrupt: interrupt_flag(),
    };
    protocol.run(log_file)?;
    Ok(())
}

fn software(scenario: &Scenario, settings: &Settings) -> Result<Software> {
    let config = SoftwareConfig::from_scenario(scenario, settings)?;
    Ok(Software::new(config, settings)?)
}

fn show_patch(scenario: &Path, patch: &str, keep: bool) -> Result<()> {
    let (scenario, settings) = load(scenario, Overrides::default())?;
    let patch = read_patch(patch)?;
    let software = software(&scenario, &settings)?;
    let variant = Variant::new(software.reference(), patch, settings.diff_method)?;

    info!("==== REPORT ====");
    info!("Patch: {}", variant.patch());
    info!("Diff:\n{}", variant.diff());
    if keep {
        software.write_variant(&variant)?;
        info!("==== PATH ====");
        info!("{}", software.work_path().display());
    } else {
        software.clean_work_dir()?;
    }
    Ok(())
}

fn show_locations(scenario: &Path, filename: Option<&str>, tag: Option<&str>) -> Result<()> {
    let (scenario, settings) = load(scenario, Overrides::default())?;
    let software = software(&scenario, &settings)?;
    for (name, model) in software.reference().models() {
        if filename.is_some_and(|f| f != name.as_str()) {
            continue;
        }
        println!("==== {name} ====");
        for kind in model.kinds() {
            if tag.is_some_and(|t| t != kind) {
                continue;
            }
            println!("---- {kind} ----");
            for location in model.locations(&kind) {
                println!("{}", model.show_location(&location));
            }
            println!();
        }
    }
    software.clean_work_dir()?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let log_file = match logging::init(cli.verbose) {
        Ok(log_file) => log_file,
        Err(e) => {
            eprintln!("error: {e:#}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Run {
            scenario,
            algorithm,
            seed,
            patch,
            edits,
        } => run_search(&scenario, algorithm, Overrides { seed, edits }, patch.as_deref(), &log_file),
        Commands::Minify { scenario, patch, seed } => run_search(
            &scenario,
            Some("ValidMinify".to_string()),
            Overrides { seed, ..Overrides::default() },
            Some(&patch),
            &log_file,
        ),
        Commands::ShowPatch { scenario, patch, keep } => show_patch(&scenario, &patch, keep),
        Commands::ShowLocations {
            scenario,
            filename,
            tag,
        } => show_locations(&scenario, filename.as_deref(), tag.as_deref()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn run_overrides_and_minify_patch() {
        assert!(Cli::try_parse_from(["graft", "minify", "--scenario", "s.toml"]).is_err());
        let cli = Cli::try_parse_from([
            "graft", "run", "--scenario", "s.toml", "--algo", "TabuSearch", "--seed", "7", "--edit", "LineDeletion",
            "--edit", "LineMoving",
        ])
        .unwrap();
        assert!(matches!(
            cli.command,
            Commands::Run { algorithm: Some(ref a), seed: Some(7), ref edits, .. }
                if a == "TabuSearch" && edits.len() == 2
        ));
    }
}
