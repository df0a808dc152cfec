//! Graft Eval - staged evaluation of program variants
//!
//! Provides the measuring half of graft:
//! - Runs stage commands in a process group under timeout and output caps
//! - Extracts fitness values through pluggable extractors
//! - Aggregates per-instance fitness over bins and batches
//! - Stages per-run work directories kept in sync with the target
//!
//! # Example
//!
//! ```rust,ignore
//! use graft_eval::{Software, SoftwareConfig};
//!
//! let config = SoftwareConfig::from_scenario(&scenario, &settings)?;
//! let mut software = Software::new(config, &settings)?;
//! let reference = software.reference().clone();
//! let run = software.evaluate(&reference, None)?;
//! println!("{} {}", run.status, run.fitness_text());
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod aggregate;
pub mod batch;
pub mod config;
pub mod error;
pub mod exec;
pub mod fitness;
pub mod run_result;
pub mod software;
pub mod status;
pub mod workdir;

pub use aggregate::{BatchStrategy, BinStrategy};
pub use config::{SoftwareConfig, StageCommand};
pub use error::{EvalError, EvalResult, ExecError};
pub use exec::{run_command, ExecRequest, ExecResult};
pub use fitness::{FitnessExtractor, Measure, Objective, StageRun};
pub use run_result::{render_fitness, InstanceOutcome, RunResult};
pub use software::Software;
pub use status::{RunStatus, Stage, StatusKind};
