//! Graft Search - search algorithms over patches
//!
//! Provides the exploring half of graft:
//! - An [`Engine`] owning the software, the evaluation cache and the run
//!   statistics, with warmup and stopping conditions
//! - Local search, genetic programming, validation and ablation
//!   strategies behind the [`SearchStrategy`] trait
//! - A [`StrategyRegistry`] to pick an algorithm by name
//!
//! # Example
//!
//! ```rust,ignore
//! use graft_search::{Engine, SearchConfig, StrategyRegistry};
//!
//! let config = SearchConfig::from_scenario(&scenario)?;
//! let mut strategy = StrategyRegistry::with_defaults().create("FirstImprovement")?;
//! let mut engine = Engine::new(software, config);
//! engine.run(strategy.as_mut())?;
//! println!("{:?} {:?}", engine.report.stop, engine.report.best_fitness);
//! ```

#![warn(unreachable_pub)]
#![allow(missing_docs)]

pub mod algos;
pub mod cache;
pub mod config;
pub mod dominance;
pub mod engine;
pub mod error;
pub mod report;
pub mod strategy;

pub use cache::EvalCache;
pub use config::{SearchConfig, StopCriteria, WarmupStrategy, WhenTrapped};
pub use engine::Engine;
pub use error::{SearchError, SearchResult};
pub use report::{Report, Stats, StopReason};
pub use strategy::{SearchStrategy, StrategyRegistry};

/// Algorithm used when neither the scenario nor the caller names one
pub const DEFAULT_ALGORITHM: &str = "FirstImprovement";
