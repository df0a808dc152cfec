//! Built-in search algorithms

pub mod ablation;
pub mod genetic;
pub mod local;
pub mod validation;

pub use ablation::AblationAnalysis;
pub use genetic::{Crossover, GeneticProgramming};
pub use local::{
    Champion, DebugSearch, DummySearch, FirstImprovement, Neighbourhood, RandomSearch, RandomWalk,
};
pub use validation::{ValidMinify, ValidSingle, ValidTest};
