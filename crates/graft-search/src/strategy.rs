//! Search strategy trait and registry
//!
//! Provides [`SearchStrategy`], the seam every algorithm plugs into, and
//! [`StrategyRegistry`] for selecting one by name.

use crate::algos::{
    AblationAnalysis, Crossover, DebugSearch, DummySearch, FirstImprovement, GeneticProgramming,
    Neighbourhood, RandomSearch, RandomWalk, ValidMinify, ValidSingle, ValidTest,
};
use crate::engine::Engine;
use crate::error::{SearchError, SearchResult};
use graft_core::Patch;
use indexmap::IndexMap;
use std::fmt::Debug;

/// One search algorithm
///
/// The engine drives the lifecycle; strategies own only their private
/// state (tabu sets, populations) and read tuning knobs from
/// [`Engine::config`].
pub trait SearchStrategy: Send + Debug {
    /// Display name used in log banners
    fn name(&self) -> &'static str;

    /// Called before the warmup evaluations
    ///
    /// # Errors
    /// Implementations reject runs they cannot perform.
    fn on_warmup(&mut self, _engine: &mut Engine) -> SearchResult<()> {
        Ok(())
    }

    /// Called once warmup succeeded, before the main loop
    ///
    /// # Errors
    /// Propagates evaluation failures.
    fn on_start(&mut self, _engine: &mut Engine) -> SearchResult<()> {
        Ok(())
    }

    /// Called at the top of every main loop iteration
    ///
    /// # Errors
    /// Propagates evaluation failures.
    fn on_main_loop(&mut self, _engine: &mut Engine) -> SearchResult<()> {
        Ok(())
    }

    /// One step from the current patch; returns the next current patch
    ///
    /// # Errors
    /// Returns [`SearchError`] on edit creation or staging failures.
    fn explore(
        &mut self,
        engine: &mut Engine,
        current: Patch,
        fitness: Option<Vec<f64>>,
    ) -> SearchResult<(Patch, Option<Vec<f64>>)>;

    /// Main loop, starting from the best patch found so far
    ///
    /// # Errors
    /// See [`explore`](Self::explore).
    fn search(&mut self, engine: &mut Engine) -> SearchResult<()> {
        let mut current = engine.report.best_patch.clone().unwrap_or_default();
        let mut fitness = engine.report.best_fitness.clone();
        while !engine.stopping_condition() {
            self.on_main_loop(engine)?;
            (current, fitness) = self.explore(engine, current, fitness)?;
        }
        Ok(())
    }
}

type Factory = fn() -> Box<dyn SearchStrategy>;

/// Named strategy factories
#[derive(Debug, Default, Clone)]
pub struct StrategyRegistry {
    factories: IndexMap<&'static str, Factory>,
}

impl StrategyRegistry {
    /// Create new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            factories: IndexMap::new(),
        }
    }

    /// Create registry with every built-in algorithm
    #[must_use]
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register("RandomSearch", || Box::new(RandomSearch));
        registry.register("RandomWalk", || Box::new(RandomWalk));
        registry.register("FirstImprovement", || Box::new(FirstImprovement::default()));
        registry.register("BestImprovement", || Box::new(Neighbourhood::best()));
        registry.register("WorstImprovement", || Box::new(Neighbourhood::worst()));
        registry.register("TabuSearch", || Box::new(Neighbourhood::tabu()));
        registry.register("DummySearch", || Box::new(DummySearch));
        registry.register("DebugSearch", || Box::new(DebugSearch));
        registry.register("GeneticProgramming", || Box::new(GeneticProgramming::new(Crossover::Concat)));
        registry.register("GeneticProgrammingConcat", || {
            Box::new(GeneticProgramming::new(Crossover::Concat).named("Genetic Programming (Concat)"))
        });
        registry.register("GeneticProgramming1Point", || Box::new(GeneticProgramming::new(Crossover::OnePoint)));
        registry.register("GeneticProgramming2Point", || Box::new(GeneticProgramming::new(Crossover::TwoPoint)));
        registry.register("GeneticProgrammingUniformConcat", || {
            Box::new(GeneticProgramming::new(Crossover::UniformConcat))
        });
        registry.register("GeneticProgrammingUniformInter", || {
            Box::new(GeneticProgramming::new(Crossover::UniformInterleaved))
        });
        registry.register("ValidSingle", || Box::new(ValidSingle));
        registry.register("ValidTest", || Box::new(ValidTest));
        registry.register("ValidMinify", || Box::new(ValidMinify));
        registry.register("AblationAnalysis", || Box::new(AblationAnalysis));
        registry
    }

    /// Register a factory, replacing any previous one under `name`
    pub fn register(&mut self, name: &'static str, factory: Factory) {
        self.factories.insert(name, factory);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// Registered names, in registration order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Fresh strategy instance
    ///
    /// # Errors
    /// Returns [`SearchError::UnknownAlgorithm`] for unregistered names.
    pub fn create(&self, name: &str) -> SearchResult<Box<dyn SearchStrategy>> {
        self.factories
            .get(name)
            .map(|factory| factory())
            .ok_or_else(|| SearchError::UnknownAlgorithm(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_algorithm() {
        let registry = StrategyRegistry::with_defaults();
        assert_eq!(registry.len(), 18);
        for name in registry.names() {
            assert!(registry.create(name).is_ok(), "{name}");
        }
        assert_eq!(registry.create("TabuSearch").unwrap().name(), "Tabu Search");
    }

    #[test]
    fn unknown_names_are_rejected() {
        let registry = StrategyRegistry::with_defaults();
        assert!(!registry.contains("HillClimbing"));
        assert!(matches!(
            registry.create("HillClimbing"),
            Err(SearchError::UnknownAlgorithm(name)) if name == "HillClimbing"
        ));
    }
}
