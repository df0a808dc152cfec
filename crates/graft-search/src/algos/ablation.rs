//! Ablation analysis of a supplied patch
//!
//! After cleanup, edits are removed greedily: each round evaluates every
//! single-edit removal and drops the one whose removal scores best. The
//! backtrack then replays the removals in that order on the cleaned patch,
//! logging the fitness after each one.

use super::validation::{do_cleanup, record, require_debug_patch, start_validation, validate};
use crate::dominance;
use crate::engine::Engine;
use crate::error::SearchResult;
use crate::report::StopReason;
use crate::strategy::SearchStrategy;
use graft_core::Patch;
use tracing::info;

type Fitness = Option<Vec<f64>>;

#[derive(Debug, Default, Clone, Copy)]
pub struct AblationAnalysis;

impl AblationAnalysis {
    /// Indices removed from the shrinking patch, in removal order
    fn removal_order(engine: &mut Engine, patch: &Patch) -> SearchResult<Vec<usize>> {
        let maximize = engine.maximize().to_vec();
        let mut rebuild = patch.clone();
        let mut removed = Vec::with_capacity(patch.len());
        while !rebuild.is_empty() {
            if engine.interrupted() {
                break;
            }
            let mut ranking: Vec<(usize, Fitness)> = Vec::with_capacity(rebuild.len());
            for k in 0..rebuild.len() {
                let variant = engine.variant(rebuild.without(k))?;
                let run = validate(engine, &variant)?;
                ranking.push((k, run.fitness));
            }
            ranking.sort_by(|(_, x), (_, y)| dominance::best_first(x.as_deref(), y.as_deref(), &maximize));
            let Some(&(k, _)) = ranking.first() else {
                break;
            };
            removed.push(k);
            rebuild.edits.remove(k);
        }
        Ok(removed)
    }
}

impl SearchStrategy for AblationAnalysis {
    fn name(&self) -> &'static str {
        "Ablation Analysis"
    }

    fn on_warmup(&mut self, engine: &mut Engine) -> SearchResult<()> {
        require_debug_patch(engine, "AblationAnalysis")
    }

    fn on_start(&mut self, engine: &mut Engine) -> SearchResult<()> {
        start_validation(engine);
        Ok(())
    }

    fn explore(&mut self, engine: &mut Engine, current: Patch, fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        let variant = engine.variant(current)?;

        info!("-- cleanup --");
        let variant = do_cleanup(engine, &variant)?;
        engine.report.best_patch = Some(variant.patch().clone());

        info!("-- exploration --");
        if variant.patch().is_empty() {
            engine.report.stop = Some(StopReason::AblationEndEmpty);
            return Ok((variant.patch().clone(), fitness));
        }
        validate(engine, &variant)?;
        let removed = Self::removal_order(engine, variant.patch())?;
        if engine.report.stop.is_some() {
            return Ok((variant.patch().clone(), fitness));
        }

        info!("-- backtrack --");
        validate(engine, &variant)?;
        let mut patch = variant.patch().clone();
        for k in removed {
            let edit = patch.edits.remove(k);
            let tmp = engine.variant(patch.clone())?;
            let mut run = engine.evaluate_variant(&tmp, false)?;
            run.log = format!("removing {edit}");
            record(engine, &tmp, &run);
        }

        engine.report.stop = Some(StopReason::AblationEnd);
        Ok((
            engine.report.best_patch.clone().unwrap_or_default(),
            engine.report.best_fitness.clone(),
        ))
    }
}
