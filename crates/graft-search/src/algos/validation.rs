//! Validation passes over one supplied patch
//!
//! These strategies do not explore. They start from the debug patch and
//! track as best the smallest patch reaching the best fitness seen.
//! [`ValidMinify`] shrinks the patch in four phases: cleanup, ranking,
//! rebuild and round-robin simplification.

use crate::dominance;
use crate::engine::Engine;
use crate::error::{SearchError, SearchResult};
use crate::report::StopReason;
use crate::strategy::SearchStrategy;
use graft_core::{Edit, Patch, Variant};
use graft_eval::RunResult;
use tracing::info;

type Fitness = Option<Vec<f64>>;

/// Reject runs without a patch to analyse
pub(crate) fn require_debug_patch(engine: &Engine, algorithm: &'static str) -> SearchResult<()> {
    if engine.report.debug_patch.is_none() {
        return Err(SearchError::MissingDebugPatch(algorithm));
    }
    Ok(())
}

/// The debug patch becomes the best patch, with no known fitness
pub(crate) fn start_validation(engine: &mut Engine) {
    engine.report.best_fitness = None;
    engine.report.best_patch.clone_from(&engine.report.debug_patch);
}

/// Evaluate, then update best with the validation rule: strictly better,
/// or as good and smaller
pub(crate) fn validate(engine: &mut Engine, variant: &Variant) -> SearchResult<RunResult> {
    let run = engine.evaluate_variant(variant, false)?;
    record(engine, variant, &run);
    Ok(run)
}

pub(crate) fn record(engine: &mut Engine, variant: &Variant, run: &RunResult) {
    let mut accept = false;
    let mut best = false;
    if run.is_success() {
        let best_fitness = engine.report.best_fitness.as_deref();
        let best_len = engine.report.best_patch.as_ref().map_or(0, Patch::len);
        let same = run.fitness.as_deref() == best_fitness;
        best = engine.dominates(run.fitness.as_deref(), best_fitness) || (same && variant.patch().len() < best_len);
        accept = best || same;
        if best {
            engine.report.best_fitness.clone_from(&run.fitness);
            engine.report.best_patch = Some(variant.patch().clone());
        }
    }
    engine.hook_evaluation(variant, run, accept, best);
    engine.stats.steps += 1;
}

/// Drop every edit whose removal leaves the diff unchanged
///
/// # Errors
/// Returns [`SearchError::Model`] if a sub-patch cannot be applied.
pub fn do_cleanup(engine: &Engine, variant: &Variant) -> SearchResult<Variant> {
    let mut cleaned = variant.clone();
    for k in (0..variant.patch().len()).rev() {
        let tmp = engine.variant(cleaned.patch().without(k))?;
        if tmp.diff() == variant.diff() {
            info!("removed {}", cleaned.patch().edits[k]);
            cleaned = tmp;
        }
    }
    let (s1, s2) = (cleaned.patch().len(), variant.patch().len());
    if s1 < s2 {
        info!("cleaned size is {s1} (was {s2})");
        info!("clean patch: {}", cleaned.patch());
    }
    Ok(cleaned)
}

fn finish(engine: &mut Engine, reason: StopReason) -> (Patch, Fitness) {
    engine.report.stop = Some(reason);
    (
        engine.report.best_patch.clone().unwrap_or_default(),
        engine.report.best_fitness.clone(),
    )
}

/// Evaluates every edit of the patch on its own
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidSingle;

impl SearchStrategy for ValidSingle {
    fn name(&self) -> &'static str {
        "Validation Single"
    }

    fn on_warmup(&mut self, engine: &mut Engine) -> SearchResult<()> {
        require_debug_patch(engine, "ValidSingle")
    }

    fn on_start(&mut self, engine: &mut Engine) -> SearchResult<()> {
        start_validation(engine);
        Ok(())
    }

    fn explore(&mut self, engine: &mut Engine, current: Patch, _fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        for edit in current.edits {
            let variant = engine.variant(Patch::new().with(edit))?;
            validate(engine, &variant)?;
        }
        Ok(finish(engine, StopReason::ValidationEnd))
    }
}

/// Evaluates the full patch once
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidTest;

impl SearchStrategy for ValidTest {
    fn name(&self) -> &'static str {
        "Validation Full"
    }

    fn on_warmup(&mut self, engine: &mut Engine) -> SearchResult<()> {
        require_debug_patch(engine, "ValidTest")
    }

    fn on_start(&mut self, engine: &mut Engine) -> SearchResult<()> {
        start_validation(engine);
        Ok(())
    }

    fn explore(&mut self, engine: &mut Engine, current: Patch, _fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        let variant = engine.variant(current)?;
        validate(engine, &variant)?;
        Ok(finish(engine, StopReason::ValidationEnd))
    }
}

/// Shrinks a patch while keeping its fitness
#[derive(Debug, Default, Clone, Copy)]
pub struct ValidMinify;

impl ValidMinify {
    /// Singleton sub-patches, best first
    fn rank(engine: &mut Engine, patch: &Patch) -> SearchResult<Vec<(Edit, Fitness)>> {
        info!("-- ranking --");
        let mut ranking = Vec::with_capacity(patch.len());
        for edit in &patch.edits {
            let variant = engine.variant(Patch::new().with(edit.clone()))?;
            let run = validate(engine, &variant)?;
            ranking.push((edit.clone(), run.fitness));
        }
        let maximize = engine.maximize().to_vec();
        ranking.sort_by(|(_, x), (_, y)| dominance::best_first(x.as_deref(), y.as_deref(), &maximize));
        Ok(ranking)
    }

    /// Re-add ranked edits one by one while fitness improves
    fn rebuild(engine: &mut Engine, ranking: Vec<(Edit, Fitness)>) -> SearchResult<()> {
        info!("-- rebuild --");
        let mut ranking = ranking.into_iter();
        let Some((first, mut rebuild_fitness)) = ranking.next() else {
            return Ok(());
        };
        let mut rebuild = Patch::new().with(first);
        for (edit, _) in ranking {
            if engine.interrupted() {
                break;
            }
            let variant = engine.variant(rebuild.with(edit))?;
            let run = validate(engine, &variant)?;
            if run.is_success() && engine.dominates(run.fitness.as_deref(), rebuild_fitness.as_deref()) {
                rebuild_fitness = run.fitness;
                rebuild = variant.patch().clone();
            }
        }
        Ok(())
    }

    /// Try removing each edit in rotation; a removal is kept only if the
    /// fitness is unchanged
    fn simplify(engine: &mut Engine) -> SearchResult<()> {
        info!("-- simplify --");
        let best_len = |engine: &Engine| engine.report.best_patch.as_ref().map_or(0, Patch::len);
        let mut rr_limit = engine.config().minify.round_robin_limit;
        let mut n = best_len(engine) + 1;
        let mut last_i = 0;
        while n > best_len(engine) && rr_limit != 0 {
            if engine.interrupted() {
                break;
            }
            n = best_len(engine);
            let best = engine.report.best_patch.clone().unwrap_or_default();
            for i in 0..n {
                if i == n - 1 {
                    rr_limit -= 1;
                }
                let patch: Patch = best
                    .edits
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| (j + last_i) % n != i)
                    .map(|(_, edit)| edit.clone())
                    .collect::<Vec<_>>()
                    .into();
                let variant = engine.variant(patch)?;
                let run = validate(engine, &variant)?;
                if run.is_success() && run.fitness == engine.report.best_fitness {
                    engine.report.best_patch = Some(variant.patch().clone());
                    last_i = i;
                    break;
                }
            }
        }
        Ok(())
    }
}

impl SearchStrategy for ValidMinify {
    fn name(&self) -> &'static str {
        "Minify Patch"
    }

    fn on_warmup(&mut self, engine: &mut Engine) -> SearchResult<()> {
        require_debug_patch(engine, "ValidMinify")
    }

    fn on_start(&mut self, engine: &mut Engine) -> SearchResult<()> {
        start_validation(engine);
        Ok(())
    }

    fn explore(&mut self, engine: &mut Engine, current: Patch, _fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        let config = engine.config().minify.clone();
        let mut variant = engine.variant(current)?;

        if config.do_cleanup {
            info!("-- cleanup --");
            variant = do_cleanup(engine, &variant)?;
            engine.report.best_patch = Some(variant.patch().clone());
        }

        info!("-- initial patch --");
        if variant.patch().is_empty() {
            return Ok(finish(engine, StopReason::ValidationEndEmpty));
        }
        validate(engine, &variant)?;

        if config.do_rebuild {
            let ranking = Self::rank(engine, variant.patch())?;
            let initial = engine.report.initial_fitness.clone();
            let top = ranking.first().and_then(|(_, f)| f.as_deref());
            if engine.dominates(top, initial.as_deref()) {
                Self::rebuild(engine, ranking)?;
            } else if engine.dominates(initial.as_deref(), engine.report.best_fitness.as_deref()) {
                return Ok(finish(engine, StopReason::ValidationEndAllBad));
            }
        }

        if config.do_simplify {
            Self::simplify(engine)?;
        }

        let reason = engine.report.stop.take().unwrap_or(StopReason::ValidationEnd);
        Ok(finish(engine, reason))
    }
}
