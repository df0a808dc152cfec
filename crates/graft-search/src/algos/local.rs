//! Local search family
//!
//! Every strategy here moves from the current patch by `horizon`
//! mutations, each deleting a random edit with probability `delete_prob`
//! or else appending a fresh edit. They differ in what they accept:
//! - [`RandomSearch`] mutates the empty patch and never moves
//! - [`RandomWalk`] accepts any successful neighbour
//! - [`FirstImprovement`] accepts the first neighbour not worse than current
//! - [`Neighbourhood`] samples `max_neighbours` neighbours, then commits to
//!   the best (or worst improving) one; the tabu variant also forbids
//!   revisiting committed patches
//!
//! Patches compare by their edit sequence, so reordered edits are distinct
//! neighbours even when they produce the same diff.

use crate::config::WhenTrapped;
use crate::engine::Engine;
use crate::error::{SearchError, SearchResult};
use crate::report::StopReason;
use crate::strategy::SearchStrategy;
use graft_core::Patch;
use rand::Rng;
use std::collections::{HashSet, VecDeque};

/// Default `max_neighbours` for strategies that buffer a local champion
pub const DEFAULT_MAX_NEIGHBOURS: usize = 20;

type Fitness = Option<Vec<f64>>;

/// Delete or append one edit
///
/// An empty patch that can only shrink traps the search.
///
/// # Errors
/// Returns [`SearchError::EditCreation`] when no edit can be created.
pub fn mutate(engine: &mut Engine, patch: &mut Patch, delete_prob: f64) -> SearchResult<()> {
    let n = patch.len();
    if n == 0 {
        if delete_prob >= 1.0 {
            engine.report.stop = Some(StopReason::Trapped);
        } else {
            let edit = engine.create_edit()?;
            patch.edits.push(edit);
        }
    } else if engine.rng().gen::<f64>() < delete_prob {
        let k = engine.rng().gen_range(0..n);
        patch.edits.remove(k);
    } else {
        let edit = engine.create_edit()?;
        patch.edits.push(edit);
    }
    Ok(())
}

/// [`mutate`] applied `horizon` times, stopping early once trapped
///
/// # Errors
/// Returns [`SearchError::EditCreation`] when no edit can be created.
pub fn mutate_horizon(engine: &mut Engine, patch: &mut Patch, delete_prob: f64, horizon: usize) -> SearchResult<()> {
    for _ in 0..horizon.max(1) {
        mutate(engine, patch, delete_prob)?;
        if engine.report.stop.is_some() {
            break;
        }
    }
    Ok(())
}

/// Stop when `max_neighbours` moves in a row were rejected and the
/// configuration says so
pub fn check_if_trapped(engine: &mut Engine, max_neighbours: Option<usize>) {
    let Some(max) = max_neighbours else {
        return;
    };
    if engine.stats.neighbours < max as u64 {
        return;
    }
    if engine.config().ls.when_trapped == WhenTrapped::Stop {
        engine.report.stop = Some(StopReason::Trapped);
    }
}

/// Mutate `current` until the result passes `allowed`
///
/// Attempts are bounded by `edit_retries`; the last candidate is returned
/// if none passes.
fn propose<F>(engine: &mut Engine, current: &Patch, allowed: F) -> SearchResult<Patch>
where
    F: Fn(&Patch) -> bool,
{
    let (delete_prob, horizon) = (engine.config().ls.delete_prob, engine.config().ls.horizon);
    let attempts = engine.software().settings().edit_retries.max(1);
    for attempt in 1..=attempts {
        let mut patch = current.clone();
        mutate_horizon(engine, &mut patch, delete_prob, horizon)?;
        if attempt == attempts || engine.report.stop.is_some() || allowed(&patch) {
            return Ok(patch);
        }
    }
    Ok(current.clone())
}

/// Record `fitness` as the global best if it dominates
fn update_best(engine: &mut Engine, patch: &Patch, fitness: &Fitness) -> bool {
    if engine.dominates(fitness.as_deref(), engine.report.best_fitness.as_deref()) {
        engine.report.best_fitness = fitness.clone();
        engine.report.best_patch = Some(patch.clone());
        true
    } else {
        false
    }
}

/// Stops immediately
#[derive(Debug, Default, Clone, Copy)]
pub struct DummySearch;

impl SearchStrategy for DummySearch {
    fn name(&self) -> &'static str {
        "Dummy Search"
    }

    fn explore(&mut self, engine: &mut Engine, current: Patch, fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        engine.report.stop = Some(StopReason::DummyEnd);
        Ok((current, fitness))
    }
}

/// Evaluates each edit of the debug patch on its own
#[derive(Debug, Default, Clone, Copy)]
pub struct DebugSearch;

impl SearchStrategy for DebugSearch {
    fn name(&self) -> &'static str {
        "Debug Search"
    }

    fn on_warmup(&mut self, engine: &mut Engine) -> SearchResult<()> {
        if engine.report.debug_patch.is_none() {
            return Err(SearchError::MissingDebugPatch("DebugSearch"));
        }
        Ok(())
    }

    fn explore(&mut self, engine: &mut Engine, current: Patch, fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        let debug_patch = engine.report.debug_patch.clone().unwrap_or_default();
        for edit in debug_patch.edits {
            let patch = Patch::new().with(edit);
            let (variant, run) = engine.evaluate_patch(&patch, false)?;
            let mut best = false;
            let accept = run.is_success();
            if accept {
                best = update_best(engine, &patch, &run.fitness);
            }
            engine.hook_evaluation(&variant, &run, accept, best);
            engine.stats.steps += 1;
        }
        engine.report.stop = Some(StopReason::DebugEnd);
        Ok((current, fitness))
    }
}

/// Independent random patches of one edit
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomSearch;

impl SearchStrategy for RandomSearch {
    fn name(&self) -> &'static str {
        "Random Search"
    }

    fn explore(&mut self, engine: &mut Engine, _current: Patch, _fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        let mut patch = Patch::new();
        let (delete_prob, horizon) = (engine.config().ls.delete_prob, engine.config().ls.horizon);
        mutate_horizon(engine, &mut patch, delete_prob, horizon)?;

        let (variant, run) = engine.evaluate_patch(&patch, false)?;
        let best = run.is_success() && update_best(engine, &patch, &run.fitness);
        engine.hook_evaluation(&variant, &run, false, best);
        engine.stats.steps += 1;
        Ok((patch, run.fitness))
    }
}

/// Moves to every successful neighbour
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomWalk;

impl SearchStrategy for RandomWalk {
    fn name(&self) -> &'static str {
        "Random Walk"
    }

    fn explore(&mut self, engine: &mut Engine, current: Patch, fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        let patch = propose(engine, &current, |_| true)?;
        let (variant, run) = engine.evaluate_patch(&patch, false)?;
        let mut accept = engine.config().ls.accept_fail;
        let mut best = false;
        if run.is_success() {
            accept = true;
            best = update_best(engine, &patch, &run.fitness);
        }

        let next = if accept {
            engine.stats.neighbours = 0;
            (patch.clone(), run.fitness.clone())
        } else {
            engine.stats.neighbours += 1;
            let max_neighbours = engine.config().ls.max_neighbours;
            check_if_trapped(engine, max_neighbours);
            (current, fitness)
        };

        engine.hook_evaluation(&variant, &run, accept, best);
        engine.stats.steps += 1;
        Ok(next)
    }
}

/// Hill climbing that takes the first neighbour not worse than current
#[derive(Debug, Default, Clone)]
pub struct FirstImprovement {
    local_tabu: HashSet<Patch>,
}

impl SearchStrategy for FirstImprovement {
    fn name(&self) -> &'static str {
        "First Improvement"
    }

    fn explore(&mut self, engine: &mut Engine, current: Patch, fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        let patch = propose(engine, &current, |p| !self.local_tabu.contains(p))?;
        let (variant, run) = engine.evaluate_patch(&patch, false)?;
        let mut accept = false;
        let mut best = false;
        if run.is_success() && !engine.dominates(fitness.as_deref(), run.fitness.as_deref()) {
            accept = true;
            best = update_best(engine, &patch, &run.fitness);
        }

        let next = if accept {
            self.local_tabu.clear();
            engine.stats.neighbours = 0;
            (patch.clone(), run.fitness.clone())
        } else {
            if patch.len() < current.len() {
                self.local_tabu.insert(patch);
            }
            engine.stats.neighbours += 1;
            let max_neighbours = engine.config().ls.max_neighbours;
            check_if_trapped(engine, max_neighbours);
            (current, fitness)
        };

        engine.hook_evaluation(&variant, &run, accept, best);
        engine.stats.steps += 1;
        Ok(next)
    }
}

/// Which neighbour a [`Neighbourhood`] search commits to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Champion {
    /// Best neighbour not worse than current
    Best,
    /// Least improving neighbour not worse than current
    Worst,
    /// Best neighbour overall, never revisiting committed patches
    Tabu,
}

/// Samples a neighbourhood before committing to one of its members
#[derive(Debug, Clone)]
pub struct Neighbourhood {
    champion: Champion,
    local: Option<(Patch, Fitness)>,
    local_tabu: HashSet<Patch>,
    tabu_list: VecDeque<Patch>,
}

impl Neighbourhood {
    fn new(champion: Champion) -> Self {
        Self {
            champion,
            local: None,
            local_tabu: HashSet::new(),
            tabu_list: VecDeque::from([Patch::new()]),
        }
    }

    /// Push a committed patch, then drop the oldest entries until fewer
    /// than `length` remain
    fn remember(&mut self, patch: Patch, length: usize) {
        self.tabu_list.push_back(patch);
        while !self.tabu_list.is_empty() && self.tabu_list.len() >= length {
            self.tabu_list.pop_front();
        }
    }

    #[must_use]
    pub fn best() -> Self {
        Self::new(Champion::Best)
    }

    #[must_use]
    pub fn worst() -> Self {
        Self::new(Champion::Worst)
    }

    #[must_use]
    pub fn tabu() -> Self {
        Self::new(Champion::Tabu)
    }

    #[must_use]
    pub fn champion(&self) -> Champion {
        self.champion
    }

    fn local_fitness(&self) -> Option<&[f64]> {
        self.local.as_ref().and_then(|(_, f)| f.as_deref())
    }

    /// Consider a successful neighbour as local champion; returns whether
    /// it became the global best
    fn consider(&mut self, engine: &mut Engine, patch: &Patch, fitness: &Fitness, current: &Fitness) -> bool {
        let candidate = fitness.as_deref();
        match self.champion {
            Champion::Best => {
                if engine.dominates(current.as_deref(), candidate) {
                    return false;
                }
                if engine.dominates(self.local_fitness(), candidate) {
                    return false;
                }
                self.local = Some((patch.clone(), fitness.clone()));
                update_best(engine, patch, fitness)
            }
            Champion::Worst => {
                if !engine.dominates(current.as_deref(), candidate)
                    && (self.local.is_none() || !engine.dominates(candidate, self.local_fitness()))
                {
                    self.local = Some((patch.clone(), fitness.clone()));
                }
                update_best(engine, patch, fitness)
            }
            Champion::Tabu => {
                if !engine.dominates(self.local_fitness(), candidate) {
                    self.local = Some((patch.clone(), fitness.clone()));
                }
                update_best(engine, patch, fitness)
            }
        }
    }
}

impl SearchStrategy for Neighbourhood {
    fn name(&self) -> &'static str {
        match self.champion {
            Champion::Best => "Best Improvement",
            Champion::Worst => "Worst Improvement",
            Champion::Tabu => "Tabu Search",
        }
    }

    fn explore(&mut self, engine: &mut Engine, current: Patch, fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        let max_neighbours = engine.config().ls.max_neighbours.unwrap_or(DEFAULT_MAX_NEIGHBOURS);
        let patch = propose(engine, &current, |p| {
            !self.local_tabu.contains(p) && !(self.champion == Champion::Tabu && self.tabu_list.contains(p))
        })?;
        let (variant, run) = engine.evaluate_patch(&patch, false)?;
        let best = run.is_success() && self.consider(engine, &patch, &run.fitness, &fitness);

        let accept = engine.stats.neighbours >= max_neighbours as u64;
        let mut next = (current, fitness);
        if accept {
            if let Some(local) = self.local.take() {
                self.local_tabu.clear();
                engine.stats.neighbours = 0;
                if self.champion == Champion::Tabu {
                    self.remember(local.0.clone(), engine.config().ls.tabu_length);
                }
                next = local;
            } else {
                check_if_trapped(engine, Some(max_neighbours));
            }
        } else {
            if patch.len() < next.0.len() {
                self.local_tabu.insert(patch);
            }
            engine.stats.neighbours += 1;
            check_if_trapped(engine, Some(max_neighbours));
        }

        engine.hook_evaluation(&variant, &run, accept, best);
        engine.stats.steps += 1;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deletion(line: usize) -> Patch {
        format!("LineDeletion(('a.txt', 'line', {line}))").parse().unwrap()
    }

    #[test]
    fn tabu_list_keeps_fewer_than_its_length() {
        let mut tabu = Neighbourhood::tabu();
        for line in 0..5 {
            tabu.remember(deletion(line), 3);
        }
        assert_eq!(tabu.tabu_list, VecDeque::from([deletion(3), deletion(4)]));

        tabu.remember(deletion(9), 0);
        assert!(tabu.tabu_list.is_empty());
    }
}
