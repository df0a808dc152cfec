//! Genetic programming over patches
//!
//! Each generation selects the successful individuals ordered best first,
//! then builds offspring from an elitism slice, a crossover slice, a
//! mutation slice and random regrowth up to the population size.

use crate::dominance;
use crate::engine::Engine;
use crate::error::SearchResult;
use crate::strategy::SearchStrategy;
use graft_core::{Edit, Patch};
use graft_eval::RunResult;
use indexmap::IndexMap;
use rand::seq::{index, SliceRandom};
use rand::Rng;

type Fitness = Option<Vec<f64>>;

/// How two parents combine into one child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossover {
    /// Every edit of the first parent, then every edit of the second
    Concat,
    /// Prefix of the first parent, suffix of the second
    OnePoint,
    /// Middle slice of the second parent spliced into the first
    TwoPoint,
    /// Each edit kept independently, parents concatenated
    UniformConcat,
    /// Each edit kept independently, parents merged by relative position
    UniformInterleaved,
}

impl Crossover {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Concat => "Genetic Programming",
            Self::OnePoint => "Genetic Programming (1-point)",
            Self::TwoPoint => "Genetic Programming (2-point)",
            Self::UniformConcat => "Genetic Programming (uniform+concatenation)",
            Self::UniformInterleaved => "Genetic Programming (uniform+interleaved)",
        }
    }

    /// Child of `a` and `b`; `uniform_rate` is the per-edit drop
    /// probability of the uniform policies
    pub fn apply<R: Rng + ?Sized>(self, a: &Patch, b: &Patch, uniform_rate: f64, rng: &mut R) -> Patch {
        match self {
            Self::Concat => a.edits.iter().chain(&b.edits).cloned().collect::<Vec<_>>().into(),
            Self::OnePoint => {
                let k1 = rng.gen_range(0..=a.len());
                let k2 = rng.gen_range(0..=b.len());
                a.edits[..k1].iter().chain(&b.edits[k2..]).cloned().collect::<Vec<_>>().into()
            }
            Self::TwoPoint => {
                let (k1, k2) = (rng.gen_range(0..=a.len()), rng.gen_range(0..=a.len()));
                let (k3, k4) = (rng.gen_range(0..=b.len()), rng.gen_range(0..=b.len()));
                a.edits[..k1.min(k2)]
                    .iter()
                    .chain(&b.edits[k3.min(k4)..k3.max(k4)])
                    .chain(&a.edits[k1.max(k2)..])
                    .cloned()
                    .collect::<Vec<_>>()
                    .into()
            }
            Self::UniformConcat => {
                let mut edits = Vec::new();
                for edit in a.edits.iter().chain(&b.edits) {
                    if rng.gen::<f64>() > uniform_rate {
                        edits.push(edit.clone());
                    }
                }
                non_empty(edits, a, b, rng)
            }
            Self::UniformInterleaved => {
                let mut picks: Vec<(f64, usize, &Edit)> = Vec::new();
                for (side, parent) in [a, b].into_iter().enumerate() {
                    let n = parent.len();
                    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
                    let amount = ((n as f64) * uniform_rate).ceil() as usize;
                    let mut chosen = index::sample(rng, n, amount.min(n)).into_vec();
                    chosen.sort_unstable();
                    #[allow(clippy::cast_precision_loss)]
                    picks.extend(chosen.into_iter().map(|i| (i as f64 / n as f64, side, &parent.edits[i])));
                }
                picks.sort_by(|x, y| x.0.total_cmp(&y.0).then(x.1.cmp(&y.1)));
                let edits = picks.into_iter().map(|(_, _, edit)| edit.clone()).collect();
                non_empty(edits, a, b, rng)
            }
        }
    }
}

/// Fall back to one random edit of a random non-empty parent
fn non_empty<R: Rng + ?Sized>(mut edits: Vec<Edit>, a: &Patch, b: &Patch, rng: &mut R) -> Patch {
    if edits.is_empty() {
        let (first, second) = if rng.gen::<f64>() > 0.5 { (a, b) } else { (b, a) };
        if let Some(edit) = first.edits.choose(rng).or_else(|| second.edits.choose(rng)) {
            edits.push(edit.clone());
        }
    }
    edits.into()
}

/// Population-based search
#[derive(Debug, Clone)]
pub struct GeneticProgramming {
    name: &'static str,
    crossover: Crossover,
    population: IndexMap<Patch, RunResult>,
}

impl GeneticProgramming {
    #[must_use]
    pub fn new(crossover: Crossover) -> Self {
        Self {
            name: crossover.label(),
            crossover,
            population: IndexMap::new(),
        }
    }

    /// Override the display name
    #[must_use]
    pub fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Current population, in evaluation order
    #[must_use]
    pub fn population(&self) -> &IndexMap<Patch, RunResult> {
        &self.population
    }

    /// Delete a random edit or append a fresh one
    fn mutate(engine: &mut Engine, patch: &mut Patch) -> SearchResult<()> {
        let delete_prob = engine.config().gp.delete_prob;
        if !patch.is_empty() && engine.rng().gen::<f64>() < delete_prob {
            let k = engine.rng().gen_range(0..patch.len());
            patch.edits.remove(k);
        } else {
            let edit = engine.create_edit()?;
            patch.edits.push(edit);
        }
        Ok(())
    }

    /// Successful individuals, best first
    fn select(&self, engine: &Engine) -> Vec<Patch> {
        let mut parents: Vec<(&Patch, &RunResult)> =
            self.population.iter().filter(|(_, run)| run.is_success()).collect();
        parents.sort_by(|(_, x), (_, y)| dominance::best_first(x.fitness.as_deref(), y.fitness.as_deref(), engine.maximize()));
        parents.into_iter().map(|(patch, _)| patch.clone()).collect()
    }

    /// Random patches not already in the population
    ///
    /// Duplicates are retried a bounded number of times, after which they
    /// are accepted.
    fn fresh(&self, engine: &mut Engine, count: usize, taken: &[Patch]) -> SearchResult<Vec<Patch>> {
        let mut retries = engine.software().settings().edit_retries * engine.config().gp.pop_size;
        let mut out = Vec::with_capacity(count);
        while out.len() < count {
            let mut sol = Patch::new();
            Self::mutate(engine, &mut sol)?;
            let duplicate = self.population.contains_key(&sol) || taken.contains(&sol) || out.contains(&sol);
            if duplicate && retries > 0 {
                retries -= 1;
                continue;
            }
            out.push(sol);
        }
        Ok(out)
    }

    /// Evaluate `offspring` as the new population
    fn replace(&mut self, engine: &mut Engine, offspring: Vec<Patch>) -> SearchResult<()> {
        self.population.clear();
        let mut local_best: Fitness = None;
        for sol in offspring {
            if engine.stopping_condition() {
                break;
            }
            let (variant, run) = engine.evaluate_patch(&sol, false)?;
            let mut accept = false;
            let mut best = false;
            if run.is_success() && engine.dominates(run.fitness.as_deref(), local_best.as_deref()) {
                local_best.clone_from(&run.fitness);
                accept = true;
                if engine.dominates(run.fitness.as_deref(), engine.report.best_fitness.as_deref()) {
                    engine.report.best_fitness.clone_from(&run.fitness);
                    engine.report.best_patch = Some(sol.clone());
                    best = true;
                }
            }
            engine.hook_evaluation(&variant, &run, accept, best);
            self.population.insert(sol, run);
            engine.stats.steps += 1;
        }
        Ok(())
    }
}

impl SearchStrategy for GeneticProgramming {
    fn name(&self) -> &'static str {
        self.name
    }

    fn on_start(&mut self, engine: &mut Engine) -> SearchResult<()> {
        engine.stats.generation = Some(0);
        let pop_size = engine.config().gp.pop_size;
        let initial = self.fresh(engine, pop_size, &[])?;
        self.replace(engine, initial)
    }

    fn on_main_loop(&mut self, engine: &mut Engine) -> SearchResult<()> {
        engine.stats.generation = Some(engine.stats.generation.map_or(1, |g| g + 1));
        if engine.config().gp.batch_reset {
            engine.shuffle_batch_instances();
            engine.reset_batch()?;
        }
        Ok(())
    }

    fn explore(&mut self, engine: &mut Engine, current: Patch, fitness: Fitness) -> SearchResult<(Patch, Fitness)> {
        let gp = engine.config().gp.clone();
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
        let slice = |rate: f64| (gp.pop_size as f64 * rate) as usize;
        let parents = self.select(engine);
        let mut offspring: Vec<Patch> = Vec::with_capacity(gp.pop_size);

        offspring.extend(parents.iter().take(slice(gp.offspring_elitism)).cloned());

        for parent in parents.iter().take(slice(gp.offspring_crossover)) {
            let Some(other) = parents.choose(engine.rng()).cloned() else {
                break;
            };
            let child = if engine.rng().gen::<f64>() > 0.5 {
                self.crossover.apply(parent, &other, gp.uniform_rate, engine.rng())
            } else {
                self.crossover.apply(&other, parent, gp.uniform_rate, engine.rng())
            };
            offspring.push(child);
        }

        for parent in parents.iter().take(slice(gp.offspring_mutation)) {
            let mut child = parent.clone();
            Self::mutate(engine, &mut child)?;
            offspring.push(child);
        }

        let missing = gp.pop_size.saturating_sub(offspring.len());
        let regrown = self.fresh(engine, missing, &offspring)?;
        offspring.extend(regrown);

        self.replace(engine, offspring)?;
        Ok((current, fitness))
    }
}
