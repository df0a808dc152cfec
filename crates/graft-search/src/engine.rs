//! Search engine: state shared by every strategy
//!
//! Provides the run lifecycle and the services strategies build on:
//! - Warmup: repeated evaluation of the unmodified program
//! - Cache-augmented evaluation and budget accounting
//! - Random edit creation from the configured edit kinds
//! - Fitness domination and stopping conditions
//! - Evaluation log lines
//!
//! A run goes warmup, start, main loop, end. Cancellation is observed
//! between steps only, through a shared flag.

use crate::cache::EvalCache;
use crate::config::SearchConfig;
use crate::dominance;
use crate::error::{SearchError, SearchResult};
use crate::report::{Report, Stats, StopReason};
use crate::strategy::SearchStrategy;
use graft_core::{Edit, Patch, Variant};
use graft_eval::run_result::render_float;
use graft_eval::{batch, render_fitness, RunResult, Software};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Search state around one target software
#[derive(Debug)]
pub struct Engine {
    software: Software,
    config: SearchConfig,
    maximize: Vec<bool>,
    cache: EvalCache,
    rng: StdRng,
    interrupt: Arc<AtomicBool>,
    pub stats: Stats,
    pub report: Report,
}

impl Engine {
    /// Seed the generator from the software settings and shuffle the batch
    /// bins as configured
    #[must_use]
    pub fn new(software: Software, mut config: SearchConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(software.settings().seed);
        batch::shuffle_bins(
            &mut config.batch_bins,
            config.batch_shuffle,
            config.batch_bin_shuffle,
            &mut rng,
        );
        Self {
            maximize: software.maximize(),
            cache: EvalCache::new(config.cache_maxsize, config.cache_keep),
            software,
            config,
            rng,
            interrupt: Arc::new(AtomicBool::new(false)),
            stats: Stats::default(),
            report: Report::default(),
        }
    }

    /// Observe `flag` for cancellation
    #[must_use]
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = flag;
        self
    }

    /// Flag that cancels the run once set
    #[must_use]
    pub fn interrupt_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.interrupt)
    }

    /// Zero statistics and report, keeping the patch under analysis
    pub fn reset(&mut self) {
        let debug_patch = self.report.debug_patch.take();
        self.stats = Stats::default();
        self.report = Report {
            debug_patch,
            ..Report::default()
        };
    }

    #[must_use]
    pub fn software(&self) -> &Software {
        &self.software
    }

    pub fn software_mut(&mut self) -> &mut Software {
        &mut self.software
    }

    #[must_use]
    pub fn into_software(self) -> Software {
        self.software
    }

    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }

    #[must_use]
    pub fn cache(&self) -> &EvalCache {
        &self.cache
    }

    /// Continue with the cache of a previous phase
    pub fn cache_copy(&mut self, other: &Self) {
        self.cache = other.cache.clone();
    }

    /// Drop every cached result
    pub fn cache_reset(&mut self) {
        self.cache = EvalCache::new(self.config.cache_maxsize, self.config.cache_keep);
    }

    /// Per-objective maximize flags
    #[must_use]
    pub fn maximize(&self) -> &[bool] {
        &self.maximize
    }

    #[must_use]
    pub fn dominates(&self, a: Option<&[f64]>, b: Option<&[f64]>) -> bool {
        dominance::dominates(a, b, &self.maximize)
    }

    #[must_use]
    pub fn dominates_or_equal(&self, a: Option<&[f64]>, b: Option<&[f64]>) -> bool {
        dominance::dominates_or_equal(a, b, &self.maximize)
    }

    /// Materialize `patch` against the reference
    ///
    /// # Errors
    /// Returns [`SearchError::Model`] if an edit does not fit its model.
    pub fn variant(&self, patch: Patch) -> SearchResult<Variant> {
        Ok(Variant::new(
            self.software.reference(),
            patch,
            self.software.settings().diff_method,
        )?)
    }

    /// Random edit of a random configured kind
    ///
    /// # Errors
    /// Returns [`SearchError::NoPossibleEdits`] without edit kinds, or
    /// [`SearchError::EditCreation`] once the retry budget is spent.
    pub fn create_edit(&mut self) -> SearchResult<Edit> {
        let kind = self
            .config
            .possible_edits
            .choose(&mut self.rng)
            .cloned()
            .ok_or(SearchError::NoPossibleEdits)?;
        let retries = self.software.settings().edit_retries.max(1);
        Ok(kind.create(self.software.reference(), retries, &mut self.rng)?)
    }

    /// Evaluate through the cache unless `force`
    ///
    /// # Errors
    /// Returns [`SearchError::Eval`] if the variant cannot be staged.
    pub fn evaluate_variant(&mut self, variant: &Variant, force: bool) -> SearchResult<RunResult> {
        let key = variant.fingerprint();
        let cached = if self.cache.is_enabled() && !force {
            self.cache.get(&key)
        } else {
            None
        };
        let run = self.software.evaluate(variant, cached)?;
        self.cache.set(key, run.clone());
        if run.updated {
            self.stats.budget += 1;
        }
        Ok(run)
    }

    /// Materialize then evaluate
    ///
    /// # Errors
    /// See [`variant`](Self::variant) and
    /// [`evaluate_variant`](Self::evaluate_variant).
    pub fn evaluate_patch(&mut self, patch: &Patch, force: bool) -> SearchResult<(Variant, RunResult)> {
        let variant = self.variant(patch.clone())?;
        let run = self.evaluate_variant(&variant, force)?;
        Ok((variant, run))
    }

    /// Run `strategy` to completion
    ///
    /// Stops recorded in the report (warmup failure, budgets, interrupt)
    /// are not errors.
    ///
    /// # Errors
    /// Returns [`SearchError`] on configuration, staging or edit creation
    /// failures; the end hook still runs.
    pub fn run(&mut self, strategy: &mut dyn SearchStrategy) -> SearchResult<()> {
        let outcome = self.run_phases(strategy);
        let end = self.hook_end();
        outcome.and(end)
    }

    fn run_phases(&mut self, strategy: &mut dyn SearchStrategy) -> SearchResult<()> {
        self.hook_warmup()?;
        strategy.on_warmup(self)?;
        self.warmup()?;
        if self.report.stop.is_some() {
            return Ok(());
        }
        self.hook_start(strategy.name())?;
        strategy.on_start(self)?;
        strategy.search(self)
    }

    /// Reshuffle the instances of every bin
    pub fn shuffle_batch_instances(&mut self) {
        batch::shuffle_bins(&mut self.config.batch_bins, true, false, &mut self.rng);
    }

    /// Resample the batch; after warmup, re-measure the initial and best
    /// patches on the new batch
    ///
    /// # Errors
    /// Returns [`SearchError::InitialFailed`] if the unmodified program
    /// fails on the new batch.
    pub fn reset_batch(&mut self) -> SearchResult<()> {
        let batch = batch::sample(&self.config.batch_bins, self.config.batch_sample_size);
        self.software.set_batch(batch);
        if self.report.initial_fitness.is_none() {
            return Ok(());
        }
        let empty = Patch::new();
        let (_, run) = self.evaluate_patch(&empty, false)?;
        self.report.initial_fitness = run.fitness.clone();
        self.report.best_fitness = run.fitness.clone();
        self.log_warmup("INITIAL", &run);
        if !run.is_success() {
            return Err(SearchError::InitialFailed(run.status.to_string()));
        }
        if let Some(best) = self.report.best_patch.clone().filter(|p| !p.is_empty()) {
            let (_, run) = self.evaluate_patch(&best, false)?;
            let better = self.dominates(run.fitness.as_deref(), self.report.best_fitness.as_deref());
            self.log_eval(
                "BEST",
                &run.status.to_string(),
                if better { '*' } else { ' ' },
                run.fitness.as_deref(),
                self.report.initial_fitness.as_deref(),
                Some(best.len()),
                &run.log,
            );
            if run.is_success() && better {
                self.report.best_fitness = run.fitness;
            } else {
                self.report.best_patch = Some(empty);
            }
        }
        Ok(())
    }

    fn hook_warmup(&mut self) -> SearchResult<()> {
        self.reset_batch()?;
        self.stats.wallclock_start = Instant::now();
        info!("==== WARMUP ====");
        Ok(())
    }

    /// Measure the unmodified program `warmup` times
    ///
    /// A failure records a stop reason naming the failing step.
    ///
    /// # Errors
    /// Returns [`SearchError`] on staging failures.
    pub fn warmup(&mut self) -> SearchResult<()> {
        let empty = Patch::new();
        let variant = self.variant(empty.clone())?;
        if self.report.initial_patch.is_none() {
            self.report.initial_patch = Some(empty.clone());
        }
        let mut values = Vec::new();
        let mut last = None;
        for _ in 0..self.config.warmup.max(1) {
            let run = self.evaluate_variant(&variant, true)?;
            self.log_warmup("WARM", &run);
            match &run.fitness {
                Some(fitness) if run.is_success() => values.push(fitness.clone()),
                _ => {
                    self.report.stop = Some(StopReason::WarmupFailed(run.status.step().to_string()));
                    return Ok(());
                }
            }
            last = Some(run);
        }
        let Some(mut run) = last else {
            return Ok(());
        };
        let initial = self.config.warmup_strategy.combine(&values);
        run.fitness = initial.clone();
        self.cache.set(variant.fingerprint(), run.clone());
        self.log_warmup("INITIAL", &run);
        self.report.initial_fitness = initial.clone();

        match self.report.best_patch.clone() {
            None => {
                self.report.best_fitness = initial;
                self.report.best_patch = Some(empty);
            }
            Some(best) => {
                let (_, run) = self.evaluate_patch(&best, true)?;
                self.log_warmup("BEST", &run);
                if self.dominates(run.fitness.as_deref(), initial.as_deref()) {
                    self.report.best_fitness = run.fitness;
                } else {
                    self.report.best_patch = Some(empty);
                    self.report.best_fitness = initial;
                }
            }
        }
        Ok(())
    }

    fn hook_start(&mut self, name: &str) -> SearchResult<()> {
        if self.config.possible_edits.is_empty() {
            return Err(SearchError::NoPossibleEdits);
        }
        self.stats.wallclock_start = Instant::now();
        info!("==== START: {name} ====");
        Ok(())
    }

    fn hook_end(&mut self) -> SearchResult<()> {
        self.stats.wallclock_total = self.stats.wallclock_start.elapsed();
        if let Some(best) = self.report.best_patch.clone() {
            let variant = self.variant(best)?;
            self.report.diff = Some(variant.diff().to_string());
        }
        info!("==== END ====");
        Ok(())
    }

    /// Whether cancellation was requested, recording it as the stop reason
    pub fn interrupted(&mut self) -> bool {
        if self.interrupt.load(Ordering::SeqCst) {
            self.report.stop = Some(StopReason::Interrupted);
            true
        } else {
            false
        }
    }

    /// Whether the run must stop, recording why
    pub fn stopping_condition(&mut self) -> bool {
        if self.report.stop.is_some() {
            return true;
        }
        let reason = if self.interrupt.load(Ordering::SeqCst) {
            Some(StopReason::Interrupted)
        } else if self.config.stop.budget.is_some_and(|b| self.stats.budget >= b) {
            Some(StopReason::Budget)
        } else if self
            .config
            .stop
            .wall
            .is_some_and(|w| self.stats.wallclock_start.elapsed() >= w)
        {
            Some(StopReason::TimeBudget)
        } else if self.config.stop.steps.is_some_and(|s| self.stats.steps >= s) {
            Some(StopReason::StepBudget)
        } else if self.config.stop.fitness.is_some()
            && self.report.best_fitness.is_some()
            && self.dominates_or_equal(
                self.report.best_fitness.as_deref(),
                self.config.stop.fitness.as_deref(),
            )
        {
            Some(StopReason::TargetFitness)
        } else {
            None
        };
        self.report.stop = reason;
        self.report.stop.is_some()
    }

    /// Log one evaluation; `*` marks a new best, `+` an accepted move
    pub fn hook_evaluation(&self, variant: &Variant, run: &RunResult, accept: bool, best: bool) {
        let mark = if best {
            '*'
        } else if accept {
            '+'
        } else {
            ' '
        };
        debug!("{}", variant.patch());
        self.log_eval(
            &self.log_counter(),
            &run.status.to_string(),
            mark,
            run.fitness.as_deref(),
            self.report.initial_fitness.as_deref(),
            Some(variant.patch().len()),
            &run.log,
        );
        if accept || best {
            debug!("{}", variant.diff());
        }
    }

    /// Step number, or `generation-individual` for population strategies
    #[must_use]
    pub fn log_counter(&self) -> String {
        match self.stats.generation {
            Some(gen) => {
                let pop = self.config.gp.pop_size.max(1) as u64;
                format!("{gen}-{}", self.stats.steps % pop + 1)
            }
            None => (self.stats.steps + 1).to_string(),
        }
    }

    fn log_warmup(&self, counter: &str, run: &RunResult) {
        self.log_eval(
            counter,
            &run.status.to_string(),
            ' ',
            run.fitness.as_deref(),
            None,
            None,
            &run.log,
        );
        if !run.is_success() {
            self.software.diagnose(run);
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn log_eval(
        &self,
        counter: &str,
        status: &str,
        mark: char,
        fitness: Option<&[f64]>,
        baseline: Option<&[f64]>,
        patch_size: Option<usize>,
        log: &str,
    ) {
        let text = format!(
            "{} {} {}",
            render_fitness(fitness),
            ratio(fitness, baseline),
            patch_size.map(|n| format!("[{n} edit(s)] ")).unwrap_or_default()
        );
        info!("{counter:<7} {status:<20} {mark:>1}{text:<24}{log}");
    }
}

/// `(NN%)` of each objective relative to the baseline
fn ratio(fitness: Option<&[f64]>, baseline: Option<&[f64]>) -> String {
    let (Some(fitness), Some(baseline)) = (fitness, baseline) else {
        return String::new();
    };
    let parts: Vec<String> = fitness
        .iter()
        .zip(baseline)
        .map(|(f, b)| render_float((100.0 * f / b * 100.0).round() / 100.0))
        .collect();
    format!("({}%)", parts.join("% "))
}
