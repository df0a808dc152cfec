//! Target software and its evaluation pipeline
//!
//! `INIT` runs once when the software is created. `SETUP` runs once, on
//! the first evaluation, which must be of the unmodified program. Then every
//! evaluation goes through `COMPILE`, `TEST` and `RUN`, each skipped when
//! its command is unset, the first failing stage ending the evaluation.
//! `RUN` executes once per batch instance and its results are aggregated
//! per bin, then across bins.

use crate::aggregate;
use crate::batch;
use crate::config::{SoftwareConfig, StageCommand};
use crate::error::{EvalError, EvalResult, ExecError};
use crate::exec::{run_command, ExecRequest, ExecResult};
use crate::fitness::{process_stage, Measure, Objective, StageRun};
use crate::run_result::{render_fitness, InstanceOutcome, RunResult};
use crate::status::{RunStatus, Stage, StatusKind};
use crate::workdir::{self, RunLabel};
use graft_core::{Model, MutationModel, Settings, Variant};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Target program under evaluation
#[derive(Debug)]
pub struct Software {
    config: SoftwareConfig,
    settings: Settings,
    /// Directory the work copy is synced from
    root: PathBuf,
    basename: String,
    label: RunLabel,
    run_dir: PathBuf,
    target_files: Vec<String>,
    reference: Variant,
    batch: Vec<Vec<String>>,
    setup_done: bool,
    env: Vec<(String, String)>,
}

impl Software {
    /// Reserve a run label, stage the work directory, run `INIT` and parse
    /// the reference variant
    ///
    /// # Errors
    /// Returns [`EvalError`] if the target cannot be staged or parsed, or
    /// if `INIT` fails.
    pub fn new(config: SoftwareConfig, settings: &Settings) -> EvalResult<Self> {
        let original = fs::canonicalize(&config.path).map_err(|e| ExecError::io_error(&config.path, e))?;
        let basename = original
            .file_name()
            .map_or_else(|| "target".to_string(), |n| n.to_string_lossy().into_owned());

        let label = RunLabel::reserve(&settings.work_dir, &basename, chrono::Utc::now().timestamp())?;
        let run_dir = absolute(&settings.work_dir).join(label.label());
        let root = if settings.local_original_copy {
            let copy = run_dir.join(&settings.local_original_name);
            workdir::copy_tree(&original, &copy)?;
            copy
        } else {
            fs::create_dir_all(&run_dir).map_err(|e| ExecError::io_error(&run_dir, e))?;
            original
        };
        label.release(&settings.work_dir)?;

        let graft_root = std::env::current_dir().unwrap_or_default();
        let env = vec![
            ("GRAFT_ROOT".to_string(), graft_root.display().to_string()),
            ("GRAFT_LOG_DIR".to_string(), settings.log_dir.display().to_string()),
            ("GRAFT_WORK_DIR".to_string(), settings.work_dir.display().to_string()),
            ("GRAFT_BASENAME".to_string(), basename.clone()),
            ("GRAFT_TIMESTAMP".to_string(), label.timestamp.to_string()),
        ];

        let mut software = Self {
            config,
            settings: settings.clone(),
            root,
            basename,
            label,
            run_dir,
            target_files: Vec::new(),
            reference: Variant::reference(graft_core::Models::new()),
            batch: batch::empty_batch(),
            setup_done: false,
            env,
        };
        software.run_init()?;
        software.target_files = workdir::expand_targets(&software.root, &software.config.target_files)?;
        software.reference = Variant::load_reference(
            &software.root,
            &software.target_files,
            &software.config.model_rules,
            &software.config.model_options,
        )?;
        info!(label = %software.run_label(), files = software.target_files.len(), "software ready");
        Ok(software)
    }

    fn run_init(&mut self) -> EvalResult<()> {
        let Some(cmd) = self.config.init.clone() else {
            return Ok(());
        };
        let cwd = self.root.clone();
        let (exec, status, _) = self.run_stage(&cmd, "", None, &cwd, &[]);
        if status == StatusKind::Success {
            return Ok(());
        }
        let mut run = RunResult::new(RunStatus::at(Stage::Init, status));
        run.last_exec = Some(exec);
        self.diagnose(&run);
        Err(EvalError::Init {
            status: run.status.to_string(),
        })
    }

    /// `<basename>_<timestamp>`
    #[must_use]
    pub fn run_label(&self) -> String {
        self.label.label()
    }

    #[must_use]
    pub fn basename(&self) -> &str {
        &self.basename
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn config(&self) -> &SoftwareConfig {
        &self.config
    }

    /// Unmodified variant, parsed once
    #[must_use]
    pub fn reference(&self) -> &Variant {
        &self.reference
    }

    /// Expanded target file names
    #[must_use]
    pub fn target_files(&self) -> &[String] {
        &self.target_files
    }

    #[must_use]
    pub fn objectives(&self) -> &[Objective] {
        &self.config.objectives
    }

    /// Per-objective maximize flags
    #[must_use]
    pub fn maximize(&self) -> Vec<bool> {
        self.config.maximize()
    }

    /// Current batch, one list of instances per bin
    #[must_use]
    pub fn batch(&self) -> &[Vec<String>] {
        &self.batch
    }

    /// Replace the batch; an empty batch means one empty instance
    pub fn set_batch(&mut self, batch: Vec<Vec<String>>) {
        self.batch = if batch.iter().all(Vec::is_empty) {
            batch::empty_batch()
        } else {
            batch
        };
    }

    /// Directory commands run in
    #[must_use]
    pub fn work_path(&self) -> PathBuf {
        self.run_dir.join(&self.basename)
    }

    /// Evaluate a variant, reusing what `cached` already holds
    ///
    /// A cached result without instance outcomes is a cached failure and is
    /// returned as is. When every instance of the current batch is cached
    /// the result is only re-aggregated; otherwise the missing instances
    /// are run and added to it.
    ///
    /// # Errors
    /// Returns [`EvalError`] when the work directory cannot be staged or
    /// when the first evaluation is not of the unmodified program.
    pub fn evaluate(&mut self, variant: &Variant, cached: Option<RunResult>) -> EvalResult<RunResult> {
        let mut run = match cached {
            None => {
                self.write_variant(variant)?;
                RunResult::default()
            }
            Some(cached) if cached.cache.is_empty() => return Ok(cached),
            Some(mut cached) if self.batch.iter().flatten().all(|i| cached.cache.contains_key(i)) => {
                self.finalize_batch(&mut cached);
                return Ok(cached);
            }
            Some(cached) => {
                self.write_variant(variant)?;
                cached
            }
        };
        run.updated = true;
        let work = self.work_path();
        let mut defaults: Vec<Option<f64>> = vec![None; self.config.objectives.len()];

        if !self.setup_done {
            self.setup_done = true;
            if variant.dumps() != self.reference.dumps() {
                return Err(EvalError::SetupOnModified);
            }
            if let Some(cmd) = self.config.setup.clone() {
                let cli = self.compute_cli(variant, Stage::Setup);
                let (exec, status, _) = self.run_stage(&cmd, &cli, None, &work, &[]);
                run.last_exec = Some(exec);
                if status != StatusKind::Success {
                    run.status = RunStatus::at(Stage::Setup, status);
                    run.fitness = None;
                    return Ok(run);
                }
            }
            // keep setup artifacts across later syncs
            workdir::sync_folder(&self.root, &work)?;
        }

        let mut last_stage = None;
        for stage in [Stage::Compile, Stage::Test] {
            let Some(cmd) = self.config.command(stage).cloned() else {
                continue;
            };
            last_stage = Some(stage);
            let cli = self.compute_cli(variant, stage);
            let files = renamed_files(variant);
            let (exec, status, values) = self.run_stage(&cmd, &cli, None, &work, &files);
            run.status = RunStatus::at(stage, status);
            run.last_exec = Some(exec);
            if status != StatusKind::Success {
                run.fitness = None;
                return Ok(run);
            }
            merge(&mut defaults, &values);
        }

        let Some(cmd) = self.config.run.clone() else {
            if let Some(stage) = last_stage {
                match complete(&defaults) {
                    Some(fitness) => run.fitness = Some(fitness),
                    None => {
                        run.status = RunStatus::at(stage, StatusKind::ParseError);
                        run.fitness = None;
                    }
                }
            }
            return Ok(run);
        };

        let cli = self.compute_cli(variant, Stage::Run);
        let files = renamed_files(variant);
        let mut batch_time = self.config.batch_timeout.map(|d| d.as_secs_f64());
        #[allow(clippy::cast_possible_wrap)]
        let mut batch_length = self.config.batch_lengthout.map(|n| n as i64);
        let instances: Vec<String> = self.batch.iter().flatten().cloned().collect();
        for inst in instances {
            if run.cache.contains_key(&inst) {
                continue;
            }
            let (exec, status, values) = self.run_stage(&cmd, &cli, Some(&inst), &work, &files);
            let mut fitness = defaults.clone();
            merge(&mut fitness, &values);
            let (status, fitness) = match (status, complete(&fitness)) {
                (StatusKind::Success, None) => (StatusKind::ParseError, None),
                (StatusKind::Success, Some(f)) => (StatusKind::Success, Some(f)),
                (other, _) => (other, None),
            };
            run.status = RunStatus::at(Stage::Run, status);
            if !inst.is_empty() {
                debug!("EXEC> {} {} {}", inst, run.status, render_fitness(fitness.as_deref()));
            }
            run.cache.insert(
                inst,
                InstanceOutcome {
                    status: run.status,
                    fitness,
                },
            );
            let runtime = exec.runtime;
            #[allow(clippy::cast_possible_wrap)]
            let length = exec.output_length as i64;
            run.last_exec = Some(exec);
            if !run.status.is_success() {
                break;
            }
            if let Some(left) = batch_time.as_mut() {
                *left -= runtime.as_secs_f64();
                if *left < 0.0 {
                    run.status = RunStatus::at(Stage::Batch, StatusKind::Timeout);
                    break;
                }
            }
            if let Some(left) = batch_length.as_mut() {
                *left -= length;
                if *left < 0 {
                    run.status = RunStatus::at(Stage::Batch, StatusKind::Lengthout);
                    break;
                }
            }
        }
        self.finalize_batch(&mut run);
        Ok(run)
    }

    /// Aggregate the cached instance outcomes of the current batch
    fn finalize_batch(&self, run: &mut RunResult) {
        let mut bins = Vec::with_capacity(self.batch.len());
        for bin in &self.batch {
            let mut values = Vec::with_capacity(bin.len());
            for inst in bin {
                match run.cache.get(inst) {
                    Some(InstanceOutcome {
                        status,
                        fitness: Some(fitness),
                    }) if status.is_success() => values.push(fitness.clone()),
                    _ => {
                        run.fitness = None;
                        return;
                    }
                }
            }
            bins.push(values);
        }
        run.fitness = Some(aggregate::aggregate(&bins, self.config.bin_strategy, self.config.batch_strategy));
    }

    /// Run one stage command and let every objective inspect it
    fn run_stage(
        &self,
        cmd: &StageCommand,
        cli: &str,
        instance: Option<&str>,
        cwd: &Path,
        files: &[String],
    ) -> (ExecResult, StatusKind, Vec<Option<f64>>) {
        // unbalanced quotes leave nothing to spawn, which reports a CLI error
        let argv = cmd.render(cli, instance).unwrap_or_default();
        let exec = run_command(&ExecRequest {
            cmd: &argv,
            cwd,
            env: &self.env,
            timeout: cmd.timeout,
            lengthout: cmd.lengthout,
        });
        let mut status = exec.status;
        let mut values = vec![None; self.config.objectives.len()];
        if status == StatusKind::Success {
            let stage_run = StageRun {
                exec: &exec,
                work_path: cwd,
                target_files: files,
            };
            for (objective, value) in self.config.objectives.iter().zip(values.iter_mut()) {
                let mut measure = Measure::success();
                process_stage(objective.extractor.as_ref(), cmd.stage, &mut measure, &stage_run);
                if measure.status != StatusKind::Success && status == StatusKind::Success {
                    status = measure.status;
                }
                *value = measure.fitness;
            }
        }
        (exec, status, values)
    }

    /// Command-line parameters contributed by parameter models for `stage`
    fn compute_cli(&self, variant: &Variant, stage: Stage) -> String {
        variant
            .models()
            .values()
            .filter_map(Model::as_params)
            .filter(|m| m.timing().iter().any(|t| t == stage.key()))
            .map(graft_core::models::ParamsModel::resolve_cli)
            .filter(|cli| !cli.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Sync the work copy and write every target file that differs
    ///
    /// # Errors
    /// Returns [`ExecError::Io`] on filesystem failures.
    pub fn write_variant(&self, variant: &Variant) -> Result<(), ExecError> {
        let work = self.work_path();
        workdir::sync_folder(&work, &self.root)?;
        for (file, model) in variant.models() {
            let Some(dump) = variant.dumps().get(file) else {
                continue;
            };
            let path = work.join(model.renamed_filename());
            if self.reference.dumps().get(file) == Some(dump) {
                if self.settings.trust_local_filesystem {
                    continue;
                }
                if fs::read_to_string(&path).is_ok_and(|on_disk| &on_disk == dump) {
                    continue;
                }
            }
            fs::write(&path, dump).map_err(|e| ExecError::io_error(&path, e))?;
        }
        Ok(())
    }

    /// Log a self-diagnostic for a failed evaluation
    pub fn diagnose(&self, run: &RunResult) {
        let rule = "!*".repeat(40);
        info!("{rule}");
        info!("Unable to run and evaluate the target software.");
        info!("Self-diagnostic:");
        for line in run.status.diagnostic() {
            info!("  {line}");
        }
        info!("{rule}");
        if let Some(exec) = &run.last_exec {
            info!("CWD: {}", self.work_path().display());
            info!("CMD: {}", exec.command_line());
            info!("STATUS: {}", run.status);
            info!(
                "RETURN_CODE: {}",
                exec.return_code.map_or_else(|| "None".to_string(), |c| c.to_string())
            );
            info!("RUNTIME: {:.4}", exec.runtime.as_secs_f64());
            info!("STDOUT: (see log file)");
            debug!("STDOUT:\n{}", exec.stdout_text());
            info!("STDERR: (see log file)");
            debug!("STDERR:\n{}", exec.stderr_text());
        }
    }

    /// Remove this run's work directory
    ///
    /// # Errors
    /// Returns [`ExecError::Io`] on filesystem failures.
    pub fn clean_work_dir(&self) -> Result<(), ExecError> {
        workdir::clean(&self.run_dir, &self.settings.work_dir)
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().unwrap_or_default().join(path)
    }
}

fn renamed_files(variant: &Variant) -> Vec<String> {
    variant.models().values().map(|m| m.renamed_filename().to_string()).collect()
}

fn merge(into: &mut [Option<f64>], values: &[Option<f64>]) {
    for (slot, value) in into.iter_mut().zip(values) {
        if value.is_some() {
            *slot = *value;
        }
    }
}

fn complete(values: &[Option<f64>]) -> Option<Vec<f64>> {
    values.iter().copied().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_keeps_earlier_values() {
        let mut fitness = vec![Some(1.0), None, Some(3.0)];
        merge(&mut fitness, &[None, Some(2.0), Some(4.0)]);
        assert_eq!(fitness, vec![Some(1.0), Some(2.0), Some(4.0)]);
    }

    #[test]
    fn incomplete_fitness_is_absent() {
        assert_eq!(complete(&[Some(1.0), Some(2.0)]), Some(vec![1.0, 2.0]));
        assert_eq!(complete(&[Some(1.0), None]), None);
        assert_eq!(complete(&[]), Some(Vec::new()));
    }

    #[test]
    fn relative_paths_become_absolute() {
        assert!(absolute(Path::new("work")).is_absolute());
        assert_eq!(absolute(Path::new("/tmp/w")), PathBuf::from("/tmp/w"));
    }
}
