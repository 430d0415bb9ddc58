use std::time::Instant;

use rayon::prelude::*;

use super::config::{ConfigError, ExperimentConfig};
use super::trial::{run_trial, TrialRecord, TrialSpec};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Runs every trial of an [`ExperimentConfig`] on a rayon pool.
///
/// Trials share nothing mutable: each derives its own RNG from the run seed
/// and its id, and writes only its own slot of the result vector.
pub struct ExperimentRunner {
    config: ExperimentConfig,
}

impl ExperimentRunner {
    pub fn new(config: ExperimentConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Every trial of the grid, cell major, with sequential ids.
    pub fn trial_specs(&self) -> Result<Vec<TrialSpec>, ConfigError> {
        let cells = self.config.cells()?;
        let specs = cells
            .into_iter()
            .flat_map(|params| (0..self.config.trials).map(move |replicate| (params, replicate)))
            .enumerate()
            .map(|(id, (params, replicate))| TrialSpec {
                id,
                replicate,
                params,
            })
            .collect();
        Ok(specs)
    }

    /// Run the grid. Records come back in trial order, strategies in config
    /// order within a trial, regardless of scheduling.
    pub fn run(&self) -> Result<Vec<TrialRecord>, RunError> {
        let specs = self.trial_specs()?;
        let config = &self.config;
        let budget = config.budget();
        tracing::info!(
            "running {} trials x {} strategies ({:.1}s budget each)",
            specs.len(),
            config.strategies.len(),
            budget.as_secs_f64()
        );

        let start = Instant::now();
        let evaluate = || -> Vec<Vec<TrialRecord>> {
            specs
                .par_iter()
                .map(|spec| run_trial(spec, &config.strategies, config.mip, budget, config.seed))
                .collect()
        };
        let slots = match config.threads {
            Some(threads) => rayon::ThreadPoolBuilder::new()
                .num_threads(threads)
                .build()?
                .install(evaluate),
            None => evaluate(),
        };

        let records: Vec<TrialRecord> = slots.into_iter().flatten().collect();
        tracing::info!(
            "finished {} records in {:.2}s",
            records.len(),
            start.elapsed().as_secs_f64()
        );
        Ok(records)
    }
}
