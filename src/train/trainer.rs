use tracing::{debug, info};

use super::resampler::sweep;
use crate::anneal::SimulatedAnnealer;
use crate::config::ModelConfig;
use crate::corpus::Corpus;
use crate::error::{Error, Result};
use crate::model::Model;
use crate::state::InferenceState;

/// Runs the Gibbs sampler under an annealing schedule.
#[derive(Debug, Clone)]
pub struct Trainer {
    config: ModelConfig,
}

impl Trainer {
    /// Create a new trainer
    pub fn new(config: ModelConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Train a model on `corpus`.
    ///
    /// Every outer iteration runs `iterations` sweeps at one temperature and
    /// then cools by one step. Posterior samples, if any, are taken after
    /// the schedule ends. A supervised configuration only counts the gold
    /// assignments.
    pub fn train(&self, corpus: &Corpus) -> Result<InferenceState> {
        let mut state = InferenceState::new(corpus.clone(), self.config.clone())?;
        state.initialize()?;
        if self.config.supervision().is_some() {
            info!(tokens = corpus.len(), "counted gold assignments");
            return Ok(state);
        }
        info!(
            tokens = corpus.len(),
            variant = %self.config.variant(),
            "initialized"
        );
        let annealer = SimulatedAnnealer::new(self.config.schedule());
        let annealer = self.anneal(&mut state, annealer)?;
        self.sample(&mut state, &annealer)?;
        Ok(state)
    }

    /// Continue training an exported model at the temperature it stopped at.
    ///
    /// The model must have been trained with the same variant, state split
    /// and number of topics as this trainer is configured with.
    pub fn resume(&self, model: &Model) -> Result<InferenceState> {
        let trained = model.config();
        if trained.variant() != self.config.variant()
            || trained.content_states() != self.config.content_states()
            || trained.function_states() != self.config.function_states()
            || trained.topics() != self.config.topics()
        {
            return Err(Error::config(
                "model was trained with a different configuration",
            ));
        }
        let mut state = InferenceState::import(model)?;
        info!(
            sweeps = state.sweeps(),
            temperature = state.temperature(),
            "resuming"
        );
        let annealer = SimulatedAnnealer::starting_at(self.config.schedule(), state.temperature());
        let annealer = self.anneal(&mut state, annealer)?;
        self.sample(&mut state, &annealer)?;
        Ok(state)
    }

    fn anneal(
        &self,
        state: &mut InferenceState,
        mut annealer: SimulatedAnnealer,
    ) -> Result<SimulatedAnnealer> {
        let schedule = self.config.schedule();
        let rounds = schedule.outer_iterations_from(annealer.temperature());
        for round in 0..rounds {
            annealer.stabilize();
            info!(
                round = round + 1,
                rounds,
                temperature = annealer.temperature(),
                "annealing"
            );
            state.temperature = annealer.temperature();
            for _ in 0..self.config.iterations() {
                let changed = sweep(state, &annealer)?;
                debug!(sweep = state.sweeps(), changed, "sweep finished");
            }
            annealer.cool();
        }
        annealer.finish();
        state.temperature = annealer.temperature();
        Ok(annealer)
    }

    fn sample(&self, state: &mut InferenceState, annealer: &SimulatedAnnealer) -> Result<()> {
        for sample in 0..self.config.samples() {
            for _ in 0..self.config.lag() {
                sweep(state, annealer)?;
            }
            let log_likelihood = state.log_likelihood();
            info!(sample = sample + 1, log_likelihood, "posterior sample");
            state.samples.push(log_likelihood);
        }
        Ok(())
    }
}
