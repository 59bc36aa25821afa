use tracing::debug;

use crate::anneal::{MaximumPosterior, SimulatedAnnealer};
use crate::corpus::{Corpus, TagMap};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::state::InferenceState;
use crate::train::sweep;

/// Assign every token its most probable state given all other assignments.
///
/// Runs one sweep with the [`MaximumPosterior`] annealer and returns the
/// resulting states.
pub fn decode(state: &mut InferenceState) -> Result<Vec<u32>> {
    sweep(state, &MaximumPosterior)?;
    Ok(state.states().to_vec())
}

/// The tagger assigns states to a new corpus using the counts of a trained model
#[derive(Debug, Clone)]
pub struct Tagger<'a> {
    /// Trained model
    model: &'a Model,
    /// Sampler state restored from the model
    trained: InferenceState,
    /// Sweeps over the new corpus before decoding
    burn_in: usize,
}

impl<'a> Tagger<'a> {
    pub(crate) fn new(model: &'a Model) -> Result<Self> {
        let trained = InferenceState::import(model)?;
        Ok(Self {
            model,
            burn_in: model.config().burn_in(),
            trained,
        })
    }

    /// Override the number of burn-in sweeps
    pub fn with_burn_in(mut self, burn_in: usize) -> Self {
        self.burn_in = burn_in;
        self
    }

    pub fn burn_in(&self) -> usize {
        self.burn_in
    }

    /// Predict the state of every token of `corpus`.
    ///
    /// The trained counts serve as a prior: the new tokens are initialized
    /// against them, resampled for the burn-in at temperature 1 and then
    /// decoded. Words unseen in training are added to the vocabulary.
    pub fn tag(&self, corpus: &Corpus) -> Result<Vec<u32>> {
        let mut lexicon = self.model.corpus().lexicon().clone();
        let remapped = corpus.remap(&mut lexicon);
        let mut config = self.model.config().clone();
        config.set_supervision(None);

        let mut state = InferenceState::with_prior(remapped, config, &self.trained)?;
        state.initialize()?;
        let annealer = SimulatedAnnealer::unannealed();
        for _ in 0..self.burn_in {
            let changed = sweep(&mut state, &annealer)?;
            debug!(sweep = state.sweeps(), changed, "burn-in sweep finished");
        }
        decode(&mut state)
    }
}

/// Fraction of non-boundary tokens whose predicted state is the state of
/// their gold tag.
pub fn accuracy(predicted: &[u32], corpus: &Corpus, tag_map: &TagMap) -> Result<f64> {
    if predicted.len() != corpus.len() {
        return Err(Error::corpus(
            "predictions must have one entry per token",
        ));
    }
    let gold = tag_map
        .gold_states(corpus)
        .ok_or_else(|| Error::corpus("accuracy needs an annotated corpus"))?;
    let mut total = 0usize;
    let mut correct = 0usize;
    for (i, (&p, g)) in predicted.iter().zip(gold).enumerate() {
        if corpus.is_boundary(i) {
            continue;
        }
        total += 1;
        if g == Some(p) {
            correct += 1;
        }
    }
    if total == 0 {
        return Ok(0.0);
    }
    Ok(correct as f64 / total as f64)
}
