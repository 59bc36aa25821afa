use rand::rngs::StdRng;
use tracing::trace;

use crate::anneal::{draw, Annealer};
use crate::config::Emission;
use crate::corpus::EOS;
use crate::counts::{History, Site};
use crate::error::{Error, Result};
use crate::posterior::{Lookahead, Posterior};
use crate::state::{morph_of, InferenceState};

/// Tokens between two progress messages
const PROGRESS_INTERVAL: usize = 100_000;

/// What a pass over the corpus does with the existing assignments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pass {
    /// Nothing is counted yet: draw from the counts accumulated so far,
    /// without looking ahead
    Initialize,
    /// Remove each token, resample it and add it back
    Sweep,
}

/// Resample every token once.
///
/// Returns the number of tokens whose state changed.
pub fn sweep<A: Annealer>(state: &mut InferenceState, annealer: &A) -> Result<usize> {
    if !state.initialized {
        return Err(Error::config(
            "inference state must be initialized before sweeping",
        ));
    }
    let changed = run(state, annealer, Pass::Sweep)?;
    state.sweeps += 1;
    Ok(changed)
}

/// Anneal `probs` and draw an index from them.
///
/// Every raw score must be finite and non-negative, and their sum positive.
fn pick<A: Annealer>(
    annealer: &A,
    probs: &mut [f64],
    rng: &mut StdRng,
    token: usize,
) -> Result<usize> {
    if let Some(&bad) = probs.iter().find(|p| !(p.is_finite() && **p >= 0.0)) {
        return Err(Error::DegenerateDistribution { token, total: bad });
    }
    let total = annealer.anneal(probs);
    if !(total > 0.0 && total.is_finite()) {
        return Err(Error::DegenerateDistribution { token, total });
    }
    Ok(draw(probs, total, rng))
}

/// States of the tokens after `i` as of the previous sweep
fn lookahead(states: &[u32], i: usize) -> Lookahead {
    let mut next = [0; 3];
    for (k, slot) in next.iter_mut().enumerate() {
        *slot = states.get(i + 1 + k).map_or(0, |&s| s as usize);
    }
    next
}

pub(crate) fn run<A: Annealer>(
    state: &mut InferenceState,
    annealer: &A,
    pass: Pass,
) -> Result<usize> {
    let n = state.corpus.len();
    let emission = state.config.variant().emission;
    let mut history = History::START;
    let mut changed = 0;

    for i in 0..n {
        if i > 0 && i % PROGRESS_INTERVAL == 0 {
            trace!(token = i, tokens = n, "resampling");
        }
        let word = state.corpus.word(i);
        if word == EOS {
            if pass == Pass::Sweep {
                state.stats.decrement(&Site::boundary(state.registers[i]))?;
            }
            state.stats.increment(&Site::boundary(history))?;
            state.registers[i] = history;
            history = History::START;
            continue;
        }

        let old = match pass {
            Pass::Sweep => {
                let site = state.site(i);
                state.stats.decrement(&site)?;
                Some(site)
            }
            Pass::Initialize => None,
        };
        let sentence = state.corpus.sentence(i);
        let document = state.corpus.document(i);
        let context = state.context_of(i);
        let next = old.map(|_| lookahead(&state.states, i));

        let posterior = Posterior::new(
            &state.config,
            &state.norms,
            &state.stats,
            state.segmentations.as_ref(),
        );

        let topic = if emission == Emission::Topic {
            // before the first assignment the token counts as topical
            let topical = old.map_or(true, |site| {
                state.config.variant().topic_state() == Some(site.state as usize)
            });
            posterior.score_topics(word, document as usize, topical, &mut state.scratch.topics);
            pick(annealer, &mut state.scratch.topics, &mut state.rng, i)? as u32
        } else {
            0
        };

        posterior.score_states(
            word,
            context,
            topic,
            history,
            next,
            &mut state.scratch.states,
        );
        let new_state = pick(annealer, &mut state.scratch.states, &mut state.rng, i)? as u32 + 1;

        let split = if emission == Emission::Morphology {
            posterior.score_splits(word, new_state, &mut state.scratch.splits);
            pick(annealer, &mut state.scratch.splits, &mut state.rng, i)? as u32
        } else {
            0
        };

        let site = Site {
            word,
            state: new_state,
            history,
            sentence,
            document,
            topic,
            morph: morph_of(state.segmentations.as_ref(), word, split),
        };
        state.stats.increment(&site)?;

        if old.map_or(true, |site| site.state != new_state) {
            changed += 1;
        }
        state.states[i] = new_state;
        state.topics[i] = topic;
        state.splits[i] = split;
        state.registers[i] = history;
        history.push(new_state);
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anneal::{MaximumPosterior, SimulatedAnnealer};
    use crate::config::{ModelConfig, Variant};
    use crate::corpus::Corpus;

    fn corpus() -> Corpus {
        let mut builder = Corpus::builder();
        builder.push_sentence(&["the", "dog", "runs"]).unwrap();
        builder.push_sentence(&["the", "cat", "runs", "fast"]).unwrap();
        builder.end_document();
        builder.push_sentence(&["a", "dog", "sleeps"]).unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_lookahead_pads_with_boundary() {
        assert_eq!(lookahead(&[1, 2, 3, 4], 0), [2, 3, 4]);
        assert_eq!(lookahead(&[1, 2, 3, 4], 2), [4, 0, 0]);
    }

    #[test]
    fn test_sweep_requires_initialization() {
        let config = ModelConfig::default().with_states(2, 1).unwrap();
        let mut state = InferenceState::new(corpus(), config).unwrap();
        assert!(sweep(&mut state, &SimulatedAnnealer::unannealed()).is_err());
    }

    #[test]
    fn test_sweeps_keep_tables_consistent() {
        let presets = [
            Variant::HMM,
            Variant::BHMM,
            Variant::CDHMM_SENTENCE,
            Variant::LDAHMM,
            Variant::CDHMM_DOCUMENT,
            Variant::LDAHMM_DOCUMENT,
            Variant::BHMM2,
            Variant::HDPHMM,
        ];
        for variant in presets {
            let config = ModelConfig::new(variant)
                .with_states(2, 2)
                .unwrap()
                .with_topics(2)
                .unwrap()
                .with_seed(3);
            let mut state = InferenceState::new(corpus(), config).unwrap();
            state.initialize().unwrap();
            for _ in 0..3 {
                sweep(&mut state, &SimulatedAnnealer::unannealed()).unwrap();
                let (rebuilt, registers) = state.recount().unwrap();
                assert_eq!(state.stats().diff(&rebuilt), None, "{}", variant);
                assert_eq!(registers, state.registers, "{}", variant);
            }
            assert_eq!(state.sweeps(), 3);
        }
    }

    #[test]
    fn test_pick_rejects_bad_scores() {
        let annealer = SimulatedAnnealer::unannealed();
        let mut rng: StdRng = rand::SeedableRng::seed_from_u64(1);
        for mut probs in [
            vec![0.0, 0.0],
            vec![0.5, -0.5, 1.0],
            vec![0.5, f64::NAN],
            vec![f64::INFINITY, 1.0],
        ] {
            match pick(&annealer, &mut probs, &mut rng, 7) {
                Err(Error::DegenerateDistribution { token, .. }) => assert_eq!(token, 7),
                other => panic!("expected a degenerate distribution, got {:?}", other),
            }
        }
        let mut probs = vec![0.0, 2.0, 0.0];
        assert_eq!(pick(&annealer, &mut probs, &mut rng, 0).unwrap(), 1);
    }

    #[test]
    fn test_sweep_reports_corrupted_counts() {
        let config = ModelConfig::default().with_states(2, 1).unwrap().with_seed(2);
        let mut state = InferenceState::new(corpus(), config).unwrap();
        state.initialize().unwrap();
        let first = state.states()[0] as usize;
        while state.stats.state_counts.get(first) > 0 {
            state.stats.state_counts.dec(first).unwrap();
        }
        match sweep(&mut state, &SimulatedAnnealer::unannealed()) {
            Err(Error::CountUnderflow { table, .. }) => assert_eq!(table, "state_counts"),
            other => panic!("expected a count underflow, got {:?}", other),
        }
    }

    #[test]
    fn test_sweep_reports_degenerate_posterior() {
        let config = ModelConfig::default().with_states(2, 1).unwrap().with_seed(2);
        let mut state = InferenceState::new(corpus(), config).unwrap();
        state.initialize().unwrap();
        // infinite normalizers zero every emission
        state.norms.wbeta = f64::INFINITY;
        state.norms.wdelta = f64::INFINITY;
        match sweep(&mut state, &SimulatedAnnealer::unannealed()) {
            Err(Error::DegenerateDistribution { token, total }) => {
                assert_eq!(token, 0);
                assert_eq!(total, 0.0);
            }
            other => panic!("expected a degenerate distribution, got {:?}", other),
        }
    }

    #[test]
    fn test_maximum_posterior_is_deterministic() {
        let config = ModelConfig::default().with_states(2, 1).unwrap().with_seed(5);
        let mut state = InferenceState::new(corpus(), config).unwrap();
        state.initialize().unwrap();
        let mut a = state.clone();
        let mut b = state.clone();
        b.rng = rand::SeedableRng::seed_from_u64(99);
        sweep(&mut a, &MaximumPosterior).unwrap();
        sweep(&mut b, &MaximumPosterior).unwrap();
        assert_eq!(a.states(), b.states());
    }
}
