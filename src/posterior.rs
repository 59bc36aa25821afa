//! Unnormalized conditional probabilities of the sampler.
//!
//! One [`Posterior`] serves every variant: the emission, context and
//! transition factors switch on the [`Variant`] and read the count tables
//! in their current (post-decrement) state.

use crate::config::{
    Emission, Hyperparameters, ModelConfig, MorphologyParams, Normalizers, StateLayout,
    TransitionOrder, Variant,
};
use crate::counts::{History, SufficientStats};
use crate::morphology::{MorphologyModel, Segmentations};

/// States following a token, read from the previous sweep.
pub type Lookahead = [usize; 3];

/// Scores candidate assignments for one token.
#[derive(Debug, Clone, Copy)]
pub struct Posterior<'a> {
    pub variant: Variant,
    pub layout: StateLayout,
    pub hyper: &'a Hyperparameters,
    pub norms: &'a Normalizers,
    pub stats: &'a SufficientStats,
    pub segmentations: Option<&'a Segmentations>,
    pub morphology: &'a MorphologyParams,
}

impl<'a> Posterior<'a> {
    pub fn new(
        config: &'a ModelConfig,
        norms: &'a Normalizers,
        stats: &'a SufficientStats,
        segmentations: Option<&'a Segmentations>,
    ) -> Self {
        Self {
            variant: config.variant(),
            layout: config.layout(),
            hyper: config.hyper(),
            norms,
            stats,
            segmentations,
            morphology: config.morphology(),
        }
    }

    fn morphology_model(&self) -> Option<MorphologyModel<'a>> {
        self.segmentations.map(|segmentations| MorphologyModel {
            counts: self.stats.morphology(),
            segmentations,
            params: self.morphology,
        })
    }

    /// Pseudo-count and normalizer of transitions leaving `from`
    #[inline]
    fn prior(&self, from: usize) -> (f64, f64) {
        match self.hyper.psi() {
            Some(psi) if self.layout.is_content(from) => (psi, self.norms.spsi),
            _ => (self.hyper.gamma(), self.norms.sgamma),
        }
    }

    /// Probability of `word` given `state` (and `topic` for the topic state
    /// of topic variants)
    pub fn emission(&self, word: u32, state: usize, topic: u32) -> f64 {
        let stats = self.stats;
        let w = word as usize;
        let bicameral = |beta: f64, wbeta: f64| {
            (f64::from(stats.state_by_word.get([w, state])) + beta)
                / (f64::from(stats.state_counts.get(state)) + wbeta)
        };
        let content = self.layout.is_content(state);
        match self.variant.emission {
            Emission::Unified => bicameral(self.hyper.delta(), self.norms.wdelta),
            Emission::Topic if self.variant.topic_state() == Some(state) => {
                let z = topic as usize;
                (f64::from(stats.topic_by_word.get([w, z])) + self.hyper.beta())
                    / (f64::from(stats.topic_counts.get(z)) + self.norms.wbeta)
            }
            Emission::Bicameral | Emission::Topic if content => {
                bicameral(self.hyper.beta(), self.norms.wbeta)
            }
            Emission::Bicameral | Emission::Topic => {
                bicameral(self.hyper.delta(), self.norms.wdelta)
            }
            Emission::Morphology => self
                .morphology_model()
                .map_or(0.0, |model| model.emission(state as u32, word)),
        }
    }

    /// Probability of a content `state` given its sentence or document.
    /// Function states, the topic state and context-free variants score 1.
    #[inline]
    pub fn context(&self, context: usize, state: usize) -> f64 {
        if !self.variant.has_context(self.layout, state) {
            return 1.0;
        }
        let stats = self.stats;
        (f64::from(stats.content_by_context.get([context, state])) + self.hyper.alpha())
            / (f64::from(stats.context_counts.get(context)) + self.norms.calpha)
    }

    /// Transition into `state` from `history`, without looking ahead
    pub fn transition_in(&self, history: History, state: usize) -> f64 {
        let h1 = history.prev1 as usize;
        let h2 = history.prev2 as usize;
        let h3 = history.prev3 as usize;
        let (p1, _) = self.prior(h1);
        let stats = self.stats;
        let count = match self.variant.order {
            TransitionOrder::First => stats.first_order.get([h1, state]),
            TransitionOrder::Second => stats.second_order.get([h2, h1, state]),
            TransitionOrder::Third => stats.third_order.get([h3, h2, h1, state]),
        };
        f64::from(count) + p1
    }

    /// Transition into `state` from `history` times the transitions out of
    /// `state` into the states that follow it.
    pub fn transition(&self, history: History, state: usize, next: Lookahead) -> f64 {
        let stats = self.stats;
        let h1 = history.prev1 as usize;
        let h2 = history.prev2 as usize;
        let j = state;
        let [n1, n2, n3] = next;
        let into = self.transition_in(history, state);
        match self.variant.order {
            TransitionOrder::First => {
                let (pj, sj) = self.prior(j);
                into * (f64::from(stats.first_order.get([j, n1])) + pj)
                    / (f64::from(stats.state_counts.get(j)) + sj)
            }
            TransitionOrder::Second => {
                let (pj, sj) = self.prior(j);
                let (pn1, sn1) = self.prior(n1);
                into * (f64::from(stats.second_order.get([h1, j, n1])) + pj)
                    / (f64::from(stats.first_order.get([h1, j])) + sj)
                    * (f64::from(stats.second_order.get([j, n1, n2])) + pn1)
                    / (f64::from(stats.first_order.get([j, n1])) + sn1)
            }
            TransitionOrder::Third => {
                let (pj, sj) = self.prior(j);
                let (pn1, sn1) = self.prior(n1);
                let (pn2, sn2) = self.prior(n2);
                into * (f64::from(stats.third_order.get([h2, h1, j, n1])) + pj)
                    / (f64::from(stats.second_order.get([h2, h1, j])) + sj)
                    * (f64::from(stats.third_order.get([h1, j, n1, n2])) + pn1)
                    / (f64::from(stats.second_order.get([h1, j, n1])) + sn1)
                    * (f64::from(stats.third_order.get([j, n1, n2, n3])) + pn2)
                    / (f64::from(stats.second_order.get([j, n1, n2])) + sn2)
            }
        }
    }

    /// Score every non-boundary state; `out[j - 1]` receives state `j`.
    ///
    /// Without `next` only the transition into each state is used.
    pub fn score_states(
        &self,
        word: u32,
        context: usize,
        topic: u32,
        history: History,
        next: Option<Lookahead>,
        out: &mut [f64],
    ) {
        for (slot, j) in out.iter_mut().zip(1..self.layout.states()) {
            let transition = match next {
                Some(next) => self.transition(history, j, next),
                None => self.transition_in(history, j),
            };
            *slot = self.emission(word, j, topic) * self.context(context, j) * transition;
        }
    }

    /// Score every topic of a token of `word` in `document`.
    ///
    /// The word factor applies only when the token sits in the topic state.
    pub fn score_topics(&self, word: u32, document: usize, topical: bool, out: &mut [f64]) {
        let stats = self.stats;
        let w = word as usize;
        for (z, slot) in out.iter_mut().enumerate() {
            let mut score =
                f64::from(stats.document_by_topic.get([document, z])) + self.hyper.alpha();
            if topical {
                score *= (f64::from(stats.topic_by_word.get([w, z])) + self.hyper.beta())
                    / (f64::from(stats.topic_counts.get(z)) + self.norms.wbeta);
            }
            *slot = score;
        }
    }

    /// Score every segmentation of `word` given `state`
    pub fn score_splits(&self, word: u32, state: u32, out: &mut Vec<f64>) {
        match self.morphology_model() {
            Some(model) => model.split_weights(state, word, out),
            None => out.clear(),
        }
    }
}
