use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::anneal::Schedule;
use crate::corpus::TagMap;
use crate::counts::Tables;
use crate::error::{Error, Result};

/// Which context conditions the content states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContextScope {
    /// Content states are not conditioned on any context
    None,
    /// Content states are conditioned on the sentence
    Sentence,
    /// Content states are conditioned on the document
    Document,
}

/// Order of the state transition model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TransitionOrder {
    First,
    Second,
    Third,
}

impl TransitionOrder {
    /// Number of preceding (and following) states a transition looks at
    pub fn width(self) -> usize {
        match self {
            TransitionOrder::First => 1,
            TransitionOrder::Second => 2,
            TransitionOrder::Third => 3,
        }
    }
}

/// How words are emitted from states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Emission {
    /// Every state emits with the function-word prior `delta`
    Unified,
    /// Content states use `beta`, function states use `delta`
    Bicameral,
    /// The topic state emits through a document topic mixture, the other
    /// content states use `beta` and function states use `delta`
    Topic,
    /// Every state emits a stem and an affix
    Morphology,
}

/// The first content state is the topic state of topic variants.
pub const TOPIC_STATE: usize = 1;

/// A model variant: one point in the space of context, transition order
/// and emission model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Variant {
    pub context: ContextScope,
    pub order: TransitionOrder,
    pub emission: Emission,
}

impl Variant {
    /// Plain first-order HMM
    pub const HMM: Variant = Variant::new(
        ContextScope::None,
        TransitionOrder::First,
        Emission::Unified,
    );
    /// Bicameral HMM
    pub const BHMM: Variant = Variant::new(
        ContextScope::None,
        TransitionOrder::First,
        Emission::Bicameral,
    );
    /// Bicameral HMM with content states conditioned on the sentence
    pub const CDHMM_SENTENCE: Variant = Variant::new(
        ContextScope::Sentence,
        TransitionOrder::First,
        Emission::Bicameral,
    );
    /// HMM-LDA with sentence-conditioned content states
    pub const LDAHMM: Variant = Variant::new(
        ContextScope::Sentence,
        TransitionOrder::First,
        Emission::Topic,
    );
    /// Bicameral HMM with content states conditioned on the document
    pub const CDHMM_DOCUMENT: Variant = Variant::new(
        ContextScope::Document,
        TransitionOrder::First,
        Emission::Bicameral,
    );
    /// HMM-LDA with document-conditioned content states
    pub const LDAHMM_DOCUMENT: Variant = Variant::new(
        ContextScope::Document,
        TransitionOrder::First,
        Emission::Topic,
    );
    /// Second-order bicameral HMM with sentence-conditioned content states
    pub const BHMM2: Variant = Variant::new(
        ContextScope::Sentence,
        TransitionOrder::Second,
        Emission::Bicameral,
    );
    /// Third-order HDP-HMM over stem and affix segmentations
    pub const HDPHMM: Variant = Variant::new(
        ContextScope::None,
        TransitionOrder::Third,
        Emission::Morphology,
    );

    const PRESETS: [(&'static str, &'static str, Variant); 8] = [
        ("hmm", "m2", Variant::HMM),
        ("bhmm", "m3", Variant::BHMM),
        ("cdhmm-sentence", "m4", Variant::CDHMM_SENTENCE),
        ("ldahmm", "m5", Variant::LDAHMM),
        ("cdhmm-document", "m6", Variant::CDHMM_DOCUMENT),
        ("ldahmm-document", "m7", Variant::LDAHMM_DOCUMENT),
        ("bhmm2", "m5s2", Variant::BHMM2),
        ("hdphmm", "hdphmm", Variant::HDPHMM),
    ];

    pub const fn new(context: ContextScope, order: TransitionOrder, emission: Emission) -> Self {
        Self {
            context,
            order,
            emission,
        }
    }

    /// Preset name of this variant, if it has one
    pub fn name(&self) -> Option<&'static str> {
        Self::PRESETS
            .iter()
            .find(|(_, _, v)| v == self)
            .map(|(name, _, _)| *name)
    }

    /// The content state that emits through topics, if any
    pub fn topic_state(&self) -> Option<usize> {
        match self.emission {
            Emission::Topic => Some(TOPIC_STATE),
            _ => None,
        }
    }

    /// Whether `state` is a content state conditioned on its sentence or
    /// document
    pub fn has_context(&self, layout: StateLayout, state: usize) -> bool {
        self.context != ContextScope::None
            && layout.is_content(state)
            && self.topic_state() != Some(state)
    }

    /// The count tables this variant maintains
    pub fn tables(&self) -> Tables {
        let mut tables = Tables::STATE_BY_WORD;
        tables |= match self.order {
            TransitionOrder::First => Tables::FIRST_ORDER,
            TransitionOrder::Second => Tables::FIRST_ORDER | Tables::SECOND_ORDER,
            TransitionOrder::Third => Tables::SECOND_ORDER | Tables::THIRD_ORDER,
        };
        tables |= match self.context {
            ContextScope::None => Tables::empty(),
            ContextScope::Sentence => Tables::CONTENT_BY_SENTENCE,
            ContextScope::Document => Tables::CONTENT_BY_DOCUMENT,
        };
        tables |= match self.emission {
            Emission::Topic => Tables::TOPICS,
            Emission::Morphology => Tables::MORPHOLOGY,
            Emission::Unified | Emission::Bicameral => Tables::empty(),
        };
        tables
    }
}

impl Default for Variant {
    fn default() -> Self {
        Variant::BHMM
    }
}

impl FromStr for Variant {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.to_ascii_lowercase();
        Self::PRESETS
            .iter()
            .find(|(name, alias, _)| *name == lower || *alias == lower)
            .map(|(_, _, v)| *v)
            .ok_or_else(|| Error::config(format!("unknown model variant: {}", s)))
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:?}/{:?}/{:?}", self.context, self.order, self.emission),
        }
    }
}

/// Dirichlet pseudo-counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hyperparameters {
    alpha: f64,
    beta: f64,
    gamma: f64,
    delta: f64,
    psi: Option<f64>,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            beta: 0.01,
            gamma: 0.01,
            delta: 0.01,
            psi: None,
        }
    }
}

fn check_positive(value: f64, name: &str) -> Result<()> {
    if value > 0.0 && value.is_finite() {
        Ok(())
    } else {
        Err(Error::config(format!("{} must be positive", name)))
    }
}

impl Hyperparameters {
    /// Prior on content states given their sentence or document, and on
    /// topics given their document
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn set_alpha(&mut self, alpha: f64) -> Result<()> {
        check_positive(alpha, "alpha")?;
        self.alpha = alpha;
        Ok(())
    }

    /// Prior on words given content states or topics
    pub fn beta(&self) -> f64 {
        self.beta
    }

    pub fn set_beta(&mut self, beta: f64) -> Result<()> {
        check_positive(beta, "beta")?;
        self.beta = beta;
        Ok(())
    }

    /// Prior on state transitions
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    pub fn set_gamma(&mut self, gamma: f64) -> Result<()> {
        check_positive(gamma, "gamma")?;
        self.gamma = gamma;
        Ok(())
    }

    /// Prior on words given function states
    pub fn delta(&self) -> f64 {
        self.delta
    }

    pub fn set_delta(&mut self, delta: f64) -> Result<()> {
        check_positive(delta, "delta")?;
        self.delta = delta;
        Ok(())
    }

    /// Prior on transitions out of content states, replacing `gamma` there
    pub fn psi(&self) -> Option<f64> {
        self.psi
    }

    pub fn set_psi(&mut self, psi: Option<f64>) -> Result<()> {
        if let Some(psi) = psi {
            check_positive(psi, "psi")?;
        }
        self.psi = psi;
        Ok(())
    }

    /// Check every pseudo-count, for values that bypassed the setters
    pub fn validate(&self) -> Result<()> {
        check_positive(self.alpha, "alpha")?;
        check_positive(self.beta, "beta")?;
        check_positive(self.gamma, "gamma")?;
        check_positive(self.delta, "delta")?;
        if let Some(psi) = self.psi {
            check_positive(psi, "psi")?;
        }
        Ok(())
    }
}

/// Concentrations and base distribution of the stem and affix processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MorphologyParams {
    stem_concentration: f64,
    affix_concentration: f64,
    affix_base_concentration: f64,
    stem_boundary: f64,
    affix_boundary: f64,
}

impl Default for MorphologyParams {
    fn default() -> Self {
        Self {
            stem_concentration: 300.0,
            affix_concentration: 300.0,
            affix_base_concentration: 3000.0,
            stem_boundary: 0.2,
            affix_boundary: 0.2,
        }
    }
}

fn check_probability(value: f64, name: &str) -> Result<()> {
    if value > 0.0 && value < 1.0 {
        Ok(())
    } else {
        Err(Error::config(format!("{} must be in (0, 1)", name)))
    }
}

impl MorphologyParams {
    /// Concentration of the stem-given-state process
    pub fn stem_concentration(&self) -> f64 {
        self.stem_concentration
    }

    pub fn set_stem_concentration(&mut self, value: f64) -> Result<()> {
        check_positive(value, "stem concentration")?;
        self.stem_concentration = value;
        Ok(())
    }

    /// Concentration of the affix-given-stem-and-state process
    pub fn affix_concentration(&self) -> f64 {
        self.affix_concentration
    }

    pub fn set_affix_concentration(&mut self, value: f64) -> Result<()> {
        check_positive(value, "affix concentration")?;
        self.affix_concentration = value;
        Ok(())
    }

    /// Concentration of the affix-given-state process shared across stems
    pub fn affix_base_concentration(&self) -> f64 {
        self.affix_base_concentration
    }

    pub fn set_affix_base_concentration(&mut self, value: f64) -> Result<()> {
        check_positive(value, "affix base concentration")?;
        self.affix_base_concentration = value;
        Ok(())
    }

    /// Probability of ending a stem at each character of the base distribution
    pub fn stem_boundary(&self) -> f64 {
        self.stem_boundary
    }

    pub fn set_stem_boundary(&mut self, value: f64) -> Result<()> {
        check_probability(value, "stem boundary probability")?;
        self.stem_boundary = value;
        Ok(())
    }

    /// Probability of ending an affix at each character of the base distribution
    pub fn affix_boundary(&self) -> f64 {
        self.affix_boundary
    }

    pub fn set_affix_boundary(&mut self, value: f64) -> Result<()> {
        check_probability(value, "affix boundary probability")?;
        self.affix_boundary = value;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        check_positive(self.stem_concentration, "stem concentration")?;
        check_positive(self.affix_concentration, "affix concentration")?;
        check_positive(self.affix_base_concentration, "affix base concentration")?;
        check_probability(self.stem_boundary, "stem boundary probability")?;
        check_probability(self.affix_boundary, "affix boundary probability")
    }
}

/// Full model configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    variant: Variant,
    content_states: usize,
    function_states: usize,
    topics: usize,
    hyper: Hyperparameters,
    morphology: MorphologyParams,
    schedule: Schedule,
    iterations: usize,
    samples: usize,
    lag: usize,
    burn_in: usize,
    seed: u64,
    supervision: Option<TagMap>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            variant: Variant::default(),
            content_states: 10,
            function_states: 4,
            topics: 50,
            hyper: Hyperparameters::default(),
            morphology: MorphologyParams::default(),
            schedule: Schedule::default(),
            iterations: 100,
            samples: 0,
            lag: 10,
            burn_in: 10,
            seed: 0,
            supervision: None,
        }
    }
}

impl ModelConfig {
    pub fn new(variant: Variant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    pub fn variant(&self) -> Variant {
        self.variant
    }

    /// Number of content states, the boundary state excluded
    pub fn content_states(&self) -> usize {
        self.content_states
    }

    pub fn function_states(&self) -> usize {
        self.function_states
    }

    pub fn topics(&self) -> usize {
        self.topics
    }

    pub fn hyper(&self) -> &Hyperparameters {
        &self.hyper
    }

    pub fn hyper_mut(&mut self) -> &mut Hyperparameters {
        &mut self.hyper
    }

    pub fn morphology(&self) -> &MorphologyParams {
        &self.morphology
    }

    pub fn morphology_mut(&mut self) -> &mut MorphologyParams {
        &mut self.morphology
    }

    pub fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Sweeps per temperature step
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Posterior samples taken after training
    pub fn samples(&self) -> usize {
        self.samples
    }

    /// Sweeps between two posterior samples
    pub fn lag(&self) -> usize {
        self.lag
    }

    /// Sweeps run over a held-out corpus before decoding it
    pub fn burn_in(&self) -> usize {
        self.burn_in
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn supervision(&self) -> Option<&TagMap> {
        self.supervision.as_ref()
    }

    pub fn set_variant(&mut self, variant: Variant) {
        self.variant = variant;
    }

    pub fn set_states(&mut self, content_states: usize, function_states: usize) -> Result<()> {
        if content_states + function_states == 0 {
            return Err(Error::config("at least one non-boundary state is required"));
        }
        self.content_states = content_states;
        self.function_states = function_states;
        Ok(())
    }

    pub fn set_topics(&mut self, topics: usize) -> Result<()> {
        if topics < 1 {
            return Err(Error::config("topics must be at least 1"));
        }
        self.topics = topics;
        Ok(())
    }

    pub fn set_schedule(&mut self, schedule: Schedule) -> Result<()> {
        schedule.validate()?;
        self.schedule = schedule;
        Ok(())
    }

    pub fn set_iterations(&mut self, iterations: usize) -> Result<()> {
        if iterations < 1 {
            return Err(Error::config("iterations must be at least 1"));
        }
        self.iterations = iterations;
        Ok(())
    }

    pub fn set_sampling(&mut self, samples: usize, lag: usize) -> Result<()> {
        if lag < 1 {
            return Err(Error::config("lag must be at least 1"));
        }
        self.samples = samples;
        self.lag = lag;
        Ok(())
    }

    pub fn set_burn_in(&mut self, burn_in: usize) {
        self.burn_in = burn_in;
    }

    pub fn set_seed(&mut self, seed: u64) {
        self.seed = seed;
    }

    /// Clamp states to gold tags; the state split is taken from the tag map
    pub fn set_supervision(&mut self, tag_map: Option<TagMap>) {
        if let Some(map) = &tag_map {
            self.content_states = map.content_states();
            self.function_states = map.function_states();
        }
        self.supervision = tag_map;
    }

    /// Set the number of content and function states (builder pattern)
    pub fn with_states(mut self, content_states: usize, function_states: usize) -> Result<Self> {
        self.set_states(content_states, function_states)?;
        Ok(self)
    }

    /// Set the number of topics (builder pattern)
    pub fn with_topics(mut self, topics: usize) -> Result<Self> {
        self.set_topics(topics)?;
        Ok(self)
    }

    /// Set alpha (builder pattern)
    pub fn with_alpha(mut self, alpha: f64) -> Result<Self> {
        self.hyper.set_alpha(alpha)?;
        Ok(self)
    }

    /// Set beta (builder pattern)
    pub fn with_beta(mut self, beta: f64) -> Result<Self> {
        self.hyper.set_beta(beta)?;
        Ok(self)
    }

    /// Set gamma (builder pattern)
    pub fn with_gamma(mut self, gamma: f64) -> Result<Self> {
        self.hyper.set_gamma(gamma)?;
        Ok(self)
    }

    /// Set delta (builder pattern)
    pub fn with_delta(mut self, delta: f64) -> Result<Self> {
        self.hyper.set_delta(delta)?;
        Ok(self)
    }

    /// Set psi (builder pattern)
    pub fn with_psi(mut self, psi: f64) -> Result<Self> {
        self.hyper.set_psi(Some(psi))?;
        Ok(self)
    }

    /// Set the annealing schedule (builder pattern)
    pub fn with_schedule(mut self, initial: f64, decrement: f64, target: f64) -> Result<Self> {
        self.set_schedule(Schedule::new(initial, decrement, target)?)?;
        Ok(self)
    }

    /// Set sweeps per temperature step (builder pattern)
    pub fn with_iterations(mut self, iterations: usize) -> Result<Self> {
        self.set_iterations(iterations)?;
        Ok(self)
    }

    /// Set posterior sampling (builder pattern)
    pub fn with_sampling(mut self, samples: usize, lag: usize) -> Result<Self> {
        self.set_sampling(samples, lag)?;
        Ok(self)
    }

    /// Set the held-out burn-in (builder pattern)
    pub fn with_burn_in(mut self, burn_in: usize) -> Self {
        self.set_burn_in(burn_in);
        self
    }

    /// Set the random seed (builder pattern)
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.set_seed(seed);
        self
    }

    /// Enable supervised training (builder pattern)
    pub fn with_supervision(mut self, tag_map: TagMap) -> Self {
        self.set_supervision(Some(tag_map));
        self
    }

    /// Check the configuration as a whole.
    pub fn validate(&self) -> Result<()> {
        self.schedule.validate()?;
        self.hyper.validate()?;
        self.morphology.validate()?;
        if self.content_states + self.function_states == 0 {
            return Err(Error::config("at least one non-boundary state is required"));
        }
        if self.iterations < 1 {
            return Err(Error::config("iterations must be at least 1"));
        }
        if self.samples > 0 && self.lag < 1 {
            return Err(Error::config("lag must be at least 1"));
        }
        match self.variant.emission {
            Emission::Topic => {
                if self.topics < 1 {
                    return Err(Error::config("topics must be at least 1"));
                }
                if self.content_states == 0 {
                    return Err(Error::config("topic emission needs at least one content state"));
                }
            }
            Emission::Bicameral if self.function_states == 0 => {
                warn!("bicameral model configured without function states");
            }
            _ => {}
        }
        if self.variant.context != ContextScope::None && self.content_states == 0 {
            warn!("context-conditioned model configured without content states");
        }
        if let Some(map) = &self.supervision {
            if matches!(self.variant.emission, Emission::Topic | Emission::Morphology) {
                return Err(Error::config(
                    "supervised training supports unified and bicameral emission only",
                ));
            }
            if map.content_states() != self.content_states
                || map.function_states() != self.function_states
            {
                return Err(Error::config(
                    "state counts do not match the supervision tag map",
                ));
            }
        }
        Ok(())
    }

    pub(crate) fn layout(&self) -> StateLayout {
        StateLayout::new(self.content_states, self.function_states)
    }
}

/// Partition of the state space.
///
/// State 0 is the boundary state. `[0, content)` is the content range and
/// `[content, states)` the function range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateLayout {
    content: usize,
    states: usize,
}

impl StateLayout {
    pub fn new(content_states: usize, function_states: usize) -> Self {
        let content = content_states + 1;
        Self {
            content,
            states: content + function_states,
        }
    }

    /// Total number of states, the boundary state included
    pub fn states(&self) -> usize {
        self.states
    }

    /// End of the content range, the boundary state included
    pub fn content(&self) -> usize {
        self.content
    }

    pub fn is_content(&self, state: usize) -> bool {
        state < self.content
    }
}

/// Normalization terms derived from the hyperparameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Normalizers {
    pub wbeta: f64,
    pub wdelta: f64,
    pub calpha: f64,
    pub sgamma: f64,
    pub spsi: f64,
}

impl Normalizers {
    /// Recompute every term for a vocabulary of `words` types
    pub fn new(
        hyper: &Hyperparameters,
        words: usize,
        layout: StateLayout,
        variant: Variant,
    ) -> Self {
        let w = words as f64;
        let s = layout.states() as f64;
        let contexts = (1..layout.content())
            .filter(|&j| variant.topic_state() != Some(j))
            .count();
        Self {
            wbeta: hyper.beta * w,
            wdelta: hyper.delta * w,
            calpha: hyper.alpha * contexts as f64,
            sgamma: hyper.gamma * s,
            spsi: hyper.psi.unwrap_or(hyper.gamma) * s,
        }
    }
}
