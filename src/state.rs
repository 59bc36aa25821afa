//! Assignments and count tables of one sampler run.

use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::anneal::SimulatedAnnealer;
use crate::config::{ContextScope, Emission, ModelConfig, Normalizers, StateLayout};
use crate::corpus::{Corpus, TagMap, EOS};
use crate::counts::{Dimensions, History, Site, SufficientStats};
use crate::error::{Error, Result};
use crate::model::Model;
use crate::morphology::{Morph, Segmentations};
use crate::posterior::Posterior;
use crate::train::{self, Pass};

/// Score buffers reused across tokens.
#[derive(Debug, Clone)]
pub(crate) struct Scratch {
    pub states: Vec<f64>,
    pub topics: Vec<f64>,
    pub splits: Vec<f64>,
}

/// The mutable state of a sampler over one corpus.
///
/// Holds the per-token assignments, the history registers the transition
/// counts are keyed by, the count tables and the random number generator.
/// It is created once and then mutated in place by the resampler.
#[derive(Debug, Clone)]
pub struct InferenceState {
    pub(crate) config: ModelConfig,
    pub(crate) layout: StateLayout,
    pub(crate) norms: Normalizers,
    pub(crate) corpus: Corpus,
    pub(crate) states: Vec<u32>,
    pub(crate) topics: Vec<u32>,
    /// Split position of each token into stem and affix
    pub(crate) splits: Vec<u32>,
    pub(crate) registers: Vec<History>,
    pub(crate) stats: SufficientStats,
    /// Counts copied in from a trained model, never resampled
    pub(crate) prior: Option<SufficientStats>,
    pub(crate) segmentations: Option<Segmentations>,
    pub(crate) rng: StdRng,
    pub(crate) scratch: Scratch,
    pub(crate) sweeps: usize,
    pub(crate) temperature: f64,
    pub(crate) samples: Vec<f64>,
    pub(crate) initialized: bool,
}

/// Morph of `word` at split position `split`; the empty morph without
/// segmentations.
pub(crate) fn morph_of(segmentations: Option<&Segmentations>, word: u32, split: u32) -> Morph {
    segmentations
        .and_then(|seg| seg.splits(word).get(split as usize).copied())
        .unwrap_or_default()
}

impl InferenceState {
    /// Allocate an uninitialized state for `corpus`.
    pub fn new(corpus: Corpus, config: ModelConfig) -> Result<Self> {
        config.validate()?;
        if corpus.is_empty() {
            return Err(Error::corpus("corpus has no tokens"));
        }
        let layout = config.layout();
        let norms = Normalizers::new(
            config.hyper(),
            corpus.vocabulary_size(),
            layout,
            config.variant(),
        );
        let dims = Dimensions {
            layout,
            words: corpus.vocabulary_size(),
            sentences: corpus.num_sentences(),
            documents: corpus.num_documents(),
            topics: config.topics(),
        };
        let stats = SufficientStats::new(config.variant().tables(), dims);
        let segmentations = if config.variant().emission == Emission::Morphology {
            Some(Segmentations::new(corpus.lexicon(), config.morphology()))
        } else {
            None
        };
        let n = corpus.len();
        Ok(Self {
            layout,
            norms,
            states: vec![0; n],
            topics: vec![0; n],
            splits: vec![0; n],
            registers: vec![History::START; n],
            stats,
            prior: None,
            segmentations,
            rng: StdRng::seed_from_u64(config.seed()),
            scratch: Scratch {
                states: vec![0.0; layout.states() - 1],
                topics: vec![0.0; config.topics()],
                splits: Vec::new(),
            },
            sweeps: 0,
            temperature: config.schedule().initial(),
            samples: Vec::new(),
            initialized: false,
            corpus,
            config,
        })
    }

    /// Allocate a state whose tables start from the counts of `trained`.
    ///
    /// The vocabulary of `corpus` must extend the vocabulary `trained` was
    /// built on.
    pub(crate) fn with_prior(
        corpus: Corpus,
        config: ModelConfig,
        trained: &InferenceState,
    ) -> Result<Self> {
        let mut state = Self::new(corpus, config)?;
        if let Some(seg) = &trained.segmentations {
            state.segmentations =
                Some(seg.extend(state.corpus.lexicon(), state.config.morphology()));
        }
        state.stats.add_prior(&trained.stats)?;
        state.prior = Some(trained.stats.clone());
        Ok(state)
    }

    /// Assign every token its first state.
    ///
    /// Unsupervised states are drawn token by token from the posterior
    /// given the counts so far. Supervised states are clamped to gold tags.
    pub fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::config("inference state is already initialized"));
        }
        match self.config.supervision() {
            Some(map) => {
                self.states = self.clamped_states(map)?;
                self.rebuild()?;
            }
            None => {
                train::run(self, &SimulatedAnnealer::unannealed(), Pass::Initialize)?;
            }
        }
        self.initialized = true;
        Ok(())
    }

    fn clamped_states(&self, map: &TagMap) -> Result<Vec<u32>> {
        let gold = map
            .gold_states(&self.corpus)
            .ok_or_else(|| Error::corpus("supervised training needs an annotated corpus"))?;
        gold.into_iter()
            .enumerate()
            .map(|(i, state)| {
                state.ok_or_else(|| {
                    Error::corpus(format!("gold tag of token {} is not in the tag map", i))
                })
            })
            .collect()
    }

    /// Recompute the history registers and every count table from the
    /// current assignments.
    pub fn rebuild(&mut self) -> Result<()> {
        let (stats, registers) = self.recount()?;
        self.stats = stats;
        self.registers = registers;
        Ok(())
    }

    /// Count tables implied by the current assignments, without touching
    /// the live ones
    pub fn recount(&self) -> Result<(SufficientStats, Vec<History>)> {
        let mut stats = SufficientStats::new(self.stats.tables(), self.dimensions());
        if let Some(prior) = &self.prior {
            stats.add_prior(prior)?;
        }
        let mut registers = Vec::with_capacity(self.corpus.len());
        let mut history = History::START;
        for i in 0..self.corpus.len() {
            registers.push(history);
            let word = self.corpus.word(i);
            if word == EOS {
                stats.increment(&Site::boundary(history))?;
                history = History::START;
                continue;
            }
            let site = Site {
                word,
                state: self.states[i],
                history,
                sentence: self.corpus.sentence(i),
                document: self.corpus.document(i),
                topic: self.topics[i],
                morph: morph_of(self.segmentations.as_ref(), word, self.splits[i]),
            };
            stats.increment(&site)?;
            history.push(self.states[i]);
        }
        Ok((stats, registers))
    }

    fn dimensions(&self) -> Dimensions {
        Dimensions {
            layout: self.layout,
            words: self.corpus.vocabulary_size(),
            sentences: self.corpus.num_sentences(),
            documents: self.corpus.num_documents(),
            topics: self.config.topics(),
        }
    }

    /// Everything token `i` contributes to the tables
    pub(crate) fn site(&self, i: usize) -> Site {
        let word = self.corpus.word(i);
        if word == EOS {
            return Site::boundary(self.registers[i]);
        }
        Site {
            word,
            state: self.states[i],
            history: self.registers[i],
            sentence: self.corpus.sentence(i),
            document: self.corpus.document(i),
            topic: self.topics[i],
            morph: morph_of(self.segmentations.as_ref(), word, self.splits[i]),
        }
    }

    /// Sentence or document token `i` belongs to, for the context factor
    pub(crate) fn context_of(&self, i: usize) -> usize {
        match self.config.variant().context {
            ContextScope::None => 0,
            ContextScope::Sentence => self.corpus.sentence(i) as usize,
            ContextScope::Document => self.corpus.document(i) as usize,
        }
    }

    pub(crate) fn posterior(&self) -> Posterior<'_> {
        Posterior::new(
            &self.config,
            &self.norms,
            &self.stats,
            self.segmentations.as_ref(),
        )
    }

    /// Log-likelihood of the corpus words under the current emission tables
    pub fn log_likelihood(&self) -> f64 {
        let posterior = self.posterior();
        (0..self.corpus.len())
            .filter(|&i| !self.corpus.is_boundary(i))
            .map(|i| {
                posterior
                    .emission(self.corpus.word(i), self.states[i] as usize, self.topics[i])
                    .ln()
            })
            .sum()
    }

    /// Snapshot the assignments and tables
    pub fn export(&self) -> Model {
        Model {
            config: self.config.clone(),
            corpus: self.corpus.clone(),
            states: self.states.clone(),
            topics: self.topics.clone(),
            splits: self.splits.clone(),
            tables: self
                .stats
                .named_tables()
                .into_iter()
                .map(|(name, table)| (name.to_string(), table))
                .collect(),
            temperature: self.temperature,
            sweeps: self.sweeps,
            samples: self.samples.clone(),
        }
    }

    /// Restore a state from a snapshot.
    ///
    /// The tables are rebuilt from the stored assignments and must match
    /// the stored tables. The random number generator is reseeded from the
    /// seed and the number of completed sweeps.
    pub fn import(model: &Model) -> Result<Self> {
        let mut state = Self::new(model.corpus.clone(), model.config.clone())?;
        let n = state.corpus.len();
        if model.states.len() != n || model.topics.len() != n || model.splits.len() != n {
            return Err(Error::Inconsistent(format!(
                "assignments do not cover the {} tokens of the corpus",
                n
            )));
        }
        state.states = model.states.clone();
        state.topics = model.topics.clone();
        state.splits = model.splits.clone();
        state.check_assignments()?;
        state.rebuild()?;

        let tables = state.stats.named_tables();
        for (name, table) in &tables {
            match model.tables.get(*name) {
                Some(stored) if stored == table => {}
                Some(_) => {
                    return Err(Error::Inconsistent(format!(
                        "{} does not match the assignments",
                        name
                    )))
                }
                None => return Err(Error::Inconsistent(format!("{} is missing", name))),
            }
        }
        if model.tables.len() != tables.len() {
            return Err(Error::Inconsistent(
                "snapshot holds tables this model does not use".to_string(),
            ));
        }

        state.temperature = model.temperature;
        state.sweeps = model.sweeps;
        state.samples = model.samples.clone();
        state.rng = StdRng::seed_from_u64(state.config.seed().wrapping_add(model.sweeps as u64));
        state.initialized = true;
        Ok(state)
    }

    fn check_assignments(&self) -> Result<()> {
        let states = self.layout.states() as u32;
        let topics = match self.config.variant().emission {
            Emission::Topic => self.config.topics() as u32,
            _ => 1,
        };
        for i in 0..self.corpus.len() {
            let word = self.corpus.word(i);
            let state = self.states[i];
            let valid = if word == EOS {
                state == 0
            } else {
                state >= 1 && state < states
            };
            if !valid {
                return Err(Error::Inconsistent(format!(
                    "state {} of token {} is out of range",
                    state, i
                )));
            }
            if word != EOS && self.topics[i] >= topics {
                return Err(Error::Inconsistent(format!(
                    "topic {} of token {} is out of range",
                    self.topics[i], i
                )));
            }
            let splits = match &self.segmentations {
                Some(seg) if word != EOS => seg.splits(word).len() as u32,
                _ => 1,
            };
            if self.splits[i] >= splits {
                return Err(Error::Inconsistent(format!(
                    "split {} of token {} is out of range",
                    self.splits[i], i
                )));
            }
        }
        Ok(())
    }

    /// State of every token; boundary tokens are in state 0
    pub fn states(&self) -> &[u32] {
        &self.states
    }

    /// Topic of every token; meaningful for topic variants only
    pub fn topics(&self) -> &[u32] {
        &self.topics
    }

    /// Split position of every token; meaningful for morphology variants only
    pub fn splits(&self) -> &[u32] {
        &self.splits
    }

    pub fn stats(&self) -> &SufficientStats {
        &self.stats
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn segmentations(&self) -> Option<&Segmentations> {
        self.segmentations.as_ref()
    }

    /// Temperature the last sweep ran at
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Number of completed sweeps, initialization excluded
    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Log-likelihood recorded at each posterior sample
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
