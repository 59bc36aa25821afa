//! Bicameral hidden Markov models trained by collapsed Gibbs sampling
//!
//! This library learns unsupervised word classes with a family of
//! generative models: HMMs whose states are split into content and function
//! states, HMM-LDA hybrids whose content states emit through document
//! topics, and a third-order HDP-HMM over stem and affix segmentations.
//! Training resamples one token at a time under a simulated annealing
//! schedule.
//!
//! # Examples
//!
//! ## Training
//!
//! ```
//! use bhmm::{Corpus, ModelConfig, Trainer, Variant};
//!
//! let mut builder = Corpus::builder();
//! builder.push_sentence(&["the", "dog", "barks"])?;
//! builder.push_sentence(&["a", "cat", "meows"])?;
//! let corpus = builder.build()?;
//!
//! let config = ModelConfig::new(Variant::BHMM)
//!     .with_states(2, 1)?
//!     .with_iterations(5)?
//!     .with_seed(42);
//! let trainer = Trainer::new(config)?;
//! let state = trainer.train(&corpus)?;
//! assert_eq!(state.states().len(), corpus.len());
//! # Ok::<(), bhmm::Error>(())
//! ```
//!
//! ## Tagging
//!
//! ```no_run
//! use bhmm::{Corpus, Model};
//!
//! let model = Model::load("model.json.gz")?;
//! let tagger = model.tagger()?.with_burn_in(20);
//!
//! let mut builder = Corpus::builder();
//! builder.push_sentence(&["the", "bird", "sings"])?;
//! let states = tagger.tag(&builder.build()?)?;
//! # Ok::<(), bhmm::Error>(())
//! ```

mod anneal;
mod config;
mod corpus;
mod counts;
mod dictionary;
mod error;
mod model;
mod morphology;
mod posterior;
mod state;
mod tagger;

/// Training module containing the resampler and the annealing driver
pub mod train;

// Re-export main types
pub use self::anneal::{draw, Annealer, MaximumPosterior, Schedule, SimulatedAnnealer};
pub use self::config::{
    ContextScope, Emission, Hyperparameters, ModelConfig, MorphologyParams, Normalizers,
    StateLayout, TransitionOrder, Variant,
};
pub use self::corpus::{Corpus, CorpusBuilder, TagMap, EOS, EOS_WORD};
pub use self::counts::{CountTable, Dimensions, History, Site, SufficientStats, Tables};
pub use self::dictionary::Lexicon;
pub use self::error::{Error, Result};
pub use self::model::{Model, StateSummary, Summary, TopicSummary, WordProb};
pub use self::morphology::{Morph, MorphologyCounts, Segmentations};
pub use self::state::InferenceState;
pub use self::tagger::{accuracy, decode, Tagger};

// Re-export training types for convenience
pub use self::train::{sweep, Trainer};
