use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::config::{Emission, ModelConfig, Variant};
use crate::corpus::{Corpus, EOS};
use crate::error::Result;
use crate::posterior::Posterior;
use crate::state::InferenceState;
use crate::tagger::Tagger;

/// A snapshot of a trained sampler.
///
/// Holds the configuration, the corpus with its lexicon, every per-token
/// assignment and the count tables they imply. Created with
/// [`InferenceState::export`] and turned back into a live state with
/// [`InferenceState::import`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub(crate) config: ModelConfig,
    pub(crate) corpus: Corpus,
    pub(crate) states: Vec<u32>,
    pub(crate) topics: Vec<u32>,
    pub(crate) splits: Vec<u32>,
    pub(crate) tables: BTreeMap<String, ArrayD<u32>>,
    pub(crate) temperature: f64,
    pub(crate) sweeps: usize,
    pub(crate) samples: Vec<f64>,
}

impl Model {
    /// Read a gzip-compressed JSON snapshot
    pub fn read_from<R: Read>(reader: R) -> Result<Self> {
        let decoder = GzDecoder::new(BufReader::new(reader));
        Ok(serde_json::from_reader(decoder)?)
    }

    /// Write the snapshot as gzip-compressed JSON
    pub fn write_to<W: Write>(&self, writer: W) -> Result<()> {
        let mut encoder = GzEncoder::new(writer, Compression::default());
        serde_json::to_writer(&mut encoder, self)?;
        encoder.finish()?;
        Ok(())
    }

    /// Load a snapshot from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read_from(File::open(path)?)
    }

    /// Save the snapshot to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_to(&mut writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// The training corpus, including its lexicon
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn states(&self) -> &[u32] {
        &self.states
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn sweeps(&self) -> usize {
        self.sweeps
    }

    /// Stored count table by name
    pub fn table(&self, name: &str) -> Option<&ArrayD<u32>> {
        self.tables.get(name)
    }

    /// Get a new tagger
    pub fn tagger(&self) -> Result<Tagger<'_>> {
        Tagger::new(self)
    }
}

/// A word and its probability.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WordProb {
    pub word: String,
    pub prob: f64,
}

/// The most probable words of one state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateSummary {
    pub state: u32,
    pub content: bool,
    /// Share of non-boundary tokens assigned to the state
    pub prob: f64,
    pub top_words: Vec<WordProb>,
}

/// The most probable words of one topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicSummary {
    pub topic: u32,
    pub prob: f64,
    pub top_words: Vec<WordProb>,
}

/// Normalized word distributions of a trained state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    /// Every non-boundary state
    pub states: Vec<StateSummary>,
    /// Every topic; empty unless the model emits through topics
    pub topics: Vec<TopicSummary>,
    /// Word distribution with the topics marginalized out, by word id
    pub topic_marginal: Option<Vec<f64>>,
}

fn top_words(corpus: &Corpus, probs: &[f64], n: usize) -> Vec<WordProb> {
    let mut ranked: Vec<(usize, f64)> = probs
        .iter()
        .copied()
        .enumerate()
        .filter(|&(w, _)| w as u32 != EOS)
        .collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked
        .into_iter()
        .take(n)
        .map(|(w, prob)| WordProb {
            word: corpus.lexicon().get(w as u32).unwrap_or_default().to_string(),
            prob,
        })
        .collect()
}

impl Summary {
    /// Summarize `state` with the `n` most probable words of each class.
    ///
    /// Word-given-state probabilities use the bicameral priors, the topic
    /// state included; topic models also report the topic tables.
    pub fn new(state: &InferenceState, n: usize) -> Self {
        let variant = state.config().variant();
        let mut posterior = state.posterior();
        if variant.emission == Emission::Topic {
            posterior.variant = Variant {
                emission: Emission::Bicameral,
                ..variant
            };
        }
        let stats = state.stats();
        let corpus = state.corpus();
        let words = corpus.vocabulary_size();
        let layout = posterior.layout;
        let tokens: u32 = stats.state_counts().iter().sum();
        let share = |count: u32| {
            if tokens == 0 {
                0.0
            } else {
                f64::from(count) / f64::from(tokens)
            }
        };

        let states = (1..layout.states())
            .map(|j| {
                let probs: Vec<f64> = (0..words)
                    .map(|w| posterior.emission(w as u32, j, 0))
                    .collect();
                StateSummary {
                    state: j as u32,
                    content: layout.is_content(j),
                    prob: share(stats.state_counts()[j]),
                    top_words: top_words(corpus, &probs, n),
                }
            })
            .collect();

        if variant.emission != Emission::Topic {
            return Self {
                states,
                topics: Vec::new(),
                topic_marginal: None,
            };
        }

        let hyper = state.config().hyper();
        let topics = state.config().topics();
        let topic_by_word = stats.topic_by_word();
        let topic_counts = stats.topic_counts();
        let document_by_topic = stats.document_by_topic();
        let assigned: u32 = document_by_topic.iter().sum();
        let kalpha = hyper.alpha() * topics as f64;

        let mut marginal = vec![0.0; words];
        let mut summaries = Vec::with_capacity(topics);
        for z in 0..topics {
            let weight = (f64::from(document_by_topic.column(z).sum()) + hyper.alpha())
                / (f64::from(assigned) + kalpha);
            let probs: Vec<f64> = (0..words)
                .map(|w| {
                    (f64::from(topic_by_word[[w, z]]) + hyper.beta())
                        / (f64::from(topic_counts[z]) + state.norms.wbeta)
                })
                .collect();
            for (m, p) in marginal.iter_mut().zip(&probs) {
                *m += weight * p;
            }
            let total: u32 = topic_counts.sum();
            summaries.push(TopicSummary {
                topic: z as u32,
                prob: if total == 0 {
                    0.0
                } else {
                    f64::from(topic_counts[z]) / f64::from(total)
                },
                top_words: top_words(corpus, &probs, n),
            });
        }
        Self {
            states,
            topics: summaries,
            topic_marginal: Some(marginal),
        }
    }
}

impl InferenceState {
    /// Normalized tables with the `n` most probable words per state and topic
    pub fn summary(&self, n: usize) -> Summary {
        Summary::new(self, n)
    }
}
