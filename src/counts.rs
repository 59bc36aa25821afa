//! Sufficient statistics of the sampler.
//!
//! Every table is a redundant view over the current token assignments. The
//! resampler removes a token with [`SufficientStats::decrement`] before
//! reading any table for it and adds it back with
//! [`SufficientStats::increment`] once its new assignment is drawn.

use std::fmt;

use bitflags::bitflags;
use ndarray::{
    s, Array, ArrayD, ArrayView, ArrayView1, ArrayView2, ArrayView3, ArrayView4, Dimension, Ix1,
    Ix2, Ix3, Ix4, NdIndex, ShapeBuilder,
};
use serde::{Deserialize, Serialize};

use crate::config::{StateLayout, TOPIC_STATE};
use crate::corpus::EOS;
use crate::error::{Error, Result};
use crate::morphology::{Morph, MorphologyCounts};

bitflags! {
    /// Count tables maintained by a model variant
    pub struct Tables: u32 {
        const STATE_BY_WORD = 0x01;
        const FIRST_ORDER = 0x02;
        const SECOND_ORDER = 0x04;
        const THIRD_ORDER = 0x08;
        const CONTENT_BY_SENTENCE = 0x10;
        const CONTENT_BY_DOCUMENT = 0x20;
        const TOPICS = 0x40;
        const MORPHOLOGY = 0x80;
    }
}

/// A dense table of counts that refuses to go negative.
#[derive(Debug, Clone, PartialEq)]
pub struct CountTable<D: Dimension> {
    name: &'static str,
    cells: Array<u32, D>,
}

impl<D: Dimension> CountTable<D> {
    pub fn zeros<Sh: ShapeBuilder<Dim = D>>(name: &'static str, shape: Sh) -> Self {
        Self {
            name,
            cells: Array::zeros(shape),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    #[inline]
    pub fn get<I: NdIndex<D>>(&self, index: I) -> u32 {
        self.cells[index]
    }

    #[inline]
    pub fn inc<I: NdIndex<D>>(&mut self, index: I) {
        self.cells[index] += 1;
    }

    /// Subtract one from a cell; a zero cell is a bookkeeping error.
    #[inline]
    pub fn dec<I: NdIndex<D> + Copy + fmt::Debug>(&mut self, index: I) -> Result<()> {
        match self.cells.get_mut(index) {
            Some(cell) if *cell > 0 => {
                *cell -= 1;
                Ok(())
            }
            _ => Err(Error::CountUnderflow {
                table: self.name,
                index: format!("{:?}", index),
            }),
        }
    }

    /// Sum of all cells
    pub fn total(&self) -> u64 {
        self.cells.iter().map(|&c| u64::from(c)).sum()
    }

    pub fn view(&self) -> ArrayView<'_, u32, D> {
        self.cells.view()
    }

    pub fn shape(&self) -> &[usize] {
        self.cells.shape()
    }

    /// Add every cell of `other`, which must have the same shape
    pub(crate) fn absorb(&mut self, other: &CountTable<D>) {
        self.cells += &other.cells;
    }

    pub(crate) fn to_dyn(&self) -> ArrayD<u32> {
        self.cells.clone().into_dyn()
    }
}

/// States preceding a token, most recent first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct History {
    pub prev1: u32,
    pub prev2: u32,
    pub prev3: u32,
}

impl History {
    /// History at the start of a sentence
    pub const START: History = History {
        prev1: 0,
        prev2: 0,
        prev3: 0,
    };

    /// Shift `state` in as the most recent state
    pub fn push(&mut self, state: u32) {
        self.prev3 = self.prev2;
        self.prev2 = self.prev1;
        self.prev1 = state;
    }
}

/// Everything a single token contributes to the tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Site {
    pub word: u32,
    pub state: u32,
    /// History the transition counts are keyed by
    pub history: History,
    pub sentence: u32,
    pub document: u32,
    pub topic: u32,
    pub morph: Morph,
}

impl Site {
    /// A sentence boundary: contributes one transition into state 0
    pub fn boundary(history: History) -> Self {
        Self {
            word: EOS,
            state: 0,
            history,
            sentence: 0,
            document: 0,
            topic: 0,
            morph: Morph::default(),
        }
    }
}

/// Sizes of the table axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub layout: StateLayout,
    pub words: usize,
    pub sentences: usize,
    pub documents: usize,
    pub topics: usize,
}

/// All count tables of a model.
///
/// Tables the variant does not use are allocated empty and never touched.
#[derive(Debug, Clone, PartialEq)]
pub struct SufficientStats {
    tables: Tables,
    layout: StateLayout,
    pub(crate) state_counts: CountTable<Ix1>,
    pub(crate) state_by_word: CountTable<Ix2>,
    pub(crate) first_order: CountTable<Ix2>,
    pub(crate) second_order: CountTable<Ix3>,
    pub(crate) third_order: CountTable<Ix4>,
    pub(crate) content_by_context: CountTable<Ix2>,
    pub(crate) context_counts: CountTable<Ix1>,
    pub(crate) topic_counts: CountTable<Ix1>,
    pub(crate) topic_by_word: CountTable<Ix2>,
    pub(crate) document_by_topic: CountTable<Ix2>,
    pub(crate) morphology: MorphologyCounts,
}

impl SufficientStats {
    pub fn new(tables: Tables, dims: Dimensions) -> Self {
        let s = dims.layout.states();
        let c = dims.layout.content();
        let used = |flag: Tables, n: usize| if tables.contains(flag) { n } else { 0 };

        let s1 = used(Tables::FIRST_ORDER, s);
        let s2 = used(Tables::SECOND_ORDER, s);
        let s3 = used(Tables::THIRD_ORDER, s);
        let contexts = if tables.contains(Tables::CONTENT_BY_SENTENCE) {
            dims.sentences
        } else if tables.contains(Tables::CONTENT_BY_DOCUMENT) {
            dims.documents
        } else {
            0
        };
        let k = used(Tables::TOPICS, dims.topics);

        Self {
            tables,
            layout: dims.layout,
            state_counts: CountTable::zeros("state_counts", s),
            state_by_word: CountTable::zeros("state_by_word", (dims.words, s)),
            first_order: CountTable::zeros("first_order", (s1, s1)),
            second_order: CountTable::zeros("second_order", (s2, s2, s2)),
            third_order: CountTable::zeros("third_order", (s3, s3, s3, s3)),
            content_by_context: CountTable::zeros("content_by_context", (contexts, c)),
            context_counts: CountTable::zeros("context_counts", contexts),
            topic_counts: CountTable::zeros("topic_counts", k),
            topic_by_word: CountTable::zeros(
                "topic_by_word",
                (used(Tables::TOPICS, dims.words), k),
            ),
            document_by_topic: CountTable::zeros(
                "document_by_topic",
                (used(Tables::TOPICS, dims.documents), k),
            ),
            morphology: MorphologyCounts::new(used(Tables::MORPHOLOGY, s)),
        }
    }

    pub fn tables(&self) -> Tables {
        self.tables
    }

    fn is_topic_state(&self, state: usize) -> bool {
        self.tables.contains(Tables::TOPICS) && state == TOPIC_STATE
    }

    /// Context a token is counted against; only content states other than
    /// the topic state have one
    fn context_of(&self, site: &Site) -> Option<usize> {
        let s = site.state as usize;
        if !self.layout.is_content(s) || self.is_topic_state(s) {
            return None;
        }
        if self.tables.contains(Tables::CONTENT_BY_SENTENCE) {
            Some(site.sentence as usize)
        } else if self.tables.contains(Tables::CONTENT_BY_DOCUMENT) {
            Some(site.document as usize)
        } else {
            None
        }
    }

    /// Remove a token from every table it participates in.
    pub fn decrement(&mut self, site: &Site) -> Result<()> {
        let s = site.state as usize;
        let h1 = site.history.prev1 as usize;
        let h2 = site.history.prev2 as usize;
        let h3 = site.history.prev3 as usize;

        if self.tables.contains(Tables::FIRST_ORDER) {
            self.first_order.dec([h1, s])?;
        }
        if self.tables.contains(Tables::SECOND_ORDER) {
            self.second_order.dec([h2, h1, s])?;
        }
        if self.tables.contains(Tables::THIRD_ORDER) {
            self.third_order.dec([h3, h2, h1, s])?;
        }
        if site.word == EOS {
            return Ok(());
        }

        let w = site.word as usize;
        self.state_counts.dec(s)?;
        self.state_by_word.dec([w, s])?;
        if let Some(x) = self.context_of(site) {
            self.content_by_context.dec([x, s])?;
            self.context_counts.dec(x)?;
        }
        if self.is_topic_state(s) {
            let z = site.topic as usize;
            self.document_by_topic.dec([site.document as usize, z])?;
            self.topic_by_word.dec([w, z])?;
            self.topic_counts.dec(z)?;
        }
        if self.tables.contains(Tables::MORPHOLOGY) {
            self.morphology.dec(site.state, site.morph)?;
        }
        Ok(())
    }

    /// Add a token to every table it participates in.
    pub fn increment(&mut self, site: &Site) -> Result<()> {
        let s = site.state as usize;
        let h1 = site.history.prev1 as usize;
        let h2 = site.history.prev2 as usize;
        let h3 = site.history.prev3 as usize;

        if self.tables.contains(Tables::FIRST_ORDER) {
            self.first_order.inc([h1, s]);
        }
        if self.tables.contains(Tables::SECOND_ORDER) {
            self.second_order.inc([h2, h1, s]);
        }
        if self.tables.contains(Tables::THIRD_ORDER) {
            self.third_order.inc([h3, h2, h1, s]);
        }
        if site.word == EOS {
            return Ok(());
        }

        let w = site.word as usize;
        self.state_counts.inc(s);
        self.state_by_word.inc([w, s]);
        if let Some(x) = self.context_of(site) {
            self.content_by_context.inc([x, s]);
            self.context_counts.inc(x);
        }
        if self.is_topic_state(s) {
            let z = site.topic as usize;
            self.document_by_topic.inc([site.document as usize, z]);
            self.topic_by_word.inc([w, z]);
            self.topic_counts.inc(z);
        }
        if self.tables.contains(Tables::MORPHOLOGY) {
            self.morphology.inc(site.state, site.morph);
        }
        Ok(())
    }

    /// Add the counts of `prior` to these tables.
    ///
    /// Word rows of `prior` map onto the first rows of this store, so its
    /// vocabulary must be a prefix of ours. Context tables are not copied.
    pub(crate) fn add_prior(&mut self, prior: &SufficientStats) -> Result<()> {
        if prior.tables != self.tables || prior.layout != self.layout {
            return Err(Error::Inconsistent(
                "prior counts come from a different model".to_string(),
            ));
        }
        let pw = prior.state_by_word.shape()[0];
        if pw > self.state_by_word.shape()[0] {
            return Err(Error::Inconsistent(
                "prior vocabulary is larger than the target vocabulary".to_string(),
            ));
        }
        self.state_counts.absorb(&prior.state_counts);
        {
            let mut rows = self.state_by_word.cells.slice_mut(s![..pw, ..]);
            rows += &prior.state_by_word.cells;
        }
        self.first_order.absorb(&prior.first_order);
        self.second_order.absorb(&prior.second_order);
        self.third_order.absorb(&prior.third_order);
        if self.tables.contains(Tables::TOPICS) {
            self.topic_counts.absorb(&prior.topic_counts);
            let mut rows = self.topic_by_word.cells.slice_mut(s![..pw, ..]);
            rows += &prior.topic_by_word.cells;
        }
        self.morphology.add(&prior.morphology);
        Ok(())
    }

    /// Every maintained table, by name
    pub fn named_tables(&self) -> Vec<(&'static str, ArrayD<u32>)> {
        let mut out = vec![
            (self.state_counts.name(), self.state_counts.to_dyn()),
            (self.state_by_word.name(), self.state_by_word.to_dyn()),
        ];
        if self.tables.contains(Tables::FIRST_ORDER) {
            out.push((self.first_order.name(), self.first_order.to_dyn()));
        }
        if self.tables.contains(Tables::SECOND_ORDER) {
            out.push((self.second_order.name(), self.second_order.to_dyn()));
        }
        if self.tables.contains(Tables::THIRD_ORDER) {
            out.push((self.third_order.name(), self.third_order.to_dyn()));
        }
        if self
            .tables
            .intersects(Tables::CONTENT_BY_SENTENCE | Tables::CONTENT_BY_DOCUMENT)
        {
            out.push((self.content_by_context.name(), self.content_by_context.to_dyn()));
            out.push((self.context_counts.name(), self.context_counts.to_dyn()));
        }
        if self.tables.contains(Tables::TOPICS) {
            out.push((self.topic_counts.name(), self.topic_counts.to_dyn()));
            out.push((self.topic_by_word.name(), self.topic_by_word.to_dyn()));
            out.push((self.document_by_topic.name(), self.document_by_topic.to_dyn()));
        }
        if self.tables.contains(Tables::MORPHOLOGY) {
            out.extend(self.morphology.named_tables());
        }
        out
    }

    /// Name of the first table that differs from `other`, if any
    pub fn diff(&self, other: &SufficientStats) -> Option<&'static str> {
        let ours = self.named_tables();
        let theirs = other.named_tables();
        for (name, table) in &ours {
            match theirs.iter().find(|(n, _)| n == name) {
                Some((_, t)) if t == table => {}
                _ => return Some(*name),
            }
        }
        theirs
            .iter()
            .find(|(n, _)| !ours.iter().any(|(m, _)| m == n))
            .map(|(n, _)| *n)
    }

    /// Sum of every maintained table, by name
    pub fn totals(&self) -> Vec<(&'static str, u64)> {
        self.named_tables()
            .into_iter()
            .map(|(name, table)| (name, table.iter().map(|&c| u64::from(c)).sum()))
            .collect()
    }

    /// Occurrences of each state over non-boundary tokens
    pub fn state_counts(&self) -> ArrayView1<'_, u32> {
        self.state_counts.view()
    }

    /// `[word][state]` co-occurrences
    pub fn state_by_word(&self) -> ArrayView2<'_, u32> {
        self.state_by_word.view()
    }

    /// `[prev1][state]` transitions
    pub fn first_order(&self) -> ArrayView2<'_, u32> {
        self.first_order.view()
    }

    /// `[prev2][prev1][state]` transitions
    pub fn second_order(&self) -> ArrayView3<'_, u32> {
        self.second_order.view()
    }

    /// `[prev3][prev2][prev1][state]` transitions
    pub fn third_order(&self) -> ArrayView4<'_, u32> {
        self.third_order.view()
    }

    /// `[sentence or document][content state]` co-occurrences
    pub fn content_by_context(&self) -> ArrayView2<'_, u32> {
        self.content_by_context.view()
    }

    /// Context-conditioned tokens per sentence or document
    pub fn context_counts(&self) -> ArrayView1<'_, u32> {
        self.context_counts.view()
    }

    pub fn topic_counts(&self) -> ArrayView1<'_, u32> {
        self.topic_counts.view()
    }

    /// `[word][topic]` co-occurrences of topic-state tokens
    pub fn topic_by_word(&self) -> ArrayView2<'_, u32> {
        self.topic_by_word.view()
    }

    /// `[document][topic]` co-occurrences of topic-state tokens
    pub fn document_by_topic(&self) -> ArrayView2<'_, u32> {
        self.document_by_topic.view()
    }

    pub fn morphology(&self) -> &MorphologyCounts {
        &self.morphology
    }
}
