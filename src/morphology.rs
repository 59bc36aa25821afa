//! Stem and affix processes of the morphology-aware emission model.
//!
//! A word of `n` characters has `n + 1` segmentations into a stem and an
//! affix, either of which may be empty. Stems are drawn from a Dirichlet
//! process per state, affixes from a hierarchical process per state and
//! stem that backs off to a per-state affix process.

use std::collections::{BTreeSet, HashMap};

use ndarray::{Array2, ArrayD, Ix1};

use crate::config::MorphologyParams;
use crate::counts::CountTable;
use crate::dictionary::Lexicon;
use crate::error::{Error, Result};

/// A stem and an affix, as ids in the morph lexicon.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Morph {
    pub stem: u32,
    pub affix: u32,
}

/// Every segmentation of every word of a vocabulary.
#[derive(Debug, Clone)]
pub struct Segmentations {
    morphs: Lexicon,
    /// Segmentations of each word id, indexed by split position
    splits: Vec<Vec<Morph>>,
    /// Base probability of each morph as a stem
    stem_base: Vec<f64>,
    /// Base probability of each morph as an affix
    affix_base: Vec<f64>,
    alphabet: usize,
}

impl Segmentations {
    /// Segment every word of `words` except the boundary word at id 0
    pub fn new(words: &Lexicon, params: &MorphologyParams) -> Self {
        Self::extending(Lexicon::new(), words, params)
    }

    /// Segment `words`, keeping the morph ids of `self` and adding new ones
    pub fn extend(&self, words: &Lexicon, params: &MorphologyParams) -> Self {
        Self::extending(self.morphs.clone(), words, params)
    }

    fn extending(mut morphs: Lexicon, words: &Lexicon, params: &MorphologyParams) -> Self {
        let mut letters = BTreeSet::new();
        let mut splits = Vec::with_capacity(words.len());
        for (word, id) in words.iter() {
            if id == 0 {
                splits.push(Vec::new());
                continue;
            }
            letters.extend(word.chars());
            let mut bounds: Vec<usize> = word.char_indices().map(|(b, _)| b).collect();
            bounds.push(word.len());
            let morphs_of_word = bounds
                .iter()
                .map(|&b| Morph {
                    stem: morphs.get_or_insert(&word[..b]),
                    affix: morphs.get_or_insert(&word[b..]),
                })
                .collect();
            splits.push(morphs_of_word);
        }

        let alphabet = letters.len().max(1);
        let base = |boundary: f64| -> Vec<f64> {
            let per_char = (1.0 - boundary) / alphabet as f64;
            morphs
                .iter()
                .map(|(m, _)| boundary * per_char.powi(m.chars().count() as i32))
                .collect()
        };
        let stem_base = base(params.stem_boundary());
        let affix_base = base(params.affix_boundary());
        Self {
            morphs,
            splits,
            stem_base,
            affix_base,
            alphabet,
        }
    }

    /// Segmentations of `word`, indexed by split position
    pub fn splits(&self, word: u32) -> &[Morph] {
        &self.splits[word as usize]
    }

    pub fn morphs(&self) -> &Lexicon {
        &self.morphs
    }

    /// Number of distinct characters in the vocabulary
    pub fn alphabet(&self) -> usize {
        self.alphabet
    }

    pub fn stem_base(&self, stem: u32) -> f64 {
        self.stem_base[stem as usize]
    }

    pub fn affix_base(&self, affix: u32) -> f64 {
        self.affix_base[affix as usize]
    }
}

/// Sparse counts keyed by `N` ids.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseCounts<const N: usize> {
    name: &'static str,
    cells: HashMap<[u32; N], u32>,
}

impl<const N: usize> SparseCounts<N> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            cells: HashMap::new(),
        }
    }

    #[inline]
    pub fn get(&self, key: [u32; N]) -> u32 {
        self.cells.get(&key).copied().unwrap_or(0)
    }

    pub fn inc(&mut self, key: [u32; N]) {
        *self.cells.entry(key).or_insert(0) += 1;
    }

    pub fn dec(&mut self, key: [u32; N]) -> Result<()> {
        match self.cells.get_mut(&key) {
            Some(cell) if *cell > 1 => {
                *cell -= 1;
                Ok(())
            }
            Some(_) => {
                self.cells.remove(&key);
                Ok(())
            }
            None => Err(Error::CountUnderflow {
                table: self.name,
                index: format!("{:?}", key),
            }),
        }
    }

    fn add(&mut self, other: &SparseCounts<N>) {
        for (key, &count) in &other.cells {
            *self.cells.entry(*key).or_insert(0) += count;
        }
    }

    /// Non-zero cells as rows of `N` ids followed by the count, sorted
    pub fn to_rows(&self) -> Array2<u32> {
        let mut entries: Vec<_> = self.cells.iter().collect();
        entries.sort();
        let mut rows = Array2::zeros((entries.len(), N + 1));
        for (r, (key, &count)) in entries.into_iter().enumerate() {
            for (c, &id) in key.iter().enumerate() {
                rows[[r, c]] = id;
            }
            rows[[r, N]] = count;
        }
        rows
    }
}

/// Counts of the stem and affix processes.
#[derive(Debug, Clone, PartialEq)]
pub struct MorphologyCounts {
    /// Tokens per state
    state_totals: CountTable<Ix1>,
    /// `(state, stem)` occurrences
    stem_by_state: SparseCounts<2>,
    /// `(state, affix)` occurrences
    affix_by_state: SparseCounts<2>,
    /// `(state, stem, affix)` occurrences
    affix_by_stem_by_state: SparseCounts<3>,
}

impl MorphologyCounts {
    pub fn new(states: usize) -> Self {
        Self {
            state_totals: CountTable::zeros("morph_state_totals", states),
            stem_by_state: SparseCounts::new("stem_by_state"),
            affix_by_state: SparseCounts::new("affix_by_state"),
            affix_by_stem_by_state: SparseCounts::new("affix_by_stem_by_state"),
        }
    }

    pub(crate) fn inc(&mut self, state: u32, morph: Morph) {
        self.state_totals.inc(state as usize);
        self.stem_by_state.inc([state, morph.stem]);
        self.affix_by_state.inc([state, morph.affix]);
        self.affix_by_stem_by_state.inc([state, morph.stem, morph.affix]);
    }

    pub(crate) fn dec(&mut self, state: u32, morph: Morph) -> Result<()> {
        self.state_totals.dec(state as usize)?;
        self.stem_by_state.dec([state, morph.stem])?;
        self.affix_by_state.dec([state, morph.affix])?;
        self.affix_by_stem_by_state.dec([state, morph.stem, morph.affix])
    }

    pub(crate) fn add(&mut self, other: &MorphologyCounts) {
        self.state_totals.absorb(&other.state_totals);
        self.stem_by_state.add(&other.stem_by_state);
        self.affix_by_state.add(&other.affix_by_state);
        self.affix_by_stem_by_state.add(&other.affix_by_stem_by_state);
    }

    pub(crate) fn named_tables(&self) -> Vec<(&'static str, ArrayD<u32>)> {
        vec![
            (self.state_totals.name(), self.state_totals.to_dyn()),
            (self.stem_by_state.name, self.stem_by_state.to_rows().into_dyn()),
            (self.affix_by_state.name, self.affix_by_state.to_rows().into_dyn()),
            (
                self.affix_by_stem_by_state.name,
                self.affix_by_stem_by_state.to_rows().into_dyn(),
            ),
        ]
    }

    /// Tokens assigned to `state`
    pub fn state_total(&self, state: u32) -> u32 {
        self.state_totals.get(state as usize)
    }

    pub fn stem_count(&self, state: u32, stem: u32) -> u32 {
        self.stem_by_state.get([state, stem])
    }

    pub fn affix_count(&self, state: u32, affix: u32) -> u32 {
        self.affix_by_state.get([state, affix])
    }

    pub fn stem_affix_count(&self, state: u32, stem: u32, affix: u32) -> u32 {
        self.affix_by_stem_by_state.get([state, stem, affix])
    }
}

/// Predictive probabilities of the stem and affix processes.
#[derive(Debug, Clone, Copy)]
pub struct MorphologyModel<'a> {
    pub counts: &'a MorphologyCounts,
    pub segmentations: &'a Segmentations,
    pub params: &'a MorphologyParams,
}

impl MorphologyModel<'_> {
    /// Numerator of the stem probability: `n(j, s) + mu_s b(s)`
    #[inline]
    fn stem_weight(&self, state: u32, stem: u32) -> f64 {
        f64::from(self.counts.stem_count(state, stem))
            + self.params.stem_concentration() * self.segmentations.stem_base(stem)
    }

    /// `p(stem | state)`
    pub fn stem_prob(&self, state: u32, stem: u32) -> f64 {
        self.stem_weight(state, stem)
            / (f64::from(self.counts.state_total(state)) + self.params.stem_concentration())
    }

    /// `p(affix | state)`, shared by every stem of the state
    pub fn affix_state_prob(&self, state: u32, affix: u32) -> f64 {
        let mu = self.params.affix_base_concentration();
        let base = self.segmentations.affix_base(affix);
        (f64::from(self.counts.affix_count(state, affix)) + mu * base)
            / (f64::from(self.counts.state_total(state)) + mu)
    }

    /// `p(affix | state, stem)`
    pub fn affix_prob(&self, state: u32, stem: u32, affix: u32) -> f64 {
        let mu = self.params.affix_concentration();
        (f64::from(self.counts.stem_affix_count(state, stem, affix))
            + mu * self.affix_state_prob(state, affix))
            / (f64::from(self.counts.stem_count(state, stem)) + mu)
    }

    /// Probability of `word` in `state`, summed over its segmentations
    pub fn emission(&self, state: u32, word: u32) -> f64 {
        self.segmentations
            .splits(word)
            .iter()
            .map(|m| self.stem_prob(state, m.stem) * self.affix_prob(state, m.stem, m.affix))
            .sum()
    }

    /// Unnormalized weight of each segmentation of `word` given `state`
    pub fn split_weights(&self, state: u32, word: u32, out: &mut Vec<f64>) {
        out.clear();
        out.extend(
            self.segmentations
                .splits(word)
                .iter()
                .map(|m| self.stem_weight(state, m.stem) * self.affix_prob(state, m.stem, m.affix)),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lexicon() -> Lexicon {
        Lexicon::with_reserved(&["</s>", "walks", "walked", "é"])
    }

    #[test]
    fn test_segmentations() {
        let params = MorphologyParams::default();
        let seg = Segmentations::new(&lexicon(), &params);
        assert!(seg.splits(0).is_empty());
        assert_eq!(seg.splits(1).len(), 6);
        assert_eq!(seg.splits(3).len(), 2);

        let walks = seg.splits(1);
        let walked = seg.splits(2);
        // "walk" + "s" and "walk" + "ed" share the stem
        assert_eq!(walks[4].stem, walked[4].stem);
        assert_eq!(seg.morphs().get(walks[4].affix), Some("s"));
        // the empty morph is shared by every word
        assert_eq!(walks[0].stem, walked[6].affix);

        let empty = seg.stem_base(walks[0].stem);
        assert!((empty - 0.2).abs() < 1e-12);
        assert!(seg.stem_base(walks[1].stem) < empty);
    }

    #[test]
    fn test_extend_keeps_ids() {
        let params = MorphologyParams::default();
        let seg = Segmentations::new(&lexicon(), &params);
        let mut bigger = lexicon();
        bigger.get_or_insert("talks");
        let extended = seg.extend(&bigger, &params);
        assert_eq!(extended.splits(1), seg.splits(1));
        assert_eq!(extended.splits(4).len(), 6);
        assert!(extended.morphs().len() > seg.morphs().len());
    }

    #[test]
    fn test_counts_underflow_and_symmetry() {
        let mut counts = MorphologyCounts::new(3);
        let morph = Morph { stem: 4, affix: 2 };
        counts.inc(1, morph);
        assert_eq!(counts.stem_count(1, 4), 1);
        assert_eq!(counts.stem_affix_count(1, 4, 2), 1);
        counts.dec(1, morph).unwrap();
        assert_eq!(counts, MorphologyCounts::new(3));
        assert!(counts.dec(1, morph).is_err());
    }

    #[test]
    fn test_probabilities_are_distributions() {
        let params = MorphologyParams::default();
        let seg = Segmentations::new(&lexicon(), &params);
        let mut counts = MorphologyCounts::new(2);
        counts.inc(1, seg.splits(1)[4]);
        counts.inc(1, seg.splits(2)[4]);
        let model = MorphologyModel {
            counts: &counts,
            segmentations: &seg,
            params: &params,
        };

        let mut weights = Vec::new();
        model.split_weights(1, 1, &mut weights);
        assert_eq!(weights.len(), 6);
        let best = weights
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i);
        assert_eq!(best, Some(4));

        let stem = seg.splits(1)[4].stem;
        let seen = model.stem_prob(1, stem);
        assert!(seen > model.stem_prob(1, seg.splits(2)[5].stem));
        assert!(model.emission(1, 1) > 0.0);
    }
}
