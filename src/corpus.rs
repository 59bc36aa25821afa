use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::dictionary::Lexicon;
use crate::error::{Error, Result};

/// Word id of the end-of-sentence marker.
pub const EOS: u32 = 0;

/// Surface form of the end-of-sentence marker, reserved in every lexicon.
pub const EOS_WORD: &str = "</s>";

/// A fully materialized token sequence.
///
/// Tokens are stored in parallel arrays; a token is identified only by its
/// position. Every sentence is terminated by an [`EOS`] token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Corpus {
    /// Word id of each token
    words: Vec<u32>,
    /// Sentence id of each token
    sentences: Vec<u32>,
    /// Document id of each token
    documents: Vec<u32>,
    /// Gold tag id of each token, if the corpus is annotated
    gold: Option<Vec<u32>>,
    num_sentences: usize,
    num_documents: usize,
    /// Word lexicon, `EOS_WORD` at id 0
    lexicon: Lexicon,
    /// Gold tag lexicon, `EOS_WORD` at id 0
    tags: Lexicon,
}

impl Corpus {
    /// Start building a corpus sentence by sentence
    pub fn builder() -> CorpusBuilder {
        CorpusBuilder::new()
    }

    /// Create a corpus from already materialized arrays.
    ///
    /// `lexicon` must map [`EOS_WORD`] to [`EOS`] and cover every word id.
    pub fn from_arrays(
        lexicon: Lexicon,
        words: Vec<u32>,
        sentences: Vec<u32>,
        documents: Vec<u32>,
    ) -> Result<Self> {
        if words.len() != sentences.len() || words.len() != documents.len() {
            return Err(Error::corpus(
                "words, sentences and documents must have the same length",
            ));
        }
        if lexicon.id(EOS_WORD) != Some(EOS) {
            return Err(Error::corpus(format!(
                "lexicon must map {} to word id {}",
                EOS_WORD, EOS
            )));
        }
        if let Some(&w) = words.iter().find(|&&w| w as usize >= lexicon.len()) {
            return Err(Error::corpus(format!(
                "word id {} is outside the lexicon of {} entries",
                w,
                lexicon.len()
            )));
        }
        let num_sentences = sentences.iter().max().map_or(0, |&x| x as usize + 1);
        let num_documents = documents.iter().max().map_or(0, |&x| x as usize + 1);
        Ok(Self {
            words,
            sentences,
            documents,
            gold: None,
            num_sentences,
            num_documents,
            lexicon,
            tags: Lexicon::with_reserved(&[EOS_WORD]),
        })
    }

    /// Attach gold tags to the corpus
    pub fn with_gold(mut self, tags: Lexicon, gold: Vec<u32>) -> Result<Self> {
        if gold.len() != self.words.len() {
            return Err(Error::corpus("gold tags must have one entry per token"));
        }
        if tags.id(EOS_WORD) != Some(EOS) {
            return Err(Error::corpus(format!(
                "tag lexicon must map {} to tag id {}",
                EOS_WORD, EOS
            )));
        }
        for (i, (&w, &t)) in self.words.iter().zip(gold.iter()).enumerate() {
            if t as usize >= tags.len() {
                return Err(Error::corpus(format!(
                    "gold tag id {} at token {} is outside the tag lexicon",
                    t, i
                )));
            }
            if (w == EOS) != (t == EOS) {
                return Err(Error::corpus(format!(
                    "token {} must carry the boundary tag if and only if it is a boundary",
                    i
                )));
            }
        }
        self.tags = tags;
        self.gold = Some(gold);
        Ok(self)
    }

    /// Number of tokens, boundaries included
    pub fn len(&self) -> usize {
        self.words.len()
    }

    /// Returns `true` if the corpus has no tokens
    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn word(&self, i: usize) -> u32 {
        self.words[i]
    }

    pub fn sentence(&self, i: usize) -> u32 {
        self.sentences[i]
    }

    pub fn document(&self, i: usize) -> u32 {
        self.documents[i]
    }

    /// Gold tag id of token `i`, if annotated
    pub fn gold(&self, i: usize) -> Option<u32> {
        self.gold.as_ref().map(|g| g[i])
    }

    pub fn is_tagged(&self) -> bool {
        self.gold.is_some()
    }

    /// Returns `true` if token `i` is a sentence boundary
    pub fn is_boundary(&self, i: usize) -> bool {
        self.words[i] == EOS
    }

    pub fn num_sentences(&self) -> usize {
        self.num_sentences
    }

    pub fn num_documents(&self) -> usize {
        self.num_documents
    }

    /// Vocabulary size, boundary word included
    pub fn vocabulary_size(&self) -> usize {
        self.lexicon.len()
    }

    pub fn lexicon(&self) -> &Lexicon {
        &self.lexicon
    }

    pub fn tags(&self) -> &Lexicon {
        &self.tags
    }

    /// Re-express the word ids of this corpus in `lexicon`, adding unseen words.
    pub(crate) fn remap(&self, lexicon: &mut Lexicon) -> Corpus {
        let mapping: Vec<u32> = self
            .lexicon
            .iter()
            .map(|(s, _)| lexicon.get_or_insert(s))
            .collect();
        let words = self.words.iter().map(|&w| mapping[w as usize]).collect();
        Corpus {
            words,
            sentences: self.sentences.clone(),
            documents: self.documents.clone(),
            gold: self.gold.clone(),
            num_sentences: self.num_sentences,
            num_documents: self.num_documents,
            lexicon: lexicon.clone(),
            tags: self.tags.clone(),
        }
    }
}

/// Builds a [`Corpus`] from tokenized sentences grouped into documents.
#[derive(Debug)]
pub struct CorpusBuilder {
    lexicon: Lexicon,
    tags: Lexicon,
    words: Vec<u32>,
    sentences: Vec<u32>,
    documents: Vec<u32>,
    gold: Vec<u32>,
    tagged: Option<bool>,
    sentence: u32,
    document: u32,
    document_open: bool,
}

impl Default for CorpusBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CorpusBuilder {
    pub fn new() -> Self {
        Self {
            lexicon: Lexicon::with_reserved(&[EOS_WORD]),
            tags: Lexicon::with_reserved(&[EOS_WORD]),
            words: Vec::new(),
            sentences: Vec::new(),
            documents: Vec::new(),
            gold: Vec::new(),
            tagged: None,
            sentence: 0,
            document: 0,
            document_open: false,
        }
    }

    /// Append an untagged sentence; a boundary token is added after it
    pub fn push_sentence<W: AsRef<str>>(&mut self, words: &[W]) -> Result<()> {
        self.check_tagged(false)?;
        self.push(words, None::<&[&str]>)
    }

    /// Append a sentence with one gold tag per word
    pub fn push_tagged_sentence<W, T>(&mut self, words: &[W], tags: &[T]) -> Result<()>
    where
        W: AsRef<str>,
        T: AsRef<str>,
    {
        if words.len() != tags.len() {
            return Err(Error::corpus("words and tags must have the same length"));
        }
        self.check_tagged(true)?;
        self.push(words, Some(tags))
    }

    /// Close the current document; following sentences start a new one
    pub fn end_document(&mut self) {
        if self.document_open {
            self.document += 1;
            self.document_open = false;
        }
    }

    pub fn build(self) -> Result<Corpus> {
        let corpus = Corpus::from_arrays(self.lexicon, self.words, self.sentences, self.documents)?;
        if self.tagged == Some(true) {
            corpus.with_gold(self.tags, self.gold)
        } else {
            Ok(corpus)
        }
    }

    fn check_tagged(&mut self, tagged: bool) -> Result<()> {
        match self.tagged {
            Some(t) if t != tagged => Err(Error::corpus(
                "cannot mix tagged and untagged sentences",
            )),
            _ => {
                self.tagged = Some(tagged);
                Ok(())
            }
        }
    }

    fn push<W: AsRef<str>, T: AsRef<str>>(
        &mut self,
        words: &[W],
        tags: Option<&[T]>,
    ) -> Result<()> {
        if words.is_empty() {
            return Err(Error::corpus("empty sentences are not allowed"));
        }
        if words.iter().any(|w| w.as_ref() == EOS_WORD) {
            return Err(Error::corpus(format!(
                "the boundary word {} cannot appear inside a sentence",
                EOS_WORD
            )));
        }
        if let Some(tags) = tags {
            if tags.iter().any(|t| t.as_ref() == EOS_WORD) {
                return Err(Error::corpus(format!(
                    "the boundary tag {} cannot appear inside a sentence",
                    EOS_WORD
                )));
            }
            for t in tags {
                let id = self.tags.get_or_insert(t.as_ref());
                self.gold.push(id);
            }
            self.gold.push(EOS);
        }
        for w in words {
            let id = self.lexicon.get_or_insert(w.as_ref());
            self.words.push(id);
        }
        self.words.push(EOS);
        let n = words.len() + 1;
        self.sentences.extend(std::iter::repeat(self.sentence).take(n));
        self.documents.extend(std::iter::repeat(self.document).take(n));
        self.sentence += 1;
        self.document_open = true;
        Ok(())
    }
}

/// Maps gold tags onto states for supervised training.
///
/// Content tags take states `1..=content_states`, function tags the states
/// after them. The boundary tag maps to state 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagMap {
    states: HashMap<String, u32>,
    names: Vec<String>,
    content_states: usize,
}

impl TagMap {
    /// Build a tag map over every tag of `tags`, in id order
    pub fn new<F>(tags: &Lexicon, is_content: F) -> Self
    where
        F: Fn(&str) -> bool,
    {
        let mut names = vec![EOS_WORD.to_string()];
        let (content, function): (Vec<&str>, Vec<&str>) = tags
            .iter()
            .filter(|&(s, _)| s != EOS_WORD)
            .map(|(s, _)| s)
            .partition(|s| is_content(s));
        let content_states = content.len();
        names.extend(content.into_iter().map(String::from));
        names.extend(function.into_iter().map(String::from));
        let states = names
            .iter()
            .enumerate()
            .map(|(state, s)| (s.clone(), state as u32))
            .collect();
        Self {
            states,
            names,
            content_states,
        }
    }

    /// Build a tag map from the gold tag set of an annotated corpus
    pub fn from_corpus<F>(corpus: &Corpus, is_content: F) -> Result<Self>
    where
        F: Fn(&str) -> bool,
    {
        if !corpus.is_tagged() {
            return Err(Error::corpus("a tag map needs an annotated corpus"));
        }
        Ok(Self::new(corpus.tags(), is_content))
    }

    /// State of a tag
    pub fn state(&self, tag: &str) -> Option<u32> {
        self.states.get(tag).copied()
    }

    /// Tag of a state
    pub fn tag(&self, state: u32) -> Option<&str> {
        self.names.get(state as usize).map(String::as_str)
    }

    /// Number of content states, the boundary state excluded
    pub fn content_states(&self) -> usize {
        self.content_states
    }

    pub fn function_states(&self) -> usize {
        self.names.len() - 1 - self.content_states
    }

    /// States of the gold tags of `corpus`; tags missing from the map are `None`
    pub fn gold_states(&self, corpus: &Corpus) -> Option<Vec<Option<u32>>> {
        let tags = corpus.tags();
        let gold = corpus.gold.as_ref()?;
        Some(
            gold.iter()
                .map(|&t| tags.get(t).and_then(|name| self.state(name)))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Corpus {
        let mut builder = Corpus::builder();
        builder
            .push_tagged_sentence(&["the", "dog", "barks"], &["DT", "NN", "VB"])
            .unwrap();
        builder
            .push_tagged_sentence(&["a", "dog"], &["DT", "NN"])
            .unwrap();
        builder.end_document();
        builder
            .push_tagged_sentence(&["the", "cat"], &["DT", "NN"])
            .unwrap();
        builder.build().unwrap()
    }

    #[test]
    fn test_builder_appends_boundaries() {
        let corpus = sample();
        assert_eq!(corpus.len(), 10);
        assert_eq!(corpus.num_sentences(), 3);
        assert_eq!(corpus.num_documents(), 2);
        assert!(corpus.is_boundary(3));
        assert!(corpus.is_boundary(6));
        assert!(corpus.is_boundary(9));
        assert_eq!(corpus.word(1), corpus.word(5));
        assert_eq!(corpus.sentence(4), 1);
        assert_eq!(corpus.document(7), 1);
        assert_eq!(corpus.gold(3), Some(EOS));
        assert_eq!(corpus.vocabulary_size(), 6);
    }

    #[test]
    fn test_builder_rejects_bad_input() {
        let mut builder = Corpus::builder();
        let empty: [&str; 0] = [];
        assert!(builder.push_sentence(&empty).is_err());
        assert!(builder.push_sentence(&["a", EOS_WORD]).is_err());
        builder.push_sentence(&["a"]).unwrap();
        let err = builder.push_tagged_sentence(&["b"], &["X"]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid corpus: cannot mix tagged and untagged sentences"
        );
    }

    #[test]
    fn test_from_arrays_validation() {
        let lexicon = Lexicon::with_reserved(&[EOS_WORD, "a"]);
        assert!(Corpus::from_arrays(lexicon.clone(), vec![1, 0], vec![0], vec![0, 0]).is_err());
        assert!(Corpus::from_arrays(lexicon.clone(), vec![2, 0], vec![0, 0], vec![0, 0]).is_err());
        let corpus = Corpus::from_arrays(lexicon, vec![1, 0], vec![0, 0], vec![0, 0]).unwrap();
        assert_eq!(corpus.num_sentences(), 1);
        assert!(!corpus.is_tagged());
    }

    #[test]
    fn test_remap_into_larger_lexicon() {
        let mut train = Corpus::builder();
        train.push_sentence(&["x", "y"]).unwrap();
        let train = train.build().unwrap();

        let mut test = Corpus::builder();
        test.push_sentence(&["z", "x"]).unwrap();
        let test = test.build().unwrap();

        let mut lexicon = train.lexicon().clone();
        let remapped = test.remap(&mut lexicon);
        assert_eq!(remapped.words(), &[3, 1, 0]);
        assert_eq!(remapped.vocabulary_size(), 4);
    }

    #[test]
    fn test_tag_map() {
        let corpus = sample();
        let map =
            TagMap::from_corpus(&corpus, |t| t.starts_with('N') || t.starts_with('V')).unwrap();
        assert_eq!(map.content_states(), 2);
        assert_eq!(map.function_states(), 1);
        assert_eq!(map.state(EOS_WORD), Some(0));
        assert_eq!(map.state("NN"), Some(1));
        assert_eq!(map.state("VB"), Some(2));
        assert_eq!(map.state("DT"), Some(3));
        assert_eq!(map.tag(3), Some("DT"));

        let gold = map.gold_states(&corpus).unwrap();
        assert_eq!(gold[0], Some(3));
        assert_eq!(gold[3], Some(0));
    }
}
