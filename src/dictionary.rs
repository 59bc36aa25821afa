use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A bidirectional mapping between strings and dense integer ids.
///
/// Used for the word vocabulary, the gold tag set and the morph lexicon.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct Lexicon {
    /// Map from string to ID
    str_to_id: HashMap<String, u32>,
    /// Map from ID to string
    id_to_str: Vec<String>,
}

impl Lexicon {
    /// Create a new empty lexicon
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a lexicon whose first entries are `reserved`, in order.
    pub fn with_reserved(reserved: &[&str]) -> Self {
        let mut lexicon = Self::new();
        for s in reserved {
            lexicon.get_or_insert(s);
        }
        lexicon
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.id_to_str.len()
    }

    /// Returns `true` if the lexicon contains no entries
    pub fn is_empty(&self) -> bool {
        self.id_to_str.is_empty()
    }

    /// Get or create an ID for a string
    pub fn get_or_insert(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.str_to_id.get(s) {
            id
        } else {
            let id = self.id_to_str.len() as u32;
            self.str_to_id.insert(s.to_string(), id);
            self.id_to_str.push(s.to_string());
            id
        }
    }

    /// Look up the ID of a string without inserting it
    pub fn id(&self, s: &str) -> Option<u32> {
        self.str_to_id.get(s).copied()
    }

    /// Look up the string of an ID
    pub fn get(&self, id: u32) -> Option<&str> {
        self.id_to_str.get(id as usize).map(String::as_str)
    }

    /// Iterate over all (string, id) pairs
    pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> + '_ {
        self.id_to_str
            .iter()
            .enumerate()
            .map(|(id, s)| (s.as_str(), id as u32))
    }
}

impl From<Vec<String>> for Lexicon {
    fn from(id_to_str: Vec<String>) -> Self {
        let str_to_id = id_to_str
            .iter()
            .enumerate()
            .map(|(id, s)| (s.clone(), id as u32))
            .collect();
        Self {
            str_to_id,
            id_to_str,
        }
    }
}

impl From<Lexicon> for Vec<String> {
    fn from(lexicon: Lexicon) -> Self {
        lexicon.id_to_str
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lexicon_basic() {
        let mut lex = Lexicon::new();
        assert_eq!(lex.len(), 0);

        let id1 = lex.get_or_insert("hello");
        assert_eq!(id1, 0);
        assert_eq!(lex.len(), 1);

        let id2 = lex.get_or_insert("world");
        assert_eq!(id2, 1);
        assert_eq!(lex.len(), 2);

        // Getting the same string should return the same ID
        let id3 = lex.get_or_insert("hello");
        assert_eq!(id3, id1);
        assert_eq!(lex.len(), 2);
        assert_eq!(lex.get(1), Some("world"));
        assert_eq!(lex.id("rust"), None);
    }

    #[test]
    fn test_lexicon_reserved() {
        let lex = Lexicon::with_reserved(&["</s>"]);
        assert_eq!(lex.id("</s>"), Some(0));
        assert_eq!(lex.len(), 1);
    }

    #[test]
    fn test_lexicon_roundtrip_through_vec() {
        let mut lex = Lexicon::new();
        lex.get_or_insert("hello");
        lex.get_or_insert("world");
        lex.get_or_insert("rust");

        let strings: Vec<String> = lex.clone().into();
        let back = Lexicon::from(strings);
        let items: Vec<_> = back.iter().collect();
        assert_eq!(items, vec![("hello", 0), ("world", 1), ("rust", 2)]);
        assert_eq!(back.id("rust"), Some(2));
    }
}
