//! Prompt word source.
//!
//! An immutable list of prompt words loaded once at startup. Sessions track
//! their own used-word rotation; selection never repeats a word until the
//! whole bank has been shown, at which point the rotation resets.

use rand::Rng;
use std::collections::HashSet;
use std::path::Path;

/// Result type for word bank operations
pub type WordBankResult<T> = Result<T, WordBankError>;

#[derive(Debug, thiserror::Error)]
pub enum WordBankError {
    #[error("failed to read word list: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse word list: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("word list is empty")]
    Empty,
}

#[derive(Debug, Clone)]
pub struct WordBank {
    words: Vec<String>,
}

impl WordBank {
    /// Create a bank from a list of words. Blank entries are dropped;
    /// an empty result is a fatal configuration error.
    pub fn new(words: Vec<String>) -> WordBankResult<Self> {
        let words: Vec<String> = words
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();

        if words.is_empty() {
            return Err(WordBankError::Empty);
        }

        Ok(Self { words })
    }

    /// Load a bank from a JSON file containing a flat array of strings.
    pub fn load(path: impl AsRef<Path>) -> WordBankResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let words: Vec<String> = serde_json::from_str(&contents)?;
        Self::new(words)
    }

    /// Pick a uniformly random word that is not in `used`. When every word
    /// has been used, the rotation resets: `used` is cleared and the pick is
    /// uniform over the full bank again.
    pub fn select_prompt(&self, used: &mut HashSet<String>) -> &str {
        let mut rng = rand::rng();

        let unused: Vec<&String> = self.words.iter().filter(|w| !used.contains(*w)).collect();
        if unused.is_empty() {
            tracing::debug!("word rotation exhausted after {} words, resetting", used.len());
            used.clear();
            return &self.words[rng.random_range(0..self.words.len())];
        }

        unused[rng.random_range(0..unused.len())]
    }

    /// Uniformly random word, ignoring any rotation. Fallback answers for
    /// fillers come from here.
    pub fn random_word(&self) -> &str {
        let mut rng = rand::rng();
        &self.words[rng.random_range(0..self.words.len())]
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
