use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::{debug, warn};

/// The dictionary of known words used by the global corrector: a rare token
/// that appears in this list is a real word, not a misspelling candidate.
#[derive(Debug, Default, Clone)]
pub struct WordList {
    words: HashSet<String>,
}

impl WordList {
    /// Loads one word per line. A missing or unreadable file is not an
    /// error: correction then runs without a word list.
    pub fn load(path: &Path) -> WordList {
        let file = match File::open(path) {
            Ok(file) => file,
            Err(error) => {
                warn!("cannot read word list {:?}, continuing without it: {error}", path);
                return WordList::default();
            }
        };
        let mut words = HashSet::new();
        for line in BufReader::new(file).lines() {
            match line {
                Ok(line) => {
                    let word = line.trim();
                    if !word.is_empty() {
                        words.insert(word.to_string());
                    }
                }
                Err(error) => {
                    warn!("stopping word list read on error: {error}");
                    break;
                }
            }
        }
        debug!(words = words.len(), "word list loaded");
        WordList { words }
    }

    pub fn contains(&self, token: &str) -> bool {
        self.words.contains(token)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}
