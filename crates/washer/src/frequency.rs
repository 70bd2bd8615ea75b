use std::collections::HashSet;

use crate::reference::References;
use crate::FastMap8;

/// The token document-frequency dictionary: for every token, the number of
/// references containing it. A token repeated inside one reference still
/// counts once.
///
/// Must be rebuilt whenever a corrector rewrites the reference dictionary.
#[derive(Debug, Default, Clone)]
pub struct TokenFrequencies {
    counts: FastMap8<String, u64>,
}

impl TokenFrequencies {
    pub fn build(references: &References) -> TokenFrequencies {
        let mut counts = FastMap8::<String, u64>::default();
        let mut seen = HashSet::new();
        for (_id, _name, tokens) in references.iter() {
            seen.clear();
            for token in tokens {
                if seen.insert(token.as_str()) {
                    *counts.entry(token.clone()).or_insert(0) += 1;
                }
            }
        }
        TokenFrequencies { counts }
    }

    /// The document frequency of a token, zero when unknown.
    pub fn frequency(&self, token: &str) -> u64 {
        self.counts.get(token).copied().unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(token, count)| (token.as_str(), *count))
    }

    /// All tokens sorted by frequency descending, ties broken by token so the
    /// correction walk is deterministic.
    pub fn sorted_by_frequency_desc(&self) -> Vec<(&str, u64)> {
        let mut sorted: Vec<_> = self.iter().collect();
        sorted.sort_unstable_by(|(t1, f1), (t2, f2)| f2.cmp(f1).then_with(|| t1.cmp(t2)));
        sorted
    }
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;

    #[test]
    fn counts_are_document_frequencies() {
        let mut refs = References::new();
        refs.insert("A1", vec![S("JOHN"), S("SMITH"), S("JOHN")]);
        refs.insert("A2", vec![S("JOHN"), S("OAK")]);
        let freqs = TokenFrequencies::build(&refs);
        assert_eq!(freqs.frequency("JOHN"), 2);
        assert_eq!(freqs.frequency("SMITH"), 1);
        assert_eq!(freqs.frequency("OAK"), 1);
        assert_eq!(freqs.frequency("MAIN"), 0);

        // The sum of frequencies is the sum of unique tokens per reference.
        let total: u64 = freqs.iter().map(|(_, count)| count).sum();
        assert_eq!(total, 4);
    }

    #[test]
    fn sorted_order_is_deterministic() {
        let mut refs = References::new();
        refs.insert("A1", vec![S("B"), S("A")]);
        refs.insert("A2", vec![S("B"), S("A")]);
        refs.insert("A3", vec![S("C")]);
        let freqs = TokenFrequencies::build(&refs);
        let sorted = freqs.sorted_by_frequency_desc();
        assert_eq!(sorted, vec![("A", 2), ("B", 2), ("C", 1)]);
    }
}
