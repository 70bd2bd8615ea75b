mod matrix;

use std::collections::HashSet;

use rayon::prelude::*;
use tracing::debug;

pub use self::matrix::TokenMatch;
use crate::blocking::BlockPair;
use crate::config::ComparatorType;
use crate::frequency::TokenFrequencies;
use crate::reference::References;
use crate::{is_numeric_token, Config};

/// A candidate pair that passed the similarity threshold μ.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredPair {
    pub pair: BlockPair,
    pub similarity: f64,
}

/// The pre-scoring stop-word filter: comparators only ever see content
/// tokens. Frequency σ always applies; short and numeric tokens are also
/// dropped when `removeExcludedBlkTokens`, and duplicates when
/// `removeDuplicateTokens`.
pub fn filter_tokens<'a>(
    tokens: &'a [String],
    frequencies: &TokenFrequencies,
    config: &Config,
) -> Vec<&'a str> {
    let mut kept = Vec::<&str>::new();
    for token in tokens {
        if frequencies.frequency(token) >= config.sigma {
            continue;
        }
        if config.remove_excluded_blk_tokens {
            if token.chars().count() < config.min_blk_token_len {
                continue;
            }
            if config.exclude_numeric_blocks && is_numeric_token(token) {
                continue;
            }
        }
        if config.remove_duplicate_tokens && kept.contains(&token.as_str()) {
            continue;
        }
        kept.push(token);
    }
    kept
}

/// Token-set cosine similarity.
fn cosine(a: &[&str], b: &[&str]) -> f64 {
    let sa: HashSet<&str> = a.iter().copied().collect();
    let sb: HashSet<&str> = b.iter().copied().collect();
    if sa.is_empty() || sb.is_empty() {
        return 0.0;
    }
    let intersection = sa.intersection(&sb).count() as f64;
    intersection / ((sa.len() as f64).sqrt() * (sb.len() as f64).sqrt())
}

/// Monge-Elkan over the shorter list: the mean, per token, of its best
/// normalized Damerau-Levenshtein similarity on the other side. Taking the
/// shorter list as the outer side keeps the measure symmetric.
fn monge_elkan(a: &[&str], b: &[&str]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (outer, inner) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let total: f64 = outer
        .iter()
        .map(|t1| {
            inner
                .iter()
                .map(|t2| strsim::normalized_damerau_levenshtein(t1, t2))
                .fold(0.0, f64::max)
        })
        .sum();
    total / outer.len() as f64
}

impl ComparatorType {
    /// The normalized similarity of two filtered token lists, in `[0, 1]`.
    pub fn similarity(&self, a: &[&str], b: &[&str], config: &Config) -> f64 {
        match self {
            ComparatorType::Cosine => cosine(a, b),
            ComparatorType::MongeElkan => monge_elkan(a, b),
            ComparatorType::ScoringMatrixStd => {
                matrix::assignment_similarity(a, b, false, config, None)
            }
            ComparatorType::ScoringMatrixKris => {
                matrix::assignment_similarity(a, b, true, config, None)
            }
        }
    }

    /// Like [`similarity`](Self::similarity) but also reporting the greedy
    /// token matches whose similarity reaches `floor`. Only the weighted
    /// scoring matrix can explain its score this way; every other
    /// comparator returns `None`.
    pub fn similarity_with_trace(
        &self,
        a: &[&str],
        b: &[&str],
        config: &Config,
        floor: f64,
    ) -> Option<(f64, Vec<TokenMatch>)> {
        match self {
            ComparatorType::ScoringMatrixKris => {
                let mut matches = Vec::new();
                let score =
                    matrix::assignment_similarity(a, b, true, config, Some((floor, &mut matches)));
                Some((score, matches))
            }
            _ => None,
        }
    }
}

/// Scores every candidate pair and keeps those at or above μ.
///
/// Scoring is embarrassingly parallel; the surviving pairs are re-sorted by
/// external id afterwards so transitive closure sees a deterministic list.
pub fn link_pairs(
    pairs: &[BlockPair],
    references: &References,
    frequencies: &TokenFrequencies,
    config: &Config,
    mu: f64,
) -> Vec<ScoredPair> {
    let mut linked: Vec<ScoredPair> = pairs
        .par_iter()
        .filter_map(|pair| {
            let a = filter_tokens(references.tokens(pair.a), frequencies, config);
            let b = filter_tokens(references.tokens(pair.b), frequencies, config);
            let similarity = config.comparator.similarity(&a, &b, config);
            (similarity >= mu).then_some(ScoredPair { pair: *pair, similarity })
        })
        .collect();

    linked.sort_unstable_by(|p1, p2| {
        (references.name(p1.pair.a), references.name(p1.pair.b))
            .cmp(&(references.name(p2.pair.a), references.name(p2.pair.b)))
    });

    debug!(candidates = pairs.len(), linked = linked.len(), mu, "pairs scored");
    linked
}
