use itertools::Itertools;
use roaring::RoaringBitmap;
use tracing::debug;

use crate::frequency::TokenFrequencies;
use crate::reference::References;
use crate::{is_numeric_token, Config, FastMap8, RefId};

/// An unordered candidate pair in canonical form: `a` is the side whose
/// external id sorts lexicographically first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPair {
    pub a: RefId,
    pub b: RefId,
}

impl BlockPair {
    /// Canonicalizes by external id so a pair always reads the same way
    /// whichever posting list produced it.
    pub fn new(x: RefId, y: RefId, references: &References) -> BlockPair {
        if references.name(x) <= references.name(y) {
            BlockPair { a: x, b: y }
        } else {
            BlockPair { a: y, b: x }
        }
    }
}

/// The tokens of a reference that are allowed to form blocks: rare enough
/// (frequency below σ), deduped preserving first occurrence. Under
/// `removeExcludedBlkTokens`, short tokens and (when configured) all-digit
/// tokens are dropped as well.
pub fn blocking_tokens<'a>(
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
        if !kept.contains(&token.as_str()) {
            kept.push(token);
        }
    }
    kept
}

/// Builds the candidate pair list: every pair of references sharing at least
/// one blocking token (or one blocking token *pair* when `blockByPairs`),
/// canonicalized, deduplicated and returned in stable sorted order.
pub fn build_block_pairs(
    references: &References,
    frequencies: &TokenFrequencies,
    config: &Config,
) -> Vec<BlockPair> {
    // Token (or token pair) → posting list of references.
    let mut index = FastMap8::<String, RoaringBitmap>::default();
    for (id, _name, tokens) in references.iter() {
        let blocking = blocking_tokens(tokens, frequencies, config);
        if config.block_by_pairs {
            for (t1, t2) in blocking.iter().tuple_combinations() {
                let key = if t1 <= t2 {
                    format!("{t1}\0{t2}")
                } else {
                    format!("{t2}\0{t1}")
                };
                index.entry(key).or_default().insert(id);
            }
        } else {
            for token in blocking {
                index.entry(token.to_string()).or_default().insert(id);
            }
        }
    }

    let mut pairs = Vec::new();
    for posting in index.values() {
        if posting.len() < 2 {
            continue;
        }
        let ids: Vec<RefId> = posting.iter().collect();
        for (x, y) in ids.iter().tuple_combinations() {
            pairs.push(BlockPair::new(*x, *y, references));
        }
    }

    // A pair sharing several rare tokens shows up once per posting list.
    pairs.sort_unstable_by(|p1, p2| {
        (references.name(p1.a), references.name(p1.b))
            .cmp(&(references.name(p2.a), references.name(p2.b)))
    });
    pairs.dedup();

    debug!(blocks = index.len(), pairs = pairs.len(), "candidate pairs generated");
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus(rows: &[(&str, &[&str])]) -> References {
        let mut refs = References::new();
        for (name, tokens) in rows {
            refs.insert(name, tokens.iter().map(|t| t.to_string()).collect());
        }
        refs
    }

    fn names(pairs: &[BlockPair], refs: &References) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|p| {
                (refs.name(p.a).unwrap().to_string(), refs.name(p.b).unwrap().to_string())
            })
            .collect()
    }

    #[test]
    fn pairs_from_shared_rare_tokens() {
        let refs = corpus(&[
            ("R1", &["JOHN", "SMITH", "MAIN"]),
            ("R2", &["JANE", "SMITH", "OAK"]),
            ("R3", &["JOHN", "DOE", "OAK"]),
        ]);
        let freqs = TokenFrequencies::build(&refs);
        let config = Config { sigma: 1000, ..Config::default() };

        let pairs = build_block_pairs(&refs, &freqs, &config);
        let expected = vec![
            ("R1".to_string(), "R2".to_string()),
            ("R1".to_string(), "R3".to_string()),
            ("R2".to_string(), "R3".to_string()),
        ];
        assert_eq!(names(&pairs, &refs), expected);
    }

    #[test]
    fn block_by_pairs_requires_two_shared_tokens() {
        let refs = corpus(&[
            ("R1", &["JOHN", "SMITH", "MAIN"]),
            ("R2", &["JANE", "SMITH", "OAK"]),
            ("R3", &["JOHN", "DOE", "OAK"]),
        ]);
        let freqs = TokenFrequencies::build(&refs);
        let config = Config { sigma: 1000, block_by_pairs: true, ..Config::default() };
        assert!(build_block_pairs(&refs, &freqs, &config).is_empty());

        let refs = corpus(&[
            ("R1", &["JOHN", "SMITH", "MAIN"]),
            ("R2", &["JOHN", "SMITH", "OAK"]),
        ]);
        let freqs = TokenFrequencies::build(&refs);
        let pairs = build_block_pairs(&refs, &freqs, &config);
        assert_eq!(names(&pairs, &refs), vec![("R1".to_string(), "R2".to_string())]);
    }

    #[test]
    fn stop_tokens_never_block() {
        let refs = corpus(&[
            ("R1", &["SMITH", "MAIN"]),
            ("R2", &["SMITH", "OAK"]),
        ]);
        let freqs = TokenFrequencies::build(&refs);
        // SMITH has frequency 2: with sigma = 2 every shared token is a stop token
        let config = Config { sigma: 2, ..Config::default() };
        assert!(build_block_pairs(&refs, &freqs, &config).is_empty());
    }

    #[test]
    fn short_and_numeric_exclusion_is_gated() {
        let refs = corpus(&[
            ("R1", &["AB", "123", "MAIN"]),
            ("R2", &["AB", "123", "OAK"]),
        ]);
        let freqs = TokenFrequencies::build(&refs);
        let config = Config {
            sigma: 1000,
            min_blk_token_len: 3,
            exclude_numeric_blocks: true,
            remove_excluded_blk_tokens: true,
            ..Config::default()
        };
        assert!(build_block_pairs(&refs, &freqs, &config).is_empty());

        // with numeric blocks allowed, 123 is a valid blocking token
        let config = Config { exclude_numeric_blocks: false, ..config };
        let pairs = build_block_pairs(&refs, &freqs, &config);
        assert_eq!(names(&pairs, &refs), vec![("R1".to_string(), "R2".to_string())]);

        // without removeExcludedBlkTokens the short and numeric tokens
        // block like any other
        let config = Config {
            exclude_numeric_blocks: true,
            remove_excluded_blk_tokens: false,
            ..config
        };
        let pairs = build_block_pairs(&refs, &freqs, &config);
        assert_eq!(names(&pairs, &refs), vec![("R1".to_string(), "R2".to_string())]);
    }

    #[test]
    fn no_self_pairs_no_duplicates_canonical_order() {
        // R1 and R2 share two rare tokens, so the pair appears in two
        // posting lists and must still come out once.
        let refs = corpus(&[
            ("R2", &["JOHN", "SMITH"]),
            ("R1", &["JOHN", "SMITH"]),
        ]);
        let freqs = TokenFrequencies::build(&refs);
        let config = Config { sigma: 1000, ..Config::default() };
        let pairs = build_block_pairs(&refs, &freqs, &config);
        assert_eq!(names(&pairs, &refs), vec![("R1".to_string(), "R2".to_string())]);
    }
}
