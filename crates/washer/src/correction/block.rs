use tracing::info;

use crate::blocking::{blocking_tokens, BlockPair};
use crate::correction::is_single_edit_variant;
use crate::frequency::TokenFrequencies;
use crate::reference::References;
use crate::{is_alphabetic_token, Config, FastMap8};

/// Corrects spelling variants between the two sides of each candidate pair.
///
/// Global correction misses typos whose standard form is itself rare
/// corpus-wide; when both forms land in the same block the pair exposes
/// them. Within a pair, a rare alphabetic blocking token one edit away from
/// a more frequent one on the other side is rewritten to it.
///
/// Runs on the first iteration only. Returns the number of tokens changed;
/// when non-zero the caller must rebuild frequencies and re-block.
pub fn run(
    pairs: &[BlockPair],
    references: &mut References,
    frequencies: &TokenFrequencies,
    config: &Config,
) -> u64 {
    let mut corrections = FastMap8::<String, String>::default();

    for pair in pairs {
        let left = blocking_tokens(references.tokens(pair.a), frequencies, config);
        let right = blocking_tokens(references.tokens(pair.b), frequencies, config);
        for t1 in &left {
            for t2 in &right {
                if t1 == t2 || !is_alphabetic_token(t1) || !is_alphabetic_token(t2) {
                    continue;
                }
                let f1 = frequencies.frequency(t1);
                let f2 = frequencies.frequency(t2);
                // the more frequent side is the standard; ties are ambiguous
                let (standard, error, error_frequency) = match f1.cmp(&f2) {
                    std::cmp::Ordering::Greater => (*t1, *t2, f2),
                    std::cmp::Ordering::Less => (*t2, *t1, f1),
                    std::cmp::Ordering::Equal => continue,
                };
                if error_frequency > config.max_freq_err_token {
                    continue;
                }
                if standard.chars().count() < config.min_len_std_token {
                    continue;
                }
                if corrections.contains_key(error) {
                    continue;
                }
                if is_single_edit_variant(standard, error) {
                    corrections.insert(error.to_string(), standard.to_string());
                }
            }
        }
    }

    if config.block_correction_detail {
        let mut detail: Vec<_> = corrections.iter().collect();
        detail.sort_unstable();
        for (error, standard) in detail {
            info!("block correction: {error} -> {standard}");
        }
    }

    let (tokens_changed, refs_changed) = references.apply_replacements(&corrections);
    info!(pairs = corrections.len(), tokens_changed, refs_changed, "block correction applied");
    tokens_changed
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;
    use crate::blocking::build_block_pairs;

    fn corpus(rows: &[(&str, &[&str])]) -> References {
        let mut refs = References::new();
        for (name, tokens) in rows {
            refs.insert(name, tokens.iter().map(|t| t.to_string()).collect());
        }
        refs
    }

    #[test]
    fn rare_typo_in_a_block_is_corrected() {
        // BARNETT appears twice, BARNET once; both are far below any global
        // correction threshold but co-occur in the OAK block.
        let mut refs = corpus(&[
            ("R1", &["BARNETT", "OAK"]),
            ("R2", &["BARNETT", "OAK"]),
            ("R3", &["BARNET", "OAK"]),
        ]);
        let freqs = TokenFrequencies::build(&refs);
        let config = Config {
            sigma: 1000,
            min_len_std_token: 4,
            max_freq_err_token: 1,
            ..Config::default()
        };
        let pairs = build_block_pairs(&refs, &freqs, &config);
        let changed = run(&pairs, &mut refs, &freqs, &config);
        assert_eq!(changed, 1);
        assert_eq!(refs.tokens(2), &[S("BARNETT"), S("OAK")]);
    }

    #[test]
    fn equal_frequencies_stay_untouched() {
        let mut refs = corpus(&[
            ("R1", &["BARNETT", "OAK"]),
            ("R2", &["BARNET", "OAK"]),
        ]);
        let freqs = TokenFrequencies::build(&refs);
        let config = Config { sigma: 1000, ..Config::default() };
        let pairs = build_block_pairs(&refs, &freqs, &config);
        let changed = run(&pairs, &mut refs, &freqs, &config);
        assert_eq!(changed, 0);
        assert_eq!(refs.tokens(1), &[S("BARNET"), S("OAK")]);
    }
}
