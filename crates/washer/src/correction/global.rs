use tracing::{debug, info};

use super::variants::VariantMap;
use crate::correction::is_single_edit_variant;
use crate::frequency::TokenFrequencies;
use crate::reference::References;
use crate::wordlist::WordList;
use crate::{is_alphabetic_token, Config, FastMap8, Result};

/// What the global corrector decided and changed.
#[derive(Debug, Default, Clone)]
pub struct GlobalCorrectionOutcome {
    /// Every applied rewrite, error token → standard token.
    pub replacements: FastMap8<String, String>,
    pub tokens_changed: u64,
    pub refs_changed: u64,
}

/// Corrects spelling variants across the whole corpus.
///
/// Frequent tokens are standards, rare tokens are error candidates; an error
/// candidate within a single edit (or a single transposition) of a standard
/// is rewritten to it everywhere. Tokens from the word list with a frequency
/// low enough to look like errors are exempt: they are real words.
///
/// The walk is most-frequent-first over standards and least-frequent-first
/// over error candidates, with early termination on both sides; a consumed
/// error candidate can no longer become a standard for someone else. This
/// ordering is what makes the produced correction set deterministic, so it
/// must not be parallelized.
pub fn run(
    references: &mut References,
    frequencies: &TokenFrequencies,
    word_list: &WordList,
    config: &Config,
) -> Result<GlobalCorrectionOutcome> {
    let mut variant_map = VariantMap::load(&config.variant_map_file);
    let learned = variant_map.variant_to_standard();

    // Standards and error candidates both come from the same cleaned,
    // frequency-descending token list.
    let mut clean: Vec<(String, u64)> = frequencies
        .sorted_by_frequency_desc()
        .into_iter()
        .filter(|(token, frequency)| {
            token.chars().count() >= config.min_len_std_token
                && is_alphabetic_token(token)
                && !(*frequency <= config.max_freq_err_token && word_list.contains(token))
        })
        .map(|(token, frequency)| (token.to_string(), frequency))
        .collect();

    debug!(clean = clean.len(), total = frequencies.len(), "correction candidates selected");

    let mut replacements = FastMap8::<String, String>::default();
    for j in 0..clean.len() {
        let (standard, standard_frequency) = clean[j].clone();
        if standard_frequency < config.min_freq_std_token {
            break;
        }
        if standard.is_empty() {
            // consumed as someone else's variant
            continue;
        }
        for k in (0..clean.len()).rev() {
            if k == j {
                continue;
            }
            let (ref error, error_frequency) = clean[k];
            if error_frequency > config.max_freq_err_token {
                break;
            }
            if error.is_empty() {
                continue;
            }
            if is_single_edit_variant(&standard, error) {
                replacements.insert(error.clone(), standard.clone());
                clean[k].0 = String::new();
            }
        }
    }

    let derived = replacements.len();

    // Explicit learned pairs override auto-derived conflicts.
    for (variant, standard) in learned {
        if variant != standard {
            replacements.insert(variant, standard);
        }
    }

    if config.learn_token_variants && variant_map.learn(&replacements) {
        variant_map.persist(&config.variant_map_file)?;
        info!("variant map updated at {:?}", config.variant_map_file);
    }

    if config.global_correction_detail {
        let mut detail: Vec<_> = replacements.iter().collect();
        detail.sort_unstable();
        for (error, standard) in detail {
            info!("global correction: {error} -> {standard}");
        }
    }

    let (tokens_changed, refs_changed) = references.apply_replacements(&replacements);
    info!(
        derived,
        total = replacements.len(),
        tokens_changed,
        refs_changed,
        "global correction applied"
    );

    Ok(GlobalCorrectionOutcome { replacements, tokens_changed, refs_changed })
}
