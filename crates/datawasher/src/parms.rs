use std::path::Path;

use anyhow::{bail, Context};
use tracing::warn;
use washer::Config;

fn parse_bool(key: &str, value: &str) -> anyhow::Result<bool> {
    match value {
        "True" | "true" | "Yes" | "yes" | "1" => Ok(true),
        "False" | "false" | "No" | "no" | "0" => Ok(false),
        otherwise => bail!("invalid boolean `{otherwise}` for parameter {key}"),
    }
}

// The delimiter value may name a tab, which cannot survive as a raw
// character in a key=value file.
fn parse_delimiter(value: &str) -> String {
    match value {
        "\\t" | "<tab>" => "\t".to_string(),
        otherwise => otherwise.to_string(),
    }
}

/// Parses a flat `key=value` parameter file into a [`Config`].
///
/// Unknown keys warn and are skipped; missing keys keep their defaults;
/// malformed values for known keys are fatal configuration errors.
pub fn read_parms(path: &Path) -> anyhow::Result<Config> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read parameter file {}", path.display()))?;

    let mut config = Config::default();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once('=') else {
            warn!("{}:{}: not a key=value line, skipped", path.display(), number + 1);
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        let context = || format!("{}:{}: parameter {key}", path.display(), number + 1);
        match key {
            "inputFileName" => config.input_file = value.into(),
            "hasHeader" => config.has_header = parse_bool(key, value)?,
            "delimiter" => config.delimiter = parse_delimiter(value),
            "tokenizerType" => config.tokenizer_type = value.parse().with_context(context)?,
            "removeDuplicateTokens" => config.remove_duplicate_tokens = parse_bool(key, value)?,
            "runGlobalCorrection" => config.run_global_correction = parse_bool(key, value)?,
            "minFreqStdToken" => config.min_freq_std_token = value.parse().with_context(context)?,
            "minLenStdToken" => config.min_len_std_token = value.parse().with_context(context)?,
            "maxFreqErrToken" => config.max_freq_err_token = value.parse().with_context(context)?,
            "learnTokenVariants" => config.learn_token_variants = parse_bool(key, value)?,
            "globalCorrectionDetail" => {
                config.global_correction_detail = parse_bool(key, value)?
            }
            "sigma" => config.sigma = value.parse().with_context(context)?,
            "minBlkTokenLen" => config.min_blk_token_len = value.parse().with_context(context)?,
            "excludeNumericBlocks" => config.exclude_numeric_blocks = parse_bool(key, value)?,
            "removeExcludedBlkTokens" => {
                config.remove_excluded_blk_tokens = parse_bool(key, value)?
            }
            "blockByPairs" => config.block_by_pairs = parse_bool(key, value)?,
            "addRefsToLinkIndex" => config.add_refs_to_link_index = parse_bool(key, value)?,
            "blockCorrection" => config.block_correction = parse_bool(key, value)?,
            "blockCorrectionDetail" => config.block_correction_detail = parse_bool(key, value)?,
            "comparator" => config.comparator = value.parse().with_context(context)?,
            "matrixNumTokenRule" => config.matrix_num_token_rule = parse_bool(key, value)?,
            "matrixInitialRule" => config.matrix_initial_rule = parse_bool(key, value)?,
            "mu" => config.mu = value.parse().with_context(context)?,
            "muIterate" => config.mu_iterate = value.parse().with_context(context)?,
            "epsilon" => config.epsilon = value.parse().with_context(context)?,
            "epsilonIterate" => config.epsilon_iterate = value.parse().with_context(context)?,
            "runIterationProfile" => config.run_iteration_profile = parse_bool(key, value)?,
            "truthFileName" => {
                if !value.is_empty() {
                    config.truth_file = Some(value.into());
                }
            }
            "wordListFileName" => config.word_list_file = value.into(),
            "variantMapFileName" => config.variant_map_file = value.into(),
            unknown => warn!("{}:{}: unknown parameter {unknown}, skipped", path.display(), number + 1),
        }
    }

    if config.input_file.as_os_str().is_empty() {
        bail!("parameter file {} does not set inputFileName", path.display());
    }
    Ok(config)
}
