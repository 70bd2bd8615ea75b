use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::metrics::{BlockingMetrics, PairwiseMetrics};
use crate::UserError;

/// The tokenizer strategy applied to every reference body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum TokenizerType {
    /// Replace every run of non-word characters with a single space, then split.
    #[default]
    Splitter,
    /// Split on the field delimiter then whitespace; non-word characters are elided.
    Compress,
    /// Like `Compress`, but adjacent all-digit tokens of a field are concatenated.
    CompressNbr,
}

impl FromStr for TokenizerType {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Splitter" => Ok(TokenizerType::Splitter),
            "Compress" => Ok(TokenizerType::Compress),
            "CompressNbr" => Ok(TokenizerType::CompressNbr),
            otherwise => Err(UserError::InvalidTokenizerType(otherwise.to_string())),
        }
    }
}

impl fmt::Display for TokenizerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenizerType::Splitter => f.write_str("Splitter"),
            TokenizerType::Compress => f.write_str("Compress"),
            TokenizerType::CompressNbr => f.write_str("CompressNbr"),
        }
    }
}

/// The pairwise similarity comparator used to turn candidate pairs into links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum ComparatorType {
    Cosine,
    MongeElkan,
    ScoringMatrixStd,
    #[default]
    ScoringMatrixKris,
}

impl FromStr for ComparatorType {
    type Err = UserError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Cosine" => Ok(ComparatorType::Cosine),
            "MongeElkan" => Ok(ComparatorType::MongeElkan),
            "ScoringMatrixStd" => Ok(ComparatorType::ScoringMatrixStd),
            "ScoringMatrixKris" => Ok(ComparatorType::ScoringMatrixKris),
            otherwise => Err(UserError::InvalidComparator(otherwise.to_string())),
        }
    }
}

impl fmt::Display for ComparatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComparatorType::Cosine => f.write_str("Cosine"),
            ComparatorType::MongeElkan => f.write_str("MongeElkan"),
            ComparatorType::ScoringMatrixStd => f.write_str("ScoringMatrixStd"),
            ComparatorType::ScoringMatrixKris => f.write_str("ScoringMatrixKris"),
        }
    }
}

/// The immutable configuration of a single resolution run.
///
/// A `Config` is built once, from a parameter file or by hand, and threaded
/// through every stage of the pipeline. Nothing in the engine mutates it.
#[derive(Debug, Clone)]
pub struct Config {
    pub input_file: PathBuf,
    pub has_header: bool,
    pub delimiter: String,
    pub tokenizer_type: TokenizerType,
    pub remove_duplicate_tokens: bool,

    pub run_global_correction: bool,
    pub min_freq_std_token: u64,
    pub min_len_std_token: usize,
    pub max_freq_err_token: u64,
    pub learn_token_variants: bool,
    pub global_correction_detail: bool,

    pub sigma: u64,
    pub min_blk_token_len: usize,
    pub exclude_numeric_blocks: bool,
    pub remove_excluded_blk_tokens: bool,
    pub block_by_pairs: bool,
    pub add_refs_to_link_index: bool,

    pub block_correction: bool,
    pub block_correction_detail: bool,

    pub comparator: ComparatorType,
    pub matrix_num_token_rule: bool,
    pub matrix_initial_rule: bool,

    pub mu: f64,
    pub mu_iterate: f64,
    pub epsilon: f64,
    pub epsilon_iterate: f64,

    pub run_iteration_profile: bool,
    pub truth_file: Option<PathBuf>,
    pub word_list_file: PathBuf,
    pub variant_map_file: PathBuf,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            input_file: PathBuf::new(),
            has_header: false,
            delimiter: ",".to_string(),
            tokenizer_type: TokenizerType::default(),
            remove_duplicate_tokens: true,
            run_global_correction: false,
            min_freq_std_token: 4,
            min_len_std_token: 4,
            max_freq_err_token: 1,
            learn_token_variants: false,
            global_correction_detail: false,
            sigma: 6,
            min_blk_token_len: 3,
            exclude_numeric_blocks: false,
            remove_excluded_blk_tokens: false,
            block_by_pairs: false,
            add_refs_to_link_index: true,
            block_correction: false,
            block_correction_detail: false,
            comparator: ComparatorType::default(),
            matrix_num_token_rule: true,
            matrix_initial_rule: true,
            mu: 0.9,
            mu_iterate: 0.05,
            epsilon: 0.0,
            epsilon_iterate: 0.0,
            run_iteration_profile: false,
            truth_file: None,
            word_list_file: PathBuf::from("DWM_WordList.txt"),
            variant_map_file: PathBuf::from("DWM_TokenVariants.json"),
        }
    }
}

/// Mutable cross-iteration counters and reporting accumulators.
///
/// This is the only state shared across pipeline stages besides the
/// containers themselves; it never feeds back into resolution decisions.
#[derive(Debug, Clone, Default)]
pub struct RunState {
    pub references_read: u64,
    pub tokens_found: u64,
    pub iterations: u32,
    pub global_token_corrections: u64,
    pub block_token_corrections: u64,
    pub mean_cluster_entropy: Option<f64>,
    pub cluster_metrics: Option<PairwiseMetrics>,
    pub blocking_metrics: Option<BlockingMetrics>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_type_round_trip() {
        for name in ["Splitter", "Compress", "CompressNbr"] {
            let parsed: TokenizerType = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert!("splitter".parse::<TokenizerType>().is_err());
    }

    #[test]
    fn comparator_type_round_trip() {
        for name in ["Cosine", "MongeElkan", "ScoringMatrixStd", "ScoringMatrixKris"] {
            let parsed: ComparatorType = name.parse().unwrap();
            assert_eq!(parsed.to_string(), name);
        }
        assert!("Levenshtein".parse::<ComparatorType>().is_err());
    }
}
