#![allow(clippy::type_complexity)]

pub mod blocking;
pub mod closure;
pub mod config;
pub mod correction;
pub mod driver;
pub mod entropy;
mod error;
pub mod frequency;
pub mod link_index;
pub mod metrics;
pub mod reference;
pub mod scoring;
pub mod tokenize;
pub mod wordlist;

use std::collections::HashMap;
use std::hash::BuildHasherDefault;

use fxhash::FxHasher64;

pub use self::blocking::{build_block_pairs, BlockPair};
pub use self::closure::{transitive_closure, Cluster, UnionFind};
pub use self::config::{ComparatorType, Config, RunState, TokenizerType};
pub use self::driver::{CaptureSink, NoCapture, ResolutionOutcome, Resolver};
pub use self::error::{Error, InternalError, UserError};
pub use self::frequency::TokenFrequencies;
pub use self::link_index::LinkIndex;
pub use self::metrics::{BlockingMetrics, ClusterProfile, PairwiseMetrics, TruthSet};
pub use self::reference::{RefIdsMap, References};
pub use self::scoring::{link_pairs, ScoredPair};
pub use self::wordlist::WordList;

pub type Result<T> = std::result::Result<T, error::Error>;

/// The internal identifier of a reference, dense and allocated in input order.
pub type RefId = u32;

pub type FastMap8<K, V> = HashMap<K, V, BuildHasherDefault<FxHasher64>>;

/// Returns `true` when the token is entirely made of ASCII digits.
pub(crate) fn is_numeric_token(token: &str) -> bool {
    !token.is_empty() && token.bytes().all(|b| b.is_ascii_digit())
}

/// Returns `true` when the token is entirely alphabetic.
pub(crate) fn is_alphabetic_token(token: &str) -> bool {
    !token.is_empty() && token.chars().all(char::is_alphabetic)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_classes() {
        assert!(is_numeric_token("12345"));
        assert!(!is_numeric_token("12B45"));
        assert!(!is_numeric_token(""));
        assert!(is_alphabetic_token("SMITH"));
        assert!(!is_alphabetic_token("O2BRIEN"));
        assert!(!is_alphabetic_token(""));
    }
}
