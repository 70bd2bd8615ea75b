use crate::{is_numeric_token, Config};

/// One greedy assignment step: which tokens were matched and what the match
/// contributed to the pair score.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenMatch {
    pub left: String,
    pub right: String,
    pub similarity: f64,
    pub weight: f64,
    pub weighted_similarity: f64,
    pub row: usize,
    pub col: usize,
}

/// Pairwise token similarity, rules applied in order: the numeric-token
/// exact rule, the single-initial exact rule, then normalized
/// Damerau-Levenshtein.
fn cell_similarity(t1: &str, t2: &str, config: &Config) -> f64 {
    if config.matrix_num_token_rule && is_numeric_token(t1) && is_numeric_token(t2) {
        if t1 == t2 {
            1.0
        } else {
            0.0
        }
    } else if config.matrix_initial_rule && (t1.chars().count() == 1 || t2.chars().count() == 1) {
        if t1 == t2 {
            1.0
        } else {
            0.0
        }
    } else {
        strsim::normalized_damerau_levenshtein(t1, t2)
    }
}

/// Greedy token-assignment similarity between two filtered token lists.
///
/// The shorter list provides the rows. Each round consumes the best
/// remaining cell, weighting it by `(m - row) / (m (m + 1) / 2)` so earlier
/// tokens of the shorter list carry more identity, or uniformly by `1 / m`
/// for the unweighted variant. Rows and columns are consumed through
/// explicit used flags rather than a sentinel value.
pub(crate) fn assignment_similarity(
    a: &[&str],
    b: &[&str],
    weighted: bool,
    config: &Config,
    mut trace: Option<(f64, &mut Vec<TokenMatch>)>,
) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let m = short.len();
    let n = long.len();
    let base = (m * (m + 1) / 2) as f64;

    let mut matrix = vec![vec![0.0f64; n]; m];
    for (j, t1) in short.iter().enumerate() {
        for (k, t2) in long.iter().enumerate() {
            matrix[j][k] = cell_similarity(t1, t2, config);
        }
    }

    let mut row_used = vec![false; m];
    let mut col_used = vec![false; n];
    let mut score = 0.0;

    for _ in 0..m {
        let mut best = -1.0;
        let mut best_j = 0;
        let mut best_k = 0;
        for j in (0..m).filter(|j| !row_used[*j]) {
            for k in (0..n).filter(|k| !col_used[*k]) {
                if matrix[j][k] > best {
                    best = matrix[j][k];
                    best_j = j;
                    best_k = k;
                }
            }
        }
        if best < 0.0 {
            break;
        }
        let weight = if weighted { (m - best_j) as f64 / base } else { 1.0 / m as f64 };
        let weighted_similarity = best * weight;
        score += weighted_similarity;
        row_used[best_j] = true;
        col_used[best_k] = true;

        if let Some((floor, matches)) = trace.as_mut() {
            if best >= *floor {
                matches.push(TokenMatch {
                    left: short[best_j].to_string(),
                    right: long[best_k].to_string(),
                    similarity: best,
                    weight,
                    weighted_similarity,
                    row: best_j,
                    col: best_k,
                });
            }
        }
    }

    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> Config {
        Config { matrix_num_token_rule: true, matrix_initial_rule: true, ..Config::default() }
    }

    #[test]
    fn exact_prefix_scores_one() {
        let score =
            assignment_similarity(&["JOHN", "SMITH"], &["JOHN", "SMITH", "JR"], true, &config(), None);
        assert_eq!(score, 1.0);
    }

    #[test]
    fn weighted_scores_decay_with_position() {
        // only the second token matches: weight is 1/base = 1/3
        let score =
            assignment_similarity(&["XXXXXX", "SMITH"], &["SMITH", "YYYYYY"], true, &config(), None);
        assert!((score - 1.0 / 3.0).abs() < 1e-9);

        // only the first token matches: weight is 2/3
        let score =
            assignment_similarity(&["SMITH", "XXXXXX"], &["SMITH", "YYYYYY"], true, &config(), None);
        assert!((score - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn unweighted_scores_are_uniform() {
        let score =
            assignment_similarity(&["SMITH", "XXXXXX"], &["SMITH", "YYYYYY"], false, &config(), None);
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn symmetry() {
        let a = &["JOHN", "SMITH"][..];
        let b = &["JON", "SMYTH", "JR"][..];
        let left = assignment_similarity(a, b, true, &config(), None);
        let right = assignment_similarity(b, a, true, &config(), None);
        assert_eq!(left, right);
        assert!(left > 0.0 && left <= 1.0);
    }

    #[test]
    fn numeric_rule_is_all_or_nothing() {
        let exact = assignment_similarity(&["123"], &["123"], true, &config(), None);
        assert_eq!(exact, 1.0);
        let off_by_one = assignment_similarity(&["123"], &["124"], true, &config(), None);
        assert_eq!(off_by_one, 0.0);

        // without the rule, numbers degrade gracefully
        let config = Config { matrix_num_token_rule: false, ..config() };
        let off_by_one = assignment_similarity(&["123"], &["124"], true, &config, None);
        assert!((off_by_one - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn initial_rule_requires_exact_match() {
        let matched = assignment_similarity(&["J"], &["J"], true, &config(), None);
        assert_eq!(matched, 1.0);
        let unmatched = assignment_similarity(&["J"], &["JOHN"], true, &config(), None);
        assert_eq!(unmatched, 0.0);

        let config = Config { matrix_initial_rule: false, ..config() };
        let unmatched = assignment_similarity(&["J"], &["JOHN"], true, &config, None);
        assert!((unmatched - 0.25).abs() < 1e-9);
    }

    #[test]
    fn empty_lists_score_zero() {
        assert_eq!(assignment_similarity(&[], &["SMITH"], true, &config(), None), 0.0);
        assert_eq!(assignment_similarity(&["SMITH"], &[], true, &config(), None), 0.0);
    }

    #[test]
    fn trace_records_greedy_matches_above_the_floor() {
        let mut matches = Vec::new();
        let score = assignment_similarity(
            &["JOHN", "SMITH"],
            &["JOHN", "SMYTHE"],
            true,
            &config(),
            Some((0.5, &mut matches)),
        );
        assert!(score > 0.5);
        assert_eq!(matches.len(), 2);
        // greedy order: the exact JOHN match first
        assert_eq!(matches[0].left, "JOHN");
        assert_eq!(matches[0].similarity, 1.0);
        assert!((matches[0].weight - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(matches[1].left, "SMITH");
        assert!(matches[1].similarity < 1.0);
    }
}
