use std::collections::BTreeMap;
use std::path::Path;

use tracing::warn;

use crate::blocking::BlockPair;
use crate::link_index::LinkIndex;
use crate::reference::References;
use crate::{FastMap8, RefId};

/// Pseudo-truth id shared by references absent from the truth file.
const UNKNOWN_TRUTH: &str = "x";

/// The external ground truth: reference id → truth id.
#[derive(Debug, Default, Clone)]
pub struct TruthSet {
    by_ref: FastMap8<String, String>,
}

impl TruthSet {
    /// Loads a `RecID,TruthID` CSV with a header row. A missing or
    /// unreadable file disables evaluation with a warning; malformed rows
    /// are skipped.
    pub fn load(path: &Path) -> Option<TruthSet> {
        let mut reader = match csv::Reader::from_path(path) {
            Ok(reader) => reader,
            Err(error) => {
                warn!("cannot read truth file {:?}, metrics disabled: {error}", path);
                return None;
            }
        };
        let mut by_ref = FastMap8::default();
        for record in reader.records() {
            let record = match record {
                Ok(record) => record,
                Err(error) => {
                    warn!("skipping malformed truth row: {error}");
                    continue;
                }
            };
            if let (Some(rec_id), Some(truth_id)) = (record.get(0), record.get(1)) {
                by_ref.insert(rec_id.trim().to_string(), truth_id.trim().to_string());
            }
        }
        Some(TruthSet { by_ref })
    }

    pub fn get(&self, ref_name: &str) -> Option<&str> {
        self.by_ref.get(ref_name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_ref.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_ref.is_empty()
    }
}

/// Pairwise precision/recall/F-measure of the final (or intermediate)
/// cluster assignment against the truth.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairwiseMetrics {
    pub true_pairs: u64,
    pub expected_pairs: u64,
    pub linked_pairs: u64,
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
}

/// Precision/recall/F-measure of the blocking stage, where the candidate
/// pair list plays the role of the links.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BlockingMetrics {
    pub candidate_pairs: u64,
    pub expected_pairs: u64,
    pub true_pairs: u64,
    pub precision: f64,
    pub recall: f64,
    pub f_measure: f64,
}

fn count_pairs<'a>(counts: impl Iterator<Item = &'a u64>) -> u64 {
    counts.map(|n| n * (n - 1) / 2).sum()
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn f_measure(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        round4(2.0 * precision * recall / (precision + recall))
    } else {
        0.0
    }
}

/// Evaluates the cluster assignment pairwise.
///
/// References missing from the truth file all share one pseudo-truth id, so
/// with a partially covered truth file the expected pair count includes
/// their mutual pairs.
pub fn cluster_metrics(
    link_index: &LinkIndex,
    references: &References,
    truth: &TruthSet,
) -> PairwiseMetrics {
    let mut linked_counts = FastMap8::<RefId, u64>::default();
    let mut equivalent_counts = FastMap8::<&str, u64>::default();
    let mut true_positive_counts = FastMap8::<(RefId, &str), u64>::default();

    for (id, cluster) in link_index.iter() {
        let name = references.name(id).unwrap_or_default();
        let truth_id = truth.get(name).unwrap_or(UNKNOWN_TRUTH);
        *linked_counts.entry(cluster).or_insert(0) += 1;
        *equivalent_counts.entry(truth_id).or_insert(0) += 1;
        *true_positive_counts.entry((cluster, truth_id)).or_insert(0) += 1;
    }

    let linked_pairs = count_pairs(linked_counts.values());
    let expected_pairs = count_pairs(equivalent_counts.values());
    let true_pairs = count_pairs(true_positive_counts.values());

    let precision =
        if linked_pairs > 0 { round4(true_pairs as f64 / linked_pairs as f64) } else { 1.0 };
    let recall =
        if expected_pairs > 0 { round4(true_pairs as f64 / expected_pairs as f64) } else { 1.0 };

    PairwiseMetrics {
        true_pairs,
        expected_pairs,
        linked_pairs,
        precision,
        recall,
        f_measure: f_measure(precision, recall),
    }
}

/// Evaluates the candidate pair list against the truth, restricted to the
/// references of the current input.
pub fn blocking_metrics(
    pairs: &[BlockPair],
    references: &References,
    truth: &TruthSet,
) -> BlockingMetrics {
    let mut truth_counts = FastMap8::<&str, u64>::default();
    for (_id, name, _tokens) in references.iter() {
        if let Some(truth_id) = truth.get(name) {
            *truth_counts.entry(truth_id).or_insert(0) += 1;
        }
    }
    let expected_pairs = count_pairs(truth_counts.values());

    let candidate_pairs = pairs.len() as u64;
    let mut true_pairs = 0;
    for pair in pairs {
        let left = references.name(pair.a).and_then(|name| truth.get(name));
        let right = references.name(pair.b).and_then(|name| truth.get(name));
        if let (Some(left), Some(right)) = (left, right) {
            if left == right {
                true_pairs += 1;
            }
        }
    }

    let precision =
        if candidate_pairs > 0 { round4(true_pairs as f64 / candidate_pairs as f64) } else { 1.0 };
    let recall =
        if expected_pairs > 0 { round4(true_pairs as f64 / expected_pairs as f64) } else { 1.0 };

    BlockingMetrics {
        candidate_pairs,
        expected_pairs,
        true_pairs,
        precision,
        recall,
        f_measure: f_measure(precision, recall),
    }
}

/// The shape of the current cluster assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterProfile {
    /// cluster size → number of clusters of that size
    pub size_histogram: BTreeMap<u64, u64>,
    pub clusters: u64,
    pub largest: u64,
    pub singletons: u64,
}

pub fn cluster_profile(link_index: &LinkIndex) -> ClusterProfile {
    let mut profile = ClusterProfile::default();
    for size in link_index.cluster_sizes().values() {
        *profile.size_histogram.entry(*size).or_insert(0) += 1;
        profile.clusters += 1;
        profile.largest = profile.largest.max(*size);
        if *size == 1 {
            profile.singletons += 1;
        }
    }
    profile
}

#[cfg(test)]
mod tests {
    use big_s::S;

    use super::*;
    use crate::closure::Cluster;

    fn truth(rows: &[(&str, &str)]) -> TruthSet {
        let by_ref = rows.iter().map(|(r, t)| (r.to_string(), t.to_string())).collect();
        TruthSet { by_ref }
    }

    fn corpus(names: &[&str]) -> References {
        let mut refs = References::new();
        for name in names {
            refs.insert(name, vec![S("TOKEN")]);
        }
        refs
    }

    fn cluster(representative: RefId, members: &[RefId]) -> Cluster {
        Cluster {
            representative,
            members: members.iter().copied().collect::<roaring::RoaringBitmap>(),
        }
    }

    #[test]
    fn perfect_clustering_scores_one() {
        let refs = corpus(&["A", "B", "C", "D"]);
        let truth = truth(&[("A", "t1"), ("B", "t1"), ("C", "t2"), ("D", "t2")]);
        let index = LinkIndex::new_singletons(4)
            .merge_clusters(&[cluster(0, &[0, 1]), cluster(2, &[2, 3])], &refs);

        let metrics = cluster_metrics(&index, &refs, &truth);
        assert_eq!(metrics.true_pairs, 2);
        assert_eq!(metrics.expected_pairs, 2);
        assert_eq!(metrics.linked_pairs, 2);
        assert_eq!(metrics.precision, 1.0);
        assert_eq!(metrics.recall, 1.0);
        assert_eq!(metrics.f_measure, 1.0);
    }

    #[test]
    fn over_merging_costs_precision() {
        let refs = corpus(&["A", "B", "C"]);
        let truth = truth(&[("A", "t1"), ("B", "t1"), ("C", "t2")]);
        // everything in one cluster: 3 linked pairs, 1 expected, 1 true
        let index = LinkIndex::new_singletons(3).merge_clusters(&[cluster(0, &[0, 1, 2])], &refs);

        let metrics = cluster_metrics(&index, &refs, &truth);
        assert_eq!(metrics.linked_pairs, 3);
        assert_eq!(metrics.expected_pairs, 1);
        assert_eq!(metrics.true_pairs, 1);
        assert!((metrics.precision - 0.3333).abs() < 1e-9);
        assert_eq!(metrics.recall, 1.0);
        assert_eq!(metrics.f_measure, 0.5);
    }

    #[test]
    fn refs_missing_from_truth_share_a_pseudo_id() {
        let refs = corpus(&["A", "B"]);
        let truth = truth(&[]);
        let index = LinkIndex::new_singletons(2);
        let metrics = cluster_metrics(&index, &refs, &truth);
        // A and B both map to the pseudo id, producing one expected pair
        assert_eq!(metrics.expected_pairs, 1);
        assert_eq!(metrics.linked_pairs, 0);
        assert_eq!(metrics.precision, 1.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.f_measure, 0.0);
    }

    #[test]
    fn blocking_metrics_use_candidate_pairs() {
        let refs = corpus(&["A", "B", "C"]);
        let truth = truth(&[("A", "t1"), ("B", "t1"), ("C", "t2")]);
        let pairs = vec![
            BlockPair::new(0, 1, &refs),
            BlockPair::new(0, 2, &refs),
        ];
        let metrics = blocking_metrics(&pairs, &refs, &truth);
        assert_eq!(metrics.candidate_pairs, 2);
        assert_eq!(metrics.expected_pairs, 1);
        assert_eq!(metrics.true_pairs, 1);
        assert_eq!(metrics.precision, 0.5);
        assert_eq!(metrics.recall, 1.0);
        assert!((metrics.f_measure - 0.6667).abs() < 1e-9);
    }

    #[test]
    fn profile_counts_sizes() {
        let refs = corpus(&["A", "B", "C", "D"]);
        let index =
            LinkIndex::new_singletons(4).merge_clusters(&[cluster(0, &[0, 1, 2])], &refs);
        let profile = cluster_profile(&index);
        assert_eq!(profile.clusters, 2);
        assert_eq!(profile.largest, 3);
        assert_eq!(profile.singletons, 1);
        assert_eq!(profile.size_histogram.get(&3), Some(&1));
        assert_eq!(profile.size_histogram.get(&1), Some(&1));
    }
}
