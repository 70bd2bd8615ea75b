use tracing::{info, warn};

use crate::blocking::{build_block_pairs, BlockPair};
use crate::closure::{transitive_closure, Cluster};
use crate::config::RunState;
use crate::correction;
use crate::entropy;
use crate::frequency::TokenFrequencies;
use crate::link_index::LinkIndex;
use crate::metrics::{self, BlockingMetrics, PairwiseMetrics, TruthSet};
use crate::reference::References;
use crate::scoring::{link_pairs, ScoredPair};
use crate::tokenize;
use crate::wordlist::WordList;
use crate::{Config, FastMap8, RefId, Result};

/// Observer of the pipeline's intermediate containers, one hook per stage.
///
/// The engine only ever hands out borrowed views; a sink that wants to keep
/// something must copy it. All hooks default to doing nothing.
pub trait CaptureSink {
    fn initial_references(&mut self, _references: &References) {}
    fn initial_link_index(&mut self, _link_index: &LinkIndex, _references: &References) {}
    fn token_frequencies(&mut self, _frequencies: &TokenFrequencies, _after_correction: bool) {}
    fn references_after_global_correction(&mut self, _references: &References) {}
    fn begin_iteration(&mut self, _iteration: u32, _mu: f64, _epsilon: f64) {}
    fn block_pairs(&mut self, _pairs: &[BlockPair], _references: &References, _after_correction: bool) {
    }
    fn references_after_block_correction(&mut self, _references: &References) {}
    fn linked_pairs(&mut self, _pairs: &[ScoredPair], _references: &References) {}
    fn clusters(&mut self, _clusters: &[Cluster], _references: &References) {}
    fn iteration_link_index(&mut self, _link_index: &LinkIndex, _references: &References) {}
    fn final_link_index(&mut self, _link_index: &LinkIndex, _references: &References) {}
}

/// The default sink: capture disabled.
pub struct NoCapture;

impl CaptureSink for NoCapture {}

/// What a full resolution run produced.
#[derive(Debug)]
pub struct ResolutionOutcome {
    pub references: References,
    pub link_index: LinkIndex,
    pub state: RunState,
}

/// The iteration driver: owns the containers and runs the fixed-point loop,
/// widening μ and ε until convergence or exhaustion.
pub struct Resolver<'a> {
    config: &'a Config,
}

// The thresholds accumulate in hundredths; keeping them rounded avoids
// float drift deciding an extra iteration.
fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a Config) -> Resolver<'a> {
        Resolver { config }
    }

    pub fn run(&self, sink: &mut dyn CaptureSink) -> Result<ResolutionOutcome> {
        let config = self.config;
        let mut state = RunState::default();
        let truth = config.truth_file.as_deref().and_then(TruthSet::load);

        let (mut references, tokenized) = tokenize::read_references(config)?;
        state.references_read = tokenized.references_read;
        state.tokens_found = tokenized.tokens_found;
        info!(
            references = tokenized.references_read,
            tokens = tokenized.tokens_found,
            input = %config.input_file.display(),
            "references loaded"
        );

        let mut link_index = LinkIndex::new_singletons(references.len());
        sink.initial_references(&references);
        sink.initial_link_index(&link_index, &references);

        let mut frequencies = TokenFrequencies::build(&references);
        sink.token_frequencies(&frequencies, false);

        if config.run_global_correction {
            let word_list = WordList::load(&config.word_list_file);
            let outcome =
                correction::global::run(&mut references, &frequencies, &word_list, config)?;
            state.global_token_corrections = outcome.tokens_changed;
            frequencies = TokenFrequencies::build(&references);
            sink.references_after_global_correction(&references);
            sink.token_frequencies(&frequencies, true);
        }

        let mut mu = config.mu;
        let mut epsilon = config.epsilon;
        if config.mu_iterate <= 0.0 && mu <= 1.0 {
            warn!(mu_iterate = config.mu_iterate, "muIterate will never push mu past 1.0");
        }
        info!(
            mu,
            mu_iterate = config.mu_iterate,
            epsilon,
            epsilon_iterate = config.epsilon_iterate,
            comparator = %config.comparator,
            "starting iterations"
        );

        let mut first_iteration = true;
        loop {
            state.iterations += 1;
            sink.begin_iteration(state.iterations, mu, epsilon);
            info!(iteration = state.iterations, references = references.len(), mu, "new iteration");

            let mut pairs = build_block_pairs(&references, &frequencies, config);
            sink.block_pairs(&pairs, &references, false);
            if let Some(truth) = &truth {
                state.blocking_metrics =
                    Some(log_blocking_metrics(&pairs, &references, truth, state.iterations));
            }
            if pairs.is_empty() {
                info!("ending because the candidate pair list is empty");
                break;
            }

            if first_iteration && config.block_correction {
                let changed = correction::block::run(&pairs, &mut references, &frequencies, config);
                state.block_token_corrections = changed;
                if changed > 0 {
                    frequencies = TokenFrequencies::build(&references);
                    pairs = build_block_pairs(&references, &frequencies, config);
                    sink.references_after_block_correction(&references);
                    sink.block_pairs(&pairs, &references, true);
                    if let Some(truth) = &truth {
                        state.blocking_metrics = Some(log_blocking_metrics(
                            &pairs,
                            &references,
                            truth,
                            state.iterations,
                        ));
                    }
                }
            }
            first_iteration = false;

            let linked = link_pairs(&pairs, &references, &frequencies, config, mu);
            sink.linked_pairs(&linked, &references);
            if linked.is_empty() {
                info!("ending because the linked pair list is empty");
                break;
            }

            let clusters = transitive_closure(&linked, &references);
            sink.clusters(&clusters, &references);
            if clusters.is_empty() {
                info!("ending because the cluster list is empty");
                break;
            }

            link_index = link_index.merge_clusters(&clusters, &references);
            sink.iteration_link_index(&link_index, &references);

            if config.run_iteration_profile {
                log_profile(&link_index, &references, &mut state);
                if let Some(truth) = &truth {
                    state.cluster_metrics =
                        Some(log_cluster_metrics(&link_index, &references, truth));
                }
            }

            mu = round2(mu + config.mu_iterate);
            epsilon = round2(epsilon + config.epsilon_iterate);
            if mu > 1.0 {
                info!("ending because mu exceeded 1.0");
                break;
            }
            info!(mu, epsilon, "thresholds widened");
        }

        sink.final_link_index(&link_index, &references);
        log_profile(&link_index, &references, &mut state);
        if let Some(truth) = &truth {
            state.cluster_metrics = Some(log_cluster_metrics(&link_index, &references, truth));
        }

        Ok(ResolutionOutcome { references, link_index, state })
    }
}

fn log_blocking_metrics(
    pairs: &[BlockPair],
    references: &References,
    truth: &TruthSet,
    iteration: u32,
) -> BlockingMetrics {
    let metrics = metrics::blocking_metrics(pairs, references, truth);
    info!(
        iteration,
        candidate_pairs = metrics.candidate_pairs,
        expected_pairs = metrics.expected_pairs,
        true_pairs = metrics.true_pairs,
        precision = metrics.precision,
        recall = metrics.recall,
        f_measure = metrics.f_measure,
        "blocking metrics"
    );
    metrics
}

fn log_cluster_metrics(
    link_index: &LinkIndex,
    references: &References,
    truth: &TruthSet,
) -> PairwiseMetrics {
    let metrics = metrics::cluster_metrics(link_index, references, truth);
    info!(
        true_pairs = metrics.true_pairs,
        expected_pairs = metrics.expected_pairs,
        linked_pairs = metrics.linked_pairs,
        precision = metrics.precision,
        recall = metrics.recall,
        f_measure = metrics.f_measure,
        "cluster metrics"
    );
    metrics
}

/// Logs the cluster-size histogram and the mean entropy quality of the
/// multi-member clusters, keeping the latter for the report.
fn log_profile(link_index: &LinkIndex, references: &References, state: &mut RunState) {
    let profile = metrics::cluster_profile(link_index);

    let mut members_by_cluster = FastMap8::<RefId, Vec<RefId>>::default();
    for (id, cluster) in link_index.iter() {
        members_by_cluster.entry(cluster).or_default().push(id);
    }
    let mut total = 0.0;
    let mut counted = 0u64;
    for members in members_by_cluster.values() {
        if members.len() < 2 {
            continue;
        }
        let token_lists: Vec<&[String]> =
            members.iter().map(|id| references.tokens(*id)).collect();
        total += entropy::cluster_entropy(&token_lists);
        counted += 1;
    }
    let mean_entropy = if counted > 0 { Some(total / counted as f64) } else { None };
    state.mean_cluster_entropy = mean_entropy;

    info!(
        clusters = profile.clusters,
        largest = profile.largest,
        singletons = profile.singletons,
        mean_entropy_quality = mean_entropy.unwrap_or(1.0),
        "cluster profile"
    );
    for (size, count) in &profile.size_histogram {
        info!(size, count, "cluster size");
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::config::ComparatorType;

    fn input_file(lines: &[&str]) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file
    }

    /// Counts iterations through the begin_iteration hook.
    #[derive(Default)]
    struct IterationCounter {
        mus: Vec<f64>,
    }

    impl CaptureSink for IterationCounter {
        fn begin_iteration(&mut self, _iteration: u32, mu: f64, _epsilon: f64) {
            self.mus.push(mu);
        }
    }

    #[test]
    fn mu_schedule_converges() {
        let file = input_file(&[
            "R1|JOHN SMITH OAKWOOD",
            "R2|JOHN SMITH OAKWOOD",
            "R3|JANE DOEBECK ELMWOOD",
        ]);
        let config = Config {
            input_file: file.path().to_path_buf(),
            delimiter: "|".to_string(),
            sigma: 1000,
            mu: 0.8,
            mu_iterate: 0.1,
            ..Config::default()
        };
        let mut counter = IterationCounter::default();
        let outcome = Resolver::new(&config).run(&mut counter).unwrap();

        // iterations at 0.8, 0.9 and 1.0; 1.1 terminates
        assert_eq!(counter.mus, vec![0.8, 0.9, 1.0]);
        assert_eq!(outcome.state.iterations, 3);
        assert!(outcome.link_index.is_canonical());
        assert_eq!(outcome.link_index.cluster(0), outcome.link_index.cluster(1));
        assert_ne!(outcome.link_index.cluster(0), outcome.link_index.cluster(2));
    }

    #[test]
    fn all_stop_tokens_terminate_cleanly() {
        let file = input_file(&["R1|JOHN", "R2|JOHN"]);
        let config = Config {
            input_file: file.path().to_path_buf(),
            delimiter: "|".to_string(),
            // every token is a stop token
            sigma: 1,
            ..Config::default()
        };
        let outcome = Resolver::new(&config).run(&mut NoCapture).unwrap();
        assert_eq!(outcome.state.iterations, 1);
        assert!(outcome.link_index.iter().all(|(id, cluster)| id == cluster));
    }

    #[test]
    fn single_reference_is_a_singleton_cluster() {
        let file = input_file(&["R1|JOHN SMITH"]);
        let config = Config {
            input_file: file.path().to_path_buf(),
            delimiter: "|".to_string(),
            ..Config::default()
        };
        let outcome = Resolver::new(&config).run(&mut NoCapture).unwrap();
        assert_eq!(outcome.link_index.len(), 1);
        assert_eq!(outcome.link_index.cluster(0), 0);
    }

    #[test]
    fn resolving_resolved_output_is_stable() {
        let file = input_file(&[
            "R1|JOHN SMITH OAKWOOD",
            "R2|JOHN SMITH OAKWOOD",
            "R3|JANE DOEBECK ELMWOOD",
        ]);
        let config = Config {
            input_file: file.path().to_path_buf(),
            delimiter: "|".to_string(),
            sigma: 1000,
            comparator: ComparatorType::Cosine,
            ..Config::default()
        };
        let first = Resolver::new(&config).run(&mut NoCapture).unwrap();
        let second = Resolver::new(&config).run(&mut NoCapture).unwrap();
        assert_eq!(first.link_index, second.link_index);
    }

    #[test]
    fn missing_input_file_is_a_configuration_error() {
        let config = Config {
            input_file: "definitely-not-here.txt".into(),
            ..Config::default()
        };
        let error = Resolver::new(&config).run(&mut NoCapture).unwrap_err();
        assert!(error.is_configuration_error());
    }
}
