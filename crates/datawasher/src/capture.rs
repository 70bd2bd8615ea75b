use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;
use washer::scoring::filter_tokens;
use washer::{
    BlockPair, CaptureSink, Cluster, ComparatorType, Config, LinkIndex, References, ScoredPair,
    TokenFrequencies, TruthSet,
};

/// Writes every intermediate container to CSV under
/// `data_capture/<base>_<tag>/`, one numbered file per pipeline stage and
/// one subfolder per iteration, so a run can be inspected stage by stage.
///
/// Capture is diagnostics: a file that cannot be written is a warning, never
/// a failed run.
pub struct CsvCapture {
    run_folder: PathBuf,
    iteration_folder: Option<PathBuf>,
    config: Config,
    truth: Option<TruthSet>,
    frequencies: TokenFrequencies,
    epsilon: f64,
}

impl CsvCapture {
    pub fn new(
        root: &Path,
        base: &str,
        tag: &str,
        config: Config,
        truth: Option<TruthSet>,
    ) -> anyhow::Result<CsvCapture> {
        let run_folder = root.join(format!("{base}_{tag}"));
        fs::create_dir_all(&run_folder)?;
        Ok(CsvCapture {
            run_folder,
            iteration_folder: None,
            config,
            truth,
            frequencies: TokenFrequencies::default(),
            epsilon: 0.0,
        })
    }

    fn iteration_folder(&self) -> &Path {
        self.iteration_folder.as_deref().unwrap_or(&self.run_folder)
    }

    fn write_csv(
        &self,
        path: PathBuf,
        header: &[&str],
        rows: impl IntoIterator<Item = Vec<String>>,
    ) {
        let result = (|| -> csv::Result<()> {
            let mut writer = csv::Writer::from_path(&path)?;
            writer.write_record(header)?;
            for row in rows {
                writer.write_record(&row)?;
            }
            writer.flush()?;
            Ok(())
        })();
        if let Err(error) = result {
            warn!("data capture failed for {:?}: {error}", path);
        }
    }

    fn sorted_references(references: &References) -> Vec<(&str, String)> {
        let mut rows: Vec<_> = references
            .iter()
            .map(|(_id, name, tokens)| (name, tokens.join(", ")))
            .collect();
        rows.sort_unstable_by_key(|(name, _)| *name);
        rows
    }

    fn write_references(&self, path: PathBuf, references: &References) {
        let rows = Self::sorted_references(references)
            .into_iter()
            .map(|(name, tokens)| vec![name.to_string(), tokens]);
        self.write_csv(path, &["refID", "tokens"], rows);
    }

    fn write_link_index(&self, path: PathBuf, link_index: &LinkIndex, references: &References) {
        let mut rows: Vec<Vec<String>> = link_index
            .iter()
            .map(|(id, cluster)| {
                vec![
                    references.name(id).unwrap_or_default().to_string(),
                    references.name(cluster).unwrap_or_default().to_string(),
                    references.tokens(id).join(", "),
                ]
            })
            .collect();
        rows.sort_unstable();
        self.write_csv(path, &["refID", "clusterID", "tokens"], rows);
    }

    fn pair_truth(&self, left: &str, right: &str) -> String {
        match &self.truth {
            Some(truth) => match (truth.get(left), truth.get(right)) {
                (Some(t1), Some(t2)) => {
                    if t1 == t2 {
                        "TRUE".to_string()
                    } else {
                        "FALSE".to_string()
                    }
                }
                _ => String::new(),
            },
            None => String::new(),
        }
    }

    fn write_pairs(
        &self,
        path: PathBuf,
        pairs: impl IntoIterator<Item = (BlockPair, Option<f64>)>,
        references: &References,
        with_similarity: bool,
    ) {
        let mut header = vec!["refID1", "tokens1", "refID2", "tokens2"];
        if with_similarity {
            header.push("similarity");
        }
        if self.truth.is_some() {
            header.push("truth");
        }
        let rows = pairs.into_iter().map(|(pair, similarity)| {
            let left = references.name(pair.a).unwrap_or_default();
            let right = references.name(pair.b).unwrap_or_default();
            let mut row = vec![
                left.to_string(),
                references.tokens(pair.a).join(", "),
                right.to_string(),
                references.tokens(pair.b).join(", "),
            ];
            if let Some(similarity) = similarity {
                row.push(format!("{similarity:.4}"));
            }
            if self.truth.is_some() {
                row.push(self.pair_truth(left, right));
            }
            row
        });
        self.write_csv(path, &header, rows);
    }

    /// The greedy token matches behind each linked pair, written only for
    /// the comparator able to explain its score.
    fn write_token_matches(&self, path: PathBuf, pairs: &[ScoredPair], references: &References) {
        let header =
            &["refID1", "refID2", "step", "token1", "token2", "similarity", "weight", "weighted"];
        let mut rows = Vec::new();
        for scored in pairs {
            let left = filter_tokens(references.tokens(scored.pair.a), &self.frequencies, &self.config);
            let right =
                filter_tokens(references.tokens(scored.pair.b), &self.frequencies, &self.config);
            let Some((_score, matches)) = self.config.comparator.similarity_with_trace(
                &left,
                &right,
                &self.config,
                self.epsilon,
            ) else {
                continue;
            };
            for (step, token_match) in matches.iter().enumerate() {
                rows.push(vec![
                    references.name(scored.pair.a).unwrap_or_default().to_string(),
                    references.name(scored.pair.b).unwrap_or_default().to_string(),
                    step.to_string(),
                    token_match.left.clone(),
                    token_match.right.clone(),
                    format!("{:.4}", token_match.similarity),
                    format!("{:.4}", token_match.weight),
                    format!("{:.4}", token_match.weighted_similarity),
                ]);
            }
        }
        self.write_csv(path, header, rows);
    }
}

impl CaptureSink for CsvCapture {
    fn initial_references(&mut self, references: &References) {
        self.write_references(self.run_folder.join("01_refDict.csv"), references);
    }

    fn initial_link_index(&mut self, link_index: &LinkIndex, references: &References) {
        self.write_link_index(self.run_folder.join("02_linkIndex_initial.csv"), link_index, references);
    }

    fn token_frequencies(&mut self, frequencies: &TokenFrequencies, after_correction: bool) {
        self.frequencies = frequencies.clone();
        let name = if after_correction {
            "04_tokenFreqDict_after_global_correction.csv"
        } else {
            "03_tokenFreqDict.csv"
        };
        let rows = frequencies
            .sorted_by_frequency_desc()
            .into_iter()
            .map(|(token, frequency)| vec![token.to_string(), frequency.to_string()]);
        self.write_csv(self.run_folder.join(name), &["token", "frequency"], rows);
    }

    fn references_after_global_correction(&mut self, references: &References) {
        self.write_references(
            self.run_folder.join("04_refDict_after_global_correction.csv"),
            references,
        );
    }

    fn begin_iteration(&mut self, iteration: u32, _mu: f64, epsilon: f64) {
        self.epsilon = epsilon;
        let folder = self.run_folder.join(format!("iteration_{iteration:02}"));
        if let Err(error) = fs::create_dir_all(&folder) {
            warn!("cannot create iteration capture folder {:?}: {error}", folder);
        }
        self.iteration_folder = Some(folder);
    }

    fn block_pairs(&mut self, pairs: &[BlockPair], references: &References, after_correction: bool) {
        let name = if after_correction {
            "06_blockPairList_after_block_correction.csv"
        } else {
            "05_blockPairList.csv"
        };
        self.write_pairs(
            self.iteration_folder().join(name),
            pairs.iter().map(|pair| (*pair, None)),
            references,
            false,
        );
    }

    fn references_after_block_correction(&mut self, references: &References) {
        self.write_references(
            self.iteration_folder().join("06_refDict_after_block_correction.csv"),
            references,
        );
    }

    fn linked_pairs(&mut self, pairs: &[ScoredPair], references: &References) {
        self.write_pairs(
            self.iteration_folder().join("07_linkedPairList.csv"),
            pairs.iter().map(|scored| (scored.pair, Some(scored.similarity))),
            references,
            true,
        );
        if self.config.comparator == ComparatorType::ScoringMatrixKris {
            self.write_token_matches(
                self.iteration_folder().join("07_linkedPairList_token_matches.csv"),
                pairs,
                references,
            );
        }
    }

    fn clusters(&mut self, clusters: &[Cluster], references: &References) {
        let mut header = vec!["clusterID", "refID", "tokens"];
        if self.truth.is_some() {
            header.push("truth");
        }
        let mut rows = Vec::new();
        for cluster in clusters {
            let cluster_name = references.name(cluster.representative).unwrap_or_default();
            for member in cluster.members.iter() {
                let name = references.name(member).unwrap_or_default();
                let mut row = vec![
                    cluster_name.to_string(),
                    name.to_string(),
                    references.tokens(member).join(", "),
                ];
                if let Some(truth) = &self.truth {
                    row.push(truth.get(name).unwrap_or_default().to_string());
                }
                rows.push(row);
            }
        }
        self.write_csv(self.iteration_folder().join("08_clusterList.csv"), &header, rows);
    }

    fn iteration_link_index(&mut self, link_index: &LinkIndex, references: &References) {
        self.write_link_index(self.iteration_folder().join("09_linkIndex.csv"), link_index, references);
    }

    fn final_link_index(&mut self, link_index: &LinkIndex, references: &References) {
        self.write_link_index(self.run_folder.join("final_linkIndex.csv"), link_index, references);
    }
}
