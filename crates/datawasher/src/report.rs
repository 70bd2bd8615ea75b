use std::path::{Path, PathBuf};

use washer::{Config, RunState};

/// One row per completed run, collected across a batch and written out as a
/// single statistics CSV at the end.
pub struct Report {
    path: PathBuf,
    rows: Vec<Vec<String>>,
}

const HEADER: &[&str] = &[
    "parmFile",
    "inputFile",
    "tokenizerType",
    "hasHeader",
    "delimiter",
    "removeDuplicateTokens",
    "runGlobalCorrection",
    "minFreqStdToken",
    "minLenStdToken",
    "maxFreqErrToken",
    "learnTokenVariants",
    "sigma",
    "minBlkTokenLen",
    "excludeNumericBlocks",
    "removeExcludedBlkTokens",
    "blockByPairs",
    "addRefsToLinkIndex",
    "blockCorrection",
    "comparator",
    "matrixNumTokenRule",
    "matrixInitialRule",
    "muStart",
    "muIterate",
    "epsilonStart",
    "epsilonIterate",
    "references",
    "tokens",
    "iterations",
    "globalCorrections",
    "blockCorrections",
    "meanClusterEntropy",
    "truePairs",
    "expectedPairs",
    "linkedPairs",
    "precision",
    "recall",
    "fMeasure",
    "blockCandidatePairs",
    "blockExpectedPairs",
    "blockTruePairs",
    "blockPrecision",
    "blockRecall",
    "blockFMeasure",
    "runtimeSeconds",
];

fn optional(value: Option<String>) -> String {
    value.unwrap_or_default()
}

impl Report {
    pub fn new(path: PathBuf) -> Report {
        Report { path, rows: Vec::new() }
    }

    pub fn add_run(
        &mut self,
        parm_file: &Path,
        config: &Config,
        state: &RunState,
        runtime_seconds: f64,
    ) {
        let cluster = state.cluster_metrics;
        let blocking = state.blocking_metrics;
        self.rows.push(vec![
            parm_file.display().to_string(),
            config.input_file.display().to_string(),
            config.tokenizer_type.to_string(),
            config.has_header.to_string(),
            config.delimiter.clone(),
            config.remove_duplicate_tokens.to_string(),
            config.run_global_correction.to_string(),
            config.min_freq_std_token.to_string(),
            config.min_len_std_token.to_string(),
            config.max_freq_err_token.to_string(),
            config.learn_token_variants.to_string(),
            config.sigma.to_string(),
            config.min_blk_token_len.to_string(),
            config.exclude_numeric_blocks.to_string(),
            config.remove_excluded_blk_tokens.to_string(),
            config.block_by_pairs.to_string(),
            config.add_refs_to_link_index.to_string(),
            config.block_correction.to_string(),
            config.comparator.to_string(),
            config.matrix_num_token_rule.to_string(),
            config.matrix_initial_rule.to_string(),
            config.mu.to_string(),
            config.mu_iterate.to_string(),
            config.epsilon.to_string(),
            config.epsilon_iterate.to_string(),
            state.references_read.to_string(),
            state.tokens_found.to_string(),
            state.iterations.to_string(),
            state.global_token_corrections.to_string(),
            state.block_token_corrections.to_string(),
            optional(state.mean_cluster_entropy.map(|e| format!("{e:.4}"))),
            optional(cluster.map(|m| m.true_pairs.to_string())),
            optional(cluster.map(|m| m.expected_pairs.to_string())),
            optional(cluster.map(|m| m.linked_pairs.to_string())),
            optional(cluster.map(|m| m.precision.to_string())),
            optional(cluster.map(|m| m.recall.to_string())),
            optional(cluster.map(|m| m.f_measure.to_string())),
            optional(blocking.map(|m| m.candidate_pairs.to_string())),
            optional(blocking.map(|m| m.expected_pairs.to_string())),
            optional(blocking.map(|m| m.true_pairs.to_string())),
            optional(blocking.map(|m| m.precision.to_string())),
            optional(blocking.map(|m| m.recall.to_string())),
            optional(blocking.map(|m| m.f_measure.to_string())),
            format!("{runtime_seconds:.2}"),
        ]);
    }

    /// Writes the collected rows. Called once, after the last run.
    pub fn write(&self) -> anyhow::Result<()> {
        let mut writer = csv::Writer::from_path(&self.path)?;
        writer.write_record(HEADER)?;
        for row in &self.rows {
            writer.write_record(row)?;
        }
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_and_rows_line_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.csv");
        let mut report = Report::new(path.clone());
        report.add_run(Path::new("parms.txt"), &Config::default(), &RunState::default(), 1.5);
        report.write().unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(headers.len(), HEADER.len());
        let row = reader.records().next().unwrap().unwrap();
        assert_eq!(row.len(), HEADER.len());
        assert_eq!(&row[0], "parms.txt");
    }
}
