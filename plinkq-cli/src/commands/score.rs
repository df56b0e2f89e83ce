//! `plinkq score`: polygenic scores from per-variant weights.
//!
//! Weights come either positionally (`--weights w1,w2,...`, one per
//! variant of the scanned range) or from a whitespace-delimited file of
//! `ID ALLELE WEIGHT` rows (`--weights-file`).

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use plinkq_core::score::{ScoreOptions, ScoreScan, ScoreWeights, WeightEntry};

use super::{parse_weight_line, run_and_print, CommonArgs};

#[derive(Args, Debug)]
pub struct ScoreArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Positional weights, one per variant in the scanned range
    #[arg(long, value_delimiter = ',', conflicts_with = "weights_file")]
    weights: Option<Vec<f64>>,

    /// File of 'ID ALLELE WEIGHT' rows
    #[arg(long, required_unless_present = "weights")]
    weights_file: Option<PathBuf>,

    /// Variance-standardize each variant's dosages before weighting
    #[arg(long)]
    center: bool,

    /// Drop missing calls instead of imputing the variant mean
    #[arg(long)]
    no_mean_imputation: bool,
}

pub fn run(args: ScoreArgs) -> Result<()> {
    let weights = match (&args.weights, &args.weights_file) {
        (Some(list), _) => ScoreWeights::Positional(list.clone()),
        (None, Some(path)) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("reading weights file '{}'", path.display()))?;
            let mut entries = Vec::new();
            for (line_no, line) in contents.lines().enumerate() {
                let line = line.trim();
                if line.is_empty() || line.starts_with('#') {
                    continue;
                }
                let (id, allele, weight) = parse_weight_line(line, line_no + 1)?;
                entries.push(WeightEntry { id, allele, weight });
            }
            ScoreWeights::ById(entries)
        }
        (None, None) => unreachable!("clap enforces one weight source"),
    };

    let scan = ScoreScan::bind(
        &args.common.to_scan_options(),
        &ScoreOptions {
            weights,
            center: args.center,
            no_mean_imputation: args.no_mean_imputation,
        },
    )
    .context("binding score scan")?;
    run_and_print(&scan)
}
