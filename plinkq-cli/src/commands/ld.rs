//! `plinkq ld`: pairwise or windowed linkage disequilibrium.

use anyhow::{Context, Result};
use clap::Args;

use plinkq_core::ld::{LdOptions, LdScan};

use super::{run_and_print, CommonArgs};

#[derive(Args, Debug)]
pub struct LdArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// First variant ID (pairwise mode; requires --variant2)
    #[arg(long)]
    variant1: Option<String>,

    /// Second variant ID (pairwise mode; requires --variant1)
    #[arg(long)]
    variant2: Option<String>,

    /// Window size in kilobases for the windowed sweep
    #[arg(long, default_value = "1000")]
    window_kb: i64,

    /// Minimum r^2 for a windowed pair to be reported
    #[arg(long, default_value = "0.2")]
    r2_threshold: f64,

    /// Also report cross-chromosome pairs
    #[arg(long)]
    inter_chr: bool,
}

pub fn run(args: LdArgs) -> Result<()> {
    let scan = LdScan::bind(
        &args.common.to_scan_options(),
        &LdOptions {
            variant1: args.variant1,
            variant2: args.variant2,
            window_kb: args.window_kb,
            r2_threshold: args.r2_threshold,
            inter_chr: args.inter_chr,
        },
    )
    .context("binding ld scan")?;
    run_and_print(&scan)
}
