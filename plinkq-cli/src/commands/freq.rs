//! `plinkq freq`: ALT-allele frequencies per variant.

use anyhow::{Context, Result};
use clap::Args;

use plinkq_core::freq::{FreqOptions, FreqScan};

use super::{run_and_print, CommonArgs};

#[derive(Args, Debug)]
pub struct FreqArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Also emit HOM_REF_CT/HET_CT/HOM_ALT_CT/MISSING_CT columns
    #[arg(long)]
    counts: bool,

    /// Dosage-weighted frequencies (not yet implemented)
    #[arg(long)]
    dosage: bool,
}

pub fn run(args: FreqArgs) -> Result<()> {
    let scan = FreqScan::bind(
        &args.common.to_scan_options(),
        &FreqOptions {
            counts: args.counts,
            dosage: args.dosage,
        },
    )
    .context("binding freq scan")?;
    run_and_print(&scan)
}
