//! `plinkq read`: raw genotype calls, one list per variant.

use anyhow::{Context, Result};
use clap::Args;

use plinkq_core::read::{ReadOptions, ReadScan};

use super::{run_and_print, CommonArgs};

#[derive(Args, Debug)]
pub struct ReadArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Emit dosages instead of hard calls (not yet implemented)
    #[arg(long)]
    dosages: bool,

    /// Emit phased haplotypes (not yet implemented)
    #[arg(long)]
    phased: bool,
}

pub fn run(args: ReadArgs) -> Result<()> {
    let scan = ReadScan::bind(
        &args.common.to_scan_options(),
        &ReadOptions {
            dosages: args.dosages,
            phased: args.phased,
        },
    )
    .context("binding read scan")?;
    run_and_print(&scan)
}
