//! `plinkq hardy`: Hardy-Weinberg equilibrium exact test per variant.

use anyhow::{Context, Result};
use clap::Args;

use plinkq_core::hardy::{HardyOptions, HardyScan};

use super::{run_and_print, CommonArgs};

#[derive(Args, Debug)]
pub struct HardyArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Apply the mid-p correction
    #[arg(long)]
    midp: bool,
}

pub fn run(args: HardyArgs) -> Result<()> {
    let scan = HardyScan::bind(
        &args.common.to_scan_options(),
        &HardyOptions { midp: args.midp },
    )
    .context("binding hardy scan")?;
    run_and_print(&scan)
}
