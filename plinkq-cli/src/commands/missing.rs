//! `plinkq missing`: missing-call rates per variant or per sample.

use anyhow::{Context, Result};
use clap::Args;

use plinkq_core::missing::{MissingMode, MissingScan};

use super::{run_and_print, CommonArgs};

#[derive(Args, Debug)]
pub struct MissingArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Orientation: 'variant' or 'sample'
    #[arg(long, default_value = "variant")]
    mode: String,
}

pub fn run(args: MissingArgs) -> Result<()> {
    let mode = MissingMode::parse(&args.mode)?;
    let scan = MissingScan::bind(&args.common.to_scan_options(), mode)
        .context("binding missing scan")?;
    run_and_print(&scan)
}
