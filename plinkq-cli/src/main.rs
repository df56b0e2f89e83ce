//! plinkq: SQL-style analytics over PLINK 2 genotype files.
//!
//! CLI entry point using clap for argument parsing.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "plinkq",
    version,
    about = "Query PLINK 2 genotype datasets: frequencies, HWE, missingness, LD, polygenic scores",
    long_about = "Analytics over .pgen/.pvar/.psam (and legacy .bed/.bim/.fam) filesets.\n\
                   Each subcommand scans the dataset in parallel and prints TSV."
)]
struct Cli {
    /// Number of threads to use
    #[arg(long, default_value = "0", global = true)]
    threads: usize,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// ALT-allele frequencies per variant
    Freq(commands::freq::FreqArgs),

    /// Hardy-Weinberg equilibrium exact test per variant
    Hardy(commands::hardy::HardyArgs),

    /// Missing-call rates per variant or per sample
    Missing(commands::missing::MissingArgs),

    /// Pairwise or windowed linkage disequilibrium
    Ld(commands::ld::LdArgs),

    /// Polygenic scores from per-variant weights
    Score(commands::score::ScoreArgs),

    /// Raw genotype calls as one list per variant
    Read(commands::read::ReadArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    if cli.threads > 0 {
        rayon::ThreadPoolBuilder::new()
            .num_threads(cli.threads)
            .build_global()
            .ok();
    }

    tracing::info!("plinkq v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Freq(args) => commands::freq::run(args),
        Commands::Hardy(args) => commands::hardy::run(args),
        Commands::Missing(args) => commands::missing::run(args),
        Commands::Ld(args) => commands::ld::run(args),
        Commands::Score(args) => commands::score::run(args),
        Commands::Read(args) => commands::read::run(args),
    }
}
