//! Subcommand implementations and shared argument plumbing.

pub mod freq;
pub mod hardy;
pub mod ld;
pub mod missing;
pub mod read;
pub mod score;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;

use plinkq_core::table::Value;
use plinkq_core::{run_scan, OutputBatch, Projection, ScanContext, ScanKernel, ScanOptions};
use plinkq_geno::SampleSelector;

/// Arguments every scan subcommand shares.
#[derive(Args, Debug)]
pub struct CommonArgs {
    /// Path to the .pgen genotype file
    pub pgen: PathBuf,

    /// Explicit .pvar/.bim path (default: discovered next to the .pgen)
    #[arg(long)]
    pub pvar: Option<PathBuf>,

    /// Explicit .psam/.fam path (default: discovered next to the .pgen)
    #[arg(long)]
    pub psam: Option<PathBuf>,

    /// Restrict to these 0-based sample indices (comma-separated)
    #[arg(long, value_delimiter = ',', conflicts_with = "sample_ids")]
    pub samples: Option<Vec<i64>>,

    /// Restrict to these sample IDs (comma-separated, requires .psam/.fam)
    #[arg(long, value_delimiter = ',')]
    pub sample_ids: Option<Vec<String>>,

    /// Genomic region chrom:start-end (1-based, inclusive)
    #[arg(long)]
    pub region: Option<String>,
}

impl CommonArgs {
    pub fn to_scan_options(&self) -> ScanOptions {
        let samples = match (&self.samples, &self.sample_ids) {
            (Some(indices), _) => Some(SampleSelector::Indices(indices.clone())),
            (None, Some(ids)) => Some(SampleSelector::Ids(ids.clone())),
            (None, None) => None,
        };
        ScanOptions {
            pgen: self.pgen.clone(),
            pvar: self.pvar.clone(),
            psam: self.psam.clone(),
            samples,
            region: self.region.clone(),
        }
    }
}

/// Drive a bound kernel to completion and print all rows as TSV.
pub fn run_and_print<K: ScanKernel>(kernel: &K) -> Result<()> {
    let projection = Projection::all(kernel.schema());
    let ctx = ScanContext::new();
    let batches = run_scan(kernel, &projection, &ctx)?;
    print_tsv(kernel, &batches)?;
    Ok(())
}

fn print_tsv<K: ScanKernel>(kernel: &K, batches: &[OutputBatch]) -> Result<()> {
    use std::io::Write;
    let stdout = std::io::stdout();
    let mut out = std::io::BufWriter::new(stdout.lock());

    let header: Vec<&str> = kernel.schema().iter().map(|c| c.name).collect();
    writeln!(out, "{}", header.join("\t"))?;

    for batch in batches {
        for row in 0..batch.rows() {
            let fields: Vec<String> = (0..batch.column_ct())
                .map(|col| format_value(batch.value(col, row)))
                .collect();
            writeln!(out, "{}", fields.join("\t"))?;
        }
    }
    Ok(())
}

fn format_value(value: Value<'_>) -> String {
    match value {
        Value::Null => "NA".to_string(),
        Value::Varchar(s) => s.to_string(),
        Value::Int32(x) => x.to_string(),
        Value::Double(x) => format!("{x}"),
        Value::Int32List(xs) => xs
            .iter()
            .map(|x| match x {
                None => "NA".to_string(),
                Some(v) => v.to_string(),
            })
            .collect::<Vec<_>>()
            .join(","),
    }
}

/// Parse one `id allele weight` line of a weights file.
pub fn parse_weight_line(line: &str, line_no: usize) -> Result<(String, String, f64)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 3 {
        bail!(
            "weights file line {}: expected 'ID ALLELE WEIGHT', got {} fields",
            line_no,
            fields.len()
        );
    }
    let weight: f64 = fields[2]
        .parse()
        .map_err(|_| anyhow::anyhow!("weights file line {}: invalid weight '{}'", line_no, fields[2]))?;
    Ok((fields[0].to_string(), fields[1].to_string(), weight))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_weight_line() {
        let (id, allele, w) = parse_weight_line("rs1 G 0.5", 1).unwrap();
        assert_eq!(id, "rs1");
        assert_eq!(allele, "G");
        assert_eq!(w, 0.5);
        assert!(parse_weight_line("rs1 G", 1).is_err());
        assert!(parse_weight_line("rs1 G x", 1).is_err());
    }

    #[test]
    fn test_format_value() {
        assert_eq!(format_value(Value::Null), "NA");
        assert_eq!(format_value(Value::Int32(7)), "7");
        assert_eq!(
            format_value(Value::Int32List(&[Some(0), None, Some(2)])),
            "0,NA,2"
        );
    }
}
