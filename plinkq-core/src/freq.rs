//! Allele-frequency scan kernel.
//!
//! Per variant: `[hom_ref, het, hom_alt, missing]` via the decoder's
//! fast-count path, then `alt_freq = (het + 2*hom_alt) / (2*obs)` with
//! a null frequency when every sample is missing. The genotype-count
//! columns are part of the schema only when requested at bind.

use plinkq_geno::{PlinkError, Result};

use crate::bind::{Dataset, ScanOptions};
use crate::scan::{default_max_threads, BatchClaimer, ScanContext};
use crate::table::{ColumnDef, ColumnType, OutputBatch, Projection, ScanKernel};

pub const COL_CHROM: usize = 0;
pub const COL_POS: usize = 1;
pub const COL_ID: usize = 2;
pub const COL_REF: usize = 3;
pub const COL_ALT: usize = 4;
pub const COL_ALT_FREQ: usize = 5;
pub const COL_OBS_CT: usize = 6;
pub const COL_HOM_REF_CT: usize = 7;
pub const COL_HET_CT: usize = 8;
pub const COL_HOM_ALT_CT: usize = 9;
pub const COL_MISSING_CT: usize = 10;

const BATCH_SIZE: u32 = 128;

#[derive(Debug, Clone, Default)]
pub struct FreqOptions {
    /// Also emit the four genotype-count columns.
    pub counts: bool,
    /// Dosage-weighted frequencies; rejected until the reader exposes
    /// a dosage-aware count path.
    pub dosage: bool,
}

pub struct FreqScan {
    dataset: Dataset,
    schema: Vec<ColumnDef>,
}

impl std::fmt::Debug for FreqScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FreqScan").finish_non_exhaustive()
    }
}

impl FreqScan {
    pub fn bind(opts: &ScanOptions, freq_opts: &FreqOptions) -> Result<Self> {
        if freq_opts.dosage {
            return Err(PlinkError::NotImplemented(
                "dosage-weighted allele frequencies are not implemented".into(),
            ));
        }
        let dataset = Dataset::open(opts, false)?;

        let mut schema = vec![
            ColumnDef::new("CHROM", ColumnType::Varchar),
            ColumnDef::new("POS", ColumnType::Int32),
            ColumnDef::new("ID", ColumnType::Varchar),
            ColumnDef::new("REF", ColumnType::Varchar),
            ColumnDef::new("ALT", ColumnType::Varchar),
            ColumnDef::new("ALT_FREQ", ColumnType::Double),
            ColumnDef::new("OBS_CT", ColumnType::Int32),
        ];
        if freq_opts.counts {
            schema.push(ColumnDef::new("HOM_REF_CT", ColumnType::Int32));
            schema.push(ColumnDef::new("HET_CT", ColumnType::Int32));
            schema.push(ColumnDef::new("HOM_ALT_CT", ColumnType::Int32));
            schema.push(ColumnDef::new("MISSING_CT", ColumnType::Int32));
        }
        Ok(FreqScan { dataset, schema })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

pub struct FreqGlobal {
    claimer: BatchClaimer,
    projection: Projection,
    need_counts: bool,
}

pub struct FreqLocal {
    reader: Option<plinkq_geno::PgenReader>,
}

impl ScanKernel for FreqScan {
    type Global = FreqGlobal;
    type Local = FreqLocal;

    fn name(&self) -> &'static str {
        "freq"
    }

    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn init_global(&self, projection: &Projection) -> Result<FreqGlobal> {
        Ok(FreqGlobal {
            claimer: BatchClaimer::new(self.dataset.range.start, self.dataset.range.end),
            projection: projection.clone(),
            need_counts: projection.any_at_or_beyond(COL_ALT_FREQ),
        })
    }

    fn init_local(&self, global: &FreqGlobal) -> Result<FreqLocal> {
        let reader = if global.need_counts {
            Some(self.dataset.open_reader()?)
        } else {
            None
        };
        Ok(FreqLocal { reader })
    }

    fn max_threads(&self, _global: &FreqGlobal) -> usize {
        default_max_threads(self.dataset.range.len())
    }

    fn scan(
        &self,
        global: &FreqGlobal,
        local: &mut FreqLocal,
        ctx: &ScanContext,
        output: &mut OutputBatch,
    ) -> Result<()> {
        let cols = &self.dataset.columns;

        while !output.is_full() {
            let claim = BATCH_SIZE.min(output.remaining() as u32);
            let Some((start, end)) = global.claimer.claim(claim, ctx) else {
                break;
            };

            for vidx in start..end {
                let mut counts = [0u32; 4];
                if let Some(reader) = local.reader.as_mut() {
                    counts = reader.genotype_counts(vidx)?;
                }
                let [hom_ref, het, hom_alt, missing] = counts;
                let obs_sample_ct = hom_ref + het + hom_alt;
                let obs_ct = 2 * obs_sample_ct;
                let alt_freq = if obs_sample_ct == 0 {
                    None
                } else {
                    Some((het as f64 + 2.0 * hom_alt as f64) / (obs_ct as f64))
                };

                for (out_col, &col_id) in global.projection.column_ids.iter().enumerate() {
                    match col_id {
                        COL_CHROM => output.push_varchar(out_col, Some(cols.chrom(vidx))),
                        COL_POS => output.push_int32(out_col, Some(cols.pos(vidx))),
                        COL_ID => output.push_varchar(out_col, cols.id(vidx)),
                        COL_REF => output.push_varchar(out_col, Some(cols.ref_allele(vidx))),
                        COL_ALT => output.push_varchar(out_col, cols.alt(vidx)),
                        COL_ALT_FREQ => output.push_double(out_col, alt_freq),
                        COL_OBS_CT => output.push_int32(out_col, Some(obs_ct as i32)),
                        COL_HOM_REF_CT => output.push_int32(out_col, Some(hom_ref as i32)),
                        COL_HET_CT => output.push_int32(out_col, Some(het as i32)),
                        COL_HOM_ALT_CT => output.push_int32(out_col, Some(hom_alt as i32)),
                        COL_MISSING_CT => output.push_int32(out_col, Some(missing as i32)),
                        _ => output.push_null(out_col),
                    }
                }
                output.finish_row();
            }
        }
        Ok(())
    }
}
