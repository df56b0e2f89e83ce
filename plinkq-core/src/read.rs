//! Raw genotype reader kernel: one row per variant with the decoded
//! per-sample calls as a nullable integer list.
//!
//! Metadata comes from the offset-indexed sidecar view rather than the
//! eager columns; genotype-list rows are wide enough that the lazy
//! field extraction is never the bottleneck.

use plinkq_geno::aligned::{get_nyp, CachelineVec};
use plinkq_geno::{PgenReader, PlinkError, Result};

use crate::bind::{Dataset, ScanOptions};
use crate::scan::{default_max_threads, BatchClaimer, ScanContext};
use crate::table::{ColumnDef, ColumnType, OutputBatch, Projection, ScanKernel};

pub const COL_CHROM: usize = 0;
pub const COL_POS: usize = 1;
pub const COL_ID: usize = 2;
pub const COL_REF: usize = 3;
pub const COL_ALT: usize = 4;
pub const COL_GENOTYPES: usize = 5;

const BATCH_SIZE: u32 = 128;

#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub dosages: bool,
    pub phased: bool,
}

pub struct ReadScan {
    dataset: Dataset,
    schema: Vec<ColumnDef>,
}

impl std::fmt::Debug for ReadScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadScan").finish_non_exhaustive()
    }
}

impl ReadScan {
    pub fn bind(opts: &ScanOptions, read_opts: &ReadOptions) -> Result<Self> {
        if read_opts.dosages {
            return Err(PlinkError::NotImplemented(
                "dosage output is not implemented for the raw reader".into(),
            ));
        }
        if read_opts.phased {
            return Err(PlinkError::NotImplemented(
                "phased output is not implemented for the raw reader".into(),
            ));
        }
        let dataset = Dataset::open(opts, false)?;
        let schema = vec![
            ColumnDef::new("CHROM", ColumnType::Varchar),
            ColumnDef::new("POS", ColumnType::Int32),
            ColumnDef::new("ID", ColumnType::Varchar),
            ColumnDef::new("REF", ColumnType::Varchar),
            ColumnDef::new("ALT", ColumnType::Varchar),
            ColumnDef::new("genotypes", ColumnType::Int32List),
        ];
        Ok(ReadScan { dataset, schema })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

pub struct ReadGlobal {
    claimer: BatchClaimer,
    projection: Projection,
    need_genotypes: bool,
}

pub struct ReadLocal {
    reader: Option<PgenReader>,
    genovec: CachelineVec,
}

impl ScanKernel for ReadScan {
    type Global = ReadGlobal;
    type Local = ReadLocal;

    fn name(&self) -> &'static str {
        "read"
    }

    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn init_global(&self, projection: &Projection) -> Result<ReadGlobal> {
        Ok(ReadGlobal {
            claimer: BatchClaimer::new(self.dataset.range.start, self.dataset.range.end),
            projection: projection.clone(),
            need_genotypes: projection.any_at_or_beyond(COL_GENOTYPES),
        })
    }

    fn init_local(&self, global: &ReadGlobal) -> Result<ReadLocal> {
        if !global.need_genotypes {
            return Ok(ReadLocal {
                reader: None,
                genovec: CachelineVec::new(64),
            });
        }
        let reader = self.dataset.open_reader()?;
        let genovec = reader.alloc_genovec();
        Ok(ReadLocal {
            reader: Some(reader),
            genovec,
        })
    }

    fn max_threads(&self, _global: &ReadGlobal) -> usize {
        default_max_threads(self.dataset.range.len())
    }

    fn scan(
        &self,
        global: &ReadGlobal,
        local: &mut ReadLocal,
        ctx: &ScanContext,
        output: &mut OutputBatch,
    ) -> Result<()> {
        let variants = &self.dataset.variants;
        let sample_ct = self.dataset.effective_sample_ct() as usize;

        while !output.is_full() {
            let claim = BATCH_SIZE.min(output.remaining() as u32);
            let Some((start, end)) = global.claimer.claim(claim, ctx) else {
                break;
            };

            for vidx in start..end {
                let genotypes = match local.reader.as_mut() {
                    Some(reader) => {
                        reader.read_genotypes(vidx, &mut local.genovec)?;
                        Some(
                            (0..sample_ct)
                                .map(|s| match get_nyp(&local.genovec, s) {
                                    code @ (0 | 1 | 2) => Some(code as i32),
                                    _ => None,
                                })
                                .collect::<Vec<_>>(),
                        )
                    }
                    None => None,
                };

                for (out_col, &col_id) in global.projection.column_ids.iter().enumerate() {
                    match col_id {
                        COL_CHROM => output.push_varchar(out_col, Some(variants.chrom(vidx)?)),
                        COL_POS => output.push_int32(out_col, Some(variants.pos(vidx)?)),
                        COL_ID => output.push_varchar(out_col, variants.id(vidx)?),
                        COL_REF => output.push_varchar(out_col, Some(variants.ref_allele(vidx)?)),
                        COL_ALT => output.push_varchar(out_col, variants.alt(vidx)?),
                        COL_GENOTYPES => output.push_int32_list(out_col, genotypes.clone()),
                        _ => output.push_null(out_col),
                    }
                }
                output.finish_row();
            }
        }
        Ok(())
    }
}
