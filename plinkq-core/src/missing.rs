//! Missingness scan kernel: per-variant missing-call rates, or
//! per-sample rates across the variant range.
//!
//! Variant mode parallelizes like the frequency kernel. Sample mode is
//! two-phase and serialized: one worker accumulates per-sample missing
//! counters over the whole range (guarded by a one-shot done flag and
//! a mutex), then rows are emitted per effective sample slot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use plinkq_geno::aligned::{popcount_words, CachelineVec};
use plinkq_geno::{PgenReader, PlinkError, Result};

use crate::bind::{Dataset, ScanOptions};
use crate::scan::{default_max_threads, BatchClaimer, ScanContext};
use crate::table::{ColumnDef, ColumnType, OutputBatch, Projection, ScanKernel};

// Variant-mode columns
pub const VCOL_CHROM: usize = 0;
pub const VCOL_POS: usize = 1;
pub const VCOL_ID: usize = 2;
pub const VCOL_REF: usize = 3;
pub const VCOL_ALT: usize = 4;
pub const VCOL_MISSING_CT: usize = 5;
pub const VCOL_OBS_CT: usize = 6;
pub const VCOL_F_MISS: usize = 7;

// Sample-mode columns
pub const SCOL_FID: usize = 0;
pub const SCOL_IID: usize = 1;
pub const SCOL_MISSING_CT: usize = 2;
pub const SCOL_OBS_CT: usize = 3;
pub const SCOL_F_MISS: usize = 4;

const BATCH_SIZE: u32 = 128;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissingMode {
    Variant,
    Sample,
}

impl MissingMode {
    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "variant" => Ok(MissingMode::Variant),
            "sample" => Ok(MissingMode::Sample),
            other => Err(PlinkError::invalid(format!(
                "mode must be 'variant' or 'sample', got '{}'",
                other
            ))),
        }
    }
}

pub struct MissingScan {
    dataset: Dataset,
    mode: MissingMode,
    schema: Vec<ColumnDef>,
}

impl MissingScan {
    pub fn bind(opts: &ScanOptions, mode: MissingMode) -> Result<Self> {
        let dataset = Dataset::open(opts, mode == MissingMode::Sample)?;
        let schema = match mode {
            MissingMode::Variant => vec![
                ColumnDef::new("CHROM", ColumnType::Varchar),
                ColumnDef::new("POS", ColumnType::Int32),
                ColumnDef::new("ID", ColumnType::Varchar),
                ColumnDef::new("REF", ColumnType::Varchar),
                ColumnDef::new("ALT", ColumnType::Varchar),
                ColumnDef::new("MISSING_CT", ColumnType::Int32),
                ColumnDef::new("OBS_CT", ColumnType::Int32),
                ColumnDef::new("F_MISS", ColumnType::Double),
            ],
            MissingMode::Sample => vec![
                ColumnDef::new("FID", ColumnType::Varchar),
                ColumnDef::new("IID", ColumnType::Varchar),
                ColumnDef::new("MISSING_CT", ColumnType::Int32),
                ColumnDef::new("OBS_CT", ColumnType::Int32),
                ColumnDef::new("F_MISS", ColumnType::Double),
            ],
        };
        Ok(MissingScan {
            dataset,
            mode,
            schema,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

pub struct MissingGlobal {
    variant_claimer: BatchClaimer,
    sample_claimer: BatchClaimer,
    projection: Projection,
    need_missingness: bool,
    /// Sample mode: per-effective-sample missing counters, written by
    /// the single phase-A worker under the mutex.
    sample_missing_counts: Mutex<Vec<u32>>,
    variant_scan_done: AtomicBool,
    total_variant_ct: u32,
}

pub struct MissingLocal {
    reader: Option<PgenReader>,
    missingness: CachelineVec,
}

impl ScanKernel for MissingScan {
    type Global = MissingGlobal;
    type Local = MissingLocal;

    fn name(&self) -> &'static str {
        "missing"
    }

    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn init_global(&self, projection: &Projection) -> Result<MissingGlobal> {
        let need_missingness = match self.mode {
            MissingMode::Variant => projection.any_at_or_beyond(VCOL_MISSING_CT),
            MissingMode::Sample => projection.any_at_or_beyond(SCOL_MISSING_CT),
        };
        let eff = self.dataset.effective_sample_ct();
        let counts = if self.mode == MissingMode::Sample && need_missingness {
            vec![0u32; eff as usize]
        } else {
            Vec::new()
        };
        Ok(MissingGlobal {
            variant_claimer: BatchClaimer::new(self.dataset.range.start, self.dataset.range.end),
            sample_claimer: BatchClaimer::new(0, eff),
            projection: projection.clone(),
            need_missingness,
            sample_missing_counts: Mutex::new(counts),
            variant_scan_done: AtomicBool::new(false),
            total_variant_ct: self.dataset.range.len(),
        })
    }

    fn init_local(&self, global: &MissingGlobal) -> Result<MissingLocal> {
        if !global.need_missingness {
            return Ok(MissingLocal {
                reader: None,
                missingness: CachelineVec::new(64),
            });
        }
        let reader = self.dataset.open_reader()?;
        let missingness = reader.alloc_missingness();
        Ok(MissingLocal {
            reader: Some(reader),
            missingness,
        })
    }

    fn max_threads(&self, _global: &MissingGlobal) -> usize {
        match self.mode {
            MissingMode::Variant => default_max_threads(self.dataset.range.len()),
            MissingMode::Sample => 1,
        }
    }

    fn scan(
        &self,
        global: &MissingGlobal,
        local: &mut MissingLocal,
        ctx: &ScanContext,
        output: &mut OutputBatch,
    ) -> Result<()> {
        match self.mode {
            MissingMode::Variant => self.scan_variant(global, local, ctx, output),
            MissingMode::Sample => self.scan_sample(global, local, ctx, output),
        }
    }
}

impl MissingScan {
    fn scan_variant(
        &self,
        global: &MissingGlobal,
        local: &mut MissingLocal,
        ctx: &ScanContext,
        output: &mut OutputBatch,
    ) -> Result<()> {
        let cols = &self.dataset.columns;
        let sample_ct = self.dataset.effective_sample_ct();

        while !output.is_full() {
            let claim = BATCH_SIZE.min(output.remaining() as u32);
            let Some((start, end)) = global.variant_claimer.claim(claim, ctx) else {
                break;
            };

            for vidx in start..end {
                let mut missing_ct = 0u32;
                if let Some(reader) = local.reader.as_mut() {
                    reader.read_missingness(vidx, &mut local.missingness)?;
                    missing_ct = popcount_words(&local.missingness) as u32;
                }
                let obs_ct = sample_ct - missing_ct;
                let f_miss = if sample_ct > 0 {
                    missing_ct as f64 / sample_ct as f64
                } else {
                    0.0
                };

                for (out_col, &col_id) in global.projection.column_ids.iter().enumerate() {
                    match col_id {
                        VCOL_CHROM => output.push_varchar(out_col, Some(cols.chrom(vidx))),
                        VCOL_POS => output.push_int32(out_col, Some(cols.pos(vidx))),
                        VCOL_ID => output.push_varchar(out_col, cols.id(vidx)),
                        VCOL_REF => output.push_varchar(out_col, Some(cols.ref_allele(vidx))),
                        VCOL_ALT => output.push_varchar(out_col, cols.alt(vidx)),
                        VCOL_MISSING_CT => output.push_int32(out_col, Some(missing_ct as i32)),
                        VCOL_OBS_CT => output.push_int32(out_col, Some(obs_ct as i32)),
                        VCOL_F_MISS => output.push_double(out_col, Some(f_miss)),
                        _ => output.push_null(out_col),
                    }
                }
                output.finish_row();
            }
        }
        Ok(())
    }

    fn scan_sample(
        &self,
        global: &MissingGlobal,
        local: &mut MissingLocal,
        ctx: &ScanContext,
        output: &mut OutputBatch,
    ) -> Result<()> {
        let samples = self.dataset.samples.as_deref().ok_or_else(|| {
            PlinkError::invalid("sample-mode missingness requires a .psam/.fam file")
        })?;

        // Phase A: one worker accumulates per-sample counters over the
        // whole variant range.
        if global.need_missingness && !global.variant_scan_done.load(Ordering::Acquire) {
            let mut counts = global.sample_missing_counts.lock().unwrap();
            if !global.variant_scan_done.load(Ordering::Relaxed) {
                if let Some(reader) = local.reader.as_mut() {
                    for vidx in self.dataset.range.start..self.dataset.range.end {
                        reader.read_missingness(vidx, &mut local.missingness)?;
                        for (w, &word) in local.missingness.iter().enumerate() {
                            let mut word = word;
                            while word != 0 {
                                let sidx = w * 64 + word.trailing_zeros() as usize;
                                if sidx < counts.len() {
                                    counts[sidx] += 1;
                                }
                                word &= word - 1;
                            }
                        }
                    }
                }
                global.variant_scan_done.store(true, Ordering::Release);
                tracing::debug!("sample-missingness accumulation pass complete");
            }
        }

        // Phase B: emit one row per effective sample slot.
        let counts = global.sample_missing_counts.lock().unwrap();
        let total = global.total_variant_ct;

        while !output.is_full() {
            let Some((slot, _)) = global.sample_claimer.claim(1, ctx) else {
                break;
            };
            let missing_ct = counts.get(slot as usize).copied().unwrap_or(0);
            let obs_ct = total - missing_ct;
            let f_miss = if total > 0 {
                missing_ct as f64 / total as f64
            } else {
                0.0
            };
            let orig_idx = self.dataset.original_sample_idx(slot);

            for (out_col, &col_id) in global.projection.column_ids.iter().enumerate() {
                match col_id {
                    SCOL_FID => output.push_varchar(out_col, samples.fid(orig_idx)),
                    SCOL_IID => output.push_varchar(out_col, Some(samples.iid(orig_idx))),
                    SCOL_MISSING_CT => output.push_int32(out_col, Some(missing_ct as i32)),
                    SCOL_OBS_CT => output.push_int32(out_col, Some(obs_ct as i32)),
                    SCOL_F_MISS => output.push_double(out_col, Some(f_miss)),
                    _ => output.push_null(out_col),
                }
            }
            output.finish_row();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_parse() {
        assert_eq!(MissingMode::parse("variant").unwrap(), MissingMode::Variant);
        assert_eq!(MissingMode::parse("sample").unwrap(), MissingMode::Sample);
        assert!(MissingMode::parse("rows").is_err());
    }
}
