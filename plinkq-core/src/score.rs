//! Polygenic score scan kernel.
//!
//! Two-phase: a single scoring pass over the scored-variant list
//! accumulates per-sample sums (serialized behind a one-shot done flag
//! and mutex), then rows are emitted per effective sample slot.
//!
//! Missing-data handling is selected at bind: mean imputation
//! (default), dropping missing calls from the denominator
//! (`no_mean_imputation`), or variance standardization (`center`).

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use plinkq_geno::pgen::reader::DOSAGE_MISSING;
use plinkq_geno::pgen::DosageBuf;
use plinkq_geno::{PgenReader, PlinkError, Result, VariantColumns, VariantRange};

use crate::bind::{Dataset, ScanOptions};
use crate::scan::{BatchClaimer, ScanContext};
use crate::table::{ColumnDef, ColumnType, OutputBatch, Projection, ScanKernel};

pub const COL_FID: usize = 0;
pub const COL_IID: usize = 1;
pub const COL_ALLELE_CT: usize = 2;
pub const COL_DENOM: usize = 3;
pub const COL_NAMED_ALLELE_DOSAGE_SUM: usize = 4;
pub const COL_SCORE_SUM: usize = 5;
pub const COL_SCORE_AVG: usize = 6;

/// One entry of an ID-keyed weight list.
#[derive(Debug, Clone)]
pub struct WeightEntry {
    pub id: String,
    /// The scored allele; matched against ALT (scored as-is) or REF
    /// (dosage flipped). Anything else drops the entry.
    pub allele: String,
    pub weight: f64,
}

/// The two accepted weight shapes.
#[derive(Debug, Clone)]
pub enum ScoreWeights {
    /// One weight per variant of the scanned range, in range order.
    Positional(Vec<f64>),
    /// Weights keyed by variant ID and scored allele.
    ById(Vec<WeightEntry>),
}

#[derive(Debug, Clone)]
pub struct ScoreOptions {
    pub weights: ScoreWeights,
    pub center: bool,
    pub no_mean_imputation: bool,
}

#[derive(Debug, Clone, Copy)]
struct ScoredVariant {
    vidx: u32,
    weight: f64,
    /// True when the scored allele is REF: dosage = 2 - alt_dosage.
    flip: bool,
}

/// Resolve the weight parameter to a vidx-sorted scored-variant list.
/// Zero weights are dropped; ID-keyed entries with unknown IDs or
/// mismatched alleles are dropped silently.
fn resolve_weights(
    columns: &VariantColumns,
    range: VariantRange,
    weights: &ScoreWeights,
) -> Result<Vec<ScoredVariant>> {
    let mut scored = Vec::new();
    match weights {
        ScoreWeights::Positional(list) => {
            if list.is_empty() {
                return Err(PlinkError::invalid("weights list is empty"));
            }
            if list.len() as u32 != range.len() {
                return Err(PlinkError::invalid(format!(
                    "weights list length ({}) must match variant count ({})",
                    list.len(),
                    range.len()
                )));
            }
            for (i, &weight) in list.iter().enumerate() {
                if weight != 0.0 {
                    scored.push(ScoredVariant {
                        vidx: range.start + i as u32,
                        weight,
                        flip: false,
                    });
                }
            }
        }
        ScoreWeights::ById(entries) => {
            if entries.is_empty() {
                return Err(PlinkError::invalid("weights list is empty"));
            }
            let mut id_map = std::collections::HashMap::new();
            for vidx in range.start..range.end {
                if let Some(id) = columns.id(vidx) {
                    id_map.insert(id, vidx);
                }
            }
            let mut unmatched_ids = 0u32;
            let mut unmatched_alleles = 0u32;
            for entry in entries {
                let Some(&vidx) = id_map.get(entry.id.as_str()) else {
                    unmatched_ids += 1;
                    continue;
                };
                let flip = if Some(entry.allele.as_str()) == columns.alt(vidx) {
                    false
                } else if entry.allele == columns.ref_allele(vidx) {
                    true
                } else {
                    unmatched_alleles += 1;
                    continue;
                };
                if entry.weight != 0.0 {
                    scored.push(ScoredVariant {
                        vidx,
                        weight: entry.weight,
                        flip,
                    });
                }
            }
            if unmatched_ids > 0 || unmatched_alleles > 0 {
                tracing::debug!(
                    unmatched_ids,
                    unmatched_alleles,
                    "dropped weight entries during resolution"
                );
            }
            // Sequential file access during the scoring pass
            scored.sort_by_key(|sv| sv.vidx);
        }
    }
    Ok(scored)
}

pub struct ScoreScan {
    dataset: Dataset,
    scored: Vec<ScoredVariant>,
    center: bool,
    no_mean_imputation: bool,
    schema: Vec<ColumnDef>,
}

impl std::fmt::Debug for ScoreScan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScoreScan").finish_non_exhaustive()
    }
}

impl ScoreScan {
    pub fn bind(opts: &ScanOptions, score_opts: &ScoreOptions) -> Result<Self> {
        if score_opts.center && score_opts.no_mean_imputation {
            return Err(PlinkError::invalid(
                "center and no_mean_imputation cannot both be true",
            ));
        }
        let dataset = Dataset::open(opts, true)?;
        let scored = resolve_weights(&dataset.columns, dataset.range, &score_opts.weights)?;
        tracing::info!(scored = scored.len(), "resolved scoring weights");

        let schema = vec![
            ColumnDef::new("FID", ColumnType::Varchar),
            ColumnDef::new("IID", ColumnType::Varchar),
            ColumnDef::new("ALLELE_CT", ColumnType::Int32),
            ColumnDef::new("DENOM", ColumnType::Int32),
            ColumnDef::new("NAMED_ALLELE_DOSAGE_SUM", ColumnType::Double),
            ColumnDef::new("SCORE_SUM", ColumnType::Double),
            ColumnDef::new("SCORE_AVG", ColumnType::Double),
        ];
        Ok(ScoreScan {
            dataset,
            scored,
            center: score_opts.center,
            no_mean_imputation: score_opts.no_mean_imputation,
            schema,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    /// The scoring pass: one thread, every scored variant, writing the
    /// shared per-sample accumulators.
    fn perform_scoring(
        &self,
        reader: &mut PgenReader,
        buf: &mut DosageBuf,
        accums: &mut ScoreAccums,
    ) -> Result<()> {
        let sample_ct = self.dataset.effective_sample_ct() as usize;

        for sv in &self.scored {
            reader.read_dosages(sv.vidx, buf)?;
            let dosages = &buf.doubles;

            let mut sum_alt = 0.0f64;
            let mut non_missing_ct = 0u32;
            for &d in &dosages[..sample_ct] {
                if d != DOSAGE_MISSING {
                    sum_alt += d;
                    non_missing_ct += 1;
                }
            }
            if non_missing_ct == 0 {
                continue;
            }

            if self.center {
                let mean_alt = sum_alt / non_missing_ct as f64;
                let freq = mean_alt / 2.0;
                let sd = (2.0 * freq * (1.0 - freq)).sqrt();
                if sd == 0.0 {
                    continue;
                }
                let mean_scored = if sv.flip { 2.0 - mean_alt } else { mean_alt };
                for (s, &d) in dosages[..sample_ct].iter().enumerate() {
                    if d == DOSAGE_MISSING {
                        continue;
                    }
                    let scored = if sv.flip { 2.0 - d } else { d };
                    let standardized = (scored - mean_scored) / sd;
                    accums.score_sums[s] += sv.weight * standardized;
                    accums.allele_cts[s] += 2;
                }
            } else if self.no_mean_imputation {
                for (s, &d) in dosages[..sample_ct].iter().enumerate() {
                    if d == DOSAGE_MISSING {
                        continue;
                    }
                    let scored = if sv.flip { 2.0 - d } else { d };
                    accums.score_sums[s] += sv.weight * scored;
                    accums.named_sums[s] += scored;
                    accums.allele_cts[s] += 2;
                }
            } else {
                let mean_alt = sum_alt / non_missing_ct as f64;
                for (s, &d) in dosages[..sample_ct].iter().enumerate() {
                    let alt = if d == DOSAGE_MISSING { mean_alt } else { d };
                    let scored = if sv.flip { 2.0 - alt } else { alt };
                    accums.score_sums[s] += sv.weight * scored;
                    accums.named_sums[s] += scored;
                    accums.allele_cts[s] += 2;
                }
            }
        }
        Ok(())
    }
}

pub struct ScoreAccums {
    score_sums: Vec<f64>,
    named_sums: Vec<f64>,
    allele_cts: Vec<u32>,
}

pub struct ScoreGlobal {
    accums: Mutex<ScoreAccums>,
    scoring_done: AtomicBool,
    sample_claimer: BatchClaimer,
    projection: Projection,
    need_scores: bool,
}

pub struct ScoreLocal {
    reader: Option<PgenReader>,
    dosage_buf: Option<DosageBuf>,
}

impl ScanKernel for ScoreScan {
    type Global = ScoreGlobal;
    type Local = ScoreLocal;

    fn name(&self) -> &'static str {
        "score"
    }

    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn init_global(&self, projection: &Projection) -> Result<ScoreGlobal> {
        let eff = self.dataset.effective_sample_ct() as usize;
        Ok(ScoreGlobal {
            accums: Mutex::new(ScoreAccums {
                score_sums: vec![0.0; eff],
                named_sums: vec![0.0; eff],
                allele_cts: vec![0; eff],
            }),
            scoring_done: AtomicBool::new(false),
            sample_claimer: BatchClaimer::new(0, self.dataset.effective_sample_ct()),
            projection: projection.clone(),
            need_scores: projection.any_at_or_beyond(COL_ALLELE_CT),
        })
    }

    fn init_local(&self, global: &ScoreGlobal) -> Result<ScoreLocal> {
        if !global.need_scores || self.scored.is_empty() {
            return Ok(ScoreLocal {
                reader: None,
                dosage_buf: None,
            });
        }
        let reader = self.dataset.open_reader()?;
        let dosage_buf = DosageBuf::new(&reader);
        Ok(ScoreLocal {
            reader: Some(reader),
            dosage_buf: Some(dosage_buf),
        })
    }

    fn max_threads(&self, _global: &ScoreGlobal) -> usize {
        1
    }

    fn scan(
        &self,
        global: &ScoreGlobal,
        local: &mut ScoreLocal,
        ctx: &ScanContext,
        output: &mut OutputBatch,
    ) -> Result<()> {
        let samples = self
            .dataset
            .samples
            .as_deref()
            .ok_or_else(|| PlinkError::invalid("scoring requires a .psam/.fam file"))?;

        // Phase A: score once.
        if !global.scoring_done.load(Ordering::Acquire) {
            let mut accums = global.accums.lock().unwrap();
            if !global.scoring_done.load(Ordering::Relaxed) {
                if let (Some(reader), Some(buf)) =
                    (local.reader.as_mut(), local.dosage_buf.as_mut())
                {
                    self.perform_scoring(reader, buf, &mut accums)?;
                }
                global.scoring_done.store(true, Ordering::Release);
                tracing::debug!("scoring pass complete");
            }
        }

        // Phase B: one row per effective sample slot.
        let accums = global.accums.lock().unwrap();
        while !output.is_full() {
            let Some((slot, _)) = global.sample_claimer.claim(1, ctx) else {
                break;
            };
            let s = slot as usize;
            let allele_ct = accums.allele_cts[s];
            let score_sum = accums.score_sums[s];
            let named_sum = accums.named_sums[s];
            let score_avg = if allele_ct > 0 {
                score_sum / allele_ct as f64
            } else {
                0.0
            };
            let orig_idx = self.dataset.original_sample_idx(slot);

            for (out_col, &col_id) in global.projection.column_ids.iter().enumerate() {
                match col_id {
                    COL_FID => output.push_varchar(out_col, samples.fid(orig_idx)),
                    COL_IID => output.push_varchar(out_col, Some(samples.iid(orig_idx))),
                    COL_ALLELE_CT | COL_DENOM => {
                        output.push_int32(out_col, Some(allele_ct as i32))
                    }
                    COL_NAMED_ALLELE_DOSAGE_SUM => output.push_double(out_col, Some(named_sum)),
                    COL_SCORE_SUM => output.push_double(out_col, Some(score_sum)),
                    COL_SCORE_AVG => output.push_double(out_col, Some(score_avg)),
                    _ => output.push_null(out_col),
                }
            }
            output.finish_row();
        }
        Ok(())
    }
}
