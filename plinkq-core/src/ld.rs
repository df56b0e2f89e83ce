//! Linkage-disequilibrium scan kernel: a single resolved pair, or a
//! windowed sweep of every anchor against its downstream partners.
//!
//! The windowed sweep must respect the fixed output-batch capacity
//! without re-reading anchors, so each worker carries a resumable
//! cursor (anchor index, next partner, cached anchor genovec) across
//! scan calls.
//!
//! D' uses the composite genotype-level estimator (Weir 1979):
//! `D = cov(gA, gB) / 4`, divided by the sign-dependent `D_max`. With
//! genotype-level rather than haplotype-level statistics, D' can
//! exceed 1 when samples deviate from Hardy-Weinberg equilibrium.

use std::sync::atomic::{AtomicBool, Ordering};

use plinkq_geno::aligned::CachelineVec;
use plinkq_geno::{PgenReader, PlinkError, Result};

use crate::bind::{Dataset, ScanOptions};
use crate::scan::{BatchClaimer, ScanContext};
use crate::table::{ColumnDef, ColumnType, OutputBatch, Projection, ScanKernel};

pub const COL_CHROM_A: usize = 0;
pub const COL_POS_A: usize = 1;
pub const COL_ID_A: usize = 2;
pub const COL_CHROM_B: usize = 3;
pub const COL_POS_B: usize = 4;
pub const COL_ID_B: usize = 5;
pub const COL_R2: usize = 6;
pub const COL_D_PRIME: usize = 7;
pub const COL_OBS_CT: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LdStats {
    pub r2: f64,
    pub d_prime: f64,
    pub obs_ct: u32,
    pub is_valid: bool,
}

/// LD statistics from two packed genovecs over the same samples.
/// Samples missing in either variant are excluded pairwise.
pub fn ld_stats(genovec_a: &[u64], genovec_b: &[u64], sample_ct: u32) -> LdStats {
    let mut sum_a = 0.0f64;
    let mut sum_b = 0.0f64;
    let mut sum_ab = 0.0f64;
    let mut sum_a2 = 0.0f64;
    let mut sum_b2 = 0.0f64;
    let mut n = 0u32;

    let mut remaining = sample_ct as usize;
    for (&word_a, &word_b) in genovec_a.iter().zip(genovec_b) {
        if remaining == 0 {
            break;
        }
        let in_word = remaining.min(32);
        let mut wa = word_a;
        let mut wb = word_b;
        for _ in 0..in_word {
            let ga = wa & 3;
            let gb = wb & 3;
            wa >>= 2;
            wb >>= 2;
            if ga == 3 || gb == 3 {
                continue;
            }
            let ga = ga as f64;
            let gb = gb as f64;
            sum_a += ga;
            sum_b += gb;
            sum_ab += ga * gb;
            sum_a2 += ga * ga;
            sum_b2 += gb * gb;
            n += 1;
        }
        remaining -= in_word;
    }

    let mut stats = LdStats {
        r2: 0.0,
        d_prime: 0.0,
        obs_ct: n,
        is_valid: false,
    };
    if n < 2 {
        return stats;
    }

    let dn = n as f64;
    let mean_a = sum_a / dn;
    let mean_b = sum_b / dn;
    let cov = sum_ab / dn - mean_a * mean_b;
    let var_a = sum_a2 / dn - mean_a * mean_a;
    let var_b = sum_b2 / dn - mean_b * mean_b;

    // Monomorphic in either variant: correlation undefined
    if var_a < 1e-15 || var_b < 1e-15 {
        return stats;
    }

    stats.is_valid = true;
    stats.r2 = cov * cov / (var_a * var_b);

    let d = cov / 4.0;
    let p_a = sum_a / (2.0 * dn);
    let p_b = sum_b / (2.0 * dn);
    let d_max = if d >= 0.0 {
        (p_a * (1.0 - p_b)).min((1.0 - p_a) * p_b)
    } else {
        (-p_a * p_b).max(-(1.0 - p_a) * (1.0 - p_b))
    };
    stats.d_prime = if d_max.abs() < 1e-15 { 0.0 } else { d / d_max };
    stats
}

enum LdMode {
    Pairwise { vidx_a: u32, vidx_b: u32 },
    Windowed,
}

#[derive(Debug, Clone)]
pub struct LdOptions {
    pub variant1: Option<String>,
    pub variant2: Option<String>,
    pub window_kb: i64,
    pub r2_threshold: f64,
    pub inter_chr: bool,
}

impl Default for LdOptions {
    fn default() -> Self {
        LdOptions {
            variant1: None,
            variant2: None,
            window_kb: 1000,
            r2_threshold: 0.2,
            inter_chr: false,
        }
    }
}

pub struct LdScan {
    dataset: Dataset,
    mode: LdMode,
    window_bp: i64,
    r2_threshold: f64,
    inter_chr: bool,
    schema: Vec<ColumnDef>,
}

impl LdScan {
    pub fn bind(opts: &ScanOptions, ld_opts: &LdOptions) -> Result<Self> {
        if ld_opts.window_kb < 0 {
            return Err(PlinkError::invalid("window_kb must be non-negative"));
        }
        if !(0.0..=1.0).contains(&ld_opts.r2_threshold) {
            return Err(PlinkError::invalid(
                "r2_threshold must be between 0.0 and 1.0",
            ));
        }

        let dataset = Dataset::open(opts, false)?;

        let mode = match (&ld_opts.variant1, &ld_opts.variant2) {
            (Some(id_a), Some(id_b)) => {
                let vidx_a = dataset.variants.find_by_id(id_a)?.ok_or_else(|| {
                    PlinkError::invalid(format!("variant '{}' not found in .pvar", id_a))
                })?;
                let vidx_b = dataset.variants.find_by_id(id_b)?.ok_or_else(|| {
                    PlinkError::invalid(format!("variant '{}' not found in .pvar", id_b))
                })?;
                LdMode::Pairwise { vidx_a, vidx_b }
            }
            (None, None) => LdMode::Windowed,
            _ => {
                return Err(PlinkError::invalid(
                    "both variant1 and variant2 must be specified for pairwise mode",
                ))
            }
        };

        let schema = vec![
            ColumnDef::new("CHROM_A", ColumnType::Varchar),
            ColumnDef::new("POS_A", ColumnType::Int32),
            ColumnDef::new("ID_A", ColumnType::Varchar),
            ColumnDef::new("CHROM_B", ColumnType::Varchar),
            ColumnDef::new("POS_B", ColumnType::Int32),
            ColumnDef::new("ID_B", ColumnType::Varchar),
            ColumnDef::new("R2", ColumnType::Double),
            ColumnDef::new("D_PRIME", ColumnType::Double),
            ColumnDef::new("OBS_CT", ColumnType::Int32),
        ];

        Ok(LdScan {
            dataset,
            mode,
            window_bp: ld_opts.window_kb * 1000,
            r2_threshold: ld_opts.r2_threshold,
            inter_chr: ld_opts.inter_chr,
            schema,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }

    fn emit_row(
        &self,
        projection: &Projection,
        output: &mut OutputBatch,
        vidx_a: u32,
        vidx_b: u32,
        stats: &LdStats,
    ) -> Result<()> {
        let variants = &self.dataset.variants;
        for (out_col, &col_id) in projection.column_ids.iter().enumerate() {
            match col_id {
                COL_CHROM_A => output.push_varchar(out_col, Some(variants.chrom(vidx_a)?)),
                COL_POS_A => output.push_int32(out_col, Some(variants.pos(vidx_a)?)),
                COL_ID_A => output.push_varchar(out_col, variants.id(vidx_a)?),
                COL_CHROM_B => output.push_varchar(out_col, Some(variants.chrom(vidx_b)?)),
                COL_POS_B => output.push_int32(out_col, Some(variants.pos(vidx_b)?)),
                COL_ID_B => output.push_varchar(out_col, variants.id(vidx_b)?),
                COL_R2 => {
                    output.push_double(out_col, stats.is_valid.then_some(stats.r2));
                }
                COL_D_PRIME => {
                    output.push_double(out_col, stats.is_valid.then_some(stats.d_prime));
                }
                COL_OBS_CT => output.push_int32(out_col, Some(stats.obs_ct as i32)),
                _ => output.push_null(out_col),
            }
        }
        output.finish_row();
        Ok(())
    }
}

pub struct LdGlobal {
    anchor_claimer: BatchClaimer,
    pair_emitted: AtomicBool,
    projection: Projection,
}

pub struct LdLocal {
    reader: PgenReader,
    genovec_a: CachelineVec,
    genovec_b: CachelineVec,
    /// Windowed-mode cursor, preserved across scan calls.
    in_window: bool,
    anchor_idx: u32,
    next_partner: u32,
    anchor_chrom: String,
    anchor_pos: i32,
}

impl ScanKernel for LdScan {
    type Global = LdGlobal;
    type Local = LdLocal;

    fn name(&self) -> &'static str {
        "ld"
    }

    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn init_global(&self, projection: &Projection) -> Result<LdGlobal> {
        Ok(LdGlobal {
            anchor_claimer: BatchClaimer::new(self.dataset.range.start, self.dataset.range.end),
            pair_emitted: AtomicBool::new(false),
            projection: projection.clone(),
        })
    }

    fn init_local(&self, _global: &LdGlobal) -> Result<LdLocal> {
        let reader = self.dataset.open_reader()?;
        let genovec_a = reader.alloc_genovec();
        let genovec_b = reader.alloc_genovec();
        Ok(LdLocal {
            reader,
            genovec_a,
            genovec_b,
            in_window: false,
            anchor_idx: 0,
            next_partner: 0,
            anchor_chrom: String::new(),
            anchor_pos: 0,
        })
    }

    fn max_threads(&self, _global: &LdGlobal) -> usize {
        match self.mode {
            LdMode::Pairwise { .. } => 1,
            LdMode::Windowed => ((self.dataset.range.len() / 50) as usize + 1).min(16),
        }
    }

    fn scan(
        &self,
        global: &LdGlobal,
        local: &mut LdLocal,
        ctx: &ScanContext,
        output: &mut OutputBatch,
    ) -> Result<()> {
        let sample_ct = self.dataset.effective_sample_ct();

        if let LdMode::Pairwise { vidx_a, vidx_b } = self.mode {
            if global.pair_emitted.swap(true, Ordering::AcqRel) {
                return Ok(());
            }
            local.reader.read_genotypes(vidx_a, &mut local.genovec_a)?;
            let stats = if vidx_a == vidx_b {
                ld_stats(&local.genovec_a, &local.genovec_a, sample_ct)
            } else {
                local.reader.read_genotypes(vidx_b, &mut local.genovec_b)?;
                ld_stats(&local.genovec_a, &local.genovec_b, sample_ct)
            };
            return self.emit_row(&global.projection, output, vidx_a, vidx_b, &stats);
        }

        // Windowed sweep
        let end_idx = global.anchor_claimer.end();
        let variants = &self.dataset.variants;

        while !output.is_full() {
            if local.in_window {
                let anchor = local.anchor_idx;
                let mut j = local.next_partner;

                while j < end_idx {
                    let same_chrom = variants.chrom(j)? == local.anchor_chrom;
                    if same_chrom {
                        let dist = variants.pos(j)? as i64 - local.anchor_pos as i64;
                        if dist > self.window_bp {
                            if !self.inter_chr {
                                break;
                            }
                            // Skip the rest of the anchor's chromosome,
                            // then keep scanning cross-chromosome pairs.
                            while j < end_idx && variants.chrom(j)? == local.anchor_chrom {
                                j += 1;
                            }
                            continue;
                        }
                    } else if !self.inter_chr {
                        break;
                    }

                    local.reader.read_genotypes(j, &mut local.genovec_b)?;
                    let stats = ld_stats(&local.genovec_a, &local.genovec_b, sample_ct);
                    if stats.is_valid && stats.r2 >= self.r2_threshold {
                        self.emit_row(&global.projection, output, anchor, j, &stats)?;
                        if output.is_full() {
                            // Batch handed back mid-window; the cached
                            // anchor genovec survives in local state.
                            local.next_partner = j + 1;
                            return Ok(());
                        }
                    }
                    j += 1;
                }

                local.in_window = false;
            }

            let Some((anchor, _)) = global.anchor_claimer.claim(1, ctx) else {
                break;
            };
            local.reader.read_genotypes(anchor, &mut local.genovec_a)?;
            local.anchor_idx = anchor;
            local.next_partner = anchor + 1;
            local.anchor_chrom = variants.chrom(anchor)?.to_string();
            local.anchor_pos = variants.pos(anchor)?;
            local.in_window = true;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plinkq_geno::aligned::set_nyp;

    fn pack(genos: &[u8]) -> Vec<u64> {
        let mut words = vec![0u64; 8];
        for (i, &g) in genos.iter().enumerate() {
            set_nyp(&mut words, i, g);
        }
        words
    }

    #[test]
    fn test_self_ld_is_one() {
        let g = pack(&[0, 1, 2, 0, 1]);
        let stats = ld_stats(&g, &g, 5);
        assert!(stats.is_valid);
        assert!((stats.r2 - 1.0).abs() < 1e-12);
        assert_eq!(stats.obs_ct, 5);
    }

    #[test]
    fn test_monomorphic_invalid() {
        let a = pack(&[1, 1, 1, 1]);
        let b = pack(&[0, 1, 2, 0]);
        let stats = ld_stats(&a, &b, 4);
        assert!(!stats.is_valid);
        assert_eq!(stats.obs_ct, 4);
    }

    #[test]
    fn test_too_few_shared_observations() {
        let a = pack(&[0, 3, 3, 3]);
        let b = pack(&[1, 0, 2, 1]);
        let stats = ld_stats(&a, &b, 4);
        assert!(!stats.is_valid);
        assert_eq!(stats.obs_ct, 1);
    }

    #[test]
    fn test_pairwise_missing_exclusion() {
        // a = [0,1,2,.], b = [1,1,0,2]: only the first three samples
        // are shared, giving r2 = 0.75 and D' = 0.5
        let a = pack(&[0, 1, 2, 3]);
        let b = pack(&[1, 1, 0, 2]);
        let stats = ld_stats(&a, &b, 4);
        assert!(stats.is_valid);
        assert_eq!(stats.obs_ct, 3);
        assert!((stats.r2 - 0.75).abs() < 1e-12, "r2 = {}", stats.r2);
        assert!((stats.d_prime - 0.5).abs() < 1e-12, "d' = {}", stats.d_prime);
    }

    #[test]
    fn test_perfect_negative_association() {
        let a = pack(&[0, 0, 2, 2, 0, 2]);
        let b = pack(&[2, 2, 0, 0, 2, 0]);
        let stats = ld_stats(&a, &b, 6);
        assert!(stats.is_valid);
        assert!((stats.r2 - 1.0).abs() < 1e-12);
    }
}
