//! Hardy-Weinberg equilibrium exact test scan kernel.
//!
//! The exact test enumerates every heterozygote count consistent with
//! the observed allele counts, computing relative probabilities with
//! the Wigginton et al. (2005) recurrence outward from the
//! distribution's mode, then sums the probabilities of configurations
//! no more likely than the observed one.

use plinkq_geno::Result;

use crate::bind::{Dataset, ScanOptions};
use crate::scan::{default_max_threads, BatchClaimer, ScanContext};
use crate::table::{ColumnDef, ColumnType, OutputBatch, Projection, ScanKernel};

pub const COL_CHROM: usize = 0;
pub const COL_POS: usize = 1;
pub const COL_ID: usize = 2;
pub const COL_REF: usize = 3;
pub const COL_ALT: usize = 4;
pub const COL_A1: usize = 5;
pub const COL_HOM_REF_CT: usize = 6;
pub const COL_HET_CT: usize = 7;
pub const COL_HOM_ALT_CT: usize = 8;
pub const COL_O_HET: usize = 9;
pub const COL_E_HET: usize = 10;
pub const COL_P_HWE: usize = 11;

const BATCH_SIZE: u32 = 128;

/// Exact HWE test p-value for observed genotype counts. `midp` applies
/// the mid-p correction (subtracting half the observed configuration's
/// probability). All-missing input returns 1.0 by convention.
pub fn hwe_exact_test(hom1: u32, hets: u32, hom2: u32, midp: bool) -> f64 {
    if hom1 + hets + hom2 == 0 {
        return 1.0;
    }

    let hom_rare = hom1.min(hom2) as i64;
    let hom_common = hom1.max(hom2) as i64;
    let hets = hets as i64;
    let rare_copies = 2 * hom_rare + hets;
    let common_copies = 2 * hom_common + hets;
    let n = hom_rare + hom_common + hets;

    // Mode of the het-count distribution, adjusted to share parity with
    // the rare allele count.
    let mut mid = (rare_copies as f64 * common_copies as f64 / (2.0 * n as f64)) as i64;
    if mid % 2 != rare_copies % 2 {
        mid += 1;
    }

    let mut het_probs = vec![0.0f64; rare_copies as usize + 1];
    het_probs[mid as usize] = 1.0;
    let mut sum = 1.0f64;

    // Upward: P(k+2)/P(k) = 4*homr*homc / ((k+1)(k+2))
    let mut cur_hets = mid;
    let mut cur_homr = (rare_copies - mid) / 2;
    let mut cur_homc = (common_copies - mid) / 2;
    while cur_hets <= rare_copies - 2 {
        het_probs[cur_hets as usize + 2] = het_probs[cur_hets as usize]
            * 4.0
            * cur_homr as f64
            * cur_homc as f64
            / ((cur_hets as f64 + 1.0) * (cur_hets as f64 + 2.0));
        sum += het_probs[cur_hets as usize + 2];
        cur_homr -= 1;
        cur_homc -= 1;
        cur_hets += 2;
    }

    // Downward: P(k-2)/P(k) = k(k-1) / (4*(homr+1)(homc+1))
    cur_hets = mid;
    cur_homr = (rare_copies - mid) / 2;
    cur_homc = (common_copies - mid) / 2;
    while cur_hets >= 2 {
        het_probs[cur_hets as usize - 2] = het_probs[cur_hets as usize]
            * cur_hets as f64
            * (cur_hets as f64 - 1.0)
            / (4.0 * (cur_homr as f64 + 1.0) * (cur_homc as f64 + 1.0));
        sum += het_probs[cur_hets as usize - 2];
        cur_homr += 1;
        cur_homc += 1;
        cur_hets -= 2;
    }

    let obs_prob = het_probs[hets as usize] / sum;
    // Small relative tolerance so ties with the observed configuration
    // are counted despite floating-point noise.
    let threshold = obs_prob * (1.0 + 1e-8);

    let mut p_value = 0.0;
    for p in het_probs.iter() {
        // Off-parity entries are zero and never populated; they
        // contribute nothing.
        let scaled = p / sum;
        if *p > 0.0 && scaled <= threshold {
            p_value += scaled;
        }
    }

    if midp {
        p_value -= 0.5 * obs_prob;
    }

    p_value.clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Default)]
pub struct HardyOptions {
    pub midp: bool,
}

pub struct HardyScan {
    dataset: Dataset,
    midp: bool,
    schema: Vec<ColumnDef>,
}

impl HardyScan {
    pub fn bind(opts: &ScanOptions, hardy_opts: &HardyOptions) -> Result<Self> {
        let dataset = Dataset::open(opts, false)?;
        let schema = vec![
            ColumnDef::new("CHROM", ColumnType::Varchar),
            ColumnDef::new("POS", ColumnType::Int32),
            ColumnDef::new("ID", ColumnType::Varchar),
            ColumnDef::new("REF", ColumnType::Varchar),
            ColumnDef::new("ALT", ColumnType::Varchar),
            ColumnDef::new("A1", ColumnType::Varchar),
            ColumnDef::new("HOM_REF_CT", ColumnType::Int32),
            ColumnDef::new("HET_CT", ColumnType::Int32),
            ColumnDef::new("HOM_ALT_CT", ColumnType::Int32),
            ColumnDef::new("O_HET", ColumnType::Double),
            ColumnDef::new("E_HET", ColumnType::Double),
            ColumnDef::new("P_HWE", ColumnType::Double),
        ];
        Ok(HardyScan {
            dataset,
            midp: hardy_opts.midp,
            schema,
        })
    }

    pub fn dataset(&self) -> &Dataset {
        &self.dataset
    }
}

pub struct HardyGlobal {
    claimer: BatchClaimer,
    projection: Projection,
    need_counts: bool,
}

pub struct HardyLocal {
    reader: Option<plinkq_geno::PgenReader>,
}

impl ScanKernel for HardyScan {
    type Global = HardyGlobal;
    type Local = HardyLocal;

    fn name(&self) -> &'static str {
        "hardy"
    }

    fn schema(&self) -> &[ColumnDef] {
        &self.schema
    }

    fn init_global(&self, projection: &Projection) -> Result<HardyGlobal> {
        Ok(HardyGlobal {
            claimer: BatchClaimer::new(self.dataset.range.start, self.dataset.range.end),
            projection: projection.clone(),
            need_counts: projection.any_at_or_beyond(COL_HOM_REF_CT),
        })
    }

    fn init_local(&self, global: &HardyGlobal) -> Result<HardyLocal> {
        let reader = if global.need_counts {
            Some(self.dataset.open_reader()?)
        } else {
            None
        };
        Ok(HardyLocal { reader })
    }

    fn max_threads(&self, _global: &HardyGlobal) -> usize {
        default_max_threads(self.dataset.range.len())
    }

    fn scan(
        &self,
        global: &HardyGlobal,
        local: &mut HardyLocal,
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
                let [hom_ref, het, hom_alt, _missing] = counts;
                let obs = hom_ref + het + hom_alt;

                let (o_het, e_het, p_hwe) = if obs == 0 {
                    (None, None, None)
                } else {
                    let o_het = het as f64 / obs as f64;
                    let p = (2.0 * hom_ref as f64 + het as f64) / (2.0 * obs as f64);
                    let e_het = 2.0 * p * (1.0 - p);
                    let p_hwe = hwe_exact_test(hom_ref, het, hom_alt, self.midp);
                    (Some(o_het), Some(e_het), Some(p_hwe))
                };

                for (out_col, &col_id) in global.projection.column_ids.iter().enumerate() {
                    match col_id {
                        COL_CHROM => output.push_varchar(out_col, Some(cols.chrom(vidx))),
                        COL_POS => output.push_int32(out_col, Some(cols.pos(vidx))),
                        COL_ID => output.push_varchar(out_col, cols.id(vidx)),
                        COL_REF => output.push_varchar(out_col, Some(cols.ref_allele(vidx))),
                        // A1 is the tested allele, always ALT here
                        COL_ALT | COL_A1 => output.push_varchar(out_col, cols.alt(vidx)),
                        COL_HOM_REF_CT => output.push_int32(out_col, Some(hom_ref as i32)),
                        COL_HET_CT => output.push_int32(out_col, Some(het as i32)),
                        COL_HOM_ALT_CT => output.push_int32(out_col, Some(hom_alt as i32)),
                        COL_O_HET => output.push_double(out_col, o_het),
                        COL_E_HET => output.push_double(out_col, e_het),
                        COL_P_HWE => output.push_double(out_col, p_hwe),
                        _ => output.push_null(out_col),
                    }
                }
                output.finish_row();
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hwe_balanced_counts() {
        // (1,1,1): every het configuration is equally extreme
        assert!((hwe_exact_test(1, 1, 1, false) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hwe_known_value() {
        // 4 samples with counts (2,1,1); exact p = 3/7
        let p = hwe_exact_test(2, 1, 1, false);
        assert!((p - 3.0 / 7.0).abs() < 1e-9, "p = {p}");
    }

    #[test]
    fn test_hwe_all_missing_convention() {
        assert_eq!(hwe_exact_test(0, 0, 0, false), 1.0);
    }

    #[test]
    fn test_hwe_monomorphic() {
        assert!((hwe_exact_test(10, 0, 0, false) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_hwe_excess_het_decreases_with_n() {
        // all-het genotypes are increasingly improbable under HWE
        let p10 = hwe_exact_test(0, 10, 0, false);
        let p50 = hwe_exact_test(0, 50, 0, false);
        let p200 = hwe_exact_test(0, 200, 0, false);
        assert!(p50 < p10);
        assert!(p200 < p50);
    }

    #[test]
    fn test_hwe_het_deficit_decreases_with_n() {
        let p5 = hwe_exact_test(5, 0, 5, false);
        let p20 = hwe_exact_test(20, 0, 20, false);
        assert!(p20 < p5);
        assert!(p20 < 1e-6);
    }

    #[test]
    fn test_hwe_symmetric_in_homozygotes() {
        let a = hwe_exact_test(7, 5, 2, false);
        let b = hwe_exact_test(2, 5, 7, false);
        assert!((a - b).abs() < 1e-12);
    }

    #[test]
    fn test_hwe_midp_smaller() {
        let plain = hwe_exact_test(3, 4, 3, false);
        let midp = hwe_exact_test(3, 4, 3, true);
        assert!(midp < plain);
        assert!(midp >= 0.0);
    }

    #[test]
    fn test_hwe_bounds() {
        for &(a, b, c) in &[(0u32, 1u32, 0u32), (1, 0, 0), (0, 0, 1), (100, 37, 12)] {
            let p = hwe_exact_test(a, b, c, false);
            assert!((0.0..=1.0).contains(&p), "({a},{b},{c}) -> {p}");
        }
    }

    #[test]
    fn test_hwe_odd_rare_copies() {
        // rare_copies odd: both parities of the probability array are
        // conceptually valid; only the matching parity is populated.
        let p = hwe_exact_test(1, 3, 20, false);
        assert!((0.0..=1.0).contains(&p));
    }
}
