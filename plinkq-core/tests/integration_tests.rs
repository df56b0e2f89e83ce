//! End-to-end tests over synthetic PLINK 2 filesets.
//!
//! The main fixture is a 4-variant x 4-sample dataset with known
//! genotype counts, exercised through every kernel via the same
//! bind / init / scan lifecycle the host engine drives.

use std::io::Write;
use std::path::{Path, PathBuf};

use plinkq_core::freq::{self, FreqOptions, FreqScan};
use plinkq_core::hardy::{HardyOptions, HardyScan};
use plinkq_core::ld::{LdOptions, LdScan};
use plinkq_core::missing::{MissingMode, MissingScan};
use plinkq_core::read::{ReadOptions, ReadScan};
use plinkq_core::score::{ScoreOptions, ScoreWeights, WeightEntry};
use plinkq_core::score::ScoreScan;
use plinkq_core::{
    run_scan, OutputBatch, Projection, ScanContext, ScanKernel, ScanOptions, Value,
};
use plinkq_geno::SampleSelector;

/// Genotype codes for the main fixture (3 = missing):
///   v1: 0 1 2 .      v2: 1 1 0 2
///   v3: 2 . 1 0      v4: 0 0 1 2
const GENOS: [[u8; 4]; 4] = [
    [0, 1, 2, 3],
    [1, 1, 0, 2],
    [2, 3, 1, 0],
    [0, 0, 1, 2],
];

const PVAR: &str = "#CHROM\tPOS\tID\tREF\tALT\n\
                    1\t100\trs1\tA\tG\n\
                    1\t200\trs2\tC\tT\n\
                    1\t300\trs3\tG\tA\n\
                    1\t400\trs4\tT\tC\n";

const PSAM: &str = "#FID\tIID\nF1\tS1\nF1\tS2\nF2\tS3\nF2\tS4\n";

fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::File::create(&path).unwrap().write_all(bytes).unwrap();
    path
}

fn fixed_pgen_bytes(sample_ct: usize, genotypes: &[[u8; 4]]) -> Vec<u8> {
    let mut bytes = vec![0x6c, 0x1b, 0x02];
    bytes.extend_from_slice(&(genotypes.len() as u32).to_le_bytes());
    bytes.extend_from_slice(&(sample_ct as u32).to_le_bytes());
    bytes.push(0);
    for row in genotypes {
        let mut rec = vec![0u8; sample_ct.div_ceil(4)];
        for (s, &g) in row.iter().enumerate() {
            rec[s / 4] |= (g & 3) << (2 * (s % 4));
        }
        bytes.extend_from_slice(&rec);
    }
    bytes
}

/// Write the main fixture and return the .pgen path.
fn fixture(dir: &Path) -> PathBuf {
    write_file(dir, "test.pvar", PVAR.as_bytes());
    write_file(dir, "test.psam", PSAM.as_bytes());
    write_file(dir, "test.pgen", &fixed_pgen_bytes(4, &GENOS))
}

fn run_all<K: ScanKernel>(kernel: &K) -> Vec<OutputBatch> {
    let projection = Projection::all(kernel.schema());
    run_scan(kernel, &projection, &ScanContext::new()).unwrap()
}

fn total_rows(batches: &[OutputBatch]) -> usize {
    batches.iter().map(|b| b.rows()).sum()
}

/// Flatten one column across batches. Small fixtures run on a single
/// worker, so row order is ascending.
fn column_values(batches: &[OutputBatch], col: usize) -> Vec<Value<'_>> {
    batches
        .iter()
        .flat_map(|b| (0..b.rows()).map(move |r| b.value(col, r)))
        .collect()
}

fn unwrap_double(v: Value<'_>) -> f64 {
    match v {
        Value::Double(x) => x,
        other => panic!("expected double, got {other:?}"),
    }
}

fn unwrap_int(v: Value<'_>) -> i32 {
    match v {
        Value::Int32(x) => x,
        other => panic!("expected int, got {other:?}"),
    }
}

#[test]
fn test_freq_fixture_values() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let scan = FreqScan::bind(&ScanOptions::new(&pgen), &FreqOptions::default()).unwrap();
    let batches = run_all(&scan);

    assert_eq!(total_rows(&batches), 4);
    let freqs: Vec<f64> = column_values(&batches, freq::COL_ALT_FREQ)
        .into_iter()
        .map(unwrap_double)
        .collect();
    let obs: Vec<i32> = column_values(&batches, freq::COL_OBS_CT)
        .into_iter()
        .map(unwrap_int)
        .collect();

    let expected = [(0.5, 6), (0.5, 8), (0.5, 6), (0.375, 8)];
    for (i, &(f, o)) in expected.iter().enumerate() {
        assert!((freqs[i] - f).abs() < 1e-12, "variant {i}: {}", freqs[i]);
        assert_eq!(obs[i], o, "variant {i}");
    }
}

#[test]
fn test_freq_counts_option() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let scan = FreqScan::bind(
        &ScanOptions::new(&pgen),
        &FreqOptions {
            counts: true,
            dosage: false,
        },
    )
    .unwrap();
    let batches = run_all(&scan);

    // v1 counts: hom_ref 1, het 1, hom_alt 1, missing 1
    assert_eq!(
        unwrap_int(column_values(&batches, freq::COL_HOM_REF_CT)[0]),
        1
    );
    assert_eq!(unwrap_int(column_values(&batches, freq::COL_HET_CT)[0]), 1);
    assert_eq!(
        unwrap_int(column_values(&batches, freq::COL_HOM_ALT_CT)[0]),
        1
    );
    assert_eq!(
        unwrap_int(column_values(&batches, freq::COL_MISSING_CT)[0]),
        1
    );

    // counts partition the effective samples for every variant
    for row in 0..4 {
        let total: i32 = [
            freq::COL_HOM_REF_CT,
            freq::COL_HET_CT,
            freq::COL_HOM_ALT_CT,
            freq::COL_MISSING_CT,
        ]
        .iter()
        .map(|&c| unwrap_int(column_values(&batches, c)[row]))
        .sum();
        assert_eq!(total, 4);
    }
}

#[test]
fn test_freq_dosage_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let err = FreqScan::bind(
        &ScanOptions::new(&pgen),
        &FreqOptions {
            counts: false,
            dosage: true,
        },
    )
    .unwrap_err();
    assert!(matches!(err, plinkq_geno::PlinkError::NotImplemented(_)));
}

#[test]
fn test_freq_metadata_only_projection() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let scan = FreqScan::bind(&ScanOptions::new(&pgen), &FreqOptions::default()).unwrap();
    // Only CHROM and POS projected: no decoder resources are touched.
    let projection = Projection::new(vec![freq::COL_CHROM, freq::COL_POS]);
    let batches = run_scan(&scan, &projection, &ScanContext::new()).unwrap();
    assert_eq!(total_rows(&batches), 4);
    assert_eq!(column_values(&batches, 0)[0], Value::Varchar("1"));
    assert_eq!(unwrap_int(column_values(&batches, 1)[3]), 400);
}

#[test]
fn test_freq_sample_subset_matches_manual_count() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());

    let mut opts = ScanOptions::new(&pgen);
    opts.samples = Some(SampleSelector::Ids(vec![
        "S1".into(),
        "S2".into(),
        "S3".into(),
    ]));
    let scan = FreqScan::bind(&opts, &FreqOptions::default()).unwrap();
    let batches = run_all(&scan);

    // v4 over S1..S3: genotypes 0,0,1 -> alt_freq 1/6
    let freqs: Vec<f64> = column_values(&batches, freq::COL_ALT_FREQ)
        .into_iter()
        .map(unwrap_double)
        .collect();
    assert!((freqs[3] - 1.0 / 6.0).abs() < 1e-12);

    // cross-check against the dense read path over the same subset
    let read = ReadScan::bind(&opts, &ReadOptions::default()).unwrap();
    let read_batches = run_all(&read);
    let lists = column_values(&read_batches, plinkq_core::read::COL_GENOTYPES);
    let Value::Int32List(v4) = lists[3] else {
        panic!("expected list");
    };
    assert_eq!(v4, &[Some(0), Some(0), Some(1)]);
}

#[test]
fn test_freq_empty_region() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let mut opts = ScanOptions::new(&pgen);
    opts.region = Some("1:500-900".into());
    let scan = FreqScan::bind(&opts, &FreqOptions::default()).unwrap();
    assert_eq!(total_rows(&run_all(&scan)), 0);
}

#[test]
fn test_hardy_fixture_values() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let scan = HardyScan::bind(&ScanOptions::new(&pgen), &HardyOptions::default()).unwrap();
    let batches = run_all(&scan);

    let p_hwe: Vec<f64> = column_values(&batches, plinkq_core::hardy::COL_P_HWE)
        .into_iter()
        .map(unwrap_double)
        .collect();
    assert!((p_hwe[0] - 1.0).abs() < 1e-12); // v1: (1,1,1)
    assert!((p_hwe[3] - 3.0 / 7.0).abs() < 1e-9); // v4: (2,1,1)

    // o_het for v1: 1 het of 3 observed
    let o_het = unwrap_double(column_values(&batches, plinkq_core::hardy::COL_O_HET)[0]);
    assert!((o_het - 1.0 / 3.0).abs() < 1e-12);
}

#[test]
fn test_missing_variant_mode() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let scan = MissingScan::bind(&ScanOptions::new(&pgen), MissingMode::Variant).unwrap();
    let batches = run_all(&scan);

    assert_eq!(total_rows(&batches), 4);
    let missing: Vec<i32> = column_values(&batches, plinkq_core::missing::VCOL_MISSING_CT)
        .into_iter()
        .map(unwrap_int)
        .collect();
    let f_miss: Vec<f64> = column_values(&batches, plinkq_core::missing::VCOL_F_MISS)
        .into_iter()
        .map(unwrap_double)
        .collect();
    assert_eq!(missing, vec![1, 0, 1, 0]);
    assert!((f_miss[0] - 0.25).abs() < 1e-12);
    assert!((f_miss[1]).abs() < 1e-12);
}

#[test]
fn test_missing_sample_mode() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let scan = MissingScan::bind(&ScanOptions::new(&pgen), MissingMode::Sample).unwrap();
    let batches = run_all(&scan);

    assert_eq!(total_rows(&batches), 4);
    let iids = column_values(&batches, plinkq_core::missing::SCOL_IID);
    assert_eq!(iids[0], Value::Varchar("S1"));
    assert_eq!(iids[3], Value::Varchar("S4"));

    let missing: Vec<i32> = column_values(&batches, plinkq_core::missing::SCOL_MISSING_CT)
        .into_iter()
        .map(unwrap_int)
        .collect();
    let obs: Vec<i32> = column_values(&batches, plinkq_core::missing::SCOL_OBS_CT)
        .into_iter()
        .map(unwrap_int)
        .collect();
    assert_eq!(missing, vec![0, 1, 0, 1]);
    // per-sample missing + observed always covers the variant range
    for s in 0..4 {
        assert_eq!(missing[s] + obs[s], 4);
    }
}

#[test]
fn test_ld_pairwise_fixture() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let ld_opts = LdOptions {
        variant1: Some("rs1".into()),
        variant2: Some("rs2".into()),
        ..LdOptions::default()
    };
    let scan = LdScan::bind(&ScanOptions::new(&pgen), &ld_opts).unwrap();
    let batches = run_all(&scan);

    assert_eq!(total_rows(&batches), 1);
    let r2 = unwrap_double(column_values(&batches, plinkq_core::ld::COL_R2)[0]);
    let d_prime = unwrap_double(column_values(&batches, plinkq_core::ld::COL_D_PRIME)[0]);
    let obs = unwrap_int(column_values(&batches, plinkq_core::ld::COL_OBS_CT)[0]);
    assert!((r2 - 0.75).abs() < 1e-9, "r2 = {r2}");
    assert!((d_prime - 0.5).abs() < 1e-9, "d' = {d_prime}");
    assert_eq!(obs, 3);
}

#[test]
fn test_ld_self_pair_is_one() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let ld_opts = LdOptions {
        variant1: Some("rs2".into()),
        variant2: Some("rs2".into()),
        ..LdOptions::default()
    };
    let scan = LdScan::bind(&ScanOptions::new(&pgen), &ld_opts).unwrap();
    let batches = run_all(&scan);
    let r2 = unwrap_double(column_values(&batches, plinkq_core::ld::COL_R2)[0]);
    assert!((r2 - 1.0).abs() < 1e-12);
}

#[test]
fn test_ld_unknown_variant_id() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let ld_opts = LdOptions {
        variant1: Some("rs1".into()),
        variant2: Some("rs99".into()),
        ..LdOptions::default()
    };
    assert!(LdScan::bind(&ScanOptions::new(&pgen), &ld_opts).is_err());
}

#[test]
fn test_ld_windowed_threshold() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    // no r2 filter: every valid in-window pair comes back
    let ld_opts = LdOptions {
        r2_threshold: 0.0,
        ..LdOptions::default()
    };
    let scan = LdScan::bind(&ScanOptions::new(&pgen), &ld_opts).unwrap();
    let batches = run_all(&scan);
    // 4 variants on one chromosome within 1Mb: 6 ordered pairs
    assert_eq!(total_rows(&batches), 6);

    // r2 >= 0.75 keeps only the strongest pairs
    let ld_opts = LdOptions {
        r2_threshold: 0.75,
        ..LdOptions::default()
    };
    let scan = LdScan::bind(&ScanOptions::new(&pgen), &ld_opts).unwrap();
    let batches = run_all(&scan);
    for row in 0..total_rows(&batches) {
        let r2 = unwrap_double(column_values(&batches, plinkq_core::ld::COL_R2)[row]);
        assert!(r2 >= 0.75);
    }
}

#[test]
fn test_ld_window_zero_emits_nothing_same_chrom() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let ld_opts = LdOptions {
        window_kb: 0,
        r2_threshold: 0.0,
        ..LdOptions::default()
    };
    let scan = LdScan::bind(&ScanOptions::new(&pgen), &ld_opts).unwrap();
    assert_eq!(total_rows(&run_all(&scan)), 0);
}

#[test]
fn test_ld_rejects_bad_parameters() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    assert!(LdScan::bind(
        &ScanOptions::new(&pgen),
        &LdOptions {
            window_kb: -5,
            ..LdOptions::default()
        }
    )
    .is_err());
    assert!(LdScan::bind(
        &ScanOptions::new(&pgen),
        &LdOptions {
            r2_threshold: 1.5,
            ..LdOptions::default()
        }
    )
    .is_err());
    assert!(LdScan::bind(
        &ScanOptions::new(&pgen),
        &LdOptions {
            variant1: Some("rs1".into()),
            ..LdOptions::default()
        }
    )
    .is_err());
}

#[test]
fn test_score_positional_mean_imputation() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let score_opts = ScoreOptions {
        weights: ScoreWeights::Positional(vec![0.5, -0.3, 1.2, 0.8]),
        center: false,
        no_mean_imputation: false,
    };
    let scan = ScoreScan::bind(&ScanOptions::new(&pgen), &score_opts).unwrap();
    let batches = run_all(&scan);

    assert_eq!(total_rows(&batches), 4);
    let sums: Vec<f64> = column_values(&batches, plinkq_core::score::COL_SCORE_SUM)
        .into_iter()
        .map(unwrap_double)
        .collect();
    let expected = [2.1, 1.4, 3.0, 1.5];
    for (s, &want) in expected.iter().enumerate() {
        assert!((sums[s] - want).abs() < 1e-9, "sample {s}: {}", sums[s]);
    }

    for row in 0..4 {
        let allele_ct =
            unwrap_int(column_values(&batches, plinkq_core::score::COL_ALLELE_CT)[row]);
        assert_eq!(allele_ct, 8);
        let avg = unwrap_double(column_values(&batches, plinkq_core::score::COL_SCORE_AVG)[row]);
        assert!((avg - sums[row] / 8.0).abs() < 1e-12);
    }
}

#[test]
fn test_score_no_mean_imputation_skips_missing() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let score_opts = ScoreOptions {
        weights: ScoreWeights::Positional(vec![0.5, -0.3, 1.2, 0.8]),
        center: false,
        no_mean_imputation: true,
    };
    let scan = ScoreScan::bind(&ScanOptions::new(&pgen), &score_opts).unwrap();
    let batches = run_all(&scan);

    // S4 misses v1, S2 misses v3: only 3 variants contribute for each
    let allele_cts: Vec<i32> = column_values(&batches, plinkq_core::score::COL_ALLELE_CT)
        .into_iter()
        .map(unwrap_int)
        .collect();
    assert_eq!(allele_cts, vec![8, 6, 8, 6]);

    let sums: Vec<f64> = column_values(&batches, plinkq_core::score::COL_SCORE_SUM)
        .into_iter()
        .map(unwrap_double)
        .collect();
    // S2: 0.5*1 - 0.3*1 + 0.8*0 = 0.2 (v3 skipped)
    assert!((sums[1] - 0.2).abs() < 1e-9);
    // S4: -0.3*2 + 0.8*2 = 1.0 (v1 skipped)
    assert!((sums[3] - 1.0).abs() < 1e-9);
}

#[test]
fn test_score_id_keyed_with_flip() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    // rs2 scored on its REF allele: dosage flips to 2 - alt
    let score_opts = ScoreOptions {
        weights: ScoreWeights::ById(vec![WeightEntry {
            id: "rs2".into(),
            allele: "C".into(),
            weight: 1.0,
        }]),
        center: false,
        no_mean_imputation: false,
    };
    let scan = ScoreScan::bind(&ScanOptions::new(&pgen), &score_opts).unwrap();
    let batches = run_all(&scan);
    let sums: Vec<f64> = column_values(&batches, plinkq_core::score::COL_SCORE_SUM)
        .into_iter()
        .map(unwrap_double)
        .collect();
    // v2 = [1,1,0,2] -> flipped [1,1,2,0]
    assert_eq!(sums, vec![1.0, 1.0, 2.0, 0.0]);
}

#[test]
fn test_score_center_mode() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let score_opts = ScoreOptions {
        weights: ScoreWeights::Positional(vec![0.0, 1.0, 0.0, 0.0]),
        center: true,
        no_mean_imputation: false,
    };
    let scan = ScoreScan::bind(&ScanOptions::new(&pgen), &score_opts).unwrap();
    let batches = run_all(&scan);

    // v2 = [1,1,0,2]: mean 1.0, freq 0.5, sd = sqrt(0.5)
    let sd = 0.5f64.sqrt();
    let sums: Vec<f64> = column_values(&batches, plinkq_core::score::COL_SCORE_SUM)
        .into_iter()
        .map(unwrap_double)
        .collect();
    let expected = [0.0, 0.0, -1.0 / sd, 1.0 / sd];
    for (s, &want) in expected.iter().enumerate() {
        assert!((sums[s] - want).abs() < 1e-9, "sample {s}: {}", sums[s]);
    }
}

#[test]
fn test_score_center_with_no_imputation_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let score_opts = ScoreOptions {
        weights: ScoreWeights::Positional(vec![0.5, 0.5, 0.5, 0.5]),
        center: true,
        no_mean_imputation: true,
    };
    assert!(matches!(
        ScoreScan::bind(&ScanOptions::new(&pgen), &score_opts).unwrap_err(),
        plinkq_geno::PlinkError::InvalidInput(_)
    ));
}

#[test]
fn test_score_weight_length_mismatch_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let score_opts = ScoreOptions {
        weights: ScoreWeights::Positional(vec![0.5]),
        center: false,
        no_mean_imputation: false,
    };
    assert!(ScoreScan::bind(&ScanOptions::new(&pgen), &score_opts).is_err());
}

#[test]
fn test_score_subset_output_order() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let mut opts = ScanOptions::new(&pgen);
    // selection order S4, S1: output still follows ascending original
    // sample order
    opts.samples = Some(SampleSelector::Ids(vec!["S4".into(), "S1".into()]));
    let score_opts = ScoreOptions {
        weights: ScoreWeights::Positional(vec![0.0, 1.0, 0.0, 0.0]),
        center: false,
        no_mean_imputation: false,
    };
    let scan = ScoreScan::bind(&opts, &score_opts).unwrap();
    let batches = run_all(&scan);

    assert_eq!(total_rows(&batches), 2);
    let iids = column_values(&batches, plinkq_core::score::COL_IID);
    assert_eq!(iids[0], Value::Varchar("S1"));
    assert_eq!(iids[1], Value::Varchar("S4"));

    // v2 restricted to {S1, S4} = [1, 2]
    let sums: Vec<f64> = column_values(&batches, plinkq_core::score::COL_SCORE_SUM)
        .into_iter()
        .map(unwrap_double)
        .collect();
    assert_eq!(sums, vec![1.0, 2.0]);
}

#[test]
fn test_ld_windowed_chromosome_boundary() {
    let dir = tempfile::tempdir().unwrap();
    // Two chromosomes; the windowed sweep must not pair across them
    // unless inter_chr is set.
    write_file(
        dir.path(),
        "two.pvar",
        b"#CHROM\tPOS\tID\tREF\tALT\n\
          1\t100\trs1\tA\tG\n\
          1\t200\trs2\tC\tT\n\
          2\t100\trs3\tG\tA\n\
          2\t200\trs4\tT\tC\n",
    );
    write_file(dir.path(), "two.psam", PSAM.as_bytes());
    let pgen = write_file(dir.path(), "two.pgen", &fixed_pgen_bytes(4, &GENOS));

    let base = LdOptions {
        r2_threshold: 0.0,
        ..LdOptions::default()
    };
    let scan = LdScan::bind(&ScanOptions::new(&pgen), &base).unwrap();
    // intra-chromosome pairs only: (rs1,rs2) and (rs3,rs4)
    assert_eq!(total_rows(&run_all(&scan)), 2);

    let scan = LdScan::bind(
        &ScanOptions::new(&pgen),
        &LdOptions {
            inter_chr: true,
            ..base
        },
    )
    .unwrap();
    // every valid ordered pair
    assert_eq!(total_rows(&run_all(&scan)), 6);
}

#[test]
fn test_read_kernel_genotype_lists() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let scan = ReadScan::bind(&ScanOptions::new(&pgen), &ReadOptions::default()).unwrap();
    let batches = run_all(&scan);

    assert_eq!(total_rows(&batches), 4);
    let lists = column_values(&batches, plinkq_core::read::COL_GENOTYPES);
    let Value::Int32List(v1) = lists[0] else {
        panic!("expected list");
    };
    assert_eq!(v1, &[Some(0), Some(1), Some(2), None]);

    let ids = column_values(&batches, plinkq_core::read::COL_ID);
    assert_eq!(ids[2], Value::Varchar("rs3"));
}

#[test]
fn test_read_rejects_unimplemented_tracks() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    for opts in [
        ReadOptions {
            dosages: true,
            phased: false,
        },
        ReadOptions {
            dosages: false,
            phased: true,
        },
    ] {
        assert!(matches!(
            ReadScan::bind(&ScanOptions::new(&pgen), &opts).unwrap_err(),
            plinkq_geno::PlinkError::NotImplemented(_)
        ));
    }
}

#[test]
fn test_bed_bim_fam_fileset() {
    let dir = tempfile::tempdir().unwrap();
    // Mode 0x01: PLINK 1 .bed payload. bed codes: 00 hom-alt,
    // 01 missing, 10 het, 11 hom-ref.
    let bed_code = |g: u8| -> u8 {
        match g {
            0 => 0b11,
            1 => 0b10,
            2 => 0b00,
            _ => 0b01,
        }
    };
    let mut bytes = vec![0x6c, 0x1b, 0x01];
    for row in &GENOS {
        let mut rec = vec![0u8; 1];
        for (s, &g) in row.iter().enumerate() {
            rec[s / 4] |= bed_code(g) << (2 * (s % 4));
        }
        bytes.extend_from_slice(&rec);
    }
    let pgen = write_file(dir.path(), "legacy.pgen", &bytes);
    // .bim column order: CHROM ID CM POS ALT REF
    write_file(
        dir.path(),
        "legacy.bim",
        b"1 rs1 0 100 G A\n1 rs2 0 200 T C\n1 rs3 0 300 A G\n1 rs4 0 400 C T\n",
    );
    write_file(
        dir.path(),
        "legacy.fam",
        b"F1 S1 0 0 1 -9\nF1 S2 0 0 2 -9\nF2 S3 0 0 1 -9\nF2 S4 0 0 2 -9\n",
    );

    let scan = FreqScan::bind(&ScanOptions::new(&pgen), &FreqOptions::default()).unwrap();
    let batches = run_all(&scan);
    let freqs: Vec<f64> = column_values(&batches, freq::COL_ALT_FREQ)
        .into_iter()
        .map(unwrap_double)
        .collect();
    let expected = [0.5, 0.5, 0.5, 0.375];
    for (i, &want) in expected.iter().enumerate() {
        assert!((freqs[i] - want).abs() < 1e-12, "variant {i}: {}", freqs[i]);
    }
}

#[test]
fn test_cancellation_stops_claims() {
    let dir = tempfile::tempdir().unwrap();
    let pgen = fixture(dir.path());
    let scan = FreqScan::bind(&ScanOptions::new(&pgen), &FreqOptions::default()).unwrap();
    let ctx = ScanContext::new();
    ctx.cancel();
    let batches = run_scan(&scan, &Projection::all(scan.schema()), &ctx).unwrap();
    assert_eq!(total_rows(&batches), 0);
}
