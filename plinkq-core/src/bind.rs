//! Bind-time dataset resolution shared by every kernel.
//!
//! Binding resolves sidecar paths (explicit or auto-discovered),
//! populates the decoder header context, loads variant and sample
//! metadata, cross-checks counts, builds the sample subset, and parses
//! the region filter. Everything a [`Dataset`] holds is immutable and
//! shared by reference across worker threads for the life of the query.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use plinkq_geno::pgen::{PgenFileInfo, SidecarCounts};
use plinkq_geno::subset::resolve_sample_indices;
use plinkq_geno::{
    PgenReader, PlinkError, Result, SampleInfo, SampleSelector, SampleSubset, VariantColumns,
    VariantIndex, VariantRange,
};

/// The shared option surface: genotype file plus the named parameters
/// every scan function accepts.
#[derive(Debug, Clone, Default)]
pub struct ScanOptions {
    pub pgen: PathBuf,
    pub pvar: Option<PathBuf>,
    pub psam: Option<PathBuf>,
    pub samples: Option<SampleSelector>,
    pub region: Option<String>,
}

impl ScanOptions {
    pub fn new(pgen: impl Into<PathBuf>) -> Self {
        ScanOptions {
            pgen: pgen.into(),
            ..Default::default()
        }
    }
}

/// Replace the genotype-file extension with each candidate in turn and
/// return the first companion that exists.
fn find_companion(pgen: &Path, extensions: &[&str]) -> Option<PathBuf> {
    extensions
        .iter()
        .map(|ext| pgen.with_extension(ext))
        .find(|p| p.exists())
}

/// Everything resolved at bind: decoder header context, metadata in
/// both forms, the optional sample table and subset, and the variant
/// range all scanning is restricted to.
pub struct Dataset {
    pub pgen_path: PathBuf,
    pub info: Arc<PgenFileInfo>,
    pub variants: Arc<VariantIndex>,
    pub columns: Arc<VariantColumns>,
    pub samples: Option<Arc<SampleInfo>>,
    pub subset: Option<Arc<SampleSubset>>,
    pub range: VariantRange,
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("pgen_path", &self.pgen_path)
            .field("range", &self.range)
            .finish_non_exhaustive()
    }
}

impl Dataset {
    /// `require_samples` makes a missing .psam/.fam a bind error
    /// (kernels whose output includes sample identity need it).
    pub fn open(opts: &ScanOptions, require_samples: bool) -> Result<Dataset> {
        let pvar_path = match &opts.pvar {
            Some(p) => p.clone(),
            None => find_companion(&opts.pgen, &["pvar", "bim"]).ok_or_else(|| {
                PlinkError::invalid(format!(
                    "cannot find .pvar or .bim companion for '{}' (pass an explicit path)",
                    opts.pgen.display()
                ))
            })?,
        };
        let psam_path = match &opts.psam {
            Some(p) => Some(p.clone()),
            None => find_companion(&opts.pgen, &["psam", "fam"]),
        };
        if require_samples && psam_path.is_none() {
            return Err(PlinkError::invalid(format!(
                "this function requires a .psam or .fam companion for '{}' (pass an explicit path)",
                opts.pgen.display()
            )));
        }

        let variants = Arc::new(VariantIndex::open(&pvar_path)?);
        let columns = Arc::new(variants.to_columns()?);
        let samples = psam_path
            .as_deref()
            .map(SampleInfo::load)
            .transpose()?
            .map(Arc::new);

        let info = Arc::new(PgenFileInfo::open(
            &opts.pgen,
            SidecarCounts {
                variant_ct: variants.variant_ct(),
                sample_ct: samples.as_ref().map(|s| s.sample_ct()),
            },
        )?);

        let subset = match &opts.samples {
            None => None,
            Some(selector) => {
                let indices = resolve_sample_indices(
                    selector,
                    info.raw_sample_ct(),
                    samples.as_deref(),
                )?;
                Some(Arc::new(SampleSubset::build(info.raw_sample_ct(), &indices)))
            }
        };

        let range = match &opts.region {
            None => VariantRange::full(variants.variant_ct()),
            Some(region) => variants.parse_region(region)?,
        };

        let dataset = Dataset {
            pgen_path: opts.pgen.clone(),
            info,
            variants,
            columns,
            samples,
            subset,
            range,
        };
        tracing::info!(
            pgen = %dataset.pgen_path.display(),
            variants = dataset.raw_variant_ct(),
            samples = dataset.info.raw_sample_ct(),
            effective_samples = dataset.effective_sample_ct(),
            range_start = dataset.range.start,
            range_end = dataset.range.end,
            "bound dataset"
        );
        Ok(dataset)
    }

    pub fn raw_variant_ct(&self) -> u32 {
        self.info.raw_variant_ct()
    }

    pub fn effective_sample_ct(&self) -> u32 {
        self.subset
            .as_ref()
            .map(|s| s.subset_sample_ct)
            .unwrap_or_else(|| self.info.raw_sample_ct())
    }

    /// Map an effective sample slot back to its original index: slot k
    /// is the k-th smallest included sample, or k itself when no subset
    /// is bound.
    pub fn original_sample_idx(&self, slot: u32) -> u32 {
        match &self.subset {
            Some(s) => s.sorted_indices[slot as usize],
            None => slot,
        }
    }

    /// Construct this thread's decoder reader: an independent file
    /// handle over the shared header context and subset.
    pub fn open_reader(&self) -> Result<PgenReader> {
        PgenReader::open(
            &self.pgen_path,
            Arc::clone(&self.info),
            self.subset.clone(),
        )
    }
}
