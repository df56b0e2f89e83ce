//! Sample-subset descriptor.
//!
//! A subset is kept in three derived forms because different decoder
//! entry points want different shapes: the dense-read path gathers
//! through the `include` bitmask, the fast-count path consumes the
//! genotype-lane-widened `interleaved_mask`, and subset index mapping
//! uses per-word `cumulative_popcounts`. All three are built once at
//! bind and shared read-only across worker threads.

use crate::aligned::{
    bit_ct_to_aligned_word_ct, bit_ct_to_word_ct, nyp_ct_to_aligned_word_ct, set_bit,
    BITS_PER_WORD, NYPS_PER_WORD,
};
use crate::aligned::{zeroed_cacheline_vec, CachelineVec};
use crate::error::{PlinkError, Result};
use crate::psam::SampleInfo;

/// The `samples` parameter: positional indices into the genotype file's
/// sample order, or IIDs resolved against the sample sidecar.
#[derive(Debug, Clone)]
pub enum SampleSelector {
    Indices(Vec<i64>),
    Ids(Vec<String>),
}

/// Resolve a selector to raw sample indices, validating bounds,
/// existence and uniqueness. ID selectors require sample metadata.
pub fn resolve_sample_indices(
    selector: &SampleSelector,
    raw_sample_ct: u32,
    samples: Option<&SampleInfo>,
) -> Result<Vec<u32>> {
    let indices: Vec<u32> = match selector {
        SampleSelector::Indices(raw) => {
            if raw.is_empty() {
                return Err(PlinkError::invalid("samples list must not be empty"));
            }
            raw.iter()
                .map(|&idx| {
                    if idx < 0 || idx as u64 >= raw_sample_ct as u64 {
                        Err(PlinkError::invalid(format!(
                            "sample index {} out of range (sample count: {})",
                            idx, raw_sample_ct
                        )))
                    } else {
                        Ok(idx as u32)
                    }
                })
                .collect::<Result<_>>()?
        }
        SampleSelector::Ids(ids) => {
            if ids.is_empty() {
                return Err(PlinkError::invalid("samples list must not be empty"));
            }
            let info = samples.ok_or_else(|| {
                PlinkError::invalid(
                    "sample IDs require a .psam/.fam file (no sample IDs to match against)",
                )
            })?;
            ids.iter()
                .map(|iid| {
                    info.iid_to_idx.get(iid).copied().ok_or_else(|| {
                        PlinkError::invalid(format!("sample '{}' not found in .psam/.fam", iid))
                    })
                })
                .collect::<Result<_>>()?
        }
    };

    let mut seen = std::collections::HashSet::new();
    for &idx in &indices {
        if !seen.insert(idx) {
            return Err(PlinkError::invalid(format!(
                "duplicate sample index {} in samples list",
                idx
            )));
        }
    }

    Ok(indices)
}

/// Precomputed subset triple plus the sorted index list used to map
/// subset output slots back to original sample indices.
pub struct SampleSubset {
    pub raw_sample_ct: u32,
    pub subset_sample_ct: u32,
    include: CachelineVec,
    interleaved_mask: CachelineVec,
    cumulative_popcounts: Vec<u32>,
    pub sorted_indices: Vec<u32>,
}

impl SampleSubset {
    /// Indices are sorted ascending first: the decoder emits subsetted
    /// data in raw file order, so output slot `k` is the k-th smallest
    /// included index.
    pub fn build(raw_sample_ct: u32, indices: &[u32]) -> Self {
        let mut sorted_indices = indices.to_vec();
        sorted_indices.sort_unstable();

        let include_word_ct = bit_ct_to_aligned_word_ct(raw_sample_ct as usize);
        let mut include = zeroed_cacheline_vec(include_word_ct);
        for &idx in &sorted_indices {
            set_bit(idx as usize, &mut include);
        }

        let mask_word_ct = nyp_ct_to_aligned_word_ct(raw_sample_ct as usize);
        let mut interleaved_mask = zeroed_cacheline_vec(mask_word_ct);
        for &idx in &sorted_indices {
            let lane = idx as usize;
            interleaved_mask[lane / NYPS_PER_WORD] |= 0b11u64 << (2 * (lane % NYPS_PER_WORD));
        }

        let popcount_word_ct = bit_ct_to_word_ct(raw_sample_ct as usize);
        let mut cumulative_popcounts = Vec::with_capacity(popcount_word_ct);
        let mut running = 0u32;
        for w in 0..popcount_word_ct {
            cumulative_popcounts.push(running);
            running += include[w].count_ones();
        }

        SampleSubset {
            raw_sample_ct,
            subset_sample_ct: sorted_indices.len() as u32,
            include,
            interleaved_mask,
            cumulative_popcounts,
            sorted_indices,
        }
    }

    pub fn include_words(&self) -> &[u64] {
        &self.include
    }

    pub fn interleaved_mask(&self) -> &[u64] {
        &self.interleaved_mask
    }

    pub fn cumulative_popcounts(&self) -> &[u32] {
        &self.cumulative_popcounts
    }

    #[inline]
    pub fn contains(&self, raw_idx: u32) -> bool {
        let idx = raw_idx as usize;
        (self.include[idx / BITS_PER_WORD] >> (idx % BITS_PER_WORD)) & 1 == 1
    }

    /// Position of an included raw index within the contracted subset
    /// index space.
    #[inline]
    pub fn subset_position(&self, raw_idx: u32) -> u32 {
        let idx = raw_idx as usize;
        let word = idx / BITS_PER_WORD;
        let below = self.include[word] & ((1u64 << (idx % BITS_PER_WORD)) - 1);
        self.cumulative_popcounts[word] + below.count_ones()
    }
}
