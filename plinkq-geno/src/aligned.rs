//! Cache-line-aligned working buffers and bit-layout arithmetic.
//!
//! Genotype vectors are bit-packed at 2 bits per call ("nyps") into u64
//! words, and the decoder's word-granular loops read whole cache lines
//! at a time. Every genovec and bitmask buffer is therefore sized to a
//! whole number of cache lines, not just whole words.

use aligned_vec::{AVec, ConstAlign};

pub const BITS_PER_WORD: usize = 64;
pub const NYPS_PER_WORD: usize = 32;
pub const CACHELINE_BYTES: usize = 64;
pub const WORDS_PER_CACHELINE: usize = CACHELINE_BYTES / 8;

/// A u64 buffer whose base address is cache-line aligned. Exclusively
/// owned by its acquirer; freed on every exit path by `Drop`.
pub type CachelineVec = AVec<u64, ConstAlign<CACHELINE_BYTES>>;

/// Allocate a zeroed aligned buffer of `word_ct` words.
pub fn zeroed_cacheline_vec(word_ct: usize) -> CachelineVec {
    AVec::from_iter(CACHELINE_BYTES, std::iter::repeat(0u64).take(word_ct))
}

/// Words needed to hold `bit_ct` single bits.
pub fn bit_ct_to_word_ct(bit_ct: usize) -> usize {
    bit_ct.div_ceil(BITS_PER_WORD)
}

/// Words needed to hold `nyp_ct` 2-bit values.
pub fn nyp_ct_to_word_ct(nyp_ct: usize) -> usize {
    nyp_ct.div_ceil(NYPS_PER_WORD)
}

/// Like [`bit_ct_to_word_ct`] but rounded up to a whole cache line, so
/// word-at-a-time consumers can read the final partial line safely.
pub fn bit_ct_to_aligned_word_ct(bit_ct: usize) -> usize {
    bit_ct_to_word_ct(bit_ct).next_multiple_of(WORDS_PER_CACHELINE)
}

/// Like [`nyp_ct_to_word_ct`] but rounded up to a whole cache line.
/// Sizing genovec buffers with this (and not the naive word count)
/// prevents decoder overruns on the last partial line.
pub fn nyp_ct_to_aligned_word_ct(nyp_ct: usize) -> usize {
    nyp_ct_to_word_ct(nyp_ct).next_multiple_of(WORDS_PER_CACHELINE)
}

/// Set bit `idx` in a word-packed bitmask.
#[inline]
pub fn set_bit(idx: usize, words: &mut [u64]) {
    words[idx / BITS_PER_WORD] |= 1u64 << (idx % BITS_PER_WORD);
}

/// Test bit `idx` in a word-packed bitmask.
#[inline]
pub fn is_bit_set(idx: usize, words: &[u64]) -> bool {
    (words[idx / BITS_PER_WORD] >> (idx % BITS_PER_WORD)) & 1 == 1
}

/// Total population count over a word slice.
#[inline]
pub fn popcount_words(words: &[u64]) -> u64 {
    words.iter().map(|w| w.count_ones() as u64).sum()
}

/// Extract the 2-bit genotype code at `sample_idx` from a packed genovec.
#[inline]
pub fn get_nyp(words: &[u64], sample_idx: usize) -> u8 {
    ((words[sample_idx / NYPS_PER_WORD] >> (2 * (sample_idx % NYPS_PER_WORD))) & 3) as u8
}

/// Store a 2-bit genotype code at `sample_idx`. The target lane must be
/// zero (buffers are cleared before packing).
#[inline]
pub fn set_nyp(words: &mut [u64], sample_idx: usize, code: u8) {
    words[sample_idx / NYPS_PER_WORD] |= ((code & 3) as u64) << (2 * (sample_idx % NYPS_PER_WORD));
}
