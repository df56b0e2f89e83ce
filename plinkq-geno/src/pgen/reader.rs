//! Per-thread PGEN reader.
//!
//! A reader owns an independent file handle (the handle is not shared
//! across threads), a record byte buffer sized to the widest record in
//! the file, a raw-sample-space genovec scratch, and the cached anchor
//! genovec for LD-compressed records. The shared [`PgenFileInfo`] is
//! held by `Arc`, so the header context always outlives the reader
//! that borrows its record index.
//!
//! All outputs are in *effective* (subset) sample space: dense reads
//! gather through the subset's include bitmask, the count path runs
//! word-parallel under the interleaved mask, and missingness bits are
//! contracted through the cumulative popcounts.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::aligned::{
    bit_ct_to_aligned_word_ct, bit_ct_to_word_ct, get_nyp, nyp_ct_to_aligned_word_ct,
    nyp_ct_to_word_ct, set_bit, set_nyp, zeroed_cacheline_vec, CachelineVec, BITS_PER_WORD,
};
use crate::error::{PlinkError, Result};
use crate::subset::SampleSubset;

use super::record::{self, DosageTrack, LOW_NYP_MASK, RT_MULTIALLELIC};
use super::{PgenFileInfo, StorageMode};

/// Sentinel for a missing dosage in the expanded double representation.
pub const DOSAGE_MISSING: f64 = -9.0;
const DOSAGE_UNIT: f64 = 16384.0;

pub struct PgenReader {
    info: Arc<PgenFileInfo>,
    subset: Option<Arc<SampleSubset>>,
    path: PathBuf,
    file: File,
    rec_buf: Vec<u8>,
    raw_genovec: CachelineVec,
    anchor_vidx: Option<u32>,
    anchor_genovec: CachelineVec,
}

impl PgenReader {
    pub fn open(
        path: &Path,
        info: Arc<PgenFileInfo>,
        subset: Option<Arc<SampleSubset>>,
    ) -> Result<Self> {
        if let Some(s) = &subset {
            if s.raw_sample_ct != info.raw_sample_ct() {
                return Err(PlinkError::invalid(format!(
                    "sample subset built for {} samples, .pgen has {}",
                    s.raw_sample_ct,
                    info.raw_sample_ct()
                )));
            }
        }
        let file = File::open(path).map_err(|e| PlinkError::io(path, e))?;
        let raw_word_ct = nyp_ct_to_aligned_word_ct(info.raw_sample_ct() as usize);
        Ok(PgenReader {
            rec_buf: vec![0u8; info.max_record_width()],
            raw_genovec: zeroed_cacheline_vec(raw_word_ct),
            anchor_vidx: None,
            anchor_genovec: zeroed_cacheline_vec(raw_word_ct),
            subset,
            path: path.to_path_buf(),
            file,
            info,
        })
    }

    pub fn raw_sample_ct(&self) -> u32 {
        self.info.raw_sample_ct()
    }

    /// Subset size when a subset is bound, else the raw sample count.
    pub fn effective_sample_ct(&self) -> u32 {
        self.subset
            .as_ref()
            .map(|s| s.subset_sample_ct)
            .unwrap_or_else(|| self.info.raw_sample_ct())
    }

    /// Words in a caller-allocated effective-space genovec.
    pub fn genovec_word_ct(&self) -> usize {
        nyp_ct_to_aligned_word_ct(self.effective_sample_ct() as usize)
    }

    /// Words in a caller-allocated effective-space missingness bitmask.
    pub fn missingness_word_ct(&self) -> usize {
        bit_ct_to_aligned_word_ct(self.effective_sample_ct() as usize)
    }

    pub fn alloc_genovec(&self) -> CachelineVec {
        zeroed_cacheline_vec(self.genovec_word_ct())
    }

    pub fn alloc_missingness(&self) -> CachelineVec {
        zeroed_cacheline_vec(self.missingness_word_ct())
    }

    fn check_vidx(&self, vidx: u32) -> Result<()> {
        if vidx >= self.info.raw_variant_ct() {
            return Err(PlinkError::invalid(format!(
                "variant index {} out of range ({} variants)",
                vidx,
                self.info.raw_variant_ct()
            )));
        }
        Ok(())
    }

    /// Read a record's bytes into the reader's buffer.
    fn load_record(&mut self, vidx: u32) -> Result<(usize, u8)> {
        let (offset, len, rec_type) = self.info.record_span(vidx);
        if len > self.rec_buf.len() {
            return Err(PlinkError::decode(vidx, "record longer than max record width"));
        }
        self.file
            .seek(SeekFrom::Start(offset))
            .and_then(|_| self.file.read_exact(&mut self.rec_buf[..len]))
            .map_err(|e| {
                PlinkError::decode(vidx, format!("record read failed ({}): {e}", self.path.display()))
            })?;
        Ok((len, rec_type))
    }

    /// Most recent non-LD record at or before `vidx - 1` in the same
    /// 64Ki-variant block.
    fn resolve_anchor(&self, vidx: u32) -> Result<u32> {
        let block_start = vidx & !0xffff;
        let mut j = vidx;
        while j > block_start {
            j -= 1;
            let kind = self.info.rec_type(j) & 0x07;
            if kind != 2 && kind != 3 {
                return Ok(j);
            }
        }
        Err(PlinkError::decode(
            vidx,
            "LD-compressed record with no anchor in its block",
        ))
    }

    /// Decode the record at `vidx` into the raw-space scratch genovec.
    fn decode_raw(&mut self, vidx: u32, want_dosage: bool) -> Result<Option<DosageTrack>> {
        self.check_vidx(vidx)?;
        let n = self.info.raw_sample_ct() as usize;

        match self.info.mode() {
            StorageMode::Bed | StorageMode::FixedHardcall => {
                let (len, _) = self.load_record(vidx)?;
                let translate = self.info.mode() == StorageMode::Bed;
                record::unpack_2bit(&self.rec_buf[..len], n, translate, &mut self.raw_genovec);
                Ok(None)
            }
            StorageMode::Variable => {
                let kind = self.info.rec_type(vidx) & 0x07;
                if kind == 2 || kind == 3 {
                    let anchor_vidx = self.resolve_anchor(vidx)?;
                    if self.anchor_vidx != Some(anchor_vidx) {
                        let (alen, aty) = self.load_record(anchor_vidx)?;
                        record::decode_record(
                            aty,
                            &self.rec_buf[..alen],
                            n,
                            None,
                            false,
                            &mut self.anchor_genovec,
                            anchor_vidx,
                        )?;
                        self.anchor_vidx = Some(anchor_vidx);
                    }
                    let (len, rec_type) = self.load_record(vidx)?;
                    record::decode_record(
                        rec_type,
                        &self.rec_buf[..len],
                        n,
                        Some(&self.anchor_genovec),
                        want_dosage,
                        &mut self.raw_genovec,
                        vidx,
                    )
                } else {
                    let (len, rec_type) = self.load_record(vidx)?;
                    let track = record::decode_record(
                        rec_type,
                        &self.rec_buf[..len],
                        n,
                        None,
                        want_dosage,
                        &mut self.raw_genovec,
                        vidx,
                    )?;
                    // Cache this decode as the anchor for LD-compressed
                    // successors in the same block.
                    self.anchor_genovec.copy_from_slice(&self.raw_genovec);
                    self.anchor_vidx = Some(vidx);
                    Ok(track)
                }
            }
        }
    }

    /// Copy or gather the raw-space scratch into effective space.
    fn emit_genovec(&self, out: &mut [u64]) {
        match &self.subset {
            None => {
                let n = self.raw_genovec.len().min(out.len());
                out[..n].copy_from_slice(&self.raw_genovec[..n]);
                for w in out[n..].iter_mut() {
                    *w = 0;
                }
            }
            Some(subset) => {
                for w in out.iter_mut() {
                    *w = 0;
                }
                let include = subset.include_words();
                let word_ct = bit_ct_to_word_ct(subset.raw_sample_ct as usize);
                let mut pos = 0usize;
                for (w, &bits_word) in include[..word_ct].iter().enumerate() {
                    let mut bits = bits_word;
                    while bits != 0 {
                        let idx = w * BITS_PER_WORD + bits.trailing_zeros() as usize;
                        set_nyp(out, pos, get_nyp(&self.raw_genovec, idx));
                        pos += 1;
                        bits &= bits - 1;
                    }
                }
            }
        }
    }

    /// Dense subset-aware genotype decode. `out` must hold
    /// [`Self::genovec_word_ct`] words.
    pub fn read_genotypes(&mut self, vidx: u32, out: &mut [u64]) -> Result<()> {
        self.decode_raw(vidx, false)?;
        self.emit_genovec(out);
        Ok(())
    }

    /// `[hom_ref, het, hom_alt, missing]` over the effective samples,
    /// without materializing a subsetted genovec. Constant-base records
    /// are counted straight off their exception lists; everything else
    /// is counted word-parallel under the interleaved subset mask.
    pub fn genotype_counts(&mut self, vidx: u32) -> Result<[u32; 4]> {
        self.check_vidx(vidx)?;
        let eff = self.effective_sample_ct();

        if self.info.mode() == StorageMode::Variable {
            let rec_type = self.info.rec_type(vidx);
            let kind = rec_type & 0x07;
            if matches!(kind, 4 | 6 | 7) && rec_type & RT_MULTIALLELIC == 0 {
                let n = self.info.raw_sample_ct() as usize;
                let (len, _) = self.load_record(vidx)?;
                let (base, exceptions) =
                    record::read_exception_list(rec_type, &self.rec_buf[..len], n, vidx)?;
                let mut counts = [0u32; 4];
                counts[base as usize] = eff;
                for (raw_idx, val) in exceptions {
                    let included = self
                        .subset
                        .as_ref()
                        .map(|s| s.contains(raw_idx))
                        .unwrap_or(true);
                    if included && val != base {
                        counts[base as usize] -= 1;
                        counts[val as usize] += 1;
                    }
                }
                return Ok(counts);
            }
        }

        self.decode_raw(vidx, false)?;
        Ok(self.count_raw())
    }

    fn count_raw(&self) -> [u32; 4] {
        let word_ct = nyp_ct_to_word_ct(self.info.raw_sample_ct() as usize);
        let mask = self.subset.as_ref().map(|s| s.interleaved_mask());
        let eff = self.effective_sample_ct();

        let mut het = 0u32;
        let mut hom_alt = 0u32;
        let mut missing = 0u32;
        for w in 0..word_ct {
            let mut v = self.raw_genovec[w];
            if let Some(mask) = mask {
                v &= mask[w];
            }
            let lo = v & LOW_NYP_MASK;
            let hi = (v >> 1) & LOW_NYP_MASK;
            het += (lo & !hi).count_ones();
            hom_alt += (hi & !lo).count_ones();
            missing += (lo & hi).count_ones();
        }
        [eff - het - hom_alt - missing, het, hom_alt, missing]
    }

    /// Missingness bitmask in effective sample space. `out` must hold
    /// [`Self::missingness_word_ct`] words.
    pub fn read_missingness(&mut self, vidx: u32, out: &mut [u64]) -> Result<()> {
        self.decode_raw(vidx, false)?;
        for w in out.iter_mut() {
            *w = 0;
        }
        let word_ct = nyp_ct_to_word_ct(self.info.raw_sample_ct() as usize);
        for w in 0..word_ct {
            let v = self.raw_genovec[w];
            let mut miss = v & (v >> 1) & LOW_NYP_MASK;
            while miss != 0 {
                let raw_idx = w * 32 + miss.trailing_zeros() as usize / 2;
                match &self.subset {
                    None => set_bit(raw_idx, out),
                    Some(s) => {
                        if s.contains(raw_idx as u32) {
                            set_bit(s.subset_position(raw_idx as u32) as usize, out);
                        }
                    }
                }
                miss &= miss - 1;
            }
        }
        Ok(())
    }

    /// Dense dosage decode into `buf`, effective sample space.
    pub fn read_dosages(&mut self, vidx: u32, buf: &mut DosageBuf) -> Result<()> {
        let track = self.decode_raw(vidx, true)?;
        self.emit_genovec(&mut buf.genovec);

        let eff = self.effective_sample_ct() as usize;
        for w in buf.present.iter_mut() {
            *w = 0;
        }
        buf.dosage_ct = 0;
        for s in 0..eff {
            buf.doubles[s] = match get_nyp(&buf.genovec, s) {
                code @ (0 | 1 | 2) => code as f64,
                _ => DOSAGE_MISSING,
            };
        }

        if let Some(track) = track {
            for (&raw_idx, &value) in track.ids.iter().zip(&track.values) {
                if value == u16::MAX {
                    continue;
                }
                let pos = match &self.subset {
                    None => raw_idx as usize,
                    Some(s) => {
                        if !s.contains(raw_idx) {
                            continue;
                        }
                        s.subset_position(raw_idx) as usize
                    }
                };
                set_bit(pos, &mut buf.present);
                buf.doubles[pos] = value as f64 / DOSAGE_UNIT;
                buf.dosage_ct += 1;
            }
        }
        Ok(())
    }
}

/// Scratch for the dosage decode path: the hardcall genovec, the
/// explicit-dosage presence bitmask, and the expanded per-sample
/// doubles (`-9.0` for missing).
pub struct DosageBuf {
    pub genovec: CachelineVec,
    pub present: CachelineVec,
    pub doubles: Vec<f64>,
    pub dosage_ct: u32,
}

impl DosageBuf {
    pub fn new(reader: &PgenReader) -> Self {
        DosageBuf {
            genovec: reader.alloc_genovec(),
            present: reader.alloc_missingness(),
            doubles: vec![0.0; reader.effective_sample_ct() as usize],
            dosage_ct: 0,
        }
    }
}
