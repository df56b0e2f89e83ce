//! Per-record track decoding.
//!
//! Every decode lands in a word-packed genovec over the *raw* sample
//! space (2 bits per sample, trailing lanes zeroed); subsetting happens
//! afterwards in the reader. Record descriptor layout, low 3 bits =
//! main-track kind:
//!
//! - 0: direct 2-bit track
//! - 1: 1-bit track over a common pair of categories, plus a patch
//!   difflist
//! - 2/3: difflist of differences vs the most recent non-LD record in
//!   the same block (3 additionally swaps hom-ref/hom-alt)
//! - 4/6/7: difflist of exceptions from an all-hom-ref / all-hom-alt /
//!   all-missing base
//!
//! Bit 3 marks multiallelic patch tracks (rejected here), bit 4 a
//! phase track (skipped), bits 5/6 the dosage track shapes.

use crate::aligned::NYPS_PER_WORD;
use crate::error::{PlinkError, Result};

pub(crate) const LOW_NYP_MASK: u64 = 0x5555_5555_5555_5555;

/// Record-type bits beyond the main-track kind.
pub(crate) const RT_MULTIALLELIC: u8 = 0x08;
pub(crate) const RT_PHASED: u8 = 0x10;
pub(crate) const RT_DOSAGE_BITS: u8 = 0x60;

/// Translate PLINK 1 .bed codes to genovec codes. bed: 0b00 hom-alt,
/// 0b01 missing, 0b10 het, 0b11 hom-ref.
const fn build_bed_lut() -> [u8; 256] {
    let map = [2u8, 3, 1, 0];
    let mut lut = [0u8; 256];
    let mut byte = 0usize;
    while byte < 256 {
        let mut out = 0u8;
        let mut lane = 0;
        while lane < 4 {
            let code = ((byte >> (2 * lane)) & 3) as usize;
            out |= map[code] << (2 * lane);
            lane += 1;
        }
        lut[byte] = out;
        byte += 1;
    }
    lut
}

const BED_TO_NYP: [u8; 256] = build_bed_lut();

#[inline]
fn clear_words(out: &mut [u64]) {
    for w in out.iter_mut() {
        *w = 0;
    }
}

/// Reassign the 2-bit lane at `sample_idx` (clearing it first).
#[inline]
pub(crate) fn assign_nyp(words: &mut [u64], sample_idx: usize, code: u8) {
    let shift = 2 * (sample_idx % NYPS_PER_WORD);
    let word = &mut words[sample_idx / NYPS_PER_WORD];
    *word = (*word & !(0b11u64 << shift)) | (((code & 3) as u64) << shift);
}

/// Unpack a fixed-width 2-bit record into genovec words, zeroing
/// trailing lanes. `translate_bed` applies the PLINK 1 code mapping.
pub(crate) fn unpack_2bit(
    buf: &[u8],
    sample_ct: usize,
    translate_bed: bool,
    out: &mut [u64],
) {
    clear_words(out);
    let byte_ct = sample_ct.div_ceil(4);
    for (i, &raw) in buf[..byte_ct].iter().enumerate() {
        let byte = if translate_bed { BED_TO_NYP[raw as usize] } else { raw };
        out[i / 8] |= (byte as u64) << (8 * (i % 8));
    }
    // Zero lanes past the final sample; partial trailing bytes may
    // carry junk in the unused lanes.
    let tail = sample_ct % NYPS_PER_WORD;
    if tail != 0 {
        let last = sample_ct / NYPS_PER_WORD;
        out[last] &= (1u64 << (2 * tail)) - 1;
    }
}

#[inline]
fn read_varint(buf: &[u8], cursor: &mut usize, vidx: u32) -> Result<u64> {
    let mut out = 0u64;
    let mut shift = 0u32;
    loop {
        let b = *buf
            .get(*cursor)
            .ok_or_else(|| PlinkError::decode(vidx, "unexpected end of record in varint"))?;
        *cursor += 1;
        out |= ((b & 0x7f) as u64) << shift;
        if b & 0x80 == 0 {
            return Ok(out);
        }
        shift += 7;
        if shift > 63 {
            return Err(PlinkError::decode(vidx, "varint too large"));
        }
    }
}

#[inline]
fn sample_id_bytes(sample_ct: usize) -> usize {
    if sample_ct <= 1 << 8 {
        1
    } else if sample_ct <= 1 << 16 {
        2
    } else if sample_ct <= 1 << 24 {
        3
    } else {
        4
    }
}

fn read_sample_id(buf: &[u8], cursor: &mut usize, id_bytes: usize, vidx: u32) -> Result<u32> {
    if *cursor + id_bytes > buf.len() {
        return Err(PlinkError::decode(vidx, "unexpected end of record in sample ID"));
    }
    let mut word = [0u8; 4];
    word[..id_bytes].copy_from_slice(&buf[*cursor..*cursor + id_bytes]);
    *cursor += id_bytes;
    Ok(u32::from_le_bytes(word))
}

/// A decoded difflist: ascending raw sample indices, and a 2-bit value
/// per entry when the list carries values.
struct Difflist {
    ids: Vec<u32>,
    values: Vec<u8>,
}

/// Difflist wire layout: entry count (varint); one starting sample ID
/// per 64-entry group; one byte-length byte per non-final group (offset
/// by 63); packed 2-bit values when `with_values`; then the per-group
/// delta varints.
fn read_difflist(
    buf: &[u8],
    cursor: &mut usize,
    sample_ct: usize,
    with_values: bool,
    vidx: u32,
) -> Result<Difflist> {
    let len = read_varint(buf, cursor, vidx)? as usize;
    if len == 0 {
        return Ok(Difflist {
            ids: Vec::new(),
            values: Vec::new(),
        });
    }
    if len > sample_ct {
        return Err(PlinkError::decode(vidx, "difflist longer than sample count"));
    }
    let group_ct = len.div_ceil(64);
    let id_bytes = sample_id_bytes(sample_ct);

    let mut first_ids = Vec::with_capacity(group_ct);
    for _ in 0..group_ct {
        first_ids.push(read_sample_id(buf, cursor, id_bytes, vidx)?);
    }

    let mut group_byte_lens = Vec::with_capacity(group_ct.saturating_sub(1));
    if group_ct > 1 {
        if *cursor + group_ct - 1 > buf.len() {
            return Err(PlinkError::decode(vidx, "unexpected end of difflist group lengths"));
        }
        for &raw in &buf[*cursor..*cursor + group_ct - 1] {
            group_byte_lens.push(raw as usize + 63);
        }
        *cursor += group_ct - 1;
    }

    let mut values = Vec::new();
    if with_values {
        let packed = len.div_ceil(4);
        if *cursor + packed > buf.len() {
            return Err(PlinkError::decode(vidx, "unexpected end of difflist values"));
        }
        values.reserve(len);
        'outer: for &b in &buf[*cursor..*cursor + packed] {
            for lane in 0..4 {
                values.push((b >> (2 * lane)) & 3);
                if values.len() == len {
                    break 'outer;
                }
            }
        }
        *cursor += packed;
    }

    let mut ids = Vec::with_capacity(len);
    for g in 0..group_ct {
        let elems = if g + 1 < group_ct { 64 } else { len - 64 * (group_ct - 1) };
        let group_start = *cursor;
        let mut prev = first_ids[g];
        ids.push(prev);
        for _ in 1..elems {
            let delta = read_varint(buf, cursor, vidx)? as u32;
            prev = prev
                .checked_add(delta)
                .ok_or_else(|| PlinkError::decode(vidx, "difflist sample ID overflow"))?;
            ids.push(prev);
        }
        if g + 1 < group_ct && *cursor - group_start != group_byte_lens[g] {
            return Err(PlinkError::decode(vidx, "difflist group byte-length mismatch"));
        }
    }

    if ids.iter().any(|&id| id as usize >= sample_ct) {
        return Err(PlinkError::decode(vidx, "difflist sample ID out of range"));
    }

    Ok(Difflist { ids, values })
}

fn apply_difflist(out: &mut [u64], list: &Difflist) {
    for (&id, &val) in list.ids.iter().zip(&list.values) {
        assign_nyp(out, id as usize, val);
    }
}

/// Decode the main genotype track, advancing `cursor` past it.
/// `anchor` must hold the decoded genovec of the record's LD anchor for
/// kinds 2/3.
fn decode_main_track(
    rec_type: u8,
    buf: &[u8],
    cursor: &mut usize,
    sample_ct: usize,
    anchor: Option<&[u64]>,
    out: &mut [u64],
    vidx: u32,
) -> Result<()> {
    match rec_type & 0x07 {
        0 => {
            let need = sample_ct.div_ceil(4);
            if buf.len() < *cursor + need {
                return Err(PlinkError::decode(vidx, "truncated 2-bit genotype track"));
            }
            unpack_2bit(&buf[*cursor..], sample_ct, false, out);
            *cursor += need;
        }
        1 => {
            let pair = *buf
                .get(*cursor)
                .ok_or_else(|| PlinkError::decode(vidx, "missing 1-bit pair byte"))?;
            *cursor += 1;
            let (low, high) = match pair {
                1 => (0u8, 1u8),
                2 => (0, 2),
                3 => (0, 3),
                5 => (1, 2),
                6 => (1, 3),
                9 => (2, 3),
                _ => return Err(PlinkError::decode(vidx, "invalid 1-bit pair code")),
            };
            fill_nyp(out, sample_ct, low);
            let bit_bytes = sample_ct.div_ceil(8);
            if *cursor + bit_bytes > buf.len() {
                return Err(PlinkError::decode(vidx, "truncated 1-bit genotype track"));
            }
            for (byte_idx, &byte) in buf[*cursor..*cursor + bit_bytes].iter().enumerate() {
                let mut bits = byte;
                while bits != 0 {
                    let bit = bits.trailing_zeros() as usize;
                    let sample = byte_idx * 8 + bit;
                    if sample < sample_ct {
                        assign_nyp(out, sample, high);
                    }
                    bits &= bits - 1;
                }
            }
            *cursor += bit_bytes;
            let patch = read_difflist(buf, cursor, sample_ct, true, vidx)?;
            apply_difflist(out, &patch);
        }
        kind @ (2 | 3) => {
            let anchor = anchor
                .ok_or_else(|| PlinkError::decode(vidx, "LD-compressed record without anchor"))?;
            out.copy_from_slice(&anchor[..out.len()]);
            let diff = read_difflist(buf, cursor, sample_ct, true, vidx)?;
            apply_difflist(out, &diff);
            if kind == 3 {
                invert_homs(out, sample_ct);
            }
        }
        kind @ (4 | 6 | 7) => {
            let base = match kind {
                4 => 0u8,
                6 => 2,
                _ => 3,
            };
            fill_nyp(out, sample_ct, base);
            let diff = read_difflist(buf, cursor, sample_ct, true, vidx)?;
            apply_difflist(out, &diff);
        }
        other => {
            return Err(PlinkError::decode(
                vidx,
                format!("unsupported main genotype track kind {}", other),
            ));
        }
    }
    Ok(())
}

fn fill_nyp(out: &mut [u64], sample_ct: usize, code: u8) {
    let pattern = match code {
        0 => 0u64,
        1 => LOW_NYP_MASK,
        2 => LOW_NYP_MASK << 1,
        _ => u64::MAX,
    };
    clear_words(out);
    let full_words = sample_ct / NYPS_PER_WORD;
    for w in out[..full_words].iter_mut() {
        *w = pattern;
    }
    let tail = sample_ct % NYPS_PER_WORD;
    if tail != 0 {
        out[full_words] = pattern & ((1u64 << (2 * tail)) - 1);
    }
}

/// Swap hom-ref (0) and hom-alt (2) in place; het and missing are
/// unchanged. Trailing lanes past `sample_ct` are re-zeroed since the
/// flip would otherwise turn them into hom-alt codes.
fn invert_homs(out: &mut [u64], sample_ct: usize) {
    for w in out.iter_mut() {
        let lo = *w & LOW_NYP_MASK;
        // flip the high bit of every lane whose low bit is clear
        *w ^= (!lo & LOW_NYP_MASK) << 1;
    }
    let tail = sample_ct % NYPS_PER_WORD;
    let full_words = sample_ct / NYPS_PER_WORD;
    if tail != 0 {
        out[full_words] &= (1u64 << (2 * tail)) - 1;
        for w in out[full_words + 1..].iter_mut() {
            *w = 0;
        }
    } else {
        for w in out[full_words..].iter_mut() {
            *w = 0;
        }
    }
}

/// Raw-sample-space dosage track: ascending sample IDs with one u16
/// dosage each (scale: 16384 = one ALT allele).
#[derive(Debug)]
pub(crate) struct DosageTrack {
    pub ids: Vec<u32>,
    pub values: Vec<u16>,
}

fn read_dosage_values(
    buf: &[u8],
    cursor: &mut usize,
    count: usize,
    vidx: u32,
) -> Result<Vec<u16>> {
    if *cursor + 2 * count > buf.len() {
        return Err(PlinkError::decode(vidx, "unexpected end of dosage values"));
    }
    let mut values = Vec::with_capacity(count);
    for i in 0..count {
        values.push(u16::from_le_bytes([
            buf[*cursor + 2 * i],
            buf[*cursor + 2 * i + 1],
        ]));
    }
    *cursor += 2 * count;
    Ok(values)
}

/// Decode one record. Returns the dosage track when one is present and
/// `want_dosage` is set; phase tracks are skipped, multiallelic tracks
/// rejected.
pub(crate) fn decode_record(
    rec_type: u8,
    buf: &[u8],
    sample_ct: usize,
    anchor: Option<&[u64]>,
    want_dosage: bool,
    out: &mut [u64],
    vidx: u32,
) -> Result<Option<DosageTrack>> {
    let mut cursor = 0usize;
    decode_main_track(rec_type, buf, &mut cursor, sample_ct, anchor, out, vidx)?;

    if rec_type & RT_MULTIALLELIC != 0 {
        return Err(PlinkError::NotImplemented(format!(
            "variant {} carries a multiallelic patch track; only biallelic records are supported",
            vidx
        )));
    }

    if !want_dosage {
        return Ok(None);
    }

    if rec_type & RT_PHASED != 0 {
        skip_phase_track(buf, &mut cursor, out, vidx)?;
    }

    if rec_type & RT_DOSAGE_BITS == 0 {
        return Ok(None);
    }
    let b5 = rec_type & 0x20 != 0;
    let b6 = rec_type & 0x40 != 0;

    let track = if b5 && !b6 {
        // sparse: difflist of sample IDs, then one value per entry
        let list = read_difflist(buf, &mut cursor, sample_ct, false, vidx)?;
        let values = read_dosage_values(buf, &mut cursor, list.ids.len(), vidx)?;
        DosageTrack {
            ids: list.ids,
            values,
        }
    } else if !b5 && b6 {
        // dense: one value per sample, 65535 marks absent
        let values = read_dosage_values(buf, &mut cursor, sample_ct, vidx)?;
        let mut ids = Vec::new();
        let mut kept = Vec::new();
        for (s, &v) in values.iter().enumerate() {
            if v != u16::MAX {
                ids.push(s as u32);
                kept.push(v);
            }
        }
        DosageTrack { ids, values: kept }
    } else {
        // bitmask of covered samples, then one value per set bit
        let bit_bytes = sample_ct.div_ceil(8);
        if cursor + bit_bytes > buf.len() {
            return Err(PlinkError::decode(vidx, "unexpected end of dosage bitmask"));
        }
        let mut ids = Vec::new();
        for (byte_idx, &byte) in buf[cursor..cursor + bit_bytes].iter().enumerate() {
            let mut bits = byte;
            while bits != 0 {
                let bit = bits.trailing_zeros() as usize;
                let sample = byte_idx * 8 + bit;
                if sample < sample_ct {
                    ids.push(sample as u32);
                }
                bits &= bits - 1;
            }
        }
        cursor += bit_bytes;
        let values = read_dosage_values(buf, &mut cursor, ids.len(), vidx)?;
        DosageTrack { ids, values }
    };

    Ok(Some(track))
}

/// Fast-count support: for the constant-base record kinds (4/6/7),
/// expose the base category and exception pairs without a dense decode.
pub(crate) fn read_exception_list(
    rec_type: u8,
    buf: &[u8],
    sample_ct: usize,
    vidx: u32,
) -> Result<(u8, Vec<(u32, u8)>)> {
    let base = match rec_type & 0x07 {
        4 => 0u8,
        6 => 2,
        7 => 3,
        other => {
            return Err(PlinkError::decode(
                vidx,
                format!("record kind {} has no exception list", other),
            ))
        }
    };
    let mut cursor = 0usize;
    let list = read_difflist(buf, &mut cursor, sample_ct, true, vidx)?;
    Ok((base, list.ids.into_iter().zip(list.values).collect()))
}

/// The phase track length depends on the heterozygote count of the
/// decoded hardcalls; compute it and step over the track.
fn skip_phase_track(buf: &[u8], cursor: &mut usize, genovec: &[u64], vidx: u32) -> Result<()> {
    let het_ct: usize = genovec
        .iter()
        .map(|&w| {
            let lo = w & LOW_NYP_MASK;
            let hi = (w >> 1) & LOW_NYP_MASK;
            (lo & !hi).count_ones() as usize
        })
        .sum();

    let start = *cursor;
    let first = *buf
        .get(start)
        .ok_or_else(|| PlinkError::decode(vidx, "unexpected end of phase track"))?;

    let mut bit_cursor = 1usize; // the leading explicit-presence flag bit
    let mut phased_ct = het_ct;
    if first & 1 == 1 {
        let mut present = 0usize;
        for _ in 0..het_ct {
            let byte_idx = start + bit_cursor / 8;
            let byte = *buf
                .get(byte_idx)
                .ok_or_else(|| PlinkError::decode(vidx, "unexpected end of phase presence bits"))?;
            if (byte >> (bit_cursor % 8)) & 1 == 1 {
                present += 1;
            }
            bit_cursor += 1;
        }
        phased_ct = present;
        bit_cursor = bit_cursor.next_multiple_of(8);
    }
    bit_cursor += phased_ct;

    let bytes = bit_cursor.div_ceil(8);
    if start + bytes > buf.len() {
        return Err(PlinkError::decode(vidx, "unexpected end of phase track"));
    }
    *cursor = start + bytes;
    Ok(())
}

/// Wire-format encoders shared by the decoder unit tests.
#[cfg(test)]
pub(crate) mod testutil {
    use super::sample_id_bytes;

    pub(crate) fn encode_varint(mut v: u64, out: &mut Vec<u8>) {
        loop {
            let byte = (v & 0x7f) as u8;
            v >>= 7;
            if v == 0 {
                out.push(byte);
                break;
            }
            out.push(byte | 0x80);
        }
    }

    /// Difflist encoder matching `read_difflist` (single group: fewer
    /// than 65 entries).
    pub(crate) fn encode_difflist(
        entries: &[(u32, u8)],
        sample_ct: usize,
        with_values: bool,
    ) -> Vec<u8> {
        assert!(entries.len() <= 64);
        let mut out = Vec::new();
        encode_varint(entries.len() as u64, &mut out);
        if entries.is_empty() {
            return out;
        }
        let id_bytes = sample_id_bytes(sample_ct);
        out.extend_from_slice(&entries[0].0.to_le_bytes()[..id_bytes]);
        if with_values {
            let mut packed = vec![0u8; entries.len().div_ceil(4)];
            for (i, &(_, v)) in entries.iter().enumerate() {
                packed[i / 4] |= (v & 3) << (2 * (i % 4));
            }
            out.extend_from_slice(&packed);
        }
        for pair in entries.windows(2) {
            encode_varint((pair[1].0 - pair[0].0) as u64, &mut out);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::encode_difflist;
    use super::*;
    use crate::aligned::get_nyp;

    fn geno_codes(words: &[u64], n: usize) -> Vec<u8> {
        (0..n).map(|i| get_nyp(words, i)).collect()
    }

    #[test]
    fn test_unpack_2bit_direct() {
        // samples: 0,1,2,3,(3,0) -> byte0 = 0b11_10_01_00, byte1 = 0b00_00_00_11
        let buf = [0b1110_0100u8, 0b0000_0011u8];
        let mut out = vec![0u64; 8];
        unpack_2bit(&buf, 5, false, &mut out);
        assert_eq!(geno_codes(&out, 5), vec![0, 1, 2, 3, 3]);
        // trailing lanes cleared
        assert_eq!(out[0] >> 10, 0);
    }

    #[test]
    fn test_unpack_bed_translation() {
        // bed byte 0b11_10_01_00: s0=hom_alt s1=missing s2=het s3=hom_ref
        let buf = [0b1110_0100u8];
        let mut out = vec![0u64; 8];
        unpack_2bit(&buf, 4, true, &mut out);
        assert_eq!(geno_codes(&out, 4), vec![2, 3, 1, 0]);
    }

    #[test]
    fn test_main_track_constant_with_difflist() {
        // kind 4: all hom-ref, exceptions at 1 (het) and 3 (missing)
        let buf = encode_difflist(&[(1, 1), (3, 3)], 6, true);
        let mut out = vec![0u64; 8];
        decode_record(4, &buf, 6, None, false, &mut out, 0).unwrap();
        assert_eq!(geno_codes(&out, 6), vec![0, 1, 0, 3, 0, 0]);
    }

    #[test]
    fn test_main_track_all_missing_base() {
        let buf = encode_difflist(&[(0, 2)], 4, true);
        let mut out = vec![0u64; 8];
        decode_record(7, &buf, 4, None, false, &mut out, 0).unwrap();
        assert_eq!(geno_codes(&out, 4), vec![2, 3, 3, 3]);
    }

    #[test]
    fn test_main_track_onebit() {
        // pair code 2 => categories (0, 2); samples 1 and 2 take the
        // high category; patch sets sample 3 to missing.
        let mut buf = vec![2u8, 0b0000_0110u8];
        buf.extend(encode_difflist(&[(3, 3)], 5, true));
        let mut out = vec![0u64; 8];
        decode_record(1, &buf, 5, None, false, &mut out, 0).unwrap();
        assert_eq!(geno_codes(&out, 5), vec![0, 2, 2, 3, 0]);
    }

    #[test]
    fn test_ld_compressed_and_inverted() {
        let mut anchor = vec![0u64; 8];
        let anchor_buf = [0b1110_0100u8]; // 0,1,2,3
        unpack_2bit(&anchor_buf, 4, false, &mut anchor);

        // kind 2: patch sample 0 -> 2
        let buf = encode_difflist(&[(0, 2)], 4, true);
        let mut out = vec![0u64; 8];
        decode_record(2, &buf, 4, Some(&anchor), false, &mut out, 1).unwrap();
        assert_eq!(geno_codes(&out, 4), vec![2, 1, 2, 3]);

        // kind 3: same patch then hom swap
        let mut out = vec![0u64; 8];
        decode_record(3, &buf, 4, Some(&anchor), false, &mut out, 1).unwrap();
        assert_eq!(geno_codes(&out, 4), vec![0, 1, 0, 3]);
    }

    #[test]
    fn test_ld_without_anchor_fails() {
        let buf = encode_difflist(&[(0, 2)], 4, true);
        let mut out = vec![0u64; 8];
        assert!(decode_record(2, &buf, 4, None, false, &mut out, 5).is_err());
    }

    #[test]
    fn test_multiallelic_rejected() {
        let need = 4usize.div_ceil(4);
        let buf = vec![0u8; need];
        let mut out = vec![0u64; 8];
        let err = decode_record(RT_MULTIALLELIC, &buf, 4, None, false, &mut out, 2).unwrap_err();
        assert!(matches!(err, PlinkError::NotImplemented(_)));
    }

    #[test]
    fn test_sparse_dosage_track() {
        // kind 0 main track for 4 samples, then b5 dosage difflist for
        // samples 0 and 2
        let mut buf = vec![0b1110_0100u8];
        buf.extend(encode_difflist(&[(0, 0), (2, 0)], 4, false));
        buf.extend_from_slice(&8192u16.to_le_bytes()); // 0.5
        buf.extend_from_slice(&24576u16.to_le_bytes()); // 1.5
        let mut out = vec![0u64; 8];
        let track = decode_record(0x20, &buf, 4, None, true, &mut out, 0)
            .unwrap()
            .unwrap();
        assert_eq!(track.ids, vec![0, 2]);
        assert_eq!(track.values, vec![8192, 24576]);
    }

    #[test]
    fn test_dense_dosage_track() {
        let mut buf = vec![0b1110_0100u8];
        for v in [16384u16, u16::MAX, 0, 32768] {
            buf.extend_from_slice(&v.to_le_bytes());
        }
        let mut out = vec![0u64; 8];
        let track = decode_record(0x40, &buf, 4, None, true, &mut out, 0)
            .unwrap()
            .unwrap();
        // the 65535 entry is absent
        assert_eq!(track.ids, vec![0, 2, 3]);
        assert_eq!(track.values, vec![16384, 0, 32768]);
    }

    #[test]
    fn test_dosage_ignored_when_not_wanted() {
        let mut buf = vec![0b1110_0100u8];
        buf.extend(encode_difflist(&[(0, 0)], 4, false));
        buf.extend_from_slice(&8192u16.to_le_bytes());
        let mut out = vec![0u64; 8];
        let track = decode_record(0x20, &buf, 4, None, false, &mut out, 0).unwrap();
        assert!(track.is_none());
        assert_eq!(geno_codes(&out, 4), vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_truncated_record_fails() {
        let mut out = vec![0u64; 8];
        assert!(decode_record(0, &[0u8; 1], 33, None, false, &mut out, 9).is_err());
    }
}
