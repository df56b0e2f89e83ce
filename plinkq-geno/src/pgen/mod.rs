//! PGEN genotype container decoding (biallelic subset).
//!
//! A .pgen file stores one variable-width record per variant, each a
//! bit-packed track of 2-bit genotype codes (`0` hom-ref, `1` het, `2`
//! hom-alt, `3` missing) with optional trailing phase and dosage
//! tracks. Initialization is two-phase: [`probe`] reads the fixed
//! intro (magic, storage mode, raw counts); [`PgenFileInfo::open`]
//! additionally materializes the per-variant record index (types,
//! lengths, byte offsets) for the variable-width modes. The populated
//! info is immutable and shared across worker threads behind an `Arc`;
//! each thread then builds its own [`reader::PgenReader`] with an
//! independent file handle.
//!
//! Supported storage modes: 0x01 (PLINK 1 .bed payload, translated on
//! read), 0x02 (fixed-width hardcalls), 0x10/0x11 (variable-width
//! records). Fixed-width dosage modes (0x03/0x04) and external-index
//! modes (0x20/0x21) are not exposed; multiallelic record tracks are
//! rejected.

pub mod reader;
pub mod record;

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::{PlinkError, Result};

pub use reader::{DosageBuf, PgenReader};

pub(crate) fn corrupt(path: &Path, msg: impl Into<String>) -> PlinkError {
    PlinkError::io(
        path,
        std::io::Error::new(std::io::ErrorKind::InvalidData, msg.into()),
    )
}

/// How genotype records are laid out in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageMode {
    /// Mode 0x01: the payload is a PLINK 1 .bed byte stream.
    Bed,
    /// Mode 0x02: one fixed-width 2-bit record per variant.
    FixedHardcall,
    /// Modes 0x10/0x11: variable-width records with a block index.
    Variable,
}

/// Phase-1 header fields. For mode 0x01 the intro carries no counts;
/// they must come from the sidecars.
#[derive(Debug, Clone, Copy)]
pub struct PgenProbe {
    pub mode: StorageMode,
    pub raw_variant_ct: u32,
    pub raw_sample_ct: u32,
}

/// Variant and sample counts taken from the text sidecars, used to
/// cross-check the binary header (and to supply counts for mode 0x01).
#[derive(Debug, Clone, Copy)]
pub struct SidecarCounts {
    pub variant_ct: u32,
    pub sample_ct: Option<u32>,
}

/// Probe the fixed intro of a .pgen file.
pub fn probe(path: &Path) -> Result<PgenProbe> {
    let mut file = File::open(path).map_err(|e| PlinkError::io(path, e))?;
    let mut intro = [0u8; 11];
    let n = read_up_to(&mut file, &mut intro).map_err(|e| PlinkError::io(path, e))?;
    if n < 3 {
        return Err(corrupt(path, ".pgen file too small"));
    }
    if intro[0] != 0x6c || intro[1] != 0x1b {
        return Err(corrupt(path, "not a .pgen file (bad magic number)"));
    }
    let mode = match intro[2] {
        0x01 => {
            return Ok(PgenProbe {
                mode: StorageMode::Bed,
                raw_variant_ct: 0,
                raw_sample_ct: 0,
            })
        }
        0x02 => StorageMode::FixedHardcall,
        0x03 | 0x04 => {
            return Err(PlinkError::NotImplemented(
                "fixed-width dosage .pgen modes (0x03/0x04) are not supported".into(),
            ))
        }
        0x10 | 0x11 => StorageMode::Variable,
        0x20 | 0x21 => {
            return Err(PlinkError::NotImplemented(
                "external-index .pgen modes (0x20/0x21) are not supported".into(),
            ))
        }
        other => {
            return Err(corrupt(
                path,
                format!("unsupported .pgen storage mode 0x{other:02x}"),
            ))
        }
    };
    if n < 11 {
        return Err(corrupt(path, ".pgen header truncated"));
    }
    Ok(PgenProbe {
        mode,
        raw_variant_ct: u32::from_le_bytes(intro[3..7].try_into().unwrap()),
        raw_sample_ct: u32::from_le_bytes(intro[7..11].try_into().unwrap()),
    })
}

fn read_up_to(file: &mut File, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut total = 0;
    while total < buf.len() {
        let n = file.read(&mut buf[total..])?;
        if n == 0 {
            break;
        }
        total += n;
    }
    Ok(total)
}

/// Populated header context: counts, record index, and the per-reader
/// sizing information. Immutable once built.
#[derive(Debug)]
pub struct PgenFileInfo {
    mode: StorageMode,
    raw_variant_ct: u32,
    raw_sample_ct: u32,
    /// Per-variant record descriptor byte (variable modes only).
    rec_types: Vec<u8>,
    /// Absolute byte offset of each record (variable modes only).
    rec_offsets: Vec<u64>,
    rec_lens: Vec<u32>,
    /// Record width for the fixed-width modes.
    fixed_rec_len: usize,
    first_rec_offset: u64,
    max_record_width: usize,
}

const VARIANTS_PER_BLOCK: usize = 1 << 16;

impl PgenFileInfo {
    /// Probe and populate. `sidecar` supplies counts for mode 0x01 and
    /// is cross-checked against the binary header otherwise.
    pub fn open(path: &Path, sidecar: SidecarCounts) -> Result<Self> {
        let probe = probe(path)?;
        let mut file = File::open(path).map_err(|e| PlinkError::io(path, e))?;
        let file_len = file
            .metadata()
            .map_err(|e| PlinkError::io(path, e))?
            .len();

        let (raw_variant_ct, raw_sample_ct) = match probe.mode {
            StorageMode::Bed => {
                let sample_ct = sidecar.sample_ct.ok_or_else(|| {
                    PlinkError::invalid(
                        "mode 0x01 .pgen carries no sample count; a .psam/.fam file is required",
                    )
                })?;
                (sidecar.variant_ct, sample_ct)
            }
            _ => {
                if probe.raw_variant_ct != sidecar.variant_ct {
                    return Err(PlinkError::invalid(format!(
                        "variant count mismatch: .pgen has {} variants, .pvar/.bim has {}",
                        probe.raw_variant_ct, sidecar.variant_ct
                    )));
                }
                if let Some(sample_ct) = sidecar.sample_ct {
                    if probe.raw_sample_ct != sample_ct {
                        return Err(PlinkError::invalid(format!(
                            "sample count mismatch: .pgen has {} samples, .psam/.fam has {}",
                            probe.raw_sample_ct, sample_ct
                        )));
                    }
                }
                (probe.raw_variant_ct, probe.raw_sample_ct)
            }
        };

        let mut info = PgenFileInfo {
            mode: probe.mode,
            raw_variant_ct,
            raw_sample_ct,
            rec_types: Vec::new(),
            rec_offsets: Vec::new(),
            rec_lens: Vec::new(),
            fixed_rec_len: 0,
            first_rec_offset: 0,
            max_record_width: 0,
        };

        match probe.mode {
            StorageMode::Bed => {
                info.fixed_rec_len = (raw_sample_ct as usize).div_ceil(4);
                info.first_rec_offset = 3;
                info.max_record_width = info.fixed_rec_len;
            }
            StorageMode::FixedHardcall => {
                let fmt = read_byte_at(&mut file, path, 11)?;
                info.fixed_rec_len = (raw_sample_ct as usize).div_ceil(4);
                let mut base = 12u64;
                // Provisional-reference flag block precedes the records
                // when the format byte announces per-variant flags.
                if (fmt >> 6) & 0x03 == 3 {
                    base += (raw_variant_ct as u64).div_ceil(8);
                }
                info.first_rec_offset = base;
                info.max_record_width = info.fixed_rec_len;
            }
            StorageMode::Variable => {
                info.populate_variable_index(&mut file, path)?;
            }
        }

        // Fixed-width layouts admit a whole-file size check up front.
        if info.fixed_rec_len > 0 {
            let expected = info.first_rec_offset
                + (raw_variant_ct as u64) * (info.fixed_rec_len as u64);
            if file_len < expected {
                return Err(corrupt(
                    path,
                    format!(
                        ".pgen truncated: expected at least {} bytes, found {}",
                        expected, file_len
                    ),
                ));
            }
        }

        tracing::debug!(
            mode = ?info.mode,
            variants = info.raw_variant_ct,
            samples = info.raw_sample_ct,
            max_record_width = info.max_record_width,
            "populated .pgen header context"
        );

        Ok(info)
    }

    /// Phase 2 for the variable-width modes: read the block offset
    /// table and per-variant record types/lengths, then prefix-sum
    /// record offsets so readers can seek directly.
    fn populate_variable_index(&mut self, file: &mut File, path: &Path) -> Result<()> {
        let m = self.raw_variant_ct as usize;
        let fmt = read_byte_at(file, path, 11)?;
        let type_bits: usize = if (fmt & 0x0f) <= 3 { 4 } else { 8 };
        let len_bytes: usize = match fmt & 0x07 {
            0 | 4 => 1,
            1 | 5 => 2,
            2 | 6 => 3,
            _ => 4,
        };
        let ac_bytes: usize = match (fmt >> 4) & 0x03 {
            0 => 0,
            1 => 1,
            2 => 2,
            _ => 4,
        };
        let ref_flag_mode = (fmt >> 6) & 0x03;

        let block_ct = m.div_ceil(VARIANTS_PER_BLOCK);
        let mut block_offsets = vec![0u64; block_ct];
        file.seek(SeekFrom::Start(12))
            .map_err(|e| PlinkError::io(path, e))?;
        for slot in block_offsets.iter_mut() {
            let mut buf = [0u8; 8];
            file.read_exact(&mut buf)
                .map_err(|e| PlinkError::io(path, e))?;
            *slot = u64::from_le_bytes(buf);
        }

        self.rec_types = vec![0u8; m];
        self.rec_lens = vec![0u32; m];

        let mut idx = 0usize;
        for _ in 0..block_ct {
            let cnt = (m - idx).min(VARIANTS_PER_BLOCK);

            if type_bits == 4 {
                let mut buf = vec![0u8; cnt.div_ceil(2)];
                file.read_exact(&mut buf)
                    .map_err(|e| PlinkError::io(path, e))?;
                for (i, byte) in buf.iter().enumerate() {
                    self.rec_types[idx + 2 * i] = byte & 0x0f;
                    if idx + 2 * i + 1 < idx + cnt {
                        self.rec_types[idx + 2 * i + 1] = (byte >> 4) & 0x0f;
                    }
                }
            } else {
                file.read_exact(&mut self.rec_types[idx..idx + cnt])
                    .map_err(|e| PlinkError::io(path, e))?;
            }

            let mut buf = vec![0u8; cnt * len_bytes];
            file.read_exact(&mut buf)
                .map_err(|e| PlinkError::io(path, e))?;
            for i in 0..cnt {
                let s = i * len_bytes;
                let mut word = [0u8; 4];
                word[..len_bytes].copy_from_slice(&buf[s..s + len_bytes]);
                self.rec_lens[idx + i] = u32::from_le_bytes(word);
            }

            // Allele counts and provisional-reference flags are not
            // consumed by the biallelic decode paths; skip over them.
            let mut skip = (cnt * ac_bytes) as i64;
            if ref_flag_mode == 3 {
                skip += cnt.div_ceil(8) as i64;
            }
            if skip > 0 {
                file.seek(SeekFrom::Current(skip))
                    .map_err(|e| PlinkError::io(path, e))?;
            }

            idx += cnt;
        }

        self.rec_offsets = vec![0u64; m];
        for block in 0..block_ct {
            let start = block * VARIANTS_PER_BLOCK;
            let end = (start + VARIANTS_PER_BLOCK).min(m);
            let mut off = block_offsets[block];
            for vidx in start..end {
                self.rec_offsets[vidx] = off;
                off += self.rec_lens[vidx] as u64;
            }
        }

        self.max_record_width = self.rec_lens.iter().copied().max().unwrap_or(0) as usize;
        Ok(())
    }

    pub fn mode(&self) -> StorageMode {
        self.mode
    }

    pub fn raw_variant_ct(&self) -> u32 {
        self.raw_variant_ct
    }

    pub fn raw_sample_ct(&self) -> u32 {
        self.raw_sample_ct
    }

    /// Widest record in the file; sizes each reader's record buffer.
    pub fn max_record_width(&self) -> usize {
        self.max_record_width
    }

    /// Byte span and descriptor of one record.
    pub(crate) fn record_span(&self, vidx: u32) -> (u64, usize, u8) {
        match self.mode {
            StorageMode::Bed | StorageMode::FixedHardcall => (
                self.first_rec_offset + (vidx as u64) * (self.fixed_rec_len as u64),
                self.fixed_rec_len,
                0,
            ),
            StorageMode::Variable => (
                self.rec_offsets[vidx as usize],
                self.rec_lens[vidx as usize] as usize,
                self.rec_types[vidx as usize],
            ),
        }
    }

    pub(crate) fn rec_type(&self, vidx: u32) -> u8 {
        match self.mode {
            StorageMode::Variable => self.rec_types[vidx as usize],
            _ => 0,
        }
    }
}

fn read_byte_at(file: &mut File, path: &Path, offset: u64) -> Result<u8> {
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| PlinkError::io(path, e))?;
    let mut b = [0u8; 1];
    file.read_exact(&mut b).map_err(|e| PlinkError::io(path, e))?;
    Ok(b[0])
}
