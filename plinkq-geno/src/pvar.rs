//! .pvar/.bim variant metadata.
//!
//! Two views over the same sidecar, one contract:
//! - [`VariantIndex`]: memory-mapped file plus a per-line byte-offset
//!   table; fields are extracted zero-copy by re-splitting a line on
//!   demand. Immutable after construction, safe to share across threads.
//! - [`VariantColumns`]: the eagerly parsed columnar form, derived once
//!   via [`VariantIndex::to_columns`]. Cheaper when every output row
//!   touches metadata from many worker threads.
//!
//! Format detection follows PLINK conventions: a first non-`##` line
//! starting with `#CHROM` means .pvar (tab-delimited, named columns);
//! anything else means legacy .bim (whitespace-delimited, six fixed
//! columns `CHROM ID CM POS ALT REF`, normalized here to the .pvar
//! logical order `CHROM POS ID REF ALT CM`).

use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::error::{PlinkError, Result};

/// Half-open variant interval `[start, end)` produced by region
/// filtering, or defaulted to the full file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VariantRange {
    pub start: u32,
    pub end: u32,
}

impl VariantRange {
    pub fn full(variant_ct: u32) -> Self {
        VariantRange {
            start: 0,
            end: variant_ct,
        }
    }

    pub fn len(&self) -> u32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Logical metadata fields, in the normalized .pvar order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariantField {
    Chrom,
    Pos,
    Id,
    Ref,
    Alt,
    Cm,
}

/// Offset-indexed view of a .pvar/.bim file.
#[derive(Debug)]
pub struct VariantIndex {
    mmap: Mmap,
    /// (byte offset, byte length) of each data line, \r already trimmed.
    lines: Vec<(usize, u32)>,
    is_bim: bool,
    /// Physical field index of each logical column within a split line.
    chrom_col: usize,
    pos_col: usize,
    id_col: usize,
    ref_col: usize,
    alt_col: usize,
    cm_col: Option<usize>,
}

impl VariantIndex {
    /// Memory-map the sidecar and build the line-offset table.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| PlinkError::io(path, e))?;
        let len = file
            .metadata()
            .map_err(|e| PlinkError::io(path, e))?
            .len();
        if len == 0 {
            return Err(PlinkError::invalid(format!(
                ".pvar/.bim file '{}' is empty",
                path.display()
            )));
        }
        // Read-only map; the backing buffer lives as long as the index.
        let mmap = unsafe { Mmap::map(&file) }.map_err(|e| PlinkError::io(path, e))?;

        let mut raw_lines = Vec::new();
        let bytes = &mmap[..];
        let mut start = 0usize;
        for (i, &b) in bytes.iter().enumerate() {
            if b == b'\n' {
                raw_lines.push(trim_line(bytes, start, i));
                start = i + 1;
            }
        }
        if start < bytes.len() {
            raw_lines.push(trim_line(bytes, start, bytes.len()));
        }

        // Skip ## meta lines and blanks, then detect the format from the
        // first remaining line.
        let mut cursor = 0usize;
        while cursor < raw_lines.len() {
            let (off, len) = raw_lines[cursor];
            let line = &bytes[off..off + len as usize];
            if line.is_empty() || line.starts_with(b"##") {
                cursor += 1;
                continue;
            }
            break;
        }
        if cursor >= raw_lines.len() {
            return Err(PlinkError::invalid(format!(
                ".pvar/.bim file '{}' contains no header or data",
                path.display()
            )));
        }

        let (off, len) = raw_lines[cursor];
        let first = std::str::from_utf8(&bytes[off..off + len as usize])
            .map_err(|_| PlinkError::invalid("non-UTF-8 .pvar/.bim content"))?;

        let (is_bim, chrom_col, pos_col, id_col, ref_col, alt_col, cm_col);
        if first.starts_with("#CHROM") {
            is_bim = false;
            let names: Vec<&str> = first[1..].split('\t').collect();
            let find = |name: &str| names.iter().position(|n| *n == name);
            let required = |name: &str| {
                find(name).ok_or_else(|| {
                    PlinkError::invalid(format!(
                        ".pvar file '{}' is missing required column {} \
                         (need CHROM, POS, ID, REF, ALT)",
                        path.display(),
                        name
                    ))
                })
            };
            chrom_col = required("CHROM")?;
            pos_col = required("POS")?;
            id_col = required("ID")?;
            ref_col = required("REF")?;
            alt_col = required("ALT")?;
            cm_col = find("CM");
            cursor += 1; // past the header line
        } else {
            // .bim physical order: CHROM(0) ID(1) CM(2) POS(3) ALT(4) REF(5)
            is_bim = true;
            chrom_col = 0;
            id_col = 1;
            cm_col = Some(2);
            pos_col = 3;
            alt_col = 4;
            ref_col = 5;
        }

        let lines: Vec<(usize, u32)> = raw_lines[cursor..]
            .iter()
            .filter(|(o, l)| !bytes[*o..*o + *l as usize].is_empty())
            .copied()
            .collect();

        if lines.is_empty() {
            return Err(PlinkError::invalid(format!(
                ".pvar/.bim file '{}' contains no data rows",
                path.display()
            )));
        }

        Ok(VariantIndex {
            mmap,
            lines,
            is_bim,
            chrom_col,
            pos_col,
            id_col,
            ref_col,
            alt_col,
            cm_col,
        })
    }

    pub fn variant_ct(&self) -> u32 {
        self.lines.len() as u32
    }

    fn line(&self, vidx: u32) -> &str {
        let (off, len) = self.lines[vidx as usize];
        // UTF-8 validity was checked on the header; data rows are ASCII in
        // practice, so re-check lazily and treat failures as field errors.
        std::str::from_utf8(&self.mmap[off..off + len as usize]).unwrap_or("")
    }

    /// Zero-copy extraction of one field by re-splitting the line.
    pub fn field(&self, vidx: u32, field: VariantField) -> Result<&str> {
        let target = match field {
            VariantField::Chrom => self.chrom_col,
            VariantField::Pos => self.pos_col,
            VariantField::Id => self.id_col,
            VariantField::Ref => self.ref_col,
            VariantField::Alt => self.alt_col,
            VariantField::Cm => self.cm_col.ok_or_else(|| {
                PlinkError::invalid("no CM column in this .pvar file")
            })?,
        };
        let line = self.line(vidx);
        let found = if self.is_bim {
            line.split_ascii_whitespace().nth(target)
        } else {
            line.split('\t').nth(target)
        };
        found.ok_or_else(|| {
            PlinkError::invalid(format!(
                "variant line {} has too few fields",
                vidx
            ))
        })
    }

    pub fn chrom(&self, vidx: u32) -> Result<&str> {
        self.field(vidx, VariantField::Chrom)
    }

    pub fn pos(&self, vidx: u32) -> Result<i32> {
        let raw = self.field(vidx, VariantField::Pos)?;
        raw.parse::<i32>().map_err(|_| {
            PlinkError::invalid(format!("invalid POS value '{}' at variant {}", raw, vidx))
        })
    }

    /// Variant ID; `.` surfaces as `None`.
    pub fn id(&self, vidx: u32) -> Result<Option<&str>> {
        let raw = self.field(vidx, VariantField::Id)?;
        Ok(if raw == "." { None } else { Some(raw) })
    }

    pub fn ref_allele(&self, vidx: u32) -> Result<&str> {
        self.field(vidx, VariantField::Ref)
    }

    /// ALT allele; `.` surfaces as `None`.
    pub fn alt(&self, vidx: u32) -> Result<Option<&str>> {
        let raw = self.field(vidx, VariantField::Alt)?;
        Ok(if raw == "." { None } else { Some(raw) })
    }

    /// Linear ID lookup. Missing IDs (`.`) never match.
    pub fn find_by_id(&self, id: &str) -> Result<Option<u32>> {
        for vidx in 0..self.variant_ct() {
            if self.id(vidx)? == Some(id) {
                return Ok(Some(vidx));
            }
        }
        Ok(None)
    }

    /// Parse `"chrom:start-end"` (1-based, inclusive) into a variant
    /// range. Relies on the sidecar guarantee that each chromosome forms
    /// one contiguous block sorted by position, so the scan stops as
    /// soon as the block is passed.
    pub fn parse_region(&self, region: &str) -> Result<VariantRange> {
        let (chrom, start_pos, end_pos) = parse_region_string(region)?;

        let mut range = VariantRange { start: 0, end: 0 };
        let mut found = false;
        let mut in_block = false;
        for vidx in 0..self.variant_ct() {
            let same_chrom = self.chrom(vidx)? == chrom;
            if !same_chrom {
                if in_block {
                    break;
                }
                continue;
            }
            in_block = true;
            let pos = self.pos(vidx)?;
            if pos > end_pos {
                break;
            }
            if pos >= start_pos {
                if !found {
                    range.start = vidx;
                    found = true;
                }
                range.end = vidx + 1;
            }
        }
        Ok(range)
    }

    /// Materialize the eager columnar form, validating POS throughout.
    pub fn to_columns(&self) -> Result<VariantColumns> {
        let n = self.variant_ct();
        let mut cols = VariantColumns {
            chroms: Vec::with_capacity(n as usize),
            positions: Vec::with_capacity(n as usize),
            ids: Vec::with_capacity(n as usize),
            refs: Vec::with_capacity(n as usize),
            alts: Vec::with_capacity(n as usize),
        };
        for vidx in 0..n {
            cols.chroms.push(self.chrom(vidx)?.to_string());
            cols.positions.push(self.pos(vidx)?);
            cols.ids
                .push(self.id(vidx)?.unwrap_or("").to_string());
            cols.refs.push(self.ref_allele(vidx)?.to_string());
            cols.alts
                .push(self.alt(vidx)?.unwrap_or("").to_string());
        }
        Ok(cols)
    }
}

fn trim_line(bytes: &[u8], start: usize, end: usize) -> (usize, u32) {
    let mut end = end;
    if end > start && bytes[end - 1] == b'\r' {
        end -= 1;
    }
    (start, (end - start) as u32)
}

fn parse_region_string(region: &str) -> Result<(&str, i32, i32)> {
    let bad = || {
        PlinkError::invalid(format!(
            "invalid region '{}' (expected 'chrom:start-end')",
            region
        ))
    };
    let colon = region.find(':').ok_or_else(bad)?;
    if colon == 0 {
        return Err(bad());
    }
    let chrom = &region[..colon];
    let rest = &region[colon + 1..];
    let dash = rest.find('-').ok_or_else(bad)?;
    let start: i32 = rest[..dash].parse().map_err(|_| bad())?;
    let end: i32 = rest[dash + 1..].parse().map_err(|_| bad())?;
    if start < 0 || end < 0 {
        return Err(bad());
    }
    Ok((chrom, start, end))
}

/// Eager five-column variant metadata. Missing ID/ALT stored as `""`.
pub struct VariantColumns {
    pub chroms: Vec<String>,
    pub positions: Vec<i32>,
    pub ids: Vec<String>,
    pub refs: Vec<String>,
    pub alts: Vec<String>,
}

impl VariantColumns {
    pub fn variant_ct(&self) -> u32 {
        self.chroms.len() as u32
    }

    pub fn chrom(&self, vidx: u32) -> &str {
        &self.chroms[vidx as usize]
    }

    pub fn pos(&self, vidx: u32) -> i32 {
        self.positions[vidx as usize]
    }

    pub fn id(&self, vidx: u32) -> Option<&str> {
        let s = self.ids[vidx as usize].as_str();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }

    pub fn ref_allele(&self, vidx: u32) -> &str {
        &self.refs[vidx as usize]
    }

    pub fn alt(&self, vidx: u32) -> Option<&str> {
        let s = self.alts[vidx as usize].as_str();
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}
