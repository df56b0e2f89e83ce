//! .psam/.fam sample metadata.
//!
//! Sample sidecars are small, so this table is always eagerly parsed.
//! Format detection from the first line: `#FID` or `#IID` header means
//! .psam (tab-delimited, named columns); no header means legacy .fam
//! (whitespace-delimited, fixed `FID IID PAT MAT SEX PHENO1`).
//!
//! Missing-value conventions: SEX maps `0`, `NA`, `.` and empty to
//! null; PAT/MAT additionally map `"0"` (unknown parent) to null; other
//! columns map `NA`/`.`/empty to null. The .fam PHENO1 column keeps
//! `-9` verbatim rather than imposing PLINK's missing-phenotype
//! sentinel on a generic column.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{PlinkError, Result};

/// Fully parsed sample sidecar with an IID -> index map.
#[derive(Debug)]
pub struct SampleInfo {
    /// Non-null, unique sample IDs in file order.
    pub iids: Vec<String>,
    /// Family IDs; empty when the file has no FID column.
    pub fids: Vec<String>,
    /// Sex codes, `1`/`2` or null.
    pub sexes: Vec<Option<i32>>,
    /// Paternal / maternal IDs, null when unknown.
    pub pats: Vec<Option<String>>,
    pub mats: Vec<Option<String>>,
    /// Remaining columns (phenotypes etc), raw values with nulls as `None`.
    pub pheno_names: Vec<String>,
    pub phenos: Vec<Vec<Option<String>>>,
    /// IID -> sample index.
    pub iid_to_idx: HashMap<String, u32>,
}

fn is_missing(val: &str) -> bool {
    val.is_empty() || val == "." || val == "NA" || val == "na"
}

fn parse_sex(val: &str) -> Option<i32> {
    if is_missing(val) {
        return None;
    }
    match val.parse::<i32>() {
        Ok(0) | Err(_) => None,
        Ok(v) => Some(v),
    }
}

fn parse_parent(val: &str) -> Option<String> {
    if val == "0" || is_missing(val) {
        None
    } else {
        Some(val.to_string())
    }
}

impl SampleInfo {
    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| PlinkError::io(path, e))?;
        let lines: Vec<&str> = contents
            .lines()
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return Err(PlinkError::invalid(format!(
                ".psam/.fam file '{}' is empty",
                path.display()
            )));
        }

        let (is_fam, column_names, data_start): (bool, Vec<String>, usize) =
            if let Some(header) = lines[0].strip_prefix('#') {
                let names: Vec<String> = header.split('\t').map(str::to_string).collect();
                match names.first().map(String::as_str) {
                    Some("FID") | Some("IID") => {}
                    _ => {
                        return Err(PlinkError::invalid(format!(
                            ".psam file '{}' header must start with #FID or #IID",
                            path.display()
                        )))
                    }
                }
                (false, names, 1)
            } else {
                let names = ["FID", "IID", "PAT", "MAT", "SEX", "PHENO1"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect();
                (true, names, 0)
            };

        let col = |name: &str| column_names.iter().position(|n| n == name);
        let iid_col = col("IID").ok_or_else(|| {
            PlinkError::invalid(format!(
                ".psam/.fam file '{}' has no IID column",
                path.display()
            ))
        })?;
        let fid_col = col("FID");
        let sex_col = col("SEX");
        let pat_col = col("PAT");
        let mat_col = col("MAT");

        let special: Vec<usize> = [Some(iid_col), fid_col, sex_col, pat_col, mat_col]
            .into_iter()
            .flatten()
            .collect();
        let pheno_cols: Vec<usize> = (0..column_names.len())
            .filter(|i| !special.contains(i))
            .collect();
        let pheno_names: Vec<String> = pheno_cols
            .iter()
            .map(|&i| column_names[i].clone())
            .collect();

        let mut info = SampleInfo {
            iids: Vec::new(),
            fids: Vec::new(),
            sexes: Vec::new(),
            pats: Vec::new(),
            mats: Vec::new(),
            pheno_names,
            phenos: Vec::new(),
            iid_to_idx: HashMap::new(),
        };

        for (line_no, line) in lines.iter().enumerate().skip(data_start) {
            let fields: Vec<&str> = if is_fam {
                line.split_ascii_whitespace().collect()
            } else {
                line.split('\t').collect()
            };
            if fields.len() < column_names.len() {
                return Err(PlinkError::invalid(format!(
                    ".psam/.fam file '{}' line {} has {} fields, expected {}",
                    path.display(),
                    line_no + 1,
                    fields.len(),
                    column_names.len()
                )));
            }

            let idx = info.iids.len() as u32;
            info.iids.push(fields[iid_col].to_string());
            info.iid_to_idx.insert(fields[iid_col].to_string(), idx);
            if let Some(c) = fid_col {
                info.fids.push(fields[c].to_string());
            }
            info.sexes.push(sex_col.and_then(|c| parse_sex(fields[c])));
            info.pats
                .push(pat_col.and_then(|c| parse_parent(fields[c])));
            info.mats
                .push(mat_col.and_then(|c| parse_parent(fields[c])));
            info.phenos.push(
                pheno_cols
                    .iter()
                    .map(|&c| {
                        let v = fields[c];
                        // "-9" survives here by design; only the generic
                        // missing tokens map to null.
                        if is_missing(v) {
                            None
                        } else {
                            Some(v.to_string())
                        }
                    })
                    .collect(),
            );
        }

        Ok(info)
    }

    pub fn sample_ct(&self) -> u32 {
        self.iids.len() as u32
    }

    /// Family ID for a sample, null when absent or missing-valued.
    pub fn fid(&self, idx: u32) -> Option<&str> {
        let v = self.fids.get(idx as usize)?;
        if is_missing(v) { None } else { Some(v.as_str()) }
    }

    pub fn iid(&self, idx: u32) -> &str {
        &self.iids[idx as usize]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_psam_with_fid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "x.psam",
            "#FID\tIID\tSEX\nF1\tS1\t1\nF1\tS2\t2\nF2\tS3\t0\nF2\tS4\tNA\n",
        );
        let info = SampleInfo::load(&path).unwrap();
        assert_eq!(info.sample_ct(), 4);
        assert_eq!(info.iid(0), "S1");
        assert_eq!(info.fid(0), Some("F1"));
        assert_eq!(info.sexes[0], Some(1));
        assert_eq!(info.sexes[2], None);
        assert_eq!(info.sexes[3], None);
        assert_eq!(info.iid_to_idx["S3"], 2);
    }

    #[test]
    fn test_psam_without_fid() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "x.psam", "#IID\tSEX\nS1\t2\nS2\t.\n");
        let info = SampleInfo::load(&path).unwrap();
        assert_eq!(info.sample_ct(), 2);
        assert_eq!(info.fid(0), None);
        assert_eq!(info.sexes[1], None);
    }

    #[test]
    fn test_fam_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(
            &dir,
            "x.fam",
            "F1 S1 0 0 1 -9\nF1 S2 S1 0 2 1.5\n",
        );
        let info = SampleInfo::load(&path).unwrap();
        assert_eq!(info.sample_ct(), 2);
        assert_eq!(info.fid(1), Some("F1"));
        assert_eq!(info.pats[0], None);
        assert_eq!(info.pats[1], Some("S1".to_string()));
        assert_eq!(info.mats[1], None);
        // PHENO1 keeps -9 verbatim
        assert_eq!(info.pheno_names, vec!["PHENO1"]);
        assert_eq!(info.phenos[0][0], Some("-9".to_string()));
        assert_eq!(info.phenos[1][0], Some("1.5".to_string()));
    }

    #[test]
    fn test_short_row_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "x.psam", "#FID\tIID\tSEX\nF1\tS1\n");
        assert!(matches!(
            SampleInfo::load(&path).unwrap_err(),
            PlinkError::InvalidInput(_)
        ));
    }

    #[test]
    fn test_empty_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_file(&dir, "x.psam", "");
        assert!(SampleInfo::load(&path).is_err());
    }
}
