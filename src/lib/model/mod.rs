//! Data entities flowing through the pipeline.
//!
//! A [`VariantRecord`] is one variant call for one sample. The reference row
//! types are read-only background data loaded once per run. Identity within a
//! table is the `(chrom, pos)` pair; every cross-table join keys on it.

use crate::core::errors::{RedError, Result};

/// Normalize a chromosome name to the canonical `chrN` form.
///
/// Names already carrying a `chr`/`Chr`/`CHR` prefix are rewritten with the
/// lowercase prefix; bare names (`1`, `X`, `MT`) get the prefix prepended.
pub fn normalize_chrom(name: &str) -> String {
    let trimmed = name.trim();
    // `get` rather than slicing: a multi-byte character straddling the
    // third byte must not abort the reader that hit it.
    match trimmed.get(..3) {
        Some(prefix) if prefix.eq_ignore_ascii_case("chr") => format!("chr{}", &trimmed[3..]),
        _ => format!("chr{}", trimmed),
    }
}

/// One variant call, plus the per-sample genotype block.
///
/// `ad` holds the allele-depth pair in `"ref/alt"` form (the VCF `AD` comma
/// is rewritten to `/` at parse time). The counts are re-parsed on demand so
/// that malformed depth strings surface as recoverable [`RedError::Parse`]
/// failures exactly where a stage needs them.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantRecord {
    pub chrom: String,
    pub pos: u64,
    pub id: String,
    pub ref_base: String,
    pub alt_base: String,
    pub qual: f64,
    pub filter: String,
    pub info: String,
    pub gt: String,
    pub ad: String,
    pub dp: String,
    pub gq: String,
    pub pl: String,
}

impl VariantRecord {
    /// Parse the `"ref/alt"` depth field into `(ref_count, alt_count)`.
    ///
    /// Fails with a parse error unless the field splits into exactly two
    /// non-negative integers.
    pub fn allele_depths(&self) -> Result<(u64, u64)> {
        let mut parts = self.ad.split('/');
        let (first, second) = match (parts.next(), parts.next(), parts.next()) {
            (Some(a), Some(b), None) => (a, b),
            _ => {
                return Err(RedError::Parse(format!(
                    "allele depth '{}' at {}:{} does not have exactly two fields",
                    self.ad, self.chrom, self.pos
                )))
            }
        };
        let parse = |s: &str| -> Result<u64> {
            s.trim().parse::<u64>().map_err(|_| {
                RedError::Parse(format!(
                    "allele depth '{}' at {}:{} is not a non-negative integer pair",
                    self.ad, self.chrom, self.pos
                ))
            })
        };
        Ok((parse(first)?, parse(second)?))
    }

    /// Total read depth at this site, `ref_count + alt_count`.
    pub fn total_depth(&self) -> Result<u64> {
        let (ref_count, alt_count) = self.allele_depths()?;
        Ok(ref_count + alt_count)
    }

    /// Editing level `alt / (alt + ref)`.
    pub fn editing_level(&self) -> Result<f64> {
        let (ref_count, alt_count) = self.allele_depths()?;
        let total = ref_count + alt_count;
        if total == 0 {
            return Err(RedError::Parse(format!(
                "zero total depth at {}:{}",
                self.chrom, self.pos
            )));
        }
        Ok(alt_count as f64 / total as f64)
    }
}

/// A surviving site annotated by the significance engine.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotatedSite {
    pub variant: VariantRecord,
    pub level: f64,
    pub pvalue: f64,
    /// Populated only for sites passing the FDR threshold.
    pub fdr: Option<f64>,
}

/// A repeat-masked genomic interval, `[start, end]` inclusive and 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct RepeatRegion {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub repeat_type: String,
}

/// One transcript row of a RefSeq-like gene model.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneAnnotation {
    pub chrom: String,
    pub tx_start: u64,
    pub tx_end: u64,
    pub cds_start: u64,
    pub cds_end: u64,
    pub feature_type: String,
}

/// A known germline variant position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KnownSnp {
    pub chrom: String,
    pub pos: u64,
}

/// A curated known-editing-database entry. `origin` names the source
/// database so that re-importing one source replaces only its own rows.
#[derive(Debug, Clone, PartialEq)]
pub struct KnownEditingSite {
    pub chrom: String,
    pub pos: u64,
    pub strand: String,
    pub ref_base: String,
    pub alt_base: String,
    pub origin: String,
}
