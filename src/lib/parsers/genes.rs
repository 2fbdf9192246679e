//! Reader for RefSeq-like gene-model tables:
//! `chrom txStart txEnd cdsStart cdsEnd type` columns.

use crate::core::errors::Result;
use crate::core::io::get_reader;
use crate::model::{normalize_chrom, GeneAnnotation};
use log::{info, warn};
use std::io::BufRead;
use std::path::Path;

pub fn read_gene_annotations<P: AsRef<Path>>(path: P) -> Result<Vec<GeneAnnotation>> {
    let path = path.as_ref();
    let mut annotations = Vec::new();
    let mut skipped = 0u64;
    for (line_no, line) in get_reader(path)?.lines().enumerate() {
        let line = line?;
        match parse_line(&line) {
            Some(annotation) => annotations.push(annotation),
            None => {
                if !line.trim().is_empty() {
                    skipped += 1;
                    if skipped <= 5 {
                        warn!("{}:{}: unparsable gene row", path.display(), line_no + 1);
                    }
                }
            }
        }
    }
    info!(
        "loaded {} gene annotations from {} ({} rows skipped)",
        annotations.len(),
        path.display(),
        skipped
    );
    Ok(annotations)
}

fn parse_line(line: &str) -> Option<GeneAnnotation> {
    let fields: Vec<&str> = line.trim().split_whitespace().collect();
    if fields.len() < 6 {
        return None;
    }
    Some(GeneAnnotation {
        chrom: normalize_chrom(fields[0]),
        tx_start: fields[1].parse().ok()?,
        tx_end: fields[2].parse().ok()?,
        cds_start: fields[3].parse().ok()?,
        cds_end: fields[4].parse().ok()?,
        feature_type: fields[5].to_string(),
    })
}
