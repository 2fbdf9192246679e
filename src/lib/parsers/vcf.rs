//! Header-driven reader for tab-delimited variant-call files.
//!
//! `##` meta lines are ignored; the `#CHROM ...` line marks the start of
//! data. Each data line carries a FORMAT column whose colon-separated keys
//! define the order of the per-sample block; the reader extracts the
//! genotype fields it knows about and stores `AD` with its comma rewritten
//! to `/` (the `"ref/alt"` form the rest of the pipeline parses).
//!
//! Malformed lines become `Err(Parse)` items so the store can skip, log and
//! count them during bulk load.

use crate::core::errors::{RedError, Result};
use crate::core::io::get_reader;
use crate::model::{normalize_chrom, VariantRecord};
use std::io::{BufRead, Lines};
use std::path::Path;

pub struct VariantReader {
    lines: Lines<Box<dyn BufRead + Send>>,
    path: String,
    line_no: u64,
    /// Zero-based index of the sample column to read.
    sample: usize,
}

impl VariantReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(VariantReader {
            lines: get_reader(path.as_ref())?.lines(),
            path: path.as_ref().display().to_string(),
            line_no: 0,
            sample: 0,
        })
    }

    /// Read the genotype block of a different sample column.
    pub fn with_sample(mut self, sample: usize) -> Self {
        self.sample = sample;
        self
    }

    fn parse_data_line(&self, line: &str) -> Result<VariantRecord> {
        let fields: Vec<&str> = line.split('\t').collect();
        let sample_col = 9 + self.sample;
        if fields.len() <= sample_col {
            return Err(RedError::Parse(format!(
                "{}:{}: expected at least {} columns, got {}",
                self.path,
                self.line_no,
                sample_col + 1,
                fields.len()
            )));
        }
        let pos: u64 = fields[1].parse().map_err(|_| {
            RedError::Parse(format!(
                "{}:{}: invalid position '{}'",
                self.path, self.line_no, fields[1]
            ))
        })?;
        let qual: f64 = fields[5].parse().map_err(|_| {
            RedError::Parse(format!(
                "{}:{}: invalid quality '{}'",
                self.path, self.line_no, fields[5]
            ))
        })?;

        let format_keys: Vec<&str> = fields[8].split(':').collect();
        let sample_fields: Vec<&str> = fields[sample_col].split(':').collect();
        let lookup = |key: &str| -> String {
            format_keys
                .iter()
                .position(|k| *k == key)
                .and_then(|i| sample_fields.get(i))
                .map(|v| v.to_string())
                .unwrap_or_else(|| ".".to_string())
        };
        if !format_keys.contains(&"GT") {
            return Err(RedError::Parse(format!(
                "{}:{}: FORMAT column lacks GT",
                self.path, self.line_no
            )));
        }

        Ok(VariantRecord {
            chrom: normalize_chrom(fields[0]),
            pos,
            id: fields[2].to_string(),
            ref_base: fields[3].to_string(),
            alt_base: fields[4].to_string(),
            qual,
            filter: fields[6].to_string(),
            info: fields[7].to_string(),
            gt: lookup("GT"),
            ad: lookup("AD").replace(',', "/"),
            dp: lookup("DP"),
            gq: lookup("GQ"),
            pl: lookup("PL"),
        })
    }
}

impl Iterator for VariantReader {
    type Item = Result<VariantRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.is_empty() || line.starts_with("##") {
                continue;
            }
            if line.starts_with('#') {
                continue;
            }
            return Some(self.parse_data_line(&line));
        }
    }
}
