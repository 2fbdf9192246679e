//! Reader for known-SNP tables: `chrom pos` columns.

use crate::core::errors::{RedError, Result};
use crate::core::io::get_reader;
use crate::model::{normalize_chrom, KnownSnp};
use std::io::{BufRead, Lines};
use std::path::Path;

/// Streaming reader so multi-million-row dbSNP extracts can be bulk-loaded
/// without materializing the file.
pub struct KnownSnpReader {
    lines: Lines<Box<dyn BufRead + Send>>,
    path: String,
    line_no: u64,
}

impl KnownSnpReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(KnownSnpReader {
            lines: get_reader(path.as_ref())?.lines(),
            path: path.as_ref().display().to_string(),
            line_no: 0,
        })
    }
}

impl Iterator for KnownSnpReader {
    type Item = Result<KnownSnp>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let mut fields = trimmed.split_whitespace();
            let chrom = match fields.next() {
                Some(chrom) => chrom,
                None => continue,
            };
            return Some(match fields.next().and_then(|p| p.parse::<u64>().ok()) {
                Some(pos) => Ok(KnownSnp {
                    chrom: normalize_chrom(chrom),
                    pos,
                }),
                None => Err(RedError::Parse(format!(
                    "{}:{}: unparsable SNP row",
                    self.path, self.line_no
                ))),
            });
        }
    }
}
