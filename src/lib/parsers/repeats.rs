//! Reader for repeat-mask tables: positional `chrom start end type` columns.
//! Header or comment lines fail the coordinate parse and are skipped.

use crate::core::errors::Result;
use crate::core::io::get_reader;
use crate::model::{normalize_chrom, RepeatRegion};
use log::{info, warn};
use std::io::BufRead;
use std::path::Path;

pub fn read_repeat_regions<P: AsRef<Path>>(path: P) -> Result<Vec<RepeatRegion>> {
    let path = path.as_ref();
    let mut regions = Vec::new();
    let mut skipped = 0u64;
    for (line_no, line) in get_reader(path)?.lines().enumerate() {
        let line = line?;
        match parse_line(&line) {
            Some(region) => regions.push(region),
            None => {
                if !line.trim().is_empty() {
                    skipped += 1;
                    if skipped <= 5 {
                        warn!("{}:{}: unparsable repeat row", path.display(), line_no + 1);
                    }
                }
            }
        }
    }
    info!(
        "loaded {} repeat regions from {} ({} rows skipped)",
        regions.len(),
        path.display(),
        skipped
    );
    Ok(regions)
}

fn parse_line(line: &str) -> Option<RepeatRegion> {
    let fields: Vec<&str> = line.trim().split_whitespace().collect();
    if fields.len() < 4 {
        return None;
    }
    let start: u64 = fields[1].parse().ok()?;
    let end: u64 = fields[2].parse().ok()?;
    if end < start {
        return None;
    }
    Some(RepeatRegion {
        chrom: normalize_chrom(fields[0]),
        start,
        end,
        repeat_type: fields[3].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_positional_columns_and_skips_headers() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "chrom\tstart\tend\ttype\n\
             chr1\t90\t110\tLINE\n\
             2\t200\t250\tSINE/Alu\textra\tcolumns\n\
             chr3\t50\t40\tLTR\n"
        )
        .unwrap();
        let regions = read_repeat_regions(file.path()).unwrap();
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].repeat_type, "LINE");
        assert_eq!(regions[1].chrom, "chr2");
        assert_eq!(regions[1].end, 250);
    }
}
