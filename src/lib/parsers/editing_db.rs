//! Importer for curated known-editing databases (DARNED, RADAR and
//! similar dumps).
//!
//! The file's first line is a header and is skipped. Chromosome names in
//! these dumps lack the `chr` prefix, so the importer prepends it. Each
//! import is tagged with an `origin`; re-importing one origin replaces only
//! that origin's rows, so several databases can be aggregated additively in
//! the same table.

use crate::core::errors::{RedError, Result};
use crate::core::io::get_reader;
use crate::model::{normalize_chrom, KnownEditingSite};
use crate::store::{CandidateStore, LoadReport, Predicate};
use crate::store::schema::{editing_schema, IndexSpec};
use log::{info, warn};
use rayon::prelude::*;
use std::io::BufRead;
use std::path::Path;

/// Read a whole database dump in parallel, skipping its header line.
/// Unparsable rows are dropped with a warning.
pub fn read_known_editing_sites<P: AsRef<Path>>(
    path: P,
    origin: &str,
) -> Result<Vec<KnownEditingSite>> {
    let path = path.as_ref();
    let lines: Vec<String> = get_reader(path)?.lines().collect::<std::io::Result<_>>()?;
    if lines.is_empty() {
        return Err(RedError::InvalidInput(format!(
            "known-editing database {} is empty",
            path.display()
        )));
    }

    let sites: Vec<KnownEditingSite> = lines
        .par_iter()
        .skip(1)
        .filter_map(|line| match parse_line(line, origin) {
            some @ Some(_) => some,
            None => {
                if !line.trim().is_empty() {
                    warn!("unparsable known-editing row: {}", line);
                }
                None
            }
        })
        .collect();

    if sites.is_empty() {
        return Err(RedError::InvalidInput(format!(
            "no valid editing sites found in {}",
            path.display()
        )));
    }
    info!(
        "loaded {} known editing sites from {} (origin '{}')",
        sites.len(),
        path.display(),
        origin
    );
    Ok(sites)
}

fn parse_line(line: &str, origin: &str) -> Option<KnownEditingSite> {
    let fields: Vec<&str> = line.trim().split('\t').collect();
    if fields.len() < 2 {
        return None;
    }
    let pos: u64 = fields[1].parse().ok()?;
    Some(KnownEditingSite {
        chrom: normalize_chrom(fields[0]),
        pos,
        strand: fields.get(3).unwrap_or(&"+").to_string(),
        // Curated A-to-I databases record A>G events on the sense strand.
        ref_base: "A".to_string(),
        alt_base: "G".to_string(),
        origin: origin.to_string(),
    })
}

/// Load one database dump into `table`, replacing any previous rows of the
/// same origin and leaving other origins untouched.
pub fn import_editing_database(
    store: &mut CandidateStore,
    path: &Path,
    origin: &str,
    table: &str,
) -> Result<LoadReport> {
    let sites = read_known_editing_sites(path, origin)?;
    store.create_table(table, &editing_schema(), Some(&IndexSpec::chrom_pos()))?;
    let removed = store.delete_where(table, &Predicate::eq("origin", origin.to_string()))?;
    if removed > 0 {
        info!("replaced {} previously imported '{}' rows", removed, origin);
    }
    store.bulk_load(table, sites.into_iter().map(Ok), |_| true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn dump() -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            "chrom\tcoordinate\tinchr\tstrand\n\
             1\t100\tA\t+\n\
             1\t206\tA\t-\n\
             X\t5000\tA\t+\n"
        )
        .unwrap();
        file
    }

    #[test]
    fn prepends_chr_and_skips_header() {
        let sites = read_known_editing_sites(dump().path(), "darned").unwrap();
        assert_eq!(sites.len(), 3);
        assert_eq!(sites[0].chrom, "chr1");
        assert_eq!(sites[0].pos, 100);
        assert_eq!(sites[1].strand, "-");
        assert_eq!(sites[2].chrom, "chrX");
        assert!(sites.iter().all(|s| s.origin == "darned"));
    }

    #[test]
    fn reimport_replaces_only_same_origin() {
        let mut store = CandidateStore::in_memory().unwrap();
        let file = dump();
        import_editing_database(&mut store, file.path(), "darned", "known_editing").unwrap();
        import_editing_database(&mut store, file.path(), "radar", "known_editing").unwrap();
        assert_eq!(store.row_count("known_editing").unwrap(), 6);

        // Same origin again: additive across origins, destructive within one.
        import_editing_database(&mut store, file.path(), "darned", "known_editing").unwrap();
        assert_eq!(store.row_count("known_editing").unwrap(), 6);
    }
}
