//! Helpers shared by the pipeline subcommands.

use anyhow::{anyhow, bail, Result};
use log::info;
use once_cell::sync::OnceCell;
use rayon::ThreadPoolBuilder;
use redpipe_lib::core::concurrency::determine_allowed_cpus;
use redpipe_lib::model::AnnotatedSite;
use redpipe_lib::parsers::{import_editing_database, VariantReader};
use redpipe_lib::stats::significance::export_significant_tsv;
use redpipe_lib::store::schema::{variant_schema, IndexSpec};
use redpipe_lib::store::{CandidateStore, Predicate};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Table holding the raw RNA calls.
pub const RNA_TABLE: &str = "rna_calls";
/// Table holding the raw DNA calls in paired mode.
pub const DNA_TABLE: &str = "dna_calls";
/// Aggregated known-editing reference table.
pub const EDITING_TABLE: &str = "known_editing";
/// Annotated result table written by the significance engine.
pub const SITES_TABLE: &str = "sites";

static GLOBAL_RAYON_THREADS: OnceCell<usize> = OnceCell::new();

/// Configure the global Rayon thread pool exactly once, returning the
/// active worker count. Subsequent calls reuse the first configured pool
/// and warn when the requested count differs.
pub fn configure_global_thread_pool(threads: usize) -> Result<usize> {
    let requested = determine_allowed_cpus(threads)?;

    if let Some(active) = GLOBAL_RAYON_THREADS.get() {
        if *active != requested {
            log::warn!(
                "Rayon global thread pool already initialised with {} threads; ignoring request for {}",
                active,
                requested
            );
        }
        return Ok(*active);
    }

    match ThreadPoolBuilder::new().num_threads(requested).build_global() {
        Ok(_) => {
            GLOBAL_RAYON_THREADS
                .set(requested)
                .map_err(|_| anyhow!("Failed to record global Rayon thread count"))?;
            Ok(requested)
        }
        Err(err) => {
            log::debug!("Global Rayon thread pool initialisation skipped: {}", err);
            let fallback = rayon::current_num_threads();
            GLOBAL_RAYON_THREADS.set(fallback).ok();
            Ok(fallback)
        }
    }
}

/// One `--editing-db origin=path` argument.
#[derive(Debug, Clone)]
pub struct EditingDbSpec {
    pub origin: String,
    pub path: PathBuf,
}

impl FromStr for EditingDbSpec {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.split_once('=') {
            Some((origin, path)) if !origin.is_empty() && !path.is_empty() => Ok(EditingDbSpec {
                origin: origin.to_string(),
                path: PathBuf::from(path),
            }),
            _ => Err(format!(
                "expected ORIGIN=PATH (e.g. darned=/data/darned.txt), got '{}'",
                s
            )),
        }
    }
}

pub fn require_file(path: &Path, what: &str) -> Result<()> {
    if !path.is_file() {
        bail!("{} file {} does not exist", what, path.display());
    }
    Ok(())
}

pub fn require_fraction(value: f64, what: &str) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        bail!("{} must be in (0, 1], got {}", what, value);
    }
    Ok(())
}

/// Open the backing store: file-backed when a path is given so re-runs can
/// resume, otherwise an in-memory throwaway.
pub fn open_store(db: Option<&Path>) -> Result<CandidateStore> {
    Ok(match db {
        Some(path) => {
            info!("opening candidate store at {}", path.display());
            CandidateStore::open(path)?
        }
        None => CandidateStore::in_memory()?,
    })
}

/// Load a variant-call file into `table` unless an identical import is
/// already present.
pub fn load_variant_table(
    store: &mut CandidateStore,
    path: &Path,
    sample: usize,
    table: &str,
    force: bool,
) -> Result<()> {
    let params = format!("src={},sample={}", path.display(), sample);
    if !force && store.completion_matches(table, &params)? && store.table_is_valid(table)? {
        info!("reusing previously imported '{}'", table);
        return Ok(());
    }
    store.recreate_table(table, &variant_schema(), Some(&IndexSpec::chrom_pos()))?;
    let reader = VariantReader::open(path)?.with_sample(sample);
    let report = store.bulk_load(table, reader, |_| true)?;
    store.distinct(table, Some(&IndexSpec::chrom_pos()))?;
    let rows = store.row_count(table)?;
    store.record_completion("import", table, rows, &params)?;
    info!(
        "imported {} calls into '{}' from {} ({} malformed rows skipped)",
        rows,
        table,
        path.display(),
        report.skipped
    );
    Ok(())
}

/// Import every `--editing-db` dump into the aggregated reference table.
pub fn load_editing_databases(
    store: &mut CandidateStore,
    specs: &[EditingDbSpec],
) -> Result<()> {
    for spec in specs {
        import_editing_database(store, &spec.path, &spec.origin, EDITING_TABLE)?;
    }
    Ok(())
}

/// Write the significant site set (populated `fdr` below the threshold) to
/// a TSV report.
pub fn export_results(
    store: &CandidateStore,
    fdr_threshold: f64,
    output: &Path,
) -> Result<usize> {
    let sites: Vec<AnnotatedSite> =
        store.select_where(SITES_TABLE, &Predicate::le("fdr", fdr_threshold))?;
    export_significant_tsv(&sites, output)?;
    info!(
        "wrote {} significant sites to {}",
        sites.len(),
        output.display()
    );
    Ok(sites.len())
}
