//! Known-SNP filtering.
//!
//! Germline polymorphisms look identical to editing candidates in RNA
//! alone, so any candidate sitting on a known SNP position is removed. The
//! SNP extract is bulk-loaded into a reference table once and reused across
//! runs against the same store; the exclusion itself is a `(chrom, pos)`
//! join inside SQLite rather than a per-row lookup.

use super::{scan_input, write_survivors, FilterStage, StageContext, StageReport};
use crate::core::errors::Result;
use crate::parsers::KnownSnpReader;
use crate::store::schema::{snp_schema, IndexSpec};
use log::info;
use std::collections::HashSet;
use std::path::PathBuf;

pub const SNP_TABLE: &str = "ref_snp";

pub struct KnownSnpFilter {
    pub snps_path: PathBuf,
    pub output: String,
}

impl KnownSnpFilter {
    pub fn new(snps_path: PathBuf, output: &str) -> Self {
        KnownSnpFilter {
            snps_path,
            output: output.to_string(),
        }
    }

    fn ensure_snp_table(&self, ctx: &mut StageContext<'_>) -> Result<()> {
        if ctx.store.table_is_valid(SNP_TABLE)? {
            info!(
                "reusing {} known SNPs already loaded",
                ctx.store.row_count(SNP_TABLE)?
            );
            return Ok(());
        }
        ctx.store
            .recreate_table(SNP_TABLE, &snp_schema(), Some(&IndexSpec::chrom_pos()))?;
        let reader = KnownSnpReader::open(&self.snps_path)?;
        let monitor = ctx.monitor;
        let cancel = ctx.cancel.clone();
        let report = ctx.store.bulk_load(SNP_TABLE, reader, |inserted| {
            monitor.updated("known_snp: loading reference table", inserted, 0);
            !cancel.is_cancelled()
        })?;
        ctx.store.distinct(SNP_TABLE, Some(&IndexSpec::chrom_pos()))?;
        info!(
            "loaded {} known SNPs ({} rows skipped)",
            report.inserted, report.skipped
        );
        Ok(())
    }
}

impl FilterStage for KnownSnpFilter {
    fn name(&self) -> &'static str {
        "known_snp"
    }

    fn output_table(&self) -> &str {
        &self.output
    }

    fn params_fingerprint(&self) -> String {
        format!("snps={}", self.snps_path.display())
    }

    fn run(&self, ctx: &mut StageContext<'_>, input_table: &str) -> Result<StageReport> {
        self.ensure_snp_table(ctx)?;
        let excluded: HashSet<(String, u64)> = ctx
            .store
            .join_positions(input_table, SNP_TABLE)?
            .into_iter()
            .collect();

        let rows = scan_input(ctx, self.name(), input_table)?;
        let input_rows = rows.len() as u64;
        let mut survivors = Vec::new();
        for record in rows {
            ctx.checkpoint()?;
            if !excluded.contains(&(record.chrom.clone(), record.pos)) {
                survivors.push(record);
            }
        }
        write_survivors(
            ctx,
            self.name(),
            &self.output,
            &self.params_fingerprint(),
            input_rows,
            0,
            survivors,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::quality::tests::{store_with, variant};
    use crate::model::VariantRecord;
    use crate::progress::{CancelToken, ProgressMonitor};
    use std::io::Write;

    #[test]
    fn drops_candidates_on_known_snp_positions() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        // A known SNP at chr1:100 removes the candidate there.
        write!(file, "chr1\t100\nchr2\t500\n").unwrap();

        let mut store = store_with(
            "calls",
            vec![
                variant("chr1", 100, 25.0, "2/8"),
                variant("chr1", 200, 25.0, "2/8"),
                variant("chr2", 100, 25.0, "2/8"),
            ],
        );
        let monitor = ProgressMonitor::new();
        let cancel = CancelToken::new();
        let mut ctx = StageContext {
            store: &mut store,
            monitor: &monitor,
            cancel: &cancel,
        };
        let filter = KnownSnpFilter::new(file.path().to_path_buf(), "snp_out");
        let report = filter.run(&mut ctx, "calls").unwrap();

        assert_eq!(report.input_rows, 3);
        assert_eq!(report.output_rows, 2);
        let mut kept: Vec<(String, u64)> = store
            .scan::<VariantRecord>("snp_out")
            .unwrap()
            .into_iter()
            .map(|r| (r.chrom, r.pos))
            .collect();
        kept.sort();
        assert_eq!(
            kept,
            vec![("chr1".to_string(), 200), ("chr2".to_string(), 100)]
        );
    }

    #[test]
    fn reuses_loaded_snp_table_across_runs() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "chr1\t100\n").unwrap();

        let mut store = store_with("calls", vec![variant("chr1", 200, 25.0, "2/8")]);
        let monitor = ProgressMonitor::new();
        let cancel = CancelToken::new();
        let filter = KnownSnpFilter::new(file.path().to_path_buf(), "snp_out");
        for _ in 0..2 {
            let mut ctx = StageContext {
                store: &mut store,
                monitor: &monitor,
                cancel: &cancel,
            };
            filter.run(&mut ctx, "calls").unwrap();
        }
        assert_eq!(store.row_count(SNP_TABLE).unwrap(), 1);
    }
}
