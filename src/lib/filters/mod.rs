//! Filter stages.
//!
//! Every stage consumes one variant table and produces a strictly narrower
//! derived table: read, filter, write fresh, deduplicate. Stages never
//! mutate rows in place. Per-row problems are skipped and counted; a
//! missing reference file or unreadable input table aborts the stage while
//! leaving earlier stage tables intact.

pub mod comprehensive;
pub mod dnarna;
pub mod quality;
pub mod repeat;
pub mod snp;
pub mod splice;

pub use comprehensive::ComprehensiveFilter;
pub use dnarna::DnaRnaFilter;
pub use quality::QualityDepthFilter;
pub use repeat::{RepeatFilter, RepeatFilterConfig};
pub use snp::KnownSnpFilter;
pub use splice::SpliceJunctionFilter;

use crate::core::errors::{RedError, Result};
use crate::model::VariantRecord;
use crate::progress::{CancelToken, ProgressMonitor};
use crate::store::schema::{variant_schema, IndexSpec};
use crate::store::{CandidateStore, PROGRESS_ROW_INTERVAL};

/// Everything a stage needs while running: the store it owns for the run,
/// the progress fan-out and the shared cancellation flag.
pub struct StageContext<'a> {
    pub store: &'a mut CandidateStore,
    pub monitor: &'a ProgressMonitor,
    pub cancel: &'a CancelToken,
}

impl StageContext<'_> {
    /// Cancellation point. Checked at batch boundaries, never per row.
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(RedError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageReport {
    pub stage: &'static str,
    pub input_rows: u64,
    pub output_rows: u64,
    /// Rows dropped because they could not be parsed, as opposed to rows
    /// filtered by the stage rule.
    pub skipped_rows: u64,
}

/// One rule of the narrowing chain.
pub trait FilterStage: Send {
    fn name(&self) -> &'static str;

    /// Name of the table this stage writes.
    fn output_table(&self) -> &str;

    /// Fingerprint of the thresholds the stage runs with; a completed
    /// output table is only reused when its recorded fingerprint matches.
    fn params_fingerprint(&self) -> String;

    fn run(&self, ctx: &mut StageContext<'_>, input_table: &str) -> Result<StageReport>;
}

/// Read the whole input table of a stage, reporting progress every
/// [`PROGRESS_ROW_INTERVAL`] rows. An unreadable table is a storage error.
pub(crate) fn scan_input(
    ctx: &StageContext<'_>,
    stage: &str,
    input_table: &str,
) -> Result<Vec<VariantRecord>> {
    let mut rows: Vec<VariantRecord> = Vec::new();
    ctx.store
        .for_each(input_table, |record: VariantRecord| {
            rows.push(record);
            if rows.len() as u64 % PROGRESS_ROW_INTERVAL == 0 {
                ctx.monitor
                    .updated(&format!("{}: scanning {}", stage, input_table), rows.len() as u64, 0);
            }
            Ok(())
        })
        .map_err(|e| match e {
            RedError::Sqlite(err) => RedError::Storage(format!(
                "stage '{}' cannot read input table '{}': {}",
                stage, input_table, err
            )),
            other => other,
        })?;
    Ok(rows)
}

/// Write a stage's surviving rows: fresh output table, batched load with
/// cancellation checks, dedup, completion marker, completion notification.
pub(crate) fn write_survivors(
    ctx: &mut StageContext<'_>,
    stage: &'static str,
    output_table: &str,
    params: &str,
    input_rows: u64,
    skipped_rows: u64,
    survivors: Vec<VariantRecord>,
) -> Result<StageReport> {
    ctx.store
        .recreate_table(output_table, &variant_schema(), Some(&IndexSpec::chrom_pos()))?;
    let total = survivors.len() as u64;
    let monitor = ctx.monitor;
    let cancel = ctx.cancel.clone();
    ctx.store.bulk_load(
        output_table,
        survivors.into_iter().map(Ok),
        |inserted| {
            monitor.updated(&format!("{}: writing {}", stage, output_table), inserted, total);
            !cancel.is_cancelled()
        },
    )?;
    let output_rows = ctx
        .store
        .distinct(output_table, Some(&IndexSpec::chrom_pos()))?;
    ctx.store
        .record_completion(stage, output_table, output_rows, params)?;
    ctx.monitor.complete(output_table, output_rows);
    Ok(StageReport {
        stage,
        input_rows,
        output_rows,
        skipped_rows,
    })
}
