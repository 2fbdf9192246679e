//! Quality and coverage filtering, the first narrowing stage.

use super::{scan_input, write_survivors, FilterStage, StageContext, StageReport};
use crate::core::errors::Result;
use log::debug;

/// Keeps a record iff its call quality reaches `quality`, its allele-depth
/// field parses into exactly two non-negative integers, and the summed
/// depth reaches `depth`. Malformed depth fields drop the row, they never
/// abort the stage.
pub struct QualityDepthFilter {
    pub quality: f64,
    pub depth: u64,
    pub output: String,
}

impl QualityDepthFilter {
    pub fn new(quality: f64, depth: u64, output: &str) -> Self {
        QualityDepthFilter {
            quality,
            depth,
            output: output.to_string(),
        }
    }
}

impl FilterStage for QualityDepthFilter {
    fn name(&self) -> &'static str {
        "quality_depth"
    }

    fn output_table(&self) -> &str {
        &self.output
    }

    fn params_fingerprint(&self) -> String {
        format!("q={},d={}", self.quality, self.depth)
    }

    fn run(&self, ctx: &mut StageContext<'_>, input_table: &str) -> Result<StageReport> {
        let rows = scan_input(ctx, self.name(), input_table)?;
        let input_rows = rows.len() as u64;
        let mut skipped = 0u64;
        let mut survivors = Vec::new();
        for record in rows {
            ctx.checkpoint()?;
            if record.qual < self.quality {
                continue;
            }
            match record.allele_depths() {
                Ok((ref_count, alt_count)) => {
                    if ref_count + alt_count >= self.depth {
                        survivors.push(record);
                    }
                }
                Err(e) => {
                    debug!("{}", e);
                    skipped += 1;
                }
            }
        }
        write_survivors(
            ctx,
            self.name(),
            &self.output,
            &self.params_fingerprint(),
            input_rows,
            skipped,
            survivors,
        )
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::progress::{CancelToken, ProgressMonitor};
    use crate::store::schema::{variant_schema, IndexSpec};
    use crate::store::CandidateStore;
    use crate::model::VariantRecord;

    pub(crate) fn variant(chrom: &str, pos: u64, qual: f64, ad: &str) -> VariantRecord {
        VariantRecord {
            chrom: chrom.to_string(),
            pos,
            id: ".".to_string(),
            ref_base: "A".to_string(),
            alt_base: "G".to_string(),
            qual,
            filter: "PASS".to_string(),
            info: ".".to_string(),
            gt: "0/1".to_string(),
            ad: ad.to_string(),
            dp: ".".to_string(),
            gq: ".".to_string(),
            pl: ".".to_string(),
        }
    }

    pub(crate) fn store_with(table: &str, rows: Vec<VariantRecord>) -> CandidateStore {
        let mut store = CandidateStore::in_memory().unwrap();
        store
            .create_table(table, &variant_schema(), Some(&IndexSpec::chrom_pos()))
            .unwrap();
        store
            .bulk_load(table, rows.into_iter().map(Ok), |_| true)
            .unwrap();
        store
    }

    #[test]
    fn keeps_high_quality_covered_records() {
        let mut store = store_with(
            "calls",
            vec![
                // qual 25 >= 20 and depth 10 >= 6.
                variant("chr1", 100, 25.0, "2/8"),
                // qual 15 < 20.
                variant("chr1", 200, 15.0, "2/8"),
                // Depth below threshold.
                variant("chr1", 300, 30.0, "1/2"),
                // Malformed depth fields are skipped, not fatal.
                variant("chr1", 400, 30.0, "5"),
                variant("chr1", 500, 30.0, "1/2/3"),
            ],
        );
        let monitor = ProgressMonitor::new();
        let cancel = CancelToken::new();
        let mut ctx = StageContext {
            store: &mut store,
            monitor: &monitor,
            cancel: &cancel,
        };
        let filter = QualityDepthFilter::new(20.0, 6, "quality_out");
        let report = filter.run(&mut ctx, "calls").unwrap();

        assert_eq!(report.input_rows, 5);
        assert_eq!(report.output_rows, 1);
        assert_eq!(report.skipped_rows, 2);
        let out: Vec<VariantRecord> = store.scan("quality_out").unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].pos, 100);
    }

    #[test]
    fn rerun_with_same_thresholds_is_idempotent() {
        let rows = vec![
            variant("chr1", 100, 25.0, "2/8"),
            variant("chr1", 200, 45.0, "3/9"),
        ];
        let mut store = store_with("calls", rows);
        let monitor = ProgressMonitor::new();
        let cancel = CancelToken::new();
        let filter = QualityDepthFilter::new(20.0, 6, "quality_out");

        for _ in 0..2 {
            let mut ctx = StageContext {
                store: &mut store,
                monitor: &monitor,
                cancel: &cancel,
            };
            filter.run(&mut ctx, "calls").unwrap();
        }
        let out: Vec<VariantRecord> = store.scan("quality_out").unwrap();
        assert_eq!(out.len(), 2);
        assert!(store
            .completion_matches("quality_out", "q=20,d=6")
            .unwrap());
    }

    #[test]
    fn missing_input_table_aborts_stage() {
        let mut store = CandidateStore::in_memory().unwrap();
        let monitor = ProgressMonitor::new();
        let cancel = CancelToken::new();
        let mut ctx = StageContext {
            store: &mut store,
            monitor: &monitor,
            cancel: &cancel,
        };
        let filter = QualityDepthFilter::new(20.0, 6, "quality_out");
        assert!(matches!(
            filter.run(&mut ctx, "no_such_table"),
            Err(crate::core::errors::RedError::Storage(_))
        ));
    }
}
