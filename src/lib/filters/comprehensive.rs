//! Gene-window filtering.
//!
//! Keeps variants falling inside an annotated transcript, widened by a
//! configurable margin on both sides. Everything intergenic is dropped.

use super::{scan_input, write_survivors, FilterStage, StageContext, StageReport};
use crate::core::errors::Result;
use crate::core::intervals::ChromIntervals;
use crate::parsers::read_gene_annotations;
use std::path::PathBuf;

pub struct ComprehensiveFilter {
    pub genes_path: PathBuf,
    /// Bases added to each side of `[tx_start, tx_end]`.
    pub margin: u64,
    pub output: String,
}

impl ComprehensiveFilter {
    pub fn new(genes_path: PathBuf, margin: u64, output: &str) -> Self {
        ComprehensiveFilter {
            genes_path,
            margin,
            output: output.to_string(),
        }
    }
}

impl FilterStage for ComprehensiveFilter {
    fn name(&self) -> &'static str {
        "comprehensive"
    }

    fn output_table(&self) -> &str {
        &self.output
    }

    fn params_fingerprint(&self) -> String {
        format!("margin={}", self.margin)
    }

    fn run(&self, ctx: &mut StageContext<'_>, input_table: &str) -> Result<StageReport> {
        let genes = read_gene_annotations(&self.genes_path)?;
        let margin = self.margin;
        let index = ChromIntervals::new(genes.into_iter().map(|g| {
            (
                g.chrom,
                g.tx_start.saturating_sub(margin),
                g.tx_end + margin + 1,
                (),
            )
        }));

        let rows = scan_input(ctx, self.name(), input_table)?;
        let input_rows = rows.len() as u64;
        let mut survivors = Vec::new();
        for record in rows {
            ctx.checkpoint()?;
            if index.contains(&record.chrom, record.pos) {
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
    fn keeps_sites_inside_widened_transcripts() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "chr1\t1000\t2000\t1100\t1900\tCDS\n").unwrap();

        let mut store = store_with(
            "calls",
            vec![
                variant("chr1", 998, 25.0, "2/8"),  // inside the 2-base margin
                variant("chr1", 1500, 25.0, "2/8"), // inside the transcript
                variant("chr1", 2002, 25.0, "2/8"), // margin edge
                variant("chr1", 2003, 25.0, "2/8"), // past the margin
                variant("chr2", 1500, 25.0, "2/8"), // wrong chromosome
            ],
        );
        let monitor = ProgressMonitor::new();
        let cancel = CancelToken::new();
        let mut ctx = StageContext {
            store: &mut store,
            monitor: &monitor,
            cancel: &cancel,
        };
        let filter = ComprehensiveFilter::new(file.path().to_path_buf(), 2, "gene_out");
        let report = filter.run(&mut ctx, "calls").unwrap();

        assert_eq!(report.input_rows, 5);
        assert_eq!(report.output_rows, 3);
        let mut positions: Vec<u64> = store
            .scan::<VariantRecord>("gene_out")
            .unwrap()
            .into_iter()
            .map(|r| r.pos)
            .collect();
        positions.sort_unstable();
        assert_eq!(positions, vec![998, 1500, 2002]);
    }

    #[test]
    fn zero_margin_uses_bare_transcript_bounds() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "chr1\t1000\t2000\t1100\t1900\tmRNA\n").unwrap();

        let mut store = store_with(
            "calls",
            vec![
                variant("chr1", 999, 25.0, "2/8"),
                variant("chr1", 1000, 25.0, "2/8"),
                variant("chr1", 2000, 25.0, "2/8"),
                variant("chr1", 2001, 25.0, "2/8"),
            ],
        );
        let monitor = ProgressMonitor::new();
        let cancel = CancelToken::new();
        let mut ctx = StageContext {
            store: &mut store,
            monitor: &monitor,
            cancel: &cancel,
        };
        let filter = ComprehensiveFilter::new(file.path().to_path_buf(), 0, "gene_out");
        let report = filter.run(&mut ctx, "calls").unwrap();
        assert_eq!(report.output_rows, 2);
    }
}
