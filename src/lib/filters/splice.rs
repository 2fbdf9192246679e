//! Splice-junction filtering.
//!
//! Alignment artifacts cluster around exon boundaries, so candidates within
//! a few bases of a coding-sequence edge are removed. Only rows whose
//! feature type marks a coding sequence contribute junctions; mRNA and
//! other transcript-level rows are ignored here.

use super::{scan_input, write_survivors, FilterStage, StageContext, StageReport};
use crate::core::errors::Result;
use crate::core::intervals::ChromIntervals;
use crate::parsers::read_gene_annotations;
use std::path::PathBuf;

const CDS_FEATURE: &str = "CDS";

pub struct SpliceJunctionFilter {
    pub genes_path: PathBuf,
    /// Half-width of the exclusion window around each junction.
    pub span: u64,
    pub output: String,
}

impl SpliceJunctionFilter {
    pub fn new(genes_path: PathBuf, span: u64, output: &str) -> Self {
        SpliceJunctionFilter {
            genes_path,
            span,
            output: output.to_string(),
        }
    }
}

impl FilterStage for SpliceJunctionFilter {
    fn name(&self) -> &'static str {
        "splice_junction"
    }

    fn output_table(&self) -> &str {
        &self.output
    }

    fn params_fingerprint(&self) -> String {
        format!("span={}", self.span)
    }

    fn run(&self, ctx: &mut StageContext<'_>, input_table: &str) -> Result<StageReport> {
        let genes = read_gene_annotations(&self.genes_path)?;
        let span = self.span;
        let index = ChromIntervals::new(
            genes
                .into_iter()
                .filter(|g| g.feature_type == CDS_FEATURE)
                .flat_map(|g| {
                    let chrom = g.chrom;
                    let window = |chrom: String, edge: u64| {
                        (chrom, edge.saturating_sub(span), edge + span + 1, ())
                    };
                    [
                        window(chrom.clone(), g.cds_start),
                        window(chrom, g.cds_end),
                    ]
                }),
        );

        let rows = scan_input(ctx, self.name(), input_table)?;
        let input_rows = rows.len() as u64;
        let mut survivors = Vec::new();
        for record in rows {
            ctx.checkpoint()?;
            if !index.contains(&record.chrom, record.pos) {
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
