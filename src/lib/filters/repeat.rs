//! Repeat-region filtering.
//!
//! Variants inside repeat-masked intervals are dropped unless every
//! covering region's type is in the configured retain set. Retained rows
//! are additionally recorded to a `<output>_alu` side table so downstream
//! reporting can distinguish them from rows that never touched a repeat.

use super::{scan_input, write_survivors, FilterStage, StageContext, StageReport};
use crate::core::errors::Result;
use crate::core::intervals::ChromIntervals;
use crate::model::VariantRecord;
use crate::parsers::read_repeat_regions;
use crate::store::schema::{variant_schema, IndexSpec};
use std::path::PathBuf;

/// Which repeat families survive the filter. A-to-I editing is enriched in
/// Alu mobile elements, so that family is kept by default; the set is
/// configuration, not a hardcoded list.
#[derive(Debug, Clone)]
pub struct RepeatFilterConfig {
    pub retain_types: Vec<String>,
}

impl Default for RepeatFilterConfig {
    fn default() -> Self {
        RepeatFilterConfig {
            retain_types: vec!["SINE/Alu".to_string()],
        }
    }
}

impl RepeatFilterConfig {
    pub fn retains(&self, repeat_type: &str) -> bool {
        self.retain_types.iter().any(|t| t == repeat_type)
    }
}

pub struct RepeatFilter {
    pub regions_path: PathBuf,
    pub config: RepeatFilterConfig,
    pub output: String,
}

impl RepeatFilter {
    pub fn new(regions_path: PathBuf, config: RepeatFilterConfig, output: &str) -> Self {
        RepeatFilter {
            regions_path,
            config,
            output: output.to_string(),
        }
    }

    fn retained_table(&self) -> String {
        format!("{}_alu", self.output)
    }
}

impl FilterStage for RepeatFilter {
    fn name(&self) -> &'static str {
        "repeat"
    }

    fn output_table(&self) -> &str {
        &self.output
    }

    fn params_fingerprint(&self) -> String {
        format!("retain={}", self.config.retain_types.join("|"))
    }

    fn run(&self, ctx: &mut StageContext<'_>, input_table: &str) -> Result<StageReport> {
        let regions = read_repeat_regions(&self.regions_path)?;
        // Inclusive [start, end] coordinates; the index wants an exclusive stop.
        let index = ChromIntervals::new(
            regions
                .into_iter()
                .map(|r| (r.chrom, r.start, r.end + 1, r.repeat_type)),
        );

        let rows = scan_input(ctx, self.name(), input_table)?;
        let input_rows = rows.len() as u64;
        let mut survivors = Vec::new();
        let mut retained_in_repeat: Vec<VariantRecord> = Vec::new();
        for record in rows {
            ctx.checkpoint()?;
            let mut covered = false;
            let mut dropped = false;
            for interval in index.overlapping(&record.chrom, record.pos) {
                covered = true;
                if !self.config.retains(&interval.val) {
                    dropped = true;
                    break;
                }
            }
            if dropped {
                continue;
            }
            if covered {
                retained_in_repeat.push(record.clone());
            }
            survivors.push(record);
        }

        let retained_table = self.retained_table();
        ctx.store.recreate_table(
            &retained_table,
            &variant_schema(),
            Some(&IndexSpec::chrom_pos()),
        )?;
        ctx.store
            .bulk_load(&retained_table, retained_in_repeat.into_iter().map(Ok), |_| {
                !ctx.cancel.is_cancelled()
            })?;
        ctx.store
            .distinct(&retained_table, Some(&IndexSpec::chrom_pos()))?;

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
