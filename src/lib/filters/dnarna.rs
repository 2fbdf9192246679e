//! DNA/RNA cross-checking.
//!
//! In paired mode a second variant table built from genomic DNA is
//! available. Any RNA candidate whose position also shows a non-reference
//! call in DNA is a germline or somatic variant, not editing, and is
//! removed. The DNA table must already exist in the store; running this
//! stage without it is a storage error, not an empty pass.

use super::{scan_input, write_survivors, FilterStage, StageContext, StageReport};
use crate::core::errors::{RedError, Result};
use crate::model::VariantRecord;
use crate::store::Predicate;
use std::collections::HashSet;

pub struct DnaRnaFilter {
    pub dna_table: String,
    pub output: String,
}

impl DnaRnaFilter {
    pub fn new(dna_table: &str, output: &str) -> Self {
        DnaRnaFilter {
            dna_table: dna_table.to_string(),
            output: output.to_string(),
        }
    }
}

impl FilterStage for DnaRnaFilter {
    fn name(&self) -> &'static str {
        "dna_rna"
    }

    fn output_table(&self) -> &str {
        &self.output
    }

    fn params_fingerprint(&self) -> String {
        format!("dna={}", self.dna_table)
    }

    fn run(&self, ctx: &mut StageContext<'_>, input_table: &str) -> Result<StageReport> {
        if !ctx.store.table_exists(&self.dna_table)? {
            return Err(RedError::Storage(format!(
                "DNA table '{}' is missing; load the DNA calls before cross-checking",
                self.dna_table
            )));
        }
        let dna_variant_positions: HashSet<(String, u64)> = ctx
            .store
            .select_where::<VariantRecord>(&self.dna_table, &Predicate::ne("alt", ".".to_string()))?
            .into_iter()
            .map(|r| (r.chrom, r.pos))
            .collect();

        let rows = scan_input(ctx, self.name(), input_table)?;
        let input_rows = rows.len() as u64;
        let mut survivors = Vec::new();
        for record in rows {
            ctx.checkpoint()?;
            if !dna_variant_positions.contains(&(record.chrom.clone(), record.pos)) {
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
