//! Paired mode: detect RNA-editing sites with a matched DNA call set.
//!
//! Runs the same chain as de novo detection plus a DNA/RNA cross-check
//! that removes candidates showing a variant allele in genomic DNA.

use anyhow::Result;
use log::info;
use redpipe_lib::filters::DnaRnaFilter;
use std::path::PathBuf;
use structopt::StructOpt;

use super::common::{self, DNA_TABLE, RNA_TABLE};
use super::denovo::DenovoArgs;

#[derive(StructOpt, Debug)]
#[structopt(name = "dnarna")]
pub struct DnaRnaArgs {
    #[structopt(flatten)]
    pub shared: DenovoArgs,

    #[structopt(long, parse(from_os_str), help = "DNA variant-call file (.gz accepted)")]
    pub dna_vcf: PathBuf,

    #[structopt(
        long,
        default_value = "0",
        help = "Zero-based sample column of the DNA file"
    )]
    pub dna_sample: usize,
}

impl DnaRnaArgs {
    pub fn validate(&self) -> Result<()> {
        self.shared.validate()?;
        common::require_file(&self.dna_vcf, "DNA variant-call")?;
        Ok(())
    }
}

pub fn run_dnarna(args: DnaRnaArgs) -> Result<()> {
    args.validate()?;
    let threads = common::configure_global_thread_pool(
        args.shared.threads.unwrap_or_else(num_cpus::get),
    )?;
    info!("running paired DNA/RNA detection with {} threads", threads);

    let mut store = common::open_store(args.shared.db.as_deref())?;
    common::load_variant_table(
        &mut store,
        &args.shared.rna_vcf,
        args.shared.sample,
        RNA_TABLE,
        args.shared.force,
    )?;
    common::load_variant_table(
        &mut store,
        &args.dna_vcf,
        args.dna_sample,
        DNA_TABLE,
        args.shared.force,
    )?;
    common::load_editing_databases(&mut store, &args.shared.editing_dbs)?;

    let mut orchestrator = args.shared.orchestrator();
    orchestrator.add_stage(Box::new(DnaRnaFilter::new(DNA_TABLE, "stage_dnarna")));
    orchestrator.run(&mut store, RNA_TABLE)?;
    common::export_results(&store, args.shared.fdr, &args.shared.output)?;
    Ok(())
}
