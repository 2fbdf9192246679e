//! De novo mode: detect RNA-editing sites from RNA variant calls alone.

use anyhow::Result;
use log::info;
use redpipe_lib::filters::{
    ComprehensiveFilter, KnownSnpFilter, QualityDepthFilter, RepeatFilter, RepeatFilterConfig,
    SpliceJunctionFilter,
};
use redpipe_lib::pipeline::PipelineOrchestrator;
use redpipe_lib::progress::LogProgress;
use redpipe_lib::stats::significance::{SignificanceConfig, SignificanceEngine};
use redpipe_lib::stats::FisherBackend;
use std::path::PathBuf;
use structopt::StructOpt;

use super::common::{self, EditingDbSpec, EDITING_TABLE, RNA_TABLE, SITES_TABLE};

#[derive(StructOpt, Debug)]
#[structopt(name = "denovo")]
pub struct DenovoArgs {
    #[structopt(long, parse(from_os_str), help = "RNA variant-call file (.gz accepted)")]
    pub rna_vcf: PathBuf,

    #[structopt(long, parse(from_os_str), help = "Repeat-masker region table")]
    pub repeats: PathBuf,

    #[structopt(long, parse(from_os_str), help = "Gene model table (RefSeq-like)")]
    pub genes: PathBuf,

    #[structopt(long, parse(from_os_str), help = "Known-SNP table (chrom pos)")]
    pub snps: PathBuf,

    #[structopt(
        long = "editing-db",
        required = true,
        number_of_values = 1,
        help = "Known-editing database as ORIGIN=PATH (repeatable)"
    )]
    pub editing_dbs: Vec<EditingDbSpec>,

    #[structopt(
        long,
        parse(from_os_str),
        help = "SQLite store path; omit for an in-memory run"
    )]
    pub db: Option<PathBuf>,

    #[structopt(long, parse(from_os_str), help = "TSV report of significant sites")]
    pub output: PathBuf,

    #[structopt(long, default_value = "20", help = "Minimum call quality")]
    pub quality: f64,

    #[structopt(long, default_value = "6", help = "Minimum total read depth")]
    pub depth: u64,

    #[structopt(long, default_value = "2", help = "Gene-window margin in bases")]
    pub margin: u64,

    #[structopt(
        long,
        default_value = "2",
        help = "Splice-junction exclusion half-width in bases"
    )]
    pub splice: u64,

    #[structopt(
        long = "retain-repeat",
        default_value = "SINE/Alu",
        number_of_values = 1,
        help = "Repeat families whose sites are kept (repeatable)"
    )]
    pub retain_repeats: Vec<String>,

    #[structopt(long, default_value = "0.05", help = "Raw p-value gate")]
    pub pvalue: f64,

    #[structopt(long, default_value = "0.05", help = "FDR gate for the significant set")]
    pub fdr: f64,

    #[structopt(long, help = "Re-run stages whose output is already present")]
    pub force: bool,

    #[structopt(short, long, help = "Number of threads (default: all cores)")]
    pub threads: Option<usize>,

    #[structopt(long, default_value = "0", help = "Zero-based sample column to read")]
    pub sample: usize,
}

impl DenovoArgs {
    pub fn validate(&self) -> Result<()> {
        common::require_file(&self.rna_vcf, "RNA variant-call")?;
        common::require_file(&self.repeats, "repeat region")?;
        common::require_file(&self.genes, "gene model")?;
        common::require_file(&self.snps, "known-SNP")?;
        for spec in &self.editing_dbs {
            common::require_file(&spec.path, "known-editing database")?;
        }
        common::require_fraction(self.pvalue, "--pvalue")?;
        common::require_fraction(self.fdr, "--fdr")?;
        Ok(())
    }

    /// Build the orchestrator for this run. Paired mode appends the
    /// DNA/RNA cross-check after the SNP filter.
    pub(crate) fn orchestrator(&self) -> PipelineOrchestrator<FisherBackend> {
        let engine = SignificanceEngine::new(
            FisherBackend,
            SignificanceConfig {
                p_threshold: self.pvalue,
                fdr_threshold: self.fdr,
            },
            SITES_TABLE,
        );
        let mut orchestrator = PipelineOrchestrator::new(engine, EDITING_TABLE);
        orchestrator.add_stage(Box::new(QualityDepthFilter::new(
            self.quality,
            self.depth,
            "stage_quality",
        )));
        orchestrator.add_stage(Box::new(RepeatFilter::new(
            self.repeats.clone(),
            RepeatFilterConfig {
                retain_types: self.retain_repeats.clone(),
            },
            "stage_repeat",
        )));
        orchestrator.add_stage(Box::new(ComprehensiveFilter::new(
            self.genes.clone(),
            self.margin,
            "stage_comprehensive",
        )));
        orchestrator.add_stage(Box::new(SpliceJunctionFilter::new(
            self.genes.clone(),
            self.splice,
            "stage_splice",
        )));
        orchestrator.add_stage(Box::new(KnownSnpFilter::new(
            self.snps.clone(),
            "stage_snp",
        )));
        orchestrator.add_listener(Box::new(LogProgress));
        orchestrator.set_force(self.force);
        orchestrator
    }
}

pub fn run_denovo(args: DenovoArgs) -> Result<()> {
    args.validate()?;
    let threads = common::configure_global_thread_pool(
        args.threads.unwrap_or_else(num_cpus::get),
    )?;
    info!("running de novo detection with {} threads", threads);

    let mut store = common::open_store(args.db.as_deref())?;
    common::load_variant_table(&mut store, &args.rna_vcf, args.sample, RNA_TABLE, args.force)?;
    common::load_editing_databases(&mut store, &args.editing_dbs)?;

    let mut orchestrator = args.orchestrator();
    orchestrator.run(&mut store, RNA_TABLE)?;
    common::export_results(&store, args.fdr, &args.output)?;
    Ok(())
}
