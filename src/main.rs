//! redpipe - RNA editing site detection from variant calls
//!
//! redpipe narrows RNA variant calls down to likely RNA-editing sites
//! through a staged filter chain, then scores the survivors with a Fisher
//! exact test against a background editing rate and a Benjamini–Hochberg
//! correction.
//!
//! # Tools
//!
//! - `denovo`: detect editing sites from RNA calls alone
//! - `dnarna`: detect editing sites with a matched DNA call set
//!
//! # Usage
//!
//! ```bash
//! # De novo detection
//! redpipe denovo --rna-vcf rna.vcf.gz --repeats rmsk.txt --genes refgene.txt \
//!     --snps dbsnp.txt --editing-db darned=darned.txt --output sites.tsv
//!
//! # Paired detection with a resumable on-disk store
//! redpipe dnarna --rna-vcf rna.vcf.gz --dna-vcf dna.vcf.gz --repeats rmsk.txt \
//!     --genes refgene.txt --snps dbsnp.txt --editing-db radar=radar.txt \
//!     --db run.sqlite --output sites.tsv
//! ```

extern crate redpipe_lib;
pub mod commands;
use anyhow::Result;
use env_logger::Env;
use log::*;
use redpipe_lib::core::errors::is_broken_pipe;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(rename_all = "kebab-case", author, about)]
/// Commands for detecting RNA-editing sites with redpipe
struct Args {
    #[structopt(subcommand)]
    subcommand: Subcommand,
}

#[derive(StructOpt)]
enum Subcommand {
    /// Detect editing sites from RNA variant calls alone
    Denovo(commands::DenovoArgs),
    /// Detect editing sites using a matched DNA call set
    Dnarna(commands::DnaRnaArgs),
}

impl Subcommand {
    fn run(self) -> Result<()> {
        match self {
            Subcommand::Denovo(args) => commands::run_denovo(args)?,
            Subcommand::Dnarna(args) => commands::run_dnarna(args)?,
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    if let Err(err) = Args::from_args().subcommand.run() {
        if is_broken_pipe(&err) {
            std::process::exit(0);
        }
        error!("{}", err);
        std::process::exit(1);
    }
    Ok(())
}
