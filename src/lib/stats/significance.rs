//! The significance engine.
//!
//! Runs after the filter chain: estimates a background editing rate from
//! the candidates that match a curated known-editing database, tests every
//! candidate against that background with a two-sided exact test, and
//! applies a Benjamini–Hochberg correction to the survivors. The engine is
//! a small state machine; each phase consumes the previous phase's output
//! and the run is not restartable mid-way.

use super::StatisticsBackend;
use crate::core::errors::{RedError, Result};
use crate::filters::{scan_input, StageContext};
use crate::model::{AnnotatedSite, VariantRecord};
use crate::store::schema::{annotated_schema, IndexSpec};
use crate::store::{CandidateStore, Predicate};
use log::{debug, info};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

const STAGE_NAME: &str = "significance";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Collecting,
    BackgroundEstimated,
    PerSiteTested,
    FdrAdjusted,
    Done,
}

#[derive(Debug, Clone, Copy)]
pub struct SignificanceConfig {
    /// Candidates with `p >= p_threshold` are dropped before adjustment.
    pub p_threshold: f64,
    /// Only rows with an adjusted value below this are promoted to the
    /// significant set (and get their `fdr` column populated).
    pub fdr_threshold: f64,
}

impl Default for SignificanceConfig {
    fn default() -> Self {
        SignificanceConfig {
            p_threshold: 0.05,
            fdr_threshold: 0.05,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SignificanceReport {
    pub input_rows: u64,
    /// Rows whose depth field failed to parse.
    pub skipped_rows: u64,
    pub known_rows: u64,
    pub background_ref: u64,
    pub background_alt: u64,
    /// Rows passing the raw p-value gate and written to the output table.
    pub surviving_rows: u64,
    /// Rows passing the FDR gate.
    pub significant_rows: u64,
}

struct Candidate {
    record: VariantRecord,
    ref_count: u64,
    alt_count: u64,
    is_known: bool,
}

pub struct SignificanceEngine<B: StatisticsBackend> {
    backend: B,
    config: SignificanceConfig,
    output: String,
    state: EngineState,
}

impl<B: StatisticsBackend> SignificanceEngine<B> {
    pub fn new(backend: B, config: SignificanceConfig, output: &str) -> Self {
        SignificanceEngine {
            backend,
            config,
            output: output.to_string(),
            state: EngineState::Collecting,
        }
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn output_table(&self) -> &str {
        &self.output
    }

    pub fn params_fingerprint(&self) -> String {
        format!("p={},fdr={}", self.config.p_threshold, self.config.fdr_threshold)
    }

    /// Drive the whole state machine over `input_table`, writing the
    /// annotated survivors to the configured output table.
    pub fn run(
        &mut self,
        ctx: &mut StageContext<'_>,
        input_table: &str,
        editing_table: &str,
    ) -> Result<SignificanceReport> {
        let mut report = SignificanceReport::default();

        let candidates = self.collect(ctx, input_table, editing_table, &mut report)?;
        self.state = EngineState::Collecting;

        let (bg_ref, bg_alt) = self.estimate_background(&candidates)?;
        report.background_ref = bg_ref;
        report.background_alt = bg_alt;
        self.state = EngineState::BackgroundEstimated;
        info!(
            "background counts: ref={} alt={} over {} candidates ({} known)",
            bg_ref,
            bg_alt,
            candidates.len(),
            report.known_rows
        );

        let survivors = self.test_sites(ctx, candidates, bg_ref, bg_alt)?;
        report.surviving_rows = survivors.len() as u64;
        self.state = EngineState::PerSiteTested;

        self.write_survivors(ctx, &survivors)?;
        report.significant_rows = self.adjust(ctx, &survivors)?;
        self.state = EngineState::FdrAdjusted;

        ctx.store.record_completion(
            STAGE_NAME,
            &self.output,
            report.surviving_rows,
            &self.params_fingerprint(),
        )?;
        ctx.monitor.complete(&self.output, report.surviving_rows);
        self.state = EngineState::Done;
        Ok(report)
    }

    fn collect(
        &self,
        ctx: &mut StageContext<'_>,
        input_table: &str,
        editing_table: &str,
        report: &mut SignificanceReport,
    ) -> Result<Vec<Candidate>> {
        if !ctx.store.table_exists(editing_table)? {
            return Err(RedError::Storage(format!(
                "known-editing table '{}' is missing; import a database first",
                editing_table
            )));
        }
        let known: HashSet<(String, u64)> = ctx
            .store
            .join_positions(input_table, editing_table)?
            .into_iter()
            .collect();

        let rows = scan_input(ctx, STAGE_NAME, input_table)?;
        report.input_rows = rows.len() as u64;
        let mut candidates = Vec::with_capacity(rows.len());
        for record in rows {
            ctx.checkpoint()?;
            match record.allele_depths() {
                Ok((ref_count, alt_count)) => {
                    let is_known = known.contains(&(record.chrom.clone(), record.pos));
                    if is_known {
                        report.known_rows += 1;
                    }
                    candidates.push(Candidate {
                        record,
                        ref_count,
                        alt_count,
                        is_known,
                    });
                }
                Err(e) => {
                    debug!("{}", e);
                    report.skipped_rows += 1;
                }
            }
        }
        Ok(candidates)
    }

    /// Known candidates contribute their observed ref/alt counts to the
    /// background; novel candidates contribute their whole depth as
    /// reference mass. Both sums are averaged over the full candidate set.
    fn estimate_background(&self, candidates: &[Candidate]) -> Result<(u64, u64)> {
        if candidates.is_empty() {
            return Err(RedError::InsufficientData(
                "no candidates left to estimate a background editing rate from".to_string(),
            ));
        }
        let mut alt_mass = 0u64;
        let mut ref_mass = 0u64;
        for c in candidates {
            if c.is_known {
                alt_mass += c.alt_count;
                ref_mass += c.ref_count;
            } else {
                ref_mass += c.ref_count + c.alt_count;
            }
        }
        let n = candidates.len() as f64;
        Ok((
            (ref_mass as f64 / n).round() as u64,
            (alt_mass as f64 / n).round() as u64,
        ))
    }

    fn test_sites(
        &self,
        ctx: &StageContext<'_>,
        candidates: Vec<Candidate>,
        bg_ref: u64,
        bg_alt: u64,
    ) -> Result<Vec<AnnotatedSite>> {
        ctx.checkpoint()?;
        let tables: Vec<[u64; 4]> = candidates
            .iter()
            .map(|c| [c.ref_count, c.alt_count, bg_ref, bg_alt])
            .collect();
        let p_values = self.backend.exact_tests(&tables)?;

        let mut survivors = Vec::new();
        for (candidate, p) in candidates.into_iter().zip(p_values) {
            if p >= self.config.p_threshold {
                continue;
            }
            let total = candidate.ref_count + candidate.alt_count;
            let level = if total == 0 {
                0.0
            } else {
                candidate.alt_count as f64 / total as f64
            };
            survivors.push(AnnotatedSite {
                variant: candidate.record,
                level,
                pvalue: p,
                fdr: None,
            });
        }
        Ok(survivors)
    }

    fn write_survivors(&self, ctx: &mut StageContext<'_>, survivors: &[AnnotatedSite]) -> Result<()> {
        ctx.store
            .recreate_table(&self.output, &annotated_schema(), Some(&IndexSpec::chrom_pos()))?;
        let total = survivors.len() as u64;
        let monitor = ctx.monitor;
        let cancel = ctx.cancel.clone();
        let output = self.output.clone();
        ctx.store.bulk_load(
            &self.output,
            survivors.iter().cloned().map(Ok),
            |inserted| {
                monitor.updated(&format!("{}: writing {}", STAGE_NAME, output), inserted, total);
                !cancel.is_cancelled()
            },
        )?;
        Ok(())
    }

    /// Adjust surviving p-values in their original order and populate the
    /// `fdr` column of rows passing the threshold. Returns how many passed.
    fn adjust(&self, ctx: &mut StageContext<'_>, survivors: &[AnnotatedSite]) -> Result<u64> {
        if survivors.is_empty() {
            return Ok(0);
        }
        let p_values: Vec<f64> = survivors.iter().map(|s| s.pvalue).collect();
        let q_values = self.backend.adjust_fdr(&p_values)?;
        let mut significant = 0u64;
        for (site, q) in survivors.iter().zip(q_values) {
            ctx.checkpoint()?;
            if q < self.config.fdr_threshold {
                ctx.store
                    .update_fdr(&self.output, &site.variant.chrom, site.variant.pos, q)?;
                significant += 1;
            }
        }
        Ok(significant)
    }

    /// The promoted result set: rows whose populated `fdr` passed the gate.
    pub fn significant(&self, store: &CandidateStore) -> Result<Vec<AnnotatedSite>> {
        store.select_where(&self.output, &Predicate::le("fdr", self.config.fdr_threshold))
    }
}

/// Write the significant site set as a tab-separated report.
pub fn export_significant_tsv<P: AsRef<Path>>(
    sites: &[AnnotatedSite],
    path: P,
) -> Result<()> {
    crate::core::io::make_parent_dirs(path.as_ref())?;
    let mut out = BufWriter::new(File::create(path.as_ref())?);
    writeln!(out, "chrom\tpos\tref\talt\tad\tlevel\tpvalue\tfdr")?;
    for site in sites {
        let v = &site.variant;
        writeln!(
            out,
            "{}\t{}\t{}\t{}\t{}\t{:.4}\t{:e}\t{:e}",
            v.chrom,
            v.pos,
            v.ref_base,
            v.alt_base,
            v.ad,
            site.level,
            site.pvalue,
            site.fdr.unwrap_or(f64::NAN),
        )?;
    }
    out.flush()?;
    Ok(())
}
