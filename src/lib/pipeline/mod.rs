//! The pipeline orchestrator.
//!
//! Sequences the filter chain in a fixed order, feeds each stage the
//! previous stage's output table, and finishes with the significance
//! engine. A stage whose output table is already valid and carries a
//! matching parameter fingerprint is skipped, so an interrupted run picks
//! up where it stopped; `force` disables the skipping. The orchestrator
//! owns the progress monitor and the cancellation token for its run and
//! can execute on a worker thread.

use crate::core::errors::{RedError, Result};
use crate::filters::{FilterStage, StageContext, StageReport};
use crate::progress::{CancelToken, ProgressListener, ProgressMonitor};
use crate::stats::significance::{SignificanceEngine, SignificanceReport};
use crate::stats::StatisticsBackend;
use crate::store::CandidateStore;
use log::info;
use std::thread::{self, JoinHandle};

#[derive(Debug, Default)]
pub struct PipelineSummary {
    pub stage_reports: Vec<StageReport>,
    pub skipped_stages: Vec<&'static str>,
    /// `None` when the significance output was reused from a previous run.
    pub significance: Option<SignificanceReport>,
    /// Table holding the annotated result set.
    pub final_table: String,
}

pub struct PipelineOrchestrator<B: StatisticsBackend> {
    stages: Vec<Box<dyn FilterStage>>,
    engine: SignificanceEngine<B>,
    editing_table: String,
    monitor: ProgressMonitor,
    cancel: CancelToken,
    force: bool,
}

impl<B: StatisticsBackend + 'static> PipelineOrchestrator<B> {
    pub fn new(engine: SignificanceEngine<B>, editing_table: &str) -> Self {
        PipelineOrchestrator {
            stages: Vec::new(),
            engine,
            editing_table: editing_table.to_string(),
            monitor: ProgressMonitor::new(),
            cancel: CancelToken::new(),
            force: false,
        }
    }

    pub fn add_stage(&mut self, stage: Box<dyn FilterStage>) {
        self.stages.push(stage);
    }

    pub fn add_listener(&mut self, listener: Box<dyn ProgressListener>) {
        self.monitor.add_listener(listener);
    }

    /// Re-run every stage even when a previous output table is still valid.
    pub fn set_force(&mut self, force: bool) {
        self.force = force;
    }

    /// Token shared with the running pipeline; callers keep a clone to
    /// request cancellation from another thread.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn stage_is_current(
        &self,
        store: &CandidateStore,
        table: &str,
        params: &str,
        upstream_dirty: bool,
    ) -> Result<bool> {
        if self.force || upstream_dirty {
            return Ok(false);
        }
        Ok(store.completion_matches(table, params)? && store.table_is_valid(table)?)
    }

    /// Run the whole pipeline over `input_table`, reporting through the
    /// registered listeners. Cancellation and stage failures halt the run;
    /// completed stage tables stay behind either way.
    pub fn run(
        &mut self,
        store: &mut CandidateStore,
        input_table: &str,
    ) -> Result<PipelineSummary> {
        match self.run_inner(store, input_table) {
            Ok(summary) => Ok(summary),
            Err(RedError::Cancelled) => {
                self.monitor.cancelled();
                Err(RedError::Cancelled)
            }
            Err(err) => {
                self.monitor.exception(&err);
                Err(err)
            }
        }
    }

    fn run_inner(
        &mut self,
        store: &mut CandidateStore,
        input_table: &str,
    ) -> Result<PipelineSummary> {
        let mut summary = PipelineSummary::default();
        let mut current = input_table.to_string();
        // Once one stage re-runs, everything downstream of its rewritten
        // output must re-run too, whatever its own marker says.
        let mut upstream_dirty = false;

        for stage in &self.stages {
            let output = stage.output_table().to_string();
            if self.stage_is_current(store, &output, &stage.params_fingerprint(), upstream_dirty)? {
                info!("stage '{}' is up to date, skipping", stage.name());
                summary.skipped_stages.push(stage.name());
                self.monitor.complete(&output, store.row_count(&output)?);
            } else {
                let mut ctx = StageContext {
                    store,
                    monitor: &self.monitor,
                    cancel: &self.cancel,
                };
                let report = stage.run(&mut ctx, &current)?;
                info!(
                    "stage '{}': {} -> {} rows ({} skipped)",
                    report.stage, report.input_rows, report.output_rows, report.skipped_rows
                );
                summary.stage_reports.push(report);
                upstream_dirty = true;
            }
            current = output;
        }

        let sig_output = self.engine.output_table().to_string();
        if self.stage_is_current(
            store,
            &sig_output,
            &self.engine.params_fingerprint(),
            upstream_dirty,
        )? {
            info!("significance output is up to date, skipping");
            summary.skipped_stages.push("significance");
            self.monitor.complete(&sig_output, store.row_count(&sig_output)?);
        } else {
            let mut ctx = StageContext {
                store,
                monitor: &self.monitor,
                cancel: &self.cancel,
            };
            let report = self
                .engine
                .run(&mut ctx, &current, &self.editing_table)?;
            summary.significance = Some(report);
        }
        summary.final_table = sig_output;
        Ok(summary)
    }

    /// Run on a worker thread, taking ownership of the store.
    pub fn spawn(
        mut self,
        mut store: CandidateStore,
        input_table: String,
    ) -> JoinHandle<Result<PipelineSummary>>
    where
        B: Send,
    {
        thread::spawn(move || self.run(&mut store, &input_table))
    }
}
