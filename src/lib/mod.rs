//! redpipe - RNA editing site detection from variant calls
//!
//! redpipe narrows a table of RNA variant calls down to likely RNA-editing
//! sites through a chain of filter stages, then scores the survivors
//! against a background editing rate estimated from curated known-editing
//! databases.
//!
//! # Pipeline
//!
//! 1. Quality/depth filtering of raw calls
//! 2. Repeat-region exclusion (Alu-family sites retained)
//! 3. Gene-window ("comprehensive") restriction
//! 4. Splice-junction exclusion
//! 5. Known-SNP exclusion
//! 6. DNA/RNA cross-check (paired mode only)
//! 7. Per-site Fisher exact test + Benjamini–Hochberg adjustment
//!
//! Every stage reads one SQLite table and writes a strictly narrower one,
//! so an interrupted run resumes from its last completed stage. See
//! [`pipeline::PipelineOrchestrator`] for the sequencing and
//! [`stats::significance::SignificanceEngine`] for the scoring.

pub mod core;
pub mod filters;
pub mod model;
pub mod parsers;
pub mod pipeline;
pub mod progress;
pub mod stats;
pub mod store;
