//! Progress reporting and cooperative cancellation.
//!
//! The pipeline runs on a worker thread; callers observe it through
//! [`ProgressListener`] callbacks multiplexed by a [`ProgressMonitor`].
//! Notifications fire at batch boundaries (roughly every thousand rows on
//! large scans), never per row.

use crate::core::errors::RedError;
use log::{error, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub trait ProgressListener: Send {
    /// Periodic update; `current`/`total` may both be zero when the total
    /// is unknown.
    fn progress_updated(&self, message: &str, current: u64, total: u64);

    /// A unit of work finished; `rows` is the size of its output.
    fn progress_complete(&self, tag: &str, rows: u64);

    /// The run stopped at a cancellation point. Emitted instead of a
    /// completion notification; committed work remains.
    fn progress_cancelled(&self);

    /// A stage failed; the remaining pipeline will not run.
    fn progress_exception_received(&self, error: &RedError);
}

/// Fan-out to any number of listeners.
#[derive(Default)]
pub struct ProgressMonitor {
    listeners: Vec<Box<dyn ProgressListener>>,
}

impl ProgressMonitor {
    pub fn new() -> Self {
        ProgressMonitor::default()
    }

    pub fn add_listener(&mut self, listener: Box<dyn ProgressListener>) {
        self.listeners.push(listener);
    }

    pub fn updated(&self, message: &str, current: u64, total: u64) {
        for listener in &self.listeners {
            listener.progress_updated(message, current, total);
        }
    }

    pub fn complete(&self, tag: &str, rows: u64) {
        for listener in &self.listeners {
            listener.progress_complete(tag, rows);
        }
    }

    pub fn cancelled(&self) {
        for listener in &self.listeners {
            listener.progress_cancelled();
        }
    }

    pub fn exception(&self, error: &RedError) {
        for listener in &self.listeners {
            listener.progress_exception_received(error);
        }
    }
}

/// Listener that forwards everything to the `log` facade.
pub struct LogProgress;

impl ProgressListener for LogProgress {
    fn progress_updated(&self, message: &str, current: u64, total: u64) {
        if total > 0 {
            info!("[{}/{}] {}", current, total, message);
        } else {
            info!("{}", message);
        }
    }

    fn progress_complete(&self, tag: &str, rows: u64) {
        info!("{} complete ({} rows)", tag, rows);
    }

    fn progress_cancelled(&self) {
        warn!("run cancelled");
    }

    fn progress_exception_received(&self, err: &RedError) {
        error!("{}", err);
    }
}

/// Shared cancellation flag, checked cooperatively at batch boundaries.
#[derive(Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
