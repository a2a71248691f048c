//! Shared progress counter and cancellation flag for the grid evaluation.
//!
//! Workers never touch the shared counter on every model. Each worker owns a
//! [`LocalProgress`] that batches `freq_inc` steps before one atomic add, and
//! a progress line is logged whenever the global count crosses a multiple of
//! `freq_print`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use tracing::info;

use crate::error::FitError;

#[derive(Debug)]
pub struct ProgressCounter {
    total: usize,
    freq_inc: usize,
    freq_print: usize,
    count: AtomicUsize,
    start: Instant,
}

impl ProgressCounter {
    /// `freq_print` must be a non-zero multiple of `freq_inc`.
    pub fn new(total: usize, freq_inc: usize, freq_print: usize) -> Result<Self, FitError> {
        if freq_inc == 0 || freq_print == 0 {
            return Err(FitError::InvalidArgument(
                "progress frequencies must be positive".to_string(),
            ));
        }
        if freq_print % freq_inc != 0 {
            return Err(FitError::InvalidArgument(format!(
                "print frequency ({freq_print}) must be a multiple of the increment frequency ({freq_inc})"
            )));
        }
        Ok(Self {
            total,
            freq_inc,
            freq_print,
            count: AtomicUsize::new(0),
            start: Instant::now(),
        })
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Relaxed)
    }

    /// A per-worker handle; dropping it flushes any pending steps.
    pub fn local(&self) -> LocalProgress<'_> {
        LocalProgress {
            shared: self,
            pending: 0,
        }
    }

    fn add(&self, n: usize) {
        if n == 0 {
            return;
        }
        let before = self.count.fetch_add(n, Ordering::Relaxed);
        let after = before + n;
        if before / self.freq_print != after / self.freq_print {
            self.report(after);
        }
    }

    /// Log the current count unconditionally.
    pub fn finish(&self) {
        self.report(self.count());
    }

    fn report(&self, n: usize) {
        let elapsed = self.start.elapsed();
        let secs = elapsed.as_secs_f64();
        let rate = if secs > 0.0 { n as f64 / secs } else { 0.0 };
        info!(
            "{n}/{} models in {} ({rate:.1}/s)",
            self.total,
            format_elapsed(elapsed)
        );
    }
}

/// Worker-local batch of progress steps.
pub struct LocalProgress<'a> {
    shared: &'a ProgressCounter,
    pending: usize,
}

impl LocalProgress<'_> {
    pub fn step(&mut self) {
        self.pending += 1;
        if self.pending == self.shared.freq_inc {
            self.flush();
        }
    }

    pub fn flush(&mut self) {
        self.shared.add(self.pending);
        self.pending = 0;
    }
}

impl Drop for LocalProgress<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

/// `HH:MM:SS.s`
pub fn format_elapsed(elapsed: Duration) -> String {
    let total = elapsed.as_secs_f64();
    let hours = (total / 3600.0).floor();
    let minutes = ((total - hours * 3600.0) / 60.0).floor();
    let seconds = total - hours * 3600.0 - minutes * 60.0;
    format!("{:02}:{:02}:{:04.1}", hours as u64, minutes as u64, seconds)
}

/// Caller-driven abort of a running evaluation.
///
/// Workers check the flag before each model; models already dispatched finish
/// and the partial tensor is discarded.
#[derive(Debug, Default)]
pub struct CancelFlag(AtomicBool);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
