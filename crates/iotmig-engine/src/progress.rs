//! Progress reporting hook.

/// Receives progress from fetches and from pool workers.
///
/// Called concurrently from many workers.
pub trait ProgressReporter: Send + Sync {
    /// Set the expected number of units.
    fn set_total(&self, _total: u64) {}

    /// Record `delta` completed units.
    fn inc(&self, _delta: u64) {}

    /// Finish reporting.
    fn finish(&self, _message: &str) {}
}

/// Reporter that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {}
