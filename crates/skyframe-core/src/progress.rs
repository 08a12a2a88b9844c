/// Thread-safe progress reporting for a read call.
///
/// Implementors can use this to drive progress bars or logging. `advance` is
/// called from worker threads as files complete, in completion order. All
/// methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// Reading has started over `total_files` files.
    fn begin(&self, _total_files: usize) {}

    /// `files_done` files have been processed so far.
    fn advance(&self, _files_done: usize) {}

    /// All files have been processed, or the read was cancelled.
    fn finish(&self) {}
}

/// No-op progress reporter, used when the caller supplies none.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
