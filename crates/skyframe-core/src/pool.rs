use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use rayon::ThreadPoolBuilder;
use tracing::{info, warn};

use crate::cancel::CancellationToken;
use crate::codec::DecodeContext;
use crate::config::ReadOptions;
use crate::dispatch::dispatch;
use crate::error::{Result, SkyframeError};
use crate::frame::FileOutcome;
use crate::instrument::InstrumentFormat;
use crate::progress::ProgressReporter;

/// Decode every file, returning one outcome per file in input order.
///
/// With one worker the files are decoded inline on the calling thread;
/// otherwise a dedicated pool of `options.workers` threads is used. Returns
/// `SkyframeError::Cancelled` if `cancel` fires before all files finish.
pub fn read_outcomes(
    files: &[PathBuf],
    format: &InstrumentFormat,
    options: &ReadOptions,
    cancel: &CancellationToken,
    reporter: &dyn ProgressReporter,
) -> Result<Vec<FileOutcome>> {
    let ctx = DecodeContext::new(format, options, cancel);
    let counter = AtomicUsize::new(0);
    let workers = options.worker_count().min(files.len().max(1));

    let run_one = |path: &PathBuf| -> Option<FileOutcome> {
        if cancel.is_cancelled() {
            return None;
        }
        let outcome = dispatch(path, &ctx);
        let done = counter.fetch_add(1, Ordering::Relaxed) + 1;
        reporter.advance(done);
        Some(outcome)
    };

    reporter.begin(files.len());
    info!(
        files = files.len(),
        workers,
        instrument = format.name,
        "Reading files"
    );

    let outcomes: Vec<Option<FileOutcome>> = if workers == 1 {
        files.iter().map(run_one).collect()
    } else {
        match ThreadPoolBuilder::new()
            .num_threads(workers)
            .thread_name(|i| format!("skyframe-worker-{i}"))
            .build()
        {
            Ok(pool) => pool.install(|| files.par_iter().map(run_one).collect()),
            Err(e) => {
                warn!(error = %e, "Worker pool unavailable, decoding inline");
                files.iter().map(run_one).collect()
            }
        }
    };
    reporter.finish();

    if cancel.is_cancelled() {
        info!("Read cancelled, discarding partial results");
        return Err(SkyframeError::Cancelled);
    }
    outcomes
        .into_iter()
        .collect::<Option<Vec<_>>>()
        .ok_or(SkyframeError::Cancelled)
}
