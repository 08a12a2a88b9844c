use std::path::{Path, PathBuf};

use tracing::info;

use crate::aggregate::{aggregate, ReadResult};
use crate::cancel::CancellationToken;
use crate::config::ReadOptions;
use crate::instrument::{Instrument, InstrumentFormat};
use crate::pool::read_outcomes;
use crate::progress::{NoOpReporter, ProgressReporter};

/// Read `files` written by `instrument` into one frame stack.
///
/// Never fails: per-file failures are listed in `ReadResult::problematic`.
pub fn read<P: AsRef<Path>>(
    instrument: Instrument,
    files: &[P],
    options: &ReadOptions,
) -> ReadResult {
    read_reported(
        instrument.format(),
        files,
        options,
        &CancellationToken::new(),
        &NoOpReporter,
    )
}

/// Read with a caller-owned cancellation token and progress reporter.
///
/// If `cancel` fires while files are being decoded, the partial work is
/// discarded and the empty result is returned.
pub fn read_reported<P: AsRef<Path>>(
    format: &InstrumentFormat,
    files: &[P],
    options: &ReadOptions,
    cancel: &CancellationToken,
    reporter: &dyn ProgressReporter,
) -> ReadResult {
    let files: Vec<PathBuf> = files.iter().map(|p| p.as_ref().to_path_buf()).collect();
    let outcomes = match read_outcomes(&files, format, options, cancel, reporter) {
        Ok(outcomes) => outcomes,
        Err(_) => return ReadResult::empty(),
    };

    let result = aggregate(outcomes);
    info!(
        files = files.len(),
        frames = result.frame_count(),
        problematic = result.problematic.len(),
        "Read complete"
    );
    result
}

pub fn read_nir<P: AsRef<Path>>(files: &[P], options: &ReadOptions) -> ReadResult {
    read(Instrument::Nir, files, options)
}

pub fn read_blueline<P: AsRef<Path>>(files: &[P], options: &ReadOptions) -> ReadResult {
    read(Instrument::Blueline, files, options)
}

pub fn read_spectrograph<P: AsRef<Path>>(files: &[P], options: &ReadOptions) -> ReadResult {
    read(Instrument::Spectrograph, files, options)
}

pub fn read_rgb<P: AsRef<Path>>(files: &[P], options: &ReadOptions) -> ReadResult {
    read(Instrument::Rgb, files, options)
}
