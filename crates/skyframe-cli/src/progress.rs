use anyhow::Result;
use indicatif::{ProgressBar, ProgressStyle};
use skyframe_core::progress::ProgressReporter;

/// Drives a terminal progress bar from worker threads.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new() -> Result<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:10} [{bar:40}] {pos}/{len} files")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }
}

impl ProgressReporter for BarReporter {
    fn begin(&self, total_files: usize) {
        self.bar.set_length(total_files as u64);
        self.bar.set_message("Reading");
    }

    // Completion order is not input order, so count rather than trust `files_done`.
    fn advance(&self, _files_done: usize) {
        self.bar.inc(1);
    }

    fn finish(&self) {
        self.bar.finish_with_message("Done");
    }
}
