use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use serde::Serialize;
use skyframe_core::frame::{Metadata, Problem};
use skyframe_core::{read_reported, CancellationToken, Instrument, ReadOptions, ReadResult};
use tracing::debug;

use super::InstrumentArg;
use crate::progress::BarReporter;
use crate::summary;

#[derive(Args)]
pub struct ReadArgs {
    /// Camera that wrote the files
    #[arg(value_enum)]
    pub instrument: InstrumentArg,

    /// Input files, stacked in the order given
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// Read options file (TOML); flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of parallel workers
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Read only the first frame of each file
    #[arg(long)]
    pub first_frame: bool,

    /// Skip metadata parsing
    #[arg(long)]
    pub no_metadata: bool,

    /// Directory for temporary archive extraction
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,

    /// Write per-frame metadata and problem files as JSON
    #[arg(long)]
    pub metadata_json: Option<PathBuf>,
}

#[derive(Serialize)]
struct MetadataReport<'a> {
    instrument: Instrument,
    shape: &'a [usize],
    dtype: String,
    frames: &'a [Metadata],
    problematic: &'a [Problem],
}

pub fn run(args: &ReadArgs) -> Result<()> {
    let options = build_options(args)?;
    let instrument = Instrument::from(args.instrument);
    summary::print_read_plan(instrument, args.files.len(), &options);

    let cancel = CancellationToken::new();
    let handler_token = cancel.clone();
    ctrlc::set_handler(move || {
        handler_token.cancel();
        eprintln!("\nInterrupted, stopping workers...");
    })
    .context("Failed to install Ctrl-C handler")?;

    let reporter = BarReporter::new()?;
    let result = read_reported(
        instrument.format(),
        &args.files,
        &options,
        &cancel,
        &reporter,
    );
    if cancel.is_cancelled() {
        bail!("Read cancelled, no frames kept");
    }

    summary::print_read_summary(&result);

    if let Some(ref path) = args.metadata_json {
        write_metadata_json(path, instrument, &result)?;
        println!("Metadata saved to {}", path.display());
    }

    Ok(())
}

fn build_options(args: &ReadArgs) -> Result<ReadOptions> {
    let mut options = match args.config {
        Some(ref path) => ReadOptions::from_toml_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => ReadOptions::default(),
    };
    if let Some(workers) = args.workers {
        options.workers = workers;
    }
    if args.first_frame {
        options.first_frame = true;
    }
    if args.no_metadata {
        options.no_metadata = true;
    }
    if let Some(ref dir) = args.scratch_dir {
        options.scratch_dir = dir.clone();
    }
    debug!(?options, "Resolved read options");
    Ok(options)
}

fn write_metadata_json(path: &Path, instrument: Instrument, result: &ReadResult) -> Result<()> {
    let report = MetadataReport {
        instrument,
        shape: result.images.shape(),
        dtype: result.images.pixel_type().to_string(),
        frames: &result.metadata,
        problematic: &result.problematic,
    };
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write metadata to {}", path.display()))?;
    Ok(())
}
