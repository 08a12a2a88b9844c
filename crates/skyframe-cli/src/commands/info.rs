use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::Args;
use skyframe_core::codec::DecodeContext;
use skyframe_core::dispatch::dispatch;
use skyframe_core::frame::FileOutcome;
use skyframe_core::{CancellationToken, Instrument, ReadOptions};

use super::InstrumentArg;

#[derive(Args)]
pub struct InfoArgs {
    /// Camera that wrote the file
    #[arg(value_enum)]
    pub instrument: InstrumentArg,

    /// Input file
    pub file: PathBuf,

    /// Directory for temporary archive extraction
    #[arg(long)]
    pub scratch_dir: Option<PathBuf>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let instrument = Instrument::from(args.instrument);
    let format = instrument.format();
    let Some(container) = format.classify(&args.file) else {
        bail!(
            "{} is not a recognized {} file",
            args.file.display(),
            instrument
        );
    };

    let mut options = ReadOptions::default();
    if let Some(ref dir) = args.scratch_dir {
        options.scratch_dir = dir.clone();
    }
    let cancel = CancellationToken::new();
    let ctx = DecodeContext::new(format, &options, &cancel);

    println!("File:        {}", args.file.display());
    println!("Instrument:  {}", instrument);
    println!("Container:   {}", container);

    let outcome = dispatch(&args.file, &ctx);
    println!("Frames:      {}", outcome.frame_count());

    if let FileOutcome::Decoded(ref decoded) = outcome {
        if let Some(layout) = decoded.layout {
            println!("Layout:      {}", layout);
            let total_mb =
                (layout.frame_byte_size() * decoded.frame_count()) as f64 / (1024.0 * 1024.0);
            println!("Data size:   {:.1} MB", total_mb);
        }
        if let Some(first) = decoded.frames.first() {
            println!("Metadata:");
            for (key, value) in &first.metadata {
                println!("  {:<32}{}", key, serde_json::to_string(value)?);
            }
        }
    }

    if let Some(problem) = outcome.problem() {
        println!("Problem:     {}", problem.error_message);
    }

    Ok(())
}
