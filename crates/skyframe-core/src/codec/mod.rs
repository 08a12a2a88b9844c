pub mod archive;
pub mod dataset;
pub mod stream;

use crate::cancel::CancellationToken;
use crate::config::ReadOptions;
use crate::error::{Result, SkyframeError};
use crate::instrument::InstrumentFormat;

/// Everything a codec needs besides the file itself.
#[derive(Clone, Copy, Debug)]
pub struct DecodeContext<'a> {
    pub format: &'a InstrumentFormat,
    pub options: &'a ReadOptions,
    pub cancel: &'a CancellationToken,
}

impl<'a> DecodeContext<'a> {
    pub fn new(
        format: &'a InstrumentFormat,
        options: &'a ReadOptions,
        cancel: &'a CancellationToken,
    ) -> Self {
        Self {
            format,
            options,
            cancel,
        }
    }

    pub(crate) fn check_cancelled(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            Err(SkyframeError::Cancelled)
        } else {
            Ok(())
        }
    }
}
