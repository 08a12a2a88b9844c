use std::panic::{self, AssertUnwindSafe};
use std::path::Path;

use tracing::{debug, warn};

use crate::codec::archive::decode_image_archive;
use crate::codec::dataset::decode_dataset_file;
use crate::codec::stream::decode_stream_file;
use crate::codec::DecodeContext;
use crate::error::SkyframeError;
use crate::frame::{FileOutcome, Problem};
use crate::instrument::ContainerFormat;

/// Route one file to its codec by suffix.
///
/// Never fails: an unknown suffix, a codec error or a codec panic all become
/// `FileOutcome::Failed`.
pub fn dispatch(path: &Path, ctx: &DecodeContext<'_>) -> FileOutcome {
    let Some(format) = ctx.format.classify(path) else {
        let err = SkyframeError::UnsupportedFormat(path.to_path_buf());
        warn!(file = %path.display(), "Unrecognized file type");
        return FileOutcome::Failed(Problem::new(path, err.to_string()));
    };
    debug!(file = %path.display(), format = %format, "Dispatching");

    let result = panic::catch_unwind(AssertUnwindSafe(|| match format {
        ContainerFormat::RawStream => decode_stream_file(path, ctx),
        ContainerFormat::ImageArchive => decode_image_archive(path, ctx),
        ContainerFormat::Dataset => decode_dataset_file(path, ctx),
    }));

    match result {
        Ok(Ok(decoded)) => FileOutcome::Decoded(decoded),
        Ok(Err(err)) => {
            warn!(file = %path.display(), kind = ?err.kind(), error = %err, "Failed to process file");
            FileOutcome::Failed(Problem::new(path, err.to_string()))
        }
        Err(payload) => {
            let reason = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            warn!(file = %path.display(), reason = %reason, "Codec panicked");
            FileOutcome::Failed(Problem::new(
                path,
                format!("failed to process file: {reason}"),
            ))
        }
    }
}
