use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SkyframeError {
    #[error("failed to open file: {0}")]
    Open(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode error: {0}")]
    Decode(String),

    #[error("image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("consistency error: {0}")]
    Consistency(String),

    #[error("unrecognized file type: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    #[error("read cancelled")]
    Cancelled,
}

/// Failure taxonomy exposed to callers, independent of the concrete variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    OpenFailure,
    DecodeFailure,
    ConsistencyFailure,
    UnsupportedFormat,
    Cancelled,
}

impl SkyframeError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Open(_) => ErrorKind::OpenFailure,
            Self::Io(err) if err.kind() == std::io::ErrorKind::NotFound => ErrorKind::OpenFailure,
            Self::Io(err) if err.kind() == std::io::ErrorKind::PermissionDenied => {
                ErrorKind::OpenFailure
            }
            Self::Io(_) | Self::Decode(_) | Self::Image(_) => ErrorKind::DecodeFailure,
            Self::Consistency(_) => ErrorKind::ConsistencyFailure,
            Self::UnsupportedFormat(_) => ErrorKind::UnsupportedFormat,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    pub(crate) fn open(err: impl std::fmt::Display) -> Self {
        Self::Open(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SkyframeError>;
