use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use ndarray::Array3;
use serde::{Deserialize, Serialize};

/// Sample type of decoded pixels.
///
/// `U16` samples come from big-endian 16-bit raw containers and are held as
/// native `u16` values once decoded.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PixelType {
    U8,
    U16,
}

impl PixelType {
    pub fn bytes_per_sample(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
        }
    }
}

impl std::fmt::Display for PixelType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::U8 => write!(f, "uint8"),
            Self::U16 => write!(f, "uint16"),
        }
    }
}

/// Geometry and sample type shared by every frame of one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrameLayout {
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    pub pixel_type: PixelType,
}

impl FrameLayout {
    pub fn frame_byte_size(&self) -> usize {
        self.height * self.width * self.channels * self.pixel_type.bytes_per_sample()
    }
}

impl std::fmt::Display for FrameLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.channels > 1 {
            write!(
                f,
                "{}x{}x{} {}",
                self.height, self.width, self.channels, self.pixel_type
            )
        } else {
            write!(f, "{}x{} {}", self.height, self.width, self.pixel_type)
        }
    }
}

/// Pixel buffer of one frame, shape = (height, width, channels).
#[derive(Clone, Debug, PartialEq)]
pub enum FramePixels {
    U8(Array3<u8>),
    U16(Array3<u16>),
}

impl FramePixels {
    pub fn layout(&self) -> FrameLayout {
        let (shape, pixel_type) = match self {
            Self::U8(a) => (a.dim(), PixelType::U8),
            Self::U16(a) => (a.dim(), PixelType::U16),
        };
        FrameLayout {
            height: shape.0,
            width: shape.1,
            channels: shape.2,
            pixel_type,
        }
    }

    pub fn byte_len(&self) -> usize {
        self.layout().frame_byte_size()
    }
}

/// A single metadata value.
///
/// A key seen more than once within one frame is promoted to `Multi`,
/// preserving insertion order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Scalar(String),
    Multi(Vec<String>),
    Timestamp(NaiveDateTime),
}

impl MetadataValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Scalar(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(s: &str) -> Self {
        Self::Scalar(s.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(s: String) -> Self {
        Self::Scalar(s)
    }
}

pub type Metadata = BTreeMap<String, MetadataValue>;

/// Insert `value` under `key`, promoting an existing entry to `Multi`.
pub fn insert_metadata(metadata: &mut Metadata, key: &str, value: String) {
    let Some(existing) = metadata.get_mut(key) else {
        metadata.insert(key.to_string(), MetadataValue::Scalar(value));
        return;
    };
    match existing {
        MetadataValue::Multi(values) => values.push(value),
        MetadataValue::Scalar(first) => {
            let first = std::mem::take(first);
            *existing = MetadataValue::Multi(vec![first, value]);
        }
        MetadataValue::Timestamp(ts) => {
            let first = ts.to_string();
            *existing = MetadataValue::Multi(vec![first, value]);
        }
    }
}

/// One decoded image plus its metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    pub pixels: FramePixels,
    pub metadata: Metadata,
}

impl Frame {
    pub fn new(pixels: FramePixels, metadata: Metadata) -> Self {
        Self { pixels, metadata }
    }

    pub fn layout(&self) -> FrameLayout {
        self.pixels.layout()
    }

    pub fn height(&self) -> usize {
        self.layout().height
    }

    pub fn width(&self) -> usize {
        self.layout().width
    }
}

/// A file that yielded zero or partial usable frames, with the reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
    pub filename: PathBuf,
    pub error_message: String,
}

impl Problem {
    pub fn new(filename: &Path, error_message: impl Into<String>) -> Self {
        Self {
            filename: filename.to_path_buf(),
            error_message: error_message.into(),
        }
    }
}

/// Frames decoded from one file.
///
/// `problem` is set when some frames were dropped during recovery; the
/// surviving frames are still usable.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedFile {
    pub filename: PathBuf,
    pub frames: Vec<Frame>,
    pub layout: Option<FrameLayout>,
    pub problem: Option<Problem>,
}

impl DecodedFile {
    pub fn new(filename: &Path) -> Self {
        Self {
            filename: filename.to_path_buf(),
            frames: Vec::new(),
            layout: None,
            problem: None,
        }
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    /// Record a recoverable problem. The latest message wins.
    pub fn mark_problem(&mut self, message: impl Into<String>) {
        self.problem = Some(Problem::new(&self.filename, message));
    }
}

/// The result of processing exactly one input file.
#[derive(Clone, Debug, PartialEq)]
#[allow(clippy::large_enum_variant)]
pub enum FileOutcome {
    Decoded(DecodedFile),
    Failed(Problem),
}

impl FileOutcome {
    pub fn frame_count(&self) -> usize {
        match self {
            Self::Decoded(file) => file.frame_count(),
            Self::Failed(_) => 0,
        }
    }

    pub fn problem(&self) -> Option<&Problem> {
        match self {
            Self::Decoded(file) => file.problem.as_ref(),
            Self::Failed(problem) => Some(problem),
        }
    }
}
