/// Magic line opening every raw frame stream.
pub const STREAM_MAGIC: &[u8] = b"P5";

/// Line announcing a pixel block; the line before it holds `width height`.
pub const PIXEL_BLOCK_SENTINEL: &[u8] = b"65535";

/// Prefix of a metadata line: `#"<key>"<value>`.
pub const METADATA_LINE_PREFIX: &[u8] = b"#\"";

/// Sticky metadata keys carried forward across frames of one stream.
pub const SITE_UID_KEY: &str = "Site unique ID";
pub const DEVICE_UID_KEY: &str = "Imager unique ID";

/// Metadata keys derived from image filenames.
pub const PROJECT_UID_KEY: &str = "Project unique ID";
pub const MODE_UID_KEY: &str = "Mode unique ID";
pub const REQUEST_START_KEY: &str = "Image request start";
pub const EXPOSURE_KEY: &str = "Subframe requested exposure";

/// Project identifier stamped on filename-derived metadata.
pub const PROJECT_UID: &str = "trex";

/// Exposure key prefixes that close a frame's metadata block.
pub const EFFECTIVE_EXPOSURE_PREFIX: &str = "Effective image exposure";
pub const EXPOSURE_PLUS_READOUT_PREFIX: &str = "Exposure plus readout";

/// Pinned raw-stream geometry (width, height) for fixed-resolution imagers.
pub const SPECTROGRAPH_DIMENSIONS: (usize, usize) = (256, 1024);
pub const RGB_RAW_DIMENSIONS: (usize, usize) = (553, 480);

/// Prefix of the private per-archive extraction directory.
pub const SCRATCH_PREFIX: &str = "skyframe-";

/// Structured-store layout.
pub const DATASET_IMAGES_PATH: &str = "data/images";
pub const DATASET_FILE_ATTRS_PATH: &str = "metadata/file";
pub const DATASET_FRAME_GROUP_PATH: &str = "metadata/frame";
pub const DATASET_FRAME_RECORD_PREFIX: &str = "frame";
