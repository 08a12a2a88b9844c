use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::consts::{
    EFFECTIVE_EXPOSURE_PREFIX, EXPOSURE_PLUS_READOUT_PREFIX, RGB_RAW_DIMENSIONS,
    SPECTROGRAPH_DIMENSIONS,
};

/// On-disk container family of one file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContainerFormat {
    /// Text metadata interleaved with big-endian 16-bit pixel blocks.
    RawStream,
    /// A single image, or a tar archive of single images.
    ImageArchive,
    /// A structured dataset with per-frame attribute records.
    Dataset,
}

impl std::fmt::Display for ContainerFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RawStream => write!(f, "Raw stream"),
            Self::ImageArchive => write!(f, "Image archive"),
            Self::Dataset => write!(f, "Dataset"),
        }
    }
}

/// Per-instrument description of how its files are recognized and decoded.
#[derive(Clone, Debug)]
pub struct InstrumentFormat {
    pub name: &'static str,
    pub raw_suffixes: &'static [&'static str],
    pub image_suffixes: &'static [&'static str],
    pub dataset_suffixes: &'static [&'static str],
    /// Fixed raw-stream geometry as (width, height), validated against each
    /// frame's dimension line instead of being read from it.
    pub pinned_dimensions: Option<(usize, usize)>,
    /// A metadata key starting with any of these closes the current frame.
    pub exposure_prefixes: &'static [&'static str],
}

const RAW_SUFFIXES: &[&str] = &[".pgm.gz", ".pgm"];
const IMAGE_SUFFIXES: &[&str] = &[".png.tar", ".png"];
const DATASET_SUFFIXES: &[&str] = &[".h5"];
const BOTH_EXPOSURE_PREFIXES: &[&str] = &[EFFECTIVE_EXPOSURE_PREFIX, EXPOSURE_PLUS_READOUT_PREFIX];

static NIR: InstrumentFormat = InstrumentFormat {
    name: "NIR",
    raw_suffixes: RAW_SUFFIXES,
    image_suffixes: &[],
    dataset_suffixes: &[],
    pinned_dimensions: None,
    exposure_prefixes: BOTH_EXPOSURE_PREFIXES,
};

static BLUELINE: InstrumentFormat = InstrumentFormat {
    name: "Blueline",
    raw_suffixes: RAW_SUFFIXES,
    image_suffixes: &[],
    dataset_suffixes: &[],
    pinned_dimensions: None,
    exposure_prefixes: BOTH_EXPOSURE_PREFIXES,
};

static SPECTROGRAPH: InstrumentFormat = InstrumentFormat {
    name: "Spectrograph",
    raw_suffixes: RAW_SUFFIXES,
    image_suffixes: &[],
    dataset_suffixes: &[],
    pinned_dimensions: Some(SPECTROGRAPH_DIMENSIONS),
    exposure_prefixes: BOTH_EXPOSURE_PREFIXES,
};

static RGB: InstrumentFormat = InstrumentFormat {
    name: "RGB",
    raw_suffixes: RAW_SUFFIXES,
    image_suffixes: IMAGE_SUFFIXES,
    dataset_suffixes: DATASET_SUFFIXES,
    pinned_dimensions: Some(RGB_RAW_DIMENSIONS),
    exposure_prefixes: &[EFFECTIVE_EXPOSURE_PREFIX],
};

impl InstrumentFormat {
    /// Route a file to its container family by the longest matching suffix.
    pub fn classify(&self, path: &Path) -> Option<ContainerFormat> {
        let name = path.file_name()?.to_str()?;
        let candidates = [
            (self.raw_suffixes, ContainerFormat::RawStream),
            (self.image_suffixes, ContainerFormat::ImageArchive),
            (self.dataset_suffixes, ContainerFormat::Dataset),
        ];
        candidates
            .iter()
            .flat_map(|(suffixes, format)| suffixes.iter().map(move |s| (*s, *format)))
            .filter(|(suffix, _)| name.ends_with(suffix))
            .max_by_key(|(suffix, _)| suffix.len())
            .map(|(_, format)| format)
    }

    pub fn is_exposure_key(&self, key: &str) -> bool {
        self.exposure_prefixes.iter().any(|p| key.starts_with(p))
    }
}

/// Camera families with a dedicated reader.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Nir,
    Blueline,
    Spectrograph,
    Rgb,
}

impl Instrument {
    pub const ALL: [Instrument; 4] = [Self::Nir, Self::Blueline, Self::Spectrograph, Self::Rgb];

    pub fn format(self) -> &'static InstrumentFormat {
        match self {
            Self::Nir => &NIR,
            Self::Blueline => &BLUELINE,
            Self::Spectrograph => &SPECTROGRAPH,
            Self::Rgb => &RGB,
        }
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format().name)
    }
}

impl std::str::FromStr for Instrument {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|i| i.format().name.eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown instrument '{s}'"))
    }
}
