//! Structured datasets: one pixel dataset plus file-level and per-frame
//! attribute records.

use std::path::Path;

use ndarray::{Array3, ArrayD, Axis};
use tracing::debug;

use crate::error::{Result, SkyframeError};
use crate::frame::{DecodedFile, Frame, FramePixels, Metadata};

use super::DecodeContext;

/// Pixel data as stored, before splitting into frames.
#[derive(Clone, Debug, PartialEq)]
pub enum PixelBlock {
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
}

/// Interpretation of the pixel dataset's dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DatasetShape {
    pub frames: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
    /// False when the dataset holds a single frame without a frame axis.
    pub has_frame_axis: bool,
}

impl DatasetShape {
    /// 4-D is `(frames, h, w, c)`; 3-D is a single `(h, w, c)` frame when the
    /// last axis is 3 or 4, otherwise `(frames, h, w)`; 2-D is one `(h, w)` frame.
    pub fn from_dims(dims: &[usize]) -> Result<Self> {
        let shape = match *dims {
            [frames, height, width, channels] => Self {
                frames,
                height,
                width,
                channels,
                has_frame_axis: true,
            },
            [height, width, channels] if channels == 3 || channels == 4 => Self {
                frames: 1,
                height,
                width,
                channels,
                has_frame_axis: false,
            },
            [frames, height, width] => Self {
                frames,
                height,
                width,
                channels: 1,
                has_frame_axis: true,
            },
            [height, width] => Self {
                frames: 1,
                height,
                width,
                channels: 1,
                has_frame_axis: false,
            },
            _ => {
                return Err(SkyframeError::Decode(format!(
                    "unsupported pixel dataset shape {dims:?}"
                )))
            }
        };
        Ok(shape)
    }
}

/// Key/attribute store holding one structured dataset file.
pub trait DatasetStore {
    /// Dimensions of the pixel dataset as stored.
    fn pixel_shape(&self) -> Result<Vec<usize>>;

    /// Read the pixel dataset. With `first_frame_only` and a leading frame
    /// axis, only index 0 of that axis is returned (the axis is kept, length 1).
    fn read_pixels(&self, first_frame_only: bool) -> Result<PixelBlock>;

    /// Attributes shared by every frame.
    fn file_attributes(&self) -> Result<Metadata>;

    /// Number of per-frame attribute records present.
    fn frame_record_count(&self) -> Result<usize>;

    /// Attributes of the record for zero-based frame `index`.
    fn frame_attributes(&self, index: usize) -> Result<Metadata>;
}

/// Open a structured dataset file and decode it.
pub fn decode_dataset_file(path: &Path, ctx: &DecodeContext<'_>) -> Result<DecodedFile> {
    let store = open_store(path)?;
    decode_dataset(store.as_ref(), path, ctx)
}

#[cfg(feature = "hdf5")]
fn open_store(path: &Path) -> Result<Box<dyn DatasetStore>> {
    Ok(Box::new(hdf5_store::Hdf5Store::open(path)?))
}

#[cfg(not(feature = "hdf5"))]
fn open_store(path: &Path) -> Result<Box<dyn DatasetStore>> {
    Err(SkyframeError::Open(format!(
        "{}: HDF5 support not compiled in (enable the `hdf5` feature)",
        path.display()
    )))
}

/// Decode every frame of `store`, merging file attributes under each
/// frame's own attributes.
pub fn decode_dataset(
    store: &dyn DatasetStore,
    path: &Path,
    ctx: &DecodeContext<'_>,
) -> Result<DecodedFile> {
    let shape = DatasetShape::from_dims(&store.pixel_shape()?)?;
    let first_only = ctx.options.first_frame;
    let used = if first_only {
        shape.frames.min(1)
    } else {
        shape.frames
    };

    let metadata = if ctx.options.no_metadata {
        vec![Metadata::new(); used]
    } else {
        let records = store.frame_record_count()?;
        if records != shape.frames {
            return Err(SkyframeError::Consistency(format!(
                "found different number of images and metadata records (images={}, metadata={})",
                shape.frames, records
            )));
        }
        let base = store.file_attributes()?;
        let mut metadata = Vec::with_capacity(used);
        for index in 0..used {
            ctx.check_cancelled()?;
            let mut merged = base.clone();
            merged.extend(store.frame_attributes(index)?);
            metadata.push(merged);
        }
        metadata
    };

    ctx.check_cancelled()?;
    let block = store.read_pixels(first_only)?;
    let pixels = match block {
        PixelBlock::U8(a) => split_frames(a, &shape, used)?
            .into_iter()
            .map(FramePixels::U8)
            .collect::<Vec<_>>(),
        PixelBlock::U16(a) => split_frames(a, &shape, used)?
            .into_iter()
            .map(FramePixels::U16)
            .collect(),
    };

    let mut decoded = DecodedFile::new(path);
    decoded.layout = pixels.first().map(FramePixels::layout);
    decoded.frames = pixels
        .into_iter()
        .zip(metadata)
        .map(|(pixels, metadata)| Frame::new(pixels, metadata))
        .collect();

    debug!(
        file = %path.display(),
        frames = decoded.frames.len(),
        "Decoded dataset"
    );
    Ok(decoded)
}

fn split_frames<T: Clone>(
    block: ArrayD<T>,
    shape: &DatasetShape,
    frames: usize,
) -> Result<Vec<Array3<T>>> {
    let expected = frames * shape.height * shape.width * shape.channels;
    if block.len() != expected {
        return Err(SkyframeError::Decode(format!(
            "pixel block holds {} samples, expected {expected} for {frames} frame(s)",
            block.len()
        )));
    }
    let block = block
        .as_standard_layout()
        .into_owned()
        .into_shape_with_order((frames, shape.height, shape.width, shape.channels))
        .map_err(|e| SkyframeError::Decode(format!("pixel block shape: {e}")))?;
    Ok(block
        .axis_iter(Axis(0))
        .map(|frame| frame.to_owned())
        .collect())
}

/// Merge per-channel planes of `pixels` samples into `(h, w, c)` order.
#[cfg_attr(not(feature = "hdf5"), allow(dead_code))]
fn interleave_planes<T: Clone>(planes: Vec<Vec<T>>, pixels: usize) -> Result<Vec<T>> {
    if let Some(bad) = planes.iter().find(|p| p.len() != pixels) {
        return Err(SkyframeError::Decode(format!(
            "channel plane holds {} samples, expected {pixels}",
            bad.len()
        )));
    }
    if planes.len() == 1 {
        return Ok(planes.into_iter().flatten().collect());
    }
    let mut out = Vec::with_capacity(pixels * planes.len());
    for i in 0..pixels {
        out.extend(planes.iter().map(|plane| plane[i].clone()));
    }
    Ok(out)
}

#[cfg(feature = "hdf5")]
mod hdf5_store {
    use std::path::Path;

    use hdf5::types::{TypeDescriptor, VarLenAscii, VarLenUnicode};
    use hdf5::{Attribute, File, Location};
    use ndarray::{ArrayD, IxDyn};

    use crate::consts::{
        DATASET_FILE_ATTRS_PATH, DATASET_FRAME_GROUP_PATH, DATASET_FRAME_RECORD_PREFIX,
        DATASET_IMAGES_PATH,
    };
    use crate::error::{Result, SkyframeError};
    use crate::frame::{Metadata, MetadataValue};

    use super::{interleave_planes, DatasetShape, DatasetStore, PixelBlock};

    fn decode_err(e: hdf5::Error) -> SkyframeError {
        SkyframeError::Decode(e.to_string())
    }

    pub struct Hdf5Store {
        file: File,
        images: hdf5::Dataset,
    }

    impl Hdf5Store {
        pub fn open(path: &Path) -> Result<Self> {
            let file = File::open(path).map_err(SkyframeError::open)?;
            let images = file
                .dataset(DATASET_IMAGES_PATH)
                .map_err(SkyframeError::open)?;
            Ok(Self { file, images })
        }

        // Samples are copied out flat and shaped locally: hdf5 may be built
        // against another ndarray.
        fn read_block<T: hdf5::H5Type + Clone>(&self, first_frame_only: bool) -> Result<ArrayD<T>> {
            let dims = self.images.shape();
            let shape = DatasetShape::from_dims(&dims)?;
            if first_frame_only && shape.has_frame_axis && shape.frames > 1 {
                let raw = self.read_first_frame::<T>(&shape)?;
                let mut first_dims = dims;
                first_dims[0] = 1;
                return ArrayD::from_shape_vec(IxDyn(&first_dims), raw)
                    .map_err(|e| SkyframeError::Decode(format!("pixel dataset shape: {e}")));
            }
            let raw: Vec<T> = self.images.read_raw().map_err(decode_err)?;
            ArrayD::from_shape_vec(IxDyn(&dims), raw)
                .map_err(|e| SkyframeError::Decode(format!("pixel dataset shape: {e}")))
        }

        /// Read frame 0 one `(h, w)` plane per channel.
        fn read_first_frame<T: hdf5::H5Type + Clone>(&self, shape: &DatasetShape) -> Result<Vec<T>> {
            let mut planes = Vec::with_capacity(shape.channels);
            for channel in 0..shape.channels {
                let plane = if self.images.ndim() == 4 {
                    self.images.read_slice_2d::<T, _>((0, .., .., channel))
                } else {
                    self.images.read_slice_2d::<T, _>((0, .., ..))
                }
                .map_err(decode_err)?;
                planes.push(plane.iter().cloned().collect::<Vec<T>>());
            }
            interleave_planes(planes, shape.height * shape.width)
        }
    }

    impl DatasetStore for Hdf5Store {
        fn pixel_shape(&self) -> Result<Vec<usize>> {
            Ok(self.images.shape())
        }

        fn read_pixels(&self, first_frame_only: bool) -> Result<PixelBlock> {
            let descriptor = self
                .images
                .dtype()
                .and_then(|t| t.to_descriptor())
                .map_err(decode_err)?;
            match descriptor {
                TypeDescriptor::Unsigned(hdf5::types::IntSize::U1) => {
                    Ok(PixelBlock::U8(self.read_block::<u8>(first_frame_only)?))
                }
                TypeDescriptor::Unsigned(hdf5::types::IntSize::U2) => {
                    Ok(PixelBlock::U16(self.read_block::<u16>(first_frame_only)?))
                }
                other => Err(SkyframeError::Decode(format!(
                    "unsupported pixel element type {other:?}"
                ))),
            }
        }

        fn file_attributes(&self) -> Result<Metadata> {
            match self.file.group(DATASET_FILE_ATTRS_PATH) {
                Ok(group) => read_attributes(&group),
                Err(_) => Ok(Metadata::new()),
            }
        }

        fn frame_record_count(&self) -> Result<usize> {
            let Ok(group) = self.file.group(DATASET_FRAME_GROUP_PATH) else {
                return Ok(0);
            };
            let names = group.member_names().map_err(decode_err)?;
            Ok(names
                .iter()
                .filter(|n| n.starts_with(DATASET_FRAME_RECORD_PREFIX))
                .count())
        }

        fn frame_attributes(&self, index: usize) -> Result<Metadata> {
            let path = format!(
                "{DATASET_FRAME_GROUP_PATH}/{DATASET_FRAME_RECORD_PREFIX}{index}"
            );
            let group = self.file.group(&path).map_err(|e| {
                SkyframeError::Consistency(format!("missing frame record {path}: {e}"))
            })?;
            read_attributes(&group)
        }
    }

    fn read_attributes(location: &Location) -> Result<Metadata> {
        let mut metadata = Metadata::new();
        for name in location.attr_names().map_err(decode_err)? {
            let attr = location.attr(&name).map_err(decode_err)?;
            if let Some(value) = read_attribute(&attr)? {
                metadata.insert(name, value);
            }
        }
        Ok(metadata)
    }

    fn read_attribute(attr: &Attribute) -> Result<Option<MetadataValue>> {
        let descriptor = attr
            .dtype()
            .and_then(|t| t.to_descriptor())
            .map_err(decode_err)?;
        let scalar = attr.ndim() == 0;
        let value = match descriptor {
            TypeDescriptor::VarLenUnicode if scalar => {
                let s: VarLenUnicode = attr.read_scalar().map_err(decode_err)?;
                MetadataValue::Scalar(s.as_str().to_string())
            }
            TypeDescriptor::VarLenAscii if scalar => {
                let s: VarLenAscii = attr.read_scalar().map_err(decode_err)?;
                MetadataValue::Scalar(s.as_str().to_string())
            }
            TypeDescriptor::VarLenUnicode => MetadataValue::Multi(
                attr.read_raw::<VarLenUnicode>()
                    .map_err(decode_err)?
                    .iter()
                    .map(|s| s.as_str().to_string())
                    .collect(),
            ),
            TypeDescriptor::Integer(_) | TypeDescriptor::Unsigned(_) | TypeDescriptor::Float(_) => {
                let values = attr.read_raw::<f64>().map_err(decode_err)?;
                let mut text: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                if scalar && text.len() == 1 {
                    MetadataValue::Scalar(text.remove(0))
                } else {
                    MetadataValue::Multi(text)
                }
            }
            other => {
                tracing::debug!(attribute = ?other, "Skipping unsupported attribute type");
                return Ok(None);
            }
        };
        Ok(Some(value))
    }
}
