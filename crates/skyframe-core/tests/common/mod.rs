#![allow(dead_code)]

use std::cell::Cell;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use image::{ImageFormat, Rgb, RgbImage};
use ndarray::ArrayD;

use skyframe_core::codec::dataset::{DatasetStore, PixelBlock};
use skyframe_core::frame::Metadata;
use skyframe_core::Result;

/// Sample value of pixel `i` in raw frame `frame`.
pub fn raw_sample(frame: usize, i: usize) -> u16 {
    (frame * 1000 + i) as u16
}

/// Metadata lines of one raw frame, ending with the exposure line.
pub fn raw_metadata_lines(frame: usize, site: Option<&str>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(site) = site {
        buf.extend_from_slice(format!("#\"Site unique ID\" {site}\n").as_bytes());
    }
    buf.extend_from_slice(b"#\"Imager unique ID\" nir-216\n");
    buf.extend_from_slice(
        format!("#\"Image request start\" 2022-03-07 06:00:{frame:02}.000000 UTC\n").as_bytes(),
    );
    buf.extend_from_slice(b"#\"Effective image exposure\" 1000.000 ms\n");
    buf
}

/// Dimension line, sentinel and big-endian pixel block of one frame.
pub fn raw_pixel_block(frame: usize, width: usize, height: usize) -> Vec<u8> {
    let mut buf = format!("{width} {height}\n65535\n").into_bytes();
    for i in 0..width * height {
        buf.extend_from_slice(&raw_sample(frame, i).to_be_bytes());
    }
    buf
}

/// Build a raw stream of `num_frames` well-formed frames.
pub fn build_raw_stream(num_frames: usize, width: usize, height: usize) -> Vec<u8> {
    let mut buf = b"P5\n".to_vec();
    for frame in 0..num_frames {
        buf.extend(raw_metadata_lines(frame, Some("gill")));
        buf.extend(raw_pixel_block(frame, width, height));
    }
    buf
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("gzip write");
    encoder.finish().expect("gzip finish")
}

pub fn write_file(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, data).expect("write fixture");
    path
}

/// Encode a small RGB PNG whose red channel encodes `seed`.
pub fn png_bytes(width: u32, height: u32, seed: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| Rgb([seed, x as u8, y as u8]));
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, ImageFormat::Png).expect("encode png");
    buf.into_inner()
}

/// Name of the `index`th burst image, seconds and sub-seconds increasing.
pub fn burst_member_name(index: usize) -> String {
    format!(
        "20211030_06{:02}{:02}_{:06}_gill_rgb-04_320ms_burst.png",
        index / 60,
        index % 60,
        index * 37 % 1_000_000
    )
}

/// Write a tar archive of (member name, bytes) pairs, in the order given.
pub fn write_tar(path: &Path, members: &[(String, Vec<u8>)]) {
    let file = std::fs::File::create(path).expect("create tar");
    let mut builder = tar::Builder::new(file);
    for (name, data) in members {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        builder
            .append_data(&mut header, name, data.as_slice())
            .expect("append tar member");
    }
    builder.finish().expect("finish tar");
}

/// Write a burst archive of `count` PNGs of the given size.
pub fn write_burst_archive(dir: &Path, name: &str, count: usize, width: u32, height: u32) -> PathBuf {
    let members: Vec<(String, Vec<u8>)> = (0..count)
        .map(|i| (burst_member_name(i), png_bytes(width, height, (i % 256) as u8)))
        .collect();
    let path = dir.join(name);
    write_tar(&path, &members);
    path
}

pub fn scalar_metadata(pairs: &[(&str, &str)]) -> Metadata {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), (*v).into()))
        .collect()
}

/// In-memory dataset store that records how it was accessed.
pub struct MemoryStore {
    pub pixels: PixelBlock,
    pub file_attrs: Metadata,
    pub frame_attrs: Vec<Metadata>,
    pub read_first_only: Cell<Option<bool>>,
    pub attribute_reads: Cell<usize>,
}

impl MemoryStore {
    pub fn new(pixels: PixelBlock, file_attrs: Metadata, frame_attrs: Vec<Metadata>) -> Self {
        Self {
            pixels,
            file_attrs,
            frame_attrs,
            read_first_only: Cell::new(None),
            attribute_reads: Cell::new(0),
        }
    }

    /// `frames` frames of `height x width x channels` u8 pixels, pixel value = frame index.
    pub fn u8_frames(frames: usize, height: usize, width: usize, channels: usize) -> PixelBlock {
        let data: Vec<u8> = (0..frames)
            .flat_map(|f| std::iter::repeat(f as u8).take(height * width * channels))
            .collect();
        PixelBlock::U8(
            ArrayD::from_shape_vec(vec![frames, height, width, channels], data)
                .expect("shape matches"),
        )
    }
}

impl DatasetStore for MemoryStore {
    fn pixel_shape(&self) -> Result<Vec<usize>> {
        Ok(match &self.pixels {
            PixelBlock::U8(a) => a.shape().to_vec(),
            PixelBlock::U16(a) => a.shape().to_vec(),
        })
    }

    fn read_pixels(&self, first_frame_only: bool) -> Result<PixelBlock> {
        self.read_first_only.set(Some(first_frame_only));
        let dims = self.pixel_shape()?;
        let has_frame_axis = dims.len() == 4;
        if !(first_frame_only && has_frame_axis) {
            return Ok(self.pixels.clone());
        }
        Ok(match &self.pixels {
            PixelBlock::U8(a) => PixelBlock::U8(
                a.slice_axis(ndarray::Axis(0), ndarray::Slice::from(0..1))
                    .to_owned(),
            ),
            PixelBlock::U16(a) => PixelBlock::U16(
                a.slice_axis(ndarray::Axis(0), ndarray::Slice::from(0..1))
                    .to_owned(),
            ),
        })
    }

    fn file_attributes(&self) -> Result<Metadata> {
        self.attribute_reads.set(self.attribute_reads.get() + 1);
        Ok(self.file_attrs.clone())
    }

    fn frame_record_count(&self) -> Result<usize> {
        self.attribute_reads.set(self.attribute_reads.get() + 1);
        Ok(self.frame_attrs.len())
    }

    fn frame_attributes(&self, index: usize) -> Result<Metadata> {
        self.attribute_reads.set(self.attribute_reads.get() + 1);
        Ok(self.frame_attrs[index].clone())
    }
}
