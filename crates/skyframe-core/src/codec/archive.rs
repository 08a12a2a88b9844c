//! Single images and tar archives of single images.
//!
//! Frame metadata is derived from member filenames laid out as
//! `<date>_<time>[_<subsecond>]_<site>_<device>_<exposure><unit>_<mode>.<ext>`.

use std::collections::HashSet;
use std::fs::File;
use std::path::Path;

use chrono::NaiveDateTime;
use image::DynamicImage;
use ndarray::Array3;
use tar::Archive;
use tracing::{debug, warn};

use crate::consts::{
    DEVICE_UID_KEY, EXPOSURE_KEY, MODE_UID_KEY, PROJECT_UID, PROJECT_UID_KEY, REQUEST_START_KEY,
    SCRATCH_PREFIX, SITE_UID_KEY,
};
use crate::error::{Result, SkyframeError};
use crate::frame::{DecodedFile, Frame, FramePixels, Metadata, MetadataValue};

use super::DecodeContext;

/// Decode a loose image (one frame) or every member of an image tar archive.
pub fn decode_image_archive(path: &Path, ctx: &DecodeContext<'_>) -> Result<DecodedFile> {
    let mut decoded = DecodedFile::new(path);
    let is_tar = path.extension().is_some_and(|ext| ext == "tar");

    if is_tar {
        decode_tar_members(path, ctx, &mut decoded)?;
    } else {
        if !path.is_file() {
            return Err(SkyframeError::Open(format!(
                "{} is not a readable file",
                path.display()
            )));
        }
        decode_member(path, ctx, &mut decoded);
    }

    let pixel_bytes: usize = decoded.frames.iter().map(|f| f.pixels.byte_len()).sum();
    if pixel_bytes == 0 && decoded.problem.is_none() {
        decoded.mark_problem("no image data read");
    }

    debug!(
        file = %path.display(),
        frames = decoded.frames.len(),
        "Decoded image archive"
    );
    Ok(decoded)
}

fn decode_tar_members(
    path: &Path,
    ctx: &DecodeContext<'_>,
    decoded: &mut DecodedFile,
) -> Result<()> {
    let mut members = list_members(path)?;
    if ctx.options.first_frame {
        members.truncate(1);
    }

    let root = &ctx.options.scratch_dir;
    std::fs::create_dir_all(root).map_err(SkyframeError::open)?;
    // Removed on drop, including on early return.
    let scratch = tempfile::Builder::new()
        .prefix(SCRATCH_PREFIX)
        .tempdir_in(root)
        .map_err(SkyframeError::open)?;

    extract_members(path, &members, scratch.path())?;

    for name in &members {
        ctx.check_cancelled()?;
        decode_member(&scratch.path().join(name), ctx, decoded);
    }

    let scratch_path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(dir = %scratch_path.display(), error = %e, "Failed to remove scratch directory");
    }
    Ok(())
}

/// Regular-file member names, sorted lexicographically.
fn list_members(path: &Path) -> Result<Vec<String>> {
    let file = File::open(path).map_err(SkyframeError::open)?;
    let mut archive = Archive::new(file);
    let mut names = Vec::new();
    for entry in archive.entries().map_err(SkyframeError::open)? {
        let entry = entry.map_err(SkyframeError::open)?;
        if !entry.header().entry_type().is_file() {
            continue;
        }
        let name = entry.path().map_err(SkyframeError::open)?;
        names.push(name.to_string_lossy().into_owned());
    }
    names.sort();
    Ok(names)
}

fn extract_members(path: &Path, members: &[String], dest: &Path) -> Result<()> {
    let mut wanted: HashSet<&str> = members.iter().map(String::as_str).collect();
    let file = File::open(path).map_err(SkyframeError::open)?;
    let mut archive = Archive::new(file);
    for entry in archive.entries().map_err(SkyframeError::open)? {
        if wanted.is_empty() {
            break;
        }
        let mut entry = entry.map_err(SkyframeError::open)?;
        let name = entry.path().map_err(SkyframeError::open)?;
        let name = name.to_string_lossy().into_owned();
        if wanted.remove(name.as_str()) {
            entry.unpack_in(dest).map_err(SkyframeError::open)?;
        }
    }
    Ok(())
}

/// Decode one image into `decoded`; a failure drops only this frame.
fn decode_member(path: &Path, ctx: &DecodeContext<'_>, decoded: &mut DecodedFile) {
    let metadata = if ctx.options.no_metadata {
        Metadata::new()
    } else {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        match parse_filename_metadata(&name) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(member = %name, error = %e, "Failed to read metadata");
                decoded.mark_problem(format!("failed to read metadata: {e}"));
                return;
            }
        }
    };

    let pixels = match load_pixels(path) {
        Ok(pixels) => pixels,
        Err(e) => {
            warn!(member = %path.display(), error = %e, "Failed reading image data frame");
            decoded.mark_problem(format!("image data read failure: {e}"));
            return;
        }
    };

    let layout = pixels.layout();
    if let Some(existing) = decoded.layout {
        if existing != layout {
            decoded.mark_problem(format!(
                "image data read failure: {} is {layout}, earlier frames are {existing}",
                path.display()
            ));
            return;
        }
    }
    decoded.layout = Some(layout);
    decoded.frames.push(Frame::new(pixels, metadata));
}

/// Decode image bytes into a (height, width, channels) buffer.
pub fn load_pixels(path: &Path) -> Result<FramePixels> {
    let img = image::open(path)?;
    let (w, h) = (img.width() as usize, img.height() as usize);
    let pixels = match img {
        DynamicImage::ImageLuma8(buf) => FramePixels::U8(shaped(h, w, 1, buf.into_raw())?),
        DynamicImage::ImageRgb8(buf) => FramePixels::U8(shaped(h, w, 3, buf.into_raw())?),
        DynamicImage::ImageRgba8(buf) => FramePixels::U8(shaped(h, w, 4, buf.into_raw())?),
        DynamicImage::ImageLuma16(buf) => FramePixels::U16(shaped(h, w, 1, buf.into_raw())?),
        DynamicImage::ImageRgb16(buf) => FramePixels::U16(shaped(h, w, 3, buf.into_raw())?),
        DynamicImage::ImageRgba16(buf) => FramePixels::U16(shaped(h, w, 4, buf.into_raw())?),
        other => FramePixels::U8(shaped(h, w, 3, other.into_rgb8().into_raw())?),
    };
    Ok(pixels)
}

fn shaped<T>(height: usize, width: usize, channels: usize, raw: Vec<T>) -> Result<Array3<T>> {
    Array3::from_shape_vec((height, width, channels), raw)
        .map_err(|e| SkyframeError::Decode(format!("pixel buffer shape: {e}")))
}

/// Derive frame metadata from an image filename.
pub fn parse_filename_metadata(filename: &str) -> std::result::Result<Metadata, String> {
    let fields: Vec<&str> = filename.split('_').collect();
    let (date, time, subsecond, rest) = match fields.len() {
        7 => (fields[0], fields[1], Some(fields[2]), &fields[3..]),
        6 => (fields[0], fields[1], None, &fields[2..]),
        n => return Err(format!("expected 6 or 7 '_'-separated fields, found {n}")),
    };
    let site = rest[0];
    let device = rest[1];
    let exposure_ms = parse_exposure_ms(rest[2])?;
    let mode = rest[3].split('.').next().unwrap_or_default();

    let mut timestamp = NaiveDateTime::parse_from_str(&format!("{date}T{time}"), "%Y%m%dT%H%M%S")
        .map_err(|e| format!("bad date/time '{date}_{time}': {e}"))?;
    if let Some(sub) = subsecond {
        timestamp += chrono::Duration::nanoseconds(parse_subsecond_nanos(sub)?);
    }

    let mut metadata = Metadata::new();
    metadata.insert(PROJECT_UID_KEY.into(), PROJECT_UID.into());
    metadata.insert(SITE_UID_KEY.into(), site.into());
    metadata.insert(DEVICE_UID_KEY.into(), device.into());
    metadata.insert(MODE_UID_KEY.into(), mode.into());
    metadata.insert(REQUEST_START_KEY.into(), MetadataValue::Timestamp(timestamp));
    metadata.insert(EXPOSURE_KEY.into(), format!("{exposure_ms:.3} ms").into());
    Ok(metadata)
}

/// Parse `320ms`, `1.5s` or `800us` into milliseconds.
fn parse_exposure_ms(field: &str) -> std::result::Result<f64, String> {
    let split = field
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .ok_or_else(|| format!("exposure '{field}' has no unit"))?;
    let (number, unit) = field.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| format!("bad exposure value '{field}'"))?;
    match unit {
        "ms" => Ok(value),
        "s" => Ok(value * 1000.0),
        "us" => Ok(value / 1000.0),
        _ => Err(format!("unknown exposure unit '{unit}'")),
    }
}

/// Fractional-second digits (`149606` = 0.149606 s) as nanoseconds.
fn parse_subsecond_nanos(field: &str) -> std::result::Result<i64, String> {
    if field.is_empty() || field.len() > 9 || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("bad sub-second field '{field}'"));
    }
    let digits: i64 = field
        .parse()
        .map_err(|_| format!("bad sub-second field '{field}'"))?;
    Ok(digits * 10i64.pow(9 - field.len() as u32))
}
