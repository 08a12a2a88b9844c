//! Raw frame streams: ASCII metadata lines interleaved with big-endian
//! 16-bit pixel blocks, optionally gzip-compressed.
//!
//! ```text
//! P5
//! #"Site unique ID" gill
//! #"Effective image exposure" 1000 ms
//! 256 256
//! 65535
//! <width * height * 2 bytes>
//! ```

use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use flate2::read::GzDecoder;
use ndarray::Array3;
use tracing::{debug, warn};

use crate::consts::{
    DEVICE_UID_KEY, METADATA_LINE_PREFIX, PIXEL_BLOCK_SENTINEL, SITE_UID_KEY, STREAM_MAGIC,
};
use crate::error::{Result, SkyframeError};
use crate::frame::{
    insert_metadata, DecodedFile, Frame, FrameLayout, FramePixels, Metadata, MetadataValue,
};

use super::DecodeContext;

/// Open a raw stream file, gunzipping when the name ends in `.gz`, and decode it.
pub fn decode_stream_file(path: &Path, ctx: &DecodeContext<'_>) -> Result<DecodedFile> {
    let file = File::open(path).map_err(SkyframeError::open)?;
    let gzipped = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(".gz"));

    if gzipped {
        decode_stream(BufReader::new(GzDecoder::new(file)), path, ctx)
    } else {
        decode_stream(BufReader::new(file), path, ctx)
    }
}

/// Decode every well-formed frame from a raw stream.
///
/// Corrupt frames are dropped together with their metadata record and the
/// file is marked problematic; decoding continues with the next frame.
pub fn decode_stream<R: BufRead>(
    mut reader: R,
    path: &Path,
    ctx: &DecodeContext<'_>,
) -> Result<DecodedFile> {
    let mut parser = StreamParser::new(path, ctx);
    let mut line = Vec::new();

    loop {
        ctx.check_cancelled()?;

        line.clear();
        match reader.read_until(b'\n', &mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(file = %path.display(), error = %e, "Stream read failed");
                parser.decoded.mark_problem(format!("error reading stream: {e}"));
                break;
            }
        }

        let content = trim_line_ending(&line);
        if content == STREAM_MAGIC {
            continue;
        }

        if content.starts_with(METADATA_LINE_PREFIX) {
            parser.on_metadata_line(content);
        } else if content == PIXEL_BLOCK_SENTINEL {
            parser.on_pixel_block(&mut reader);
            if ctx.options.first_frame && !parser.decoded.frames.is_empty() {
                break;
            }
        }

        parser.previous_line.clear();
        parser.previous_line.extend_from_slice(content);
    }

    Ok(parser.finish())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum ParseState {
    Scanning,
    AccumulatingMetadata,
    AwaitingImageBytes { width: usize, height: usize },
}

struct StreamParser<'a> {
    ctx: &'a DecodeContext<'a>,
    decoded: DecodedFile,
    state: ParseState,
    /// Metadata of the frame currently being described.
    current: Metadata,
    /// Closed metadata records waiting for their pixel block.
    closed: VecDeque<Metadata>,
    sticky_site: Option<MetadataValue>,
    sticky_device: Option<MetadataValue>,
    previous_line: Vec<u8>,
}

impl<'a> StreamParser<'a> {
    fn new(path: &Path, ctx: &'a DecodeContext<'a>) -> Self {
        Self {
            ctx,
            decoded: DecodedFile::new(path),
            state: ParseState::Scanning,
            current: Metadata::new(),
            closed: VecDeque::new(),
            sticky_site: None,
            sticky_device: None,
            previous_line: Vec::new(),
        }
    }

    fn on_metadata_line(&mut self, line: &[u8]) {
        if let Some(pos) = line.iter().position(|b| !b.is_ascii()) {
            warn!(
                file = %self.decoded.filename.display(),
                offset = pos,
                "Skipping undecodable metadata line"
            );
            self.decoded.mark_problem(format!(
                "error decoding metadata line: non-ASCII byte at offset {pos}"
            ));
            return;
        }

        let Some((key, value)) = parse_metadata_line(line) else {
            self.decoded
                .mark_problem("error decoding metadata line: missing closing quote");
            return;
        };

        self.state = ParseState::AccumulatingMetadata;
        if !self.ctx.options.no_metadata {
            insert_metadata(&mut self.current, key, value.to_string());
        }

        if self.ctx.format.is_exposure_key(key) {
            self.close_frame_metadata();
        }
    }

    fn close_frame_metadata(&mut self) {
        let mut metadata = std::mem::take(&mut self.current);
        if !self.ctx.options.no_metadata {
            carry_sticky(&mut metadata, SITE_UID_KEY, &mut self.sticky_site);
            carry_sticky(&mut metadata, DEVICE_UID_KEY, &mut self.sticky_device);
        }
        self.closed.push_back(metadata);
        self.state = ParseState::Scanning;
    }

    fn on_pixel_block<R: BufRead>(&mut self, reader: &mut R) {
        let metadata_open = self.state == ParseState::AccumulatingMetadata;
        let declared = parse_dimensions(&self.previous_line);
        let (width, height) = match (self.ctx.format.pinned_dimensions, declared) {
            (Some(pinned), _) => pinned,
            (None, Some(dims)) => dims,
            (None, None) => {
                self.discard_frame("image data read failure: error getting image dimensions");
                return;
            }
        };
        let Some(num_bytes) = block_byte_size(width, height) else {
            self.discard_frame(format!(
                "image data read failure: image dimensions {width}x{height} out of range"
            ));
            return;
        };
        self.state = ParseState::AwaitingImageBytes { width, height };

        // Grow with the bytes actually present; the dimension line is untrusted.
        let mut buf = Vec::new();
        let read = reader.by_ref().take(num_bytes as u64).read_to_end(&mut buf);
        match read {
            Ok(n) if n == num_bytes => {}
            Ok(n) => {
                self.discard_frame(format!(
                    "image data read failure: expected {num_bytes} bytes, got {n}"
                ));
                return;
            }
            Err(e) => {
                self.discard_frame(format!("image data read failure: {e}"));
                return;
            }
        }

        if let Some(pinned) = self.ctx.format.pinned_dimensions {
            if !matches_pinned(declared, pinned) {
                self.discard_frame(format!(
                    "image data read failure: dimension line {:?} does not match {}x{}",
                    String::from_utf8_lossy(&self.previous_line),
                    pinned.0,
                    pinned.1
                ));
                return;
            }
        }

        if metadata_open && self.closed.is_empty() {
            // The frame's metadata never reached its exposure line.
            self.current.clear();
            self.discard_frame("image data read failure: pixel block before end of frame metadata");
            return;
        }

        let mut samples = vec![0u16; width * height];
        BigEndian::read_u16_into(&buf, &mut samples);
        let pixels = match Array3::from_shape_vec((height, width, 1), samples) {
            Ok(array) => FramePixels::U16(array),
            Err(e) => {
                self.discard_frame(format!("image data read failure: {e}"));
                return;
            }
        };

        let layout = pixels.layout();
        if let Some(existing) = self.decoded.layout {
            if existing != layout {
                self.discard_frame(format!(
                    "image data read failure: frame is {layout}, earlier frames are {existing}"
                ));
                return;
            }
        }

        match self.take_frame_metadata() {
            Some(metadata) => {
                self.decoded.layout.get_or_insert(layout);
                self.decoded.frames.push(Frame::new(pixels, metadata));
            }
            None => {
                warn!(file = %self.decoded.filename.display(), "Pixel block without metadata");
                self.decoded
                    .mark_problem("image data read failure: pixel block without metadata record");
            }
        }
        self.state = ParseState::Scanning;
    }

    /// Record of the frame whose pixel block was just read: the most recently
    /// closed one. Older records never got a block and are dropped.
    fn take_frame_metadata(&mut self) -> Option<Metadata> {
        let metadata = self.closed.pop_back()?;
        if !self.closed.is_empty() {
            let lost = self.closed.len();
            self.closed.clear();
            warn!(
                file = %self.decoded.filename.display(),
                frames = lost,
                "Dropping metadata of frames without image data"
            );
            self.decoded.mark_problem(format!(
                "image data read failure: no image data for {lost} frame(s)"
            ));
        }
        Some(metadata)
    }

    /// Drop the frame being read, together with its metadata record.
    fn discard_frame(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(
            file = %self.decoded.filename.display(),
            state = ?self.state,
            "{message}"
        );
        self.take_frame_metadata();
        self.decoded.mark_problem(message);
        self.state = ParseState::Scanning;
    }

    fn finish(mut self) -> DecodedFile {
        if !self.closed.is_empty() {
            self.decoded.mark_problem(format!(
                "stream ended before image data of {} frame(s)",
                self.closed.len()
            ));
        }
        debug!(
            file = %self.decoded.filename.display(),
            frames = self.decoded.frames.len(),
            "Decoded raw stream"
        );
        self.decoded
    }
}

/// Inject the last seen value when `key` is absent, otherwise remember it.
fn carry_sticky(metadata: &mut Metadata, key: &str, sticky: &mut Option<MetadataValue>) {
    match metadata.get(key) {
        Some(value) => *sticky = Some(value.clone()),
        None => {
            if let Some(value) = sticky {
                metadata.insert(key.to_string(), value.clone());
            }
        }
    }
}

/// Split `#"<key>"<value>` into its trimmed parts.
fn parse_metadata_line(line: &[u8]) -> Option<(&str, &str)> {
    let text = std::str::from_utf8(line).ok()?;
    let rest = text.strip_prefix("#\"")?;
    let (key, value) = rest.split_once('"')?;
    Some((key, value.trim()))
}

/// Byte length of a `width x height` block of 16-bit samples, if it fits in memory.
fn block_byte_size(width: usize, height: usize) -> Option<usize> {
    let bytes = width.checked_mul(height)?.checked_mul(2)?;
    isize::try_from(bytes).ok().map(|_| bytes)
}

/// Pinned imagers may write their dimension line in either order.
fn matches_pinned(declared: Option<(usize, usize)>, (width, height): (usize, usize)) -> bool {
    declared == Some((width, height)) || declared == Some((height, width))
}

/// Parse a `width height` line.
fn parse_dimensions(line: &[u8]) -> Option<(usize, usize)> {
    let text = std::str::from_utf8(line).ok()?;
    let mut parts = text.split_whitespace();
    let width = parts.next()?.parse().ok()?;
    let height = parts.next()?.parse().ok()?;
    if parts.next().is_some() || width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
