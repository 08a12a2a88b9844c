use ndarray::{s, Array3, Array4, ArrayD, Axis, IxDyn};
use num_traits::Zero;
use tracing::{debug, warn};

use crate::error::SkyframeError;
use crate::frame::{
    DecodedFile, FileOutcome, Frame, FrameLayout, FramePixels, Metadata, PixelType, Problem,
};

/// All frames of a read, stacked along the last axis.
///
/// Axes are `(height, width, frames)` for single-channel data and
/// `(height, width, channels, frames)` otherwise.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameStack {
    U8(ArrayD<u8>),
    U16(ArrayD<u16>),
}

impl FrameStack {
    /// A stack with no frames, shape `(0, 0, 0)`.
    pub fn empty() -> Self {
        Self::U16(ArrayD::zeros(IxDyn(&[0, 0, 0])))
    }

    pub fn shape(&self) -> &[usize] {
        match self {
            Self::U8(a) => a.shape(),
            Self::U16(a) => a.shape(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.shape().last().copied().unwrap_or(0)
    }

    pub fn pixel_type(&self) -> PixelType {
        match self {
            Self::U8(_) => PixelType::U8,
            Self::U16(_) => PixelType::U16,
        }
    }

    pub fn as_u8(&self) -> Option<&ArrayD<u8>> {
        match self {
            Self::U8(a) => Some(a),
            Self::U16(_) => None,
        }
    }

    pub fn as_u16(&self) -> Option<&ArrayD<u16>> {
        match self {
            Self::U16(a) => Some(a),
            Self::U8(_) => None,
        }
    }
}

/// Merged output of one read call.
#[derive(Clone, Debug, PartialEq)]
pub struct ReadResult {
    pub images: FrameStack,
    /// One entry per frame, aligned with the last axis of `images`.
    pub metadata: Vec<Metadata>,
    pub problematic: Vec<Problem>,
}

impl ReadResult {
    pub fn empty() -> Self {
        Self {
            images: FrameStack::empty(),
            metadata: Vec::new(),
            problematic: Vec::new(),
        }
    }

    pub fn frame_count(&self) -> usize {
        self.images.frame_count()
    }
}

/// Sample types that can be stacked.
trait StackSample: Clone + Zero {
    fn view(pixels: &FramePixels) -> Option<&Array3<Self>>;
    fn wrap(stack: ArrayD<Self>) -> FrameStack;
}

impl StackSample for u8 {
    fn view(pixels: &FramePixels) -> Option<&Array3<u8>> {
        match pixels {
            FramePixels::U8(a) => Some(a),
            FramePixels::U16(_) => None,
        }
    }

    fn wrap(stack: ArrayD<u8>) -> FrameStack {
        FrameStack::U8(stack)
    }
}

impl StackSample for u16 {
    fn view(pixels: &FramePixels) -> Option<&Array3<u16>> {
        match pixels {
            FramePixels::U16(a) => Some(a),
            FramePixels::U8(_) => None,
        }
    }

    fn wrap(stack: ArrayD<u16>) -> FrameStack {
        FrameStack::U16(stack)
    }
}

/// Merge per-file outcomes, in file order, into one stack.
///
/// The common layout comes from the first decoded file with at least one
/// frame. Files whose layout differs are rejected as consistency failures.
pub fn aggregate(outcomes: Vec<FileOutcome>) -> ReadResult {
    let layout = outcomes.iter().find_map(|outcome| match outcome {
        FileOutcome::Decoded(file) => file.frames.first().map(Frame::layout),
        FileOutcome::Failed(_) => None,
    });

    let mut problematic = Vec::new();
    let mut frames: Vec<Frame> = Vec::new();
    for outcome in outcomes {
        match outcome {
            FileOutcome::Failed(problem) => problematic.push(problem),
            FileOutcome::Decoded(file) => accept_file(file, layout, &mut frames, &mut problematic),
        }
    }

    let Some(layout) = layout else {
        return ReadResult {
            problematic,
            ..ReadResult::empty()
        };
    };

    let images = match layout.pixel_type {
        PixelType::U8 => stack::<u8>(&layout, &frames),
        PixelType::U16 => stack::<u16>(&layout, &frames),
    };
    let metadata: Vec<Metadata> = frames.into_iter().map(|f| f.metadata).collect();
    debug!(
        frames = metadata.len(),
        problems = problematic.len(),
        shape = ?images.shape(),
        "Aggregated frames"
    );

    ReadResult {
        images,
        metadata,
        problematic,
    }
}

fn accept_file(
    file: DecodedFile,
    layout: Option<FrameLayout>,
    frames: &mut Vec<Frame>,
    problematic: &mut Vec<Problem>,
) {
    let DecodedFile {
        filename,
        frames: file_frames,
        problem,
        ..
    } = file;

    let mismatch = file_frames
        .iter()
        .map(Frame::layout)
        .find(|l| Some(*l) != layout);

    let Some(found) = mismatch else {
        problematic.extend(problem);
        frames.extend(file_frames);
        return;
    };

    let expected = layout.map(|l| l.to_string()).unwrap_or_default();
    let err = SkyframeError::Consistency(format!("frames are {found}, batch is {expected}"));
    warn!(file = %filename.display(), error = %err, "Rejecting file");
    let message = match problem {
        Some(p) => format!("{}; {err}", p.error_message),
        None => err.to_string(),
    };
    problematic.push(Problem::new(&filename, message));
}

/// Allocate the exact output size and copy every frame into place.
fn stack<T: StackSample>(layout: &FrameLayout, frames: &[Frame]) -> FrameStack {
    let mut out = Array4::<T>::zeros((layout.height, layout.width, layout.channels, frames.len()));
    for (i, pixels) in frames.iter().filter_map(|f| T::view(&f.pixels)).enumerate() {
        out.slice_mut(s![.., .., .., i]).assign(pixels);
    }
    if layout.channels == 1 {
        T::wrap(out.index_axis_move(Axis(2), 0).into_dyn())
    } else {
        T::wrap(out.into_dyn())
    }
}
