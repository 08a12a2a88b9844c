pub mod aggregate;
pub mod cancel;
pub mod codec;
pub mod config;
pub mod consts;
pub mod dispatch;
pub mod error;
pub mod frame;
pub mod instrument;
pub mod pool;
pub mod progress;
pub mod reader;

pub use aggregate::{FrameStack, ReadResult};
pub use cancel::CancellationToken;
pub use config::ReadOptions;
pub use error::{ErrorKind, Result, SkyframeError};
pub use instrument::Instrument;
pub use reader::{read, read_blueline, read_nir, read_reported, read_rgb, read_spectrograph};
