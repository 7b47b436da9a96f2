//! External encoder/prober integration.

pub mod cmd;
pub mod transcoder;

pub use cmd::{SystemRunner, ToolRunner};
pub use transcoder::{FfmpegTranscoder, SegmentInfo, Transcoder};
