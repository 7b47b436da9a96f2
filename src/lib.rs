//! vodpipe - Video on demand transcoding pipeline
//!
//! Takes an uploaded video, encodes it into a fixed HLS bitrate ladder with a
//! master playlist, extracts preview thumbnails and tracks the job status so
//! clients can poll for completion.
//!
//! Hexagonal Architecture:
//! - domain/: Pure business logic (video, ladder, hls, av)
//! - ports/: Trait definitions
//! - adapters/: Concrete implementations
//! - application/: Generic services
//! - config: Environment configuration
//!
//! # Features
//! - `local`: Filesystem object store and Redis repository
//! - `aws`: S3 object store
//! - `full`: All features

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod ports;
pub mod telemetry;

#[cfg(test)]
mod testing;

// Re-exports for convenience
pub use config::PipelineConfig;
pub use error::{Failure, Result};

#[cfg(feature = "local")]
pub use config::LocalConfig;

#[cfg(feature = "aws")]
pub use config::AwsConfig;
