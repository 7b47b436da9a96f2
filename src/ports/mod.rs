//! Ports - Trait definitions for the outside world.

pub mod repository;
pub mod storage;

pub use repository::VideoRepository;
pub use storage::{SourceStream, StoragePort};
