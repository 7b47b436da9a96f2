//! Application layer - Generic services that use ports.

pub mod catalog;
pub mod dispatcher;
pub mod ingest;
pub mod pipeline;
pub mod renditions;
pub mod thumbnails;
pub mod workspace;

pub use catalog::{OriginalVideo, VideoCatalog};
pub use dispatcher::JobDispatcher;
pub use ingest::{IngestService, UploadRequest};
pub use pipeline::Pipeline;
pub use workspace::WorkspaceManager;
