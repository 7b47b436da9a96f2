//! Local adapters for single-machine deployment.

pub mod fs;
pub mod redis;

pub use fs::FsStorage;
pub use redis::RedisRepository;
