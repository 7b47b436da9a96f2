//! Configuration for different deployment environments.

use crate::application::dispatcher::DEFAULT_MAX_CONCURRENT_VIDEOS;
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Settings of the processing pipeline itself, shared by every deployment.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Parent directory of per-job workspaces
    pub workspace_dir: PathBuf,
    pub ffmpeg_path: PathBuf,
    pub ffprobe_path: PathBuf,
    /// Videos processed at the same time
    pub max_concurrent_videos: usize,
    /// Quality encodes running at the same time within one video
    pub rendition_parallelism: usize,
    /// Kill an external tool after this long; `None` waits forever
    pub tool_timeout: Option<Duration>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workspace_dir: env::temp_dir(),
            ffmpeg_path: PathBuf::from("ffmpeg"),
            ffprobe_path: PathBuf::from("ffprobe"),
            max_concurrent_videos: DEFAULT_MAX_CONCURRENT_VIDEOS,
            rendition_parallelism: 1,
            tool_timeout: None,
        }
    }
}

impl PipelineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        Self {
            workspace_dir: lookup("WORKSPACE_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.workspace_dir),
            ffmpeg_path: lookup("FFMPEG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffmpeg_path),
            ffprobe_path: lookup("FFPROBE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.ffprobe_path),
            max_concurrent_videos: parsed::<usize>(&lookup, "MAX_CONCURRENT_VIDEOS")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_videos),
            rendition_parallelism: parsed::<usize>(&lookup, "RENDITION_PARALLELISM")
                .filter(|n| *n > 0)
                .unwrap_or(defaults.rendition_parallelism),
            tool_timeout: parsed::<u64>(&lookup, "TOOL_TIMEOUT_SECS")
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
        }
    }
}

fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<T> {
    let raw = lookup(name)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparseable setting");
            None
        }
    }
}

/// Configuration for local/monolith deployment.
#[cfg(feature = "local")]
#[derive(Clone, Debug)]
pub struct LocalConfig {
    /// Redis connection URL
    pub redis_url: String,
    /// Root directory of the filesystem object store
    pub storage_dir: PathBuf,
}

#[cfg(feature = "local")]
impl LocalConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        dotenv::dotenv().ok();

        Self {
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| String::from("redis://127.0.0.1/")),
            storage_dir: env::var("STORAGE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./storage")),
        }
    }
}

/// Configuration for AWS deployment.
#[cfg(feature = "aws")]
#[derive(Clone, Debug)]
pub struct AwsConfig {
    /// S3 bucket for video storage
    pub s3_bucket: String,
}

#[cfg(feature = "aws")]
impl AwsConfig {
    /// Load configuration from environment variables. `None` when the bucket
    /// is not set.
    pub fn from_env() -> Option<Self> {
        dotenv::dotenv().ok();
        let s3_bucket = env::var("S3_BUCKET").ok().filter(|b| !b.is_empty())?;
        Some(Self { s3_bucket })
    }
}
