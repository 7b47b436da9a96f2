use super::cmd::{tool_name, SystemRunner, ToolRunner};
use crate::domain::hls::{MediaPlaylistSummary, PLAYLIST_NAME};
use crate::domain::ladder::{QualityConfig, SEGMENT_SECONDS};
use crate::error::{Failure, Result};
use async_trait::async_trait;
use regex::Regex;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::OnceLock;

pub const SEGMENT_PATTERN: &str = "segment_%03d.ts";

/// What an encode produced, measured from the files on disk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentInfo {
    pub segment_count: usize,
    pub avg_segment_duration: f64,
}

/// Probe, encode and frame extraction against an external tool.
///
/// Seeking past the end of the source is not checked here; the tool's own
/// failure is what gets reported.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transcoder: Send + Sync {
    async fn probe_duration(&self, source: &Path) -> Result<f64>;

    /// Writes `playlist.m3u8` and `segment_NNN.ts` files into `output_dir`.
    async fn encode_rendition(
        &self,
        source: &Path,
        output_dir: &Path,
        quality: &QualityConfig,
    ) -> Result<SegmentInfo>;

    /// Extracts one frame at `timestamp` scaled to `width`x`height`,
    /// overwriting `output` if it exists.
    async fn extract_frame(
        &self,
        source: &Path,
        timestamp: f64,
        width: u32,
        height: u32,
        output: &Path,
    ) -> Result<PathBuf>;
}

fn arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

pub fn probe_args(source: &Path) -> Vec<String> {
    vec![
        "-v".into(),
        "quiet".into(),
        "-show_entries".into(),
        "format=duration".into(),
        "-of".into(),
        "csv=p=0".into(),
        arg(source),
    ]
}

pub fn encode_args(source: &Path, output_dir: &Path, quality: &QualityConfig) -> Vec<String> {
    vec![
        "-y".into(),
        "-i".into(),
        arg(source),
        "-c:v".into(),
        "libx264".into(),
        "-c:a".into(),
        "aac".into(),
        "-s".into(),
        quality.resolution(),
        "-b:v".into(),
        quality.bitrate.to_string(),
        "-maxrate".into(),
        quality.max_rate().to_string(),
        "-bufsize".into(),
        quality.buffer_size().to_string(),
        "-hls_time".into(),
        SEGMENT_SECONDS.to_string(),
        "-hls_playlist_type".into(),
        "vod".into(),
        "-hls_segment_filename".into(),
        arg(&output_dir.join(SEGMENT_PATTERN)),
        arg(&output_dir.join(PLAYLIST_NAME)),
    ]
}

pub fn frame_args(source: &Path, timestamp: f64, width: u32, height: u32, output: &Path) -> Vec<String> {
    vec![
        "-i".into(),
        arg(source),
        "-ss".into(),
        timestamp.to_string(),
        "-vframes".into(),
        "1".into(),
        "-vf".into(),
        format!("scale={}:{}", width, height),
        "-q:v".into(),
        "2".into(),
        "-y".into(),
        arg(output),
    ]
}

/// Prober output must be a finite, non-negative number of seconds.
pub fn parse_duration(stdout: &str) -> Result<f64> {
    let trimmed = stdout.trim();
    match trimmed.parse::<f64>() {
        Ok(seconds) if seconds.is_finite() && seconds >= 0.0 => Ok(seconds),
        _ => Err(Failure::DurationParse {
            output: trimmed.to_string(),
        }),
    }
}

/// True for names the encoder gives segments, `segment_NNN.ts`.
pub fn is_segment_name(name: &str) -> bool {
    static SEGMENT: OnceLock<Regex> = OnceLock::new();
    SEGMENT
        .get_or_init(|| Regex::new(r"^segment_\d+\.ts$").unwrap())
        .is_match(name)
}

/// Counts `segment_NNN.ts` files actually present in `dir`.
pub async fn count_segments(dir: &Path) -> Result<usize> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut count = 0;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        if is_segment_name(&name.to_string_lossy()) && entry.file_type().await?.is_file() {
            count += 1;
        }
    }
    Ok(count)
}

/// ffmpeg/ffprobe backed [`Transcoder`].
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder<R = SystemRunner> {
    runner: R,
    ffmpeg: PathBuf,
    ffprobe: PathBuf,
}

impl<R: ToolRunner> FfmpegTranscoder<R> {
    pub fn new(runner: R, ffmpeg: impl Into<PathBuf>, ffprobe: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            ffmpeg: ffmpeg.into(),
            ffprobe: ffprobe.into(),
        }
    }

    async fn exec(&self, program: &Path, args: Vec<String>) -> Result<Output> {
        let output = self.runner.run(program, &args).await?;
        if !output.status.success() {
            let tool = tool_name(program);
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(
                tool = %tool,
                exit_code = ?output.status.code(),
                "external tool failed: {}",
                stderr.trim()
            );
            return Err(Failure::process(tool, output.status.code()));
        }
        Ok(output)
    }

    async fn average_segment_duration(&self, output_dir: &Path) -> f64 {
        let fallback = SEGMENT_SECONDS as f64;
        match tokio::fs::read_to_string(output_dir.join(PLAYLIST_NAME)).await {
            Ok(content) => MediaPlaylistSummary::parse(&content)
                .average()
                .unwrap_or(fallback),
            Err(e) => {
                tracing::warn!(dir = %output_dir.display(), "could not read rendition playlist: {}", e);
                fallback
            }
        }
    }
}

#[async_trait]
impl<R: ToolRunner> Transcoder for FfmpegTranscoder<R> {
    async fn probe_duration(&self, source: &Path) -> Result<f64> {
        let output = self.exec(&self.ffprobe, probe_args(source)).await?;
        parse_duration(&String::from_utf8_lossy(&output.stdout))
    }

    async fn encode_rendition(
        &self,
        source: &Path,
        output_dir: &Path,
        quality: &QualityConfig,
    ) -> Result<SegmentInfo> {
        tracing::debug!(quality = quality.name, "encoding rendition");
        self.exec(&self.ffmpeg, encode_args(source, output_dir, quality))
            .await?;

        let segment_count = count_segments(output_dir).await?;
        let avg_segment_duration = self.average_segment_duration(output_dir).await;
        Ok(SegmentInfo {
            segment_count,
            avg_segment_duration,
        })
    }

    async fn extract_frame(
        &self,
        source: &Path,
        timestamp: f64,
        width: u32,
        height: u32,
        output: &Path,
    ) -> Result<PathBuf> {
        self.exec(
            &self.ffmpeg,
            frame_args(source, timestamp, width, height, output),
        )
        .await?;
        Ok(output.to_path_buf())
    }
}
