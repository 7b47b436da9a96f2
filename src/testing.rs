//! Shared helpers for unit tests.

use crate::domain::av::{SegmentInfo, Transcoder};
use crate::domain::ladder::QualityConfig;
use crate::error::{Failure, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::sync::{Arc, Mutex};

#[cfg(unix)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::unix::process::ExitStatusExt;
    ExitStatus::from_raw(code << 8)
}

#[cfg(windows)]
fn exit_status(code: i32) -> ExitStatus {
    use std::os::windows::process::ExitStatusExt;
    ExitStatus::from_raw(code as u32)
}

pub fn tool_output(code: i32, stdout: &str) -> Output {
    Output {
        status: exit_status(code),
        stdout: stdout.as_bytes().to_vec(),
        stderr: Vec::new(),
    }
}

/// Writes what an HLS encode leaves behind: `count` segments of 6 s and the
/// rendition playlist.
pub fn write_rendition(dir: &Path, count: usize) {
    let mut playlist = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:6\n");
    for i in 0..count {
        let name = format!("segment_{:03}.ts", i);
        std::fs::write(dir.join(&name), b"ts").unwrap();
        playlist.push_str(&format!("#EXTINF:6.000000,\n{}\n", name));
    }
    playlist.push_str("#EXT-X-ENDLIST\n");
    std::fs::write(dir.join("playlist.m3u8"), playlist).unwrap();
}

/// Transcoder double that produces files on disk without running a tool.
#[derive(Clone)]
pub struct FakeTranscoder {
    pub duration: f64,
    pub segments: usize,
    pub fail_quality: Option<&'static str>,
    /// Frame extractions that succeed before the next one fails.
    pub frames_before_failure: Option<usize>,
    /// A source whose bytes equal this makes the probe panic.
    pub panic_on_source: Option<&'static str>,
    pub encoded: Arc<Mutex<Vec<String>>>,
    pub frames: Arc<Mutex<Vec<f64>>>,
}

impl FakeTranscoder {
    pub fn new(duration: f64) -> Self {
        Self {
            duration,
            segments: 20,
            fail_quality: None,
            frames_before_failure: None,
            panic_on_source: None,
            encoded: Arc::default(),
            frames: Arc::default(),
        }
    }

    pub fn encoded(&self) -> Vec<String> {
        self.encoded.lock().unwrap().clone()
    }

    pub fn frame_count(&self) -> usize {
        self.frames.lock().unwrap().len()
    }
}

#[async_trait]
impl Transcoder for FakeTranscoder {
    async fn probe_duration(&self, source: &Path) -> Result<f64> {
        if let Some(marker) = self.panic_on_source {
            let content = tokio::fs::read(source).await?;
            if content == marker.as_bytes() {
                panic!("probe crashed on {}", source.display());
            }
        }
        Ok(self.duration)
    }

    async fn encode_rendition(
        &self,
        _source: &Path,
        output_dir: &Path,
        quality: &QualityConfig,
    ) -> Result<SegmentInfo> {
        self.encoded.lock().unwrap().push(quality.name.to_string());
        if self.fail_quality == Some(quality.name) {
            return Err(Failure::process("ffmpeg", Some(1)));
        }
        write_rendition(output_dir, self.segments);
        Ok(SegmentInfo {
            segment_count: self.segments,
            avg_segment_duration: 6.0,
        })
    }

    async fn extract_frame(
        &self,
        _source: &Path,
        timestamp: f64,
        _width: u32,
        _height: u32,
        output: &Path,
    ) -> Result<PathBuf> {
        let done = {
            let mut frames = self.frames.lock().unwrap();
            frames.push(timestamp);
            frames.len() - 1
        };
        if self.frames_before_failure.is_some_and(|limit| done >= limit) {
            return Err(Failure::process("ffmpeg", Some(1)));
        }
        tokio::fs::write(output, b"jpg").await?;
        Ok(output.to_path_buf())
    }
}
