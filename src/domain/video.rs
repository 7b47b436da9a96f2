use crate::error::{Failure, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a video job. Only moves forward:
/// `Uploaded -> Processing -> Completed | Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProcessingStatus {
    Uploaded,
    Processing,
    Completed,
    Failed,
}

impl ProcessingStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ProcessingStatus::Completed | ProcessingStatus::Failed)
    }

    pub fn can_transition_to(self, next: ProcessingStatus) -> bool {
        use ProcessingStatus::*;
        matches!(
            (self, next),
            (Uploaded, Processing) | (Processing, Completed) | (Processing, Failed)
        )
    }
}

impl fmt::Display for ProcessingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessingStatus::Uploaded => "UPLOADED",
            ProcessingStatus::Processing => "PROCESSING",
            ProcessingStatus::Completed => "COMPLETED",
            ProcessingStatus::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Pixel box a thumbnail frame is scaled to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThumbnailSize {
    Small,
    Medium,
    Large,
}

impl ThumbnailSize {
    pub const ALL: [ThumbnailSize; 3] = [
        ThumbnailSize::Small,
        ThumbnailSize::Medium,
        ThumbnailSize::Large,
    ];

    pub fn dimensions(self) -> (u32, u32) {
        match self {
            ThumbnailSize::Small => (150, 84),
            ThumbnailSize::Medium => (320, 180),
            ThumbnailSize::Large => (640, 360),
        }
    }

    /// Lowercase name used in object keys, e.g. `12_small.jpg`.
    pub fn name(self) -> &'static str {
        match self {
            ThumbnailSize::Small => "small",
            ThumbnailSize::Medium => "medium",
            ThumbnailSize::Large => "large",
        }
    }
}

/// Which point of the video a thumbnail was taken from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ThumbnailKind {
    /// 10% of the duration; the primary thumbnail of every size.
    Ten,
    TwentyFive,
    Fifty,
    /// Uploaded by a user, never generated by the pipeline.
    Custom,
}

impl ThumbnailKind {
    pub const GENERATED: [ThumbnailKind; 3] = [
        ThumbnailKind::Ten,
        ThumbnailKind::TwentyFive,
        ThumbnailKind::Fifty,
    ];

    pub fn fraction(self) -> Option<f64> {
        match self {
            ThumbnailKind::Ten => Some(0.1),
            ThumbnailKind::TwentyFive => Some(0.25),
            ThumbnailKind::Fifty => Some(0.5),
            ThumbnailKind::Custom => None,
        }
    }

    pub fn is_primary(self) -> bool {
        self == ThumbnailKind::Ten
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Thumbnail {
    pub id: Uuid,
    pub video_id: Uuid,
    /// Object key in durable storage.
    pub path: String,
    pub timestamp_seconds: f64,
    pub created_at: DateTime<Utc>,
    pub size: ThumbnailSize,
    pub kind: ThumbnailKind,
    pub primary: bool,
}

/// One encoded quality of a video. Written once after a successful encode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rendition {
    pub id: Uuid,
    pub video_id: Uuid,
    /// Quality name, e.g. `720p`.
    pub name: String,
    /// Resolution label, e.g. `1280x720`.
    pub resolution: String,
    pub bitrate: u32,
    pub playlist_path: String,
    pub segment_count: usize,
    pub avg_segment_duration: f64,
}

/// The uploaded video and the state of its processing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoJob {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub file_name: String,
    /// Storage prefix, `<course>/<id>`.
    pub path: String,
    pub course: Uuid,
    pub file_size: u64,
    pub uploaded_at: DateTime<Utc>,
    /// Seconds; 0 until probed.
    pub duration: f64,
    pub position: u32,
    pub status: ProcessingStatus,
    pub thumbnails: Vec<Thumbnail>,
}

impl VideoJob {
    /// A freshly uploaded job with a new, never reused id.
    pub fn new(
        course: Uuid,
        title: impl Into<String>,
        description: impl Into<String>,
        file_name: impl Into<String>,
        file_size: u64,
        position: u32,
    ) -> Self {
        let id = Uuid::new_v4();
        Self {
            id,
            title: title.into(),
            description: description.into(),
            file_name: file_name.into(),
            path: format!("{}/{}", course, id),
            course,
            file_size,
            uploaded_at: Utc::now(),
            duration: 0.0,
            position,
            status: ProcessingStatus::Uploaded,
            thumbnails: Vec::new(),
        }
    }

    pub fn original_key(&self) -> String {
        format!("{}/{}", self.path, self.file_name)
    }

    pub fn master_playlist_key(&self) -> String {
        format!("{}/master.m3u8", self.path)
    }

    pub fn transition(&mut self, next: ProcessingStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(Failure::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Extension of the uploaded file, `mp4` when the name has none.
    pub fn source_extension(&self) -> &str {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("mp4")
    }
}
