use crate::domain::video::{Rendition, VideoJob};
use crate::error::Result;
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence of jobs (with their thumbnails) and renditions.
#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Insert or replace the whole job record.
    async fn save_video(&self, video: &VideoJob) -> Result<()>;

    async fn find_video(&self, id: Uuid) -> Result<Option<VideoJob>>;

    /// All videos of a course, ordered by position.
    async fn videos_in_course(&self, course: Uuid) -> Result<Vec<VideoJob>>;

    async fn delete_video(&self, id: Uuid) -> Result<()>;

    async fn save_rendition(&self, rendition: &Rendition) -> Result<()>;

    /// Renditions of a video in the order they were saved.
    async fn renditions_for(&self, video_id: Uuid) -> Result<Vec<Rendition>>;

    async fn delete_renditions(&self, video_id: Uuid) -> Result<usize>;
}
