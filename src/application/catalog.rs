//! Read side of processed videos and their removal.

use crate::domain::av::transcoder::is_segment_name;
use crate::domain::hls::PLAYLIST_NAME;
use crate::domain::ladder::{self, LADDER};
use crate::domain::video::{
    ProcessingStatus, Rendition, Thumbnail, ThumbnailKind, ThumbnailSize, VideoJob,
};
use crate::error::{Failure, Result};
use crate::ports::repository::VideoRepository;
use crate::ports::storage::{SourceStream, StoragePort};
use bytes::Bytes;
use tokio::io::AsyncReadExt;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct ThumbnailImage {
    pub thumbnail: Thumbnail,
    pub body: Bytes,
}

/// The uploaded source file, or an inclusive byte range of it.
pub struct OriginalVideo {
    pub file_name: String,
    pub start: u64,
    pub end: u64,
    pub size: u64,
    pub body: SourceStream,
}

pub struct VideoCatalog<S, R> {
    storage: Arc<S>,
    repository: Arc<R>,
}

impl<S, R> Clone for VideoCatalog<S, R> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            repository: self.repository.clone(),
        }
    }
}

impl<S: StoragePort, R: VideoRepository> VideoCatalog<S, R> {
    pub fn new(storage: Arc<S>, repository: Arc<R>) -> Self {
        Self {
            storage,
            repository,
        }
    }

    pub async fn video(&self, id: Uuid) -> Result<VideoJob> {
        self.repository
            .find_video(id)
            .await?
            .ok_or_else(|| Failure::not_found("video", id))
    }

    /// Current status, for clients polling for completion.
    pub async fn status(&self, id: Uuid) -> Result<ProcessingStatus> {
        Ok(self.video(id).await?.status)
    }

    pub async fn videos_in_course(&self, course: Uuid) -> Result<Vec<VideoJob>> {
        self.repository.videos_in_course(course).await
    }

    /// Recorded renditions in ladder order.
    pub async fn renditions(&self, id: Uuid) -> Result<Vec<Rendition>> {
        self.video(id).await?;
        let mut renditions = self.repository.renditions_for(id).await?;
        renditions.sort_by_key(|rendition| {
            LADDER
                .iter()
                .position(|quality| quality.name == rendition.name)
                .unwrap_or(LADDER.len())
        });
        Ok(renditions)
    }

    pub async fn master_playlist(&self, id: Uuid) -> Result<String> {
        let video = self.completed(id).await?;
        let body = self.storage.get_bytes(&video.master_playlist_key()).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    pub async fn rendition_playlist(&self, id: Uuid, quality: &str) -> Result<String> {
        let video = self.completed(id).await?;
        let quality = ladder::find(quality).ok_or_else(|| Failure::not_found("rendition", quality))?;
        let key = format!("{}/{}/{}", video.path, quality.name, PLAYLIST_NAME);
        let body = self.storage.get_bytes(&key).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    /// One `segment_NNN.ts` of a rendition. Other names are not served.
    pub async fn segment(&self, id: Uuid, quality: &str, name: &str) -> Result<Bytes> {
        let video = self.completed(id).await?;
        let quality = ladder::find(quality).ok_or_else(|| Failure::not_found("rendition", quality))?;
        if !is_segment_name(name) {
            return Err(Failure::not_found("segment", name));
        }
        self.storage
            .get_bytes(&format!("{}/{}/{}", video.path, quality.name, name))
            .await
    }

    /// The stored upload as a stream, in any status.
    pub async fn original(&self, id: Uuid) -> Result<OriginalVideo> {
        let video = self.video(id).await?;
        let body = self.storage.open(&video.original_key()).await?;
        Ok(OriginalVideo {
            start: 0,
            end: video.file_size.saturating_sub(1),
            size: video.file_size,
            file_name: video.file_name,
            body,
        })
    }

    /// Bytes `start..=end` of the stored upload. A missing `end` means the
    /// last byte, and an `end` past the file is clamped to it. A `start` at or
    /// beyond the last byte is refused.
    pub async fn original_range(
        &self,
        id: Uuid,
        start: u64,
        end: Option<u64>,
    ) -> Result<OriginalVideo> {
        let video = self.video(id).await?;
        let size = video.file_size;
        let last = size.saturating_sub(1);
        let requested_end = end.unwrap_or(last);
        if start >= last || requested_end < start {
            return Err(Failure::Range {
                start,
                end: requested_end,
                size,
            });
        }
        let end = requested_end.min(last);

        let mut stream = self.storage.open(&video.original_key()).await?;
        tokio::io::copy(&mut (&mut stream).take(start), &mut tokio::io::sink()).await?;
        let body: SourceStream = Box::new(stream.take(end - start + 1));
        Ok(OriginalVideo {
            file_name: video.file_name,
            start,
            end,
            size,
            body,
        })
    }

    /// The thumbnail of `size` and `kind`, or the primary one of `size` when
    /// no kind is given.
    pub async fn thumbnail(
        &self,
        id: Uuid,
        size: ThumbnailSize,
        kind: Option<ThumbnailKind>,
    ) -> Result<ThumbnailImage> {
        let video = self.video(id).await?;
        let thumbnail = video
            .thumbnails
            .into_iter()
            .find(|t| {
                t.size == size
                    && match kind {
                        Some(kind) => t.kind == kind,
                        None => t.primary,
                    }
            })
            .ok_or_else(|| Failure::not_found("thumbnail", format!("{}/{}", id, size.name())))?;

        let body = self.storage.get_bytes(&thumbnail.path).await?;
        Ok(ThumbnailImage { thumbnail, body })
    }

    /// Removes the rendition rows, every stored object of the video, then the
    /// video record. Refused while the video is being processed.
    pub async fn delete_video(&self, id: Uuid) -> Result<()> {
        let video = self.video(id).await?;
        if video.status == ProcessingStatus::Processing {
            return Err(Failure::Busy { id: id.to_string() });
        }

        let renditions = self.repository.delete_renditions(id).await?;
        let objects = self.storage.delete_prefix(&video.path).await?;
        self.repository.delete_video(id).await?;
        tracing::info!(video_id = %id, renditions, objects, "video deleted");
        Ok(())
    }

    async fn completed(&self, id: Uuid) -> Result<VideoJob> {
        let video = self.video(id).await?;
        if video.status != ProcessingStatus::Completed {
            return Err(Failure::NotReady {
                id: id.to_string(),
                status: video.status,
            });
        }
        Ok(video)
    }
}
