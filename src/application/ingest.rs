//! Upload registration: the synchronous half of an upload, ending with a
//! fire-and-forget submit to the dispatcher.

use super::dispatcher::JobDispatcher;
use crate::domain::av::Transcoder;
use crate::domain::video::VideoJob;
use crate::error::Result;
use crate::ports::repository::VideoRepository;
use crate::ports::storage::{content_type_for, StoragePort};
use bytes::Bytes;
use std::sync::Arc;
use uuid::Uuid;

/// An accepted upload. Name and content type are expected to be validated by
/// the caller.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub course: Uuid,
    pub title: String,
    pub description: String,
    pub file_name: String,
    pub body: Bytes,
}

pub struct IngestService<S, R, T> {
    storage: Arc<S>,
    repository: Arc<R>,
    dispatcher: JobDispatcher<S, R, T>,
}

impl<S, R, T> IngestService<S, R, T>
where
    S: StoragePort + 'static,
    R: VideoRepository + 'static,
    T: Transcoder + 'static,
{
    pub fn new(storage: Arc<S>, repository: Arc<R>, dispatcher: JobDispatcher<S, R, T>) -> Self {
        Self {
            storage,
            repository,
            dispatcher,
        }
    }

    pub fn dispatcher(&self) -> &JobDispatcher<S, R, T> {
        &self.dispatcher
    }

    /// Records the job, stores the original and submits processing exactly
    /// once. Returns without waiting for processing.
    pub async fn accept_upload(&self, request: UploadRequest) -> Result<VideoJob> {
        let position = self
            .repository
            .videos_in_course(request.course)
            .await?
            .iter()
            .map(|video| video.position + 1)
            .max()
            .unwrap_or(0);

        let job = VideoJob::new(
            request.course,
            request.title,
            request.description,
            request.file_name,
            request.body.len() as u64,
            position,
        );
        self.repository.save_video(&job).await?;

        let original = job.original_key();
        self.storage
            .put_bytes(&original, request.body, content_type_for(&job.file_name))
            .await?;
        tracing::info!(video_id = %job.id, key = %original, size = job.file_size, "upload stored");

        self.dispatcher.submit(job.id, original)?;
        Ok(job)
    }
}
