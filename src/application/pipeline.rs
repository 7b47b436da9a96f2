//! The coordinator: one run per submitted job, owning its status.

use super::renditions::RenditionManager;
use super::thumbnails::ThumbnailGenerator;
use super::workspace::{Workspace, WorkspaceManager};
use crate::domain::av::Transcoder;
use crate::domain::video::{ProcessingStatus, VideoJob};
use crate::error::{Failure, Result};
use crate::ports::repository::VideoRepository;
use crate::ports::storage::{SourceStream, StoragePort};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

pub struct Pipeline<S, R, T> {
    repository: Arc<R>,
    workspaces: WorkspaceManager<S>,
    transcoder: Arc<T>,
    renditions: RenditionManager<S, R, T>,
    thumbnails: ThumbnailGenerator<S, T>,
}

impl<S, R, T> Pipeline<S, R, T>
where
    S: StoragePort,
    R: VideoRepository,
    T: Transcoder,
{
    pub fn new(
        storage: Arc<S>,
        repository: Arc<R>,
        transcoder: Arc<T>,
        workspace_root: impl Into<PathBuf>,
        rendition_parallelism: usize,
    ) -> Self {
        let workspaces = WorkspaceManager::new(workspace_root, storage);
        Self {
            renditions: RenditionManager::new(
                workspaces.clone(),
                repository.clone(),
                transcoder.clone(),
                rendition_parallelism,
            ),
            thumbnails: ThumbnailGenerator::new(workspaces.clone(), transcoder.clone()),
            repository,
            workspaces,
            transcoder,
        }
    }

    /// Processes `job_id` from `source` and returns the status it ended in.
    ///
    /// Only a job still `UPLOADED` is processed; any other status is returned
    /// untouched. Phase failures end in `FAILED` and are not returned as
    /// errors. An `Err` means the job could not be loaded or its status could
    /// not be persisted.
    pub async fn run(&self, job_id: Uuid, source: SourceStream) -> Result<ProcessingStatus> {
        self.run_with(job_id, async move { Ok(source) }).await
    }

    /// Like [`Pipeline::run`], reading the source from the object at `key`.
    /// The object is only opened once the job has moved to `PROCESSING`, and
    /// an unreadable object fails the job.
    pub async fn run_stored(&self, job_id: Uuid, key: &str) -> Result<ProcessingStatus> {
        let storage = self.workspaces.storage();
        self.run_with(job_id, storage.open(key)).await
    }

    /// Marks a job left in `PROCESSING` by an interrupted run as `FAILED`.
    /// Returns whether the job was changed.
    pub async fn abandon(&self, job_id: Uuid) -> Result<bool> {
        let Some(mut job) = self.repository.find_video(job_id).await? else {
            return Ok(false);
        };
        if job.status != ProcessingStatus::Processing {
            return Ok(false);
        }
        job.transition(ProcessingStatus::Failed)?;
        self.repository.save_video(&job).await?;
        tracing::warn!(video_id = %job_id, "interrupted job marked failed");
        Ok(true)
    }

    async fn run_with<F>(&self, job_id: Uuid, source: F) -> Result<ProcessingStatus>
    where
        F: Future<Output = Result<SourceStream>> + Send,
    {
        let mut job = self
            .repository
            .find_video(job_id)
            .await?
            .ok_or_else(|| Failure::not_found("video", job_id))?;

        if job.status != ProcessingStatus::Uploaded {
            tracing::warn!(video_id = %job_id, status = %job.status, "job not processed again");
            return Ok(job.status);
        }

        job.transition(ProcessingStatus::Processing)?;
        self.repository.save_video(&job).await?;
        tracing::info!(video_id = %job_id, "processing started");

        let outcome = match self.workspaces.create(job_id).await {
            Ok(workspace) => {
                let outcome = self.process(&mut job, &workspace, source).await;
                self.workspaces.cleanup(workspace).await;
                outcome
            }
            Err(e) => Err(e),
        };

        let status = match outcome {
            Ok(()) => ProcessingStatus::Completed,
            Err(e) => {
                tracing::error!(video_id = %job_id, "processing failed: {}", e);
                ProcessingStatus::Failed
            }
        };
        job.transition(status)?;
        self.repository.save_video(&job).await?;
        tracing::info!(video_id = %job_id, status = %status, "processing finished");
        Ok(status)
    }

    async fn process<F>(&self, job: &mut VideoJob, workspace: &Workspace, source: F) -> Result<()>
    where
        F: Future<Output = Result<SourceStream>> + Send,
    {
        let source = source.await?;
        let extension = job.source_extension().to_string();
        let source_path = self
            .workspaces
            .materialize_source(workspace, &extension, source)
            .await?;

        job.duration = self.transcoder.probe_duration(&source_path).await?;
        tracing::info!(video_id = %job.id, duration = job.duration, "duration probed");

        self.renditions.process(job, workspace, &source_path).await?;
        job.thumbnails = self
            .thumbnails
            .generate(job, workspace, &source_path)
            .await?;
        Ok(())
    }
}
