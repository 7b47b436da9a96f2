use super::pipeline::Pipeline;
use crate::domain::av::Transcoder;
use crate::domain::video::ProcessingStatus;
use crate::error::{Failure, Result};
use crate::ports::repository::VideoRepository;
use crate::ports::storage::StoragePort;
use dashmap::DashSet;
use futures::FutureExt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use uuid::Uuid;

pub const DEFAULT_MAX_CONCURRENT_VIDEOS: usize = 2;

/// Runs pipeline jobs as independent tasks, at most `max_concurrent` at a
/// time, and never two runs of the same job id at once.
pub struct JobDispatcher<S, R, T> {
    pipeline: Arc<Pipeline<S, R, T>>,
    permits: Arc<Semaphore>,
    in_flight: Arc<DashSet<Uuid>>,
}

impl<S, R, T> Clone for JobDispatcher<S, R, T> {
    fn clone(&self) -> Self {
        Self {
            pipeline: self.pipeline.clone(),
            permits: self.permits.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

/// Releases a job id when its task ends, including by panic.
struct InFlight {
    set: Arc<DashSet<Uuid>>,
    id: Uuid,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.set.remove(&self.id);
    }
}

impl<S, R, T> JobDispatcher<S, R, T>
where
    S: StoragePort + 'static,
    R: VideoRepository + 'static,
    T: Transcoder + 'static,
{
    pub fn new(pipeline: Arc<Pipeline<S, R, T>>, max_concurrent: usize) -> Self {
        Self {
            pipeline,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
            in_flight: Arc::new(DashSet::new()),
        }
    }

    /// Queues one run reading its source from `source_key` and returns
    /// immediately. Fails with `Busy` if the job is already queued or running.
    /// The source is opened only once a worker slot is free.
    ///
    /// Dropping the handle detaches the task. A panic inside one job marks
    /// that job `FAILED` and surfaces only through its handle.
    pub fn submit(
        &self,
        job_id: Uuid,
        source_key: impl Into<String>,
    ) -> Result<JoinHandle<Result<ProcessingStatus>>> {
        let source_key = source_key.into();
        if !self.in_flight.insert(job_id) {
            tracing::warn!(video_id = %job_id, "job already in flight");
            return Err(Failure::Busy {
                id: job_id.to_string(),
            });
        }
        let guard = InFlight {
            set: self.in_flight.clone(),
            id: job_id,
        };

        let pipeline = self.pipeline.clone();
        let permits = self.permits.clone();
        tracing::debug!(video_id = %job_id, "job submitted");

        Ok(tokio::spawn(async move {
            let _guard = guard;
            let _permit = permits.acquire_owned().await.map_err(|_| Failure::Busy {
                id: job_id.to_string(),
            })?;
            let run = AssertUnwindSafe(pipeline.run_stored(job_id, &source_key))
                .catch_unwind()
                .await;
            match run {
                Ok(result) => result.inspect_err(|e| {
                    tracing::error!(video_id = %job_id, "pipeline run aborted: {}", e);
                }),
                Err(payload) => {
                    tracing::error!(video_id = %job_id, "pipeline run panicked");
                    if let Err(e) = pipeline.abandon(job_id).await {
                        tracing::error!(video_id = %job_id, "could not mark job failed: {}", e);
                    }
                    panic::resume_unwind(payload)
                }
            }
        }))
    }

    pub fn is_in_flight(&self, job_id: Uuid) -> bool {
        self.in_flight.contains(&job_id)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}
