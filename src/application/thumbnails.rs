use super::workspace::{Workspace, WorkspaceManager};
use crate::domain::av::Transcoder;
use crate::domain::video::{Thumbnail, ThumbnailKind, ThumbnailSize, VideoJob};
use crate::error::Result;
use crate::ports::storage::StoragePort;
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

/// Marker timestamps for a video of `duration` seconds, in marker order.
pub fn thumbnail_timestamps(duration: f64) -> Vec<(ThumbnailKind, f64)> {
    ThumbnailKind::GENERATED
        .iter()
        .filter_map(|kind| kind.fraction().map(|fraction| (*kind, duration * fraction)))
        .collect()
}

/// `<floor(timestamp)>_<size>.jpg`
pub fn thumbnail_file_name(timestamp: f64, size: ThumbnailSize) -> String {
    format!("{}_{}.jpg", timestamp.floor() as u64, size.name())
}

pub struct ThumbnailGenerator<S, T> {
    workspaces: WorkspaceManager<S>,
    transcoder: Arc<T>,
}

impl<S: StoragePort, T: Transcoder> ThumbnailGenerator<S, T> {
    pub fn new(workspaces: WorkspaceManager<S>, transcoder: Arc<T>) -> Self {
        Self {
            workspaces,
            transcoder,
        }
    }

    /// Extracts and publishes one frame per marker and size class.
    ///
    /// The first failure ends the phase. Images already uploaded by this call
    /// are deleted again before the failure is returned.
    pub async fn generate(
        &self,
        job: &VideoJob,
        workspace: &Workspace,
        source: &Path,
    ) -> Result<Vec<Thumbnail>> {
        let mut uploaded = Vec::new();
        match self.extract_all(job, workspace, source, &mut uploaded).await {
            Ok(thumbnails) => {
                tracing::info!(video_id = %job.id, count = thumbnails.len(), "thumbnails ready");
                Ok(thumbnails)
            }
            Err(e) => {
                tracing::error!(video_id = %job.id, "thumbnail generation failed: {}", e);
                self.retract(&uploaded).await;
                Err(e)
            }
        }
    }

    async fn extract_all(
        &self,
        job: &VideoJob,
        workspace: &Workspace,
        source: &Path,
        uploaded: &mut Vec<String>,
    ) -> Result<Vec<Thumbnail>> {
        let dir = workspace.thumbnails_dir();
        tokio::fs::create_dir_all(&dir).await?;
        let prefix = format!("{}/thumbnails", job.path);

        let mut thumbnails = Vec::new();
        for (kind, timestamp) in thumbnail_timestamps(job.duration) {
            for size in ThumbnailSize::ALL {
                let (width, height) = size.dimensions();
                let name = thumbnail_file_name(timestamp, size);
                let frame = self
                    .transcoder
                    .extract_frame(source, timestamp, width, height, &dir.join(&name))
                    .await?;

                let report = self.workspaces.publish(&frame, &prefix).await?;
                uploaded.extend(report.uploaded.iter().cloned());
                report.into_result()?;

                thumbnails.push(Thumbnail {
                    id: Uuid::new_v4(),
                    video_id: job.id,
                    path: format!("{}/{}", prefix, name),
                    timestamp_seconds: timestamp,
                    created_at: Utc::now(),
                    size,
                    kind,
                    primary: kind.is_primary(),
                });
            }
        }
        Ok(thumbnails)
    }

    async fn retract(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.workspaces.storage().delete(key).await {
                tracing::warn!(key = %key, "could not delete orphaned thumbnail: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::MemoryStorage;
    use crate::domain::av::transcoder::MockTranscoder;
    use crate::error::Failure;
    use crate::testing::FakeTranscoder;
    use std::collections::HashSet;
    use tempfile::tempdir;

    fn job(duration: f64) -> VideoJob {
        let mut job = VideoJob::new(Uuid::new_v4(), "Lesson", "", "lesson.mp4", 10, 0);
        job.duration = duration;
        job
    }

    #[test]
    fn test_timestamps_are_fixed_fractions() {
        for duration in [1.0, 7.5, 120.0, 3601.25] {
            let timestamps: Vec<f64> = thumbnail_timestamps(duration)
                .into_iter()
                .map(|(_, t)| t)
                .collect();
            assert_eq!(
                timestamps,
                vec![duration * 0.1, duration * 0.25, duration * 0.5]
            );
        }
        let kinds: Vec<_> = thumbnail_timestamps(120.0).into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            kinds,
            vec![ThumbnailKind::Ten, ThumbnailKind::TwentyFive, ThumbnailKind::Fifty]
        );
    }

    #[test]
    fn test_file_name_floors_timestamp() {
        assert_eq!(thumbnail_file_name(12.0, ThumbnailSize::Small), "12_small.jpg");
        assert_eq!(thumbnail_file_name(30.99, ThumbnailSize::Large), "30_large.jpg");
        assert_eq!(thumbnail_file_name(0.25, ThumbnailSize::Medium), "0_medium.jpg");
    }

    #[tokio::test]
    async fn test_generates_nine_with_one_primary_per_size() {
        let root = tempdir().unwrap();
        let storage = MemoryStorage::new();
        let workspaces = WorkspaceManager::new(root.path(), Arc::new(storage.clone()));
        let job = job(120.0);

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_extract_frame()
            .times(9)
            .returning(|_, _, _, _, output| {
                std::fs::write(output, b"jpg").unwrap();
                Ok(output.to_path_buf())
            });
        let generator = ThumbnailGenerator::new(workspaces.clone(), Arc::new(transcoder));
        let workspace = workspaces.create(job.id).await.unwrap();

        let thumbnails = generator
            .generate(&job, &workspace, Path::new("original.mp4"))
            .await
            .unwrap();
        assert_eq!(thumbnails.len(), 9);

        let primaries: Vec<_> = thumbnails.iter().filter(|t| t.primary).collect();
        assert_eq!(primaries.len(), 3);
        let sizes: HashSet<_> = primaries.iter().map(|t| t.size).collect();
        assert_eq!(sizes.len(), 3);
        assert!(primaries.iter().all(|t| t.timestamp_seconds == 12.0));

        let timestamps: HashSet<u64> = thumbnails
            .iter()
            .map(|t| t.timestamp_seconds as u64)
            .collect();
        assert_eq!(timestamps, HashSet::from([12, 30, 60]));

        let key = format!("{}/thumbnails/30_medium.jpg", job.path);
        assert!(thumbnails.iter().any(|t| t.path == key));
        let object = storage.object(&key).await.unwrap();
        assert_eq!(object.content_type, "image/jpeg");
        assert_eq!(storage.keys().await.len(), 9);
        workspaces.cleanup(workspace).await;
    }

    #[tokio::test]
    async fn test_extract_frame_receives_size_dimensions() {
        let root = tempdir().unwrap();
        let workspaces = WorkspaceManager::new(root.path(), Arc::new(MemoryStorage::new()));
        let job = job(10.0);

        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_extract_frame()
            .withf(|_, t, w, h, out| {
                *t == 1.0 && *w == 640 && *h == 360 && out.ends_with("1_large.jpg")
            })
            .times(1)
            .returning(|_, _, _, _, output| {
                std::fs::write(output, b"jpg").unwrap();
                Ok(output.to_path_buf())
            });
        transcoder
            .expect_extract_frame()
            .returning(|_, _, _, _, output| {
                std::fs::write(output, b"jpg").unwrap();
                Ok(output.to_path_buf())
            });
        let generator = ThumbnailGenerator::new(workspaces.clone(), Arc::new(transcoder));
        let workspace = workspaces.create(job.id).await.unwrap();

        generator
            .generate(&job, &workspace, Path::new("original.mp4"))
            .await
            .unwrap();
        workspaces.cleanup(workspace).await;
    }

    #[tokio::test]
    async fn test_failure_stops_and_retracts_uploaded_images() {
        let root = tempdir().unwrap();
        let storage = MemoryStorage::new();
        let workspaces = WorkspaceManager::new(root.path(), Arc::new(storage.clone()));
        let transcoder = FakeTranscoder {
            frames_before_failure: Some(4),
            ..FakeTranscoder::new(120.0)
        };
        let generator = ThumbnailGenerator::new(workspaces.clone(), Arc::new(transcoder.clone()));
        let job = job(120.0);
        let workspace = workspaces.create(job.id).await.unwrap();

        let err = generator
            .generate(&job, &workspace, Path::new("original.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Failure::ExternalProcess { .. }));
        assert_eq!(transcoder.frame_count(), 5);
        assert!(storage.keys().await.is_empty());
        workspaces.cleanup(workspace).await;
    }

    #[tokio::test]
    async fn test_zero_duration_names_collide() {
        let root = tempdir().unwrap();
        let storage = MemoryStorage::new();
        let workspaces = WorkspaceManager::new(root.path(), Arc::new(storage.clone()));
        let generator =
            ThumbnailGenerator::new(workspaces.clone(), Arc::new(FakeTranscoder::new(0.0)));
        let job = job(0.0);
        let workspace = workspaces.create(job.id).await.unwrap();

        let thumbnails = generator
            .generate(&job, &workspace, Path::new("original.mp4"))
            .await
            .unwrap();
        assert_eq!(thumbnails.len(), 9);
        assert_eq!(storage.keys().await.len(), 3);
        workspaces.cleanup(workspace).await;
    }
}
