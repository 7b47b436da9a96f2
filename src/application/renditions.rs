//! Encodes the quality ladder, publishes each rendition and writes the master
//! playlist.

use super::workspace::{Workspace, WorkspaceManager};
use crate::domain::av::Transcoder;
use crate::domain::hls::{MasterPlaylist, PLAYLIST_NAME};
use crate::domain::ladder::LADDER;
use crate::domain::video::{Rendition, VideoJob};
use crate::error::{Failure, Result};
use crate::ports::repository::VideoRepository;
use crate::ports::storage::{StoragePort, CONTENT_TYPE_PLAYLIST};
use bytes::Bytes;
use futures::{stream, StreamExt};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

pub struct RenditionManager<S, R, T> {
    workspaces: WorkspaceManager<S>,
    repository: Arc<R>,
    transcoder: Arc<T>,
    parallelism: usize,
}

impl<S, R, T> RenditionManager<S, R, T>
where
    S: StoragePort,
    R: VideoRepository,
    T: Transcoder,
{
    /// `parallelism` bounds how many qualities of one job encode at once;
    /// 1 encodes the ladder strictly in sequence.
    pub fn new(
        workspaces: WorkspaceManager<S>,
        repository: Arc<R>,
        transcoder: Arc<T>,
        parallelism: usize,
    ) -> Self {
        Self {
            workspaces,
            repository,
            transcoder,
            parallelism: parallelism.max(1),
        }
    }

    /// Runs the whole ladder for `job`. Results are consumed in ladder order,
    /// so the first failing quality stops the phase before it or any later
    /// quality is published or recorded. The master playlist is only written
    /// once every quality has been recorded.
    pub async fn process(
        &self,
        job: &VideoJob,
        workspace: &Workspace,
        source: &Path,
    ) -> Result<Vec<Rendition>> {
        let encodes = stream::iter(LADDER.iter().copied())
            .map(|quality| {
                let dir = workspace.rendition_dir(quality.name);
                async move {
                    tokio::fs::create_dir_all(&dir).await?;
                    let info = self
                        .transcoder
                        .encode_rendition(source, &dir, &quality)
                        .await?;
                    Ok::<_, Failure>((quality, dir, info))
                }
            })
            .buffered(self.parallelism);
        futures::pin_mut!(encodes);

        let mut renditions = Vec::with_capacity(LADDER.len());
        while let Some(encoded) = encodes.next().await {
            let (quality, dir, info) = encoded.inspect_err(|e| {
                tracing::error!(video_id = %job.id, "rendition encode failed: {}", e);
            })?;

            let prefix = format!("{}/{}", job.path, quality.name);
            self.workspaces.publish(&dir, &prefix).await?.into_result()?;

            let rendition = Rendition {
                id: Uuid::new_v4(),
                video_id: job.id,
                name: quality.name.to_string(),
                resolution: quality.resolution(),
                bitrate: quality.bitrate,
                playlist_path: format!("{}/{}", prefix, PLAYLIST_NAME),
                segment_count: info.segment_count,
                avg_segment_duration: info.avg_segment_duration,
            };
            self.repository.save_rendition(&rendition).await?;
            tracing::info!(
                video_id = %job.id,
                quality = quality.name,
                segments = info.segment_count,
                "rendition ready"
            );
            renditions.push(rendition);
        }

        let master = MasterPlaylist::from_qualities(LADDER.iter()).render();
        self.workspaces
            .storage()
            .put_bytes(
                &job.master_playlist_key(),
                Bytes::from(master),
                CONTENT_TYPE_PLAYLIST,
            )
            .await?;

        Ok(renditions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::{MemoryRepository, MemoryStorage};
    use crate::domain::av::transcoder::MockTranscoder;
    use crate::domain::av::SegmentInfo;
    use crate::domain::ladder::QualityConfig;
    use crate::testing::{write_rendition, FakeTranscoder};
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::time::Duration;
    use tempfile::tempdir;

    struct Harness {
        storage: MemoryStorage,
        repository: MemoryRepository,
        workspaces: WorkspaceManager<MemoryStorage>,
        job: VideoJob,
        _root: tempfile::TempDir,
    }

    fn harness() -> Harness {
        let root = tempdir().unwrap();
        let storage = MemoryStorage::new();
        Harness {
            workspaces: WorkspaceManager::new(root.path(), Arc::new(storage.clone())),
            storage,
            repository: MemoryRepository::new(),
            job: VideoJob::new(Uuid::new_v4(), "Lesson", "", "lesson.mp4", 10, 0),
            _root: root,
        }
    }

    impl Harness {
        fn manager<T: Transcoder>(
            &self,
            transcoder: T,
            parallelism: usize,
        ) -> RenditionManager<MemoryStorage, MemoryRepository, T> {
            RenditionManager::new(
                self.workspaces.clone(),
                Arc::new(self.repository.clone()),
                Arc::new(transcoder),
                parallelism,
            )
        }
    }

    #[tokio::test]
    async fn test_full_ladder_publishes_and_records_in_order() {
        let h = harness();
        let mut transcoder = MockTranscoder::new();
        transcoder
            .expect_encode_rendition()
            .times(3)
            .returning(|_, dir, _| {
                write_rendition(dir, 20);
                Ok(SegmentInfo {
                    segment_count: 20,
                    avg_segment_duration: 6.0,
                })
            });
        let manager = h.manager(transcoder, 1);
        let workspace = h.workspaces.create(h.job.id).await.unwrap();

        let renditions = manager
            .process(&h.job, &workspace, Path::new("original.mp4"))
            .await
            .unwrap();

        let names: Vec<_> = renditions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["480p", "720p", "1080p"]);
        assert_eq!(h.repository.renditions_for(h.job.id).await.unwrap(), renditions);

        let first = &renditions[0];
        assert_eq!(first.resolution, "854x480");
        assert_eq!(first.bitrate, 800_000);
        assert_eq!(first.segment_count, 20);
        assert_eq!(first.avg_segment_duration, 6.0);
        assert_eq!(first.playlist_path, format!("{}/480p/playlist.m3u8", h.job.path));

        // 20 segments plus one playlist per quality, plus the master.
        assert_eq!(h.storage.keys().await.len(), 3 * 21 + 1);
        let segment = h
            .storage
            .object(&format!("{}/1080p/segment_019.ts", h.job.path))
            .await
            .unwrap();
        assert_eq!(segment.content_type, "video/mp2t");

        let master = h.storage.object(&h.job.master_playlist_key()).await.unwrap();
        assert_eq!(master.content_type, "application/vnd.apple.mpegurl");
        let master = String::from_utf8(master.body.to_vec()).unwrap();
        let bandwidths: Vec<_> = master
            .lines()
            .filter(|l| l.starts_with("#EXT-X-STREAM-INF"))
            .collect();
        assert_eq!(
            bandwidths,
            vec![
                "#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=854x480",
                "#EXT-X-STREAM-INF:BANDWIDTH=1400000,RESOLUTION=1280x720",
                "#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1920x1080",
            ]
        );
        h.workspaces.cleanup(workspace).await;
    }

    #[tokio::test]
    async fn test_second_quality_failure_keeps_first_and_stops() {
        let h = harness();
        let transcoder = FakeTranscoder {
            fail_quality: Some("720p"),
            ..FakeTranscoder::new(120.0)
        };
        let manager = h.manager(transcoder.clone(), 1);
        let workspace = h.workspaces.create(h.job.id).await.unwrap();

        let err = manager
            .process(&h.job, &workspace, Path::new("original.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Failure::ExternalProcess { exit_code: Some(1), .. }));

        assert_eq!(transcoder.encoded(), vec!["480p", "720p"]);
        let rows = h.repository.renditions_for(h.job.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "480p");

        let keys = h.storage.keys().await;
        assert!(keys.iter().all(|k| k.contains("/480p/")));
        assert!(h.storage.object(&h.job.master_playlist_key()).await.is_none());
        h.workspaces.cleanup(workspace).await;
    }

    #[tokio::test]
    async fn test_publish_failure_fails_phase_without_record() {
        let h = harness();
        h.storage.reject_writes_containing("/720p/segment_003").await;
        let manager = h.manager(FakeTranscoder::new(120.0), 1);
        let workspace = h.workspaces.create(h.job.id).await.unwrap();

        let err = manager
            .process(&h.job, &workspace, Path::new("original.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, Failure::Publish { failed: 1, total: 21 }));

        let rows = h.repository.renditions_for(h.job.id).await.unwrap();
        let names: Vec<_> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["480p"]);
        h.workspaces.cleanup(workspace).await;
    }

    /// Finishes the higher qualities first.
    struct ReversedTranscoder;

    #[async_trait]
    impl Transcoder for ReversedTranscoder {
        async fn probe_duration(&self, _source: &Path) -> Result<f64> {
            Ok(120.0)
        }

        async fn encode_rendition(
            &self,
            _source: &Path,
            output_dir: &Path,
            quality: &QualityConfig,
        ) -> Result<SegmentInfo> {
            let delay = match quality.name {
                "480p" => 60,
                "720p" => 30,
                _ => 0,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            write_rendition(output_dir, 2);
            Ok(SegmentInfo {
                segment_count: 2,
                avg_segment_duration: 6.0,
            })
        }

        async fn extract_frame(
            &self,
            _source: &Path,
            _timestamp: f64,
            _width: u32,
            _height: u32,
            output: &Path,
        ) -> Result<PathBuf> {
            Ok(output.to_path_buf())
        }
    }

    #[tokio::test]
    async fn test_parallel_encodes_keep_ladder_order() {
        let h = harness();
        let manager = h.manager(ReversedTranscoder, 3);
        let workspace = h.workspaces.create(h.job.id).await.unwrap();

        let renditions = manager
            .process(&h.job, &workspace, Path::new("original.mp4"))
            .await
            .unwrap();
        let names: Vec<_> = renditions.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["480p", "720p", "1080p"]);

        let master = h.storage.get_bytes(&h.job.master_playlist_key()).await.unwrap();
        let master = String::from_utf8(master.to_vec()).unwrap();
        let uris: Vec<_> = master.lines().filter(|l| l.ends_with(".m3u8")).collect();
        assert_eq!(
            uris,
            vec!["480p/playlist.m3u8", "720p/playlist.m3u8", "1080p/playlist.m3u8"]
        );
        h.workspaces.cleanup(workspace).await;
    }
}
