//! Local ingest binary
//!
//! Registers a video file the way an upload would, processes it with the
//! local adapters and waits for the job to finish.
//!
//! Usage: `local_ingest <video file> [course id]`
//!
//! Environment Variables:
//! - REDIS_URL: Redis connection URL
//! - STORAGE_DIR: root of the filesystem object store
//! - WORKSPACE_DIR, FFMPEG_PATH, FFPROBE_PATH, MAX_CONCURRENT_VIDEOS,
//!   RENDITION_PARALLELISM, TOOL_TIMEOUT_SECS: pipeline settings

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use vodpipe::adapters::local::{FsStorage, RedisRepository};
use vodpipe::application::{IngestService, JobDispatcher, Pipeline, UploadRequest, VideoCatalog};
use vodpipe::domain::av::{FfmpegTranscoder, SystemRunner};
use vodpipe::domain::video::{ProcessingStatus, VideoJob};
use vodpipe::{telemetry, Failure, LocalConfig, PipelineConfig};

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init();

    let mut args = std::env::args().skip(1);
    let Some(file) = args.next() else {
        eprintln!("usage: local_ingest <video file> [course id]");
        return ExitCode::FAILURE;
    };
    let course = match args.next().map(|raw| Uuid::parse_str(&raw)) {
        None => Uuid::new_v4(),
        Some(Ok(course)) => course,
        Some(Err(e)) => {
            eprintln!("invalid course id: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run(Path::new(&file), course).await {
        Ok((video, ProcessingStatus::Completed)) => {
            println!("{} completed: {}", video.id, video.master_playlist_key());
            ExitCode::SUCCESS
        }
        Ok((video, status)) => {
            eprintln!("{} ended {}", video.id, status);
            ExitCode::FAILURE
        }
        Err(e) => {
            tracing::error!("ingest failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(file: &Path, course: Uuid) -> Result<(VideoJob, ProcessingStatus), Failure> {
    let config = PipelineConfig::from_env();
    let local = LocalConfig::from_env();

    // 1. Adapters (Local implementations)
    let storage = Arc::new(FsStorage::new(&local.storage_dir));
    let repository = Arc::new(RedisRepository::new(&local.redis_url)?);
    let transcoder = Arc::new(FfmpegTranscoder::new(
        SystemRunner::new(config.tool_timeout),
        &config.ffmpeg_path,
        &config.ffprobe_path,
    ));

    // 2. Application Services
    let pipeline = Pipeline::new(
        storage.clone(),
        repository.clone(),
        transcoder,
        &config.workspace_dir,
        config.rendition_parallelism,
    );
    let dispatcher = JobDispatcher::new(Arc::new(pipeline), config.max_concurrent_videos);
    let ingest = IngestService::new(storage.clone(), repository.clone(), dispatcher);
    let catalog = VideoCatalog::new(storage, repository);

    // 3. Upload
    let body = tokio::fs::read(file).await?;
    let file_name = file
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .ok_or_else(|| Failure::not_found("file", file.display()))?;
    let video = ingest
        .accept_upload(UploadRequest {
            course,
            title: file_name.clone(),
            description: String::new(),
            file_name,
            body: body.into(),
        })
        .await?;
    tracing::info!(video_id = %video.id, course = %course, "video accepted");

    // 4. Poll like a client would
    loop {
        let status = catalog.status(video.id).await?;
        if status.is_terminal() {
            return Ok((video, status));
        }
        tokio::time::sleep(POLL_INTERVAL).await;
    }
}
