//! Per-job scratch directories and the moves between them and durable storage.

use crate::error::{Failure, Result};
use crate::ports::storage::{content_type_for, SourceStream, StoragePort};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::io::{AsyncWriteExt, BufWriter};
use uuid::Uuid;
use walkdir::WalkDir;

const HLS_DIR: &str = "hls";
const THUMBNAILS_DIR: &str = "thumbnails";

/// An isolated directory owned by one job run. Removed by
/// [`WorkspaceManager::cleanup`], or on drop as a last resort.
#[derive(Debug)]
pub struct Workspace {
    job_id: Uuid,
    dir: TempDir,
}

impl Workspace {
    pub fn job_id(&self) -> Uuid {
        self.job_id
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Output directory of one quality, `hls/<quality>`.
    pub fn rendition_dir(&self, quality: &str) -> PathBuf {
        self.dir.path().join(HLS_DIR).join(quality)
    }

    pub fn thumbnails_dir(&self) -> PathBuf {
        self.dir.path().join(THUMBNAILS_DIR)
    }

    pub fn source_path(&self, extension: &str) -> PathBuf {
        self.dir.path().join(format!("original.{}", extension))
    }
}

/// Outcome of a best-effort upload fan-out.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PublishReport {
    pub uploaded: Vec<String>,
    pub failed: Vec<String>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn total(&self) -> usize {
        self.uploaded.len() + self.failed.len()
    }

    /// The uploaded keys, or `Failure::Publish` if any file failed.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_success() {
            Ok(self.uploaded)
        } else {
            Err(Failure::Publish {
                failed: self.failed.len(),
                total: self.total(),
            })
        }
    }
}

pub struct WorkspaceManager<S> {
    root: PathBuf,
    storage: Arc<S>,
}

impl<S> Clone for WorkspaceManager<S> {
    fn clone(&self) -> Self {
        Self {
            root: self.root.clone(),
            storage: self.storage.clone(),
        }
    }
}

impl<S: StoragePort> WorkspaceManager<S> {
    pub fn new(root: impl Into<PathBuf>, storage: Arc<S>) -> Self {
        Self {
            root: root.into(),
            storage,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn storage(&self) -> &Arc<S> {
        &self.storage
    }

    /// Allocates a fresh, empty `video_processing_<id>_<random>` directory.
    pub async fn create(&self, job_id: Uuid) -> Result<Workspace> {
        tokio::fs::create_dir_all(&self.root).await?;
        let dir = tempfile::Builder::new()
            .prefix(&format!("video_processing_{}_", job_id))
            .tempdir_in(&self.root)
            .map_err(|e| Failure::storage(format!("cannot create workspace: {}", e)))?;

        tracing::debug!(video_id = %job_id, dir = %dir.path().display(), "workspace created");
        Ok(Workspace { job_id, dir })
    }

    /// Copies the whole source into the workspace, consuming the stream.
    pub async fn materialize_source(
        &self,
        workspace: &Workspace,
        extension: &str,
        mut source: SourceStream,
    ) -> Result<PathBuf> {
        let path = workspace.source_path(extension);
        let file = tokio::fs::File::create(&path).await?;
        let mut writer = BufWriter::new(file);
        let copied = tokio::io::copy(&mut source, &mut writer).await?;
        writer.flush().await?;

        tracing::info!(video_id = %workspace.job_id, bytes = copied, "source materialized");
        Ok(path)
    }

    /// Uploads every regular file under `local` (or `local` itself when it is
    /// a file) to `<remote_prefix>/<relative path>`. A failed upload is logged
    /// and the walk continues.
    pub async fn publish(&self, local: &Path, remote_prefix: &str) -> Result<PublishReport> {
        let files = collect_files(local.to_path_buf()).await?;
        let prefix = remote_prefix.trim_end_matches('/');

        let mut report = PublishReport::default();
        for (path, relative) in files {
            let key = format!("{}/{}", prefix, relative);
            let content_type = content_type_for(&relative);
            match self.storage.put_file(&path, &key, content_type).await {
                Ok(()) => report.uploaded.push(key),
                Err(e) => {
                    tracing::error!(key = %key, "upload failed: {}", e);
                    report.failed.push(key);
                }
            }
        }

        tracing::debug!(
            prefix = %prefix,
            uploaded = report.uploaded.len(),
            failed = report.failed.len(),
            "publish finished"
        );
        Ok(report)
    }

    /// Removes the workspace. Never fails; problems are only logged.
    pub async fn cleanup(&self, workspace: Workspace) {
        let job_id = workspace.job_id;
        let path = workspace.path().to_path_buf();
        match tokio::task::spawn_blocking(move || workspace.dir.close()).await {
            Ok(Ok(())) => {
                tracing::debug!(video_id = %job_id, "workspace removed");
            }
            Ok(Err(e)) => {
                tracing::warn!(video_id = %job_id, dir = %path.display(), "failed to remove workspace: {}", e);
            }
            Err(e) => {
                tracing::warn!(video_id = %job_id, dir = %path.display(), "workspace cleanup task failed: {}", e);
            }
        }
    }
}

/// Regular files under `root` paired with their `/`-joined relative path.
async fn collect_files(root: PathBuf) -> Result<Vec<(PathBuf, String)>> {
    tokio::task::spawn_blocking(move || -> Result<Vec<(PathBuf, String)>> {
        let metadata = std::fs::metadata(&root)?;
        if metadata.is_file() {
            let name = root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            return Ok(vec![(root, name)]);
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(Failure::storage)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(&root)
                .map_err(Failure::storage)?
                .components()
                .map(|c| c.as_os_str().to_string_lossy().into_owned())
                .collect::<Vec<_>>()
                .join("/");
            files.push((entry.into_path(), relative));
        }
        Ok(files)
    })
    .await
    .map_err(Failure::storage)?
}
