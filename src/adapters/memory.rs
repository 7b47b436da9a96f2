//! In-process adapters. Used to embed the pipeline without external services
//! and as the storage/persistence doubles in tests.

use crate::domain::video::{ProcessingStatus, Rendition, VideoJob};
use crate::error::{Failure, Result};
use crate::ports::repository::VideoRepository;
use crate::ports::storage::{SourceStream, StoragePort};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

/// Object store held in a map, keyed exactly like the durable store.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    objects: Arc<RwLock<BTreeMap<String, StoredObject>>>,
    rejected: Arc<RwLock<Vec<String>>>,
    opened: Arc<AtomicUsize>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every later write to a key containing `fragment` fail.
    pub async fn reject_writes_containing(&self, fragment: impl Into<String>) {
        self.rejected.write().await.push(fragment.into());
    }

    /// Streams handed out by `open` so far.
    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }

    pub async fn object(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().await.get(key).cloned()
    }

    async fn insert(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        let rejected = self.rejected.read().await;
        if rejected.iter().any(|fragment| key.contains(fragment.as_str())) {
            return Err(Failure::storage(format!("write rejected for {}", key)));
        }
        drop(rejected);

        self.objects.write().await.insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }
}

#[async_trait]
impl StoragePort for MemoryStorage {
    async fn put_bytes(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.insert(key, body, content_type).await
    }

    async fn put_file(&self, local_path: &Path, key: &str, content_type: &str) -> Result<()> {
        let body = tokio::fs::read(local_path).await?;
        self.insert(key, Bytes::from(body), content_type).await
    }

    async fn get_bytes(&self, key: &str) -> Result<Bytes> {
        self.objects
            .read()
            .await
            .get(key)
            .map(|object| object.body.clone())
            .ok_or_else(|| Failure::not_found("object", key))
    }

    async fn open(&self, key: &str) -> Result<SourceStream> {
        let body = self.get_bytes(key).await?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(Cursor::new(body)))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let dir = format!("{}/", prefix.trim_end_matches('/'));
        let mut objects = self.objects.write().await;
        let before = objects.len();
        objects.retain(|key, _| !key.starts_with(&dir));
        Ok(before - objects.len())
    }
}

/// Repository held in maps. Also records every status a job was saved with,
/// in order.
#[derive(Clone, Default)]
pub struct MemoryRepository {
    videos: Arc<RwLock<HashMap<Uuid, VideoJob>>>,
    renditions: Arc<RwLock<HashMap<Uuid, Vec<Rendition>>>>,
    history: Arc<RwLock<HashMap<Uuid, Vec<ProcessingStatus>>>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn status_history(&self, id: Uuid) -> Vec<ProcessingStatus> {
        self.history
            .read()
            .await
            .get(&id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl VideoRepository for MemoryRepository {
    async fn save_video(&self, video: &VideoJob) -> Result<()> {
        self.history
            .write()
            .await
            .entry(video.id)
            .or_default()
            .push(video.status);
        self.videos.write().await.insert(video.id, video.clone());
        Ok(())
    }

    async fn find_video(&self, id: Uuid) -> Result<Option<VideoJob>> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn videos_in_course(&self, course: Uuid) -> Result<Vec<VideoJob>> {
        let mut videos: Vec<VideoJob> = self
            .videos
            .read()
            .await
            .values()
            .filter(|video| video.course == course)
            .cloned()
            .collect();
        videos.sort_by_key(|video| video.position);
        Ok(videos)
    }

    async fn delete_video(&self, id: Uuid) -> Result<()> {
        self.videos.write().await.remove(&id);
        Ok(())
    }

    async fn save_rendition(&self, rendition: &Rendition) -> Result<()> {
        let mut renditions = self.renditions.write().await;
        let rows = renditions.entry(rendition.video_id).or_default();
        match rows.iter_mut().find(|row| row.id == rendition.id) {
            Some(row) => *row = rendition.clone(),
            None => rows.push(rendition.clone()),
        }
        Ok(())
    }

    async fn renditions_for(&self, video_id: Uuid) -> Result<Vec<Rendition>> {
        Ok(self
            .renditions
            .read()
            .await
            .get(&video_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn delete_renditions(&self, video_id: Uuid) -> Result<usize> {
        Ok(self
            .renditions
            .write()
            .await
            .remove(&video_id)
            .map(|rows| rows.len())
            .unwrap_or(0))
    }
}
