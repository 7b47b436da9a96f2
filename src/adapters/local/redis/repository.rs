//! Redis VideoRepository implementation.

use super::pool::RedisRepository;
use super::{course_key, renditions_key, video_key};
use crate::domain::video::{Rendition, VideoJob};
use crate::error::{Failure, Result};
use crate::ports::repository::VideoRepository;
use async_trait::async_trait;
use deadpool_redis::redis::AsyncCommands;
use uuid::Uuid;

fn decode<T: serde::de::DeserializeOwned>(json: &str) -> Result<T> {
    serde_json::from_str(json).map_err(Failure::repository)
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Failure::repository)
}

#[async_trait]
impl VideoRepository for RedisRepository {
    async fn save_video(&self, video: &VideoJob) -> Result<()> {
        let mut conn = self.connection().await?;
        let json = encode(video)?;
        conn.set::<_, _, ()>(video_key(video.id), json)
            .await
            .map_err(Failure::repository)?;
        conn.sadd::<_, _, ()>(course_key(video.course), video.id.to_string())
            .await
            .map_err(Failure::repository)?;
        Ok(())
    }

    async fn find_video(&self, id: Uuid) -> Result<Option<VideoJob>> {
        let mut conn = self.connection().await?;
        let json: Option<String> = conn.get(video_key(id)).await.map_err(Failure::repository)?;
        json.as_deref().map(decode::<VideoJob>).transpose()
    }

    async fn videos_in_course(&self, course: Uuid) -> Result<Vec<VideoJob>> {
        let mut conn = self.connection().await?;
        let ids: Vec<String> = conn
            .smembers(course_key(course))
            .await
            .map_err(Failure::repository)?;

        let mut videos = Vec::with_capacity(ids.len());
        for id in ids {
            let json: Option<String> = conn
                .get(video_key(&id))
                .await
                .map_err(Failure::repository)?;
            if let Some(json) = json {
                videos.push(decode::<VideoJob>(&json)?);
            }
        }
        videos.sort_by_key(|video| video.position);
        Ok(videos)
    }

    async fn delete_video(&self, id: Uuid) -> Result<()> {
        let Some(video) = self.find_video(id).await? else {
            return Ok(());
        };
        let mut conn = self.connection().await?;
        conn.del::<_, ()>(video_key(id))
            .await
            .map_err(Failure::repository)?;
        conn.srem::<_, _, ()>(course_key(video.course), id.to_string())
            .await
            .map_err(Failure::repository)?;
        Ok(())
    }

    async fn save_rendition(&self, rendition: &Rendition) -> Result<()> {
        let mut conn = self.connection().await?;
        let json = encode(rendition)?;
        conn.rpush::<_, _, ()>(renditions_key(rendition.video_id), json)
            .await
            .map_err(Failure::repository)?;
        Ok(())
    }

    async fn renditions_for(&self, video_id: Uuid) -> Result<Vec<Rendition>> {
        let mut conn = self.connection().await?;
        let rows: Vec<String> = conn
            .lrange(renditions_key(video_id), 0, -1)
            .await
            .map_err(Failure::repository)?;
        rows.iter().map(|json| decode(json)).collect()
    }

    async fn delete_renditions(&self, video_id: Uuid) -> Result<usize> {
        let mut conn = self.connection().await?;
        let key = renditions_key(video_id);
        let count: usize = conn.llen(&key).await.map_err(Failure::repository)?;
        conn.del::<_, ()>(&key).await.map_err(Failure::repository)?;
        Ok(count)
    }
}
