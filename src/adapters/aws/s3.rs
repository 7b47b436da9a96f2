use crate::config::AwsConfig;
use crate::error::{Failure, Result};
use crate::ports::storage::{SourceStream, StoragePort};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use bytes::Bytes;
use std::path::Path;

/// S3Storage implements StoragePort for AWS S3.
#[derive(Clone)]
pub struct S3Storage {
    client: Client,
    bucket: String,
}

impl S3Storage {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }

    /// Client from the default AWS environment (credentials chain, region).
    pub async fn from_config(config: &AwsConfig) -> Self {
        let sdk = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(Client::new(&sdk), config.s3_bucket.clone())
    }

    async fn put(&self, key: &str, body: ByteStream, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(Failure::storage)?;
        Ok(())
    }
}

#[async_trait]
impl StoragePort for S3Storage {
    async fn put_bytes(&self, key: &str, body: Bytes, content_type: &str) -> Result<()> {
        self.put(key, ByteStream::from(body), content_type).await
    }

    async fn put_file(&self, local_path: &Path, key: &str, content_type: &str) -> Result<()> {
        let body = ByteStream::from_path(local_path)
            .await
            .map_err(Failure::storage)?;
        self.put(key, body, content_type).await
    }

    async fn get_bytes(&self, key: &str) -> Result<Bytes> {
        let resp = self.open_object(key).await?;
        let body = resp.body.collect().await.map_err(Failure::storage)?;
        Ok(body.into_bytes())
    }

    async fn open(&self, key: &str) -> Result<SourceStream> {
        let resp = self.open_object(key).await?;
        Ok(Box::new(Box::pin(resp.body.into_async_read())))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Failure::storage)?;
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let prefix = format!("{}/", prefix.trim_end_matches('/'));
        let mut deleted = 0;
        let mut token: Option<String> = None;
        loop {
            let resp = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(&prefix)
                .set_continuation_token(token.take())
                .send()
                .await
                .map_err(Failure::storage)?;

            for object in resp.contents() {
                if let Some(key) = object.key() {
                    self.delete(key).await?;
                    deleted += 1;
                }
            }

            match resp.next_continuation_token() {
                Some(next) if resp.is_truncated().unwrap_or(false) => token = Some(next.to_string()),
                _ => break,
            }
        }
        Ok(deleted)
    }
}

impl S3Storage {
    async fn open_object(
        &self,
        key: &str,
    ) -> Result<aws_sdk_s3::operation::get_object::GetObjectOutput> {
        self.client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let missing = e
                    .as_service_error()
                    .map(|service| service.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    Failure::not_found("object", key)
                } else {
                    Failure::storage(e)
                }
            })
    }
}
