use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, TryStreamExt};
use std::io;
use std::path::Path;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

pub const CONTENT_TYPE_SEGMENT: &str = "video/mp2t";
pub const CONTENT_TYPE_PLAYLIST: &str = "application/vnd.apple.mpegurl";
pub const CONTENT_TYPE_JPEG: &str = "image/jpeg";
pub const CONTENT_TYPE_BINARY: &str = "application/octet-stream";

/// A byte source consumed exactly once, e.g. the uploaded original.
pub type SourceStream = Box<dyn AsyncRead + Send + Unpin>;

/// Adapts a stream of byte chunks (an HTTP body, an SDK stream) into a
/// [`SourceStream`].
pub fn source_from_stream<S, E>(stream: S) -> SourceStream
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Send + Unpin + 'static,
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let stream = stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    Box::new(StreamReader::new(stream))
}

/// Content type of an object, decided by its file extension alone.
pub fn content_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());
    match extension.as_deref() {
        Some("ts") => CONTENT_TYPE_SEGMENT,
        Some("m3u8") => CONTENT_TYPE_PLAYLIST,
        Some("jpg") | Some("jpeg") => CONTENT_TYPE_JPEG,
        _ => CONTENT_TYPE_BINARY,
    }
}

/// Durable object store keyed by `/`-separated paths.
#[async_trait]
pub trait StoragePort: Send + Sync {
    async fn put_bytes(&self, key: &str, body: Bytes, content_type: &str) -> Result<()>;

    /// Upload a file from a local path to storage
    async fn put_file(&self, local_path: &Path, key: &str, content_type: &str) -> Result<()>;

    /// Fails with `NotFound` when the key does not exist.
    async fn get_bytes(&self, key: &str) -> Result<Bytes>;

    async fn open(&self, key: &str) -> Result<SourceStream>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Removes every object under `prefix`, returning how many were removed.
    async fn delete_prefix(&self, prefix: &str) -> Result<usize>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use tokio::io::AsyncReadExt;

    #[test]
    fn test_content_type_by_extension() {
        assert_eq!(content_type_for("segment_000.ts"), CONTENT_TYPE_SEGMENT);
        assert_eq!(content_type_for("480p/playlist.m3u8"), CONTENT_TYPE_PLAYLIST);
        assert_eq!(content_type_for("12_small.jpg"), CONTENT_TYPE_JPEG);
        assert_eq!(content_type_for("original.mp4"), CONTENT_TYPE_BINARY);
        assert_eq!(content_type_for("no_extension"), CONTENT_TYPE_BINARY);
    }

    #[tokio::test]
    async fn test_source_from_stream() {
        let chunks = vec![
            Ok::<Bytes, io::Error>(Bytes::from("Hello, ")),
            Ok(Bytes::from("world!")),
        ];
        let mut source = source_from_stream(stream::iter(chunks));
        let mut content = String::new();
        source.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "Hello, world!");
    }

    #[tokio::test]
    async fn test_source_from_stream_error() {
        let chunks = vec![Err::<Bytes, _>("Test error")];
        let mut source = source_from_stream(stream::iter(chunks));
        let mut content = Vec::new();
        let err = source.read_to_end(&mut content).await.unwrap_err();
        assert_eq!(err.to_string(), "Test error");
    }
}
