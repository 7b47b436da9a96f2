use crate::error::{Failure, Result};
use crate::ports::storage::{SourceStream, StoragePort};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

/// Object store on the local filesystem: key `a/b/c.ts` lives at
/// `<root>/a/b/c.ts`. Content types are not kept.
#[derive(Clone, Debug)]
pub struct FsStorage {
    root: PathBuf,
}

impl FsStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps a key under the root, refusing keys that would leave it.
    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || key.is_empty() {
            return Err(Failure::storage(format!("invalid object key {:?}", key)));
        }
        Ok(self.root.join(relative))
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }
}

fn not_found_or_storage(err: std::io::Error, key: &str) -> Failure {
    if err.kind() == ErrorKind::NotFound {
        Failure::not_found("object", key)
    } else {
        Failure::storage(err)
    }
}

#[async_trait]
impl StoragePort for FsStorage {
    async fn put_bytes(&self, key: &str, body: Bytes, _content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        Self::ensure_parent(&path).await?;
        tokio::fs::write(&path, &body).await?;
        Ok(())
    }

    async fn put_file(&self, local_path: &Path, key: &str, _content_type: &str) -> Result<()> {
        let path = self.path_for(key)?;
        if path != local_path {
            Self::ensure_parent(&path).await?;
            tokio::fs::copy(local_path, &path).await?;
        }
        Ok(())
    }

    async fn get_bytes(&self, key: &str) -> Result<Bytes> {
        let path = self.path_for(key)?;
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| not_found_or_storage(e, key))?;
        Ok(Bytes::from(body))
    }

    async fn open(&self, key: &str) -> Result<SourceStream> {
        let path = self.path_for(key)?;
        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| not_found_or_storage(e, key))?;
        Ok(Box::new(file))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Err(e) if e.kind() != ErrorKind::NotFound => Err(Failure::storage(e)),
            _ => Ok(()),
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<usize> {
        let dir = self.path_for(prefix.trim_end_matches('/'))?;
        tokio::task::spawn_blocking(move || -> Result<usize> {
            if !dir.is_dir() {
                return Ok(0);
            }
            let count = WalkDir::new(&dir)
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .count();
            std::fs::remove_dir_all(&dir)?;
            Ok(count)
        })
        .await
        .map_err(Failure::storage)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_put_get_and_open() {
        let root = tempdir().unwrap();
        let storage = FsStorage::new(root.path());

        storage
            .put_bytes("c/v/master.m3u8", Bytes::from("#EXTM3U\n"), "application/vnd.apple.mpegurl")
            .await
            .unwrap();
        assert!(root.path().join("c/v/master.m3u8").is_file());
        assert_eq!(
            storage.get_bytes("c/v/master.m3u8").await.unwrap(),
            Bytes::from("#EXTM3U\n")
        );

        let mut reader = storage.open("c/v/master.m3u8").await.unwrap();
        let mut content = String::new();
        reader.read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "#EXTM3U\n");
    }

    #[tokio::test]
    async fn test_put_file_copies_into_key() {
        let root = tempdir().unwrap();
        let scratch = tempdir().unwrap();
        let local = scratch.path().join("segment_000.ts");
        std::fs::write(&local, b"ts").unwrap();

        let storage = FsStorage::new(root.path());
        storage
            .put_file(&local, "c/v/480p/segment_000.ts", "video/mp2t")
            .await
            .unwrap();
        assert_eq!(
            std::fs::read(root.path().join("c/v/480p/segment_000.ts")).unwrap(),
            b"ts"
        );
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let root = tempdir().unwrap();
        let storage = FsStorage::new(root.path());
        assert!(matches!(
            storage.get_bytes("c/v/nothing.ts").await,
            Err(Failure::NotFound { .. })
        ));
        assert!(matches!(
            storage.open("c/v/nothing.ts").await,
            Err(Failure::NotFound { .. })
        ));
        storage.delete("c/v/nothing.ts").await.unwrap();
    }

    #[tokio::test]
    async fn test_keys_cannot_escape_root() {
        let root = tempdir().unwrap();
        let storage = FsStorage::new(root.path().join("store"));
        for key in ["../outside.ts", "c/../../outside.ts", ""] {
            let err = storage
                .put_bytes(key, Bytes::from("x"), "video/mp2t")
                .await
                .unwrap_err();
            assert!(matches!(err, Failure::Storage { .. }), "{:?}", key);
        }
        assert!(!root.path().join("outside.ts").exists());
    }

    #[tokio::test]
    async fn test_delete_prefix_counts_files() {
        let root = tempdir().unwrap();
        let storage = FsStorage::new(root.path());
        for key in ["c/v1/master.m3u8", "c/v1/480p/segment_000.ts", "c/v1/480p/playlist.m3u8", "c/v10/x.ts"] {
            storage.put_bytes(key, Bytes::from("x"), "").await.unwrap();
        }

        assert_eq!(storage.delete_prefix("c/v1/").await.unwrap(), 3);
        assert!(!root.path().join("c/v1").exists());
        assert!(root.path().join("c/v10/x.ts").exists());
        assert_eq!(storage.delete_prefix("c/v1").await.unwrap(), 0);
    }
}
