//! Local filesystem backend.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::backend::{Backend, ObjectInfo};
use crate::error::{Result, StoreError};
use crate::layout::check_key;
use crate::uri::BackendKind;

/// Stores objects as files under a root directory.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
}

impl LocalBackend {
    /// Open a root directory, creating it if needed.
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;
        info!(path = %root.display(), "local storage initialized");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a path that cannot leave the root.
    fn resolve(&self, key: &str) -> Result<PathBuf> {
        if key.is_empty() {
            return Ok(self.root.clone());
        }
        check_key(key)?;
        let mut resolved = self.root.clone();
        for component in Path::new(key).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                _ => return Err(StoreError::InvalidPath(key.to_string())),
            }
        }
        Ok(resolved)
    }

    async fn ensure_parent(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    fn key_of(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let parts: Option<Vec<&str>> = relative.components().map(|c| c.as_os_str().to_str()).collect();
        Some(parts?.join("/"))
    }
}

#[async_trait]
impl Backend for LocalBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.resolve(key)?;
        Self::ensure_parent(&path).await?;
        fs::write(&path, &data).await?;
        debug!(key, size = data.len(), "wrote file");
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<bool> {
        let path = self.resolve(key)?;
        Self::ensure_parent(&path).await?;
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        file.write_all(&data).await?;
        file.flush().await?;
        debug!(key, size = data.len(), "created file");
        Ok(true)
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.resolve(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(Some(Bytes::from(data))),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        let path = self.resolve(key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(ObjectInfo {
                key: key.to_string(),
                size: meta.len(),
                modified: meta.modified().ok().map(DateTime::<Utc>::from),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let path = self.resolve(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let start = self.resolve(prefix.trim_end_matches('/'))?;
        let mut keys = Vec::new();
        let mut pending = vec![start];

        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(e.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                let path = entry.path();
                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() {
                    if let Some(key) = self.key_of(&path) {
                        keys.push(key);
                    }
                }
            }
        }
        Ok(keys)
    }

    async fn create_prefix(&self, prefix: &str) -> Result<()> {
        let path = self.resolve(prefix)?;
        fs::create_dir_all(&path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn test_backend() -> (LocalBackend, TempDir) {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path().join("data")).await.unwrap();
        (backend, dir)
    }

    #[tokio::test]
    async fn test_put_and_get() {
        let (backend, _dir) = test_backend().await;
        backend.put("a/b/c.txt", Bytes::from_static(b"hello")).await.unwrap();

        let data = backend.get("a/b/c.txt").await.unwrap().unwrap();
        assert_eq!(data.as_ref(), b"hello");
        assert!(backend.get("a/b/missing.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_if_absent() {
        let (backend, _dir) = test_backend().await;
        assert!(backend.put_if_absent("m.json", Bytes::from_static(b"1")).await.unwrap());
        assert!(!backend.put_if_absent("m.json", Bytes::from_static(b"2")).await.unwrap());
        assert_eq!(backend.get("m.json").await.unwrap().unwrap().as_ref(), b"1");
    }

    #[tokio::test]
    async fn test_head_and_delete() {
        let (backend, _dir) = test_backend().await;
        backend.put("x/y.txt", Bytes::from_static(b"12345")).await.unwrap();

        let info = backend.head("x/y.txt").await.unwrap().unwrap();
        assert_eq!(info.size, 5);
        assert!(info.modified.is_some());
        assert!(backend.head("x").await.unwrap().is_none());

        assert!(backend.delete("x/y.txt").await.unwrap());
        assert!(!backend.delete("x/y.txt").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_recursive() {
        let (backend, _dir) = test_backend().await;
        backend.put("r/logs/d1/a.jsonl", Bytes::new()).await.unwrap();
        backend.put("r/logs/d2/b.jsonl", Bytes::new()).await.unwrap();
        backend.put("r/meta.json", Bytes::new()).await.unwrap();

        let mut keys = backend.list("r/logs").await.unwrap();
        keys.sort();
        assert_eq!(keys, vec!["r/logs/d1/a.jsonl", "r/logs/d2/b.jsonl"]);
        assert!(backend.list("nothing/here").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let (backend, _dir) = test_backend().await;
        let err = backend.put("../escape.txt", Bytes::new()).await.unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath(_)));
        assert!(backend.get("a/../../b").await.is_err());
    }

    #[tokio::test]
    async fn test_create_prefix_makes_dirs() {
        let (backend, _dir) = test_backend().await;
        backend.create_prefix("rooms/lobby/logs").await.unwrap();
        assert!(backend.root().join("rooms/lobby/logs").is_dir());
    }
}
