//! Object-store backend: S3, GCS, Azure Blob and in-memory.
//!
//! Credentials and endpoints come from the environment, as the cloud
//! builders read them (`AWS_*`, `GOOGLE_*`, `AZURE_*`).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::TryStreamExt;
use object_store::aws::AmazonS3Builder;
use object_store::azure::MicrosoftAzureBuilder;
use object_store::gcp::GoogleCloudStorageBuilder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::{ObjectMeta, ObjectStore, PutMode, PutOptions, PutPayload};
use tracing::{debug, info, warn};

use crate::backend::{Backend, ObjectInfo};
use crate::error::Result;
use crate::layout::check_key;
use crate::uri::BackendKind;

/// A backend over any [`ObjectStore`], rooted at a key prefix.
#[derive(Debug, Clone)]
pub struct ObjectBackend {
    store: Arc<dyn ObjectStore>,
    kind: BackendKind,
    location: String,
    base: ObjectPath,
}

impl ObjectBackend {
    /// Wrap an existing object store.
    pub fn new(store: Arc<dyn ObjectStore>, kind: BackendKind, location: &str, prefix: &str) -> Self {
        Self {
            store,
            kind,
            location: location.to_string(),
            base: ObjectPath::from(prefix),
        }
    }

    /// Amazon S3 bucket.
    pub fn s3(bucket: &str, prefix: &str) -> Result<Self> {
        let store = AmazonS3Builder::from_env().with_bucket_name(bucket).build()?;
        info!(bucket, prefix, "S3 storage initialized");
        Ok(Self::new(Arc::new(store), BackendKind::S3, &format!("s3://{bucket}"), prefix))
    }

    /// Google Cloud Storage bucket.
    pub fn gcs(bucket: &str, prefix: &str) -> Result<Self> {
        let store = GoogleCloudStorageBuilder::from_env()
            .with_bucket_name(bucket)
            .build()?;
        info!(bucket, prefix, "GCS storage initialized");
        Ok(Self::new(Arc::new(store), BackendKind::Gcs, &format!("gs://{bucket}"), prefix))
    }

    /// Azure Blob Storage container.
    pub fn azure(container: &str, prefix: &str) -> Result<Self> {
        let store = MicrosoftAzureBuilder::from_env()
            .with_container_name(container)
            .build()?;
        info!(container, prefix, "Azure storage initialized");
        Ok(Self::new(Arc::new(store), BackendKind::Azure, &format!("az://{container}"), prefix))
    }

    /// A fresh, empty in-memory store.
    pub fn memory() -> Self {
        Self::new(Arc::new(InMemory::new()), BackendKind::Memory, "memory://", "")
    }

    fn path_for(&self, key: &str) -> Result<ObjectPath> {
        let key = key.trim_end_matches('/');
        if key.is_empty() {
            return Ok(self.base.clone());
        }
        check_key(key)?;
        Ok(self.base.parts().chain(ObjectPath::from(key).parts()).collect())
    }

    fn relative_key(&self, location: &ObjectPath) -> Option<String> {
        let parts = location.prefix_match(&self.base)?;
        let parts: Vec<String> = parts.map(|p| p.as_ref().to_string()).collect();
        Some(parts.join("/"))
    }

    fn info_of(key: &str, meta: ObjectMeta) -> ObjectInfo {
        ObjectInfo {
            key: key.to_string(),
            size: meta.size as u64,
            modified: Some(meta.last_modified),
        }
    }
}

fn is_not_found(e: &object_store::Error) -> bool {
    matches!(e, object_store::Error::NotFound { .. })
}

#[async_trait]
impl Backend for ObjectBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    fn location(&self) -> String {
        if self.base.as_ref().is_empty() {
            self.location.clone()
        } else {
            format!("{}/{}", self.location.trim_end_matches('/'), self.base)
        }
    }

    async fn put(&self, key: &str, data: Bytes) -> Result<()> {
        let path = self.path_for(key)?;
        let size = data.len();
        self.store.put(&path, PutPayload::from(data)).await?;
        debug!(key, size, "wrote object");
        Ok(())
    }

    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<bool> {
        let path = self.path_for(key)?;
        let opts = PutOptions::from(PutMode::Create);
        match self.store.put_opts(&path, PutPayload::from(data.clone()), opts).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::AlreadyExists { .. }) => Ok(false),
            Err(object_store::Error::NotImplemented) => {
                // No conditional writes on this store: check, then write.
                warn!(key, backend = %self.kind, "conditional put unsupported, falling back to head+put");
                match self.store.head(&path).await {
                    Ok(_) => Ok(false),
                    Err(e) if is_not_found(&e) => {
                        self.store.put(&path, PutPayload::from(data)).await?;
                        Ok(true)
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn get(&self, key: &str) -> Result<Option<Bytes>> {
        let path = self.path_for(key)?;
        let result = match self.store.get(&path).await {
            Ok(result) => result,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(result.bytes().await?))
    }

    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>> {
        let path = self.path_for(key)?;
        match self.store.head(&path).await {
            Ok(meta) => Ok(Some(Self::info_of(key, meta))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        if self.head(key).await?.is_none() {
            return Ok(false);
        }
        let path = self.path_for(key)?;
        match self.store.delete(&path).await {
            Ok(()) => Ok(true),
            Err(e) if is_not_found(&e) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let path = self.path_for(prefix)?;
        let metas: Vec<ObjectMeta> = self.store.list(Some(&path)).try_collect().await?;
        Ok(metas
            .iter()
            .filter_map(|meta| self.relative_key(&meta.location))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_put_get() {
        let backend = ObjectBackend::memory();
        backend.put("a/b.txt", Bytes::from_static(b"hi")).await.unwrap();
        assert_eq!(backend.get("a/b.txt").await.unwrap().unwrap().as_ref(), b"hi");
        assert!(backend.get("a/c.txt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_memory_put_if_absent() {
        let backend = ObjectBackend::memory();
        assert!(backend.put_if_absent("k", Bytes::from_static(b"1")).await.unwrap());
        assert!(!backend.put_if_absent("k", Bytes::from_static(b"2")).await.unwrap());
        assert_eq!(backend.get("k").await.unwrap().unwrap().as_ref(), b"1");
    }

    #[tokio::test]
    async fn test_prefix_is_transparent() {
        let shared: Arc<dyn ObjectStore> = Arc::new(InMemory::new());
        let scoped = ObjectBackend::new(shared.clone(), BackendKind::Memory, "memory://", "team/chat");
        scoped.put("rooms/x/metadata.json", Bytes::from_static(b"{}")).await.unwrap();

        let raw = shared
            .head(&ObjectPath::from("team/chat/rooms/x/metadata.json"))
            .await
            .unwrap();
        assert_eq!(raw.size, 2);

        let keys = scoped.list("rooms").await.unwrap();
        assert_eq!(keys, vec!["rooms/x/metadata.json".to_string()]);
        assert_eq!(scoped.location(), "memory://team/chat");
    }

    #[tokio::test]
    async fn test_head_and_delete() {
        let backend = ObjectBackend::memory();
        backend.put("x", Bytes::from_static(b"123")).await.unwrap();
        assert_eq!(backend.head("x").await.unwrap().unwrap().size, 3);
        assert!(backend.delete("x").await.unwrap());
        assert!(!backend.delete("x").await.unwrap());
        assert!(backend.head("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_missing_prefix_is_empty() {
        let backend = ObjectBackend::memory();
        assert!(backend.list("rooms/none").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_traversal_rejected() {
        let backend = ObjectBackend::memory();
        assert!(backend.put("../x", Bytes::new()).await.is_err());
    }
}
