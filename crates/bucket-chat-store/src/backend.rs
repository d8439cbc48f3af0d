//! Backend trait: the raw object interface every storage family implements.
//!
//! Keys are `/`-separated strings relative to the backend's root. Callers
//! never branch on the concrete backend; the [`Storage`](crate::Storage)
//! handle holds an `Arc<dyn Backend>`.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::uri::BackendKind;

/// Size and modification time of a stored object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
}

/// Async interface over one storage family.
///
/// # Semantics
///
/// - `get`, `head` and `delete` treat a missing object as `None`/`false`,
///   never as an error.
/// - `put` replaces the whole object.
/// - `put_if_absent` never overwrites; it reports whether it wrote.
#[async_trait]
pub trait Backend: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Identity
    // ─────────────────────────────────────────────────────────────────────────

    /// Which backend family this is.
    fn kind(&self) -> BackendKind;

    /// Human-readable base location (path or bucket URI).
    fn location(&self) -> String;

    // ─────────────────────────────────────────────────────────────────────────
    // Objects
    // ─────────────────────────────────────────────────────────────────────────

    /// Write an object, replacing any existing one.
    async fn put(&self, key: &str, data: Bytes) -> Result<()>;

    /// Write an object only if none exists. Returns whether it was written.
    async fn put_if_absent(&self, key: &str, data: Bytes) -> Result<bool>;

    /// Read an object.
    async fn get(&self, key: &str) -> Result<Option<Bytes>>;

    /// Object metadata.
    async fn head(&self, key: &str) -> Result<Option<ObjectInfo>>;

    /// Delete an object. Returns whether it existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    /// All object keys under `prefix`, recursively, in no particular order.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Structure
    // ─────────────────────────────────────────────────────────────────────────

    /// Materialize a directory-like prefix.
    ///
    /// Object stores have no directories, so the default does nothing.
    async fn create_prefix(&self, _prefix: &str) -> Result<()> {
        Ok(())
    }
}
