//! Storage: the room-aware handle the rest of the system talks to.
//!
//! Wraps one [`Backend`] and speaks in rooms, segments and metadata. Every
//! operation behaves the same whichever backend is underneath.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::backend::{Backend, ObjectInfo};
use crate::error::{Result, StoreError};
use crate::layout::{self, SegmentPath};
use crate::local::LocalBackend;
use crate::object::ObjectBackend;
use crate::uri::{BackendKind, StorageUri};

/// One stored line of a segment; `Err` when its bytes are not valid UTF-8.
pub type SegmentLine = std::result::Result<String, std::str::Utf8Error>;

/// Metadata `version` written for new rooms.
pub const METADATA_VERSION: &str = "1.0";

/// Metadata `protocol` written for new rooms.
pub const PROTOCOL: &str = "bucket-chat-v1";

/// Contents of `rooms/<room_id>/metadata.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomMetadata {
    pub room_id: String,
    pub created_at: DateTime<Utc>,
    pub version: String,
    pub protocol: String,

    /// Any further keys, preserved across updates.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl RoomMetadata {
    /// Fresh metadata for a room created now.
    pub fn new(room_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            created_at: Utc::now(),
            version: METADATA_VERSION.to_string(),
            protocol: PROTOCOL.to_string(),
            extra: Map::new(),
        }
    }
}

/// Where a storage handle points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub backend: BackendKind,
    pub location: String,
    pub is_cloud: bool,
}

/// Handle over one storage backend.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct Storage {
    backend: Arc<dyn Backend>,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("backend", &self.backend.kind())
            .field("location", &self.backend.location())
            .finish()
    }
}

impl Storage {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    /// Open storage by URI: a path, `file://`, `s3://`, `gs://`, `az://` or
    /// `memory://`.
    pub async fn open(uri: &str) -> Result<Self> {
        let backend: Arc<dyn Backend> = match StorageUri::parse(uri)? {
            StorageUri::Local(path) => Arc::new(LocalBackend::new(path).await?),
            StorageUri::Cloud {
                kind,
                bucket,
                prefix,
            } => Arc::new(match kind {
                BackendKind::S3 => ObjectBackend::s3(&bucket, &prefix)?,
                BackendKind::Gcs => ObjectBackend::gcs(&bucket, &prefix)?,
                _ => ObjectBackend::azure(&bucket, &prefix)?,
            }),
            StorageUri::Memory => Arc::new(ObjectBackend::memory()),
        };
        Ok(Self::new(backend))
    }

    /// A fresh in-memory storage.
    pub fn memory() -> Self {
        Self::new(Arc::new(ObjectBackend::memory()))
    }

    /// Backend kind and base location.
    pub fn info(&self) -> StorageInfo {
        let backend = self.backend.kind();
        StorageInfo {
            backend,
            location: self.backend.location(),
            is_cloud: backend.is_cloud(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Rooms
    // ─────────────────────────────────────────────────────────────────────────

    /// Create the room's structure and metadata if missing.
    ///
    /// Safe to call concurrently: metadata is written create-only, so an
    /// existing file is never replaced. Returns whether this call created it.
    pub async fn ensure_room(&self, room_id: &str) -> Result<bool> {
        let metadata_key = layout::metadata_key(room_id)?;
        self.backend.create_prefix(&layout::logs_prefix(room_id)?).await?;

        let body = serde_json::to_vec_pretty(&RoomMetadata::new(room_id))?;
        let created = self
            .backend
            .put_if_absent(&metadata_key, Bytes::from(body))
            .await?;
        if created {
            info!(room_id, backend = %self.backend.kind(), "created room");
        } else {
            debug!(room_id, "room already exists");
        }
        Ok(created)
    }

    /// The room's metadata, if the room exists.
    pub async fn room_metadata(&self, room_id: &str) -> Result<Option<RoomMetadata>> {
        self.read_json(&layout::metadata_key(room_id)?).await
    }

    /// Merge extra keys into the room's metadata.
    ///
    /// The core fields (`room_id`, `created_at`, `version`, `protocol`) are
    /// kept; updates to them are ignored. Creates the room if needed.
    pub async fn update_room_metadata(
        &self,
        room_id: &str,
        updates: Map<String, Value>,
    ) -> Result<RoomMetadata> {
        self.ensure_room(room_id).await?;
        let key = layout::metadata_key(room_id)?;
        let mut metadata = self
            .read_json::<RoomMetadata>(&key)
            .await?
            .unwrap_or_else(|| RoomMetadata::new(room_id));
        for (k, v) in updates {
            if !matches!(k.as_str(), "room_id" | "created_at" | "version" | "protocol") {
                metadata.extra.insert(k, v);
            }
        }
        self.write_json(&key, &metadata).await?;
        Ok(metadata)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Segments
    // ─────────────────────────────────────────────────────────────────────────

    /// Address a segment for `sender_id` covering `[start_ms, end_ms]`.
    pub fn segment_path(
        &self,
        room_id: &str,
        start_ms: i64,
        end_ms: i64,
        sender_id: &str,
    ) -> Result<SegmentPath> {
        SegmentPath::new(room_id, start_ms, end_ms, &layout::writer_token(sender_id))
    }

    /// Write a whole segment, replacing any existing file.
    pub async fn write_segment(&self, path: &SegmentPath, lines: &[String]) -> Result<()> {
        let key = path.key();
        self.backend.put(&key, join_lines(lines)).await?;
        debug!(key = %key, lines = lines.len(), "wrote segment");
        Ok(())
    }

    /// Write a segment only if no file exists at its path.
    pub async fn create_segment(&self, path: &SegmentPath, lines: &[String]) -> Result<()> {
        let key = path.key();
        if !self.backend.put_if_absent(&key, join_lines(lines)).await? {
            return Err(StoreError::AlreadyExists(key));
        }
        debug!(key = %key, lines = lines.len(), "created segment");
        Ok(())
    }

    /// Read a segment's lines. A missing segment reads as empty.
    ///
    /// Blank lines are kept so line numbers match the file. Each line is
    /// decoded on its own: one with invalid UTF-8 comes back as an `Err`
    /// entry, never as replacement characters.
    pub async fn read_segment(&self, path: &SegmentPath) -> Result<Vec<SegmentLine>> {
        let key = path.key();
        let Some(data) = self.backend.get(&key).await? else {
            debug!(key = %key, "segment missing, reading as empty");
            return Ok(Vec::new());
        };
        let lines = decode_lines(&data);
        let invalid = lines.iter().filter(|l| l.is_err()).count();
        if invalid > 0 {
            warn!(key = %key, invalid, "segment has lines that are not UTF-8");
        }
        debug!(key = %key, lines = lines.len(), "read segment");
        Ok(lines)
    }

    /// Segments of a room, optionally for one day, in (day, start, end,
    /// writer) order.
    pub async fn list_segments(&self, room_id: &str, day: Option<&str>) -> Result<Vec<SegmentPath>> {
        let prefix = match day {
            Some(day) => layout::day_prefix(room_id, day)?,
            None => layout::logs_prefix(room_id)?,
        };
        let keys = self.backend.list(&prefix).await?;
        let mut segments: Vec<SegmentPath> = keys
            .iter()
            .filter_map(|key| {
                let parsed = SegmentPath::parse(key);
                if parsed.is_none() {
                    debug!(key = %key, "ignoring non-segment object");
                }
                parsed
            })
            .collect();
        segments.sort();
        Ok(segments)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Raw objects
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.backend.head(key).await?.is_some())
    }

    /// Size and modification time of an object.
    pub async fn stat(&self, key: &str) -> Result<Option<ObjectInfo>> {
        self.backend.head(key).await
    }

    /// Read and parse a JSON object; `None` if missing.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.backend.get(key).await? {
            Some(data) => Ok(Some(serde_json::from_slice(&data)?)),
            None => Ok(None),
        }
    }

    /// Write a value as pretty-printed JSON, replacing any existing object.
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let body = serde_json::to_vec_pretty(value)?;
        self.backend.put(key, Bytes::from(body)).await
    }

    /// Delete an object. Returns whether it existed.
    ///
    /// Administrative only: removing a segment breaks the append-only
    /// history other readers rely on.
    pub async fn delete(&self, key: &str) -> Result<bool> {
        let existed = self.backend.delete(key).await?;
        if existed {
            info!(key, "deleted object");
        }
        Ok(existed)
    }
}

fn join_lines(lines: &[String]) -> Bytes {
    let mut body = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for line in lines {
        body.push_str(line.trim_end_matches('\n'));
        body.push('\n');
    }
    Bytes::from(body)
}

/// Split on `\n` (dropping a trailing `\r`) and decode each line strictly.
fn decode_lines(data: &[u8]) -> Vec<SegmentLine> {
    if data.is_empty() {
        return Vec::new();
    }
    let body = data.strip_suffix(b"\n").unwrap_or(data);
    body.split(|&b| b == b'\n')
        .map(|raw| {
            let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
            std::str::from_utf8(raw).map(str::to_string)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const T: i64 = 1_736_870_400_000;

    fn texts(lines: Vec<SegmentLine>) -> Vec<String> {
        lines.into_iter().map(|l| l.unwrap()).collect()
    }

    async fn local_storage() -> (Storage, TempDir) {
        let dir = TempDir::new().unwrap();
        let storage = Storage::open(dir.path().to_str().unwrap()).await.unwrap();
        (storage, dir)
    }

    #[tokio::test]
    async fn test_ensure_room_idempotent() {
        let (local, _dir) = local_storage().await;
        for storage in [Storage::memory(), local] {
            assert!(storage.ensure_room("lobby").await.unwrap());
            let first = storage.room_metadata("lobby").await.unwrap().unwrap();

            assert!(!storage.ensure_room("lobby").await.unwrap());
            let second = storage.room_metadata("lobby").await.unwrap().unwrap();

            assert_eq!(first, second);
            assert_eq!(first.version, "1.0");
            assert_eq!(first.protocol, "bucket-chat-v1");
        }
    }

    #[tokio::test]
    async fn test_concurrent_ensure_room_creates_once() {
        let storage = Storage::memory();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let s = storage.clone();
                tokio::spawn(async move { s.ensure_room("busy").await.unwrap() })
            })
            .collect();
        let mut created = 0;
        for h in handles {
            if h.await.unwrap() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_segment_roundtrip_local() {
        let (storage, _dir) = local_storage().await;
        let path = storage.segment_path("lobby", T, T + 2, "alice@example.com").unwrap();
        let lines = vec!["{\"a\":1}".to_string(), "{\"b\":2}".to_string()];
        storage.write_segment(&path, &lines).await.unwrap();

        assert_eq!(texts(storage.read_segment(&path).await.unwrap()), lines);
        assert!(storage.exists(&path.key()).await.unwrap());
    }

    #[tokio::test]
    async fn test_invalid_utf8_line_is_reported_not_replaced() {
        let (storage, dir) = local_storage().await;
        let path = storage.segment_path("lobby", T, T + 2, "alice@example.com").unwrap();
        storage.write_segment(&path, &["placeholder".to_string()]).await.unwrap();

        let mut raw = b"{\"a\":1}\n".to_vec();
        raw.extend_from_slice(b"{\"b\":\"\xff\xfe\"}\r\n");
        raw.extend_from_slice(b"{\"c\":3}\n");
        std::fs::write(dir.path().join(path.key()), raw).unwrap();

        let lines = storage.read_segment(&path).await.unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0].as_deref(), Ok("{\"a\":1}"));
        assert!(lines[1].is_err());
        assert_eq!(lines[2].as_deref(), Ok("{\"c\":3}"));
    }

    #[test]
    fn test_decode_lines_matches_text_lines() {
        for text in ["", "\n", "a", "a\n", "a\r\nb", "a\n\nb\n"] {
            let expected: Vec<String> = text.lines().map(str::to_string).collect();
            assert_eq!(texts(decode_lines(text.as_bytes())), expected, "{text:?}");
        }
    }

    #[tokio::test]
    async fn test_missing_segment_reads_empty() {
        let storage = Storage::memory();
        let path = storage.segment_path("lobby", T, T, "alice").unwrap();
        assert!(storage.read_segment(&path).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_segment_never_overwrites() {
        let storage = Storage::memory();
        let path = storage.segment_path("lobby", T, T, "alice").unwrap();
        storage.create_segment(&path, &["one".to_string()]).await.unwrap();
        let err = storage.create_segment(&path, &["two".to_string()]).await.unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(texts(storage.read_segment(&path).await.unwrap()), vec!["one"]);
    }

    #[tokio::test]
    async fn test_list_segments_sorted_and_filtered() {
        let storage = Storage::memory();
        storage.ensure_room("lobby").await.unwrap();
        let day2 = T + 86_400_000;
        let paths = [
            storage.segment_path("lobby", day2, day2 + 1, "bob").unwrap(),
            storage.segment_path("lobby", T + 5, T + 6, "alice").unwrap(),
            storage.segment_path("lobby", T, T + 3, "bob").unwrap(),
        ];
        for p in &paths {
            storage.write_segment(p, &["x".to_string()]).await.unwrap();
        }
        storage
            .write_json("rooms/lobby/logs/2025-01-14/notes.json", &serde_json::json!({}))
            .await
            .unwrap();

        let all = storage.list_segments("lobby", None).await.unwrap();
        assert_eq!(all, vec![paths[2].clone(), paths[1].clone(), paths[0].clone()]);

        let first_day = storage.list_segments("lobby", Some("2025-01-14")).await.unwrap();
        assert_eq!(first_day.len(), 2);
        assert!(storage.list_segments("empty", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_room_metadata_keeps_core_fields() {
        let storage = Storage::memory();
        storage.ensure_room("lobby").await.unwrap();
        let before = storage.room_metadata("lobby").await.unwrap().unwrap();

        let mut updates = Map::new();
        updates.insert("topic".into(), Value::String("rust".into()));
        updates.insert("room_id".into(), Value::String("hijack".into()));
        let after = storage.update_room_metadata("lobby", updates).await.unwrap();

        assert_eq!(after.room_id, "lobby");
        assert_eq!(after.created_at, before.created_at);
        assert_eq!(after.extra.get("topic"), Some(&Value::String("rust".into())));

        let reread = storage.room_metadata("lobby").await.unwrap().unwrap();
        assert_eq!(reread, after);
    }

    #[tokio::test]
    async fn test_delete_and_stat() {
        let storage = Storage::memory();
        storage.write_json("rooms/x/metadata.json", &serde_json::json!({"a": 1})).await.unwrap();
        assert!(storage.stat("rooms/x/metadata.json").await.unwrap().unwrap().size > 0);
        assert!(storage.delete("rooms/x/metadata.json").await.unwrap());
        assert!(!storage.delete("rooms/x/metadata.json").await.unwrap());
        assert!(storage.stat("rooms/x/metadata.json").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_bad_room_ids_rejected() {
        let storage = Storage::memory();
        assert!(matches!(
            storage.ensure_room("../etc").await,
            Err(StoreError::InvalidPath(_))
        ));
        assert!(storage.list_segments("a/b", None).await.is_err());
    }

    #[tokio::test]
    async fn test_info() {
        let info = Storage::memory().info();
        assert_eq!(info.backend, BackendKind::Memory);
        assert!(!info.is_cloud);

        let (storage, dir) = local_storage().await;
        let info = storage.info();
        assert_eq!(info.backend, BackendKind::Local);
        assert_eq!(info.location, dir.path().display().to_string());
    }
}
