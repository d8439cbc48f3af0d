//! Strong type definitions for event identifiers and chain hashes.
//!
//! Both are text on the wire; the newtypes keep them from being mixed up with
//! room ids, sender ids or bodies.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::error::SchemaError;

/// Separator between the parts of an [`EventId`].
pub const ID_SEPARATOR: &str = "::";

/// An event identifier: `<room>::<iso8601-timestamp>Z::<random-token>`.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wrap an existing id string without checking it.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh id for an event in `room_id` at `timestamp_ms`.
    pub fn generate(room_id: &str, timestamp_ms: i64) -> Self {
        let stamp = match DateTime::<Utc>::from_timestamp_millis(timestamp_ms) {
            Some(dt) => dt.format("%Y-%m-%dT%H:%M:%S%.3f").to_string(),
            None => timestamp_ms.to_string(),
        };
        let token = uuid::Uuid::new_v4();
        Self(format!(
            "{room_id}{ID_SEPARATOR}{stamp}Z{ID_SEPARATOR}{token}"
        ))
    }

    /// Split into `(room, timestamp, token)`.
    pub fn parts(&self) -> Result<(&str, &str, &str), SchemaError> {
        let parts: Vec<&str> = self.0.split(ID_SEPARATOR).collect();
        match parts.as_slice() {
            [room, stamp, token] => Ok((room, stamp, token)),
            _ => Err(SchemaError::MalformedId(self.0.clone())),
        }
    }

    /// Check the id is well formed and belongs to `room_id`.
    pub fn validate_for_room(&self, room_id: &str) -> Result<(), SchemaError> {
        let (id_room, _, _) = self.parts()?;
        if id_room != room_id {
            return Err(SchemaError::RoomMismatch {
                id_room: id_room.to_string(),
                room_id: room_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EventId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for EventId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Content hash of an event: base64(SHA-256(canonical bytes)).
///
/// Used as the `prev_hash` link of a sender's chain.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventHash(String);

impl EventHash {
    /// Hash arbitrary bytes.
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        Self(BASE64.encode(digest))
    }

    /// Wrap an existing base64 hash string without checking it.
    pub fn new(hash: impl Into<String>) -> Self {
        Self(hash.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode to raw digest bytes, if the text is a well-formed 32-byte digest.
    pub fn to_bytes(&self) -> Option<[u8; 32]> {
        let bytes = BASE64.decode(&self.0).ok()?;
        bytes.try_into().ok()
    }
}

impl fmt::Debug for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let short: String = self.0.chars().take(12).collect();
        write!(f, "EventHash({short}...)")
    }
}

impl fmt::Display for EventHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
