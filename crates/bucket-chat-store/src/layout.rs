//! Storage layout: where rooms, metadata and segments live.
//!
//! ```text
//! rooms/<room_id>/metadata.json
//! rooms/<room_id>/logs/<YYYY-MM-DD>/messages_<start_ms>_<end_ms>_<writer>.jsonl
//! ```
//!
//! Keys are `/`-separated and relative to the storage root. Days are UTC
//! dates of a segment's first timestamp.

use chrono::{DateTime, NaiveDate, Utc};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::fmt;

use crate::error::{Result, StoreError};

pub const ROOMS_DIR: &str = "rooms";
pub const LOGS_DIR: &str = "logs";
pub const METADATA_FILE: &str = "metadata.json";
pub const SEGMENT_PREFIX: &str = "messages_";
pub const SEGMENT_SUFFIX: &str = ".jsonl";

const DAY_FORMAT: &str = "%Y-%m-%d";
const WRITER_NAME_MAX: usize = 32;
const WRITER_HASH_HEX: usize = 8;

/// Reject names that could escape their directory.
pub fn check_component(name: &str) -> Result<()> {
    if name.is_empty()
        || name == "."
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0')
    {
        return Err(StoreError::InvalidPath(name.to_string()));
    }
    Ok(())
}

/// Reject keys with empty, `.` or `..` segments, or absolute keys.
pub fn check_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') {
        return Err(StoreError::InvalidPath(key.to_string()));
    }
    for part in key.split('/') {
        check_component(part).map_err(|_| StoreError::InvalidPath(key.to_string()))?;
    }
    Ok(())
}

/// `rooms/<room_id>`
pub fn room_root(room_id: &str) -> Result<String> {
    check_component(room_id)?;
    Ok(format!("{ROOMS_DIR}/{room_id}"))
}

/// `rooms/<room_id>/metadata.json`
pub fn metadata_key(room_id: &str) -> Result<String> {
    Ok(format!("{}/{METADATA_FILE}", room_root(room_id)?))
}

/// `rooms/<room_id>/logs`
pub fn logs_prefix(room_id: &str) -> Result<String> {
    Ok(format!("{}/{LOGS_DIR}", room_root(room_id)?))
}

/// `rooms/<room_id>/logs/<day>`
pub fn day_prefix(room_id: &str, day: &str) -> Result<String> {
    check_day(day)?;
    Ok(format!("{}/{day}", logs_prefix(room_id)?))
}

/// UTC calendar day of a millisecond timestamp, as `YYYY-MM-DD`.
pub fn day_of(timestamp_ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(timestamp_ms)
        .unwrap_or_default()
        .format(DAY_FORMAT)
        .to_string()
}

fn check_day(day: &str) -> Result<()> {
    NaiveDate::parse_from_str(day, DAY_FORMAT)
        .map(|_| ())
        .map_err(|_| StoreError::InvalidPath(day.to_string()))
}

/// Filename-safe rendering of a sender id.
///
/// The readable part is the sanitized local part (before any `@`); the
/// suffix is a short hash of the whole id, so `alice@a.org` and `alice@b.org`
/// never share a segment name.
pub fn writer_token(sender_id: &str) -> String {
    let local = sender_id.split('@').next().unwrap_or(sender_id);
    let mut name: String = local
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .take(WRITER_NAME_MAX)
        .collect();
    if name.is_empty() {
        name.push_str("writer");
    }
    let digest = hex::encode(Sha256::digest(sender_id.as_bytes()));
    format!("{name}-{}", &digest[..WRITER_HASH_HEX])
}

/// The address of one segment file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentPath {
    pub room_id: String,
    pub day: String,
    pub start_ms: i64,
    pub end_ms: i64,
    pub writer: String,
}

impl SegmentPath {
    /// Address a segment; the day is derived from `start_ms`.
    pub fn new(room_id: &str, start_ms: i64, end_ms: i64, writer: &str) -> Result<Self> {
        Self::with_day(room_id, &day_of(start_ms), start_ms, end_ms, writer)
    }

    /// Address a segment under an explicit day partition.
    pub fn with_day(
        room_id: &str,
        day: &str,
        start_ms: i64,
        end_ms: i64,
        writer: &str,
    ) -> Result<Self> {
        check_component(room_id)?;
        check_component(writer)?;
        check_day(day)?;
        if end_ms < start_ms {
            return Err(StoreError::InvalidPath(format!(
                "segment ends ({end_ms}) before it starts ({start_ms})"
            )));
        }
        Ok(Self {
            room_id: room_id.to_string(),
            day: day.to_string(),
            start_ms,
            end_ms,
            writer: writer.to_string(),
        })
    }

    /// `messages_<start>_<end>_<writer>.jsonl`
    pub fn file_name(&self) -> String {
        format!(
            "{SEGMENT_PREFIX}{}_{}_{}{SEGMENT_SUFFIX}",
            self.start_ms, self.end_ms, self.writer
        )
    }

    /// Full storage key.
    pub fn key(&self) -> String {
        format!(
            "{ROOMS_DIR}/{}/{LOGS_DIR}/{}/{}",
            self.room_id,
            self.day,
            self.file_name()
        )
    }

    /// Parse a storage key; `None` if it is not a segment key.
    pub fn parse(key: &str) -> Option<Self> {
        let parts: Vec<&str> = key.split('/').collect();
        let [rooms, room_id, logs, day, file] = parts.as_slice() else {
            return None;
        };
        if *rooms != ROOMS_DIR || *logs != LOGS_DIR {
            return None;
        }
        let stem = file.strip_prefix(SEGMENT_PREFIX)?.strip_suffix(SEGMENT_SUFFIX)?;
        // The writer may itself contain '_', so split at most twice.
        let mut fields = stem.splitn(3, '_');
        let start_ms = fields.next()?.parse().ok()?;
        let end_ms = fields.next()?.parse().ok()?;
        let writer = fields.next()?;
        Self::with_day(room_id, day, start_ms, end_ms, writer).ok()
    }
}

impl fmt::Display for SegmentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}

impl Ord for SegmentPath {
    fn cmp(&self, other: &Self) -> Ordering {
        (&self.room_id, &self.day, self.start_ms, self.end_ms, &self.writer).cmp(&(
            &other.room_id,
            &other.day,
            other.start_ms,
            other.end_ms,
            &other.writer,
        ))
    }
}

impl PartialOrd for SegmentPath {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: i64 = 1_736_870_400_000; // 2025-01-14T16:00:00Z

    #[test]
    fn test_room_keys() {
        assert_eq!(metadata_key("lobby").unwrap(), "rooms/lobby/metadata.json");
        assert_eq!(logs_prefix("lobby").unwrap(), "rooms/lobby/logs");
        assert_eq!(
            day_prefix("lobby", "2025-01-14").unwrap(),
            "rooms/lobby/logs/2025-01-14"
        );
        assert!(day_prefix("lobby", "yesterday").is_err());
    }

    #[test]
    fn test_traversal_rejected() {
        for bad in ["", ".", "..", "../x", "a/b", "a\\b", "x..y"] {
            assert!(room_root(bad).is_err(), "{bad:?} accepted");
        }
        assert!(check_key("rooms/../etc/passwd").is_err());
        assert!(check_key("/rooms/lobby").is_err());
        assert!(check_key("rooms//lobby").is_err());
        assert!(check_key("rooms/lobby/metadata.json").is_ok());
    }

    #[test]
    fn test_day_of_is_utc() {
        assert_eq!(day_of(T), "2025-01-14");
        assert_eq!(day_of(T + 8 * 3_600_000 - 1), "2025-01-14");
        assert_eq!(day_of(T + 8 * 3_600_000), "2025-01-15");
    }

    #[test]
    fn test_writer_token() {
        let a = writer_token("alice@example.com");
        let b = writer_token("alice@example.org");
        assert!(a.starts_with("alice-"));
        assert_ne!(a, b);
        assert_eq!(a, writer_token("alice@example.com"));
        assert!(check_component(&a).is_ok());

        let odd = writer_token("../../etc");
        assert!(check_component(&odd).is_ok());
        assert!(odd.starts_with("etc-"));
        assert!(writer_token("@@@").starts_with("writer-"));
    }

    #[test]
    fn test_segment_key_and_parse() {
        let writer = writer_token("al_ice@example.com");
        let seg = SegmentPath::new("lobby", T, T + 2, &writer).unwrap();
        assert_eq!(
            seg.key(),
            format!("rooms/lobby/logs/2025-01-14/messages_{T}_{}_{writer}.jsonl", T + 2)
        );
        assert_eq!(SegmentPath::parse(&seg.key()), Some(seg));
    }

    #[test]
    fn test_parse_rejects_foreign_keys() {
        assert!(SegmentPath::parse("rooms/lobby/metadata.json").is_none());
        assert!(SegmentPath::parse("rooms/lobby/logs/2025-01-14/notes.txt").is_none());
        assert!(SegmentPath::parse("rooms/lobby/logs/2025-01-14/messages_a_b_w.jsonl").is_none());
        assert!(SegmentPath::parse("rooms/lobby/logs/2025-01-14/messages_5_1_w.jsonl").is_none());
        assert!(SegmentPath::parse("rooms/lobby/logs/bad-day/messages_1_2_w.jsonl").is_none());
    }

    #[test]
    fn test_segments_sort_by_day_then_time() {
        let a = SegmentPath::new("lobby", T, T + 5, "w").unwrap();
        let b = SegmentPath::new("lobby", T + 1, T + 2, "w").unwrap();
        let c = SegmentPath::new("lobby", T + 86_400_000, T + 86_400_000, "a").unwrap();
        let mut all = vec![c.clone(), b.clone(), a.clone()];
        all.sort();
        assert_eq!(all, vec![a, b, c]);
    }
}
