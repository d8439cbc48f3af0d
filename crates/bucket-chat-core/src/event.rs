//! Event: the unit of the Bucket Chat protocol.
//!
//! An event is built unsigned, signed once, persisted as one JSON line in a
//! segment file, and never changed afterwards. Edits and deletions are new
//! events that reference the original.
//!
//! Fields are private; the only ways to obtain an [`Event`] are the
//! [`EventBuilder`] and deserialization, and both validate.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{Content, EventKind, MemberContent, Membership};
use crate::error::{CoreError, SchemaError};
use crate::types::{EventHash, EventId};
use crate::validation::validate_event_at;

/// A validated protocol event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawEvent", into = "RawEvent")]
pub struct Event {
    id: EventId,
    room_id: String,
    timestamp_ms: i64,
    sender_id: String,
    parent_id: Option<EventId>,
    prev_hash: Option<EventHash>,
    content: Content,
    signature: Option<String>,
}

impl Event {
    /// Build an unsigned event.
    ///
    /// The kind follows from `content`. `timestamp_ms` defaults to now.
    pub fn create(
        content: Content,
        room_id: &str,
        sender_id: &str,
        timestamp_ms: Option<i64>,
        parent_id: Option<EventId>,
        prev_hash: Option<EventHash>,
    ) -> Result<Self, SchemaError> {
        let mut builder = EventBuilder::new(room_id, sender_id, content);
        if let Some(ts) = timestamp_ms {
            builder = builder.timestamp(ts);
        }
        if let Some(parent) = parent_id {
            builder = builder.parent(parent);
        }
        if let Some(prev) = prev_hash {
            builder = builder.prev(prev);
        }
        builder.build()
    }

    pub fn id(&self) -> &EventId {
        &self.id
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn kind(&self) -> EventKind {
        self.content.kind()
    }

    pub fn parent_id(&self) -> Option<&EventId> {
        self.parent_id.as_ref()
    }

    /// Hash of the sender's preceding event, absent on a chain's first event.
    pub fn prev_hash(&self) -> Option<&EventHash> {
        self.prev_hash.as_ref()
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Base64 signature text, if any.
    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    /// Whether a non-empty signature is attached.
    pub fn is_signed(&self) -> bool {
        self.signature.as_deref().is_some_and(|s| !s.is_empty())
    }

    pub fn is_message(&self) -> bool {
        matches!(self.content, Content::Message(_))
    }

    /// Body text of a message event.
    pub fn message_body(&self) -> Option<&str> {
        match &self.content {
            Content::Message(m) => Some(&m.body),
            _ => None,
        }
    }

    /// Membership action of a member event.
    pub fn membership(&self) -> Option<Membership> {
        match &self.content {
            Content::Member(MemberContent { membership, .. }) => Some(*membership),
            _ => None,
        }
    }

    /// Attach a signature, replacing any previous one.
    pub(crate) fn with_signature(mut self, signature: String) -> Self {
        self.signature = Some(signature);
        self
    }

    /// Drop the signature.
    pub fn unsigned(mut self) -> Self {
        self.signature = None;
        self
    }

    /// Serialize as one JSON line, without the trailing newline.
    pub fn to_json_line(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }

    /// Parse and validate one JSON line.
    pub fn from_json_line(line: &str) -> Result<Self, SchemaError> {
        let raw: RawEvent =
            serde_json::from_str(line.trim()).map_err(|e| SchemaError::Malformed(e.to_string()))?;
        Event::try_from(raw)
    }
}

/// Builder for unsigned events.
pub struct EventBuilder {
    room_id: String,
    sender_id: String,
    content: Content,
    id: Option<EventId>,
    timestamp_ms: Option<i64>,
    parent_id: Option<EventId>,
    prev_hash: Option<EventHash>,
}

impl EventBuilder {
    /// Start building an event of the kind `content` belongs to.
    pub fn new(room_id: &str, sender_id: &str, content: Content) -> Self {
        Self {
            room_id: room_id.to_string(),
            sender_id: sender_id.to_string(),
            content,
            id: None,
            timestamp_ms: None,
            parent_id: None,
            prev_hash: None,
        }
    }

    /// A text message; the body is trimmed.
    pub fn message(room_id: &str, sender_id: &str, body: &str) -> Self {
        Self::new(room_id, sender_id, Content::message(body))
    }

    pub fn member(room_id: &str, sender_id: &str, membership: Membership) -> Self {
        Self::new(room_id, sender_id, Content::member(membership))
    }

    pub fn redaction(room_id: &str, sender_id: &str, target: EventId, reason: Option<&str>) -> Self {
        Self::new(room_id, sender_id, Content::redaction(target, reason))
    }

    pub fn edit(room_id: &str, sender_id: &str, target: EventId, new_body: &str) -> Self {
        Self::new(room_id, sender_id, Content::edit(target, new_body))
    }

    pub fn reaction(room_id: &str, sender_id: &str, target: EventId, reaction: &str) -> Self {
        Self::new(room_id, sender_id, Content::reaction(target, reaction))
    }

    pub fn typing(room_id: &str, sender_id: &str, typing: bool) -> Self {
        Self::new(room_id, sender_id, Content::typing(typing))
    }

    /// Set the timestamp (Unix milliseconds).
    pub fn timestamp(mut self, ts: i64) -> Self {
        self.timestamp_ms = Some(ts);
        self
    }

    /// Set the thread parent.
    pub fn parent(mut self, parent: EventId) -> Self {
        self.parent_id = Some(parent);
        self
    }

    /// Set the chain link to the sender's previous event.
    pub fn prev(mut self, prev: EventHash) -> Self {
        self.prev_hash = Some(prev);
        self
    }

    /// Use an explicit id instead of generating one.
    pub fn id(mut self, id: EventId) -> Self {
        self.id = Some(id);
        self
    }

    /// Build and validate against the local clock.
    pub fn build(self) -> Result<Event, SchemaError> {
        self.build_at(now_millis())
    }

    /// Build and validate against a given clock reading.
    pub fn build_at(self, now_ms: i64) -> Result<Event, SchemaError> {
        let timestamp_ms = self.timestamp_ms.unwrap_or(now_ms);
        let id = self
            .id
            .unwrap_or_else(|| EventId::generate(&self.room_id, timestamp_ms));

        let event = Event {
            id,
            room_id: self.room_id,
            timestamp_ms,
            sender_id: self.sender_id,
            parent_id: self.parent_id,
            prev_hash: self.prev_hash,
            content: self.content,
            signature: None,
        };
        validate_event_at(&event, now_ms)?;
        Ok(event)
    }
}

/// Wire shape of an event; field order is the order written.
#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawEvent {
    id: String,
    room_id: String,
    timestamp_ms: i64,
    sender_id: String,
    kind: String,
    #[serde(default)]
    parent_id: Option<String>,
    #[serde(default)]
    prev_hash: Option<String>,
    content: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    signature: Option<String>,
}

impl TryFrom<RawEvent> for Event {
    type Error = SchemaError;

    fn try_from(raw: RawEvent) -> Result<Self, Self::Error> {
        let kind: EventKind = raw.kind.parse()?;
        let content = Content::from_value(kind, raw.content)?;
        let event = Event {
            id: EventId::new(raw.id),
            room_id: raw.room_id,
            timestamp_ms: raw.timestamp_ms,
            sender_id: raw.sender_id,
            parent_id: raw.parent_id.map(EventId::new),
            prev_hash: raw.prev_hash.map(EventHash::new),
            content,
            signature: raw.signature,
        };
        validate_event_at(&event, now_millis())?;
        Ok(event)
    }
}

impl From<Event> for RawEvent {
    fn from(event: Event) -> Self {
        RawEvent {
            kind: event.kind().as_str().to_string(),
            content: event.content.to_value(),
            id: event.id.into_string(),
            room_id: event.room_id,
            timestamp_ms: event.timestamp_ms,
            sender_id: event.sender_id,
            parent_id: event.parent_id.map(EventId::into_string),
            prev_hash: event.prev_hash.map(|h| h.as_str().to_string()),
            signature: event.signature,
        }
    }
}

/// A line that could not be parsed as an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedLine {
    /// 1-based line number.
    pub line_no: usize,
    pub error: SchemaError,
}

/// Parse JSON-lines text. Blank lines are ignored; bad lines are collected,
/// never fatal.
pub fn parse_jsonl(text: &str) -> (Vec<Event>, Vec<MalformedLine>) {
    let mut events = Vec::new();
    let mut malformed = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match Event::from_json_line(line) {
            Ok(event) => events.push(event),
            Err(error) => malformed.push(MalformedLine {
                line_no: idx + 1,
                error,
            }),
        }
    }
    (events, malformed)
}

/// Render events as JSON-lines text, one newline-terminated line each.
pub fn events_to_jsonl(events: &[Event]) -> Result<String, CoreError> {
    let mut out = String::new();
    for event in events {
        out.push_str(&event.to_json_line()?);
        out.push('\n');
    }
    Ok(out)
}

/// Get the current time in Unix milliseconds.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::MessageContent;
    use serde_json::json;

    const HOUR: i64 = 3_600_000;

    #[test]
    fn test_message_builder() {
        let event = EventBuilder::message("lobby", "alice@example.com", "  hello  ")
            .build()
            .unwrap();

        assert_eq!(event.kind(), EventKind::Message);
        assert_eq!(event.room_id(), "lobby");
        assert_eq!(event.message_body(), Some("hello"));
        assert!(event.prev_hash().is_none());
        assert!(!event.is_signed());
        assert!(event.id().validate_for_room("lobby").is_ok());
    }

    #[test]
    fn test_create_defaults_timestamp_to_now() {
        let before = now_millis();
        let event = Event::create(Content::typing(true), "lobby", "alice", None, None, None)
            .unwrap();
        assert!(event.timestamp_ms() >= before);
        assert!(event.timestamp_ms() <= now_millis());
    }

    #[test]
    fn test_future_timestamp_bounds() {
        let now = now_millis();
        let ok = EventBuilder::message("lobby", "alice", "hi")
            .timestamp(now + HOUR / 2)
            .build();
        assert!(ok.is_ok());

        let err = EventBuilder::message("lobby", "alice", "hi")
            .timestamp(now + 2 * HOUR)
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::TimestampInFuture { .. }));
    }

    #[test]
    fn test_bad_ids_rejected() {
        let err = EventBuilder::message("room", "alice", "hi")
            .id(EventId::from("room::onlytwo"))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::MalformedId(_)));

        let err = EventBuilder::message("lobby", "alice", "hi")
            .id(EventId::generate("elsewhere", 1000))
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::RoomMismatch { .. }));
    }

    #[test]
    fn test_empty_body_rejected() {
        let err = EventBuilder::message("lobby", "alice", "   ").build().unwrap_err();
        assert_eq!(err, SchemaError::EmptyBody);
    }

    #[test]
    fn test_json_line_roundtrip() {
        let target = EventId::generate("lobby", 1000);
        let event = EventBuilder::reaction("lobby", "bob", target, "🎉")
            .parent(EventId::generate("lobby", 999))
            .prev(EventHash::of(b"previous"))
            .build()
            .unwrap()
            .with_signature("c2lnbmF0dXJl".into());

        let line = event.to_json_line().unwrap();
        assert!(!line.contains('\n'));
        let back = Event::from_json_line(&line).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn test_wire_field_order_and_nulls() {
        let event = EventBuilder::message("lobby", "alice", "hi")
            .timestamp(1234)
            .build()
            .unwrap();
        let line = event.to_json_line().unwrap();

        let id_pos = line.find("\"id\"").unwrap();
        let content_pos = line.find("\"content\"").unwrap();
        assert!(id_pos < content_pos);
        assert!(line.contains("\"parent_id\":null"));
        assert!(line.contains("\"prev_hash\":null"));
        assert!(line.contains("\"kind\":\"message\""));
        assert!(!line.contains("signature"));
    }

    #[test]
    fn test_unknown_kind_rejected_on_read() {
        let line = json!({
            "id": "lobby::2025-01-14T16:00:00.000Z::x",
            "room_id": "lobby",
            "timestamp_ms": 1_736_870_400_000i64,
            "sender_id": "alice",
            "kind": "poke",
            "parent_id": null,
            "prev_hash": null,
            "content": {},
        })
        .to_string();
        assert_eq!(
            Event::from_json_line(&line).unwrap_err(),
            SchemaError::UnknownKind("poke".into())
        );
    }

    #[test]
    fn test_unknown_top_level_field_rejected() {
        let line = json!({
            "id": "lobby::2025-01-14T16:00:00.000Z::x",
            "room_id": "lobby",
            "timestamp_ms": 1_736_870_400_000i64,
            "sender_id": "alice",
            "kind": "message",
            "content": {"body": "hi"},
            "color": "red",
        })
        .to_string();
        assert!(matches!(
            Event::from_json_line(&line),
            Err(SchemaError::Malformed(_))
        ));
    }

    #[test]
    fn test_read_keeps_untrimmed_body() {
        // Wire data is validated, never rewritten.
        let line = json!({
            "id": "lobby::2025-01-14T16:00:00.000Z::x",
            "room_id": "lobby",
            "timestamp_ms": 1_736_870_400_000i64,
            "sender_id": "alice",
            "kind": "message",
            "content": {"body": " padded ", "msgtype": "text"},
        })
        .to_string();
        let event = Event::from_json_line(&line).unwrap();
        assert_eq!(
            event.content(),
            &Content::Message(MessageContent {
                body: " padded ".into(),
                msgtype: "text".into(),
                format: None,
                formatted_body: None,
            })
        );
    }

    #[test]
    fn test_parse_jsonl_collects_bad_lines() {
        let a = EventBuilder::message("lobby", "alice", "one").build().unwrap();
        let b = EventBuilder::member("lobby", "bob", Membership::Join).build().unwrap();
        let text = format!(
            "{}\n\n{{not json\n{}\n{{\"id\":\"x\"}}\n",
            a.to_json_line().unwrap(),
            b.to_json_line().unwrap()
        );

        let (events, malformed) = parse_jsonl(&text);
        assert_eq!(events, vec![a, b]);
        assert_eq!(malformed.len(), 2);
        assert_eq!(malformed[0].line_no, 3);
        assert_eq!(malformed[1].line_no, 5);
    }

    #[test]
    fn test_events_to_jsonl() {
        let a = EventBuilder::message("lobby", "alice", "one").build().unwrap();
        let b = EventBuilder::typing("lobby", "alice", false).build().unwrap();
        let text = events_to_jsonl(&[a.clone(), b.clone()]).unwrap();

        assert_eq!(text.lines().count(), 2);
        assert!(text.ends_with('\n'));
        assert_eq!(parse_jsonl(&text).0, vec![a, b]);
    }

    #[test]
    fn test_accessors_by_kind() {
        let join = EventBuilder::member("lobby", "bob", Membership::Join).build().unwrap();
        assert_eq!(join.membership(), Some(Membership::Join));
        assert_eq!(join.message_body(), None);
        assert!(!join.is_message());
    }
}
