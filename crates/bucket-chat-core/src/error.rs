//! Error types for the Bucket Chat core.

use thiserror::Error;

use crate::types::{EventHash, EventId};

/// Errors from key handling and encoding.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("invalid private key")]
    InvalidPrivateKey,

    #[error("invalid signature encoding")]
    InvalidSignature,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("key store error: {0}")]
    KeyStore(String),
}

/// A record failed model validation.
///
/// Always rejects the whole record; nothing is partially accepted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("timestamp must be positive, got {0}")]
    NonPositiveTimestamp(i64),

    #[error("timestamp {timestamp_ms} is more than one hour ahead of {now_ms}")]
    TimestampInFuture { timestamp_ms: i64, now_ms: i64 },

    #[error("event id {0:?} must have exactly three '::'-separated parts")]
    MalformedId(String),

    #[error("event id room segment {id_room:?} does not match room_id {room_id:?}")]
    RoomMismatch { id_room: String, room_id: String },

    #[error("unknown event kind: {0}")]
    UnknownKind(String),

    #[error("message body cannot be empty")]
    EmptyBody,

    #[error("invalid membership action: {0}")]
    InvalidMembership(String),

    #[error("reaction cannot be empty")]
    EmptyReaction,

    #[error("{field} must reference an event id")]
    MissingReference { field: &'static str },

    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("invalid {kind} content: {reason}")]
    InvalidContent { kind: &'static str, reason: String },

    #[error("malformed record: {0}")]
    Malformed(String),
}

/// A gap or mismatch in one sender's hash chain.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("first event {event_id} of {sender_id} must not carry prev_hash (found {found})")]
    UnexpectedPrev {
        sender_id: String,
        event_id: EventId,
        found: EventHash,
    },

    #[error("event {event_id} of {sender_id} is missing prev_hash (expected {expected})")]
    MissingPrev {
        sender_id: String,
        event_id: EventId,
        expected: EventHash,
    },

    #[error("event {event_id} of {sender_id} links to {found}, expected {expected}")]
    BrokenLink {
        sender_id: String,
        event_id: EventId,
        expected: EventHash,
        found: EventHash,
    },
}

impl ChainError {
    /// The event at which the chain broke.
    pub fn event_id(&self) -> &EventId {
        match self {
            ChainError::UnexpectedPrev { event_id, .. }
            | ChainError::MissingPrev { event_id, .. }
            | ChainError::BrokenLink { event_id, .. } => event_id,
        }
    }
}
