//! # Bucket Chat Core
//!
//! Pure primitives for Bucket Chat: events, canonical encoding, signatures
//! and per-sender hash chains.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over signed records.
//!
//! ## Key Types
//!
//! - [`Event`] - One signed protocol record
//! - [`Content`] - The typed payload; its variant fixes the [`EventKind`]
//! - [`EventId`] - `<room>::<timestamp>Z::<token>` identifier
//! - [`EventHash`] - Chain link: base64 SHA-256 of an event's canonical bytes
//! - [`Keypair`] / [`PublicKey`] - Ed25519 identity
//!
//! ## Canonicalization
//!
//! Signing and hashing both run over sorted, compact JSON. See [`canonical`].

pub mod canonical;
pub mod chain;
pub mod content;
pub mod crypto;
pub mod error;
pub mod event;
pub mod keystore;
pub mod signing;
pub mod types;
pub mod validation;

pub use canonical::{canonical_bytes, encode_value};
pub use chain::{build_hash_chain, check_chain, record_hash, verify_chain, ChainReport};
pub use content::{
    Content, EditContent, EventKind, MemberContent, Membership, MessageContent, ReactionContent,
    RedactionContent, TypingContent,
};
pub use crypto::{Keypair, KeypairExport, PublicKey, Signature};
pub use error::{ChainError, CoreError, SchemaError};
pub use event::{events_to_jsonl, now_millis, parse_jsonl, Event, EventBuilder, MalformedLine};
pub use keystore::{get_or_create, KeyStore, MemoryKeyStore};
pub use signing::{sign_record, signature_status, verify_record, SignatureStatus};
pub use types::{EventHash, EventId};
pub use validation::{validate_event, validate_event_at, MAX_FUTURE_SKEW_MS};
