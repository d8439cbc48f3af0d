//! # Bucket Chat
//!
//! Chat rooms whose whole history lives in object storage: local disk or an
//! S3, GCS or Azure bucket. There is no server. Each participant appends
//! signed, hash-chained events as JSON-lines segments, and any reader with
//! the senders' public keys can check what it reads.
//!
//! ## Key Types
//!
//! - [`Participant`] - Signs, chains and publishes events as one sender
//! - [`IntegrityVerifier`] - Classifies stored events as trusted or not
//! - [`ChatConfig`] - Settings, with environment overrides
//! - [`Storage`] - Room-aware handle over a storage backend
//!
//! ## Example
//!
//! ```rust,no_run
//! use bucket_chat::{IntegrityVerifier, Keypair, Participant, Storage, TrustedKeys};
//!
//! async fn example() -> bucket_chat::Result<()> {
//!     let storage = Storage::open("s3://team-bucket/chat").await?;
//!     let alice = Participant::new("alice@example.com", Keypair::generate(), storage.clone());
//!
//!     alice.join("lobby", Some("Alice")).await?;
//!     alice.send_message("lobby", "hello").await?;
//!
//!     let keys = TrustedKeys::new().with(alice.sender_id(), alice.public_key());
//!     let report = IntegrityVerifier::new(keys).verify_room(&storage, "lobby", None).await?;
//!     for event in report.trusted() {
//!         println!("{}: {:?}", event.sender_id(), event.message_body());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │        bucket-chat (this crate)             │
//! │   Participant · IntegrityVerifier · Config  │
//! └──────────────┬──────────────────────────────┘
//!                │
//!       ┌────────┴─────────┐
//!       ▼                  ▼
//! ┌────────────┐    ┌──────────────┐
//! │    core    │    │    store     │
//! │ events     │    │ layout       │
//! │ signatures │    │ local/cloud  │
//! │ chains     │    │ backends     │
//! └────────────┘    └──────────────┘
//! ```

pub mod config;
pub mod error;
pub mod participant;
pub mod verifier;

pub use config::ChatConfig;
pub use error::{ChatError, Result};
pub use participant::{ChainHead, Participant, RoomInfo};
pub use verifier::{
    ChainSummary, IntegrityVerifier, MalformedRecord, TrustedKeys, UnreadableSegment,
    VerificationReport, VerifiedEvent,
};

// Re-export core types for convenience
pub use bucket_chat_core::{
    Content, Event, EventBuilder, EventHash, EventId, EventKind, Keypair, KeypairExport,
    Membership, PublicKey, SchemaError, SignatureStatus,
};
pub use bucket_chat_store::{RoomMetadata, SegmentPath, Storage, StorageInfo};

/// Re-export the core crate for advanced usage.
pub use bucket_chat_core as core;

/// Re-export the store crate for advanced usage.
pub use bucket_chat_store as store;
