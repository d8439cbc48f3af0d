//! # Bucket Chat Store
//!
//! Storage layout and a unified interface over local disk and cloud object
//! storage.
//!
//! ## Overview
//!
//! Rooms live under `rooms/<room_id>/`, with a `metadata.json` and
//! day-partitioned JSON-lines segments. The [`Storage`] handle speaks in
//! those terms and delegates raw object I/O to a [`Backend`], chosen once
//! from a URI.
//!
//! ## Key Types
//!
//! - [`Storage`] - Room-aware handle over one backend
//! - [`Backend`] - The async trait every backend implements
//! - [`LocalBackend`] - Files under a root directory
//! - [`ObjectBackend`] - S3, GCS, Azure Blob, or in-memory via `object_store`
//! - [`SegmentPath`] - Address of one segment file
//!
//! ## Usage
//!
//! ```rust,no_run
//! use bucket_chat_store::Storage;
//!
//! async fn example() -> bucket_chat_store::Result<()> {
//!     let storage = Storage::open("s3://my-bucket/chat").await?;
//!     storage.ensure_room("lobby").await?;
//!     for segment in storage.list_segments("lobby", None).await? {
//!         let lines = storage.read_segment(&segment).await?;
//!         println!("{segment}: {} lines", lines.len());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Missing is empty**: reading a missing segment returns no lines
//! - **Create-only metadata**: `ensure_room` never replaces existing metadata
//! - **No escapes**: room ids, writer tokens and keys are checked against `..`
//!   and separators before touching a backend

pub mod backend;
pub mod error;
pub mod layout;
pub mod local;
pub mod object;
pub mod storage;
pub mod uri;

pub use backend::{Backend, ObjectInfo};
pub use error::{Result, StoreError};
pub use layout::{day_of, writer_token, SegmentPath};
pub use local::LocalBackend;
pub use object::ObjectBackend;
pub use storage::{RoomMetadata, SegmentLine, Storage, StorageInfo};
pub use uri::{BackendKind, StorageUri};
