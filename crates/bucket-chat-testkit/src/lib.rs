//! # Bucket Chat Testkit
//!
//! Testing utilities for Bucket Chat.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden vectors**: Fixed events with their canonical bytes, chain
//!   hashes and signatures, for checking other implementations
//! - **Generators**: Proptest strategies for property-based testing
//! - **Fixtures**: A keypair plus in-memory storage, with helpers that build
//!   signed, chained events
//!
//! ## Golden Vectors
//!
//! ```rust
//! use bucket_chat_testkit::vectors::{all_vectors, event_from_vector};
//! use bucket_chat_core::record_hash;
//!
//! for vector in all_vectors() {
//!     let event = event_from_vector(&vector);
//!     assert_eq!(record_hash(&event).as_str(), vector.expected_hash);
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use bucket_chat_testkit::generators::{event_from_params, EventParams};
//!
//! proptest! {
//!     #[test]
//!     fn json_line_round_trips(params: EventParams) {
//!         let event = event_from_params(&params);
//!         let line = event.to_json_line().unwrap();
//!         prop_assert_eq!(bucket_chat_core::Event::from_json_line(&line).unwrap(), event);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use bucket_chat_testkit::fixtures::TestFixture;
//!
//! let fixture = TestFixture::new("alice@example.com");
//! let chain = fixture.make_chain("lobby", &["m1", "m2", "m3"]);
//! assert_eq!(chain[1].prev_hash(), Some(&bucket_chat_core::record_hash(&chain[0])));
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party_fixtures, trusted_keys_for, TestFixture};
pub use generators::{event_from_params, EventParams};
pub use vectors::{all_vectors, event_from_vector, verify_all_vectors, GoldenVector};

use tracing_subscriber::EnvFilter;

/// Route `tracing` output to the test harness, filtered by `RUST_LOG`.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}
