//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use bucket_chat::{Participant, TrustedKeys};
use bucket_chat_core::{
    now_millis, record_hash, sign_record, Content, Event, EventBuilder, Keypair, PublicKey,
};
use bucket_chat_store::{Result as StoreResult, SegmentPath, Storage};

/// A sender with a keypair, over in-memory storage.
pub struct TestFixture {
    pub sender_id: String,
    pub keypair: Keypair,
    pub storage: Storage,
}

impl TestFixture {
    /// Create a new test fixture with a random keypair.
    pub fn new(sender_id: &str) -> Self {
        Self::with_keypair(sender_id, Keypair::generate(), Storage::memory())
    }

    /// Create with a deterministic keypair from seed.
    pub fn with_seed(sender_id: &str, seed: [u8; 32]) -> Self {
        Self::with_keypair(sender_id, Keypair::from_seed(&seed), Storage::memory())
    }

    /// Create over an existing storage handle.
    pub fn with_keypair(sender_id: &str, keypair: Keypair, storage: Storage) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            keypair,
            storage,
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    /// Keys trusting only this sender.
    pub fn trusted_keys(&self) -> TrustedKeys {
        TrustedKeys::new().with(&self.sender_id, self.public_key())
    }

    /// A participant for this sender over the fixture's storage.
    pub fn participant(&self) -> Participant {
        Participant::new(&self.sender_id, self.keypair.clone(), self.storage.clone())
    }

    /// A signed event, linked after `prev` if given.
    pub fn make_event(&self, room_id: &str, content: Content, timestamp_ms: i64, prev: Option<&Event>) -> Event {
        let mut builder = EventBuilder::new(room_id, &self.sender_id, content).timestamp(timestamp_ms);
        if let Some(prev) = prev {
            builder = builder.prev(record_hash(prev));
        }
        let event = builder.build().expect("fixture event is valid");
        sign_record(event, &self.keypair)
    }

    /// A signed message, linked after `prev` if given.
    pub fn make_message(&self, room_id: &str, body: &str, timestamp_ms: i64, prev: Option<&Event>) -> Event {
        self.make_event(room_id, Content::message(body), timestamp_ms, prev)
    }

    /// Signed messages forming one chain, one millisecond apart, ending a
    /// little before now.
    pub fn make_chain(&self, room_id: &str, bodies: &[&str]) -> Vec<Event> {
        let start = now_millis() - 1_000 - bodies.len() as i64;
        let mut chain: Vec<Event> = Vec::with_capacity(bodies.len());
        for (i, body) in bodies.iter().enumerate() {
            let event = self.make_message(room_id, body, start + i as i64, chain.last());
            chain.push(event);
        }
        chain
    }

    /// Store events as one segment of this sender, bypassing any checks.
    pub async fn write_segment(&self, room_id: &str, events: &[Event]) -> StoreResult<SegmentPath> {
        let start = events.iter().map(Event::timestamp_ms).min().unwrap_or(1);
        let end = events.iter().map(Event::timestamp_ms).max().unwrap_or(start);
        let path = self.storage.segment_path(room_id, start, end, &self.sender_id)?;
        let lines: Vec<String> = events
            .iter()
            .map(|e| e.to_json_line().expect("event serializes"))
            .collect();
        self.storage.write_segment(&path, &lines).await?;
        Ok(path)
    }
}

/// Create fixtures for multi-party tests, all sharing one in-memory storage.
///
/// Senders are `user0@example.com`, `user1@example.com`, ...
pub fn multi_party_fixtures(count: usize) -> Vec<TestFixture> {
    let storage = Storage::memory();
    (0..count)
        .map(|i| {
            let mut seed = [0u8; 32];
            seed[0] = i as u8;
            TestFixture::with_keypair(
                &format!("user{i}@example.com"),
                Keypair::from_seed(&seed),
                storage.clone(),
            )
        })
        .collect()
}

/// Merge trust for several fixtures.
pub fn trusted_keys_for(fixtures: &[TestFixture]) -> TrustedKeys {
    fixtures
        .iter()
        .map(|f| (f.sender_id.clone(), f.public_key()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucket_chat::IntegrityVerifier;
    use bucket_chat_core::verify_chain;

    #[test]
    fn test_fixture_chain() {
        let fixture = TestFixture::new("alice@example.com");
        let chain = fixture.make_chain("lobby", &["a", "b", "c"]);

        assert!(chain[0].prev_hash().is_none());
        assert_eq!(chain[1].prev_hash(), Some(&record_hash(&chain[0])));
        assert_eq!(chain[2].prev_hash(), Some(&record_hash(&chain[1])));
        assert!(verify_chain(&chain, "alice@example.com"));
    }

    #[tokio::test]
    async fn test_written_segment_verifies() {
        let fixture = TestFixture::new("alice@example.com");
        let chain = fixture.make_chain("lobby", &["a", "b"]);
        fixture.write_segment("lobby", &chain).await.unwrap();

        let report = IntegrityVerifier::new(fixture.trusted_keys())
            .verify_room(&fixture.storage, "lobby", None)
            .await
            .unwrap();
        assert!(report.is_clean());
        assert_eq!(report.trusted_count(), 2);
    }

    #[test]
    fn test_multi_party_fixtures() {
        let fixtures = multi_party_fixtures(3);

        let keys: Vec<_> = fixtures.iter().map(|f| f.public_key()).collect();
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_eq!(fixtures[2].sender_id, "user2@example.com");
        assert_eq!(trusted_keys_for(&fixtures).len(), 3);
    }

    #[test]
    fn test_seeded_fixture_is_deterministic() {
        let a = TestFixture::with_seed("alice", [9; 32]);
        let b = TestFixture::with_seed("alice", [9; 32]);
        assert_eq!(a.public_key(), b.public_key());
    }
}
