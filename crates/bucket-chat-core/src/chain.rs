//! Per-sender hash chains.
//!
//! Each event a sender writes in a room carries `prev_hash`, the
//! [`record_hash`] of that sender's previous event. Ordered by
//! `(timestamp_ms, id)`, a sender's events form one singly linked list whose
//! first element has no `prev_hash`.
//!
//! Chains are checked over the events handed in and nothing else: no state is
//! kept between calls, and chains of different senders are never correlated.

use tracing::debug;

use crate::canonical::canonical_bytes;
use crate::error::ChainError;
use crate::event::Event;
use crate::types::EventHash;

/// Content hash of an event: base64(SHA-256(canonical bytes)).
///
/// The signature is not part of the hash, so re-signing the same content
/// yields the same hash.
pub fn record_hash(event: &Event) -> EventHash {
    EventHash::of(&canonical_bytes(event))
}

/// The sender's events in chain order.
pub fn ordered_for_sender<'a>(events: &'a [Event], sender_id: &str) -> Vec<&'a Event> {
    let mut ordered: Vec<&Event> = events
        .iter()
        .filter(|e| e.sender_id() == sender_id)
        .collect();
    ordered.sort_by(|a, b| {
        a.timestamp_ms()
            .cmp(&b.timestamp_ms())
            .then_with(|| a.id().cmp(b.id()))
    });
    ordered
}

/// Result of walking one sender's chain.
#[derive(Debug, Clone)]
pub struct ChainReport<'a> {
    pub sender_id: String,

    /// The sender's events in chain order.
    pub ordered: Vec<&'a Event>,

    /// How many leading events of `ordered` link correctly.
    pub valid_prefix: usize,

    /// The first break, if any.
    pub error: Option<ChainError>,
}

impl<'a> ChainReport<'a> {
    /// Whether every event links correctly.
    pub fn is_intact(&self) -> bool {
        self.error.is_none()
    }

    /// The correctly linked leading events.
    pub fn linked(&self) -> &[&'a Event] {
        &self.ordered[..self.valid_prefix]
    }

    /// Whether `event` sits inside the valid prefix.
    ///
    /// Matched by sender and content hash: another event that merely reuses
    /// a linked id is not linked.
    pub fn is_linked(&self, event: &Event) -> bool {
        if event.sender_id() != self.sender_id {
            return false;
        }
        let hash = record_hash(event);
        self.linked().iter().any(|e| record_hash(e) == hash)
    }

    /// Hash of the last correctly linked event; the next `prev_hash`.
    pub fn head_hash(&self) -> Option<EventHash> {
        self.linked().last().map(|e| record_hash(e))
    }
}

/// Walk a sender's chain and report where, if anywhere, it breaks.
pub fn check_chain<'a>(events: &'a [Event], sender_id: &str) -> ChainReport<'a> {
    let ordered = ordered_for_sender(events, sender_id);
    let mut expected: Option<EventHash> = None;
    let mut valid_prefix = 0;
    let mut error = None;

    for event in &ordered {
        let found = event.prev_hash();
        let broken = match (&expected, found) {
            (None, None) => None,
            (None, Some(found)) => Some(ChainError::UnexpectedPrev {
                sender_id: sender_id.to_string(),
                event_id: event.id().clone(),
                found: found.clone(),
            }),
            (Some(expected), None) => Some(ChainError::MissingPrev {
                sender_id: sender_id.to_string(),
                event_id: event.id().clone(),
                expected: expected.clone(),
            }),
            (Some(expected), Some(found)) if expected != found => Some(ChainError::BrokenLink {
                sender_id: sender_id.to_string(),
                event_id: event.id().clone(),
                expected: expected.clone(),
                found: found.clone(),
            }),
            (Some(_), Some(_)) => None,
        };

        if let Some(e) = broken {
            debug!(sender_id, error = %e, "chain broken");
            error = Some(e);
            break;
        }
        expected = Some(record_hash(event));
        valid_prefix += 1;
    }

    ChainReport {
        sender_id: sender_id.to_string(),
        ordered,
        valid_prefix,
        error,
    }
}

/// Whether a sender's events form one unbroken chain. Empty input is valid.
pub fn verify_chain(events: &[Event], sender_id: &str) -> bool {
    check_chain(events, sender_id).is_intact()
}

/// Hashes of a sender's events in chain order.
pub fn build_hash_chain(events: &[Event], sender_id: &str) -> Vec<EventHash> {
    ordered_for_sender(events, sender_id)
        .into_iter()
        .map(record_hash)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::Keypair;
    use crate::event::EventBuilder;
    use crate::signing::sign_record;

    const T: i64 = 1_736_870_400_000;

    fn make_chain(sender: &str, n: usize) -> Vec<Event> {
        let kp = Keypair::from_seed(&[9; 32]);
        let mut out: Vec<Event> = Vec::new();
        for i in 0..n {
            let mut builder =
                EventBuilder::message("lobby", sender, &format!("m{}", i + 1)).timestamp(T + i as i64);
            if let Some(prev) = out.last() {
                builder = builder.prev(record_hash(prev));
            }
            out.push(sign_record(builder.build().unwrap(), &kp));
        }
        out
    }

    #[test]
    fn test_empty_chain_is_valid() {
        assert!(verify_chain(&[], "alice"));
        assert!(build_hash_chain(&[], "alice").is_empty());
    }

    #[test]
    fn test_linked_chain_verifies() {
        let chain = make_chain("alice", 5);
        let report = check_chain(&chain, "alice");
        assert!(report.is_intact());
        assert_eq!(report.valid_prefix, 5);
        assert_eq!(report.head_hash(), Some(record_hash(&chain[4])));
    }

    #[test]
    fn test_removing_middle_event_breaks_chain() {
        let mut chain = make_chain("alice", 5);
        chain.remove(2);
        let report = check_chain(&chain, "alice");

        assert!(!report.is_intact());
        assert_eq!(report.valid_prefix, 2);
        assert!(matches!(report.error, Some(ChainError::BrokenLink { .. })));
        assert_eq!(report.error.unwrap().event_id(), chain[2].id());
    }

    #[test]
    fn test_shuffled_order_still_verifies() {
        let mut chain = make_chain("alice", 4);
        chain.reverse();
        chain.swap(0, 2);
        assert!(verify_chain(&chain, "alice"));
    }

    #[test]
    fn test_first_event_with_prev_rejected() {
        let chain = make_chain("alice", 3);
        let tail = &chain[1..];
        let report = check_chain(tail, "alice");
        assert_eq!(report.valid_prefix, 0);
        assert!(matches!(report.error, Some(ChainError::UnexpectedPrev { .. })));
    }

    #[test]
    fn test_missing_prev_on_later_event() {
        let mut chain = make_chain("alice", 2);
        let orphan = EventBuilder::message("lobby", "alice", "m3")
            .timestamp(T + 10)
            .build()
            .unwrap();
        chain.push(orphan);
        let report = check_chain(&chain, "alice");
        assert_eq!(report.valid_prefix, 2);
        assert!(matches!(report.error, Some(ChainError::MissingPrev { .. })));
    }

    #[test]
    fn test_other_senders_ignored() {
        let mut events = make_chain("alice", 3);
        events.extend(make_chain("bob", 2));
        assert!(verify_chain(&events, "alice"));
        assert!(verify_chain(&events, "bob"));
        assert_eq!(build_hash_chain(&events, "bob").len(), 2);
        assert!(verify_chain(&events, "carol"));
    }

    #[test]
    fn test_reused_id_is_not_linked() {
        let chain = make_chain("alice", 2);
        let report = check_chain(&chain, "alice");
        assert!(report.is_linked(&chain[1]));

        let impostor = EventBuilder::message("lobby", "alice", "forged")
            .id(chain[1].id().clone())
            .timestamp(T + 1)
            .prev(record_hash(&chain[0]))
            .build()
            .unwrap();
        assert!(!report.is_linked(&impostor));

        let other_sender = EventBuilder::message("lobby", "bob", "m1")
            .id(chain[0].id().clone())
            .timestamp(T)
            .build()
            .unwrap();
        assert!(!report.is_linked(&other_sender));
    }

    #[test]
    fn test_hash_ignores_signature() {
        let event = EventBuilder::message("lobby", "alice", "hi").build().unwrap();
        let signed = sign_record(event.clone(), &Keypair::generate());
        assert_eq!(record_hash(&event), record_hash(&signed));
    }

    #[test]
    fn test_equal_timestamps_ordered_by_id() {
        let a = EventBuilder::message("lobby", "alice", "a").timestamp(T).build().unwrap();
        let b = EventBuilder::message("lobby", "alice", "b").timestamp(T).build().unwrap();
        let events = vec![a.clone(), b.clone()];
        let ordered = ordered_for_sender(&events, "alice");
        let (first, second) = if a.id() < b.id() { (&a, &b) } else { (&b, &a) };
        assert_eq!(ordered[0].id(), first.id());
        assert_eq!(ordered[1].id(), second.id());
    }
}
