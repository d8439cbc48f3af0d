//! Integrity verification of stored room history.
//!
//! A reader needs nothing but the storage handle and the senders' public
//! keys. Every event is classified, never dropped: an event is *trusted*
//! only when its signature verifies against its sender's key and it sits
//! inside the correctly linked prefix of that sender's chain.

use std::collections::{BTreeSet, HashMap, HashSet};

use bucket_chat_core::{
    check_chain, record_hash, signature_status, ChainError, Event, EventHash, EventId, PublicKey,
    SchemaError, SignatureStatus,
};
use bucket_chat_store::{SegmentPath, Storage};
use tracing::{debug, info, warn};

use crate::error::Result;

/// Public keys of the senders a reader trusts, by sender id.
#[derive(Debug, Clone, Default)]
pub struct TrustedKeys {
    keys: HashMap<String, PublicKey>,
}

impl TrustedKeys {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a sender to a key. Returns the key it replaced, if any.
    pub fn insert(&mut self, sender_id: &str, public_key: PublicKey) -> Option<PublicKey> {
        self.keys.insert(sender_id.to_string(), public_key)
    }

    /// Builder form of [`insert`](Self::insert).
    pub fn with(mut self, sender_id: &str, public_key: PublicKey) -> Self {
        self.insert(sender_id, public_key);
        self
    }

    pub fn get(&self, sender_id: &str) -> Option<&PublicKey> {
        self.keys.get(sender_id)
    }

    pub fn contains(&self, sender_id: &str) -> bool {
        self.keys.contains_key(sender_id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl FromIterator<(String, PublicKey)> for TrustedKeys {
    fn from_iter<I: IntoIterator<Item = (String, PublicKey)>>(iter: I) -> Self {
        Self {
            keys: iter.into_iter().collect(),
        }
    }
}

/// One event and what verification found about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedEvent {
    pub event: Event,
    pub signature: SignatureStatus,

    /// Inside the valid prefix of the sender's chain.
    pub chained: bool,

    /// Valid signature and chained.
    pub trusted: bool,
}

/// Chain outcome for one sender.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainSummary {
    pub sender_id: String,
    pub events: usize,
    pub valid_prefix: usize,
    pub error: Option<ChainError>,
}

impl ChainSummary {
    pub fn is_intact(&self) -> bool {
        self.error.is_none()
    }
}

/// A stored line that did not yield a usable event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedRecord {
    pub segment: SegmentPath,
    /// 1-based line number within the segment.
    pub line_no: usize,
    pub error: SchemaError,
}

/// A segment that could not be read at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnreadableSegment {
    pub segment: SegmentPath,
    pub error: String,
}

/// Everything found while verifying a set of events or segments.
#[derive(Debug, Clone, Default)]
pub struct VerificationReport {
    /// All parsed events in `(timestamp_ms, id)` order.
    pub events: Vec<VerifiedEvent>,
    /// Per-sender chain outcomes, by sender id.
    pub chains: Vec<ChainSummary>,
    pub malformed: Vec<MalformedRecord>,
    pub unreadable: Vec<UnreadableSegment>,
    /// Ids carried by more than one distinct event.
    pub conflicts: Vec<EventId>,
    /// Segments that were read, including empty ones.
    pub segments_read: usize,
}

impl VerificationReport {
    /// Trusted events, in order.
    pub fn trusted(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(|v| v.trusted).map(|v| &v.event)
    }

    /// Events that failed signature or chain checks.
    pub fn untrusted(&self) -> impl Iterator<Item = &VerifiedEvent> {
        self.events.iter().filter(|v| !v.trusted)
    }

    pub fn trusted_count(&self) -> usize {
        self.events.iter().filter(|v| v.trusted).count()
    }

    /// The chain outcome for one sender.
    pub fn chain(&self, sender_id: &str) -> Option<&ChainSummary> {
        self.chains.iter().find(|c| c.sender_id == sender_id)
    }

    /// No untrusted events, bad lines, unreadable segments or id conflicts.
    pub fn is_clean(&self) -> bool {
        self.malformed.is_empty()
            && self.unreadable.is_empty()
            && self.conflicts.is_empty()
            && self.events.iter().all(|v| v.trusted)
    }
}

/// Verifies signatures and chains against a fixed set of trusted keys.
///
/// Stateless between calls: each call judges only the events it is given.
#[derive(Debug, Clone, Default)]
pub struct IntegrityVerifier {
    keys: TrustedKeys,
}

impl IntegrityVerifier {
    pub fn new(keys: TrustedKeys) -> Self {
        Self { keys }
    }

    pub fn keys(&self) -> &TrustedKeys {
        &self.keys
    }

    pub fn keys_mut(&mut self) -> &mut TrustedKeys {
        &mut self.keys
    }

    // ─────────────────────────────────────────────────────────────────────────
    // In-memory
    // ─────────────────────────────────────────────────────────────────────────

    /// Signature status of a single event.
    pub fn verify_event(&self, event: &Event) -> SignatureStatus {
        signature_status(event, self.keys.get(event.sender_id()))
    }

    /// Verify already-parsed events.
    pub fn verify_events(&self, events: Vec<Event>) -> VerificationReport {
        let mut report = VerificationReport::default();
        self.assess(events, &mut report);
        report
    }

    fn assess(&self, events: Vec<Event>, report: &mut VerificationReport) {
        let events = dedupe(events);
        report.conflicts = conflicting_ids(&events);

        let senders: BTreeSet<String> = events.iter().map(|e| e.sender_id().to_string()).collect();
        // Keyed by content, not id: an id can be reused by a forged event.
        let mut linked: HashSet<(String, EventHash)> = HashSet::new();
        for sender_id in senders {
            let chain = check_chain(&events, &sender_id);
            if let Some(error) = &chain.error {
                warn!(
                    sender_id = %sender_id,
                    linked = chain.valid_prefix,
                    total = chain.ordered.len(),
                    error = %error,
                    "hash chain broken"
                );
            }
            linked.extend(
                chain
                    .linked()
                    .iter()
                    .map(|e| (e.sender_id().to_string(), record_hash(e))),
            );
            report.chains.push(ChainSummary {
                events: chain.ordered.len(),
                valid_prefix: chain.valid_prefix,
                error: chain.error.clone(),
                sender_id,
            });
        }

        for event in events {
            let signature = self.verify_event(&event);
            if !signature.is_valid() {
                warn!(
                    event_id = %event.id(),
                    sender_id = event.sender_id(),
                    status = ?signature,
                    "signature not verified"
                );
            }
            let chained = linked.contains(&(event.sender_id().to_string(), record_hash(&event)));
            report.events.push(VerifiedEvent {
                trusted: signature.is_valid() && chained,
                signature,
                chained,
                event,
            });
        }
        report.events.sort_by(|a, b| {
            a.event
                .timestamp_ms()
                .cmp(&b.event.timestamp_ms())
                .then_with(|| a.event.id().cmp(b.event.id()))
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Storage
    // ─────────────────────────────────────────────────────────────────────────

    /// Read and verify the given segments as one body of history.
    ///
    /// Bad lines and unreadable segments are reported and skipped.
    pub async fn verify_segments(&self, storage: &Storage, segments: &[SegmentPath]) -> VerificationReport {
        let mut report = VerificationReport::default();
        let mut events = Vec::new();

        for segment in segments {
            let lines = match storage.read_segment(segment).await {
                Ok(lines) => lines,
                Err(e) => {
                    warn!(segment = %segment, error = %e, "skipping unreadable segment");
                    report.unreadable.push(UnreadableSegment {
                        segment: segment.clone(),
                        error: e.to_string(),
                    });
                    continue;
                }
            };
            report.segments_read += 1;

            for (idx, line) in lines.into_iter().enumerate() {
                let parsed = match line {
                    Ok(text) if text.trim().is_empty() => continue,
                    Ok(text) => Event::from_json_line(&text).and_then(|e| stored_in_room(e, &segment.room_id)),
                    Err(e) => Err(SchemaError::Malformed(format!("invalid UTF-8: {e}"))),
                };
                match parsed {
                    Ok(event) => events.push(event),
                    Err(error) => {
                        warn!(segment = %segment, line = idx + 1, error = %error, "skipping malformed line");
                        report.malformed.push(MalformedRecord {
                            segment: segment.clone(),
                            line_no: idx + 1,
                            error,
                        });
                    }
                }
            }
        }

        self.assess(events, &mut report);
        report
    }

    /// Verify a room's whole history, or one day of it.
    pub async fn verify_room(&self, storage: &Storage, room_id: &str, day: Option<&str>) -> Result<VerificationReport> {
        let segments = storage.list_segments(room_id, day).await?;
        let report = self.verify_segments(storage, &segments).await;
        info!(
            room_id,
            segments = segments.len(),
            events = report.events.len(),
            trusted = report.trusted_count(),
            "room verified"
        );
        Ok(report)
    }
}

/// An event must live under its own room.
fn stored_in_room(event: Event, room_id: &str) -> std::result::Result<Event, SchemaError> {
    if event.room_id() != room_id {
        return Err(SchemaError::Malformed(format!(
            "event for room {:?} stored under room {room_id:?}",
            event.room_id()
        )));
    }
    Ok(event)
}

/// Drop exact repeats of an event. Conflicting events sharing an id are
/// kept so the chain check sees them.
fn dedupe(events: Vec<Event>) -> Vec<Event> {
    let mut kept: Vec<Event> = Vec::with_capacity(events.len());
    let mut index: HashMap<EventId, usize> = HashMap::new();
    for event in events {
        if let Some(&i) = index.get(event.id()) {
            if kept[i] == event {
                debug!(event_id = %event.id(), "dropping duplicate event");
                continue;
            }
        } else {
            index.insert(event.id().clone(), kept.len());
        }
        kept.push(event);
    }
    kept
}

/// Ids shared by distinct events, in sorted order.
fn conflicting_ids(events: &[Event]) -> Vec<EventId> {
    let mut seen: HashSet<&EventId> = HashSet::new();
    let mut conflicts: BTreeSet<EventId> = BTreeSet::new();
    for event in events {
        if !seen.insert(event.id()) {
            conflicts.insert(event.id().clone());
        }
    }
    for id in &conflicts {
        warn!(event_id = %id, "distinct events share an id");
    }
    conflicts.into_iter().collect()
}
