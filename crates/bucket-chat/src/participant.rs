//! A writer in one or more rooms.
//!
//! A [`Participant`] binds one sender id, one keypair and one storage handle.
//! Every publish signs its events, links them onto the sender's chain and
//! writes them as one new segment; nothing already stored is rewritten.
//!
//! One identity should have one writer at a time. Two processes publishing
//! as the same sender into the same room fork the chain.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use bucket_chat_core::{
    check_chain, now_millis, parse_jsonl, record_hash, sign_record, Content, Event, EventBuilder,
    EventHash, EventId, Keypair, MemberContent, Membership, PublicKey,
};
use bucket_chat_store::{writer_token, RoomMetadata, SegmentPath, Storage};
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::error::{ChatError, Result};

/// The newest event of a sender's chain in one room.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainHead {
    pub event_id: EventId,
    pub hash: EventHash,
    pub timestamp_ms: i64,
}

impl ChainHead {
    fn of(event: &Event) -> Self {
        Self {
            event_id: event.id().clone(),
            hash: record_hash(event),
            timestamp_ms: event.timestamp_ms(),
        }
    }
}

/// Summary of a room as seen from storage.
#[derive(Debug, Clone)]
pub struct RoomInfo {
    pub room_id: String,
    pub metadata: Option<RoomMetadata>,
    pub segment_count: usize,
    pub recent_message_count: usize,
}

/// Publishes signed, chained events as one sender.
pub struct Participant {
    sender_id: String,
    keypair: Keypair,
    storage: Storage,
    config: ChatConfig,
    heads: Mutex<HashMap<String, ChainHead>>,
}

impl std::fmt::Debug for Participant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Participant")
            .field("sender_id", &self.sender_id)
            .field("public_key", &self.keypair.public_key())
            .field("storage", &self.storage)
            .finish()
    }
}

impl Participant {
    /// A participant with default settings.
    pub fn new(sender_id: &str, keypair: Keypair, storage: Storage) -> Self {
        Self {
            sender_id: sender_id.to_string(),
            keypair,
            storage,
            config: ChatConfig::default(),
            heads: Mutex::new(HashMap::new()),
        }
    }

    /// A participant on the storage named by `config`.
    pub async fn open(sender_id: &str, keypair: Keypair, config: ChatConfig) -> Result<Self> {
        let storage = Storage::open(&config.storage_uri).await?;
        Ok(Self::new(sender_id, keypair, storage).with_config(config))
    }

    pub fn with_config(mut self, config: ChatConfig) -> Self {
        self.config = config;
        self
    }

    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    pub fn public_key(&self) -> PublicKey {
        self.keypair.public_key()
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Membership
    // ─────────────────────────────────────────────────────────────────────────

    /// Create the room if needed and announce this sender in it.
    pub async fn join(&self, room_id: &str, displayname: Option<&str>) -> Result<Event> {
        if self.storage.ensure_room(room_id).await? {
            info!(room_id, sender_id = %self.sender_id, "created room");
        }
        let mut member = MemberContent::new(Membership::Join);
        if let Some(name) = displayname {
            member = member.displayname(name);
        }
        self.publish_one(room_id, Content::Member(member), None).await
    }

    pub async fn leave(&self, room_id: &str) -> Result<Event> {
        self.publish_one(room_id, Content::member(Membership::Leave), None)
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Messages
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn send_message(&self, room_id: &str, body: &str) -> Result<Event> {
        self.publish_one(room_id, Content::message(body), None).await
    }

    /// A message threaded under `parent`.
    pub async fn reply(&self, room_id: &str, parent: &EventId, body: &str) -> Result<Event> {
        self.publish_one(room_id, Content::message(body), Some(parent.clone()))
            .await
    }

    pub async fn react(&self, room_id: &str, target: &EventId, reaction: &str) -> Result<Event> {
        self.publish_one(room_id, Content::reaction(target.clone(), reaction), None)
            .await
    }

    /// Logically delete an event. The target stays in storage.
    pub async fn redact(&self, room_id: &str, target: &EventId, reason: Option<&str>) -> Result<Event> {
        self.publish_one(room_id, Content::redaction(target.clone(), reason), None)
            .await
    }

    pub async fn edit(&self, room_id: &str, target: &EventId, new_body: &str) -> Result<Event> {
        self.publish_one(room_id, Content::edit(target.clone(), new_body), None)
            .await
    }

    pub async fn set_typing(&self, room_id: &str, typing: bool) -> Result<Event> {
        self.publish_one(room_id, Content::typing(typing), None).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Publishing
    // ─────────────────────────────────────────────────────────────────────────

    /// Sign, chain and store a batch of events as one segment.
    ///
    /// Timestamps strictly increase within the batch and after the current
    /// head. An empty batch writes nothing.
    pub async fn publish(&self, room_id: &str, contents: Vec<Content>) -> Result<Vec<Event>> {
        let drafts = contents.into_iter().map(|c| (c, None)).collect();
        self.append(room_id, drafts).await
    }

    async fn publish_one(&self, room_id: &str, content: Content, parent: Option<EventId>) -> Result<Event> {
        self.append(room_id, vec![(content, parent)])
            .await?
            .pop()
            .ok_or_else(|| ChatError::InvalidOperation("publish produced no event".to_string()))
    }

    async fn append(&self, room_id: &str, drafts: Vec<(Content, Option<EventId>)>) -> Result<Vec<Event>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let head = self.head(room_id).await?;
        let now = now_millis();
        let mut last_ts = head.as_ref().map(|h| h.timestamp_ms);
        let mut prev = head.map(|h| h.hash);

        let mut events = Vec::with_capacity(drafts.len());
        for (content, parent) in drafts {
            let ts = last_ts.map_or(now, |last| now.max(last + 1));
            let mut builder = EventBuilder::new(room_id, &self.sender_id, content).timestamp(ts);
            if let Some(parent) = parent {
                builder = builder.parent(parent);
            }
            if let Some(prev) = prev.take() {
                builder = builder.prev(prev);
            }
            let event = sign_record(builder.build_at(now)?, &self.keypair);
            prev = Some(record_hash(&event));
            last_ts = Some(ts);
            events.push(event);
        }

        let (Some(first), Some(last)) = (events.first(), events.last()) else {
            return Ok(events);
        };
        let path = self
            .storage
            .segment_path(room_id, first.timestamp_ms(), last.timestamp_ms(), &self.sender_id)?;
        let lines = events
            .iter()
            .map(Event::to_json_line)
            .collect::<std::result::Result<Vec<_>, _>>()?;
        self.storage.create_segment(&path, &lines).await?;
        debug!(segment = %path, events = events.len(), "published");

        self.lock_heads()
            .insert(room_id.to_string(), ChainHead::of(last));
        Ok(events)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Chain head
    // ─────────────────────────────────────────────────────────────────────────

    /// This sender's chain head in a room; `None` before its first event.
    ///
    /// Read from storage on first use, cached afterwards.
    pub async fn head(&self, room_id: &str) -> Result<Option<ChainHead>> {
        if let Some(head) = self.lock_heads().get(room_id).cloned() {
            return Ok(Some(head));
        }
        let recovered = self.recover_head(room_id).await?;
        if let Some(head) = &recovered {
            self.lock_heads()
                .insert(room_id.to_string(), head.clone());
        }
        Ok(recovered)
    }

    async fn recover_head(&self, room_id: &str) -> Result<Option<ChainHead>> {
        let writer = writer_token(&self.sender_id);
        let segments: Vec<SegmentPath> = self
            .storage
            .list_segments(room_id, None)
            .await?
            .into_iter()
            .filter(|s| s.writer == writer)
            .collect();

        let mut events = Vec::new();
        for segment in &segments {
            let parsed = read_segment_events(&self.storage, segment).await;
            events.extend(parsed.into_iter().filter(|e| e.sender_id() == self.sender_id));
        }

        let chain = check_chain(&events, &self.sender_id);
        if let Some(error) = &chain.error {
            warn!(room_id, error = %error, "own chain is broken, continuing from the newest event");
        }
        let head = chain.ordered.last().map(|e| ChainHead::of(e));
        debug!(room_id, segments = segments.len(), events = events.len(), "recovered chain head");
        Ok(head)
    }

    fn lock_heads(&self) -> MutexGuard<'_, HashMap<String, ChainHead>> {
        self.heads.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reading
    // ─────────────────────────────────────────────────────────────────────────

    /// The newest messages of a room, oldest first.
    ///
    /// Scans the newest `recent_segments` segments and returns at most
    /// `limit` (default `history_limit`) messages. Signatures are not checked
    /// here; use [`IntegrityVerifier`](crate::IntegrityVerifier) for that.
    pub async fn recent_messages(&self, room_id: &str, limit: Option<usize>) -> Result<Vec<Event>> {
        let limit = limit.unwrap_or(self.config.history_limit);
        let segments = self.storage.list_segments(room_id, None).await?;
        let skip = segments.len().saturating_sub(self.config.recent_segments);

        let mut messages = Vec::new();
        for segment in &segments[skip..] {
            let events = read_segment_events(&self.storage, segment).await;
            messages.extend(events.into_iter().filter(Event::is_message));
        }

        messages.sort_by(|a, b| {
            a.timestamp_ms()
                .cmp(&b.timestamp_ms())
                .then_with(|| a.id().cmp(b.id()))
        });
        let excess = messages.len().saturating_sub(limit);
        messages.drain(..excess);
        Ok(messages)
    }

    pub async fn room_info(&self, room_id: &str) -> Result<RoomInfo> {
        let metadata = self.storage.room_metadata(room_id).await?;
        let segment_count = self.storage.list_segments(room_id, None).await?.len();
        let recent_message_count = self.recent_messages(room_id, None).await?.len();
        Ok(RoomInfo {
            room_id: room_id.to_string(),
            metadata,
            segment_count,
            recent_message_count,
        })
    }
}

/// The events of one segment. Unreadable segments and bad lines are logged
/// and skipped.
async fn read_segment_events(storage: &Storage, segment: &SegmentPath) -> Vec<Event> {
    let lines = match storage.read_segment(segment).await {
        Ok(lines) => lines,
        Err(e) => {
            warn!(segment = %segment, error = %e, "skipping unreadable segment");
            return Vec::new();
        }
    };
    let total = lines.len();
    let texts: Vec<String> = lines.into_iter().filter_map(|line| line.ok()).collect();
    let undecodable = total - texts.len();

    let (events, malformed) = parse_jsonl(&texts.join("\n"));
    if undecodable + malformed.len() > 0 {
        warn!(
            segment = %segment,
            count = undecodable + malformed.len(),
            "skipped malformed lines"
        );
    }
    events
}
