//! Proptest generators for property-based testing.

use proptest::prelude::*;

use bucket_chat_core::{
    sign_record, Content, Event, EventBuilder, EventHash, EventId, Keypair, MemberContent,
    Membership, PublicKey,
};

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a random public key.
pub fn public_key() -> impl Strategy<Value = PublicKey> {
    keypair().prop_map(|kp| kp.public_key())
}

/// Generate a room id.
pub fn room_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_-]{0,15}".prop_map(String::from)
}

/// Generate a sender id.
pub fn sender_id() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9._]{0,11}@[a-z]{1,8}\\.(com|org|net)".prop_map(String::from)
}

/// Generate a past timestamp.
pub fn timestamp() -> impl Strategy<Value = i64> + Clone {
    1i64..=1_700_000_000_000i64
}

/// Generate text that is non-empty once trimmed, including non-ASCII.
pub fn text() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 .,!?\"\\\\/éßж中👍\n\t]{1,40}"
        .prop_filter("non-empty after trim", |s| !s.trim().is_empty())
}

/// Generate a chain hash.
pub fn event_hash() -> impl Strategy<Value = EventHash> {
    any::<[u8; 32]>().prop_map(|bytes| EventHash::of(&bytes))
}

/// Generate a membership action.
pub fn membership() -> impl Strategy<Value = Membership> {
    prop_oneof![
        Just(Membership::Join),
        Just(Membership::Leave),
        Just(Membership::Invite),
        Just(Membership::Ban),
        Just(Membership::Kick),
    ]
}

/// Generate an event id in `room_id`.
pub fn event_id(room_id: String) -> impl Strategy<Value = EventId> + Clone {
    timestamp().prop_map(move |ts| EventId::generate(&room_id, ts))
}

/// Generate content of any kind. References point into `room_id`.
pub fn content(room_id: String) -> impl Strategy<Value = Content> {
    let target = event_id(room_id);
    prop_oneof![
        text().prop_map(|body| Content::message(&body)),
        (membership(), proptest::option::of(text())).prop_map(|(m, name)| {
            let mut member = MemberContent::new(m);
            if let Some(name) = name {
                member = member.displayname(&name);
            }
            Content::Member(member)
        }),
        (target.clone(), proptest::option::of(text()))
            .prop_map(|(t, reason)| Content::redaction(t, reason.as_deref())),
        (target.clone(), text()).prop_map(|(t, body)| Content::edit(t, &body)),
        (target, text()).prop_map(|(t, r)| Content::reaction(t, &r)),
        any::<bool>().prop_map(Content::typing),
    ]
}

/// Parameters for generating an event.
#[derive(Debug, Clone)]
pub struct EventParams {
    pub keypair: Keypair,
    pub room_id: String,
    pub sender_id: String,
    pub timestamp_ms: i64,
    pub content: Content,
    pub prev_hash: Option<EventHash>,
}

impl Arbitrary for EventParams {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        room_id()
            .prop_flat_map(|room| {
                (
                    keypair(),
                    Just(room.clone()),
                    sender_id(),
                    timestamp(),
                    content(room),
                    proptest::option::of(event_hash()),
                )
            })
            .prop_map(|(keypair, room_id, sender_id, timestamp_ms, content, prev_hash)| EventParams {
                keypair,
                room_id,
                sender_id,
                timestamp_ms,
                content,
                prev_hash,
            })
            .boxed()
    }
}

/// Build and sign an event from parameters.
pub fn event_from_params(params: &EventParams) -> Event {
    let mut builder = EventBuilder::new(&params.room_id, &params.sender_id, params.content.clone())
        .timestamp(params.timestamp_ms);
    if let Some(prev) = &params.prev_hash {
        builder = builder.prev(prev.clone());
    }
    let event = builder.build().expect("generated event is valid");
    sign_record(event, &params.keypair)
}
