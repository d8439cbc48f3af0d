//! Golden test vectors for deterministic verification.
//!
//! Each vector fixes every input of an event, including its id, and records
//! the canonical bytes, chain hash and Ed25519 signature any conforming
//! implementation must produce. The first three vectors form one chain.

use bucket_chat_core::{
    canonical_bytes, record_hash, sign_record, Content, Event, EventBuilder, EventHash, EventId,
    Keypair, MemberContent, Membership,
};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct GoldenVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// Seed for deterministic key generation.
    pub seed: [u8; 32],
    pub id: &'static str,
    pub room_id: &'static str,
    pub sender_id: &'static str,
    pub timestamp_ms: i64,
    pub content: fn() -> Content,
    pub prev_hash: Option<&'static str>,
    /// Expected base64 public key of `seed`.
    pub expected_public_key: &'static str,
    /// Expected canonical encoding.
    pub expected_canonical: &'static str,
    /// Expected base64 SHA-256 of the canonical encoding.
    pub expected_hash: &'static str,
    /// Expected base64 signature.
    pub expected_signature: &'static str,
}

const ALICE_KEY: &str = "IVL40Zt5HSRFMkLhXy6rbLfP+ntqXtMAl5YOBpiB2xI=";
const BOB_KEY: &str = "O2onvM62pC1io6jQKm8Nc2UyFXcd4kOmOsBIoYtZ2ik=";
const FIRST_ID: &str = "lobby::2025-01-14T16:00:00.000Z::00000000-0000-4000-8000-000000000001";

/// Get all golden test vectors.
pub fn all_vectors() -> Vec<GoldenVector> {
    vec![
        GoldenVector {
            name: "first message of a chain",
            seed: [0x42; 32],
            id: FIRST_ID,
            room_id: "lobby",
            sender_id: "alice@example.com",
            timestamp_ms: 1_736_870_400_000, // 2025-01-14T16:00:00Z
            content: || Content::message("hello"),
            prev_hash: None,
            expected_public_key: ALICE_KEY,
            expected_canonical: r#"{"content":{"body":"hello","msgtype":"text"},"id":"lobby::2025-01-14T16:00:00.000Z::00000000-0000-4000-8000-000000000001","kind":"message","parent_id":null,"prev_hash":null,"room_id":"lobby","sender_id":"alice@example.com","timestamp_ms":1736870400000}"#,
            expected_hash: "wGIGpGMUvcbNgu6dINC9+eMaTZM9d0P8NlwIjRwe4yU=",
            expected_signature: "nc6TVGFXlQW7YGVQ4dwQ7S1nIETGhsPB28+ehe+xD7TA088ad52UpAHRUNM7IobHMZabAx+Tb4L/l7PRW1SEBg==",
        },
        GoldenVector {
            name: "member join with display name",
            seed: [0x42; 32],
            id: "lobby::2025-01-14T16:00:01.000Z::00000000-0000-4000-8000-000000000002",
            room_id: "lobby",
            sender_id: "alice@example.com",
            timestamp_ms: 1_736_870_401_000,
            content: || Content::Member(MemberContent::new(Membership::Join).displayname("Alice")),
            prev_hash: Some("wGIGpGMUvcbNgu6dINC9+eMaTZM9d0P8NlwIjRwe4yU="),
            expected_public_key: ALICE_KEY,
            expected_canonical: r#"{"content":{"displayname":"Alice","membership":"join"},"id":"lobby::2025-01-14T16:00:01.000Z::00000000-0000-4000-8000-000000000002","kind":"member","parent_id":null,"prev_hash":"wGIGpGMUvcbNgu6dINC9+eMaTZM9d0P8NlwIjRwe4yU=","room_id":"lobby","sender_id":"alice@example.com","timestamp_ms":1736870401000}"#,
            expected_hash: "wcoYYJ6mf5keYQHbmR90Ep/h2J+9m7DlaAt6o9xBbGo=",
            expected_signature: "NjtOrPLtJnD1XcVrZMpYQFsQ+2P4/Km83G34RsrlrWb0VynDVcXVizR1AZK+DcC15EuXwK6E5mOai0PISXYXDQ==",
        },
        GoldenVector {
            name: "reaction outside the BMP",
            seed: [0x42; 32],
            id: "lobby::2025-01-14T16:00:02.000Z::00000000-0000-4000-8000-000000000003",
            room_id: "lobby",
            sender_id: "alice@example.com",
            timestamp_ms: 1_736_870_402_000,
            content: || Content::reaction(EventId::new(FIRST_ID), "👍"),
            prev_hash: Some("wcoYYJ6mf5keYQHbmR90Ep/h2J+9m7DlaAt6o9xBbGo="),
            expected_public_key: ALICE_KEY,
            expected_canonical: r#"{"content":{"reaction":"\ud83d\udc4d","relates_to":"lobby::2025-01-14T16:00:00.000Z::00000000-0000-4000-8000-000000000001"},"id":"lobby::2025-01-14T16:00:02.000Z::00000000-0000-4000-8000-000000000003","kind":"reaction","parent_id":null,"prev_hash":"wcoYYJ6mf5keYQHbmR90Ep/h2J+9m7DlaAt6o9xBbGo=","room_id":"lobby","sender_id":"alice@example.com","timestamp_ms":1736870402000}"#,
            expected_hash: "vZiWp9AiYba58mJIYBadw5piO9WPUqJwBmAETIm15Fo=",
            expected_signature: "zQAT4savzoUNZUYU5B1S8rNZSNt6ezotC0C+prgu8os5V6WkJsblIUr/6rKhJrWnd85GdPgbwSC4VyqGlmDpAw==",
        },
        GoldenVector {
            name: "typing from a second sender",
            seed: [0x00; 32],
            id: "lobby::2025-01-14T16:00:03.000Z::00000000-0000-4000-8000-000000000004",
            room_id: "lobby",
            sender_id: "bob@example.com",
            timestamp_ms: 1_736_870_403_000,
            content: || Content::typing(true),
            prev_hash: None,
            expected_public_key: BOB_KEY,
            expected_canonical: r#"{"content":{"typing":true},"id":"lobby::2025-01-14T16:00:03.000Z::00000000-0000-4000-8000-000000000004","kind":"typing","parent_id":null,"prev_hash":null,"room_id":"lobby","sender_id":"bob@example.com","timestamp_ms":1736870403000}"#,
            expected_hash: "bLJjmw+EQIRZbngT5YHJPp39CcZZHSRH2nIoLDdGfJk=",
            expected_signature: "hh1Aa1DuGvP37p7Cs8nNLZrUNsR0OUxjfw719w8TmdVgmx3CXKshW5wpAMCt1biJxFfm3to0wh+4GIsZfn4JBg==",
        },
    ]
}

/// Build and sign the event a vector describes.
pub fn event_from_vector(vector: &GoldenVector) -> Event {
    let keypair = Keypair::from_seed(&vector.seed);
    let mut builder = EventBuilder::new(vector.room_id, vector.sender_id, (vector.content)())
        .id(EventId::new(vector.id))
        .timestamp(vector.timestamp_ms);
    if let Some(prev) = vector.prev_hash {
        builder = builder.prev(EventHash::new(prev));
    }
    let event = builder.build().expect("golden vector is valid");
    sign_record(event, &keypair)
}

/// Check every vector. Returns `(name, matches, mismatch description)`.
///
/// Call this to verify your implementation matches the reference.
pub fn verify_all_vectors() -> Vec<(String, bool, String)> {
    all_vectors()
        .iter()
        .map(|v| {
            let event = event_from_vector(v);
            let canonical = String::from_utf8_lossy(&canonical_bytes(&event)).into_owned();
            let hash = record_hash(&event);
            let public_key = Keypair::from_seed(&v.seed).public_key().to_base64();

            let mut mismatches = Vec::new();
            if public_key != v.expected_public_key {
                mismatches.push(format!("public key {public_key}"));
            }
            if canonical != v.expected_canonical {
                mismatches.push(format!("canonical {canonical}"));
            }
            if hash.as_str() != v.expected_hash {
                mismatches.push(format!("hash {hash}"));
            }
            if event.signature() != Some(v.expected_signature) {
                mismatches.push(format!("signature {:?}", event.signature()));
            }

            (v.name.to_string(), mismatches.is_empty(), mismatches.join("; "))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bucket_chat_core::{verify_chain, verify_record};

    #[test]
    fn test_all_vectors_match() {
        for (name, matches, detail) in verify_all_vectors() {
            assert!(matches, "vector '{name}' mismatched: {detail}");
        }
    }

    #[test]
    fn test_vector_chain_links() {
        let events: Vec<Event> = all_vectors().iter().map(event_from_vector).collect();
        assert!(verify_chain(&events, "alice@example.com"));
        assert!(verify_chain(&events, "bob@example.com"));
    }

    #[test]
    fn test_vectors_verify() {
        for vector in all_vectors() {
            let event = event_from_vector(&vector);
            let key = Keypair::from_seed(&vector.seed).public_key();
            assert!(verify_record(&event, &key), "vector '{}'", vector.name);
        }
    }

    #[test]
    fn test_vector_lines_parse_back() {
        for vector in all_vectors() {
            let event = event_from_vector(&vector);
            let line = event.to_json_line().unwrap();
            assert_eq!(Event::from_json_line(&line).unwrap(), event);
        }
    }
}
