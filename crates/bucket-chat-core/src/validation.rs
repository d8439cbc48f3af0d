//! Record validation: timestamp bounds, id shape, and payload schema.
//!
//! Every check runs both when an event is built and when one is read back
//! from the wire. A failing check rejects the whole record.

use crate::error::SchemaError;
use crate::event::Event;
use crate::types::EventId;

/// How far ahead of the local clock a timestamp may be (one hour).
pub const MAX_FUTURE_SKEW_MS: i64 = 3_600_000;

/// Check a timestamp is positive and not too far ahead of `now_ms`.
pub fn validate_timestamp(timestamp_ms: i64, now_ms: i64) -> Result<(), SchemaError> {
    if timestamp_ms <= 0 {
        return Err(SchemaError::NonPositiveTimestamp(timestamp_ms));
    }
    if timestamp_ms > now_ms.saturating_add(MAX_FUTURE_SKEW_MS) {
        return Err(SchemaError::TimestampInFuture {
            timestamp_ms,
            now_ms,
        });
    }
    Ok(())
}

/// Check an id has exactly three parts and names `room_id`.
pub fn validate_id(id: &EventId, room_id: &str) -> Result<(), SchemaError> {
    id.validate_for_room(room_id)
}

/// Validate an event against a given clock reading.
pub fn validate_event_at(event: &Event, now_ms: i64) -> Result<(), SchemaError> {
    validate_timestamp(event.timestamp_ms(), now_ms)?;
    validate_id(event.id(), event.room_id())?;
    if event.sender_id().is_empty() {
        return Err(SchemaError::EmptyField { field: "sender_id" });
    }
    if let Some(parent) = event.parent_id() {
        if parent.as_str().is_empty() {
            return Err(SchemaError::EmptyField { field: "parent_id" });
        }
    }
    event.content().validate()
}

/// Validate an event against the local clock.
pub fn validate_event(event: &Event) -> Result<(), SchemaError> {
    validate_event_at(event, crate::event::now_millis())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventBuilder;

    const NOW: i64 = 1_736_870_400_000;
    const MINUTE: i64 = 60_000;

    #[test]
    fn test_timestamp_bounds() {
        assert!(validate_timestamp(NOW, NOW).is_ok());
        assert!(validate_timestamp(NOW + 30 * MINUTE, NOW).is_ok());
        assert!(validate_timestamp(NOW + MAX_FUTURE_SKEW_MS, NOW).is_ok());
        assert!(matches!(
            validate_timestamp(NOW + 120 * MINUTE, NOW),
            Err(SchemaError::TimestampInFuture { .. })
        ));
        assert_eq!(
            validate_timestamp(0, NOW),
            Err(SchemaError::NonPositiveTimestamp(0))
        );
        assert_eq!(
            validate_timestamp(-5, NOW),
            Err(SchemaError::NonPositiveTimestamp(-5))
        );
    }

    #[test]
    fn test_validate_event_at_uses_given_clock() {
        let event = EventBuilder::message("lobby", "alice", "hi")
            .timestamp(NOW)
            .build_at(NOW)
            .unwrap();

        assert!(validate_event_at(&event, NOW).is_ok());
        // A verifier whose clock is two hours behind sees it as future-dated.
        assert!(validate_event_at(&event, NOW - 120 * MINUTE).is_err());
    }

    #[test]
    fn test_validate_id() {
        let good = EventId::generate("lobby", NOW);
        assert!(validate_id(&good, "lobby").is_ok());
        assert!(matches!(
            validate_id(&EventId::from("room::onlytwo"), "room"),
            Err(SchemaError::MalformedId(_))
        ));
        assert!(matches!(
            validate_id(&good, "other"),
            Err(SchemaError::RoomMismatch { .. })
        ));
    }
}
