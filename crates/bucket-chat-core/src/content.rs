//! Typed event payloads.
//!
//! Every event kind carries exactly one payload type. The set is closed: the
//! [`Content`] enum is the only way to attach content to an event, and each
//! payload validates itself once, at construction or deserialization.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SchemaError;
use crate::types::EventId;

/// Default `msgtype` for message content.
pub const DEFAULT_MSGTYPE: &str = "text";

/// The kind of an event, determining how `content` is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Message,
    Member,
    Redaction,
    Edit,
    Reaction,
    Typing,
}

impl EventKind {
    pub const ALL: [EventKind; 6] = [
        EventKind::Message,
        EventKind::Member,
        EventKind::Redaction,
        EventKind::Edit,
        EventKind::Reaction,
        EventKind::Typing,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Message => "message",
            EventKind::Member => "member",
            EventKind::Redaction => "redaction",
            EventKind::Edit => "edit",
            EventKind::Reaction => "reaction",
            EventKind::Typing => "typing",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| SchemaError::UnknownKind(s.to_string()))
    }
}

/// Membership actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Membership {
    Join,
    Leave,
    Invite,
    Ban,
    Kick,
}

impl Membership {
    pub fn as_str(self) -> &'static str {
        match self {
            Membership::Join => "join",
            Membership::Leave => "leave",
            Membership::Invite => "invite",
            Membership::Ban => "ban",
            Membership::Kick => "kick",
        }
    }
}

impl FromStr for Membership {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "join" => Ok(Membership::Join),
            "leave" => Ok(Membership::Leave),
            "invite" => Ok(Membership::Invite),
            "ban" => Ok(Membership::Ban),
            "kick" => Ok(Membership::Kick),
            other => Err(SchemaError::InvalidMembership(other.to_string())),
        }
    }
}

/// `message` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MessageContent {
    pub body: String,
    #[serde(default = "default_msgtype")]
    pub msgtype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formatted_body: Option<String>,
}

fn default_msgtype() -> String {
    DEFAULT_MSGTYPE.to_string()
}

impl MessageContent {
    /// Plain text message; the body is trimmed.
    pub fn text(body: &str) -> Self {
        Self {
            body: body.trim().to_string(),
            msgtype: default_msgtype(),
            format: None,
            formatted_body: None,
        }
    }

    /// Attach a formatted rendition of the body.
    pub fn with_formatted(mut self, format: &str, formatted_body: &str) -> Self {
        self.format = Some(format.to_string());
        self.formatted_body = Some(formatted_body.to_string());
        self
    }

    pub fn validate(&self) -> Result<(), SchemaError> {
        if self.body.trim().is_empty() {
            return Err(SchemaError::EmptyBody);
        }
        if self.msgtype.is_empty() {
            return Err(SchemaError::EmptyField { field: "msgtype" });
        }
        Ok(())
    }
}

/// `member` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemberContent {
    pub membership: Membership,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub displayname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl MemberContent {
    pub fn new(membership: Membership) -> Self {
        Self {
            membership,
            displayname: None,
            avatar_url: None,
            reason: None,
        }
    }

    pub fn displayname(mut self, name: &str) -> Self {
        self.displayname = Some(name.to_string());
        self
    }

    pub fn avatar_url(mut self, url: &str) -> Self {
        self.avatar_url = Some(url.to_string());
        self
    }

    pub fn reason(mut self, reason: &str) -> Self {
        self.reason = Some(reason.to_string());
        self
    }
}

/// `redaction` payload: logical deletion of another event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RedactionContent {
    pub redacts: EventId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RedactionContent {
    pub fn validate(&self) -> Result<(), SchemaError> {
        require_reference("redacts", &self.redacts)
    }
}

/// `edit` payload: replacement content for an earlier message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EditContent {
    pub replaces: EventId,
    pub new_content: MessageContent,
}

impl EditContent {
    pub fn validate(&self) -> Result<(), SchemaError> {
        require_reference("replaces", &self.replaces)?;
        self.new_content.validate()
    }
}

/// `reaction` payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReactionContent {
    pub relates_to: EventId,
    pub reaction: String,
}

impl ReactionContent {
    pub fn validate(&self) -> Result<(), SchemaError> {
        require_reference("relates_to", &self.relates_to)?;
        if self.reaction.trim().is_empty() {
            return Err(SchemaError::EmptyReaction);
        }
        Ok(())
    }
}

/// `typing` payload: an ephemeral typing notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TypingContent {
    pub typing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn require_reference(field: &'static str, id: &EventId) -> Result<(), SchemaError> {
    if id.as_str().trim().is_empty() {
        return Err(SchemaError::MissingReference { field });
    }
    Ok(())
}

/// Event content: one typed payload per [`EventKind`].
///
/// Serializes as the bare payload; the kind travels beside it on the event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Content {
    Message(MessageContent),
    Member(MemberContent),
    Redaction(RedactionContent),
    Edit(EditContent),
    Reaction(ReactionContent),
    Typing(TypingContent),
}

impl Content {
    /// Plain text message content.
    pub fn message(body: &str) -> Self {
        Content::Message(MessageContent::text(body))
    }

    pub fn member(membership: Membership) -> Self {
        Content::Member(MemberContent::new(membership))
    }

    pub fn redaction(target: EventId, reason: Option<&str>) -> Self {
        Content::Redaction(RedactionContent {
            redacts: target,
            reason: reason.map(str::to_string),
        })
    }

    pub fn edit(target: EventId, new_body: &str) -> Self {
        Content::Edit(EditContent {
            replaces: target,
            new_content: MessageContent::text(new_body),
        })
    }

    /// Reaction content; the reaction text is trimmed.
    pub fn reaction(target: EventId, reaction: &str) -> Self {
        Content::Reaction(ReactionContent {
            relates_to: target,
            reaction: reaction.trim().to_string(),
        })
    }

    pub fn typing(typing: bool) -> Self {
        Content::Typing(TypingContent {
            typing,
            timeout_ms: None,
        })
    }

    /// The event kind this payload belongs to.
    pub fn kind(&self) -> EventKind {
        match self {
            Content::Message(_) => EventKind::Message,
            Content::Member(_) => EventKind::Member,
            Content::Redaction(_) => EventKind::Redaction,
            Content::Edit(_) => EventKind::Edit,
            Content::Reaction(_) => EventKind::Reaction,
            Content::Typing(_) => EventKind::Typing,
        }
    }

    /// Check the payload against its own schema.
    pub fn validate(&self) -> Result<(), SchemaError> {
        match self {
            Content::Message(c) => c.validate(),
            Content::Member(_) => Ok(()),
            Content::Redaction(c) => c.validate(),
            Content::Edit(c) => c.validate(),
            Content::Reaction(c) => c.validate(),
            Content::Typing(_) => Ok(()),
        }
    }

    /// Interpret a JSON object as the payload of `kind`, validating it.
    pub fn from_value(kind: EventKind, value: Value) -> Result<Self, SchemaError> {
        let content = match kind {
            EventKind::Message => Content::Message(parse_payload(kind, value)?),
            EventKind::Member => Content::Member(parse_member(value)?),
            EventKind::Redaction => Content::Redaction(parse_payload(kind, value)?),
            EventKind::Edit => Content::Edit(parse_payload(kind, value)?),
            EventKind::Reaction => Content::Reaction(parse_payload(kind, value)?),
            EventKind::Typing => Content::Typing(parse_payload(kind, value)?),
        };
        content.validate()?;
        Ok(content)
    }

    /// The JSON object written as `content` on the wire.
    ///
    /// Optional fields that are unset are omitted.
    pub fn to_value(&self) -> Value {
        // Payloads are plain structs with string keys, so this cannot fail.
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

fn parse_payload<T: serde::de::DeserializeOwned>(
    kind: EventKind,
    value: Value,
) -> Result<T, SchemaError> {
    serde_json::from_value(value).map_err(|e| SchemaError::InvalidContent {
        kind: kind.as_str(),
        reason: e.to_string(),
    })
}

// Membership gets its own error so callers can tell a bad action from a bad shape.
fn parse_member(value: Value) -> Result<MemberContent, SchemaError> {
    if let Some(Value::String(action)) = value.get("membership") {
        action.parse::<Membership>()?;
    }
    parse_payload(EventKind::Member, value)
}
