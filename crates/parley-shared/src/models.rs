//! Domain model structs owned by the session core.
//!
//! Every struct derives `Serialize` and `Deserialize` so snapshots can be
//! handed directly to a presentation layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ConversationId, DeliveryState, MessageId, Presence, UserId};

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// The authenticated identity, as issued by the account provider.
///
/// Immutable once issued; replaced wholesale on sign-in / sign-out.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    /// Provider-issued id.
    pub id: UserId,
    /// Email the account was registered with.
    pub email: String,
    /// Whether the email has been verified.
    pub verified: bool,
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// User-facing display attributes derived from or about a [`Principal`].
///
/// Derived, not authoritative: the profile resolver fabricates default
/// values (display name from the email local-part, a deterministic avatar
/// reference) when no richer data exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Profile {
    /// Equals the owning `Principal.id`.
    pub id: UserId,
    pub display_name: String,
    pub email: String,
    /// Opaque avatar reference, deterministic per email.
    pub avatar_ref: String,
    /// Current presence indicator, owned by the presence tracker.
    pub status: Presence,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub joined_at: Option<DateTime<Utc>>,
}

/// Partial profile update. Fields left `None` are retained; merge policy
/// is last-write-wins with no conflict detection (single writer).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    pub display_name: Option<String>,
    pub avatar_ref: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Kind-specific payload of a message. The shared envelope (id, sender,
/// timestamp) lives on [`Message`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum MessageKind {
    Text { body: String },
    Image { url: String, caption: Option<String> },
    File { name: String, size: u64, url: String },
}

impl MessageKind {
    /// Text body, if this is a text message.
    pub fn body(&self) -> Option<&str> {
        match self {
            MessageKind::Text { body } => Some(body),
            _ => None,
        }
    }
}

/// A single chat message. Content is immutable after creation; only the
/// delivery state changes. `id` is unique within a conversation and is the
/// sole de-duplication key.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    /// Must reference a participant of the owning conversation.
    pub sender_id: UserId,
    pub sender_name: String,
    pub kind: MessageKind,
    pub timestamp: DateTime<Utc>,
    pub delivery: DeliveryState,
}

impl Message {
    /// Build a text message stamped `now()`, in `Pending` delivery state.
    pub fn text(sender: &Profile, body: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            sender_id: sender.id.clone(),
            sender_name: sender.display_name.clone(),
            kind: MessageKind::Text { body: body.into() },
            timestamp: Utc::now(),
            delivery: DeliveryState::Pending,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// A set of participants and their ordered message history.
///
/// `messages` is kept in insertion order, which equals non-decreasing
/// timestamp order under normal operation; out-of-order delivery is
/// reconciled by the conversation store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Conversation {
    pub id: ConversationId,
    /// Unique by profile id. Includes the local profile when the
    /// conversation is owned by the local session.
    pub participants: Vec<Profile>,
    pub messages: Vec<Message>,
    pub is_group: bool,
    /// Explicit name; group chats usually have one, DMs usually do not.
    pub name: Option<String>,
}

impl Conversation {
    pub fn participant(&self, id: &UserId) -> Option<&Profile> {
        self.participants.iter().find(|p| &p.id == id)
    }

    pub fn has_participant(&self, id: &UserId) -> bool {
        self.participant(id).is_some()
    }

    /// Name to show in a conversation list: the explicit name when set,
    /// otherwise the counterpart's display name for a two-party chat.
    pub fn display_name(&self, local_id: &UserId) -> String {
        if let Some(name) = &self.name {
            return name.clone();
        }
        self.participants
            .iter()
            .find(|p| &p.id != local_id)
            .map(|p| p.display_name.clone())
            .unwrap_or_else(|| "Conversation".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Presence;

    fn profile(id: &str, name: &str) -> Profile {
        Profile {
            id: UserId(id.to_string()),
            display_name: name.to_string(),
            email: format!("{name}@x.com"),
            avatar_ref: String::new(),
            status: Presence::Offline,
            bio: None,
            location: None,
            joined_at: None,
        }
    }

    #[test]
    fn text_message_starts_pending() {
        let alice = profile("u1", "alice");
        let msg = Message::text(&alice, "hi");
        assert_eq!(msg.delivery, DeliveryState::Pending);
        assert_eq!(msg.kind.body(), Some("hi"));
        assert_eq!(msg.sender_id, alice.id);
    }

    #[test]
    fn conversation_display_name_prefers_explicit_name() {
        let local = UserId("u1".to_string());
        let conv = Conversation {
            id: ConversationId::new(),
            participants: vec![profile("u1", "alice"), profile("u2", "bob")],
            messages: vec![],
            is_group: false,
            name: Some("Project".to_string()),
        };
        assert_eq!(conv.display_name(&local), "Project");
    }

    #[test]
    fn conversation_display_name_falls_back_to_counterpart() {
        let local = UserId("u1".to_string());
        let conv = Conversation {
            id: ConversationId::new(),
            participants: vec![profile("u1", "alice"), profile("u2", "bob")],
            messages: vec![],
            is_group: false,
            name: None,
        };
        assert_eq!(conv.display_name(&local), "bob");
    }

    #[test]
    fn message_kind_serializes_tagged() {
        let alice = profile("u1", "alice");
        let msg = Message::text(&alice, "hello");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["kind"]["kind"], "text");
        assert_eq!(json["kind"]["body"], "hello");
    }
}
