//! Inbound live events delivered by the account provider's realtime feed.

use serde::{Deserialize, Serialize};

use crate::models::Message;
use crate::types::{ConversationId, Presence, UserId};

/// One event from the realtime feed. Events may arrive in any order
/// across conversations; ordering only matters within a single
/// conversation's message sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LiveEvent {
    /// A remotely-originated message (or the echo of a local send).
    Message {
        conversation_id: ConversationId,
        message: Message,
    },
    /// A participant's presence changed.
    Presence {
        participant_id: UserId,
        status: Presence,
    },
}
