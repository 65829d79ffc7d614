//! The conversation store: the owned set of conversations, their ordered
//! message histories, and the focused-conversation selection.
//!
//! Message ordering is insertion order, which equals non-decreasing
//! timestamp order under normal operation. Out-of-order delivery from the
//! live feed is reconciled at apply time: messages are inserted by
//! `(timestamp, intake sequence)` where the sequence number is assigned
//! per conversation, monotonically, at intake. De-duplication is by
//! message id only, which is what makes the local-echo race safe.

use std::collections::HashMap;

use tracing::debug;

use parley_shared::{
    Conversation, ConversationId, DeliveryError, DeliveryState, EventError, Message, MessageId,
    Presence, Profile, UserId,
};

struct Entry {
    conversation: Conversation,
    /// Next intake sequence number for this conversation.
    next_seq: u64,
    /// Intake sequence of every held message, for the ordering tie-break.
    seqs: HashMap<MessageId, u64>,
}

impl Entry {
    fn new(conversation: Conversation) -> Self {
        let seqs = conversation
            .messages
            .iter()
            .enumerate()
            .map(|(i, m)| (m.id, i as u64))
            .collect::<HashMap<_, _>>();
        let next_seq = conversation.messages.len() as u64;
        Self {
            conversation,
            next_seq,
            seqs,
        }
    }
}

#[derive(Default)]
pub struct ConversationStore {
    entries: Vec<Entry>,
    selected: Option<ConversationId>,
    local_id: Option<UserId>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the store from the conversations available at session
    /// start. Every owned conversation is guaranteed to include the local
    /// profile in its participant set. If exactly one conversation exists
    /// and the layout is not single-pane, it is auto-selected; otherwise
    /// selection stays unset until an explicit [`select`](Self::select).
    pub fn load_initial(
        &mut self,
        conversations: Vec<Conversation>,
        local: &Profile,
        single_pane: bool,
    ) {
        self.local_id = Some(local.id.clone());
        self.entries = conversations
            .into_iter()
            .map(|mut c| {
                if !c.has_participant(&local.id) {
                    c.participants.insert(0, local.clone());
                }
                Entry::new(c)
            })
            .collect();

        self.selected = if self.entries.len() == 1 && !single_pane {
            Some(self.entries[0].conversation.id)
        } else {
            None
        };
    }

    /// Set the focused conversation. Constant-time; an unknown id is not
    /// an error, the selection simply resolves to "no conversation
    /// focused".
    pub fn select(&mut self, id: ConversationId) {
        self.selected = Some(id);
    }

    pub fn selected_id(&self) -> Option<ConversationId> {
        self.selected
    }

    /// The focused conversation, if the current selection matches one.
    pub fn focused(&self) -> Option<&Conversation> {
        self.selected.and_then(|id| self.get(id))
    }

    pub fn get(&self, id: ConversationId) -> Option<&Conversation> {
        self.entries
            .iter()
            .find(|e| e.conversation.id == id)
            .map(|e| &e.conversation)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Conversation> {
        self.entries.iter().map(|e| &e.conversation)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append a locally sent message. This is the local echo: the message
    /// lands in the history immediately, in `Pending` state, before any
    /// network round-trip. The persistence hand-off is the caller's
    /// concern.
    pub fn send(
        &mut self,
        id: ConversationId,
        body: &str,
        sender: &Profile,
    ) -> Result<Message, DeliveryError> {
        let entry = self
            .entry_mut(id)
            .ok_or(DeliveryError::UnknownConversation)?;

        let message = Message::text(sender, body);
        let seq = entry.next_seq;
        entry.next_seq += 1;
        entry.seqs.insert(message.id, seq);
        entry.conversation.messages.push(message.clone());
        Ok(message)
    }

    /// Idempotent merge of an inbound message from the live feed.
    ///
    /// A message whose id is already present (e.g. the echo of our own
    /// send) is discarded. Otherwise the message is assigned the next
    /// intake sequence number and inserted in `(timestamp, seq)` order,
    /// so equal timestamps keep a stable, well-defined order across
    /// repeated applies. Remote messages are `Sent` on arrival.
    pub fn apply_remote(
        &mut self,
        id: ConversationId,
        mut message: Message,
    ) -> Result<(), EventError> {
        let entry = self
            .entry_mut(id)
            .ok_or(EventError::UnknownConversation(id))?;

        if !entry.conversation.has_participant(&message.sender_id) {
            return Err(EventError::UnknownSender {
                conversation: id,
                sender: message.sender_id,
            });
        }

        if entry.seqs.contains_key(&message.id) {
            debug!(message_id = %message.id, "duplicate message discarded");
            return Ok(());
        }

        message.delivery = DeliveryState::Sent;
        let seq = entry.next_seq;
        entry.next_seq += 1;

        let pos = entry.conversation.messages.partition_point(|m| {
            let m_seq = entry.seqs.get(&m.id).copied().unwrap_or(0);
            (m.timestamp, m_seq) <= (message.timestamp, seq)
        });
        entry.seqs.insert(message.id, seq);
        entry.conversation.messages.insert(pos, message);
        Ok(())
    }

    /// Record the outcome of a persistence hand-off for a local send.
    pub fn set_delivery(
        &mut self,
        id: ConversationId,
        message_id: MessageId,
        state: DeliveryState,
    ) -> bool {
        if let Some(entry) = self.entry_mut(id) {
            if let Some(m) = entry
                .conversation
                .messages
                .iter_mut()
                .find(|m| m.id == message_id)
            {
                m.delivery = state;
                return true;
            }
        }
        false
    }

    /// Case-insensitive substring match over counterpart display name or
    /// conversation name. An empty query returns all conversations in
    /// store order.
    pub fn search(&self, query: &str) -> Vec<&Conversation> {
        if query.is_empty() {
            return self.iter().collect();
        }
        let needle = query.to_lowercase();
        self.iter()
            .filter(|c| {
                let name_hit = c
                    .name
                    .as_deref()
                    .map(|n| n.to_lowercase().contains(&needle))
                    .unwrap_or(false);
                let counterpart_hit = self
                    .counterpart(c)
                    .map(|p| p.display_name.to_lowercase().contains(&needle))
                    .unwrap_or(false);
                name_hit || counterpart_hit
            })
            .collect()
    }

    /// The other participant of a two-party conversation. `None` for
    /// groups and for malformed participant sets.
    pub fn counterpart<'a>(&self, conversation: &'a Conversation) -> Option<&'a Profile> {
        if conversation.is_group || conversation.participants.len() != 2 {
            return None;
        }
        let local = self.local_id.as_ref()?;
        conversation.participants.iter().find(|p| &p.id != local)
    }

    /// Mirror a presence change onto the participant profiles held in
    /// conversations. Never creates participants.
    pub fn apply_presence(&mut self, participant_id: &UserId, status: Presence) {
        for entry in &mut self.entries {
            if let Some(p) = entry
                .conversation
                .participants
                .iter_mut()
                .find(|p| &p.id == participant_id)
            {
                p.status = status;
            }
        }
    }

    /// Replace a participant's profile attributes everywhere it appears,
    /// keeping the presence the tracker owns.
    pub fn update_participant(&mut self, profile: &Profile) {
        for entry in &mut self.entries {
            if let Some(p) = entry
                .conversation
                .participants
                .iter_mut()
                .find(|p| p.id == profile.id)
            {
                let status = p.status;
                *p = profile.clone();
                p.status = status;
            }
        }
    }

    /// Discard everything. After this the store answers every query as if
    /// no session had ever been active.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.selected = None;
        self.local_id = None;
    }

    fn entry_mut(&mut self, id: ConversationId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.conversation.id == id)
    }
}
