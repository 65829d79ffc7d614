//! Live event intake: the seam between the provider's realtime feed and
//! the session state.
//!
//! The intake loop drains the subscription's event channel and routes each
//! event into the conversation store or the presence tracker. Malformed
//! events are logged and dropped; they never crash the loop or corrupt the
//! store. Delivery order across conversations is not assumed; ordering
//! within a conversation is enforced by the store's `(timestamp, seq)`
//! rule.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use parley_service::SubscriptionHandle;
use parley_shared::{LiveEvent, SessionMode};

use crate::state::SessionState;

/// Single owned subscription: acquired once when the session becomes
/// active, released exactly once when it stops being active. Taking the
/// handle out of the `Option` is what makes double-release impossible.
pub struct IntakeGuard {
    handle: Option<SubscriptionHandle>,
    task: JoinHandle<()>,
}

impl IntakeGuard {
    pub(crate) fn new(handle: SubscriptionHandle, task: JoinHandle<()>) -> Self {
        Self {
            handle: Some(handle),
            task,
        }
    }

    /// Take the subscription handle (first call only) and the drain task.
    pub(crate) fn release(mut self) -> (Option<SubscriptionHandle>, JoinHandle<()>) {
        (self.handle.take(), self.task)
    }
}

/// Spawn the drain loop for one subscription. `generation` is the session
/// generation at subscribe time; events observed under any other
/// generation are stale and dropped.
pub(crate) fn spawn_intake(
    state: Arc<Mutex<SessionState>>,
    events: mpsc::Receiver<LiveEvent>,
    generation: u64,
) -> JoinHandle<()> {
    tokio::spawn(intake_loop(state, events, generation))
}

async fn intake_loop(
    state: Arc<Mutex<SessionState>>,
    mut events: mpsc::Receiver<LiveEvent>,
    generation: u64,
) {
    info!(generation, "live event intake started");
    while let Some(event) = events.recv().await {
        route_event(&state, event, generation);
    }
    debug!(generation, "live event intake ended");
}

fn route_event(state: &Arc<Mutex<SessionState>>, event: LiveEvent, generation: u64) {
    let mut guard = match state.lock() {
        Ok(g) => g,
        Err(_) => return,
    };

    if guard.generation != generation || guard.mode != SessionMode::Active {
        debug!(generation, "dropping event for stale session");
        return;
    }

    match event {
        LiveEvent::Message {
            conversation_id,
            message,
        } => {
            if let Err(e) = guard.conversations.apply_remote(conversation_id, message) {
                warn!(error = %e, "dropping malformed message event");
            }
        }
        LiveEvent::Presence {
            participant_id,
            status,
        } => {
            if guard.presence.set_status(&participant_id, status) {
                guard.conversations.apply_presence(&participant_id, status);
            } else {
                debug!(participant = %participant_id, "presence for unknown participant ignored");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_shared::{
        Conversation, ConversationId, DeliveryState, Message, MessageId, MessageKind, Presence,
        Profile, UserId,
    };

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

    fn active_state() -> (Arc<Mutex<SessionState>>, ConversationId, Profile) {
        let local = profile("local", "alice");
        let bob = profile("u2", "bob");
        let conv = Conversation {
            id: ConversationId::new(),
            participants: vec![local.clone(), bob.clone()],
            messages: vec![],
            is_group: false,
            name: None,
        };
        let conv_id = conv.id;

        let mut state = SessionState::new();
        state.mode = SessionMode::Active;
        state.generation = 1;
        state.conversations.load_initial(vec![conv], &local, false);
        state.presence.track(&bob.id, Presence::Offline);
        (Arc::new(Mutex::new(state)), conv_id, bob)
    }

    fn message_from(sender: &Profile, body: &str) -> Message {
        Message {
            id: MessageId::new(),
            sender_id: sender.id.clone(),
            sender_name: sender.display_name.clone(),
            kind: MessageKind::Text {
                body: body.to_string(),
            },
            timestamp: Utc::now(),
            delivery: DeliveryState::Sent,
        }
    }

    #[tokio::test]
    async fn routes_message_and_presence_events() {
        let (state, conv_id, bob) = active_state();
        let (tx, rx) = mpsc::channel(8);
        let task = spawn_intake(state.clone(), rx, 1);

        tx.send(LiveEvent::Message {
            conversation_id: conv_id,
            message: message_from(&bob, "hi"),
        })
        .await
        .unwrap();
        tx.send(LiveEvent::Presence {
            participant_id: bob.id.clone(),
            status: Presence::Away,
        })
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let guard = state.lock().unwrap();
        let conv = guard.conversations.get(conv_id).unwrap();
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(guard.presence.status_of(&bob.id), Presence::Away);
        assert_eq!(conv.participant(&bob.id).unwrap().status, Presence::Away);
    }

    #[tokio::test]
    async fn malformed_events_are_dropped_without_stopping_intake() {
        let (state, conv_id, bob) = active_state();
        let (tx, rx) = mpsc::channel(8);
        let task = spawn_intake(state.clone(), rx, 1);

        // Unknown conversation, then unknown sender, then a valid event.
        tx.send(LiveEvent::Message {
            conversation_id: ConversationId::new(),
            message: message_from(&bob, "lost"),
        })
        .await
        .unwrap();
        tx.send(LiveEvent::Message {
            conversation_id: conv_id,
            message: message_from(&profile("u9", "mallory"), "intruder"),
        })
        .await
        .unwrap();
        tx.send(LiveEvent::Message {
            conversation_id: conv_id,
            message: message_from(&bob, "still here"),
        })
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let guard = state.lock().unwrap();
        let conv = guard.conversations.get(conv_id).unwrap();
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.messages[0].kind.body(), Some("still here"));
    }

    #[tokio::test]
    async fn stale_generation_events_have_no_effect() {
        let (state, conv_id, bob) = active_state();
        let (tx, rx) = mpsc::channel(8);
        // Subscribed under generation 1; the session has since moved on.
        state.lock().unwrap().generation = 2;
        let task = spawn_intake(state.clone(), rx, 1);

        tx.send(LiveEvent::Message {
            conversation_id: conv_id,
            message: message_from(&bob, "too late"),
        })
        .await
        .unwrap();
        drop(tx);
        task.await.unwrap();

        let guard = state.lock().unwrap();
        assert!(guard.conversations.get(conv_id).unwrap().messages.is_empty());
    }
}
