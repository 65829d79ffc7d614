//! In-memory [`AccountService`] implementation.
//!
//! The upstream provider is mock/local-only: accounts, conversations and the
//! realtime feed all live in process memory. Verification codes are logged
//! instead of emailed. Persisted messages are echoed back to every active
//! subscriber, which is exactly what a real provider's fan-out would do with
//! the sender's own message.

use std::collections::HashMap;

use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};
use uuid::Uuid;

use parley_shared::{
    AuthError, Conversation, ConversationId, DeliveryError, DeliveryState, LiveEvent, Message,
    Principal, UserId,
};

use crate::{AccountService, Ack, SignUpAttributes, Subscription, SubscriptionHandle};

const EVENT_CHANNEL_CAPACITY: usize = 64;

struct AccountRecord {
    id: UserId,
    password: String,
    full_name: String,
    verified: bool,
    /// Outstanding verification code, if one has been issued.
    code: Option<String>,
}

impl AccountRecord {
    fn principal(&self, email: &str) -> Principal {
        Principal {
            id: self.id.clone(),
            email: email.to_string(),
            verified: self.verified,
        }
    }
}

#[derive(Default)]
struct Inner {
    accounts: HashMap<String, AccountRecord>,
    conversations: HashMap<ConversationId, Conversation>,
    subscribers: HashMap<u64, mpsc::Sender<LiveEvent>>,
    next_subscription: u64,
    fail_next_persist: bool,
    fail_next_sign_out: bool,
}

/// In-memory account and data provider.
#[derive(Default)]
pub struct LocalService {
    inner: Mutex<Inner>,
}

impl LocalService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-verified account, for tests and local development.
    pub async fn add_account(&self, full_name: &str, email: &str, password: &str) {
        let mut inner = self.inner.lock().await;
        inner.accounts.insert(
            email.to_string(),
            AccountRecord {
                id: UserId(Uuid::new_v4().to_string()),
                password: password.to_string(),
                full_name: full_name.to_string(),
                verified: true,
                code: None,
            },
        );
    }

    /// Seed a conversation the provider will hand out on fetch.
    pub async fn seed_conversation(&self, conversation: Conversation) {
        let mut inner = self.inner.lock().await;
        inner.conversations.insert(conversation.id, conversation);
    }

    /// Provider-issued id for an account, if it exists.
    pub async fn user_id(&self, email: &str) -> Option<UserId> {
        let inner = self.inner.lock().await;
        inner.accounts.get(email).map(|a| a.id.clone())
    }

    /// The outstanding verification code for an email. Simulates reading
    /// the out-of-band delivery channel in tests.
    pub async fn issued_code(&self, email: &str) -> Option<String> {
        let inner = self.inner.lock().await;
        inner.accounts.get(email).and_then(|a| a.code.clone())
    }

    /// Make the next `persist_message` call fail.
    pub async fn fail_next_persist(&self) {
        self.inner.lock().await.fail_next_persist = true;
    }

    /// Make the next `sign_out` call fail.
    pub async fn fail_next_sign_out(&self) {
        self.inner.lock().await.fail_next_sign_out = true;
    }

    /// Inject a live event, as if the provider's feed had produced it.
    pub async fn push_event(&self, event: LiveEvent) {
        let senders: Vec<mpsc::Sender<LiveEvent>> = {
            let inner = self.inner.lock().await;
            inner.subscribers.values().cloned().collect()
        };
        for tx in senders {
            if tx.send(event.clone()).await.is_err() {
                debug!("subscriber dropped its receiver");
            }
        }
    }

    fn issue_code() -> String {
        format!("{:06}", rand::thread_rng().gen_range(0..1_000_000))
    }
}

#[async_trait]
impl AccountService for LocalService {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        let inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get(email)
            .ok_or(AuthError::InvalidCredentials)?;
        if account.password != password {
            return Err(AuthError::InvalidCredentials);
        }
        if !account.verified {
            return Err(AuthError::NotVerified);
        }
        Ok(account.principal(email))
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: SignUpAttributes,
    ) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().await;
        if inner.accounts.contains_key(email) {
            return Err(AuthError::EmailTaken);
        }
        let code = Self::issue_code();
        info!(email, code = %code, "verification code issued");
        inner.accounts.insert(
            email.to_string(),
            AccountRecord {
                id: UserId(Uuid::new_v4().to_string()),
                password: password.to_string(),
                full_name: attributes.full_name,
                verified: false,
                code: Some(code),
            },
        );
        Ok(())
    }

    async fn verify(&self, email: &str, code: &str) -> Result<Principal, AuthError> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(email)
            .ok_or(AuthError::UnknownAccount)?;
        match &account.code {
            Some(expected) if expected == code => {
                account.verified = true;
                account.code = None;
                Ok(account.principal(email))
            }
            _ => Err(AuthError::InvalidCode),
        }
    }

    async fn resend(&self, email: &str) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().await;
        let account = inner
            .accounts
            .get_mut(email)
            .ok_or(AuthError::UnknownAccount)?;
        let code = Self::issue_code();
        info!(email, code = %code, "verification code re-issued");
        account.code = Some(code);
        Ok(())
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let mut inner = self.inner.lock().await;
        if inner.fail_next_sign_out {
            inner.fail_next_sign_out = false;
            return Err(AuthError::Service("sign-out rejected".to_string()));
        }
        Ok(())
    }

    async fn fetch_conversations(
        &self,
        principal: &Principal,
    ) -> Result<Vec<Conversation>, AuthError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .conversations
            .values()
            .filter(|c| c.has_participant(&principal.id))
            .cloned()
            .collect())
    }

    async fn persist_message(
        &self,
        conversation_id: ConversationId,
        message: &Message,
    ) -> Result<Ack, DeliveryError> {
        let senders: Vec<mpsc::Sender<LiveEvent>> = {
            let mut inner = self.inner.lock().await;
            if inner.fail_next_persist {
                inner.fail_next_persist = false;
                return Err(DeliveryError::Rejected("injected failure".to_string()));
            }
            let conversation = inner
                .conversations
                .get_mut(&conversation_id)
                .ok_or(DeliveryError::UnknownConversation)?;
            let mut stored = message.clone();
            stored.delivery = DeliveryState::Sent;
            conversation.messages.push(stored);
            inner.subscribers.values().cloned().collect()
        };

        // Fan the persisted message back out, echo to the sender included.
        let mut echoed = message.clone();
        echoed.delivery = DeliveryState::Sent;
        for tx in senders {
            let event = LiveEvent::Message {
                conversation_id,
                message: echoed.clone(),
            };
            if tx.send(event).await.is_err() {
                debug!("subscriber dropped its receiver");
            }
        }

        debug!(message_id = %message.id, conversation = %conversation_id, "message persisted");
        Ok(Ack { message_id: message.id })
    }

    async fn subscribe(&self) -> Subscription {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let mut inner = self.inner.lock().await;
        let id = inner.next_subscription;
        inner.next_subscription += 1;
        inner.subscribers.insert(id, tx);
        info!(subscription = id, "realtime feed subscribed");
        Subscription {
            handle: SubscriptionHandle(id),
            events: rx,
        }
    }

    async fn unsubscribe(&self, handle: SubscriptionHandle) {
        let mut inner = self.inner.lock().await;
        inner.subscribers.remove(&handle.0);
        info!(subscription = handle.0, "realtime feed unsubscribed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_shared::{MessageId, MessageKind, Presence, Profile};

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

    fn conversation(participants: Vec<Profile>) -> Conversation {
        Conversation {
            id: ConversationId::new(),
            participants,
            messages: vec![],
            is_group: false,
            name: None,
        }
    }

    #[tokio::test]
    async fn sign_up_then_verify_completes_authentication() {
        let svc = LocalService::new();
        svc.sign_up(
            "jane@x.com",
            "secret1",
            SignUpAttributes {
                full_name: "Jane Doe".to_string(),
            },
        )
        .await
        .unwrap();

        // Not signed in until verified.
        assert_eq!(
            svc.sign_in("jane@x.com", "secret1").await,
            Err(AuthError::NotVerified)
        );

        let code = svc.issued_code("jane@x.com").await.unwrap();
        let principal = svc.verify("jane@x.com", &code).await.unwrap();
        assert!(principal.verified);
        assert!(svc.sign_in("jane@x.com", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn wrong_password_is_invalid_credentials() {
        let svc = LocalService::new();
        svc.add_account("Alice", "a@x.com", "secret1").await;
        assert_eq!(
            svc.sign_in("a@x.com", "nope").await,
            Err(AuthError::InvalidCredentials)
        );
    }

    #[tokio::test]
    async fn wrong_code_is_rejected_and_retryable() {
        let svc = LocalService::new();
        svc.sign_up(
            "jane@x.com",
            "secret1",
            SignUpAttributes {
                full_name: "Jane Doe".to_string(),
            },
        )
        .await
        .unwrap();

        let code = svc.issued_code("jane@x.com").await.unwrap();
        let wrong = if code == "999999" { "000000" } else { "999999" };

        assert_eq!(
            svc.verify("jane@x.com", wrong).await,
            Err(AuthError::InvalidCode)
        );

        // The code is retained, so a retry with the real one succeeds.
        assert!(svc.verify("jane@x.com", &code).await.is_ok());
    }

    #[tokio::test]
    async fn persisted_message_is_echoed_to_subscribers() {
        let svc = LocalService::new();
        let alice = profile("u1", "alice");
        let bob = profile("u2", "bob");
        let conv = conversation(vec![alice.clone(), bob]);
        let conv_id = conv.id;
        svc.seed_conversation(conv).await;

        let mut sub = svc.subscribe().await;
        let msg = Message {
            id: MessageId::new(),
            sender_id: alice.id.clone(),
            sender_name: alice.display_name.clone(),
            kind: MessageKind::Text {
                body: "hi".to_string(),
            },
            timestamp: Utc::now(),
            delivery: DeliveryState::Pending,
        };

        let ack = svc.persist_message(conv_id, &msg).await.unwrap();
        assert_eq!(ack.message_id, msg.id);

        match sub.events.recv().await {
            Some(LiveEvent::Message { conversation_id, message }) => {
                assert_eq!(conversation_id, conv_id);
                assert_eq!(message.id, msg.id);
                assert_eq!(message.delivery, DeliveryState::Sent);
            }
            other => panic!("expected message echo, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unsubscribe_closes_the_event_channel() {
        let svc = LocalService::new();
        let mut sub = svc.subscribe().await;
        svc.unsubscribe(sub.handle).await;
        assert!(sub.events.recv().await.is_none());
    }

    #[tokio::test]
    async fn injected_persist_failure_is_returned_once() {
        let svc = LocalService::new();
        let alice = profile("u1", "alice");
        let conv = conversation(vec![alice.clone(), profile("u2", "bob")]);
        let conv_id = conv.id;
        svc.seed_conversation(conv).await;
        svc.fail_next_persist().await;

        let msg = Message::text(&alice, "hi");
        assert!(svc.persist_message(conv_id, &msg).await.is_err());
        assert!(svc.persist_message(conv_id, &msg).await.is_ok());
    }
}
