//! The Account & Data Service seam.
//!
//! The session core treats the identity/data provider as opaque and remote:
//! every call here may suspend, fail, or never answer. [`AccountService`] is
//! the full contract; [`LocalService`] is the in-memory implementation used
//! for local development and tests.

pub mod local;

pub use local::LocalService;

use async_trait::async_trait;
use tokio::sync::mpsc;

use parley_shared::{
    AuthError, Conversation, ConversationId, DeliveryError, LiveEvent, Message, MessageId,
    Principal,
};

/// Extra attributes submitted at registration time.
#[derive(Debug, Clone)]
pub struct SignUpAttributes {
    pub full_name: String,
}

/// Acknowledgment of a persisted message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ack {
    pub message_id: MessageId,
}

/// Opaque token identifying one realtime subscription. The intake layer
/// owns exactly one of these for the lifetime of an active session.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle(pub(crate) u64);

/// A live subscription: the handle to release it, and the inbound event
/// channel drained by the intake loop. The channel closes when the
/// subscription is released.
pub struct Subscription {
    pub handle: SubscriptionHandle,
    pub events: mpsc::Receiver<LiveEvent>,
}

/// The upstream identity and data provider.
///
/// Timeouts are the provider's responsibility; "no response" surfaces as an
/// ordinary error. None of these operations are cancellable by the caller.
#[async_trait]
pub trait AccountService: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Principal, AuthError>;

    /// Triggers out-of-band delivery of a verification code. Does not
    /// authenticate; [`verify`](Self::verify) completes registration.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        attributes: SignUpAttributes,
    ) -> Result<(), AuthError>;

    async fn verify(&self, email: &str, code: &str) -> Result<Principal, AuthError>;

    async fn resend(&self, email: &str) -> Result<(), AuthError>;

    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Conversations available to the principal, possibly none.
    async fn fetch_conversations(
        &self,
        principal: &Principal,
    ) -> Result<Vec<Conversation>, AuthError>;

    /// Hand a locally sent message off for persistence and fan-out.
    async fn persist_message(
        &self,
        conversation_id: ConversationId,
        message: &Message,
    ) -> Result<Ack, DeliveryError>;

    /// Open the realtime feed. Each call returns an independent
    /// subscription; the caller is responsible for releasing it.
    async fn subscribe(&self) -> Subscription;

    /// Release a subscription. Idempotent on the provider side; the
    /// matching event channel closes once released.
    async fn unsubscribe(&self, handle: SubscriptionHandle);
}
