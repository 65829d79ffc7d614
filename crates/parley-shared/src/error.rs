use thiserror::Error;

use crate::types::{ConversationId, UserId};

#[derive(Error, Debug)]
pub enum ParleyError {
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    #[error("Delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("Event error: {0}")]
    Event(#[from] EventError),
}

/// Recoverable authentication failures. Reported to the user; never
/// changes the session mode beyond what the orchestrator specifies.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Invalid or expired verification code")]
    InvalidCode,

    #[error("No account for this email")]
    UnknownAccount,

    #[error("An account already exists for this email")]
    EmailTaken,

    #[error("Account is not verified yet")]
    NotVerified,

    #[error("Account service error: {0}")]
    Service(String),
}

/// Message persistence hand-off failed. Surfaced per-message as the
/// `Failed` delivery state; never rolls back the optimistic local echo.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    #[error("Unknown conversation")]
    UnknownConversation,

    #[error("Message rejected: {0}")]
    Rejected(String),

    #[error("Account service error: {0}")]
    Service(String),
}

/// An inbound live event referenced state this session does not have.
/// The event is dropped and logged; it never crashes intake.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("Event references unknown conversation {0}")]
    UnknownConversation(ConversationId),

    #[error("Sender {sender} is not a participant of conversation {conversation}")]
    UnknownSender {
        conversation: ConversationId,
        sender: UserId,
    },
}
