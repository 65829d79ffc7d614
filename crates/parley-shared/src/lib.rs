// Shared domain types for the Parley direct-messaging client.

pub mod error;
pub mod events;
pub mod models;
pub mod types;

pub use error::{AuthError, DeliveryError, EventError, ParleyError};
pub use events::LiveEvent;
pub use models::{Conversation, Message, MessageKind, Principal, Profile, ProfileUpdate};
pub use types::{ConversationId, DeliveryState, MessageId, Presence, SessionMode, UserId};
