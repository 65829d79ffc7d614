//! Session core of the Parley direct-messaging client.
//!
//! Owns authentication-derived identity, the conversation set and message
//! histories, presence, and the live event intake. Presentation layers call
//! [`Session`] methods and read cloned snapshots; they never hold references
//! into the core state.

pub mod conversations;
pub mod identity;
pub mod intake;
pub mod orchestrator;
pub mod presence;
pub mod profile;
pub mod state;

pub use conversations::ConversationStore;
pub use identity::IdentitySession;
pub use orchestrator::{Session, SessionConfig};
pub use presence::PresenceTracker;

use tracing_subscriber::{fmt, EnvFilter};

/// Initialize the global tracing subscriber. Call once at startup.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("parley_client=debug,parley_service=info,warn"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
