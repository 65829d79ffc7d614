//! Session state shared across all operations.
//!
//! The [`SessionState`] struct is wrapped in `Arc<Mutex<>>`; operations
//! lock it briefly and never hold the guard across an await. The
//! generation counter is the stale-completion guard: every async
//! continuation captures the generation at issue time, and applies
//! nothing if it has changed since.

use parley_shared::{Principal, Profile, SessionMode};

use crate::conversations::ConversationStore;
use crate::intake::IntakeGuard;
use crate::presence::PresenceTracker;

/// Central session state.
pub struct SessionState {
    /// Current top-level mode of the session state machine.
    pub mode: SessionMode,

    /// Bumped on every auth transition (activation and teardown).
    /// Continuations from a previous generation must be no-ops.
    pub generation: u64,

    /// Email awaiting verification after a successful registration.
    pub pending_email: Option<String>,

    /// The authenticated identity. `None` outside `Active` mode.
    pub principal: Option<Principal>,

    /// The local user's display profile, derived from the principal.
    pub profile: Option<Profile>,

    /// Conversations and their message histories.
    pub conversations: ConversationStore,

    /// Per-participant presence.
    pub presence: PresenceTracker,

    /// The live-feed subscription, held only while `Active`.
    pub intake: Option<IntakeGuard>,
}

impl SessionState {
    pub fn new() -> Self {
        Self {
            mode: SessionMode::Login,
            generation: 0,
            pending_email: None,
            principal: None,
            profile: None,
            conversations: ConversationStore::new(),
            presence: PresenceTracker::new(),
            intake: None,
        }
    }

    /// Tear the session down locally: back to `Login`, identity and
    /// conversation state discarded, generation bumped so in-flight
    /// completions become no-ops. Returns the intake guard (if any) so
    /// the caller can release the subscription exactly once.
    pub fn teardown(&mut self) -> Option<IntakeGuard> {
        self.generation += 1;
        self.mode = SessionMode::Login;
        self.pending_email = None;
        self.principal = None;
        self.profile = None;
        self.conversations.clear();
        self.presence.clear();
        self.intake.take()
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new()
    }
}
