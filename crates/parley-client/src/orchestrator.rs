//! Session orchestrator: the top-level mode state machine.
//!
//! Drives the identity session, and on activation wires up the profile
//! resolver, the conversation store, and the live event intake. Exposes
//! the full surface presentation collaborators use: auth operations,
//! send/select/search, profile updates, and read-only snapshots.

use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{info, warn};

use parley_service::AccountService;
use parley_shared::{
    AuthError, Conversation, ConversationId, DeliveryError, DeliveryState, Message, Presence,
    Principal, Profile, ProfileUpdate, SessionMode, UserId,
};

use crate::intake::{spawn_intake, IntakeGuard};
use crate::profile;
use crate::state::SessionState;
use crate::IdentitySession;

/// Construction-time configuration. Endpoint and redirect target are
/// opaque strings passed through to the identity session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub service_endpoint: String,
    pub redirect_url: String,
    /// Single-pane layouts never auto-select a conversation.
    pub single_pane: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            service_endpoint: "inprocess".to_string(),
            redirect_url: String::new(),
            single_pane: false,
        }
    }
}

/// The conversation session. One per signed-in user; mode starts at
/// `Login` and all state is discarded on logout.
pub struct Session {
    service: Arc<dyn AccountService>,
    identity: IdentitySession,
    config: SessionConfig,
    state: Arc<Mutex<SessionState>>,
}

impl Session {
    pub fn new(service: Arc<dyn AccountService>, config: SessionConfig) -> Self {
        let identity = IdentitySession::new(
            service.clone(),
            config.service_endpoint.clone(),
            config.redirect_url.clone(),
        );
        Self {
            service,
            identity,
            config,
            state: Arc::new(Mutex::new(SessionState::new())),
        }
    }

    // State updates are committed atomically under the lock, so recovering
    // a poisoned lock cannot observe a half-applied transition.
    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    // -----------------------------------------------------------------
    // Mode navigation (explicit user choice, no timed transitions)
    // -----------------------------------------------------------------

    pub fn show_register(&self) {
        let mut st = self.state();
        if st.mode == SessionMode::Login {
            st.mode = SessionMode::Register;
        }
    }

    pub fn show_login(&self) {
        let mut st = self.state();
        if matches!(st.mode, SessionMode::Register | SessionMode::Verify) {
            st.mode = SessionMode::Login;
            st.pending_email = None;
        }
    }

    // -----------------------------------------------------------------
    // Authentication
    // -----------------------------------------------------------------

    /// Sign in. Success activates the session; failure leaves the mode
    /// and all state untouched.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), AuthError> {
        let issued = self.issue_if_not_active()?;
        let principal = self.identity.login(email, password).await?;
        self.activate(issued, principal).await
    }

    /// Generation at issue time, or an error if a session is already
    /// active. Two racing activations are further disarmed by the
    /// generation check at commit time.
    fn issue_if_not_active(&self) -> Result<u64, AuthError> {
        let st = self.state();
        if st.mode == SessionMode::Active {
            return Err(AuthError::Service("already signed in".to_string()));
        }
        Ok(st.generation)
    }

    /// Register a new account. Success stores the email as pending and
    /// moves to `Verify`; no principal exists until verification.
    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        let issued = self.issue_if_not_active()?;
        self.identity.register(full_name, email, password).await?;
        let mut st = self.state();
        if st.generation == issued {
            st.pending_email = Some(email.to_string());
            st.mode = SessionMode::Verify;
        }
        Ok(())
    }

    /// Complete registration with the out-of-band code. Success activates
    /// the session; failure stays in `Verify` with the pending email
    /// retained for retry.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<(), AuthError> {
        let issued = self.issue_if_not_active()?;
        let principal = self.identity.verify_code(email, code).await?;
        self.activate(issued, principal).await
    }

    /// Ask for a fresh verification code. Never changes the mode.
    pub async fn resend_code(&self, email: &str) -> Result<(), AuthError> {
        self.identity.resend_code(email).await
    }

    /// Sign out. Local state is torn down first and unconditionally; a
    /// failed remote sign-out is returned for reporting but the session
    /// is already back in `Login`.
    pub async fn logout(&self) -> Result<(), AuthError> {
        let intake = self.state().teardown();
        if let Some(guard) = intake {
            let (handle, task) = guard.release();
            if let Some(handle) = handle {
                self.service.unsubscribe(handle).await;
            }
            task.abort();
        }
        info!("session torn down");
        self.identity.logout().await
    }

    /// Enter `Active`: resolve the profile, load conversations, subscribe
    /// the live feed, and commit everything under one lock. A generation
    /// change during the awaits means a logout raced us; the completion
    /// must then be a no-op and the fresh subscription released.
    async fn activate(&self, issued: u64, principal: Principal) -> Result<(), AuthError> {
        let local = profile::resolve(&principal);
        let conversations = self.service.fetch_conversations(&principal).await?;
        let subscription = self.service.subscribe().await;

        let mut st = self.state();
        if st.generation != issued {
            // A logout raced the activation; release the subscription we
            // just opened and apply nothing.
            drop(st);
            self.service.unsubscribe(subscription.handle).await;
            return Ok(());
        }

        st.generation += 1;
        let generation = st.generation;
        st.mode = SessionMode::Active;
        st.pending_email = None;

        st.presence.clear();
        st.presence.track(&local.id, Presence::Online);
        for conversation in &conversations {
            for participant in &conversation.participants {
                st.presence.track(&participant.id, participant.status);
            }
        }

        st.conversations
            .load_initial(conversations, &local, self.config.single_pane);
        st.conversations.apply_presence(&local.id, Presence::Online);
        st.principal = Some(principal);
        st.profile = Some(local);

        let task = spawn_intake(self.state.clone(), subscription.events, generation);
        st.intake = Some(IntakeGuard::new(subscription.handle, task));

        info!(generation, "session active");
        Ok(())
    }

    // -----------------------------------------------------------------
    // Conversations
    // -----------------------------------------------------------------

    /// Send a text message. The message is appended to the conversation
    /// immediately (local echo, no suspension); the persistence hand-off
    /// happens in the background and resolves the delivery state to
    /// `Sent` or `Failed` without ever retracting the echo.
    pub fn send(&self, conversation_id: ConversationId, body: &str) -> Result<Message, DeliveryError> {
        let (message, issued) = {
            let mut st = self.state();
            let sender = st
                .profile
                .clone()
                .ok_or_else(|| DeliveryError::Service("no active session".to_string()))?;
            let message = st.conversations.send(conversation_id, body, &sender)?;
            (message, st.generation)
        };

        let service = self.service.clone();
        let state = self.state.clone();
        let handed_off = message.clone();
        tokio::spawn(async move {
            let result = service.persist_message(conversation_id, &handed_off).await;
            let mut st = match state.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if st.generation != issued {
                return;
            }
            match result {
                Ok(_) => {
                    st.conversations
                        .set_delivery(conversation_id, handed_off.id, DeliveryState::Sent);
                }
                Err(e) => {
                    warn!(message_id = %handed_off.id, error = %e, "message hand-off failed");
                    st.conversations
                        .set_delivery(conversation_id, handed_off.id, DeliveryState::Failed);
                }
            }
        });

        Ok(message)
    }

    /// Focus a conversation. Unknown ids are not an error; the focus just
    /// resolves to nothing.
    pub fn select(&self, conversation_id: ConversationId) {
        self.state().conversations.select(conversation_id);
    }

    /// Case-insensitive conversation search; empty query returns all.
    pub fn search(&self, query: &str) -> Vec<Conversation> {
        self.state()
            .conversations
            .search(query)
            .into_iter()
            .cloned()
            .collect()
    }

    /// The other party of a two-party conversation.
    pub fn counterpart_of(&self, conversation_id: ConversationId) -> Option<Profile> {
        let st = self.state();
        let conversation = st.conversations.get(conversation_id)?;
        st.conversations.counterpart(conversation).cloned()
    }

    // -----------------------------------------------------------------
    // Profile
    // -----------------------------------------------------------------

    /// Merge a partial update over the local profile (last write wins)
    /// and mirror it into the conversation participant sets.
    pub fn update_profile(&self, update: ProfileUpdate) -> Option<Profile> {
        let mut st = self.state();
        let mut updated = st.profile.clone()?;
        profile::apply_update(&mut updated, update);
        st.profile = Some(updated.clone());
        st.conversations.update_participant(&updated);
        Some(updated)
    }

    // -----------------------------------------------------------------
    // Read-only snapshots
    // -----------------------------------------------------------------

    pub fn mode(&self) -> SessionMode {
        self.state().mode
    }

    pub fn profile(&self) -> Option<Profile> {
        self.state().profile.clone()
    }

    pub fn principal(&self) -> Option<Principal> {
        self.state().principal.clone()
    }

    pub fn pending_email(&self) -> Option<String> {
        self.state().pending_email.clone()
    }

    pub fn conversations(&self) -> Vec<Conversation> {
        self.state().conversations.iter().cloned().collect()
    }

    pub fn focused(&self) -> Option<Conversation> {
        self.state().conversations.focused().cloned()
    }

    pub fn status_of(&self, participant_id: &UserId) -> Presence {
        self.state().presence.status_of(participant_id)
    }
}
