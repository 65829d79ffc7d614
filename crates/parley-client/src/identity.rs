//! Identity session: the authentication operations against the account
//! provider.
//!
//! This layer only talks to the service and reports outcomes; the mode
//! transitions those outcomes cause belong to the orchestrator.

use std::sync::Arc;

use tracing::{info, warn};

use parley_service::{AccountService, SignUpAttributes};
use parley_shared::{AuthError, Principal};

/// Authentication front-end over the account service. Configuration is
/// opaque to the core: endpoint and redirect target are plain strings
/// handed through at construction time.
pub struct IdentitySession {
    service: Arc<dyn AccountService>,
    service_endpoint: String,
    redirect_url: String,
}

impl IdentitySession {
    pub fn new(
        service: Arc<dyn AccountService>,
        service_endpoint: String,
        redirect_url: String,
    ) -> Self {
        Self {
            service,
            service_endpoint,
            redirect_url,
        }
    }

    /// Redirect target handed to the provider for hosted auth flows.
    pub fn redirect_url(&self) -> &str {
        &self.redirect_url
    }

    /// Authenticate with email and password. On failure nothing is
    /// mutated; the caller stays in login mode.
    pub async fn login(&self, email: &str, password: &str) -> Result<Principal, AuthError> {
        info!(endpoint = %self.service_endpoint, email, "signing in");
        let principal = self.service.sign_in(email, password).await?;
        info!(principal = %principal.id, "signed in");
        Ok(principal)
    }

    /// Register a new account. Success means a verification code is on
    /// its way out-of-band; authentication completes only after
    /// [`verify_code`](Self::verify_code).
    pub async fn register(
        &self,
        full_name: &str,
        email: &str,
        password: &str,
    ) -> Result<(), AuthError> {
        info!(endpoint = %self.service_endpoint, email, "registering");
        self.service
            .sign_up(
                email,
                password,
                SignUpAttributes {
                    full_name: full_name.to_string(),
                },
            )
            .await
    }

    /// Complete registration with the emailed code. On failure the
    /// pending email is retained so the user can retry or resend.
    pub async fn verify_code(&self, email: &str, code: &str) -> Result<Principal, AuthError> {
        let principal = self.service.verify(email, code).await?;
        info!(principal = %principal.id, "verification complete");
        Ok(principal)
    }

    /// Ask the provider to re-issue the verification code. Side-effecting
    /// only; failure changes nothing.
    pub async fn resend_code(&self, email: &str) -> Result<(), AuthError> {
        self.service.resend(email).await
    }

    /// Remote sign-out. Local teardown happens regardless of the result;
    /// a failure here is reported but non-fatal.
    pub async fn logout(&self) -> Result<(), AuthError> {
        match self.service.sign_out().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "remote sign-out failed (local session already torn down)");
                Err(e)
            }
        }
    }
}
