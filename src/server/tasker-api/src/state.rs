//! Shared application state.

use std::sync::Arc;

use tasker_auth::{AuthError, AuthorizationGate, FederatedBroker, LocalAuthenticator, TokenIssuer};
use tasker_crypto::PasswordHasher;
use tasker_storage::{CredentialStore, TaskStore};

use crate::notify::Notifier;

/// Everything a handler needs, assembled once at startup.
#[derive(Clone)]
pub struct AppState {
    pub(crate) local: Arc<LocalAuthenticator>,
    pub(crate) federation: Option<Arc<FederatedBroker>>,
    pub(crate) issuer: Arc<TokenIssuer>,
    pub(crate) gate: AuthorizationGate,
    pub(crate) users: Arc<dyn CredentialStore>,
    pub(crate) tasks: Arc<dyn TaskStore>,
    pub(crate) notifier: Notifier,
    pub(crate) frontend_url: String,
}

impl AppState {
    /// Creates the state with federated login disabled.
    ///
    /// # Errors
    ///
    /// Fails if the password hasher cannot produce the timing-equalization
    /// hash.
    pub fn new(
        users: Arc<dyn CredentialStore>,
        tasks: Arc<dyn TaskStore>,
        hasher: Arc<dyn PasswordHasher>,
        issuer: Arc<TokenIssuer>,
        notifier: Notifier,
        frontend_url: impl Into<String>,
    ) -> Result<Self, AuthError> {
        let local = LocalAuthenticator::new(Arc::clone(&users), hasher)?;
        let gate = AuthorizationGate::new(issuer.clone());
        let frontend_url = frontend_url.into().trim_end_matches('/').to_string();

        Ok(Self {
            local: Arc::new(local),
            federation: None,
            issuer,
            gate,
            users,
            tasks,
            notifier,
            frontend_url,
        })
    }

    /// Enables federated login through `broker`.
    #[must_use]
    pub fn with_federation(mut self, broker: Arc<FederatedBroker>) -> Self {
        self.federation = Some(broker);
        self
    }

    /// Browser origin of the web frontend.
    pub fn frontend_url(&self) -> &str {
        &self.frontend_url
    }
}
