//! Local username/password authentication.
//!
//! Passwords are hashed with the injected [`PasswordHasher`]. Hashing runs on
//! the blocking pool so a slow KDF never stalls the async workers.

use std::sync::Arc;

use tasker_crypto::PasswordHasher;
use tasker_storage::{CredentialStore, NewUser, StorageError, User};
use tracing::{debug, info};
use zeroize::Zeroizing;

use crate::AuthError;

/// Maximum username length, in characters.
pub const MAX_USERNAME_LEN: usize = 255;

/// Registers and authenticates local accounts.
pub struct LocalAuthenticator {
    store: Arc<dyn CredentialStore>,
    hasher: Arc<dyn PasswordHasher>,
    /// Verified against when the user does not exist, so both failure paths
    /// cost one hash verification.
    dummy_hash: String,
}

impl LocalAuthenticator {
    /// Creates an authenticator.
    ///
    /// Computes one hash up front, so this is as slow as a registration.
    pub fn new(
        store: Arc<dyn CredentialStore>,
        hasher: Arc<dyn PasswordHasher>,
    ) -> Result<Self, AuthError> {
        let dummy_hash = hasher.hash("tasker-dummy-password")?;

        Ok(Self {
            store,
            hasher,
            dummy_hash,
        })
    }

    /// Creates a local account.
    ///
    /// # Errors
    ///
    /// * [`AuthError::Validation`] - empty username or password
    /// * [`AuthError::DuplicateUser`] - username already taken
    pub async fn register(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let username = validate_username(username)?;
        if password.is_empty() {
            return Err(AuthError::Validation("password cannot be empty".into()));
        }

        if self.store.find_by_username(username).await?.is_some() {
            debug!(username, "Registration rejected, username taken");
            return Err(AuthError::DuplicateUser);
        }

        let password_hash = self.hash(password).await?;

        let user = self
            .store
            .create(NewUser::local(username, password_hash))
            .await
            .map_err(|e| match e {
                StorageError::AlreadyExists(_) => AuthError::DuplicateUser,
                other => AuthError::Storage(other),
            })?;

        info!(user_id = user.id, "Local user registered");

        Ok(user)
    }

    /// Checks a username/password pair.
    ///
    /// Unknown users, federated-only users and wrong passwords all fail with
    /// [`AuthError::InvalidCredentials`] after the same amount of work.
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<User, AuthError> {
        let user = self.store.find_by_username(username.trim()).await?;

        let digest = user
            .as_ref()
            .and_then(|u| u.password_hash.clone())
            .unwrap_or_else(|| self.dummy_hash.clone());

        let matches = self.verify(password, digest).await?;

        match user {
            Some(user) if matches && user.password_hash.is_some() => {
                debug!(user_id = user.id, "Local authentication succeeded");
                Ok(user)
            },
            _ => {
                debug!("Local authentication failed");
                Err(AuthError::InvalidCredentials)
            },
        }
    }

    async fn hash(&self, password: &str) -> Result<String, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = Zeroizing::new(password.to_owned());

        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| AuthError::Internal(format!("hashing task failed: {e}")))?
            .map_err(AuthError::from)
    }

    async fn verify(&self, password: &str, digest: String) -> Result<bool, AuthError> {
        let hasher = Arc::clone(&self.hasher);
        let password = Zeroizing::new(password.to_owned());

        tokio::task::spawn_blocking(move || hasher.verify(&password, &digest))
            .await
            .map_err(|e| AuthError::Internal(format!("verification task failed: {e}")))
    }
}

fn validate_username(username: &str) -> Result<&str, AuthError> {
    let username = username.trim();

    if username.is_empty() {
        return Err(AuthError::Validation("username cannot be empty".into()));
    }

    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(AuthError::Validation("username too long".into()));
    }

    Ok(username)
}
