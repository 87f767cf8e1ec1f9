//! Records persisted by the storage backends.

use std::fmt;

/// Store-assigned user identifier.
pub type UserId = i64;

/// Store-assigned task identifier.
pub type TaskId = i64;

/// A user account.
///
/// `username` is unique across all users. A user carries a password hash, a
/// federated subject, or both.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    /// Unique, immutable identifier.
    pub id: UserId,
    /// Unique login name; the verified email for federated accounts.
    pub username: String,
    /// PHC-format password digest, absent for pure federated accounts.
    pub password_hash: Option<String>,
    /// Identity provider subject identifier, unique when present.
    pub federated_subject: Option<String>,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("username", &self.username)
            .field(
                "password_hash",
                &self.password_hash.as_ref().map(|_| "<redacted>"),
            )
            .field("federated_subject", &self.federated_subject)
            .finish()
    }
}

/// A user that has not been persisted yet.
#[derive(Clone)]
pub struct NewUser {
    /// Login name.
    pub username: String,
    /// PHC-format password digest.
    pub password_hash: Option<String>,
    /// Identity provider subject identifier.
    pub federated_subject: Option<String>,
}

impl NewUser {
    /// A locally registered user.
    pub fn local(username: impl Into<String>, password_hash: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password_hash: Some(password_hash.into()),
            federated_subject: None,
        }
    }

    /// A user first seen through the identity provider.
    pub fn federated(email: impl Into<String>, subject: impl Into<String>) -> Self {
        Self {
            username: email.into(),
            password_hash: None,
            federated_subject: Some(subject.into()),
        }
    }
}

/// How a federated login was matched to a local user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FederatedResolution {
    /// The subject was already known.
    Existing(User),
    /// An account with the same username (email) got the subject attached.
    Linked(User),
    /// A new account was created for the subject.
    Created(User),
}

impl FederatedResolution {
    /// Returns the resolved user.
    pub fn into_user(self) -> User {
        match self {
            Self::Existing(user) | Self::Linked(user) | Self::Created(user) => user,
        }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Existing(_) => "existing",
            Self::Linked(_) => "linked",
            Self::Created(_) => "created",
        }
    }
}

/// A task owned by a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    /// Store-assigned identifier.
    pub id: TaskId,
    /// Owner.
    pub user_id: UserId,
    /// Task text.
    pub task: String,
    /// Creation time (Unix seconds).
    pub created_at: i64,
}
