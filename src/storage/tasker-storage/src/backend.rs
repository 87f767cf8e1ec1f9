//! Storage traits.

use async_trait::async_trait;

use crate::error::StorageError;
use crate::models::{FederatedResolution, NewUser, Task, TaskId, User, UserId};

/// Persistence for user identity records.
///
/// Implementations must enforce uniqueness of `username` and
/// `federated_subject` atomically: two concurrent `create` calls for the same
/// username must not both succeed.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Looks a user up by identifier.
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StorageError>;

    /// Looks a user up by username.
    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError>;

    /// Looks a user up by identity provider subject.
    async fn find_by_federated_subject(&self, subject: &str)
        -> Result<Option<User>, StorageError>;

    /// Persists a new user.
    ///
    /// Fails with [`StorageError::AlreadyExists`] if the username or the
    /// subject is taken.
    async fn create(&self, user: NewUser) -> Result<User, StorageError>;

    /// Attaches an identity provider subject to an existing user.
    ///
    /// Succeeds if the user already carries this subject. Fails with
    /// [`StorageError::AlreadyExists`] if the user carries a different subject
    /// or the subject belongs to someone else, and with
    /// [`StorageError::NotFound`] if the user does not exist.
    async fn link_federated_subject(&self, user_id: UserId, subject: &str)
        -> Result<(), StorageError>;

    /// Resolves a verified federated identity to a local user.
    ///
    /// Precedence: known subject, then an account whose username equals the
    /// verified email (the subject gets attached), then a new account.
    /// Uniqueness in the store makes this safe under concurrent callbacks: a
    /// lost create race is resolved by reading the winner back.
    async fn resolve_federated(
        &self,
        subject: &str,
        email: &str,
    ) -> Result<FederatedResolution, StorageError> {
        if let Some(user) = self.find_by_federated_subject(subject).await? {
            return Ok(FederatedResolution::Existing(user));
        }

        if let Some(mut user) = self.find_by_username(email).await? {
            self.link_federated_subject(user.id, subject).await?;
            user.federated_subject = Some(subject.to_string());
            return Ok(FederatedResolution::Linked(user));
        }

        match self.create(NewUser::federated(email, subject)).await {
            Ok(user) => Ok(FederatedResolution::Created(user)),
            Err(StorageError::AlreadyExists(what)) => {
                match self.find_by_federated_subject(subject).await? {
                    Some(user) => Ok(FederatedResolution::Existing(user)),
                    None => Err(StorageError::AlreadyExists(what)),
                }
            },
            Err(e) => Err(e),
        }
    }
}

/// Persistence for tasks. Every operation is scoped to one owner.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Lists the owner's tasks ordered by identifier.
    async fn list_tasks(&self, user_id: UserId) -> Result<Vec<Task>, StorageError>;

    /// Creates a task for the owner.
    async fn create_task(&self, user_id: UserId, task: &str) -> Result<Task, StorageError>;

    /// Replaces the text of one of the owner's tasks.
    ///
    /// Returns `None` if the task does not exist or belongs to someone else.
    async fn update_task(
        &self,
        user_id: UserId,
        task_id: TaskId,
        task: &str,
    ) -> Result<Option<Task>, StorageError>;

    /// Deletes one of the owner's tasks. Returns `false` if nothing matched.
    async fn delete_task(&self, user_id: UserId, task_id: TaskId) -> Result<bool, StorageError>;
}
