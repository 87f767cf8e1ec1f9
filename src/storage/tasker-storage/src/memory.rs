//! In-memory storage backend.
//!
//! Used in development mode and tests. All state lives behind one mutex, so
//! every operation is atomic; nothing survives a restart.

use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::backend::{CredentialStore, TaskStore};
use crate::error::StorageError;
use crate::models::{NewUser, Task, TaskId, User, UserId};

#[derive(Default)]
struct Tables {
    users: BTreeMap<UserId, User>,
    tasks: BTreeMap<TaskId, Task>,
    next_user_id: UserId,
    next_task_id: TaskId,
}

/// In-memory user and task store.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

fn now() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or_default()
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StorageError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn find_by_federated_subject(
        &self,
        subject: &str,
    ) -> Result<Option<User>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.federated_subject.as_deref() == Some(subject))
            .cloned())
    }

    async fn create(&self, user: NewUser) -> Result<User, StorageError> {
        if user.password_hash.is_none() && user.federated_subject.is_none() {
            return Err(StorageError::InvalidInput(
                "user needs a password hash or a federated subject".into(),
            ));
        }

        let mut tables = self.tables.lock().await;

        if tables.users.values().any(|u| u.username == user.username) {
            return Err(StorageError::AlreadyExists(format!(
                "username {}",
                user.username
            )));
        }

        if let Some(subject) = user.federated_subject.as_deref() {
            if tables
                .users
                .values()
                .any(|u| u.federated_subject.as_deref() == Some(subject))
            {
                return Err(StorageError::AlreadyExists("federated subject".into()));
            }
        }

        tables.next_user_id += 1;
        let created = User {
            id: tables.next_user_id,
            username: user.username,
            password_hash: user.password_hash,
            federated_subject: user.federated_subject,
        };
        tables.users.insert(created.id, created.clone());

        Ok(created)
    }

    async fn link_federated_subject(
        &self,
        user_id: UserId,
        subject: &str,
    ) -> Result<(), StorageError> {
        let mut tables = self.tables.lock().await;

        if tables
            .users
            .values()
            .any(|u| u.id != user_id && u.federated_subject.as_deref() == Some(subject))
        {
            return Err(StorageError::AlreadyExists("federated subject".into()));
        }

        let user = tables
            .users
            .get_mut(&user_id)
            .ok_or_else(|| StorageError::NotFound(format!("user {user_id}")))?;

        match user.federated_subject.as_deref() {
            None => {
                user.federated_subject = Some(subject.to_string());
                Ok(())
            },
            Some(existing) if existing == subject => Ok(()),
            Some(_) => Err(StorageError::AlreadyExists(format!(
                "user {user_id} is linked to another subject"
            ))),
        }
    }
}

#[async_trait]
impl TaskStore for MemoryStore {
    async fn list_tasks(&self, user_id: UserId) -> Result<Vec<Task>, StorageError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tasks
            .values()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn create_task(&self, user_id: UserId, task: &str) -> Result<Task, StorageError> {
        let mut tables = self.tables.lock().await;

        if !tables.users.contains_key(&user_id) {
            return Err(StorageError::NotFound(format!("user {user_id}")));
        }

        tables.next_task_id += 1;
        let created = Task {
            id: tables.next_task_id,
            user_id,
            task: task.to_string(),
            created_at: now(),
        };
        tables.tasks.insert(created.id, created.clone());

        Ok(created)
    }

    async fn update_task(
        &self,
        user_id: UserId,
        task_id: TaskId,
        task: &str,
    ) -> Result<Option<Task>, StorageError> {
        let mut tables = self.tables.lock().await;

        Ok(match tables.tasks.get_mut(&task_id) {
            Some(existing) if existing.user_id == user_id => {
                existing.task = task.to_string();
                Some(existing.clone())
            },
            _ => None,
        })
    }

    async fn delete_task(&self, user_id: UserId, task_id: TaskId) -> Result<bool, StorageError> {
        let mut tables = self.tables.lock().await;

        match tables.tasks.get(&task_id) {
            Some(existing) if existing.user_id == user_id => {
                tables.tasks.remove(&task_id);
                Ok(true)
            },
            _ => Ok(false),
        }
    }
}
