//! # Tasker Storage - SQLite Backend
//!
//! SQLite implementation of the credential and task stores.
//!
//! Uniqueness of usernames and federated subjects is enforced by the schema,
//! so concurrent check-then-create sequences cannot produce duplicate users:
//! the losing insert surfaces as [`StorageError::AlreadyExists`].

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::{debug, info};

use tasker_storage::{
    CredentialStore, NewUser, StorageError, Task, TaskId, TaskStore, User, UserId,
};

/// Database file name inside the data directory.
const DB_FILE: &str = "tasker.db";

type UserRow = (i64, String, Option<String>, Option<String>);
type TaskRow = (i64, i64, String, i64);

/// SQLite-backed store for users and tasks.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
    db_path: PathBuf,
}

impl SqliteStore {
    /// Opens or creates the database in `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Directory cannot be created
    /// - Database connection fails
    /// - Schema creation fails
    pub async fn open(data_dir: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base = data_dir.as_ref();
        std::fs::create_dir_all(base).map_err(|e| {
            StorageError::ConnectionFailed(format!("failed to create directory: {e}"))
        })?;

        let db_path = base.join(DB_FILE);
        let db_url = format!("sqlite:{}?mode=rwc", db_path.display());

        debug!(path = %db_path.display(), "Opening SQLite database");

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&db_url)
            .await
            .map_err(|e| StorageError::ConnectionFailed(e.to_string()))?;

        let store = Self { pool, db_path };

        store.migrate().await?;

        info!(path = %store.db_path.display(), "SQLite store ready");

        Ok(store)
    }

    /// Returns the path of the database file.
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    /// Creates the schema if it does not exist.
    async fn migrate(&self) -> Result<(), StorageError> {
        debug!("Running database migrations");

        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id                INTEGER PRIMARY KEY AUTOINCREMENT,
                username          TEXT NOT NULL UNIQUE,
                password_hash     TEXT,
                federated_subject TEXT UNIQUE,
                created_at        INTEGER NOT NULL,
                CHECK (password_hash IS NOT NULL OR federated_subject IS NOT NULL)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS todos (
                id         INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id    INTEGER NOT NULL REFERENCES users (id),
                task       TEXT NOT NULL,
                created_at INTEGER NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_todos_user ON todos (user_id)",
        ];

        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| StorageError::ConnectionFailed(format!("migration failed: {e}")))?;
        }

        debug!("Migrations complete");

        Ok(())
    }

    /// Returns the current Unix timestamp.
    fn now() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or_default()
    }
}

/// Maps a write error, turning constraint violations into domain errors.
fn write_error(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(db) = &e {
        if db.is_unique_violation() {
            let what = if db.message().contains("federated_subject") {
                "federated subject"
            } else {
                "username"
            };
            return StorageError::AlreadyExists(what.to_string());
        }
        if db.is_foreign_key_violation() {
            return StorageError::NotFound("user".to_string());
        }
        if db.is_check_violation() {
            return StorageError::InvalidInput(db.message().to_string());
        }
    }
    StorageError::QueryFailed(e.to_string())
}

fn query_error(e: sqlx::Error) -> StorageError {
    StorageError::QueryFailed(e.to_string())
}

fn user_from_row((id, username, password_hash, federated_subject): UserRow) -> User {
    User {
        id,
        username,
        password_hash,
        federated_subject,
    }
}

fn task_from_row((id, user_id, task, created_at): TaskRow) -> Task {
    Task {
        id,
        user_id,
        task,
        created_at,
    }
}

#[async_trait]
impl CredentialStore for SqliteStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StorageError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, federated_subject FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(row.map(user_from_row))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, StorageError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, federated_subject FROM users WHERE username = ?",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(row.map(user_from_row))
    }

    async fn find_by_federated_subject(
        &self,
        subject: &str,
    ) -> Result<Option<User>, StorageError> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, username, password_hash, federated_subject FROM users WHERE federated_subject = ?",
        )
        .bind(subject)
        .fetch_optional(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(row.map(user_from_row))
    }

    async fn create(&self, user: NewUser) -> Result<User, StorageError> {
        if user.password_hash.is_none() && user.federated_subject.is_none() {
            return Err(StorageError::InvalidInput(
                "user needs a password hash or a federated subject".into(),
            ));
        }

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO users (username, password_hash, federated_subject, created_at)
            VALUES (?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(&user.username)
        .bind(user.password_hash.as_deref())
        .bind(user.federated_subject.as_deref())
        .bind(Self::now())
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        debug!(user_id = id, "User created");

        Ok(User {
            id,
            username: user.username,
            password_hash: user.password_hash,
            federated_subject: user.federated_subject,
        })
    }

    async fn link_federated_subject(
        &self,
        user_id: UserId,
        subject: &str,
    ) -> Result<(), StorageError> {
        let result = sqlx::query(
            r#"
            UPDATE users SET federated_subject = ?
            WHERE id = ? AND (federated_subject IS NULL OR federated_subject = ?)
            "#,
        )
        .bind(subject)
        .bind(user_id)
        .bind(subject)
        .execute(&self.pool)
        .await
        .map_err(write_error)?;

        if result.rows_affected() == 1 {
            debug!(user_id, "Federated subject linked");
            return Ok(());
        }

        match self.find_by_id(user_id).await? {
            Some(_) => Err(StorageError::AlreadyExists(format!(
                "user {user_id} is linked to another subject"
            ))),
            None => Err(StorageError::NotFound(format!("user {user_id}"))),
        }
    }
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn list_tasks(&self, user_id: UserId) -> Result<Vec<Task>, StorageError> {
        let rows: Vec<TaskRow> = sqlx::query_as(
            "SELECT id, user_id, task, created_at FROM todos WHERE user_id = ? ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(query_error)?;

        Ok(rows.into_iter().map(task_from_row).collect())
    }

    async fn create_task(&self, user_id: UserId, task: &str) -> Result<Task, StorageError> {
        let row: TaskRow = sqlx::query_as(
            r#"
            INSERT INTO todos (user_id, task, created_at)
            VALUES (?, ?, ?)
            RETURNING id, user_id, task, created_at
            "#,
        )
        .bind(user_id)
        .bind(task)
        .bind(Self::now())
        .fetch_one(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(task_from_row(row))
    }

    async fn update_task(
        &self,
        user_id: UserId,
        task_id: TaskId,
        task: &str,
    ) -> Result<Option<Task>, StorageError> {
        let row: Option<TaskRow> = sqlx::query_as(
            r#"
            UPDATE todos SET task = ?
            WHERE id = ? AND user_id = ?
            RETURNING id, user_id, task, created_at
            "#,
        )
        .bind(task)
        .bind(task_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(write_error)?;

        Ok(row.map(task_from_row))
    }

    async fn delete_task(&self, user_id: UserId, task_id: TaskId) -> Result<bool, StorageError> {
        let result = sqlx::query("DELETE FROM todos WHERE id = ? AND user_id = ?")
            .bind(task_id)
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(write_error)?;

        Ok(result.rows_affected() == 1)
    }
}
