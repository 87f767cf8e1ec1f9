//! # Tasker Storage
//!
//! Storage abstraction layer for Tasker.
//!
//! Defines the user and task records, the [`CredentialStore`] and
//! [`TaskStore`] traits every backend implements, and an in-memory backend
//! used in development mode and tests.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod error;
pub mod memory;
pub mod models;

pub use backend::{CredentialStore, TaskStore};
pub use error::StorageError;
pub use memory::MemoryStore;
pub use models::{FederatedResolution, NewUser, Task, TaskId, User, UserId};
