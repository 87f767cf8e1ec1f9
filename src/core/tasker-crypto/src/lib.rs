//! # Tasker Crypto
//!
//! Core cryptographic primitives for Tasker.
//!
//! This crate provides:
//! - Password hashing behind the [`PasswordHasher`] capability (Argon2id)
//! - Secure random generation for signing secrets

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod password;
pub mod random;

pub use error::CryptoError;
pub use password::{Argon2PasswordHasher, PasswordHasher};
