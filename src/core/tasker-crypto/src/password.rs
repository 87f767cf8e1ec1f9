//! Password hashing.
//!
//! Passwords are hashed with Argon2id and a random per-password salt. The
//! output is a PHC string (`$argon2id$v=19$m=...,t=...,p=...$salt$hash`) so
//! the parameters travel with the digest and verification keeps working after
//! the cost is raised.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, PasswordHasher as _, Version,
};

use crate::error::CryptoError;

/// One-way password hashing capability.
///
/// Implementations are synchronous and may be deliberately slow; async
/// callers are expected to run them on a blocking thread.
pub trait PasswordHasher: Send + Sync {
    /// Hashes a plaintext password into a self-describing digest.
    fn hash(&self, plain: &str) -> Result<String, CryptoError>;

    /// Returns `true` if `plain` matches `digest`.
    ///
    /// A malformed digest never matches.
    fn verify(&self, plain: &str, digest: &str) -> bool;
}

/// Argon2id password hasher.
#[derive(Clone)]
pub struct Argon2PasswordHasher {
    argon2: Argon2<'static>,
}

impl Argon2PasswordHasher {
    /// Creates a hasher with the given cost parameters.
    ///
    /// # Arguments
    ///
    /// * `memory_kib` - Memory cost in KiB
    /// * `iterations` - Number of passes
    /// * `parallelism` - Degree of parallelism
    pub fn with_params(
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    ) -> Result<Self, CryptoError> {
        let params = Params::new(memory_kib, iterations, parallelism, None)
            .map_err(|e| CryptoError::InvalidParameters(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2PasswordHasher {
    /// OWASP-recommended defaults (19 MiB, 2 passes, 1 lane).
    fn default() -> Self {
        Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, Params::default()),
        }
    }
}

impl PasswordHasher for Argon2PasswordHasher {
    fn hash(&self, plain: &str) -> Result<String, CryptoError> {
        let salt = SaltString::generate(&mut OsRng);
        self.argon2
            .hash_password(plain.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| CryptoError::HashingFailed(e.to_string()))
    }

    fn verify(&self, plain: &str, digest: &str) -> bool {
        let Ok(parsed) = PasswordHash::new(digest) else {
            return false;
        };

        self.argon2
            .verify_password(plain.as_bytes(), &parsed)
            .is_ok()
    }
}
