//! Cryptographically secure random generation.
//!
//! Uses the operating system's CSPRNG.

use rand::{rngs::OsRng, RngCore};
use zeroize::Zeroizing;

/// Minimum length of a token signing secret, in bytes.
pub const MIN_SECRET_LEN: usize = 32;

/// Generates a random signing secret of `len` bytes.
///
/// The secret is wrapped in `Zeroizing` so it is cleared from memory when
/// dropped.
pub fn generate_secret(len: usize) -> Zeroizing<Vec<u8>> {
    let mut secret = Zeroizing::new(vec![0u8; len]);
    OsRng.fill_bytes(&mut secret);
    secret
}
