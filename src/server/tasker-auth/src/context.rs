//! Authorization context.

use serde::{Deserialize, Serialize};
use tasker_storage::UserId;

/// Identity established for one protected request.
///
/// Built only from a verified access token; handlers take the user id from
/// here and never from the request payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthContext {
    /// Authenticated user.
    pub user_id: UserId,

    /// Token expiration timestamp (Unix seconds).
    pub expires_at: u64,
}
