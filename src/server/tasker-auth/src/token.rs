//! Access token issuer and verifier.
//!
//! Tokens are HS256 JWTs carrying the user id as `sub` plus `iat`/`exp`.
//! They are stateless: nothing is stored server-side and there is no
//! revocation, a token stays valid until it expires.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tasker_crypto::random::MIN_SECRET_LEN;
use tasker_storage::UserId;

use crate::{AuthBackend, AuthContext, AuthError};

/// Longest accepted token lifetime (one year).
pub const MAX_TOKEN_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Claims carried by an access token.
#[derive(Debug, Serialize, Deserialize)]
struct AccessClaims {
    /// Subject (user id, decimal).
    sub: String,
    /// Issued at (Unix timestamp).
    iat: u64,
    /// Expiration (Unix timestamp).
    exp: u64,
}

/// Mints and verifies access tokens.
///
/// The signing secret is loaded once at construction and never rotated.
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    header: Header,
    ttl: Duration,
}

impl TokenIssuer {
    /// Creates an issuer signing with `secret`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the secret is shorter than
    /// 32 bytes or the TTL is zero or longer than [`MAX_TOKEN_TTL`].
    pub fn new(secret: &[u8], ttl: Duration) -> Result<Self, AuthError> {
        if secret.len() < MIN_SECRET_LEN {
            return Err(AuthError::Configuration(format!(
                "token secret must be at least {MIN_SECRET_LEN} bytes"
            )));
        }

        if ttl.is_zero() {
            return Err(AuthError::Configuration("token TTL must be > 0".into()));
        }

        if ttl > MAX_TOKEN_TTL {
            return Err(AuthError::Configuration(format!(
                "token TTL must be at most {} seconds",
                MAX_TOKEN_TTL.as_secs()
            )));
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_exp = true;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.set_required_spec_claims(&["exp", "sub"]);

        Ok(Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            header: Header::new(Algorithm::HS256),
            ttl,
        })
    }

    /// Returns the token lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Mints a token for `user_id`, valid for the configured TTL.
    pub fn issue(&self, user_id: UserId) -> Result<String, AuthError> {
        self.issue_at(user_id, now())
    }

    fn issue_at(&self, user_id: UserId, issued_at: u64) -> Result<String, AuthError> {
        let exp = issued_at
            .checked_add(self.ttl.as_secs())
            .ok_or_else(|| AuthError::Internal("token expiry overflows".into()))?;

        let claims = AccessClaims {
            sub: user_id.to_string(),
            iat: issued_at,
            exp,
        };

        encode(&self.header, &claims, &self.encoding_key)
            .map_err(|e| AuthError::Internal(format!("failed to sign token: {e}")))
    }

    /// Verifies a token and returns the user it was issued for.
    pub fn verify(&self, token: &str) -> Result<UserId, AuthError> {
        self.decode(token).map(|ctx| ctx.user_id)
    }

    fn decode(&self, token: &str) -> Result<AuthContext, AuthError> {
        let token_data = decode::<AccessClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::TokenInvalid,
            })?;

        let claims = token_data.claims;
        let user_id = claims
            .sub
            .parse::<UserId>()
            .map_err(|_| AuthError::TokenInvalid)?;

        Ok(AuthContext {
            user_id,
            expires_at: claims.exp,
        })
    }
}

#[async_trait]
impl AuthBackend for TokenIssuer {
    async fn validate(&self, token: &str) -> Result<AuthContext, AuthError> {
        self.decode(token)
    }

    fn name(&self) -> &'static str {
        "access-token"
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
