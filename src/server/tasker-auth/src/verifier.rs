//! Identity token verification.
//!
//! The provider's ID token is an RS256 JWT. [`JwksTokenVerifier`] fetches
//! the provider's published keys on every call, picks the one named by the
//! token's `kid`, and checks signature, expiry, audience and issuer.

use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, jwk::JwkSet, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use crate::AuthError;

/// Identity asserted by a verified ID token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedClaims {
    /// Provider's stable subject identifier.
    pub subject: String,
    /// Verified email address.
    pub email: String,
}

/// Verifies identity tokens returned by the provider.
///
/// Every failure must surface as [`AuthError::InvalidIdentityToken`].
#[async_trait]
pub trait IdentityTokenVerifier: Send + Sync {
    /// Verifies `raw_token` and checks its audience equals `expected_audience`.
    async fn verify(
        &self,
        raw_token: &str,
        expected_audience: &str,
    ) -> Result<VerifiedClaims, AuthError>;
}

/// `email_verified` is a boolean in current tokens and a string in older ones.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Text(String),
}

impl Flag {
    fn is_true(&self) -> bool {
        match self {
            Self::Bool(value) => *value,
            Self::Text(value) => value.eq_ignore_ascii_case("true"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdTokenClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    email_verified: Option<Flag>,
}

/// Verifies ID tokens against the provider's JWKS endpoint.
pub struct JwksTokenVerifier {
    http: Client,
    jwks_uri: String,
    issuers: Vec<String>,
}

impl JwksTokenVerifier {
    /// Creates a verifier.
    ///
    /// # Arguments
    ///
    /// * `jwks_uri` - Provider key set endpoint
    /// * `issuers` - Accepted `iss` values; empty disables the issuer check
    /// * `timeout` - Timeout for the key fetch
    pub fn new(
        jwks_uri: impl Into<String>,
        issuers: Vec<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            jwks_uri: jwks_uri.into(),
            issuers,
        })
    }

    async fn fetch_keys(&self) -> Result<JwkSet, AuthError> {
        self.http
            .get(&self.jwks_uri)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| invalid(format!("failed to fetch provider keys: {e}")))?
            .json::<JwkSet>()
            .await
            .map_err(|e| invalid(format!("malformed provider key set: {e}")))
    }
}

fn invalid(detail: impl Into<String>) -> AuthError {
    AuthError::InvalidIdentityToken(detail.into())
}

#[async_trait]
impl IdentityTokenVerifier for JwksTokenVerifier {
    async fn verify(
        &self,
        raw_token: &str,
        expected_audience: &str,
    ) -> Result<VerifiedClaims, AuthError> {
        let header = decode_header(raw_token).map_err(|e| invalid(e.to_string()))?;

        if header.alg != Algorithm::RS256 {
            return Err(invalid(format!("unexpected algorithm {:?}", header.alg)));
        }

        let kid = header
            .kid
            .ok_or_else(|| invalid("token header has no kid"))?;

        let keys = self.fetch_keys().await?;
        let jwk = keys
            .find(&kid)
            .ok_or_else(|| invalid(format!("unknown signing key {kid}")))?;
        let key = DecodingKey::from_jwk(jwk).map_err(|e| invalid(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[expected_audience]);
        if !self.issuers.is_empty() {
            validation.set_issuer(&self.issuers);
        }
        validation.set_required_spec_claims(&["exp", "aud", "iss", "sub"]);

        let claims = decode::<IdTokenClaims>(raw_token, &key, &validation)
            .map_err(|e| invalid(e.to_string()))?
            .claims;

        // An absent claim counts as unverified: the email may drive linking.
        if !claims.email_verified.as_ref().is_some_and(Flag::is_true) {
            return Err(invalid("email not verified"));
        }

        let email = claims
            .email
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| invalid("token carries no email"))?;

        debug!(kid = %kid, "Identity token verified");

        Ok(VerifiedClaims {
            subject: claims.sub,
            email,
        })
    }
}
