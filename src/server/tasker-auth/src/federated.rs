//! OpenID Connect federation.
//!
//! Drives the authorization-code flow against an external identity provider
//! (Google by default):
//!
//! 1. Redirect the browser to [`FederatedBroker::authorization_url`]
//! 2. Receive `code` on the callback
//! 3. Exchange it server-to-server for an ID token
//! 4. Verify the ID token
//! 5. Resolve or link the local user
//! 6. Mint an access token
//!
//! Steps 2 to 6 run strictly in order inside
//! [`FederatedBroker::handle_callback`]. Provider calls are made once, with a
//! timeout, and fail closed: codes are single-use so a retry could only fail.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tasker_storage::{CredentialStore, StorageError, User};
use tracing::{debug, info, warn};
use url::Url;

use crate::{AuthError, IdentityTokenVerifier, TokenIssuer};

/// Google authorization endpoint.
pub const GOOGLE_AUTHORIZATION_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";
/// Google token endpoint.
pub const GOOGLE_TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";
/// Google signing keys.
pub const GOOGLE_JWKS_URI: &str = "https://www.googleapis.com/oauth2/v3/certs";
/// `iss` values Google puts in ID tokens.
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

/// Scopes requested from the provider.
pub const SCOPES: &str = "openid email profile";

/// Default timeout for provider calls.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity provider settings.
#[derive(Debug, Clone)]
pub struct OAuthProviderConfig {
    /// Client identifier issued by the provider; also the expected ID token
    /// audience.
    pub client_id: String,
    /// Client secret issued by the provider.
    pub client_secret: SecretString,
    /// Where the browser is sent to sign in.
    pub authorization_endpoint: String,
    /// Where codes are exchanged for tokens.
    pub token_endpoint: String,
    /// Provider key set used to verify ID tokens.
    pub jwks_uri: String,
    /// Accepted `iss` values.
    pub issuers: Vec<String>,
    /// This service's callback URL, registered with the provider.
    pub redirect_uri: String,
    /// Timeout for each provider call.
    pub http_timeout: Duration,
}

impl OAuthProviderConfig {
    /// Settings for Google sign-in.
    pub fn google(
        client_id: impl Into<String>,
        client_secret: SecretString,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            authorization_endpoint: GOOGLE_AUTHORIZATION_ENDPOINT.to_string(),
            token_endpoint: GOOGLE_TOKEN_ENDPOINT.to_string(),
            jwks_uri: GOOGLE_JWKS_URI.to_string(),
            issuers: GOOGLE_ISSUERS.iter().map(|s| s.to_string()).collect(),
            redirect_uri: redirect_uri.into(),
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

/// Outcome of a successful callback.
#[derive(Debug, Clone)]
pub struct FederatedLogin {
    /// The resolved local user.
    pub user: User,
    /// Access token minted for that user.
    pub access_token: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

/// Runs the authorization-code flow and links provider identities to local
/// users.
pub struct FederatedBroker {
    config: OAuthProviderConfig,
    authorization_url: Url,
    http: Client,
    verifier: Arc<dyn IdentityTokenVerifier>,
    store: Arc<dyn CredentialStore>,
    issuer: Arc<TokenIssuer>,
}

impl FederatedBroker {
    /// Creates a broker.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if an endpoint is not a valid URL
    /// or the HTTP client cannot be built.
    pub fn new(
        config: OAuthProviderConfig,
        verifier: Arc<dyn IdentityTokenVerifier>,
        store: Arc<dyn CredentialStore>,
        issuer: Arc<TokenIssuer>,
    ) -> Result<Self, AuthError> {
        if config.client_id.is_empty() {
            return Err(AuthError::Configuration("client id cannot be empty".into()));
        }

        Url::parse(&config.redirect_uri)
            .map_err(|e| AuthError::Configuration(format!("invalid redirect URI: {e}")))?;
        Url::parse(&config.token_endpoint)
            .map_err(|e| AuthError::Configuration(format!("invalid token endpoint: {e}")))?;

        let authorization_url = Url::parse_with_params(
            &config.authorization_endpoint,
            &[
                ("client_id", config.client_id.as_str()),
                ("redirect_uri", config.redirect_uri.as_str()),
                ("response_type", "code"),
                ("scope", SCOPES),
                ("prompt", "select_account"),
            ],
        )
        .map_err(|e| AuthError::Configuration(format!("invalid authorization endpoint: {e}")))?;

        let http = Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            config,
            authorization_url,
            http,
            verifier,
            store,
            issuer,
        })
    }

    /// Provider URL the browser should be redirected to.
    ///
    /// Creates no local state.
    pub fn authorization_url(&self) -> &Url {
        &self.authorization_url
    }

    /// Completes a login from the provider callback.
    ///
    /// # Errors
    ///
    /// * [`AuthError::MissingAuthorizationCode`] - no code, nothing was sent
    /// * [`AuthError::TokenExchangeFailed`] - the provider returned no ID token
    /// * [`AuthError::InvalidIdentityToken`] - verification failed
    /// * [`AuthError::DuplicateUser`] - the email belongs to an account linked
    ///   to another subject
    pub async fn handle_callback(&self, code: Option<&str>) -> Result<FederatedLogin, AuthError> {
        let code = code
            .filter(|c| !c.is_empty())
            .ok_or(AuthError::MissingAuthorizationCode)?;

        let id_token = self.exchange_code(code).await?;

        let claims = self
            .verifier
            .verify(&id_token, &self.config.client_id)
            .await?;

        let resolution = self
            .store
            .resolve_federated(&claims.subject, &claims.email)
            .await
            .map_err(|e| match e {
                StorageError::AlreadyExists(detail) => {
                    warn!(%detail, "Federated identity conflicts with an existing account");
                    AuthError::DuplicateUser
                },
                other => AuthError::Storage(other),
            })?;

        let kind = resolution.kind();
        let user = resolution.into_user();
        info!(user_id = user.id, resolution = kind, "Federated login resolved");

        let access_token = self.issuer.issue(user.id)?;

        Ok(FederatedLogin { user, access_token })
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AuthError> {
        let form = [
            ("code", code),
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.expose_secret()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("grant_type", "authorization_code"),
        ];

        let response = self
            .http
            .post(&self.config.token_endpoint)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(e.to_string()))?;

        let status = response.status();
        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| AuthError::TokenExchangeFailed(format!("status {status}: {e}")))?;

        debug!(%status, has_id_token = body.id_token.is_some(), "Token endpoint responded");

        body.id_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AuthError::TokenExchangeFailed(format!("status {status}: no id_token")))
    }
}
