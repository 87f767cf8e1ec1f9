//! # Tasker Auth
//!
//! Authentication and authorization for Tasker.
//!
//! ## Components
//!
//! - [`LocalAuthenticator`] - username/password registration and login
//! - [`FederatedBroker`] - OpenID Connect authorization-code flow with
//!   account linking
//! - [`TokenIssuer`] - signed, time-bound access tokens
//! - [`AuthorizationGate`] - bearer token check in front of protected
//!   operations

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod backend;
pub mod context;
pub mod error;
pub mod federated;
pub mod gate;
pub mod local;
pub mod token;
pub mod verifier;

pub use backend::AuthBackend;
pub use context::AuthContext;
pub use error::AuthError;
pub use federated::{FederatedBroker, FederatedLogin, OAuthProviderConfig};
pub use gate::{bearer_token, AuthorizationGate};
pub use local::LocalAuthenticator;
pub use token::TokenIssuer;
pub use verifier::{IdentityTokenVerifier, JwksTokenVerifier, VerifiedClaims};
