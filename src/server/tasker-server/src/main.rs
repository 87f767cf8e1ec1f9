//! Tasker Server - Main entry point.

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use secrecy::SecretString;
use tasker_api::notify::DEFAULT_QUEUE_CAPACITY;
use tasker_api::{
    router, spawn_notifier, AppState, EmailSender, HttpEmailSender, LogEmailSender,
};
use tasker_auth::{FederatedBroker, JwksTokenVerifier, OAuthProviderConfig, TokenIssuer};
use tasker_crypto::random::{generate_secret, MIN_SECRET_LEN};
use tasker_crypto::Argon2PasswordHasher;
use tasker_storage::{CredentialStore, MemoryStore, TaskStore};
use tasker_storage_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "tasker-server")]
#[command(about = "Tasker - multi-user task list server")]
#[command(version)]
struct Cli {
    /// Server bind address
    #[arg(long, default_value = "0.0.0.0:5000", env = "TASKER_BIND_ADDRESS")]
    bind: String,

    /// Directory holding the SQLite database
    #[arg(long, default_value = "data", env = "TASKER_DATA_DIR")]
    data_dir: PathBuf,

    /// Enable development mode (in-memory storage, generated signing secret)
    #[arg(long, env = "TASKER_DEV_MODE")]
    dev: bool,

    /// Access token signing secret (at least 32 bytes)
    #[arg(long, env = "TASKER_JWT_SECRET", hide_env_values = true)]
    jwt_secret: Option<String>,

    /// Access token lifetime in seconds
    #[arg(long, default_value_t = 3600, env = "TASKER_TOKEN_TTL_SECS")]
    token_ttl_secs: u64,

    /// Public base URL of this server, used for the OAuth callback
    #[arg(long, default_value = "http://localhost:5000", env = "TASKER_PUBLIC_URL")]
    public_url: String,

    /// Web frontend URL (login redirect target and CORS origin)
    #[arg(long, default_value = "http://localhost:3000", env = "TASKER_FRONTEND_URL")]
    frontend_url: String,

    /// Google OAuth client id
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    google_client_id: Option<String>,

    /// Google OAuth client secret
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    google_client_secret: Option<String>,

    /// HTTP mail relay receiving task notifications (logged when unset)
    #[arg(long, env = "TASKER_MAIL_RELAY_URL")]
    mail_relay_url: Option<String>,

    /// Sender address for notifications
    #[arg(long, default_value = "noreply@localhost", env = "TASKER_MAIL_FROM")]
    mail_from: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    tracing::info!("Starting Tasker server...");
    tracing::info!("Bind address: {}", cli.bind);

    if cli.dev {
        tracing::warn!("Development mode enabled - DO NOT USE IN PRODUCTION");
    }

    let (users, tasks): (Arc<dyn CredentialStore>, Arc<dyn TaskStore>) = if cli.dev {
        let store = Arc::new(MemoryStore::new());
        (store.clone(), store)
    } else {
        let store = Arc::new(
            SqliteStore::open(&cli.data_dir)
                .await
                .with_context(|| format!("failed to open database in {}", cli.data_dir.display()))?,
        );
        tracing::info!(path = %store.path().display(), "Database opened");
        (store.clone(), store)
    };

    let issuer = Arc::new(token_issuer(&cli)?);
    let hasher = Arc::new(Argon2PasswordHasher::default());

    let sender: Arc<dyn EmailSender> = match &cli.mail_relay_url {
        Some(url) => Arc::new(
            HttpEmailSender::new(url.as_str(), cli.mail_from.as_str(), Duration::from_secs(10))
                .context("failed to configure mail relay")?,
        ),
        None => {
            tracing::info!("No mail relay configured, notifications will be logged");
            Arc::new(LogEmailSender)
        },
    };
    let (notifier, worker) = spawn_notifier(sender, DEFAULT_QUEUE_CAPACITY);

    let mut state = AppState::new(
        Arc::clone(&users),
        tasks,
        hasher,
        Arc::clone(&issuer),
        notifier,
        cli.frontend_url.as_str(),
    )
    .context("failed to initialize authentication")?;

    match (&cli.google_client_id, &cli.google_client_secret) {
        (Some(client_id), Some(client_secret)) => {
            let redirect_uri = format!(
                "{}/auth/google/callback",
                cli.public_url.trim_end_matches('/')
            );
            let config = OAuthProviderConfig::google(
                client_id.as_str(),
                SecretString::from(client_secret.clone()),
                redirect_uri,
            );
            let verifier = JwksTokenVerifier::new(
                config.jwks_uri.clone(),
                config.issuers.clone(),
                config.http_timeout,
            )
            .context("failed to configure identity token verifier")?;
            let broker = FederatedBroker::new(config, Arc::new(verifier), users, issuer)
                .context("failed to configure Google login")?;

            state = state.with_federation(Arc::new(broker));
            tracing::info!("Google login enabled");
        },
        (None, None) => tracing::info!("Google login disabled"),
        _ => bail!("GOOGLE_CLIENT_ID and GOOGLE_CLIENT_SECRET must be set together"),
    }

    let listener = TcpListener::bind(&cli.bind)
        .await
        .with_context(|| format!("failed to bind {}", cli.bind))?;

    tracing::info!("Tasker server started successfully");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_on(tokio::signal::ctrl_c()))
        .await
        .context("server error")?;

    // The router held the last notifier; let queued emails drain.
    let _ = worker.await;

    Ok(())
}

/// Resolves once `signal` fires. A signal that cannot be installed never
/// resolves, so the server keeps running instead of stopping at once.
async fn shutdown_on(signal: impl Future<Output = std::io::Result<()>>) {
    if let Err(e) = signal.await {
        tracing::error!(error = %e, "Failed to listen for ctrl-c, graceful shutdown disabled");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down...");
}

fn token_issuer(cli: &Cli) -> anyhow::Result<TokenIssuer> {
    let ttl = Duration::from_secs(cli.token_ttl_secs);

    match &cli.jwt_secret {
        Some(secret) => TokenIssuer::new(secret.as_bytes(), ttl).context("invalid TASKER_JWT_SECRET"),
        None if cli.dev => {
            tracing::warn!("No signing secret configured, generated an ephemeral one");
            let secret = generate_secret(MIN_SECRET_LEN);
            TokenIssuer::new(&secret, ttl).context("failed to create token issuer")
        },
        None => bail!("TASKER_JWT_SECRET is required outside development mode"),
    }
}
