//! Integration tests for Tasker server.
//!
//! Each test runs the full router over real HTTP, backed by SQLite in a
//! temporary directory.

// Allow unwrap() in tests - panics are acceptable for test assertions
#![allow(clippy::disallowed_methods)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::header::LOCATION;
use reqwest::{redirect, Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tasker_api::{router, spawn_notifier, AppState, LogEmailSender};
use tasker_auth::{FederatedBroker, JwksTokenVerifier, OAuthProviderConfig, TokenIssuer};
use tasker_crypto::Argon2PasswordHasher;
use tasker_storage_sqlite::SqliteStore;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Signing secret shared by every test server.
pub const TEST_JWT_SECRET: &[u8] = b"integration-secret-key-minimum-32-chars";

/// Frontend origin the federated callback redirects to.
pub const TEST_FRONTEND_URL: &str = "http://frontend.test";

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Credentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    pub id: i64,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub access_token: String,
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
pub struct TaskResponse {
    pub id: i64,
    pub task: String,
}

#[derive(Debug, Deserialize)]
pub struct CreatedTaskResponse {
    pub id: i64,
    pub task: String,
    pub email_status: String,
}

#[derive(Debug, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

// ============================================================================
// Test Server
// ============================================================================

/// An in-process server bound to an ephemeral port.
pub struct TestServer {
    pub base_url: String,
    pub addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
    provider: Option<OAuthProviderConfig>,
    data_dir: TempDir,
}

impl TestServer {
    /// Start a server with federated login disabled.
    pub async fn start() -> Result<Self> {
        let data_dir = TempDir::new().context("Failed to create temp dir")?;
        Self::start_in(data_dir, None).await
    }

    /// Start a server whose federated login talks to `provider`.
    pub async fn start_with_provider(provider: OAuthProviderConfig) -> Result<Self> {
        let data_dir = TempDir::new().context("Failed to create temp dir")?;
        Self::start_in(data_dir, Some(provider)).await
    }

    async fn start_in(data_dir: TempDir, provider: Option<OAuthProviderConfig>) -> Result<Self> {
        let store = Arc::new(
            SqliteStore::open(data_dir.path())
                .await
                .context("Failed to open database")?,
        );
        let issuer = Arc::new(TokenIssuer::new(TEST_JWT_SECRET, Duration::from_secs(3600))?);
        let hasher = Arc::new(Argon2PasswordHasher::with_params(8, 1, 1)?);
        let (notifier, _worker) = spawn_notifier(Arc::new(LogEmailSender), 16);

        let mut state = AppState::new(
            store.clone(),
            store.clone(),
            hasher,
            issuer.clone(),
            notifier,
            TEST_FRONTEND_URL,
        )?;

        if let Some(config) = provider.clone() {
            let verifier = JwksTokenVerifier::new(
                config.jwks_uri.clone(),
                config.issuers.clone(),
                config.http_timeout,
            )?;
            let broker = FederatedBroker::new(config, Arc::new(verifier), store, issuer)?;
            state = state.with_federation(Arc::new(broker));
        }

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router(state))
                .with_graceful_shutdown(async move {
                    let _ = shutdown_rx.await;
                })
                .await;
        });

        Ok(Self {
            base_url: format!("http://{addr}"),
            addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
            provider,
            data_dir,
        })
    }

    /// Stop the server and start a new one on the same database.
    pub async fn restart(mut self) -> Result<Self> {
        self.stop().await;

        let provider = self.provider.take();
        let data_dir = TempDir::new().context("Failed to create temp dir")?;
        let data_dir = std::mem::replace(&mut self.data_dir, data_dir);

        Self::start_in(data_dir, provider).await
    }

    async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.await;
        }
    }

    /// Get an HTTP client for this server.
    pub fn client(&self) -> TaskerClient {
        TaskerClient::new(&self.base_url)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

// ============================================================================
// Test Client
// ============================================================================

/// HTTP client for testing the Tasker API.
#[derive(Clone)]
pub struct TaskerClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl TaskerClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::builder()
                .timeout(Duration::from_secs(10))
                .redirect(redirect::Policy::none())
                .build()
                .expect("Failed to create HTTP client"),
            base_url: base_url.to_string(),
            token: None,
        }
    }

    pub fn with_token(mut self, token: &str) -> Self {
        self.token = Some(token.to_string());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn expect_json<T: for<'de> Deserialize<'de>>(
        resp: reqwest::Response,
        action: &str,
    ) -> Result<T> {
        if !resp.status().is_success() {
            bail!("{} failed: {} {}", action, resp.status(), resp.text().await?);
        }
        Ok(resp.json().await?)
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self.client.get(self.url("/health")).send().await?;
        Self::expect_json(resp, "Health").await
    }

    /// Raw register call, for asserting on failures.
    pub async fn register_raw(&self, username: &str, password: &str) -> Result<(StatusCode, Value)> {
        let resp = self
            .client
            .post(self.url("/register"))
            .json(&Credentials { username, password })
            .send()
            .await?;
        Ok((resp.status(), resp.json().await?))
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<RegisterResponse> {
        let resp = self
            .client
            .post(self.url("/register"))
            .json(&Credentials { username, password })
            .send()
            .await?;
        Self::expect_json(resp, "Register").await
    }

    /// Raw login call, for asserting on failures.
    pub async fn login_raw(&self, username: &str, password: &str) -> Result<(StatusCode, Value)> {
        let resp = self
            .client
            .post(self.url("/login"))
            .json(&Credentials { username, password })
            .send()
            .await?;
        Ok((resp.status(), resp.json().await?))
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let resp = self
            .client
            .post(self.url("/login"))
            .json(&Credentials { username, password })
            .send()
            .await?;
        let body: LoginResponse = Self::expect_json(resp, "Login").await?;
        Ok(body.access_token)
    }

    pub async fn list_todos(&self) -> Result<Vec<TaskResponse>> {
        let resp = self
            .authorized(self.client.get(self.url("/todos")))
            .send()
            .await?;
        Self::expect_json(resp, "List tasks").await
    }

    /// Raw create call, for asserting on failures.
    pub async fn add_todo_raw(&self, task: &str) -> Result<(StatusCode, Value)> {
        let resp = self
            .authorized(self.client.post(self.url("/todos")))
            .json(&serde_json::json!({ "task": task }))
            .send()
            .await?;
        Ok((resp.status(), resp.json().await?))
    }

    pub async fn add_todo(&self, task: &str) -> Result<CreatedTaskResponse> {
        let resp = self
            .authorized(self.client.post(self.url("/todos")))
            .json(&serde_json::json!({ "task": task }))
            .send()
            .await?;
        Self::expect_json(resp, "Add task").await
    }

    pub async fn update_todo(&self, id: i64, task: &str) -> Result<(StatusCode, Value)> {
        let resp = self
            .authorized(self.client.put(self.url(&format!("/todos/{id}"))))
            .json(&serde_json::json!({ "task": task }))
            .send()
            .await?;
        Ok((resp.status(), resp.json().await?))
    }

    pub async fn delete_todo(&self, id: i64) -> Result<(StatusCode, Value)> {
        let resp = self
            .authorized(self.client.delete(self.url(&format!("/todos/{id}"))))
            .send()
            .await?;
        Ok((resp.status(), resp.json().await?))
    }

    /// Hits a route without following redirects and returns the status and
    /// `Location` header.
    pub async fn get_redirect(&self, path: &str) -> Result<(StatusCode, Option<String>)> {
        let resp = self.client.get(self.url(path)).send().await?;
        let location = resp
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        Ok((resp.status(), location))
    }
}

#[cfg(test)]
mod federation;

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_server_health() {
        let server = TestServer::start().await.unwrap();

        let health = server.client().health().await.unwrap();

        assert_eq!(health.status, "ok");
        assert!(!health.version.is_empty());
    }

    #[tokio::test]
    async fn test_register_login_and_create_task() {
        let server = TestServer::start().await.unwrap();
        let client = server.client();

        // 1. Register
        let registered = client.register("alice", "secret1").await.unwrap();
        assert!(registered.id > 0);

        // 2. Wrong password
        let (status, body) = client.login_raw("alice", "wrong").await.unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "invalid_credentials");

        // 3. Correct password
        let token = client.login("alice", "secret1").await.unwrap();
        assert!(!token.is_empty());

        // 4. Create a task with the token
        let authed = client.clone().with_token(&token);
        let created = authed.add_todo("buy milk").await.unwrap();
        assert!(created.id > 0);
        assert_eq!(created.task, "buy milk");
        assert_eq!(created.email_status, "skipped");

        // 5. Without the token
        let (status, _) = client.add_todo_raw("buy milk").await.unwrap();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_duplicate_registration() {
        let server = TestServer::start().await.unwrap();
        let client = server.client();

        client.register("alice", "secret1").await.unwrap();
        let (status, body) = client.register_raw("alice", "secret2").await.unwrap();

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "duplicate_user");

        // The first password still works.
        client.login("alice", "secret1").await.unwrap();
    }

    #[tokio::test]
    async fn test_concurrent_registration_single_winner() {
        let server = TestServer::start().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let client = server.client();
                tokio::spawn(async move {
                    client.register_raw("racer", &format!("pw{i}")).await.unwrap()
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            let (status, body) = handle.await.unwrap();
            match status {
                StatusCode::CREATED => created += 1,
                StatusCode::BAD_REQUEST => assert_eq!(body["error"], "duplicate_user"),
                other => panic!("unexpected status {other}: {body}"),
            }
        }

        assert_eq!(created, 1);
    }

    #[tokio::test]
    async fn test_task_lifecycle() {
        let server = TestServer::start().await.unwrap();
        let client = server.client();
        client.register("alice", "secret1").await.unwrap();
        let client = client.clone().with_token(&client.login("alice", "secret1").await.unwrap());

        let first = client.add_todo("one").await.unwrap();
        let second = client.add_todo("two").await.unwrap();

        let list = client.list_todos().await.unwrap();
        assert_eq!(
            list,
            vec![
                TaskResponse {
                    id: first.id,
                    task: "one".into()
                },
                TaskResponse {
                    id: second.id,
                    task: "two".into()
                },
            ]
        );

        let (status, body) = client.update_todo(first.id, "uno").await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["task"], "uno");

        let (status, body) = client.delete_todo(second.id).await.unwrap();
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Todo deleted");

        let (status, _) = client.delete_todo(second.id).await.unwrap();
        assert_eq!(status, StatusCode::NOT_FOUND);

        let list = client.list_todos().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].task, "uno");
    }

    #[tokio::test]
    async fn test_users_cannot_touch_each_others_tasks() {
        let server = TestServer::start().await.unwrap();
        let anon = server.client();

        anon.register("alice", "secret1").await.unwrap();
        anon.register("bob", "secret2").await.unwrap();
        let alice = anon.clone().with_token(&anon.login("alice", "secret1").await.unwrap());
        let bob = anon.clone().with_token(&anon.login("bob", "secret2").await.unwrap());

        let task = alice.add_todo("private").await.unwrap();

        assert!(bob.list_todos().await.unwrap().is_empty());
        assert_eq!(
            bob.update_todo(task.id, "stolen").await.unwrap().0,
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            bob.delete_todo(task.id).await.unwrap().0,
            StatusCode::NOT_FOUND
        );

        let list = alice.list_todos().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].task, "private");
    }

    #[tokio::test]
    async fn test_invalid_token_rejected() {
        let server = TestServer::start().await.unwrap();
        let client = server.client().with_token("invalid-token");

        let result = client.list_todos().await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_data_survives_restart() {
        let server = TestServer::start().await.unwrap();
        let client = server.client();
        client.register("alice", "secret1").await.unwrap();
        let token = client.login("alice", "secret1").await.unwrap();
        client
            .clone()
            .with_token(&token)
            .add_todo("remember me")
            .await
            .unwrap();

        let server = server.restart().await.unwrap();
        let client = server.client();

        // Same signing secret, so the old token is still valid.
        let list = client.clone().with_token(&token).list_todos().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].task, "remember me");

        client.login("alice", "secret1").await.unwrap();
    }

    #[tokio::test]
    async fn test_federation_disabled_by_default() {
        let server = TestServer::start().await.unwrap();

        let (status, location) = server.client().get_redirect("/auth/google").await.unwrap();

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(location.is_none());
    }
}
