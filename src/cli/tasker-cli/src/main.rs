//! Tasker CLI - Command line interface.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use reqwest::{Client, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

// ============================================================================
// CLI Structure
// ============================================================================

#[derive(Parser)]
#[command(name = "tasker")]
#[command(about = "Tasker CLI - Manage your tasks")]
#[command(version)]
struct Cli {
    /// Tasker server address
    #[arg(long, default_value = "http://localhost:5000", env = "TASKER_ADDR")]
    addr: String,

    /// Access token
    #[arg(long, env = "TASKER_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create an account
    Register {
        username: String,
        /// Password (read from stdin if not provided)
        #[arg(long)]
        password: Option<String>,
    },
    /// Log in and print an access token
    Login {
        username: String,
        /// Password (read from stdin if not provided)
        #[arg(long)]
        password: Option<String>,
    },
    /// Task management
    Todos {
        #[command(subcommand)]
        command: TodoCommands,
    },
    /// Check server health
    Health,
}

#[derive(Subcommand)]
enum TodoCommands {
    /// List tasks
    List,
    /// Add a task
    Add {
        /// Task text
        task: String,
    },
    /// Replace the text of a task
    Update {
        /// Task id
        id: i64,
        /// New task text
        task: String,
    },
    /// Delete a task
    Delete {
        /// Task id
        id: i64,
    },
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
    version: String,
}

#[derive(Serialize)]
struct CredentialsRequest<'a> {
    username: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct RegisterResponse {
    id: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: String,
}

#[derive(Serialize)]
struct TaskRequest<'a> {
    task: &'a str,
}

#[derive(Debug, Deserialize)]
struct TaskResponse {
    id: i64,
    task: String,
}

#[derive(Debug, Deserialize)]
struct CreatedTaskResponse {
    id: i64,
    task: String,
    email_status: String,
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    message: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
    message: String,
}

// ============================================================================
// HTTP Client
// ============================================================================

struct TaskerClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl TaskerClient {
    fn new(base_url: &str, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorized(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        let token = self
            .token
            .as_ref()
            .context("Access token required. Set TASKER_TOKEN or use --token")?;

        Ok(req.bearer_auth(token))
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder, action: &str) -> Result<T> {
        let resp = req.send().await.context("Failed to connect to server")?;
        let resp = check(resp, action).await?;

        resp.json().await.context("Failed to parse response")
    }

    async fn health(&self) -> Result<HealthResponse> {
        self.send(self.client.get(self.url("/health")), "Health check")
            .await
    }

    async fn register(&self, username: &str, password: &str) -> Result<RegisterResponse> {
        let req = self
            .client
            .post(self.url("/register"))
            .json(&CredentialsRequest { username, password });

        self.send(req, "Registration").await
    }

    async fn login(&self, username: &str, password: &str) -> Result<LoginResponse> {
        let req = self
            .client
            .post(self.url("/login"))
            .json(&CredentialsRequest { username, password });

        self.send(req, "Login").await
    }

    async fn list_todos(&self) -> Result<Vec<TaskResponse>> {
        let req = self.authorized(self.client.get(self.url("/todos")))?;
        self.send(req, "List tasks").await
    }

    async fn add_todo(&self, task: &str) -> Result<CreatedTaskResponse> {
        let req = self
            .authorized(self.client.post(self.url("/todos")))?
            .json(&TaskRequest { task });

        self.send(req, "Add task").await
    }

    async fn update_todo(&self, id: i64, task: &str) -> Result<TaskResponse> {
        let req = self
            .authorized(self.client.put(self.url(&format!("/todos/{id}"))))?
            .json(&TaskRequest { task });

        self.send(req, "Update task").await
    }

    async fn delete_todo(&self, id: i64) -> Result<MessageResponse> {
        let req = self.authorized(self.client.delete(self.url(&format!("/todos/{id}"))))?;
        self.send(req, "Delete task").await
    }
}

async fn check(resp: Response, action: &str) -> Result<Response> {
    if resp.status().is_success() {
        return Ok(resp);
    }

    let status = resp.status();
    let error: ErrorResponse = resp.json().await.unwrap_or(ErrorResponse {
        error: "unknown_error".into(),
        message: format!("HTTP {status}"),
    });
    bail!("{} failed: {} ({})", action, error.message, error.error);
}

// ============================================================================
// Command Handlers
// ============================================================================

fn read_password(password: Option<String>) -> Result<String> {
    let password = match password {
        Some(p) => p,
        None => {
            print!("Password: ");
            io::stdout().flush()?;
            let stdin = io::stdin();
            let mut line = String::new();
            stdin.lock().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        },
    };

    if password.is_empty() {
        bail!("Password cannot be empty");
    }

    Ok(password)
}

async fn cmd_health(client: &TaskerClient) -> Result<()> {
    let health = client.health().await?;

    println!("Tasker server status:");
    println!("  Status:  {}", health.status);
    println!("  Version: {}", health.version);

    Ok(())
}

async fn cmd_register(client: &TaskerClient, username: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password)?;
    let result = client.register(username, &password).await?;

    println!("{} (id {})", result.message, result.id);

    Ok(())
}

async fn cmd_login(client: &TaskerClient, username: &str, password: Option<String>) -> Result<()> {
    let password = read_password(password)?;
    let result = client.login(username, &password).await?;

    println!("{}", result.access_token);
    eprintln!();
    eprintln!("Export it to use the todos commands:");
    eprintln!("  export TASKER_TOKEN=<token>");

    Ok(())
}

async fn cmd_todos_list(client: &TaskerClient) -> Result<()> {
    let tasks = client.list_todos().await?;

    if tasks.is_empty() {
        println!("No tasks");
    } else {
        for task in &tasks {
            println!("{:>6}  {}", task.id, task.task);
        }
    }

    Ok(())
}

async fn cmd_todos_add(client: &TaskerClient, task: &str) -> Result<()> {
    let result = client.add_todo(task).await?;

    println!("Task {} created: {}", result.id, result.task);
    println!("Email notification: {}", result.email_status);

    Ok(())
}

async fn cmd_todos_update(client: &TaskerClient, id: i64, task: &str) -> Result<()> {
    let result = client.update_todo(id, task).await?;
    println!("Task {} updated: {}", result.id, result.task);
    Ok(())
}

async fn cmd_todos_delete(client: &TaskerClient, id: i64) -> Result<()> {
    let result = client.delete_todo(id).await?;
    println!("{}", result.message);
    Ok(())
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = TaskerClient::new(&cli.addr, cli.token)?;

    match cli.command {
        Commands::Health => cmd_health(&client).await,
        Commands::Register { username, password } => {
            cmd_register(&client, &username, password).await
        },
        Commands::Login { username, password } => cmd_login(&client, &username, password).await,
        Commands::Todos { command } => match command {
            TodoCommands::List => cmd_todos_list(&client).await,
            TodoCommands::Add { task } => cmd_todos_add(&client, &task).await,
            TodoCommands::Update { id, task } => cmd_todos_update(&client, id, &task).await,
            TodoCommands::Delete { id } => cmd_todos_delete(&client, id).await,
        },
    }
}
