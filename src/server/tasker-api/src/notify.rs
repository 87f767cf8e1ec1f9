//! Task creation emails.
//!
//! Handlers hand messages to a [`Notifier`], which queues them on a bounded
//! channel drained by a background task. Queueing never blocks and delivery
//! failures are logged, so email can never fail a request.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default capacity of the notification queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Outgoing email.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct EmailMessage {
    /// Recipient address.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Plain-text body.
    pub body: String,
}

impl EmailMessage {
    /// Notification sent when `task` is created for `to`.
    pub fn task_created(to: impl Into<String>, task: &str) -> Self {
        Self {
            to: to.into(),
            subject: "New Todo Created".to_string(),
            body: format!(
                "Hello,\n\nA new todo has been created: \"{task}\".\n\nBest regards,\nTasker"
            ),
        }
    }
}

/// Error returned by an [`EmailSender`].
#[derive(Debug, thiserror::Error)]
#[error("email delivery failed: {0}")]
pub struct SendError(pub String);

/// Delivers email.
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Delivers one message.
    async fn send(&self, message: &EmailMessage) -> Result<(), SendError>;
}

/// Logs messages instead of sending them.
#[derive(Clone, Debug, Default)]
pub struct LogEmailSender;

#[async_trait]
impl EmailSender for LogEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), SendError> {
        info!(
            to = %message.to,
            subject = %message.subject,
            "email send stub"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct RelayRequest<'a> {
    from: &'a str,
    #[serde(flatten)]
    message: &'a EmailMessage,
}

/// Hands messages to an HTTP mail relay as JSON.
pub struct HttpEmailSender {
    client: Client,
    relay_url: String,
    from: String,
}

impl HttpEmailSender {
    /// Creates a sender posting to `relay_url`.
    pub fn new(
        relay_url: impl Into<String>,
        from: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, SendError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SendError(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            relay_url: relay_url.into(),
            from: from.into(),
        })
    }
}

#[async_trait]
impl EmailSender for HttpEmailSender {
    async fn send(&self, message: &EmailMessage) -> Result<(), SendError> {
        self.client
            .post(&self.relay_url)
            .json(&RelayRequest {
                from: &self.from,
                message,
            })
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| SendError(e.to_string()))?;

        Ok(())
    }
}

/// Queue handle used by request handlers.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<EmailMessage>,
}

impl Notifier {
    /// Queues a message without waiting.
    ///
    /// Returns `false` if the queue is full or the worker has stopped.
    pub fn notify(&self, message: EmailMessage) -> bool {
        match self.tx.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(to = %message.to, "Notification queue full, email dropped");
                false
            },
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!("Notification worker stopped, email dropped");
                false
            },
        }
    }
}

/// Starts the delivery worker.
///
/// The worker exits once every [`Notifier`] clone has been dropped and the
/// queue is drained.
pub fn spawn_notifier(sender: Arc<dyn EmailSender>, capacity: usize) -> (Notifier, JoinHandle<()>) {
    let (tx, mut rx) = mpsc::channel::<EmailMessage>(capacity.max(1));

    let handle = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            match sender.send(&message).await {
                Ok(()) => debug!(to = %message.to, "Notification delivered"),
                Err(e) => warn!(to = %message.to, error = %e, "Notification failed"),
            }
        }
        debug!("Notification worker stopped");
    });

    (Notifier { tx }, handle)
}
