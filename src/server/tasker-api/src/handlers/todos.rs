use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tasker_auth::AuthError;
use tasker_storage::{StorageError, Task, TaskId, UserId};
use tracing::{debug, instrument, warn};

use super::json_body;
use crate::notify::EmailMessage;
use crate::{ApiError, AppState, Authenticated};

#[derive(Deserialize)]
pub struct TaskInput {
    #[serde(default)]
    task: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TaskView {
    id: TaskId,
    task: String,
}

impl From<Task> for TaskView {
    fn from(t: Task) -> Self {
        Self {
            id: t.id,
            task: t.task,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreatedTask {
    id: TaskId,
    task: String,
    email_status: &'static str,
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    message: &'static str,
}

fn task_text(input: TaskInput) -> Result<String, ApiError> {
    let text = input.task.as_deref().map(str::trim).unwrap_or_default();
    if text.is_empty() {
        return Err(ApiError::Validation("Task cannot be empty".into()));
    }
    Ok(text.to_string())
}

fn task_id(id: Result<Path<TaskId>, PathRejection>) -> Result<TaskId, ApiError> {
    id.map(|Path(id)| id).map_err(|_| ApiError::NotFound("todo"))
}

pub async fn list(
    auth: Authenticated,
    State(state): State<AppState>,
) -> Result<Json<Vec<TaskView>>, ApiError> {
    let tasks = state.tasks.list_tasks(auth.user_id()).await?;
    Ok(Json(tasks.into_iter().map(TaskView::from).collect()))
}

#[instrument(skip_all, fields(user_id = auth.user_id()))]
pub async fn create(
    auth: Authenticated,
    State(state): State<AppState>,
    payload: Result<Json<TaskInput>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedTask>), ApiError> {
    let text = task_text(json_body(payload)?)?;

    let task = state
        .tasks
        .create_task(auth.user_id(), &text)
        .await
        .map_err(|e| match e {
            // Token for a user the store no longer knows.
            StorageError::NotFound(_) => ApiError::Auth(AuthError::TokenInvalid),
            other => other.into(),
        })?;

    let email_status = notify_owner(&state, auth.user_id(), &task.task).await;
    debug!(task_id = task.id, email_status, "Task created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedTask {
            id: task.id,
            task: task.task,
            email_status,
        }),
    ))
}

/// Queues the creation email. Never fails the request.
async fn notify_owner(state: &AppState, user_id: UserId, task: &str) -> &'static str {
    let owner = match state.users.find_by_id(user_id).await {
        Ok(owner) => owner,
        Err(e) => {
            warn!(error = %e, "Owner lookup failed, notification skipped");
            None
        },
    };

    match owner {
        Some(user) if user.username.contains('@') => {
            if state
                .notifier
                .notify(EmailMessage::task_created(user.username, task))
            {
                "queued"
            } else {
                "skipped"
            }
        },
        _ => "skipped",
    }
}

pub async fn update(
    auth: Authenticated,
    State(state): State<AppState>,
    id: Result<Path<TaskId>, PathRejection>,
    payload: Result<Json<TaskInput>, JsonRejection>,
) -> Result<Json<TaskView>, ApiError> {
    let id = task_id(id)?;
    let text = task_text(json_body(payload)?)?;

    state
        .tasks
        .update_task(auth.user_id(), id, &text)
        .await?
        .map(|t| Json(t.into()))
        .ok_or(ApiError::NotFound("todo"))
}

pub async fn delete(
    auth: Authenticated,
    State(state): State<AppState>,
    id: Result<Path<TaskId>, PathRejection>,
) -> Result<Json<Deleted>, ApiError> {
    let id = task_id(id)?;

    if !state.tasks.delete_task(auth.user_id(), id).await? {
        return Err(ApiError::NotFound("todo"));
    }

    Ok(Json(Deleted {
        message: "Todo deleted",
    }))
}
