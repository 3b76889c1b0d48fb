use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::task::{Stats, Task, TaskDraft, TaskPatch};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure taxonomy for remote operations. Every non-2xx response maps to
/// exactly one variant; the optional message is the server's `{error}`
/// body, used verbatim as the user-visible reason when present.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The request never completed (DNS, connect, timeout, bad body).
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 401/403: the session token is missing, invalid or expired.
    #[error("authentication failed ({status})")]
    Auth { status: u16, message: Option<String> },

    /// Other 4xx: the server rejected the request, e.g. an empty title
    /// or an unknown task id.
    #[error("request rejected ({status}): {}", .message.as_deref().unwrap_or("no detail"))]
    Validation { status: u16, message: Option<String> },

    /// 5xx.
    #[error("server error ({status})")]
    Server { status: u16, message: Option<String> },
}

impl StoreError {
    /// The server-supplied error message, if the response body carried one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            StoreError::Network(_) => None,
            StoreError::Auth { message, .. }
            | StoreError::Validation { message, .. }
            | StoreError::Server { message, .. } => message.as_deref(),
        }
    }

    pub fn is_network(&self) -> bool {
        matches!(self, StoreError::Network(_))
    }
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct TaskEnvelope {
    task: Task,
}

/// Thin HTTP client over the task REST API. All call sites go through
/// this one interface so a retry or timeout policy can later be added in
/// one place. No retries are performed today.
#[derive(Debug, Clone)]
pub struct RemoteStore {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteStore {
    pub fn new(base_url: &str, token: &str) -> StoreResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut auth = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
            StoreError::Auth {
                status: 401,
                message: Some("bearer token is not a valid header value".to_string()),
            }
        })?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder().default_headers(headers).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    #[instrument(skip(self))]
    pub async fn list(&self) -> StoreResult<Vec<Task>> {
        let response = self.client.get(self.url("/tasks")).send().await?;
        let tasks: Vec<Task> = parse_json(response).await?;
        debug!(count = tasks.len(), "fetched task list");
        Ok(tasks)
    }

    #[instrument(skip(self))]
    pub async fn stats(&self) -> StoreResult<Stats> {
        let response = self.client.get(self.url("/tasks/stats")).send().await?;
        parse_json(response).await
    }

    #[instrument(skip(self, draft), fields(title = %draft.title))]
    pub async fn create(&self, draft: &TaskDraft) -> StoreResult<Task> {
        let response = self
            .client
            .post(self.url("/tasks"))
            .json(draft)
            .send()
            .await?;
        let envelope: TaskEnvelope = parse_json(response).await?;
        debug!(id = envelope.task.id, "created task");
        Ok(envelope.task)
    }

    #[instrument(skip(self, patch))]
    pub async fn update(&self, id: u64, patch: &TaskPatch) -> StoreResult<Task> {
        let response = self
            .client
            .put(self.url(&format!("/tasks/{id}")))
            .json(patch)
            .send()
            .await?;
        let envelope: TaskEnvelope = parse_json(response).await?;
        Ok(envelope.task)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: u64) -> StoreResult<()> {
        let response = self
            .client
            .delete(self.url(&format!("/tasks/{id}")))
            .send()
            .await?;
        check_status(response).await?;
        Ok(())
    }
}

async fn parse_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> StoreResult<T> {
    let response = check_status(response).await?;
    Ok(response.json::<T>().await?)
}

async fn check_status(response: reqwest::Response) -> StoreResult<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .ok()
        .map(|body| body.error);

    Err(match status.as_u16() {
        401 | 403 => StoreError::Auth {
            status: status.as_u16(),
            message,
        },
        code @ 400..=499 => StoreError::Validation {
            status: code,
            message,
        },
        code => StoreError::Server {
            status: code,
            message,
        },
    })
}
