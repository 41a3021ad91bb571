//! Submission of orchestration tasks and polling for their completion.
//!
//! Gate accepts mutating application operations as asynchronous tasks. The submit call answers
//! with a reference such as `/tasks/01HX2...`, the task itself has to be polled until it reports
//! a terminal status.

use std::time::Duration;

use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::{OptionExt as _, ensure};
use tracing::instrument;

use crate::{
    client::{GateClient, decode, ensure_status},
    error::*,
};

/// A task object as reported by Gate.
pub type Task = Map<String, Value>;

/// Controls how often and how long a submitted task is polled.
///
/// After the `n`-th poll that did not observe a terminal status, the poller sleeps for
/// `n² × base_delay`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskPollPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for TaskPollPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Self::DEFAULT_MAX_ATTEMPTS,
            base_delay: Self::DEFAULT_BASE_DELAY,
        }
    }
}

impl TaskPollPolicy {
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);
    pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

    /// The sleep after the given (1-based) unsuccessful attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt.saturating_mul(attempt))
    }
}

/// Execution status of an orchestration task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    NotStarted,
    Running,
    Paused,
    Suspended,
    Succeeded,
    FailedContinue,
    Terminal,
    Canceled,
    Redirect,
    Stopped,
    Buffered,
    Skipped,
}

impl TaskStatus {
    /// Reads the status of a task, unknown or missing statuses yield [`None`].
    pub fn of(task: &Task) -> Option<Self> {
        task.get("status")
            .and_then(Value::as_str)
            .and_then(|status| status.parse().ok())
    }

    pub fn is_complete(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::Stopped | Self::Skipped | Self::Terminal | Self::FailedContinue
        )
    }

    pub fn is_successful(self) -> bool {
        matches!(self, Self::Succeeded | Self::Stopped | Self::Skipped)
    }
}

/// The body accepted by `POST /tasks`.
#[derive(Debug, Serialize)]
pub struct TaskRequest {
    pub job: Vec<Value>,
    pub application: String,
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct TaskRef {
    #[serde(rename = "ref")]
    reference: Option<String>,
}

/// Extracts the task id from a reference like `/tasks/01HX2...`.
pub fn task_id_from_ref(reference: &str) -> Option<&str> {
    reference.rsplit('/').next().filter(|id| !id.is_empty())
}

impl GateClient {
    /// Submits `request` and waits until the created task reaches a terminal status.
    #[instrument(skip(self, request), fields(application = %request.application))]
    pub async fn run_task(&self, operation: &'static str, request: &TaskRequest) -> Result<Task> {
        let response = self
            .send(operation, self.http.post(self.url(&["tasks"])?).json(request))
            .await?;
        ensure_status(operation, &response, &[StatusCode::OK, StatusCode::ACCEPTED])?;

        let task_ref: TaskRef = decode(operation, response).await?;
        let id = task_ref
            .reference
            .as_deref()
            .and_then(task_id_from_ref)
            .context(MissingTaskRefSnafu { operation })?;

        tracing::info!(task.id = id, "submitted task, waiting for completion");
        self.wait_for_task(operation, id).await
    }

    pub async fn get_task(&self, id: &str) -> Result<Task> {
        const OPERATION: &str = "get task";

        let response = self
            .send(OPERATION, self.http.get(self.url(&["tasks", id])?))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return NotFoundSnafu {
                kind: "task",
                name: id,
            }
            .fail();
        }
        ensure_status(OPERATION, &response, &[StatusCode::OK])?;
        decode(OPERATION, response).await
    }

    /// Polls the task `id` according to the client's [`TaskPollPolicy`].
    pub async fn wait_for_task(&self, operation: &'static str, id: &str) -> Result<Task> {
        let policy = self.task_poll;
        let mut attempts = 0;

        loop {
            attempts += 1;
            let task = self.get_task(id).await?;

            if let Some(status) = TaskStatus::of(&task).filter(|status| status.is_complete()) {
                ensure!(
                    status.is_successful(),
                    TaskFailedSnafu {
                        operation,
                        id,
                        status: status.to_string(),
                        task: Value::Object(task),
                    }
                );
                tracing::info!(task.id = id, %status, "task completed");
                return Ok(task);
            }

            ensure!(
                attempts < policy.max_attempts,
                TaskIncompleteSnafu {
                    operation,
                    id,
                    attempts,
                }
            );

            let delay = policy.delay_after(attempts);
            tracing::debug!(task.id = id, attempts, ?delay, "task not complete yet, backing off");
            tokio::time::sleep(delay).await;
        }
    }
}
