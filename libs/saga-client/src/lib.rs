//! # Saga orchestrator adapter
//!
//! External-task client for the workflow engine's fetch-and-lock contract.
//! Worker processes register `(topic, handler)` pairs and long-poll the
//! engine; each fetched task runs its handler and settles in exactly one of
//! three ways:
//!
//! - success → complete with the returned output variables
//! - [`TaskError::Bpmn`] → report a BPMN error with a stable code, routing
//!   the process to a named boundary (compensation branch)
//! - any other error → report a technical failure with zero retries; retry
//!   policy belongs to the saga definition, not the worker
//!
//! [`ProcessClient`] starts process instances (saga launch).

pub mod variables;
mod worker;

pub use variables::Variables;
pub use worker::{ExternalTaskWorker, TaskHandler, TaskMeta, WorkerConfig};

use serde::Deserialize;
use tracing::info;

pub type SagaResult<T> = Result<T, SagaClientError>;

#[derive(Debug, thiserror::Error)]
pub enum SagaClientError {
    #[error("workflow engine request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("workflow engine returned {status}: {body}")]
    Engine { status: u16, body: String },

    #[error("variable decoding failed: {0}")]
    Codec(String),
}

/// A business error raised by a task handler, reported to the engine as a
/// BPMN error with a stable code.
#[derive(Debug, Clone)]
pub struct BpmnError {
    pub code: String,
    pub message: String,
}

impl BpmnError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for BpmnError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// How a task handler failed.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    /// Routes to the error boundary named by the code.
    #[error("bpmn error {0}")]
    Bpmn(BpmnError),

    /// Reported as a technical failure with zero retries.
    #[error(transparent)]
    Technical(#[from] anyhow::Error),
}

impl From<BpmnError> for TaskError {
    fn from(err: BpmnError) -> Self {
        TaskError::Bpmn(err)
    }
}

/// Client for starting process instances.
#[derive(Clone)]
pub struct ProcessClient {
    http: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct StartedProcess {
    id: String,
}

impl ProcessClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: trim_trailing_slash(base_url.into()),
        }
    }

    /// Start a process by definition key; returns the process instance id.
    pub async fn start_process(
        &self,
        process_key: &str,
        business_key: Option<&str>,
        variables: &Variables,
    ) -> SagaResult<String> {
        let mut body = serde_json::json!({
            "variables": variables.encode(),
        });
        if let Some(key) = business_key {
            body["businessKey"] = serde_json::Value::String(key.to_string());
        }

        let response = self
            .http
            .post(format!(
                "{}/process-definition/key/{}/start",
                self.base_url, process_key
            ))
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(engine_error(response).await);
        }

        let started: StartedProcess = response.json().await?;
        info!(
            process_key,
            process_instance_id = %started.id,
            "process instance started"
        );
        Ok(started.id)
    }
}

pub(crate) fn trim_trailing_slash(mut url: String) -> String {
    while url.ends_with('/') {
        url.pop();
    }
    url
}

pub(crate) async fn engine_error(response: reqwest::Response) -> SagaClientError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    SagaClientError::Engine { status, body }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_slashes_are_trimmed() {
        assert_eq!(
            trim_trailing_slash("http://engine:8080/engine-rest//".into()),
            "http://engine:8080/engine-rest"
        );
    }

    #[test]
    fn bpmn_error_converts_into_task_error() {
        let err: TaskError = BpmnError::new("LOCK_PRICES_FAILED", "price is locked").into();
        assert!(matches!(err, TaskError::Bpmn(ref e) if e.code == "LOCK_PRICES_FAILED"));
    }
}
