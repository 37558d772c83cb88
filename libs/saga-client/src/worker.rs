//! Long-polling external-task worker.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use crate::{engine_error, trim_trailing_slash, SagaResult, TaskError, Variables};

/// Metadata of a fetched external task.
#[derive(Debug, Clone)]
pub struct TaskMeta {
    pub task_id: String,
    pub topic: String,
    /// Process instance id; doubles as the saga id for lock ownership.
    pub process_instance_id: String,
}

/// Handler for a single external-task topic.
#[async_trait]
pub trait TaskHandler: Send + Sync {
    async fn execute(&self, variables: Variables, task: &TaskMeta)
        -> Result<Variables, TaskError>;
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum tasks fetched per poll across subscribed topics
    pub max_tasks: u32,
    /// Engine-side lock per fetched task
    pub lock_duration: Duration,
    /// Engine-side long-poll wait before returning an empty list
    pub long_poll_timeout: Duration,
    /// Sleep between polls that returned nothing
    pub poll_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_tasks: 5,
            lock_duration: Duration::from_secs(60),
            long_poll_timeout: Duration::from_secs(20),
            poll_interval: Duration::from_millis(200),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FetchedTask {
    id: String,
    #[serde(default)]
    topic_name: String,
    #[serde(default)]
    process_instance_id: String,
    #[serde(default)]
    variables: Map<String, Value>,
}

/// External-task worker bound to a set of topics.
pub struct ExternalTaskWorker {
    http: reqwest::Client,
    base_url: String,
    worker_id: String,
    config: WorkerConfig,
    handlers: HashMap<String, Arc<dyn TaskHandler>>,
}

impl ExternalTaskWorker {
    pub fn new(base_url: impl Into<String>, worker_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: trim_trailing_slash(base_url.into()),
            worker_id: worker_id.into(),
            config: WorkerConfig::default(),
            handlers: HashMap::new(),
        }
    }

    pub fn with_config(mut self, config: WorkerConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a handler for a topic.
    pub fn subscribe(mut self, topic: impl Into<String>, handler: Arc<dyn TaskHandler>) -> Self {
        self.handlers.insert(topic.into(), handler);
        self
    }

    /// Poll loop; runs until the task is cancelled at shutdown.
    pub async fn run(&self) {
        let topics: Vec<&String> = self.handlers.keys().collect();
        info!(worker_id = %self.worker_id, ?topics, "external task worker starting");

        loop {
            match self.fetch_and_lock().await {
                Ok(tasks) => {
                    if tasks.is_empty() {
                        tokio::time::sleep(self.config.poll_interval).await;
                        continue;
                    }
                    for task in tasks {
                        self.handle_task(task).await;
                    }
                }
                Err(e) => {
                    error!(worker_id = %self.worker_id, error = %e, "fetch-and-lock failed");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }
    }

    async fn fetch_and_lock(&self) -> SagaResult<Vec<FetchedTask>> {
        let topics: Vec<Value> = self
            .handlers
            .keys()
            .map(|topic| {
                serde_json::json!({
                    "topicName": topic,
                    "lockDuration": self.config.lock_duration.as_millis() as u64,
                })
            })
            .collect();

        let payload = serde_json::json!({
            "workerId": self.worker_id,
            "maxTasks": self.config.max_tasks,
            "usePriority": true,
            "asyncResponseTimeout": self.config.long_poll_timeout.as_millis() as u64,
            "topics": topics,
        });

        let response = self
            .http
            .post(format!("{}/external-task/fetchAndLock", self.base_url))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(engine_error(response).await);
        }

        Ok(response.json().await?)
    }

    async fn handle_task(&self, task: FetchedTask) {
        let meta = TaskMeta {
            task_id: task.id.clone(),
            topic: task.topic_name.clone(),
            process_instance_id: task.process_instance_id.clone(),
        };

        let Some(handler) = self.handlers.get(&meta.topic) else {
            warn!(task_id = %meta.task_id, topic = %meta.topic, "no handler registered, failing task");
            if let Err(e) = self.fail(&meta.task_id, "no handler registered").await {
                error!(task_id = %meta.task_id, error = %e, "failed to report task failure");
            }
            return;
        };

        let variables = Variables::decode(&task.variables);
        info!(
            task_id = %meta.task_id,
            topic = %meta.topic,
            process_instance_id = %meta.process_instance_id,
            "executing external task"
        );

        let settle = match handler.execute(variables, &meta).await {
            Ok(output) => self.complete(&meta.task_id, &output).await,
            Err(TaskError::Bpmn(bpmn)) => {
                warn!(
                    task_id = %meta.task_id,
                    code = %bpmn.code,
                    message = %bpmn.message,
                    "task raised business error"
                );
                self.bpmn_error(&meta.task_id, &bpmn.code, &bpmn.message)
                    .await
            }
            Err(TaskError::Technical(e)) => {
                error!(task_id = %meta.task_id, error = %e, "task failed");
                self.fail(&meta.task_id, &e.to_string()).await
            }
        };

        if let Err(e) = settle {
            error!(task_id = %meta.task_id, error = %e, "failed to settle task with the engine");
        }
    }

    async fn complete(&self, task_id: &str, variables: &Variables) -> SagaResult<()> {
        let payload = serde_json::json!({
            "workerId": self.worker_id,
            "variables": variables.encode(),
        });
        self.post(&format!("/external-task/{task_id}/complete"), payload)
            .await
    }

    async fn fail(&self, task_id: &str, message: &str) -> SagaResult<()> {
        // Zero retries: the saga definition owns retry policy.
        let payload = serde_json::json!({
            "workerId": self.worker_id,
            "errorMessage": message,
            "errorDetails": message,
            "retries": 0,
            "retryTimeout": 0,
        });
        self.post(&format!("/external-task/{task_id}/failure"), payload)
            .await
    }

    async fn bpmn_error(&self, task_id: &str, code: &str, message: &str) -> SagaResult<()> {
        let payload = serde_json::json!({
            "workerId": self.worker_id,
            "errorCode": code,
            "errorMessage": message,
        });
        self.post(&format!("/external-task/{task_id}/bpmnError"), payload)
            .await
    }

    async fn post(&self, path: &str, payload: Value) -> SagaResult<()> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(engine_error(response).await);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetched_task_deserializes_engine_shape() {
        let json = serde_json::json!({
            "id": "task-1",
            "topicName": "lock-prices",
            "processInstanceId": "proc-9",
            "variables": {
                "offeringId": {"value": "8c1d2a34-aaaa-bbbb-cccc-111122223333", "type": "String"}
            },
            "priority": 50
        });

        let task: FetchedTask = serde_json::from_value(json).unwrap();
        assert_eq!(task.id, "task-1");
        assert_eq!(task.topic_name, "lock-prices");
        assert_eq!(task.process_instance_id, "proc-9");
        assert!(task.variables.contains_key("offeringId"));
    }

    #[test]
    fn default_config_matches_polling_contract() {
        let config = WorkerConfig::default();
        assert_eq!(config.max_tasks, 5);
        assert_eq!(config.lock_duration.as_millis(), 60_000);
        assert_eq!(config.long_poll_timeout.as_millis(), 20_000);
    }
}
