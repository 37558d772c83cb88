//! External-task handlers owned by the offering writer.

use async_trait::async_trait;
use saga_client::{BpmnError, TaskError, TaskHandler, TaskMeta, Variables};
use std::sync::Arc;
use tracing::{error, info};

use crate::saga::definition::{error_codes, variables};
use crate::service::OfferingService;

/// Terminal forward step S4: PUBLISHING → PUBLISHED.
pub struct ConfirmPublicationHandler {
    service: Arc<OfferingService>,
}

impl ConfirmPublicationHandler {
    pub fn new(service: Arc<OfferingService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for ConfirmPublicationHandler {
    async fn execute(
        &self,
        task_variables: Variables,
        task: &TaskMeta,
    ) -> Result<Variables, TaskError> {
        let offering_id = task_variables.get_uuid(variables::OFFERING_ID).map_err(|e| {
            TaskError::Bpmn(BpmnError::new(
                error_codes::CONFIRM_PUBLICATION_FAILED,
                e.to_string(),
            ))
        })?;

        info!(
            offering_id = %offering_id,
            process_instance_id = %task.process_instance_id,
            "confirming publication"
        );

        self.service.confirm(offering_id, None).await.map_err(|e| {
            TaskError::Bpmn(BpmnError::new(
                error_codes::CONFIRM_PUBLICATION_FAILED,
                format!("failed to confirm offering {offering_id}: {e}"),
            ))
        })?;

        Ok(Variables::new())
    }
}

/// Compensation: PUBLISHING → DRAFT. Best effort; compensation must always
/// terminate, so failures are logged and the task still completes.
pub struct RevertToDraftHandler {
    service: Arc<OfferingService>,
}

impl RevertToDraftHandler {
    pub fn new(service: Arc<OfferingService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for RevertToDraftHandler {
    async fn execute(
        &self,
        task_variables: Variables,
        task: &TaskMeta,
    ) -> Result<Variables, TaskError> {
        let offering_id = match task_variables.get_uuid(variables::OFFERING_ID) {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "revert-to-draft without offering id, skipping");
                return Ok(Variables::new());
            }
        };

        info!(
            offering_id = %offering_id,
            process_instance_id = %task.process_instance_id,
            "reverting offering to draft"
        );

        if let Err(e) = self.service.fail(offering_id, None).await {
            error!(offering_id = %offering_id, error = %e, "failed to revert offering, continuing");
        }

        Ok(Variables::new())
    }
}
