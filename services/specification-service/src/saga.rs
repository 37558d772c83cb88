//! External-task handlers this service contributes to the publication saga.

use async_trait::async_trait;
use saga_client::{BpmnError, TaskError, TaskHandler, TaskMeta, Variables};
use std::sync::Arc;
use tracing::info;

use crate::service::SpecificationService;

/// Topic handled by this worker.
pub const VALIDATE_SPECIFICATIONS: &str = "validate-specifications";

/// Business-error code routed to the saga's compensation branch.
pub const VALIDATE_SPECS_FAILED: &str = "VALIDATE_SPECS_FAILED";

pub struct ValidateSpecificationsHandler {
    service: Arc<SpecificationService>,
}

impl ValidateSpecificationsHandler {
    pub fn new(service: Arc<SpecificationService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for ValidateSpecificationsHandler {
    async fn execute(
        &self,
        variables: Variables,
        task: &TaskMeta,
    ) -> Result<Variables, TaskError> {
        let spec_ids = variables
            .get_uuid_list("specificationIds")
            .map_err(|e| TaskError::Bpmn(BpmnError::new(VALIDATE_SPECS_FAILED, e.to_string())))?;

        info!(
            process_instance_id = %task.process_instance_id,
            count = spec_ids.len(),
            "validating specifications for publication"
        );

        self.service.validate_all(&spec_ids).await.map_err(|e| {
            TaskError::Bpmn(BpmnError::new(
                VALIDATE_SPECS_FAILED,
                format!("specification validation failed: {e}"),
            ))
        })?;

        Ok(Variables::new())
    }
}
