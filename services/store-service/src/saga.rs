//! External-task handlers this service contributes to the publication saga.

use async_trait::async_trait;
use saga_client::{BpmnError, TaskError, TaskHandler, TaskMeta, Variables};
use std::sync::Arc;
use tracing::{error, info};

use crate::service::ProjectionService;

pub const CREATE_STORE_ENTRY: &str = "create-store-entry";
pub const DELETE_STORE_ENTRY: &str = "delete-store-entry";

/// Business-error code routed to the saga's compensation branch.
pub const CREATE_STORE_FAILED: &str = "CREATE_STORE_FAILED";

/// Forward step S3: compose the document synchronously so the saga knows
/// the store entry exists before confirming publication.
pub struct CreateStoreEntryHandler {
    service: Arc<ProjectionService>,
}

impl CreateStoreEntryHandler {
    pub fn new(service: Arc<ProjectionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for CreateStoreEntryHandler {
    async fn execute(
        &self,
        variables: Variables,
        task: &TaskMeta,
    ) -> Result<Variables, TaskError> {
        let offering_id = variables
            .get_uuid("offeringId")
            .map_err(|e| TaskError::Bpmn(BpmnError::new(CREATE_STORE_FAILED, e.to_string())))?;

        info!(
            offering_id = %offering_id,
            process_instance_id = %task.process_instance_id,
            "creating store entry"
        );

        self.service.sync_offering(offering_id).await.map_err(|e| {
            TaskError::Bpmn(BpmnError::new(
                CREATE_STORE_FAILED,
                format!("failed to sync offering {offering_id}: {e}"),
            ))
        })?;

        Ok(Variables::new())
    }
}

/// Cleanup handler; best effort so compensation always terminates.
pub struct DeleteStoreEntryHandler {
    service: Arc<ProjectionService>,
}

impl DeleteStoreEntryHandler {
    pub fn new(service: Arc<ProjectionService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for DeleteStoreEntryHandler {
    async fn execute(
        &self,
        variables: Variables,
        task: &TaskMeta,
    ) -> Result<Variables, TaskError> {
        let offering_id = match variables.get_uuid("offeringId") {
            Ok(id) => id,
            Err(e) => {
                error!(error = %e, "delete-store-entry without offering id, skipping");
                return Ok(Variables::new());
            }
        };

        info!(
            offering_id = %offering_id,
            process_instance_id = %task.process_instance_id,
            "deleting store entry"
        );

        if let Err(e) = self.service.remove_offering(offering_id).await {
            error!(offering_id = %offering_id, error = %e, "failed to delete store entry, continuing");
        }

        Ok(Variables::new())
    }
}
