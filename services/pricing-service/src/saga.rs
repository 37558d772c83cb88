//! External-task handlers this service contributes to the publication saga.

use async_trait::async_trait;
use saga_client::{BpmnError, TaskError, TaskHandler, TaskMeta, Variables};
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::service::PricingService;

pub const LOCK_PRICES: &str = "lock-prices";
pub const UNLOCK_PRICES: &str = "unlock-prices";

/// Business-error code routed to the saga's compensation branch.
pub const LOCK_PRICES_FAILED: &str = "LOCK_PRICES_FAILED";

/// Forward step S1: lock every referenced price for this saga. The process
/// instance id is the saga id, so retries of the same saga re-acquire their
/// own locks idempotently.
pub struct LockPricesHandler {
    service: Arc<PricingService>,
}

impl LockPricesHandler {
    pub fn new(service: Arc<PricingService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for LockPricesHandler {
    async fn execute(
        &self,
        variables: Variables,
        task: &TaskMeta,
    ) -> Result<Variables, TaskError> {
        let price_ids = variables
            .get_uuid_list("pricingIds")
            .map_err(|e| TaskError::Bpmn(BpmnError::new(LOCK_PRICES_FAILED, e.to_string())))?;
        let saga_id = Uuid::parse_str(&task.process_instance_id)
            .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_OID, task.process_instance_id.as_bytes()));

        info!(
            process_instance_id = %task.process_instance_id,
            count = price_ids.len(),
            "locking prices for publication"
        );

        for price_id in &price_ids {
            self.service.lock(*price_id, saga_id).await.map_err(|e| {
                TaskError::Bpmn(BpmnError::new(
                    LOCK_PRICES_FAILED,
                    format!("failed to lock price {price_id}: {e}"),
                ))
            })?;
        }

        Ok(Variables::new())
    }
}

/// Compensation step: release the locks. Best effort on purpose; a price
/// that cannot be unlocked is logged and skipped so the compensation path
/// always terminates.
pub struct UnlockPricesHandler {
    service: Arc<PricingService>,
}

impl UnlockPricesHandler {
    pub fn new(service: Arc<PricingService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TaskHandler for UnlockPricesHandler {
    async fn execute(
        &self,
        variables: Variables,
        task: &TaskMeta,
    ) -> Result<Variables, TaskError> {
        let price_ids = variables.get_uuid_list("pricingIds").unwrap_or_default();

        info!(
            process_instance_id = %task.process_instance_id,
            count = price_ids.len(),
            "unlocking prices after failed publication"
        );

        for price_id in &price_ids {
            if let Err(e) = self.service.unlock(*price_id).await {
                error!(price_id = %price_id, error = %e, "failed to unlock price, continuing");
            }
        }

        Ok(Variables::new())
    }
}
