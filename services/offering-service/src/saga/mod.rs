//! Publication saga: definition, launcher and the offering-side handlers.

pub mod definition;
pub mod handlers;

pub use definition::{error_codes, topics, variables, PROCESS_KEY};
pub use handlers::{ConfirmPublicationHandler, RevertToDraftHandler};

use saga_client::{ProcessClient, SagaResult, Variables};
use tracing::info;
use uuid::Uuid;

use crate::domain::Offering;

/// Starts publication saga instances on the workflow engine.
#[derive(Clone)]
pub struct SagaLauncher {
    client: ProcessClient,
}

impl SagaLauncher {
    pub fn new(engine_base_url: &str) -> Self {
        Self {
            client: ProcessClient::new(engine_base_url),
        }
    }

    /// Start the saga for an offering already transitioned to PUBLISHING.
    /// Returns the process instance id (the saga id).
    pub async fn start_publication(&self, offering: &Offering) -> SagaResult<String> {
        let as_strings = |ids: &[Uuid]| -> serde_json::Value {
            serde_json::Value::Array(
                ids.iter()
                    .map(|id| serde_json::Value::String(id.to_string()))
                    .collect(),
            )
        };

        let process_variables = Variables::new()
            .set(
                definition::variables::OFFERING_ID,
                offering.id.to_string(),
            )
            .set(
                definition::variables::PRICING_IDS,
                as_strings(&offering.pricing_ids),
            )
            .set(
                definition::variables::SPECIFICATION_IDS,
                as_strings(&offering.specification_ids),
            );

        let instance_id = self
            .client
            .start_process(
                PROCESS_KEY,
                Some(&offering.id.to_string()),
                &process_variables,
            )
            .await?;

        info!(
            offering_id = %offering.id,
            process_instance_id = %instance_id,
            "publication saga started"
        );

        Ok(instance_id)
    }
}
