//! Publication saga definition: forward steps, compensations and terminal
//! transitions, as deployed to the workflow engine.
//!
//! The engine owns the executable process; this module is the in-code
//! source of truth for topics, business-error codes and the compensation
//! wiring, shared by the workers and asserted by tests.

/// Process definition key of the publication saga.
pub const PROCESS_KEY: &str = "offering-publication";

/// External-task topics, in forward order.
pub mod topics {
    pub const LOCK_PRICES: &str = "lock-prices";
    pub const VALIDATE_SPECIFICATIONS: &str = "validate-specifications";
    pub const CREATE_STORE_ENTRY: &str = "create-store-entry";
    pub const CONFIRM_PUBLICATION: &str = "confirm-publication";
    pub const UNLOCK_PRICES: &str = "unlock-prices";
    pub const REVERT_OFFERING_TO_DRAFT: &str = "revert-offering-to-draft";
    pub const DELETE_STORE_ENTRY: &str = "delete-store-entry";
}

/// Business-error codes raised by forward steps.
pub mod error_codes {
    pub const LOCK_PRICES_FAILED: &str = "LOCK_PRICES_FAILED";
    pub const VALIDATE_SPECS_FAILED: &str = "VALIDATE_SPECS_FAILED";
    pub const CREATE_STORE_FAILED: &str = "CREATE_STORE_FAILED";
    pub const CONFIRM_PUBLICATION_FAILED: &str = "CONFIRM_PUBLICATION_FAILED";
}

/// Process variables carried by the saga.
pub mod variables {
    pub const OFFERING_ID: &str = "offeringId";
    pub const PRICING_IDS: &str = "pricingIds";
    pub const SPECIFICATION_IDS: &str = "specificationIds";
}

/// One forward step and its compensation chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SagaStep {
    pub topic: &'static str,
    pub error_code: &'static str,
    /// Compensation topics run, in order, when the step raises its error.
    pub compensations: &'static [&'static str],
}

/// Final task on the success path: the price locks only protect the
/// publication window, so the saga releases them after confirmation and the
/// process ends with the offering PUBLISHED and its prices unlocked.
pub const SUCCESS_FINALIZER: &str = topics::UNLOCK_PRICES;

/// Forward path of the publication saga. Every failure path ends with the
/// offering back in DRAFT; successful completion of the last step ends the
/// saga with the offering PUBLISHED.
pub const FORWARD_STEPS: [SagaStep; 4] = [
    SagaStep {
        topic: topics::LOCK_PRICES,
        error_code: error_codes::LOCK_PRICES_FAILED,
        compensations: &[topics::REVERT_OFFERING_TO_DRAFT],
    },
    SagaStep {
        topic: topics::VALIDATE_SPECIFICATIONS,
        error_code: error_codes::VALIDATE_SPECS_FAILED,
        compensations: &[topics::UNLOCK_PRICES, topics::REVERT_OFFERING_TO_DRAFT],
    },
    SagaStep {
        topic: topics::CREATE_STORE_ENTRY,
        error_code: error_codes::CREATE_STORE_FAILED,
        compensations: &[topics::UNLOCK_PRICES, topics::REVERT_OFFERING_TO_DRAFT],
    },
    SagaStep {
        topic: topics::CONFIRM_PUBLICATION,
        error_code: error_codes::CONFIRM_PUBLICATION_FAILED,
        compensations: &[topics::UNLOCK_PRICES, topics::REVERT_OFFERING_TO_DRAFT],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_order_matches_publication_flow() {
        let order: Vec<&str> = FORWARD_STEPS.iter().map(|s| s.topic).collect();
        assert_eq!(
            order,
            vec![
                "lock-prices",
                "validate-specifications",
                "create-store-entry",
                "confirm-publication",
            ]
        );
    }

    #[test]
    fn every_failure_path_reverts_the_offering() {
        for step in &FORWARD_STEPS {
            assert_eq!(
                step.compensations.last(),
                Some(&topics::REVERT_OFFERING_TO_DRAFT),
                "step {} must end its compensation with the draft revert",
                step.topic
            );
        }
    }

    #[test]
    fn locks_are_released_once_acquired() {
        // Only the first step fails before any lock exists; every later
        // failure must unlock prices before reverting.
        for step in &FORWARD_STEPS[1..] {
            assert_eq!(
                step.compensations.first(),
                Some(&topics::UNLOCK_PRICES),
                "step {} must unlock prices first",
                step.topic
            );
        }
        assert_eq!(
            FORWARD_STEPS[0].compensations,
            &[topics::REVERT_OFFERING_TO_DRAFT]
        );
    }

    #[test]
    fn success_path_releases_price_locks() {
        assert_eq!(SUCCESS_FINALIZER, topics::UNLOCK_PRICES);
    }

    #[test]
    fn error_codes_are_unique() {
        let mut codes: Vec<&str> = FORWARD_STEPS.iter().map(|s| s.error_code).collect();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), FORWARD_STEPS.len());
    }
}
