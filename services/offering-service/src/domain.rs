//! Offering aggregate and its lifecycle state machine.
//!
//! Allowed transitions:
//!
//! ```text
//! DRAFT ──publish──▶ PUBLISHING ──confirm──▶ PUBLISHED ──retire──▶ RETIRED
//!   ▲                    │
//!   └────────fail────────┘
//! ```
//!
//! Field updates and deletion are only permitted in DRAFT; while PUBLISHING
//! the offering belongs to the saga and refuses external mutation.

use chrono::{DateTime, Utc};
use error_types::{AppError, AppResult};
use event_schema::events::OfferingPayload;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LifecycleStatus {
    Draft,
    Publishing,
    Published,
    Retired,
}

impl LifecycleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStatus::Draft => "DRAFT",
            LifecycleStatus::Publishing => "PUBLISHING",
            LifecycleStatus::Published => "PUBLISHED",
            LifecycleStatus::Retired => "RETIRED",
        }
    }
}

impl std::str::FromStr for LifecycleStatus {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "DRAFT" => Ok(LifecycleStatus::Draft),
            "PUBLISHING" => Ok(LifecycleStatus::Publishing),
            "PUBLISHED" => Ok(LifecycleStatus::Published),
            "RETIRED" => Ok(LifecycleStatus::Retired),
            other => Err(AppError::Internal(format!(
                "unknown lifecycle status: {other}"
            ))),
        }
    }
}

/// A product offering referencing specifications and prices by id.
#[derive(Debug, Clone, Serialize)]
pub struct Offering {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub specification_ids: Vec<Uuid>,
    pub pricing_ids: Vec<Uuid>,
    pub sales_channels: Vec<String>,
    pub lifecycle_status: LifecycleStatus,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl Offering {
    pub fn new(
        name: String,
        description: Option<String>,
        specification_ids: Vec<Uuid>,
        pricing_ids: Vec<Uuid>,
        sales_channels: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name,
            description,
            specification_ids,
            pricing_ids,
            sales_channels,
            lifecycle_status: LifecycleStatus::Draft,
            version: 1,
            created_at: now,
            updated_at: now,
            published_at: None,
            retired_at: None,
        }
    }

    /// Publication preconditions: at least one specification, one price and
    /// one sales channel.
    pub fn can_publish(&self) -> bool {
        !self.specification_ids.is_empty()
            && !self.pricing_ids.is_empty()
            && !self.sales_channels.is_empty()
    }

    fn touch(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    /// DRAFT → PUBLISHING
    pub fn publish(&mut self) -> AppResult<()> {
        if self.lifecycle_status != LifecycleStatus::Draft {
            return Err(AppError::Lifecycle(format!(
                "cannot publish from {} state",
                self.lifecycle_status.as_str()
            )));
        }
        if !self.can_publish() {
            return Err(AppError::Validation(
                "offering needs at least one specification, one price and one sales channel to be published"
                    .to_string(),
            ));
        }

        self.lifecycle_status = LifecycleStatus::Publishing;
        self.touch();
        Ok(())
    }

    /// PUBLISHING → PUBLISHED
    pub fn confirm_publication(&mut self) -> AppResult<()> {
        if self.lifecycle_status != LifecycleStatus::Publishing {
            return Err(AppError::Lifecycle(format!(
                "cannot confirm publication from {} state",
                self.lifecycle_status.as_str()
            )));
        }

        self.lifecycle_status = LifecycleStatus::Published;
        self.published_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// PUBLISHING → DRAFT (compensation)
    pub fn fail_publication(&mut self) -> AppResult<()> {
        if self.lifecycle_status != LifecycleStatus::Publishing {
            return Err(AppError::Lifecycle(format!(
                "cannot fail publication from {} state",
                self.lifecycle_status.as_str()
            )));
        }

        self.lifecycle_status = LifecycleStatus::Draft;
        self.touch();
        Ok(())
    }

    /// PUBLISHED → RETIRED
    pub fn retire(&mut self) -> AppResult<()> {
        if self.lifecycle_status != LifecycleStatus::Published {
            return Err(AppError::Lifecycle(format!(
                "cannot retire from {} state",
                self.lifecycle_status.as_str()
            )));
        }

        self.lifecycle_status = LifecycleStatus::Retired;
        self.retired_at = Some(Utc::now());
        self.touch();
        Ok(())
    }

    /// Guard for field updates and deletion.
    pub fn ensure_draft(&self, operation: &str) -> AppResult<()> {
        if self.lifecycle_status != LifecycleStatus::Draft {
            return Err(AppError::Lifecycle(format!(
                "cannot {operation} offering in {} state",
                self.lifecycle_status.as_str()
            )));
        }
        Ok(())
    }

    pub fn to_payload(&self) -> OfferingPayload {
        OfferingPayload {
            id: self.id,
            name: self.name.clone(),
            description: self.description.clone(),
            specification_ids: self.specification_ids.clone(),
            pricing_ids: self.pricing_ids.clone(),
            sales_channels: self.sales_channels.clone(),
            lifecycle_status: self.lifecycle_status.as_str().to_string(),
            version: self.version,
            published_at: self.published_at,
            retired_at: self.retired_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publishable() -> Offering {
        Offering::new(
            "Fiber 100".into(),
            None,
            vec![Uuid::new_v4()],
            vec![Uuid::new_v4()],
            vec!["WEB".into()],
        )
    }

    #[test]
    fn happy_path_walks_all_states() {
        let mut offering = publishable();
        assert_eq!(offering.lifecycle_status, LifecycleStatus::Draft);

        offering.publish().unwrap();
        assert_eq!(offering.lifecycle_status, LifecycleStatus::Publishing);

        offering.confirm_publication().unwrap();
        assert_eq!(offering.lifecycle_status, LifecycleStatus::Published);
        assert!(offering.published_at.is_some());

        offering.retire().unwrap();
        assert_eq!(offering.lifecycle_status, LifecycleStatus::Retired);
        assert!(offering.retired_at.is_some());
    }

    #[test]
    fn compensation_returns_to_draft() {
        let mut offering = publishable();
        offering.publish().unwrap();

        offering.fail_publication().unwrap();
        assert_eq!(offering.lifecycle_status, LifecycleStatus::Draft);

        // Re-publish after compensation is allowed.
        offering.publish().unwrap();
        assert_eq!(offering.lifecycle_status, LifecycleStatus::Publishing);
    }

    #[test]
    fn publish_requires_refs_and_channel() {
        let mut offering = Offering::new("Empty".into(), None, vec![], vec![], vec![]);
        assert!(!offering.can_publish());
        assert!(matches!(
            offering.publish(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn publishing_blocks_external_mutation() {
        let mut offering = publishable();
        offering.publish().unwrap();
        assert!(matches!(
            offering.ensure_draft("update"),
            Err(AppError::Lifecycle(_))
        ));
    }

    #[test]
    fn only_allowed_edges_exist() {
        // DRAFT cannot confirm, fail or retire.
        let mut offering = publishable();
        assert!(offering.confirm_publication().is_err());
        assert!(offering.fail_publication().is_err());
        assert!(offering.retire().is_err());

        // PUBLISHED cannot publish again or fail.
        offering.publish().unwrap();
        offering.confirm_publication().unwrap();
        assert!(offering.publish().is_err());
        assert!(offering.fail_publication().is_err());

        // RETIRED is terminal.
        offering.retire().unwrap();
        assert!(offering.publish().is_err());
        assert!(offering.confirm_publication().is_err());
        assert!(offering.retire().is_err());
    }

    #[test]
    fn version_increases_on_every_transition() {
        let mut offering = publishable();
        let initial = offering.version;
        offering.publish().unwrap();
        offering.confirm_publication().unwrap();
        assert_eq!(offering.version, initial + 2);
    }
}
