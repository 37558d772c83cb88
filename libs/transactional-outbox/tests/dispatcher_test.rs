//! Dispatcher semantics against in-memory repository and publisher doubles.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use sqlx::{Postgres, Transaction};
use transactional_outbox::{
    DispatcherConfig, OutboxDispatcher, OutboxPublisher, OutboxRecord, OutboxRepository,
    OutboxResult, OutboxStatus, PublishError,
};
use event_schema::events::{CharacteristicPayload, EntityRef};
use event_schema::{DomainEvent, EventEnvelope};
use uuid::Uuid;

#[derive(Default)]
struct MemoryRepo {
    rows: Mutex<Vec<OutboxRecord>>,
}

impl MemoryRepo {
    fn seed(&self, record: OutboxRecord) {
        self.rows.lock().push(record);
    }

    fn statuses(&self) -> HashMap<Uuid, OutboxStatus> {
        self.rows
            .lock()
            .iter()
            .map(|r| (r.id, r.status))
            .collect()
    }
}

#[async_trait]
impl OutboxRepository for MemoryRepo {
    async fn insert(
        &self,
        _tx: &mut Transaction<'_, Postgres>,
        record: &OutboxRecord,
    ) -> OutboxResult<()> {
        self.rows.lock().push(record.clone());
        Ok(())
    }

    async fn fetch_pending(&self, limit: i64) -> OutboxResult<Vec<OutboxRecord>> {
        let rows = self.rows.lock();
        let mut pending: Vec<_> = rows
            .iter()
            .filter(|r| r.status == OutboxStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by_key(|r| r.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn mark_sent(&self, record_id: Uuid) -> OutboxResult<()> {
        let mut rows = self.rows.lock();
        let row = rows.iter_mut().find(|r| r.id == record_id).unwrap();
        row.status = OutboxStatus::Sent;
        row.processed_at = Some(chrono::Utc::now());
        Ok(())
    }

    async fn mark_failed(&self, record_id: Uuid, error: &str) -> OutboxResult<()> {
        let mut rows = self.rows.lock();
        let row = rows.iter_mut().find(|r| r.id == record_id).unwrap();
        row.status = OutboxStatus::Failed;
        row.error_message = Some(error.to_string());
        Ok(())
    }

    async fn pending_stats(&self) -> OutboxResult<(i64, i64)> {
        let pending = self
            .rows
            .lock()
            .iter()
            .filter(|r| r.status == OutboxStatus::Pending)
            .count();
        Ok((pending as i64, 0))
    }
}

/// Publisher double scripting one outcome per call, recording topics seen.
#[derive(Default)]
struct ScriptedPublisher {
    script: Mutex<Vec<Result<(), PublishError>>>,
    published: Mutex<Vec<(String, Uuid)>>,
}

impl ScriptedPublisher {
    fn push_ok(&self) {
        self.script.lock().push(Ok(()));
    }

    fn push_transport(&self) {
        self.script
            .lock()
            .push(Err(PublishError::Transport("broker down".into())));
    }

    fn push_terminal(&self) {
        self.script
            .lock()
            .push(Err(PublishError::Terminal("bad message".into())));
    }
}

#[async_trait]
impl OutboxPublisher for ScriptedPublisher {
    async fn publish(&self, topic: &str, event: &EventEnvelope) -> Result<(), PublishError> {
        self.published
            .lock()
            .push((topic.to_string(), event.event_id));
        let mut script = self.script.lock();
        if script.is_empty() {
            Ok(())
        } else {
            script.remove(0)
        }
    }
}

fn record_with_event() -> OutboxRecord {
    let envelope = EventEnvelope::new(
        DomainEvent::CharacteristicCreated(CharacteristicPayload {
            id: Uuid::new_v4(),
            name: "Speed".into(),
            value: "100".into(),
            unit: Some("Mbps".into()),
            version: 1,
        }),
        1,
    );
    OutboxRecord::for_event(&envelope).unwrap()
}

fn corrupted_record() -> OutboxRecord {
    let mut record = record_with_event();
    record.payload = serde_json::json!({"event_type": "NoSuchEvent", "payload": {}});
    record
}

fn dispatcher(
    repo: Arc<MemoryRepo>,
    publisher: Arc<ScriptedPublisher>,
) -> OutboxDispatcher<MemoryRepo, ScriptedPublisher> {
    OutboxDispatcher::new(repo, publisher, DispatcherConfig::default())
}

#[tokio::test]
async fn drains_pending_rows_in_insertion_order() {
    let repo = Arc::new(MemoryRepo::default());
    let publisher = Arc::new(ScriptedPublisher::default());

    let first = record_with_event();
    // Ensure distinct, ordered timestamps.
    let mut second = record_with_event();
    second.created_at = first.created_at + chrono::Duration::milliseconds(10);
    repo.seed(second.clone());
    repo.seed(first.clone());

    let outcome = dispatcher(repo.clone(), publisher.clone())
        .drain_once()
        .await
        .unwrap();

    assert_eq!(
        outcome,
        transactional_outbox::DrainOutcome::Drained {
            published: 2,
            failed: 0
        }
    );

    let order: Vec<Uuid> = publisher
        .published
        .lock()
        .iter()
        .map(|(_, id)| *id)
        .collect();
    let first_envelope: EventEnvelope = serde_json::from_value(first.payload).unwrap();
    assert_eq!(order[0], first_envelope.event_id);

    let statuses = repo.statuses();
    assert!(statuses.values().all(|s| *s == OutboxStatus::Sent));
}

#[tokio::test]
async fn transport_failure_leaves_rows_pending() {
    let repo = Arc::new(MemoryRepo::default());
    let publisher = Arc::new(ScriptedPublisher::default());
    publisher.push_transport();

    let record = record_with_event();
    repo.seed(record.clone());

    let outcome = dispatcher(repo.clone(), publisher)
        .drain_once()
        .await
        .unwrap();

    assert_eq!(
        outcome,
        transactional_outbox::DrainOutcome::TransportStalled { published: 0 }
    );
    assert_eq!(repo.statuses()[&record.id], OutboxStatus::Pending);
}

#[tokio::test]
async fn transport_failure_stops_later_rows_from_overtaking() {
    let repo = Arc::new(MemoryRepo::default());
    let publisher = Arc::new(ScriptedPublisher::default());
    publisher.push_transport();

    let first = record_with_event();
    let mut second = record_with_event();
    second.created_at = first.created_at + chrono::Duration::milliseconds(10);
    repo.seed(first);
    repo.seed(second.clone());

    let _ = dispatcher(repo.clone(), publisher.clone())
        .drain_once()
        .await
        .unwrap();

    // Only the head of the queue was attempted.
    assert_eq!(publisher.published.lock().len(), 1);
    assert_eq!(repo.statuses()[&second.id], OutboxStatus::Pending);
}

#[tokio::test]
async fn terminal_failure_marks_failed_and_continues() {
    let repo = Arc::new(MemoryRepo::default());
    let publisher = Arc::new(ScriptedPublisher::default());
    publisher.push_terminal();
    publisher.push_ok();

    let first = record_with_event();
    let mut second = record_with_event();
    second.created_at = first.created_at + chrono::Duration::milliseconds(10);
    repo.seed(first.clone());
    repo.seed(second.clone());

    let outcome = dispatcher(repo.clone(), publisher)
        .drain_once()
        .await
        .unwrap();

    assert_eq!(
        outcome,
        transactional_outbox::DrainOutcome::Drained {
            published: 1,
            failed: 1
        }
    );
    assert_eq!(repo.statuses()[&first.id], OutboxStatus::Failed);
    assert_eq!(repo.statuses()[&second.id], OutboxStatus::Sent);
}

#[tokio::test]
async fn unparseable_payload_is_failed_without_publishing() {
    let repo = Arc::new(MemoryRepo::default());
    let publisher = Arc::new(ScriptedPublisher::default());

    let record = corrupted_record();
    repo.seed(record.clone());

    let outcome = dispatcher(repo.clone(), publisher.clone())
        .drain_once()
        .await
        .unwrap();

    assert_eq!(
        outcome,
        transactional_outbox::DrainOutcome::Drained {
            published: 0,
            failed: 1
        }
    );
    assert!(publisher.published.lock().is_empty());
    assert_eq!(repo.statuses()[&record.id], OutboxStatus::Failed);
}

#[tokio::test]
async fn deletion_events_ride_their_family_topic() {
    let repo = Arc::new(MemoryRepo::default());
    let publisher = Arc::new(ScriptedPublisher::default());

    let envelope = EventEnvelope::new(
        DomainEvent::PriceDeleted(EntityRef { id: Uuid::new_v4() }),
        2,
    );
    repo.seed(OutboxRecord::for_event(&envelope).unwrap());

    let _ = dispatcher(repo, publisher.clone()).drain_once().await.unwrap();

    let published = publisher.published.lock();
    assert_eq!(published[0].0, "commercial.pricing.events");
}
