//! Background dispatcher that drains pending outbox rows to the broker.

use std::sync::Arc;
use std::time::Duration;

use event_schema::EventEnvelope;
use sqlx::postgres::PgListener;
use sqlx::PgPool;
use tracing::{debug, error, info, warn};

use crate::{OutboxPublisher, OutboxRepository, OutboxResult, PublishError};

/// Postgres NOTIFY channel fired by the outbox insert trigger.
pub const NOTIFY_CHANNEL: &str = "outbox_events";

#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Rows fetched per drain pass
    pub batch_size: i64,
    /// Poll fallback; the notify channel is the fast path, polling is the
    /// correctness net when notifications are missed
    pub poll_interval: Duration,
    /// Initial backoff after a transport failure
    pub backoff_base: Duration,
    /// Backoff ceiling
    pub backoff_max: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            poll_interval: Duration::from_secs(2),
            backoff_base: Duration::from_secs(1),
            backoff_max: Duration::from_secs(60),
        }
    }
}

/// Outcome of a single drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// All fetched rows reached a terminal per-row state (SENT or FAILED)
    Drained { published: usize, failed: usize },
    /// The broker was unreachable; remaining rows stay PENDING
    TransportStalled { published: usize },
}

/// Per-writer background worker turning PENDING rows into broker-acknowledged
/// publications, FIFO by `created_at`, one commit per row.
pub struct OutboxDispatcher<R: OutboxRepository, P: OutboxPublisher> {
    repository: Arc<R>,
    publisher: Arc<P>,
    config: DispatcherConfig,
}

impl<R: OutboxRepository, P: OutboxPublisher> OutboxDispatcher<R, P> {
    pub fn new(repository: Arc<R>, publisher: Arc<P>, config: DispatcherConfig) -> Self {
        Self {
            repository,
            publisher,
            config,
        }
    }

    /// Run forever: drain on startup, then on every notification or poll
    /// tick, whichever fires first. Transport failures back off
    /// exponentially without marking rows.
    pub async fn run(&self, pool: PgPool) {
        info!(
            batch_size = self.config.batch_size,
            poll_interval_secs = self.config.poll_interval.as_secs(),
            "outbox dispatcher starting"
        );

        if let Ok((pending, age_seconds)) = self.repository.pending_stats().await {
            if pending > 0 {
                info!(pending, age_seconds, "backlog found at startup");
            }
        }

        let mut backoff = self.config.backoff_base;

        loop {
            let mut listener = match PgListener::connect_with(&pool).await {
                Ok(listener) => listener,
                Err(e) => {
                    error!(error = %e, "outbox listener connection failed, retrying in 5s");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            if let Err(e) = listener.listen(NOTIFY_CHANNEL).await {
                error!(error = %e, "failed to LISTEN on outbox channel, retrying in 5s");
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }

            // Catch up on anything inserted while we were not listening.
            backoff = self.drain_and_backoff(backoff).await;

            loop {
                match tokio::time::timeout(self.config.poll_interval, listener.recv()).await {
                    Ok(Ok(notification)) => {
                        debug!(payload = notification.payload(), "outbox notification");
                    }
                    Ok(Err(e)) => {
                        warn!(error = %e, "outbox listener dropped, reconnecting");
                        break;
                    }
                    // Poll fallback fired
                    Err(_) => {}
                }

                backoff = self.drain_and_backoff(backoff).await;
            }
        }
    }

    async fn drain_and_backoff(&self, backoff: Duration) -> Duration {
        match self.drain_once().await {
            Ok(DrainOutcome::Drained { published, failed }) => {
                if published > 0 || failed > 0 {
                    info!(published, failed, "outbox drain pass complete");
                }
                self.config.backoff_base
            }
            Ok(DrainOutcome::TransportStalled { published }) => {
                warn!(
                    published,
                    backoff_secs = backoff.as_secs(),
                    "broker unavailable, leaving rows pending"
                );
                tokio::time::sleep(backoff).await;
                (backoff * 2).min(self.config.backoff_max)
            }
            Err(e) => {
                error!(error = %e, "outbox drain pass failed");
                tokio::time::sleep(backoff).await;
                (backoff * 2).min(self.config.backoff_max)
            }
        }
    }

    /// Single drain pass over pending rows in insertion order. Each row is
    /// settled individually so a crash mid-drain can neither lose nor
    /// double-mark neighbouring rows.
    pub async fn drain_once(&self) -> OutboxResult<DrainOutcome> {
        let pending = self.repository.fetch_pending(self.config.batch_size).await?;
        let mut published = 0usize;
        let mut failed = 0usize;

        for record in pending {
            let envelope: EventEnvelope = match serde_json::from_value(record.payload.clone()) {
                Ok(envelope) => envelope,
                Err(e) => {
                    // Corrupted payload can never publish.
                    self.repository
                        .mark_failed(record.id, &format!("unparseable payload: {e}"))
                        .await?;
                    failed += 1;
                    continue;
                }
            };

            match self.publisher.publish(&record.topic, &envelope).await {
                Ok(()) => {
                    self.repository.mark_sent(record.id).await?;
                    published += 1;
                }
                Err(PublishError::Terminal(reason)) => {
                    self.repository.mark_failed(record.id, &reason).await?;
                    failed += 1;
                }
                Err(PublishError::Transport(reason)) => {
                    // FIFO: stop at the first unreachable publish so later
                    // rows cannot overtake this one.
                    debug!(record_id = %record.id, reason = %reason, "publish stalled on transport");
                    return Ok(DrainOutcome::TransportStalled { published });
                }
            }
        }

        Ok(DrainOutcome::Drained { published, failed })
    }
}
