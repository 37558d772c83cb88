//! # Event bus adapter
//!
//! Thin publish/consume abstraction over the AMQP topic exchange that hides
//! the broker's wire details from producers and consumers:
//!
//! - one durable topic exchange (configurable, default `catalog.events`)
//! - persistent messages, publisher confirms awaited before reporting success
//! - a durable queue per (service, routing-key) pair on the consumer side
//! - trace context (B3 multi-header) and correlation id carried in message
//!   headers in both directions
//!
//! Publish failures retry with exponential backoff up to a bounded number of
//! attempts and then surface a terminal error to the caller (the outbox
//! dispatcher decides what that means for the row). Consumer handlers signal
//! transient failures (message is redelivered) or permanent ones (message is
//! logged and dropped so a poison pill never stalls the queue).

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use event_schema::EventEnvelope;
use futures::StreamExt;
use lapin::{
    options::{
        BasicAckOptions, BasicConsumeOptions, BasicNackOptions, BasicPublishOptions,
        BasicQosOptions, ConfirmSelectOptions, ExchangeDeclareOptions, QueueBindOptions,
        QueueDeclareOptions,
    },
    publisher_confirm::Confirmation,
    types::{AMQPValue, FieldTable, ShortString},
    BasicProperties, Channel, Connection, ConnectionProperties, ExchangeKind,
};
use tracing::{debug, error, info, warn, Instrument};
use trace_context::{TraceContext, CORRELATION_ID_HEADER};

pub type BusResult<T> = Result<T, EventBusError>;

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("broker error: {0}")]
    Broker(#[from] lapin::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("broker rejected the message")]
    Nacked,

    #[error("publish failed after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },
}

impl EventBusError {
    /// Whether the failure is a broker/transport condition that a later
    /// attempt may succeed at, as opposed to a malformed message.
    pub fn is_transport(&self) -> bool {
        !matches!(self, EventBusError::Serialization(_))
    }
}

/// How a consumed message was (not) handled.
#[derive(Debug, thiserror::Error)]
pub enum ConsumeError {
    /// Redeliverable condition (upstream unreachable, transient db error).
    /// The message is negatively acknowledged and requeued.
    #[error("transient consume failure: {0}")]
    Transient(#[source] anyhow::Error),

    /// The message can never be processed. It is acknowledged and logged so
    /// it does not stall the queue.
    #[error("permanent consume failure: {0}")]
    Permanent(#[source] anyhow::Error),
}

/// Headers extracted from a consumed message.
#[derive(Debug, Clone, Default)]
pub struct MessageHeaders {
    pub correlation_id: Option<String>,
    pub trace: Option<TraceContext>,
}

/// Handler invoked once per consumed message.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, envelope: EventEnvelope, headers: &MessageHeaders)
        -> Result<(), ConsumeError>;
}

#[derive(Debug, Clone)]
pub struct EventBusConfig {
    pub url: String,
    pub exchange: String,
    pub publish_retries: u32,
}

impl EventBusConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            exchange: "catalog.events".to_string(),
            publish_retries: 3,
        }
    }

    pub fn with_exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = exchange.into();
        self
    }
}

/// Connected bus handle; cheap to clone (the channel is reference-counted).
#[derive(Clone)]
pub struct EventBus {
    channel: Channel,
    config: EventBusConfig,
}

impl EventBus {
    /// Connect, enable publisher confirms and declare the topic exchange.
    /// Declaration is idempotent; every producer and consumer performs it.
    pub async fn connect(config: EventBusConfig) -> BusResult<Self> {
        let connection =
            Connection::connect(&config.url, ConnectionProperties::default()).await?;
        let channel = connection.create_channel().await?;

        channel
            .confirm_select(ConfirmSelectOptions::default())
            .await?;

        channel
            .exchange_declare(
                &config.exchange,
                ExchangeKind::Topic,
                ExchangeDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        info!(exchange = %config.exchange, "connected to message broker");

        Ok(Self { channel, config })
    }

    /// Publish an event envelope to the topic exchange.
    ///
    /// The message is persistent and the publisher confirm is awaited, so an
    /// `Ok` here means the broker durably accepted the message. Retries with
    /// exponential backoff; after the retry budget the last error surfaces.
    pub async fn publish(&self, routing_key: &str, event: &EventEnvelope) -> BusResult<()> {
        let body = serde_json::to_vec(event)?;
        let properties = self.message_properties(event);

        let mut last_error = String::new();
        for attempt in 1..=self.config.publish_retries {
            match self.try_publish(routing_key, &body, properties.clone()).await {
                Ok(()) => {
                    debug!(
                        event_id = %event.event_id,
                        routing_key,
                        "event published"
                    );
                    return Ok(());
                }
                Err(e) => {
                    last_error = e.to_string();
                    let wait = Duration::from_secs(2u64.pow(attempt));
                    warn!(
                        event_id = %event.event_id,
                        attempt,
                        retries = self.config.publish_retries,
                        error = %last_error,
                        "publish attempt failed, retrying in {}s",
                        wait.as_secs()
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }

        Err(EventBusError::RetriesExhausted {
            attempts: self.config.publish_retries,
            last_error,
        })
    }

    async fn try_publish(
        &self,
        routing_key: &str,
        body: &[u8],
        properties: BasicProperties,
    ) -> BusResult<()> {
        let confirmation = self
            .channel
            .basic_publish(
                &self.config.exchange,
                routing_key,
                BasicPublishOptions::default(),
                body,
                properties,
            )
            .await?
            .await?;

        match confirmation {
            Confirmation::Nack(_) => Err(EventBusError::Nacked),
            _ => Ok(()),
        }
    }

    fn message_properties(&self, event: &EventEnvelope) -> BasicProperties {
        let mut headers = FieldTable::default();

        if let Some(correlation_id) = &event.correlation_id {
            headers.insert(
                ShortString::from(CORRELATION_ID_HEADER),
                AMQPValue::LongString(correlation_id.as_str().into()),
            );
        }

        // Producer span context; consumers link their spans to it.
        let mut trace_headers = BTreeMap::new();
        TraceContext::new_root().inject(&mut trace_headers);
        for (key, value) in trace_headers {
            headers.insert(
                ShortString::from(key.as_str()),
                AMQPValue::LongString(value.as_str().into()),
            );
        }

        BasicProperties::default()
            .with_content_type(ShortString::from("application/json"))
            // delivery mode 2 = persistent
            .with_delivery_mode(2)
            .with_headers(headers)
    }

    /// Declare a durable queue bound to the routing key and consume it,
    /// yielding one message at a time to the handler until the channel dies.
    pub async fn consume<H>(
        &self,
        queue: &str,
        routing_key: &str,
        handler: &H,
    ) -> BusResult<()>
    where
        H: EventHandler,
    {
        self.channel.basic_qos(1, BasicQosOptions::default()).await?;

        self.channel
            .queue_declare(
                queue,
                QueueDeclareOptions {
                    durable: true,
                    ..Default::default()
                },
                FieldTable::default(),
            )
            .await?;

        self.channel
            .queue_bind(
                queue,
                &self.config.exchange,
                routing_key,
                QueueBindOptions::default(),
                FieldTable::default(),
            )
            .await?;

        let mut consumer = self
            .channel
            .basic_consume(
                queue,
                &format!("{queue}-consumer"),
                BasicConsumeOptions::default(),
                FieldTable::default(),
            )
            .await?;

        info!(queue, routing_key, "consumer started");

        while let Some(delivery) = consumer.next().await {
            let delivery = delivery?;
            let headers = extract_headers(delivery.properties.headers());

            let envelope: EventEnvelope = match serde_json::from_slice(&delivery.data) {
                Ok(envelope) => envelope,
                Err(e) => {
                    // Poison pill: acknowledge so it cannot stall the queue.
                    warn!(queue, error = %e, "dropping unserializable message");
                    delivery.ack(BasicAckOptions::default()).await?;
                    continue;
                }
            };

            let span = tracing::info_span!(
                "consume_event",
                queue,
                event_id = %envelope.event_id,
                event_type = envelope.event.event_type(),
                correlation_id = headers.correlation_id.as_deref().unwrap_or(""),
                trace_id = headers
                    .trace
                    .as_ref()
                    .map(|t| t.trace_id.as_str())
                    .unwrap_or(""),
            );

            match handler.handle(envelope, &headers).instrument(span).await {
                Ok(()) => {
                    delivery.ack(BasicAckOptions::default()).await?;
                }
                Err(ConsumeError::Transient(e)) => {
                    warn!(queue, error = %e, "transient handler failure, requeueing");
                    delivery
                        .nack(BasicNackOptions {
                            requeue: true,
                            ..Default::default()
                        })
                        .await?;
                }
                Err(ConsumeError::Permanent(e)) => {
                    error!(queue, error = %e, "permanent handler failure, dropping message");
                    delivery.ack(BasicAckOptions::default()).await?;
                }
            }
        }

        Ok(())
    }
}

/// Consume with automatic reconnection: connect, consume until the channel
/// dies, back off and reconnect. Meant to be spawned as a supervised task.
pub async fn run_consumer<H>(config: EventBusConfig, queue: String, routing_key: String, handler: H)
where
    H: EventHandler,
{
    loop {
        match EventBus::connect(config.clone()).await {
            Ok(bus) => {
                if let Err(e) = bus.consume(&queue, &routing_key, &handler).await {
                    error!(queue = %queue, error = %e, "consumer stopped, reconnecting in 5s");
                }
            }
            Err(e) => {
                error!(queue = %queue, error = %e, "broker connection failed, retrying in 5s");
            }
        }
        tokio::time::sleep(Duration::from_secs(5)).await;
    }
}

fn extract_headers(headers: &Option<FieldTable>) -> MessageHeaders {
    let Some(table) = headers else {
        return MessageHeaders::default();
    };

    let get = |key: &str| -> Option<String> {
        table
            .inner()
            .iter()
            .find(|(name, _)| name.as_str() == key)
            .and_then(|(_, value)| match value {
                AMQPValue::LongString(s) => {
                    Some(String::from_utf8_lossy(s.as_bytes()).into_owned())
                }
                _ => None,
            })
    };

    MessageHeaders {
        correlation_id: get(CORRELATION_ID_HEADER),
        trace: TraceContext::extract(get),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_classification() {
        let serde_err = serde_json::from_str::<EventEnvelope>("{").unwrap_err();
        assert!(!EventBusError::Serialization(serde_err).is_transport());
        assert!(EventBusError::Nacked.is_transport());
        assert!(EventBusError::RetriesExhausted {
            attempts: 3,
            last_error: "x".into()
        }
        .is_transport());
    }

    #[test]
    fn header_extraction_reads_correlation_and_trace() {
        let mut table = FieldTable::default();
        table.insert(
            ShortString::from(CORRELATION_ID_HEADER),
            AMQPValue::LongString("corr-7".into()),
        );
        let ctx = TraceContext::new_root();
        let mut carrier = BTreeMap::new();
        ctx.inject(&mut carrier);
        for (key, value) in carrier {
            table.insert(
                ShortString::from(key.as_str()),
                AMQPValue::LongString(value.as_str().into()),
            );
        }

        let headers = extract_headers(&Some(table));
        assert_eq!(headers.correlation_id.as_deref(), Some("corr-7"));
        assert_eq!(headers.trace.unwrap().trace_id, ctx.trace_id);
    }

    #[test]
    fn missing_headers_are_tolerated() {
        let headers = extract_headers(&None);
        assert!(headers.correlation_id.is_none());
        assert!(headers.trace.is_none());
    }
}
