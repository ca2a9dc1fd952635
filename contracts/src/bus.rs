use crate::errors::BusError;
use async_trait::async_trait;
use catalog_model::{BackgroundJobId, MessageId, MessageKind, Queue};
use chrono::{DateTime, Utc};

pub type BusResult<T> = Result<T, BusError>;

/// A message dequeued from a `Queue`, ready for a consumer to process and
/// then `ack`/`nack_requeue`/`nack_drop` by its `id`.
#[derive(Debug, Clone)]
pub struct Delivery {
    pub id: MessageId,
    pub queue: Queue,
    pub kind: MessageKind,
    pub correlation_id: Option<BackgroundJobId>,
    pub payload: serde_json::Value,
    pub attempts: u32,
    pub enqueued_at: DateTime<Utc>,
}

impl Delivery {
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, BusError> {
        serde_json::from_value(self.payload.clone())
            .map_err(|e| BusError::Transport(anyhow::anyhow!(e)))
    }
}

/// A durable, topic-routed queue. Delivery is at-least-once; handlers
/// must be idempotent by `(kind, target id, input fingerprint)`.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Idempotent: declares queues/bindings/DLQ if not already present.
    async fn setup(&self) -> BusResult<()>;

    async fn publish(
        &self,
        kind: MessageKind,
        correlation_id: Option<BackgroundJobId>,
        payload: serde_json::Value,
    ) -> BusResult<MessageId>;

    /// Pulls up to `max` ready messages from `queue`, bounded by the
    /// queue's configured prefetch.
    async fn consume(&self, queue: Queue, max: u32) -> BusResult<Vec<Delivery>>;

    async fn ack(&self, id: &MessageId) -> BusResult<()>;
    async fn nack_requeue(&self, id: &MessageId) -> BusResult<()>;
    /// Moves the message to the dead-letter exchange.
    async fn nack_drop(&self, id: &MessageId) -> BusResult<()>;

    async fn dead_letters(&self, queue: Queue, limit: u32) -> BusResult<Vec<Delivery>>;
}
