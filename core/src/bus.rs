//! Message Bus backed by a Postgres table polled with `SELECT ... FOR
//! UPDATE SKIP LOCKED`. An AMQP-shaped contract (six topic queues, a DLX,
//! `ack`/`nack-requeue`/`nack-drop`) is preserved at the trait boundary,
//! reproduced directly against the Catalog Store's own database rather
//! than a separate broker dependency. `redis` pub/sub is used only to
//! wake idle consumers faster than their poll interval — never required
//! for correctness.

use async_trait::async_trait;
use catalog_contracts::{BusError, BusResult, Delivery, MessageBus};
use catalog_model::{BackgroundJobId, MessageId, MessageKind, Queue};
use sqlx::{PgPool, Row};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PostgresMessageBus {
    pool: PgPool,
    max_queue_length: u32,
    max_requeue_attempts: u32,
    wake: Option<Arc<redis::Client>>,
}

impl PostgresMessageBus {
    pub fn new(pool: PgPool, max_queue_length: u32, max_requeue_attempts: u32) -> Self {
        Self { pool, max_queue_length, max_requeue_attempts, wake: None }
    }

    pub fn with_redis_wake(mut self, client: redis::Client) -> Self {
        self.wake = Some(Arc::new(client));
        self
    }

    async fn notify_wake(&self, queue: Queue) {
        let Some(client) = &self.wake else { return };
        let channel = format!("catalog:bus:wake:{}", queue.routing_pattern());
        if let Ok(mut conn) = client.get_multiplexed_async_connection().await {
            use redis::AsyncCommands;
            let _: Result<(), _> = conn.publish(channel, 1u8).await;
        }
    }
}

#[async_trait]
impl MessageBus for PostgresMessageBus {
    async fn setup(&self) -> BusResult<()> {
        sqlx::query(SCHEMA)
            .execute(&self.pool)
            .await
            .map_err(|e| BusError::Transport(e.into()))?;
        Ok(())
    }

    async fn publish(
        &self,
        kind: MessageKind,
        correlation_id: Option<BackgroundJobId>,
        payload: serde_json::Value,
    ) -> BusResult<MessageId> {
        let queue = Queue::for_kind(kind);
        let count: i64 = sqlx::query_scalar(
            "SELECT count(*) FROM bus_messages WHERE queue = $1 AND state = 'ready'",
        )
        .bind(queue.routing_pattern())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| BusError::Transport(e.into()))?;

        if count as u32 >= self.max_queue_length {
            return Err(BusError::QueueFull);
        }

        let id = MessageId::new();
        sqlx::query(
            "INSERT INTO bus_messages (id, queue, kind, correlation_id, payload, attempts, state, enqueued_at) \
             VALUES ($1, $2, $3, $4, $5, 0, 'ready', now())",
        )
        .bind(id.as_str())
        .bind(queue.routing_pattern())
        .bind(format!("{kind:?}"))
        .bind(correlation_id.as_ref().map(|c| c.as_str().to_string()))
        .bind(payload)
        .execute(&self.pool)
        .await
        .map_err(|e| BusError::Transport(e.into()))?;

        self.notify_wake(queue).await;
        Ok(id)
    }

    async fn consume(&self, queue: Queue, max: u32) -> BusResult<Vec<Delivery>> {
        let mut tx = self.pool.begin().await.map_err(|e| BusError::Transport(e.into()))?;
        let rows = sqlx::query(
            "SELECT id, queue, kind, correlation_id, payload, attempts, enqueued_at FROM bus_messages \
             WHERE queue = $1 AND state = 'ready' \
             ORDER BY enqueued_at ASC \
             FOR UPDATE SKIP LOCKED \
             LIMIT $2",
        )
        .bind(queue.routing_pattern())
        .bind(max as i64)
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| BusError::Transport(e.into()))?;

        let mut deliveries = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(|e| BusError::Transport(e.into()))?;
            sqlx::query("UPDATE bus_messages SET state = 'in_flight' WHERE id = $1")
                .bind(&id)
                .execute(&mut *tx)
                .await
                .map_err(|e| BusError::Transport(e.into()))?;

            let kind_str: String = row.try_get("kind").map_err(|e| BusError::Transport(e.into()))?;
            let kind = parse_kind(&kind_str)?;
            let correlation_id: Option<String> =
                row.try_get("correlation_id").map_err(|e| BusError::Transport(e.into()))?;
            deliveries.push(Delivery {
                id: id.into(),
                queue,
                kind,
                correlation_id: correlation_id.map(Into::into),
                payload: row.try_get("payload").map_err(|e| BusError::Transport(e.into()))?,
                attempts: row.try_get::<i32, _>("attempts").map_err(|e| BusError::Transport(e.into()))? as u32,
                enqueued_at: row.try_get("enqueued_at").map_err(|e| BusError::Transport(e.into()))?,
            });
        }
        tx.commit().await.map_err(|e| BusError::Transport(e.into()))?;
        Ok(deliveries)
    }

    async fn ack(&self, id: &MessageId) -> BusResult<()> {
        sqlx::query("DELETE FROM bus_messages WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| BusError::Transport(e.into()))?;
        Ok(())
    }

    async fn nack_requeue(&self, id: &MessageId) -> BusResult<()> {
        let row = sqlx::query("SELECT attempts, queue, kind, correlation_id, payload FROM bus_messages WHERE id = $1")
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| BusError::Transport(e.into()))?;
        let Some(row) = row else {
            return Err(BusError::NotFound(id.as_str().to_string()));
        };
        let attempts: i32 = row.try_get("attempts").map_err(|e| BusError::Transport(e.into()))?;

        if attempts as u32 + 1 >= self.max_requeue_attempts {
            return self.nack_drop(id).await;
        }

        sqlx::query("UPDATE bus_messages SET state = 'ready', attempts = attempts + 1 WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| BusError::Transport(e.into()))?;
        Ok(())
    }

    async fn nack_drop(&self, id: &MessageId) -> BusResult<()> {
        let mut tx = self.pool.begin().await.map_err(|e| BusError::Transport(e.into()))?;
        let row = sqlx::query(
            "SELECT queue, kind, correlation_id, payload, attempts, enqueued_at FROM bus_messages WHERE id = $1",
        )
        .bind(id.as_str())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| BusError::Transport(e.into()))?;
        let Some(row) = row else {
            return Err(BusError::NotFound(id.as_str().to_string()));
        };

        sqlx::query(
            "INSERT INTO dead_letters (id, queue, kind, correlation_id, payload, attempts, enqueued_at, dead_lettered_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, now())",
        )
        .bind(id.as_str())
        .bind(row.try_get::<String, _>("queue").map_err(|e| BusError::Transport(e.into()))?)
        .bind(row.try_get::<String, _>("kind").map_err(|e| BusError::Transport(e.into()))?)
        .bind(row.try_get::<Option<String>, _>("correlation_id").map_err(|e| BusError::Transport(e.into()))?)
        .bind(row.try_get::<serde_json::Value, _>("payload").map_err(|e| BusError::Transport(e.into()))?)
        .bind(row.try_get::<i32, _>("attempts").map_err(|e| BusError::Transport(e.into()))?)
        .bind(row.try_get::<chrono::DateTime<chrono::Utc>, _>("enqueued_at").map_err(|e| BusError::Transport(e.into()))?)
        .execute(&mut *tx)
        .await
        .map_err(|e| BusError::Transport(e.into()))?;

        sqlx::query("DELETE FROM bus_messages WHERE id = $1")
            .bind(id.as_str())
            .execute(&mut *tx)
            .await
            .map_err(|e| BusError::Transport(e.into()))?;

        tx.commit().await.map_err(|e| BusError::Transport(e.into()))?;
        Ok(())
    }

    async fn dead_letters(&self, queue: Queue, limit: u32) -> BusResult<Vec<Delivery>> {
        let rows = sqlx::query(
            "SELECT id, queue, kind, correlation_id, payload, attempts, enqueued_at FROM dead_letters \
             WHERE queue = $1 ORDER BY dead_lettered_at DESC LIMIT $2",
        )
        .bind(queue.routing_pattern())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| BusError::Transport(e.into()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            let kind_str: String = row.try_get("kind").map_err(|e| BusError::Transport(e.into()))?;
            let correlation_id: Option<String> =
                row.try_get("correlation_id").map_err(|e| BusError::Transport(e.into()))?;
            out.push(Delivery {
                id: row.try_get::<String, _>("id").map_err(|e| BusError::Transport(e.into()))?.into(),
                queue,
                kind: parse_kind(&kind_str)?,
                correlation_id: correlation_id.map(Into::into),
                payload: row.try_get("payload").map_err(|e| BusError::Transport(e.into()))?,
                attempts: row.try_get::<i32, _>("attempts").map_err(|e| BusError::Transport(e.into()))? as u32,
                enqueued_at: row.try_get("enqueued_at").map_err(|e| BusError::Transport(e.into()))?,
            });
        }
        Ok(out)
    }
}

fn parse_kind(s: &str) -> BusResult<MessageKind> {
    serde_json::from_value(serde_json::Value::String(s.to_string()))
        .map_err(|e| BusError::Transport(anyhow::anyhow!("unrecognized message kind {s}: {e}")))
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bus_messages (
    id TEXT PRIMARY KEY,
    queue TEXT NOT NULL,
    kind TEXT NOT NULL,
    correlation_id TEXT,
    payload JSONB NOT NULL,
    attempts INT NOT NULL DEFAULT 0,
    state TEXT NOT NULL DEFAULT 'ready',
    enqueued_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS bus_messages_queue_state_idx ON bus_messages (queue, state, enqueued_at);

CREATE TABLE IF NOT EXISTS dead_letters (
    id TEXT PRIMARY KEY,
    queue TEXT NOT NULL,
    kind TEXT NOT NULL,
    correlation_id TEXT,
    payload JSONB NOT NULL,
    attempts INT NOT NULL,
    enqueued_at TIMESTAMPTZ NOT NULL,
    dead_lettered_at TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS dead_letters_queue_idx ON dead_letters (queue, dead_lettered_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kind_round_trips_all_variants() {
        for kind in [
            MessageKind::CollectionScan,
            MessageKind::ThumbnailGeneration,
            MessageKind::CacheGeneration,
            MessageKind::ImageProcessing,
            MessageKind::BulkOperation,
            MessageKind::CollectionCreation,
        ] {
            let s = serde_json::to_value(kind).unwrap().as_str().unwrap().to_string();
            assert_eq!(parse_kind(&s).unwrap(), kind);
        }
    }
}
