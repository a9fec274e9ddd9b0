use async_trait::async_trait;
use relay_core::config::PostgresConfig;
use relay_core::MessageDefinition;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::error::StoreError;
use crate::traits::{MessageStore, StoredMessage};

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: i32,
    topic: String,
    payload: Option<Value>,
    frequency: i32,
}

impl From<MessageRow> for StoredMessage {
    fn from(row: MessageRow) -> Self {
        let frequency_seconds = u64::try_from(row.frequency).unwrap_or_else(|_| {
            warn!(id = row.id, frequency = row.frequency, "negative frequency in store, treating as one-shot");
            0
        });
        StoredMessage {
            id: row.id,
            definition: MessageDefinition {
                topic: row.topic,
                payload: row.payload.unwrap_or(Value::Null),
                frequency_seconds,
            },
        }
    }
}

fn frequency_column(definition: &MessageDefinition) -> Result<i32, StoreError> {
    i32::try_from(definition.frequency_seconds).map_err(|_| {
        StoreError::Invalid(format!(
            "frequency {} exceeds {}",
            definition.frequency_seconds,
            i32::MAX
        ))
    })
}

/// Message store backed by the `messages` table in PostgreSQL.
#[derive(Clone)]
pub struct PgMessageStore {
    pool: PgPool,
}

impl PgMessageStore {
    /// Connect a pool and apply the embedded migrations.
    pub async fn connect(config: &PostgresConfig) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.connection_string())
            .await?;
        info!("PostgreSQL connected: {}", config.host);

        sqlx::migrate!("../../migrations").run(&pool).await?;
        info!("Database migrations applied successfully");

        Ok(Self { pool })
    }
}

#[async_trait]
impl MessageStore for PgMessageStore {
    async fn list(&self) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = sqlx::query_as::<_, MessageRow>(
            "SELECT id, topic, payload, frequency FROM messages ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(StoredMessage::from).collect())
    }

    async fn get(&self, id: i32) -> Result<StoredMessage, StoreError> {
        sqlx::query_as::<_, MessageRow>(
            "SELECT id, topic, payload, frequency FROM messages WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .map(StoredMessage::from)
        .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, definition: MessageDefinition) -> Result<StoredMessage, StoreError> {
        let frequency = frequency_column(&definition)?;
        let row = sqlx::query_as::<_, MessageRow>(
            "INSERT INTO messages (topic, payload, frequency) VALUES ($1, $2, $3)
             RETURNING id, topic, payload, frequency",
        )
        .bind(&definition.topic)
        .bind(&definition.payload)
        .bind(frequency)
        .fetch_one(&self.pool)
        .await?;

        info!(id = row.id, topic = %row.topic, frequency = row.frequency, "inserted message");
        Ok(row.into())
    }

    async fn update(&self, id: i32, definition: MessageDefinition) -> Result<StoredMessage, StoreError> {
        let frequency = frequency_column(&definition)?;
        let row = sqlx::query_as::<_, MessageRow>(
            "UPDATE messages SET topic = $2, payload = $3, frequency = $4
             WHERE id = $1
             RETURNING id, topic, payload, frequency",
        )
        .bind(id)
        .bind(&definition.topic)
        .bind(&definition.payload)
        .bind(frequency)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound(id))?;

        Ok(row.into())
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn row_conversion_fills_null_payload() {
        let msg: StoredMessage = MessageRow {
            id: 1,
            topic: "t".into(),
            payload: None,
            frequency: 3,
        }
        .into();
        assert_eq!(msg.definition.payload, Value::Null);
        assert_eq!(msg.definition.frequency_seconds, 3);
    }

    #[test]
    fn negative_frequency_becomes_one_shot() {
        let msg: StoredMessage = MessageRow {
            id: 2,
            topic: "t".into(),
            payload: Some(json!({"ts": 0})),
            frequency: -4,
        }
        .into();
        assert!(msg.definition.is_one_shot());
    }

    #[test]
    fn oversized_frequency_rejected() {
        let def = MessageDefinition::new("t", json!(null), u64::from(u32::MAX));
        assert!(matches!(frequency_column(&def), Err(StoreError::Invalid(_))));
    }
}
