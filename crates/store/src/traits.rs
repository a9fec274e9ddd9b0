use std::sync::Arc;

use async_trait::async_trait;
use relay_core::MessageDefinition;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// A persisted definition together with its row identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i32,
    #[serde(flatten)]
    pub definition: MessageDefinition,
}

/// Storage backend for message definitions.
///
/// Implementations must be safe for concurrent use; the scheduler and the
/// HTTP handlers call into the same store without extra serialization.
#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Atomically read every definition, ordered by identifier.
    async fn list_definitions(&self) -> Result<Vec<MessageDefinition>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .map(|m| m.definition)
            .collect())
    }

    /// All stored messages, ordered by identifier.
    async fn list(&self) -> Result<Vec<StoredMessage>, StoreError>;

    async fn get(&self, id: i32) -> Result<StoredMessage, StoreError>;

    async fn create(&self, definition: MessageDefinition) -> Result<StoredMessage, StoreError>;

    async fn update(&self, id: i32, definition: MessageDefinition) -> Result<StoredMessage, StoreError>;

    async fn delete(&self, id: i32) -> Result<(), StoreError>;
}

/// Blanket implementation so `Arc<dyn MessageStore>` can be used directly.
#[async_trait]
impl<T: MessageStore + ?Sized> MessageStore for Arc<T> {
    async fn list_definitions(&self) -> Result<Vec<MessageDefinition>, StoreError> {
        (**self).list_definitions().await
    }

    async fn list(&self) -> Result<Vec<StoredMessage>, StoreError> {
        (**self).list().await
    }

    async fn get(&self, id: i32) -> Result<StoredMessage, StoreError> {
        (**self).get(id).await
    }

    async fn create(&self, definition: MessageDefinition) -> Result<StoredMessage, StoreError> {
        (**self).create(definition).await
    }

    async fn update(&self, id: i32, definition: MessageDefinition) -> Result<StoredMessage, StoreError> {
        (**self).update(id, definition).await
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        (**self).delete(id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn stored_message_serializes_flat() {
        let msg = StoredMessage {
            id: 3,
            definition: MessageDefinition::new("a/b", json!({"v": 1}), 10),
        };
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({"id": 3, "topic": "a/b", "payload": {"v": 1}, "frequency": 10})
        );
    }
}
