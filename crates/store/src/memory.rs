use std::collections::BTreeMap;

use async_trait::async_trait;
use relay_core::MessageDefinition;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::traits::{MessageStore, StoredMessage};

#[derive(Default)]
struct Rows {
    next_id: i32,
    messages: BTreeMap<i32, MessageDefinition>,
}

/// In-process message store. Identifiers start at 1 and are never reused.
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Rows>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with `definitions`, in order.
    pub fn with_definitions(definitions: impl IntoIterator<Item = MessageDefinition>) -> Self {
        let mut rows = Rows::default();
        for definition in definitions {
            rows.next_id += 1;
            rows.messages.insert(rows.next_id, definition);
        }
        Self {
            rows: RwLock::new(rows),
        }
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn list(&self) -> Result<Vec<StoredMessage>, StoreError> {
        let rows = self.rows.read().await;
        Ok(rows
            .messages
            .iter()
            .map(|(id, definition)| StoredMessage {
                id: *id,
                definition: definition.clone(),
            })
            .collect())
    }

    async fn get(&self, id: i32) -> Result<StoredMessage, StoreError> {
        let rows = self.rows.read().await;
        rows.messages
            .get(&id)
            .map(|definition| StoredMessage {
                id,
                definition: definition.clone(),
            })
            .ok_or(StoreError::NotFound(id))
    }

    async fn create(&self, definition: MessageDefinition) -> Result<StoredMessage, StoreError> {
        let mut rows = self.rows.write().await;
        rows.next_id += 1;
        let id = rows.next_id;
        rows.messages.insert(id, definition.clone());
        Ok(StoredMessage { id, definition })
    }

    async fn update(&self, id: i32, definition: MessageDefinition) -> Result<StoredMessage, StoreError> {
        let mut rows = self.rows.write().await;
        let slot = rows.messages.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        *slot = definition.clone();
        Ok(StoredMessage { id, definition })
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        let mut rows = self.rows.write().await;
        rows.messages
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
