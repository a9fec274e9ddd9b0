use async_trait::async_trait;
use relay_core::MessageDefinition;
use relay_store::{MessageStore, StoreError, StoredMessage};
use tracing::debug;

use crate::signal::RestartSignal;

/// Store wrapper that requests a scheduler reload after every successful write.
///
/// Reads pass straight through. Failed writes leave the running task set alone.
pub struct SignalingStore<S> {
    inner: S,
    restart: RestartSignal,
}

impl<S: MessageStore> SignalingStore<S> {
    pub fn new(inner: S, restart: RestartSignal) -> Self {
        Self { inner, restart }
    }

    fn changed(&self, op: &'static str, id: i32) {
        debug!(op, id, "definitions changed, requesting reload");
        self.restart.notify();
    }
}

#[async_trait]
impl<S: MessageStore> MessageStore for SignalingStore<S> {
    async fn list_definitions(&self) -> Result<Vec<MessageDefinition>, StoreError> {
        self.inner.list_definitions().await
    }

    async fn list(&self) -> Result<Vec<StoredMessage>, StoreError> {
        self.inner.list().await
    }

    async fn get(&self, id: i32) -> Result<StoredMessage, StoreError> {
        self.inner.get(id).await
    }

    async fn create(&self, definition: MessageDefinition) -> Result<StoredMessage, StoreError> {
        let created = self.inner.create(definition).await?;
        self.changed("create", created.id);
        Ok(created)
    }

    async fn update(&self, id: i32, definition: MessageDefinition) -> Result<StoredMessage, StoreError> {
        let updated = self.inner.update(id, definition).await?;
        self.changed("update", id);
        Ok(updated)
    }

    async fn delete(&self, id: i32) -> Result<(), StoreError> {
        self.inner.delete(id).await?;
        self.changed("delete", id);
        Ok(())
    }
}
