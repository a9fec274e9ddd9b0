//! Bulk-load message definitions from a JSON file.
//!
//! The file holds an array of `{"topic", "payload", "frequency"}` objects.

use std::path::Path;

use anyhow::Context;
use relay_core::{MessageDefinition, MAX_FREQUENCY_SECONDS};
use relay_store::MessageStore;
use tracing::{info, warn};

pub fn read_seed_file(path: &Path) -> anyhow::Result<Vec<MessageDefinition>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let definitions: Vec<MessageDefinition> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing seed file {}", path.display()))?;
    Ok(definitions)
}

/// Insert every definition with a non-empty topic and a storable frequency.
/// Returns how many were stored.
pub async fn seed(store: &dyn MessageStore, definitions: Vec<MessageDefinition>) -> anyhow::Result<usize> {
    let mut inserted = 0;
    for definition in definitions {
        if definition.topic.trim().is_empty() {
            warn!("skipping seed entry with empty topic");
            continue;
        }
        if definition.frequency_seconds > MAX_FREQUENCY_SECONDS {
            warn!(
                topic = %definition.topic,
                frequency = definition.frequency_seconds,
                "skipping seed entry with out-of-range frequency"
            );
            continue;
        }
        let row = store.create(definition).await.context("inserting seed definition")?;
        info!(id = row.id, topic = %row.definition.topic, frequency = row.definition.frequency_seconds, "seeded");
        inserted += 1;
    }
    Ok(inserted)
}

pub async fn seed_file(store: &dyn MessageStore, path: &Path) -> anyhow::Result<usize> {
    let definitions = read_seed_file(path)?;
    let inserted = seed(store, definitions).await?;
    info!("Seeded {} message definitions from {}", inserted, path.display());
    Ok(inserted)
}
