use std::sync::Arc;

use relay_broker::{PublishError, Publisher, QoS};
use relay_core::{unix_now, MessageDefinition};
use relay_hub::HubHandle;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info, warn};

/// Reasons a single emission is abandoned.
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("payload serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Performs one emission: stamp, serialize, publish, then broadcast.
///
/// Cheap to clone; every emission task holds its own copy.
#[derive(Clone)]
pub struct Emitter {
    publisher: Arc<dyn Publisher>,
    hub: HubHandle,
}

impl Emitter {
    pub fn new(publisher: Arc<dyn Publisher>, hub: HubHandle) -> Self {
        Self { publisher, hub }
    }

    /// Emit `definition` once and return the payload that was published.
    ///
    /// Observers only see the message after the broker accepted it.
    pub async fn emit(&self, definition: &MessageDefinition) -> Result<Value, EmitError> {
        let payload = definition.stamped_payload(unix_now());
        let bytes = serde_json::to_vec(&payload)?;

        self.publisher
            .publish(&definition.topic, &bytes, false, QoS::AtMostOnce)
            .await?;

        // A closed hub only means nobody is watching anymore.
        if let Err(e) = self.hub.broadcast(&definition.topic, &payload) {
            debug!(topic = %definition.topic, error = %e, "broadcast skipped");
        }

        Ok(payload)
    }

    /// [`emit`](Self::emit), with failures logged and contained.
    pub async fn emit_logged(&self, definition: &MessageDefinition) -> bool {
        match self.emit(definition).await {
            Ok(_) => {
                info!(topic = %definition.topic, "published message");
                true
            }
            Err(EmitError::Serialization(e)) => {
                error!(topic = %definition.topic, error = %e, "failed to serialize payload, emission skipped");
                false
            }
            Err(EmitError::Publish(e)) => {
                warn!(topic = %definition.topic, error = %e, "failed to publish message");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    use async_trait::async_trait;
    use relay_broker::{PublishError, Publisher, QoS};
    use serde_json::Value;

    /// Publisher that records every call and can be told to fail or stall.
    #[derive(Default)]
    pub struct RecordingPublisher {
        pub published: Mutex<Vec<(String, Value, bool, QoS)>>,
        pub fail: AtomicBool,
        pub delay: Mutex<Option<Duration>>,
        pub in_flight: AtomicUsize,
        pub max_in_flight: AtomicUsize,
    }

    impl RecordingPublisher {
        pub fn topics(&self) -> Vec<String> {
            self.published
                .lock()
                .unwrap()
                .iter()
                .map(|(t, ..)| t.clone())
                .collect()
        }

        pub fn count(&self, topic: &str) -> usize {
            self.topics().iter().filter(|t| *t == topic).count()
        }

        pub fn clear(&self) {
            self.published.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn publish(
            &self,
            topic: &str,
            payload: &[u8],
            retain: bool,
            qos: QoS,
        ) -> Result<(), PublishError> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = *self.delay.lock().unwrap();
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            if self.fail.load(Ordering::SeqCst) {
                return Err(PublishError::Rejected("broker unavailable".into()));
            }
            let value: Value = serde_json::from_slice(payload).unwrap();
            self.published
                .lock()
                .unwrap()
                .push((topic.to_string(), value, retain, qos));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingPublisher;
    use super::*;
    use relay_hub::Hub;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    #[tokio::test]
    async fn publishes_then_broadcasts_stamped_payload() {
        let (hub, _task) = Hub::spawn(8);
        let mut sub = hub.register().unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        let emitter = Emitter::new(publisher.clone(), hub.clone());

        let before = unix_now();
        let def = MessageDefinition::new("sensors/temp", json!({"value": 22, "ts": 0}), 5);
        let payload = emitter.emit(&def).await.unwrap();
        let after = unix_now();

        let ts = payload["ts"].as_i64().unwrap();
        assert!(ts >= before && ts <= after);
        assert_eq!(payload["value"], json!(22));

        let published = publisher.published.lock().unwrap().clone();
        assert_eq!(published.len(), 1);
        let (topic, value, retain, qos) = &published[0];
        assert_eq!(topic, "sensors/temp");
        assert_eq!(value, &payload);
        assert!(!retain);
        assert_eq!(*qos, QoS::AtMostOnce);

        let frame = sub.receiver.recv().await.unwrap();
        let frame: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(frame, json!({"topic": "sensors/temp", "data": payload}));
    }

    #[tokio::test]
    async fn unstamped_payloads_pass_through() {
        let (hub, _task) = Hub::spawn(8);
        let publisher = Arc::new(RecordingPublisher::default());
        let emitter = Emitter::new(publisher.clone(), hub);

        for payload in [json!([1, 2, 3]), json!("plain"), json!({"id": "x"})] {
            let def = MessageDefinition::new("t", payload.clone(), 0);
            assert_eq!(emitter.emit(&def).await.unwrap(), payload);
        }
        assert_eq!(publisher.count("t"), 3);
    }

    #[tokio::test]
    async fn failed_publish_is_not_broadcast() {
        let (hub, _task) = Hub::spawn(8);
        let mut sub = hub.register().unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        publisher.fail.store(true, Ordering::SeqCst);
        let emitter = Emitter::new(publisher.clone(), hub.clone());

        let def = MessageDefinition::new("t", json!({"ts": 0}), 0);
        assert!(matches!(emitter.emit(&def).await, Err(EmitError::Publish(_))));
        assert!(!emitter.emit_logged(&def).await);

        // Round-trip through the hub loop so any broadcast would have landed.
        assert_eq!(hub.connection_count().await, 1);
        assert!(sub.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn closed_hub_does_not_fail_emission() {
        let (hub, task) = Hub::spawn(8);
        hub.shutdown();
        task.await.unwrap();

        let publisher = Arc::new(RecordingPublisher::default());
        let emitter = Emitter::new(publisher.clone(), hub);
        let def = MessageDefinition::new("t", json!({}), 0);
        assert!(emitter.emit_logged(&def).await);
        assert_eq!(publisher.count("t"), 1);
    }
}
