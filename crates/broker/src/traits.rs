use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PublishError;

/// Delivery guarantee requested from the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum QoS {
    #[default]
    AtMostOnce,
    AtLeastOnce,
    ExactlyOnce,
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> u8 {
        match qos {
            QoS::AtMostOnce => 0,
            QoS::AtLeastOnce => 1,
            QoS::ExactlyOnce => 2,
        }
    }
}

impl TryFrom<u8> for QoS {
    type Error = PublishError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        match level {
            0 => Ok(QoS::AtMostOnce),
            1 => Ok(QoS::AtLeastOnce),
            2 => Ok(QoS::ExactlyOnce),
            other => Err(PublishError::InvalidQos(other)),
        }
    }
}

/// Hands serialized payloads to the messaging broker.
///
/// Implementations must tolerate concurrent calls from many emission tasks.
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), PublishError>;
}

/// Blanket implementation so `Arc<dyn Publisher>` can be used directly.
#[async_trait]
impl<T: Publisher + ?Sized> Publisher for Arc<T> {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), PublishError> {
        (**self).publish(topic, payload, retain, qos).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn qos_levels() {
        for level in 0u8..=2 {
            assert_eq!(u8::from(QoS::try_from(level).unwrap()), level);
        }
        assert!(matches!(QoS::try_from(3), Err(PublishError::InvalidQos(3))));
        assert_eq!(QoS::default(), QoS::AtMostOnce);
    }
}
