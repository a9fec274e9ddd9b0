use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::PublishError;
use crate::traits::QoS;

/// Second frame of every published ZeroMQ message.
///
/// The first frame carries the topic so SUB sockets can prefix-filter;
/// this envelope carries the payload bytes and the publish flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishEnvelope {
    #[serde(with = "serde_bytes")]
    pub payload: Vec<u8>,
    pub retain: bool,
    pub qos: QoS,
    pub timestamp: DateTime<Utc>,
}

impl PublishEnvelope {
    pub fn new(payload: &[u8], retain: bool, qos: QoS) -> Self {
        Self {
            payload: payload.to_vec(),
            retain,
            qos,
            timestamp: Utc::now(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, PublishError> {
        Ok(rmp_serde::to_vec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PublishError> {
        Ok(rmp_serde::from_slice(bytes)?)
    }
}

/// Helper module for serde to handle `Vec<u8>` as raw bytes in MessagePack.
mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<u8>, D::Error> {
        let bytes: &[u8] = Deserialize::deserialize(d)?;
        Ok(bytes.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_keeps_flags() {
        let env = PublishEnvelope::new(br#"{"ts":1}"#, true, QoS::ExactlyOnce);
        let decoded = PublishEnvelope::from_bytes(&env.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, env);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        assert!(matches!(
            PublishEnvelope::from_bytes(&[0xc1, 0x00]),
            Err(PublishError::Decode(_))
        ));
    }
}
