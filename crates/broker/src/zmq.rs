use async_trait::async_trait;
use relay_core::config::{BrokerConfig, BrokerMode};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use zeromq::prelude::*;
use zeromq::{PubSocket, ZmqMessage};

use crate::envelope::PublishEnvelope;
use crate::error::PublishError;
use crate::traits::{Publisher, QoS};

/// ZeroMQ PUB socket publisher.
///
/// Messages are sent as two-frame ZMQ messages:
/// 1. Topic string (used by SUB sockets for prefix filtering)
/// 2. MessagePack-encoded [`PublishEnvelope`]
///
/// Delivery is fire-and-forget: PUB sockets drop messages for absent or
/// slow subscribers, which matches the at-most-once contract.
pub struct ZmqPublisher {
    socket: Mutex<PubSocket>,
    endpoint: String,
}

impl ZmqPublisher {
    /// Bind or connect according to the broker configuration.
    pub async fn from_config(config: &BrokerConfig) -> Result<Self, PublishError> {
        match config.mode {
            BrokerMode::Bind => Self::bind(&config.endpoint).await,
            BrokerMode::Connect => Self::connect(&config.endpoint).await,
        }
    }

    /// Bind the PUB socket; subscribers connect to this endpoint.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn bind(endpoint: &str) -> Result<Self, PublishError> {
        let mut socket = PubSocket::new();
        info!("binding PUB socket");
        socket.bind(endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
            endpoint: endpoint.to_string(),
        })
    }

    /// Connect the PUB socket to an upstream forwarder's frontend.
    #[instrument(skip_all, fields(endpoint = %endpoint))]
    pub async fn connect(endpoint: &str) -> Result<Self, PublishError> {
        let mut socket = PubSocket::new();
        info!("connecting PUB socket");
        socket.connect(endpoint).await?;
        Ok(Self {
            socket: Mutex::new(socket),
            endpoint: endpoint.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Publisher for ZmqPublisher {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), PublishError> {
        let envelope = PublishEnvelope::new(payload, retain, qos).to_bytes()?;

        let mut zmq_msg = ZmqMessage::from(topic.to_string());
        zmq_msg.push_back(envelope.into());

        let mut socket = self.socket.lock().await;
        socket.send(zmq_msg).await?;

        debug!(topic = %topic, bytes = payload.len(), "sent to broker");
        Ok(())
    }
}
