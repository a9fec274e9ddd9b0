//! Broker-side publishing.
//!
//! The scheduler only ever sees the [`Publisher`] trait: a fire-and-forget
//! `publish(topic, payload, retain, qos)`. Two implementations ship:
//! - [`MqttPublisher`]: MQTT client for an external broker, flags passed through
//! - [`ZmqPublisher`]: ZeroMQ PUB socket carrying a MessagePack envelope
//!
//! [`connect`] picks one from the broker configuration.

use std::sync::Arc;

use relay_core::config::{BrokerConfig, BrokerTransport};

pub mod envelope;
pub mod error;
pub mod mqtt;
pub mod traits;
pub mod zmq;

pub use envelope::PublishEnvelope;
pub use error::PublishError;
pub use mqtt::MqttPublisher;
pub use traits::{Publisher, QoS};
pub use zmq::ZmqPublisher;

/// Open the publisher selected by `config.transport`.
pub async fn connect(config: &BrokerConfig) -> Result<Arc<dyn Publisher>, PublishError> {
    let publisher: Arc<dyn Publisher> = match config.transport {
        BrokerTransport::Mqtt => Arc::new(MqttPublisher::start(&config.mqtt)?),
        BrokerTransport::Zmq => Arc::new(ZmqPublisher::from_config(config).await?),
    };
    Ok(publisher)
}
