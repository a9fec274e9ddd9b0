use thiserror::Error;

/// Errors that can occur while handing a message to the broker.
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("envelope encoding error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("envelope decoding error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("zeromq error: {0}")]
    Zmq(#[from] zeromq::ZmqError),

    #[error("mqtt client error: {0}")]
    Mqtt(#[from] rumqttc::ClientError),

    #[error("invalid QoS level {0}")]
    InvalidQos(u8),

    #[error("broker rejected message: {0}")]
    Rejected(String),
}
