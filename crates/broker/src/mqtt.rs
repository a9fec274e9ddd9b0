use std::time::Duration;

use async_trait::async_trait;
use relay_core::config::MqttConfig;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::PublishError;
use crate::traits::{Publisher, QoS};

/// Delay between reconnect attempts after the broker connection drops.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// MQTT client publishing to an external broker.
///
/// `publish` only enqueues the request; a background task owns the
/// connection, reconnects on failure and drains the queue. A full queue
/// fails the publish immediately instead of stalling the caller.
pub struct MqttPublisher {
    client: AsyncClient,
    poller: JoinHandle<()>,
    broker: String,
}

impl MqttPublisher {
    /// Create the client and start its connection task. Must run inside a
    /// tokio runtime.
    pub fn start(config: &MqttConfig) -> Result<Self, PublishError> {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options.set_keep_alive(Duration::from_secs(u64::from(config.keep_alive_secs.max(5))));
        if let Some(username) = &config.username {
            options.set_credentials(username, config.password.as_deref().unwrap_or(""));
        }

        let (client, eventloop) = AsyncClient::new(options, config.queue_capacity.max(1));
        let broker = format!("{}:{}", config.host, config.port);
        info!(broker = %broker, client_id = %config.client_id, "starting MQTT publisher");
        let poller = tokio::spawn(drive(eventloop, broker.clone()));

        Ok(Self {
            client,
            poller,
            broker,
        })
    }

    pub fn broker(&self) -> &str {
        &self.broker
    }
}

impl Drop for MqttPublisher {
    fn drop(&mut self) {
        let _ = self.client.try_disconnect();
        self.poller.abort();
    }
}

impl From<QoS> for rumqttc::QoS {
    fn from(qos: QoS) -> Self {
        match qos {
            QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
            QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
            QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
        }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        retain: bool,
        qos: QoS,
    ) -> Result<(), PublishError> {
        self.client
            .try_publish(topic, qos.into(), retain, payload.to_vec())?;
        debug!(topic = %topic, bytes = payload.len(), "queued for MQTT broker");
        Ok(())
    }
}

/// Poll the event loop forever; each error is followed by a reconnect attempt.
async fn drive(mut eventloop: EventLoop, broker: String) {
    let mut connected = false;
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => {
                connected = true;
                info!(broker = %broker, "connected to MQTT broker");
            }
            Ok(_) => {}
            Err(e) => {
                if connected {
                    warn!(broker = %broker, error = %e, "MQTT connection lost, reconnecting");
                } else {
                    debug!(broker = %broker, error = %e, "MQTT broker unreachable, retrying");
                }
                connected = false;
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
