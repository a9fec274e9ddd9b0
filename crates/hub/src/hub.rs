use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::HubError;

/// Connection ID (unique per hub, never reused).
pub type ConnectionId = u64;

/// One serialized outbound text frame, shared between all recipients.
pub type Frame = Arc<str>;

/// Wire shape of every frame sent to observers.
#[derive(Serialize)]
struct OutboundFrame<'a> {
    topic: &'a str,
    data: &'a Value,
}

/// Serialize `{"topic": .., "data": ..}` into a shareable frame.
pub fn encode_frame(topic: &str, payload: &Value) -> Result<Frame, HubError> {
    let text = serde_json::to_string(&OutboundFrame { topic, data: payload })?;
    Ok(Arc::from(text))
}

enum Command {
    Register {
        id: ConnectionId,
        sender: mpsc::Sender<Frame>,
    },
    Unregister {
        id: ConnectionId,
    },
    Broadcast {
        frame: Frame,
    },
    Count {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// A registered connection's end of the hub: its id and outbound queue.
///
/// The receiver yields `None` once the hub has dropped the connection
/// (delivery failure, overflow or shutdown).
#[derive(Debug)]
pub struct Subscription {
    pub id: ConnectionId,
    pub receiver: mpsc::Receiver<Frame>,
}

/// The coordinating loop. Owns the connection set exclusively.
pub struct Hub {
    commands: mpsc::UnboundedReceiver<Command>,
    connections: HashMap<ConnectionId, mpsc::Sender<Frame>>,
}

impl Hub {
    /// Spawn the coordinating loop and return a handle to it.
    ///
    /// `queue_capacity` bounds each connection's outbound queue.
    pub fn spawn(queue_capacity: usize) -> (HubHandle, JoinHandle<()>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let hub = Hub {
            commands: rx,
            connections: HashMap::new(),
        };
        let handle = HubHandle {
            commands: tx,
            next_id: Arc::new(AtomicU64::new(1)),
            queue_capacity: queue_capacity.max(1),
        };
        (handle, tokio::spawn(hub.run()))
    }

    async fn run(mut self) {
        while let Some(command) = self.commands.recv().await {
            match command {
                Command::Register { id, sender } => {
                    self.connections.insert(id, sender);
                    debug!(conn_id = id, active = self.connections.len(), "connection registered");
                }
                Command::Unregister { id } => {
                    if self.connections.remove(&id).is_some() {
                        debug!(conn_id = id, active = self.connections.len(), "connection unregistered");
                    }
                }
                Command::Broadcast { frame } => self.deliver(frame),
                Command::Count { reply } => {
                    let _ = reply.send(self.connections.len());
                }
                Command::Shutdown => {
                    info!(active = self.connections.len(), "hub shutting down, closing connections");
                    break;
                }
            }
        }
        // Dropping the senders closes every connection's queue.
        self.connections.clear();
    }

    fn deliver(&mut self, frame: Frame) {
        if self.connections.is_empty() {
            return;
        }

        let mut failed = Vec::new();
        for (id, sender) in &self.connections {
            match sender.try_send(frame.clone()) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(conn_id = *id, "outbound queue full, dropping connection");
                    failed.push(*id);
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(conn_id = *id, "connection gone, removing");
                    failed.push(*id);
                }
            }
        }

        for id in failed {
            self.connections.remove(&id);
        }
    }
}

/// Cloneable handle for talking to the hub loop from any task.
#[derive(Clone)]
pub struct HubHandle {
    commands: mpsc::UnboundedSender<Command>,
    next_id: Arc<AtomicU64>,
    queue_capacity: usize,
}

impl HubHandle {
    /// Register a new connection with a fresh bounded queue.
    pub fn register(&self) -> Result<Subscription, HubError> {
        let (sender, receiver) = mpsc::channel(self.queue_capacity);
        let id = self.register_sender(sender)?;
        Ok(Subscription { id, receiver })
    }

    /// Register an externally created queue.
    pub fn register_sender(&self, sender: mpsc::Sender<Frame>) -> Result<ConnectionId, HubError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.send(Command::Register { id, sender })?;
        Ok(id)
    }

    /// Remove a connection. Unknown ids are ignored.
    pub fn unregister(&self, id: ConnectionId) {
        let _ = self.send(Command::Unregister { id });
    }

    /// Queue `{topic, data: payload}` for every connection registered at the
    /// time the hub processes this call. Never blocks.
    pub fn broadcast(&self, topic: &str, payload: &Value) -> Result<(), HubError> {
        let frame = encode_frame(topic, payload)?;
        self.send(Command::Broadcast { frame })
    }

    /// Number of registered connections, as seen by the hub loop.
    pub async fn connection_count(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        if self.send(Command::Count { reply }).is_err() {
            return 0;
        }
        rx.await.unwrap_or(0)
    }

    /// Close all connections and stop accepting registrations.
    pub fn shutdown(&self) {
        let _ = self.send(Command::Shutdown);
    }

    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }

    fn send(&self, command: Command) -> Result<(), HubError> {
        self.commands.send(command).map_err(|_| HubError::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;

    #[test]
    fn frame_shape() {
        let frame = encode_frame("x", &json!("hello")).unwrap();
        assert_eq!(&*frame, r#"{"topic":"x","data":"hello"}"#);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_registered() {
        let (hub, _task) = Hub::spawn(8);
        let mut a = hub.register().unwrap();
        let mut b = hub.register().unwrap();
        assert_ne!(a.id, b.id);

        hub.broadcast("sensors/temp", &json!({"value": 22})).unwrap();

        let expected = r#"{"topic":"sensors/temp","data":{"value":22}}"#;
        assert_eq!(&*a.receiver.recv().await.unwrap(), expected);
        assert_eq!(&*b.receiver.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn failed_connection_removed_others_delivered() {
        let (hub, _task) = Hub::spawn(8);

        let (tx1, mut rx1) = mpsc::channel(8);
        let (tx2, rx2) = mpsc::channel(8);
        let (tx3, mut rx3) = mpsc::channel(8);
        hub.register_sender(tx1).unwrap();
        hub.register_sender(tx2).unwrap();
        hub.register_sender(tx3).unwrap();
        assert_eq!(hub.connection_count().await, 3);

        // Connection #2's writer has gone away.
        drop(rx2);

        hub.broadcast("x", &json!("hello")).unwrap();
        assert_eq!(hub.connection_count().await, 2);

        let expected = r#"{"topic":"x","data":"hello"}"#;
        assert_eq!(&*rx1.recv().await.unwrap(), expected);
        assert_eq!(&*rx3.recv().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn broadcast_without_connections_is_noop() {
        let (hub, _task) = Hub::spawn(8);
        tokio::time::timeout(Duration::from_millis(100), async {
            hub.broadcast("x", &json!(1)).unwrap();
        })
        .await
        .expect("broadcast blocked");
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn late_registration_gets_no_backlog() {
        let (hub, _task) = Hub::spawn(8);
        hub.broadcast("x", &json!("before")).unwrap();

        let mut late = hub.register().unwrap();
        hub.broadcast("x", &json!("after")).unwrap();

        let frame = late.receiver.recv().await.unwrap();
        assert_eq!(&*frame, r#"{"topic":"x","data":"after"}"#);
        assert!(late.receiver.try_recv().is_err());
    }

    #[tokio::test]
    async fn overflowing_connection_is_dropped() {
        let (hub, _task) = Hub::spawn(1);
        let mut slow = hub.register().unwrap();
        let mut fast = hub.register().unwrap();

        hub.broadcast("x", &json!(1)).unwrap();
        // Drain only the fast connection; the slow one is now full.
        fast.receiver.recv().await.unwrap();
        hub.broadcast("x", &json!(2)).unwrap();

        assert_eq!(hub.connection_count().await, 1);
        assert_eq!(&*fast.receiver.recv().await.unwrap(), r#"{"topic":"x","data":2}"#);

        // The slow connection keeps what was queued, then sees the close.
        assert!(slow.receiver.recv().await.is_some());
        assert!(slow.receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn unregister_closes_queue() {
        let (hub, _task) = Hub::spawn(8);
        let mut sub = hub.register().unwrap();
        hub.unregister(sub.id);
        assert_eq!(hub.connection_count().await, 0);
        assert!(sub.receiver.recv().await.is_none());

        // Unknown ids are ignored.
        hub.unregister(9999);
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn shutdown_closes_connections_and_refuses_registration() {
        let (hub, task) = Hub::spawn(8);
        let mut sub = hub.register().unwrap();

        hub.shutdown();
        task.await.unwrap();

        assert!(sub.receiver.recv().await.is_none());
        assert!(matches!(hub.register(), Err(HubError::Closed)));
        assert!(matches!(hub.broadcast("x", &json!(1)), Err(HubError::Closed)));
        assert!(hub.is_closed());
        assert_eq!(hub.connection_count().await, 0);
    }

    #[tokio::test]
    async fn per_topic_order_is_preserved() {
        let (hub, _task) = Hub::spawn(16);
        let mut sub = hub.register().unwrap();
        for i in 0..10 {
            hub.broadcast("seq", &json!(i)).unwrap();
        }
        for i in 0..10 {
            let frame = sub.receiver.recv().await.unwrap();
            assert_eq!(&*frame, format!(r#"{{"topic":"seq","data":{}}}"#, i));
        }
    }
}
