//! Live observer connections over WebSocket.
//!
//! Each upgraded socket registers with the broadcast hub and is then driven
//! by two pumps. The write pump forwards hub frames (coalescing whatever is
//! already queued into one text message) and sends keepalive pings. The read
//! pump enforces the inbound deadline and size limit and logs what observers
//! send. Whichever pump stops first ends the connection.

use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{Sink, SinkExt, Stream, StreamExt};
use relay_hub::{ConnectionId, Frame, HubHandle, Subscription};
use tokio::sync::mpsc;
use tokio::time::{timeout, Instant};
use tracing::{debug, info, warn};

use crate::state::AppState;

// ── Keepalive ───────────────────────────────────────────────────

/// Deadlines and limits applied to every observer connection.
#[derive(Debug, Clone)]
pub struct Keepalive {
    /// Interval between outbound pings. Must be shorter than `pong_wait`.
    pub ping_interval: Duration,
    /// Longest silence tolerated from the observer.
    pub pong_wait: Duration,
    /// Deadline for a single outbound write.
    pub write_wait: Duration,
    /// Largest inbound message accepted, in bytes.
    pub max_message_size: usize,
}

impl Default for Keepalive {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            ping_interval: pong_wait * 9 / 10,
            pong_wait,
            write_wait: Duration::from_secs(10),
            max_message_size: 512,
        }
    }
}

/// Why a connection ended.
#[derive(Debug, PartialEq, thiserror::Error)]
pub enum Disconnect {
    #[error("observer closed the connection")]
    PeerClosed,
    #[error("removed by the hub")]
    HubDropped,
    #[error("no inbound traffic within the keepalive deadline")]
    ReadTimeout,
    #[error("write deadline exceeded")]
    WriteTimeout,
    #[error("inbound message of {0} bytes exceeds the limit")]
    Oversized(usize),
    #[error("transport error: {0}")]
    Transport(String),
}

// ── WebSocket Handler ───────────────────────────────────────────

pub async fn ws_upgrade(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let limit = state.keepalive.max_message_size;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| handle_ws(socket, state))
}

async fn handle_ws(socket: WebSocket, state: Arc<AppState>) {
    let subscription = match state.hub.register() {
        Ok(subscription) => subscription,
        Err(e) => {
            warn!(error = %e, "rejecting observer");
            return;
        }
    };
    let (sink, stream) = socket.split();
    serve_connection(sink, stream, subscription, &state.hub, &state.keepalive).await;
}

/// Drive one registered connection until either side gives up, then
/// unregister it from the hub.
pub async fn serve_connection<Si, St, E>(
    sink: Si,
    stream: St,
    subscription: Subscription,
    hub: &HubHandle,
    keepalive: &Keepalive,
) -> Disconnect
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    let Subscription { id, receiver } = subscription;
    info!(connection = id, "observer connected");

    let reason = tokio::select! {
        reason = write_pump(sink, receiver, keepalive) => reason,
        reason = read_pump(stream, id, keepalive) => reason,
    };

    hub.unregister(id);
    match &reason {
        Disconnect::PeerClosed | Disconnect::HubDropped => {
            info!(connection = id, reason = %reason, "observer disconnected")
        }
        _ => warn!(connection = id, reason = %reason, "observer connection failed"),
    }
    reason
}

// ── Pumps ───────────────────────────────────────────────────────

async fn write_pump<Si>(mut sink: Si, mut frames: mpsc::Receiver<Frame>, keepalive: &Keepalive) -> Disconnect
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    let mut ping = tokio::time::interval_at(
        Instant::now() + keepalive.ping_interval,
        keepalive.ping_interval,
    );

    loop {
        tokio::select! {
            frame = frames.recv() => {
                let Some(frame) = frame else {
                    let _ = timeout(keepalive.write_wait, sink.send(Message::Close(None))).await;
                    return Disconnect::HubDropped;
                };
                let text = coalesce(frame, &mut frames);
                if let Err(reason) = write(&mut sink, Message::Text(text.into()), keepalive.write_wait).await {
                    return reason;
                }
            }
            _ = ping.tick() => {
                if let Err(reason) = write(&mut sink, Message::Ping(Bytes::new()), keepalive.write_wait).await {
                    return reason;
                }
            }
        }
    }
}

/// Join `first` with every frame already waiting, one per line.
fn coalesce(first: Frame, frames: &mut mpsc::Receiver<Frame>) -> String {
    let mut text = String::from(&*first);
    while let Ok(next) = frames.try_recv() {
        text.push('\n');
        text.push_str(&next);
    }
    text
}

async fn write<Si>(sink: &mut Si, message: Message, deadline: Duration) -> Result<(), Disconnect>
where
    Si: Sink<Message> + Unpin,
    Si::Error: Display,
{
    match timeout(deadline, sink.send(message)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(Disconnect::Transport(e.to_string())),
        Err(_) => Err(Disconnect::WriteTimeout),
    }
}

async fn read_pump<St, E>(mut stream: St, id: ConnectionId, keepalive: &Keepalive) -> Disconnect
where
    St: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
{
    loop {
        // Any inbound frame, pongs included, restarts the deadline.
        let message = match timeout(keepalive.pong_wait, stream.next()).await {
            Err(_) => return Disconnect::ReadTimeout,
            Ok(None) => return Disconnect::PeerClosed,
            Ok(Some(Err(e))) => return Disconnect::Transport(e.to_string()),
            Ok(Some(Ok(message))) => message,
        };

        match message {
            Message::Text(text) => {
                let len = text.as_str().len();
                if len > keepalive.max_message_size {
                    return Disconnect::Oversized(len);
                }
                debug!(connection = id, message = %normalize(text.as_str()), "observer message");
            }
            Message::Binary(data) => {
                if data.len() > keepalive.max_message_size {
                    return Disconnect::Oversized(data.len());
                }
                debug!(connection = id, bytes = data.len(), "binary observer message ignored");
            }
            Message::Ping(_) | Message::Pong(_) => {}
            Message::Close(_) => return Disconnect::PeerClosed,
        }
    }
}

fn normalize(text: &str) -> String {
    text.replace(['\r', '\n'], " ").trim().to_string()
}
