//! Per-camera WebSocket transport to the gateway.
//!
//! [`GatewaySocket::connect`] performs the handshake and spawns a background
//! task that owns the stream. Outbound frames go through an `mpsc` queue,
//! inbound frames are decoded and forwarded as [`SocketEvent`]s. Ping/pong
//! correlation happens inside the task so callers get a plain round-trip
//! time from [`GatewaySocket::ping`].
//!
//! The socket never reconnects by itself. When the stream drops, the task
//! emits exactly one [`SocketEvent::Closed`] and exits; recovery policy
//! belongs to the owner.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use futures_util::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;
use uuid::Uuid;

use crate::error::Error;
use crate::protocol::{GatewayMessage, SocketEvent};

// ── Channel capacity ─────────────────────────────────────────────────

const OUTBOUND_CAPACITY: usize = 64;

/// Close code reported when the background task is already gone.
const ABNORMAL_CLOSURE: u16 = 1006;

// ── GatewaySocket ────────────────────────────────────────────────────

/// Handle to a live gateway socket.
///
/// Cheap to share behind an `Arc`. Dropping every handle closes the
/// outbound queue, which ends the background task.
#[derive(Debug)]
pub struct GatewaySocket {
    outbound: mpsc::Sender<String>,
    pending: Arc<DashMap<String, oneshot::Sender<()>>>,
    cancel: CancellationToken,
}

impl GatewaySocket {
    /// Open a socket to `url` and spawn the read/write task.
    ///
    /// Events are delivered on `events` until the socket closes. Cancelling
    /// `cancel` closes the socket gracefully.
    pub async fn connect(
        url: &Url,
        events: mpsc::Sender<SocketEvent>,
        cancel: CancellationToken,
    ) -> Result<Self, Error> {
        tracing::debug!(url = %url, "Connecting to gateway socket");

        let (ws_stream, _response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| Error::WebSocketConnect(e.to_string()))?;

        tracing::debug!(url = %url, "Gateway socket connected");
        Ok(Self::from_stream(ws_stream, events, cancel))
    }

    /// Wrap an already-upgraded stream.
    pub fn from_stream<S>(
        ws_stream: WebSocketStream<S>,
        events: mpsc::Sender<SocketEvent>,
        cancel: CancellationToken,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (outbound_tx, outbound_rx) = mpsc::channel(OUTBOUND_CAPACITY);
        let pending = Arc::new(DashMap::new());

        tokio::spawn(socket_loop(
            ws_stream,
            outbound_rx,
            events,
            Arc::clone(&pending),
            cancel.clone(),
        ));

        Self {
            outbound: outbound_tx,
            pending,
            cancel,
        }
    }

    /// Queue a frame for sending.
    pub async fn send(&self, message: &GatewayMessage) -> Result<(), Error> {
        let text = serde_json::to_string(message).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: String::new(),
        })?;

        self.outbound.send(text).await.map_err(|_| task_gone())
    }

    /// Send a `ping` and wait for the matching `pong`.
    pub async fn ping(&self, timeout: Duration) -> Result<Duration, Error> {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.pending.insert(id.clone(), tx);

        let started = Instant::now();
        if let Err(e) = self.send(&GatewayMessage::Ping { id: id.clone() }).await {
            self.pending.remove(&id);
            return Err(e);
        }

        match tokio::time::timeout(timeout, rx).await {
            Ok(Ok(())) => Ok(started.elapsed()),
            // Sender dropped: the task exited and cleared the pending table.
            Ok(Err(_)) => Err(task_gone()),
            Err(_) => {
                self.pending.remove(&id);
                Err(Error::Timeout {
                    timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                })
            }
        }
    }

    /// Ask the background task to close the socket.
    pub fn close(&self) {
        self.cancel.cancel();
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.outbound.is_closed()
    }
}

fn task_gone() -> Error {
    Error::WebSocketClosed {
        code: ABNORMAL_CLOSURE,
        reason: "socket task has exited".into(),
    }
}

// ── Background task ──────────────────────────────────────────────────

/// Pump frames in both directions until the socket drops or is cancelled.
async fn socket_loop<S>(
    ws_stream: WebSocketStream<S>,
    mut outbound: mpsc::Receiver<String>,
    events: mpsc::Sender<SocketEvent>,
    pending: Arc<DashMap<String, oneshot::Sender<()>>>,
    cancel: CancellationToken,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let (mut write, mut read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                let _ = write.send(Message::Close(None)).await;
                break "closed locally".to_owned();
            }
            text = outbound.recv() => {
                let Some(text) = text else {
                    let _ = write.send(Message::Close(None)).await;
                    break "socket handle dropped".to_owned();
                };
                if let Err(e) = write.send(Message::Text(text.into())).await {
                    break format!("send failed: {e}");
                }
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match decode(text.as_str()) {
                        Inbound::Pong(id) => {
                            if let Some((_, waiter)) = pending.remove(&id) {
                                let _ = waiter.send(());
                            } else {
                                tracing::debug!(id, "Pong for unknown ping");
                            }
                        }
                        Inbound::Ping(id) => {
                            let pong = GatewayMessage::Pong { id };
                            if let Ok(text) = serde_json::to_string(&pong) {
                                if let Err(e) = write.send(Message::Text(text.into())).await {
                                    break format!("send failed: {e}");
                                }
                            }
                        }
                        Inbound::Event(event) => {
                            let _ = events.send(event).await;
                        }
                    },
                    Some(Ok(Message::Binary(_))) => {
                        let _ = events
                            .send(SocketEvent::Malformed {
                                reason: "unexpected binary frame".into(),
                            })
                            .await;
                    }
                    Some(Ok(Message::Close(frame))) => {
                        break match frame {
                            Some(cf) => format!("closed by gateway (code {}): {}", cf.code, cf.reason),
                            None => "closed by gateway".to_owned(),
                        };
                    }
                    Some(Ok(_)) => {
                        // Ping/Pong control frames are answered by tungstenite.
                    }
                    Some(Err(e)) => break format!("read failed: {e}"),
                    None => break "stream ended".to_owned(),
                }
            }
        }
    };

    tracing::debug!(reason, "Gateway socket closed");

    // Dropping the senders wakes every in-flight `ping` with an error.
    pending.clear();
    let _ = events.send(SocketEvent::Closed { reason }).await;
}

// ── Frame decoding ───────────────────────────────────────────────────

enum Inbound {
    Ping(String),
    Pong(String),
    Event(SocketEvent),
}

fn decode(text: &str) -> Inbound {
    match serde_json::from_str::<GatewayMessage>(text) {
        Ok(GatewayMessage::Pong { id }) => Inbound::Pong(id),
        Ok(GatewayMessage::Ping { id }) => Inbound::Ping(id),
        Ok(GatewayMessage::Configure { .. }) => Inbound::Event(SocketEvent::Malformed {
            reason: "unexpected configure frame from gateway".into(),
        }),
        Ok(message) => Inbound::Event(SocketEvent::Message(message)),
        Err(e) => Inbound::Event(SocketEvent::Malformed {
            reason: e.to_string(),
        }),
    }
}
