// ── Transport seam ──
//
// The registry talks to a per-device `Transport` opened by a
// `TransportConnector`. Production uses the gateway WebSocket; tests plug in
// in-memory fakes.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use paddock_gateway::{GatewayMessage, GatewaySocket, SocketEvent};

use crate::error::CoreError;
use crate::model::Device;

/// A live, bidirectional link to the gateway for one camera.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Queue an outbound frame.
    async fn send(&self, message: GatewayMessage) -> Result<(), paddock_gateway::Error>;

    /// Liveness round trip.
    async fn ping(&self, timeout: Duration) -> Result<Duration, paddock_gateway::Error>;

    /// Close the link. The event stream must end with `SocketEvent::Closed`.
    fn close(&self);
}

/// Opens transports. One call per connection attempt.
#[async_trait]
pub trait TransportConnector: Send + Sync {
    /// Open a transport for `device`. Inbound frames and the final close are
    /// delivered on `events`.
    async fn open(
        &self,
        device: &Device,
        events: mpsc::Sender<SocketEvent>,
    ) -> Result<Arc<dyn Transport>, CoreError>;
}

#[async_trait]
impl Transport for GatewaySocket {
    async fn send(&self, message: GatewayMessage) -> Result<(), paddock_gateway::Error> {
        GatewaySocket::send(self, &message).await
    }

    async fn ping(&self, timeout: Duration) -> Result<Duration, paddock_gateway::Error> {
        GatewaySocket::ping(self, timeout).await
    }

    fn close(&self) {
        GatewaySocket::close(self);
    }
}

/// Connects to `{gateway}/{socket_path}` over WebSocket.
#[derive(Debug, Clone)]
pub struct WsConnector {
    socket_path: String,
}

impl WsConnector {
    pub fn new(socket_path: impl Into<String>) -> Self {
        Self {
            socket_path: socket_path.into(),
        }
    }
}

#[async_trait]
impl TransportConnector for WsConnector {
    async fn open(
        &self,
        device: &Device,
        events: mpsc::Sender<SocketEvent>,
    ) -> Result<Arc<dyn Transport>, CoreError> {
        let url = device
            .socket_url(&self.socket_path)
            .map_err(|e| CoreError::ConnectionFailed {
                device_id: device.id.clone(),
                reason: format!("invalid gateway address '{}': {e}", device.host),
            })?;

        let socket = GatewaySocket::connect(&url, events, CancellationToken::new())
            .await
            .map_err(|e| CoreError::connection(&device.id, &e))?;

        Ok(Arc::new(socket))
    }
}
