// paddock-gateway: Async client for the camera stream-conversion gateway (HTTP + WebSocket)

pub mod client;
pub mod error;
pub mod protocol;
pub mod snapshot;
pub mod socket;
pub mod transport;

pub use client::GatewayClient;
pub use error::Error;
pub use protocol::{
    GatewayMessage, GatewayStatus, PtzAction, PtzRequest, SocketEvent, StreamRequest, StreamTier,
};
pub use snapshot::Snapshot;
pub use socket::GatewaySocket;
pub use transport::{TlsMode, TransportConfig};
