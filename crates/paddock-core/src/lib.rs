// paddock-core: Camera connection, health monitoring and command dispatch.

pub mod clock;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod gateway;
pub mod health;
pub mod manager;
pub mod model;
pub mod reconnect;
pub mod registry;
mod session;
pub mod transport;

#[cfg(test)]
mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use clock::{Clock, SystemClock, TokioClock};
pub use config::{HealthConfig, ManagerConfig, ReconnectPolicy, TlsVerification};
pub use dispatcher::CommandDispatcher;
pub use error::CoreError;
pub use event::{DeviceEvent, EventBus, EventKind, ListenerId};
pub use gateway::{GatewayApi, HttpGateway};
pub use health::HealthMonitor;
pub use manager::DeviceManager;
pub use reconnect::ReconnectScheduler;
pub use registry::ConnectionRegistry;
pub use transport::{Transport, TransportConnector, WsConnector};

// Re-export model types at the crate root for ergonomics.
pub use model::{
    Capabilities, Connection, ConnectionStatus, Credentials, Device, DeviceId, HealthRecord,
    PtzAction, PtzCommand, PtzPreset, SnapshotImage, StreamQuality, StreamSession, StreamStatus,
    StreamTier,
};
