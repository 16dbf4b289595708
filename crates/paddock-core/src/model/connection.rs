// ── Connection state ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::device::DeviceId;

/// Where a device sits in the connection state machine.
///
/// `Disconnected → Connecting → Connected → {Disconnected, Error}` and
/// `Error → Connecting` via a scheduled reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl ConnectionStatus {
    pub fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Point-in-time view of a device's transport connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub device_id: DeviceId,
    pub status: ConnectionStatus,
    /// Last frame received from (or handshake with) the gateway.
    pub last_activity: Option<DateTime<Utc>>,
}
