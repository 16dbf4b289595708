// ── Stream sessions ──

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use paddock_gateway::StreamTier;

use super::device::DeviceId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StreamStatus {
    Streaming,
    Connecting,
    Disconnected,
    Error,
}

/// A requested stream on one tier of one camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSession {
    pub device_id: DeviceId,
    pub tier: StreamTier,
    pub status: StreamStatus,
    pub updated_at: DateTime<Utc>,
}
