// ── Domain model ──
//
// Plain data types shared by every component. No behaviour beyond
// small derived helpers lives here.

pub mod connection;
pub mod device;
pub mod health;
pub mod stream;

pub use connection::{Connection, ConnectionStatus};
pub use device::{Capabilities, Credentials, Device, DeviceId, PtzPreset};
pub use health::{HealthRecord, StreamQuality};
pub use stream::{StreamSession, StreamStatus};

pub use paddock_gateway::{PtzAction, StreamTier};

use bytes::Bytes;
use chrono::{DateTime, Utc};

/// A PTZ instruction for one camera. Transient, never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct PtzCommand {
    pub device_id: DeviceId,
    pub action: PtzAction,
    pub value: Option<f64>,
    pub preset_id: Option<String>,
}

impl PtzCommand {
    pub fn new(device_id: impl Into<DeviceId>, action: PtzAction) -> Self {
        Self {
            device_id: device_id.into(),
            action,
            value: None,
            preset_id: None,
        }
    }

    pub fn with_value(mut self, value: f64) -> Self {
        self.value = Some(value);
        self
    }

    /// Target a stored preset. Implies [`PtzAction::GotoPreset`].
    pub fn goto_preset(device_id: impl Into<DeviceId>, preset_id: impl Into<String>) -> Self {
        Self {
            preset_id: Some(preset_id.into()),
            ..Self::new(device_id, PtzAction::GotoPreset)
        }
    }
}

impl From<&PtzCommand> for paddock_gateway::PtzRequest {
    fn from(cmd: &PtzCommand) -> Self {
        Self {
            command: cmd.action,
            value: cmd.value,
            preset_id: cmd.preset_id.clone(),
        }
    }
}

/// A captured still frame plus its metadata.
#[derive(Debug, Clone)]
pub struct SnapshotImage {
    pub device_id: DeviceId,
    pub tier: StreamTier,
    pub data: Bytes,
    pub content_type: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub captured_at: DateTime<Utc>,
}
