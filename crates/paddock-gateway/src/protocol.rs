// Wire types shared by the HTTP control surface and the WebSocket transport.
//
// The gateway speaks JSON everywhere. HTTP bodies use camelCase keys
// (`presetId`), socket frames are internally tagged by `type` and use
// snake_case keys.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

// ── Stream tiers ─────────────────────────────────────────────────────

/// Which of the camera's encoder outputs a request targets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum StreamTier {
    /// Full-resolution main stream.
    Main,
    /// Low-bandwidth sub stream (used for thumbnails and health probes).
    #[default]
    Sub,
}

// ── PTZ ──────────────────────────────────────────────────────────────

/// Pan-tilt-zoom actions understood by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum PtzAction {
    PanLeft,
    PanRight,
    TiltUp,
    TiltDown,
    ZoomIn,
    ZoomOut,
    Stop,
    Home,
    GotoPreset,
}

/// Body of `POST /ptz`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PtzRequest {
    pub command: PtzAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset_id: Option<String>,
}

// ── HTTP bodies ──────────────────────────────────────────────────────

/// Response of `GET /status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// `"running"` when the gateway is healthy.
    pub status: String,

    /// Anything else the gateway reports (version, active streams, ...).
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl GatewayStatus {
    pub fn is_running(&self) -> bool {
        self.status.eq_ignore_ascii_case("running")
    }
}

/// Body of `POST /stream/start` and `POST /stream/stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamRequest {
    pub quality: StreamTier,
}

// ── Socket frames ────────────────────────────────────────────────────

/// A single JSON frame on the gateway WebSocket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GatewayMessage {
    /// Sent by us right after the socket opens; binds the socket to a camera.
    Configure {
        camera_id: String,
        host: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },

    /// Liveness probe. The gateway echoes the id back in a `pong`.
    Ping { id: String },

    Pong { id: String },

    /// A chunk of converted media is flowing.
    StreamData {
        #[serde(default)]
        quality: Option<StreamTier>,
        #[serde(default)]
        bytes: Option<u64>,
    },

    /// Periodic conversion progress report.
    StreamProgress {
        #[serde(default)]
        quality: Option<StreamTier>,
        #[serde(default)]
        frames: Option<u64>,
        #[serde(default)]
        fps: Option<f64>,
    },

    /// The gateway failed to pull or convert a stream.
    StreamError {
        #[serde(default)]
        quality: Option<StreamTier>,
        message: String,
    },

    /// PTZ command. Outbound it carries the request, inbound it is the ack.
    PtzCommand {
        command: PtzAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        preset_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        success: Option<bool>,
    },
}

impl GatewayMessage {
    /// Short name of the frame type, matching the `type` tag on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configure { .. } => "configure",
            Self::Ping { .. } => "ping",
            Self::Pong { .. } => "pong",
            Self::StreamData { .. } => "stream_data",
            Self::StreamProgress { .. } => "stream_progress",
            Self::StreamError { .. } => "stream_error",
            Self::PtzCommand { .. } => "ptz_command",
        }
    }
}

impl From<&PtzRequest> for GatewayMessage {
    fn from(req: &PtzRequest) -> Self {
        Self::PtzCommand {
            command: req.command,
            value: req.value,
            preset_id: req.preset_id.clone(),
            success: None,
        }
    }
}

/// What the socket task reports to its owner.
#[derive(Debug, Clone, PartialEq)]
pub enum SocketEvent {
    /// A well-formed frame other than `pong` (pongs are consumed internally).
    Message(GatewayMessage),
    /// A frame that could not be decoded.
    Malformed { reason: String },
    /// The socket is gone. Sent exactly once, as the last event.
    Closed { reason: String },
}
