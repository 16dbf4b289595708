// ── Core error types ──
//
// Errors surfaced by paddock-core. Consumers never see HTTP status codes or
// WebSocket close frames directly -- `from_gateway` and `connection` fold
// transport-layer failures into the connection/command taxonomy, tagged with
// the device they hit.

use thiserror::Error;

use crate::model::DeviceId;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    /// The transport could not be opened (refused, timed out, handshake failed).
    #[error("Cannot connect to {device_id}: {reason}")]
    ConnectionFailed { device_id: DeviceId, reason: String },

    /// A malformed or unexpected frame arrived on the transport.
    #[error("Protocol error on {device_id}: {reason}")]
    Protocol { device_id: DeviceId, reason: String },

    // ── Availability ─────────────────────────────────────────────────
    /// Gateway unreachable, device not connected, or device disabled.
    #[error("Device {device_id} unavailable: {reason}")]
    DeviceUnavailable { device_id: DeviceId, reason: String },

    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: DeviceId },

    // ── Command errors ───────────────────────────────────────────────
    /// The gateway rejected or failed a command.
    #[error("Command {command} failed on {device_id}: {message}")]
    CommandFailed {
        device_id: DeviceId,
        command: String,
        message: String,
        /// HTTP status, when the failure came from the control surface.
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` for failures that the reconnect loop should absorb.
    pub fn is_connection_level(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Protocol { .. })
    }

    /// The device this error concerns, if any.
    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            Self::ConnectionFailed { device_id, .. }
            | Self::Protocol { device_id, .. }
            | Self::DeviceUnavailable { device_id, .. }
            | Self::DeviceNotFound { device_id }
            | Self::CommandFailed { device_id, .. } => Some(device_id),
            Self::Config { .. } | Self::Internal(_) => None,
        }
    }

    pub(crate) fn unavailable(device_id: &DeviceId, reason: impl Into<String>) -> Self {
        Self::DeviceUnavailable {
            device_id: device_id.clone(),
            reason: reason.into(),
        }
    }

    /// Attribute a gateway error to a device and the operation that hit it.
    ///
    /// Unreachable gateways become [`DeviceUnavailable`](Self::DeviceUnavailable);
    /// everything else is a [`CommandFailed`](Self::CommandFailed).
    pub(crate) fn from_gateway(device_id: &DeviceId, command: &str, err: paddock_gateway::Error) -> Self {
        if err.is_unreachable() {
            return Self::DeviceUnavailable {
                device_id: device_id.clone(),
                reason: format!("gateway unreachable: {err}"),
            };
        }

        let status = match &err {
            paddock_gateway::Error::Gateway { status, .. } => Some(*status),
            paddock_gateway::Error::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        };
        let message = match err {
            paddock_gateway::Error::Gateway { message, .. } => message,
            other => other.to_string(),
        };

        Self::CommandFailed {
            device_id: device_id.clone(),
            command: command.to_owned(),
            message,
            status,
        }
    }

    /// Attribute a transport open failure to a device.
    pub(crate) fn connection(device_id: &DeviceId, err: &paddock_gateway::Error) -> Self {
        Self::ConnectionFailed {
            device_id: device_id.clone(),
            reason: err.to_string(),
        }
    }
}
