// ── Command dispatch ──
//
// Stream, PTZ and snapshot commands. Every operation first checks that the
// device is `Connected` and fails fast otherwise, without touching the
// network. Stream and PTZ commands report plain success/failure; only
// snapshots return a typed error.

use std::sync::Arc;

use tracing::{debug, info, warn};

use paddock_gateway::{GatewayMessage, PtzRequest};

use crate::clock::Clock;
use crate::error::CoreError;
use crate::gateway::GatewayApi;
use crate::model::{
    Device, DeviceId, PtzAction, PtzCommand, SnapshotImage, StreamSession, StreamStatus,
    StreamTier,
};
use crate::registry::ConnectionRegistry;
use crate::session::SessionTable;

#[derive(Clone)]
pub struct CommandDispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    registry: ConnectionRegistry,
    gateway: Arc<dyn GatewayApi>,
    sessions: Arc<SessionTable>,
    clock: Arc<dyn Clock>,
}

impl CommandDispatcher {
    pub(crate) fn new(
        registry: ConnectionRegistry,
        gateway: Arc<dyn GatewayApi>,
        sessions: Arc<SessionTable>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                registry,
                gateway,
                sessions,
                clock,
            }),
        }
    }

    // ── Streams ──────────────────────────────────────────────────────

    /// Ask the gateway to start converting `tier`. Safe to repeat.
    pub async fn start_stream(&self, device_id: &DeviceId, tier: StreamTier) -> bool {
        let device = match self.gate(device_id) {
            Ok(device) => device,
            Err(e) => {
                warn!(device_id = %device_id, %tier, error = %e, "stream start rejected");
                return false;
            }
        };
        if !device.capabilities.supports_tier(tier) {
            warn!(device_id = %device_id, %tier, "camera does not offer this stream tier");
            return false;
        }

        let sessions = &self.inner.sessions;
        match sessions.get(device_id, tier).map(|s| s.status) {
            Some(StreamStatus::Streaming | StreamStatus::Connecting) => {}
            _ => {
                sessions.begin(device_id, tier);
            }
        }

        match self.inner.gateway.start_stream(&device, tier).await {
            Ok(()) => {
                info!(device_id = %device_id, %tier, "stream started");
                true
            }
            Err(e) => {
                let e = CoreError::from_gateway(device_id, "stream/start", e);
                warn!(device_id = %device_id, %tier, error = %e, "stream start failed");
                sessions.set_status(device_id, tier, StreamStatus::Error);
                false
            }
        }
    }

    /// Ask the gateway to stop `tier`. The session record is removed whether
    /// or not the gateway call goes through.
    pub async fn stop_stream(&self, device_id: &DeviceId, tier: StreamTier) -> bool {
        self.inner.sessions.end(device_id, tier);

        let device = match self.gate(device_id) {
            Ok(device) => device,
            Err(e) => {
                warn!(device_id = %device_id, %tier, error = %e, "stream stop rejected");
                return false;
            }
        };

        match self.inner.gateway.stop_stream(&device, tier).await {
            Ok(()) => {
                info!(device_id = %device_id, %tier, "stream stopped");
                true
            }
            Err(e) => {
                let e = CoreError::from_gateway(device_id, "stream/stop", e);
                warn!(device_id = %device_id, %tier, error = %e, "stream stop failed");
                false
            }
        }
    }

    pub fn session(&self, device_id: &DeviceId, tier: StreamTier) -> Option<StreamSession> {
        self.inner.sessions.get(device_id, tier)
    }

    pub fn sessions(&self, device_id: &DeviceId) -> Vec<StreamSession> {
        self.inner.sessions.for_device(device_id)
    }

    // ── PTZ ──────────────────────────────────────────────────────────

    /// Send a PTZ command over both the socket and HTTP. Succeeds if either
    /// path accepts it.
    pub async fn control_ptz(&self, command: &PtzCommand) -> bool {
        let device_id = &command.device_id;
        let device = match self.gate(device_id) {
            Ok(device) => device,
            Err(e) => {
                warn!(device_id = %device_id, action = %command.action, error = %e, "PTZ rejected");
                return false;
            }
        };

        if let Err(reason) = validate_ptz(&device, command) {
            warn!(device_id = %device_id, action = %command.action, reason, "PTZ rejected");
            return false;
        }

        let request = PtzRequest::from(command);
        let (socket, http) = tokio::join!(
            self.inner
                .registry
                .send(device_id, GatewayMessage::from(&request)),
            self.inner.gateway.ptz(&device, &request),
        );

        if let Err(e) = &socket {
            debug!(device_id = %device_id, error = %e, "PTZ over socket failed");
        }
        if let Err(e) = &http {
            debug!(device_id = %device_id, error = %e, "PTZ over HTTP failed");
        }

        let ok = socket.is_ok() || http.is_ok();
        if ok {
            info!(device_id = %device_id, action = %command.action, "PTZ sent");
        } else {
            warn!(device_id = %device_id, action = %command.action, "PTZ failed on both paths");
        }
        ok
    }

    // ── Snapshots ────────────────────────────────────────────────────

    pub async fn capture_snapshot(
        &self,
        device_id: &DeviceId,
        tier: StreamTier,
    ) -> Result<SnapshotImage, CoreError> {
        let device = self.gate(device_id)?;

        let frame = self
            .inner
            .gateway
            .snapshot(&device, tier)
            .await
            .map_err(|e| CoreError::from_gateway(device_id, "snapshot", e))?;

        if frame.is_empty() {
            return Err(CoreError::CommandFailed {
                device_id: device_id.clone(),
                command: "snapshot".into(),
                message: "gateway returned an empty image".into(),
                status: None,
            });
        }

        debug!(device_id = %device_id, %tier, bytes = frame.len(), "snapshot captured");
        Ok(SnapshotImage {
            device_id: device_id.clone(),
            tier,
            data: frame.data,
            content_type: frame.content_type,
            width: frame.width,
            height: frame.height,
            captured_at: self.inner.clock.now(),
        })
    }

    /// The device, if and only if it is connected.
    fn gate(&self, device_id: &DeviceId) -> Result<Arc<Device>, CoreError> {
        let status = self.inner.registry.status(device_id);
        if !status.is_connected() {
            return Err(CoreError::unavailable(
                device_id,
                format!("device is {status}"),
            ));
        }
        self.inner
            .registry
            .device(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                device_id: device_id.clone(),
            })
    }
}

fn validate_ptz(device: &Device, command: &PtzCommand) -> Result<(), &'static str> {
    let caps = &device.capabilities;
    if !caps.ptz {
        return Err("camera has no PTZ support");
    }
    match (&command.preset_id, command.action) {
        (None, PtzAction::GotoPreset) => Err("preset id required"),
        (Some(preset), _) if !caps.has_preset(preset) => Err("unknown preset"),
        _ => Ok(()),
    }
}
