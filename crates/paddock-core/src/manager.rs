// ── DeviceManager ──
//
// Facade over the connection layer. Owns the event bus, scheduler, registry,
// health monitor and dispatcher, wires them together, and exposes the API
// the dashboard layer calls.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clock::{Clock, SystemClock};
use crate::config::ManagerConfig;
use crate::dispatcher::CommandDispatcher;
use crate::error::CoreError;
use crate::event::{DeviceEvent, EventBus, EventKind, ListenerId};
use crate::gateway::{GatewayApi, HttpGateway};
use crate::health::HealthMonitor;
use crate::model::{
    Connection, ConnectionStatus, Device, DeviceId, HealthRecord, PtzCommand, SnapshotImage,
    StreamSession, StreamTier,
};
use crate::reconnect::ReconnectScheduler;
use crate::registry::ConnectionRegistry;
use crate::session::SessionTable;
use crate::transport::{TransportConnector, WsConnector};

/// Entry point for camera connectivity.
///
/// Build one per process with [`DeviceManager::new`], feed it devices with
/// [`initialize`](Self::initialize), and call [`shutdown`](Self::shutdown)
/// before exiting.
pub struct DeviceManager {
    config: ManagerConfig,
    bus: EventBus,
    scheduler: ReconnectScheduler,
    registry: ConnectionRegistry,
    health: HealthMonitor,
    dispatcher: CommandDispatcher,
    gateway: Arc<dyn GatewayApi>,
    health_listener: ListenerId,
}

impl DeviceManager {
    /// Production wiring: WebSocket transport, HTTP gateway, system clock.
    pub fn new(config: ManagerConfig) -> Result<Self, CoreError> {
        let gateway = HttpGateway::from_config(&config).map_err(|e| CoreError::Config {
            message: format!("cannot build gateway client: {e}"),
        })?;
        let connector = WsConnector::new(config.socket_path.clone());
        Self::with_components(config, Arc::new(connector), Arc::new(gateway), Arc::new(SystemClock))
    }

    /// Wire the manager around caller-supplied seams.
    pub fn with_components(
        config: ManagerConfig,
        connector: Arc<dyn TransportConnector>,
        gateway: Arc<dyn GatewayApi>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, CoreError> {
        config.validate()?;

        let bus = EventBus::new();
        let sessions = Arc::new(SessionTable::new(bus.clone(), Arc::clone(&clock)));
        let scheduler = ReconnectScheduler::new(config.reconnect.clone(), bus.clone());
        let registry = ConnectionRegistry::new(
            &config,
            connector,
            scheduler.clone(),
            Arc::clone(&sessions),
            bus.clone(),
            Arc::clone(&clock),
        );
        let health = HealthMonitor::new(
            registry.clone(),
            Arc::clone(&gateway),
            bus.clone(),
            Arc::clone(&clock),
            config.health.clone(),
            config.request_timeout,
        );
        let dispatcher = CommandDispatcher::new(
            registry.clone(),
            Arc::clone(&gateway),
            sessions,
            clock,
        );

        // Every time a device reaches Connected (first connect or a
        // scheduled reconnect), (re)start its health loop.
        let health_listener = {
            let registry = registry.clone();
            let health = health.clone();
            bus.on(EventKind::DevicesChanged, move |event| {
                if let DeviceEvent::DevicesChanged {
                    device_id,
                    status: ConnectionStatus::Connected,
                } = event
                {
                    if let Some(device) = registry.device(device_id) {
                        health.start_default(device);
                    }
                }
            })
        };

        Ok(Self {
            config,
            bus,
            scheduler,
            registry,
            health,
            dispatcher,
            gateway,
            health_listener,
        })
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Probe the gateway and connect `device`.
    ///
    /// Disabled devices are rejected and connected ones are returned as is.
    /// If the gateway probe fails the device is marked `Error` and handed to
    /// the reconnect scheduler.
    pub async fn initialize(&self, device: Device) -> Result<Connection, CoreError> {
        if !device.enabled {
            return Err(CoreError::unavailable(&device.id, "device is disabled"));
        }
        if let Some(connection) = self
            .registry
            .connection(&device.id)
            .filter(|c| c.status.is_connected())
        {
            debug!(device_id = %device.id, "already connected");
            return Ok(connection);
        }
        let device = Arc::new(device);

        let probe = tokio::time::timeout(self.config.request_timeout, self.gateway.status(&device))
            .await;
        let failure = match probe {
            Ok(Ok(status)) => {
                if !status.is_running() {
                    warn!(device_id = %device.id, status = %status.status, "gateway not running, connecting anyway");
                }
                None
            }
            Ok(Err(e)) => Some(CoreError::from_gateway(&device.id, "status", e)),
            Err(_) => Some(CoreError::unavailable(
                &device.id,
                format!(
                    "gateway probe timed out after {}ms",
                    self.config.request_timeout.as_millis()
                ),
            )),
        };

        if let Some(err) = failure {
            self.registry.mark_failed(device, &err);
            return Err(err);
        }

        self.registry.connect(device).await
    }

    /// Initialize every enabled device concurrently. Disabled ones are
    /// skipped and absent from the result.
    pub async fn initialize_all(
        &self,
        devices: impl IntoIterator<Item = Device>,
    ) -> Vec<(DeviceId, Result<Connection, CoreError>)> {
        let pending = devices.into_iter().filter_map(|device| {
            if !device.enabled {
                info!(device_id = %device.id, "skipping disabled device");
                return None;
            }
            let id = device.id.clone();
            Some(async move { (id, self.initialize(device).await) })
        });
        join_all(pending).await
    }

    /// Stop health checks, drop sessions, and disconnect one device.
    pub async fn stop(&self, device_id: &DeviceId) -> bool {
        let was_connected = self.registry.disconnect(device_id).await;
        let was_monitored = self.health.stop(device_id);
        was_connected || was_monitored
    }

    /// Stop every device. Returns once all transports are closed.
    pub async fn shutdown(&self) {
        info!("shutting down device manager");
        self.scheduler.cancel_all();
        self.health.stop_all();
        self.registry.disconnect_all().await;
        // A reconnect that was mid-flight may have started a loop meanwhile.
        self.health.stop_all();
        self.bus.off(EventKind::DevicesChanged, self.health_listener);
    }

    // ── Commands ─────────────────────────────────────────────────────

    pub async fn start_stream(&self, device_id: &DeviceId, tier: StreamTier) -> bool {
        self.dispatcher.start_stream(device_id, tier).await
    }

    pub async fn stop_stream(&self, device_id: &DeviceId, tier: StreamTier) -> bool {
        self.dispatcher.stop_stream(device_id, tier).await
    }

    pub async fn control_ptz(&self, command: &PtzCommand) -> bool {
        self.dispatcher.control_ptz(command).await
    }

    pub async fn capture_snapshot(
        &self,
        device_id: &DeviceId,
        tier: StreamTier,
    ) -> Result<SnapshotImage, CoreError> {
        self.dispatcher.capture_snapshot(device_id, tier).await
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn status(&self, device_id: &DeviceId) -> ConnectionStatus {
        self.registry.status(device_id)
    }

    pub fn connection(&self, device_id: &DeviceId) -> Option<Connection> {
        self.registry.connection(device_id)
    }

    pub fn connections(&self) -> Vec<Connection> {
        self.registry.connections()
    }

    pub fn health(&self, device_id: &DeviceId) -> Option<HealthRecord> {
        self.health.latest(device_id)
    }

    pub fn sessions(&self, device_id: &DeviceId) -> Vec<StreamSession> {
        self.dispatcher.sessions(device_id)
    }

    pub fn is_reconnect_pending(&self, device_id: &DeviceId) -> bool {
        self.scheduler.is_pending(device_id)
    }

    pub fn is_monitored(&self, device_id: &DeviceId) -> bool {
        self.health.is_running(device_id)
    }

    /// Run the health checks for a registered device immediately.
    pub async fn check_health(&self, device_id: &DeviceId) -> Result<HealthRecord, CoreError> {
        let device = self
            .registry
            .device(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                device_id: device_id.clone(),
            })?;
        Ok(self.health.check_now(&device).await)
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn health_interval(&self) -> Duration {
        self.config.health.interval
    }

    // ── Events ───────────────────────────────────────────────────────

    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&DeviceEvent) + Send + Sync + 'static,
    {
        self.bus.on(kind, listener)
    }

    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        self.bus.off(kind, id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DeviceEvent>> {
        self.bus.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.bus
    }
}
