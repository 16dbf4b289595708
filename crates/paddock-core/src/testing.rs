// In-memory fakes for the transport and gateway seams, plus a harness that
// wires a registry the way `DeviceManager` does.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use paddock_gateway::{
    Error as GatewayError, GatewayMessage, GatewayStatus, PtzRequest, Snapshot, SocketEvent,
    StreamTier,
};

use crate::clock::{Clock, TokioClock};
use crate::config::{ManagerConfig, ReconnectPolicy};
use crate::error::CoreError;
use crate::event::{DeviceEvent, EventBus};
use crate::gateway::GatewayApi;
use crate::model::{Capabilities, Device, PtzPreset};
use crate::reconnect::ReconnectScheduler;
use crate::registry::ConnectionRegistry;
use crate::session::SessionTable;
use crate::transport::{Transport, TransportConnector};

pub(crate) const PNG_2X1: &[u8] = &[
    0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n', 0, 0, 0, 13, b'I', b'H', b'D', b'R', 0, 0,
    0, 2, 0, 0, 0, 1, 8, 6, 0, 0, 0,
];

pub(crate) fn origin() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-03-01T06:00:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

/// Let spawned tasks drain their queues.
pub(crate) async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

pub(crate) fn ptz_camera(id: &str) -> Device {
    Device::new(id, "10.0.4.30:8080").with_capabilities(Capabilities {
        ptz: true,
        presets: vec![PtzPreset {
            id: "water-trough".into(),
            name: Some("Water trough".into()),
        }],
        stream_tiers: Vec::new(),
    })
}

// ── Transport ────────────────────────────────────────────────────────

pub(crate) struct FakeTransport {
    sent: Mutex<Vec<GatewayMessage>>,
    events: mpsc::Sender<SocketEvent>,
    closed: AtomicBool,
    fail_sends: AtomicBool,
    rtt: Mutex<Option<Duration>>,
}

impl FakeTransport {
    fn new(events: mpsc::Sender<SocketEvent>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            events,
            closed: AtomicBool::new(false),
            fail_sends: AtomicBool::new(false),
            rtt: Mutex::new(Some(Duration::from_millis(20))),
        }
    }

    pub(crate) fn sent(&self) -> Vec<GatewayMessage> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn sent_kinds(&self) -> Vec<&'static str> {
        self.sent().iter().map(GatewayMessage::kind).collect()
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub(crate) fn set_rtt(&self, rtt: Option<Duration>) {
        *self.rtt.lock().unwrap() = rtt;
    }

    pub(crate) fn fail_sends(&self, fail: bool) {
        self.fail_sends.store(fail, Ordering::SeqCst);
    }

    /// Simulate the gateway dropping the socket.
    pub(crate) async fn drop_remote(&self, reason: &str) {
        self.closed.store(true, Ordering::SeqCst);
        let _ = self
            .events
            .send(SocketEvent::Closed {
                reason: reason.into(),
            })
            .await;
    }

    pub(crate) async fn inject(&self, event: SocketEvent) {
        let _ = self.events.send(event).await;
    }
}

fn closed_error() -> GatewayError {
    GatewayError::WebSocketClosed {
        code: 1006,
        reason: "socket closed".into(),
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, message: GatewayMessage) -> Result<(), GatewayError> {
        if self.is_closed() || self.fail_sends.load(Ordering::SeqCst) {
            return Err(closed_error());
        }
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn ping(&self, timeout: Duration) -> Result<Duration, GatewayError> {
        if self.is_closed() {
            return Err(closed_error());
        }
        let rtt = *self.rtt.lock().unwrap();
        rtt.ok_or(GatewayError::Timeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        })
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            let _ = self.events.try_send(SocketEvent::Closed {
                reason: "closed locally".into(),
            });
        }
    }
}

#[derive(Default)]
pub(crate) struct FakeConnector {
    opens: AtomicU32,
    failing: AtomicBool,
    hanging: AtomicBool,
    transports: Mutex<Vec<Arc<FakeTransport>>>,
}

impl FakeConnector {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn open_count(&self) -> u32 {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn set_hanging(&self, hanging: bool) {
        self.hanging.store(hanging, Ordering::SeqCst);
    }

    pub(crate) fn last_transport(&self) -> Arc<FakeTransport> {
        self.transports
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("no transport opened")
    }
}

#[async_trait]
impl TransportConnector for FakeConnector {
    async fn open(
        &self,
        device: &Device,
        events: mpsc::Sender<SocketEvent>,
    ) -> Result<Arc<dyn Transport>, CoreError> {
        self.opens.fetch_add(1, Ordering::SeqCst);

        if self.hanging.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(CoreError::ConnectionFailed {
                device_id: device.id.clone(),
                reason: "connection refused".into(),
            });
        }

        let transport = Arc::new(FakeTransport::new(events));
        self.transports.lock().unwrap().push(Arc::clone(&transport));
        Ok(transport)
    }
}

// ── Gateway ──────────────────────────────────────────────────────────

pub(crate) struct FakeGateway {
    reachable: AtomicBool,
    fail_commands: AtomicBool,
    calls: Mutex<Vec<String>>,
    snapshot: Mutex<Bytes>,
}

impl FakeGateway {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self {
            reachable: AtomicBool::new(true),
            fail_commands: AtomicBool::new(false),
            calls: Mutex::new(Vec::new()),
            snapshot: Mutex::new(Bytes::from_static(PNG_2X1)),
        })
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub(crate) fn fail_commands(&self, fail: bool) {
        self.fail_commands.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_snapshot(&self, data: &'static [u8]) {
        *self.snapshot.lock().unwrap() = Bytes::from_static(data);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) -> Result<(), GatewayError> {
        self.calls.lock().unwrap().push(call);
        if !self.reachable.load(Ordering::SeqCst) {
            return Err(GatewayError::Timeout { timeout_ms: 5_000 });
        }
        Ok(())
    }

    fn command(&self, call: String) -> Result<(), GatewayError> {
        self.record(call)?;
        if self.fail_commands.load(Ordering::SeqCst) {
            return Err(GatewayError::Gateway {
                status: 500,
                message: "encoder busy".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl GatewayApi for FakeGateway {
    async fn status(&self, _device: &Device) -> Result<GatewayStatus, GatewayError> {
        self.record("status".into())?;
        Ok(GatewayStatus {
            status: "running".into(),
            extra: serde_json::Map::new(),
        })
    }

    async fn start_stream(&self, _device: &Device, tier: StreamTier) -> Result<(), GatewayError> {
        self.command(format!("stream/start:{tier}"))
    }

    async fn stop_stream(&self, _device: &Device, tier: StreamTier) -> Result<(), GatewayError> {
        self.command(format!("stream/stop:{tier}"))
    }

    async fn ptz(&self, _device: &Device, request: &PtzRequest) -> Result<(), GatewayError> {
        self.command(format!("ptz:{}", request.command))
    }

    async fn snapshot(&self, _device: &Device, tier: StreamTier) -> Result<Snapshot, GatewayError> {
        self.command(format!("snapshot:{tier}"))?;
        let data = self.snapshot.lock().unwrap().clone();
        Ok(Snapshot::new(data, Some("image/png".into())))
    }
}

// ── Harness ──────────────────────────────────────────────────────────

pub(crate) struct Harness {
    pub config: ManagerConfig,
    pub bus: EventBus,
    pub clock: Arc<dyn Clock>,
    pub connector: Arc<FakeConnector>,
    pub gateway: Arc<FakeGateway>,
    pub scheduler: ReconnectScheduler,
    pub sessions: Arc<SessionTable>,
    pub registry: ConnectionRegistry,
    pub events: Arc<Mutex<Vec<DeviceEvent>>>,
}

/// Config used across component tests: fixed 5 s reconnect, default health.
pub(crate) fn test_config() -> ManagerConfig {
    ManagerConfig {
        reconnect: ReconnectPolicy::Fixed {
            delay: Duration::from_secs(5),
        },
        protocol_error_threshold: 2,
        ..ManagerConfig::default()
    }
}

impl Harness {
    pub(crate) fn new() -> Self {
        Self::with_config(test_config())
    }

    pub(crate) fn with_config(config: ManagerConfig) -> Self {
        let bus = EventBus::new();
        let clock: Arc<dyn Clock> = Arc::new(TokioClock::new(origin()));
        let connector = FakeConnector::new();
        let gateway = FakeGateway::new();
        let scheduler = ReconnectScheduler::new(config.reconnect.clone(), bus.clone());
        let sessions = Arc::new(SessionTable::new(bus.clone(), Arc::clone(&clock)));
        let registry = ConnectionRegistry::new(
            &config,
            connector.clone(),
            scheduler.clone(),
            Arc::clone(&sessions),
            bus.clone(),
            Arc::clone(&clock),
        );

        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in [
            crate::event::EventKind::DevicesChanged,
            crate::event::EventKind::StreamStatusChange,
            crate::event::EventKind::HealthUpdate,
            crate::event::EventKind::Error,
            crate::event::EventKind::ReconnectScheduled,
        ] {
            let sink = Arc::clone(&events);
            bus.on(kind, move |event| sink.lock().unwrap().push(event.clone()));
        }

        Self {
            config,
            bus,
            clock,
            connector,
            gateway,
            scheduler,
            sessions,
            registry,
            events,
        }
    }

    pub(crate) fn events(&self) -> Vec<DeviceEvent> {
        self.events.lock().unwrap().clone()
    }
}
