#![allow(clippy::unwrap_used)]

// End-to-end behaviour of `DeviceManager` through its public seams.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use paddock_core::{
    Capabilities, ConnectionStatus, CoreError, Device, DeviceEvent, DeviceId, DeviceManager,
    EventKind, GatewayApi, ManagerConfig, PtzAction, PtzCommand, PtzPreset, ReconnectPolicy,
    StreamTier, TokioClock, Transport, TransportConnector,
};
use paddock_gateway::{
    Error as GatewayError, GatewayMessage, GatewayStatus, PtzRequest, Snapshot, SocketEvent,
};

// ── Fakes ───────────────────────────────────────────────────────────

// Holds the event sender for as long as the link lives; dropping it would
// read as the gateway hanging up.
struct Link {
    sent: Mutex<Vec<GatewayMessage>>,
    events: mpsc::Sender<SocketEvent>,
}

impl Link {
    fn new(events: mpsc::Sender<SocketEvent>) -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            events,
        }
    }
}

#[async_trait]
impl Transport for Link {
    async fn send(&self, message: GatewayMessage) -> Result<(), GatewayError> {
        self.sent.lock().unwrap().push(message);
        Ok(())
    }

    async fn ping(&self, _timeout: Duration) -> Result<Duration, GatewayError> {
        Ok(Duration::from_millis(40))
    }

    fn close(&self) {
        let _ = self.events.try_send(SocketEvent::Closed {
            reason: "closed locally".into(),
        });
    }
}

#[derive(Default)]
struct Connector {
    refuse: AtomicBool,
    opens: AtomicU32,
    links: Mutex<Vec<Arc<Link>>>,
}

#[async_trait]
impl TransportConnector for Connector {
    async fn open(
        &self,
        device: &Device,
        events: mpsc::Sender<SocketEvent>,
    ) -> Result<Arc<dyn Transport>, CoreError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(CoreError::ConnectionFailed {
                device_id: device.id.clone(),
                reason: "connection refused".into(),
            });
        }
        let link = Arc::new(Link::new(events));
        self.links.lock().unwrap().push(Arc::clone(&link));
        Ok(link)
    }
}

struct Gateway;

#[async_trait]
impl GatewayApi for Gateway {
    async fn status(&self, _device: &Device) -> Result<GatewayStatus, GatewayError> {
        Ok(GatewayStatus {
            status: "running".into(),
            extra: serde_json::Map::new(),
        })
    }

    async fn start_stream(&self, _device: &Device, _tier: StreamTier) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn stop_stream(&self, _device: &Device, _tier: StreamTier) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn ptz(&self, _device: &Device, _request: &PtzRequest) -> Result<(), GatewayError> {
        Ok(())
    }

    async fn snapshot(&self, _device: &Device, _tier: StreamTier) -> Result<Snapshot, GatewayError> {
        Ok(Snapshot::new(
            Bytes::from_static(&[0xFF, 0xD8, 0xFF, 0xD9]),
            Some("image/jpeg".into()),
        ))
    }
}

// ── Helpers ─────────────────────────────────────────────────────────

fn config() -> ManagerConfig {
    ManagerConfig {
        reconnect: ReconnectPolicy::Exponential {
            initial: Duration::from_secs(2),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: false,
        },
        ..ManagerConfig::default()
    }
}

fn origin() -> DateTime<Utc> {
    DateTime::parse_from_rfc3339("2026-05-10T05:30:00Z")
        .unwrap()
        .with_timezone(&Utc)
}

fn manager(connector: Arc<Connector>) -> DeviceManager {
    DeviceManager::with_components(
        config(),
        connector,
        Arc::new(Gateway),
        Arc::new(TokioClock::new(origin())),
    )
    .unwrap()
}

fn foaling_cam() -> Device {
    Device::new("foaling-box", "10.0.8.2:8080").with_capabilities(Capabilities {
        ptz: true,
        presets: vec![PtzPreset {
            id: "door".into(),
            name: None,
        }],
        stream_tiers: vec![StreamTier::Main, StreamTier::Sub],
    })
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test(start_paused = true)]
async fn health_publishes_every_interval() {
    let connector = Arc::new(Connector::default());
    let manager = manager(Arc::clone(&connector));
    let mut events = manager.subscribe();

    manager.initialize(foaling_cam()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(90)).await;
    tokio::time::sleep(Duration::from_millis(1)).await;

    let mut stamps = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let DeviceEvent::HealthUpdate(record) = event.as_ref() {
            assert_eq!(record.latency_ms, 0);
            stamps.push(record.timestamp);
        }
    }
    assert_eq!(
        stamps,
        vec![
            origin() + chrono::Duration::seconds(30),
            origin() + chrono::Duration::seconds(60),
            origin() + chrono::Duration::seconds(90),
        ]
    );

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn refused_transport_backs_off_exponentially() {
    let connector = Arc::new(Connector::default());
    connector.refuse.store(true, Ordering::SeqCst);
    let manager = manager(Arc::clone(&connector));
    let attempts = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&attempts);
    manager.on(EventKind::ReconnectScheduled, move |event| {
        if let DeviceEvent::ReconnectScheduled { attempt, delay, .. } = event {
            sink.lock().unwrap().push((*attempt, delay.as_secs()));
        }
    });

    let err = manager.initialize(foaling_cam()).await.unwrap_err();
    assert!(matches!(err, CoreError::ConnectionFailed { .. }));

    // Attempts at t=2 and t=6; the third waits until t=14.
    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(connector.opens.load(Ordering::SeqCst), 3);
    assert_eq!(*attempts.lock().unwrap(), vec![(1, 2), (2, 4), (3, 8)]);

    connector.refuse.store(false, Ordering::SeqCst);
    tokio::time::sleep(Duration::from_secs(5)).await;
    let id = DeviceId::new("foaling-box");
    assert_eq!(manager.status(&id), ConnectionStatus::Connected);
    assert!(!manager.is_reconnect_pending(&id));

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn connected_link_stays_up() {
    let connector = Arc::new(Connector::default());
    let manager = manager(Arc::clone(&connector));
    let id = DeviceId::new("foaling-box");

    manager.initialize(foaling_cam()).await.unwrap();
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(manager.status(&id), ConnectionStatus::Connected);
    assert_eq!(connector.opens.load(Ordering::SeqCst), 1);
    assert!(!manager.is_reconnect_pending(&id));

    manager.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn commands_reach_the_transport() {
    let connector = Arc::new(Connector::default());
    let manager = manager(Arc::clone(&connector));
    let id = DeviceId::new("foaling-box");
    manager.initialize(foaling_cam()).await.unwrap();

    assert!(manager.start_stream(&id, StreamTier::Main).await);
    assert!(
        manager
            .control_ptz(&PtzCommand::goto_preset("foaling-box", "door"))
            .await
    );
    assert!(
        !manager
            .control_ptz(&PtzCommand::new("foaling-box", PtzAction::GotoPreset))
            .await
    );

    let snapshot = manager
        .capture_snapshot(&id, StreamTier::Sub)
        .await
        .unwrap();
    assert_eq!(snapshot.content_type.as_deref(), Some("image/jpeg"));
    assert_eq!(snapshot.width, None);

    let link = Arc::clone(&connector.links.lock().unwrap()[0]);
    let kinds: Vec<&str> = link
        .sent
        .lock()
        .unwrap()
        .iter()
        .map(GatewayMessage::kind)
        .collect();
    assert_eq!(kinds, vec!["configure", "ptz_command"]);

    assert!(manager.stop_stream(&id, StreamTier::Main).await);
    assert!(manager.sessions(&id).is_empty());

    manager.stop(&id).await;
    assert!(
        !manager
            .start_stream(&id, StreamTier::Main)
            .await
    );
}
