// ── Connection registry ──
//
// One slot per device id. A slot owns the device descriptor, a `watch` cell
// with the current status (readable without blocking), and an async mutex
// around the live link. Each link has a reader task that turns inbound
// frames into session updates and reports unsolicited closure. Recovery is
// always delegated to the `ReconnectScheduler`; the registry never retries.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use secrecy::ExposeSecret;
use tokio::sync::{Mutex, mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use paddock_gateway::{GatewayMessage, SocketEvent};

use crate::clock::Clock;
use crate::config::ManagerConfig;
use crate::error::CoreError;
use crate::event::{DeviceEvent, EventBus};
use crate::model::{Connection, ConnectionStatus, Device, DeviceId, StreamStatus, StreamTier};
use crate::reconnect::{ReconnectScheduler, ReconnectTarget};
use crate::session::SessionTable;
use crate::transport::{Transport, TransportConnector};

const EVENT_CAPACITY: usize = 64;

/// Owns the transport connection of every registered device.
#[derive(Clone)]
pub struct ConnectionRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    me: Weak<RegistryInner>,
    slots: DashMap<DeviceId, Arc<DeviceSlot>>,
    connector: Arc<dyn TransportConnector>,
    scheduler: ReconnectScheduler,
    sessions: Arc<SessionTable>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    connect_timeout: Duration,
    request_timeout: Duration,
    protocol_error_threshold: u32,
    next_generation: AtomicU64,
}

struct DeviceSlot {
    device: Arc<Device>,
    status: watch::Sender<ConnectionStatus>,
    last_activity: ArcSwapOption<DateTime<Utc>>,
    link: Mutex<Option<Link>>,
}

struct Link {
    transport: Arc<dyn Transport>,
    cancel: CancellationToken,
    generation: u64,
}

impl Link {
    fn shut(self) {
        self.cancel.cancel();
        self.transport.close();
    }
}

impl DeviceSlot {
    fn new(device: Arc<Device>) -> Self {
        Self {
            device,
            status: watch::Sender::new(ConnectionStatus::Disconnected),
            last_activity: ArcSwapOption::empty(),
            link: Mutex::new(None),
        }
    }

    fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    fn touch(&self, at: DateTime<Utc>) {
        self.last_activity.store(Some(Arc::new(at)));
    }

    fn connection(&self) -> Connection {
        Connection {
            device_id: self.device.id.clone(),
            status: self.status(),
            last_activity: self.last_activity.load_full().map(|at| *at),
        }
    }
}

impl ConnectionRegistry {
    pub(crate) fn new(
        config: &ManagerConfig,
        connector: Arc<dyn TransportConnector>,
        scheduler: ReconnectScheduler,
        sessions: Arc<SessionTable>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let inner = Arc::new_cyclic(|me| RegistryInner {
            me: me.clone(),
            slots: DashMap::new(),
            connector,
            scheduler,
            sessions,
            bus,
            clock,
            connect_timeout: config.connect_timeout,
            request_timeout: config.request_timeout,
            protocol_error_threshold: config.protocol_error_threshold,
            next_generation: AtomicU64::new(1),
        });

        let target: Weak<dyn ReconnectTarget> = inner.me.clone();
        inner.scheduler.bind(target);

        Self { inner }
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Open the transport for `device` and send `configure`.
    ///
    /// A no-op for a device that is already connected. On failure the
    /// device is left in `Error` with a reconnect scheduled.
    pub async fn connect(&self, device: Arc<Device>) -> Result<Connection, CoreError> {
        let slot = self.inner.slot_for(device);

        match self.inner.establish(&slot).await {
            Ok(connection) => {
                self.inner.scheduler.cancel(&slot.device.id);
                Ok(connection)
            }
            Err(e @ CoreError::DeviceNotFound { .. }) => Err(e),
            Err(e) => {
                // A disconnect may have landed while the attempt was in flight.
                if self.inner.is_registered(&slot) {
                    self.inner.scheduler.schedule(Arc::clone(&slot.device));
                }
                Err(e)
            }
        }
    }

    /// Register `device` as failed without trying to connect, and hand it to
    /// the scheduler. Used when a pre-connect check already failed.
    ///
    /// Does nothing while the device has a live link or a connect in
    /// progress; those own the status.
    pub(crate) fn mark_failed(&self, device: Arc<Device>, err: &CoreError) {
        let slot = self.inner.slot_for(device);
        let idle = slot.link.try_lock().is_ok_and(|link| link.is_none());
        if !idle {
            debug!(device_id = %slot.device.id, error = %err, "link busy, ignoring failed pre-check");
            return;
        }
        self.inner.fail(&slot, err);
        self.inner.scheduler.schedule(Arc::clone(&slot.device));
    }

    /// Close the transport, cancel any pending reconnect, and forget the
    /// device. Returns `false` if it was not registered.
    pub async fn disconnect(&self, device_id: &DeviceId) -> bool {
        self.inner.scheduler.cancel(device_id);

        let Some((_, slot)) = self.inner.slots.remove(device_id) else {
            return false;
        };

        // Waits out any in-flight connect on this slot, then tears it down.
        if let Some(link) = slot.link.lock().await.take() {
            link.shut();
        }

        self.inner.sessions.remove_device(device_id);
        self.inner.set_status(&slot, ConnectionStatus::Disconnected);
        info!(device_id = %device_id, "disconnected");
        true
    }

    pub async fn disconnect_all(&self) {
        let ids: Vec<DeviceId> = self
            .inner
            .slots
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for id in ids {
            self.disconnect(&id).await;
        }
    }

    // ── Queries ──────────────────────────────────────────────────────

    /// Current status. Unknown devices are `Disconnected`.
    pub fn status(&self, device_id: &DeviceId) -> ConnectionStatus {
        self.inner
            .slots
            .get(device_id)
            .map_or(ConnectionStatus::Disconnected, |slot| slot.status())
    }

    /// Status updates for a registered device.
    pub fn watch(&self, device_id: &DeviceId) -> Option<watch::Receiver<ConnectionStatus>> {
        self.inner
            .slots
            .get(device_id)
            .map(|slot| slot.status.subscribe())
    }

    pub fn connection(&self, device_id: &DeviceId) -> Option<Connection> {
        self.inner
            .slots
            .get(device_id)
            .map(|slot| slot.connection())
    }

    pub fn connections(&self) -> Vec<Connection> {
        let mut all: Vec<Connection> = self
            .inner
            .slots
            .iter()
            .map(|entry| entry.value().connection())
            .collect();
        all.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        all
    }

    pub fn device(&self, device_id: &DeviceId) -> Option<Arc<Device>> {
        self.inner
            .slots
            .get(device_id)
            .map(|slot| Arc::clone(&slot.device))
    }

    // ── Transport access ─────────────────────────────────────────────

    /// Ping/pong round trip on the live transport.
    pub async fn ping(&self, device_id: &DeviceId) -> Result<Duration, CoreError> {
        let (slot, transport) = self.inner.live(device_id)?;
        let rtt = transport
            .ping(self.inner.request_timeout)
            .await
            .map_err(|e| CoreError::unavailable(device_id, format!("ping failed: {e}")))?;
        slot.touch(self.inner.clock.now());
        Ok(rtt)
    }

    /// Send a frame on the live transport.
    pub async fn send(&self, device_id: &DeviceId, message: GatewayMessage) -> Result<(), CoreError> {
        let (_, transport) = self.inner.live(device_id)?;
        let kind = message.kind();
        transport
            .send(message)
            .await
            .map_err(|e| CoreError::from_gateway(device_id, kind, e))
    }
}

impl RegistryInner {
    fn slot_for(&self, device: Arc<Device>) -> Arc<DeviceSlot> {
        let slot = self
            .slots
            .entry(device.id.clone())
            .or_insert_with(|| Arc::new(DeviceSlot::new(device)));
        Arc::clone(&slot)
    }

    fn is_registered(&self, slot: &Arc<DeviceSlot>) -> bool {
        self.slots
            .get(&slot.device.id)
            .is_some_and(|current| Arc::ptr_eq(&current, slot))
    }

    /// The slot and its transport, if the device is connected right now.
    /// Never waits on a connect in progress.
    fn live(&self, device_id: &DeviceId) -> Result<(Arc<DeviceSlot>, Arc<dyn Transport>), CoreError> {
        let slot = self
            .slots
            .get(device_id)
            .map(|slot| Arc::clone(&slot))
            .ok_or_else(|| CoreError::DeviceNotFound {
                device_id: device_id.clone(),
            })?;

        let transport = slot
            .link
            .try_lock()
            .ok()
            .and_then(|link| link.as_ref().map(|l| Arc::clone(&l.transport)))
            .ok_or_else(|| CoreError::unavailable(device_id, format!("device is {}", slot.status())))?;

        Ok((slot, transport))
    }

    fn set_status(&self, slot: &DeviceSlot, status: ConnectionStatus) {
        let changed = slot.status.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });

        if changed {
            debug!(device_id = %slot.device.id, %status, "connection status changed");
            self.bus.emit(DeviceEvent::DevicesChanged {
                device_id: slot.device.id.clone(),
                status,
            });
        }
    }

    /// Move to `Error` and report. Returns nothing; callers keep the error.
    fn fail(&self, slot: &DeviceSlot, err: &CoreError) {
        warn!(device_id = %slot.device.id, error = %err, "connection failed");
        self.set_status(slot, ConnectionStatus::Error);
        self.bus.emit(DeviceEvent::Error {
            device_id: Some(slot.device.id.clone()),
            message: err.to_string(),
        });
    }

    /// Open, configure, and install a link on `slot`.
    async fn establish(self: &Arc<Self>, slot: &Arc<DeviceSlot>) -> Result<Connection, CoreError> {
        let id = &slot.device.id;
        let mut link = slot.link.lock().await;

        if !self.is_registered(slot) {
            return Err(CoreError::DeviceNotFound {
                device_id: id.clone(),
            });
        }
        if link.is_some() && slot.status().is_connected() {
            debug!(device_id = %id, "already connected");
            return Ok(slot.connection());
        }
        if let Some(stale) = link.take() {
            stale.shut();
        }

        self.set_status(slot, ConnectionStatus::Connecting);

        let (events_tx, events_rx) = mpsc::channel(EVENT_CAPACITY);
        let opened =
            tokio::time::timeout(self.connect_timeout, self.connector.open(&slot.device, events_tx))
                .await;

        let transport = match opened {
            Ok(Ok(transport)) => transport,
            Ok(Err(e)) => {
                self.fail(slot, &e);
                return Err(e);
            }
            Err(_) => {
                let e = CoreError::ConnectionFailed {
                    device_id: id.clone(),
                    reason: format!(
                        "timed out after {}ms",
                        self.connect_timeout.as_millis()
                    ),
                };
                self.fail(slot, &e);
                return Err(e);
            }
        };

        if let Err(e) = transport.send(configure_message(&slot.device)).await {
            transport.close();
            let e = CoreError::connection(id, &e);
            self.fail(slot, &e);
            return Err(e);
        }

        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();
        tokio::spawn(reader_loop(
            Arc::clone(self),
            Arc::clone(slot),
            events_rx,
            cancel.clone(),
            generation,
        ));

        *link = Some(Link {
            transport,
            cancel,
            generation,
        });
        slot.touch(self.clock.now());
        self.set_status(slot, ConnectionStatus::Connected);
        info!(device_id = %id, "connected");

        Ok(slot.connection())
    }

    /// The link with `generation` died without being asked to.
    async fn connection_lost(&self, slot: &Arc<DeviceSlot>, generation: u64, err: CoreError) {
        let mut link = slot.link.lock().await;
        if link.as_ref().is_none_or(|l| l.generation != generation) {
            // Replaced or already torn down.
            return;
        }
        if let Some(dead) = link.take() {
            dead.shut();
        }
        drop(link);

        if !self.is_registered(slot) {
            return;
        }

        self.sessions.mark_disconnected(&slot.device.id);
        self.fail(slot, &err);
        self.scheduler.schedule(Arc::clone(&slot.device));
    }

    fn handle_frame(&self, device_id: &DeviceId, message: GatewayMessage) {
        match message {
            GatewayMessage::StreamData { quality, .. }
            | GatewayMessage::StreamProgress { quality, .. } => {
                for tier in self.tiers(device_id, quality) {
                    self.sessions
                        .set_status(device_id, tier, StreamStatus::Streaming);
                }
            }
            GatewayMessage::StreamError { quality, message } => {
                warn!(device_id = %device_id, ?quality, error = %message, "stream error from gateway");
                for tier in self.tiers(device_id, quality) {
                    self.sessions.set_status(device_id, tier, StreamStatus::Error);
                }
                self.bus.emit(DeviceEvent::Error {
                    device_id: Some(device_id.clone()),
                    message: format!("stream error: {message}"),
                });
            }
            GatewayMessage::PtzCommand {
                command, success, ..
            } => {
                if success == Some(false) {
                    warn!(device_id = %device_id, %command, "gateway rejected PTZ command");
                } else {
                    debug!(device_id = %device_id, %command, "PTZ command acknowledged");
                }
            }
            other => {
                debug!(device_id = %device_id, kind = other.kind(), "ignoring frame");
            }
        }
    }

    /// Tiers a stream frame refers to: the named one, or every open session.
    fn tiers(&self, device_id: &DeviceId, quality: Option<StreamTier>) -> Vec<StreamTier> {
        match quality {
            Some(tier) => vec![tier],
            None => self
                .sessions
                .for_device(device_id)
                .into_iter()
                .map(|s| s.tier)
                .collect(),
        }
    }
}

#[async_trait]
impl ReconnectTarget for RegistryInner {
    async fn reconnect(&self, device: &Device) -> Result<(), CoreError> {
        let Some(slot) = self
            .slots
            .get(&device.id)
            .map(|slot| Arc::clone(&slot))
        else {
            // Disconnected meanwhile; nothing left to recover.
            return Ok(());
        };

        // `establish` spawns the reader task and needs an owning handle.
        let Some(this) = self.me.upgrade() else {
            return Ok(());
        };

        match this.establish(&slot).await {
            Ok(_) | Err(CoreError::DeviceNotFound { .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

async fn reader_loop(
    inner: Arc<RegistryInner>,
    slot: Arc<DeviceSlot>,
    mut events: mpsc::Receiver<SocketEvent>,
    cancel: CancellationToken,
    generation: u64,
) {
    let id = slot.device.id.clone();
    let mut malformed: u32 = 0;

    let err = loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            event = events.recv() => match event {
                Some(SocketEvent::Message(message)) => {
                    slot.touch(inner.clock.now());
                    inner.handle_frame(&id, message);
                }
                Some(SocketEvent::Malformed { reason }) => {
                    malformed = malformed.saturating_add(1);
                    warn!(device_id = %id, malformed, %reason, "malformed frame");
                    if malformed > inner.protocol_error_threshold {
                        break CoreError::Protocol {
                            device_id: id.clone(),
                            reason: format!("{malformed} malformed frames, last: {reason}"),
                        };
                    }
                }
                Some(SocketEvent::Closed { reason }) => {
                    break CoreError::ConnectionFailed {
                        device_id: id.clone(),
                        reason: format!("connection lost: {reason}"),
                    };
                }
                None => {
                    break CoreError::ConnectionFailed {
                        device_id: id.clone(),
                        reason: "transport event stream ended".into(),
                    };
                }
            }
        }
    };

    inner.connection_lost(&slot, generation, err).await;
}

fn configure_message(device: &Device) -> GatewayMessage {
    let credentials = device.credentials.as_ref();
    GatewayMessage::Configure {
        camera_id: device.id.to_string(),
        host: device.host.clone(),
        username: credentials.map(|c| c.username.clone()),
        password: credentials.map(|c| c.password.expose_secret().to_owned()),
    }
}
