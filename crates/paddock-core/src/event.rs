// ── Typed event bus ──
//
// Synchronous publish/subscribe for device state changes. Listeners register
// per `EventKind`; every emitted event is also mirrored onto a broadcast
// channel for async consumers.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use serde::Serialize;
use strum::Display;
use tokio::sync::broadcast;
use tracing::error;

use crate::model::{ConnectionStatus, DeviceId, HealthRecord, StreamStatus, StreamTier};

const BROADCAST_CAPACITY: usize = 256;

/// Subscription key for [`EventBus::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "camelCase")]
pub enum EventKind {
    DevicesChanged,
    StreamStatusChange,
    HealthUpdate,
    Error,
    ReconnectScheduled,
}

/// Everything the device layer reports to the outside world.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum DeviceEvent {
    /// A device's connection status changed.
    DevicesChanged {
        device_id: DeviceId,
        status: ConnectionStatus,
    },
    /// A stream session changed state.
    StreamStatusChange {
        device_id: DeviceId,
        tier: StreamTier,
        status: StreamStatus,
    },
    HealthUpdate(HealthRecord),
    /// A failure worth showing to an operator.
    Error {
        device_id: Option<DeviceId>,
        message: String,
    },
    /// A reconnect timer was armed.
    ReconnectScheduled {
        device_id: DeviceId,
        attempt: u32,
        #[serde(serialize_with = "serialize_millis")]
        delay: Duration,
    },
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

impl DeviceEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::DevicesChanged { .. } => EventKind::DevicesChanged,
            Self::StreamStatusChange { .. } => EventKind::StreamStatusChange,
            Self::HealthUpdate(_) => EventKind::HealthUpdate,
            Self::Error { .. } => EventKind::Error,
            Self::ReconnectScheduled { .. } => EventKind::ReconnectScheduled,
        }
    }

    pub fn device_id(&self) -> Option<&DeviceId> {
        match self {
            Self::DevicesChanged { device_id, .. }
            | Self::StreamStatusChange { device_id, .. }
            | Self::ReconnectScheduled { device_id, .. } => Some(device_id),
            Self::HealthUpdate(record) => Some(&record.device_id),
            Self::Error { device_id, .. } => device_id.as_ref(),
        }
    }
}

/// Handle returned by [`EventBus::on`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

pub type Listener = Arc<dyn Fn(&DeviceEvent) + Send + Sync>;

/// Typed publish/subscribe hub.
///
/// Cheaply cloneable; clones share listeners. Dispatch is synchronous and
/// iterates a snapshot of the listener list, so a listener may subscribe or
/// unsubscribe (itself included) while an event is being delivered.
#[derive(Clone)]
pub struct EventBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    listeners: DashMap<EventKind, Vec<(ListenerId, Listener)>>,
    next_id: AtomicU64,
    broadcast: broadcast::Sender<Arc<DeviceEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        let (broadcast, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            inner: Arc::new(BusInner {
                listeners: DashMap::new(),
                next_id: AtomicU64::new(1),
                broadcast,
            }),
        }
    }

    /// Register `listener` for events of `kind`.
    pub fn on<F>(&self, kind: EventKind, listener: F) -> ListenerId
    where
        F: Fn(&DeviceEvent) + Send + Sync + 'static,
    {
        let id = ListenerId(self.inner.next_id.fetch_add(1, Ordering::Relaxed));
        self.inner
            .listeners
            .entry(kind)
            .or_default()
            .push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns `false` if it was not registered for `kind`.
    pub fn off(&self, kind: EventKind, id: ListenerId) -> bool {
        let Some(mut list) = self.inner.listeners.get_mut(&kind) else {
            return false;
        };
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        before != list.len()
    }

    /// Async view of every event emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<DeviceEvent>> {
        self.inner.broadcast.subscribe()
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.listeners.get(&kind).map_or(0, |l| l.len())
    }

    /// Deliver `event` to every listener of its kind, then to broadcast
    /// subscribers. A panicking listener is logged and skipped.
    pub(crate) fn emit(&self, event: DeviceEvent) {
        let kind = event.kind();

        // Snapshot first: the shard lock must not be held while listeners run.
        let snapshot: Vec<Listener> = self
            .inner
            .listeners
            .get(&kind)
            .map(|list| list.iter().map(|(_, l)| Arc::clone(l)).collect())
            .unwrap_or_default();

        for listener in snapshot {
            if catch_unwind(AssertUnwindSafe(|| listener(&event))).is_err() {
                error!(%kind, device_id = ?event.device_id(), "event listener panicked");
            }
        }

        // No receivers is fine.
        let _ = self.inner.broadcast.send(Arc::new(event));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("kinds", &self.inner.listeners.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::OnceLock;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    fn changed(id: &str) -> DeviceEvent {
        DeviceEvent::DevicesChanged {
            device_id: DeviceId::new(id),
            status: ConnectionStatus::Connected,
        }
    }

    #[test]
    fn delivers_only_to_matching_kind() {
        let bus = EventBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h = Arc::clone(&hits);
        bus.on(EventKind::DevicesChanged, move |_| {
            h.fetch_add(1, Ordering::SeqCst);
        });
        let h = Arc::clone(&hits);
        bus.on(EventKind::HealthUpdate, move |_| {
            h.fetch_add(100, Ordering::SeqCst);
        });

        bus.emit(changed("a"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn listener_may_unsubscribe_itself_during_dispatch() {
        let bus = EventBus::new();
        let own_id: Arc<OnceLock<ListenerId>> = Arc::new(OnceLock::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let bus_ref = bus.clone();
        let id_ref = Arc::clone(&own_id);
        let c = Arc::clone(&calls);
        let id = bus.on(EventKind::DevicesChanged, move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(id) = id_ref.get() {
                assert!(bus_ref.off(EventKind::DevicesChanged, *id));
            }
        });
        own_id.set(id).unwrap();

        bus.emit(changed("a"));
        bus.emit(changed("a"));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(bus.listener_count(EventKind::DevicesChanged), 0);
    }

    #[test]
    fn panicking_listener_does_not_starve_others() {
        let bus = EventBus::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        bus.on(EventKind::Error, |_| panic!("listener bug"));
        let s = Arc::clone(&seen);
        bus.on(EventKind::Error, move |event| {
            s.lock().unwrap().push(event.kind());
        });

        bus.emit(DeviceEvent::Error {
            device_id: None,
            message: "gateway restarted".into(),
        });

        assert_eq!(*seen.lock().unwrap(), vec![EventKind::Error]);
    }

    #[test]
    fn off_unknown_listener_is_false() {
        let bus = EventBus::new();
        let id = bus.on(EventKind::HealthUpdate, |_| {});
        assert!(!bus.off(EventKind::Error, id));
        assert!(bus.off(EventKind::HealthUpdate, id));
        assert!(!bus.off(EventKind::HealthUpdate, id));
    }

    #[tokio::test]
    async fn broadcast_subscribers_see_every_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();

        bus.emit(changed("paddock-north"));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), EventKind::DevicesChanged);
        assert_eq!(event.device_id().unwrap().as_str(), "paddock-north");
    }

    #[test]
    fn events_serialize_with_camel_case_tag() {
        let json = serde_json::to_value(DeviceEvent::ReconnectScheduled {
            device_id: DeviceId::new("x"),
            attempt: 2,
            delay: Duration::from_millis(1500),
        })
        .unwrap();
        assert_eq!(json["event"], "reconnectScheduled");
        assert_eq!(json["delay"], 1500);
        assert_eq!(json["device_id"], "x");
    }
}
