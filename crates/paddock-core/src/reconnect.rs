// ── Reconnect scheduling ──
//
// At most one reconnect task per device. The task sleeps for the policy
// delay, asks the registry to connect again, and re-arms with the next delay
// on failure. The single entry survives re-arming and is removed on success
// or cancellation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use async_trait::async_trait;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReconnectPolicy;
use crate::error::CoreError;
use crate::event::{DeviceEvent, EventBus};
use crate::model::{Device, DeviceId};

/// Whatever performs a reconnect attempt (the connection registry).
#[async_trait]
pub(crate) trait ReconnectTarget: Send + Sync {
    async fn reconnect(&self, device: &Device) -> Result<(), CoreError>;
}

/// Owns every pending reconnect timer.
#[derive(Clone)]
pub struct ReconnectScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    policy: ReconnectPolicy,
    bus: EventBus,
    pending: DashMap<DeviceId, PendingReconnect>,
    target: OnceLock<Weak<dyn ReconnectTarget>>,
    next_generation: AtomicU64,
}

struct PendingReconnect {
    cancel: CancellationToken,
    generation: u64,
}

impl ReconnectScheduler {
    pub fn new(policy: ReconnectPolicy, bus: EventBus) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                policy,
                bus,
                pending: DashMap::new(),
                target: OnceLock::new(),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Attach the component that performs attempts. Only the first call wins.
    pub(crate) fn bind(&self, target: Weak<dyn ReconnectTarget>) {
        let _ = self.inner.target.set(target);
    }

    /// Arm a reconnect for `device`.
    ///
    /// Returns `false` (and does nothing) if one is already pending.
    pub fn schedule(&self, device: Arc<Device>) -> bool {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        match self.inner.pending.entry(device.id.clone()) {
            Entry::Occupied(_) => {
                debug!(device_id = %device.id, "reconnect already pending");
                return false;
            }
            Entry::Vacant(slot) => {
                slot.insert(PendingReconnect {
                    cancel: cancel.clone(),
                    generation,
                });
            }
        }

        tokio::spawn(reconnect_loop(
            Arc::clone(&self.inner),
            device,
            cancel,
            generation,
        ));
        true
    }

    /// Drop the pending reconnect for a device, if any. The attempt counter
    /// starts from zero on the next `schedule`.
    pub fn cancel(&self, device_id: &DeviceId) -> bool {
        match self.inner.pending.remove(device_id) {
            Some((_, pending)) => {
                pending.cancel.cancel();
                debug!(device_id = %device_id, "reconnect cancelled");
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let ids: Vec<DeviceId> = self
            .inner
            .pending
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for id in ids {
            self.cancel(&id);
        }
    }

    pub fn is_pending(&self, device_id: &DeviceId) -> bool {
        self.inner.pending.contains_key(device_id)
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending.len()
    }
}

async fn reconnect_loop(
    inner: Arc<SchedulerInner>,
    device: Arc<Device>,
    cancel: CancellationToken,
    generation: u64,
) {
    let mut attempt: u32 = 0;

    loop {
        let delay = inner.policy.delay(attempt);
        attempt = attempt.saturating_add(1);

        info!(device_id = %device.id, attempt, delay_ms = delay.as_millis(), "reconnect scheduled");
        inner.bus.emit(DeviceEvent::ReconnectScheduled {
            device_id: device.id.clone(),
            attempt,
            delay,
        });

        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = tokio::time::sleep(delay) => {}
        }

        let Some(target) = inner.target.get().and_then(Weak::upgrade) else {
            debug!(device_id = %device.id, "reconnect target gone");
            break;
        };

        match target.reconnect(&device).await {
            Ok(()) => {
                info!(device_id = %device.id, attempt, "reconnected");
                break;
            }
            Err(e) => {
                if cancel.is_cancelled() {
                    return;
                }
                warn!(device_id = %device.id, attempt, error = %e, "reconnect attempt failed");
            }
        }
    }

    // Only our own entry: a cancel followed by a fresh schedule installs a
    // newer generation that must survive.
    inner
        .pending
        .remove_if(&device.id, |_, pending| pending.generation == generation);
}
