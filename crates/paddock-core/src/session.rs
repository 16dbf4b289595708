// ── Stream session table ──
//
// Shared between the registry's reader tasks (which learn about stream state
// from inbound frames) and the dispatcher (which creates and removes
// sessions). Every status change is published as `StreamStatusChange`.

use std::sync::Arc;

use dashmap::DashMap;

use crate::clock::Clock;
use crate::event::{DeviceEvent, EventBus};
use crate::model::{DeviceId, StreamSession, StreamStatus, StreamTier};

type SessionKey = (DeviceId, StreamTier);

pub(crate) struct SessionTable {
    sessions: DashMap<SessionKey, StreamSession>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
}

impl SessionTable {
    pub(crate) fn new(bus: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            sessions: DashMap::new(),
            bus,
            clock,
        }
    }

    /// Create (or reset) a session in `Connecting`.
    pub(crate) fn begin(&self, device_id: &DeviceId, tier: StreamTier) -> StreamSession {
        let session = StreamSession {
            device_id: device_id.clone(),
            tier,
            status: StreamStatus::Connecting,
            updated_at: self.clock.now(),
        };
        self.sessions
            .insert((device_id.clone(), tier), session.clone());
        self.publish(device_id, tier, StreamStatus::Connecting);
        session
    }

    /// Update an existing session. Unknown sessions are left alone.
    /// Returns `true` if the status actually changed.
    pub(crate) fn set_status(
        &self,
        device_id: &DeviceId,
        tier: StreamTier,
        status: StreamStatus,
    ) -> bool {
        let changed = {
            let Some(mut session) = self.sessions.get_mut(&(device_id.clone(), tier)) else {
                return false;
            };
            session.updated_at = self.clock.now();
            if session.status == status {
                false
            } else {
                session.status = status;
                true
            }
        };

        if changed {
            self.publish(device_id, tier, status);
        }
        changed
    }

    /// Remove a session. Publishes `Disconnected` if one existed.
    pub(crate) fn end(&self, device_id: &DeviceId, tier: StreamTier) -> Option<StreamSession> {
        let (_, session) = self.sessions.remove(&(device_id.clone(), tier))?;
        self.publish(device_id, tier, StreamStatus::Disconnected);
        Some(session)
    }

    /// Mark every session of a device `Disconnected` (transport lost).
    pub(crate) fn mark_disconnected(&self, device_id: &DeviceId) {
        for tier in self.tiers_of(device_id) {
            self.set_status(device_id, tier, StreamStatus::Disconnected);
        }
    }

    /// Drop every session of a device.
    pub(crate) fn remove_device(&self, device_id: &DeviceId) {
        for tier in self.tiers_of(device_id) {
            self.end(device_id, tier);
        }
    }

    pub(crate) fn get(&self, device_id: &DeviceId, tier: StreamTier) -> Option<StreamSession> {
        self.sessions
            .get(&(device_id.clone(), tier))
            .map(|s| s.clone())
    }

    pub(crate) fn for_device(&self, device_id: &DeviceId) -> Vec<StreamSession> {
        let mut sessions: Vec<StreamSession> = self
            .sessions
            .iter()
            .filter(|entry| &entry.key().0 == device_id)
            .map(|entry| entry.value().clone())
            .collect();
        sessions.sort_by_key(|s| s.tier.to_string());
        sessions
    }

    fn tiers_of(&self, device_id: &DeviceId) -> Vec<StreamTier> {
        self.sessions
            .iter()
            .filter(|entry| &entry.key().0 == device_id)
            .map(|entry| entry.key().1)
            .collect()
    }

    fn publish(&self, device_id: &DeviceId, tier: StreamTier, status: StreamStatus) {
        self.bus.emit(DeviceEvent::StreamStatusChange {
            device_id: device_id.clone(),
            tier,
            status,
        });
    }
}
