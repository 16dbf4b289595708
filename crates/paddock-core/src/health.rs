// ── Health monitor ──
//
// One periodic loop per device. Every cycle runs three independent checks
// (gateway HTTP status, transport ping, stream probe), folds them into a
// `HealthRecord`, stores it as the latest, and publishes `HealthUpdate`.
// Check failures end up in the record's error list; the loop keeps going.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::config::HealthConfig;
use crate::event::{DeviceEvent, EventBus};
use crate::gateway::GatewayApi;
use crate::model::{Device, DeviceId, HealthRecord, StreamQuality};
use crate::registry::ConnectionRegistry;

/// Runs and tracks per-device health loops.
#[derive(Clone)]
pub struct HealthMonitor {
    inner: Arc<MonitorInner>,
}

struct MonitorInner {
    registry: ConnectionRegistry,
    gateway: Arc<dyn GatewayApi>,
    bus: EventBus,
    clock: Arc<dyn Clock>,
    config: HealthConfig,
    request_timeout: Duration,
    loops: DashMap<DeviceId, RunningLoop>,
    latest: DashMap<DeviceId, HealthRecord>,
    next_generation: AtomicU64,
}

struct RunningLoop {
    cancel: CancellationToken,
    generation: u64,
}

/// Running counts for the uptime figure.
#[derive(Debug, Default)]
struct Uptime {
    cycles: u32,
    reachable: u32,
}

impl Uptime {
    fn record(&mut self, reachable: bool) -> f64 {
        self.cycles = self.cycles.saturating_add(1);
        if reachable {
            self.reachable = self.reachable.saturating_add(1);
        }
        f64::from(self.reachable) * 100.0 / f64::from(self.cycles)
    }
}

struct CheckOutcome {
    gateway_reachable: bool,
    transport_connected: bool,
    latency: Duration,
    errors: Vec<String>,
}

impl HealthMonitor {
    pub(crate) fn new(
        registry: ConnectionRegistry,
        gateway: Arc<dyn GatewayApi>,
        bus: EventBus,
        clock: Arc<dyn Clock>,
        config: HealthConfig,
        request_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(MonitorInner {
                registry,
                gateway,
                bus,
                clock,
                config,
                request_timeout,
                loops: DashMap::new(),
                latest: DashMap::new(),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Start (or restart) the loop for `device`. The first record arrives
    /// one full `interval` from now.
    pub fn start(&self, device: Arc<Device>, interval: Duration) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let cancel = CancellationToken::new();

        let previous = self.inner.loops.insert(
            device.id.clone(),
            RunningLoop {
                cancel: cancel.clone(),
                generation,
            },
        );
        if let Some(previous) = previous {
            previous.cancel.cancel();
            debug!(device_id = %device.id, "health loop restarted");
        } else {
            info!(device_id = %device.id, interval_secs = interval.as_secs(), "health loop started");
        }

        tokio::spawn(health_loop(
            Arc::clone(&self.inner),
            device,
            interval,
            cancel,
            generation,
        ));
    }

    /// Start with the configured interval.
    pub fn start_default(&self, device: Arc<Device>) {
        self.start(device, self.inner.config.interval);
    }

    pub fn stop(&self, device_id: &DeviceId) -> bool {
        match self.inner.loops.remove(device_id) {
            Some((_, running)) => {
                running.cancel.cancel();
                debug!(device_id = %device_id, "health loop stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let ids: Vec<DeviceId> = self
            .inner
            .loops
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        for id in ids {
            self.stop(&id);
        }
    }

    pub fn is_running(&self, device_id: &DeviceId) -> bool {
        self.inner.loops.contains_key(device_id)
    }

    /// The most recent record for a device.
    pub fn latest(&self, device_id: &DeviceId) -> Option<HealthRecord> {
        self.inner.latest.get(device_id).map(|r| r.clone())
    }

    /// Run one cycle's checks right now without publishing anything.
    pub async fn check_now(&self, device: &Device) -> HealthRecord {
        let outcome = self.inner.run_checks(device).await;
        let reachable = outcome.gateway_reachable || outcome.transport_connected;
        let uptime = if reachable { 100.0 } else { 0.0 };
        self.inner.build_record(device, outcome, uptime)
    }
}

impl MonitorInner {
    async fn run_checks(&self, device: &Device) -> CheckOutcome {
        let mut errors = Vec::new();
        let mut latencies = Vec::new();

        // Gateway control surface.
        let started = Instant::now();
        let gateway_reachable =
            match tokio::time::timeout(self.request_timeout, self.gateway.status(device)).await {
                Ok(Ok(status)) => {
                    latencies.push(started.elapsed());
                    if !status.is_running() {
                        errors.push(format!("gateway: reports status '{}'", status.status));
                    }
                    true
                }
                Ok(Err(e)) => {
                    errors.push(format!("gateway: {e}"));
                    false
                }
                Err(_) => {
                    errors.push("gateway: status request timed out".into());
                    false
                }
            };

        // Transport liveness.
        let status = self.registry.status(&device.id);
        let transport_connected = if status.is_connected() {
            match self.registry.ping(&device.id).await {
                Ok(rtt) => {
                    latencies.push(rtt);
                    true
                }
                Err(e) => {
                    errors.push(format!("transport: {e}"));
                    false
                }
            }
        } else {
            errors.push(format!("transport: {status}"));
            false
        };

        // Stream source.
        if gateway_reachable {
            match tokio::time::timeout(self.request_timeout, self.gateway.probe_stream(device)).await
            {
                Ok(Ok(())) => {}
                Ok(Err(e)) => errors.push(format!("stream probe: {e}")),
                Err(_) => errors.push("stream probe: timed out".into()),
            }
        } else {
            errors.push("stream probe: skipped, gateway unreachable".into());
        }

        CheckOutcome {
            gateway_reachable,
            transport_connected,
            latency: latencies.into_iter().min().unwrap_or(Duration::ZERO),
            errors,
        }
    }

    fn build_record(&self, device: &Device, outcome: CheckOutcome, uptime_percent: f64) -> HealthRecord {
        let reachable = outcome.gateway_reachable || outcome.transport_connected;
        HealthRecord {
            device_id: device.id.clone(),
            reachable,
            transport_connected: outcome.transport_connected,
            gateway_reachable: outcome.gateway_reachable,
            latency_ms: u64::try_from(outcome.latency.as_millis()).unwrap_or(u64::MAX),
            stream_quality: StreamQuality::classify(
                reachable,
                outcome.latency,
                self.config.good_latency,
                self.config.poor_latency,
            ),
            uptime_percent,
            errors: outcome.errors,
            timestamp: self.clock.now(),
        }
    }
}

async fn health_loop(
    inner: Arc<MonitorInner>,
    device: Arc<Device>,
    interval: Duration,
    cancel: CancellationToken,
    generation: u64,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut uptime = Uptime::default();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            outcome = inner.run_checks(&device) => outcome,
        };

        let reachable = outcome.gateway_reachable || outcome.transport_connected;
        let record = inner.build_record(&device, outcome, uptime.record(reachable));

        debug!(
            device_id = %device.id,
            reachable,
            latency_ms = record.latency_ms,
            quality = %record.stream_quality,
            errors = record.errors.len(),
            "health cycle"
        );

        inner.latest.insert(device.id.clone(), record.clone());
        inner.bus.emit(DeviceEvent::HealthUpdate(record));
    }

    inner
        .loops
        .remove_if(&device.id, |_, running| running.generation == generation);
}
