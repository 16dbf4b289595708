//! `paddock monitor`: connect cameras and stream events until Ctrl-C.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{info, warn};

use paddock_core::{ConnectionStatus, DeviceEvent, DeviceManager, StreamQuality, StreamStatus};

use crate::cli::{GlobalOpts, MonitorArgs, OutputFormat};
use crate::error::CliError;
use crate::output::{self, Tone};

use super::util;

fn connection_tone(status: ConnectionStatus) -> Tone {
    match status {
        ConnectionStatus::Connected => Tone::Good,
        ConnectionStatus::Connecting => Tone::Warn,
        ConnectionStatus::Disconnected => Tone::Muted,
        ConnectionStatus::Error => Tone::Bad,
    }
}

fn stream_tone(status: StreamStatus) -> Tone {
    match status {
        StreamStatus::Streaming => Tone::Good,
        StreamStatus::Connecting => Tone::Warn,
        StreamStatus::Disconnected => Tone::Muted,
        StreamStatus::Error => Tone::Bad,
    }
}

fn quality_tone(quality: StreamQuality) -> Tone {
    match quality {
        StreamQuality::Excellent | StreamQuality::Good => Tone::Good,
        StreamQuality::Poor => Tone::Warn,
        StreamQuality::Unavailable => Tone::Bad,
    }
}

/// One human-readable line per event.
fn describe(event: &DeviceEvent, color: bool) -> String {
    let body = match event {
        DeviceEvent::DevicesChanged { status, .. } => {
            output::paint(&status.to_string(), connection_tone(*status), color)
        }
        DeviceEvent::StreamStatusChange { tier, status, .. } => format!(
            "{tier} stream {}",
            output::paint(&status.to_string(), stream_tone(*status), color)
        ),
        DeviceEvent::HealthUpdate(record) => {
            let mut line = format!(
                "{} latency={}ms uptime={:.1}%",
                output::paint(
                    &record.stream_quality.to_string(),
                    quality_tone(record.stream_quality),
                    color
                ),
                record.latency_ms,
                record.uptime_percent,
            );
            if !record.errors.is_empty() {
                line.push_str(&format!(" errors=[{}]", record.errors.join("; ")));
            }
            line
        }
        DeviceEvent::Error { message, .. } => output::paint(message, Tone::Bad, color),
        DeviceEvent::ReconnectScheduled { attempt, delay, .. } => format!(
            "reconnect #{attempt} in {}",
            output::paint(&format!("{:.1}s", delay.as_secs_f64()), Tone::Warn, color)
        ),
    };

    let device = event.device_id().map_or("-", |id| id.as_str());
    format!(
        "{} {:<20} {:<16} {body}",
        Utc::now().format("%H:%M:%S"),
        event.kind(),
        device
    )
}

fn render(event: &DeviceEvent, format: OutputFormat, color: bool) -> Result<String, CliError> {
    match format {
        OutputFormat::Table | OutputFormat::Plain => Ok(describe(event, color)),
        OutputFormat::Json => output::render_json(event, false),
        OutputFormat::JsonCompact => output::render_json(event, true),
    }
}

pub async fn handle(args: MonitorArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load(global)?;
    let mut devices = cfg.devices()?;
    if !args.cameras.is_empty() {
        if let Some(missing) = args.cameras.iter().find(|c| cfg.camera(c).is_none()) {
            return Err(CliError::NotFound {
                camera: missing.clone(),
            });
        }
        devices.retain(|d| args.cameras.iter().any(|c| c == d.id.as_str()));
    }
    if !devices.iter().any(|d| d.enabled) {
        return Err(CliError::Validation {
            field: "cameras".into(),
            reason: "no enabled cameras to monitor".into(),
        });
    }

    let manager = DeviceManager::new(util::manager_config(&cfg, global)?)?;
    let mut events = manager.subscribe();
    let color = output::should_color(global.color);

    for (id, outcome) in manager.initialize_all(devices).await {
        match outcome {
            Ok(_) => info!(device_id = %id, "connected"),
            Err(e) => {
                warn!(device_id = %id, error = %e, "initial connect failed, retrying in background");
            }
        }
    }

    let result = pump(&manager, &mut events, &args, global, color).await;
    manager.shutdown().await;
    result
}

async fn pump(
    manager: &DeviceManager,
    events: &mut broadcast::Receiver<Arc<DeviceEvent>>,
    args: &MonitorArgs,
    global: &GlobalOpts,
    color: bool,
) -> Result<(), CliError> {
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            biased;
            signal = &mut ctrl_c => {
                signal?;
                info!(cameras = manager.connections().len(), "interrupted, shutting down");
                return Ok(());
            }
            received = events.recv() => match received {
                Ok(event) => {
                    if args.no_health && matches!(event.as_ref(), DeviceEvent::HealthUpdate(_)) {
                        continue;
                    }
                    output::print_output(&render(&event, global.format, color)?, global.quiet);
                }
                Err(RecvError::Lagged(skipped)) => warn!(skipped, "event output fell behind"),
                Err(RecvError::Closed) => return Ok(()),
            }
        }
    }
}
