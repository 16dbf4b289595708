//! One-shot gateway probe across every configured camera.

use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde::Serialize;
use tabled::Tabled;

use paddock_core::{Device, GatewayApi, HttpGateway};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output::{self, Tone};

use super::util;

#[derive(Debug, Serialize)]
struct StatusEntry {
    camera: String,
    name: Option<String>,
    host: String,
    enabled: bool,
    gateway: GatewayState,
    latency_ms: Option<u64>,
    detail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum GatewayState {
    Running,
    Degraded,
    Unreachable,
    Failed,
    Disabled,
}

impl GatewayState {
    fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Degraded => "degraded",
            Self::Unreachable => "unreachable",
            Self::Failed => "error",
            Self::Disabled => "disabled",
        }
    }

    fn tone(self) -> Tone {
        match self {
            Self::Running => Tone::Good,
            Self::Degraded => Tone::Warn,
            Self::Unreachable | Self::Failed => Tone::Bad,
            Self::Disabled => Tone::Muted,
        }
    }
}

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Camera")]
    camera: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Gateway")]
    gateway: String,
    #[tabled(rename = "Latency")]
    latency: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

fn row(entry: &StatusEntry, color: bool) -> StatusRow {
    StatusRow {
        camera: entry.camera.clone(),
        name: entry.name.clone().unwrap_or_default(),
        host: entry.host.clone(),
        gateway: output::paint(entry.gateway.label(), entry.gateway.tone(), color),
        latency: entry
            .latency_ms
            .map_or_else(|| "-".into(), |ms| format!("{ms}ms")),
        detail: entry.detail.clone().unwrap_or_default(),
    }
}

// ── Probe ───────────────────────────────────────────────────────────

async fn probe(gateway: &HttpGateway, device: &Device, timeout: Duration) -> StatusEntry {
    let mut entry = StatusEntry {
        camera: device.id.to_string(),
        name: device.name.clone(),
        host: device.host.clone(),
        enabled: device.enabled,
        gateway: GatewayState::Disabled,
        latency_ms: None,
        detail: None,
    };
    if !device.enabled {
        return entry;
    }

    let started = Instant::now();
    match tokio::time::timeout(timeout, gateway.status(device)).await {
        Ok(Ok(status)) => {
            let elapsed = started.elapsed().as_millis();
            entry.latency_ms = Some(u64::try_from(elapsed).unwrap_or(u64::MAX));
            if status.is_running() {
                entry.gateway = GatewayState::Running;
            } else {
                entry.gateway = GatewayState::Degraded;
                entry.detail = Some(format!("gateway reports '{}'", status.status));
            }
        }
        Ok(Err(e)) => {
            entry.gateway = if e.is_unreachable() {
                GatewayState::Unreachable
            } else {
                GatewayState::Failed
            };
            entry.detail = Some(e.to_string());
        }
        Err(_) => {
            entry.gateway = GatewayState::Unreachable;
            entry.detail = Some(format!("no answer within {}ms", timeout.as_millis()));
        }
    }
    tracing::debug!(camera = %entry.camera, state = entry.gateway.label(), "probed gateway");
    entry
}

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = util::load(global)?;
    let config = util::manager_config(&cfg, global)?;
    let devices = cfg.devices()?;
    let gateway = HttpGateway::from_config(&config).map_err(|e| CliError::Validation {
        field: "gateway".into(),
        reason: e.to_string(),
    })?;

    let entries = join_all(
        devices
            .iter()
            .map(|device| probe(&gateway, device, config.request_timeout)),
    )
    .await;

    let color = output::should_color(global.color);
    let out = output::render_list(
        global.format,
        &entries,
        |e| row(e, color),
        |e| format!("{}\t{}", e.camera, e.gateway.label()),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}
