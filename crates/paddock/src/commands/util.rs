//! Shared helpers for command handlers.

use std::path::PathBuf;

use paddock_config::Config;
use paddock_core::{Device, DeviceManager, ManagerConfig, StreamTier, TlsVerification};

use crate::cli::{GlobalOpts, QualityArg};
use crate::error::CliError;

/// `--config` if given, otherwise the platform default.
pub fn config_file(global: &GlobalOpts) -> PathBuf {
    global
        .config
        .clone()
        .unwrap_or_else(paddock_config::config_path)
}

pub fn load(global: &GlobalOpts) -> Result<Config, CliError> {
    let path = config_file(global);
    tracing::debug!(path = %path.display(), "loading config");
    Ok(paddock_config::load_config_from(&path)?)
}

/// Manager settings with CLI overrides applied.
pub fn manager_config(cfg: &Config, global: &GlobalOpts) -> Result<ManagerConfig, CliError> {
    let mut config = cfg.manager_config()?;
    if global.insecure {
        config.tls = TlsVerification::DangerAcceptInvalid;
    }
    Ok(config)
}

/// Resolve a camera id to its device descriptor.
pub fn find_camera(cfg: &Config, camera: &str) -> Result<Device, CliError> {
    let entry = cfg.camera(camera).ok_or_else(|| CliError::NotFound {
        camera: camera.into(),
    })?;
    Ok(entry.to_device()?)
}

/// Build a manager and connect the single camera a one-shot command targets.
pub async fn connect_one(
    global: &GlobalOpts,
    camera: &str,
) -> Result<(DeviceManager, Device), CliError> {
    let cfg = load(global)?;
    let device = find_camera(&cfg, camera)?;
    let manager = DeviceManager::new(manager_config(&cfg, global)?)?;

    if let Err(e) = manager.initialize(device.clone()).await {
        manager.shutdown().await;
        return Err(e.into());
    }
    Ok((manager, device))
}

pub fn tier(quality: QualityArg) -> StreamTier {
    match quality {
        QualityArg::Main => StreamTier::Main,
        QualityArg::Sub => StreamTier::Sub,
    }
}
