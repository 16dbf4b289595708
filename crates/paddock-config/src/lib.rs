//! Configuration for paddock tools.
//!
//! A TOML file (platform config dir by default) layered with `PADDOCK_`
//! environment variables, translated into a `paddock_core::ManagerConfig`
//! plus the list of camera descriptors. Nested keys use a double
//! underscore in the environment: `PADDOCK_HEALTH__INTERVAL=10s`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use paddock_core::{
    Capabilities, Device, HealthConfig, ManagerConfig, PtzPreset, ReconnectPolicy, StreamTier,
    TlsVerification,
};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("camera '{camera}' reads its password from ${var}, which is not set")]
    MissingSecret { camera: String, var: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

fn invalid(field: impl Into<String>, reason: impl Into<String>) -> ConfigError {
    ConfigError::Validation {
        field: field.into(),
        reason: reason.into(),
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level configuration file.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub gateway: GatewaySection,

    #[serde(default)]
    pub reconnect: ReconnectSection,

    #[serde(default)]
    pub health: HealthSection,

    #[serde(default)]
    pub cameras: Vec<CameraEntry>,
}

/// `[gateway]`: how to reach the stream-conversion gateway.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GatewaySection {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout: String,

    /// WebSocket path relative to each camera's gateway URL.
    #[serde(default = "default_socket_path")]
    pub socket_path: String,

    /// Malformed frames tolerated before a connection is dropped.
    #[serde(default = "default_protocol_errors")]
    pub protocol_error_threshold: u32,

    /// Accept self-signed gateway certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Path to a custom CA certificate.
    pub ca_cert: Option<PathBuf>,
}

impl Default for GatewaySection {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_request_timeout(),
            socket_path: default_socket_path(),
            protocol_error_threshold: default_protocol_errors(),
            insecure: false,
            ca_cert: None,
        }
    }
}

fn default_connect_timeout() -> String {
    "10s".into()
}
fn default_request_timeout() -> String {
    "5s".into()
}
fn default_socket_path() -> String {
    "ws".into()
}
fn default_protocol_errors() -> u32 {
    5
}

/// `[reconnect]`: backoff between connection attempts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconnectSection {
    /// `"exponential"` or `"fixed"`.
    #[serde(default = "default_strategy")]
    pub strategy: String,

    /// Delay for the fixed strategy.
    #[serde(default = "default_fixed_delay")]
    pub delay: String,

    #[serde(default = "default_initial_delay")]
    pub initial: String,

    #[serde(default = "default_max_delay")]
    pub max: String,

    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for ReconnectSection {
    fn default() -> Self {
        Self {
            strategy: default_strategy(),
            delay: default_fixed_delay(),
            initial: default_initial_delay(),
            max: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

fn default_strategy() -> String {
    "exponential".into()
}
fn default_fixed_delay() -> String {
    "5s".into()
}
fn default_initial_delay() -> String {
    "1s".into()
}
fn default_max_delay() -> String {
    "30s".into()
}
fn default_multiplier() -> f64 {
    2.0
}
fn default_true() -> bool {
    true
}

/// `[health]`: diagnostics cadence and quality thresholds.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HealthSection {
    #[serde(default = "default_interval")]
    pub interval: String,

    /// Latency below this is "excellent".
    #[serde(default = "default_good_latency")]
    pub good_latency: String,

    /// Latency below this is "good"; anything slower is "poor".
    #[serde(default = "default_poor_latency")]
    pub poor_latency: String,
}

impl Default for HealthSection {
    fn default() -> Self {
        Self {
            interval: default_interval(),
            good_latency: default_good_latency(),
            poor_latency: default_poor_latency(),
        }
    }
}

fn default_interval() -> String {
    "30s".into()
}
fn default_good_latency() -> String {
    "100ms".into()
}
fn default_poor_latency() -> String {
    "500ms".into()
}

/// One `[[cameras]]` entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CameraEntry {
    pub id: String,

    /// Display name.
    pub name: Option<String>,

    /// Gateway address for this camera (`host:port` or URL).
    pub host: String,

    pub username: Option<String>,

    /// Password (plaintext -- prefer `password_env`).
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    #[serde(default)]
    pub ptz: bool,

    #[serde(default)]
    pub presets: Vec<PresetEntry>,

    /// Stream tiers offered ("main", "sub"). Empty means both.
    #[serde(default)]
    pub qualities: Vec<String>,

    #[serde(default = "default_true")]
    pub enabled: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PresetEntry {
    pub id: String,
    pub name: Option<String>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("net", "paddock", "paddock").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("paddock");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load from the default path plus environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from `path` plus environment. A missing file yields defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("PADDOCK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Serialize config to TOML and write it to `path`.
pub fn save_config(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, cfg.to_toml()?)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_duration(field: &str, raw: &str) -> Result<Duration, ConfigError> {
    humantime::parse_duration(raw.trim()).map_err(|e| invalid(field, format!("'{raw}': {e}")))
}

impl Config {
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A copy safe to print: plaintext passwords are masked.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        for camera in &mut copy.cameras {
            if camera.password.is_some() {
                camera.password = Some("********".into());
            }
        }
        copy
    }

    pub fn camera(&self, id: &str) -> Option<&CameraEntry> {
        self.cameras.iter().find(|c| c.id == id)
    }

    /// Runtime settings for `paddock_core::DeviceManager`.
    pub fn manager_config(&self) -> Result<ManagerConfig, ConfigError> {
        let gateway = &self.gateway;

        let tls = if gateway.insecure {
            TlsVerification::DangerAcceptInvalid
        } else if let Some(ref ca_path) = gateway.ca_cert {
            TlsVerification::CustomCa(ca_path.clone())
        } else {
            TlsVerification::SystemDefaults
        };

        let config = ManagerConfig {
            connect_timeout: parse_duration("gateway.connect_timeout", &gateway.connect_timeout)?,
            request_timeout: parse_duration("gateway.request_timeout", &gateway.request_timeout)?,
            socket_path: gateway.socket_path.clone(),
            reconnect: self.reconnect.policy()?,
            health: HealthConfig {
                interval: parse_duration("health.interval", &self.health.interval)?,
                good_latency: parse_duration("health.good_latency", &self.health.good_latency)?,
                poor_latency: parse_duration("health.poor_latency", &self.health.poor_latency)?,
            },
            protocol_error_threshold: gateway.protocol_error_threshold,
            tls,
        };

        config
            .validate()
            .map_err(|e| invalid("config", e.to_string()))?;
        Ok(config)
    }

    /// Every configured camera as a device descriptor, disabled ones
    /// included. Ids must be unique.
    pub fn devices(&self) -> Result<Vec<Device>, ConfigError> {
        let mut seen = HashSet::new();
        self.cameras
            .iter()
            .map(|entry| {
                if !seen.insert(entry.id.as_str()) {
                    return Err(invalid(
                        "cameras.id",
                        format!("duplicate camera id '{}'", entry.id),
                    ));
                }
                entry.to_device()
            })
            .collect()
    }
}

impl ReconnectSection {
    pub fn policy(&self) -> Result<ReconnectPolicy, ConfigError> {
        match self.strategy.as_str() {
            "fixed" => Ok(ReconnectPolicy::Fixed {
                delay: parse_duration("reconnect.delay", &self.delay)?,
            }),
            "exponential" => {
                if self.multiplier < 1.0 {
                    return Err(invalid("reconnect.multiplier", "must be at least 1.0"));
                }
                Ok(ReconnectPolicy::Exponential {
                    initial: parse_duration("reconnect.initial", &self.initial)?,
                    max: parse_duration("reconnect.max", &self.max)?,
                    multiplier: self.multiplier,
                    jitter: self.jitter,
                })
            }
            other => Err(invalid(
                "reconnect.strategy",
                format!("expected 'exponential' or 'fixed', got '{other}'"),
            )),
        }
    }
}

impl CameraEntry {
    /// Resolve the password: `password_env` first, then plaintext.
    pub fn resolve_password(&self) -> Result<Option<SecretString>, ConfigError> {
        if let Some(ref var) = self.password_env {
            return match std::env::var(var) {
                Ok(value) => Ok(Some(SecretString::from(value))),
                Err(_) => Err(ConfigError::MissingSecret {
                    camera: self.id.clone(),
                    var: var.clone(),
                }),
            };
        }
        Ok(self.password.clone().map(SecretString::from))
    }

    pub fn to_device(&self) -> Result<Device, ConfigError> {
        let field = |name: &str| format!("cameras.{}.{name}", self.id);

        if self.id.trim().is_empty() {
            return Err(invalid("cameras.id", "must not be empty"));
        }
        if self.host.trim().is_empty() {
            return Err(invalid(field("host"), "must not be empty"));
        }

        let stream_tiers = self
            .qualities
            .iter()
            .map(|q| {
                StreamTier::from_str(q)
                    .map_err(|_| invalid(field("qualities"), format!("unknown quality '{q}'")))
            })
            .collect::<Result<Vec<_>, _>>()?;

        if !self.ptz && !self.presets.is_empty() {
            return Err(invalid(field("presets"), "presets require ptz = true"));
        }

        let mut device = Device::new(self.id.as_str(), self.host.trim()).with_capabilities(
            Capabilities {
                ptz: self.ptz,
                presets: self
                    .presets
                    .iter()
                    .map(|p| PtzPreset {
                        id: p.id.clone(),
                        name: p.name.clone(),
                    })
                    .collect(),
                stream_tiers,
            },
        );
        device.name.clone_from(&self.name);
        device.enabled = self.enabled;

        if let Some(password) = self.resolve_password()? {
            let username = self
                .username
                .clone()
                .ok_or_else(|| invalid(field("username"), "required when a password is set"))?;
            device = device.with_credentials(username, password);
        }

        device
            .gateway_url()
            .map_err(|e| invalid(field("host"), format!("'{}': {e}", self.host)))?;

        Ok(device)
    }
}
