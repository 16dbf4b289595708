// ── Camera descriptors ──

use std::fmt;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use url::Url;

use paddock_gateway::StreamTier;

/// Stable identifier of a camera, as assigned by the config source.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Credentials the gateway uses to pull the camera's native stream.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: SecretString,
}

/// A named PTZ position stored on the camera.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtzPreset {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// What a camera can do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub ptz: bool,
    pub presets: Vec<PtzPreset>,
    /// Stream tiers the camera exposes. Empty means "all tiers".
    pub stream_tiers: Vec<StreamTier>,
}

impl Capabilities {
    pub fn has_preset(&self, preset_id: &str) -> bool {
        self.presets.iter().any(|p| p.id == preset_id)
    }

    pub fn supports_tier(&self, tier: StreamTier) -> bool {
        self.stream_tiers.is_empty() || self.stream_tiers.contains(&tier)
    }
}

/// A physical camera behind a gateway. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Device {
    pub id: DeviceId,
    /// Display name for dashboards and logs.
    pub name: Option<String>,
    /// Gateway address for this camera: `host[:port]` or a full `http(s)://` URL.
    pub host: String,
    pub credentials: Option<Credentials>,
    pub capabilities: Capabilities,
    pub enabled: bool,
}

impl Device {
    /// An enabled device with no credentials and default capabilities.
    pub fn new(id: impl Into<DeviceId>, host: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            host: host.into(),
            credentials: None,
            capabilities: Capabilities::default(),
            enabled: true,
        }
    }

    pub fn with_credentials(mut self, username: impl Into<String>, password: SecretString) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password,
        });
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }

    /// Base URL of the gateway's HTTP control surface, always ending in `/`.
    pub fn gateway_url(&self) -> Result<Url, url::ParseError> {
        let raw = if self.host.contains("://") {
            self.host.clone()
        } else {
            format!("http://{}", self.host)
        };

        let mut url = Url::parse(&raw)?;
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        Ok(url)
    }

    /// WebSocket URL of the gateway transport for this camera.
    pub fn socket_url(&self, socket_path: &str) -> Result<Url, url::ParseError> {
        let mut url = self
            .gateway_url()?
            .join(socket_path.trim_start_matches('/'))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        // http <-> ws are both "special" schemes, so this cannot fail.
        let _ = url.set_scheme(scheme);
        Ok(url)
    }
}
