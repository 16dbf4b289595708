// ── Gateway control seam ──
//
// Everything the core does over the gateway's HTTP surface goes through
// `GatewayApi`, addressed by device. `HttpGateway` is the reqwest-backed
// implementation; all devices share one connection pool.

use async_trait::async_trait;

use paddock_gateway::{
    Error, GatewayClient, GatewayStatus, PtzRequest, Snapshot, StreamTier, TlsMode,
    TransportConfig,
};

use crate::config::{ManagerConfig, TlsVerification};
use crate::model::Device;

/// HTTP control surface of the stream gateway.
#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn status(&self, device: &Device) -> Result<GatewayStatus, Error>;

    async fn start_stream(&self, device: &Device, tier: StreamTier) -> Result<(), Error>;

    async fn stop_stream(&self, device: &Device, tier: StreamTier) -> Result<(), Error>;

    async fn ptz(&self, device: &Device, request: &PtzRequest) -> Result<(), Error>;

    async fn snapshot(&self, device: &Device, tier: StreamTier) -> Result<Snapshot, Error>;

    /// Check that the camera's stream source is producing frames.
    ///
    /// Defaults to pulling a sub-stream still and requiring it to be non-empty.
    async fn probe_stream(&self, device: &Device) -> Result<(), Error> {
        let frame = self.snapshot(device, StreamTier::Sub).await?;
        if frame.is_empty() {
            return Err(Error::Deserialization {
                message: "stream probe returned an empty frame".into(),
                body: String::new(),
            });
        }
        Ok(())
    }
}

/// [`GatewayApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    http: reqwest::Client,
}

impl HttpGateway {
    pub fn new(transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
        })
    }

    /// Build from the manager's timeout and TLS settings.
    pub fn from_config(config: &ManagerConfig) -> Result<Self, Error> {
        Self::new(&transport_config(config))
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    fn client_for(&self, device: &Device) -> Result<GatewayClient, Error> {
        Ok(GatewayClient::with_client(
            self.http.clone(),
            device.gateway_url()?,
        ))
    }
}

#[async_trait]
impl GatewayApi for HttpGateway {
    async fn status(&self, device: &Device) -> Result<GatewayStatus, Error> {
        self.client_for(device)?.status().await
    }

    async fn start_stream(&self, device: &Device, tier: StreamTier) -> Result<(), Error> {
        self.client_for(device)?.start_stream(tier).await
    }

    async fn stop_stream(&self, device: &Device, tier: StreamTier) -> Result<(), Error> {
        self.client_for(device)?.stop_stream(tier).await
    }

    async fn ptz(&self, device: &Device, request: &PtzRequest) -> Result<(), Error> {
        self.client_for(device)?.ptz(request).await
    }

    async fn snapshot(&self, device: &Device, tier: StreamTier) -> Result<Snapshot, Error> {
        self.client_for(device)?.snapshot(tier).await
    }
}

/// HTTP transport settings derived from a [`ManagerConfig`].
pub fn transport_config(config: &ManagerConfig) -> TransportConfig {
    let tls = match &config.tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    };
    TransportConfig {
        tls,
        timeout: config.request_timeout,
    }
}
