// Gateway HTTP client
//
// Wraps `reqwest::Client` with gateway URL construction and status-code
// mapping. One `GatewayClient` addresses one gateway base URL; clients for
// many cameras can share a single `reqwest::Client` (and its pool).

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::protocol::{GatewayStatus, PtzRequest, StreamRequest, StreamTier};
use crate::snapshot::Snapshot;
use crate::transport::TransportConfig;

/// Raw HTTP client for the gateway's control surface.
#[derive(Debug, Clone)]
pub struct GatewayClient {
    http: reqwest::Client,
    base_url: Url,
}

impl GatewayClient {
    /// Create a new client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self { http, base_url })
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// Parse `base_url` and build a client around a shared `reqwest::Client`.
    pub fn from_reqwest(base_url: &str, http: reqwest::Client) -> Result<Self, Error> {
        Ok(Self::with_client(http, Url::parse(base_url)?))
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /status` -- availability probe.
    pub async fn status(&self) -> Result<GatewayStatus, Error> {
        let url = self.url("status")?;
        debug!("GET {}", url);
        let resp = self.http.get(url).send().await?;
        parse_json(check_status(resp).await?).await
    }

    /// `POST /stream/start`
    pub async fn start_stream(&self, quality: StreamTier) -> Result<(), Error> {
        self.post_empty("stream/start", &StreamRequest { quality })
            .await
    }

    /// `POST /stream/stop`
    pub async fn stop_stream(&self, quality: StreamTier) -> Result<(), Error> {
        self.post_empty("stream/stop", &StreamRequest { quality })
            .await
    }

    /// `POST /ptz`
    pub async fn ptz(&self, request: &PtzRequest) -> Result<(), Error> {
        self.post_empty("ptz", request).await
    }

    /// `GET /snapshot?quality=...` -- a single still frame.
    pub async fn snapshot(&self, quality: StreamTier) -> Result<Snapshot, Error> {
        let mut url = self.url("snapshot")?;
        url.query_pairs_mut()
            .append_pair("quality", &quality.to_string());
        debug!("GET {}", url);

        let resp = check_status(self.http.get(url).send().await?).await?;
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let data = resp.bytes().await?;

        Ok(Snapshot::new(data, content_type))
    }

    // ── Request helpers ──────────────────────────────────────────────

    fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn post_empty(&self, path: &str, body: &impl Serialize) -> Result<(), Error> {
        let url = self.url(path)?;
        debug!("POST {}", url);
        let resp = self.http.post(url).json(body).send().await?;
        check_status(resp).await?;
        Ok(())
    }
}

/// Map non-2xx responses to [`Error::Gateway`], keeping the body as the message.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, Error> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let message = if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_owned()
    } else {
        body
    };

    Err(Error::Gateway {
        status: status.as_u16(),
        message,
    })
}

async fn parse_json<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, Error> {
    let body = resp.text().await?;
    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}
