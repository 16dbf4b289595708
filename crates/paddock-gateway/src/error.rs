use thiserror::Error;

/// Top-level error type for the `paddock-gateway` crate.
///
/// Covers every failure mode of the two gateway surfaces: the HTTP control
/// API and the per-camera WebSocket transport. `paddock-core` maps these
/// into its own connection/command taxonomy.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Gateway API ─────────────────────────────────────────────────
    /// The gateway answered with a non-success status code.
    #[error("Gateway returned HTTP {status}: {message}")]
    Gateway { status: u16, message: String },

    // ── WebSocket ───────────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// WebSocket closed (locally or by the gateway) while a request was in flight.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON (de)serialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) | Self::WebSocketClosed { .. } => {
                true
            }
            Self::Gateway { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the gateway could not be reached at all, as opposed
    /// to answering with an error.
    pub fn is_unreachable(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout(),
            Self::Timeout { .. } | Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }
}
