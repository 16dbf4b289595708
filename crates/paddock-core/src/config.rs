// ── Runtime configuration ──
//
// These types describe *how* the device manager talks to gateways: timeouts,
// reconnect policy, health thresholds. They never touch disk -- paddock-config
// (or a test) builds a `ManagerConfig` and hands it in.

use std::time::Duration;

/// TLS verification strategy for HTTPS gateways.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed gateway certs).
    DangerAcceptInvalid,
}

/// Delay strategy between reconnect attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconnectPolicy {
    /// Same delay before every attempt.
    Fixed { delay: Duration },
    /// `min(initial * multiplier^attempt, max)`, optionally with +-25% jitter.
    Exponential {
        initial: Duration,
        max: Duration,
        multiplier: f64,
        jitter: bool,
    },
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::Exponential {
            initial: Duration::from_secs(1),
            max: Duration::from_secs(30),
            multiplier: 2.0,
            jitter: true,
        }
    }
}

impl ReconnectPolicy {
    /// Delay before attempt number `attempt` (0-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::Fixed { delay } => *delay,
            Self::Exponential {
                initial,
                max,
                multiplier,
                jitter,
            } => {
                let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
                let base = initial.as_secs_f64() * multiplier.max(1.0).powi(exponent);
                let capped = base.min(max.as_secs_f64());

                let scaled = if *jitter {
                    // Deterministic spread seeded from the attempt number.
                    let factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
                    capped * factor
                } else {
                    capped
                };

                Duration::from_secs_f64(scaled.max(0.0))
            }
        }
    }
}

/// Health loop tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthConfig {
    /// Time between health cycles.
    pub interval: Duration,
    /// Latency below this is `Excellent`.
    pub good_latency: Duration,
    /// Latency below this (and at or above `good_latency`) is `Good`.
    pub poor_latency: Duration,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            good_latency: Duration::from_millis(100),
            poor_latency: Duration::from_millis(500),
        }
    }
}

/// Configuration for a [`DeviceManager`](crate::DeviceManager).
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Upper bound on the transport handshake.
    pub connect_timeout: Duration,
    /// Upper bound on each gateway HTTP call and on ping round trips.
    pub request_timeout: Duration,
    /// Path of the gateway WebSocket endpoint, relative to the gateway URL.
    pub socket_path: String,
    pub reconnect: ReconnectPolicy,
    pub health: HealthConfig,
    /// Malformed frames tolerated per connection before it is torn down.
    pub protocol_error_threshold: u32,
    pub tls: TlsVerification,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(5),
            socket_path: "ws".into(),
            reconnect: ReconnectPolicy::default(),
            health: HealthConfig::default(),
            protocol_error_threshold: 5,
            tls: TlsVerification::default(),
        }
    }
}

impl ManagerConfig {
    /// Reject settings the components cannot work with.
    pub fn validate(&self) -> Result<(), crate::CoreError> {
        let invalid = |message: &str| {
            Err(crate::CoreError::Config {
                message: message.to_owned(),
            })
        };

        if self.health.interval.is_zero() {
            return invalid("health interval must be greater than zero");
        }
        if self.health.good_latency > self.health.poor_latency {
            return invalid("good latency threshold must not exceed the poor threshold");
        }
        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return invalid("timeouts must be greater than zero");
        }
        Ok(())
    }
}
