// ── Health diagnostics ──

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;

use super::device::DeviceId;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StreamQuality {
    Excellent,
    Good,
    Poor,
    Unavailable,
}

impl StreamQuality {
    /// Classify a device from reachability and round-trip latency.
    ///
    /// `good_below` and `poor_below` are the exclusive upper bounds for the
    /// `Excellent` and `Good` bands.
    pub fn classify(
        reachable: bool,
        latency: Duration,
        good_below: Duration,
        poor_below: Duration,
    ) -> Self {
        if !reachable {
            Self::Unavailable
        } else if latency < good_below {
            Self::Excellent
        } else if latency < poor_below {
            Self::Good
        } else {
            Self::Poor
        }
    }
}

/// One health cycle's findings for a device. Replaced wholesale every cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub device_id: DeviceId,
    pub reachable: bool,
    pub transport_connected: bool,
    pub gateway_reachable: bool,
    pub latency_ms: u64,
    pub stream_quality: StreamQuality,
    /// Share of cycles so far in which the device was reachable, 0-100.
    pub uptime_percent: f64,
    pub errors: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const GOOD: Duration = Duration::from_millis(100);
    const POOR: Duration = Duration::from_millis(500);

    #[test]
    fn classification_bands() {
        let ms = Duration::from_millis;
        assert_eq!(StreamQuality::classify(true, ms(0), GOOD, POOR), StreamQuality::Excellent);
        assert_eq!(StreamQuality::classify(true, ms(99), GOOD, POOR), StreamQuality::Excellent);
        assert_eq!(StreamQuality::classify(true, ms(100), GOOD, POOR), StreamQuality::Good);
        assert_eq!(StreamQuality::classify(true, ms(499), GOOD, POOR), StreamQuality::Good);
        assert_eq!(StreamQuality::classify(true, ms(500), GOOD, POOR), StreamQuality::Poor);
        assert_eq!(StreamQuality::classify(false, ms(1), GOOD, POOR), StreamQuality::Unavailable);
    }

    #[test]
    fn classification_follows_configured_cutoffs() {
        let ms = Duration::from_millis;
        let (good, poor) = (ms(40), ms(250));
        let cases = [
            (true, 0, StreamQuality::Excellent),
            (true, 39, StreamQuality::Excellent),
            (true, 40, StreamQuality::Good),
            (true, 120, StreamQuality::Good),
            (true, 249, StreamQuality::Good),
            (true, 250, StreamQuality::Poor),
            (true, 9_000, StreamQuality::Poor),
            (false, 0, StreamQuality::Unavailable),
            (false, 249, StreamQuality::Unavailable),
        ];
        for (reachable, latency, expected) in cases {
            assert_eq!(
                StreamQuality::classify(reachable, ms(latency), good, poor),
                expected,
                "reachable={reachable} latency={latency}ms"
            );
        }
    }
}
