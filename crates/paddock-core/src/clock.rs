// ── Wall-clock source ──
//
// Timestamps on records and events come from an injected `Clock` so tests
// running on tokio's paused time see timestamps that advance with it.

use chrono::{DateTime, Utc};
use tokio::time::Instant;

/// Source of wall-clock timestamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Wall-clock time derived from tokio's monotonic clock.
///
/// Anchored to a fixed wall-clock origin at construction, then advanced by
/// `tokio::time::Instant`. Under `tokio::time::pause` it moves only when the
/// runtime's virtual time moves.
#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: DateTime<Utc>,
    started: Instant,
}

impl TokioClock {
    pub fn new(origin: DateTime<Utc>) -> Self {
        Self {
            origin,
            started: Instant::now(),
        }
    }
}

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = chrono::Duration::from_std(self.started.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        self.origin + elapsed
    }
}
