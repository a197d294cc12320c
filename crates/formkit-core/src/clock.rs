#![forbid(unsafe_code)]

//! Wall-clock sources for id seeding and export timestamps.
//!
//! Production code uses [`SystemClock`]. Tests and replay harnesses use
//! [`ManualClock`], whose value is shared through an `Arc<AtomicU64>` so a
//! test can advance time while the editor holds the clock.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Fallback rendering when a timestamp cannot be formatted.
pub const UNIX_EPOCH_RFC3339: &str = "1970-01-01T00:00:00Z";

/// Source of Unix time in milliseconds.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Milliseconds since the Unix epoch.
    fn now_millis(&self) -> u64;
}

/// Clock backed by [`SystemTime`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX))
            .unwrap_or(0)
    }
}

/// Deterministic clock for tests.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    millis: Arc<AtomicU64>,
}

impl ManualClock {
    /// Start the clock at `millis`.
    #[must_use]
    pub fn new(millis: u64) -> Self {
        Self {
            millis: Arc::new(AtomicU64::new(millis)),
        }
    }

    /// Set the absolute time.
    pub fn set(&self, millis: u64) {
        self.millis.store(millis, Ordering::SeqCst);
    }

    /// Move the clock forward.
    pub fn advance(&self, millis: u64) {
        let _ = self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}

/// Format Unix milliseconds as an RFC 3339 UTC timestamp.
#[must_use]
pub fn format_rfc3339(millis: u64) -> String {
    let nanos = i128::from(millis) * 1_000_000;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|at| at.format(&Rfc3339).ok())
        .unwrap_or_else(|| UNIX_EPOCH_RFC3339.to_string())
}

/// Parse an RFC 3339 timestamp into Unix milliseconds.
///
/// Timestamps before the epoch are rejected.
#[must_use]
pub fn parse_rfc3339(value: &str) -> Option<u64> {
    let at = OffsetDateTime::parse(value, &Rfc3339).ok()?;
    let millis = at.unix_timestamp_nanos() / 1_000_000;
    u64::try_from(millis).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_is_shared_between_clones() {
        let clock = ManualClock::new(1_000);
        let handle = clock.clone();
        handle.advance(250);
        assert_eq!(clock.now_millis(), 1_250);
        handle.set(5);
        assert_eq!(clock.now_millis(), 5);
    }

    #[test]
    fn rfc3339_round_trip_keeps_millis() {
        let millis = 1_697_640_000_123;
        let text = format_rfc3339(millis);
        assert!(text.starts_with("2023-10-18T"));
        assert_eq!(parse_rfc3339(&text), Some(millis));
    }

    #[test]
    fn epoch_formats_as_zulu() {
        assert_eq!(format_rfc3339(0), UNIX_EPOCH_RFC3339);
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        assert_eq!(parse_rfc3339("yesterday"), None);
        assert_eq!(parse_rfc3339("1960-01-01T00:00:00Z"), None);
    }

    #[test]
    fn system_clock_is_after_2020() {
        assert!(SystemClock.now_millis() > 1_577_836_800_000);
    }
}
