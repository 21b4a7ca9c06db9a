use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::tracker::SleepOutcome;

/// Lightweight tracker metrics using atomics
pub struct TrackerMetrics {
    pub night_events: AtomicU64,
    pub morning_events: AtomicU64,
    pub rate_limited: AtomicU64,
    pub ignored: AtomicU64,
}

/// Point-in-time copy of [`TrackerMetrics`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub night_events: u64,
    pub morning_events: u64,
    pub rate_limited: u64,
    pub ignored: u64,
}

impl TrackerMetrics {
    pub fn new() -> Self {
        Self {
            night_events: AtomicU64::new(0),
            morning_events: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
        }
    }

    pub fn record_outcome(&self, outcome: &SleepOutcome) {
        let counter = match outcome {
            SleepOutcome::RateLimited { .. } => &self.rate_limited,
            SleepOutcome::Morning { .. } => &self.morning_events,
            SleepOutcome::Night { .. } => &self.night_events,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            night_events: self.night_events.load(Ordering::Relaxed),
            morning_events: self.morning_events.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self.snapshot()).unwrap_or_default()
    }
}

impl Default for TrackerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MetricsSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} night · {} morning · {} rate-limited · {} ignored",
            self.night_events, self.morning_events, self.rate_limited, self.ignored
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_by_outcome() {
        let m = TrackerMetrics::new();
        m.record_outcome(&SleepOutcome::RateLimited { retry_after_secs: 10 });
        m.record_outcome(&SleepOutcome::Night {
            user_name: "a".into(),
            now: "2024-01-01 23:00:00".into(),
            rank: 1,
        });
        m.record_ignored();

        let snap = m.snapshot();
        assert_eq!(snap.rate_limited, 1);
        assert_eq!(snap.night_events, 1);
        assert_eq!(snap.morning_events, 0);
        assert_eq!(snap.ignored, 1);
        assert_eq!(m.to_json()["night_events"], 1);
    }

    #[test]
    fn test_json_has_every_counter() {
        let m = TrackerMetrics::new();
        m.record_ignored();
        let json = m.to_json();
        let obj = json.as_object().unwrap();
        for key in ["night_events", "morning_events", "rate_limited", "ignored"] {
            assert!(obj.contains_key(key), "missing {}", key);
        }
        assert_eq!(json["ignored"], 1);
    }

    #[test]
    fn test_summary_line() {
        let m = TrackerMetrics::new();
        assert_eq!(
            m.snapshot().to_string(),
            "0 night · 0 morning · 0 rate-limited · 0 ignored"
        );
    }
}
