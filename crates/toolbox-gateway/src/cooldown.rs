use chrono::{DateTime, Duration, FixedOffset};
use std::collections::HashMap;

/// Minimum gap between two accepted 早安/晚安 events of the same user
pub const COOLDOWN_SECS: i64 = 1800;

/// Per-user cooldown gate. Keyed by user id only, so a user that just
/// greeted in one group is blocked in every group. Lives in memory only.
pub struct Cooldown {
    /// Window duration in seconds
    window_secs: i64,
    /// Last accepted event per user
    last_seen: HashMap<String, DateTime<FixedOffset>>,
}

impl Cooldown {
    pub fn new(window_secs: i64) -> Self {
        Self {
            window_secs,
            last_seen: HashMap::new(),
        }
    }

    /// Check if a user may trigger an event at `now`.
    /// Returns Ok(()) if allowed, Err(seconds_until_next) if still cooling down.
    /// Does not record anything; call [`Cooldown::record`] once the event is accepted.
    pub fn check(&self, user_id: &str, now: &DateTime<FixedOffset>) -> Result<(), i64> {
        let Some(last) = self.last_seen.get(user_id) else {
            return Ok(());
        };

        let window = Duration::seconds(self.window_secs);
        let elapsed = *now - *last;
        if elapsed < window {
            let wait = (window - elapsed).num_seconds();
            Err(wait.max(1))
        } else {
            Ok(())
        }
    }

    pub fn record(&mut self, user_id: &str, now: DateTime<FixedOffset>) {
        self.last_seen.insert(user_id.to_string(), now);
    }
}

impl Default for Cooldown {
    fn default() -> Self {
        Self::new(COOLDOWN_SECS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_first_event_allowed() {
        let cd = Cooldown::default();
        assert!(cd.check("1", &at("2024-01-01T23:00:00+08:00")).is_ok());
    }

    #[test]
    fn test_blocks_inside_window() {
        let mut cd = Cooldown::default();
        cd.record("1", at("2024-01-01T23:00:00+08:00"));
        assert_eq!(cd.check("1", &at("2024-01-01T23:29:59+08:00")), Err(1));
        assert_eq!(cd.check("1", &at("2024-01-01T23:10:00+08:00")), Err(1200));
    }

    #[test]
    fn test_allows_at_window_edge() {
        let mut cd = Cooldown::default();
        cd.record("1", at("2024-01-01T23:00:00+08:00"));
        assert!(cd.check("1", &at("2024-01-01T23:30:00+08:00")).is_ok());
    }

    #[test]
    fn test_separate_users() {
        let mut cd = Cooldown::new(60);
        cd.record("1", at("2024-01-01T08:00:00+08:00"));
        assert!(cd.check("2", &at("2024-01-01T08:00:10+08:00")).is_ok());
        assert!(cd.check("1", &at("2024-01-01T08:00:10+08:00")).is_err());
    }

    #[test]
    fn test_clock_going_backwards_is_blocked() {
        let mut cd = Cooldown::default();
        cd.record("1", at("2024-01-01T23:00:00+08:00"));
        assert!(cd.check("1", &at("2024-01-01T22:00:00+08:00")).is_err());
    }

    #[test]
    fn test_compares_across_offsets() {
        let mut cd = Cooldown::default();
        cd.record("1", at("2024-01-01T23:00:00+08:00"));
        // 15:20 UTC is 23:20 in UTC+8
        assert!(cd.check("1", &at("2024-01-01T15:20:00+00:00")).is_err());
        assert!(cd.check("1", &at("2024-01-01T15:30:00+00:00")).is_ok());
    }
}
