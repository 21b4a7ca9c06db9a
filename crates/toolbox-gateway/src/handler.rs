use anyhow::Result;
use chrono::{DateTime, FixedOffset};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, OnceLock};
use tracing::{info, warn};

use crate::metrics::TrackerMetrics;
use crate::tracker::{now_utc8, SleepOutcome, SleepTracker};

/// One tracker per process, shared by every adapter. The lock covers the
/// cooldown check, the record update, the file rewrite and the count recompute.
pub type SharedTracker = Arc<Mutex<SleepTracker>>;

pub fn shared(tracker: SleepTracker) -> SharedTracker {
    Arc::new(Mutex::new(tracker))
}

/// Inbound chat message as handed over by the host framework
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ChatEvent {
    pub scope: String,
    pub user_id: String,
    #[serde(default)]
    pub user_name: String,
    pub text: String,
    /// Defaults to the current time when absent
    #[serde(default)]
    pub time: Option<DateTime<FixedOffset>>,
}

fn command_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^(早安|晚安)").expect("static regex"))
}

/// Whether a message is a 早安/晚安 command at all
pub fn is_sleep_command(text: &str) -> bool {
    command_pattern().is_match(text)
}

/// Route a chat message to the sleep tracker.
/// Returns Ok(None) for messages that are not ours, Err only when persisting failed.
pub fn dispatch(
    tracker: &Mutex<SleepTracker>,
    metrics: &TrackerMetrics,
    event: &ChatEvent,
) -> Result<Option<SleepOutcome>> {
    if !is_sleep_command(&event.text) {
        metrics.record_ignored();
        return Ok(None);
    }

    if event.scope.trim().is_empty() || event.user_id.trim().is_empty() {
        warn!(
            "Dropping greeting with empty scope or user id: {:?}",
            event.text.chars().take(50).collect::<String>()
        );
        metrics.record_ignored();
        return Ok(None);
    }

    let user_name = if event.user_name.is_empty() {
        event.user_id.as_str()
    } else {
        event.user_name.as_str()
    };
    let time = event.time.unwrap_or_else(now_utc8);

    info!("Greeting from {} ({}) in {}", user_name, event.user_id, event.scope);

    let outcome = {
        let mut guard = tracker
            .lock()
            .map_err(|_| anyhow::anyhow!("sleep tracker lock poisoned"))?;
        guard.handle_event(&event.scope, &event.user_id, user_name, &event.text, time)?
    };

    metrics.record_outcome(&outcome);
    Ok(Some(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolbox_core::sleep::SleepStore;

    fn event(user: &str, text: &str, time: &str) -> ChatEvent {
        ChatEvent {
            scope: "group:1".into(),
            user_id: user.into(),
            user_name: String::new(),
            text: text.into(),
            time: Some(DateTime::parse_from_rfc3339(time).unwrap()),
        }
    }

    #[test]
    fn test_command_pattern() {
        assert!(is_sleep_command("早安"));
        assert!(is_sleep_command("晚安呀"));
        assert!(!is_sleep_command("大家晚安"));
        assert!(!is_sleep_command("hello"));
    }

    #[test]
    fn test_dispatch_ignores_other_messages() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = shared(SleepTracker::open(SleepStore::new(dir.path().join("s.json"))).unwrap());
        let metrics = TrackerMetrics::new();

        let out = dispatch(&tracker, &metrics, &event("u", "战力查询 小乔", "2024-01-01T23:00:00+08:00"))
            .unwrap();
        assert!(out.is_none());
        assert_eq!(metrics.snapshot().ignored, 1);
    }

    #[test]
    fn test_dispatch_falls_back_to_user_id_for_name() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = shared(SleepTracker::open(SleepStore::new(dir.path().join("s.json"))).unwrap());
        let metrics = TrackerMetrics::new();

        let out = dispatch(&tracker, &metrics, &event("10086", "晚安", "2024-01-01T23:00:00+08:00"))
            .unwrap()
            .unwrap();
        assert!(out.reply_text().starts_with("快睡觉喵，10086！"));
        assert_eq!(metrics.snapshot().night_events, 1);
    }

    #[test]
    fn test_dispatch_rejects_blank_ids() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = shared(SleepTracker::open(SleepStore::new(dir.path().join("s.json"))).unwrap());
        let metrics = TrackerMetrics::new();

        let out = dispatch(&tracker, &metrics, &event(" ", "早安", "2024-01-01T08:00:00+08:00")).unwrap();
        assert!(out.is_none());
        assert_eq!(tracker.lock().unwrap().state().user_count(), 0);
    }
}
