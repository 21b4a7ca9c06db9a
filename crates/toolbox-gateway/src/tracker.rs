use anyhow::Result;
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use tracing::{debug, info, warn};

use toolbox_core::sleep::{SleepState, SleepStore, UserSleepRecord, TIME_FORMAT};

use crate::cooldown::{Cooldown, COOLDOWN_SECS};
use crate::sleep_count::{self, SleepCountCache};

/// Fixed civil offset every "today" is reckoned in, regardless of host locale
pub const UTC8: FixedOffset = match FixedOffset::east_opt(8 * 3600) {
    Some(offset) => offset,
    None => panic!("invalid UTC+8 offset"),
};

/// Current time in UTC+8
pub fn now_utc8() -> DateTime<FixedOffset> {
    Utc::now().with_timezone(&UTC8)
}

/// What a greeting means for the sender
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepKind {
    Night,
    Morning,
}

impl SleepKind {
    /// Any text mentioning 晚安 is a good-night, everything else is a good-morning.
    pub fn classify(text: &str) -> Self {
        if text.contains("晚安") {
            SleepKind::Night
        } else {
            SleepKind::Morning
        }
    }
}

/// Hours and leftover minutes slept
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SleepDuration {
    pub hours: i64,
    pub minutes: i64,
}

impl SleepDuration {
    /// Negative spans (clock changed between the two events) clamp to zero.
    pub fn from_secs(secs: i64) -> Self {
        let secs = secs.max(0);
        Self {
            hours: secs / 3600,
            minutes: (secs % 3600) / 60,
        }
    }
}

impl std::fmt::Display for SleepDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}小时{}分", self.hours, self.minutes)
    }
}

/// Result of one 早安/晚安 event
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SleepOutcome {
    /// Sender is still cooling down; nothing was changed
    RateLimited { retry_after_secs: i64 },
    Morning {
        user_name: String,
        now: String,
        /// None when there was no recorded night to measure from
        slept: Option<SleepDuration>,
    },
    Night {
        user_name: String,
        now: String,
        /// Position among the scope's sleepers for the day, this user included
        rank: usize,
    },
}

impl SleepOutcome {
    pub fn reply_text(&self) -> String {
        match self {
            SleepOutcome::RateLimited { .. } => {
                "你刚刚已经说过早安/晚安了，请30分钟后再试喵~".to_string()
            }
            SleepOutcome::Morning {
                user_name,
                now,
                slept,
            } => {
                let duration = slept.map(|d| d.to_string()).unwrap_or_default();
                format!(
                    "早上好喵，{}！\n现在是 {}，昨晚你睡了 {}。",
                    user_name, now, duration
                )
            }
            SleepOutcome::Night {
                user_name,
                now,
                rank,
            } => format!(
                "快睡觉喵，{}！\n现在是 {}，你是本群今天第 {} 个睡觉的。",
                user_name, now, rank
            ),
        }
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SleepOutcome::RateLimited { .. })
    }
}

/// Owns the persisted sleep records plus the two in-memory views derived
/// from them (cooldown table and sleeping-count cache). Construct once per
/// process; the in-memory parts start empty on every restart.
pub struct SleepTracker {
    store: SleepStore,
    state: SleepState,
    cooldown: Cooldown,
    counts: SleepCountCache,
}

impl SleepTracker {
    /// Load (or create) the state file behind `store`.
    pub fn open(store: SleepStore) -> Result<Self> {
        let state = store.load_or_init()?;
        info!(
            "Sleep tracker ready: {} user record(s) in {}",
            state.user_count(),
            store.path().display()
        );
        Ok(Self {
            store,
            state,
            cooldown: Cooldown::new(COOLDOWN_SECS),
            counts: SleepCountCache::new(),
        })
    }

    pub fn state(&self) -> &SleepState {
        &self.state
    }

    pub fn record(&self, scope: &str, user_id: &str) -> Option<&UserSleepRecord> {
        self.state.record(scope, user_id)
    }

    /// Handle one 早安/晚安 message. The state file is rewritten before this
    /// returns; an Err means that write failed and should be treated as fatal.
    pub fn handle_event(
        &mut self,
        scope: &str,
        user_id: &str,
        user_name: &str,
        raw_text: &str,
        event_time: DateTime<FixedOffset>,
    ) -> Result<SleepOutcome> {
        let now = event_time.with_timezone(&UTC8);

        if let Err(retry_after_secs) = self.cooldown.check(user_id, &now) {
            info!(
                "Cooldown active for user {} in {} ({}s left)",
                user_id, scope, retry_after_secs
            );
            return Ok(SleepOutcome::RateLimited { retry_after_secs });
        }

        let kind = SleepKind::classify(raw_text);
        let now_human = now.format(TIME_FORMAT).to_string();

        // Changes go to a copy that only replaces the live state once it is on disk
        let mut next = self.state.clone();
        let record = next.record_mut(scope, user_id);
        let previous_night = record.night_at()?.map(|t| t.date());
        match kind {
            SleepKind::Night => record.mark_night(&now_human),
            SleepKind::Morning => record.mark_morning(&now_human),
        }
        let record = record.clone();

        self.store.save(&next)?;
        self.state = next;
        self.cooldown.record(user_id, now);

        // The user's previous bedtime may fall on another day than today
        let today = now.date_naive();
        if let Some(date) = previous_night {
            self.counts.invalidate(scope, date);
        }
        self.counts.invalidate(scope, today);
        let sleeping = self.sleeping_count(scope, today)?;

        debug!(
            "{:?} from {} in {}: {} asleep on {}",
            kind, user_id, scope, sleeping, today
        );

        let outcome = match kind {
            SleepKind::Night => SleepOutcome::Night {
                user_name: user_name.to_string(),
                now: now_human,
                rank: sleeping,
            },
            SleepKind::Morning => SleepOutcome::Morning {
                user_name: user_name.to_string(),
                now: now_human,
                slept: sleep_duration(&record)?,
            },
        };
        Ok(outcome)
    }

    /// Users of `scope` asleep since `date`, served from cache when possible.
    pub fn sleeping_count(&mut self, scope: &str, date: NaiveDate) -> Result<usize> {
        if let Some(count) = self.counts.get(scope, date) {
            return Ok(count);
        }
        let count = match self.state.scope(scope) {
            Some(users) => sleep_count::count_asleep_on(users, date)?,
            None => 0,
        };
        self.counts.update(scope, date, count);
        Ok(count)
    }
}

fn sleep_duration(record: &UserSleepRecord) -> Result<Option<SleepDuration>> {
    let (Some(night), Some(morning)) = (record.night_at()?, record.morning_at()?) else {
        return Ok(None);
    };
    let secs = (morning - night).num_seconds();
    if secs < 0 {
        warn!(
            "Wake-up {} is before bedtime {}, reporting zero sleep",
            morning, night
        );
    }
    Ok(Some(SleepDuration::from_secs(secs)))
}
