use anyhow::Result;
use chrono::NaiveDate;
use std::collections::HashMap;
use toolbox_core::sleep::ScopeRecords;

/// Cached "how many people in this group are asleep today" per scope and day.
/// Derived from the persisted records, never written to disk.
#[derive(Debug, Default)]
pub struct SleepCountCache {
    counts: HashMap<String, HashMap<NaiveDate, usize>>,
}

impl SleepCountCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, scope: &str, date: NaiveDate) -> Option<usize> {
        self.counts.get(scope).and_then(|days| days.get(&date)).copied()
    }

    pub fn update(&mut self, scope: &str, date: NaiveDate, count: usize) {
        self.counts
            .entry(scope.to_string())
            .or_default()
            .insert(date, count);
    }

    /// Drop the cached count for one scope and day
    pub fn invalidate(&mut self, scope: &str, date: NaiveDate) {
        if let Some(days) = self.counts.get_mut(scope) {
            days.remove(&date);
        }
    }
}

/// Count users of a scope that went to bed on `date` and have not woken up since.
pub fn count_asleep_on(users: &ScopeRecords, date: NaiveDate) -> Result<usize> {
    let mut count = 0;
    for record in users.values() {
        if !record.is_asleep() {
            continue;
        }
        if let Some(night) = record.night_at()? {
            if night.date() == date {
                count += 1;
            }
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolbox_core::sleep::UserSleepRecord;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_cache_update_and_invalidate() {
        let mut cache = SleepCountCache::new();
        let d = date("2024-01-01");
        assert_eq!(cache.get("g", d), None);

        cache.update("g", d, 3);
        assert_eq!(cache.get("g", d), Some(3));
        assert_eq!(cache.get("other", d), None);

        cache.update("g", date("2024-01-02"), 1);
        cache.invalidate("g", d);
        assert_eq!(cache.get("g", d), None);
        assert_eq!(cache.get("g", date("2024-01-02")), Some(1));

        cache.invalidate("g", d);
        cache.invalidate("missing", d);
        assert_eq!(cache.get("missing", d), None);
    }

    #[test]
    fn test_count_only_asleep_on_same_date() {
        let mut users = ScopeRecords::new();

        let mut a = UserSleepRecord::default();
        a.mark_night("2024-01-01 22:00:00");
        users.insert("a".into(), a);

        let mut b = UserSleepRecord::default();
        b.mark_night("2024-01-01 22:30:00");
        b.mark_morning("2024-01-01 23:30:00");
        users.insert("b".into(), b);

        // Same day of month, different month: must not be counted
        let mut c = UserSleepRecord::default();
        c.mark_night("2024-02-01 21:00:00");
        users.insert("c".into(), c);

        users.insert("d".into(), UserSleepRecord::default());

        assert_eq!(count_asleep_on(&users, date("2024-01-01")).unwrap(), 1);
        assert_eq!(count_asleep_on(&users, date("2024-02-01")).unwrap(), 1);
        assert_eq!(count_asleep_on(&users, date("2024-01-02")).unwrap(), 0);
    }
}
