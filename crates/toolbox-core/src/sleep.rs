use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Timestamp layout used for every time stored in the state file
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Latest sleep/wake cycle of a single user. Empty strings mean "not set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DailyTimes {
    pub morning_time: String,
    pub night_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UserSleepRecord {
    pub daily: DailyTimes,
}

/// Where a user currently is in the sleep cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SleepPhase {
    NeverSlept,
    Asleep,
    Awake,
}

impl std::fmt::Display for SleepPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SleepPhase::NeverSlept => write!(f, "never slept"),
            SleepPhase::Asleep => write!(f, "asleep"),
            SleepPhase::Awake => write!(f, "awake"),
        }
    }
}

impl UserSleepRecord {
    /// Going to sleep starts a new cycle: the previous wake-up is dropped.
    pub fn mark_night(&mut self, at: &str) {
        self.daily.night_time = at.to_string();
        self.daily.morning_time.clear();
    }

    /// Waking up keeps the night time so the duration can be computed.
    pub fn mark_morning(&mut self, at: &str) {
        self.daily.morning_time = at.to_string();
    }

    pub fn night_at(&self) -> Result<Option<NaiveDateTime>> {
        parse_time(&self.daily.night_time)
    }

    pub fn morning_at(&self) -> Result<Option<NaiveDateTime>> {
        parse_time(&self.daily.morning_time)
    }

    pub fn is_asleep(&self) -> bool {
        !self.daily.night_time.is_empty() && self.daily.morning_time.is_empty()
    }

    pub fn phase(&self) -> SleepPhase {
        if self.is_asleep() {
            SleepPhase::Asleep
        } else if self.daily.night_time.is_empty() && self.daily.morning_time.is_empty() {
            SleepPhase::NeverSlept
        } else {
            SleepPhase::Awake
        }
    }
}

fn parse_time(raw: &str) -> Result<Option<NaiveDateTime>> {
    if raw.is_empty() {
        return Ok(None);
    }
    let t = NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .with_context(|| format!("Invalid timestamp '{}'", raw))?;
    Ok(Some(t))
}

/// Users of one scope, keyed by user id
pub type ScopeRecords = BTreeMap<String, UserSleepRecord>;

/// Whole persisted document: scope id -> user id -> record
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(transparent)]
pub struct SleepState {
    scopes: BTreeMap<String, ScopeRecords>,
}

impl SleepState {
    pub fn scope(&self, scope: &str) -> Option<&ScopeRecords> {
        self.scopes.get(scope)
    }

    pub fn record(&self, scope: &str, user_id: &str) -> Option<&UserSleepRecord> {
        self.scopes.get(scope).and_then(|users| users.get(user_id))
    }

    /// Record for (scope, user), inserting a fresh one if absent
    pub fn record_mut(&mut self, scope: &str, user_id: &str) -> &mut UserSleepRecord {
        self.scopes
            .entry(scope.to_string())
            .or_default()
            .entry(user_id.to_string())
            .or_default()
    }

    pub fn scopes(&self) -> impl Iterator<Item = (&String, &ScopeRecords)> {
        self.scopes.iter()
    }

    pub fn user_count(&self) -> usize {
        self.scopes.values().map(|users| users.len()).sum()
    }

    /// Every stored timestamp must parse, otherwise the file is treated as corrupt.
    pub fn validate(&self) -> Result<()> {
        for (scope, users) in &self.scopes {
            for (user_id, record) in users {
                record
                    .night_at()
                    .and(record.morning_at())
                    .with_context(|| format!("Bad record for user {} in scope {}", user_id, scope))?;
            }
        }
        Ok(())
    }
}

/// JSON file holding the [`SleepState`], always rewritten in full.
#[derive(Debug, Clone)]
pub struct SleepStore {
    path: PathBuf,
}

impl SleepStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the state file, creating it as `{}` if it does not exist yet.
    /// A file that exists but cannot be parsed is an error, never reset.
    pub fn load_or_init(&self) -> Result<SleepState> {
        if !self.path.exists() {
            info!("Creating empty sleep state at {}", self.path.display());
            let state = SleepState::default();
            self.save(&state)?;
            return Ok(state);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read sleep state: {}", self.path.display()))?;
        let state: SleepState = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse sleep state: {}", self.path.display()))?;
        state
            .validate()
            .with_context(|| format!("Corrupt sleep state: {}", self.path.display()))?;

        debug!(
            "Loaded sleep state: {} scope(s), {} user(s)",
            state.scopes.len(),
            state.user_count()
        );
        Ok(state)
    }

    /// Overwrite the whole file. Writes a sibling temp file first and renames it
    /// over the target so a crash never leaves a truncated store behind.
    pub fn save(&self, state: &SleepState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
        }

        let content = serde_json::to_string_pretty(state)?;
        let tmp_path = self.tmp_path();
        {
            let mut file = std::fs::File::create(&tmp_path)
                .with_context(|| format!("Failed to create {}", tmp_path.display()))?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp_path);
            anyhow::anyhow!("Atomic rename to {} failed: {}", self.path.display(), e)
        })?;

        debug!("Sleep state written to {}", self.path.display());
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}
