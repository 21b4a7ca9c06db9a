use anyhow::{Context, Result};
use chrono::{DateTime, FixedOffset, NaiveDateTime};
use clap::Subcommand;
use colored::Colorize;
use toolbox_core::config::ToolboxConfig;
use toolbox_core::paths;
use toolbox_core::sleep::{SleepPhase, SleepStore, TIME_FORMAT};
use toolbox_gateway::handler;
use toolbox_gateway::tracker::{self, SleepTracker};

#[derive(Subcommand)]
pub enum SleepAction {
    /// List recorded users per scope
    Status {
        /// Only show this scope
        #[arg(short, long)]
        scope: Option<String>,
    },
    /// Feed a single 早安/晚安 message through the tracker
    Say {
        #[arg(long)]
        scope: String,
        #[arg(long)]
        user: String,
        /// Display name used in the reply (defaults to the user id)
        #[arg(long)]
        name: Option<String>,
        /// Event time in UTC+8, "YYYY-mm-dd HH:MM:SS" (defaults to now)
        #[arg(long)]
        at: Option<String>,
        /// Message text, must start with 早安 or 晚安
        text: String,
    },
}

pub fn run(action: SleepAction) -> Result<()> {
    let config = ToolboxConfig::from_file_or_env(&paths::config_path())?;
    let store = SleepStore::new(config.state_path());

    match action {
        SleepAction::Status { scope } => show_status(&store, scope),
        SleepAction::Say {
            scope,
            user,
            name,
            at,
            text,
        } => say(store, &scope, &user, name.as_deref(), at.as_deref(), &text),
    }
}

fn show_status(store: &SleepStore, scope_filter: Option<String>) -> Result<()> {
    if !store.path().exists() {
        println!("{}", "No sleep records yet.".dimmed());
        return Ok(());
    }

    let state = store.load_or_init()?;
    let scopes: Vec<_> = state
        .scopes()
        .filter(|(scope, _)| scope_filter.as_ref().map_or(true, |f| *scope == f))
        .collect();

    if scopes.is_empty() {
        match &scope_filter {
            Some(filter) => println!("{} Scope '{}' not found.", "✗".red(), filter),
            None => println!("{}", "No sleep records yet.".dimmed()),
        }
        return Ok(());
    }

    for (scope, users) in scopes {
        println!(
            "{} {} ({} user{})",
            "●".green(),
            scope.bold(),
            users.len(),
            if users.len() == 1 { "" } else { "s" }
        );

        for (user_id, record) in users {
            let phase = match record.phase() {
                SleepPhase::Asleep => "asleep".blue(),
                SleepPhase::Awake => "awake".yellow(),
                SleepPhase::NeverSlept => "never slept".dimmed(),
            };
            let night = non_empty(&record.daily.night_time);
            let morning = non_empty(&record.daily.morning_time);

            println!(
                "  {} {} [{}] {} {} {} {}",
                "→".dimmed(),
                user_id,
                phase,
                "night:".dimmed(),
                night,
                "morning:".dimmed(),
                morning
            );
        }
        println!();
    }

    Ok(())
}

fn non_empty(s: &str) -> &str {
    if s.is_empty() {
        "-"
    } else {
        s
    }
}

fn say(
    store: SleepStore,
    scope: &str,
    user: &str,
    name: Option<&str>,
    at: Option<&str>,
    text: &str,
) -> Result<()> {
    if !handler::is_sleep_command(text) {
        anyhow::bail!("Message must start with 早安 or 晚安, got '{}'", text);
    }

    let time = match at {
        Some(raw) => parse_utc8(raw)?,
        None => tracker::now_utc8(),
    };

    let mut tracker = SleepTracker::open(store)?;
    let outcome = tracker.handle_event(scope, user, name.unwrap_or(user), text, time)?;

    println!("{}", outcome.reply_text());
    Ok(())
}

fn parse_utc8(raw: &str) -> Result<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(raw, TIME_FORMAT)
        .with_context(|| format!("Expected \"YYYY-mm-dd HH:MM:SS\", got '{}'", raw))?;
    naive
        .and_local_timezone(tracker::UTC8)
        .single()
        .ok_or_else(|| anyhow::anyhow!("Ambiguous time '{}'", raw))
}
