use anyhow::Result;
use serde::Serialize;
use std::sync::Mutex;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{info, warn};

use crate::handler::{self, ChatEvent};
use crate::metrics::TrackerMetrics;
use crate::tracker::SleepTracker;

#[derive(Debug, Serialize)]
struct ReplyLine<'a> {
    scope: &'a str,
    user_id: &'a str,
    reply: String,
    rate_limited: bool,
}

#[derive(Debug, Serialize)]
struct ErrorLine {
    error: String,
}

/// Run the tracker over stdin/stdout (newline-delimited JSON events in, replies out)
pub async fn run_stdio(tracker: &Mutex<SleepTracker>, metrics: &TrackerMetrics) -> Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let stdout = tokio::io::stdout();
    run_lines(tracker, metrics, stdin, stdout).await
}

/// Process one JSON [`ChatEvent`] per line until EOF. Lines that are not
/// greetings produce no output; malformed lines get an error line back.
/// A failed state write stops the loop and is returned to the caller.
pub async fn run_lines<R, W>(
    tracker: &Mutex<SleepTracker>,
    metrics: &TrackerMetrics,
    reader: R,
    mut writer: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    info!("Event transport starting");
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let event: ChatEvent = match serde_json::from_str(line) {
            Ok(e) => e,
            Err(e) => {
                warn!("Malformed event line: {}", e);
                let out = serde_json::to_string(&ErrorLine {
                    error: format!("Parse error: {}", e),
                })?;
                write_line(&mut writer, &out).await?;
                continue;
            }
        };

        if let Some(outcome) = handler::dispatch(tracker, metrics, &event)? {
            let out = serde_json::to_string(&ReplyLine {
                scope: &event.scope,
                user_id: &event.user_id,
                reply: outcome.reply_text(),
                rate_limited: outcome.is_rate_limited(),
            })?;
            write_line(&mut writer, &out).await?;
        }
    }

    info!("Event transport stopped");
    Ok(())
}

async fn write_line<W: AsyncWrite + Unpin>(writer: &mut W, line: &str) -> Result<()> {
    writer.write_all(line.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolbox_core::sleep::SleepStore;

    #[tokio::test]
    async fn test_malformed_line_reports_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = Mutex::new(SleepTracker::open(SleepStore::new(dir.path().join("s.json"))).unwrap());
        let metrics = TrackerMetrics::new();

        let input = concat!(
            "not json\n",
            "\n",
            r#"{"scope":"g","user_id":"1","user_name":"A","text":"晚安","time":"2024-01-01T23:00:00+08:00"}"#,
            "\n",
        );
        let mut output = Vec::new();
        run_lines(&tracker, &metrics, input.as_bytes(), &mut output)
            .await
            .unwrap();

        let text = String::from_utf8(output).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].contains("Parse error"));

        let reply: serde_json::Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(reply["scope"], "g");
        assert_eq!(reply["rate_limited"], false);
        assert!(reply["reply"].as_str().unwrap().contains("第 1 个睡觉的"));
    }
}
