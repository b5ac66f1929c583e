use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::router::lexicon::{normalize, Lexicon};
use crate::router::numbers::extract_minutes;

use super::io::VoiceLink;

/// Phrases that ask how much time is left.
const REMAINING_PHRASES: [&str; 5] = [
    "how much time",
    "time left",
    "remaining",
    "what's left",
    "how much is left",
];

#[derive(Debug, Clone)]
pub struct CountdownConfig {
    /// Listen window per tick. The countdown can only notice cancellation
    /// or commands at these boundaries.
    pub chunk: Duration,
    /// Ask "are you sure" before cancelling. Off by default; a spoken
    /// "stop" during a timer is rarely an accident.
    pub confirm_cancel: bool,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            chunk: Duration::from_secs(5),
            confirm_cancel: false,
        }
    }
}

/// Why a countdown stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountdownEnd {
    /// Ran the full duration.
    Completed,
    /// User asked it to stop.
    Cancelled,
    /// External cancellation token fired.
    Interrupted,
}

/// What the user said while the clock was running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidCommand {
    Cancel,
    /// Extend by this many minutes.
    Extend(u32),
    Remaining,
    Other,
}

impl MidCommand {
    /// Order matters: "stop" beats everything, asking for the time beats
    /// extending, anything else is Other.
    pub fn parse(lexicon: &Lexicon, text: &str) -> Self {
        let cleaned = normalize(text);
        if cleaned.is_empty() {
            return MidCommand::Other;
        }
        if lexicon.is_hard_exit(&cleaned) {
            return MidCommand::Cancel;
        }
        if REMAINING_PHRASES.iter().any(|p| cleaned.contains(p)) {
            return MidCommand::Remaining;
        }
        if let Some(mins) = extract_minutes(&cleaned) {
            return MidCommand::Extend(mins);
        }
        MidCommand::Other
    }
}

/// Spoken summary of the time left, to the second.
pub fn format_remaining(remaining: Duration) -> String {
    let total_secs = remaining.as_secs();
    if total_secs == 0 {
        return "No time remaining.".to_string();
    }
    let mins = total_secs / 60;
    let secs = total_secs % 60;
    let min_word = if mins == 1 { "minute" } else { "minutes" };
    let sec_word = if secs == 1 { "second" } else { "seconds" };
    if mins > 0 && secs > 0 {
        format!("{mins} {min_word} and {secs} {sec_word} remaining.")
    } else if mins > 0 {
        format!("{mins} {min_word} remaining.")
    } else {
        format!("{secs} {sec_word} remaining.")
    }
}

/// Count down `total` while staying interruptible.
///
/// Listens in `chunk`-sized windows. A quiet window burns the whole chunk
/// from the budget; a spoken window burns only the time it actually took,
/// so commands never eat the clock. Recognized commands: cancel (the exit
/// lexicon), extend ("add ten minutes"), remaining ("how much time is
/// left"). The token is checked between chunks and during listens, so an
/// external cancel unwinds within one chunk.
pub async fn run_countdown(
    link: &mut dyn VoiceLink,
    lexicon: &Lexicon,
    total: Duration,
    cfg: &CountdownConfig,
    token: &CancellationToken,
) -> anyhow::Result<CountdownEnd> {
    let mut remaining = total;

    loop {
        if token.is_cancelled() {
            return Ok(CountdownEnd::Interrupted);
        }
        if remaining.is_zero() {
            return Ok(CountdownEnd::Completed);
        }

        let chunk = cfg.chunk.min(remaining);
        let started = Instant::now();
        let heard = tokio::select! {
            _ = token.cancelled() => return Ok(CountdownEnd::Interrupted),
            heard = link.listen(Some(chunk)) => heard?,
        };

        let Some(text) = heard.filter(|u| !u.trim().is_empty()) else {
            remaining = remaining.saturating_sub(chunk);
            continue;
        };

        match MidCommand::parse(lexicon, &text) {
            MidCommand::Cancel => {
                if !cfg.confirm_cancel {
                    return Ok(CountdownEnd::Cancelled);
                }
                link.speak("Do you want to stop the timer?").await?;
                let reply = link.listen(Some(cfg.chunk)).await?;
                match reply {
                    Some(r) if lexicon.is_affirmative(&r) => {
                        return Ok(CountdownEnd::Cancelled);
                    }
                    _ => link.speak("Okay, continuing.").await?,
                }
            }
            MidCommand::Extend(mins) => {
                remaining += Duration::from_secs(u64::from(mins) * 60);
                let ack = if mins == 1 {
                    "Adding 1 minute.".to_string()
                } else {
                    format!("Adding {mins} minutes.")
                };
                link.speak(&ack).await?;
            }
            MidCommand::Remaining => {
                link.speak(&format_remaining(remaining)).await?;
            }
            MidCommand::Other => {
                debug!(%text, "unrecognized mid-countdown input");
            }
        }

        // The interaction itself consumed wall time.
        remaining = remaining.saturating_sub(started.elapsed().min(chunk));
    }
}
