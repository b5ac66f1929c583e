use colloquy::router::{
    numbers, Catalog, CatalogEntry, IntentResult, IntentRouter, IntentSchema, IntentSpec, Lexicon,
};
use colloquy::services::llm::HttpClassifier;
use colloquy::session::{
    run_countdown, CountdownConfig, CountdownEnd, Flow, IntentHandler, SessionConfig,
    SessionDriver, VoiceLink,
};
use colloquy::store::{ActivityEntry, ActivityLog, PreferenceStore, DEFAULT_MAX_ENTRIES};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use std::io::Write as _;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio_util::sync::CancellationToken;

const PREFS_FILE: &str = "focus_prefs.json";
const LOG_FILE: &str = "focus_log.json";
const DATA_DIR: &str = "colloquy_data";

/// Console stand-in for a voice channel: speak prints, listen reads a line.
struct ConsoleLink {
    lines: Lines<BufReader<Stdin>>,
}

impl ConsoleLink {
    fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }
}

#[async_trait]
impl VoiceLink for ConsoleLink {
    async fn speak(&mut self, text: &str) -> Result<()> {
        println!("assistant> {text}");
        Ok(())
    }

    async fn listen(&mut self, timeout: Option<Duration>) -> Result<Option<String>> {
        print!("you> ");
        std::io::stdout().flush()?;
        let next = self.lines.next_line();
        let line = match timeout {
            Some(window) => match tokio::time::timeout(window, next).await {
                Ok(line) => line?,
                Err(_) => {
                    println!();
                    return Ok(None); // window elapsed, reads as silence
                }
            },
            None => next.await?,
        };
        Ok(line
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty()))
    }
}

/// A small focus-timer ability wired through the library.
struct FocusHandler {
    store: PreferenceStore,
    prefs: Value,
    log: ActivityLog,
    lexicon: Lexicon,
    sounds: Catalog,
    countdown: CountdownConfig,
    cancel: CancellationToken,
}

fn slot_minutes(result: &IntentResult) -> Option<u64> {
    let value = result.slots.get("minutes")?;
    value
        .as_u64()
        .or_else(|| value.as_str().and_then(|s| numbers::extract_minutes(s).map(u64::from)))
}

#[async_trait]
impl IntentHandler for FocusHandler {
    async fn handle(&mut self, result: &IntentResult, link: &mut dyn VoiceLink) -> Result<Flow> {
        match result.intent.as_str() {
            "start_focus" => {
                let minutes = slot_minutes(result)
                    .or_else(|| self.prefs.get("session_minutes").and_then(Value::as_u64))
                    .unwrap_or(25);
                link.speak(&format!(
                    "Starting a {minutes} minute focus session. Say stop to end it early."
                ))
                .await?;
                let end = run_countdown(
                    link,
                    &self.lexicon,
                    Duration::from_secs(minutes * 60),
                    &self.countdown,
                    &self.cancel,
                )
                .await?;
                match end {
                    CountdownEnd::Completed => {
                        link.speak("Time's up. Nice work.").await?;
                        self.log.push(ActivityEntry::new(
                            "focus",
                            "completed session",
                            Some(minutes as f64),
                        ));
                    }
                    CountdownEnd::Cancelled => {
                        link.speak("Session cancelled.").await?;
                        self.log
                            .push(ActivityEntry::new("focus", "cancelled session", None));
                    }
                    CountdownEnd::Interrupted => return Ok(Flow::Exit),
                }
                self.log.save(&self.store, LOG_FILE)?;
                Ok(Flow::Continue)
            }
            "set_length" => {
                let Some(minutes) = slot_minutes(result) else {
                    link.speak("Set the default to how many minutes?").await?;
                    return Ok(Flow::Continue);
                };
                self.prefs["session_minutes"] = json!(minutes);
                self.store.save(PREFS_FILE, &self.prefs)?;
                link.speak(&format!("Default session length is now {minutes} minutes."))
                    .await?;
                Ok(Flow::Continue)
            }
            "pick_sound" => {
                let spoken = result
                    .slots
                    .get("sound")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                match spoken.as_deref().and_then(|s| self.sounds.resolve(s)) {
                    Some(entry) => {
                        let line = format!("Focus sound set to {}.", entry.name);
                        let key = entry.key.clone();
                        self.prefs["sound"] = json!(key);
                        self.store.save(PREFS_FILE, &self.prefs)?;
                        link.speak(&line).await?;
                    }
                    None => {
                        link.speak(
                            "I don't know that one. I have rain, ocean waves, and white noise.",
                        )
                        .await?;
                    }
                }
                Ok(Flow::Continue)
            }
            "stats" => {
                let recent = self.log.recent(Some("focus"), 10);
                if recent.is_empty() {
                    link.speak("No focus sessions logged yet.").await?;
                } else {
                    link.speak(&format!(
                        "{} recent focus entries. Latest: {}.",
                        recent.len(),
                        recent[0].details
                    ))
                    .await?;
                }
                Ok(Flow::Continue)
            }
            _ => {
                if let Some(suggestion) = &result.keyword_suggestion {
                    link.speak(&format!("Did you mean to {suggestion}? Say it again."))
                        .await?;
                } else {
                    link.speak(
                        "I didn't catch that. You can start a session, change the length, \
                         pick a sound, or ask for stats.",
                    )
                    .await?;
                }
                Ok(Flow::Continue)
            }
        }
    }
}

fn default_prefs() -> Value {
    json!({
        "session_minutes": 25,
        "sound": "rain",
    })
}

fn focus_schema() -> IntentSchema {
    IntentSchema::new(vec![
        IntentSpec::new("start_focus", "Begin a focus countdown.")
            .triggers(&["focus", "start a session", "pomodoro", "timer"])
            .slot_names(&["minutes"])
            .samples(&["focus for 25 minutes", "start a focus session"]),
        IntentSpec::new("set_length", "Change the default session length.")
            .triggers(&["session length", "default length", "set the length"])
            .slot_names(&["minutes"])
            .samples(&["make sessions 50 minutes"]),
        IntentSpec::new("pick_sound", "Choose the background sound.")
            .triggers(&["sound", "noise", "play"])
            .slot_names(&["sound"])
            .samples(&["play ocean waves", "switch to white noise"]),
        IntentSpec::new("stats", "Summarize recent focus sessions.")
            .triggers(&["stats", "history", "how many sessions"])
            .samples(&["how did I do this week"]),
    ])
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    tracing::info!("Colloquy console session starting...");

    let lexicon = Lexicon::default();
    let mut router = IntentRouter::new(focus_schema(), lexicon.clone());
    match std::env::var("COLLOQUY_LLM_URL") {
        Ok(url) => {
            tracing::info!("using LLM classifier at {url}");
            router = router.with_classifier(Arc::new(HttpClassifier::new(&url)));
        }
        Err(_) => tracing::info!("COLLOQUY_LLM_URL not set, keyword routing only"),
    }

    let store = PreferenceStore::open(DATA_DIR);
    let mut prefs = store.load(PREFS_FILE, &default_prefs());
    if !prefs.is_object() {
        prefs = default_prefs();
    }
    let log = ActivityLog::load(&store, LOG_FILE, DEFAULT_MAX_ENTRIES);

    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c, cancelling session");
            ctrl_c_token.cancel();
        }
    });

    let sounds = Catalog::new(vec![
        CatalogEntry::new("rain", "rain", &["rainfall", "rain sounds"]),
        CatalogEntry::new("ocean", "ocean waves", &["waves", "the sea", "ocean wave sounds"]),
        CatalogEntry::new("white_noise", "white noise", &["static", "fan noise"]),
    ]);

    let handler = FocusHandler {
        store,
        prefs,
        log,
        lexicon: lexicon.clone(),
        sounds,
        countdown: CountdownConfig::default(),
        cancel: cancel.clone(),
    };

    let config = SessionConfig {
        greeting: Some(
            "Focus coach here. Start a session, change the length, pick a sound, \
             or ask for stats."
                .to_string(),
        ),
        ..SessionConfig::default()
    };

    let mut driver =
        SessionDriver::new(router, ConsoleLink::new(), handler, config).with_cancel(cancel);
    let outcome = driver.run().await;
    tracing::info!(?outcome, "session over");
    Ok(())
}
