use colloquy::router::{
    IntentClassifier, IntentResult, IntentRouter, IntentSchema, IntentSource, IntentSpec, Lexicon,
};
use colloquy::session::{
    run_countdown, CountdownConfig, CountdownEnd, Flow, IntentHandler, SessionConfig,
    SessionDriver, SessionOutcome, VoiceLink,
};
use colloquy::store::{ActivityEntry, ActivityLog, PreferenceStore};

use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::tempdir;
use tokio_util::sync::CancellationToken;

const LOG_FILE: &str = "focus_log.json";

struct ScriptedLink {
    replies: VecDeque<Option<String>>,
    spoken: Vec<String>,
    resumed: usize,
}

impl ScriptedLink {
    fn new(replies: Vec<Option<&str>>) -> Self {
        Self {
            replies: replies.into_iter().map(|r| r.map(str::to_string)).collect(),
            spoken: Vec::new(),
            resumed: 0,
        }
    }
}

#[async_trait]
impl VoiceLink for ScriptedLink {
    async fn speak(&mut self, text: &str) -> anyhow::Result<()> {
        self.spoken.push(text.to_string());
        Ok(())
    }

    async fn listen(&mut self, _timeout: Option<Duration>) -> anyhow::Result<Option<String>> {
        Ok(self.replies.pop_front().unwrap_or(None))
    }

    async fn resume_host(&mut self) -> anyhow::Result<()> {
        self.resumed += 1;
        Ok(())
    }
}

// Classifier double that pops one canned reply per call.
struct ScriptedClassifier {
    replies: Mutex<VecDeque<String>>,
    calls: AtomicUsize,
}

impl ScriptedClassifier {
    fn new(replies: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into_iter().map(str::to_string).collect()),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl IntentClassifier for ScriptedClassifier {
    async fn classify(&self, _prompt: &str) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.replies.lock().unwrap().pop_front().unwrap_or_default())
    }
}

struct FailingClassifier;

#[async_trait]
impl IntentClassifier for FailingClassifier {
    async fn classify(&self, _prompt: &str) -> anyhow::Result<String> {
        Err(anyhow::anyhow!("connection refused"))
    }
}

// A focus-timer ability small enough to trace by hand.
struct FocusFlowHandler {
    store: PreferenceStore,
    log: ActivityLog,
    lexicon: Lexicon,
    cancel: CancellationToken,
}

#[async_trait]
impl IntentHandler for FocusFlowHandler {
    async fn handle(
        &mut self,
        result: &IntentResult,
        link: &mut dyn VoiceLink,
    ) -> anyhow::Result<Flow> {
        match result.intent.as_str() {
            "start_focus" => {
                let minutes = result.slots.get("minutes").and_then(Value::as_u64).unwrap_or(25);
                link.speak(&format!("Starting a {minutes} minute session.")).await?;
                let end = run_countdown(
                    link,
                    &self.lexicon,
                    Duration::from_secs(minutes * 60),
                    &CountdownConfig::default(),
                    &self.cancel,
                )
                .await?;
                match end {
                    CountdownEnd::Completed => {
                        link.speak("Time's up.").await?;
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
            "stats" => {
                let n = self.log.recent(Some("focus"), 10).len();
                link.speak(&format!("You have {n} logged focus entries.")).await?;
                Ok(Flow::Continue)
            }
            _ => {
                link.speak("ok").await?;
                Ok(Flow::Continue)
            }
        }
    }
}

struct RecordingHandler {
    handled: Vec<IntentResult>,
}

#[async_trait]
impl IntentHandler for RecordingHandler {
    async fn handle(
        &mut self,
        result: &IntentResult,
        link: &mut dyn VoiceLink,
    ) -> anyhow::Result<Flow> {
        self.handled.push(result.clone());
        link.speak("ok").await?;
        Ok(Flow::Continue)
    }
}

fn focus_schema() -> IntentSchema {
    IntentSchema::new(vec![
        IntentSpec::new("start_focus", "Begin a focus countdown.")
            .triggers(&["focus", "start a session", "timer"])
            .slot_names(&["minutes"])
            .samples(&["focus for 25 minutes"]),
        IntentSpec::new("stats", "Summarize recent sessions.")
            .triggers(&["stats", "history"]),
    ])
}

fn flow_config() -> SessionConfig {
    SessionConfig {
        greeting: Some("welcome".to_string()),
        sign_off: "bye now".to_string(),
        apology: "sorry".to_string(),
        listen_timeout: None,
        ..SessionConfig::default()
    }
}

#[tokio::test]
async fn test_focus_session_flow_with_midstream_cancel() {
    let dir = tempdir().expect("tempdir");
    let store = PreferenceStore::open(dir.path());
    let cancel = CancellationToken::new();

    let classifier = ScriptedClassifier::new(vec![
        "{\"intent\": \"start_focus\", \"confidence\": 0.9, \"minutes\": 5}",
        "{\"intent\": \"stats\", \"confidence\": 0.85}",
    ]);
    let router = IntentRouter::new(focus_schema(), Lexicon::default())
        .with_classifier(classifier.clone());

    let handler = FocusFlowHandler {
        store: store.clone(),
        log: ActivityLog::new(500),
        lexicon: Lexicon::default(),
        cancel: cancel.clone(),
    };

    // 1. Start a session, ask for the time mid-countdown, cancel it,
    //    check the stats, then leave.
    let link = ScriptedLink::new(vec![
        Some("deep work for five minutes"),
        Some("how much time is left"),
        Some("stop"),
        Some("give me my session history"),
        Some("thanks"),
    ]);
    let mut driver =
        SessionDriver::new(router, link, handler, flow_config()).with_cancel(cancel);

    let outcome = driver.run().await;

    // 2. Conversation shape.
    assert_eq!(outcome, SessionOutcome::Exited);
    assert_eq!(
        driver.link.spoken,
        vec![
            "welcome",
            "Starting a 5 minute session.",
            "5 minutes remaining.",
            "Session cancelled.",
            "You have 1 logged focus entries.",
            "bye now",
        ]
    );
    assert_eq!(driver.link.resumed, 1);
    assert_eq!(
        classifier.calls.load(Ordering::SeqCst),
        2,
        "one classification per real command, none for exits or countdown chatter"
    );

    // 3. The cancelled session made it to disk.
    let reloaded = ActivityLog::load(&PreferenceStore::open(dir.path()), LOG_FILE, 500);
    assert_eq!(reloaded.len(), 1);
    assert_eq!(reloaded.entries()[0].kind, "focus");
    assert_eq!(reloaded.entries()[0].details, "cancelled session");
    assert_eq!(reloaded.entries()[0].value, None);
}

#[tokio::test]
async fn test_llm_outage_degrades_to_keyword_routing() {
    let router = IntentRouter::new(focus_schema(), Lexicon::default())
        .with_classifier(Arc::new(FailingClassifier));
    let link = ScriptedLink::new(vec![Some("please start a focus session"), Some("bye")]);
    let handler = RecordingHandler { handled: Vec::new() };
    let mut driver = SessionDriver::new(router, link, handler, flow_config());

    let outcome = driver.run().await;

    assert_eq!(outcome, SessionOutcome::Exited, "a dead LLM must not end the session");
    assert_eq!(driver.handler.handled.len(), 1);
    assert_eq!(driver.handler.handled[0].intent, "start_focus");
    assert_eq!(driver.handler.handled[0].source, IntentSource::Keyword);
    assert_eq!(driver.link.spoken, vec!["welcome", "ok", "bye now"]);
}

#[tokio::test]
async fn test_external_cancel_unwinds_countdown_and_exits() {
    let dir = tempdir().expect("tempdir");
    let store = PreferenceStore::open(dir.path());

    // The handler's token is already cancelled; the driver's is not.
    let interrupted = CancellationToken::new();
    interrupted.cancel();

    let classifier = ScriptedClassifier::new(vec![
        "{\"intent\": \"start_focus\", \"confidence\": 0.9, \"minutes\": 5}",
    ]);
    let router = IntentRouter::new(focus_schema(), Lexicon::default())
        .with_classifier(classifier);
    let handler = FocusFlowHandler {
        store,
        log: ActivityLog::new(500),
        lexicon: Lexicon::default(),
        cancel: interrupted,
    };
    let link = ScriptedLink::new(vec![Some("deep work for five minutes")]);
    let mut driver = SessionDriver::new(router, link, handler, flow_config());

    let outcome = driver.run().await;

    assert_eq!(outcome, SessionOutcome::Exited);
    assert_eq!(
        driver.link.spoken,
        vec!["welcome", "Starting a 5 minute session.", "bye now"]
    );
    assert!(
        !dir.path().join(LOG_FILE).exists(),
        "an interrupted session logs nothing"
    );
}
