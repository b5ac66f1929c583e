use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::router::{IntentResult, IntentRouter, EXIT_INTENT};

use super::io::VoiceLink;

/// Everything the driver says on its own behalf, plus the loop bounds.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Routed as the first turn when the session was opened by a trigger
    /// phrase that already carried a command ("ask colloquy to start a
    /// focus session").
    pub initial_utterance: Option<String>,
    pub greeting: Option<String>,
    pub reprompt: String,
    pub sign_off: String,
    pub apology: String,
    /// Consecutive empty turns before the reprompt fires.
    pub idle_threshold: u32,
    /// Hard bound on turns per session.
    pub max_turns: u32,
    pub listen_timeout: Option<Duration>,
    /// Utterances of at most this many words that matched nothing get one
    /// LLM yes/no check for "was that a goodbye". 0 disables.
    pub llm_exit_check_max_words: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            initial_utterance: None,
            greeting: Some("I'm listening. What would you like to do?".to_string()),
            reprompt: "Still here if you need me. Otherwise I'll close.".to_string(),
            sign_off: "Okay, goodbye for now.".to_string(),
            apology: "Something went wrong on my end. Closing for now.".to_string(),
            idle_threshold: 2,
            max_turns: 20,
            listen_timeout: Some(Duration::from_secs(30)),
            llm_exit_check_max_words: 4,
        }
    }
}

/// Where the loop currently is. Terminal phases stick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    AwaitingInput,
    Classifying,
    Dispatching,
    Exited,
    ErrorExited,
}

/// How the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Exited,
    ErrorExited,
}

/// A handler's vote on whether the loop keeps going.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// Receives every routed intent. Handlers speak through the link they are
/// handed and report errors up; the driver owns recovery.
#[async_trait]
pub trait IntentHandler: Send {
    async fn handle(
        &mut self,
        result: &IntentResult,
        link: &mut dyn VoiceLink,
    ) -> anyhow::Result<Flow>;
}

/// Runs one conversation end to end.
///
/// The cycle is listen, classify, dispatch, repeat, bounded by `max_turns`.
/// Exit phrases win over everything else. Whatever path the session takes
/// out of `run` (clean exit, idle timeout, handler error, external cancel),
/// the link's `resume_host` teardown runs exactly once.
pub struct SessionDriver<L: VoiceLink, H: IntentHandler> {
    pub router: IntentRouter,
    pub link: L,
    pub handler: H,
    pub config: SessionConfig,
    phase: SessionPhase,
    teardown_done: bool,
    cancel: CancellationToken,
}

impl<L: VoiceLink, H: IntentHandler> SessionDriver<L, H> {
    pub fn new(router: IntentRouter, link: L, handler: H, config: SessionConfig) -> Self {
        Self {
            router,
            link,
            handler,
            config,
            phase: SessionPhase::AwaitingInput,
            teardown_done: false,
            cancel: CancellationToken::new(),
        }
    }

    /// Share an external cancellation token (the host's kill switch).
    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive the conversation to completion. Never returns an error: a
    /// crashed session apologizes, tears down, and reports `ErrorExited`.
    pub async fn run(&mut self) -> SessionOutcome {
        let outcome = match self.drive().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("session error: {e:#}");
                self.phase = SessionPhase::ErrorExited;
                // Best effort. The link itself may be what broke.
                if let Err(speak_err) = self.link.speak(&self.config.apology).await {
                    warn!("could not deliver apology: {speak_err:#}");
                }
                SessionOutcome::ErrorExited
            }
        };
        self.teardown().await;
        outcome
    }

    async fn teardown(&mut self) {
        if self.teardown_done {
            return;
        }
        self.teardown_done = true;
        debug!("session teardown");
        if let Err(e) = self.link.resume_host().await {
            warn!("failed to resume host listener: {e:#}");
        }
    }

    async fn drive(&mut self) -> anyhow::Result<SessionOutcome> {
        if let Some(opening) = self.config.initial_utterance.clone() {
            info!("routing trigger utterance");
            if let Some(outcome) = self.take_turn(&opening).await? {
                return Ok(outcome);
            }
        }

        if let Some(greeting) = self.config.greeting.clone() {
            self.link.speak(&greeting).await?;
        }

        let mut idle_count: u32 = 0;
        for turn in 0..self.config.max_turns {
            if self.cancel.is_cancelled() {
                info!("session cancelled externally");
                return self.finish().await;
            }

            self.phase = SessionPhase::AwaitingInput;
            let heard = self.link.listen(self.config.listen_timeout).await?;
            let utterance = match heard.filter(|u| !u.trim().is_empty()) {
                Some(u) => u,
                None => {
                    idle_count += 1;
                    debug!(turn, idle_count, "nothing heard");
                    if idle_count < self.config.idle_threshold {
                        continue;
                    }
                    // Idle ladder tripped: check in once, then either close
                    // or carry the reply into this turn.
                    self.link.speak(&self.config.reprompt).await?;
                    let retry = self.link.listen(self.config.listen_timeout).await?;
                    match retry.filter(|u| !u.trim().is_empty()) {
                        None => return self.finish().await,
                        Some(reply) if self.router.lexicon.is_exit(&reply) => {
                            return self.finish().await;
                        }
                        Some(reply) => {
                            idle_count = 0;
                            reply
                        }
                    }
                }
            };
            idle_count = 0;

            if let Some(outcome) = self.take_turn(&utterance).await? {
                return Ok(outcome);
            }
        }

        info!("turn cap reached, closing session");
        self.finish().await
    }

    /// One classify/dispatch cycle. Some(outcome) ends the session.
    async fn take_turn(&mut self, utterance: &str) -> anyhow::Result<Option<SessionOutcome>> {
        self.phase = SessionPhase::Classifying;

        if self.router.lexicon.is_exit(utterance) {
            return self.finish().await.map(Some);
        }

        // Short mumbles like "that's enough now" slip past the lexicon;
        // give the LLM one yes/no shot at them before classifying.
        let word_count = crate::router::lexicon::normalize(utterance)
            .split_whitespace()
            .count();
        if word_count > 0
            && word_count <= self.config.llm_exit_check_max_words
            && self.router.confirm_exit_with_llm(utterance).await
        {
            return self.finish().await.map(Some);
        }

        let result = self.router.route(utterance).await;
        if result.intent == EXIT_INTENT {
            return self.finish().await.map(Some);
        }
        info!(
            intent = %result.intent,
            confidence = result.confidence,
            source = ?result.source,
            "dispatching"
        );

        self.phase = SessionPhase::Dispatching;
        match self.handler.handle(&result, &mut self.link).await {
            Ok(Flow::Continue) => Ok(None),
            Ok(Flow::Exit) => self.finish().await.map(Some),
            Err(e) => {
                error!("handler failed for intent '{}': {e:#}", result.intent);
                self.link.speak(&self.config.apology).await?;
                self.phase = SessionPhase::ErrorExited;
                Ok(Some(SessionOutcome::ErrorExited))
            }
        }
    }

    async fn finish(&mut self) -> anyhow::Result<SessionOutcome> {
        self.link.speak(&self.config.sign_off).await?;
        self.phase = SessionPhase::Exited;
        Ok(SessionOutcome::Exited)
    }
}
