use async_trait::async_trait;
use std::time::Duration;

/// The session's only window to the outside world: say something, hear
/// something, hand control back when done.
///
/// `listen` resolves to Ok(None) when the window elapsed with nothing
/// usable (timeout, silence, empty transcription). Errors are reserved for
/// a broken transport, not for the user staying quiet.
#[async_trait]
pub trait VoiceLink: Send {
    async fn speak(&mut self, text: &str) -> anyhow::Result<()>;

    /// Wait up to `timeout` (forever when None) for one utterance.
    async fn listen(&mut self, timeout: Option<Duration>) -> anyhow::Result<Option<String>>;

    /// Return the microphone to the host runtime. The driver calls this
    /// exactly once at teardown. Default is a no-op for links with no host.
    async fn resume_host(&mut self) -> anyhow::Result<()> {
        Ok(())
    }
}
