pub mod countdown;
pub mod driver;
pub mod io;

pub use countdown::{format_remaining, run_countdown, CountdownConfig, CountdownEnd, MidCommand};
pub use driver::{Flow, IntentHandler, SessionConfig, SessionDriver, SessionOutcome, SessionPhase};
pub use io::VoiceLink;
