pub mod router;
pub mod services;
pub mod session;
pub mod store;

// Re-export the pieces a typical ability wires together
pub use router::{IntentRouter, IntentSchema, IntentSpec, Lexicon};
pub use session::{SessionConfig, SessionDriver, SessionOutcome};
pub use store::PreferenceStore;
