pub mod activity;
pub mod prefs;

pub use activity::{ActivityEntry, ActivityLog, DEFAULT_MAX_ENTRIES};
pub use prefs::{merge_defaults, PreferenceStore, StoreError};
