//! Typing presence - local debouncing and the remote typing set

pub mod debouncer;
pub mod tracker;

pub use debouncer::{TypingDebouncer, TypingSignal, DEFAULT_IDLE_TIMEOUT};
pub use tracker::PresenceTracker;
