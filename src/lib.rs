//! parley - a real-time room chat participant client
//!
//! Connects to a message relay, coordinates the two-phase room join
//! (provision over HTTP, then the join handshake over the relay channel)
//! and keeps the room state in sync: the ordered message log and the
//! per-user typing presence, with debounced typing signals for the local
//! user.

pub mod application;
pub mod domain;
pub mod infrastructure;
