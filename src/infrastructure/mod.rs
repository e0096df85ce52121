//! Infrastructure layer - External concerns
//!
//! This layer contains:
//! - Config: Configuration loading
//! - Provisioning: HTTP client for the room provisioning service
//! - Relay: transports for the relay event channel

pub mod config;
pub mod provisioning;
pub mod relay;
