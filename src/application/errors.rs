//! Application layer errors

use thiserror::Error;

/// Client-facing errors returned by coordinator operations.
///
/// Nothing is swallowed at this layer: every flow returns one of these so
/// the caller can act on the failure, even if it chooses not to.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Provisioning error: {0}")]
    Provisioning(#[from] ProvisioningError),

    #[error("Join error: {0}")]
    Join(String),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Room provisioning errors
#[derive(Error, Debug)]
pub enum ProvisioningError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provisioning returned no room id")]
    MissingRoomId,
}

/// Relay transport errors
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Handshake error: {0}")]
    Handshake(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Not connected")]
    NotConnected,

    #[error("No acknowledgment before the deadline")]
    AckTimeout,
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid value: {0}")]
    InvalidValue(String),

    #[error("Parse error: {0}")]
    Parse(String),
}
