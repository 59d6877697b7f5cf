//! Error types for signaling sessions

use thiserror::Error;

/// Result type alias for signaling operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for signaling sessions
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration validation error
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Wire text that is not a well-formed signaling envelope (or an
    /// envelope that cannot be serialized)
    #[error("Malformed envelope: {0}")]
    Decode(String),

    /// Envelope whose `action` value is not part of the protocol
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A media peer operation (description/answer/candidate) was rejected
    #[error("Negotiation step failed: {0}")]
    Negotiation(String),

    /// The signaling channel is gone; the session is terminal
    #[error("Signaling transport closed")]
    TransportClosed,

    /// WebSocket establishment or I/O error
    #[error("WebSocket error: {0}")]
    WebSocket(String),
}
