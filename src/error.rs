//! Unified error handling for the off-route monitor.
//!
//! Startup problems (unreadable configuration, an empty track, a malformed
//! roster) are fatal. Everything that can fail while a poll cycle is running
//! maps onto the HTTP and gateway variants so the daemon can log the cycle
//! and try again on the next tick.

use thiserror::Error;

/// Unified error type for monitor operations.
#[derive(Debug, Clone, Error)]
pub enum MonitorError {
    /// Route profile built from an empty point set
    #[error("Route has no points")]
    EmptyRoute,

    /// GPX track file could not be read or parsed
    #[error("Track file error: {message}")]
    TrackFile { message: String },

    /// Configuration file missing, unreadable, or incomplete
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// Participant roster missing or malformed
    #[error("Participant roster error: {message}")]
    Roster { message: String },

    /// Position source returned a non-success status
    #[error("Request failed ({status}): {url} {body}")]
    HttpStatus { url: String, status: u16, body: String },

    /// Position source unreachable or its response unreadable
    #[error("Request error: {message}")]
    HttpTransport { message: String },

    /// SMS gateway returned a non-success status
    #[error("SMS gateway failed ({status}): {body}")]
    GatewayStatus { status: u16, body: String },

    /// SMS gateway request could not be built or sent
    #[error("SMS gateway error: {message}")]
    Gateway { message: String },
}

/// Result type alias for monitor operations.
pub type Result<T> = std::result::Result<T, MonitorError>;
