//! # Playback Error Types
//!
//! Errors surfaced by the load orchestrator and by backend connections.
//!
//! Attempt-level failures never escape a load: they are recorded in the
//! error cache and reported through `LoadOutcome::Failed`. The variants here
//! are the ones that abort a call outright, plus the errors a `Connection`
//! implementation returns from `create` (which the orchestrator turns into
//! attempt failures).

use thiserror::Error;

/// Errors that can occur during playback operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Request Errors
    // ========================================================================
    /// The url input rejected, was empty, or contained an unusable locator.
    #[error("Could not resolve urls: {0}")]
    Resolution(String),

    /// A control was invoked with no current sound.
    #[error("Cannot {operation}: no current sound")]
    Precondition { operation: &'static str },

    /// The system volume must be between 0 and 100.
    #[error("Invalid volume: {0} (must be between 0 and 100)")]
    InvalidVolume(u8),

    // ========================================================================
    // Connection Errors
    // ========================================================================
    /// No connections are configured, so nothing can be attempted.
    #[error("No connections configured")]
    NoConnections,

    /// A configured connection name has no matching implementation.
    #[error("Unknown connection: {0}")]
    UnknownConnection(String),

    /// A connection rejected its options during activation.
    #[error("Connection {name} failed to set up: {message}")]
    ConnectionSetup { name: String, message: String },

    // ========================================================================
    // Backend Errors (returned by `Connection::create`)
    // ========================================================================
    /// Failed to open the audio source.
    #[error("Failed to open audio source: {0}")]
    SourceError(String),

    /// Audio source is unavailable (e.g., network error, 404).
    #[error("Audio source unavailable: {0}")]
    SourceUnavailable(String),

    /// The backend cannot play this media type.
    #[error("Unsupported audio format: {0}")]
    UnsupportedFormat(String),

    // ========================================================================
    // Generic Errors
    // ========================================================================
    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    /// Internal error (should not occur in normal operation).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Returns `true` if the call failed because nothing was current.
    pub fn is_precondition(&self) -> bool {
        matches!(self, PlaybackError::Precondition { .. })
    }

    /// Returns `true` if the error comes from how the core was configured
    /// rather than from the request.
    pub fn is_configuration_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::NoConnections
                | PlaybackError::UnknownConnection(_)
                | PlaybackError::ConnectionSetup { .. }
                | PlaybackError::Config(_)
        )
    }

    /// Returns `true` if a different url or connection might succeed.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PlaybackError::SourceError(_)
                | PlaybackError::SourceUnavailable(_)
                | PlaybackError::UnsupportedFormat(_)
        )
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
