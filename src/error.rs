//! Error types for the control plane.

/// Top-level error type for the character control plane.
#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    /// Malformed or out-of-range input from a caller.
    #[error("validation error: {0}")]
    Validation(String),

    /// Agent, TTS or ASR collaborator failure.
    #[error("external service error: {0}")]
    ExternalService(String),

    /// Outbound channel full on a direct-reply path.
    #[error("backpressure: {0}")]
    Backpressure(String),

    /// Producer observed a closed outbound channel.
    #[error("session closed: {0}")]
    SessionClosed(String),

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Autonomous scheduler error.
    #[error("scheduler error: {0}")]
    Scheduler(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, ControlError>;
