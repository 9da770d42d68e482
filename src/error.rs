//! Error types for streaming invocations.

use thiserror::Error;

/// Failures of the relay channel or of the invocation wrapper.
///
/// None of these ever reach the host runtime directly; the wrapper maps
/// each of them onto an [`Outcome`](crate::http::Outcome).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("Missing request id header")]
    MissingRequestId,

    #[error("Failed to construct relay channel: {0}")]
    ChannelConstruction(String),

    #[error("Relay transport error: {0}")]
    ChannelTransport(String),

    #[error("Handler failed: {0}")]
    Handler(#[from] HandlerError),

    #[error("Relay channel is closed")]
    ChannelClosed,

    #[error("Invocation timed out after {0} ms")]
    Timeout(u64),
}

impl StreamError {
    /// HTTP-equivalent status the wrapper reports for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            StreamError::MissingRequestId => 422,
            _ => 500,
        }
    }
}

/// Error returned by a streaming handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerError {
    /// Error message.
    pub message: String,
    /// Error code, informational only; every handler failure is a 500.
    pub code: u16,
}

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: 500,
        }
    }

    pub fn with_code(code: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code,
        }
    }
}

impl std::fmt::Display for HandlerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

impl std::error::Error for HandlerError {}

impl From<std::io::Error> for HandlerError {
    fn from(err: std::io::Error) -> Self {
        HandlerError::new(err.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        HandlerError::with_code(400, err.to_string())
    }
}

impl From<StreamError> for HandlerError {
    fn from(err: StreamError) -> Self {
        HandlerError::with_code(err.status_code(), err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(StreamError::MissingRequestId.status_code(), 422);
        assert_eq!(StreamError::ChannelClosed.status_code(), 500);
        assert_eq!(
            StreamError::ChannelTransport("reset".into()).status_code(),
            500
        );
    }

    #[test]
    fn test_handler_error_display() {
        let err = HandlerError::with_code(503, "upstream gone");
        assert_eq!(err.to_string(), "[503] upstream gone");
    }

    #[test]
    fn test_stream_error_into_handler_error() {
        let err: HandlerError = StreamError::ChannelClosed.into();
        assert_eq!(err.code, 500);
        assert_eq!(err.message, "Relay channel is closed");
    }
}
