//! The single value an invocation returns to the host runtime.

use serde::{Deserialize, Serialize};

/// HTTP status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusCode(pub u16);

impl StatusCode {
    pub const OK: StatusCode = StatusCode(200);
    pub const NOT_FOUND: StatusCode = StatusCode(404);
    pub const BAD_REQUEST: StatusCode = StatusCode(400);
    pub const UNPROCESSABLE_ENTITY: StatusCode = StatusCode(422);
    pub const INTERNAL_SERVER_ERROR: StatusCode = StatusCode(500);

    /// Check if the status code indicates success (2xx).
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.0)
    }

    pub fn is_client_error(&self) -> bool {
        (400..500).contains(&self.0)
    }

    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.0)
    }
}

impl Default for StatusCode {
    fn default() -> Self {
        StatusCode::OK
    }
}

impl From<u16> for StatusCode {
    fn from(code: u16) -> Self {
        StatusCode(code)
    }
}

impl From<StatusCode> for u16 {
    fn from(code: StatusCode) -> Self {
        code.0
    }
}

/// Status/body pair handed back to the host runtime, one per invocation.
///
/// Only three values are ever produced by the wrapper: [`Outcome::ok`],
/// [`Outcome::client_error`] and [`Outcome::server_error`]. Error detail is
/// logged, never placed in the body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub status_code: StatusCode,
    pub body: String,
}

impl Outcome {
    pub fn new(status_code: impl Into<StatusCode>, body: impl Into<String>) -> Self {
        Self {
            status_code: status_code.into(),
            body: body.into(),
        }
    }

    /// The stream was relayed successfully.
    pub fn ok() -> Self {
        Self::new(StatusCode::OK, "OK")
    }

    /// The event carried no request id.
    pub fn client_error() -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, "Missing request id")
    }

    /// Anything else went wrong.
    pub fn server_error() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    }
}

impl Default for Outcome {
    fn default() -> Self {
        Self::ok()
    }
}

impl From<&crate::error::StreamError> for Outcome {
    fn from(err: &crate::error::StreamError) -> Self {
        match err {
            crate::error::StreamError::MissingRequestId => Outcome::client_error(),
            _ => Outcome::server_error(),
        }
    }
}
