//! The writable response surface handed to streaming handlers.

use crate::error::StreamError;
use crate::http::StatusCode;
use async_trait::async_trait;

/// Write-only response sink.
///
/// Headers and status are buffered until the first [`write`](Self::write);
/// at that point they are sent once, ahead of the body, and further changes
/// have no effect.
#[async_trait]
pub trait ResponseSink: Send + Sync {
    /// Store or overwrite a response header.
    fn set_header(&mut self, name: &str, value: &str);

    /// Set the response status code. Defaults to 200.
    fn set_status(&mut self, status: StatusCode);

    /// Forward body bytes.
    ///
    /// Returns `Ok(false)` when the transport has a backlog and the caller
    /// should await [`drained`](Self::drained) before writing more. The
    /// bytes are queued either way.
    fn write(&mut self, chunk: &[u8]) -> Result<bool, StreamError>;

    /// Signal that no more bytes will be written.
    fn end(&mut self);

    /// Wait until the transport backlog is back within its high-water mark.
    async fn drained(&self);
}
