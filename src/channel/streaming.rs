//! Response channel that streams a handler's output to the relay.

use crate::channel::frame::ResponseMetadata;
use crate::channel::relay::{ChannelEvents, ChannelState, RelayConnection};
use crate::channel::sink::ResponseSink;
use crate::error::StreamError;
use crate::http::StatusCode;
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use tracing::{debug, warn};

/// A [`ResponseSink`] that frames metadata and body onto one relay
/// connection.
///
/// The channel owns the connection; there is exactly one per invocation.
#[derive(Debug)]
pub struct StreamingChannel {
    metadata: ResponseMetadata,
    metadata_sent: bool,
    connection: RelayConnection,
}

impl StreamingChannel {
    /// Open a channel streaming to `url`.
    pub fn connect(client: &Client, url: &str, high_water_mark: usize) -> Result<Self, StreamError> {
        let connection = RelayConnection::open(client, url, high_water_mark)?;
        Ok(Self {
            metadata: ResponseMetadata::default(),
            metadata_sent: false,
            connection,
        })
    }

    pub fn url(&self) -> &str {
        self.connection.url().as_str()
    }

    /// Subscribe to the connection's terminal state.
    pub fn events(&self) -> ChannelEvents {
        self.connection.events()
    }

    pub fn state(&self) -> ChannelState {
        self.connection.state()
    }

    pub fn metadata_sent(&self) -> bool {
        self.metadata_sent
    }

    /// Metadata as it stands now. After the first write this is the
    /// metadata that was transmitted.
    pub fn metadata(&self) -> &ResponseMetadata {
        &self.metadata
    }

    /// Drop the relay connection without completing the stream.
    pub fn abort(&mut self, reason: &str) {
        self.connection.abort(reason);
    }

    fn send_metadata(&mut self) -> Result<(), StreamError> {
        let frame = self
            .metadata
            .encode()
            .map_err(|e| StreamError::ChannelTransport(e.to_string()))?;
        self.connection.send(frame)?;
        self.metadata_sent = true;
        debug!(
            "Sent response metadata to {} (status {}, {} headers)",
            self.connection.url(),
            self.metadata.status_code.0,
            self.metadata.headers.len()
        );
        Ok(())
    }
}

#[async_trait]
impl ResponseSink for StreamingChannel {
    fn set_header(&mut self, name: &str, value: &str) {
        if self.metadata_sent {
            warn!(header = name, "Header set after the first write is not sent");
            return;
        }
        self.metadata.headers.insert(name, value);
    }

    fn set_status(&mut self, status: StatusCode) {
        if self.metadata_sent {
            warn!(status = status.0, "Status set after the first write is not sent");
            return;
        }
        self.metadata.status_code = status;
    }

    fn write(&mut self, chunk: &[u8]) -> Result<bool, StreamError> {
        if !self.metadata_sent {
            self.send_metadata()?;
        }
        self.connection.send(Bytes::copy_from_slice(chunk))
    }

    fn end(&mut self) {
        self.connection.finish();
    }

    async fn drained(&self) {
        self.connection.drained().await
    }
}
