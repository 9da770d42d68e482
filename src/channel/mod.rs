//! Relay channel: framing, the outbound connection and the sink handlers
//! write to.

pub mod frame;
pub mod relay;
mod sink;
mod streaming;

pub use frame::{split_frame, HeaderMap, ResponseMetadata, METADATA_DELIMITER};
pub use relay::{build_relay_client, relay_url, ChannelEvents, ChannelState, RelayConnection};
pub use sink::ResponseSink;
pub use streaming::StreamingChannel;
