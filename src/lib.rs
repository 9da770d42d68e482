//! # streamrelay - streamed responses from request/response functions
//!
//! A serverless function normally returns one finished response. `streamrelay`
//! lets a handler stream instead: its output is written to a second,
//! outbound HTTP connection to a relay service, keyed by the request id the
//! platform puts in the `x-nf-request-id` header. The relay forwards the
//! bytes to the real client. The invocation itself only returns a small
//! [`Outcome`] telling the host whether streaming worked.
//!
//! ## Architecture
//!
//! ```text
//!   client ──► host runtime ──► HandlerWrapper ──► StreamingHandler
//!                   ▲                 │                   │ write()
//!                   │ Outcome         ▼                   ▼
//!                   └──────────  CompletionGate   StreamingChannel
//!                                                         │ POST /.stream/<id>
//!                                                         ▼
//!   client ◄──────────────────────────────────────── relay service
//! ```
//!
//! ## Framing
//!
//! The relay receives one byte stream per request:
//!
//! ```text
//! {"headers":{...},"statusCode":200} 0x00 <body bytes...>
//! ```
//!
//! Headers and status are captured when the handler first writes.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use streamrelay::prelude::*;
//! use std::sync::Arc;
//!
//! struct Countdown;
//!
//! #[async_trait]
//! impl StreamingHandler for Countdown {
//!     async fn handle(
//!         &self,
//!         _event: InvocationEvent,
//!         response: &mut dyn ResponseSink,
//!         _ctx: &InvocationContext,
//!         _callback: Option<CompletionCallback>,
//!     ) -> Result<(), HandlerError> {
//!         response.set_header("content-type", "text/plain");
//!         for n in (1..=3).rev() {
//!             if !response.write(format!("{}\n", n).as_bytes())? {
//!                 response.drained().await;
//!             }
//!         }
//!         Ok(())
//!     }
//!
//!     fn name(&self) -> &str {
//!         "countdown"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//!     let server = HostServer::with_defaults()?;
//!     server.register_handler("countdown", Arc::new(Countdown)).await?;
//!     server.run().await
//! }
//! ```

pub mod channel;
pub mod error;
pub mod function;
pub mod http;
pub mod runtime;

/// Re-export commonly used types.
pub mod prelude {
    pub use crate::channel::{ResponseSink, StreamingChannel};
    pub use crate::error::{HandlerError, StreamError};
    pub use crate::function::{
        CompletionCallback, HandlerRegistry, HandlerWrapper, InvocationContext, StreamingHandler,
    };
    pub use crate::http::{InvocationEvent, Outcome, StatusCode, REQUEST_ID_HEADER};
    pub use crate::runtime::{HostServer, StreamerConfig};
    pub use async_trait::async_trait;
    pub use streamrelay_macro::streaming_handler;
}

pub use channel::{ResponseSink, StreamingChannel};
pub use error::{HandlerError, StreamError};
pub use function::{HandlerWrapper, InvocationContext, StreamingHandler};
pub use http::{InvocationEvent, Outcome};
pub use runtime::{HostServer, StreamerConfig};
