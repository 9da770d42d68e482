//! Streaming handler trait and invocation context.

use crate::channel::ResponseSink;
use crate::error::HandlerError;
use crate::http::{InvocationEvent, Outcome};
use async_trait::async_trait;
use std::collections::HashMap;

/// Execution context for one invocation.
#[derive(Debug, Clone, Default)]
pub struct InvocationContext {
    /// Environment variables available to the handler.
    pub env: HashMap<String, String>,
    /// Name the handler is registered under.
    pub function_name: String,
    /// Relay request id of this invocation.
    pub request_id: String,
}

impl InvocationContext {
    pub fn new(function_name: impl Into<String>, request_id: impl Into<String>) -> Self {
        Self {
            env: HashMap::new(),
            function_name: function_name.into(),
            request_id: request_id.into(),
        }
    }

    /// Add an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn get_env(&self, key: &str) -> Option<&String> {
        self.env.get(key)
    }
}

/// Host-provided completion callback, passed through to the handler
/// untouched.
pub type CompletionCallback = Box<dyn FnOnce(Outcome) + Send>;

/// A handler that streams its response instead of returning it.
///
/// The handler writes to `response`; returning `Ok(())` ends the stream.
/// A handler with nothing to stream may return right away: the stream is
/// still ended and the invocation succeeds.
#[async_trait]
pub trait StreamingHandler: Send + Sync {
    async fn handle(
        &self,
        event: InvocationEvent,
        response: &mut dyn ResponseSink,
        ctx: &InvocationContext,
        callback: Option<CompletionCallback>,
    ) -> Result<(), HandlerError>;

    /// Name the handler is registered under by default.
    fn name(&self) -> &str;
}
