//! Adapts a streaming handler to the single-outcome invocation contract.

use crate::channel::{
    build_relay_client, relay_url, ChannelEvents, ChannelState, ResponseSink, StreamingChannel,
};
use crate::error::{HandlerError, StreamError};
use crate::function::gate::{CompletionGate, Signal};
use crate::function::handler::{CompletionCallback, InvocationContext, StreamingHandler};
use crate::http::{InvocationEvent, Outcome};
use crate::runtime::StreamerConfig;
use reqwest::Client;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// How the wrapper's own wait ended.
enum Settle {
    /// Another signal settled the gate first.
    Gate,
    Handler(Result<(), HandlerError>),
    TimedOut,
}

/// Runs a [`StreamingHandler`] for one invocation at a time, streaming its
/// output to the relay and reducing everything to one [`Outcome`].
pub struct HandlerWrapper {
    handler: Arc<dyn StreamingHandler>,
    client: Client,
    config: StreamerConfig,
}

impl HandlerWrapper {
    /// Wrap a handler. Fails only if the relay HTTP client cannot be built.
    pub fn new(handler: Arc<dyn StreamingHandler>, config: StreamerConfig) -> Result<Self, StreamError> {
        Ok(Self {
            handler,
            client: build_relay_client()?,
            config,
        })
    }

    /// Wrap a handler reusing an existing relay client.
    pub fn with_client(handler: Arc<dyn StreamingHandler>, config: StreamerConfig, client: Client) -> Self {
        Self {
            handler,
            client,
            config,
        }
    }

    pub fn name(&self) -> &str {
        self.handler.name()
    }

    pub fn config(&self) -> &StreamerConfig {
        &self.config
    }

    /// Run one invocation.
    ///
    /// Never fails: every error is logged and mapped to an [`Outcome`].
    /// The relay connection and the handler race to settle one shared
    /// [`CompletionGate`]. A channel error or finish is observed before
    /// handler completion, and both before the timeout.
    pub async fn invoke(
        &self,
        event: InvocationEvent,
        mut ctx: InvocationContext,
        callback: Option<CompletionCallback>,
    ) -> Outcome {
        let Some(request_id) = event.request_id().map(str::to_owned) else {
            warn!(
                function = %ctx.function_name,
                "Rejecting invocation: {}",
                StreamError::MissingRequestId
            );
            return Outcome::from(&StreamError::MissingRequestId);
        };
        if ctx.request_id.is_empty() {
            ctx.request_id = request_id.clone();
        }

        let url = relay_url(&self.config.relay_base_url, &request_id);
        let mut channel = match StreamingChannel::connect(&self.client, &url, self.config.high_water_mark) {
            Ok(channel) => channel,
            Err(e) => {
                error!(request_id = %request_id, error = %e, "Could not open relay channel");
                return Outcome::from(&e);
            }
        };

        debug!(
            "Invoking '{}' streaming to {} [{}]",
            self.handler.name(),
            channel.url(),
            request_id
        );

        let gate = Arc::new(CompletionGate::new());
        watch_channel(channel.events(), gate.clone(), request_id.clone());
        let deadline = self.config.request_timeout();

        let settled = {
            let handled = self.handler.handle(event, &mut channel, &ctx, callback);
            let timeout = async {
                match deadline {
                    Some(limit) => tokio::time::sleep(limit).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                biased;
                _ = gate.settled() => Settle::Gate,
                result = handled => Settle::Handler(result),
                _ = timeout => Settle::TimedOut,
            }
        };

        match settled {
            Settle::Gate => {}
            Settle::Handler(Ok(())) => {
                channel.end();
                gate.resolve(Signal::HandlerCompleted, Outcome::ok());
            }
            Settle::Handler(Err(e)) => {
                let err = StreamError::from(e);
                error!(request_id = %request_id, error = %err, "Streaming handler failed");
                gate.resolve(Signal::HandlerFailed, Outcome::from(&err));
                channel.abort("handler failed");
            }
            Settle::TimedOut => {
                let err = StreamError::Timeout(self.config.request_timeout_ms);
                error!(request_id = %request_id, error = %err, "Invocation timed out");
                gate.resolve(Signal::TimedOut, Outcome::from(&err));
                channel.abort("invocation timed out");
            }
        }

        let outcome = gate.outcome().cloned().unwrap_or_else(Outcome::server_error);
        info!(
            request_id = %request_id,
            status = outcome.status_code.0,
            "Invocation of '{}' settled ({})",
            self.handler.name(),
            gate.winner().map(|s| s.to_string()).unwrap_or_default()
        );
        outcome
    }
}

/// Settle `gate` from the relay connection's terminal state.
///
/// The task outlives the invocation when the handler settles first: the
/// relay's late answer then reaches the gate as a no-op.
fn watch_channel(mut events: ChannelEvents, gate: Arc<CompletionGate>, request_id: String) {
    tokio::spawn(async move {
        let state = events.terminal().await;
        let (signal, outcome) = match &state {
            ChannelState::Errored(reason) => (
                Signal::ChannelErrored,
                Outcome::from(&StreamError::ChannelTransport(reason.clone())),
            ),
            _ => (Signal::ChannelFinished, Outcome::ok()),
        };

        let won = gate.resolve(signal, outcome);
        if let ChannelState::Errored(reason) = state {
            if won {
                error!(request_id = %request_id, error = %reason, "Relay channel failed");
            } else if gate.winner() == Some(Signal::HandlerCompleted) {
                warn!(
                    request_id = %request_id,
                    error = %reason,
                    "Relay did not accept the stream after the invocation settled"
                );
            }
        }
    });
}
