//! Single-assignment completion cell for an invocation.

use crate::http::Outcome;
use std::fmt;
use std::sync::OnceLock;
use tokio::sync::Notify;
use tracing::debug;

/// Signals that may settle an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    ChannelFinished,
    ChannelErrored,
    HandlerCompleted,
    HandlerFailed,
    TimedOut,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::ChannelFinished => "channel finished",
            Signal::ChannelErrored => "channel errored",
            Signal::HandlerCompleted => "handler completed",
            Signal::HandlerFailed => "handler failed",
            Signal::TimedOut => "timed out",
        };
        f.write_str(name)
    }
}

/// Holds the outcome of one invocation.
///
/// Shared between the wrapper and the task watching the relay connection.
/// The first call to [`resolve`](Self::resolve) wins. Every later call is a
/// no-op that returns `false`.
#[derive(Debug, Default)]
pub struct CompletionGate {
    settled: OnceLock<(Signal, Outcome)>,
    notify: Notify,
}

impl CompletionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Settle the invocation with `outcome` unless already settled.
    pub fn resolve(&self, signal: Signal, outcome: Outcome) -> bool {
        match self.settled.set((signal, outcome)) {
            Ok(()) => {
                self.notify.notify_waiters();
                true
            }
            Err(_) => {
                debug!(
                    "Ignoring '{}': invocation already settled by '{}'",
                    signal,
                    self.winner().map(|s| s.to_string()).unwrap_or_default()
                );
                false
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled.get().is_some()
    }

    /// The signal that settled the invocation.
    pub fn winner(&self) -> Option<Signal> {
        self.settled.get().map(|(signal, _)| *signal)
    }

    pub fn outcome(&self) -> Option<&Outcome> {
        self.settled.get().map(|(_, outcome)| outcome)
    }

    /// Wait until some signal has settled the invocation.
    pub async fn settled(&self) -> Outcome {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some((_, outcome)) = self.settled.get() {
                return outcome.clone();
            }
            notified.await;
        }
    }
}
