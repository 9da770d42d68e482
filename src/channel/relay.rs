//! Outbound connection to the relay service.
//!
//! Each connection is one streaming `POST` whose body is fed from an
//! in-memory queue. A dedicated task drives the request; it is the only
//! place the socket is touched, and it publishes the terminal state of the
//! connection through a watch channel.

use crate::error::StreamError;
use bytes::Bytes;
use reqwest::{Client, Url};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Path prefix under which the relay accepts streams.
pub const STREAM_PATH: &str = "/.stream/";

/// Build the relay URL for a request id.
pub fn relay_url(base: &str, request_id: &str) -> String {
    format!("{}{}{}", base.trim_end_matches('/'), STREAM_PATH, request_id)
}

/// Build the HTTP client used for relay connections.
///
/// No overall request timeout is set: relay streams live as long as the
/// handler keeps writing. The invocation timeout bounds them instead.
pub fn build_relay_client() -> Result<Client, StreamError> {
    Client::builder()
        .pool_max_idle_per_host(0)
        .build()
        .map_err(|e| StreamError::ChannelConstruction(e.to_string()))
}

/// Lifecycle of a relay connection as seen by observers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelState {
    /// Accepting writes.
    Open,
    /// The body was ended and the relay answered with a success status.
    Finished,
    /// The connection failed or was aborted.
    Errored(String),
}

impl ChannelState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ChannelState::Open)
    }
}

/// Observer for the terminal state of a relay connection.
#[derive(Debug, Clone)]
pub struct ChannelEvents {
    rx: watch::Receiver<ChannelState>,
}

impl ChannelEvents {
    /// Wait for `Finished` or `Errored`. Resolves immediately if the
    /// connection already reached either.
    pub async fn terminal(&mut self) -> ChannelState {
        match self.rx.wait_for(ChannelState::is_terminal).await {
            Ok(state) => state.clone(),
            Err(_) => ChannelState::Errored("relay connection dropped".to_string()),
        }
    }

    /// Current state without waiting.
    pub fn current(&self) -> ChannelState {
        self.rx.borrow().clone()
    }
}

/// Bytes queued for the relay but not yet taken by the transport.
#[derive(Debug)]
struct Backlog {
    queued: AtomicUsize,
    high_water_mark: usize,
    notify: Notify,
}

impl Backlog {
    fn new(high_water_mark: usize) -> Self {
        Self {
            queued: AtomicUsize::new(0),
            high_water_mark,
            notify: Notify::new(),
        }
    }

    fn push(&self, len: usize) {
        self.queued.fetch_add(len, Ordering::SeqCst);
    }

    fn release(&self, len: usize) {
        self.queued.fetch_sub(len, Ordering::SeqCst);
        if self.within_mark() {
            self.notify.notify_waiters();
        }
    }

    fn within_mark(&self) -> bool {
        self.queued.load(Ordering::SeqCst) <= self.high_water_mark
    }
}

/// One outbound streaming request to the relay.
#[derive(Debug)]
pub struct RelayConnection {
    url: Url,
    tx: Option<mpsc::UnboundedSender<Bytes>>,
    ended: Arc<AtomicBool>,
    backlog: Arc<Backlog>,
    state: Arc<watch::Sender<ChannelState>>,
    task: JoinHandle<()>,
}

impl RelayConnection {
    /// Parse `url` and start streaming to it.
    ///
    /// Must be called from within a tokio runtime. Only `http` and `https`
    /// URLs are accepted.
    pub fn open(client: &Client, url: &str, high_water_mark: usize) -> Result<Self, StreamError> {
        let url = Url::parse(url)
            .map_err(|e| StreamError::ChannelConstruction(format!("{}: {}", url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(StreamError::ChannelConstruction(format!(
                "unsupported relay scheme '{}'",
                url.scheme()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel::<Bytes>();
        let backlog = Arc::new(Backlog::new(high_water_mark));
        let (state, _) = watch::channel(ChannelState::Open);
        let state = Arc::new(state);
        let ended = Arc::new(AtomicBool::new(false));

        let body = futures_util::stream::unfold((rx, backlog.clone()), |(mut rx, backlog)| async move {
            let chunk = rx.recv().await?;
            backlog.release(chunk.len());
            Some((Ok::<Bytes, std::io::Error>(chunk), (rx, backlog)))
        });

        let request = client
            .post(url.clone())
            .body(reqwest::Body::wrap_stream(body));

        let task = {
            let url = url.clone();
            let backlog = backlog.clone();
            let state = state.clone();
            let ended = ended.clone();
            tokio::spawn(async move {
                let next = match request.send().await {
                    Ok(response) => {
                        let status = response.status();
                        if !status.is_success() {
                            warn!(%url, %status, "Relay rejected the stream");
                            ChannelState::Errored(format!("relay rejected stream: {}", status))
                        } else if !ended.load(Ordering::SeqCst) {
                            // An answer before the body ended means the relay stopped reading.
                            warn!(%url, %status, "Relay answered before the stream ended");
                            ChannelState::Errored(format!(
                                "relay answered {} before the stream ended",
                                status
                            ))
                        } else {
                            debug!("Relay accepted stream {} ({})", url, status);
                            ChannelState::Finished
                        }
                    }
                    Err(e) => {
                        error!(%url, error = %e, "Relay connection failed");
                        ChannelState::Errored(e.to_string())
                    }
                };
                transition(&state, next);
                backlog.notify.notify_waiters();
            })
        };

        debug!("Opened relay connection to {}", url);

        Ok(Self {
            url,
            tx: Some(tx),
            ended,
            backlog,
            state,
            task,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn events(&self) -> ChannelEvents {
        ChannelEvents {
            rx: self.state.subscribe(),
        }
    }

    pub fn state(&self) -> ChannelState {
        self.state.borrow().clone()
    }

    /// Queue bytes for the relay. Returns whether the backlog is still
    /// within the high-water mark.
    pub fn send(&self, chunk: Bytes) -> Result<bool, StreamError> {
        if self.state.borrow().is_terminal() {
            return Err(StreamError::ChannelClosed);
        }
        let tx = self.tx.as_ref().ok_or(StreamError::ChannelClosed)?;
        if chunk.is_empty() {
            return Ok(self.backlog.within_mark());
        }

        let len = chunk.len();
        self.backlog.push(len);
        if tx.send(chunk).is_err() {
            self.backlog.release(len);
            return Err(StreamError::ChannelClosed);
        }
        Ok(self.backlog.within_mark())
    }

    /// Close the body. The relay sees the end of the stream once the
    /// queued bytes are flushed.
    pub fn finish(&mut self) {
        if let Some(tx) = self.tx.take() {
            self.ended.store(true, Ordering::SeqCst);
            drop(tx);
            debug!("Ending relay stream {}", self.url);
        }
    }

    /// Tear the connection down without completing the body.
    pub fn abort(&mut self, reason: &str) {
        self.tx = None;
        self.task.abort();
        if transition(&self.state, ChannelState::Errored(reason.to_string())) {
            warn!(url = %self.url, reason, "Relay connection aborted");
        }
        self.backlog.notify.notify_waiters();
    }

    /// Wait until the backlog is within the high-water mark or the
    /// connection is no longer open.
    pub async fn drained(&self) {
        loop {
            let notified = self.backlog.notify.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.backlog.within_mark() || self.state.borrow().is_terminal() {
                return;
            }
            notified.await;
        }
    }
}

/// Move an open connection to a terminal state. Terminal states are final.
fn transition(state: &watch::Sender<ChannelState>, next: ChannelState) -> bool {
    state.send_if_modified(|current| {
        if current.is_terminal() {
            false
        } else {
            *current = next;
            true
        }
    })
}
