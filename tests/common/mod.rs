//! Mock relays shared by the integration tests.

#![allow(dead_code)]

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use std::time::Duration;
use streamrelay::channel::METADATA_DELIMITER;
use streamrelay::prelude::*;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};

/// One stream as received by the mock relay.
#[derive(Debug)]
pub struct RecordedStream {
    pub path: String,
    pub body: Bytes,
}

/// Relay that collects each request body and reports it once complete.
pub async fn spawn_relay() -> (String, mpsc::UnboundedReceiver<RecordedStream>) {
    spawn_relay_with_status(200).await
}

/// Like [`spawn_relay`], answering every complete stream with `status`.
pub async fn spawn_relay_with_status(
    status: u16,
) -> (String, mpsc::UnboundedReceiver<RecordedStream>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let tx = tx.clone();
                    async move {
                        let path = req.uri().path().to_string();
                        let body = req.collect().await?.to_bytes();
                        let _ = tx.send(RecordedStream { path, body });
                        let response = Response::builder()
                            .status(status)
                            .body(Full::new(Bytes::from_static(b"OK")))
                            .unwrap();
                        Ok::<_, hyper::Error>(response)
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    (format!("http://{}", addr), rx)
}

/// Relay that drops the connection once `marker` has arrived after the
/// metadata delimiter. Reports the raw bytes it read.
pub async fn spawn_dropping_relay(marker: &'static [u8]) -> (String, oneshot::Receiver<Vec<u8>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let mut seen = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(n) => seen.extend_from_slice(&buf[..n]),
            }
            let after_delimiter = seen
                .iter()
                .position(|b| *b == METADATA_DELIMITER)
                .map(|pos| &seen[pos..]);
            if let Some(rest) = after_delimiter {
                if rest.windows(marker.len()).any(|w| w == marker) {
                    break;
                }
            }
        }
        drop(stream);
        let _ = tx.send(seen);
    });

    (format!("http://{}", addr), rx)
}

/// Relay that answers with `status_line` as soon as the request head has
/// arrived, without waiting for the body. It keeps reading until the client
/// goes away.
pub async fn spawn_early_answer_relay(status_line: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let Ok((mut stream, _)) = listener.accept().await else {
            return;
        };
        let mut seen = Vec::new();
        let mut buf = [0u8; 1024];
        while !seen.windows(4).any(|w| w == b"\r\n\r\n") {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => return,
                Ok(n) => seen.extend_from_slice(&buf[..n]),
            }
        }

        let response = format!("{}\r\ncontent-length: 0\r\n\r\n", status_line);
        if stream.write_all(response.as_bytes()).await.is_err() {
            return;
        }
        loop {
            match stream.read(&mut buf).await {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
        }
    });

    format!("http://{}", addr)
}

/// Wait for the next recorded stream, failing the test after a few seconds.
pub async fn next_stream(rx: &mut mpsc::UnboundedReceiver<RecordedStream>) -> RecordedStream {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("relay received nothing")
        .expect("relay shut down")
}

/// Config pointing at a mock relay, with a short invocation timeout.
pub fn config_for(relay: &str) -> StreamerConfig {
    StreamerConfig::new()
        .relay_base_url(relay)
        .request_timeout_ms(5_000)
}

pub fn event_with_id(request_id: &str) -> InvocationEvent {
    InvocationEvent::new("GET", "/").header(REQUEST_ID_HEADER, request_id)
}
