//! streamrelay host server with sample streaming handlers.

use std::sync::Arc;
use std::time::Duration;
use streamrelay::prelude::*;
use tracing_subscriber::EnvFilter;

/// Streams a greeting word by word.
#[streaming_handler(name = "hello")]
async fn hello(
    event: InvocationEvent,
    response: &mut dyn ResponseSink,
    _ctx: &InvocationContext,
    _callback: Option<CompletionCallback>,
) -> Result<(), HandlerError> {
    let name = event
        .query_string_parameters
        .get("name")
        .cloned()
        .unwrap_or_else(|| "World".to_string());

    response.set_header("content-type", "text/plain; charset=utf-8");
    for word in ["Hello", ", ", name.as_str(), "!\n"] {
        if !response.write(word.as_bytes())? {
            response.drained().await;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    Ok(())
}

/// Streams the request body back as server-sent events, one line per event.
#[streaming_handler(name = "echo")]
async fn echo(
    event: InvocationEvent,
    response: &mut dyn ResponseSink,
    ctx: &InvocationContext,
    _callback: Option<CompletionCallback>,
) -> Result<(), HandlerError> {
    response.set_header("content-type", "text/event-stream");
    response.set_header("cache-control", "no-cache");

    let body = event.text().unwrap_or_default();
    for line in body.lines() {
        let chunk = format!("data: {}\n\n", line);
        if !response.write(chunk.as_bytes())? {
            response.drained().await;
        }
    }
    tracing::debug!("Echoed {} bytes [{}]", body.len(), ctx.request_id);
    Ok(())
}

/// Writes nothing; the relay receives an empty stream.
#[streaming_handler(name = "noop")]
async fn noop(
    _event: InvocationEvent,
    _response: &mut dyn ResponseSink,
    _ctx: &InvocationContext,
    _callback: Option<CompletionCallback>,
) -> Result<(), HandlerError> {
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = StreamerConfig::from_env();
    tracing::info!("Starting streamrelay host, relaying to {}", config.relay_base_url);

    let server = HostServer::new(config)?;
    server.register_handler("hello", Arc::new(HelloHandler)).await?;
    server.register_handler("echo", Arc::new(EchoHandler)).await?;
    server.register_handler("noop", Arc::new(NoopHandler)).await?;

    tracing::info!("Registered handlers: hello, echo, noop");
    tracing::info!("Try: curl -H 'x-nf-request-id: demo' 'http://localhost:8080/hello?name=you'");
    tracing::info!("Health check: curl http://localhost:8080/_health");

    server.run().await
}
