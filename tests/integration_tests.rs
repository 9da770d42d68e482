//! Integration tests for the host server, registry and handler macro.

mod common;

use common::{config_for, event_with_id, next_stream, spawn_relay};
use std::net::SocketAddr;
use std::sync::Arc;
use streamrelay::channel::split_frame;
use streamrelay::prelude::*;
use tokio::net::TcpListener;
use tokio_test::{assert_err, assert_ok};

#[streaming_handler(name = "greet")]
async fn greet(
    event: InvocationEvent,
    response: &mut dyn ResponseSink,
    ctx: &InvocationContext,
    _callback: Option<CompletionCallback>,
) -> Result<(), HandlerError> {
    let name = event
        .query_string_parameters
        .get("name")
        .cloned()
        .unwrap_or_else(|| "World".to_string());
    let greeting = ctx
        .get_env("GREETING")
        .cloned()
        .unwrap_or_else(|| "Hello".to_string());

    response.set_header("content-type", "text/plain");
    response.write(greeting.as_bytes())?;
    response.write(format!(", {}!", name).as_bytes())?;
    Ok(())
}

#[streaming_handler]
async fn echo_body(
    event: InvocationEvent,
    response: &mut dyn ResponseSink,
    _ctx: &InvocationContext,
    _callback: Option<CompletionCallback>,
) -> Result<(), HandlerError> {
    response.write(&event.body.unwrap_or_default())?;
    Ok(())
}

async fn start_server(config: StreamerConfig) -> SocketAddr {
    let server = assert_ok!(HostServer::new(config));
    assert_ok!(server.register_handler("greet", Arc::new(GreetHandler::new())).await);
    assert_ok!(server.register_handler("echo", Arc::new(EchoBodyHandler)).await);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(server.serve(listener));
    addr
}

#[tokio::test]
async fn test_macro_handler_names() {
    assert_eq!(GreetHandler::new().name(), "greet");
    assert_eq!(EchoBodyHandler.name(), "echo_body");
}

#[tokio::test]
async fn test_server_streams_to_relay() {
    let (relay, mut streams) = spawn_relay().await;
    let addr = start_server(config_for(&relay).env("GREETING", "Howdy")).await;

    let response = reqwest::Client::new()
        .get(format!("http://{}/greet?name=Ada", addr))
        .header(REQUEST_ID_HEADER, "srv-1")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");

    let stream = next_stream(&mut streams).await;
    assert_eq!(stream.path, "/.stream/srv-1");
    let (metadata, body) = split_frame(&stream.body).unwrap().unwrap();
    assert_eq!(metadata.headers.get("content-type"), Some("text/plain"));
    assert_eq!(body, b"Howdy, Ada!");
}

#[tokio::test]
async fn test_server_forwards_request_body() {
    let (relay, mut streams) = spawn_relay().await;
    let addr = start_server(config_for(&relay)).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/echo", addr))
        .header(REQUEST_ID_HEADER, "srv-echo")
        .body("ping")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);

    let stream = next_stream(&mut streams).await;
    let (_, body) = split_frame(&stream.body).unwrap().unwrap();
    assert_eq!(body, b"ping");
}

#[tokio::test]
async fn test_server_rejects_oversized_body() {
    let (relay, mut streams) = spawn_relay().await;
    let addr = start_server(config_for(&relay).max_body_size(8)).await;

    let response = reqwest::Client::new()
        .post(format!("http://{}/echo", addr))
        .header(REQUEST_ID_HEADER, "srv-big")
        .body("x".repeat(64))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    assert_eq!(response.text().await.unwrap(), "Request body too large");

    let nothing = tokio::time::timeout(std::time::Duration::from_millis(200), streams.recv()).await;
    assert!(nothing.is_err(), "oversized requests never reach the relay");
}

#[tokio::test]
async fn test_server_missing_request_id() {
    let (relay, _streams) = spawn_relay().await;
    let addr = start_server(config_for(&relay)).await;

    let response = reqwest::get(format!("http://{}/greet", addr)).await.unwrap();
    assert_eq!(response.status().as_u16(), 422);
    assert_eq!(response.text().await.unwrap(), "Missing request id");
}

#[tokio::test]
async fn test_server_unknown_handler_and_health() {
    let (relay, _streams) = spawn_relay().await;
    let addr = start_server(config_for(&relay)).await;

    let response = reqwest::get(format!("http://{}/missing", addr)).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = reqwest::get(format!("http://{}/", addr)).await.unwrap();
    assert_eq!(response.status().as_u16(), 404);

    let response = reqwest::get(format!("http://{}/_health", addr)).await.unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_registry_register_list_remove() {
    let registry = HandlerRegistry::new();
    let config = StreamerConfig::new();

    assert_ok!(
        registry
            .register("greet", assert_ok!(HandlerWrapper::new(Arc::new(GreetHandler), config.clone())))
            .await
    );
    assert_err!(
        registry
            .register("greet", assert_ok!(HandlerWrapper::new(Arc::new(GreetHandler), config.clone())))
            .await
    );
    assert_ok!(
        registry
            .register("echo", assert_ok!(HandlerWrapper::new(Arc::new(EchoBodyHandler), config)))
            .await
    );

    assert_eq!(registry.list().await, vec!["echo".to_string(), "greet".to_string()]);

    assert_ok!(registry.remove("greet").await);
    assert_err!(registry.remove("greet").await);
    assert!(registry.get("greet").await.is_none());
}

#[tokio::test]
async fn test_registry_invoke_unknown_handler() {
    let registry = HandlerRegistry::new();
    let outcome = registry.invoke("nothing", event_with_id("r"), None).await;
    assert!(outcome.is_none());
}

#[tokio::test]
async fn test_invocation_context() {
    let ctx = InvocationContext::new("greet", "req-456")
        .with_env("API_KEY", "secret123")
        .with_env("ENV", "test");

    assert_eq!(ctx.function_name, "greet");
    assert_eq!(ctx.request_id, "req-456");
    assert_eq!(ctx.get_env("API_KEY"), Some(&"secret123".to_string()));
    assert_eq!(ctx.get_env("NONEXISTENT"), None);
}
