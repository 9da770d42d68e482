//! Host HTTP server that turns inbound requests into streaming invocations.

use crate::channel::build_relay_client;
use crate::error::{HandlerError, StreamError};
use crate::function::{HandlerRegistry, HandlerWrapper, StreamingHandler};
use crate::http::{InvocationEvent, Outcome, StatusCode};
use crate::runtime::StreamerConfig;
use bytes::Bytes;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use reqwest::Client;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Host server.
///
/// Each request to `/<handler>/...` becomes one invocation of the handler
/// registered under that name. The client receives the invocation's
/// [`Outcome`]; the streamed response itself goes to the relay.
pub struct HostServer {
    config: StreamerConfig,
    registry: Arc<HandlerRegistry>,
    client: Client,
}

impl HostServer {
    pub fn new(config: StreamerConfig) -> Result<Self, StreamError> {
        let registry = Arc::new(HandlerRegistry::with_env(config.env.clone()));
        Ok(Self {
            config,
            registry,
            client: build_relay_client()?,
        })
    }

    pub fn with_defaults() -> Result<Self, StreamError> {
        Self::new(StreamerConfig::default())
    }

    pub fn registry(&self) -> Arc<HandlerRegistry> {
        self.registry.clone()
    }

    /// Wrap `handler` and register it under `name`.
    pub async fn register_handler(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn StreamingHandler>,
    ) -> Result<(), HandlerError> {
        let wrapper = HandlerWrapper::with_client(handler, self.config.clone(), self.client.clone());
        self.registry.register(name, wrapper).await
    }

    /// Bind to the configured address and serve forever.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let addr: SocketAddr = self.config.bind_addr().parse()?;
        let listener = TcpListener::bind(addr).await?;
        self.serve(listener).await
    }

    /// Serve connections accepted from `listener`.
    pub async fn serve(self, listener: TcpListener) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Host server listening on {}", listener.local_addr()?);

        let registry = self.registry.clone();
        let config = self.config.clone();

        loop {
            let (stream, remote_addr) = listener.accept().await?;
            let io = TokioIo::new(stream);

            let registry = registry.clone();
            let config = config.clone();

            tokio::task::spawn(async move {
                let service = service_fn(move |req| {
                    let registry = registry.clone();
                    let config = config.clone();
                    async move { handle_request(req, registry, config, remote_addr).await }
                });

                if let Err(err) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Error serving connection: {:?}", err);
                }
            });
        }
    }
}

async fn handle_request(
    req: Request<Incoming>,
    registry: Arc<HandlerRegistry>,
    config: StreamerConfig,
    remote_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let path = req.uri().path().to_string();
    debug!("Handling request: {} {} from {}", req.method(), path, remote_addr);

    if config.enable_health && path == "/_health" {
        return Ok(build_response(&Outcome::ok()));
    }

    // Expected format: /{handler_name}/...
    let (handler_name, sub_path) = match path.trim_start_matches('/').split_once('/') {
        Some((name, rest)) => (name.to_string(), format!("/{}", rest)),
        None => (path.trim_start_matches('/').to_string(), "/".to_string()),
    };

    if handler_name.is_empty() {
        return Ok(build_response(&Outcome::new(
            StatusCode::NOT_FOUND,
            "No handler specified",
        )));
    }

    let event = match convert_request(req, &sub_path, &config).await {
        Ok(event) => event,
        Err(e) => {
            warn!("Failed to convert request: {}", e);
            return Ok(build_response(&Outcome::new(StatusCode::BAD_REQUEST, e.to_string())));
        }
    };

    match registry.invoke(&handler_name, event, None).await {
        Some(outcome) => Ok(build_response(&outcome)),
        None => Ok(build_response(&Outcome::new(
            StatusCode::NOT_FOUND,
            "No handler registered",
        ))),
    }
}

/// Convert a hyper request into an invocation event.
async fn convert_request(
    req: Request<Incoming>,
    path: &str,
    config: &StreamerConfig,
) -> Result<InvocationEvent, Box<dyn std::error::Error + Send + Sync>> {
    let mut event = InvocationEvent::new(req.method().as_str(), path);
    event.query_string_parameters = parse_query(req.uri().query());

    for (name, value) in req.headers() {
        if let Ok(v) = value.to_str() {
            event.headers.insert(name.as_str().to_string(), v.to_string());
        }
    }

    let body = Limited::new(req.into_body(), config.max_body_size)
        .collect()
        .await
        .map_err(|e| -> Box<dyn std::error::Error + Send + Sync> {
            if e.is::<LengthLimitError>() {
                "Request body too large".into()
            } else {
                e
            }
        })?
        .to_bytes();
    if !body.is_empty() {
        event.body = Some(body);
    }

    Ok(event)
}

fn parse_query(query: Option<&str>) -> HashMap<String, String> {
    let Some(query) = query else {
        return HashMap::new();
    };
    match reqwest::Url::parse(&format!("http://localhost/?{}", query)) {
        Ok(url) => url.query_pairs().into_owned().collect(),
        Err(_) => HashMap::new(),
    }
}

fn build_response(outcome: &Outcome) -> Response<Full<Bytes>> {
    let status = hyper::StatusCode::from_u16(outcome.status_code.0)
        .unwrap_or(hyper::StatusCode::INTERNAL_SERVER_ERROR);

    let mut response = Response::new(Full::new(Bytes::from(outcome.body.clone())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain"),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_decodes_pairs() {
        let query = parse_query(Some("q=hello%20world&n=2"));
        assert_eq!(query.get("q").map(String::as_str), Some("hello world"));
        assert_eq!(query.get("n").map(String::as_str), Some("2"));
        assert!(parse_query(None).is_empty());
    }

    #[test]
    fn test_build_response_carries_outcome() {
        let response = build_response(&Outcome::client_error());
        assert_eq!(response.status(), hyper::StatusCode::UNPROCESSABLE_ENTITY);
    }
}
