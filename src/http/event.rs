//! Invocation event delivered by the host runtime.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Header carrying the identifier the relay stream is keyed by.
pub const REQUEST_ID_HEADER: &str = "x-nf-request-id";

/// One inbound invocation, shaped like a serverless proxy event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvocationEvent {
    /// HTTP method of the original request.
    pub http_method: String,
    /// Path of the original request, relative to the handler.
    pub path: String,
    /// Request headers. Lookups are case-sensitive.
    pub headers: HashMap<String, String>,
    /// Decoded query string.
    #[serde(default)]
    pub query_string_parameters: HashMap<String, String>,
    /// Raw request body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Bytes>,
}

impl InvocationEvent {
    pub fn new(http_method: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            http_method: http_method.into(),
            path: path.into(),
            ..Default::default()
        }
    }

    /// Add a header to the event.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Add a query parameter to the event.
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_string_parameters.insert(key.into(), value.into());
        self
    }

    /// Set the event body.
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn get_header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }

    /// The relay request id, if the event carries a non-empty one.
    pub fn request_id(&self) -> Option<&str> {
        self.get_header(REQUEST_ID_HEADER).filter(|id| !id.is_empty())
    }

    /// Body as text, lossily decoded.
    pub fn text(&self) -> Option<String> {
        self.body
            .as_ref()
            .map(|b| String::from_utf8_lossy(b).to_string())
    }

    /// Parse the body as JSON if present.
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Option<Result<T, serde_json::Error>> {
        self.body.as_ref().map(|b| serde_json::from_slice(b))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_lookup_is_case_sensitive() {
        let event = InvocationEvent::new("GET", "/").header("X-Nf-Request-Id", "abc");
        assert_eq!(event.request_id(), None);

        let event = InvocationEvent::new("GET", "/").header(REQUEST_ID_HEADER, "abc");
        assert_eq!(event.request_id(), Some("abc"));
    }

    #[test]
    fn test_empty_request_id_is_missing() {
        let event = InvocationEvent::new("GET", "/").header(REQUEST_ID_HEADER, "");
        assert_eq!(event.request_id(), None);
    }

    #[test]
    fn test_event_deserializes_from_proxy_shape() {
        let event: InvocationEvent = serde_json::from_str(
            r#"{"httpMethod":"POST","path":"/chat","headers":{"x-nf-request-id":"r1"}}"#,
        )
        .unwrap();
        assert_eq!(event.http_method, "POST");
        assert_eq!(event.request_id(), Some("r1"));
        assert!(event.query_string_parameters.is_empty());
        assert!(event.body.is_none());
    }

    #[test]
    fn test_json_body() {
        let event = InvocationEvent::new("POST", "/").body(r#"{"prompt":"hi"}"#);
        let value: serde_json::Value = event.json().unwrap().unwrap();
        assert_eq!(value["prompt"], "hi");
    }
}
