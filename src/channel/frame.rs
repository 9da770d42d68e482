//! Framing of response metadata onto the relay byte stream.
//!
//! The relay receives a single byte stream per request. It starts with a
//! JSON object holding the response headers and status code, followed by a
//! single `0x00` byte; everything after the delimiter is the raw response
//! body. JSON text never contains a raw null byte, so the first `0x00` in
//! the stream always terminates the metadata.

use crate::http::StatusCode;
use bytes::Bytes;
use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Byte separating the metadata JSON from the body.
pub const METADATA_DELIMITER: u8 = 0x00;

/// Response headers in insertion order.
///
/// Setting an existing name overwrites its value in place, so the header
/// keeps its original position in the serialized object.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap(Vec<(String, String)>);

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store or overwrite a header value. Names are matched exactly.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.0.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = value,
            None => self.0.push((name, value)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl Serialize for HeaderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for HeaderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HeaderMapVisitor;

        impl<'de> Visitor<'de> for HeaderMapVisitor {
            type Value = HeaderMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of header names to string values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<HeaderMap, A::Error> {
                let mut headers = HeaderMap::new();
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.insert(name, value);
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeaderMapVisitor)
    }
}

/// Headers and status code sent ahead of the body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    pub headers: HeaderMap,
    pub status_code: StatusCode,
}

impl ResponseMetadata {
    /// Serialize into the metadata frame: JSON followed by the delimiter.
    pub fn encode(&self) -> Result<Bytes, serde_json::Error> {
        let mut frame = serde_json::to_vec(self)?;
        frame.push(METADATA_DELIMITER);
        Ok(Bytes::from(frame))
    }
}

/// Split a relayed stream into its metadata and body.
///
/// Returns `None` when the stream does not yet contain the delimiter.
pub fn split_frame(stream: &[u8]) -> Option<Result<(ResponseMetadata, &[u8]), serde_json::Error>> {
    let boundary = stream.iter().position(|b| *b == METADATA_DELIMITER)?;
    let (json, rest) = stream.split_at(boundary);
    Some(serde_json::from_slice(json).map(|metadata| (metadata, &rest[1..])))
}
