//! Response snapshots and the CBOR envelope codec
//!
//! A [`FetchResponse`] is a dedicated owned snapshot of a full HTTP
//! response, so `url` and `redirected` are plain fields rather than
//! immutable transport state. The envelope is an ordered CBOR map:
//! `{status, statusText, redirected, url, headers, body}`. Header order and
//! duplicate names survive the round trip.

use crate::cbor;
use crate::error::{StashError, StashResult};
use crate::safe::SafeValue;
use ciborium::value::Value;
use serde::{Deserialize, Serialize};

/// A fully materialized HTTP response snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: u16,
    pub status_text: String,
    /// Whether the transport followed at least one redirect
    pub redirected: bool,
    /// The final URL after redirects
    pub url: String,
    /// Ordered header list; duplicate names allowed
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl FetchResponse {
    /// Whether the status is in the 2xx range
    pub fn ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The body decoded as UTF-8 text
    pub fn text(&self) -> StashResult<String> {
        String::from_utf8(self.body.clone())
            .map_err(|_| StashError::decode("$.body", "utf-8 text", "bytes"))
    }

    /// The first header value matching `name`, case-insensitively
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Serialize a response snapshot into its CBOR envelope
pub fn encode(response: &FetchResponse) -> StashResult<Vec<u8>> {
    let headers = Value::Array(
        response
            .headers
            .iter()
            .map(|(name, value)| {
                Value::Array(vec![
                    Value::Text(name.clone()),
                    Value::Text(value.clone()),
                ])
            })
            .collect(),
    );

    let envelope = Value::Map(vec![
        (
            Value::Text("status".to_string()),
            Value::Integer(response.status.into()),
        ),
        (
            Value::Text("statusText".to_string()),
            Value::Text(response.status_text.clone()),
        ),
        (
            Value::Text("redirected".to_string()),
            Value::Bool(response.redirected),
        ),
        (
            Value::Text("url".to_string()),
            Value::Text(response.url.clone()),
        ),
        (Value::Text("headers".to_string()), headers),
        (
            Value::Text("body".to_string()),
            Value::Bytes(response.body.clone()),
        ),
    ]);

    cbor::encode(&envelope)
}

/// Reconstruct a response snapshot from its CBOR envelope.
///
/// Every field goes through the safe decoder; a missing field or type
/// mismatch fails with a path-qualified error instead of yielding a
/// partially populated snapshot.
pub fn decode(bytes: &[u8]) -> StashResult<FetchResponse> {
    let envelope = cbor::decode(bytes)?;
    let root = SafeValue::new(&envelope);
    let object = root.as_object()?;

    let status_field = object.sure_get_single("status")?;
    let status_raw = status_field.as_i64()?;
    let status = u16::try_from(status_raw).map_err(|_| {
        StashError::decode(status_field.path(), "status code", format!("number {status_raw}"))
    })?;

    let status_text = object.sure_get_single("statusText")?.as_str()?.to_string();
    let redirected = object.sure_get_single("redirected")?.as_bool()?;
    let url = object.sure_get_single("url")?.as_str()?.to_string();

    let headers_field = object.sure_get_single("headers")?;
    let headers_array = headers_field.as_array()?;
    let mut headers = Vec::with_capacity(headers_array.len());
    for entry in headers_array.iter() {
        let pair = entry.as_array()?;
        if pair.len() != 2 {
            return Err(StashError::decode(
                entry.path(),
                "[name, value] pair",
                format!("array of length {}", pair.len()),
            ));
        }
        let name = pair.sure_get(0)?.as_str()?.to_string();
        let value = pair.sure_get(1)?.as_str()?.to_string();
        headers.push((name, value));
    }

    let body = object.sure_get_single("body")?.as_bytes()?.to_vec();

    Ok(FetchResponse {
        status,
        status_text,
        redirected,
        url,
        headers,
        body,
    })
}
