//! Request normalization and cache fingerprinting
//!
//! Heterogeneous request descriptors (a bare URL or a full request) merge
//! with an optional overlay into one [`CanonicalRequest`], which is the only
//! shape the transport and the fingerprint ever see.

use crate::error::{StashError, StashResult};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use std::fmt;
use std::io::Read;
use url::Url;

/// A fully merged, normalized request. No relative URLs, no unmerged
/// overlay state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalRequest {
    /// Uppercase HTTP method
    pub method: String,
    /// Absolute URL
    pub url: Url,
    /// Ordered header list; duplicate names allowed
    pub headers: Vec<(String, String)>,
    /// Fully materialized body bytes
    pub body: Vec<u8>,
}

/// A request descriptor: a bare URL or a request-like value
#[derive(Debug)]
pub enum FetchInput {
    Url(Url),
    Request(FetchRequest),
}

impl From<Url> for FetchInput {
    fn from(url: Url) -> Self {
        Self::Url(url)
    }
}

impl From<FetchRequest> for FetchInput {
    fn from(request: FetchRequest) -> Self {
        Self::Request(request)
    }
}

impl TryFrom<&str> for FetchInput {
    type Error = StashError;

    /// Parse an absolute URL string. Relative strings have no base context
    /// here and fail.
    fn try_from(input: &str) -> StashResult<Self> {
        let url = Url::parse(input).map_err(|e| StashError::url_parse(input, e.to_string()))?;
        Ok(Self::Url(url))
    }
}

/// A request-like descriptor carrying its own method, headers, and body
#[derive(Debug)]
pub struct FetchRequest {
    pub method: String,
    pub url: Url,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl FetchRequest {
    /// A GET request for `url` with no headers and no body
    pub fn new(url: Url) -> Self {
        Self {
            method: "GET".to_string(),
            url,
            headers: Vec::new(),
            body: None,
        }
    }
}

/// Overlay applied on top of a [`FetchInput`]
#[derive(Debug, Default)]
pub struct RequestInit {
    pub method: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

/// The accepted request body shapes, each with its own conversion to bytes
pub enum RequestBody {
    /// Raw bytes, passed through unchanged
    Bytes(Vec<u8>),
    /// Text, UTF-8 encoded; adds `text/plain;charset=UTF-8` if no
    /// content-type is set
    Text(String),
    /// URL-encoded parameter set, serialized to
    /// `application/x-www-form-urlencoded` wire text
    UrlEncoded(Vec<(String, String)>),
    /// Multipart form data, serialized with a content-derived boundary
    Form(Vec<FormPart>),
    /// A streaming source, fully drained before use
    Reader(Box<dyn Read + Send>),
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            Self::Text(s) => f.debug_tuple("Text").field(s).finish(),
            Self::UrlEncoded(pairs) => f.debug_tuple("UrlEncoded").field(pairs).finish(),
            Self::Form(parts) => f.debug_tuple("Form").field(parts).finish(),
            Self::Reader(_) => f.debug_tuple("Reader").finish(),
        }
    }
}

/// One part of a multipart form body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub value: Vec<u8>,
}

impl FormPart {
    /// A plain text field
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            filename: None,
            content_type: None,
            value: value.into().into_bytes(),
        }
    }

    /// A file field with its filename and content type
    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        content_type: impl Into<String>,
        value: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            filename: Some(filename.into()),
            content_type: Some(content_type.into()),
            value,
        }
    }
}

/// Merge a request descriptor and an overlay into a [`CanonicalRequest`].
///
/// Method: overlay wins, else the request's, else GET. Headers are merged
/// case-insensitively: every input header whose name the overlay does not
/// set survives, then all overlay entries are appended in order. Body:
/// overlay body wins, else the request's, else empty.
pub fn normalize(input: FetchInput, init: RequestInit) -> StashResult<CanonicalRequest> {
    let (url, input_method, input_headers, input_body) = match input {
        FetchInput::Url(url) => (url, None, Vec::new(), None),
        FetchInput::Request(request) => (
            request.url,
            Some(request.method),
            request.headers,
            request.body,
        ),
    };

    let RequestInit {
        method: init_method,
        headers: init_headers,
        body: init_body,
    } = init;

    let method = init_method
        .or(input_method)
        .unwrap_or_else(|| "GET".to_string())
        .to_ascii_uppercase();

    let mut headers: Vec<(String, String)> = input_headers
        .into_iter()
        .filter(|(name, _)| {
            !init_headers
                .iter()
                .any(|(overlay_name, _)| overlay_name.eq_ignore_ascii_case(name))
        })
        .collect();
    headers.extend(init_headers);

    let body = match init_body.or(input_body) {
        Some(body) => encode_body(body, &mut headers)?,
        None => Vec::new(),
    };

    Ok(CanonicalRequest {
        method,
        url,
        headers,
        body,
    })
}

fn has_header(headers: &[(String, String)], name: &str) -> bool {
    headers.iter().any(|(n, _)| n.eq_ignore_ascii_case(name))
}

/// Convert a body shape to bytes, appending the headers the shape implies
fn encode_body(body: RequestBody, headers: &mut Vec<(String, String)>) -> StashResult<Vec<u8>> {
    match body {
        RequestBody::Bytes(bytes) => Ok(bytes),
        RequestBody::Text(text) => {
            if !has_header(headers, "content-type") {
                headers.push((
                    "content-type".to_string(),
                    "text/plain;charset=UTF-8".to_string(),
                ));
            }
            Ok(text.into_bytes())
        }
        RequestBody::UrlEncoded(pairs) => {
            if !has_header(headers, "content-type") {
                headers.push((
                    "content-type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ));
            }
            let wire = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&pairs)
                .finish();
            Ok(wire.into_bytes())
        }
        RequestBody::Form(parts) => {
            let boundary = form_boundary(&parts);
            if !has_header(headers, "content-type") {
                headers.push((
                    "content-type".to_string(),
                    format!("multipart/form-data; boundary={boundary}"),
                ));
            }
            Ok(encode_multipart(&parts, &boundary))
        }
        RequestBody::Reader(mut reader) => {
            let mut bytes = Vec::new();
            reader
                .read_to_end(&mut bytes)
                .map_err(|e| StashError::Body {
                    reason: e.to_string(),
                })?;
            Ok(bytes)
        }
    }
}

/// Derive a boundary from the part contents so the serialized body is
/// deterministic. Hex digits never collide with the `--` sentinel.
fn form_boundary(parts: &[FormPart]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.name.as_bytes());
        hasher.update([0u8]);
        if let Some(filename) = &part.filename {
            hasher.update(filename.as_bytes());
        }
        hasher.update([0u8]);
        hasher.update(&part.value);
        hasher.update([0u8]);
    }
    format!("----stash{}", hex::encode(&hasher.finalize()[..12]))
}

/// Escape a field name or filename for a Content-Disposition header
fn escape_disposition(value: &str) -> String {
    value
        .replace('\n', "%0A")
        .replace('\r', "%0D")
        .replace('"', "%22")
}

fn encode_multipart(parts: &[FormPart], boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for part in parts {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"",
                escape_disposition(&part.name)
            )
            .as_bytes(),
        );
        if let Some(filename) = &part.filename {
            out.extend_from_slice(
                format!("; filename=\"{}\"", escape_disposition(filename)).as_bytes(),
            );
        }
        out.extend_from_slice(b"\r\n");
        if let Some(content_type) = &part.content_type {
            out.extend_from_slice(format!("Content-Type: {content_type}\r\n").as_bytes());
        }
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&part.value);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

/// Whether this URL names a local resource rather than a network one.
/// Local-scheme requests bypass fingerprinting and the cache entirely.
pub fn is_local_scheme(url: &Url) -> bool {
    matches!(url.scheme(), "file" | "data" | "blob")
}

/// Derive the deterministic cache key for a canonical request.
///
/// Header pairs are sorted by name with an ordinal comparison, so header
/// order never affects the result. The key is the literal concatenation of
/// method, URL, the sorted header list as compact JSON, and base64 of the
/// body, newline-delimited. None of those segments can contain a raw
/// newline, so the join is unambiguous. Pure: no I/O, no randomness.
pub fn fingerprint(request: &CanonicalRequest) -> String {
    let mut sorted = request.headers.clone();
    sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

    let headers_json =
        serde_json::to_string(&sorted).expect("string pairs are always JSON-serializable");
    let body = STANDARD.encode(&request.body);

    [
        request.method.as_str(),
        request.url.as_str(),
        headers_json.as_str(),
        body.as_str(),
    ]
    .join("\n")
}
