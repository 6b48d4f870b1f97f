//! HTTP transport seam
//!
//! The orchestrator only ever talks to a [`Transport`], so tests can swap in
//! stubs that count or forbid network calls. [`UreqTransport`] is the real
//! one: a blocking ureq agent that treats non-2xx statuses as responses and
//! records redirect history so the snapshot can carry the final URL.

use crate::error::{StashError, StashResult};
use crate::fetch::request::CanonicalRequest;
use crate::fetch::response::FetchResponse;
use ureq::ResponseExt;
use url::Url;

/// Snapshot bodies larger than this fail the fetch instead of being
/// silently truncated.
const MAX_BODY_BYTES: u64 = 256 * 1024 * 1024;

/// A networking primitive: performs one request, returns one fully
/// materialized response snapshot. Draining any streaming body is the
/// implementation's job; the returned snapshot is complete.
pub trait Transport {
    fn fetch(&self, request: &CanonicalRequest) -> StashResult<FetchResponse>;
}

/// Blocking transport backed by a ureq agent
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .save_redirect_history(true)
            .build();
        Self {
            agent: config.into(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn fetch(&self, request: &CanonicalRequest) -> StashResult<FetchResponse> {
        if request.url.scheme() == "file" {
            return fetch_file(&request.url);
        }

        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let http_request = builder
            .body(request.body.as_slice())
            .map_err(|e| StashError::transport(request.url.as_str(), e.to_string()))?;

        let mut response = self
            .agent
            .run(http_request)
            .map_err(|e| StashError::transport(request.url.as_str(), e.to_string()))?;

        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.as_str().to_string(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect();
        let url = response.get_uri().to_string();
        let redirected = response
            .get_redirect_history()
            .map(|history| history.len() > 1)
            .unwrap_or(false);

        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| StashError::transport(request.url.as_str(), e.to_string()))?;

        Ok(FetchResponse {
            status,
            status_text,
            redirected,
            url,
            headers,
            body,
        })
    }
}

/// Serve a `file:` URL from disk, the way platform fetch does
fn fetch_file(url: &Url) -> StashResult<FetchResponse> {
    let path = url
        .to_file_path()
        .map_err(|()| StashError::transport(url.as_str(), "not a valid file path"))?;
    let body =
        std::fs::read(&path).map_err(|e| StashError::transport(url.as_str(), e.to_string()))?;

    Ok(FetchResponse {
        status: 200,
        status_text: "OK".to_string(),
        redirected: false,
        url: url.to_string(),
        headers: Vec::new(),
        body,
    })
}
