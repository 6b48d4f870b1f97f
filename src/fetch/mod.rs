//! Caching fetch orchestration
//!
//! One entry point composes the pipeline: normalize the request descriptor,
//! derive the cache fingerprint, look the key up in the store, call the
//! transport on a miss, encode and store the snapshot, and hand back a
//! decoded copy. A hit never touches the network; a local-scheme URL never
//! touches the store.

pub mod request;
pub mod response;
pub mod transport;

pub use request::{
    fingerprint, is_local_scheme, normalize, CanonicalRequest, FetchInput, FetchRequest, FormPart,
    RequestBody, RequestInit,
};
pub use response::FetchResponse;
pub use transport::{Transport, UreqTransport};

use crate::error::StashResult;
use crate::store::{FsStore, Store};
use tracing::{debug, warn};

/// A fetch client that snapshots responses into a content store.
///
/// Identical requests are answered from the store without a network call.
/// Both the hit and miss paths return a snapshot decoded from the stored
/// envelope, so callers observe structurally identical values either way.
pub struct CachingClient<S: Store, T: Transport> {
    store: S,
    transport: T,
}

impl CachingClient<FsStore, UreqTransport> {
    /// A client over `store` with the default ureq transport
    pub fn new(store: FsStore) -> Self {
        Self {
            store,
            transport: UreqTransport::new(),
        }
    }
}

impl<S: Store, T: Transport> CachingClient<S, T> {
    /// A client with an injected transport (stubs, custom agents)
    pub fn with_transport(store: S, transport: T) -> Self {
        Self { store, transport }
    }

    /// Normalize, consult the cache, fetch on a miss, and return the
    /// response snapshot.
    ///
    /// Normalization errors fail before any I/O. Transport errors propagate
    /// unchanged; there is no retry here. Store write failures propagate. A
    /// corrupt cache entry is treated as a miss and overwritten by the
    /// refetched snapshot.
    pub fn fetch(
        &self,
        input: impl Into<FetchInput>,
        init: RequestInit,
    ) -> StashResult<FetchResponse> {
        let request = normalize(input.into(), init)?;

        if is_local_scheme(&request.url) {
            debug!(url = %request.url, "local scheme, bypassing cache");
            return self.transport.fetch(&request);
        }

        let key = fingerprint(&request);

        if let Some(bytes) = self.store.get(&key)? {
            match response::decode(&bytes) {
                Ok(snapshot) => {
                    debug!(url = %request.url, "cache hit");
                    return Ok(snapshot);
                }
                Err(error) => {
                    warn!(url = %request.url, %error, "corrupt cache entry, refetching");
                }
            }
        } else {
            debug!(url = %request.url, "cache miss");
        }

        let fresh = self.transport.fetch(&request)?;
        let encoded = response::encode(&fresh)?;
        self.store.set(&key, &encoded)?;

        // decode what was stored so hit and miss return the same shape
        response::decode(&encoded)
    }
}
