//! Stash - caching HTTP fetch with content-addressed response snapshots
//!
//! Normalizes heterogeneous request descriptors into a canonical form,
//! derives a deterministic cache fingerprint, stores full response
//! snapshots as CBOR envelopes in a scoped file store, and reconstructs
//! typed values from untrusted decoded bytes through a fail-fast safe
//! decoder.
//!
//! ```no_run
//! use stash::{CachingClient, FetchInput, FsStore, RequestInit};
//!
//! # fn main() -> stash::StashResult<()> {
//! let store = FsStore::open("docs-example");
//! let client = CachingClient::new(store);
//!
//! let input = FetchInput::try_from("https://example.com/data")?;
//! let response = client.fetch(input, RequestInit::default())?;
//! println!("{}", response.text()?);
//! # Ok(())
//! # }
//! ```

pub mod cbor;
pub mod error;
pub mod fetch;
pub mod safe;
pub mod store;

pub use error::{StashError, StashResult};
pub use fetch::{
    CachingClient, CanonicalRequest, FetchInput, FetchRequest, FetchResponse, FormPart,
    RequestBody, RequestInit, Transport, UreqTransport,
};
pub use safe::{SafeArray, SafeObject, SafeValue, ValueKind};
pub use store::{scope_for, FsStore, Store};
