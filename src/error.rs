//! Error types for stash
//!
//! All modules use `StashResult<T>` as their return type. Each variant maps
//! to exactly one pipeline phase so callers can tell a cache problem from a
//! network problem from a malformed-input problem.

use thiserror::Error;

/// Result type alias for stash operations
pub type StashResult<T> = Result<T, StashError>;

/// All errors that can occur in stash
#[derive(Error, Debug)]
pub enum StashError {
    // Normalization errors
    #[error("Invalid URL '{input}': {reason}")]
    UrlParse { input: String, reason: String },

    #[error("Failed to read request body: {reason}")]
    Body { reason: String },

    // Decoding errors
    #[error("Expected data to be of type {expected}, but found type {actual} at {path}")]
    Decode {
        path: String,
        expected: &'static str,
        actual: String,
    },

    #[error("Expected to find a value for key \"{key}\" at {path}")]
    MissingKey { path: String, key: String },

    #[error("Response envelope error: {0}")]
    Envelope(String),

    // Store errors
    #[error("Cache store error: {context}")]
    StoreIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Transport errors
    #[error("Transport error for {url}: {reason}")]
    Transport { url: String, reason: String },

    // General errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl StashError {
    /// Create a URL parse error
    pub fn url_parse(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::UrlParse {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a typed decode error with its diagnostic path
    pub fn decode(
        path: impl Into<String>,
        expected: &'static str,
        actual: impl Into<String>,
    ) -> Self {
        Self::Decode {
            path: path.into(),
            expected,
            actual: actual.into(),
        }
    }

    /// Create a missing-key error for strict navigation
    pub fn missing_key(path: impl Into<String>, key: impl Into<String>) -> Self {
        Self::MissingKey {
            path: path.into(),
            key: key.into(),
        }
    }

    /// Create a store IO error with context
    pub fn store_io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::StoreIo {
            context: context.into(),
            source,
        }
    }

    /// Create a transport error
    pub fn transport(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// The pipeline phase this error belongs to
    pub fn phase(&self) -> &'static str {
        match self {
            Self::UrlParse { .. } | Self::Body { .. } => "normalize",
            Self::Decode { .. } | Self::MissingKey { .. } => "decode",
            Self::Envelope(_) => "codec",
            Self::StoreIo { .. } => "store",
            Self::Transport { .. } => "fetch",
            Self::Internal(_) => "internal",
        }
    }
}
