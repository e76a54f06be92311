//! Crate-wide error type.
//!
//! Per-request proxy outcomes (traversal reject, transport miss, proxy miss,
//! unparsable status) are recorded on the response itself and never surface
//! here. This type covers construction and I/O failures only.

use thiserror::Error;

/// Errors raised while building pipelines or moving bytes.
#[derive(Debug, Error)]
pub enum ProxyError {
    /// Filesystem or stream failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A URL could not be parsed where an absolute one is required.
    #[error("Invalid URI: {0}")]
    InvalidUri(String),

    /// A header line or name could not be represented.
    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    /// A header or path pattern failed to compile.
    #[error("Invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// No filter is registered under the requested name.
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),

    /// Arguments for a named filter did not match its signature.
    #[error("Invalid arguments for filter {name}: {reason}")]
    FilterArgs { name: String, reason: String },

    /// `forward` was called without a request and without an inbound source.
    #[error("No inbound request available")]
    NoRequest,

    /// Request body could not be serialized.
    #[error("Encode error: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for proxy operations.
pub type ProxyResult<T> = Result<T, ProxyError>;
