//! Front controller: the process boundary around the pipeline.
//!
//! # Data Flow
//! ```text
//! inbound HTTP request (axum)
//!     → server.rs (capture into InboundSnapshot)
//!     → mounts.rs (longest-prefix mount → Pipeline)
//!     → Pipeline::forward, exactly once per request
//!     → response.rs (status, header lines, streamed body)
//!     → client
//! ```

pub mod mounts;
pub mod response;
pub mod server;

pub use mounts::{Mount, MountTable};
pub use response::into_http_response;
pub use server::ProxyServer;
