//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! pipeline, transport, filters produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (forward counters and latency)
//!
//! Consumers:
//!     → stdout (pretty or JSON)
//!     → whatever metrics recorder the embedding application installs
//! ```
//!
//! # Design Decisions
//! - The library only emits; subscriber and recorder setup belong to the binary
//! - Log level from config, overridable by `RUST_LOG`

pub mod logging;
pub mod metrics;
