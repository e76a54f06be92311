//! Filter pipeline engine.
//!
//! # Data Flow
//! ```text
//! Pipeline [f1, f2, ..., fN] + transport
//!     → forward(request)
//!     → f1 pre → f2 pre → ... → fN pre
//!     → transport (network fetch or file open)
//!     → fN post → ... → f2 post → f1 post
//!     → completed ProxyResponse
//! ```
//!
//! # Design Decisions
//! - The filter list is immutable while a `forward` runs and may be reused
//!   across calls; filters hold configuration, never per-request state
//! - Each stage gets a `Next` over the remaining slice, so composition
//!   costs nothing per call
//! - The only way to stop the chain is to not call `next`
//! - Every `forward` starts from a fresh response; nothing written earlier
//!   leaks into it

pub mod chain;
pub mod filter;

pub use chain::{InboundSource, Pipeline};
pub use filter::{filter_fn, After, Before, Filter, FilterFn, Next};
