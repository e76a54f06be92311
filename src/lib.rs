//! HTTP request proxying library.
//!
//! # Architecture Overview
//!
//! ```text
//!     inbound request
//!           │
//!           ▼
//!   ┌──────────────┐   ┌───────────────────────────────────────────┐
//!   │   frontend   │──▶│ pipeline                                   │
//!   │ snapshot +   │   │  filter ─▶ filter ─▶ … ─▶ transport        │
//!   │ mount lookup │   │    ▲          ▲              │ remote/local │
//!   └──────────────┘   │    └──────────┴──────────────┘ (unwind)     │
//!           ▲          └───────────────────────────────────────────┘
//!           │                              │
//!           └────────── ProxyResponse ◀────┘
//! ```
//!
//! A [`Pipeline`] is an ordered filter list with the forwarding transport
//! as its innermost stage. Filters wrap each other: work before
//! `next.run(..)` shapes the request, work after it shapes the response.

pub mod config;
pub mod error;
pub mod filters;
pub mod frontend;
pub mod http;
pub mod observability;
pub mod pipeline;
pub mod transport;

pub use config::schema::ProxyConfig;
pub use error::{ProxyError, ProxyResult};
pub use http::request::ProxyRequest;
pub use http::response::ProxyResponse;
pub use pipeline::{Filter, Next, Pipeline};
