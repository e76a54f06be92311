//! HTTP message model.
//!
//! # Data Flow
//! ```text
//! InboundSnapshot (front controller)
//!     → request.rs (method, uri.rs target, headers.rs map, body.rs payload)
//!     → [filters mutate the request]
//!     → transport fills response.rs (code, raw header lines, body)
//!     → [filters mutate the response while unwinding]
//!     → rendered to the client
//! ```

pub mod body;
pub mod headers;
pub mod request;
pub mod response;
pub mod uri;

pub use body::{FormBody, FormValue, RequestBody, UploadedFile};
pub use headers::HeaderMap;
pub use request::{InboundSnapshot, ProxyRequest, TransportOptions};
pub use response::{BodyStream, OutputMode, ProxyResponse, ResponseBody, SaveOutcome};
pub use uri::RequestUri;
