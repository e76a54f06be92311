//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks, filter args built once)
//!     → ProxyConfig (validated, immutable)
//!     → frontend builds one Pipeline per mount
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{FilterSpec, ListenerConfig, MountConfig, ObservabilityConfig, ProxyConfig, TransportConfig};
pub use validation::ValidationError;
