//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from TOML. Every
//! section is defaulted, so an empty file is a valid (mount-less) config.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::http::request::TransportOptions;

/// Root configuration for the proxy front controller.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration.
    pub listener: ListenerConfig,

    /// Ambient transport settings applied to every captured request.
    pub transport: TransportConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Append a `ProxyUrl` header naming the forwarded target.
    pub debug: bool,

    /// Path-prefix mounts, each with its own filter chain.
    pub mounts: Vec<MountConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Ambient transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Connect and read timeout in seconds; values below 10 are raised to 10.
    pub timeout_secs: u64,

    /// Redirect limit when following is enabled.
    pub max_redirects: usize,

    /// Follow redirects instead of relaying them.
    pub follow_redirects: bool,

    /// Verify origin certificates (chain and name).
    pub verify_tls: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_redirects: 3,
            follow_redirects: false,
            verify_tls: false,
        }
    }
}

impl TransportConfig {
    pub fn options(&self) -> TransportOptions {
        TransportOptions {
            max_redirects: self.max_redirects,
            follow_redirects: self.follow_redirects,
            verify_peer: self.verify_tls,
            verify_peer_name: self.verify_tls,
            ..TransportOptions::with_ambient_timeout(Duration::from_secs(self.timeout_secs))
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

/// A path prefix served from one origin.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MountConfig {
    /// Mount identifier for logging.
    pub name: String,

    /// Inbound path prefix (e.g., "/manager").
    #[serde(default)]
    pub path_prefix: String,

    /// Origin base URL the prefix maps onto.
    pub origin: String,

    /// Reject paths outside the prefix instead of appending them whole.
    #[serde(default)]
    pub strict: bool,

    /// Filters run after the prefix rewrite, outermost first.
    #[serde(default)]
    pub filters: Vec<FilterSpec>,
}

/// A registered filter name plus its JSON arguments.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FilterSpec {
    pub name: String,

    #[serde(default)]
    pub args: serde_json::Value,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_defaults() {
        let config: ProxyConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.transport.timeout_secs, 30);
        assert_eq!(config.observability.log_level, "info");
        assert!(!config.debug);
        assert!(config.mounts.is_empty());
    }

    #[test]
    fn test_mounts_and_filter_args() {
        let config: ProxyConfig = toml::from_str(
            r#"
            debug = true

            [[mounts]]
            name = "manager"
            path_prefix = "/manager"
            origin = "http://app.com/api"
            strict = true

            [[mounts.filters]]
            name = "noCache"

            [[mounts.filters]]
            name = "addRequestHeader"
            args = ["X-Via", "proxy"]
            "#,
        )
        .unwrap();

        let mount = &config.mounts[0];
        assert!(config.debug);
        assert!(mount.strict);
        assert_eq!(mount.filters.len(), 2);
        assert!(mount.filters[0].args.is_null());
        assert_eq!(mount.filters[1].args, serde_json::json!(["X-Via", "proxy"]));
    }

    #[test]
    fn test_transport_options_floor() {
        let transport = TransportConfig {
            timeout_secs: 2,
            verify_tls: true,
            ..TransportConfig::default()
        };
        let options = transport.options();
        assert_eq!(options.timeout, Duration::from_secs(10));
        assert!(options.verify_peer && options.verify_peer_name);
        assert_eq!(TransportConfig::default().options().timeout, Duration::from_secs(30));
    }
}
