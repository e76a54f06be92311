//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check mount integrity (unique names, absolute origins, known filters)
//! - Validate value ranges (bind address, log level)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ProxyConfig → Result<(), Vec<ValidationError>>
//! - Filter arguments are checked by building the filters once

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{MountConfig, ProxyConfig};
use crate::filters::registry;

/// One semantic problem, located by a dotted field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if !LOG_LEVELS.contains(&config.observability.log_level.to_ascii_lowercase().as_str()) {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("unknown level '{}'", config.observability.log_level),
        ));
    }

    let mut names = HashSet::new();
    for (index, mount) in config.mounts.iter().enumerate() {
        let field = format!("mounts[{index}]");
        if mount.name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{field}.name"), "must not be empty"));
        } else if !names.insert(mount.name.as_str()) {
            errors.push(ValidationError::new(
                format!("{field}.name"),
                format!("duplicate mount '{}'", mount.name),
            ));
        }
        validate_mount(&field, mount, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_mount(field: &str, mount: &MountConfig, errors: &mut Vec<ValidationError>) {
    if !mount.path_prefix.is_empty() && !mount.path_prefix.starts_with('/') {
        errors.push(ValidationError::new(
            format!("{field}.path_prefix"),
            "must start with '/'",
        ));
    }

    match url::Url::parse(&mount.origin) {
        Ok(origin) if matches!(origin.scheme(), "http" | "https") && origin.has_host() => {}
        _ => errors.push(ValidationError::new(
            format!("{field}.origin"),
            format!("'{}' is not an absolute http(s) URL", mount.origin),
        )),
    }

    for (index, filter) in mount.filters.iter().enumerate() {
        if let Err(e) = registry::build(&filter.name, &filter.args) {
            errors.push(ValidationError::new(format!("{field}.filters[{index}]"), e.to_string()));
        }
    }
}
