//! Mount table: one pipeline per configured path prefix.
//!
//! # Design Decisions
//! - Pipelines are built once at startup and shared; each request runs a
//!   fresh forward over the same filter list
//! - Longest matching prefix wins; a prefix matches on a segment boundary
//!   (`/api` matches `/api` and `/api/x`, not `/apix`)
//! - The prefix rewrite is always the outermost filter of a mount

use crate::config::{MountConfig, ProxyConfig};
use crate::error::ProxyResult;
use crate::pipeline::Pipeline;
use crate::transport::ForwardTransport;

/// A prefix bound to its pipeline.
#[derive(Clone)]
pub struct Mount {
    pub name: String,
    pub prefix: String,
    pub pipeline: Pipeline,
}

impl Mount {
    pub fn from_config(config: &MountConfig, base: &Pipeline) -> ProxyResult<Self> {
        let mut pipeline = base
            .clone()
            .relative_path(&config.path_prefix, &config.origin, !config.strict);
        for filter in &config.filters {
            pipeline = pipeline.add_named(&filter.name, &filter.args)?;
        }
        Ok(Self {
            name: config.name.clone(),
            prefix: config.path_prefix.trim_end_matches('/').to_string(),
            pipeline,
        })
    }

    pub fn matches(&self, path: &str) -> bool {
        match path.strip_prefix(self.prefix.as_str()) {
            Some(rest) => rest.is_empty() || rest.starts_with('/') || self.prefix.is_empty(),
            None => false,
        }
    }
}

/// Mounts ordered by descending prefix length.
#[derive(Clone, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn from_config(config: &ProxyConfig) -> ProxyResult<Self> {
        let base = Pipeline::new()
            .with_transport(ForwardTransport::new(config.debug))
            .with_options(config.transport.options());

        let mut mounts = config
            .mounts
            .iter()
            .map(|mount| Mount::from_config(mount, &base))
            .collect::<ProxyResult<Vec<_>>>()?;
        mounts.sort_by(|a, b| b.prefix.len().cmp(&a.prefix.len()));

        for mount in &mounts {
            tracing::info!(
                mount = %mount.name,
                prefix = %mount.prefix,
                filters = mount.pipeline.len(),
                "Mount configured"
            );
        }
        Ok(Self { mounts })
    }

    pub fn resolve(&self, path: &str) -> Option<&Mount> {
        self.mounts.iter().find(|mount| mount.matches(path))
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_config;

    fn table() -> MountTable {
        let config = parse_config(
            r#"
            [[mounts]]
            name = "root"
            path_prefix = ""
            origin = "http://fallback.test"

            [[mounts]]
            name = "api"
            path_prefix = "/api"
            origin = "http://api.test/v1"

            [[mounts]]
            name = "admin"
            path_prefix = "/api/admin/"
            origin = "http://admin.test"
            strict = true

            [[mounts.filters]]
            name = "noCache"
            "#,
        )
        .unwrap();
        MountTable::from_config(&config).unwrap()
    }

    #[test]
    fn test_longest_prefix_wins() {
        let table = table();
        assert_eq!(table.len(), 3);
        assert_eq!(table.resolve("/api/admin/users").map(|m| m.name.as_str()), Some("admin"));
        assert_eq!(table.resolve("/api/admin").map(|m| m.name.as_str()), Some("admin"));
        assert_eq!(table.resolve("/api/items").map(|m| m.name.as_str()), Some("api"));
        assert_eq!(table.resolve("/apix").map(|m| m.name.as_str()), Some("root"));
        assert_eq!(table.resolve("/").map(|m| m.name.as_str()), Some("root"));
    }

    #[test]
    fn test_mount_pipeline_shape() {
        let table = table();
        let admin = table.resolve("/api/admin/x").unwrap();
        assert_eq!(admin.pipeline.len(), 2);
        assert!(MountTable::default().resolve("/").is_none());
    }
}
