//! Request target model.
//!
//! # Responsibilities
//! - Split a raw URI into scheme, userinfo, host, port, path, query, fragment
//! - Keep the query string and its decoded parameters in sync
//! - Render the canonical full URL lazily and cache it
//!
//! # Design Decisions
//! - Parsing follows the RFC 3986 appendix B split and keeps every part raw
//!   (no case folding, no dot-segment removal), so `..` survives to the
//!   transport's traversal check
//! - Every setter drops the cached rendering; `full_url` recomputes on demand
//! - A `file` URI renders as its bare path

use std::fmt;

use once_cell::sync::{Lazy, OnceCell};
use regex::Regex;

static URI_SPLIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([^:/?#]+):)?(?://([^/?#]*))?([^?#]*)(?:\?([^#]*))?(?:#(.*))?$")
        .expect("static URI pattern")
});

const DEFAULT_SCHEME: &str = "http";
const FILE_SCHEME: &str = "file";

/// A mutable, structured request target.
#[derive(Debug, Clone, Default)]
pub struct RequestUri {
    scheme: String,
    user: String,
    pass: String,
    host: String,
    port: Option<u16>,
    path: String,
    query: String,
    fragment: String,
    params: Vec<(String, String)>,
    full_url: OnceCell<String>,
}

impl RequestUri {
    /// Parse a raw URI. Input that cannot be split yields an empty target
    /// with the default `http` scheme.
    pub fn parse(raw: &str) -> Self {
        let mut uri = Self::split(raw).unwrap_or_default();
        if uri.scheme.is_empty() {
            uri.scheme = DEFAULT_SCHEME.to_string();
        }
        uri
    }

    /// A target naming a local file. Authority parts are all empty.
    pub fn from_local_file(path: impl Into<String>) -> Self {
        Self {
            scheme: FILE_SCHEME.to_string(),
            path: path.into(),
            ..Self::default()
        }
    }

    fn split(raw: &str) -> Option<Self> {
        let caps = URI_SPLIT.captures(raw)?;
        let part = |i: usize| caps.get(i).map(|m| m.as_str()).unwrap_or("");

        let mut uri = Self {
            scheme: part(1).to_string(),
            path: part(3).to_string(),
            fragment: part(5).to_string(),
            ..Self::default()
        };

        if let Some(authority) = caps.get(2) {
            let (userinfo, hostport) = match authority.as_str().rsplit_once('@') {
                Some((info, rest)) => (Some(info), rest),
                None => (None, authority.as_str()),
            };
            if let Some(info) = userinfo {
                match info.split_once(':') {
                    Some((user, pass)) => {
                        uri.user = user.to_string();
                        uri.pass = pass.to_string();
                    }
                    None => uri.user = info.to_string(),
                }
            }
            let (host, port) = split_host_port(hostport)?;
            uri.host = host.to_string();
            uri.port = port;
        }

        uri.set_query(part(4));
        Some(uri)
    }

    /// Scheme as given (`http` when none was present).
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// User name from the userinfo section.
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Password from the userinfo section.
    pub fn pass(&self) -> &str {
        &self.pass
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Raw query string, without the leading `?`.
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    /// True when the scheme names a network origin.
    pub fn is_remote(&self) -> bool {
        self.scheme.eq_ignore_ascii_case("http") || self.scheme.eq_ignore_ascii_case("https")
    }

    pub fn is_file(&self) -> bool {
        self.scheme.eq_ignore_ascii_case(FILE_SCHEME)
    }

    fn touch(&mut self) -> &mut Self {
        self.full_url = OnceCell::new();
        self
    }

    /// Set the scheme; an empty value falls back to `http`.
    pub fn set_scheme(&mut self, scheme: impl Into<String>) -> &mut Self {
        let scheme = scheme.into();
        self.scheme = if scheme.is_empty() {
            DEFAULT_SCHEME.to_string()
        } else {
            scheme
        };
        self.touch()
    }

    pub fn set_user(&mut self, user: impl Into<String>) -> &mut Self {
        self.user = user.into();
        self.touch()
    }

    pub fn set_pass(&mut self, pass: impl Into<String>) -> &mut Self {
        self.pass = pass.into();
        self.touch()
    }

    pub fn set_host(&mut self, host: impl Into<String>) -> &mut Self {
        self.host = host.into();
        self.touch()
    }

    pub fn set_port(&mut self, port: Option<u16>) -> &mut Self {
        self.port = port;
        self.touch()
    }

    pub fn set_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.path = path.into();
        self.touch()
    }

    /// Replace the query string and re-derive the parameter list from it.
    pub fn set_query(&mut self, query: impl Into<String>) -> &mut Self {
        self.query = query.into();
        self.params = url::form_urlencoded::parse(self.query.as_bytes())
            .into_owned()
            .collect();
        self.touch()
    }

    pub fn set_fragment(&mut self, fragment: impl Into<String>) -> &mut Self {
        self.fragment = fragment.into();
        self.touch()
    }

    /// Decoded query parameters in query-string order.
    pub fn query_params(&self) -> &[(String, String)] {
        &self.params
    }

    /// First value recorded for `name`.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace every parameter; the query string is re-encoded from them.
    pub fn set_query_params<I, K, V>(&mut self, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.params = params
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.params.iter())
            .finish();
        self.touch()
    }

    /// Merge parameters into the current list. `None` removes the key.
    pub fn add_query_params<I, K>(&mut self, params: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, Option<String>)>,
        K: Into<String>,
    {
        let mut merged = self.params.clone();
        for (key, value) in params {
            let key = key.into();
            let first = merged.iter().position(|(k, _)| *k == key);
            match (first, value) {
                (Some(i), Some(value)) => {
                    merged[i].1 = value;
                    let mut seen = false;
                    merged.retain(|(k, _)| {
                        if *k != key {
                            return true;
                        }
                        let keep = !seen;
                        seen = true;
                        keep
                    });
                }
                (None, Some(value)) => merged.push((key, value)),
                (_, None) => merged.retain(|(k, _)| *k != key),
            }
        }
        self.set_query_params(merged)
    }

    pub fn add_query_param(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.add_query_params([(name.into(), Some(value.into()))])
    }

    pub fn remove_query_param(&mut self, name: impl Into<String>) -> &mut Self {
        self.add_query_params([(name.into(), None)])
    }

    /// Canonical rendering of the current parts.
    pub fn full_url(&self) -> &str {
        self.full_url.get_or_init(|| self.render())
    }

    fn render(&self) -> String {
        if self.is_file() {
            return self.path.clone();
        }

        let mut url = format!("{}://", self.scheme);
        if !self.user.is_empty() {
            url.push_str(&self.user);
            if !self.pass.is_empty() {
                url.push(':');
                url.push_str(&self.pass);
            }
            url.push('@');
        }
        url.push_str(&self.host);
        if let Some(port) = self.port {
            url.push(':');
            url.push_str(&port.to_string());
        }
        url.push_str(&self.path);
        if !self.query.is_empty() {
            url.push('?');
            url.push_str(&self.query);
        }
        if !self.fragment.is_empty() {
            url.push('#');
            url.push_str(&self.fragment);
        }
        url
    }
}

fn split_host_port(hostport: &str) -> Option<(&str, Option<u16>)> {
    let (host, port) = if hostport.starts_with('[') {
        let close = hostport.find(']')?;
        let rest = &hostport[close + 1..];
        match rest.strip_prefix(':') {
            Some(port) => (&hostport[..=close], port),
            None if rest.is_empty() => (hostport, ""),
            None => return None,
        }
    } else {
        match hostport.rsplit_once(':') {
            Some((host, port)) => (host, port),
            None => (hostport, ""),
        }
    };

    if port.is_empty() {
        return Some((host, None));
    }
    port.parse::<u16>().ok().map(|p| (host, Some(p)))
}

impl fmt::Display for RequestUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.full_url())
    }
}

impl From<&str> for RequestUri {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
