//! Named filter constructors for configuration-driven pipelines.
//!
//! # Responsibilities
//! - Map a short filter name to a constructor
//! - Decode positional JSON arguments into typed constructor inputs
//!
//! # Design Decisions
//! - A static table, not runtime dispatch: unknown names are errors at
//!   config load time
//! - Arguments are a JSON array in declaration order; a scalar is treated as
//!   a one-element array and `null` as no arguments
//! - Regex arguments accept Rust syntax or the `/pattern/flags` form

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::error::{ProxyError, ProxyResult};
use crate::filters::cache::NoCache;
use crate::filters::download::{Download, SetTimeout};
use crate::filters::headers;
use crate::filters::rewrite::{RelativePath, SetUrl};
use crate::filters::save::SaveToFile;
use crate::http::headers::validate_name;
use crate::pipeline::Filter;

pub type FilterCtor = fn(&Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>>;

static REGISTRY: &[(&str, FilterCtor)] = &[
    ("relativePath", relative_path),
    ("setUrl", set_url),
    ("setUserAgent", set_user_agent),
    ("noCache", no_cache),
    ("noCompress", no_compress),
    ("setResponseContentType", set_response_content_type),
    ("download", download),
    ("setTimeout", set_timeout),
    ("saveToFile", save_to_file),
    ("requestHeaderWhiteList", request_header_whitelist),
    ("addRequestHeader", add_request_header),
    ("addRequestHeaders", add_request_headers),
    ("removeRequestHeader", remove_request_header),
    ("removeRequestHeaders", remove_request_headers),
    ("removeAllRequestHeader", remove_all_request_headers),
    ("removeResponseHeadersUseRegx", remove_response_headers),
    ("addResponseHeader", add_response_header),
    ("addResponseHeaders", add_response_headers),
];

/// Every registered name, in table order.
pub fn names() -> impl Iterator<Item = &'static str> {
    REGISTRY.iter().map(|(name, _)| *name)
}

pub fn lookup(name: &str) -> Option<FilterCtor> {
    REGISTRY
        .iter()
        .find(|(registered, _)| *registered == name)
        .map(|(_, ctor)| *ctor)
}

/// Build the filter(s) registered as `name` from JSON `args`.
pub fn build(name: &str, args: &Value) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    let ctor = lookup(name).ok_or_else(|| ProxyError::UnknownFilter(name.to_string()))?;
    ctor(&Args::new(name, args))
}

/// Positional view over a filter's JSON arguments.
pub struct Args<'v> {
    name: &'v str,
    values: Vec<&'v Value>,
}

impl<'v> Args<'v> {
    pub fn new(name: &'v str, raw: &'v Value) -> Self {
        let values = match raw {
            Value::Null => Vec::new(),
            Value::Array(items) => items.iter().collect(),
            other => vec![other],
        };
        Self { name, values }
    }

    fn error(&self, reason: impl Into<String>) -> ProxyError {
        ProxyError::FilterArgs {
            name: self.name.to_string(),
            reason: reason.into(),
        }
    }

    fn get(&self, index: usize) -> Option<&'v Value> {
        self.values.get(index).copied().filter(|v| !v.is_null())
    }

    pub fn string(&self, index: usize) -> ProxyResult<String> {
        self.opt_string(index)?
            .ok_or_else(|| self.error(format!("argument {index} must be a string")))
    }

    pub fn opt_string(&self, index: usize) -> ProxyResult<Option<String>> {
        match self.get(index) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.error(format!("argument {index} must be a string"))),
        }
    }

    pub fn opt_bool(&self, index: usize) -> ProxyResult<Option<bool>> {
        match self.get(index) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(_) => Err(self.error(format!("argument {index} must be a boolean"))),
        }
    }

    /// Seconds as a non-negative integer.
    pub fn opt_secs(&self, index: usize) -> ProxyResult<Option<Duration>> {
        match self.get(index) {
            None => Ok(None),
            Some(v) => v
                .as_u64()
                .map(|secs| Some(Duration::from_secs(secs)))
                .ok_or_else(|| self.error(format!("argument {index} must be whole seconds"))),
        }
    }

    pub fn secs(&self, index: usize) -> ProxyResult<Duration> {
        self.opt_secs(index)?
            .ok_or_else(|| self.error(format!("argument {index} is required")))
    }

    pub fn strings(&self, index: usize) -> ProxyResult<Vec<String>> {
        match self.get(index) {
            None => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| self.error(format!("argument {index} must list strings")))
                })
                .collect(),
            Some(_) => Err(self.error(format!("argument {index} must be an array"))),
        }
    }

    /// A `{name: value}` object. Non-string values are kept as JSON text.
    pub fn pairs(&self, index: usize) -> ProxyResult<Vec<(String, String)>> {
        match self.get(index) {
            None => Ok(Vec::new()),
            Some(Value::Object(map)) => Ok(map
                .iter()
                .map(|(k, v)| {
                    let value = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                    (k.clone(), value)
                })
                .collect()),
            Some(_) => Err(self.error(format!("argument {index} must be an object"))),
        }
    }
}

/// Convert `/pattern/flags` (any non-alphanumeric delimiter) to Rust regex
/// syntax. Anything else is returned unchanged.
pub fn regex_source(pattern: &str) -> String {
    let mut chars = pattern.chars();
    let Some(delim) = chars.next() else {
        return String::new();
    };
    if delim.is_alphanumeric() || delim.is_whitespace() || delim == '\\' || delim == '(' || delim == '^' {
        return pattern.to_string();
    }
    let Some(end) = pattern.rfind(delim).filter(|&end| end > 0) else {
        return pattern.to_string();
    };
    let flags = &pattern[end + delim.len_utf8()..];
    if !flags.chars().all(|f| matches!(f, 'i' | 'm' | 's' | 'x' | 'u')) {
        return pattern.to_string();
    }
    let body = &pattern[delim.len_utf8()..end];
    let flags: String = flags.chars().filter(|f| *f != 'u').collect();
    if flags.is_empty() {
        body.to_string()
    } else {
        format!("(?{flags}){body}")
    }
}

fn one(filter: impl Filter + 'static) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    let filter: Arc<dyn Filter> = Arc::new(filter);
    Ok(vec![filter])
}

fn relative_path(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    let prefix = args.string(0)?;
    let origin = args.string(1)?;
    let hit_header = args.opt_bool(2)?.unwrap_or(true);
    one(RelativePath::new(prefix, &origin, hit_header))
}

fn set_url(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(SetUrl::new(args.string(0)?))
}

fn set_user_agent(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(headers::set_user_agent(&args.string(0)?))
}

fn no_cache(_: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(NoCache)
}

fn no_compress(_: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(headers::no_compress())
}

fn set_response_content_type(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(headers::set_response_content_type(&args.string(0)?))
}

fn download(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    let mut filter = Download::new(args.opt_string(0)?.filter(|name| !name.is_empty()));
    if let Some(timeout) = args.opt_secs(1)? {
        filter = filter.with_timeout(timeout);
    }
    let stages: Vec<Arc<dyn Filter>> = vec![Arc::new(NoCache), Arc::new(filter)];
    Ok(stages)
}

fn set_timeout(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(SetTimeout(args.secs(0)?))
}

fn save_to_file(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    let mut filter = SaveToFile::new(args.string(0)?);
    if let Some(timeout) = args.opt_secs(1)? {
        filter = filter.with_timeout(timeout);
    }
    one(filter)
}

fn request_header_whitelist(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(headers::request_header_whitelist(args.strings(0)?))
}

fn add_request_header(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    let name = validate_name(&args.string(0)?)?;
    one(headers::add_request_header(&name, &args.string(1)?))
}

fn add_request_headers(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    let pairs = args
        .pairs(0)?
        .into_iter()
        .map(|(name, value)| Ok((validate_name(&name)?, value)))
        .collect::<ProxyResult<Vec<_>>>()?;
    one(headers::add_request_headers(pairs))
}

fn remove_request_header(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(headers::remove_request_header(&args.string(0)?))
}

fn remove_request_headers(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(headers::remove_request_headers(args.strings(0)?))
}

fn remove_all_request_headers(_: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(headers::remove_all_request_headers())
}

fn remove_response_headers(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(headers::remove_response_headers_matching(&regex_source(&args.string(0)?))?)
}

fn add_response_header(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(headers::add_response_header(&args.string(0)?))
}

fn add_response_headers(args: &Args<'_>) -> ProxyResult<Vec<Arc<dyn Filter>>> {
    one(headers::add_response_headers(args.strings(0)?))
}
