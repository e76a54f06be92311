//! Filter library.
//!
//! # Responsibilities
//! - Target rewriting (`rewrite.rs`)
//! - Request and response header manipulation (`headers.rs`)
//! - Cache suppression (`cache.rs`)
//! - Download presentation and timeouts (`download.rs`)
//! - Saving the body to disk (`save.rs`)
//! - Regex-conditional sub-pipelines (`matching.rs`)
//! - Name → constructor lookup for configuration (`registry.rs`)
//!
//! Every filter is also reachable through a fluent method on [`Pipeline`]:
//!
//! ```ignore
//! let response = Pipeline::new()
//!     .relative_path("/manager", "http://app.com/api", true)
//!     .no_cache()
//!     .download(Some("report.pdf".into()))
//!     .forward(Some(request))
//!     .await?;
//! ```

pub mod cache;
pub mod download;
pub mod headers;
pub mod matching;
pub mod registry;
pub mod rewrite;
pub mod save;

use std::path::PathBuf;
use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::error::ProxyResult;
use crate::http::request::ProxyRequest;
use crate::http::response::ProxyResponse;
use crate::pipeline::{Next, Pipeline};

pub use cache::NoCache;
pub use download::{Download, SetTimeout};
pub use matching::{Captures, MatchRequest, MatchResponseHeader};
pub use rewrite::{MissPolicy, RelativePath, SetUrl};
pub use save::SaveToFile;

impl Pipeline {
    pub fn relative_path(self, prefix: &str, origin: &str, hit_header: bool) -> Self {
        self.add_filter(RelativePath::new(prefix, origin, hit_header))
    }

    pub fn set_url(self, url: &str) -> Self {
        self.add_filter(SetUrl::new(url))
    }

    pub fn set_user_agent(self, user_agent: &str) -> Self {
        self.add_filter(headers::set_user_agent(user_agent))
    }

    pub fn no_cache(self) -> Self {
        self.add_filter(NoCache)
    }

    pub fn no_compress(self) -> Self {
        self.add_filter(headers::no_compress())
    }

    pub fn set_response_content_type(self, mime: &str) -> Self {
        self.add_filter(headers::set_response_content_type(mime))
    }

    /// No-cache plus download presentation, with the 7200 s download timeout.
    pub fn download(self, file_name: Option<String>) -> Self {
        self.no_cache().add_filter(Download::new(file_name))
    }

    pub fn set_timeout(self, timeout: Duration) -> Self {
        self.add_filter(SetTimeout(timeout))
    }

    pub fn save_to_file(self, path: impl Into<PathBuf>) -> Self {
        self.add_filter(SaveToFile::new(path))
    }

    pub fn request_header_whitelist(self, allowed: Vec<String>) -> Self {
        self.add_filter(headers::request_header_whitelist(allowed))
    }

    pub fn add_request_header(self, name: &str, value: &str) -> Self {
        self.add_filter(headers::add_request_header(name, value))
    }

    pub fn add_request_headers(self, pairs: Vec<(String, String)>) -> Self {
        self.add_filter(headers::add_request_headers(pairs))
    }

    pub fn remove_request_header(self, name: &str) -> Self {
        self.add_filter(headers::remove_request_header(name))
    }

    pub fn remove_request_headers(self, names: Vec<String>) -> Self {
        self.add_filter(headers::remove_request_headers(names))
    }

    pub fn remove_all_request_headers(self) -> Self {
        self.add_filter(headers::remove_all_request_headers())
    }

    pub fn remove_response_headers_matching(self, pattern: &str) -> ProxyResult<Self> {
        Ok(self.add_filter(headers::remove_response_headers_matching(pattern)?))
    }

    pub fn add_response_header(self, line: &str) -> Self {
        self.add_filter(headers::add_response_header(line))
    }

    pub fn add_response_headers(self, lines: Vec<String>) -> Self {
        self.add_filter(headers::add_response_headers(lines))
    }

    pub fn match_url<F>(self, pattern: &str, handler: F) -> ProxyResult<Self>
    where
        F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Next<'a>, Captures) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Ok(self.add_filter(MatchRequest::url(pattern, handler)?))
    }

    pub fn match_path<F>(self, pattern: &str, handler: F) -> ProxyResult<Self>
    where
        F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Next<'a>, Captures) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Ok(self.add_filter(MatchRequest::path(pattern, handler)?))
    }

    pub fn match_response_header<F>(self, pattern: &str, remove_match: bool, hook: F) -> ProxyResult<Self>
    where
        F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Captures) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Ok(self.add_filter(MatchResponseHeader::new(pattern, remove_match, hook)?))
    }

    pub fn match_response_content_type<F>(self, content_type: &str, hook: F) -> ProxyResult<Self>
    where
        F: for<'a> Fn(&'a mut ProxyRequest, &'a mut ProxyResponse, Captures) -> BoxFuture<'a, ()>
            + Send
            + Sync
            + 'static,
    {
        Ok(self.add_filter(MatchResponseHeader::content_type(content_type, hook)?))
    }

    /// Append the filter(s) registered under `name`.
    pub fn add_named(mut self, name: &str, args: &serde_json::Value) -> ProxyResult<Self> {
        for filter in registry::build(name, args)? {
            self.push(filter);
        }
        Ok(self)
    }
}
