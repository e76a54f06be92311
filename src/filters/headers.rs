//! Header filters.
//!
//! Request-side filters mutate the normalized header map before `next`,
//! since they shape what is sent. Response-side filters act on the raw
//! header lines after `next`, once the origin has answered.

use regex::Regex;

use crate::error::ProxyResult;
use crate::http::request::ProxyRequest;
use crate::http::response::ProxyResponse;
use crate::pipeline::{After, Before, Filter};

pub fn set_user_agent(user_agent: &str) -> impl Filter {
    add_request_header("User-Agent", user_agent)
}

/// Ask the origin for an uncompressed body.
pub fn no_compress() -> impl Filter {
    remove_request_header("Accept-Encoding")
}

pub fn add_request_header(name: &str, value: &str) -> impl Filter {
    let name = name.to_string();
    let value = value.to_string();
    Before(move |req: &mut ProxyRequest, _: &mut ProxyResponse| {
        req.set_header(&name, value.clone());
    })
}

pub fn add_request_headers(headers: Vec<(String, String)>) -> impl Filter {
    Before(move |req: &mut ProxyRequest, _: &mut ProxyResponse| {
        req.set_headers(headers.iter().map(|(k, v)| (k.as_str(), v.clone())));
    })
}

pub fn remove_request_header(name: &str) -> impl Filter {
    let name = name.to_string();
    Before(move |req: &mut ProxyRequest, _: &mut ProxyResponse| {
        req.remove_header(&name);
    })
}

pub fn remove_request_headers(names: Vec<String>) -> impl Filter {
    Before(move |req: &mut ProxyRequest, _: &mut ProxyResponse| {
        req.remove_headers(&names);
    })
}

/// Keep only `allowed` request headers, plus `Accept` and `Content-Type`.
pub fn request_header_whitelist(allowed: Vec<String>) -> impl Filter {
    Before(move |req: &mut ProxyRequest, _: &mut ProxyResponse| {
        req.retain_headers(&allowed);
    })
}

/// Drop every request header except `Accept` and `Content-Type`.
pub fn remove_all_request_headers() -> impl Filter {
    request_header_whitelist(Vec::new())
}

/// Remove every response header line matching `pattern` on the way out.
pub fn remove_response_headers_matching(pattern: &str) -> ProxyResult<impl Filter> {
    let pattern = Regex::new(pattern)?;
    Ok(remove_response_headers_regex(pattern))
}

pub fn remove_response_headers_regex(pattern: Regex) -> impl Filter {
    After(move |_: &mut ProxyRequest, resp: &mut ProxyResponse| {
        resp.remove_headers_matching(&pattern);
    })
}

pub fn add_response_header(line: &str) -> impl Filter {
    let line = line.to_string();
    After(move |_: &mut ProxyRequest, resp: &mut ProxyResponse| {
        resp.add_header(line.clone());
    })
}

pub fn add_response_headers(lines: Vec<String>) -> impl Filter {
    After(move |_: &mut ProxyRequest, resp: &mut ProxyResponse| {
        resp.add_headers(lines.iter().cloned());
    })
}

/// Override the response `Content-Type` after the origin answered.
pub fn set_response_content_type(mime: &str) -> impl Filter {
    let mime = mime.to_string();
    After(move |_: &mut ProxyRequest, resp: &mut ProxyResponse| {
        resp.remove_named("Content-Type");
        resp.add_header(format!("Content-Type: {mime}"));
    })
}
