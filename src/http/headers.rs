//! Request header storage.
//!
//! # Responsibilities
//! - Normalize header names to `Capitalized-Hyphenated` form
//! - Store one value per normalized name, in insertion order
//!
//! # Design Decisions
//! - `_`, `-` and space are all word separators, so `user_agent`,
//!   `User-Agent` and `USER AGENT` name the same header
//! - Lookups normalize the query key the same way stored keys were

use crate::error::{ProxyError, ProxyResult};

/// Normalize a header name.
///
/// `normalize_name(normalize_name(x)) == normalize_name(x)` for every input.
pub fn normalize_name(name: &str) -> String {
    name.split(['_', '-', ' '])
        .filter(|word| !word.is_empty())
        .map(capitalize)
        .collect::<Vec<_>>()
        .join("-")
}

/// Reject names that cannot appear on a header line once normalized.
pub fn validate_name(name: &str) -> ProxyResult<String> {
    let normalized = normalize_name(name);
    let valid = !normalized.is_empty()
        && normalized
            .bytes()
            .all(|b| b.is_ascii_graphic() && !matches!(b, b':' | b'(' | b')' | b'"' | b'<' | b'>' | b'@'));
    if valid {
        Ok(normalized)
    } else {
        Err(ProxyError::InvalidHeader(name.to_string()))
    }
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Ordered header mapping keyed by normalized name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    entries: Vec<(String, String)>,
}

impl HeaderMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value stored under the normalized form of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        let key = normalize_name(name);
        self.entries
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Insert or replace; never produces duplicates.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let key = normalize_name(name);
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        let key = normalize_name(name);
        let index = self.entries.iter().position(|(k, _)| *k == key)?;
        Some(self.entries.remove(index).1)
    }

    pub fn remove_many<S: AsRef<str>>(&mut self, names: &[S]) {
        for name in names {
            self.remove(name.as_ref());
        }
    }

    /// Keep only the listed names. `Accept` and `Content-Type` always survive.
    pub fn retain_only<S: AsRef<str>>(&mut self, allowed: &[S]) {
        let mut keep: Vec<String> = allowed.iter().map(|n| normalize_name(n.as_ref())).collect();
        keep.push("Accept".to_string());
        keep.push("Content-Type".to_string());
        self.entries.retain(|(k, _)| keep.contains(k));
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for HeaderMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        for (k, v) in iter {
            map.set(k.as_ref(), v);
        }
        map
    }
}
