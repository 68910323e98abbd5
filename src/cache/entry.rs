//! Cache key and entry types
//!
//! This module defines the core cache entry structures:
//! - `CacheVersion`: Identifier of a versioned bucket (`<name>-v<generation>`)
//! - `RequestKey`: Request identity used to look up entries (method + URL + selected headers)
//! - `ResponseSnapshot`: Immutable copy of a network response captured at write time

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::CacheError;

/// Version identifier of a cache bucket
#[derive(Debug, Clone, Hash, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheVersion(String);

impl CacheVersion {
    /// Create a version from an explicit name
    pub fn new(name: impl Into<String>) -> Result<Self, CacheError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(CacheError::InvalidKey(
                "bucket version cannot be empty".to_string(),
            ));
        }
        Ok(Self(name))
    }

    /// Build the conventional `<name>-v<generation>` version
    pub fn from_generation(name: &str, generation: u64) -> Self {
        Self(format!("{}-v{}", name, generation))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Trailing generation number, if the version follows the `-v<n>` convention
    pub fn generation(&self) -> Option<u64> {
        let (_, generation) = self.0.rsplit_once("-v")?;
        generation.parse().ok()
    }
}

impl std::fmt::Display for CacheVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for CacheVersion {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Request identity for cache lookups
///
/// Headers are treated as opaque: names are lowercased and the list is kept
/// sorted so that two keys with the same headers compare equal.
#[derive(Debug, Clone, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestKey {
    /// HTTP method, uppercase
    pub method: String,
    /// Absolute URL or origin-relative path (always with a leading slash)
    pub url: String,
    /// Selected request headers that take part in the identity
    pub headers: Vec<(String, String)>,
}

impl RequestKey {
    /// Create a key for an arbitrary method
    pub fn new(method: &str, url: &str) -> Result<Self, CacheError> {
        let method = http::Method::from_bytes(method.to_ascii_uppercase().as_bytes())
            .map_err(|e| CacheError::InvalidKey(format!("invalid method '{}': {}", method, e)))?;
        Ok(Self {
            method: method.as_str().to_string(),
            url: normalize_url(url),
            headers: Vec::new(),
        })
    }

    /// Create a GET key
    pub fn get(url: &str) -> Self {
        Self {
            method: http::Method::GET.as_str().to_string(),
            url: normalize_url(url),
            headers: Vec::new(),
        }
    }

    /// Add a header to the identity
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers
            .push((name.to_ascii_lowercase(), value.to_string()));
        self.headers.sort();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method == http::Method::GET.as_str()
    }

    /// URL path without scheme, authority, query or fragment
    pub fn path(&self) -> &str {
        let without_origin = match self.url.find("://") {
            Some(scheme_end) => {
                let rest = &self.url[scheme_end + 3..];
                match rest.find('/') {
                    Some(path_start) => &rest[path_start..],
                    None => "/",
                }
            }
            None => self.url.as_str(),
        };
        let end = without_origin
            .find(|c| c == '?' || c == '#')
            .unwrap_or(without_origin.len());
        &without_origin[..end]
    }

    /// Rewrite a same-origin absolute URL to its origin-relative form
    ///
    /// `http://localhost:8080/styles.css` and `/styles.css` name the same
    /// resource when the origin is `http://localhost:8080`. Keys with another
    /// origin, or that are already relative, come back unchanged.
    pub fn relative_to(&self, origin: &str) -> RequestKey {
        let (Some(request), Some(origin)) = (split_origin(&self.url), split_origin(origin)) else {
            return self.clone();
        };
        if request.0 != origin.0 {
            return self.clone();
        }

        let rest = request.1;
        let url = if rest.starts_with('/') {
            rest.to_string()
        } else {
            format!("/{}", rest)
        };
        RequestKey {
            method: self.method.clone(),
            url,
            headers: self.headers.clone(),
        }
    }
}

/// Scheme, host and effective port of an absolute URL, and what follows them
fn split_origin(url: &str) -> Option<((String, String, u16), &str)> {
    let (scheme, rest) = url.split_once("://")?;
    let scheme = scheme.to_ascii_lowercase();
    let authority_end = rest.find(['/', '?', '#']).unwrap_or(rest.len());
    let (authority, tail) = rest.split_at(authority_end);
    if authority.is_empty() || authority.contains('@') {
        return None;
    }

    let (host, port) = match authority.rsplit_once(':') {
        Some((host, port)) if !port.contains(']') => (host, Some(port.parse::<u16>().ok()?)),
        _ => (authority, None),
    };
    let port = match (port, scheme.as_str()) {
        (Some(port), _) => port,
        (None, "http") => 80,
        (None, "https") => 443,
        (None, _) => return None,
    };

    Some(((scheme, host.to_ascii_lowercase(), port), tail))
}

impl std::fmt::Display for RequestKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

/// Relative paths are anchored at the origin root
fn normalize_url(url: &str) -> String {
    if url.contains("://") || url.starts_with('/') {
        url.to_string()
    } else {
        format!("/{}", url)
    }
}

/// Immutable snapshot of a network response
///
/// The body is reference-counted, so cloning a snapshot for write-back does
/// not copy the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
    /// HTTP status code
    pub status: u16,
    /// Response headers in the order they were received
    pub headers: Vec<(String, String)>,
    /// Response body
    pub body: Bytes,
    /// When the snapshot was taken
    pub captured_at: DateTime<Utc>,
}

impl ResponseSnapshot {
    pub fn new(status: u16, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            captured_at: Utc::now(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Case-insensitive header lookup, first match wins
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn content_type(&self) -> Option<&str> {
        self.header("content-type")
    }

    /// 2xx status
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// 5xx status
    pub fn is_server_error(&self) -> bool {
        (500..600).contains(&self.status)
    }

    /// Approximate size of the snapshot in bytes
    pub fn size_bytes(&self) -> usize {
        let header_size: usize = self.headers.iter().map(|(n, v)| n.len() + v.len()).sum();
        self.body.len() + header_size + std::mem::size_of::<u16>()
    }
}
