//! Request descriptors handed in by the hosting server.

use serde::Serialize;
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Header map with case-insensitive names.
///
/// Names are stored lower-cased. Inserting a name twice joins the values
/// with `", "`, the way repeated request headers are usually folded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Headers(BTreeMap<String, String>);

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header value.
    pub fn insert(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        let value = value.into();
        self.0
            .entry(name.as_ref().to_ascii_lowercase())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }

    /// Look up a header by name, ignoring case.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Iterate over `(lower-cased name, value)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for Headers {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut headers = Headers::new();
        for (name, value) in iter {
            headers.insert(name, value);
        }
        headers
    }
}

impl From<&http::HeaderMap> for Headers {
    fn from(map: &http::HeaderMap) -> Self {
        map.iter()
            .map(|(name, value)| {
                (
                    name.as_str(),
                    String::from_utf8_lossy(value.as_bytes()).into_owned(),
                )
            })
            .collect()
    }
}

/// The parts of an inbound request the client reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingRequest {
    /// Socket-level peer address, not necessarily the public client.
    pub remote_addr: String,
    pub method: String,
    /// Path and query as received.
    pub url: String,
    /// Version number without the `HTTP/` prefix, e.g. `1.1`.
    pub http_version: String,
    /// Whether the connection was TLS-encrypted.
    pub encrypted: bool,
    pub headers: Headers,
}

impl IncomingRequest {
    /// A `GET /` over plain HTTP/1.1 from `remote_addr` with no headers.
    pub fn new(remote_addr: impl Into<String>) -> Self {
        Self {
            remote_addr: remote_addr.into(),
            method: "GET".to_string(),
            url: "/".to_string(),
            http_version: "1.1".to_string(),
            encrypted: false,
            headers: Headers::new(),
        }
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    pub fn with_http_version(mut self, version: impl Into<String>) -> Self {
        self.http_version = version.into();
        self
    }

    pub fn with_encrypted(mut self, encrypted: bool) -> Self {
        self.encrypted = encrypted;
        self
    }

    /// Describe an `http::Request` accepted from `peer`.
    pub fn from_http<B>(request: &http::Request<B>, peer: SocketAddr, encrypted: bool) -> Self {
        let url = request
            .uri()
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Self {
            remote_addr: peer.ip().to_string(),
            method: request.method().as_str().to_string(),
            url,
            http_version: version_number(request.version()).to_string(),
            encrypted,
            headers: Headers::from(request.headers()),
        }
    }
}

fn version_number(version: http::Version) -> &'static str {
    match version {
        http::Version::HTTP_09 => "0.9",
        http::Version::HTTP_10 => "1.0",
        http::Version::HTTP_2 => "2.0",
        http::Version::HTTP_3 => "3.0",
        _ => "1.1",
    }
}
