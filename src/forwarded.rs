//! Reverse-proxy header overrides.
//!
//! Behind nginx, haproxy or a load balancer the socket peer is the proxy.
//! The proxy forwards the original client's address, host and scheme in
//! headers; [`ForwardedHeaders`] says where to find each of them.

use std::borrow::Cow;

use crate::request::Headers;

/// Where a forwarded value comes from.
#[derive(Clone)]
pub enum HeaderSource {
    /// Value of the named header, taken as is.
    Literal(Cow<'static, str>),
    /// Value computed from the full header set.
    Derived(fn(&Headers) -> Option<String>),
}

impl std::fmt::Debug for HeaderSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeaderSource::Literal(name) => f.debug_tuple("Literal").field(name).finish(),
            HeaderSource::Derived(_) => f.write_str("Derived(..)"),
        }
    }
}

impl HeaderSource {
    /// Source reading the named header.
    pub fn header(name: impl Into<String>) -> Self {
        HeaderSource::Literal(Cow::Owned(name.into()))
    }

    /// Resolve against `headers`. Empty values count as absent.
    pub fn resolve(&self, headers: &Headers) -> Option<String> {
        let value = match self {
            HeaderSource::Literal(name) => headers.get(name).map(str::to_string),
            HeaderSource::Derived(derive) => derive(headers),
        };
        value.filter(|v| !v.is_empty())
    }
}

/// Forwarded-value sources for host, scheme and client address.
#[derive(Debug, Clone, Default)]
pub struct ForwardedHeaders {
    pub host: Option<HeaderSource>,
    pub scheme: Option<HeaderSource>,
    pub address: Option<HeaderSource>,
}

/// Headers set by a conventionally configured reverse proxy.
pub const STANDARD_FORWARDED_HEADERS: ForwardedHeaders = ForwardedHeaders {
    host: Some(HeaderSource::Literal(Cow::Borrowed("x-forwarded-host"))),
    scheme: Some(HeaderSource::Literal(Cow::Borrowed("x-forwarded-proto"))),
    address: Some(HeaderSource::Derived(first_forwarded_for)),
};

impl ForwardedHeaders {
    /// No overrides: every value comes from the connection itself.
    pub fn none() -> Self {
        Self::default()
    }

    /// The [`STANDARD_FORWARDED_HEADERS`] preset.
    pub fn standard() -> Self {
        STANDARD_FORWARDED_HEADERS
    }

    /// Forwarded host, if configured and present.
    pub fn host(&self, headers: &Headers) -> Option<String> {
        resolve(&self.host, headers)
    }

    /// Forwarded scheme, if configured and present.
    pub fn scheme(&self, headers: &Headers) -> Option<String> {
        resolve(&self.scheme, headers)
    }

    /// Forwarded client address, if configured and present.
    pub fn address(&self, headers: &Headers) -> Option<String> {
        resolve(&self.address, headers)
    }
}

fn resolve(source: &Option<HeaderSource>, headers: &Headers) -> Option<String> {
    source.as_ref().and_then(|s| s.resolve(headers))
}

/// Leftmost entry of `X-Forwarded-For`, the originating client.
pub fn first_forwarded_for(headers: &Headers) -> Option<String> {
    headers
        .get("x-forwarded-for")?
        .split([',', ' '])
        .next()
        .map(str::to_string)
}
