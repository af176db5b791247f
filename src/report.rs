//! Activity records describing a finished request/response cycle.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::forwarded::ForwardedHeaders;
use crate::request::{Headers, IncomingRequest};

/// Headers left out of activity records unless configured otherwise.
pub const DEFAULT_HEADER_BLACKLIST: [&str; 1] = ["cookie"];

/// Body of a `/log` submission.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityRecord {
    /// ISO-8601 UTC timestamp with millisecond precision.
    pub time: String,
    pub address: String,
    pub request: RequestRecord,
    pub response: ResponseRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestRecord {
    /// e.g. `HTTP/1.1`
    pub protocol: String,
    pub method: String,
    pub scheme: String,
    pub host: String,
    /// Only set for a port other than the scheme's default.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<String>,
    pub url: String,
    pub headers: Headers,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResponseRecord {
    pub status: u16,
}

/// Builds [`ActivityRecord`]s, applying proxy overrides and the header
/// blacklist.
#[derive(Debug, Clone)]
pub struct ActivityReporter {
    forwarded: ForwardedHeaders,
    blacklist: Vec<String>,
}

impl ActivityReporter {
    /// `blacklist` names are matched case-insensitively.
    pub fn new<I, S>(forwarded: ForwardedHeaders, blacklist: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            forwarded,
            blacklist: blacklist
                .into_iter()
                .map(|name| name.as_ref().to_ascii_lowercase())
                .collect(),
        }
    }

    fn is_blacklisted(&self, name: &str) -> bool {
        self.blacklist.iter().any(|b| b == name)
    }

    /// Describe `request` answered with `status` at `now`.
    pub fn record(
        &self,
        request: &IncomingRequest,
        status: u16,
        now: DateTime<Utc>,
    ) -> ActivityRecord {
        let headers = &request.headers;

        let address = self
            .forwarded
            .address(headers)
            .unwrap_or_else(|| request.remote_addr.clone());

        let scheme = self.forwarded.scheme(headers).unwrap_or_else(|| {
            let inferred = if request.encrypted { "https" } else { "http" };
            inferred.to_string()
        });

        let authority = self
            .forwarded
            .host(headers)
            .or_else(|| headers.get("host").map(str::to_string))
            .unwrap_or_default();
        let (host, port) = split_authority(&authority);
        let port = port.filter(|p| Some(*p) != default_port(&scheme));

        let kept = headers
            .iter()
            .filter(|(name, _)| !self.is_blacklisted(name))
            .collect();

        ActivityRecord {
            time: now.to_rfc3339_opts(SecondsFormat::Millis, true),
            address,
            request: RequestRecord {
                protocol: format!("HTTP/{}", request.http_version),
                method: request.method.clone(),
                scheme,
                host: host.to_string(),
                port: port.map(str::to_string),
                url: request.url.clone(),
                headers: kept,
            },
            response: ResponseRecord { status },
        }
    }
}

fn default_port(scheme: &str) -> Option<&'static str> {
    match scheme {
        "http" => Some("80"),
        "https" => Some("443"),
        _ => None,
    }
}

/// Split `host[:port]`, keeping bracketed IPv6 literals whole.
///
/// Only a trailing all-digit segment counts as a port, so a bare IPv6
/// address such as `::1` stays a host.
fn split_authority(authority: &str) -> (&str, Option<&str>) {
    if authority.starts_with('[') {
        if let Some(end) = authority.find(']') {
            let port = authority[end + 1..].strip_prefix(':');
            return (&authority[..=end], port.filter(|p| is_port(p)));
        }
    }

    match authority.rsplit_once(':') {
        Some((host, port)) if is_port(port) && !host.contains(':') => (host, Some(port)),
        Some((host, "")) if !host.contains(':') => (host, None),
        _ => (authority, None),
    }
}

fn is_port(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}
