//! Request fingerprinting.
//!
//! A request's identity is a digest over its client address and the values
//! of a small fixed set of headers that describe the user agent. Requests
//! from the same client with the same agent headers share an identity, and
//! the identity is the key sessions are cached under.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;

use crate::forwarded::HeaderSource;
use crate::request::IncomingRequest;

/// Headers that take part in the signature.
pub const SIGNATURE_HEADERS: [&str; 7] = [
    "user-agent",
    "accept",
    "accept-charset",
    "accept-language",
    "accept-encoding",
    "from",
    "dnt",
];

/// Opaque fixed-length request identity (lower-case hex SHA-256).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identity(String);

impl Identity {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derives [`Identity`] values from requests.
#[derive(Debug, Clone, Default)]
pub struct RequestSigner {
    forwarded_address: Option<HeaderSource>,
}

impl RequestSigner {
    /// Signer that takes the client address from `forwarded_address` when it
    /// yields a value and from the socket otherwise.
    pub fn new(forwarded_address: Option<HeaderSource>) -> Self {
        Self { forwarded_address }
    }

    /// Address used for the signature.
    pub fn signature_address<'a>(&self, request: &'a IncomingRequest) -> Cow<'a, str> {
        match self
            .forwarded_address
            .as_ref()
            .and_then(|source| source.resolve(&request.headers))
        {
            Some(forwarded) => forwarded.into(),
            None => request.remote_addr.as_str().into(),
        }
    }

    /// Compute the identity of `request`.
    ///
    /// Only the signature address and [`SIGNATURE_HEADERS`] are read. A
    /// header that is present with an empty value signs differently from one
    /// that is absent.
    pub fn sign(&self, request: &IncomingRequest) -> Identity {
        let mut signed = Map::new();
        for name in SIGNATURE_HEADERS {
            if let Some(value) = request.headers.get(name) {
                signed.insert(name.to_string(), Value::String(value.to_string()));
            }
        }

        let mut hasher = Sha256::new();
        hasher.update(self.signature_address(request).as_bytes());
        // Keys go in a fixed order, so the serialization is stable.
        hasher.update(Value::Object(signed).to_string().as_bytes());
        Identity(hex::encode(hasher.finalize()))
    }
}
