//! Access Watch client for web servers.
//!
//! Fingerprints inbound requests, checks cached verdicts to decide whether
//! a visitor is blocked, resolves sessions through the Access Watch API and
//! reports finished request/response cycles for offline analysis.
//!
//! # Features
//!
//! - **Request Identity** - Digest of the client address and user-agent
//!   headers, used as the session cache key
//! - **Session Resolution** - Cache first, API on a miss, cache refill
//! - **Block Checks** - Cache-only and fail-open, never adds an API round trip
//! - **Activity Reports** - Structured `/log` records with a header blacklist
//! - **Reverse Proxy Support** - Forwarded host, scheme and address overrides
//! - **Pluggable Caches** - Async [`Cache`] trait, callback-style backends via
//!   [`adapter::Callbacks`], bundled [`MemoryCache`]
//!
//! # Example Configuration
//!
//! ```yaml
//! api_key: "${ACCESS_WATCH_API_KEY}"
//!
//! forwarded_headers:
//!   preset: standard
//!
//! header_blacklist:
//!   - "cookie"
//!
//! cache:
//!   ttl_seconds: 3600
//! ```

pub mod adapter;
pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod forwarded;
pub mod report;
pub mod request;
pub mod session;
pub mod signature;

pub use cache::{Cache, MemoryCache};
pub use client::{AccessWatch, AccessWatchBuilder};
pub use config::Config;
pub use error::{CacheError, Error};
pub use forwarded::{ForwardedHeaders, HeaderSource, STANDARD_FORWARDED_HEADERS};
pub use request::{Headers, IncomingRequest};
pub use session::Session;
pub use signature::{Identity, RequestSigner};
