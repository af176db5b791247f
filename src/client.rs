//! The client tying fingerprinting, the session cache and the API together.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::adapter::{CallbackCache, Callbacks};
use crate::api::{ApiClient, DEFAULT_API_BASE};
use crate::cache::Cache;
use crate::config::Config;
use crate::error::Error;
use crate::forwarded::ForwardedHeaders;
use crate::report::{ActivityReporter, DEFAULT_HEADER_BLACKLIST};
use crate::request::IncomingRequest;
use crate::session::Session;
use crate::signature::{Identity, RequestSigner};

/// Access Watch client.
///
/// Cheap to clone; clones share the cache and HTTP connection pool.
#[derive(Clone)]
pub struct AccessWatch {
    api: ApiClient,
    cache: Arc<dyn Cache>,
    signer: RequestSigner,
    reporter: Arc<ActivityReporter>,
}

impl AccessWatch {
    /// Start configuring a client.
    pub fn builder() -> AccessWatchBuilder {
        AccessWatchBuilder::default()
    }

    /// The underlying API client.
    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Identity of `request`, the key its session is cached under.
    pub fn identity(&self, request: &IncomingRequest) -> Identity {
        self.signer.sign(request)
    }

    /// Verify the API base and key. Typically called once at startup.
    pub async fn hello(&self) -> Result<(), Error> {
        self.api.hello().await
    }

    /// Find the session for `request`, from the cache when possible.
    ///
    /// A cache hit returns without contacting the API. Otherwise the API is
    /// asked, and its answer is returned while a background task stores it
    /// under the request identity. A failed or stalled store never delays or
    /// fails the lookup. With `skip_cache` the cache is not read, but is
    /// still written. Must be called inside a tokio runtime.
    ///
    /// Concurrent misses for the same identity each query the API; the last
    /// write wins.
    pub async fn resolve_session(
        &self,
        request: &IncomingRequest,
        skip_cache: bool,
    ) -> Result<Session, Error> {
        let identity = self.signer.sign(request);

        if !skip_cache {
            if let Some(session) = self.cache.get(identity.as_str()).await? {
                debug!(identity = %identity, "Session cache hit");
                return Ok(session);
            }
            debug!(identity = %identity, "Session cache miss");
        }

        let session = self
            .api
            .identity(&request.remote_addr, &request.headers)
            .await?;

        self.store_session(identity, session.clone());

        Ok(session)
    }

    /// Write `session` to the cache without waiting for the backend.
    fn store_session(&self, identity: Identity, session: Session) {
        let cache = Arc::clone(&self.cache);
        tokio::spawn(async move {
            if let Err(e) = cache.set(identity.as_str(), session).await {
                warn!(identity = %identity, error = %e, "Failed to cache session");
            }
        });
    }

    /// Whether `request` belongs to a visitor the API has blocked.
    ///
    /// Only the cache is consulted, never the API. A miss, a session without
    /// a truthy `blocked` field, and any cache failure all answer `false`.
    pub async fn is_blocked(&self, request: &IncomingRequest) -> bool {
        let identity = self.signer.sign(request);

        match self.cache.get(identity.as_str()).await {
            Ok(Some(session)) => session.is_blocked(),
            Ok(None) => false,
            Err(e) => {
                warn!(
                    identity = %identity,
                    error = %e,
                    "Session cache read failed, not blocking"
                );
                false
            }
        }
    }

    /// Forget the cached session for `request`.
    pub async fn drop_session(&self, request: &IncomingRequest) -> Result<(), Error> {
        let identity = self.signer.sign(request);
        self.cache.del(identity.as_str()).await?;
        Ok(())
    }

    /// Send an activity record for `request`, answered with `status`.
    pub async fn report(&self, request: &IncomingRequest, status: u16) -> Result<(), Error> {
        let record = self.reporter.record(request, status, Utc::now());
        self.api.log(&record).await
    }

    /// Report in the background. Failures are logged, not returned.
    pub fn spawn_report(&self, request: IncomingRequest, status: u16) -> JoinHandle<()> {
        let client = self.clone();
        tokio::spawn(async move {
            if let Err(e) = client.report(&request, status).await {
                warn!(url = %request.url, error = %e, "Failed to report activity");
            }
        })
    }
}

/// Builder for [`AccessWatch`]. The API key and a cache are required.
#[derive(Default)]
pub struct AccessWatchBuilder {
    api_key: Option<String>,
    api_base: Option<String>,
    cache: Option<Arc<dyn Cache>>,
    forwarded_headers: ForwardedHeaders,
    header_blacklist: Option<Vec<String>>,
    timeout: Option<Duration>,
}

impl AccessWatchBuilder {
    /// Start from a loaded [`Config`]. The cache still has to be supplied.
    pub fn from_config(config: &Config) -> Self {
        Self {
            api_key: Some(config.api_key.clone()),
            api_base: Some(config.api_base.clone()),
            cache: None,
            forwarded_headers: config.forwarded_headers.build(),
            header_blacklist: Some(config.header_blacklist.clone()),
            timeout: config.timeout_ms.map(Duration::from_millis),
        }
    }

    /// Set the API key. Required.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Override the API base, e.g. for testing.
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = Some(api_base.into());
        self
    }

    /// Use `cache` for sessions.
    pub fn with_cache(self, cache: impl Cache + 'static) -> Self {
        self.with_shared_cache(Arc::new(cache))
    }

    /// Use a cache shared with other owners.
    pub fn with_shared_cache(mut self, cache: Arc<dyn Cache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Use a cache that reports through completion callbacks.
    pub fn with_callback_cache(self, cache: impl CallbackCache + 'static) -> Self {
        self.with_cache(Callbacks(cache))
    }

    /// Required when running behind a reverse proxy.
    pub fn with_forwarded_headers(mut self, forwarded_headers: ForwardedHeaders) -> Self {
        self.forwarded_headers = forwarded_headers;
        self
    }

    /// Replace the default blacklist (`cookie`).
    pub fn with_header_blacklist<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.header_blacklist = Some(names.into_iter().map(Into::into).collect());
        self
    }

    /// Bound each API request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client, failing on a missing cache or API key.
    pub fn build(self) -> Result<AccessWatch, Error> {
        let cache = self.cache.ok_or(Error::MissingOption("cache"))?;
        let api_key = self
            .api_key
            .filter(|key| !key.is_empty())
            .ok_or(Error::MissingOption("api_key"))?;
        let api_base = self
            .api_base
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        reqwest::Url::parse(&api_base)
            .map_err(|e| Error::InvalidConfig(format!("api_base '{}': {}", api_base, e)))?;

        let api = ApiClient::new(api_base, api_key, self.timeout)?;
        let signer = RequestSigner::new(self.forwarded_headers.address.clone());
        let reporter = match self.header_blacklist {
            Some(names) => ActivityReporter::new(self.forwarded_headers, names),
            None => ActivityReporter::new(self.forwarded_headers, DEFAULT_HEADER_BLACKLIST),
        };

        Ok(AccessWatch {
            api,
            cache,
            signer,
            reporter: Arc::new(reporter),
        })
    }
}
