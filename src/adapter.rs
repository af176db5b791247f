//! Bridges completion-callback operations into futures.
//!
//! Some cache backends report results by invoking a callback rather than by
//! returning a future. [`promisify`] hands such an operation a [`Completion`]
//! handle and awaits whatever the operation reports through it, so the
//! result composes with `?` and `.await` like any other async call.
//!
//! ```
//! # use access_watch::adapter::{promisify, Abandoned, Completion};
//! # #[derive(Debug)] struct MyError;
//! # impl From<Abandoned> for MyError { fn from(_: Abandoned) -> Self { MyError } }
//! fn lookup(key: &str, done: Completion<usize, MyError>) {
//!     done.ok(key.len());
//! }
//!
//! # tokio_test(async {
//! let len = promisify(|done| lookup("abc", done)).await.unwrap();
//! assert_eq!(len, 3);
//! # });
//! # fn tokio_test<F: std::future::Future>(f: F) {
//! #     tokio::runtime::Runtime::new().unwrap().block_on(f);
//! # }
//! ```
//!
//! There is no retry and no timeout here. An operation that never completes
//! leaves the future pending; wrap it in `tokio::time::timeout` if that
//! matters to the caller.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::oneshot;

use crate::cache::Cache;
use crate::error::CacheError;
use crate::session::Session;

/// The operation dropped its [`Completion`] without reporting a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("operation dropped its completion without reporting a result")]
pub struct Abandoned;

/// One-shot handle an operation uses to report its outcome.
///
/// The handle is `Send`, so it may be completed from another thread or task.
#[derive(Debug)]
pub struct Completion<T, E> {
    tx: oneshot::Sender<Result<T, E>>,
}

impl<T, E> Completion<T, E> {
    /// Report the outcome.
    pub fn complete(self, result: Result<T, E>) {
        // The awaiting side may have been cancelled; nothing to do then.
        let _ = self.tx.send(result);
    }

    /// Report success.
    pub fn ok(self, value: T) {
        self.complete(Ok(value));
    }

    /// Report failure.
    pub fn fail(self, err: E) {
        self.complete(Err(err));
    }
}

/// Run a completion-callback operation and await its outcome.
///
/// `op` receives the completion handle; leading arguments and the receiver
/// the operation belongs to are captured by the closure itself.
pub async fn promisify<T, E, F>(op: F) -> Result<T, E>
where
    F: FnOnce(Completion<T, E>),
    E: From<Abandoned>,
{
    let (tx, rx) = oneshot::channel();
    op(Completion { tx });
    match rx.await {
        Ok(result) => result,
        Err(_) => Err(Abandoned.into()),
    }
}

/// A cache that reports results through completion callbacks.
///
/// Wrap an implementation in [`Callbacks`] to use it as a [`Cache`].
pub trait CallbackCache: Send + Sync {
    /// Look up `key`, completing with `None` on a miss.
    fn get(&self, key: &str, done: Completion<Option<Session>, CacheError>);

    /// Store `session` under `key`.
    fn set(&self, key: &str, session: Session, done: Completion<(), CacheError>);

    /// Remove `key`. Backends may know this operation as `drop`.
    fn del(&self, key: &str, done: Completion<(), CacheError>);
}

/// Async [`Cache`] view over a [`CallbackCache`].
#[derive(Debug, Clone)]
pub struct Callbacks<C>(pub C);

#[async_trait]
impl<C: CallbackCache> Cache for Callbacks<C> {
    async fn get(&self, key: &str) -> Result<Option<Session>, CacheError> {
        promisify(|done| self.0.get(key, done)).await
    }

    async fn set(&self, key: &str, session: Session) -> Result<(), CacheError> {
        promisify(|done| self.0.set(key, session, done)).await
    }

    async fn del(&self, key: &str) -> Result<(), CacheError> {
        promisify(|done| self.0.del(key, done)).await
    }
}
