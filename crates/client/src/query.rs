//! Async query runner over the shared [`QueryCache`].
//!
//! Queries are served from the cache while fresh. Otherwise one fetch per
//! cache key runs at a time: concurrent callers for the same key join the
//! in-flight request instead of issuing another. Every request reports its
//! lifecycle to the [`SessionState`].

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use todosync_core::cache::{serialize_args, CacheError, CacheKey, Endpoint, QueryCache, Tag};
use todosync_core::session::{SessionAction, SessionState};
use tracing::{debug, warn};

use crate::error::Result;

type SharedFetch = Shared<BoxFuture<'static, std::result::Result<Value, CacheError>>>;
type Refetch = Arc<dyn Fn() -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// How to refetch a subscribed query.
struct Watcher {
    args: Value,
    tags: Vec<Tag>,
    refetch: Refetch,
}

/// Owner of the query cache, the session state and the in-flight table.
#[derive(Clone, Default)]
pub struct QueryClient {
    cache: Arc<RwLock<QueryCache>>,
    session: Arc<RwLock<SessionState>>,
    in_flight: Arc<Mutex<HashMap<CacheKey, SharedFetch>>>,
    watchers: Arc<Mutex<HashMap<CacheKey, Watcher>>>,
}

/// Erases a typed fetch into one producing the cached JSON value.
fn into_value<T, Fut>(fetch: Fut) -> BoxFuture<'static, Result<Value>>
where
    T: Serialize + Send + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
{
    async move {
        let data = fetch.await?;
        Ok(serde_json::to_value(&data)?)
    }
    .boxed()
}

impl QueryClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cache(&self) -> &Arc<RwLock<QueryCache>> {
        &self.cache
    }

    /// Applies a session action.
    pub async fn dispatch(&self, action: SessionAction) {
        self.session.write().await.apply(action);
    }

    /// A copy of the current session state.
    pub async fn session(&self) -> SessionState {
        self.session.read().await.clone()
    }

    /// Runs a cached query.
    ///
    /// Returns the cached value when the entry is fresh; otherwise fetches,
    /// stores the result under `tags` and returns it. Concurrent calls with
    /// the same endpoint and arguments share a single `fetch`.
    pub async fn query<A, T, F, Fut>(
        &self,
        endpoint: Endpoint,
        args: &A,
        tags: Vec<Tag>,
        fetch: F,
    ) -> Result<T>
    where
        A: Serialize + ?Sized,
        T: Serialize + DeserializeOwned + Send + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let args = serialize_args(args)?;
        let key = CacheKey::from_value(endpoint, &args);

        {
            let cache = self.cache.read().await;
            if !cache.needs_fetch(&key) {
                if let Some(value) = cache.data::<T>(&key)? {
                    debug!(key = %key, "cache hit");
                    return Ok(value);
                }
            }
        }

        let value = self
            .fetch_shared(key, args, tags, move || into_value(fetch()))
            .await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Joins the in-flight request for `key`, or starts one.
    ///
    /// Freshness is checked again under the in-flight lock: a fetch that
    /// settled since the caller's check leaves nothing to join.
    async fn fetch_shared<F>(
        &self,
        key: CacheKey,
        args: Value,
        tags: Vec<Tag>,
        fetch: F,
    ) -> Result<Value>
    where
        F: FnOnce() -> BoxFuture<'static, Result<Value>>,
    {
        let shared = {
            let mut in_flight = self.in_flight.lock().await;
            match in_flight.get(&key) {
                Some(existing) => {
                    debug!(key = %key, "joining in-flight request");
                    existing.clone()
                }
                None => {
                    {
                        let cache = self.cache.read().await;
                        let fresh = cache
                            .get(&key)
                            .filter(|entry| entry.is_fresh())
                            .and_then(|entry| entry.data.clone());
                        if let Some(value) = fresh {
                            debug!(key = %key, "cache hit");
                            return Ok(value);
                        }
                    }
                    let shared = self.run_fetch(key.clone(), args, tags, fetch()).boxed().shared();
                    in_flight.insert(key, shared.clone());
                    shared
                }
            }
        };

        Ok(shared.await?)
    }

    fn run_fetch(
        &self,
        key: CacheKey,
        args: Value,
        tags: Vec<Tag>,
        fetch: BoxFuture<'static, Result<Value>>,
    ) -> impl Future<Output = std::result::Result<Value, CacheError>> + Send + 'static {
        let cache = self.cache.clone();
        let session = self.session.clone();
        let in_flight = self.in_flight.clone();
        let config = key.endpoint().config();

        async move {
            session.write().await.apply(SessionAction::RequestStarted(config));
            cache.write().await.mark_pending(&key, args.clone(), tags.clone());
            debug!(key = %key, "fetching");

            let outcome = match fetch.await {
                Ok(value) => Ok(value),
                Err(e) => {
                    warn!(key = %key, error = %e, "query failed");
                    let message = e.user_message();
                    session.write().await.apply(SessionAction::SetError(Some(message)));
                    Err(CacheError::FetchFailed(e.to_string()))
                }
            };

            match &outcome {
                Ok(value) => {
                    cache.write().await.write(&key, args, value.clone(), tags);
                    session.write().await.apply(SessionAction::RequestFulfilled(config));
                }
                Err(e) => {
                    cache.write().await.mark_rejected(&key, args, e.to_string());
                    session.write().await.apply(SessionAction::RequestRejected(config));
                }
            }

            in_flight.lock().await.remove(&key);
            outcome
        }
    }

    /// Subscribes to a query and returns its key.
    ///
    /// While an entry has subscribers, invalidating one of its tags refetches
    /// it right away through `fetch` instead of waiting for the next access.
    pub async fn subscribe<A, T, F, Fut>(
        &self,
        endpoint: Endpoint,
        args: &A,
        tags: Vec<Tag>,
        fetch: F,
    ) -> Result<CacheKey>
    where
        A: Serialize + ?Sized,
        T: Serialize + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let args = serialize_args(args)?;
        let key = CacheKey::from_value(endpoint, &args);

        let subscribers = self.cache.write().await.subscribe(&key, args.clone());
        let refetch: Refetch = Arc::new(move || into_value(fetch()));
        self.watchers
            .lock()
            .await
            .entry(key.clone())
            .or_insert(Watcher {
                args,
                tags,
                refetch,
            });

        debug!(key = %key, subscribers, "subscribed");
        Ok(key)
    }

    /// Drops one subscriber of `key` and returns how many remain.
    pub async fn unsubscribe(&self, key: &CacheKey) -> usize {
        let remaining = self.cache.write().await.unsubscribe(key);
        if remaining == 0 {
            self.watchers.lock().await.remove(key);
        }
        debug!(key = %key, remaining, "unsubscribed");
        remaining
    }

    /// Runs an uncached request and reports its lifecycle.
    ///
    /// Fulfilled means the transport succeeded; the caller still interprets
    /// the envelope. Transport failures also set the session error.
    pub async fn execute<T, Fut>(&self, endpoint: Endpoint, request: Fut) -> Result<T>
    where
        Fut: Future<Output = Result<T>>,
    {
        let config = endpoint.config();
        self.dispatch(SessionAction::RequestStarted(config)).await;

        let result = request.await;
        match &result {
            Ok(_) => self.dispatch(SessionAction::RequestFulfilled(config)).await,
            Err(e) => {
                warn!(endpoint = %endpoint, error = %e, "request failed");
                let mut session = self.session.write().await;
                session.apply(SessionAction::RequestRejected(config));
                session.apply(SessionAction::SetError(Some(e.user_message())));
            }
        }
        result
    }

    /// Marks every entry carrying one of `tags` stale and returns their keys.
    ///
    /// Stale entries with subscribers are refetched before this returns.
    pub async fn invalidate_tags(&self, tags: &[Tag]) -> Vec<CacheKey> {
        let (hit, subscribed) = {
            let mut cache = self.cache.write().await;
            let mut hit = Vec::new();
            for tag in tags {
                hit.extend(cache.invalidate(tag));
            }
            (hit, cache.stale_subscribed())
        };

        for key in subscribed {
            self.refetch(key).await;
        }
        hit
    }

    async fn refetch(&self, key: CacheKey) {
        let watcher = self
            .watchers
            .lock()
            .await
            .get(&key)
            .map(|w| (w.args.clone(), w.tags.clone(), w.refetch.clone()));
        let Some((args, tags, refetch)) = watcher else {
            return;
        };

        if let Err(e) = self.fetch_shared(key.clone(), args, tags, move || refetch()).await {
            warn!(key = %key, error = %e, "refetch of subscribed query failed");
        }
    }

    /// Drops every cached entry and subscription.
    pub async fn reset_cache(&self) {
        self.cache.write().await.clear();
        self.watchers.lock().await.clear();
    }
}
