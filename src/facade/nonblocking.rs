//! Non-blocking client (C10).
//!
//! Grounded on the teacher's `async_impl::client::Client` — an `Arc`-shared
//! handle around pooled connections that the caller is meant to build once
//! and reuse, never wrapping it again in an `Rc`/`Arc` themselves — wired
//! here to this crate's own [`Chain`]/[`TransportPool`] instead of
//! reqwest's tower stack.

use std::sync::Arc;
use std::time::Instant;

use http::{Method, Uri};

use crate::{
    cancel::CancellationToken,
    chain::{
        interceptors::{standard_chain, TransportPool},
        Chain,
    },
    config::{ClientConfig, ClientConfigBuilder},
    error::Result,
    pool::Pool,
    request::Request,
    response::Response,
    scope::ExecScope,
};

/// A cheaply-cloneable handle driving requests on the caller's `tokio`
/// runtime (spec §5). Holds the connection pool and the assembled
/// interceptor chain; build one per application and reuse it, the same
/// way the teacher's own doc comment tells callers not to re-wrap it.
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    config: Arc<ClientConfig>,
    pool: Arc<TransportPool>,
    chain: Chain,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner").field("config", &self.config).field("pool", &self.pool.total_leased()).finish()
    }
}

impl Client {
    /// Build a client from an already-validated [`ClientConfig`].
    pub fn new(config: ClientConfig) -> Client {
        let config = Arc::new(config);
        let mut pool: TransportPool = Pool::new(config.pool.clone());
        if let Some(listener) = config.pool_listener.clone() {
            pool = pool.with_listener(listener);
        }
        let pool = Arc::new(pool);
        let chain = standard_chain(config.clone(), pool.clone());
        Client {
            inner: Arc::new(Inner { config, pool, chain }),
        }
    }

    /// A client with every default (spec §4.11's builder defaults).
    pub fn builder() -> ClientConfigBuilder {
        ClientConfig::builder()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn pool(&self) -> &Arc<TransportPool> {
        &self.inner.pool
    }

    /// Run one request to completion through the standard interceptor
    /// chain, under a fresh, not-externally-observable cancellation token.
    pub async fn execute(&self, request: Request) -> Result<Response> {
        self.execute_with_cancellation(request, CancellationToken::new()).await
    }

    /// Run one request under a cancellation token the caller can trigger
    /// from elsewhere (spec §4.8) — e.g. the blocking facade cancels this
    /// when the calling thread's deadline wrapper gives up.
    pub async fn execute_with_cancellation(&self, request: Request, cancellation: CancellationToken) -> Result<Response> {
        let route = self.inner.config.route_planner.plan(request.uri())?;
        tracing::debug!(%route, method = %request.method(), uri = %request.uri(), "executing request");
        let now = Instant::now();
        let deadline = request
            .deadline_override()
            .or(self.inner.config.request_deadline)
            .map(|d| now + d);
        let mut scope = ExecScope::new(route, deadline, cancellation);
        self.inner.chain.run(request, &mut scope).await
    }

    /// Convenience: build and execute a `GET` in one call.
    pub async fn get(&self, uri: Uri) -> Result<Response> {
        self.execute(Request::new(Method::GET, uri)).await
    }
}

impl Default for Client {
    /// Panics if the default configuration fails to build (it never does;
    /// the default TLS strategy and pool sizes are always valid).
    fn default() -> Client {
        Client::new(ClientConfig::builder().build().expect("default client config is always valid"))
    }
}

impl ClientConfigBuilder {
    /// Validate and build directly into a [`Client`], skipping the
    /// intermediate [`ClientConfig`] for the common case where nothing
    /// else needs it.
    pub fn build_client(self) -> Result<Client> {
        Ok(Client::new(self.build()?))
    }
}
