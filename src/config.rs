//! Client configuration surface (§4.11 — the builder façade over every
//! other module's configuration knobs).
//!
//! Grounded on the teacher's `src/client/http/mod.rs` (the `ClientBuilder`
//! accumulating into a single config struct, consumed once by `build()`),
//! narrowed to this crate's modules.

use std::{sync::Arc, time::Duration};

use crate::{
    auth::{ChallengeResponder, CredentialsProvider},
    chain::ExecListener,
    error::{Error, Kind, Result},
    pool::{self, PoolListener},
    resolve::Resolve,
    route::{DirectPlanner, RoutePlanner},
    scope::UserTokenHandler,
    tls::{RootStore, RustlsStrategy, TlsStrategy},
    transport::{connector::HyperConnector, Connect},
};

/// Redirect handling policy (spec §4.6.3).
#[derive(Debug, Clone)]
pub struct RedirectPolicy {
    pub max_redirects: u32,
    pub allow_circular: bool,
    /// `false` (default): rewrite POST→GET on 301/302/303, matching the
    /// historically dominant client behavior. `true`: RFC 7231 §6.4.2/6.4.3
    /// literal semantics (method preserved). See DESIGN.md's Open Question
    /// decision.
    pub strict_rfc_compliance: bool,
}

impl Default for RedirectPolicy {
    fn default() -> Self {
        RedirectPolicy {
            max_redirects: 10,
            allow_circular: false,
            strict_rfc_compliance: false,
        }
    }
}

/// Retry policy (spec §4.6.5).
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Retry a pre-response transport failure (`Error::is_retriable()`) on
    /// an idempotent or non-repeatable-body-free request.
    pub retry_on_connect_failure: bool,
    /// Response status codes eligible for retry on an idempotent method,
    /// honoring `Retry-After` if present.
    pub retry_status_codes: Vec<http::StatusCode>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            retry_on_connect_failure: true,
            retry_status_codes: vec![http::StatusCode::TOO_MANY_REQUESTS, http::StatusCode::SERVICE_UNAVAILABLE],
        }
    }
}

/// Resolved, immutable configuration shared by both facades.
pub struct ClientConfig {
    pub(crate) connect_timeout: Option<Duration>,
    pub(crate) socket_timeout: Option<Duration>,
    pub(crate) request_deadline: Option<Duration>,
    pub(crate) handshake_timeout: Option<Duration>,
    pub(crate) lease_timeout: Option<Duration>,
    pub(crate) pool: pool::Config,
    pub(crate) redirect: RedirectPolicy,
    pub(crate) retry: RetryPolicy,
    pub(crate) user_agent: Option<http::HeaderValue>,
    pub(crate) default_headers: http::HeaderMap,
    pub(crate) accept_encoding: bool,
    pub(crate) route_planner: Arc<dyn RoutePlanner>,
    pub(crate) connector: Arc<dyn Connect>,
    pub(crate) pool_listener: Option<Arc<dyn PoolListener>>,
    pub(crate) exec_listener: Option<Arc<dyn ExecListener>>,
    pub(crate) credentials: Option<Arc<dyn CredentialsProvider>>,
    pub(crate) challenge_responder: Option<Arc<dyn ChallengeResponder>>,
    pub(crate) close_connections_through_proxy: bool,
    pub(crate) user_token_handler: Option<Arc<dyn UserTokenHandler>>,
}

impl std::fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfig")
            .field("connect_timeout", &self.connect_timeout)
            .field("socket_timeout", &self.socket_timeout)
            .field("request_deadline", &self.request_deadline)
            .field("handshake_timeout", &self.handshake_timeout)
            .field("lease_timeout", &self.lease_timeout)
            .field("redirect", &self.redirect)
            .field("retry", &self.retry)
            .field("accept_encoding", &self.accept_encoding)
            .finish_non_exhaustive()
    }
}

impl ClientConfig {
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }

    pub fn deadlines(&self) -> crate::timeout::Deadlines {
        crate::timeout::Deadlines {
            lease_timeout: self.lease_timeout,
            connect_timeout: self.connect_timeout,
            handshake_timeout: self.handshake_timeout,
            socket_timeout: self.socket_timeout,
            request_deadline: self.request_deadline,
        }
    }
}

/// Builds a [`ClientConfig`]. Field names mirror the spec §3 data model:
/// `connect_timeout`, `read_timeout` → [`socket_timeout`][Self::socket_timeout],
/// `timeout` → [`request_deadline`][Self::request_deadline],
/// `pool_max_idle_per_route` → [`max_per_route`][Self::max_per_route],
/// `pool_idle_timeout` → [`idle_timeout`][Self::idle_timeout].
pub struct ClientConfigBuilder {
    connect_timeout: Option<Duration>,
    socket_timeout: Option<Duration>,
    request_deadline: Option<Duration>,
    handshake_timeout: Option<Duration>,
    lease_timeout: Option<Duration>,
    pool: pool::Config,
    redirect: RedirectPolicy,
    retry: RetryPolicy,
    user_agent: Option<http::HeaderValue>,
    default_headers: http::HeaderMap,
    gzip: bool,
    deflate: bool,
    danger_accept_invalid_certs: bool,
    peer_verifier: Option<Arc<dyn crate::tls::PeerVerifier>>,
    root_store: RootStore,
    route_planner: Option<Arc<dyn RoutePlanner>>,
    connector: Option<Arc<dyn Connect>>,
    resolver: Option<Arc<dyn Resolve>>,
    pool_listener: Option<Arc<dyn PoolListener>>,
    exec_listener: Option<Arc<dyn ExecListener>>,
    credentials: Option<Arc<dyn CredentialsProvider>>,
    challenge_responder: Option<Arc<dyn ChallengeResponder>>,
    close_connections_through_proxy: bool,
    user_token_handler: Option<Arc<dyn UserTokenHandler>>,
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        ClientConfigBuilder {
            connect_timeout: Some(Duration::from_secs(10)),
            socket_timeout: None,
            request_deadline: None,
            handshake_timeout: Some(Duration::from_secs(10)),
            lease_timeout: Some(Duration::from_secs(30)),
            pool: pool::Config::default(),
            redirect: RedirectPolicy::default(),
            retry: RetryPolicy::default(),
            user_agent: None,
            default_headers: http::HeaderMap::new(),
            gzip: cfg!(feature = "gzip"),
            deflate: cfg!(feature = "deflate"),
            danger_accept_invalid_certs: false,
            peer_verifier: None,
            root_store: RootStore::WebpkiRoots,
            route_planner: None,
            connector: None,
            resolver: None,
            pool_listener: None,
            exec_listener: None,
            credentials: None,
            challenge_responder: None,
            close_connections_through_proxy: true,
            user_token_handler: None,
        }
    }
}

impl ClientConfigBuilder {
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.socket_timeout = Some(timeout);
        self
    }

    pub fn timeout(mut self, deadline: Duration) -> Self {
        self.request_deadline = Some(deadline);
        self
    }

    pub fn handshake_timeout(mut self, timeout: Duration) -> Self {
        self.handshake_timeout = Some(timeout);
        self
    }

    pub fn lease_timeout(mut self, timeout: Duration) -> Self {
        self.lease_timeout = Some(timeout);
        self
    }

    pub fn pool_max_idle_per_route(mut self, max: usize) -> Self {
        self.pool.default_max_per_route = max;
        self
    }

    pub fn pool_max_total(mut self, max: usize) -> Self {
        self.pool.max_total = max;
        self
    }

    pub fn pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool.idle_timeout = Some(timeout);
        self
    }

    /// `None` disables validation entirely; `Some(Duration::ZERO)` probes
    /// every idle endpoint before reuse (spec §4.4, scenario 5).
    pub fn validate_after_inactivity(mut self, threshold: Option<Duration>) -> Self {
        self.pool.validate_after_inactivity = threshold;
        self
    }

    pub fn redirect(mut self, policy: RedirectPolicy) -> Self {
        self.redirect = policy;
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    pub fn user_agent(mut self, value: impl AsRef<str>) -> Result<Self> {
        let value = http::HeaderValue::from_str(value.as_ref()).map_err(Error::builder)?;
        self.user_agent = Some(value);
        Ok(self)
    }

    pub fn default_header(mut self, name: http::HeaderName, value: http::HeaderValue) -> Self {
        self.default_headers.append(name, value);
        self
    }

    pub fn gzip(mut self, enabled: bool) -> Self {
        self.gzip = enabled;
        self
    }

    pub fn deflate(mut self, enabled: bool) -> Self {
        self.deflate = enabled;
        self
    }

    /// Disable TLS verification entirely. Never the default; an explicit,
    /// visible opt-in per spec §4.3.
    pub fn danger_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.danger_accept_invalid_certs = accept;
        self
    }

    /// Run `verifier` after the session's own certificate verification
    /// succeeds (`HostnamePolicy::Client`, spec §4.3), e.g. for SPKI
    /// pinning. Mutually exclusive with `danger_accept_invalid_certs`: the
    /// latter wins if both are set, since skipping verification entirely
    /// makes a secondary check meaningless.
    pub fn peer_verifier(mut self, verifier: Arc<dyn crate::tls::PeerVerifier>) -> Self {
        self.peer_verifier = Some(verifier);
        self
    }

    pub fn route_planner(mut self, planner: Arc<dyn RoutePlanner>) -> Self {
        self.route_planner = Some(planner);
        self
    }

    pub fn connector(mut self, connector: Arc<dyn Connect>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Override DNS resolution on the default connector (spec §6). Ignored
    /// if [`Self::connector`] is also set, since that replaces the default
    /// connector (and its resolver) entirely.
    pub fn resolver(mut self, resolver: Arc<dyn Resolve>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    pub fn pool_listener(mut self, listener: Arc<dyn PoolListener>) -> Self {
        self.pool_listener = Some(listener);
        self
    }

    pub fn exec_listener(mut self, listener: Arc<dyn ExecListener>) -> Self {
        self.exec_listener = Some(listener);
        self
    }

    pub fn credentials(mut self, provider: Arc<dyn CredentialsProvider>) -> Self {
        self.credentials = Some(provider);
        self
    }

    pub fn challenge_responder(mut self, responder: Arc<dyn ChallengeResponder>) -> Self {
        self.challenge_responder = Some(responder);
        self
    }

    /// Send `Connection: close` on every request routed through a proxy
    /// hop, since many CONNECT intermediates don't keep-alive. Default
    /// `true`; set `false` for a proxy known to support persistent
    /// tunnels.
    pub fn close_connections_through_proxy(mut self, enabled: bool) -> Self {
        self.close_connections_through_proxy = enabled;
        self
    }

    /// Register a handler that assigns a pool-affinity token per request
    /// (spec §4.6.7). Sequential requests whose handler returns the same
    /// token for the same scope prefer the same pooled endpoint.
    pub fn user_token_handler(mut self, handler: Arc<dyn UserTokenHandler>) -> Self {
        self.user_token_handler = Some(handler);
        self
    }

    /// Validate and freeze this builder into a [`ClientConfig`].
    pub fn build(self) -> Result<ClientConfig> {
        if self.pool.default_max_per_route == 0 {
            return Err(Error::with_source(Kind::Builder, "pool_max_idle_per_route must be > 0"));
        }
        if self.pool.max_total == 0 {
            return Err(Error::with_source(Kind::Builder, "pool_max_total must be > 0"));
        }
        if self.gzip && !cfg!(feature = "gzip") {
            return Err(Error::with_source(Kind::Builder, "gzip requested but the `gzip` feature is disabled"));
        }
        if self.deflate && !cfg!(feature = "deflate") {
            return Err(Error::with_source(Kind::Builder, "deflate requested but the `deflate` feature is disabled"));
        }

        let connector = match self.connector {
            Some(connector) => connector,
            None => {
                let tls: Arc<dyn TlsStrategy> = if self.danger_accept_invalid_certs {
                    Arc::new(RustlsStrategy::accepting_invalid_certs().map_err(Error::builder)?)
                } else if let Some(verifier) = self.peer_verifier {
                    Arc::new(RustlsStrategy::with_peer_verifier(self.root_store, verifier).map_err(Error::builder)?)
                } else {
                    Arc::new(RustlsStrategy::new(self.root_store).map_err(Error::builder)?)
                };
                let mut connector = HyperConnector::new(tls);
                if let Some(resolver) = self.resolver {
                    connector = connector.with_resolver(resolver);
                }
                Arc::new(connector)
            }
        };

        Ok(ClientConfig {
            connect_timeout: self.connect_timeout,
            socket_timeout: self.socket_timeout,
            request_deadline: self.request_deadline,
            handshake_timeout: self.handshake_timeout,
            lease_timeout: self.lease_timeout,
            pool: self.pool,
            redirect: self.redirect,
            retry: self.retry,
            user_agent: self.user_agent,
            default_headers: self.default_headers,
            accept_encoding: self.gzip || self.deflate,
            route_planner: self.route_planner.unwrap_or_else(|| Arc::new(DirectPlanner)),
            connector,
            pool_listener: self.pool_listener,
            exec_listener: self.exec_listener,
            credentials: self.credentials,
            challenge_responder: self.challenge_responder,
            close_connections_through_proxy: self.close_connections_through_proxy,
            user_token_handler: self.user_token_handler,
        })
    }
}

impl std::fmt::Debug for ClientConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientConfigBuilder").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_builder_produces_a_valid_config() {
        let config = ClientConfig::builder().build().unwrap();
        assert_eq!(config.pool.default_max_per_route, pool::Config::default().default_max_per_route);
    }

    #[test]
    fn zero_max_per_route_is_rejected() {
        let err = ClientConfig::builder().pool_max_idle_per_route(0).build().unwrap_err();
        assert_eq!(err.kind(), Kind::Builder);
    }

    #[test]
    fn gzip_requires_the_feature() {
        let result = ClientConfig::builder().gzip(true).build();
        if cfg!(feature = "gzip") {
            assert!(result.is_ok());
        } else {
            assert!(result.is_err());
        }
    }
}
