//! Per-exchange mutable context (part of C5), and the authentication and
//! redirect state machines it carries.
//!
//! Grounded on the teacher's `client/context.rs` (scope-local request
//! state) and `client/layer/retry/scope.rs` (scoping predicate pattern),
//! generalized to the full `ExecScope` the spec describes in §3.

use std::time::Instant;

use http::Uri;

use crate::{cancel::CancellationToken, route::Route};

/// Per-exchange mutable context threaded through the interceptor chain.
/// Created by the facade when a request enters the chain; destroyed when
/// the chain unwinds (spec §3).
#[derive(Debug)]
pub struct ExecScope {
    route: Route,
    user_token: Option<String>,
    deadline: Option<Instant>,
    redirect_chain: RedirectChain,
    target_auth: AuthState,
    proxy_auth: AuthState,
    attempt_count: u32,
    cancellation: CancellationToken,
}

impl ExecScope {
    pub fn new(route: Route, deadline: Option<Instant>, cancellation: CancellationToken) -> ExecScope {
        ExecScope {
            route,
            user_token: None,
            deadline,
            redirect_chain: RedirectChain::default(),
            target_auth: AuthState::default(),
            proxy_auth: AuthState::default(),
            attempt_count: 0,
            cancellation,
        }
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Re-point this scope at a new route. Used by the redirect
    /// interceptor when a redirect crosses authorities (spec §4.1): the
    /// route changes but the scope (and its cancellation token) persists.
    pub fn set_route(&mut self, route: Route) {
        self.route = route;
    }

    pub fn user_token(&self) -> Option<&str> {
        self.user_token.as_deref()
    }

    pub fn set_user_token(&mut self, token: impl Into<String>) {
        self.user_token = Some(token.into());
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn redirect_chain(&self) -> &RedirectChain {
        &self.redirect_chain
    }

    pub fn redirect_chain_mut(&mut self) -> &mut RedirectChain {
        &mut self.redirect_chain
    }

    pub fn target_auth(&self) -> &AuthState {
        &self.target_auth
    }

    pub fn target_auth_mut(&mut self) -> &mut AuthState {
        &mut self.target_auth
    }

    pub fn proxy_auth(&self) -> &AuthState {
        &self.proxy_auth
    }

    pub fn proxy_auth_mut(&mut self) -> &mut AuthState {
        &mut self.proxy_auth
    }

    /// Reset target authentication state. Called by the redirect
    /// interceptor when a redirect crosses authorities (spec §4.6.3): the
    /// previous host's challenge no longer applies.
    pub fn reset_target_auth(&mut self) {
        self.target_auth = AuthState::default();
    }

    pub fn attempt_count(&self) -> u32 {
        self.attempt_count
    }

    pub fn record_attempt(&mut self) {
        self.attempt_count += 1;
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}

/// Decides the pool affinity tag for a request (spec §4.6.7). The default
/// configuration installs no handler, so `scope.user_token()` stays unset
/// and the pool treats every lease as fungible within its route.
pub trait UserTokenHandler: Send + Sync {
    fn token_for(&self, route: &Route, scope: &ExecScope) -> Option<String>;
}

/// Ordered sequence of URIs visited by redirects in the current scope.
/// Bounded by `max_redirects`; visiting an already-present URI is a
/// `circular_redirect` failure unless circular redirects are explicitly
/// allowed (spec §3, §4.6.3).
#[derive(Debug, Default, Clone)]
pub struct RedirectChain {
    visited: Vec<Uri>,
}

impl RedirectChain {
    pub fn len(&self) -> usize {
        self.visited.len()
    }

    pub fn is_empty(&self) -> bool {
        self.visited.is_empty()
    }

    pub fn contains(&self, uri: &Uri) -> bool {
        self.visited.iter().any(|u| u == uri)
    }

    pub fn push(&mut self, uri: Uri) {
        self.visited.push(uri);
    }

    pub fn as_slice(&self) -> &[Uri] {
        &self.visited
    }
}

/// The name of a challenge/response auth scheme, ordered by the default
/// strength priority SPNEGO > NTLM > Digest > Basic (spec §4.6.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum AuthScheme {
    Basic,
    Digest,
    Ntlm,
    Spnego,
}

/// A parsed challenge from `WWW-Authenticate` / `Proxy-Authenticate`.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub scheme: AuthScheme,
    pub params: String,
}

/// Two independent instances of this exist per scope: one for the target
/// origin, one for any proxy (spec §3). States are terminal in exactly one
/// of `Succeeded`/`Failed` or remain in-progress.
#[derive(Debug, Clone, Default)]
pub enum AuthState {
    #[default]
    Unchallenged,
    Challenged {
        scheme: AuthScheme,
        params: String,
    },
    Responding {
        scheme: AuthScheme,
        /// The scheme's intermediate bytes (e.g. an NTLM/SPNEGO token).
        /// Used to detect `auth_stalled`: if two consecutive challenges
        /// for the same scheme carry the same state, no progress is being
        /// made (spec §4.6.4, §9).
        state: Vec<u8>,
    },
    Succeeded,
    Failed,
}

impl AuthState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuthState::Succeeded | AuthState::Failed)
    }

    /// Transition on receiving a new challenge. Returns `true` if this
    /// produced no progress relative to the prior `Responding` state
    /// (i.e. `auth_stalled` should be raised by the caller after two such
    /// transitions in a row).
    pub fn on_challenge(&mut self, challenge: Challenge, responder_state: Option<Vec<u8>>) -> bool {
        let stalled = match (&self, &responder_state) {
            (AuthState::Responding { scheme, state }, Some(new_state)) => {
                *scheme == challenge.scheme && state == new_state
            }
            _ => false,
        };
        *self = AuthState::Challenged {
            scheme: challenge.scheme,
            params: challenge.params,
        };
        stalled
    }

    pub fn begin_responding(&mut self, scheme: AuthScheme, state: Vec<u8>) {
        *self = AuthState::Responding { scheme, state };
    }

    pub fn succeed(&mut self) {
        *self = AuthState::Succeeded;
    }

    pub fn fail(&mut self) {
        *self = AuthState::Failed;
    }
}
