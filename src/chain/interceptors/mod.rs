//! The standard interceptor stack (C6) plus the terminal transport exec
//! that anchors the chain (spec §4.5 "the terminal `next` is the
//! transport exec").
//!
//! Canonical order, outermost first (spec §4.5): protocol-defaults →
//! compression → redirect → connection-control → authentication →
//! user-token → retry → transport. [`standard_chain`] assembles exactly
//! this order from a [`crate::config::ClientConfig`].

pub mod auth;
pub mod connection_control;
pub mod content_coding;
pub mod protocol;
pub mod redirect;
pub mod retry;
pub mod user_token;

use std::sync::Arc;

use crate::{
    chain::{Chain, Interceptor, TerminalExec},
    config::ClientConfig,
    error::{Error, Kind, Result},
    pool::{Leased, Pool},
    request::Request,
    response::{Response, ResponseBody},
    scope::ExecScope,
    timeout::{with_budget, Layer},
    transport::{BoxFuture, Connect, TransportEndpoint, TransportResponse},
};

/// Assemble the fixed interceptor order over a terminal built from `config`
/// and `pool`.
pub fn standard_chain(config: Arc<ClientConfig>, pool: Arc<TransportPool>) -> Chain {
    let interceptors: Vec<Arc<dyn Interceptor>> = vec![
        Arc::new(protocol::ProtocolDefaults::new(config.clone())),
        Arc::new(content_coding::ContentCoding::new(config.clone())),
        Arc::new(redirect::Redirect::new(config.clone())),
        Arc::new(connection_control::ConnectionControl::new(config.clone())),
        Arc::new(auth::Authentication::new(config.clone())),
        Arc::new(user_token::UserToken::new(config.clone())),
        Arc::new(retry::Retry::new(config.clone())),
    ];
    let terminal: Arc<dyn TerminalExec> = Arc::new(TransportTerminal { config, pool });
    Chain::new(interceptors, terminal)
}

/// The pool type both facades share: endpoints are boxed, type-erased
/// transport handles (spec §4.2).
pub type TransportPool = Pool<Box<dyn TransportEndpoint + Send>>;

/// The terminal step: lease an endpoint from the pool (connecting a fresh
/// one via the configured [`Connect`] if none is idle), send the request,
/// and wire the response body's [`crate::pool::ReleaseHandle`] back into
/// the pool (spec §4.2, §4.4, §4.7).
struct TransportTerminal {
    config: Arc<ClientConfig>,
    pool: Arc<TransportPool>,
}

impl TerminalExec for TransportTerminal {
    fn call<'a>(&'a self, request: Request, scope: &'a mut ExecScope) -> BoxFuture<'a, Result<Response>> {
        Box::pin(async move { run(self, request, scope).await })
    }
}

async fn run(terminal: &TransportTerminal, request: Request, scope: &mut ExecScope) -> Result<Response> {
    let route = scope.route().clone();
    tracing::trace!(%route, method = %request.method(), attempt = scope.attempt_count(), "sending request");
    let deadlines = terminal.config.deadlines();
    let resolved = crate::timeout::ResolvedDeadlines::new(deadlines, std::time::Instant::now());
    let lease_budget = resolved.budget_for(Layer::Lease, std::time::Instant::now())?;
    let lease_deadline = lease_budget.map(|d| std::time::Instant::now() + d);

    let leased = terminal
        .pool
        .lease(&route, scope.user_token(), lease_deadline, scope.cancellation())
        .await
        .map_err(|e| e.with_route(route.clone()).with_attempt(scope.attempt_count()))?;

    let mut endpoint = match leased {
        Leased::Existing { endpoint, .. } => endpoint,
        Leased::Fresh => match terminal.config.connector.connect(&route, &resolved, scope.cancellation()).await {
            Ok(endpoint) => endpoint,
            Err(e) => {
                terminal.pool.abort_fresh(&route);
                return Err(e.with_route(route).with_attempt(scope.attempt_count()));
            }
        },
    };

    let wire_request = into_wire_request(request, &route)?;
    let socket_budget = resolved.budget_for(Layer::Socket, std::time::Instant::now())?;
    let sent = with_budget(socket_budget, Layer::Socket, endpoint.send(wire_request)).await;

    let transport_response = match sent {
        Ok(Ok(response)) => response,
        Ok(Err(e)) | Err(e) => {
            // The endpoint may still be good (e.g. a stream-level HTTP/2
            // error) but we have no cheap way to tell from here, so treat
            // any send failure as non-reusable.
            terminal.pool.release(&route, endpoint, false, scope.user_token().map(str::to_owned), std::time::Duration::ZERO);
            return Err(e.with_route(route).with_attempt(scope.attempt_count()));
        }
    };

    Ok(from_wire_response(transport_response, terminal.pool.clone(), route, scope.user_token().map(str::to_owned), endpoint))
}

fn into_wire_request(mut request: Request, route: &crate::route::Route) -> Result<http::Request<crate::body::Body>> {
    let mut builder = http::Request::builder().method(request.method().clone()).uri(request.uri().clone());
    if let Some(headers) = builder.headers_mut() {
        *headers = request.headers().clone();
    }
    let body = request.body_mut().take().unwrap_or_else(crate::body::Body::empty);
    builder
        .body(body)
        .map_err(|e| Error::with_source(Kind::ProtocolError, e).with_route(route.clone()))
}

fn from_wire_response(
    transport_response: TransportResponse,
    pool: Arc<TransportPool>,
    route: crate::route::Route,
    user_token: Option<String>,
    endpoint: Box<dyn TransportEndpoint + Send>,
) -> Response {
    let TransportResponse { parts, body, reusable_hint } = transport_response;
    let endpoint = std::sync::Mutex::new(Some(endpoint));
    let release = crate::pool::ReleaseHandle::new(reusable_hint, move |reusable| {
        if let Some(endpoint) = endpoint.lock().unwrap().take() {
            pool.release(&route, endpoint, reusable, user_token, std::time::Duration::from_secs(90));
        }
    });
    let response_body = ResponseBody::new(body, release);
    Response::new(parts.status, parts.headers, response_body)
}
