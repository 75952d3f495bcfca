//! The real connector: TCP + [`crate::tls`] + `hyper::client::conn`.
//!
//! This crate owns its own pool (`pool`), so unlike `hyper-util`'s
//! `client-legacy::Client` this connector hands back a single connected
//! endpoint rather than a self-managing pooled client (see DESIGN.md's
//! "Pool/connector split"). Grounded on the teacher's
//! `src/core/client/connect/http.rs`.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use http_body_util::BodyExt;
use hyper::client::conn::{http1, http2};
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::net::TcpStream;

use crate::{
    body::Body,
    cancel::CancellationToken,
    error::{BoxError, Error, Kind, Result},
    pool::Poolable,
    resolve::{self, Resolve, SystemResolver},
    route::Route,
    timeout::{with_budget, Layer, ResolvedDeadlines},
    tls::{BoxedIo, Protocol, TlsStrategy},
};

use super::{BoxFuture, Connect, TransportEndpoint, TransportResponse};

enum Sender {
    Http1(http1::SendRequest<Body>),
    Http2(http2::SendRequest<Body>),
}

/// A live HTTP/1 or HTTP/2 connection handle (C2).
pub struct HttpConnection {
    sender: Sender,
    /// Set by the spawned driver task on server-initiated closure (peer
    /// FIN, HTTP/2 GOAWAY) so `is_open` reflects it without blocking
    /// (spec §4.2 "surfacing server-initiated closure").
    closed: Arc<AtomicBool>,
}

impl std::fmt::Debug for HttpConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let protocol = match self.sender {
            Sender::Http1(_) => "http/1.1",
            Sender::Http2(_) => "h2",
        };
        f.debug_struct("HttpConnection").field("protocol", &protocol).finish()
    }
}

impl Poolable for HttpConnection {
    fn is_open(&self) -> bool {
        if self.closed.load(Ordering::SeqCst) {
            return false;
        }
        match &self.sender {
            Sender::Http1(s) => !s.is_closed(),
            Sender::Http2(s) => !s.is_closed(),
        }
    }
}

impl TransportEndpoint for HttpConnection {
    fn send(&mut self, request: http::Request<Body>) -> BoxFuture<'_, Result<TransportResponse>> {
        Box::pin(async move {
            let reusable_hint = !carries_connection_close(request.headers());
            let response = match &mut self.sender {
                Sender::Http1(sender) => sender
                    .send_request(request)
                    .await
                    .map_err(|e| Error::with_source(Kind::ConnectionClosed, e))?,
                Sender::Http2(sender) => sender
                    .send_request(request)
                    .await
                    .map_err(|e| Error::with_source(Kind::ConnectionClosed, e))?,
            };
            let (parts, incoming) = response.into_parts();
            let body = incoming.map_err(|e: hyper::Error| -> BoxError { Box::new(e) });
            Ok(TransportResponse {
                parts,
                body: Box::pin(body),
                reusable_hint,
            })
        })
    }
}

fn carries_connection_close(headers: &http::HeaderMap) -> bool {
    headers
        .get(http::header::CONNECTION)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("close"))
        .unwrap_or(false)
}

/// Connects fresh [`HttpConnection`]s over real TCP, upgrading to TLS via
/// the configured [`TlsStrategy`] for secure routes (spec §4.2, §4.3).
pub struct HyperConnector {
    tls: Arc<dyn TlsStrategy>,
    resolver: Arc<dyn Resolve>,
}

impl std::fmt::Debug for HyperConnector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperConnector").finish_non_exhaustive()
    }
}

impl HyperConnector {
    pub fn new(tls: Arc<dyn TlsStrategy>) -> HyperConnector {
        HyperConnector {
            tls,
            resolver: Arc::new(SystemResolver),
        }
    }

    /// Override the DNS resolver (spec §6), e.g. for host overrides or a
    /// caching resolver. Default: [`SystemResolver`].
    pub fn with_resolver(mut self, resolver: Arc<dyn Resolve>) -> HyperConnector {
        self.resolver = resolver;
        self
    }
}

impl Connect for HyperConnector {
    fn connect<'a>(
        &'a self,
        route: &'a Route,
        deadlines: &'a ResolvedDeadlines,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Box<dyn TransportEndpoint + Send>>> {
        Box::pin(async move {
            let connect_budget = deadlines.budget_for(Layer::Connect, Instant::now())?;
            let tcp = with_budget(
                connect_budget,
                Layer::Connect,
                connect_racing_cancel(&*self.resolver, route, cancel),
            )
            .await??;
            tcp.set_nodelay(true).ok();

            let (io, protocol): (BoxedIo, Protocol) = if route.is_secure() {
                let handshake_budget = deadlines.budget_for(Layer::Handshake, Instant::now())?;
                let (io, protocol) = with_budget(
                    handshake_budget,
                    Layer::Handshake,
                    self.tls.upgrade(tcp, route.host()),
                )
                .await??;
                (io, protocol)
            } else {
                (Box::pin(tcp) as BoxedIo, Protocol::Http1)
            };

            let closed = Arc::new(AtomicBool::new(false));
            let sender = match protocol {
                Protocol::Http1 => {
                    let (sender, conn) = http1::handshake(TokioIo::new(io))
                        .await
                        .map_err(|e| Error::with_source(Kind::ProtocolError, e))?;
                    spawn_driver(conn, closed.clone());
                    Sender::Http1(sender)
                }
                Protocol::Http2 => {
                    let (sender, conn) = http2::handshake(TokioExecutor::new(), TokioIo::new(io))
                        .await
                        .map_err(|e| Error::with_source(Kind::ProtocolError, e))?;
                    spawn_driver(conn, closed.clone());
                    Sender::Http2(sender)
                }
            };

            Ok(Box::new(HttpConnection { sender, closed }) as Box<dyn TransportEndpoint + Send>)
        })
    }
}

/// Resolves the route's host, then tries each address in order, the first
/// connect success wins (spec §6 DNS, §4.2 "fails with {connect_timeout |
/// refused | dns_error}"). Resolution failure is reported distinctly from a
/// refused connection to an already-resolved address.
async fn connect_racing_cancel(resolver: &dyn Resolve, route: &Route, cancel: &CancellationToken) -> Result<TcpStream> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::new(Kind::Cancelled)),
        res = connect_resolved(resolver, route) => res,
    }
}

async fn connect_resolved(resolver: &dyn Resolve, route: &Route) -> Result<TcpStream> {
    let addrs = match resolver.resolve(route.host()).await {
        Ok(addrs) => addrs,
        Err(err) => {
            tracing::debug!(host = route.host(), %err, "dns resolution failed");
            return Err(err);
        }
    };
    let addrs = resolve::with_port(addrs, route.port());

    let mut last_err = None;
    for addr in &addrs {
        match TcpStream::connect(addr).await {
            Ok(tcp) => {
                tracing::trace!(%addr, "connected");
                return Ok(tcp);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(Error::with_source(
        Kind::ConnectRefused,
        last_err.expect("resolve() never returns an empty address list"),
    ))
}

fn spawn_driver<C, T>(conn: C, closed: Arc<AtomicBool>)
where
    C: std::future::Future<Output = std::result::Result<T, hyper::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        let _ = conn.await;
        closed.store(true, Ordering::SeqCst);
    });
}
