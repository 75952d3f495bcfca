//! The crate's error taxonomy.
//!
//! A single opaque [`Error`] wraps a non-exhaustive [`Kind`] plus an
//! optional source and an optional [`Route`] for diagnostics. Kinds mirror
//! the failure classes a request can terminate in: pool exhaustion, each
//! timeout layer, TLS failures, protocol/redirect/auth failures, and
//! cancellation.

use std::{error::Error as StdError, fmt};

use crate::route::Route;

/// A `Result` alias where the `Err` case is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// A boxed error type used for dynamic error handling at component seams.
pub type BoxError = Box<dyn StdError + Send + Sync>;

/// An error produced while executing a request.
///
/// Errors may carry the [`Route`] they occurred on, for diagnostics. All
/// errors also carry the attempt count reached before failing.
pub struct Error {
    inner: Box<Inner>,
}

struct Inner {
    kind: Kind,
    source: Option<BoxError>,
    route: Option<Route>,
    attempt: u32,
}

/// The kind of failure an [`Error`] represents. See spec §7.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Kind {
    /// `max_total` reached and `lease_timeout` elapsed without a grant.
    PoolExhausted,
    /// TCP connect did not complete before `connect_timeout`.
    ConnectTimeout,
    /// The peer actively refused the connection.
    ConnectRefused,
    /// The route's host name could not be resolved.
    DnsUnresolvable,
    /// TLS handshake did not complete before `handshake_timeout`.
    HandshakeTimeout,
    /// The TLS session failed certificate verification.
    TlsVerification,
    /// `HostnamePolicy::Client` found the peer unverified against SNI.
    TlsPeerUnverified,
    /// The TLS session failed for a reason below the verification layer.
    TlsProtocol,
    /// A read did not complete before `socket_timeout`.
    ReadTimeout,
    /// A write did not complete before `socket_timeout`.
    WriteTimeout,
    /// The connection closed mid-exchange (peer FIN / HTTP/2 GOAWAY).
    ConnectionClosed,
    /// `request_deadline` elapsed before the exchange completed.
    RequestDeadlineExceeded,
    /// The server produced a malformed response, bad status line, or
    /// unparseable `Location`.
    ProtocolError,
    /// `max_redirects` was exceeded.
    RedirectLimit,
    /// A redirect revisited a URI already in the chain.
    CircularRedirect,
    /// Every available auth scheme was attempted and rejected.
    AuthFailed,
    /// The same scheme produced no progress across two consecutive
    /// challenges.
    AuthStalled,
    /// A challenge was issued but no credentials were available for it.
    CredentialsMissing,
    /// The retry policy exhausted its budget or attempt cap.
    RetryExhausted,
    /// The scope was cancelled by the caller.
    Cancelled,
    /// An invalid `ClientConfig` (e.g. `max_per_route == 0`).
    Builder,
}

impl Error {
    pub(crate) fn new(kind: Kind) -> Error {
        Error {
            inner: Box::new(Inner {
                kind,
                source: None,
                route: None,
                attempt: 0,
            }),
        }
    }

    pub(crate) fn with_source<E>(kind: Kind, source: E) -> Error
    where
        E: Into<BoxError>,
    {
        Error {
            inner: Box::new(Inner {
                kind,
                source: Some(source.into()),
                route: None,
                attempt: 0,
            }),
        }
    }

    /// Attach the [`Route`] this error occurred on.
    pub fn with_route(mut self, route: Route) -> Self {
        self.inner.route = Some(route);
        self
    }

    /// Attach the attempt count reached before this error terminated the
    /// scope.
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.inner.attempt = attempt;
        self
    }

    /// The kind of this error.
    pub fn kind(&self) -> Kind {
        self.inner.kind
    }

    /// The route this error occurred on, if known.
    pub fn route(&self) -> Option<&Route> {
        self.inner.route.as_ref()
    }

    /// The number of attempts made before this error was returned.
    pub fn attempt(&self) -> u32 {
        self.inner.attempt
    }

    /// Returns true if this is (or wraps) a timeout of any layer: connect,
    /// handshake, read, write, lease, or end-to-end deadline.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::ConnectTimeout
                | Kind::HandshakeTimeout
                | Kind::ReadTimeout
                | Kind::WriteTimeout
                | Kind::RequestDeadlineExceeded
        )
    }

    /// Returns true if the connection closed mid-exchange.
    pub fn is_connection_closed(&self) -> bool {
        matches!(self.inner.kind, Kind::ConnectionClosed)
    }

    /// Returns true if this error is eligible for the retry interceptor to
    /// consider (a pre-response transport failure). Protocol errors, auth
    /// failures, and cancellation are never retriable.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self.inner.kind,
            Kind::ConnectTimeout
                | Kind::ConnectRefused
                | Kind::DnsUnresolvable
                | Kind::ConnectionClosed
        )
    }

    /// Returns true if this error is a cancellation. `Cancelled` never
    /// converts to another kind.
    pub fn is_cancelled(&self) -> bool {
        matches!(self.inner.kind, Kind::Cancelled)
    }

    pub(crate) fn builder<E: Into<BoxError>>(e: E) -> Error {
        Error::with_source(Kind::Builder, e)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut b = f.debug_struct("corehttp::Error");
        b.field("kind", &self.inner.kind);
        if let Some(ref route) = self.inner.route {
            b.field("route", route);
        }
        b.field("attempt", &self.inner.attempt);
        if let Some(ref source) = self.inner.source {
            b.field("source", source);
        }
        b.finish()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self.inner.kind {
            Kind::PoolExhausted => "connection pool exhausted",
            Kind::ConnectTimeout => "connect timed out",
            Kind::ConnectRefused => "connection refused",
            Kind::DnsUnresolvable => "host name could not be resolved",
            Kind::HandshakeTimeout => "tls handshake timed out",
            Kind::TlsVerification => "tls certificate verification failed",
            Kind::TlsPeerUnverified => "tls peer could not be verified",
            Kind::TlsProtocol => "tls protocol error",
            Kind::ReadTimeout => "read timed out",
            Kind::WriteTimeout => "write timed out",
            Kind::ConnectionClosed => "connection closed mid-exchange",
            Kind::RequestDeadlineExceeded => "request deadline exceeded",
            Kind::ProtocolError => "protocol error",
            Kind::RedirectLimit => "too many redirects",
            Kind::CircularRedirect => "circular redirect",
            Kind::AuthFailed => "authentication failed",
            Kind::AuthStalled => "authentication made no progress",
            Kind::CredentialsMissing => "no credentials available for challenge",
            Kind::RetryExhausted => "retry budget exhausted",
            Kind::Cancelled => "request cancelled",
            Kind::Builder => "invalid client configuration",
        };
        write!(f, "{msg}")?;
        if let Some(ref route) = self.inner.route {
            write!(f, " for route ({route})")?;
        }
        if let Some(ref e) = self.inner.source {
            write!(f, ": {e}")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.inner.source.as_ref().map(|e| &**e as _)
    }
}
