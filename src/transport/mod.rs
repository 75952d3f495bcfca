//! Transport endpoint (C2).
//!
//! A [`TransportEndpoint`] is one connected HTTP/1 connection or one
//! stream handle onto a multiplexed HTTP/2 connection — whatever the pool
//! (C4) leases and releases. [`Connect`] is how the terminal exec step
//! obtains a fresh one when the pool has no idle endpoint to offer.
//!
//! Grounded on the teacher's `src/core/client/connect/http.rs` and
//! `src/connect.rs` (connector abstraction over hyper), generalized from
//! the teacher's single concrete connector to the narrow `Connect` trait
//! spec §6 requires so embedders can supply their own (and tests can
//! install a fake one).

pub mod connector;

use std::{future::Future, pin::Pin};

use bytes::Bytes;
use http_body::Body as HttpBody;

use crate::{
    body::Body,
    cancel::CancellationToken,
    error::{BoxError, Result},
    pool::Poolable,
    route::Route,
    timeout::ResolvedDeadlines,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;
pub type ResponseBodyStream = Pin<Box<dyn HttpBody<Data = Bytes, Error = BoxError> + Send>>;

/// One connected transport endpoint. `send` may be called more than once
/// on an HTTP/2 endpoint (stream multiplexing); an HTTP/1 endpoint's
/// `send` implementation is responsible for not admitting a second
/// request until the prior response is fully read, matching spec §4.2's
/// "one in-flight exchange per HTTP/1 endpoint" invariant.
pub trait TransportEndpoint: Poolable {
    fn send(&mut self, request: http::Request<Body>) -> BoxFuture<'_, Result<TransportResponse>>;
}

/// The result of one `send`: response head, a one-shot body stream, and
/// the transport's best guess at whether the endpoint may be reused once
/// that body finishes (spec §4.7's `reusable` flag, before the body is
/// actually drained).
pub struct TransportResponse {
    pub parts: http::response::Parts,
    pub body: ResponseBodyStream,
    pub reusable_hint: bool,
}

impl std::fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.parts.status)
            .field("reusable_hint", &self.reusable_hint)
            .finish_non_exhaustive()
    }
}

impl Poolable for Box<dyn TransportEndpoint + Send> {
    fn is_open(&self) -> bool {
        (**self).is_open()
    }
}

/// Connects a fresh endpoint for a route (C2 connect + C3 TLS upgrade, if
/// the route is secure). Installed on [`crate::config::ClientConfig`].
pub trait Connect: Send + Sync {
    fn connect<'a>(
        &'a self,
        route: &'a Route,
        deadlines: &'a ResolvedDeadlines,
        cancel: &'a CancellationToken,
    ) -> BoxFuture<'a, Result<Box<dyn TransportEndpoint + Send>>>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! An in-process fake used by pool/chain unit tests so they don't open
    //! real sockets (spec's "test tooling" expansion, §4.13).

    use std::sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    };

    use http_body_util::{BodyExt, Full};

    use super::*;

    pub struct FakeEndpoint {
        pub open: Arc<AtomicBool>,
        pub responses: Arc<Mutex<Vec<http::Response<Bytes>>>>,
    }

    impl Poolable for FakeEndpoint {
        fn is_open(&self) -> bool {
            self.open.load(Ordering::SeqCst)
        }
    }

    impl TransportEndpoint for FakeEndpoint {
        fn send(&mut self, _request: http::Request<Body>) -> BoxFuture<'_, Result<TransportResponse>> {
            let responses = self.responses.clone();
            Box::pin(async move {
                let mut responses = responses.lock().unwrap();
                let response = responses.remove(0);
                let (parts, body) = response.into_parts();
                let body = Full::new(body).map_err(|never: std::convert::Infallible| match never {});
                Ok(TransportResponse {
                    parts,
                    body: Box::pin(body),
                    reusable_hint: true,
                })
            })
        }
    }
}
