//! Blocking client facade (C9).
//!
//! The teacher's `blocking/client.rs` spawns one dedicated OS thread per
//! `Client`, running a `current_thread` runtime fed by a channel, and
//! blocks the calling thread on a response oneshot. This facade instead
//! owns one small dedicated multi-thread [`Runtime`] per `Client` and
//! blocks the calling thread directly on the exec chain via
//! `Runtime::block_on`: "thread-per-request" describes the caller's own
//! thread being occupied for the call's duration, not a thread spawned per
//! request.

use std::sync::Arc;

use http::{Method, Uri};
use tokio::runtime::Runtime;

use crate::{
    config::{ClientConfig, ClientConfigBuilder},
    error::{Error, Result},
    facade::nonblocking,
    request::Request,
    response::Response,
};

/// A synchronous client: every call occupies the calling thread until the
/// exchange completes, fails, or its deadline elapses (spec §4.9).
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    runtime: Runtime,
    client: nonblocking::Client,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner").field("client", &self.client).finish()
    }
}

impl Client {
    /// Build a blocking client from an already-validated [`ClientConfig`],
    /// spinning up its dedicated runtime.
    pub fn new(config: ClientConfig) -> Result<Client> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("corehttp-blocking")
            .enable_all()
            .build()
            .map_err(Error::builder)?;
        let client = nonblocking::Client::new(config);
        Ok(Client {
            inner: Arc::new(Inner { runtime, client }),
        })
    }

    pub fn builder() -> ClientConfigBuilder {
        ClientConfig::builder()
    }

    pub fn config(&self) -> &ClientConfig {
        self.inner.client.config()
    }

    /// Run one request to completion, blocking the calling thread (spec
    /// §4.9). `request_deadline` (the request's own override, or the
    /// client default) bounds the wait from inside the exec chain itself;
    /// this call does not additionally race a synchronous timer.
    pub fn execute(&self, request: Request) -> Result<Response> {
        self.inner.runtime.block_on(self.inner.client.execute(request))
    }

    /// Convenience: build and execute a `GET` in one call.
    pub fn get(&self, uri: Uri) -> Result<Response> {
        self.execute(Request::new(Method::GET, uri))
    }
}

impl Default for Client {
    /// Panics if the default configuration or its dedicated runtime fails
    /// to build; neither ever does on a supported target.
    fn default() -> Client {
        Client::new(ClientConfig::builder().build().expect("default client config is always valid"))
            .expect("default blocking runtime always builds")
    }
}

impl ClientConfigBuilder {
    /// Validate and build directly into a blocking [`Client`].
    pub fn build_blocking_client(self) -> Result<Client> {
        Client::new(self.build()?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{atomic::AtomicBool, Mutex};

    use bytes::Bytes;
    use http::StatusCode;

    use super::*;
    use crate::{
        cancel::CancellationToken,
        transport::{fake::FakeEndpoint, BoxFuture, Connect, TransportEndpoint},
    };

    struct FakeConnect {
        open: Arc<AtomicBool>,
        responses: Arc<Mutex<Vec<http::Response<Bytes>>>>,
    }

    impl Connect for FakeConnect {
        fn connect<'a>(
            &'a self,
            _route: &'a crate::route::Route,
            _deadlines: &'a crate::timeout::ResolvedDeadlines,
            _cancel: &'a CancellationToken,
        ) -> BoxFuture<'a, Result<Box<dyn TransportEndpoint + Send>>> {
            let open = self.open.clone();
            let responses = self.responses.clone();
            Box::pin(async move { Ok(Box::new(FakeEndpoint { open, responses }) as Box<dyn TransportEndpoint + Send>) })
        }
    }

    fn fake_client(responses: Vec<http::Response<Bytes>>) -> Client {
        let connect = Arc::new(FakeConnect {
            open: Arc::new(AtomicBool::new(true)),
            responses: Arc::new(Mutex::new(responses)),
        });
        ClientConfig::builder().connector(connect).build_blocking_client().unwrap()
    }

    #[test]
    fn blocking_get_occupies_the_calling_thread_until_response() {
        let body = http::Response::builder().status(200).body(Bytes::from_static(b"hi")).unwrap();
        let client = fake_client(vec![body]);
        let response = client.get(Uri::from_static("https://example.com/")).unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let (_, _, body) = response.into_parts();
        body.discard();
    }

    #[test]
    fn default_blocking_client_builds_without_panicking() {
        let _ = Client::default();
    }
}
