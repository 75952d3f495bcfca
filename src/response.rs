//! Response value (part of C7).
//!
//! Per spec §3, a response's entity is always a one-shot stream; exactly
//! one of consume, discard, or cancel must happen, and the terminal exec
//! releases the endpoint to the pool only after that happens (see
//! [`ResponseBody::into_endpoint_release`]).

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use http_body::{Body as HttpBody, Frame, SizeHint};
use http_body_util::BodyExt;

use crate::{error::BoxError, pool::ReleaseHandle};

/// An HTTP response: status, headers, a one-shot body, and trailers.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: ResponseBody,
}

impl Response {
    pub fn new(status: StatusCode, headers: HeaderMap, body: ResponseBody) -> Response {
        Response {
            status,
            headers,
            body,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// Consume this response, returning its status/headers and body
    /// separately. The caller must consume, discard, or cancel the body
    /// exactly once (spec §3).
    pub fn into_parts(self) -> (StatusCode, HeaderMap, ResponseBody) {
        (self.status, self.headers, self.body)
    }

    pub fn body_mut(&mut self) -> &mut ResponseBody {
        &mut self.body
    }
}

/// A one-shot response body stream.
///
/// Holds the [`ReleaseHandle`] for the endpoint this response was read
/// from. Dropping the body before it reaches end-of-stream releases the
/// endpoint as non-reusable (spec §4.7); reaching end-of-stream normally
/// releases it with the `reusable` flag the transport computed.
pub struct ResponseBody {
    inner: Pin<Box<dyn HttpBody<Data = Bytes, Error = BoxError> + Send>>,
    release: Option<ReleaseHandle>,
    trailers: Option<HeaderMap>,
}

impl ResponseBody {
    pub fn new<B>(inner: B, release: ReleaseHandle) -> ResponseBody
    where
        B: HttpBody<Data = Bytes, Error = BoxError> + Send + 'static,
    {
        ResponseBody {
            inner: Box::pin(inner),
            release: Some(release),
            trailers: None,
        }
    }

    /// An empty, already-released body (used for short-circuited
    /// responses that never leased an endpoint).
    pub fn empty() -> ResponseBody {
        ResponseBody {
            inner: Box::pin(http_body_util::Empty::new().map_err(|never: std::convert::Infallible| match never {})),
            release: None,
            trailers: None,
        }
    }

    pub fn trailers(&self) -> Option<&HeaderMap> {
        self.trailers.as_ref()
    }

    /// Force this body's eventual release to be non-reusable, regardless
    /// of what the transport guessed at receive-time (spec §4.6.6: a
    /// response-carried `Connection: close` overrides the guess).
    pub fn mark_non_reusable(&mut self) {
        if let Some(release) = self.release.as_mut() {
            release.downgrade_to_non_reusable();
        }
    }

    /// Discard the remainder of the body without reading it, releasing
    /// the endpoint as non-reusable (we don't know if the bytes are still
    /// on the wire).
    pub fn discard(mut self) {
        if let Some(release) = self.release.take() {
            release.release(false);
        }
    }

    /// Cancel this response entirely (e.g. on scope cancellation). Always
    /// releases the endpoint as non-reusable.
    pub fn cancel(self) {
        self.discard();
    }
}

impl fmt::Debug for ResponseBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResponseBody").finish_non_exhaustive()
    }
}

impl HttpBody for ResponseBody {
    type Data = Bytes;
    type Error = BoxError;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        let poll = self.inner.as_mut().poll_frame(cx);
        if let Poll::Ready(None) = &poll {
            // End of stream: release with whatever reusability the
            // transport computed when it read the response head.
            if let Some(release) = self.release.take() {
                release.release(release.proposed_reusable());
            }
        }
        if let Poll::Ready(Some(Ok(ref frame))) = &poll {
            if let Some(trailers) = frame.trailers_ref() {
                self.trailers = Some(trailers.clone());
            }
        }
        poll
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for ResponseBody {
    fn drop(&mut self) {
        // Dropped without reaching end-of-stream: non-reusable per spec §4.7.
        if let Some(release) = self.release.take() {
            release.release(false);
        }
    }
}
