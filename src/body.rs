//! Request entity abstraction (part of C7).
//!
//! A [`Body`] is either a repeatable byte sequence or a one-shot stream.
//! Per spec §3, a non-repeatable entity may not be retried once bytes have
//! been consumed from it — [`Body::try_clone`] returns `None` for the
//! streaming variant, and the retry interceptor (4.6.5) treats that as
//! "this request cannot be retried."

use std::{
    fmt,
    pin::Pin,
    task::{Context, Poll},
};

use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use pin_project_lite::pin_project;

/// An outgoing request entity.
///
/// Cloning a `Body` (via [`try_clone`][Body::try_clone]) succeeds only for
/// the repeatable (`Bytes`) variant; a one-shot stream cannot be cloned
/// because its bytes are consumed as they are read.
pub enum Body {
    /// A fully-buffered, repeatable entity.
    Bytes(Bytes),
    /// A one-shot stream; once any frame has been polled, it cannot be
    /// replayed.
    Streaming(Pin<Box<dyn HttpBody<Data = Bytes, Error = crate::error::BoxError> + Send + Sync>>),
    /// No entity (e.g. GET, HEAD).
    Empty,
}

impl Body {
    /// A body with no entity.
    pub fn empty() -> Body {
        Body::Empty
    }

    /// A repeatable, fully-buffered body.
    pub fn from_bytes(bytes: impl Into<Bytes>) -> Body {
        Body::Bytes(bytes.into())
    }

    /// Wrap an arbitrary one-shot stream as a non-repeatable body.
    pub fn wrap_stream<B>(body: B) -> Body
    where
        B: HttpBody<Data = Bytes> + Send + Sync + 'static,
        B::Error: Into<crate::error::BoxError>,
    {
        Body::Streaming(Box::pin(MapErr { inner: body }))
    }

    /// Returns `true` if this entity is repeatable (may be resent after a
    /// transport failure or redirect).
    pub fn is_repeatable(&self) -> bool {
        !matches!(self, Body::Streaming(_))
    }

    /// Clone this body if it is repeatable; `None` for a one-shot stream.
    pub fn try_clone(&self) -> Option<Body> {
        match self {
            Body::Bytes(b) => Some(Body::Bytes(b.clone())),
            Body::Empty => Some(Body::Empty),
            Body::Streaming(_) => None,
        }
    }

    /// The length in bytes, if known without consuming the body.
    pub fn content_length(&self) -> Option<u64> {
        match self {
            Body::Bytes(b) => Some(b.len() as u64),
            Body::Empty => Some(0),
            Body::Streaming(s) => s.size_hint().exact(),
        }
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Bytes(b) => f.debug_tuple("Body::Bytes").field(&b.len()).finish(),
            Body::Streaming(_) => f.debug_tuple("Body::Streaming").finish(),
            Body::Empty => f.write_str("Body::Empty"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(b: Bytes) -> Self {
        Body::Bytes(b)
    }
}

impl From<Vec<u8>> for Body {
    fn from(v: Vec<u8>) -> Self {
        Body::Bytes(Bytes::from(v))
    }
}

impl From<String> for Body {
    fn from(s: String) -> Self {
        Body::Bytes(Bytes::from(s))
    }
}

impl HttpBody for Body {
    type Data = Bytes;
    type Error = crate::error::BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        match self.get_mut() {
            Body::Bytes(b) if !b.is_empty() => {
                let chunk = std::mem::take(b);
                Poll::Ready(Some(Ok(Frame::data(chunk))))
            }
            Body::Bytes(_) | Body::Empty => Poll::Ready(None),
            Body::Streaming(s) => s.as_mut().poll_frame(cx),
        }
    }

    fn is_end_stream(&self) -> bool {
        match self {
            Body::Bytes(b) => b.is_empty(),
            Body::Empty => true,
            Body::Streaming(s) => s.is_end_stream(),
        }
    }

    fn size_hint(&self) -> SizeHint {
        match self {
            Body::Bytes(b) => SizeHint::with_exact(b.len() as u64),
            Body::Empty => SizeHint::with_exact(0),
            Body::Streaming(s) => s.size_hint(),
        }
    }
}

pin_project! {
    struct MapErr<B> {
        #[pin]
        inner: B,
    }
}

impl<B> HttpBody for MapErr<B>
where
    B: HttpBody<Data = Bytes>,
    B::Error: Into<crate::error::BoxError>,
{
    type Data = Bytes;
    type Error = crate::error::BoxError;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, Self::Error>>> {
        self.project().inner.poll_frame(cx).map(|opt| opt.map(|r| r.map_err(Into::into)))
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    #[test]
    fn bytes_body_is_repeatable() {
        let body = Body::from_bytes(Bytes::from_static(b"hello"));
        assert!(body.is_repeatable());
        assert!(body.try_clone().is_some());
        assert_eq!(body.content_length(), Some(5));
    }

    #[test]
    fn empty_body_is_repeatable() {
        let body = Body::empty();
        assert!(body.is_repeatable());
        assert_eq!(body.content_length(), Some(0));
    }

    #[test]
    fn streaming_body_is_not_repeatable() {
        let body = Body::wrap_stream(http_body_util::Full::new(Bytes::from_static(b"x")).map_err(|never: std::convert::Infallible| match never {}));
        assert!(!body.is_repeatable());
        assert!(body.try_clone().is_none());
    }
}
