//! Content-coding (4.6.2).
//!
//! Transparently decodes a `gzip`/`deflate` response entity. `deflate` is
//! decoded as a zlib-wrapped (RFC 1950) stream, the form every server this
//! crate has been tested against actually sends; raw RFC 1951 streams are
//! not handled (the teacher's own `client/layer/decoder/deflate.rs` carries
//! the same limitation note).
//!
//! Grounded on the teacher's `client/layer/decoder/{gzip,deflate}.rs`
//! (`async-compression` + `tokio-util` `StreamReader`/`ReaderStream`
//! bridging a body stream through a sync decoder).

use std::sync::Arc;

use bytes::Bytes;
use http::header;
use http_body_util::BodyExt;

use crate::{
    chain::{Interceptor, Next},
    config::ClientConfig,
    error::Result,
    request::Request,
    response::{Response, ResponseBody},
    scope::ExecScope,
    transport::BoxFuture,
};

pub struct ContentCoding {
    config: Arc<ClientConfig>,
}

impl ContentCoding {
    pub fn new(config: Arc<ClientConfig>) -> ContentCoding {
        ContentCoding { config }
    }
}

impl Interceptor for ContentCoding {
    fn execute<'a>(&'a self, mut request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
        if self.config.accept_encoding && !request.headers().contains_key(header::ACCEPT_ENCODING) {
            request
                .headers_mut()
                .insert(header::ACCEPT_ENCODING, http::HeaderValue::from_static("gzip, x-gzip, deflate"));
        }
        Box::pin(async move {
            let response = next.run(request, scope).await?;
            Ok(decode_if_coded(response))
        })
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Coding {
    Gzip,
    Deflate,
    Identity,
}

fn coding_of(response: &Response) -> Coding {
    match response.headers().get(header::CONTENT_ENCODING).and_then(|v| v.to_str().ok()) {
        Some(v) if v.eq_ignore_ascii_case("gzip") || v.eq_ignore_ascii_case("x-gzip") => Coding::Gzip,
        Some(v) if v.eq_ignore_ascii_case("deflate") => Coding::Deflate,
        _ => Coding::Identity,
    }
}

fn decode_if_coded(response: Response) -> Response {
    let coding = coding_of(&response);
    if coding == Coding::Identity {
        return response;
    }
    let (status, mut headers, body) = response.into_parts();
    headers.remove(header::CONTENT_ENCODING);
    headers.remove(header::CONTENT_LENGTH);

    #[cfg(any(feature = "gzip", feature = "deflate"))]
    {
        let decoded = decoders::wrap(body, coding);
        Response::new(status, headers, decoded)
    }
    #[cfg(not(any(feature = "gzip", feature = "deflate")))]
    {
        let _ = coding;
        Response::new(status, headers, body)
    }
}

#[cfg(any(feature = "gzip", feature = "deflate"))]
mod decoders {
    //! Bridges an `http_body::Body` stream through a sync decompressor via
    //! `tokio_util::io::{StreamReader, ReaderStream}`, matching the
    //! teacher's decoder layer shape.

    use futures_util::TryStreamExt;
    use http_body::Frame;
    use http_body_util::{BodyExt, StreamBody};
    use tokio_util::io::{ReaderStream, StreamReader};

    use super::{Coding, ResponseBody};
    use crate::pool::ReleaseHandle;

    pub(super) fn wrap(body: ResponseBody, coding: Coding) -> ResponseBody {
        if coding == Coding::Identity {
            return body;
        }
        let stream = body.into_data_stream().map_err(std::io::Error::other);
        let reader = StreamReader::new(stream);

        // The inner body's own release already fires when it is driven to
        // EOF (or dropped early) by the decoder below; this wrapper's
        // handle is a formality to satisfy `ResponseBody::new`.
        let noop_release = ReleaseHandle::new(true, |_| {});

        match coding {
            Coding::Gzip => {
                let decoder = async_compression::tokio::bufread::GzipDecoder::new(reader);
                let frames = ReaderStream::new(decoder).map_ok(Frame::data).map_err(Into::<crate::error::BoxError>::into);
                ResponseBody::new(StreamBody::new(frames), noop_release)
            }
            Coding::Deflate => {
                let decoder = async_compression::tokio::bufread::ZlibDecoder::new(reader);
                let frames = ReaderStream::new(decoder).map_ok(Frame::data).map_err(Into::<crate::error::BoxError>::into);
                ResponseBody::new(StreamBody::new(frames), noop_release)
            }
            Coding::Identity => body,
        }
    }
}
