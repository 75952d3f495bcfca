//! Request value (part of C7).
//!
//! Headers preserve insertion order per name; `Host` is set exactly once,
//! by the protocol-defaults interceptor (4.6.1), never by the caller
//! directly overwriting an existing value.

use std::time::Duration;

use http::{HeaderMap, HeaderValue, Method, Uri};

use crate::body::Body;

/// An HTTP request: method, URI, headers, and an optional entity.
///
/// Per spec §3: `{method, authority, path, headers (ordered, case-
/// insensitive keys, multi-valued), entity?}`. The `Uri` here carries both
/// the authority and the path; [`crate::route::Route::for_uri`] derives
/// the route from it.
#[derive(Debug)]
pub struct Request {
    method: Method,
    uri: Uri,
    headers: HeaderMap<HeaderValue>,
    body: Option<Body>,
    /// Per-request override of `request_deadline` (spec §6).
    deadline_override: Option<Duration>,
}

impl Request {
    pub fn new(method: Method, uri: Uri) -> Request {
        Request {
            method,
            uri,
            headers: HeaderMap::new(),
            body: None,
            deadline_override: None,
        }
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn method_mut(&mut self) -> &mut Method {
        &mut self.method
    }

    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    pub fn uri_mut(&mut self) -> &mut Uri {
        &mut self.uri
    }

    pub fn headers(&self) -> &HeaderMap<HeaderValue> {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap<HeaderValue> {
        &mut self.headers
    }

    pub fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    pub fn body_mut(&mut self) -> &mut Option<Body> {
        &mut self.body
    }

    pub fn set_body(&mut self, body: Body) {
        self.body = Some(body);
    }

    /// Drop the request entity. Used by the redirect interceptor (4.6.3)
    /// when rewriting the method to `GET`.
    pub fn clear_body(&mut self) {
        self.body = None;
    }

    pub fn deadline_override(&self) -> Option<Duration> {
        self.deadline_override
    }

    pub fn set_deadline_override(&mut self, deadline: Duration) {
        self.deadline_override = Some(deadline);
    }

    /// Returns `true` if this request's entity (if any) is repeatable.
    /// A request with no entity is trivially repeatable.
    pub fn is_repeatable(&self) -> bool {
        self.body.as_ref().map(Body::is_repeatable).unwrap_or(true)
    }

    /// Attempt to clone this request, including its entity. Returns `None`
    /// if the entity is a one-shot stream that cannot be replayed — the
    /// caller (retry or redirect interceptor) must treat that as
    /// non-retriable per spec §3's non-repeatable-entity invariant.
    pub fn try_clone(&self) -> Option<Request> {
        let body = match &self.body {
            Some(b) => Some(b.try_clone()?),
            None => None,
        };
        Some(Request {
            method: self.method.clone(),
            uri: self.uri.clone(),
            headers: self.headers.clone(),
            body,
            deadline_override: self.deadline_override,
        })
    }
}
