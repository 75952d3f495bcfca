//! Redirect resolution (4.6.3).
//!
//! Grounded on the teacher's `client/layer/redirect/mod.rs` and
//! `redirect.rs` (the redirect-following loop re-entering the request
//! build from the resolved `Location`, with a policy struct controlling
//! method rewriting). Re-enters the chain from the interceptor directly
//! below this one (spec §4.5 rationale: "redirects wrap auth").

use std::sync::Arc;

use http::{header, Method, StatusCode, Uri};

use crate::{
    chain::{Interceptor, Next},
    config::ClientConfig,
    error::{Error, Kind, Result},
    request::Request,
    response::Response,
    route::Route,
    scope::ExecScope,
    transport::BoxFuture,
};

pub struct Redirect {
    config: Arc<ClientConfig>,
}

impl Redirect {
    pub fn new(config: Arc<ClientConfig>) -> Redirect {
        Redirect { config }
    }
}

impl Interceptor for Redirect {
    fn execute<'a>(&'a self, request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
        Box::pin(follow(&self.config, request, scope, next))
    }
}

async fn follow<'a>(config: &ClientConfig, mut request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> Result<Response> {
    loop {
        let current_uri = request.uri().clone();
        let original_method = request.method().clone();
        // Headers (Host, User-Agent, Authorization, any custom defaults)
        // carry forward to the redirected request regardless of method
        // rewriting; cheap to snapshot even when the body can't be.
        let carried_headers = request.headers().clone();
        // 307/308 must resend the same entity; keep a copy around in case
        // the response turns out to be one of those, before `next.run`
        // consumes `request` to send it over the wire.
        let carried = request.try_clone();

        let response = next.run(request, scope).await?;

        if !is_redirect(response.status()) {
            return Ok(response);
        }

        let Some(location) = response.headers().get(header::LOCATION) else {
            return Ok(response);
        };
        let location = location
            .to_str()
            .map_err(|e| Error::with_source(Kind::ProtocolError, e))?
            .to_string();
        if location.contains(' ') {
            return Err(Error::new(Kind::ProtocolError).with_route(scope.route().clone()));
        }

        let target = resolve_location(&current_uri, &location)?;

        scope.redirect_chain_mut().push(current_uri.clone());
        if scope.redirect_chain().len() > config.redirect.max_redirects as usize {
            tracing::debug!(from = %current_uri, to = %target, len = scope.redirect_chain().len(), "redirect chain exceeded max_redirects");
            return Err(Error::new(Kind::RedirectLimit).with_route(scope.route().clone()));
        }
        if scope.redirect_chain().contains(&target) && !config.redirect.allow_circular {
            tracing::debug!(from = %current_uri, to = %target, "circular redirect detected");
            return Err(Error::new(Kind::CircularRedirect).with_route(scope.route().clone()));
        }
        tracing::trace!(from = %current_uri, to = %target, status = %response.status(), "following redirect");

        let method = request_method_for(response.status(), original_method, config);
        drop(response);

        // A method-rewriting redirect (301/302/303 -> GET) never resends
        // the original entity, so it doesn't need a body clone to have
        // succeeded — only the headers need to carry forward. 307/308
        // preserve both method and body, so they do need `carried`.
        let mut rebuilt = if method == Method::GET || method == Method::HEAD {
            let mut rebuilt = Request::new(method, target.clone());
            *rebuilt.headers_mut() = carried_headers;
            rebuilt
        } else {
            match carried {
                Some(mut carried) => {
                    *carried.method_mut() = method;
                    *carried.uri_mut() = target.clone();
                    carried
                }
                None => return Err(Error::new(Kind::ProtocolError).with_route(scope.route().clone())),
            }
        };

        if rebuilt.method() == Method::GET || rebuilt.method() == Method::HEAD {
            rebuilt.clear_body();
        }

        if same_authority(&current_uri, &target) {
            // auth headers/state carry forward to the same authority
        } else {
            rebuilt.headers_mut().remove(header::AUTHORIZATION);
            scope.reset_target_auth();
        }

        let new_route = Route::for_uri(&target)?;
        if new_route != *scope.route() {
            scope.set_route(new_route);
        }

        request = rebuilt;
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND | StatusCode::SEE_OTHER | StatusCode::TEMPORARY_REDIRECT | StatusCode::PERMANENT_REDIRECT
    )
}

/// 303 always becomes GET. 301/302 become GET unless strict RFC compliance
/// is requested. 307/308 always keep the original method and body.
fn request_method_for(status: StatusCode, original: Method, config: &ClientConfig) -> Method {
    match status {
        StatusCode::SEE_OTHER => Method::GET,
        StatusCode::MOVED_PERMANENTLY | StatusCode::FOUND if !config.redirect.strict_rfc_compliance => Method::GET,
        _ => original,
    }
}

fn resolve_location(base: &Uri, location: &str) -> Result<Uri> {
    if let Ok(absolute) = location.parse::<Uri>() {
        if absolute.scheme().is_some() {
            match absolute.scheme_str() {
                Some("http") | Some("https") => return Ok(absolute),
                _ => return Err(Error::new(Kind::ProtocolError)),
            }
        }
    }
    let mut parts = base.clone().into_parts();
    let path_and_query = location.parse().map_err(|e| Error::with_source(Kind::ProtocolError, e))?;
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts).map_err(|e| Error::with_source(Kind::ProtocolError, e))
}

fn same_authority(a: &Uri, b: &Uri) -> bool {
    a.authority() == b.authority() && a.scheme() == b.scheme()
}
