//! Connection-control (4.6.6).
//!
//! Request side mirrors the transport's own `carries_connection_close`
//! check in `transport/connector.rs` (which only reads what's already on
//! the request); this interceptor is what puts `Connection: close` there
//! in the first place when the route requires single-use. Response side
//! observes the same header coming back and downgrades the endpoint's
//! reusability regardless of what the transport guessed, via
//! [`ResponseBody::mark_non_reusable`].

use std::sync::Arc;

use http::header;

use crate::{
    chain::{Interceptor, Next},
    config::ClientConfig,
    error::Result,
    request::Request,
    response::Response,
    scope::ExecScope,
    transport::BoxFuture,
};

pub struct ConnectionControl {
    config: Arc<ClientConfig>,
}

impl ConnectionControl {
    pub fn new(config: Arc<ClientConfig>) -> ConnectionControl {
        ConnectionControl { config }
    }
}

impl Interceptor for ConnectionControl {
    fn execute<'a>(&'a self, mut request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
        if self.config.close_connections_through_proxy && scope.route().has_proxy() {
            request.headers_mut().insert(header::CONNECTION, http::HeaderValue::from_static("close"));
        }
        Box::pin(async move {
            let mut response = next.run(request, scope).await?;
            if carries_connection_close(response.headers()) {
                tracing::trace!(route = %scope.route(), "response carries Connection: close, marking endpoint non-reusable");
                response.body_mut().mark_non_reusable();
            }
            Ok(response)
        })
    }
}

fn carries_connection_close(headers: &http::HeaderMap) -> bool {
    headers.get_all(header::CONNECTION).iter().any(|value| {
        value
            .to_str()
            .map(|v| v.split(',').any(|token| token.trim().eq_ignore_ascii_case("close")))
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use http::{HeaderMap, Method, StatusCode, Uri};

    use super::*;
    use crate::{
        body::Body,
        cancel::CancellationToken,
        chain::{Chain, TerminalExec},
        pool::ReleaseHandle,
        response::ResponseBody,
        route::{ProxyHop, Route},
    };

    fn response(headers: HeaderMap, proposed_reusable: bool, seen: std::sync::Arc<std::sync::Mutex<Option<bool>>>) -> Response {
        let body = Body::empty().map_err(Into::into);
        let release = ReleaseHandle::new(proposed_reusable, move |reusable| *seen.lock().unwrap() = Some(reusable));
        Response::new(StatusCode::OK, headers, ResponseBody::new(body, release))
    }

    struct ScriptedTerminal {
        response: std::sync::Mutex<Option<Response>>,
        seen_connection_header: std::sync::Mutex<Option<String>>,
    }

    impl TerminalExec for ScriptedTerminal {
        fn call<'a>(&'a self, request: Request, _scope: &'a mut ExecScope) -> BoxFuture<'a, Result<Response>> {
            let seen = request.headers().get(header::CONNECTION).and_then(|v| v.to_str().ok()).map(str::to_string);
            *self.seen_connection_header.lock().unwrap() = seen;
            let response = self.response.lock().unwrap().take().unwrap();
            Box::pin(async move { Ok(response) })
        }
    }

    async fn run(config: Arc<ClientConfig>, route: Route, response: Response) -> (Response, Option<String>) {
        let terminal = Arc::new(ScriptedTerminal {
            response: std::sync::Mutex::new(Some(response)),
            seen_connection_header: std::sync::Mutex::new(None),
        });
        let chain = Chain::new(vec![Arc::new(ConnectionControl::new(config))], terminal.clone());
        let request = Request::new(Method::GET, Uri::from_static("https://example.com/"));
        let mut scope = ExecScope::new(route, None, CancellationToken::new());
        let response = chain.run(request, &mut scope).await.unwrap();
        let seen = terminal.seen_connection_header.lock().unwrap().clone();
        (response, seen)
    }

    #[tokio::test]
    async fn proxied_route_gets_connection_close_on_request() {
        use http_body_util::BodyExt;

        let config = Arc::new(ClientConfig::builder().build().unwrap());
        let route = Route::via_proxies(
            std::sync::Arc::from("example.com"),
            443,
            true,
            vec![ProxyHop::new("http", "proxy.local", 8080)],
        );
        let seen_reusable = std::sync::Arc::new(std::sync::Mutex::new(None));
        let response_value = response(HeaderMap::new(), true, seen_reusable.clone());
        let (response, seen_header) = run(config, route, response_value).await;
        assert_eq!(seen_header.as_deref(), Some("close"));
        let (_, _, body) = response.into_parts();
        let _ = body.collect().await;
        assert_eq!(*seen_reusable.lock().unwrap(), Some(true));
    }

    #[tokio::test]
    async fn response_connection_close_forces_non_reusable() {
        use http_body_util::BodyExt;

        let config = Arc::new(ClientConfig::builder().build().unwrap());
        let route = Route::for_uri(&Uri::from_static("https://example.com/")).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, http::HeaderValue::from_static("close"));
        let seen_reusable = std::sync::Arc::new(std::sync::Mutex::new(None));
        let response_value = response(headers, true, seen_reusable.clone());
        let (response, _seen_header) = run(config, route, response_value).await;
        let (_, _, body) = response.into_parts();
        let _ = body.collect().await;
        assert_eq!(*seen_reusable.lock().unwrap(), Some(false));
    }

    #[test]
    fn carries_connection_close_is_case_insensitive_and_list_aware() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, http::HeaderValue::from_static("keep-alive, Close"));
        assert!(carries_connection_close(&headers));
    }
}
