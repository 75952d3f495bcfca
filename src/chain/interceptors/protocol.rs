//! Protocol defaults (4.6.1).
//!
//! Populates `Host`, `User-Agent`, `Accept-Encoding`, and configured
//! default headers unless already present; sets `Connection: keep-alive`
//! for HTTP/1.1 unless the connection-control interceptor demands close.
//! On the way back out, strips hop-by-hop headers named by `Connection`.
//!
//! Grounded on the teacher's `client/layer/config.rs` (header population
//! order: `Host` first, then caller-configured defaults, never
//! overwriting a header the caller already set explicitly).

use std::sync::Arc;

use http::{header, HeaderValue};

use crate::{
    chain::{Interceptor, Next},
    config::ClientConfig,
    error::Result,
    request::Request,
    response::Response,
    scope::ExecScope,
    transport::BoxFuture,
};

pub struct ProtocolDefaults {
    config: Arc<ClientConfig>,
}

impl ProtocolDefaults {
    pub fn new(config: Arc<ClientConfig>) -> ProtocolDefaults {
        ProtocolDefaults { config }
    }
}

impl Interceptor for ProtocolDefaults {
    fn execute<'a>(&'a self, mut request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
        apply_defaults(&self.config, &mut request);
        Box::pin(async move {
            let mut response = next.run(request, scope).await?;
            strip_hop_by_hop(&mut response);
            Ok(response)
        })
    }
}

fn apply_defaults(config: &ClientConfig, request: &mut Request) {
    if !request.headers().contains_key(header::HOST) {
        if let Some(host) = request.uri().host() {
            let value = match request.uri().port_u16() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            if let Ok(value) = HeaderValue::from_str(&value) {
                request.headers_mut().insert(header::HOST, value);
            }
        }
    }

    if !request.headers().contains_key(header::USER_AGENT) {
        if let Some(ua) = &config.user_agent {
            request.headers_mut().insert(header::USER_AGENT, ua.clone());
        }
    }

    if config.accept_encoding && !request.headers().contains_key(header::ACCEPT_ENCODING) {
        request
            .headers_mut()
            .insert(header::ACCEPT_ENCODING, HeaderValue::from_static("gzip, x-gzip, deflate"));
    }

    let caller_set: std::collections::HashSet<_> = request.headers().keys().cloned().collect();
    for (name, value) in config.default_headers.iter() {
        if !caller_set.contains(name) {
            request.headers_mut().append(name.clone(), value.clone());
        }
    }

    if !request.headers().contains_key(header::CONNECTION) {
        request.headers_mut().insert(header::CONNECTION, HeaderValue::from_static("keep-alive"));
    }
}

/// Remove headers named by the response's `Connection` header (spec
/// §4.6.1 "strips hop-by-hop headers named by Connection").
fn strip_hop_by_hop(response: &mut Response) {
    let named: Vec<String> = response
        .headers()
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(',').map(|s| s.trim().to_string()))
        .filter(|name| !name.eq_ignore_ascii_case("close") && !name.eq_ignore_ascii_case("keep-alive"))
        .collect();
    for name in named {
        if let Ok(name) = header::HeaderName::from_bytes(name.as_bytes()) {
            response.headers_mut().remove(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::{Method, StatusCode, Uri};

    use super::*;
    use crate::{chain::Chain, chain::TerminalExec, cancel::CancellationToken, response::ResponseBody, route::Route};

    struct EchoTerminal;

    impl TerminalExec for EchoTerminal {
        fn call<'a>(&'a self, request: Request, _scope: &'a mut ExecScope) -> BoxFuture<'a, Result<Response>> {
            let headers = request.headers().clone();
            Box::pin(async move { Ok(Response::new(StatusCode::OK, headers, ResponseBody::empty())) })
        }
    }

    #[tokio::test]
    async fn host_and_user_agent_are_populated() {
        let config = Arc::new(ClientConfig::builder().user_agent("corehttp-test/1.0").unwrap().build().unwrap());
        let chain = Chain::new(vec![Arc::new(ProtocolDefaults::new(config))], Arc::new(EchoTerminal));
        let request = Request::new(Method::GET, Uri::from_static("https://example.com/path"));
        let route = Route::for_uri(request.uri()).unwrap();
        let mut scope = ExecScope::new(route, None, CancellationToken::new());

        let response = chain.run(request, &mut scope).await.unwrap();
        assert_eq!(response.headers().get(header::HOST).unwrap(), "example.com");
        assert_eq!(response.headers().get(header::USER_AGENT).unwrap(), "corehttp-test/1.0");
    }

    #[tokio::test]
    async fn existing_host_header_is_not_overwritten() {
        let config = Arc::new(ClientConfig::builder().build().unwrap());
        let chain = Chain::new(vec![Arc::new(ProtocolDefaults::new(config))], Arc::new(EchoTerminal));
        let mut request = Request::new(Method::GET, Uri::from_static("https://example.com/path"));
        request.headers_mut().insert(header::HOST, HeaderValue::from_static("override.example"));
        let route = Route::for_uri(request.uri()).unwrap();
        let mut scope = ExecScope::new(route, None, CancellationToken::new());

        let response = chain.run(request, &mut scope).await.unwrap();
        assert_eq!(response.headers().get(header::HOST).unwrap(), "override.example");
    }
}
