//! User-token affinity (4.6.7).
//!
//! Grounded on the teacher's `client/layer/config.rs` pattern of stashing
//! a request-scoped value for a later layer to read (there, header
//! defaults; here, the pool affinity tag `scope.user_token()` that the
//! transport terminal passes into `Pool::lease`, see
//! `chain/interceptors/mod.rs`).
//!
//! Sits directly above retry/transport (spec §4.5) so every attempt of
//! the same scope — including retries — resolves and stores the token
//! once, before the lease happens.

use std::sync::Arc;

use crate::{
    chain::{Interceptor, Next},
    config::ClientConfig,
    error::Result,
    request::Request,
    response::Response,
    scope::ExecScope,
    transport::BoxFuture,
};

pub struct UserToken {
    config: Arc<ClientConfig>,
}

impl UserToken {
    pub fn new(config: Arc<ClientConfig>) -> UserToken {
        UserToken { config }
    }
}

impl Interceptor for UserToken {
    fn execute<'a>(&'a self, request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
        if scope.user_token().is_none() {
            if let Some(handler) = self.config.user_token_handler.as_ref() {
                if let Some(token) = handler.token_for(scope.route(), scope) {
                    scope.set_user_token(token);
                }
            }
        }
        next.run(request, scope)
    }
}

#[cfg(test)]
mod tests {
    use http::{Method, StatusCode, Uri};

    use super::*;
    use crate::{
        cancel::CancellationToken,
        chain::{Chain, TerminalExec},
        response::ResponseBody,
        route::Route,
        scope::UserTokenHandler,
    };

    struct FixedTokenHandler;

    impl UserTokenHandler for FixedTokenHandler {
        fn token_for(&self, _route: &Route, _scope: &ExecScope) -> Option<String> {
            Some("session-a".to_string())
        }
    }

    struct RecordingTerminal {
        seen: std::sync::Mutex<Option<String>>,
    }

    impl TerminalExec for RecordingTerminal {
        fn call<'a>(&'a self, _request: Request, scope: &'a mut ExecScope) -> BoxFuture<'a, Result<Response>> {
            *self.seen.lock().unwrap() = scope.user_token().map(str::to_string);
            Box::pin(async { Ok(Response::new(StatusCode::OK, http::HeaderMap::new(), ResponseBody::empty())) })
        }
    }

    #[tokio::test]
    async fn handler_result_is_stored_on_the_scope() {
        let config = Arc::new(ClientConfig::builder().user_token_handler(Arc::new(FixedTokenHandler)).build().unwrap());
        let terminal = Arc::new(RecordingTerminal { seen: std::sync::Mutex::new(None) });
        let chain = Chain::new(vec![Arc::new(UserToken::new(config))], terminal.clone());
        let request = Request::new(Method::GET, Uri::from_static("https://example.com/"));
        let route = Route::for_uri(request.uri()).unwrap();
        let mut scope = ExecScope::new(route, None, CancellationToken::new());
        chain.run(request, &mut scope).await.unwrap();
        assert_eq!(terminal.seen.lock().unwrap().as_deref(), Some("session-a"));
    }

    #[tokio::test]
    async fn no_handler_leaves_token_unset() {
        let config = Arc::new(ClientConfig::builder().build().unwrap());
        let terminal = Arc::new(RecordingTerminal { seen: std::sync::Mutex::new(None) });
        let chain = Chain::new(vec![Arc::new(UserToken::new(config))], terminal.clone());
        let request = Request::new(Method::GET, Uri::from_static("https://example.com/"));
        let route = Route::for_uri(request.uri()).unwrap();
        let mut scope = ExecScope::new(route, None, CancellationToken::new());
        chain.run(request, &mut scope).await.unwrap();
        assert_eq!(*terminal.seen.lock().unwrap(), None);
    }

    #[tokio::test]
    async fn existing_token_is_not_overwritten() {
        let config = Arc::new(ClientConfig::builder().user_token_handler(Arc::new(FixedTokenHandler)).build().unwrap());
        let terminal = Arc::new(RecordingTerminal { seen: std::sync::Mutex::new(None) });
        let chain = Chain::new(vec![Arc::new(UserToken::new(config))], terminal.clone());
        let request = Request::new(Method::GET, Uri::from_static("https://example.com/"));
        let route = Route::for_uri(request.uri()).unwrap();
        let mut scope = ExecScope::new(route, None, CancellationToken::new());
        scope.set_user_token("pinned");
        chain.run(request, &mut scope).await.unwrap();
        assert_eq!(terminal.seen.lock().unwrap().as_deref(), Some("pinned"));
    }
}
