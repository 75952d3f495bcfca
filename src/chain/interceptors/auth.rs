//! Authentication state machine (4.6.4).
//!
//! Basic is computed directly, matching the teacher's `util::basic_auth`
//! (a streaming base64 encoder writing straight into the header buffer).
//! Digest, NTLM, and SPNEGO are invoked through
//! [`crate::auth::ChallengeResponder`]; this crate supplies no default
//! implementation for them, so a challenge in one of those schemes with no
//! responder configured resolves to `Kind::CredentialsMissing`.
//!
//! Re-enters the chain from its own position (like redirect) so a
//! successful challenge response can be sent without unwinding back
//! through user-token/retry first.

use std::io::Write;
use std::sync::Arc;

use base64::prelude::BASE64_STANDARD;
use base64::write::EncoderWriter;
use http::{header, HeaderName, HeaderValue, StatusCode};

use crate::{
    auth::Credentials,
    chain::{Interceptor, Next},
    config::ClientConfig,
    error::{Error, Kind, Result},
    request::Request,
    response::Response,
    scope::{AuthScheme, AuthState, Challenge, ExecScope},
    transport::BoxFuture,
};

pub struct Authentication {
    config: Arc<ClientConfig>,
}

impl Authentication {
    pub fn new(config: Arc<ClientConfig>) -> Authentication {
        Authentication { config }
    }
}

impl Interceptor for Authentication {
    fn execute<'a>(&'a self, request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
        Box::pin(authenticate(&self.config, request, scope, next))
    }
}

#[derive(Clone, Copy)]
enum Target {
    Origin,
    Proxy,
}

async fn authenticate<'a>(config: &ClientConfig, mut request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> Result<Response> {
    loop {
        let carried = request.try_clone();
        let response = next.run(request, scope).await?;

        let target = match response.status() {
            StatusCode::UNAUTHORIZED => Target::Origin,
            StatusCode::PROXY_AUTHENTICATION_REQUIRED => Target::Proxy,
            _ => {
                mark_succeeded(scope);
                return Ok(response);
            }
        };

        let Some(challenge) = strongest_challenge(&response, challenge_header(target), config) else {
            return Ok(response);
        };

        let route = scope.route().clone();
        let attempt = scope.attempt_count();
        let credentials = config.credentials.as_ref().and_then(|provider| provider.credentials_for(&route, challenge.scheme));
        let Some(credentials) = credentials else {
            tracing::debug!(scheme = ?challenge.scheme, %route, "no credentials available for challenge");
            auth_state_mut(scope, target).fail();
            return Err(Error::new(Kind::CredentialsMissing).with_route(route).with_attempt(attempt));
        };

        let previous_state = current_responder_state(scope, target).map(<[u8]>::to_vec);
        let Some(next_state) = next_responder_state(config, &challenge, &credentials, previous_state.as_deref()) else {
            auth_state_mut(scope, target).fail();
            return Err(Error::new(Kind::AuthFailed).with_route(route).with_attempt(attempt));
        };

        let stalled = auth_state_mut(scope, target).on_challenge(challenge.clone(), Some(next_state.clone()));
        if stalled {
            tracing::debug!(scheme = ?challenge.scheme, %route, "auth stalled, same scheme made no progress across two challenges");
            auth_state_mut(scope, target).fail();
            return Err(Error::new(Kind::AuthStalled).with_route(route).with_attempt(attempt));
        }
        tracing::trace!(scheme = ?challenge.scheme, %route, "responding to authentication challenge");

        let Some(mut rebuilt) = carried else {
            auth_state_mut(scope, target).fail();
            return Err(Error::new(Kind::AuthFailed).with_route(route).with_attempt(attempt));
        };

        auth_state_mut(scope, target).begin_responding(challenge.scheme, next_state.clone());
        rebuilt
            .headers_mut()
            .insert(authorization_header(target), authorization_value(challenge.scheme, &next_state));

        request = rebuilt;
    }
}

fn challenge_header(target: Target) -> HeaderName {
    match target {
        Target::Origin => header::WWW_AUTHENTICATE,
        Target::Proxy => header::PROXY_AUTHENTICATE,
    }
}

fn authorization_header(target: Target) -> HeaderName {
    match target {
        Target::Origin => header::AUTHORIZATION,
        Target::Proxy => header::PROXY_AUTHORIZATION,
    }
}

fn auth_state_mut<'s>(scope: &'s mut ExecScope, target: Target) -> &'s mut AuthState {
    match target {
        Target::Origin => scope.target_auth_mut(),
        Target::Proxy => scope.proxy_auth_mut(),
    }
}

fn current_responder_state(scope: &ExecScope, target: Target) -> Option<&[u8]> {
    let state = match target {
        Target::Origin => scope.target_auth(),
        Target::Proxy => scope.proxy_auth(),
    };
    match state {
        AuthState::Responding { state, .. } => Some(state.as_slice()),
        _ => None,
    }
}

fn mark_succeeded(scope: &mut ExecScope) {
    if !matches!(scope.target_auth(), AuthState::Unchallenged | AuthState::Succeeded) {
        scope.target_auth_mut().succeed();
    }
    if !matches!(scope.proxy_auth(), AuthState::Unchallenged | AuthState::Succeeded) {
        scope.proxy_auth_mut().succeed();
    }
}

/// Picks the strongest challenge this config can act on: `Basic` is always
/// supported; Digest/NTLM/SPNEGO only if a [`crate::auth::ChallengeResponder`]
/// is configured.
fn strongest_challenge(response: &Response, header_name: HeaderName, config: &ClientConfig) -> Option<Challenge> {
    let mut best: Option<Challenge> = None;
    for value in response.headers().get_all(header_name) {
        let Ok(text) = value.to_str() else { continue };
        let Some(challenge) = parse_challenge(text) else { continue };
        if !scheme_supported(challenge.scheme, config) {
            continue;
        }
        if best.as_ref().map(|b| challenge.scheme > b.scheme).unwrap_or(true) {
            best = Some(challenge);
        }
    }
    best
}

fn scheme_supported(scheme: AuthScheme, config: &ClientConfig) -> bool {
    match scheme {
        AuthScheme::Basic => true,
        AuthScheme::Digest | AuthScheme::Ntlm | AuthScheme::Spnego => config.challenge_responder.is_some(),
    }
}

fn parse_challenge(text: &str) -> Option<Challenge> {
    let text = text.trim();
    let (scheme_str, params) = match text.split_once(' ') {
        Some((scheme, params)) => (scheme, params.trim()),
        None => (text, ""),
    };
    let scheme = match scheme_str.to_ascii_lowercase().as_str() {
        "basic" => AuthScheme::Basic,
        "digest" => AuthScheme::Digest,
        "ntlm" => AuthScheme::Ntlm,
        "negotiate" => AuthScheme::Spnego,
        _ => return None,
    };
    Some(Challenge { scheme, params: params.to_string() })
}

/// `Basic` needs no responder: the "token" is just the credential bytes,
/// which produces a correctly-unchanging state if the credentials are
/// wrong (stall detection then fails the exchange instead of looping).
fn next_responder_state(config: &ClientConfig, challenge: &Challenge, credentials: &Credentials, previous: Option<&[u8]>) -> Option<Vec<u8>> {
    match (challenge.scheme, credentials) {
        (AuthScheme::Basic, Credentials::Basic { username, password }) => Some(format!("{username}:{password}").into_bytes()),
        _ => config
            .challenge_responder
            .as_ref()
            .and_then(|responder| responder.respond(challenge.scheme, &challenge.params, credentials, previous)),
    }
}

fn scheme_name(scheme: AuthScheme) -> &'static str {
    match scheme {
        AuthScheme::Basic => "Basic",
        AuthScheme::Digest => "Digest",
        AuthScheme::Ntlm => "NTLM",
        AuthScheme::Spnego => "Negotiate",
    }
}

fn authorization_value(scheme: AuthScheme, state: &[u8]) -> HeaderValue {
    let mut buf = format!("{} ", scheme_name(scheme)).into_bytes();
    {
        let mut encoder = EncoderWriter::new(&mut buf, &BASE64_STANDARD);
        let _ = encoder.write_all(state);
    }
    let mut header = HeaderValue::from_bytes(&buf).expect("scheme name plus base64 is always a valid header value");
    header.set_sensitive(true);
    header
}
