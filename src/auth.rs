//! Credential and challenge-response trait boundary (spec §1, §4.6.4).
//!
//! Basic auth is implemented directly by [`chain::interceptors::auth`]
//! because it is a one-shot, cryptography-free scheme: base64 of
//! `username:password`, no state across roundtrips. Digest, NTLM, and
//! SPNEGO require per-scheme cryptographic computation and multi-roundtrip
//! state this crate does not implement; embedders that need them supply a
//! [`ChallengeResponder`].
//!
//! Grounded on the teacher's narrow `Resolve`/`CookieStore` trait pattern
//! (`client/dns/mod.rs`, `cookie.rs`): an external collaborator invoked
//! through a small trait rather than a concrete dependency.

use crate::{route::Route, scope::AuthScheme};

/// Credentials for one scheme at one route. Read-only from the core's
/// perspective — this crate never stores or mutates credentials, only
/// asks for them when a challenge arrives.
#[derive(Clone)]
pub enum Credentials {
    Basic { username: String, password: String },
    /// Opaque bytes handed to a [`ChallengeResponder`] for Digest/NTLM/
    /// SPNEGO; this crate does not interpret them.
    Opaque(Vec<u8>),
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credentials::Basic { username, .. } => f.debug_struct("Basic").field("username", username).finish_non_exhaustive(),
            Credentials::Opaque(_) => f.debug_tuple("Opaque").finish_non_exhaustive(),
        }
    }
}

/// Supplies credentials for a challenge. Queried once per `Challenged`
/// transition; returning `None` fails the auth state machine with
/// `Kind::CredentialsMissing` (spec §4.6.4).
pub trait CredentialsProvider: Send + Sync {
    fn credentials_for(&self, route: &Route, scheme: AuthScheme) -> Option<Credentials>;
}

/// Computes the next roundtrip token for a multi-roundtrip scheme (Digest,
/// NTLM, SPNEGO). Not implemented by this crate: `Basic` never calls this,
/// and no default responder is registered, so those schemes resolve to
/// `CredentialsMissing` unless an embedder supplies one.
pub trait ChallengeResponder: Send + Sync {
    /// `previous_state` is the bytes this responder returned on the prior
    /// roundtrip for the same scheme, if any. Returns the next token to
    /// place in `Authorization`/`Proxy-Authorization`, or `None` to give up.
    fn respond(&self, scheme: AuthScheme, challenge_params: &str, credentials: &Credentials, previous_state: Option<&[u8]>) -> Option<Vec<u8>>;
}

/// A [`CredentialsProvider`] that always answers with one fixed Basic
/// credential pair, regardless of route. Covers the common single-origin
/// case without requiring embedders to implement the trait themselves.
pub struct StaticBasicCredentials {
    username: String,
    password: String,
}

impl StaticBasicCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> StaticBasicCredentials {
        StaticBasicCredentials {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl CredentialsProvider for StaticBasicCredentials {
    fn credentials_for(&self, _route: &Route, scheme: AuthScheme) -> Option<Credentials> {
        match scheme {
            AuthScheme::Basic => Some(Credentials::Basic {
                username: self.username.clone(),
                password: self.password.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use http::Uri;

    use super::*;

    #[test]
    fn static_basic_credentials_only_answer_basic() {
        let provider = StaticBasicCredentials::new("alice", "hunter2");
        let route = Route::for_uri(&Uri::from_static("https://example.com/")).unwrap();
        assert!(matches!(provider.credentials_for(&route, AuthScheme::Basic), Some(Credentials::Basic { .. })));
        assert!(provider.credentials_for(&route, AuthScheme::Digest).is_none());
    }
}
