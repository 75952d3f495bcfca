//! Route & endpoint model (C1).
//!
//! A [`Route`] is the pool partition key: two routes are equal iff every
//! field is equal. It is derived from the request authority plus whatever
//! a [`RoutePlanner`] decides about proxying.

use std::fmt;
use std::sync::Arc;

use http::Uri;

use crate::error::{Error, Kind, Result};

/// One hop of a proxy chain used to reach a route's target.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ProxyHop {
    scheme: String,
    host: String,
    port: u16,
}

impl ProxyHop {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        ProxyHop {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for ProxyHop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}://{}:{}", self.scheme, self.host, self.port)
    }
}

/// The pool partition key: `(host, port, scheme, proxy chain, secure?)`.
///
/// Two routes are equal iff all fields are equal. The route must not
/// change across attempts for the same [`crate::scope::ExecScope`] except
/// when a redirect crosses authorities — in which case a new scope is
/// implicit (spec §4.1).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Route {
    host: Arc<str>,
    port: u16,
    scheme_is_https: bool,
    proxy_chain: Arc<[ProxyHop]>,
    secure: bool,
}

impl Route {
    /// A route with no proxy hops.
    pub fn direct(host: Arc<str>, port: u16, secure: bool) -> Route {
        Route {
            scheme_is_https: secure,
            host,
            port,
            proxy_chain: Arc::from(Vec::new()),
            secure,
        }
    }

    /// A route reached through the given proxy chain.
    pub fn via_proxies(
        host: Arc<str>,
        port: u16,
        secure: bool,
        proxy_chain: Vec<ProxyHop>,
    ) -> Route {
        Route {
            scheme_is_https: secure,
            host,
            port,
            proxy_chain: Arc::from(proxy_chain),
            secure,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_secure(&self) -> bool {
        self.secure
    }

    pub fn proxy_chain(&self) -> &[ProxyHop] {
        &self.proxy_chain
    }

    pub fn has_proxy(&self) -> bool {
        !self.proxy_chain.is_empty()
    }

    /// Compute the route for a request URI with no proxy planner installed
    /// (spec §4.1, direct case).
    pub fn for_uri(uri: &Uri) -> Result<Route> {
        let scheme = uri
            .scheme_str()
            .ok_or_else(|| Error::new(Kind::ProtocolError))?;
        let secure = match scheme {
            "https" => true,
            "http" => false,
            _ => return Err(Error::new(Kind::ProtocolError)),
        };
        let host = uri
            .host()
            .ok_or_else(|| Error::new(Kind::ProtocolError))?;
        let port = uri
            .port_u16()
            .unwrap_or(if secure { 443 } else { 80 });
        Ok(Route::direct(Arc::from(host), port, secure))
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.secure {
            write!(f, "https://{}:{}", self.host, self.port)?;
        } else {
            write!(f, "http://{}:{}", self.host, self.port)?;
        }
        for hop in self.proxy_chain.iter() {
            write!(f, " via {hop}")?;
        }
        Ok(())
    }
}

/// Decides the proxy chain (possibly empty) and secure-through-proxy flag
/// for a request. Installed on a [`crate::config::ClientConfig`]; the
/// default planner never proxies.
pub trait RoutePlanner: Send + Sync {
    /// Resolve the route to use for `uri`. The route must not change for
    /// the lifetime of one [`crate::scope::ExecScope`] except across a
    /// redirect that crosses authorities.
    fn plan(&self, uri: &Uri) -> Result<Route>;
}

/// The default planner: routes are computed directly from the request
/// authority, with no proxy hops.
#[derive(Debug, Default, Clone, Copy)]
pub struct DirectPlanner;

impl RoutePlanner for DirectPlanner {
    fn plan(&self, uri: &Uri) -> Result<Route> {
        Route::for_uri(uri)
    }
}
