//! DNS resolution (§6 "a narrow `Resolve` trait... defaulting to the system
//! resolver via `tokio::net::lookup_host`").
//!
//! Grounded on the teacher's `dns::{Resolve, gai::GaiResolver}` — a narrow
//! `resolve(name) -> Addrs` collaborator trait with a system-resolver
//! default — narrowed to a plain `async fn` boundary since this crate has no
//! `tower::Service` stack to adapt into.

use std::{fmt, net::SocketAddr};

use crate::error::{Error, Kind, Result};
use crate::transport::BoxFuture;

/// Resolves a host name to the addresses it's willing to try connecting to,
/// in order. A pluggable resolver is an external collaborator: install one
/// via [`crate::config::ClientConfigBuilder::resolver`] to override DNS
/// (split-horizon testing, a cache, `/etc/hosts`-style overrides), bypassing
/// the system resolver entirely.
pub trait Resolve: Send + Sync + fmt::Debug {
    fn resolve<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<SocketAddr>>>;
}

/// The default resolver: the OS's getaddrinfo via `tokio::net::lookup_host`,
/// matching the teacher's `GaiResolver`.
#[derive(Debug, Default)]
pub struct SystemResolver;

impl Resolve for SystemResolver {
    fn resolve<'a>(&'a self, host: &'a str) -> BoxFuture<'a, Result<Vec<SocketAddr>>> {
        Box::pin(async move {
            // Port 0 here is a placeholder; the connector substitutes the
            // route's real port onto every resolved address below.
            let addrs = tokio::net::lookup_host((host, 0))
                .await
                .map_err(|e| Error::with_source(Kind::DnsUnresolvable, e))?
                .collect::<Vec<SocketAddr>>();
            if addrs.is_empty() {
                return Err(Error::new(Kind::DnsUnresolvable));
            }
            Ok(addrs)
        })
    }
}

/// Replace every resolved address's port with `port`, preserving order.
pub(crate) fn with_port(addrs: Vec<SocketAddr>, port: u16) -> Vec<SocketAddr> {
    addrs
        .into_iter()
        .map(|mut addr| {
            addr.set_port(port);
            addr
        })
        .collect()
}
