#![deny(missing_debug_implementations)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! # corehttp
//!
//! The execution core of an HTTP/1.1 and HTTP/2 client: an ordered
//! interceptor chain over a bounded, per-route connection pool, with
//! layered timeouts, cooperative cancellation, and retry.
//!
//! This crate does not implement the HTTP wire codecs (delegated to
//! `hyper`/`h2`), concrete TLS cryptography, cookie persistence, or
//! auth-scheme cryptography (Digest/NTLM/SPNEGO) — those are consumed
//! through narrow trait boundaries so embedders can supply their own. DNS
//! resolution is also a narrow trait boundary ([`resolve::Resolve`]), but
//! ships a default: the system resolver via `tokio::net::lookup_host`.
//!
//! The two facades share one connection pool:
//!
//! - [`facade::nonblocking::Client`] drives the chain on the caller's
//!   `tokio` runtime.
//! - [`facade::blocking::Client`] (behind the `blocking` feature) wraps the
//!   non-blocking client with a dedicated runtime for thread-per-call use.

pub mod auth;
pub mod body;
pub mod cancel;
pub mod chain;
pub mod config;
pub mod error;
pub mod facade;
pub mod pool;
pub mod request;
pub mod resolve;
pub mod response;
pub mod route;
pub mod scope;
mod sync;
pub mod timeout;
pub mod tls;
pub mod transport;

pub use crate::{
    config::{ClientConfig, ClientConfigBuilder},
    error::{Error, Result},
    request::Request,
    response::Response,
    route::Route,
};
