//! The two client facades (C9, C10).
//!
//! Both share one [`crate::chain::interceptors::TransportPool`] and build
//! the same [`crate::chain::interceptors::standard_chain`] from a
//! [`crate::config::ClientConfig`]; they differ only in how they drive the
//! chain to completion relative to the caller's thread.

pub mod nonblocking;

#[cfg(feature = "blocking")]
pub mod blocking;
