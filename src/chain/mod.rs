//! Execution chain (C5).
//!
//! An ordered sequence of [`Interceptor`]s, each free to inspect/mutate the
//! request, delegate to the rest of the chain via [`Next`], and
//! inspect/mutate the response on the way back out — no interceptor
//! inherits from another; composition is explicit ordering (spec §4.5).
//!
//! Grounded on the teacher's `client/client/mod.rs` (a `tower::Service`
//! stack built by composing `Layer`s in a fixed order), generalized to the
//! spec's own `execute(request, scope, next)` contract instead of
//! `tower::Service::call`, since several standard interceptors (redirect,
//! retry) need to re-enter the chain from its own start rather than only
//! delegate forward.

pub mod interceptors;

use std::sync::Arc;

use crate::{
    error::Result,
    request::Request,
    response::Response,
    scope::ExecScope,
    transport::BoxFuture,
};

/// A terminal step: what runs once every interceptor has delegated
/// forward. Normally built by [`interceptors::terminal_transport_exec`];
/// tests substitute their own.
///
/// A plain `Fn(Request, &mut ExecScope) -> BoxFuture<'static, ...>` can't
/// express this: the returned future legitimately borrows from the
/// `&mut ExecScope` argument for as long as the call takes, not for
/// `'static`. Modeled instead as a trait with a generic method, so each
/// call gets its own borrow-sized lifetime.
pub trait TerminalExec: Send + Sync {
    fn call<'a>(&'a self, request: Request, scope: &'a mut ExecScope) -> BoxFuture<'a, Result<Response>>;
}

pub type Terminal = dyn TerminalExec;

/// One step of the execution chain (spec §4.5).
///
/// Implementations call `next.run(request, scope)` to continue the chain,
/// or short-circuit by returning a `Response`/`Err` directly without
/// calling `next` at all (e.g. the retry interceptor re-invoking the
/// *entire* chain from its own position after a failed attempt).
pub trait Interceptor: Send + Sync {
    fn execute<'a>(&'a self, request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> BoxFuture<'a, Result<Response>>;
}

/// The remainder of the chain after the currently-executing interceptor.
///
/// Holds only references, so it is `Copy`: an interceptor that re-enters
/// the chain in a loop (redirect, retry) can call `run` more than once
/// from the same `Next` value instead of having to re-derive it.
#[derive(Clone, Copy)]
pub struct Next<'a> {
    remaining: &'a [Arc<dyn Interceptor>],
    terminal: &'a Terminal,
}

impl<'a> Next<'a> {
    pub fn run(self, request: Request, scope: &'a mut ExecScope) -> BoxFuture<'a, Result<Response>> {
        match self.remaining.split_first() {
            Some((first, rest)) => {
                let next = Next {
                    remaining: rest,
                    terminal: self.terminal,
                };
                first.execute(request, scope, next)
            }
            None => self.terminal.call(request, scope),
        }
    }
}

/// An observer hook for chain lifecycle events (ambient; spec §9 Open
/// Questions — observability is an external collaborator with no effect
/// on control flow).
pub trait ExecListener: Send + Sync {
    fn on_attempt(&self, _scope: &ExecScope) {}
    fn on_redirect(&self, _scope: &ExecScope, _to: &http::Uri) {}
    fn on_retry(&self, _scope: &ExecScope, _reason: &crate::error::Error) {}
    fn on_outcome(&self, _scope: &ExecScope, _outcome: &Result<()>) {}
}

/// The assembled chain: a fixed interceptor order terminating in whatever
/// the caller supplies as `terminal` (normally
/// [`interceptors::terminal_transport_exec`]).
pub struct Chain {
    interceptors: Vec<Arc<dyn Interceptor>>,
    terminal: Arc<Terminal>,
}

impl Chain {
    pub fn new(interceptors: Vec<Arc<dyn Interceptor>>, terminal: Arc<Terminal>) -> Chain {
        Chain { interceptors, terminal }
    }

    pub async fn run(&self, request: Request, scope: &mut ExecScope) -> Result<Response> {
        let terminal = self.terminal.as_ref();
        let next = Next {
            remaining: &self.interceptors,
            terminal,
        };
        next.run(request, scope).await
    }
}
