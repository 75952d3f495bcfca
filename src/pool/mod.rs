//! Connection pool (C4).
//!
//! A bounded per-route + global cache of idle endpoints, a FIFO lease
//! queue, user-token affinity, validation-after-inactivity, and
//! idle/expired eviction — all guarded by one coarse mutex (spec §4.4,
//! §5, §9).
//!
//! Grounded on `examples/other_examples/809ab073_enetx-rquest__src-core-
//! client-pool.rs.rs` (a sibling rquest fork's `Pool<T, K>`: mutex-guarded
//! `PoolInner`, an idle map keyed by route, and a waiters map of oneshot
//! senders), generalized to the explicit per-route `leased`/`idle`
//! bookkeeping, global `max_total`, user-token affinity, and
//! validation-after-inactivity that spec §4.4 requires and the teacher's
//! (filtered-out) `pool.rs` is presumed to have implemented for hyper's
//! legacy client.

mod release;

use std::{
    collections::{HashMap, VecDeque},
    time::{Duration, Instant},
};

pub use release::ReleaseHandle;

use crate::{
    error::{Error, Kind},
    route::Route,
    sync::Mutex,
};

/// A value the pool can hold and reuse: a transport endpoint (C2).
///
/// `is_open` must be a cheap, non-blocking liveness check (e.g. "has the
/// peer sent a half-close / GOAWAY since we last used this") — it backs
/// validation-after-inactivity (spec §4.4) and must never perform I/O.
pub trait Poolable: Send + 'static {
    fn is_open(&self) -> bool;
}

/// Pool configuration (the pool-relevant subset of [`crate::config::ClientConfig`]).
#[derive(Debug, Clone)]
pub struct Config {
    pub max_total: usize,
    pub default_max_per_route: usize,
    pub max_per_route: HashMap<Route, usize>,
    /// `None` disables validation entirely (spec scenario 5's
    /// `validate_after_inactivity = -1`). `Some(Duration::ZERO)` probes
    /// every idle endpoint before reuse (spec scenario 5's `= 0`).
    pub validate_after_inactivity: Option<Duration>,
    pub time_to_live: Option<Duration>,
    pub idle_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_total: 64,
            default_max_per_route: 8,
            max_per_route: HashMap::new(),
            validate_after_inactivity: Some(Duration::from_secs(2)),
            time_to_live: None,
            idle_timeout: Some(Duration::from_secs(90)),
        }
    }
}

impl Config {
    fn cap_for(&self, route: &Route) -> usize {
        self.max_per_route
            .get(route)
            .copied()
            .unwrap_or(self.default_max_per_route)
    }
}

/// Point-in-time pool statistics (spec §3's `PoolStats`). Never blocks
/// beyond the pool's own short critical section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Stats {
    pub leased: usize,
    pub available: usize,
    pub pending: usize,
    pub max: usize,
}

/// Narrow observer hook for pool lifecycle events. No core behavior
/// depends on whether a listener is installed (spec §9 Open Questions —
/// the observability module is an external collaborator).
pub trait PoolListener: Send + Sync {
    fn on_lease(&self, _route: &Route) {}
    fn on_release(&self, _route: &Route, _reusable: bool) {}
    fn on_evict(&self, _route: &Route, _count: usize) {}
}

struct Idle<T> {
    endpoint: T,
    last_used: Instant,
    expiry: Instant,
    user_token: Option<String>,
}

struct RouteState<T> {
    leased: usize,
    idle: VecDeque<Idle<T>>,
}

impl<T> Default for RouteState<T> {
    fn default() -> Self {
        RouteState {
            leased: 0,
            idle: VecDeque::new(),
        }
    }
}

/// What a waiter receives once granted.
enum Grant<T> {
    Existing(T, Instant, Option<String>),
    Fresh,
}

struct Waiter<T> {
    id: u64,
    route: Route,
    tx: tokio::sync::oneshot::Sender<Grant<T>>,
}

struct Inner<T> {
    routes: HashMap<Route, RouteState<T>>,
    // FIFO order is the deque order; a release scans front-to-back for a
    // same-route waiter first, then front-to-back for any waiter with
    // route capacity (spec §4.4 "Ordering & fairness").
    waiters: VecDeque<Waiter<T>>,
    global_leased: usize,
    next_waiter_id: u64,
}

impl<T> Default for Inner<T> {
    fn default() -> Self {
        Inner {
            routes: HashMap::new(),
            waiters: VecDeque::new(),
            global_leased: 0,
            next_waiter_id: 0,
        }
    }
}

/// The bounded, mutex-guarded connection pool (spec §4.4).
pub struct Pool<T: Poolable> {
    inner: std::sync::Arc<Mutex<Inner<T>>>,
    config: Config,
    listener: Option<std::sync::Arc<dyn PoolListener>>,
}

impl<T: Poolable> Clone for Pool<T> {
    fn clone(&self) -> Self {
        Pool {
            inner: self.inner.clone(),
            config: self.config.clone(),
            listener: self.listener.clone(),
        }
    }
}

/// The result of a successful lease: either an existing idle endpoint or
/// a reserved slot for a freshly-connected one (spec §4.4 step 3: "not yet
/// connected").
pub enum Leased<T> {
    Existing { endpoint: T, user_token: Option<String> },
    Fresh,
}

impl<T: Poolable> Pool<T> {
    pub fn new(config: Config) -> Pool<T> {
        Pool {
            inner: std::sync::Arc::new(Mutex::new(Inner::default())),
            config,
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: std::sync::Arc<dyn PoolListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Lease an endpoint for `route`, waiting up to `deadline` and
    /// honoring `cancel`. Implements spec §4.4's lease algorithm plus the
    /// bounded (≤3) retry of invalid idle endpoints.
    pub async fn lease(
        &self,
        route: &Route,
        user_token: Option<&str>,
        deadline: Option<Instant>,
        cancel: &crate::cancel::CancellationToken,
    ) -> Result<Leased<T>, Error> {
        for _attempt in 0..3 {
            match self.try_acquire(route, user_token) {
                Acquire::Granted(grant) => {
                    tracing::trace!(%route, existing = matches!(grant, Grant::Existing(..)), "lease granted without waiting");
                    if let Some(listener) = &self.listener {
                        listener.on_lease(route);
                    }
                    return Ok(self.finish_grant(route, grant));
                }
                Acquire::Pending(rx, waiter_id) => {
                    tracing::trace!(%route, "lease pending, waiting for a free endpoint");
                    let grant = self.wait_for_grant(waiter_id, route, rx, deadline, cancel).await?;
                    tracing::trace!(%route, "lease granted after waiting");
                    if let Some(listener) = &self.listener {
                        listener.on_lease(route);
                    }
                    return Ok(self.finish_grant(route, grant));
                }
                Acquire::Retry => {
                    tracing::debug!(%route, "idle endpoint failed validation, retrying acquire");
                    continue;
                }
            }
        }
        tracing::debug!(%route, "lease exhausted after 3 failed validation retries");
        Err(Error::new(Kind::PoolExhausted).with_route(route.clone()))
    }

    fn finish_grant(&self, route: &Route, grant: Grant<T>) -> Leased<T> {
        match grant {
            Grant::Existing(endpoint, _last_used, user_token) => Leased::Existing { endpoint, user_token },
            Grant::Fresh => {
                let _ = route;
                Leased::Fresh
            }
        }
    }

    /// Abort a `Fresh` reservation that failed to connect: releases the
    /// reserved leased slot without ever having produced an endpoint
    /// (spec §4.4 "Failure semantics").
    pub fn abort_fresh(&self, route: &Route) {
        let mut inner = self.inner.lock();
        if let Some(state) = inner.routes.get_mut(route) {
            state.leased = state.leased.saturating_sub(1);
        }
        inner.global_leased = inner.global_leased.saturating_sub(1);
        self.wake_waiters(&mut inner, route);
    }

    /// Release a leased endpoint. `reusable` and `valid_duration` come
    /// from the caller's observation of the exchange (spec §4.4
    /// "Release"). `new_user_token` becomes the endpoint's affinity tag
    /// for the next lease.
    pub fn release(
        &self,
        route: &Route,
        endpoint: T,
        reusable: bool,
        new_user_token: Option<String>,
        valid_duration: Duration,
    ) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        if let Some(state) = inner.routes.get_mut(route) {
            state.leased = state.leased.saturating_sub(1);
        }
        inner.global_leased = inner.global_leased.saturating_sub(1);

        let keep = reusable && endpoint.is_open();
        tracing::trace!(%route, reusable, keep, "endpoint released");
        if keep {
            let expiry = now + self.config.time_to_live.unwrap_or(valid_duration).max(valid_duration);
            let idle = Idle {
                endpoint,
                last_used: now,
                expiry,
                user_token: new_user_token,
            };
            inner
                .routes
                .entry(route.clone())
                .or_default()
                .idle
                .push_back(idle);
        }
        if let Some(listener) = &self.listener {
            listener.on_release(route, keep);
        }
        self.wake_waiters(&mut inner, route);
    }

    /// Close all idle endpoints that have been idle longer than `max_idle`.
    pub fn close_idle(&self, max_idle: Duration) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        let mut total = 0usize;
        for (route, state) in inner.routes.iter_mut() {
            let before = state.idle.len();
            state
                .idle
                .retain(|idle| now.saturating_duration_since(idle.last_used) <= max_idle);
            let evicted = before - state.idle.len();
            total += evicted;
            if evicted > 0 {
                tracing::debug!(%route, evicted, "closed idle endpoints past max_idle");
                if let Some(listener) = &self.listener {
                    listener.on_evict(route, evicted);
                }
            }
        }
        let _ = total;
    }

    /// Close all idle endpoints past their time-to-live.
    pub fn close_expired(&self) {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        for (route, state) in inner.routes.iter_mut() {
            let before = state.idle.len();
            state.idle.retain(|idle| now <= idle.expiry);
            let evicted = before - state.idle.len();
            if evicted > 0 {
                tracing::debug!(%route, evicted, "closed expired endpoints past time_to_live");
                if let Some(listener) = &self.listener {
                    listener.on_evict(route, evicted);
                }
            }
        }
    }

    /// Run one idle-timeout + expiry sweep, as a background sweeper would
    /// at an implementation-chosen cadence (spec §4.4 "Eviction").
    pub fn sweep(&self) {
        if let Some(idle_timeout) = self.config.idle_timeout {
            self.close_idle(idle_timeout);
        }
        self.close_expired();
    }

    /// Point-in-time statistics for `route`.
    pub fn stats(&self, route: &Route) -> Stats {
        let inner = self.inner.lock();
        let leased = inner.routes.get(route).map(|s| s.leased).unwrap_or(0);
        let available = inner.routes.get(route).map(|s| s.idle.len()).unwrap_or(0);
        let pending = inner.waiters.iter().filter(|w| &w.route == route).count();
        Stats {
            leased,
            available,
            pending,
            max: self.config.cap_for(route),
        }
    }

    /// Total leased connections across all routes (`global_leased_count`,
    /// invariant (a) in spec §4.4).
    pub fn total_leased(&self) -> usize {
        self.inner.lock().global_leased
    }

    fn try_acquire(&self, route: &Route, user_token: Option<&str>) -> Acquire<T> {
        let mut inner = self.inner.lock();
        let cap = self.config.cap_for(route);
        let route_leased = inner.routes.get(route).map(|s| s.leased).unwrap_or(0);

        if inner.global_leased >= self.config.max_total || route_leased >= cap {
            let (tx, rx) = tokio::sync::oneshot::channel();
            let id = inner.next_waiter_id;
            inner.next_waiter_id += 1;
            inner.waiters.push_back(Waiter {
                id,
                route: route.clone(),
                tx,
            });
            return Acquire::Pending(rx, id);
        }

        let state = inner.routes.entry(route.clone()).or_default();
        let now = Instant::now();
        let popped = pop_idle_preferring_token(&mut state.idle, user_token);
        match popped {
            Some(idle) => {
                if self.needs_validation(idle.last_used, now) && !idle.endpoint.is_open() {
                    // Invalid: drop it (it was never counted as leased)
                    // and ask the caller to retry, bounded by the outer
                    // loop's 3-attempt cap.
                    return Acquire::Retry;
                }
                state.leased += 1;
                inner.global_leased += 1;
                Acquire::Granted(Grant::Existing(idle.endpoint, idle.last_used, idle.user_token))
            }
            None => {
                state.leased += 1;
                inner.global_leased += 1;
                Acquire::Granted(Grant::Fresh)
            }
        }
    }

    fn needs_validation(&self, last_used: Instant, now: Instant) -> bool {
        match self.config.validate_after_inactivity {
            None => false,
            Some(threshold) => now.saturating_duration_since(last_used) >= threshold,
        }
    }

    /// Wake FIFO-eligible waiters after a release frees capacity: same-route
    /// waiters first, then any waiter with route capacity (spec §4.4
    /// "Ordering & fairness"). Keeps trying the next eligible waiter if a
    /// grant can't be delivered (the waiter was cancelled concurrently),
    /// rather than leaving the freed capacity unoffered to anyone.
    fn wake_waiters(&self, inner: &mut Inner<T>, released_route: &Route) {
        loop {
            let same_route_idx = inner.waiters.iter().position(|w| &w.route == released_route);
            let idx = same_route_idx.or_else(|| {
                inner.waiters.iter().position(|w| {
                    let leased = inner.routes.get(&w.route).map(|s| s.leased).unwrap_or(0);
                    leased < self.config.cap_for(&w.route) && inner.global_leased < self.config.max_total
                })
            });
            let Some(idx) = idx else { return };
            let waiter = inner.waiters.remove(idx).expect("idx in bounds");
            let route = waiter.route.clone();
            let state = inner.routes.entry(route.clone()).or_default();
            let grant = match pop_idle_preferring_token(&mut state.idle, None) {
                Some(idle) => {
                    state.leased += 1;
                    inner.global_leased += 1;
                    Grant::Existing(idle.endpoint, idle.last_used, idle.user_token)
                }
                None => {
                    state.leased += 1;
                    inner.global_leased += 1;
                    Grant::Fresh
                }
            };
            if waiter.tx.send(grant).is_ok() {
                return;
            }
            // The waiter's future was dropped (cancelled or timed out)
            // concurrently with this send. Undo the reservation we just
            // made for it, using the lock we already hold, and keep
            // looking for another eligible waiter instead of stalling.
            if let Some(state) = inner.routes.get_mut(&route) {
                state.leased = state.leased.saturating_sub(1);
            }
            inner.global_leased = inner.global_leased.saturating_sub(1);
        }
    }

    /// Remove a still-pending waiter from the queue. Called proactively on
    /// cancellation/timeout so a dead waiter never lingers in `waiters`
    /// waiting for some future release to discover it (spec §4.4 invariant
    /// (d): "cancelling a pending lease removes it from both queues
    /// atomically"). A no-op if the waiter was already granted (removed by
    /// [`Self::wake_waiters`]) before this runs.
    fn remove_waiter(&self, waiter_id: u64, route: &Route) {
        let mut inner = self.inner.lock();
        if let Some(pos) = inner.waiters.iter().position(|w| w.id == waiter_id) {
            inner.waiters.remove(pos);
            tracing::trace!(%route, "removed a cancelled or timed-out waiter from the queue");
        }
    }

    async fn wait_for_grant(
        &self,
        waiter_id: u64,
        route: &Route,
        rx: tokio::sync::oneshot::Receiver<Grant<T>>,
        deadline: Option<Instant>,
        cancel: &crate::cancel::CancellationToken,
    ) -> Result<Grant<T>, Error> {
        let budget = deadline.map(|d| d.saturating_duration_since(Instant::now()));
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(Error::new(Kind::Cancelled)),
            res = wait_maybe_timed(rx, budget) => res,
        };
        if result.is_err() {
            self.remove_waiter(waiter_id, route);
        }
        result
    }
}

enum Acquire<T> {
    Granted(Grant<T>),
    Pending(tokio::sync::oneshot::Receiver<Grant<T>>, u64),
    /// An idle endpoint failed validation; caller should retry the whole
    /// acquire (bounded).
    Retry,
}

fn pop_idle_preferring_token<T>(
    idle: &mut VecDeque<Idle<T>>,
    user_token: Option<&str>,
) -> Option<Idle<T>> {
    if let Some(token) = user_token {
        if let Some(pos) = idle.iter().position(|i| i.user_token.as_deref() == Some(token)) {
            return idle.remove(pos);
        }
    }
    idle.pop_front()
}

async fn wait_maybe_timed<T>(
    rx: tokio::sync::oneshot::Receiver<Grant<T>>,
    budget: Option<Duration>,
) -> Result<Grant<T>, Error> {
    match budget {
        None => rx.await.map_err(|_| Error::new(Kind::PoolExhausted)),
        Some(d) => match tokio::time::timeout(d, rx).await {
            Ok(Ok(grant)) => Ok(grant),
            Ok(Err(_)) => Err(Error::new(Kind::PoolExhausted)),
            Err(_) => Err(Error::new(Kind::PoolExhausted)),
        },
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    struct Fake {
        open: Arc<std::sync::atomic::AtomicBool>,
    }

    impl Fake {
        fn new() -> Self {
            Fake {
                open: Arc::new(std::sync::atomic::AtomicBool::new(true)),
            }
        }
    }

    impl Poolable for Fake {
        fn is_open(&self) -> bool {
            self.open.load(std::sync::atomic::Ordering::SeqCst)
        }
    }

    fn route(label: &str) -> Route {
        Route::direct(std::sync::Arc::from(label), 443, true)
    }

    #[tokio::test]
    async fn fresh_lease_then_release_returns_to_idle() {
        let pool: Pool<Fake> = Pool::new(Config::default());
        let r = route("a.example");
        let cancel = crate::cancel::CancellationToken::new();
        let leased = pool.lease(&r, None, None, &cancel).await.unwrap();
        assert!(matches!(leased, Leased::Fresh));
        pool.release(&r, Fake::new(), true, None, Duration::from_secs(30));
        let stats = pool.stats(&r);
        assert_eq!(stats.leased, 0);
        assert_eq!(stats.available, 1);

        let leased = pool.lease(&r, None, None, &cancel).await.unwrap();
        assert!(matches!(leased, Leased::Existing { .. }));
    }

    #[tokio::test]
    async fn max_per_route_one_serializes_two_concurrent_leases() {
        let mut config = Config::default();
        config.default_max_per_route = 1;
        config.max_total = 4;
        let pool: Pool<Fake> = Pool::new(config);
        let r = route("b.example");
        let cancel = crate::cancel::CancellationToken::new();

        let first = pool.lease(&r, None, None, &cancel).await.unwrap();
        assert!(matches!(first, Leased::Fresh));
        assert_eq!(pool.stats(&r).leased, 1);

        let pool2 = pool.clone();
        let r2 = r.clone();
        let cancel2 = cancel.clone();
        let waiter = tokio::spawn(async move { pool2.lease(&r2, None, None, &cancel2).await });

        tokio::task::yield_now().await;
        assert_eq!(pool.stats(&r).pending, 1);

        pool.release(&r, Fake::new(), true, None, Duration::from_secs(30));
        let second = waiter.await.unwrap().unwrap();
        assert!(matches!(second, Leased::Existing { .. }));
        assert_eq!(pool.stats(&r).leased, 1);
    }

    #[tokio::test]
    async fn global_max_total_is_enforced_across_routes() {
        let mut config = Config::default();
        config.max_total = 1;
        config.default_max_per_route = 4;
        let pool: Pool<Fake> = Pool::new(config);
        let a = route("a.example");
        let b = route("b.example");
        let cancel = crate::cancel::CancellationToken::new();

        let leased_a = pool.lease(&a, None, None, &cancel).await.unwrap();
        assert!(matches!(leased_a, Leased::Fresh));
        assert_eq!(pool.total_leased(), 1);

        let pool2 = pool.clone();
        let b2 = b.clone();
        let cancel2 = cancel.clone();
        let waiter = tokio::spawn(async move { pool2.lease(&b2, None, None, &cancel2).await });
        tokio::task::yield_now().await;

        pool.release(&a, Fake::new(), false, None, Duration::from_secs(30));
        let leased_b = waiter.await.unwrap().unwrap();
        assert!(matches!(leased_b, Leased::Fresh));
        assert_eq!(pool.total_leased(), 1);
    }

    #[tokio::test]
    async fn validate_after_inactivity_zero_probes_every_idle_endpoint() {
        let mut config = Config::default();
        config.validate_after_inactivity = Some(Duration::ZERO);
        let pool: Pool<Fake> = Pool::new(config);
        let r = route("c.example");
        let cancel = crate::cancel::CancellationToken::new();

        let fake = Fake::new();
        let closed_flag = fake.open.clone();
        pool.release(&r, fake, true, None, Duration::from_secs(30));
        closed_flag.store(false, std::sync::atomic::Ordering::SeqCst);

        // The stale idle endpoint fails validation; the pool falls
        // through to a fresh reservation rather than handing back a dead
        // connection.
        let leased = pool.lease(&r, None, None, &cancel).await.unwrap();
        assert!(matches!(leased, Leased::Fresh));
        assert_eq!(pool.stats(&r).available, 0);
    }

    #[tokio::test]
    async fn user_token_affinity_prefers_matching_endpoint() {
        let pool: Pool<Fake> = Pool::new(Config::default());
        let r = route("d.example");
        let cancel = crate::cancel::CancellationToken::new();

        pool.release(&r, Fake::new(), true, Some("user-a".into()), Duration::from_secs(30));
        pool.release(&r, Fake::new(), true, Some("user-b".into()), Duration::from_secs(30));

        let leased = pool.lease(&r, Some("user-b"), None, &cancel).await.unwrap();
        match leased {
            Leased::Existing { user_token, .. } => assert_eq!(user_token.as_deref(), Some("user-b")),
            Leased::Fresh => panic!("expected an existing endpoint"),
        }
    }

    #[tokio::test]
    async fn cancelling_a_pending_lease_removes_the_waiter() {
        let mut config = Config::default();
        config.default_max_per_route = 1;
        let pool: Pool<Fake> = Pool::new(config);
        let r = route("e.example");
        let cancel = crate::cancel::CancellationToken::new();

        let _first = pool.lease(&r, None, None, &cancel).await.unwrap();

        let pool2 = pool.clone();
        let r2 = r.clone();
        let waiter_cancel = crate::cancel::CancellationToken::new();
        let waiter_cancel2 = waiter_cancel.clone();
        let waiter = tokio::spawn(async move { pool2.lease(&r2, None, None, &waiter_cancel2).await });
        tokio::task::yield_now().await;
        assert_eq!(pool.stats(&r).pending, 1);

        waiter_cancel.cancel();
        let result = waiter.await.unwrap();
        assert!(result.is_err());
        assert_eq!(pool.stats(&r).pending, 0);
    }

    #[tokio::test]
    async fn a_cancelled_waiter_does_not_stall_capacity_for_the_next_one() {
        let mut config = Config::default();
        config.default_max_per_route = 1;
        let pool: Pool<Fake> = Pool::new(config);
        let r = route("h.example");
        let cancel = crate::cancel::CancellationToken::new();

        let _first = pool.lease(&r, None, None, &cancel).await.unwrap();

        let pool2 = pool.clone();
        let r2 = r.clone();
        let cancelled_waiter_cancel = crate::cancel::CancellationToken::new();
        let cancelled_waiter_cancel2 = cancelled_waiter_cancel.clone();
        let cancelled_waiter = tokio::spawn(async move { pool2.lease(&r2, None, None, &cancelled_waiter_cancel2).await });
        tokio::task::yield_now().await;

        let pool3 = pool.clone();
        let r3 = r.clone();
        let cancel3 = cancel.clone();
        let second_waiter = tokio::spawn(async move { pool3.lease(&r3, None, None, &cancel3).await });
        tokio::task::yield_now().await;
        assert_eq!(pool.stats(&r).pending, 2);

        cancelled_waiter_cancel.cancel();
        assert!(cancelled_waiter.await.unwrap().is_err());
        assert_eq!(pool.stats(&r).pending, 1);

        pool.release(&r, Fake::new(), true, None, Duration::from_secs(30));
        let second = second_waiter.await.unwrap().unwrap();
        assert!(matches!(second, Leased::Existing { .. }));
        assert_eq!(pool.stats(&r).pending, 0);
    }

    #[tokio::test]
    async fn close_idle_evicts_stale_endpoints() {
        let pool: Pool<Fake> = Pool::new(Config::default());
        let r = route("f.example");
        pool.release(&r, Fake::new(), true, None, Duration::from_secs(30));
        assert_eq!(pool.stats(&r).available, 1);
        pool.close_idle(Duration::ZERO);
        assert_eq!(pool.stats(&r).available, 0);
    }

    #[tokio::test]
    async fn non_reusable_release_does_not_populate_idle() {
        let pool: Pool<Fake> = Pool::new(Config::default());
        let r = route("g.example");
        pool.release(&r, Fake::new(), false, None, Duration::from_secs(30));
        assert_eq!(pool.stats(&r).available, 0);
        assert_eq!(pool.total_leased(), 0);
    }
}
