//! The hand-off between a response body and the pool that leased its
//! endpoint (spec §4.7, §9).
//!
//! [`Response`](crate::response::Response) and [`ResponseBody`](crate::response::ResponseBody)
//! are not generic over the transport endpoint type, so the release path
//! is type-erased behind a boxed closure rather than threaded through as
//! `Pool<T>`.

/// A one-shot, type-erased capability to return a leased endpoint to its
/// pool. Exactly one of [`ReleaseHandle::release`] or letting it drop
/// fires the release; both paths are safe to hit from any unwind.
pub struct ReleaseHandle {
    proposed_reusable: bool,
    f: Option<Box<dyn FnOnce(bool) + Send>>,
}

impl ReleaseHandle {
    /// `proposed_reusable` is the transport's best guess at receive-time
    /// (e.g. no `Connection: close`, protocol supports keep-alive). The
    /// caller may downgrade it to `false` (discard, cancel, early drop)
    /// but never upgrade a `false` guess.
    pub fn new(proposed_reusable: bool, f: impl FnOnce(bool) + Send + 'static) -> ReleaseHandle {
        ReleaseHandle {
            proposed_reusable,
            f: Some(Box::new(f)),
        }
    }

    pub fn proposed_reusable(&self) -> bool {
        self.proposed_reusable
    }

    /// Downgrade the receive-time guess to non-reusable (e.g. a response
    /// carried `Connection: close`). Mirrors `release`'s one-way rule:
    /// never upgrades a `false` guess to `true`.
    pub fn downgrade_to_non_reusable(&mut self) {
        self.proposed_reusable = false;
    }

    /// Release the endpoint. Idempotent: a second call (or a subsequent
    /// drop) is a no-op.
    pub fn release(mut self, reusable: bool) {
        if let Some(f) = self.f.take() {
            f(reusable && self.proposed_reusable);
        }
    }
}

impl Drop for ReleaseHandle {
    fn drop(&mut self) {
        if let Some(f) = self.f.take() {
            f(false);
        }
    }
}

impl std::fmt::Debug for ReleaseHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReleaseHandle")
            .field("proposed_reusable", &self.proposed_reusable)
            .field("released", &self.f.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{atomic::{AtomicBool, AtomicUsize, Ordering}, Arc};

    #[test]
    fn release_invokes_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_reusable = Arc::new(AtomicBool::new(false));
        let (c, s) = (calls.clone(), seen_reusable.clone());
        let handle = ReleaseHandle::new(true, move |reusable| {
            c.fetch_add(1, Ordering::SeqCst);
            s.store(reusable, Ordering::SeqCst);
        });
        handle.release(true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(seen_reusable.load(Ordering::SeqCst));
    }

    #[test]
    fn dropping_without_release_reports_non_reusable() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen_reusable = Arc::new(AtomicBool::new(true));
        let (c, s) = (calls.clone(), seen_reusable.clone());
        {
            let _handle = ReleaseHandle::new(true, move |reusable| {
                c.fetch_add(1, Ordering::SeqCst);
                s.store(reusable, Ordering::SeqCst);
            });
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!seen_reusable.load(Ordering::SeqCst));
    }

    #[test]
    fn proposed_false_cannot_be_upgraded_to_reusable() {
        let seen_reusable = Arc::new(AtomicBool::new(true));
        let s = seen_reusable.clone();
        let handle = ReleaseHandle::new(false, move |reusable| s.store(reusable, Ordering::SeqCst));
        handle.release(true);
        assert!(!seen_reusable.load(Ordering::SeqCst));
    }
}
