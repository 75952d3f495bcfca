//! Layered deadlines (part of C8).
//!
//! Every deadline is represented as an absolute monotonic [`Instant`], per
//! spec §9: "never carry a relative duration across multiple suspension
//! points." Each blocking call computes `min(op_timeout, deadline - now)`
//! via [`Deadlines::budget_for`].
//!
//! Grounded on the teacher's `client/layer/timeout/{layer,body,future}.rs`
//! (layered `tower::timeout::Timeout` wrapping, but generalized here to
//! the five independent layers spec §4.8 names instead of one blanket
//! request timeout).

use std::time::{Duration, Instant};

use crate::error::{Error, Kind};

/// The independent timeout layers from spec §4.8. All are optional; unset
/// layers impose no bound beyond `request_deadline`, if any.
#[derive(Debug, Clone, Copy, Default)]
pub struct Deadlines {
    pub lease_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub handshake_timeout: Option<Duration>,
    pub socket_timeout: Option<Duration>,
    pub request_deadline: Option<Duration>,
}

/// Which layer a timeout violation should be attributed to, so the caller
/// can map it to the right [`Kind`] and reusability effect (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    Lease,
    Connect,
    Handshake,
    Socket,
}

impl Layer {
    pub fn error_kind(self) -> Kind {
        match self {
            Layer::Lease => Kind::PoolExhausted,
            Layer::Connect => Kind::ConnectTimeout,
            Layer::Handshake => Kind::HandshakeTimeout,
            Layer::Socket => Kind::ReadTimeout,
        }
    }
}

/// A resolved, absolute-instant view of [`Deadlines`] for one exchange,
/// anchored at the moment the exchange entered the chain.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedDeadlines {
    entered_at: Instant,
    request_deadline: Option<Instant>,
    layers: Deadlines,
}

impl ResolvedDeadlines {
    pub fn new(layers: Deadlines, now: Instant) -> ResolvedDeadlines {
        ResolvedDeadlines {
            entered_at: now,
            request_deadline: layers.request_deadline.map(|d| now + d),
            layers,
        }
    }

    pub fn entered_at(&self) -> Instant {
        self.entered_at
    }

    pub fn request_deadline(&self) -> Option<Instant> {
        self.request_deadline
    }

    /// The budget remaining for `layer`, shortened to whatever remains of
    /// `request_deadline` if that is the stricter bound (spec §4.8: "when
    /// set, every blocking operation is shortened to
    /// `min(operation_timeout, remaining_deadline)`").
    ///
    /// Returns `Err(RequestDeadlineExceeded)` if the end-to-end deadline
    /// has already elapsed; `Ok(None)` means "no bound"; `Ok(Some(d))`
    /// means "at most `d` remains for this operation."
    pub fn budget_for(&self, layer: Layer, now: Instant) -> Result<Option<Duration>, Error> {
        if let Some(deadline) = self.request_deadline {
            if now >= deadline {
                return Err(Error::new(Kind::RequestDeadlineExceeded));
            }
        }
        let op_timeout = match layer {
            Layer::Lease => self.layers.lease_timeout,
            Layer::Connect => self.layers.connect_timeout,
            Layer::Handshake => self.layers.handshake_timeout,
            Layer::Socket => self.layers.socket_timeout,
        };
        let remaining_deadline = self.request_deadline.map(|d| d.saturating_duration_since(now));
        Ok(match (op_timeout, remaining_deadline) {
            (Some(op), Some(rem)) => Some(op.min(rem)),
            (Some(op), None) => Some(op),
            (None, Some(rem)) => Some(rem),
            (None, None) => None,
        })
    }

    /// `true` if the end-to-end deadline has already elapsed.
    pub fn is_expired(&self, now: Instant) -> bool {
        self.request_deadline.map(|d| now >= d).unwrap_or(false)
    }
}

/// Race a future against a deadline, mapping elapsed time to the correct
/// [`Kind`] for `layer`. `None` budget means "wait indefinitely" (still
/// subject to outer deadlines via [`ResolvedDeadlines::budget_for`]).
pub async fn with_budget<F, T>(budget: Option<Duration>, layer: Layer, fut: F) -> Result<T, Error>
where
    F: std::future::Future<Output = T>,
{
    match budget {
        None => Ok(fut.await),
        Some(d) => tokio::time::timeout(d, fut)
            .await
            .map_err(|_| Error::new(layer.error_kind())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_deadline_shortens_layer_budget() {
        let now = Instant::now();
        let deadlines = Deadlines {
            connect_timeout: Some(Duration::from_secs(10)),
            request_deadline: Some(Duration::from_millis(50)),
            ..Default::default()
        };
        let resolved = ResolvedDeadlines::new(deadlines, now);
        let budget = resolved.budget_for(Layer::Connect, now).unwrap();
        assert!(budget.unwrap() <= Duration::from_millis(50));
    }

    #[test]
    fn expired_deadline_is_reported_before_layer_budget() {
        let now = Instant::now();
        let deadlines = Deadlines {
            request_deadline: Some(Duration::from_millis(1)),
            ..Default::default()
        };
        let resolved = ResolvedDeadlines::new(deadlines, now);
        let later = now + Duration::from_millis(5);
        let err = resolved.budget_for(Layer::Connect, later).unwrap_err();
        assert_eq!(err.kind(), Kind::RequestDeadlineExceeded);
    }

    #[test]
    fn no_deadlines_means_unbounded() {
        let now = Instant::now();
        let resolved = ResolvedDeadlines::new(Deadlines::default(), now);
        assert_eq!(resolved.budget_for(Layer::Connect, now).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn with_budget_times_out() {
        let fut = tokio::time::sleep(Duration::from_secs(10));
        let result = with_budget(Some(Duration::from_millis(10)), Layer::Socket, fut).await;
        assert_eq!(result.unwrap_err().kind(), Kind::ReadTimeout);
    }
}
