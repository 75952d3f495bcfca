//! Retry policy (4.6.5).
//!
//! Grounded on the teacher's `client/layer/retry.rs` backoff loop (retry
//! the whole exchange a bounded number of times, checking the request's
//! body is replayable before resending) and on redirect's carry-clone
//! idiom: a clone of the request is kept before `next.run` consumes it,
//! and attempting the resend fails closed if the body can't be cloned
//! back.
//!
//! Innermost interceptor before the transport terminal (spec §4.5), so it
//! sees and retries only transport-level and transport-carried failures,
//! not the request rewriting done by redirect/auth above it.

use std::sync::Arc;
use std::time::Duration;

use http::{HeaderValue, Method, StatusCode};

use crate::{
    chain::{Interceptor, Next},
    config::ClientConfig,
    error::{Error, Kind, Result},
    request::Request,
    response::Response,
    scope::ExecScope,
    transport::BoxFuture,
};

pub struct Retry {
    config: Arc<ClientConfig>,
}

impl Retry {
    pub fn new(config: Arc<ClientConfig>) -> Retry {
        Retry { config }
    }
}

impl Interceptor for Retry {
    fn execute<'a>(&'a self, request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> BoxFuture<'a, Result<Response>> {
        Box::pin(attempt(&self.config, request, scope, next))
    }
}

async fn attempt<'a>(config: &ClientConfig, mut request: Request, scope: &'a mut ExecScope, next: Next<'a>) -> Result<Response> {
    let mut early_retried = false;

    loop {
        let carried = request.try_clone();
        scope.record_attempt();
        let method = request.method().clone();
        let result = next.run(request, scope).await;

        match result {
            Err(err) => {
                if !err.is_retriable() || err.is_cancelled() || !config.retry.retry_on_connect_failure {
                    return Err(err);
                }
                let Some(resend) = carried else {
                    tracing::trace!(method = %method, "transport error on a non-repeatable body, not retrying");
                    return Err(err);
                };
                if scope.attempt_count() >= config.retry.max_attempts {
                    tracing::debug!(method = %method, attempts = scope.attempt_count(), "retry budget exhausted after a transport error");
                    return Err(Error::new(Kind::RetryExhausted).with_route(scope.route().clone()).with_attempt(scope.attempt_count()));
                }
                tracing::trace!(method = %method, attempt = scope.attempt_count(), error = %err, "retrying after a transport error");
                request = resend;
                back_off(scope, scope.attempt_count()).await;
                continue;
            }
            Ok(response) => {
                if response.status() == StatusCode::TOO_EARLY && is_idempotent(&method) && !early_retried {
                    let Some(resend) = carried else { return Ok(response) };
                    tracing::trace!(method = %method, "retrying once after 425 Too Early");
                    early_retried = true;
                    request = resend;
                    continue;
                }

                if !config.retry.retry_status_codes.contains(&response.status()) || !is_idempotent(&method) {
                    return Ok(response);
                }
                if scope.attempt_count() >= config.retry.max_attempts {
                    tracing::debug!(method = %method, status = %response.status(), "retry budget exhausted, returning response as-is");
                    return Ok(response);
                }
                let Some(resend) = carried else { return Ok(response) };

                let wait = retry_after(response.headers().get(http::header::RETRY_AFTER));
                tracing::trace!(method = %method, status = %response.status(), attempt = scope.attempt_count(), "retrying after a retriable status code");
                request = resend;
                match wait {
                    Some(wait) => sleep_cancellable(scope, wait).await,
                    None => back_off(scope, scope.attempt_count()).await,
                }
            }
        }
    }
}

/// GET, HEAD, PUT, DELETE, OPTIONS, and TRACE are conventionally
/// idempotent; POST, PATCH, and CONNECT are not retried on a response
/// status.
fn is_idempotent(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::HEAD | Method::PUT | Method::DELETE | Method::OPTIONS | Method::TRACE
    )
}

/// Only the delta-seconds form is parsed; the HTTP-date form falls back to
/// the default backoff rather than pulling in a date-parsing dependency.
fn retry_after(header: Option<&HeaderValue>) -> Option<Duration> {
    let seconds: u64 = header?.to_str().ok()?.trim().parse().ok()?;
    Some(Duration::from_secs(seconds))
}

async fn back_off(scope: &ExecScope, attempts: u32) {
    let exponent = attempts.saturating_sub(1).min(6);
    let base_ms = 100u64.saturating_mul(1u64 << exponent);
    sleep_cancellable(scope, Duration::from_millis(base_ms)).await;
}

async fn sleep_cancellable(scope: &ExecScope, wait: Duration) {
    tokio::select! {
        _ = tokio::time::sleep(wait) => {}
        _ = scope.cancellation().cancelled() => {}
    }
}
