//! Retry policy against a real server (spec §4.6.5, §8).

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use corehttp::config::ClientConfig;

#[tokio::test]
async fn get_is_retried_after_a_503_then_succeeds() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counted = attempts.clone();
    let server = support::http(move |_req| {
        let counted = counted.clone();
        async move {
            if counted.fetch_add(1, Ordering::SeqCst) == 0 {
                http::Response::builder()
                    .status(503)
                    .header(http::header::RETRY_AFTER, "0")
                    .body(http_body_util::Full::new(bytes::Bytes::new()))
                    .unwrap()
            } else {
                support::text(200, "recovered")
            }
        }
    });

    let client = corehttp::facade::nonblocking::Client::new(ClientConfig::builder().build().unwrap());
    let response = client.get(server.uri("/")).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
    let (_, _, body) = response.into_parts();
    body.discard();
}

#[tokio::test]
async fn post_is_not_retried_after_a_503() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counted = attempts.clone();
    let server = support::http(move |_req| {
        counted.fetch_add(1, Ordering::SeqCst);
        async { support::text(503, "unavailable") }
    });

    let client = corehttp::facade::nonblocking::Client::new(ClientConfig::builder().build().unwrap());
    let request = corehttp::request::Request::new(http::Method::POST, server.uri("/"));
    let response = client.execute(request).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    let (_, _, body) = response.into_parts();
    body.discard();
}
