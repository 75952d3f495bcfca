//! Redirect-following against a real server (spec §4.6.3, §8).

mod support;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use corehttp::config::{ClientConfig, RedirectPolicy};

#[tokio::test]
async fn redirect_chain_is_followed_to_completion() {
    let hits = Arc::new(AtomicUsize::new(0));
    let counted = hits.clone();
    let server = support::http(move |req| {
        let counted = counted.clone();
        async move {
            counted.fetch_add(1, Ordering::SeqCst);
            if req.uri().path() == "/start" {
                http::Response::builder()
                    .status(302)
                    .header(http::header::LOCATION, "/end")
                    .body(http_body_util::Full::new(bytes::Bytes::new()))
                    .unwrap()
            } else {
                support::text(200, "landed")
            }
        }
    });

    let client = corehttp::facade::nonblocking::Client::new(ClientConfig::builder().build().unwrap());
    let response = client.get(server.uri("/start")).await.unwrap();
    assert_eq!(response.status(), http::StatusCode::OK);
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    let (_, _, body) = response.into_parts();
    body.discard();
}

#[tokio::test]
async fn redirect_limit_is_enforced() {
    let server = support::http(|_req| async {
        http::Response::builder()
            .status(302)
            .header(http::header::LOCATION, "/loop")
            .body(http_body_util::Full::new(bytes::Bytes::new()))
            .unwrap()
    });

    let config = ClientConfig::builder()
        .redirect(RedirectPolicy {
            max_redirects: 2,
            allow_circular: true,
            strict_rfc_compliance: false,
        })
        .build()
        .unwrap();
    let client = corehttp::facade::nonblocking::Client::new(config);

    let err = client.get(server.uri("/loop")).await.unwrap_err();
    assert_eq!(err.kind(), corehttp::error::Kind::RedirectLimit);
}
