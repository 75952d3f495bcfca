//! Connection pool bounds against a real, deliberately slow server (spec
//! §4.4, §8).

mod support;

use std::time::Duration;

use corehttp::config::ClientConfig;
use corehttp::error::Kind;

#[tokio::test]
async fn max_total_bounds_concurrent_leases() {
    let server = support::http(|_req| async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        support::text(200, "slow")
    });

    let client = corehttp::facade::nonblocking::Client::new(
        ClientConfig::builder()
            .pool_max_total(1)
            .lease_timeout(Duration::from_millis(40))
            .build()
            .unwrap(),
    );

    let first = client.get(server.uri("/"));
    let second = client.get(server.uri("/"));
    let (first, second) = tokio::join!(first, second);

    let ok_count = [&first, &second].iter().filter(|r| r.is_ok()).count();
    let exhausted_count = [&first, &second]
        .iter()
        .filter(|r| matches!(r, Err(e) if e.kind() == Kind::PoolExhausted))
        .count();
    assert_eq!(ok_count, 1);
    assert_eq!(exhausted_count, 1);

    for response in [first, second].into_iter().flatten() {
        let (_, _, body) = response.into_parts();
        body.discard();
    }
}

#[tokio::test]
async fn released_endpoint_is_reused_by_the_next_lease() {
    let server = support::http(|_req| async { support::text(200, "ok") });

    let client = corehttp::facade::nonblocking::Client::new(
        ClientConfig::builder().pool_max_total(1).build().unwrap(),
    );

    for _ in 0..2 {
        let response = client.get(server.uri("/")).await.unwrap();
        let (_, _, body) = response.into_parts();
        body.discard();
    }
    assert_eq!(client.pool().total_leased(), 0);
}
