//! Background HTTP server for integration tests (spec §4.13's expansion).
//!
//! Grounded on the teacher's `tests/support/server.rs`: a dedicated OS
//! thread runs its own `current_thread` runtime accepting connections and
//! serving them with `hyper_util`'s auto (HTTP/1 or HTTP/2) builder, so the
//! test binary's own runtime never has to coexist with the server's.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::mpsc as std_mpsc;
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use http_body_util::Full;
use tokio::{net::TcpListener, runtime, sync::oneshot};

pub struct Server {
    addr: SocketAddr,
    panic_rx: std_mpsc::Receiver<()>,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl Server {
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn uri(&self, path: &str) -> http::Uri {
        format!("http://{}{}", self.addr, path).parse().unwrap()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if !thread::panicking() {
            let _ = self.panic_rx.recv_timeout(Duration::from_secs(3));
        }
    }
}

/// Spawn a background server. `func` is called once per request; its
/// response body is a fully-buffered `Bytes` frame.
#[allow(dead_code)]
pub fn http<F, Fut>(func: F) -> Server
where
    F: Fn(http::Request<hyper::body::Incoming>) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = http::Response<Full<Bytes>>> + Send + 'static,
{
    thread::spawn(move || {
        let rt = runtime::Builder::new_current_thread().enable_all().build().expect("new rt");
        let listener = rt.block_on(async { TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await.unwrap() });
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel();
        let (panic_tx, panic_rx) = std_mpsc::channel();

        thread::Builder::new()
            .name("corehttp-test-server".into())
            .spawn(move || {
                rt.block_on(async move {
                    let builder = hyper_util::server::conn::auto::Builder::new(hyper_util::rt::TokioExecutor::new());
                    loop {
                        tokio::select! {
                            _ = &mut shutdown_rx => break,
                            accepted = listener.accept() => {
                                let (io, _) = accepted.expect("accepted");
                                let func = func.clone();
                                let svc = hyper::service::service_fn(move |req| {
                                    let fut = func(req);
                                    async move { Ok::<_, Infallible>(fut.await) }
                                });
                                let builder = builder.clone();
                                tokio::spawn(async move {
                                    let _ = builder.serve_connection_with_upgrades(hyper_util::rt::TokioIo::new(io), svc).await;
                                });
                            }
                        }
                    }
                    let _ = panic_tx.send(());
                });
            })
            .expect("thread spawn");

        Server {
            addr,
            panic_rx,
            shutdown_tx: Some(shutdown_tx),
        }
    })
    .join()
    .unwrap()
}

/// A response with no body.
#[allow(dead_code)]
pub fn text(status: u16, body: &'static str) -> http::Response<Full<Bytes>> {
    http::Response::builder().status(status).body(Full::new(Bytes::from_static(body.as_bytes()))).unwrap()
}
