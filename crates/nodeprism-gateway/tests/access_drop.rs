//! End-to-end: real listener, real sockets.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use nodeprism_gateway::{app_state::AppState, config, router, transport};

async fn start(allow_ips: &str) -> (std::net::SocketAddr, oneshot::Sender<()>) {
    let yaml = format!(
        "version: 1\nweb:\n  allow_ips: \"{allow_ips}\"\ncollector:\n  disable_defaults: true\n  enable: [time]\n"
    );
    let cfg = config::load_from_str(&yaml).unwrap();
    let app = router::build_router(AppState::new(cfg).unwrap());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = oneshot::channel::<()>();
    tokio::spawn(transport::serve(listener, app, async {
        let _ = rx.await;
    }));
    (addr, tx)
}

async fn exchange(addr: std::net::SocketAddr, path: &str) -> Vec<u8> {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let req = format!("GET {path} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n");
    stream.write_all(req.as_bytes()).await.unwrap();

    let mut buf = Vec::new();
    // A reset is as good as EOF here; only the bytes matter.
    let _ = tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut buf))
        .await
        .expect("server neither answered nor closed");
    buf
}

#[tokio::test]
async fn denied_client_reads_zero_bytes() {
    let (addr, _shutdown) = start("10.0.0.0/8").await;
    let got = exchange(addr, "/metrics").await;
    assert!(got.is_empty(), "denied client received {} bytes", got.len());
}

#[tokio::test]
async fn denied_client_is_dropped_on_landing_page_too() {
    let (addr, _shutdown) = start("192.168.1.5").await;
    assert!(exchange(addr, "/").await.is_empty());
}

#[tokio::test]
async fn allowed_client_gets_metrics() {
    let (addr, _shutdown) = start("127.0.0.0/8").await;
    let got = String::from_utf8(exchange(addr, "/metrics").await).unwrap();
    assert!(got.starts_with("HTTP/1.1 200"), "unexpected response: {got}");
    assert!(got.contains("node_time_seconds"));
}

#[tokio::test]
async fn literal_entry_admits_loopback() {
    let (addr, _shutdown) = start("127.0.0.1").await;
    let got = String::from_utf8(exchange(addr, "/").await).unwrap();
    assert!(got.starts_with("HTTP/1.1 200"));
    assert!(got.contains("href=\"/metrics\""));
}
