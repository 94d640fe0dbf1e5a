//! Accept loop and per-connection driver.
//!
//! Each accepted socket is served by hyper's HTTP/1 connection driving the
//! axum router. The driver races the connection against its takeover token;
//! when a handler takes the connection over, the connection future is
//! dropped and the socket closes with nothing written.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{body::Body, Router};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use super::takeover::{CancelTakeover, RemoteAddr, Takeover};

/// Serve `app` on `listener` until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send,
{
    tokio::pin!(shutdown);
    loop {
        let (stream, peer) = tokio::select! {
            _ = &mut shutdown => {
                tracing::info!("shutdown signal received, no longer accepting connections");
                return Ok(());
            }
            accepted = listener.accept() => match accepted {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(err = %e, "failed to accept connection");
                    continue;
                }
            },
        };
        tokio::spawn(serve_connection(stream, peer, app.clone()));
    }
}

async fn serve_connection(stream: TcpStream, peer: SocketAddr, app: Router) {
    let token = CancellationToken::new();
    let takeover = Takeover(Arc::new(CancelTakeover::new(token.clone())));
    let remote = RemoteAddr(peer.to_string());

    let svc = service_fn(move |mut req: Request<Incoming>| {
        req.extensions_mut().insert(remote.clone());
        req.extensions_mut().insert(takeover.clone());
        let app = app.clone();
        async move {
            let resp: Response<Body> = app.oneshot(req).await?;
            Ok::<_, Infallible>(resp)
        }
    });

    let conn = http1::Builder::new().serve_connection(TokioIo::new(stream), svc);
    tokio::pin!(conn);

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            tracing::debug!(peer = %peer, "connection taken over, closing without response");
        }
        res = conn.as_mut() => {
            if let Err(e) = res {
                tracing::debug!(peer = %peer, err = %e, "connection error");
            }
        }
    }
}
