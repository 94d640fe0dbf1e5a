//! IP restriction middleware.
//!
//! Admitted requests go to the wrapped routes. Denied requests get no HTTP
//! response at all: the connection is taken over and closed, so the client
//! sees a dropped connection. Transports without takeover get a 500.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Request, State},
    http::StatusCode,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::transport::takeover::{RemoteAddr, Takeover};

use super::allowlist::{resolve_client_ip, AllowList};

const NO_TAKEOVER: &str = "Webserver doesn't support hijacking";

/// Shared middleware state.
#[derive(Debug)]
pub struct AccessControl {
    allowlist: AllowList,
}

impl AccessControl {
    pub fn new(entries: Vec<String>) -> Self {
        Self {
            allowlist: AllowList::new(entries),
        }
    }
}

fn remote_addr(req: &Request) -> String {
    if let Some(RemoteAddr(addr)) = req.extensions().get::<RemoteAddr>() {
        return addr.clone();
    }
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_default()
}

pub async fn ip_restrict(State(ac): State<Arc<AccessControl>>, req: Request, next: Next) -> Response {
    if ac.allowlist.is_empty() {
        return next.run(req).await;
    }

    let remote = remote_addr(&req);
    let ip = resolve_client_ip(&remote).to_string();

    if ac.allowlist.allows(&ip) {
        tracing::debug!(ip = %ip, "Access allowed");
        return next.run(req).await;
    }

    tracing::warn!(ip = %ip, "Access denied");

    let Some(Takeover(conn)) = req.extensions().get::<Takeover>().cloned() else {
        return (StatusCode::INTERNAL_SERVER_ERROR, NO_TAKEOVER).into_response();
    };

    match conn.take_over() {
        // The transport closes the socket; this request never produces a response.
        Ok(()) => std::future::pending().await,
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
