//! Axum router wiring.
//!
//! Exposes the metrics path and, unless the metrics path is `/` itself, a
//! landing page at `/`. Every route sits behind the IP restriction layer.

use axum::{middleware, routing::get, Router};

use crate::{app_state::AppState, ops, policy};

pub fn build_router(state: AppState) -> Router {
    let path = state.cfg().web.telemetry_path.clone();

    let mut router = Router::new().route(&path, get(ops::metrics));
    if path != "/" {
        router = router.route("/", get(ops::landing));
    }

    router
        .layer(middleware::from_fn_with_state(state.access(), policy::ip_restrict))
        .with_state(state)
}
