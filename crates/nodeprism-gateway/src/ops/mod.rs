//! HTTP endpoints.
//!
//! - `<telemetry_path>` : metrics exposition (filterable)
//! - `/`                : landing page

pub mod landing;

use axum::{
    extract::{RawQuery, State},
    response::{Html, Response},
};

use crate::app_state::AppState;

pub use landing::LandingPage;

pub async fn metrics(State(state): State<AppState>, RawQuery(query): RawQuery) -> Response {
    state.metrics().serve(query.as_deref()).await
}

pub async fn landing(State(state): State<AppState>) -> Html<String> {
    Html(state.landing().html().to_string())
}
