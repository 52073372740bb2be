use std::sync::Arc;

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::main_lib::AppState;
use mandi_core::prices::LoadState;

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Serialize)]
struct ReadyBody {
    status: &'static str,
    cache: LoadState,
}

/// Ready once the process serves requests; the cache state is informational.
async fn readyz(State(state): State<Arc<AppState>>) -> Json<ReadyBody> {
    Json(ReadyBody {
        status: "ok",
        cache: state.cache.load_state(),
    })
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
}
